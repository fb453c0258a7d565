use std::collections::BTreeMap;
use std::time::Instant;

/// Cross-cutting logger for pipeline orchestration events.
///
/// Use cases report stage timings and classification counts here instead of
/// formatting output themselves, so the CLI can print a run summary and
/// tests can stay silent.
pub trait PipelineLogger: Send {
    /// Report image-level progress across a multi-image run.
    fn progress(&mut self, current: usize, total: usize);

    /// Record how long a named stage (`detect`, `match`, `hash`, `persist`)
    /// took for one image.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Increment a named counter (e.g. one per classification outcome).
    fn count(&mut self, name: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn count(&mut self, _name: &str) {}
}

/// `log`-backed logger that accumulates per-stage timings and counters and
/// reports them in a summary at the end of a run.
pub struct LogPipelineLogger {
    timings: BTreeMap<String, Vec<f64>>,
    counters: BTreeMap<String, usize>,
    start_time: Instant,
    total_images: usize,
}

impl LogPipelineLogger {
    pub fn new() -> Self {
        Self {
            timings: BTreeMap::new(),
            counters: BTreeMap::new(),
            start_time: Instant::now(),
            total_images: 0,
        }
    }

    /// Returns the formatted summary string, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.counters.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Identification summary ({} images, {:.1}s total):",
            self.total_images,
            elapsed_ms / 1000.0
        )];

        for (stage, durations) in &self.timings {
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = if durations.is_empty() {
                0.0
            } else {
                total_ms / durations.len() as f64
            };
            lines.push(format!(
                "  {stage:8}: avg {avg_ms:6.1}ms  total {total_ms:7.0}ms"
            ));
        }

        for (name, n) in &self.counters {
            lines.push(format!("  {name}: {n}"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn count_for(&self, name: &str) -> usize {
        self.counters.get(name).copied().unwrap_or(0)
    }
}

impl Default for LogPipelineLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.total_images = total;
        log::info!("Processing image {current}/{total}");
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn count(&mut self, name: &str) {
        *self.counters.entry(name.to_string()).or_default() += 1;
    }

    fn summary(&self) {
        if let Some(s) = self.summary_string() {
            log::info!("{s}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(LogPipelineLogger::new().summary_string().is_none());
    }

    #[test]
    fn test_timing_averages() {
        let mut logger = LogPipelineLogger::new();
        logger.timing("detect", 10.0);
        logger.timing("detect", 20.0);
        logger.timing("detect", 30.0);

        let values = logger.timings_for("detect").unwrap();
        let avg = values.iter().sum::<f64>() / values.len() as f64;
        assert_relative_eq!(avg, 20.0);
        assert!(logger.timings_for("hash").is_none());
    }

    #[test]
    fn test_counters_accumulate() {
        let mut logger = LogPipelineLogger::new();
        logger.count("known");
        logger.count("known");
        logger.count("unknown_new");
        assert_eq!(logger.count_for("known"), 2);
        assert_eq!(logger.count_for("unknown_new"), 1);
        assert_eq!(logger.count_for("unknown_reused"), 0);
    }

    #[test]
    fn test_summary_lists_stages_and_counters() {
        let mut logger = LogPipelineLogger::new();
        logger.progress(1, 3);
        logger.timing("match", 2.0);
        logger.count("known");

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("3 images"));
        assert!(summary.contains("match"));
        assert!(summary.contains("known: 1"));
    }

    #[test]
    fn test_null_logger_accepts_everything() {
        let mut logger = NullPipelineLogger;
        logger.progress(1, 1);
        logger.timing("detect", 1.0);
        logger.count("known");
        logger.summary();
    }
}
