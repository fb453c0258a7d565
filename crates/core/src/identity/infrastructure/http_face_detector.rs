/// Client for the Python detection engine (`POST /detect`).
///
/// Uploads the image as multipart field `file` and maps the returned
/// `{faces: [{bbox, kps, det_score, embedding}]}` document into
/// [`DetectedFace`]s. The engine already L2-normalizes embeddings.
use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;

use crate::identity::domain::detected_face::DetectedFace;
use crate::identity::domain::face_detector::FaceDetector;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::embedding::Embedding;
use crate::shared::error::BoxError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("detection request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("detection engine at {url} returned {status}: {body}")]
    Status { url: String, status: u16, body: String },
    #[error("malformed detection response: {0}")]
    Malformed(#[source] serde_json::Error),
}

#[derive(Deserialize)]
struct WireResponse {
    faces: Vec<WireFace>,
}

#[derive(Deserialize)]
struct WireFace {
    bbox: [f64; 4],
    #[serde(default)]
    kps: Vec<[f64; 2]>,
    det_score: f64,
    embedding: Vec<f32>,
}

impl From<WireFace> for DetectedFace {
    fn from(w: WireFace) -> Self {
        Self {
            bbox: BoundingBox::from(w.bbox),
            keypoints: w.kps,
            detection_score: w.det_score,
            embedding: Embedding::new(w.embedding),
        }
    }
}

pub struct HttpFaceDetector {
    client: reqwest::blocking::Client,
    detect_url: String,
}

impl HttpFaceDetector {
    pub fn new(base_url: &str) -> Result<Self, DetectorError> {
        let detect_url = detect_url(base_url);
        let client = reqwest::blocking::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|source| DetectorError::Request {
                url: detect_url.clone(),
                source,
            })?;
        Ok(Self { client, detect_url })
    }

    pub fn detect_url(&self) -> &str {
        &self.detect_url
    }

    fn request(&self, image_bytes: &[u8]) -> Result<Vec<DetectedFace>, DetectorError> {
        let request_err = |source| DetectorError::Request {
            url: self.detect_url.clone(),
            source,
        };
        let form = Form::new().part(
            "file",
            Part::bytes(image_bytes.to_vec()).file_name("image.jpg"),
        );
        let response = self
            .client
            .post(&self.detect_url)
            .multipart(form)
            .send()
            .map_err(request_err)?;

        let status = response.status();
        let body = response.text().map_err(request_err)?;
        if !status.is_success() {
            return Err(DetectorError::Status {
                url: self.detect_url.clone(),
                status: status.as_u16(),
                body,
            });
        }
        parse_detection_response(&body)
    }
}

impl FaceDetector for HttpFaceDetector {
    fn detect(&self, image_bytes: &[u8]) -> Result<Vec<DetectedFace>, BoxError> {
        let faces = self.request(image_bytes)?;
        log::debug!("Detection engine returned {} face(s)", faces.len());
        Ok(faces)
    }
}

fn detect_url(base_url: &str) -> String {
    format!("{}/detect", base_url.trim_end_matches('/'))
}

pub fn parse_detection_response(body: &str) -> Result<Vec<DetectedFace>, DetectorError> {
    let wire: WireResponse = serde_json::from_str(body).map_err(DetectorError::Malformed)?;
    Ok(wire.faces.into_iter().map(DetectedFace::from).collect())
}
