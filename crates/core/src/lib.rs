pub mod hashing {
    pub mod domain {
        pub mod image_hasher;
        pub mod perceptual_hash;
    }
    pub mod infrastructure;
}

pub mod identity {
    pub mod domain {
        pub mod attendance_entry;
        pub mod detected_face;
        pub mod face_detector;
        pub mod face_store;
        pub mod image_store;
        pub mod known_identity;
        pub mod unassigned_face;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod deduplicate_faces_use_case;
    pub mod duplicate_policy;
    pub mod enroll_face_use_case;
    pub mod identification;
    pub mod identify_faces_use_case;
    pub mod map_faces_use_case;
    pub mod pipeline_logger;
}

pub mod shared {
    pub mod bounding_box;
    pub mod config;
    pub mod constants;
    pub mod embedding;
    pub mod error;
}
