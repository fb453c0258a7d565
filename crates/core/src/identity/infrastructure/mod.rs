pub mod directory_image_store;
pub mod http_face_detector;
pub mod in_memory_face_store;
pub mod json_file_face_store;
pub mod record_set;
