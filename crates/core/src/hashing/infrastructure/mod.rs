pub mod dct;
pub mod dct_image_hasher;
