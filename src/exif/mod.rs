//! Photo metadata reading.
//!
//! The scanner only needs three things from a photo: its GPS position, when it
//! was taken, and named tags such as the camera model. [`MetadataReader`] is
//! that capability; [`NomExifReader`] implements it on top of `nom-exif`.

mod reader;

pub use reader::{
    ExifData, MetadataReader, NomExifReader, TAG_MAKE, TAG_MODEL, normalize_timestamp, read_exif,
};
