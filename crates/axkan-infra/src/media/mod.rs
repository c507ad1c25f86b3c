//! Media adapters: Cloudinary object storage and Google speech recognition.

pub mod cloudinary;
pub mod speech;

pub use cloudinary::CloudinaryStorage;
pub use speech::GoogleSpeech;
