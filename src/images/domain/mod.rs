pub mod image_file;
pub mod progress;
pub mod remote_store;
