//! Which files count as images.

use std::path::Path;

/// Extensions (lower-case, without dot) recognised as disk or ISO images.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["img", "qcow2", "raw", "iso"];

/// True for bare file names ending in an image extension, compared case-insensitively.
pub fn is_image_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}
