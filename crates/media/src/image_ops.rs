//! Image format sniffing for staged media.
//!
//! Only magic bytes are inspected; nothing is decoded.

use image::ImageFormat;

/// Guess the image format from leading bytes.
pub fn sniff_format(data: &[u8]) -> Option<ImageFormat> {
    image::guess_format(data).ok()
}

/// File extension used when staging `data` to disk.
pub fn extension_for(data: &[u8]) -> &'static str {
    match sniff_format(data) {
        Some(ImageFormat::Jpeg) => "jpg",
        Some(ImageFormat::Png) => "png",
        Some(ImageFormat::WebP) => "webp",
        Some(ImageFormat::Gif) => "gif",
        Some(ImageFormat::Bmp) => "bmp",
        _ => "bin",
    }
}

/// MIME type for `data`. Telegram photos are JPEG, so unknown data defaults
/// to `image/jpeg`.
pub fn media_type_for(data: &[u8]) -> &'static str {
    match sniff_format(data) {
        Some(ImageFormat::Png) => "image/png",
        Some(ImageFormat::WebP) => "image/webp",
        Some(ImageFormat::Gif) => "image/gif",
        Some(ImageFormat::Bmp) => "image/bmp",
        _ => "image/jpeg",
    }
}
