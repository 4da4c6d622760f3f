//! Decoded pixel buffer wrapper.

use image::DynamicImage;

/// A decoded image buffer.
///
/// Wraps the decoded pixels together with the dimension and pixel-format
/// queries the cache diagnostics need. Buffers are shared between the cache
/// and callers as `Arc<DecodedImage>`; the pixels are released when the last
/// reference drops, so replacing a cache entry disposes the superseded
/// buffer once callers let go of it.
#[derive(Debug)]
pub struct DecodedImage {
    image: DynamicImage,
}

impl DecodedImage {
    /// Wrap a decoded image.
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Bytes per pixel of the underlying pixel format.
    pub fn bytes_per_pixel(&self) -> u32 {
        u32::from(self.image.color().bytes_per_pixel())
    }

    /// Estimated resident size in bytes (width * height * bytes per pixel).
    pub fn estimated_bytes(&self) -> usize {
        self.width() as usize * self.height() as usize * self.bytes_per_pixel() as usize
    }

    /// Borrow the underlying image for rendering or further processing.
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    /// Consume the wrapper, yielding the underlying image.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbaImage};

    #[test]
    fn test_dimensions_and_size() {
        let img = DecodedImage::new(DynamicImage::ImageRgba8(RgbaImage::new(10, 4)));
        assert_eq!(img.width(), 10);
        assert_eq!(img.height(), 4);
        assert_eq!(img.bytes_per_pixel(), 4);
        assert_eq!(img.estimated_bytes(), 10 * 4 * 4);
    }
}
