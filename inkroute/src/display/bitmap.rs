//! 8-bit grayscale frames.

use std::io::Cursor;

use bytes::Bytes;
use image::{GrayImage, ImageFormat};

use super::pipeline::DisplayError;

/// A rendered frame, one byte per pixel (0 = black, 255 = white).
///
/// Pixel storage is reference counted, so cloning a frame is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Bytes,
}

impl Bitmap {
    /// An all-white frame.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: Bytes::from(vec![255u8; width as usize * height as usize]),
        }
    }

    /// Wrap raw grayscale pixels.
    pub fn from_gray(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, DisplayError> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(DisplayError::InvalidBitmap(format!(
                "expected {} pixels for {}x{}, got {}",
                expected,
                width,
                height,
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels: Bytes::from(pixels),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw grayscale pixels, row-major.
    pub fn pixels(&self) -> &Bytes {
        &self.pixels
    }

    /// Pixel value at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Number of pixels darker than mid-gray.
    pub fn dark_pixel_count(&self) -> usize {
        self.pixels.iter().filter(|&&p| p < 128).count()
    }

    /// Pack into 1 bit per pixel, MSB first, rows padded to whole bytes.
    /// Set bits are white, matching common e-paper controllers.
    pub fn to_packed_1bpp(&self) -> Vec<u8> {
        let row_bytes = (self.width as usize).div_ceil(8);
        let mut packed = vec![0u8; row_bytes * self.height as usize];
        for y in 0..self.height as usize {
            for x in 0..self.width as usize {
                if self.pixels[y * self.width as usize + x] >= 128 {
                    packed[y * row_bytes + x / 8] |= 0x80 >> (x % 8);
                }
            }
        }
        packed
    }

    /// Encode as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, DisplayError> {
        let image = GrayImage::from_raw(self.width, self.height, self.pixels.to_vec())
            .ok_or_else(|| DisplayError::InvalidBitmap("pixel buffer size mismatch".into()))?;
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_gray_rejects_wrong_size() {
        assert!(Bitmap::from_gray(4, 4, vec![0; 15]).is_err());
        assert!(Bitmap::from_gray(4, 4, vec![0; 16]).is_ok());
    }

    #[test]
    fn test_packed_1bpp_layout() {
        // 10 px wide: two bytes per row.
        let mut pixels = vec![0u8; 10 * 2];
        pixels[0] = 255;
        pixels[9] = 255;
        pixels[10 + 1] = 255;
        let bitmap = Bitmap::from_gray(10, 2, pixels).unwrap();

        let packed = bitmap.to_packed_1bpp();
        assert_eq!(packed, vec![0b1000_0000, 0b0100_0000, 0b0100_0000, 0]);
    }

    #[test]
    fn test_png_signature() {
        let png = Bitmap::blank(8, 8).to_png().unwrap();
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }

    #[test]
    fn test_pixel_bounds() {
        let bitmap = Bitmap::blank(2, 2);
        assert_eq!(bitmap.pixel(1, 1), Some(255));
        assert_eq!(bitmap.pixel(2, 0), None);
        assert_eq!(bitmap.dark_pixel_count(), 0);
    }
}
