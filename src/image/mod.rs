//! Image manipulation.
//!
//! This module provides:
//!
//! - The [`Image`] type, an owned RGBA image.
//! - JPEG and PNG decoding of uploaded or captured bytes, and JPEG encoding for the stream.
//! - A small set of [`draw`] functions used by the frame annotator.
//! - [`Resolution`] and [`AspectRatio`], sizes of images and network inputs.

pub mod draw;
mod jpeg;
mod resolution;

use std::fmt;

use embedded_graphics::{pixelcolor::raw::RawU32, prelude::PixelColor};
use image::{ImageBuffer, Rgba, RgbaImage};

pub use resolution::*;

use crate::error::{Error, Result};

/// An 8-bit sRGB image with alpha channel.
#[derive(Clone)]
pub struct Image {
    buf: RgbaImage,
}

impl Image {
    /// Creates an empty image of a specified size.
    ///
    /// The image will start out black and fully transparent.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: ImageBuffer::new(width, height),
        }
    }

    /// Creates an image from raw RGBA data.
    ///
    /// # Panics
    ///
    /// `buf` must contain exactly `width * height * 4` bytes.
    pub fn from_rgba8(res: Resolution, buf: &[u8]) -> Self {
        let expected_size = res.width() as usize * res.height() as usize * 4;
        assert_eq!(
            expected_size,
            buf.len(),
            "incorrect buffer size {} for {} image (expected {} bytes)",
            buf.len(),
            res,
            expected_size,
        );

        Self {
            buf: ImageBuffer::from_vec(res.width(), res.height(), buf.to_vec())
                .expect("buffer size does not match image resolution"),
        }
    }

    /// Decodes an image from a byte slice holding a JPEG or PNG container.
    ///
    /// Empty, truncated, or otherwise malformed data results in [`Error::Decode`].
    pub fn decode(data: &[u8]) -> Result<Self> {
        const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G'];
        const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8];

        if data.starts_with(PNG_MAGIC) {
            let buf = image::load_from_memory_with_format(data, image::ImageFormat::Png)
                .map_err(|e| Error::Decode(e.to_string()))?
                .to_rgba8();
            Ok(Self { buf })
        } else if data.starts_with(JPEG_MAGIC) {
            Self::decode_jpeg(data)
        } else {
            Err(Error::Decode("unrecognized image format".into()))
        }
    }

    /// Decodes a JFIF JPEG or Motion JPEG from a byte slice.
    pub fn decode_jpeg(data: &[u8]) -> Result<Self> {
        jpeg::decode_jpeg(data)
    }

    /// Encodes the image as a baseline JPEG.
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        jpeg::encode_jpeg(self, quality)
    }

    /// Returns the width of this image, in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    /// Returns the height of this image, in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    /// Returns the size of this image.
    #[inline]
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width(), self.height())
    }

    /// Gets the image color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    pub fn get(&self, x: u32, y: u32) -> Color {
        let rgba = &self.buf[(x, y)];
        Color(rgba.0)
    }

    /// Sets the image color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.buf[(x, y)] = Rgba(color.0);
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        self.buf.as_raw()
    }

    pub(crate) fn buf(&self) -> &RgbaImage {
        &self.buf
    }

    pub(crate) fn from_buf(buf: RgbaImage) -> Self {
        Self { buf }
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} Image", self.width(), self.height())
    }
}

/// An 8-bit sRGB color with alpha channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub(crate) [u8; 4]);

impl Color {
    /// Fully transparent black (all components are 0).
    pub const NULL: Self = Self([0, 0, 0, 0]);
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);
    pub const RED: Self = Self([255, 0, 0, 255]);
    pub const GREEN: Self = Self([0, 255, 0, 255]);
    pub const BLUE: Self = Self([0, 0, 255, 255]);

    #[inline]
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    #[inline]
    pub fn r(&self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub fn g(&self) -> u8 {
        self.0[1]
    }

    #[inline]
    pub fn b(&self) -> u8 {
        self.0[2]
    }

    #[inline]
    pub fn a(&self) -> u8 {
        self.0[3]
    }
}

impl PixelColor for Color {
    type Raw = RawU32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_roundtrip() {
        let image = Image::from_rgba8(
            Resolution::new(2, 1),
            &[255, 0, 0, 255, 0, 255, 0, 255],
        );
        assert_eq!(image.get(0, 0), Color::RED);
        assert_eq!(image.get(1, 0), Color::GREEN);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(Image::decode(&[]), Err(Error::Decode(_))));
        assert!(matches!(Image::decode(b"hello"), Err(Error::Decode(_))));
        // Valid JPEG magic, truncated body.
        assert!(matches!(
            Image::decode(&[0xFF, 0xD8, 0xFF]),
            Err(Error::Decode(_))
        ));
    }
}
