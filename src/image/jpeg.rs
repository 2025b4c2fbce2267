use std::{
    env::{self, VarError},
    process,
    sync::OnceLock,
};

use image::ImageBuffer;

use crate::error::{Error, Result};

use super::Image;

/// Because computers, we support more than one JPEG decoding backend.
#[derive(Debug)]
enum JpegBackend {
    /// Uses the `zune-jpeg` crate, a fast pure-Rust JPEG decoder.
    ZuneJpeg,
    /// Uses the decoder of the `image` crate, which is slower but robust.
    ImageRs,
}

const DEFAULT_BACKEND: JpegBackend = JpegBackend::ZuneJpeg;

fn jpeg_backend() -> &'static JpegBackend {
    static JPEG_BACKEND: OnceLock<JpegBackend> = OnceLock::new();
    JPEG_BACKEND.get_or_init(|| {
        let backend = match env::var("HANDRATE_JPEG_BACKEND") {
            Ok(v) if v == "zune-jpeg" => JpegBackend::ZuneJpeg,
            Ok(v) if v == "image" => JpegBackend::ImageRs,
            Ok(v) => {
                eprintln!("invalid value set for `HANDRATE_JPEG_BACKEND` variable: '{v}'; exiting");
                process::exit(1);
            }
            Err(VarError::NotPresent) => DEFAULT_BACKEND,
            Err(VarError::NotUnicode(s)) => {
                eprintln!(
                    "invalid value set for `HANDRATE_JPEG_BACKEND` variable: {}; exiting",
                    s.to_string_lossy()
                );
                process::exit(1);
            }
        };
        log::debug!("using JPEG decode backend: {:?}", backend);
        backend
    })
}

pub(super) fn decode_jpeg(data: &[u8]) -> Result<Image> {
    let buf = match jpeg_backend() {
        JpegBackend::ZuneJpeg => {
            use zune_jpeg::zune_core::colorspace::ColorSpace;
            use zune_jpeg::zune_core::options::DecoderOptions;

            let mut decomp = zune_jpeg::JpegDecoder::new_with_options(
                DecoderOptions::new_fast().jpeg_set_out_colorspace(ColorSpace::RGBA),
                data,
            );
            decomp
                .decode_headers()
                .map_err(|e| Error::Decode(e.to_string()))?;
            let colorspace = decomp.get_output_colorspace();
            if colorspace != Some(ColorSpace::RGBA) {
                return Err(Error::Decode(format!(
                    "unsupported colorspace {colorspace:?} (expected RGBA)"
                )));
            }

            let size = decomp
                .output_buffer_size()
                .ok_or_else(|| Error::Decode("missing JPEG headers".into()))?;
            let mut buf = vec![0; size];
            decomp
                .decode_into(&mut buf)
                .map_err(|e| Error::Decode(e.to_string()))?;
            let (width, height) = decomp
                .dimensions()
                .ok_or_else(|| Error::Decode("missing JPEG dimensions".into()))?;
            ImageBuffer::from_raw(width.into(), height.into(), buf)
                .expect("failed to create ImageBuffer")
        }
        JpegBackend::ImageRs => image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
            .map_err(|e| Error::Decode(e.to_string()))?
            .to_rgba8(),
    };

    Ok(Image::from_buf(buf))
}

pub(super) fn encode_jpeg(image: &Image, quality: u8) -> Result<Vec<u8>> {
    // JPEG has no alpha channel, so the buffer is flattened to RGB first.
    let rgb = image::DynamicImage::ImageRgba8(image.buf().clone()).to_rgb8();

    let mut out = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality);
    encoder
        .encode(
            rgb.as_raw(),
            image.width(),
            image.height(),
            image::ColorType::Rgb8,
        )
        .map_err(|e| Error::Other(anyhow::anyhow!("JPEG encoding failed: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use crate::image::Resolution;

    use super::*;

    #[test]
    fn encode_decode() {
        let image = Image::from_rgba8(
            Resolution::new(2, 2),
            &[
                255, 255, 255, 255, //
                255, 255, 255, 255, //
                255, 255, 255, 255, //
                255, 255, 255, 255, //
            ],
        );
        let jpeg = image.encode_jpeg(90).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let back = Image::decode_jpeg(&jpeg).unwrap();
        assert_eq!(back.resolution(), Resolution::new(2, 2));
    }

    #[test]
    fn decode_truncated() {
        let image = Image::from_rgba8(Resolution::new(2, 2), &[128; 16]);
        let jpeg = image.encode_jpeg(90).unwrap();
        assert!(Image::decode_jpeg(&jpeg[..jpeg.len() / 2]).is_err());
    }
}
