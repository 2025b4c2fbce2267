//! Camera-driven hand gesture rating.
//!
//! This crate derives a 0–5 "fingers extended" count from hand landmarks and serves it over HTTP,
//! either as an annotated MJPEG stream read live from a camera, or as a single-shot rating for an
//! uploaded image. A third endpoint persists uploaded review images alongside an operator remark.
//!
//! # Environment Variables
//!
//! The service is configured once at startup through environment variables:
//!
//! * `HANDRATE_LISTEN`: Socket address to listen on. Defaults to `0.0.0.0:5000`.
//! * `HANDRATE_MODEL`: Path to the hand landmark ONNX model. Required.
//! * `HANDRATE_RESOLUTION`: Desired camera resolution as `WIDTHxHEIGHT`. Defaults to `640x480`.
//! * `HANDRATE_CONFIDENCE`: Detection confidence threshold in `0.0..=1.0`. Hands scoring below it
//!   are treated as not present. Defaults to `0.75`.
//! * `HANDRATE_REVIEW_DIR`: Directory that review images are saved to. Defaults to
//!   `capturedFrames`.
//! * `HANDRATE_WEBCAM_NAME`: Forces the camera device to use. If unset, the first device that
//!   supports a compatible image format will be used.
//! * `HANDRATE_JPEG_BACKEND`: Configures the JPEG image decoder to use. Allowed values are:
//!   * `zune-jpeg`: uses the [zune-jpeg] crate, a fast pure-Rust JPEG decoder (the default).
//!   * `image`: uses the decoder of the [image] crate.
//!
//! [zune-jpeg]: https://github.com/etemesi254/zune-jpeg
//! [image]: https://github.com/image-rs/image

use log::LevelFilter;

pub mod config;
pub mod error;
pub mod hand;
pub mod image;
pub mod iter;
pub mod nn;
pub mod num;
pub mod pipeline;
pub mod server;
pub mod timer;
pub mod video;

#[cfg(test)]
mod test;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and this library will log at *debug* level; `RUST_LOG` can override the
/// defaults.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
