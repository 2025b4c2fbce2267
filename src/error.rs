//! Error taxonomy of the gesture pipeline and its resource layers.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures that are visible to callers.
///
/// Everything below the resource layer is absorbed into a
/// [`GestureResult`][crate::pipeline::GestureResult] instead: an absent hand is a normal result
/// value, and a hand that fails classification degrades to "no hand" for that frame. Nothing here
/// is ever retried.
#[derive(Debug, Error)]
pub enum Error {
    /// The camera device could not deliver a frame. Fatal to the stream that hit it.
    #[error("camera device error: {0}")]
    Device(String),
    /// Uploaded image bytes could not be decoded. Reported to the caller, not fatal to the
    /// process.
    #[error("invalid image data: {0}")]
    Decode(String),
    /// A detected hand did not have the expected number of landmarks.
    ///
    /// The fixed 21-point topology makes this unreachable with a well-behaved landmark backend;
    /// it exists so a misbehaving one degrades instead of crashing.
    #[error("malformed hand: expected {expected} landmarks, got {got}")]
    MalformedHand { expected: usize, got: usize },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
