//! Startup configuration.
//!
//! All settings are read from environment variables once at process start; nothing is
//! hot-reloadable. See the crate documentation for the full list of variables.

use std::{
    env::{self, VarError},
    net::SocketAddr,
    path::PathBuf,
};

use anyhow::{bail, Context};

use crate::image::Resolution;

const ENV_LISTEN: &str = "HANDRATE_LISTEN";
const ENV_MODEL: &str = "HANDRATE_MODEL";
const ENV_RESOLUTION: &str = "HANDRATE_RESOLUTION";
const ENV_CONFIDENCE: &str = "HANDRATE_CONFIDENCE";
const ENV_REVIEW_DIR: &str = "HANDRATE_REVIEW_DIR";

const DEFAULT_LISTEN: &str = "0.0.0.0:5000";
const DEFAULT_RESOLUTION: Resolution = Resolution::new(640, 480);
const DEFAULT_CONFIDENCE: f32 = 0.75;
const DEFAULT_REVIEW_DIR: &str = "capturedFrames";

/// Service configuration, fixed at process start.
#[derive(Debug, Clone)]
pub struct Config {
    /// Socket address the HTTP server binds to.
    pub listen: SocketAddr,
    /// Path to the hand landmark ONNX model.
    pub model: PathBuf,
    /// Desired camera capture resolution.
    pub resolution: Resolution,
    /// Detection confidence threshold; hands scoring below it are treated as absent.
    pub min_confidence: f32,
    /// Directory review images are persisted to.
    pub review_dir: PathBuf,
}

impl Config {
    /// Reads the configuration from the environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let listen = var(ENV_LISTEN)?.unwrap_or_else(|| DEFAULT_LISTEN.into());
        let listen = listen
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid `{ENV_LISTEN}` value '{listen}'"))?;

        let model = var(ENV_MODEL)?
            .map(PathBuf::from)
            .with_context(|| format!("`{ENV_MODEL}` must point at the hand landmark ONNX model"))?;

        let resolution = match var(ENV_RESOLUTION)? {
            Some(raw) => parse_resolution(&raw)
                .with_context(|| format!("invalid `{ENV_RESOLUTION}` value '{raw}'"))?,
            None => DEFAULT_RESOLUTION,
        };

        let min_confidence = match var(ENV_CONFIDENCE)? {
            Some(raw) => {
                let value = raw
                    .parse::<f32>()
                    .with_context(|| format!("invalid `{ENV_CONFIDENCE}` value '{raw}'"))?;
                if !(0.0..=1.0).contains(&value) {
                    bail!("`{ENV_CONFIDENCE}` must lie in 0.0..=1.0, got {value}");
                }
                value
            }
            None => DEFAULT_CONFIDENCE,
        };

        let review_dir = var(ENV_REVIEW_DIR)?
            .map(PathBuf::from)
            .unwrap_or_else(|| DEFAULT_REVIEW_DIR.into());

        Ok(Self {
            listen,
            model,
            resolution,
            min_confidence,
            review_dir,
        })
    }
}

fn var(name: &str) -> anyhow::Result<Option<String>> {
    match env::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(s)) => {
            bail!("`{name}` is not valid UTF-8: {}", s.to_string_lossy())
        }
    }
}

/// Parses a `WIDTHxHEIGHT` resolution string.
fn parse_resolution(raw: &str) -> anyhow::Result<Resolution> {
    let Some((w, h)) = raw.split_once('x') else {
        bail!("expected WIDTHxHEIGHT");
    };
    let (w, h) = (w.trim().parse::<u32>()?, h.trim().parse::<u32>()?);
    if w == 0 || h == 0 {
        bail!("resolution dimensions must be nonzero");
    }
    Ok(Resolution::new(w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_strings() {
        assert_eq!(
            parse_resolution("640x480").unwrap(),
            Resolution::new(640, 480)
        );
        assert_eq!(
            parse_resolution("1920 x 1080").unwrap(),
            Resolution::new(1920, 1080)
        );
        assert!(parse_resolution("640").is_err());
        assert!(parse_resolution("0x480").is_err());
        assert!(parse_resolution("x").is_err());
    }
}
