//! Hand landmark prediction.

use std::path::Path;

use crate::image::Image;
use crate::iter::zip_exact;
use crate::nn::{Cnn, ColorMapper, NeuralNetwork, Outputs};
use crate::num::sigmoid;
use crate::timer::Timer;

use super::{Hand, Landmarks, NUM_LANDMARKS};

/// Types that can detect hands and their landmarks in an image frame.
///
/// Implementations never report failures to the caller: a frame the backend cannot process is
/// indistinguishable from a frame without a hand in it. Hands are returned ordered by descending
/// presence confidence, so the first entry is the most plausible one.
pub trait LandmarkProvider {
    /// Detects hands in `frame`, returning zero or more of them.
    fn detect(&mut self, frame: &Image) -> Vec<Hand>;
}

/// A [`LandmarkProvider`] running a MediaPipe-style hand landmark network.
///
/// The network predicts 21 landmark positions, a presence confidence, and a handedness estimate
/// for the single most prominent hand in its input. Hands whose presence falls below the
/// configured minimum confidence are dropped.
pub struct HandLandmarker {
    cnn: Cnn,
    min_confidence: f32,
    t_infer: Timer,
    t_extract: Timer,
}

/// Loads the hand landmark [`Cnn`] from an ONNX file.
///
/// The network must take a single `[1, 3, H, W]` image input and produce the MediaPipe hand
/// landmark outputs (`[1, 63]` screen landmarks, `[1, 1]` presence, `[1, 1]` handedness).
pub fn load_cnn<P: AsRef<Path>>(path: P) -> anyhow::Result<Cnn> {
    let nn = NeuralNetwork::load(path)?;
    Cnn::new(nn, ColorMapper::linear(0.0..=1.0))
}

impl HandLandmarker {
    pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;

    /// Wraps an already-loaded [`Cnn`].
    pub fn new(cnn: Cnn, min_confidence: f32) -> Self {
        Self {
            cnn,
            min_confidence,
            t_infer: Timer::new("infer"),
            t_extract: Timer::new("extract"),
        }
    }

    /// Loads the landmark network from an ONNX file.
    pub fn load<P: AsRef<Path>>(path: P, min_confidence: f32) -> anyhow::Result<Self> {
        Ok(Self::new(load_cnn(path)?, min_confidence))
    }

    /// Returns the underlying [`Cnn`], a cheap handle that can seed further landmarkers.
    pub fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    /// Returns profiling timers for inference and output extraction.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract].into_iter()
    }

    fn detect_impl(&mut self, frame: &Image) -> anyhow::Result<Vec<Hand>> {
        if frame.width() == 0 || frame.height() == 0 {
            log::trace!("skipping landmark inference on empty frame");
            return Ok(Vec::new());
        }

        let outputs = self.t_infer.time(|| self.cnn.estimate(frame))?;
        log::trace!("inference result: {:?}", outputs);

        let mut hand = self.t_extract.time(|| extract(&outputs))?;
        if hand.presence < self.min_confidence {
            log::trace!(
                "dropping hand with presence {} below threshold {}",
                hand.presence,
                self.min_confidence,
            );
            return Ok(Vec::new());
        }

        // Map landmark coordinates from the network input to frame pixels. The sampled region is
        // the frame letterboxed to the input's aspect ratio, anchored at the top left, so a plain
        // scale factor is enough.
        let src = self.cnn.source_resolution(frame);
        let scale = src.width() as f32 / self.cnn.input_resolution().width() as f32;
        for pos in hand.landmarks.positions_mut() {
            *pos = pos.map(|t| t * scale);
        }

        Ok(vec![hand])
    }
}

impl LandmarkProvider for HandLandmarker {
    fn detect(&mut self, frame: &Image) -> Vec<Hand> {
        match self.detect_impl(frame) {
            Ok(hands) => hands,
            Err(e) => {
                // A frame the model cannot process counts as "no hand found", not as a failure.
                log::error!("hand landmark inference failed: {e}");
                Vec::new()
            }
        }
    }
}

fn extract(outputs: &Outputs) -> anyhow::Result<Hand> {
    if outputs.len() < 3 {
        anyhow::bail!(
            "expected at least 3 landmark network outputs, got {}",
            outputs.len()
        );
    }

    let screen_landmarks = &outputs[0];
    let presence_flag = &outputs[1];
    let handedness = &outputs[2];

    if screen_landmarks.shape() != [1, NUM_LANDMARKS * 3] {
        anyhow::bail!(
            "unexpected landmark tensor shape {:?}",
            screen_landmarks.shape()
        );
    }
    if presence_flag.shape() != [1, 1] || handedness.shape() != [1, 1] {
        anyhow::bail!(
            "unexpected scalar output shapes {:?} / {:?}",
            presence_flag.shape(),
            handedness.shape()
        );
    }

    let raw_presence = presence_flag.index([0, 0]).as_singular();
    // Some exports bake the sigmoid activation into the graph, some leave the raw logit.
    let presence = if (0.0..=1.0).contains(&raw_presence) {
        raw_presence
    } else {
        sigmoid(raw_presence)
    };
    let raw_handedness = handedness.index([0, 0]).as_singular();

    let mut landmarks = Landmarks::new(NUM_LANDMARKS);
    for (chunk, out) in zip_exact(
        screen_landmarks.index([0]).as_slice().chunks_exact(3),
        landmarks.positions_mut(),
    ) {
        out.copy_from_slice(chunk);
    }

    Ok(Hand::new(landmarks, presence, raw_handedness))
}
