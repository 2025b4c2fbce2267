//! The gesture pipeline: landmark acquisition, finger classification, frame annotation.

use crate::hand::fingers::{self, FingerStates};
use crate::hand::landmark::LandmarkProvider;
use crate::hand::{Hand, CONNECTIVITY};
use crate::image::{draw, Color, Image};
use crate::timer::Timer;

/// Position of the rating overlay, in pixels from the top left of the frame.
const OVERLAY_POS: (i32, i32) = (20, 70);
const OVERLAY_COLOR: Color = Color::GREEN;

/// The outcome of running the gesture pipeline on a single frame.
///
/// Produced fresh per frame and never mutated afterwards. When no hand was found, there is no
/// finger count: absence of a hand is a normal result value, not an error.
#[derive(Debug, Clone)]
pub struct GestureResult {
    hand: Option<(Hand, FingerStates)>,
}

impl GestureResult {
    fn no_hand() -> Self {
        Self { hand: None }
    }

    /// Returns whether a hand was detected and successfully classified.
    #[inline]
    pub fn hand_found(&self) -> bool {
        self.hand.is_some()
    }

    /// Returns the detected hand, if any.
    pub fn hand(&self) -> Option<&Hand> {
        self.hand.as_ref().map(|(hand, _)| hand)
    }

    /// Returns the per-finger extension states, if a hand was found.
    pub fn fingers(&self) -> Option<&FingerStates> {
        self.hand.as_ref().map(|(_, fingers)| fingers)
    }

    /// Returns the number of extended fingers, if a hand was found.
    pub fn rating(&self) -> Option<u8> {
        self.fingers().map(|fingers| fingers.total())
    }
}

/// Runs frames through landmark detection and finger classification, and optionally draws the
/// result back onto the frame.
///
/// Every recoverable detection or classification failure is absorbed into a "no hand" result;
/// the pipeline itself never fails.
pub struct GesturePipeline<P> {
    provider: P,
    t_detect: Timer,
    t_classify: Timer,
}

impl<P: LandmarkProvider> GesturePipeline<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            t_detect: Timer::new("detect"),
            t_classify: Timer::new("classify"),
        }
    }

    /// Returns profiling timers for the pipeline stages.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_detect, &self.t_classify].into_iter()
    }

    /// Processes a single frame, without annotating it.
    ///
    /// When the provider reports more than one hand, the first one is used; providers order their
    /// results by descending presence, which makes the selection deterministic.
    pub fn process(&mut self, frame: &Image) -> GestureResult {
        let hands = self.t_detect.time(|| self.provider.detect(frame));
        let Some(hand) = hands.into_iter().next() else {
            return GestureResult::no_hand();
        };

        match self.t_classify.time(|| fingers::classify(&hand)) {
            Ok(states) => GestureResult {
                hand: Some((hand, states)),
            },
            Err(e) => {
                // A malformed hand degrades to "no hand" for this frame.
                log::warn!("dropping hand that failed classification: {e}");
                GestureResult::no_hand()
            }
        }
    }

    /// Draws `result` onto `frame`: the hand skeleton and the rating text.
    ///
    /// Does nothing when `result` contains no hand; pixels outside the overlay are never altered.
    pub fn annotate(&self, frame: &mut Image, result: &GestureResult) {
        let Some((hand, fingers)) = &result.hand else {
            return;
        };

        for (a, b) in CONNECTIVITY {
            let [ax, ay, _] = hand.landmark_position(*a);
            let [bx, by, _] = hand.landmark_position(*b);
            draw::line(frame, ax as i32, ay as i32, bx as i32, by as i32).color(Color::GREEN);
        }
        for pos in hand.landmarks().positions() {
            draw::marker(frame, pos[0] as i32, pos[1] as i32);
        }

        let (x, y) = OVERLAY_POS;
        draw::text(frame, x, y, &format!("Rating: {}", fingers.total()))
            .color(OVERLAY_COLOR)
            .align_left();
    }

    /// Processes a frame and draws the result onto it, returning the result.
    pub fn process_and_annotate(&mut self, frame: &mut Image) -> GestureResult {
        let result = self.process(frame);
        self.annotate(frame, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use crate::hand::{Hand, Landmarks};
    use crate::test::synthetic_hand;

    use super::*;

    /// A provider that hands out predetermined results.
    struct StubProvider {
        hands: Vec<Hand>,
    }

    impl LandmarkProvider for StubProvider {
        fn detect(&mut self, _frame: &Image) -> Vec<Hand> {
            self.hands.clone()
        }
    }

    fn frame() -> Image {
        Image::new(64, 64)
    }

    #[test]
    fn no_hands_means_no_hand_found() {
        let mut pipeline = GesturePipeline::new(StubProvider { hands: Vec::new() });
        let result = pipeline.process(&frame());
        assert!(!result.hand_found());
        assert_eq!(result.rating(), None);
    }

    #[test]
    fn counts_open_hand() {
        let mut pipeline = GesturePipeline::new(StubProvider {
            hands: vec![synthetic_hand([true; 5])],
        });
        let result = pipeline.process(&frame());
        assert!(result.hand_found());
        assert_eq!(result.rating(), Some(5));
    }

    #[test]
    fn first_hand_wins() {
        // The provider's ordering decides which hand is rated.
        let mut pipeline = GesturePipeline::new(StubProvider {
            hands: vec![synthetic_hand([false; 5]), synthetic_hand([true; 5])],
        });
        let result = pipeline.process(&frame());
        assert_eq!(result.rating(), Some(0));
    }

    #[test]
    fn malformed_hand_degrades() {
        let mut pipeline = GesturePipeline::new(StubProvider {
            hands: vec![Hand::new(Landmarks::new(7), 1.0, 0.0)],
        });
        let result = pipeline.process(&frame());
        assert!(!result.hand_found());
    }

    #[test]
    fn annotate_without_hand_is_noop() {
        let pipeline = GesturePipeline::new(StubProvider { hands: Vec::new() });
        let mut image = frame();
        let before = image.data().to_vec();
        pipeline.annotate(&mut image, &GestureResult::no_hand());
        assert_eq!(image.data(), &before[..]);
    }

    #[test]
    fn annotate_draws_overlay() {
        let mut pipeline = GesturePipeline::new(StubProvider {
            hands: vec![synthetic_hand([true; 5])],
        });
        let mut image = Image::new(320, 240);
        let result = pipeline.process_and_annotate(&mut image);
        assert_eq!(result.rating(), Some(5));
        assert_ne!(image.data(), Image::new(320, 240).data());
    }
}
