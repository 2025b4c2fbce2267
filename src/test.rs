//! Shared helpers for unit tests.

use crate::hand::{Hand, LandmarkIdx, Landmarks, NUM_LANDMARKS};

/// Builds a hand whose chosen fingers are extended.
///
/// The palm landmarks sit on a baseline; extended fingertips are placed above their PIP joint
/// (and the thumb tip to the right of the IP joint), flexed ones below/left of it.
pub fn synthetic_hand(extended: [bool; 5]) -> Hand {
    use LandmarkIdx::*;

    let mut landmarks = Landmarks::new(NUM_LANDMARKS);
    for (i, pos) in landmarks.positions_mut().iter_mut().enumerate() {
        // Spread landmarks out so every joint has a distinct, plausible position.
        *pos = [i as f32 * 10.0, 100.0, 0.0];
    }

    let rules: [(usize, LandmarkIdx, LandmarkIdx); 5] = [
        (0, ThumbTip, ThumbIp),
        (1, IndexFingerTip, IndexFingerPip),
        (2, MiddleFingerTip, MiddleFingerPip),
        (3, RingFingerTip, RingFingerPip),
        (4, PinkyTip, PinkyPip),
    ];
    for (finger, tip, reference) in rules {
        let rx = landmarks.positions()[reference as usize][0];
        let tip_pos = &mut landmarks.positions_mut()[tip as usize];
        if finger == 0 {
            // Thumb states are decided on the X axis.
            tip_pos[0] = if extended[finger] { rx + 20.0 } else { rx - 20.0 };
        } else {
            tip_pos[1] = if extended[finger] { 60.0 } else { 140.0 };
        }
    }

    Hand::new(landmarks, 1.0, 1.0)
}
