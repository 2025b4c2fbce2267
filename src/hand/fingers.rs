//! Finger extension classification.
//!
//! Decides, per finger, whether it is extended or flexed, using fixed pairs of landmarks from the
//! 21-point hand topology. The rules are purely geometric and stateless; no smoothing happens
//! across frames.

use crate::error::{Error, Result};

use super::{Hand, LandmarkIdx, NUM_LANDMARKS};

/// The five fingers, in classification order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    /// All fingers, in classification order.
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];
}

/// The landmark pair consulted to decide whether a finger is extended.
struct FingerRule {
    finger: Finger,
    tip: LandmarkIdx,
    reference: LandmarkIdx,
}

/// Which landmarks decide each finger's state.
///
/// For the thumb the reference is the IP joint right below the tip; for the other fingers it is
/// the PIP joint, two topology positions below the tip.
const FINGER_RULES: [FingerRule; 5] = {
    use LandmarkIdx::*;
    [
        FingerRule {
            finger: Finger::Thumb,
            tip: ThumbTip,
            reference: ThumbIp,
        },
        FingerRule {
            finger: Finger::Index,
            tip: IndexFingerTip,
            reference: IndexFingerPip,
        },
        FingerRule {
            finger: Finger::Middle,
            tip: MiddleFingerTip,
            reference: MiddleFingerPip,
        },
        FingerRule {
            finger: Finger::Ring,
            tip: RingFingerTip,
            reference: RingFingerPip,
        },
        FingerRule {
            finger: Finger::Pinky,
            tip: PinkyTip,
            reference: PinkyPip,
        },
    ]
};

/// The extended/flexed state of all five fingers of one hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FingerStates {
    extended: [bool; 5],
}

impl FingerStates {
    /// Returns whether `finger` was classified as extended.
    #[inline]
    pub fn is_extended(&self, finger: Finger) -> bool {
        self.extended[finger as usize]
    }

    /// Returns the number of extended fingers, in range 0 to 5.
    pub fn total(&self) -> u8 {
        self.extended.iter().filter(|&&ext| ext).count() as u8
    }

    /// Iterates over all fingers and their states, in classification order.
    pub fn iter(&self) -> impl Iterator<Item = (Finger, bool)> + '_ {
        Finger::ALL
            .into_iter()
            .map(|finger| (finger, self.is_extended(finger)))
    }
}

/// Classifies the finger states of `hand`.
///
/// The thumb is considered extended iff its tip lies horizontally outward of the IP joint
/// (`tip.x > joint.x`). This is a 1-D heuristic that assumes the canonical unmirrored camera
/// orientation; a mirrored image or the other hand flips its meaning. Each other finger is
/// considered extended iff its tip lies above the PIP joint (`tip.y < joint.y`, image Y grows
/// downward).
///
/// Fails with [`Error::MalformedHand`] if `hand` does not have exactly 21 landmarks.
pub fn classify(hand: &Hand) -> Result<FingerStates> {
    if hand.landmarks().len() != NUM_LANDMARKS {
        return Err(Error::MalformedHand {
            expected: NUM_LANDMARKS,
            got: hand.landmarks().len(),
        });
    }

    let mut extended = [false; 5];
    for rule in &FINGER_RULES {
        let tip = hand.landmark_position(rule.tip);
        let reference = hand.landmark_position(rule.reference);
        extended[rule.finger as usize] = match rule.finger {
            Finger::Thumb => tip[0] > reference[0],
            _ => tip[1] < reference[1],
        };
    }

    Ok(FingerStates { extended })
}

#[cfg(test)]
mod tests {
    use crate::hand::Landmarks;
    use crate::test::synthetic_hand;

    use super::*;

    #[test]
    fn open_hand() {
        let states = classify(&synthetic_hand([true; 5])).unwrap();
        assert_eq!(states.total(), 5);
        for finger in Finger::ALL {
            assert!(states.is_extended(finger));
        }
    }

    #[test]
    fn closed_fist() {
        let states = classify(&synthetic_hand([false; 5])).unwrap();
        assert_eq!(states.total(), 0);
    }

    #[test]
    fn individual_fingers() {
        for (i, finger) in Finger::ALL.into_iter().enumerate() {
            let mut extended = [false; 5];
            extended[i] = true;
            let states = classify(&synthetic_hand(extended)).unwrap();
            assert_eq!(states.total(), 1, "{finger:?}");
            assert!(states.is_extended(finger));
        }
    }

    #[test]
    fn malformed_hand() {
        let hand = Hand::new(Landmarks::new(5), 1.0, 0.0);
        assert!(matches!(
            classify(&hand),
            Err(Error::MalformedHand {
                expected: NUM_LANDMARKS,
                got: 5
            })
        ));
    }

    #[test]
    fn total_matches_states() {
        // Random but valid landmark sets must keep the count consistent with the per-finger
        // states, and classification must be deterministic.
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        for _ in 0..500 {
            let mut landmarks = Landmarks::new(NUM_LANDMARKS);
            for pos in landmarks.positions_mut() {
                *pos = [
                    rng.f32() * 640.0,
                    rng.f32() * 480.0,
                    rng.f32() * 10.0 - 5.0,
                ];
            }
            let hand = Hand::new(landmarks, 1.0, 0.0);

            let states = classify(&hand).unwrap();
            let by_hand = Finger::ALL
                .into_iter()
                .filter(|&f| states.is_extended(f))
                .count() as u8;
            assert_eq!(states.total(), by_hand);
            assert_eq!(classify(&hand).unwrap(), states);
        }
    }
}
