//! End-to-end tests of the rating path and the stream encoder, using synthetic landmark
//! providers and frame sources in place of the neural network and the camera.

use std::io::Read;

use handrate::error::Result;
use handrate::hand::landmark::LandmarkProvider;
use handrate::hand::{Hand, LandmarkIdx, Landmarks, NUM_LANDMARKS};
use handrate::image::{Image, Resolution};
use handrate::pipeline::GesturePipeline;
use handrate::server::rate_image;
use handrate::video::mjpeg::MjpegStream;
use handrate::video::FrameSource;

struct StubProvider {
    hands: Vec<Hand>,
}

impl LandmarkProvider for StubProvider {
    fn detect(&mut self, _frame: &Image) -> Vec<Hand> {
        self.hands.clone()
    }
}

/// Hand-crafts a 21-point landmark set with all fingers extended or all flexed.
fn crafted_hand(open: bool) -> Hand {
    use LandmarkIdx::*;

    let mut landmarks = Landmarks::new(NUM_LANDMARKS);
    for (i, pos) in landmarks.positions_mut().iter_mut().enumerate() {
        *pos = [100.0 + i as f32, 200.0, 0.0];
    }

    let tips = [
        ThumbTip,
        IndexFingerTip,
        MiddleFingerTip,
        RingFingerTip,
        PinkyTip,
    ];
    let references = [
        ThumbIp,
        IndexFingerPip,
        MiddleFingerPip,
        RingFingerPip,
        PinkyPip,
    ];
    for (tip, reference) in tips.into_iter().zip(references) {
        let [rx, ry, _] = landmarks.positions()[reference as usize];
        let tip_pos = &mut landmarks.positions_mut()[tip as usize];
        if tip == ThumbTip {
            // The thumb rule works on the horizontal axis.
            tip_pos[0] = if open { rx + 30.0 } else { rx - 30.0 };
        } else {
            tip_pos[1] = if open { ry - 50.0 } else { ry + 50.0 };
        }
    }

    Hand::new(landmarks, 0.95, 1.0)
}

fn upload_jpeg() -> Vec<u8> {
    Image::new(64, 64).encode_jpeg(90).unwrap()
}

#[test]
fn rating_open_hand_is_five() {
    let mut pipeline = GesturePipeline::new(StubProvider {
        hands: vec![crafted_hand(true)],
    });
    let response = rate_image(&mut pipeline, &upload_jpeg());
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"status": "success", "rating": 5})
    );
}

#[test]
fn rating_closed_fist_is_zero() {
    let mut pipeline = GesturePipeline::new(StubProvider {
        hands: vec![crafted_hand(false)],
    });
    let response = rate_image(&mut pipeline, &upload_jpeg());
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"status": "success", "rating": 0})
    );
}

#[test]
fn rating_without_hand_reports_error() {
    let mut pipeline = GesturePipeline::new(StubProvider { hands: Vec::new() });
    let response = rate_image(&mut pipeline, &upload_jpeg());
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"status": "error", "message": "No hand detected"})
    );
}

#[test]
fn invalid_uploads_are_rejected() {
    let mut pipeline = GesturePipeline::new(StubProvider {
        hands: vec![crafted_hand(true)],
    });

    let expected = serde_json::json!({"status": "error", "message": "Invalid image"});
    for bad in [&[][..], &b"not an image"[..], &upload_jpeg()[..10]] {
        let response = rate_image(&mut pipeline, bad);
        assert_eq!(serde_json::to_value(&response).unwrap(), expected);
    }
}

#[test]
fn malformed_hand_is_treated_as_undetected() {
    let mut pipeline = GesturePipeline::new(StubProvider {
        hands: vec![Hand::new(Landmarks::new(3), 0.9, 0.0)],
    });
    let response = rate_image(&mut pipeline, &upload_jpeg());
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["status"], "error");
    assert_eq!(json["message"], "No hand detected");
}

struct CountedSource {
    remaining: usize,
}

impl FrameSource for CountedSource {
    fn read_frame(&mut self) -> Result<Option<Image>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        Ok(Some(Image::new(32, 32)))
    }
}

#[test]
fn stream_annotates_every_frame() {
    // Wire the whole streaming path together: source -> pipeline -> multipart encoder.
    let mut pipeline = GesturePipeline::new(StubProvider {
        hands: vec![crafted_hand(true)],
    });

    let mut stream = MjpegStream::new(CountedSource { remaining: 4 }, move |frame| {
        let result = pipeline.process_and_annotate(frame);
        assert_eq!(result.rating(), Some(5));
    });

    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes).unwrap();

    let marker = b"--frame\r\n";
    let parts = (0..bytes.len())
        .filter(|&i| bytes[i..].starts_with(marker))
        .count();
    assert_eq!(parts, 4);

    // Each part body must decode back into a frame of the source resolution.
    let mut rest = &bytes[..];
    while let Some(start) = rest
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| i + 4)
    {
        let length = std::str::from_utf8(&rest[..start])
            .unwrap()
            .lines()
            .find_map(|line| line.strip_prefix("Content-Length: "))
            .unwrap()
            .trim()
            .parse::<usize>()
            .unwrap();
        let jpeg = &rest[start..start + length];
        let frame = Image::decode_jpeg(jpeg).unwrap();
        assert_eq!(frame.resolution(), Resolution::new(32, 32));
        rest = &rest[start + length..];
    }
}
