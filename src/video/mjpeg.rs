//! MJPEG multipart stream encoding.
//!
//! Serializes an unbounded sequence of frames into a `multipart/x-mixed-replace` byte stream,
//! one JPEG part per frame. There is no buffering of unconsumed frames: a part is only produced
//! when the consumer asks for more bytes, so frames that cannot be consumed in time are dropped
//! at the source.

use std::io::{self, Read};

use crate::image::Image;
use crate::timer::FpsCounter;
use crate::video::FrameSource;

/// The multipart boundary token separating stream parts.
pub const BOUNDARY: &str = "frame";

/// JPEG quality used for encoded stream parts.
const JPEG_QUALITY: u8 = 80;

/// Returns the value of the `Content-Type` header describing this stream.
pub fn content_type() -> String {
    format!("multipart/x-mixed-replace; boundary={BOUNDARY}")
}

/// An [`io::Read`] adapter that encodes frames from a [`FrameSource`] into multipart JPEG chunks.
///
/// Every frame read from the source is passed to the `annotate` hook before encoding. The stream
/// ends when the source does (end of stream or device failure); it cannot be restarted.
pub struct MjpegStream<S, F> {
    source: S,
    annotate: F,
    /// The part currently being handed out, and the read position within it.
    buf: Vec<u8>,
    pos: usize,
    done: bool,
    fps: FpsCounter,
}

impl<S: FrameSource, F: FnMut(&mut Image)> MjpegStream<S, F> {
    pub fn new(source: S, annotate: F) -> Self {
        Self {
            source,
            annotate,
            buf: Vec::new(),
            pos: 0,
            done: false,
            fps: FpsCounter::new("mjpeg stream"),
        }
    }

    /// Pulls the next frame and encodes it into `self.buf`. Returns `false` when the source has
    /// ended.
    fn next_part(&mut self) -> bool {
        loop {
            let mut frame = match self.source.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => return false,
                Err(e) => {
                    log::error!("frame source failed, ending stream: {e}");
                    return false;
                }
            };

            (self.annotate)(&mut frame);

            match frame.encode_jpeg(JPEG_QUALITY) {
                Ok(jpeg) => {
                    self.buf.clear();
                    self.buf.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
                    self.buf
                        .extend_from_slice(b"Content-Type: image/jpeg\r\n");
                    self.buf.extend_from_slice(
                        format!("Content-Length: {}\r\n\r\n", jpeg.len()).as_bytes(),
                    );
                    self.buf.extend_from_slice(&jpeg);
                    self.buf.extend_from_slice(b"\r\n");
                    self.pos = 0;
                    self.fps.tick();
                    return true;
                }
                Err(e) => {
                    // Skip the frame; the stream stays usable.
                    log::error!("failed to encode frame: {e}");
                }
            }
        }
    }
}

impl<S: FrameSource, F: FnMut(&mut Image)> Read for MjpegStream<S, F> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos == self.buf.len() {
            if self.done || !self.next_part() {
                self.done = true;
                return Ok(0);
            }
        }

        let remaining = &self.buf[self.pos..];
        let n = remaining.len().min(out.len());
        out[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;

    use super::*;

    /// Yields a fixed number of frames, then ends.
    struct CountedSource {
        remaining: usize,
    }

    impl FrameSource for CountedSource {
        fn read_frame(&mut self) -> crate::error::Result<Option<Image>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            Ok(Some(Image::new(8, 8)))
        }
    }

    /// Fails after a fixed number of frames.
    struct FailingSource {
        until_failure: usize,
    }

    impl FrameSource for FailingSource {
        fn read_frame(&mut self) -> crate::error::Result<Option<Image>> {
            if self.until_failure == 0 {
                return Err(Error::Device("gone".into()));
            }
            self.until_failure -= 1;
            Ok(Some(Image::new(8, 8)))
        }
    }

    fn count_parts(bytes: &[u8]) -> usize {
        let marker = format!("--{BOUNDARY}\r\n");
        let marker = marker.as_bytes();
        (0..bytes.len())
            .filter(|&i| bytes[i..].starts_with(marker))
            .count()
    }

    #[test]
    fn one_part_per_frame() {
        for k in [0, 1, 3] {
            let mut stream = MjpegStream::new(CountedSource { remaining: k }, |_| ());
            let mut bytes = Vec::new();
            stream.read_to_end(&mut bytes).unwrap();
            assert_eq!(count_parts(&bytes), k);
        }
    }

    #[test]
    fn parts_are_well_formed() {
        let mut stream = MjpegStream::new(CountedSource { remaining: 1 }, |_| ());
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).unwrap();

        let text = String::from_utf8_lossy(&bytes);
        assert!(text.starts_with("--frame\r\nContent-Type: image/jpeg\r\nContent-Length: "));

        // The declared length matches the JPEG body between the blank line and the trailing CRLF.
        let header_end = bytes.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
        let header = std::str::from_utf8(&bytes[..header_end]).unwrap();
        let length: usize = header
            .lines()
            .find_map(|line| line.strip_prefix("Content-Length: "))
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        let body = &bytes[header_end..header_end + length];
        assert_eq!(&body[..2], &[0xFF, 0xD8]);
        assert_eq!(&bytes[header_end + length..], b"\r\n");
    }

    #[test]
    fn device_failure_terminates() {
        let mut stream = MjpegStream::new(FailingSource { until_failure: 2 }, |_| ());
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).unwrap();
        assert_eq!(count_parts(&bytes), 2);

        // Once ended, the stream stays ended.
        let mut more = [0; 16];
        assert_eq!(stream.read(&mut more).unwrap(), 0);
    }

    #[test]
    fn annotate_hook_runs_per_frame() {
        let mut seen = 0;
        let mut stream = MjpegStream::new(CountedSource { remaining: 3 }, |_frame| seen += 1);
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).unwrap();
        drop(stream);
        assert_eq!(seen, 3);
    }
}
