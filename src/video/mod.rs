//! Video frame acquisition and stream encoding.

pub mod mjpeg;
pub mod webcam;

use crate::error::Result;
use crate::image::Image;

/// A source of video frames, polled in a loop.
///
/// `Ok(None)` means the source has ended; an error means the underlying device failed. Either way
/// the consuming stream terminates — frames are never retried.
pub trait FrameSource {
    fn read_frame(&mut self) -> Result<Option<Image>>;
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn read_frame(&mut self) -> Result<Option<Image>> {
        (**self).read_frame()
    }
}
