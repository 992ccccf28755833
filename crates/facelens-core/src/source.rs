use crate::types::VideoFrame;

/// A stream of decoded video frames.
pub trait FrameSource {
    /// Frame rate the source reports, if it knows one.
    fn frame_rate(&self) -> Option<f64>;

    /// Block until the next frame is ready. `None` once the stream has ended.
    fn next_frame(&mut self) -> Option<VideoFrame>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn frame_rate(&self) -> Option<f64> {
        (**self).frame_rate()
    }

    fn next_frame(&mut self) -> Option<VideoFrame> {
        (**self).next_frame()
    }
}
