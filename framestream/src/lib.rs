mod control;
mod events;
mod limiter;
mod sink;
mod streamer;
mod track;

use std::sync::Arc;

pub use self::{control::*, events::*, limiter::*, sink::*, streamer::*, track::*};

pub use common::{
    frame::{FrameError, VideoBuffer, VideoFormat, VideoFrame, VideoRotation},
    logger::{enable_panic_logger, init_logger, LoggerInitError},
    Size,
};

pub use resample::{ResampleError, ResizeMode, VideoResampler};

/// The receive-frame capability.
///
/// A track holds on to any number of these and calls them for every decoded
/// frame, on whatever thread the track delivers from.
pub trait VideoSink: Sync + Send {
    fn on_frame(&self, frame: &VideoFrame);
}

/// A source of decoded video frames owned by the RTC framework.
pub trait VideoTrack: Sync + Send {
    fn id(&self) -> &str;

    /// Subscribes a sink to frame delivery.
    fn add_sink(&self, sink: Arc<dyn VideoSink>);

    /// Unsubscribes a sink previously passed to `add_sink`. Sinks are
    /// identified by the address of their allocation.
    fn remove_sink(&self, sink: &Arc<dyn VideoSink>);
}

/// The host view a track is attached to.
///
/// The streamer only uses it to tag events with the texture they belong to.
pub trait VideoRenderer: Sync + Send {
    fn texture_id(&self) -> i64;

    /// The track currently rendered, if any.
    fn video_track(&self) -> Option<Arc<dyn VideoTrack>>;
}

/// Whether two sink handles point at the same sink.
pub fn is_same_sink(a: &Arc<dyn VideoSink>, b: &Arc<dyn VideoSink>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
