use common::frame::{VideoBuffer, VideoFormat, VideoRotation};

#[cfg(feature = "serde")]
use serde::Serialize;

/// One frame accepted for emission.
///
/// Field order is part of the contract: with the `serde` feature the event
/// serialises as a map with the fields in declaration order.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct FrameEvent {
    /// Texture of the renderer the streamer was created for.
    pub texture_id: i64,
    /// Size of `buffer`, the target size when resizing is enabled.
    pub width: u32,
    pub height: u32,
    /// Size of the frame as delivered by the track, for mapping coordinates
    /// back onto the source.
    pub src_width: u32,
    pub src_height: u32,
    pub rotation: VideoRotation,
    pub timestamp_us: i64,
    pub format: VideoFormat,
    pub buffer: VideoBuffer,
}

/// A frame that was accepted but could not be turned into an event.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct FrameErrorEvent {
    pub texture_id: i64,
    pub timestamp_us: i64,
    pub src_width: u32,
    pub src_height: u32,
    pub format: VideoFormat,
    pub message: String,
}
