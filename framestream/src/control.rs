use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use resample::ResizeMode;
use serde_json::Value;
use thiserror::Error;

use crate::{
    sink::FrameEventSink,
    streamer::{FrameStreamer, FrameStreamerError, FrameStreamerOptions},
    VideoRenderer,
};

pub const START_FRAME_STREAM_METHOD: &str = "startTextureFrameStream";
pub const STOP_FRAME_STREAM_METHOD: &str = "stopTextureFrameStream";

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("frame event sink is not listening")]
    NoEventSink,
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("renderer not found for texture id: {0}")]
    NoRenderer(i64),
    #[error("video track not attached to renderer: {0}")]
    NoTrack(i64),
    #[error("method not implemented: {0}")]
    NotImplemented(String),
    #[error(transparent)]
    StartFailed(#[from] FrameStreamerError),
}

impl ControlError {
    /// Stable error code reported back to the host.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoEventSink => "NO_EVENT",
            Self::InvalidArgs(_) => "INVALID_ARGS",
            Self::NoRenderer(_) => "NO_RENDERER",
            Self::NoTrack(_) => "NO_TRACK",
            Self::NotImplemented(_) => "NOT_IMPLEMENTED",
            Self::StartFailed(_) => "START_FAILED",
        }
    }
}

/// Looks renderers up by the texture they draw into.
pub trait RendererRegistry: Sync + Send {
    fn get_renderer(&self, texture_id: i64) -> Option<Arc<dyn VideoRenderer>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartFrameStreamRequest {
    pub texture_id: i64,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub mode: ResizeMode,
}

impl StartFrameStreamRequest {
    /// Reads the request from method call arguments:
    /// `{ "textureId", "width", "height", "fps", "mode"? }`.
    pub fn from_args(args: &Value) -> Result<Self, ControlError> {
        let number = |key: &str| {
            args.get(key)
                .and_then(Value::as_u64)
                .and_then(|it| u32::try_from(it).ok())
                .ok_or_else(|| ControlError::InvalidArgs(format!("missing or invalid {}", key)))
        };

        let mode = match args.get("mode") {
            None | Some(Value::Null) => ResizeMode::default(),
            Some(value) => value
                .as_str()
                .and_then(|it| it.parse::<ResizeMode>().ok())
                .ok_or_else(|| ControlError::InvalidArgs(format!("unknown mode {}", value)))?,
        };

        Ok(Self {
            texture_id: args
                .get("textureId")
                .and_then(Value::as_i64)
                .ok_or_else(|| ControlError::InvalidArgs("missing or invalid textureId".into()))?,
            width: number("width")?,
            height: number("height")?,
            fps: number("fps")?,
            mode,
        })
    }

    pub fn options(&self) -> FrameStreamerOptions {
        FrameStreamerOptions {
            width: self.width,
            height: self.height,
            fps: self.fps,
            mode: self.mode,
        }
    }
}

/// Host side control of frame streaming.
///
/// Keeps at most one active stream. The consumer attaches with
/// [`listen`](Self::listen), then streams are started per renderer texture
/// and all of them report into that one sink.
pub struct FrameStreamController<R> {
    registry: R,
    sink: RwLock<Option<Arc<dyn FrameEventSink>>>,
    streamer: Mutex<Option<FrameStreamer<Arc<dyn FrameEventSink>>>>,
}

impl<R: RendererRegistry> FrameStreamController<R> {
    pub fn new(registry: R) -> Self {
        Self {
            registry,
            sink: RwLock::new(None),
            streamer: Mutex::new(None),
        }
    }

    /// Attaches the consumer that receives the events of every stream started
    /// from now on.
    pub fn listen(&self, sink: Arc<dyn FrameEventSink>) {
        log::info!("frame stream controller listen, setting event sink");

        self.sink.write().replace(sink);
    }

    /// Detaches the consumer and stops the active stream, if any.
    pub fn cancel(&self) {
        log::info!("frame stream controller cancel, clearing event sink");

        self.sink.write().take();
        self.stop_texture_frame_stream();
    }

    pub fn start_texture_frame_stream(
        &self,
        request: StartFrameStreamRequest,
    ) -> Result<(), ControlError> {
        let options = request.options();
        options
            .validate()
            .map_err(|e| ControlError::InvalidArgs(e.to_string()))?;

        let sink = self
            .sink
            .read()
            .clone()
            .ok_or(ControlError::NoEventSink)?;

        let renderer = self
            .registry
            .get_renderer(request.texture_id)
            .ok_or(ControlError::NoRenderer(request.texture_id))?;

        // Stopping waits for an in-flight delivery, whose sink may call back into
        // the controller, so the previous streamer is dropped outside the lock.
        self.stop_texture_frame_stream();

        let track = renderer
            .video_track()
            .ok_or(ControlError::NoTrack(request.texture_id))?;

        let created = FrameStreamer::new(renderer, track, sink, options)?;
        created.start()?;

        let previous = self.streamer.lock().replace(created);
        drop(previous);

        Ok(())
    }

    pub fn stop_texture_frame_stream(&self) {
        let streamer = self.streamer.lock().take();
        drop(streamer);
    }

    pub fn is_streaming(&self) -> bool {
        self.streamer
            .lock()
            .as_ref()
            .map(|it| it.is_running())
            .unwrap_or(false)
    }

    /// Dispatches a method call received from the host.
    pub fn on_method_call(&self, method: &str, args: &Value) -> Result<Value, ControlError> {
        match method {
            START_FRAME_STREAM_METHOD => {
                self.start_texture_frame_stream(StartFrameStreamRequest::from_args(args)?)?;
            }
            STOP_FRAME_STREAM_METHOD => self.stop_texture_frame_stream(),
            _ => return Err(ControlError::NotImplemented(method.to_string())),
        }

        Ok(Value::Bool(true))
    }

    /// Stops streaming and drops the consumer.
    pub fn dispose(&self) {
        self.cancel();
    }
}
