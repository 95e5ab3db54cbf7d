use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64},
        Arc, Weak,
    },
    time::Instant,
};

use common::{
    atomic::{increment, EasyAtomic},
    frame::VideoFrame,
    Size,
};

use parking_lot::{Mutex, ReentrantMutex};
use resample::{ResizeMode, VideoResampler};
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    events::{FrameErrorEvent, FrameEvent},
    limiter::FrameRateLimiter,
    sink::FrameEventSink,
    VideoRenderer, VideoSink, VideoTrack,
};

#[derive(Debug, Error)]
pub enum FrameStreamerError {
    #[error("target width and height must both be set or both be zero, got {0}")]
    InvalidTargetSize(Size),
    #[error("video track has been released")]
    TrackReleased,
}

/// Streamer configuration, fixed at construction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FrameStreamerOptions {
    /// Target width, `0` together with `height == 0` keeps the source size.
    pub width: u32,
    pub height: u32,
    /// Emission rate cap, `0` is unthrottled.
    pub fps: u32,
    pub mode: ResizeMode,
}

impl FrameStreamerOptions {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Rejects a target size with exactly one side set.
    pub fn validate(&self) -> Result<(), FrameStreamerError> {
        let size = self.size();
        if size.is_empty() && !size.is_zero() {
            return Err(FrameStreamerError::InvalidTargetSize(size));
        }

        Ok(())
    }
}

/// Delivery counters since construction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStreamerStats {
    /// Frames delivered by the track while running.
    pub received: u64,
    /// Frames handed to the sink.
    pub emitted: u64,
    /// Frames dropped by the rate limit.
    pub throttled: u64,
    /// Frames dropped because they could not be resampled.
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    received: AtomicU64,
    emitted: AtomicU64,
    throttled: AtomicU64,
    failed: AtomicU64,
}

// The part registered on the track. The track keeps it alive for as long as it
// is subscribed, independently of the streamer handle.
struct StreamerSink<S> {
    texture_id: i64,
    running: AtomicBool,
    // Held for the whole of every delivery. `stop` takes it once after clearing
    // `running`, which is what makes it wait for an in-flight frame. Reentrant
    // so that a sink calling `stop` from inside its callback does not deadlock.
    delivery: ReentrantMutex<()>,
    limiter: Mutex<FrameRateLimiter>,
    resampler: Option<VideoResampler>,
    counters: Counters,
    sink: S,
}

impl<S: FrameEventSink> StreamerSink<S> {
    fn process(&self, frame: &VideoFrame) {
        let source = &frame.buffer;
        let buffer = match &self.resampler {
            Some(resampler) => match resampler.resample(source) {
                Ok(buffer) => buffer,
                Err(e) => {
                    increment(&self.counters.failed);

                    log::warn!(
                        "frame streamer resample error, texture={}, source={}x{}, error={}",
                        self.texture_id,
                        source.width,
                        source.height,
                        e
                    );

                    self.sink.error(FrameErrorEvent {
                        texture_id: self.texture_id,
                        timestamp_us: frame.timestamp_us,
                        src_width: source.width,
                        src_height: source.height,
                        format: source.format,
                        message: e.to_string(),
                    });

                    return;
                }
            },
            None => source.clone(),
        };

        increment(&self.counters.emitted);

        self.sink.frame(FrameEvent {
            texture_id: self.texture_id,
            width: buffer.width,
            height: buffer.height,
            src_width: source.width,
            src_height: source.height,
            rotation: frame.rotation,
            timestamp_us: frame.timestamp_us,
            format: buffer.format,
            buffer,
        });
    }
}

impl<S: FrameEventSink> VideoSink for StreamerSink<S> {
    fn on_frame(&self, frame: &VideoFrame) {
        let _delivery = self.delivery.lock();
        if !self.running.get() {
            return;
        }

        increment(&self.counters.received);

        if !self.limiter.lock().check(Instant::now()) {
            increment(&self.counters.throttled);
            return;
        }

        self.process(frame);
    }
}

/// Attaches to a video track and forwards its frames to a [`FrameEventSink`].
///
/// The streamer is created stopped. Between [`start`](Self::start) and
/// [`stop`](Self::stop) every frame the track delivers is rate limited,
/// resized to the target size if one is set, and handed to the sink on the
/// track's delivery thread. Only weak references to the track and renderer
/// are kept. Dropping the streamer stops it.
pub struct FrameStreamer<S: FrameEventSink + 'static> {
    options: FrameStreamerOptions,
    track_id: String,
    track: Weak<dyn VideoTrack>,
    renderer: Weak<dyn VideoRenderer>,
    // Serialises start and stop.
    control: Mutex<()>,
    inner: Arc<StreamerSink<S>>,
    handle: Arc<dyn VideoSink>,
}

impl<S: FrameEventSink + 'static> FrameStreamer<S> {
    /// Stores the configuration, nothing is subscribed until `start`.
    pub fn new(
        renderer: Arc<dyn VideoRenderer>,
        track: Arc<dyn VideoTrack>,
        sink: S,
        options: FrameStreamerOptions,
    ) -> Result<Self, FrameStreamerError> {
        options.validate()?;

        let size = options.size();
        let texture_id = renderer.texture_id();
        let inner = Arc::new(StreamerSink {
            resampler: (!size.is_zero()).then(|| VideoResampler::new(size, options.mode)),
            limiter: Mutex::new(FrameRateLimiter::new(options.fps)),
            delivery: ReentrantMutex::new(()),
            running: AtomicBool::new(false),
            counters: Counters::default(),
            texture_id,
            sink,
        });

        log::info!(
            "create frame streamer, texture={}, track={}, options={:?}",
            texture_id,
            track.id(),
            options
        );

        Ok(Self {
            track_id: track.id().to_string(),
            track: Arc::downgrade(&track),
            renderer: Arc::downgrade(&renderer),
            control: Mutex::new(()),
            handle: inner.clone(),
            options,
            inner,
        })
    }

    /// Subscribes to the track. Does nothing if already running.
    pub fn start(&self) -> Result<(), FrameStreamerError> {
        let _control = self.control.lock();
        if self.inner.running.get() {
            return Ok(());
        }

        let track = self
            .track
            .upgrade()
            .ok_or(FrameStreamerError::TrackReleased)?;

        self.inner.limiter.lock().reset();
        self.inner.running.set(true);
        track.add_sink(self.handle.clone());

        log::info!(
            "frame streamer started, texture={}, track={}, target={}, fps={}",
            self.inner.texture_id,
            self.track_id,
            self.options.size(),
            self.options.fps
        );

        Ok(())
    }

    /// Unsubscribes from the track. Does nothing if not running.
    ///
    /// When a frame is being delivered on another thread this blocks until
    /// that delivery has returned, so the sink is not called again once `stop`
    /// returns. Called from inside the sink it returns right away and the
    /// current callback is the last one.
    pub fn stop(&self) {
        {
            let _control = self.control.lock();
            if !EasyAtomic::update(&self.inner.running, false) {
                return;
            }

            if let Some(track) = self.track.upgrade() {
                track.remove_sink(&self.handle);
            }
        }

        // The control lock is released first: a sink that calls `stop` while
        // this thread waits here finds the streamer already stopped.
        drop(self.inner.delivery.lock());

        log::info!(
            "frame streamer stopped, texture={}, track={}",
            self.inner.texture_id,
            self.track_id
        );
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }

    pub fn options(&self) -> &FrameStreamerOptions {
        &self.options
    }

    pub fn texture_id(&self) -> i64 {
        self.inner.texture_id
    }

    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    pub fn renderer(&self) -> Option<Arc<dyn VideoRenderer>> {
        self.renderer.upgrade()
    }

    pub fn stats(&self) -> FrameStreamerStats {
        let counters = &self.inner.counters;

        FrameStreamerStats {
            received: counters.received.get(),
            emitted: counters.emitted.get(),
            throttled: counters.throttled.get(),
            failed: counters.failed.get(),
        }
    }
}

impl<S: FrameEventSink + 'static> Drop for FrameStreamer<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
