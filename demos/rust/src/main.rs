use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::Result;
use bytes::Bytes;
use clap::Parser;
use framestream::{
    enable_panic_logger, init_logger, FrameErrorEvent, FrameEvent, FrameEventSink,
    FrameStreamer, FrameStreamerOptions, LocalVideoTrack, QueuedSink, ResizeMode, VideoBuffer,
    VideoFrame, VideoRenderer, VideoRotation, VideoTrack,
};

use log::LevelFilter;
use serde_json::json;

#[derive(Debug, Parser)]
#[command(
    about = "Streams synthetic video frames through a frame streamer and logs the events.",
    version = env!("CARGO_PKG_VERSION"),
)]
struct Configure {
    /// Target width, 0 together with a zero height keeps the source size.
    #[arg(long, env = "FRAMESTREAM_WIDTH", default_value_t = 640)]
    width: u32,
    #[arg(long, env = "FRAMESTREAM_HEIGHT", default_value_t = 640)]
    height: u32,
    /// Maximum events per second, 0 is unthrottled.
    #[arg(long, env = "FRAMESTREAM_FPS", default_value_t = 15)]
    fps: u32,
    /// crop, letterbox or stretch.
    #[arg(long, env = "FRAMESTREAM_MODE", default_value_t = ResizeMode::Crop)]
    mode: ResizeMode,
    #[arg(long, env = "FRAMESTREAM_SOURCE_WIDTH", default_value_t = 1280)]
    source_width: u32,
    #[arg(long, env = "FRAMESTREAM_SOURCE_HEIGHT", default_value_t = 720)]
    source_height: u32,
    #[arg(long, env = "FRAMESTREAM_SOURCE_FPS", default_value_t = 60)]
    source_fps: u32,
    /// How long to stream, in seconds.
    #[arg(long, env = "FRAMESTREAM_DURATION", default_value_t = 3)]
    duration: u64,
    /// Dispatch events on a separate thread instead of the media thread.
    #[arg(long, env = "FRAMESTREAM_QUEUED")]
    queued: bool,
    #[arg(long, env = "FRAMESTREAM_LOG_LEVEL", default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,
    /// Directory for daily rotated log files.
    #[arg(long, env = "FRAMESTREAM_LOG_PATH")]
    log_path: Option<String>,
}

struct DemoRenderer {
    track: Arc<LocalVideoTrack>,
}

impl VideoRenderer for DemoRenderer {
    fn texture_id(&self) -> i64 {
        0
    }

    fn video_track(&self) -> Option<Arc<dyn VideoTrack>> {
        Some(self.track.clone() as Arc<dyn VideoTrack>)
    }
}

#[derive(Default)]
struct LogSink {
    events: AtomicU64,
    errors: AtomicU64,
}

impl FrameEventSink for LogSink {
    fn frame(&self, event: FrameEvent) {
        self.events.fetch_add(1, Ordering::Relaxed);

        let bytes = event.buffer.data.iter().map(|it| it.len()).sum::<usize>();
        match serde_json::to_value(&event) {
            Ok(mut value) => {
                // Log the payload size instead of the pixels.
                value["buffer"] = json!(bytes);

                log::info!("{}", value);
            }
            Err(e) => log::error!("failed to serialize frame event, error={:?}", e),
        }
    }

    fn error(&self, event: FrameErrorEvent) {
        self.errors.fetch_add(1, Ordering::Relaxed);

        match serde_json::to_string(&event) {
            Ok(it) => log::error!("{}", it),
            Err(e) => log::error!("failed to serialize frame error event, error={:?}", e),
        }
    }
}

// A diagonal luma ramp that moves one pixel per frame.
fn synthetic_frame(width: u32, height: u32, index: u64, timestamp_us: i64) -> Result<VideoFrame> {
    let chroma_width = width.div_ceil(2);
    let chroma_size = (chroma_width * height.div_ceil(2)) as usize;

    let mut y = Vec::with_capacity((width * height) as usize);
    for row in 0..height as u64 {
        y.extend((0..width as u64).map(|column| (row + column + index) as u8));
    }

    let buffer = VideoBuffer::i420(
        width,
        height,
        Bytes::from(y),
        Bytes::from(vec![128u8; chroma_size]),
        Bytes::from(vec![128u8; chroma_size]),
        [width, chroma_width, chroma_width],
    )?;

    Ok(VideoFrame::new(buffer, VideoRotation::Rotation0, timestamp_us))
}

fn main() -> Result<()> {
    let configure = Configure::parse();

    init_logger(configure.log_level, configure.log_path.as_deref())?;
    enable_panic_logger();

    let track = Arc::new(LocalVideoTrack::new("synthetic"));
    let renderer = Arc::new(DemoRenderer {
        track: track.clone(),
    });

    let sink = Arc::new(LogSink::default());
    let options = FrameStreamerOptions {
        width: configure.width,
        height: configure.height,
        fps: configure.fps,
        mode: configure.mode,
    };

    let events: Arc<dyn FrameEventSink> = if configure.queued {
        Arc::new(QueuedSink::new(sink.clone(), 8)?)
    } else {
        sink.clone()
    };

    let streamer = FrameStreamer::new(renderer.clone(), track.clone(), events, options)?;

    // The media thread, standing in for the RTC framework's decoder output.
    let working = Arc::new(AtomicBool::new(true));
    let producer = {
        let (width, height) = (configure.source_width, configure.source_height);
        let interval = Duration::from_secs(1) / configure.source_fps.max(1);
        let working = working.clone();
        let track = track.clone();

        thread::Builder::new()
            .name("FrameStreamDemoProducerThread".to_string())
            .spawn(move || -> Result<()> {
                let started = Instant::now();
                let mut index = 0;

                while working.load(Ordering::Relaxed) {
                    let timestamp = started.elapsed().as_micros() as i64;
                    track.deliver(&synthetic_frame(width, height, index, timestamp)?);

                    index += 1;
                    thread::sleep(interval);
                }

                log::info!("producer stopped after {} frames", index);
                Ok(())
            })?
    };

    streamer.start()?;
    thread::sleep(Duration::from_secs(configure.duration));
    streamer.stop();

    working.store(false, Ordering::Relaxed);
    match producer.join() {
        Ok(Err(e)) => log::error!("producer thread error: {:?}", e),
        Err(e) => log::error!("producer thread panicked: {:?}", e),
        _ => (),
    }

    let stats = streamer.stats();
    drop(streamer);

    log::info!(
        "received={}, emitted={}, throttled={}, failed={}, sink events={}, sink errors={}",
        stats.received,
        stats.emitted,
        stats.throttled,
        stats.failed,
        sink.events.load(Ordering::Relaxed),
        sink.errors.load(Ordering::Relaxed),
    );

    Ok(())
}
