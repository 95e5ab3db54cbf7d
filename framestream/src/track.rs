use std::sync::Arc;

use common::frame::VideoFrame;
use parking_lot::RwLock;

use crate::{is_same_sink, VideoSink, VideoTrack};

/// An in-process video track.
///
/// Whoever produces frames calls [`LocalVideoTrack::deliver`] and every
/// subscribed sink sees the frame on that same thread. The sink list is
/// copied before delivery, so adding or removing sinks never waits for a
/// delivery in progress and a sink removed mid-delivery may still see that
/// one frame.
pub struct LocalVideoTrack {
    id: String,
    sinks: RwLock<Vec<Arc<dyn VideoSink>>>,
}

impl LocalVideoTrack {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sinks: RwLock::new(Vec::new()),
        }
    }

    pub fn deliver(&self, frame: &VideoFrame) {
        let sinks = self.sinks.read().clone();
        for sink in sinks.iter() {
            sink.on_frame(frame);
        }
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.read().len()
    }
}

impl VideoTrack for LocalVideoTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn add_sink(&self, sink: Arc<dyn VideoSink>) {
        let mut sinks = self.sinks.write();
        if !sinks.iter().any(|it| is_same_sink(it, &sink)) {
            sinks.push(sink);

            log::debug!("track add sink, id={}, sinks={}", self.id, sinks.len());
        }
    }

    fn remove_sink(&self, sink: &Arc<dyn VideoSink>) {
        let mut sinks = self.sinks.write();
        sinks.retain(|it| !is_same_sink(it, sink));

        log::debug!("track remove sink, id={}, sinks={}", self.id, sinks.len());
    }
}
