use std::{
    io::Error,
    sync::{atomic::AtomicU64, Arc},
    thread::{self, JoinHandle},
};

use common::atomic::{increment, EasyAtomic};
use crossbeam::channel::{bounded, Sender, TrySendError};

use crate::events::{FrameErrorEvent, FrameEvent};

/// Consumer of frame events.
///
/// Both callbacks run synchronously on the track's delivery thread. Keep them
/// short: a slow sink holds up the media pipeline, and a `stop` issued from
/// another thread waits for the running callback to return. Wrap the sink in
/// a [`QueuedSink`] when the consumer may block.
pub trait FrameEventSink: Sync + Send {
    fn frame(&self, event: FrameEvent);

    /// A frame was accepted but dropped because it could not be processed.
    #[allow(unused_variables)]
    fn error(&self, event: FrameErrorEvent) {}
}

impl<T: FrameEventSink + ?Sized> FrameEventSink for Arc<T> {
    fn frame(&self, event: FrameEvent) {
        self.as_ref().frame(event)
    }

    fn error(&self, event: FrameErrorEvent) {
        self.as_ref().error(event)
    }
}

/// Adapts a closure into a sink that ignores error events.
pub struct FnSink<F>(pub F);

impl<F> FrameEventSink for FnSink<F>
where
    F: Fn(FrameEvent) + Sync + Send,
{
    fn frame(&self, event: FrameEvent) {
        (self.0)(event)
    }
}

pub enum SinkEvent {
    Frame(FrameEvent),
    Error(FrameErrorEvent),
}

/// Moves events off the delivery thread.
///
/// Events go through a bounded queue to a dedicated dispatch thread that
/// calls the wrapped sink. When the queue is full the event is dropped, the
/// delivery thread never waits for the consumer.
///
/// Events already queued when the streamer stops are still dispatched.
/// Dropping the queued sink closes the queue, lets the dispatch thread drain
/// it and joins the thread.
pub struct QueuedSink {
    tx: Option<Sender<SinkEvent>>,
    worker: Option<JoinHandle<()>>,
    dropped: AtomicU64,
}

impl QueuedSink {
    pub fn new<S: FrameEventSink + 'static>(sink: S, capacity: usize) -> Result<Self, Error> {
        let (tx, rx) = bounded::<SinkEvent>(capacity.max(1));

        let worker = thread::Builder::new()
            .name("FrameStreamSinkThread".to_string())
            .spawn(move || {
                while let Ok(event) = rx.recv() {
                    match event {
                        SinkEvent::Frame(event) => sink.frame(event),
                        SinkEvent::Error(event) => sink.error(event),
                    }
                }

                log::info!("queued sink dispatch thread is closed");
            })?;

        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
            dropped: AtomicU64::new(0),
        })
    }

    /// Number of events discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.get()
    }

    fn push(&self, event: SinkEvent) {
        if let Some(tx) = &self.tx {
            match tx.try_send(event) {
                Ok(()) => (),
                Err(TrySendError::Full(_)) => {
                    increment(&self.dropped);

                    log::debug!("queued sink is full, event dropped");
                }
                Err(TrySendError::Disconnected(_)) => {
                    log::error!("queued sink dispatch thread has exited");
                }
            }
        }
    }
}

impl FrameEventSink for QueuedSink {
    fn frame(&self, event: FrameEvent) {
        self.push(SinkEvent::Frame(event));
    }

    fn error(&self, event: FrameErrorEvent) {
        self.push(SinkEvent::Error(event));
    }
}

impl Drop for QueuedSink {
    fn drop(&mut self) {
        drop(self.tx.take());

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("queued sink dispatch thread panicked");
            }
        }
    }
}
