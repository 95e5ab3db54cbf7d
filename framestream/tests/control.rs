use std::{
    collections::HashMap,
    sync::{mpsc, Arc},
    thread,
    time::Duration,
};

use framestream::{
    ControlError, FrameEvent, FrameEventSink, FrameStreamController, LocalVideoTrack,
    RendererRegistry, ResizeMode, StartFrameStreamRequest, VideoBuffer, VideoFormat, VideoFrame,
    VideoRenderer, VideoRotation, VideoTrack, START_FRAME_STREAM_METHOD,
    STOP_FRAME_STREAM_METHOD,
};

use parking_lot::Mutex;
use serde_json::{json, Value};

struct Renderer {
    texture_id: i64,
    track: Option<Arc<LocalVideoTrack>>,
}

impl VideoRenderer for Renderer {
    fn texture_id(&self) -> i64 {
        self.texture_id
    }

    fn video_track(&self) -> Option<Arc<dyn VideoTrack>> {
        self.track.clone().map(|it| it as Arc<dyn VideoTrack>)
    }
}

struct Registry(HashMap<i64, Arc<Renderer>>);

impl RendererRegistry for Registry {
    fn get_renderer(&self, texture_id: i64) -> Option<Arc<dyn VideoRenderer>> {
        self.0
            .get(&texture_id)
            .cloned()
            .map(|it| it as Arc<dyn VideoRenderer>)
    }
}

#[derive(Default)]
struct Recorder(Mutex<Vec<FrameEvent>>);

impl FrameEventSink for Recorder {
    fn frame(&self, event: FrameEvent) {
        self.0.lock().push(event);
    }
}

struct Fixture {
    controller: FrameStreamController<Registry>,
    camera: Arc<LocalVideoTrack>,
    screen: Arc<LocalVideoTrack>,
}

// Texture 1 renders the camera, 2 renders the screen, 3 has no track.
fn fixture() -> Fixture {
    let camera = Arc::new(LocalVideoTrack::new("camera"));
    let screen = Arc::new(LocalVideoTrack::new("screen"));

    let mut renderers = HashMap::new();
    for (texture_id, track) in [(1, Some(camera.clone())), (2, Some(screen.clone())), (3, None)] {
        renderers.insert(texture_id, Arc::new(Renderer { texture_id, track }));
    }

    Fixture {
        controller: FrameStreamController::new(Registry(renderers)),
        camera,
        screen,
    }
}

fn request(texture_id: i64) -> StartFrameStreamRequest {
    StartFrameStreamRequest {
        texture_id,
        width: 32,
        height: 32,
        fps: 0,
        mode: ResizeMode::Letterbox,
    }
}

fn frame() -> VideoFrame {
    VideoFrame::new(
        VideoBuffer::black(VideoFormat::I420, 64, 48),
        VideoRotation::Rotation0,
        0,
    )
}

#[test]
fn start_requires_listening_sink() {
    let fixture = fixture();
    let error = fixture
        .controller
        .start_texture_frame_stream(request(1))
        .unwrap_err();

    assert_eq!(error.code(), "NO_EVENT");
    assert!(!fixture.controller.is_streaming());
}

#[test]
fn start_reports_missing_renderer_and_track() {
    let fixture = fixture();
    fixture.controller.listen(Arc::new(Recorder::default()));

    let missing = fixture.controller.start_texture_frame_stream(request(9));
    assert!(matches!(missing, Err(ControlError::NoRenderer(9))));

    let no_track = fixture.controller.start_texture_frame_stream(request(3));
    assert!(matches!(no_track, Err(ControlError::NoTrack(3))));
}

#[test]
fn half_target_size_is_an_argument_error() {
    let fixture = fixture();
    fixture.controller.listen(Arc::new(Recorder::default()));
    fixture
        .controller
        .start_texture_frame_stream(request(1))
        .unwrap();

    let error = fixture
        .controller
        .start_texture_frame_stream(StartFrameStreamRequest {
            height: 0,
            ..request(2)
        })
        .unwrap_err();

    assert_eq!(error.code(), "INVALID_ARGS");

    // The rejected request leaves the active stream alone.
    assert!(fixture.controller.is_streaming());
    assert_eq!(fixture.camera.sink_count(), 1);
    assert_eq!(fixture.screen.sink_count(), 0);

    let invalid = fixture
        .controller
        .on_method_call(
            START_FRAME_STREAM_METHOD,
            &json!({ "textureId": 1, "width": 0, "height": 16, "fps": 0 }),
        )
        .unwrap_err();
    assert_eq!(invalid.code(), "INVALID_ARGS");
}

#[test]
fn streams_resized_frames_to_listener() {
    let fixture = fixture();
    let recorder = Arc::new(Recorder::default());
    fixture.controller.listen(recorder.clone());

    fixture
        .controller
        .start_texture_frame_stream(request(1))
        .unwrap();

    assert!(fixture.controller.is_streaming());

    fixture.camera.deliver(&frame());

    let events = recorder.0.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].texture_id, 1);
    assert_eq!((events[0].width, events[0].height), (32, 32));
    assert_eq!((events[0].src_width, events[0].src_height), (64, 48));
}

#[test]
fn new_stream_replaces_the_active_one() {
    let fixture = fixture();
    let recorder = Arc::new(Recorder::default());
    fixture.controller.listen(recorder.clone());

    fixture
        .controller
        .start_texture_frame_stream(request(1))
        .unwrap();
    fixture
        .controller
        .start_texture_frame_stream(request(2))
        .unwrap();

    assert_eq!(fixture.camera.sink_count(), 0);
    assert_eq!(fixture.screen.sink_count(), 1);

    fixture.camera.deliver(&frame());
    fixture.screen.deliver(&frame());

    let events = recorder.0.lock();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].texture_id, 2);
}

#[test]
fn cancel_stops_streaming() {
    let fixture = fixture();
    fixture.controller.listen(Arc::new(Recorder::default()));
    fixture
        .controller
        .start_texture_frame_stream(request(1))
        .unwrap();

    fixture.controller.cancel();

    assert!(!fixture.controller.is_streaming());
    assert_eq!(fixture.camera.sink_count(), 0);
    assert_eq!(
        fixture
            .controller
            .start_texture_frame_stream(request(1))
            .unwrap_err()
            .code(),
        "NO_EVENT"
    );
}

#[test]
fn method_calls_drive_the_stream() {
    let fixture = fixture();
    fixture.controller.listen(Arc::new(Recorder::default()));

    let started = fixture.controller.on_method_call(
        START_FRAME_STREAM_METHOD,
        &json!({ "textureId": 1, "width": 16, "height": 16, "fps": 30, "mode": "stretch" }),
    );

    assert_eq!(started.unwrap(), Value::Bool(true));
    assert_eq!(fixture.camera.sink_count(), 1);

    let stopped = fixture
        .controller
        .on_method_call(STOP_FRAME_STREAM_METHOD, &Value::Null);

    assert_eq!(stopped.unwrap(), Value::Bool(true));
    assert_eq!(fixture.camera.sink_count(), 0);
}

#[test]
fn method_call_errors_carry_codes() {
    let fixture = fixture();
    fixture.controller.listen(Arc::new(Recorder::default()));

    let invalid = fixture
        .controller
        .on_method_call(START_FRAME_STREAM_METHOD, &json!({ "textureId": 1 }))
        .unwrap_err();
    assert_eq!(invalid.code(), "INVALID_ARGS");

    let unknown = fixture
        .controller
        .on_method_call("pauseTextureFrameStream", &Value::Null)
        .unwrap_err();
    assert_eq!(unknown.code(), "NOT_IMPLEMENTED");
}

#[test]
fn stop_without_stream_is_fine() {
    let fixture = fixture();

    fixture.controller.stop_texture_frame_stream();
    fixture.controller.dispose();

    assert!(!fixture.controller.is_streaming());
}

// A sink that queries the controller from inside its callback.
struct Querying {
    controller: Mutex<Option<Arc<FrameStreamController<Registry>>>>,
    entered: Mutex<mpsc::Sender<()>>,
    observed: Mutex<Option<bool>>,
}

impl FrameEventSink for Querying {
    fn frame(&self, _: FrameEvent) {
        let _ = self.entered.lock().send(());

        // Give the control thread time to start stopping the stream.
        thread::sleep(Duration::from_millis(200));

        let controller = self.controller.lock().clone();
        if let Some(controller) = controller {
            self.observed.lock().replace(controller.is_streaming());
        }
    }
}

#[test]
fn stop_while_sink_calls_back_into_controller() {
    let Fixture {
        controller, camera, ..
    } = fixture();

    let controller = Arc::new(controller);
    let (entered_tx, entered_rx) = mpsc::channel();
    let sink = Arc::new(Querying {
        controller: Mutex::new(Some(controller.clone())),
        entered: Mutex::new(entered_tx),
        observed: Mutex::new(None),
    });

    controller.listen(sink.clone());
    controller.start_texture_frame_stream(request(1)).unwrap();

    let (done_tx, done_rx) = mpsc::channel();

    let media = {
        let camera = camera.clone();
        let done_tx = done_tx.clone();

        thread::spawn(move || {
            camera.deliver(&frame());
            let _ = done_tx.send("media");
        })
    };

    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    let control = {
        let controller = controller.clone();

        thread::spawn(move || {
            controller.stop_texture_frame_stream();
            let _ = done_tx.send("control");
        })
    };

    let mut finished = vec![
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        done_rx.recv_timeout(Duration::from_secs(5)).unwrap(),
    ];

    finished.sort();
    assert_eq!(finished, vec!["control", "media"]);

    media.join().unwrap();
    control.join().unwrap();

    assert!(sink.observed.lock().is_some());
    assert!(!controller.is_streaming());
    assert_eq!(camera.sink_count(), 0);

    sink.controller.lock().take();
}
