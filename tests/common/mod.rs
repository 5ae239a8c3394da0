//! Scripted collaborators shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use murmur::audio::{AudioSink, AudioStream, Clip, DeviceLease, Microphone};
use murmur::integration::{OrchestratorBuilder, SessionConfig};
use murmur::llm::{ResponseStreamer, TextChunk, TextStream};
use murmur::room::{LocalTrack, RoomConnection, RoomSignal, RoomTransport};
use murmur::speech::{SpeechSynthesizer, Transcriber, Transcript, TranscriptOutcome};
use murmur::{MurmurError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Microphone

#[derive(Default)]
pub struct FakeMicrophone {
    pub acquires: AtomicUsize,
    pub releases: Arc<AtomicUsize>,
    pub fail: bool,
}

impl FakeMicrophone {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn acquires(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }
}

struct FakeLease {
    releases: Arc<AtomicUsize>,
    _frames: mpsc::UnboundedSender<Vec<f32>>,
}

impl DeviceLease for FakeLease {
    fn sample_rate(&self) -> u32 {
        16000
    }

    fn release(self: Box<Self>) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Microphone for FakeMicrophone {
    async fn acquire(
        &self,
        frames: mpsc::UnboundedSender<Vec<f32>>,
    ) -> Result<Box<dyn DeviceLease>> {
        if self.fail {
            return Err(MurmurError::DeviceUnavailable("permission denied".into()));
        }
        self.acquires.fetch_add(1, Ordering::SeqCst);
        // 100 ms of a quiet tone
        let _ = frames.send(vec![0.1; 1600]);
        Ok(Box::new(FakeLease {
            releases: Arc::clone(&self.releases),
            _frames: frames,
        }))
    }
}

// ---------------------------------------------------------------------------
// Transcriber

pub enum TranscriberScript {
    Text(&'static str),
    Empty,
    Fail,
    Hang,
}

pub struct ScriptedTranscriber {
    script: TranscriberScript,
    pub calls: AtomicUsize,
    pub clip_bytes: AtomicUsize,
}

impl ScriptedTranscriber {
    pub fn new(script: TranscriberScript) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            clip_bytes: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, clip: Clip) -> Result<TranscriptOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.clip_bytes.store(clip.len(), Ordering::SeqCst);
        match self.script {
            TranscriberScript::Text(text) => Ok(TranscriptOutcome::Transcribed(Transcript {
                text: text.to_string(),
                confidence: Some(0.9),
                is_final: true,
            })),
            TranscriberScript::Empty => Ok(TranscriptOutcome::Empty),
            TranscriberScript::Fail => {
                Err(MurmurError::TranscriptionFailed("HTTP 502: bad gateway".into()))
            }
            TranscriberScript::Hang => futures::future::pending().await,
        }
    }
}

// ---------------------------------------------------------------------------
// Responder

pub struct ScriptedResponder {
    chunks: Vec<&'static str>,
    fail_at_end: bool,
    hang_at_end: bool,
    pub calls: AtomicUsize,
    pub messages: Mutex<Vec<String>>,
}

impl ScriptedResponder {
    pub fn new(chunks: &[&'static str]) -> Self {
        Self {
            chunks: chunks.to_vec(),
            fail_at_end: false,
            hang_at_end: false,
            calls: AtomicUsize::new(0),
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Yield the chunks, then fail mid-stream
    pub fn failing_after(chunks: &[&'static str]) -> Self {
        Self {
            fail_at_end: true,
            ..Self::new(chunks)
        }
    }

    /// Yield the chunks, then never finish
    pub fn hanging_after(chunks: &[&'static str]) -> Self {
        Self {
            hang_at_end: true,
            ..Self::new(chunks)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ResponseStreamer for ScriptedResponder {
    fn stream_response(&self, message: &str, _cancel: CancellationToken) -> TextStream {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.messages.lock().push(message.to_string());

        let chunks: Vec<Result<TextChunk>> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(index, text)| {
                Ok(TextChunk {
                    index,
                    text: text.to_string(),
                })
            })
            .collect();
        let head = stream::iter(chunks);

        if self.fail_at_end {
            head.chain(stream::once(async {
                Err(MurmurError::GenerationFailed("stream interrupted".into()))
            }))
            .boxed()
        } else if self.hang_at_end {
            head.chain(stream::pending()).boxed()
        } else {
            head.boxed()
        }
    }
}

// ---------------------------------------------------------------------------
// Synthesizer

pub struct ScriptedSynthesizer {
    chunks: Vec<Bytes>,
    fail_at_end: bool,
    hang_at_end: bool,
    failures_left: AtomicUsize,
    pub calls: AtomicUsize,
    pub texts: Mutex<Vec<String>>,
}

impl ScriptedSynthesizer {
    pub fn new(chunks: &[&'static [u8]]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| Bytes::from_static(c)).collect(),
            fail_at_end: false,
            hang_at_end: false,
            failures_left: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            texts: Mutex::new(Vec::new()),
        }
    }

    /// Yield the chunks, then fail; with no chunks the first item is the error
    pub fn failing_after(chunks: &[&'static [u8]]) -> Self {
        Self {
            fail_at_end: true,
            ..Self::new(chunks)
        }
    }

    /// Yield the chunks, then never finish
    pub fn hanging_after(chunks: &[&'static [u8]]) -> Self {
        Self {
            hang_at_end: true,
            ..Self::new(chunks)
        }
    }

    /// Fail the first synthesis outright, then behave like `new`
    pub fn failing_first_call(chunks: &[&'static [u8]]) -> Self {
        Self {
            failures_left: AtomicUsize::new(1),
            ..Self::new(chunks)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SpeechSynthesizer for ScriptedSynthesizer {
    fn synthesize(&self, text: &str, _cancel: CancellationToken) -> Result<AudioStream> {
        if text.trim().is_empty() {
            return Err(MurmurError::InvalidArgument("synthesis text is empty".into()));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.lock().push(text.to_string());

        let fail_now = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if fail_now {
            return Ok(stream::once(async {
                Err::<Bytes, _>(MurmurError::SynthesisFailed("HTTP 500: voice unavailable".into()))
            })
            .boxed());
        }

        let head = stream::iter(self.chunks.clone().into_iter().map(Ok));
        Ok(if self.fail_at_end {
            head.chain(stream::once(async {
                Err(MurmurError::SynthesisFailed("HTTP 500: voice unavailable".into()))
            }))
            .boxed()
        } else if self.hang_at_end {
            head.chain(stream::pending()).boxed()
        } else {
            head.boxed()
        })
    }
}

// ---------------------------------------------------------------------------
// Sink

#[derive(Default)]
pub struct RecordingSink {
    pub written: Mutex<Vec<u8>>,
    pub stops: AtomicUsize,
    pub hang_on_drain: bool,
    pub fail_write: bool,
    pub fail_drain: bool,
}

impl RecordingSink {
    pub fn hanging() -> Self {
        Self {
            hang_on_drain: true,
            ..Default::default()
        }
    }

    pub fn failing_write() -> Self {
        Self {
            fail_write: true,
            ..Default::default()
        }
    }

    pub fn failing_drain() -> Self {
        Self {
            fail_drain: true,
            ..Default::default()
        }
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn written(&self) -> Vec<u8> {
        self.written.lock().clone()
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn write(&self, chunk: &[u8]) -> Result<()> {
        if self.fail_write {
            return Err(MurmurError::PlaybackFailed("output stream closed".into()));
        }
        self.written.lock().extend_from_slice(chunk);
        Ok(())
    }

    async fn drain(&self) -> Result<()> {
        if self.hang_on_drain {
            futures::future::pending::<()>().await;
        }
        if self.fail_drain {
            return Err(MurmurError::Io("output device disconnected".into()));
        }
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Room

#[derive(Default)]
pub struct FakeRoomTransport {
    pub connects: AtomicUsize,
    pub fail: bool,
    pub connection: Arc<FakeRoomConnection>,
    signals: Mutex<Option<mpsc::UnboundedSender<RoomSignal>>>,
}

impl FakeRoomTransport {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn with_connection(connection: FakeRoomConnection) -> Self {
        Self {
            connection: Arc::new(connection),
            ..Default::default()
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Simulate the provider dropping the connection
    pub fn drop_connection(&self, reason: &str) {
        if let Some(signals) = self.signals.lock().take() {
            let _ = signals.send(RoomSignal::Disconnected {
                reason: reason.to_string(),
            });
        }
    }
}

#[async_trait]
impl RoomTransport for FakeRoomTransport {
    async fn connect(
        &self,
        _url: &str,
        token: &str,
    ) -> Result<(Arc<dyn RoomConnection>, mpsc::UnboundedReceiver<RoomSignal>)> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(MurmurError::RoomUnavailable("connection refused".into()));
        }
        self.connection.tokens.lock().push(token.to_string());

        let (tx, rx) = mpsc::unbounded_channel();
        *self.signals.lock() = Some(tx);
        Ok((Arc::clone(&self.connection) as Arc<dyn RoomConnection>, rx))
    }
}

#[derive(Default)]
pub struct FakeRoomConnection {
    pub published: Mutex<Vec<(String, String)>>,
    pub unpublished: Mutex<Vec<String>>,
    pub tokens: Mutex<Vec<String>>,
    pub closes: AtomicUsize,
    pub reject_publish: bool,
    pub hang_publish: bool,
    pub publish_attempts: AtomicUsize,
    next_sid: AtomicUsize,
    // Keeps frame receivers alive so relays are not closed early
    frames: Mutex<Vec<mpsc::Receiver<Bytes>>>,
}

impl FakeRoomConnection {
    pub fn rejecting() -> Self {
        Self {
            reject_publish: true,
            ..Default::default()
        }
    }

    /// A provider that never answers publish requests
    pub fn hanging() -> Self {
        Self {
            hang_publish: true,
            ..Default::default()
        }
    }

    pub fn publish_attempts(&self) -> usize {
        self.publish_attempts.load(Ordering::SeqCst)
    }

    pub fn published_names(&self) -> Vec<String> {
        self.published.lock().iter().map(|(_, name)| name.clone()).collect()
    }

    pub fn publish_count(&self) -> usize {
        self.published.lock().len()
    }

    pub fn unpublish_count(&self) -> usize {
        self.unpublished.lock().len()
    }
}

#[async_trait]
impl RoomConnection for FakeRoomConnection {
    async fn publish(&self, track: LocalTrack) -> Result<String> {
        self.publish_attempts.fetch_add(1, Ordering::SeqCst);
        if self.hang_publish {
            futures::future::pending::<()>().await;
        }
        if self.reject_publish {
            return Err(MurmurError::RoomUnavailable("publish rejected".into()));
        }
        let sid = format!("TR_{}", self.next_sid.fetch_add(1, Ordering::SeqCst));
        self.published
            .lock()
            .push((sid.clone(), track.name().to_string()));
        self.frames.lock().push(track.into_frames());
        Ok(sid)
    }

    async fn unpublish(&self, sid: &str) -> Result<()> {
        self.unpublished.lock().push(sid.to_string());
        Ok(())
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Assembly

pub struct Rig {
    pub microphone: Arc<FakeMicrophone>,
    pub transcriber: Arc<ScriptedTranscriber>,
    pub responder: Arc<ScriptedResponder>,
    pub synthesizer: Arc<ScriptedSynthesizer>,
    pub sink: Arc<RecordingSink>,
    pub room: Arc<FakeRoomTransport>,
    pub config: SessionConfig,
}

impl Rig {
    pub fn new() -> Self {
        Self {
            microphone: Arc::new(FakeMicrophone::default()),
            transcriber: Arc::new(ScriptedTranscriber::new(TranscriberScript::Text(
                "what time is it",
            ))),
            responder: Arc::new(ScriptedResponder::new(&["Hel", "lo, ", "world"])),
            synthesizer: Arc::new(ScriptedSynthesizer::new(&[&[1, 0, 2, 0], &[3, 0]])),
            sink: Arc::new(RecordingSink::default()),
            room: Arc::new(FakeRoomTransport::default()),
            config: SessionConfig::default().with_max_capture(Duration::from_millis(30)),
        }
    }

    pub fn builder(&self) -> OrchestratorBuilder {
        OrchestratorBuilder::new()
            .with_config(self.config.clone())
            .with_microphone(self.microphone.clone())
            .with_transcriber(self.transcriber.clone())
            .with_responder(self.responder.clone())
            .with_synthesizer(self.synthesizer.clone())
            .with_sink(self.sink.clone())
            .with_room_transport(self.room.clone())
            .without_health_check()
    }
}
