//! Session orchestrator
//!
//! Drives one turn at a time through Record -> Transcribe -> Generate ->
//! Synthesize -> Play, relaying the microphone and the synthesized reply into
//! the live room when it is connected.
//!
//! Each turn runs on its own task. The session keeps a [`TurnSlot`] so the
//! turn can be stopped or cancelled from outside; the slot is cleared only
//! after the turn has released its microphone lease, room track and playback.

use crate::audio::{
    AudioCaptureController, AudioSink, CaptureHandle, Microphone, PlaybackController, StopReason,
    StopSignal,
};
use crate::integration::config::SessionConfig;
use crate::integration::health::HealthClient;
use crate::llm::{ResponseStreamClient, ResponseStreamer};
use crate::room::{
    random_identity, LocalTrack, RoomBridge, RoomConnectionState, RoomTransport, TokenClient,
    TrackFeed, TrackSource,
};
use crate::session::{
    Notice, NoticeLevel, Session, SessionEvent, Stage, Turn, TurnReport, TurnSlot,
};
use crate::speech::{
    SpeechSynthesisClient, SpeechSynthesizer, Transcriber, TranscriptOutcome, TranscriptionClient,
};
use crate::utils::http::build_client;
use crate::utils::perf::summarize;
use crate::utils::{until_cancelled, Stopwatch, TimingTracker};
use crate::{MurmurError, Result};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const EVENT_CAPACITY: usize = 256;
const LATENCY_WINDOW: usize = 20;

const SPLIT_RECORDED: &str = "recorded";
const SPLIT_TRANSCRIBED: &str = "transcribed";
const SPLIT_FIRST_CHUNK: &str = "first reply chunk";
const SPLIT_GENERATED: &str = "generated";
const SPLIT_FIRST_AUDIO: &str = "first audio";
const SPLIT_PLAYED: &str = "played";

/// How a turn that did not fail came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ending {
    Spoken,
    NoSpeech,
}

/// Per-turn controls shared between the turn task and the outside
struct TurnControl {
    cancel: CancellationToken,
    stop: StopSignal,
    stage: watch::Sender<Stage>,
}

/// Resources a turn may be holding when it is interrupted
#[derive(Default)]
struct Held {
    capture: Option<CaptureHandle>,
}

struct Inner {
    config: SessionConfig,
    capture: AudioCaptureController,
    transcriber: Arc<dyn Transcriber>,
    responder: Arc<dyn ResponseStreamer>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    playback: PlaybackController,
    room: RoomBridge,
    tokens: TokenClient,
    health: Option<HealthClient>,
    session: Mutex<Session>,
    events: broadcast::Sender<SessionEvent>,
    latency: Mutex<TimingTracker>,
    room_relay_started: AtomicBool,
}

/// Handle to one accepted turn
pub struct TurnHandle {
    id: Uuid,
    stage: watch::Receiver<Stage>,
    cancel: CancellationToken,
    stop: StopSignal,
    task: JoinHandle<TurnReport>,
}

impl TurnHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stage(&self) -> Stage {
        *self.stage.borrow()
    }

    pub fn subscribe_stage(&self) -> watch::Receiver<Stage> {
        self.stage.clone()
    }

    /// Wait until the turn reaches `target`. Returns false if it ended elsewhere.
    pub async fn wait_for_stage(&mut self, target: Stage) -> bool {
        let reached = self
            .stage
            .wait_for(|stage| *stage == target || stage.is_terminal())
            .await
            .map(|stage| *stage == target);
        reached.unwrap_or_else(|_| *self.stage.borrow() == target)
    }

    /// End recording early. Only meaningful before transcription starts.
    pub fn stop_recording(&self) -> bool {
        matches!(self.stage(), Stage::Idle | Stage::Recording) && self.stop.trigger(StopReason::Manual)
    }

    /// Cancel the turn and wait until its resources are released
    pub async fn cancel(self) -> Result<TurnReport> {
        self.cancel.cancel();
        self.wait().await
    }

    pub async fn wait(self) -> Result<TurnReport> {
        self.task
            .await
            .map_err(|e| MurmurError::Io(format!("turn task failed: {}", e)))
    }
}

/// Clears the session slot when the turn task ends, panics included
struct SlotGuard {
    inner: Arc<Inner>,
    turn_id: Uuid,
    released: CancellationToken,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.inner.session.lock().release_turn(self.turn_id);
        self.released.cancel();
    }
}

#[derive(Clone)]
pub struct SessionOrchestrator {
    inner: Arc<Inner>,
}

impl SessionOrchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn session_id(&self) -> Uuid {
        self.inner.session.lock().id()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn room(&self) -> &RoomBridge {
        &self.inner.room
    }

    pub fn room_state(&self) -> RoomConnectionState {
        self.inner.session.lock().room_state()
    }

    pub fn is_listening(&self) -> bool {
        self.inner.capture.is_listening()
    }

    pub fn subscribe_listening(&self) -> watch::Receiver<bool> {
        self.inner.capture.subscribe_listening()
    }

    /// Stage of the active turn, if any
    pub fn current_stage(&self) -> Option<Stage> {
        self.inner
            .session
            .lock()
            .current_turn()
            .map(|slot| *slot.stage.borrow())
    }

    pub fn has_active_turn(&self) -> bool {
        self.inner.session.lock().has_active_turn()
    }

    /// Average time from end of recording to first synthesized audio
    pub fn response_latency(&self) -> Option<Duration> {
        let latency = self.inner.latency.lock();
        (latency.count() > 0).then(|| latency.average())
    }

    /// Probe the backend, join the room, and announce readiness.
    ///
    /// Every step is advisory: failures become warning notices.
    pub async fn start(&self) {
        self.spawn_room_state_relay();

        if let Some(health) = &self.inner.health {
            match health.check().await {
                Ok(report) => {
                    for warning in report.warnings() {
                        self.inner.notify(Notice::warning(warning));
                    }
                }
                Err(e) => {
                    warn!("Backend health check failed: {}", e);
                    self.inner.notify(Notice::warning("Backend unreachable"));
                }
            }
        }

        if self.inner.room.is_enabled() {
            if let Err(e) = self.connect_room().await {
                warn!("Continuing without the live room: {}", e);
                self.inner.notify(Notice::warning(e.user_message()));
            }
        }

        self.inner.notify(Notice::info("System ready"));
    }

    async fn connect_room(&self) -> Result<()> {
        let room = &self.inner.config.room;
        let identity = random_identity(&room.identity_prefix);
        let token = self.inner.tokens.fetch(&identity, &room.room_name).await?;
        self.inner.room.connect(&token.token, &room.url).await
    }

    fn spawn_room_state_relay(&self) {
        if self.inner.room_relay_started.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut state = self.inner.room.subscribe_state();
        let events = self.inner.events.clone();
        tokio::spawn(async move {
            while state.changed().await.is_ok() {
                let current = *state.borrow_and_update();
                let _ = events.send(SessionEvent::RoomState(current));
            }
        });
    }

    /// Start a new turn. Fails with `TurnAlreadyActive` while another turn
    /// is in flight; the active turn is left untouched.
    pub fn begin_turn(&self) -> Result<TurnHandle> {
        let turn = Turn::new();
        let turn_id = turn.id();
        let cancel = CancellationToken::new();
        let stop = StopSignal::new();
        let released = CancellationToken::new();
        let (stage_tx, stage_rx) = watch::channel(Stage::Idle);

        let slot = TurnSlot {
            turn_id,
            stage: stage_rx.clone(),
            cancel: cancel.clone(),
            stop: stop.clone(),
            released: released.clone(),
        };

        let claimed = self.inner.session.lock().claim_turn(slot);
        if let Err(e) = claimed {
            debug!("Rejected new turn: {}", e);
            self.inner.notify(Notice::warning(e.user_message()));
            return Err(e);
        }

        info!("Turn {} started", turn_id);
        let control = TurnControl {
            cancel: cancel.clone(),
            stop: stop.clone(),
            stage: stage_tx,
        };
        let guard = SlotGuard {
            inner: Arc::clone(&self.inner),
            turn_id,
            released,
        };
        let task = tokio::spawn(run_turn(Arc::clone(&self.inner), turn, control, guard));

        Ok(TurnHandle {
            id: turn_id,
            stage: stage_rx,
            cancel,
            stop,
            task,
        })
    }

    /// Manually end recording of the active turn
    pub fn stop_recording(&self) -> bool {
        let session = self.inner.session.lock();
        match session.current_turn() {
            Some(slot) if matches!(*slot.stage.borrow(), Stage::Idle | Stage::Recording) => {
                slot.stop.trigger(StopReason::Manual)
            }
            _ => false,
        }
    }

    /// Cancel the active turn and wait until it has released everything.
    /// Returns false when no turn was active.
    pub async fn cancel_turn(&self) -> bool {
        let slot = self.inner.session.lock().current_turn().cloned();
        match slot {
            Some(slot) => {
                info!("Cancelling turn {}", slot.turn_id);
                slot.cancel.cancel();
                slot.released.cancelled().await;
                true
            }
            None => false,
        }
    }

    /// Cancel any active turn, then leave the room
    pub async fn shutdown(&self) {
        self.cancel_turn().await;
        self.inner.room.disconnect().await;
        info!("Session {} shut down", self.session_id());
    }
}

async fn run_turn(
    inner: Arc<Inner>,
    mut turn: Turn,
    control: TurnControl,
    guard: SlotGuard,
) -> TurnReport {
    let mut held = Held::default();
    let mut watch = Stopwatch::start();

    let result = inner.drive(&mut turn, &control, &mut held, &mut watch).await;
    inner.release(&mut turn, &mut held).await;

    let (terminal, ending, error) = match result {
        _ if control.cancel.is_cancelled() => (Stage::Cancelled, None, None),
        Ok(ending) => (Stage::Completed, Some(ending), None),
        Err(MurmurError::Cancelled) => (Stage::Cancelled, None, None),
        Err(e) => (Stage::Failed, None, Some(e)),
    };

    if let Err(e) = turn.advance(terminal) {
        error!("Turn {} could not finish: {}", turn.id(), e);
    } else {
        control.stage.send_replace(terminal);
        inner.emit(SessionEvent::StageChanged {
            turn_id: turn.id(),
            stage: terminal,
        });
    }

    let notice = match (terminal, ending, &error) {
        (Stage::Completed, Some(Ending::NoSpeech), _) => Notice::warning("No speech detected"),
        (Stage::Completed, _, _) => Notice::info("Response complete"),
        (Stage::Failed, _, Some(e)) => Notice::error(e.user_message()),
        _ => Notice::info("Turn cancelled"),
    };
    inner.notify(notice.for_turn(turn.id()));

    if let (Some(recorded), Some(first_audio)) =
        (watch.split_at(SPLIT_RECORDED), watch.split_at(SPLIT_FIRST_AUDIO))
    {
        inner.latency.lock().record(first_audio.saturating_sub(recorded));
    }
    info!(
        "Turn {} {} ({})",
        turn.id(),
        terminal,
        summarize(watch.splits())
    );

    let report = turn.into_report(error, watch.into_splits());
    drop(guard);
    report
}

impl Inner {
    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => info!("{}", notice.message),
            NoticeLevel::Warning => warn!("{}", notice.message),
            NoticeLevel::Error => error!("{}", notice.message),
        }
        self.emit(SessionEvent::Notice(notice));
    }

    fn advance(&self, turn: &mut Turn, control: &TurnControl, next: Stage) -> Result<()> {
        if control.cancel.is_cancelled() {
            return Err(MurmurError::Cancelled);
        }
        turn.advance(next)?;
        control.stage.send_replace(next);
        debug!("Turn {} -> {}", turn.id(), next);
        self.emit(SessionEvent::StageChanged {
            turn_id: turn.id(),
            stage: next,
        });
        Ok(())
    }

    async fn drive(
        &self,
        turn: &mut Turn,
        control: &TurnControl,
        held: &mut Held,
        watch: &mut Stopwatch,
    ) -> Result<Ending> {
        let cancel = &control.cancel;

        // Recording
        self.advance(turn, control, Stage::Recording)?;
        let capture =
            until_cancelled(cancel, self.capture.start_capture(control.stop.clone())).await??;
        let sample_rate = capture.sample_rate();
        held.capture = Some(capture);

        if let Some(feed) = self
            .publish_track(turn, cancel, "microphone", TrackSource::Microphone, sample_rate)
            .await?
        {
            if let Some(capture) = &held.capture {
                capture.relay_to(feed);
            }
        }

        let reason = until_cancelled(cancel, control.stop.triggered()).await?;
        let clip = match held.capture.take() {
            Some(capture) => self.capture.stop_capture(capture).await?,
            None => return Err(MurmurError::DeviceUnavailable("capture was not running".into())),
        };
        watch.split(SPLIT_RECORDED);
        info!(
            "Recorded {:?} of audio ({:?} stop)",
            clip.duration(),
            reason
        );
        turn.store_clip(clip, reason);
        self.release_track(turn).await;

        // Transcribing
        self.advance(turn, control, Stage::Transcribing)?;
        let clip = turn
            .take_clip()
            .ok_or_else(|| MurmurError::TranscriptionFailed("no clip was captured".into()))?;
        let outcome = until_cancelled(cancel, self.transcriber.transcribe(clip)).await??;
        watch.split(SPLIT_TRANSCRIBED);

        let transcript = match outcome {
            TranscriptOutcome::Transcribed(t) if !t.text.trim().is_empty() => t,
            _ => return Ok(Ending::NoSpeech),
        };
        let message = transcript.text.clone();
        turn.set_transcript(transcript)?;
        self.emit(SessionEvent::Transcript {
            turn_id: turn.id(),
            text: message.clone(),
        });

        // Generating
        self.advance(turn, control, Stage::Generating)?;
        let reply = self.generate(turn, control, &message, watch).await?;

        // Synthesizing
        self.advance(turn, control, Stage::Synthesizing)?;
        let mut audio = self.synthesizer.synthesize(&reply, cancel.clone())?;
        let first = until_cancelled(cancel, audio.next()).await?.transpose()?;
        watch.split(SPLIT_FIRST_AUDIO);

        // Playing
        self.advance(turn, control, Stage::Playing)?;
        let tee = self
            .publish_track(
                turn,
                cancel,
                "assistant",
                TrackSource::Synthesized,
                self.config.playback.sample_rate,
            )
            .await?;
        let audio = stream::iter(first.map(Ok)).chain(audio).boxed();
        self.playback.play(audio, tee, cancel).await?;
        watch.split(SPLIT_PLAYED);
        self.release_track(turn).await;

        Ok(Ending::Spoken)
    }

    async fn generate(
        &self,
        turn: &mut Turn,
        control: &TurnControl,
        message: &str,
        watch: &mut Stopwatch,
    ) -> Result<String> {
        let cancel = &control.cancel;
        let mut chunks = self.responder.stream_response(message, cancel.clone());
        let mut first = true;

        while let Some(chunk) = until_cancelled(cancel, chunks.next()).await? {
            match chunk {
                Ok(chunk) => {
                    if first {
                        watch.split(SPLIT_FIRST_CHUNK);
                        first = false;
                    }
                    turn.append_reply(&chunk.text);
                    self.emit(SessionEvent::ReplyDelta {
                        turn_id: turn.id(),
                        text: chunk.text,
                    });
                }
                Err(MurmurError::Cancelled) => return Err(MurmurError::Cancelled),
                Err(e)
                    if self.config.policy.speak_partial_reply
                        && !turn.reply_text().trim().is_empty() =>
                {
                    warn!("Reply stream failed, speaking the partial reply: {}", e);
                    break;
                }
                Err(e) => {
                    return Err(match e {
                        MurmurError::GenerationFailed(_) => e,
                        other => MurmurError::GenerationFailed(other.to_string()),
                    })
                }
            }
        }
        watch.split(SPLIT_GENERATED);

        let reply = turn.reply_text().to_string();
        if reply.trim().is_empty() {
            return Err(MurmurError::GenerationFailed("backend returned an empty reply".into()));
        }
        Ok(reply)
    }

    /// Publish a fresh track when the room is connected and attach its handle
    /// to the turn. A slow provider never holds the turn past cancellation.
    async fn publish_track(
        &self,
        turn: &mut Turn,
        cancel: &CancellationToken,
        name: &str,
        source: TrackSource,
        sample_rate: u32,
    ) -> Result<Option<TrackFeed>> {
        if !self.room.is_connected() {
            return Ok(None);
        }

        let (feed, track) = LocalTrack::new(name, source, sample_rate, 1);
        match until_cancelled(cancel, self.room.publish(track)).await? {
            Some(handle) => {
                turn.attach_track(handle)?;
                Ok(Some(feed))
            }
            None => Ok(None),
        }
    }

    async fn release_track(&self, turn: &mut Turn) {
        if let Some(handle) = turn.take_track() {
            self.room.unpublish(handle).await;
        }
    }

    /// Release everything the turn may still hold. Runs on every exit path.
    async fn release(&self, turn: &mut Turn, held: &mut Held) {
        if let Some(capture) = held.capture.take() {
            self.capture.abort_capture(capture).await;
        }
        self.playback.stop();
        self.release_track(turn).await;
        if turn.take_clip().is_some() {
            debug!("Discarded unprocessed clip for turn {}", turn.id());
        }
    }
}

/// Builder for creating an orchestrator.
///
/// The microphone and audio sink are required; backend clients default to
/// the HTTP implementations pointed at the configured base URL.
pub struct OrchestratorBuilder {
    config: SessionConfig,
    microphone: Option<Arc<dyn Microphone>>,
    sink: Option<Arc<dyn AudioSink>>,
    transcriber: Option<Arc<dyn Transcriber>>,
    responder: Option<Arc<dyn ResponseStreamer>>,
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    room_transport: Option<Arc<dyn RoomTransport>>,
    health_check: bool,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            microphone: None,
            sink: None,
            transcriber: None,
            responder: None,
            synthesizer: None,
            room_transport: None,
            health_check: true,
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_microphone(mut self, microphone: Arc<dyn Microphone>) -> Self {
        self.microphone = Some(microphone);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn AudioSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn with_responder(mut self, responder: Arc<dyn ResponseStreamer>) -> Self {
        self.responder = Some(responder);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Provider used when `room.enabled` is set
    pub fn with_room_transport(mut self, transport: Arc<dyn RoomTransport>) -> Self {
        self.room_transport = Some(transport);
        self
    }

    /// Skip the backend probe in [`SessionOrchestrator::start`]
    pub fn without_health_check(mut self) -> Self {
        self.health_check = false;
        self
    }

    pub fn build(self) -> Result<SessionOrchestrator> {
        let config = self.config;
        config.validate()?;

        let microphone = self
            .microphone
            .ok_or_else(|| MurmurError::Config("no microphone configured".into()))?;
        let sink = self
            .sink
            .ok_or_else(|| MurmurError::Config("no audio sink configured".into()))?;

        let timeout = config.backend.request_timeout();
        let http = build_client(timeout);

        let transcriber = self.transcriber.unwrap_or_else(|| {
            Arc::new(TranscriptionClient::new(
                http.clone(),
                config.backend.transcribe_url(),
                config.backend.upload,
                timeout,
            ))
        });
        let responder = self.responder.unwrap_or_else(|| {
            Arc::new(ResponseStreamClient::new(
                http.clone(),
                config.backend.generate_url(),
            ))
        });
        let synthesizer = self.synthesizer.unwrap_or_else(|| {
            Arc::new(
                SpeechSynthesisClient::new(http.clone(), config.backend.synthesize_url())
                    .with_output_format(config.playback.output_format()),
            )
        });

        let room = match self.room_transport {
            Some(transport) if config.room.enabled => {
                RoomBridge::new(transport).with_call_timeout(config.room.call_timeout())
            }
            Some(_) => {
                debug!("Room transport provided but the room is disabled");
                RoomBridge::disabled()
            }
            None => {
                if config.room.enabled {
                    warn!("Room enabled but no room provider is available");
                }
                RoomBridge::disabled()
            }
        };

        let health = self
            .health_check
            .then(|| HealthClient::new(http.clone(), config.backend.health_url(), timeout));
        let tokens = TokenClient::new(http, config.room.token_url.clone(), timeout);

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let session = Session::new(room.subscribe_state());

        info!("Session {} configured against {}", session.id(), config.backend.base_url);

        Ok(SessionOrchestrator {
            inner: Arc::new(Inner {
                capture: AudioCaptureController::new(microphone, config.capture.max_duration()),
                playback: PlaybackController::new(sink),
                transcriber,
                responder,
                synthesizer,
                room,
                tokens,
                health,
                session: Mutex::new(session),
                events,
                latency: Mutex::new(TimingTracker::new(LATENCY_WINDOW)),
                room_relay_started: AtomicBool::new(false),
                config,
            }),
        })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::DeviceLease;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct SilentMic;

    struct SilentLease;

    impl DeviceLease for SilentLease {
        fn sample_rate(&self) -> u32 {
            16000
        }

        fn release(self: Box<Self>) {}
    }

    #[async_trait]
    impl Microphone for SilentMic {
        async fn acquire(
            &self,
            _frames: mpsc::UnboundedSender<Vec<f32>>,
        ) -> Result<Box<dyn DeviceLease>> {
            Ok(Box::new(SilentLease))
        }
    }

    struct NullSink;

    #[async_trait]
    impl AudioSink for NullSink {
        async fn write(&self, _chunk: &[u8]) -> Result<()> {
            Ok(())
        }

        async fn drain(&self) -> Result<()> {
            Ok(())
        }

        fn stop(&self) {}
    }

    #[test]
    fn test_builder_requires_devices() {
        let result = OrchestratorBuilder::new().build();
        assert!(matches!(result, Err(MurmurError::Config(_))));

        let result = OrchestratorBuilder::new()
            .with_microphone(Arc::new(SilentMic))
            .build();
        assert!(matches!(result, Err(MurmurError::Config(_))));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = OrchestratorBuilder::new()
            .with_config(SessionConfig::default().with_backend_url("not a url"))
            .with_microphone(Arc::new(SilentMic))
            .with_sink(Arc::new(NullSink))
            .build();
        assert!(matches!(result, Err(MurmurError::Config(_))));
    }

    #[tokio::test]
    async fn test_idle_session() {
        let orchestrator = OrchestratorBuilder::new()
            .with_microphone(Arc::new(SilentMic))
            .with_sink(Arc::new(NullSink))
            .build()
            .unwrap();

        assert!(!orchestrator.has_active_turn());
        assert_eq!(orchestrator.current_stage(), None);
        assert!(!orchestrator.stop_recording());
        assert!(!orchestrator.cancel_turn().await);
        assert_eq!(orchestrator.room_state(), RoomConnectionState::Disconnected);
        assert!(!orchestrator.room().is_enabled());
        assert_eq!(orchestrator.response_latency(), None);
    }
}
