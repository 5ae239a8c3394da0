//! Microphone capture for one turn
//!
//! A capture ends on the first of: a manual stop, the max-duration timer, or
//! turn cancellation. Whichever stop reason lands first wins; the clip is
//! finalized exactly once because [`AudioCaptureController::stop_capture`]
//! consumes the handle.

use super::wav::{encode_wav, f32_to_pcm_s16le};
use crate::room::TrackFeed;
use crate::{MurmurError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Why a capture stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Manual,
    Timeout,
}

/// One-shot stop latch shared by the manual stop path and the capture timer
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    token: CancellationToken,
    winner: Arc<OnceLock<StopReason>>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `reason` if nothing stopped the capture yet. Returns whether this call won.
    pub fn trigger(&self, reason: StopReason) -> bool {
        if self.winner.set(reason).is_ok() {
            self.token.cancel();
            true
        } else {
            false
        }
    }

    pub fn reason(&self) -> Option<StopReason> {
        self.winner.get().copied()
    }

    /// Resolves with the winning reason once a stop has been requested
    pub async fn triggered(&self) -> StopReason {
        self.token.cancelled().await;
        self.reason().unwrap_or(StopReason::Manual)
    }
}

/// Finalized recording handed to transcription
#[derive(Debug)]
pub struct Clip {
    bytes: Bytes,
    sample_rate: u32,
    duration: Duration,
}

impl Clip {
    pub const CONTENT_TYPE: &'static str = "audio/wav";

    /// Encode mono samples as a WAV clip
    pub fn from_samples(samples: &[f32], sample_rate: u32) -> Result<Self> {
        let bytes = encode_wav(samples, sample_rate, 1)?;
        let duration = if sample_rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(samples.len() as f64 / sample_rate as f64)
        };
        Ok(Self {
            bytes: Bytes::from(bytes),
            sample_rate,
            duration,
        })
    }

    pub fn content_type(&self) -> &'static str {
        Self::CONTENT_TYPE
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Exclusive use of the input device. Frames stop flowing once released.
pub trait DeviceLease: Send {
    /// Sample rate of the mono frames this lease delivers
    fn sample_rate(&self) -> u32;

    fn release(self: Box<Self>);
}

/// Source of mono f32 frames
#[async_trait]
pub trait Microphone: Send + Sync {
    /// Acquire the device and start streaming frames into `frames`
    async fn acquire(
        &self,
        frames: mpsc::UnboundedSender<Vec<f32>>,
    ) -> Result<Box<dyn DeviceLease>>;
}

type Relay = Arc<Mutex<Option<TrackFeed>>>;

/// An in-progress capture
pub struct CaptureHandle {
    lease: Box<dyn DeviceLease>,
    stop: StopSignal,
    relay: Relay,
    done: CancellationToken,
    collector: JoinHandle<Vec<f32>>,
    timer: JoinHandle<()>,
    started: Instant,
}

impl CaptureHandle {
    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// Request a manual stop. Returns false if the capture already stopped.
    pub fn request_stop(&self) -> bool {
        self.stop.trigger(StopReason::Manual)
    }

    pub async fn stopped(&self) -> StopReason {
        self.stop.triggered().await
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn sample_rate(&self) -> u32 {
        self.lease.sample_rate()
    }

    /// Relay every further frame into `feed` as s16le PCM
    pub fn relay_to(&self, feed: TrackFeed) {
        *self.relay.lock() = Some(feed);
    }
}

pub struct AudioCaptureController {
    microphone: Arc<dyn Microphone>,
    max_duration: Duration,
    listening: watch::Sender<bool>,
}

impl AudioCaptureController {
    pub fn new(microphone: Arc<dyn Microphone>, max_duration: Duration) -> Self {
        let (listening, _) = watch::channel(false);
        Self {
            microphone,
            max_duration,
            listening,
        }
    }

    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }

    /// Whether the microphone is currently held
    pub fn is_listening(&self) -> bool {
        *self.listening.borrow()
    }

    pub fn subscribe_listening(&self) -> watch::Receiver<bool> {
        self.listening.subscribe()
    }

    /// Acquire the microphone and start recording.
    ///
    /// `stop` ends the capture; the controller arms it with the max-duration
    /// timer.
    pub async fn start_capture(&self, stop: StopSignal) -> Result<CaptureHandle> {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let lease = self.microphone.acquire(frames_tx).await.map_err(|e| match e {
            MurmurError::DeviceUnavailable(_) => e,
            other => MurmurError::DeviceUnavailable(other.to_string()),
        })?;

        let done = CancellationToken::new();
        let relay: Relay = Arc::new(Mutex::new(None));
        let collector = tokio::spawn(collect_frames(frames_rx, Arc::clone(&relay), done.clone()));

        let timer_stop = stop.clone();
        let max_duration = self.max_duration;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(max_duration).await;
            if timer_stop.trigger(StopReason::Timeout) {
                debug!("Capture reached max duration of {:?}", max_duration);
            }
        });

        self.listening.send_replace(true);
        info!("Started capture at {} Hz", lease.sample_rate());

        Ok(CaptureHandle {
            lease,
            stop,
            relay,
            done,
            collector,
            timer,
            started: Instant::now(),
        })
    }

    /// Release the device and finalize the recording into a clip.
    ///
    /// The device is released even when encoding fails.
    pub async fn stop_capture(&self, handle: CaptureHandle) -> Result<Clip> {
        let sample_rate = handle.lease.sample_rate();
        let elapsed = handle.started.elapsed();
        let samples = self.release(handle).await;

        info!(
            "Capture finished: {} samples over {:?}",
            samples.len(),
            elapsed
        );
        Clip::from_samples(&samples, sample_rate)
    }

    /// Release the device and discard whatever was recorded
    pub async fn abort_capture(&self, handle: CaptureHandle) {
        let samples = self.release(handle).await;
        debug!("Capture aborted, discarded {} samples", samples.len());
    }

    async fn release(&self, handle: CaptureHandle) -> Vec<f32> {
        let CaptureHandle {
            lease,
            relay,
            done,
            collector,
            timer,
            ..
        } = handle;
        drop(relay);

        timer.abort();
        lease.release();
        done.cancel();
        self.listening.send_replace(false);

        match collector.await {
            Ok(samples) => samples,
            Err(e) => {
                warn!("Frame collector ended abnormally: {}", e);
                Vec::new()
            }
        }
    }
}

async fn collect_frames(
    mut frames: mpsc::UnboundedReceiver<Vec<f32>>,
    relay: Relay,
    done: CancellationToken,
) -> Vec<f32> {
    let mut samples = Vec::new();
    let mut accept = |frame: Vec<f32>| {
        if let Some(feed) = relay.lock().as_ref() {
            feed.push(Bytes::from(f32_to_pcm_s16le(&frame)));
        }
        samples.extend_from_slice(&frame);
    };

    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Some(frame) => accept(frame),
                None => break,
            },
            _ = done.cancelled() => {
                while let Ok(frame) = frames.try_recv() {
                    accept(frame);
                }
                break;
            }
        }
    }

    samples
}
