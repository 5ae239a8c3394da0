use super::capture::{DeviceLease, Microphone};
use crate::{MurmurError, Result};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, Stream, StreamConfig};
use crossbeam_channel::{bounded, Sender};
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Default input device via cpal.
///
/// cpal streams are not `Send`, so each lease owns a dedicated thread that
/// builds the stream, keeps it alive, and drops it on release.
#[derive(Debug, Clone, Copy)]
pub struct CpalMicrophone {
    preferred_rate: u32,
}

impl CpalMicrophone {
    /// Record at `preferred_rate` when the device supports it, otherwise at its default rate
    pub fn new(preferred_rate: u32) -> Self {
        Self { preferred_rate }
    }
}

#[async_trait]
impl Microphone for CpalMicrophone {
    async fn acquire(
        &self,
        frames: mpsc::UnboundedSender<Vec<f32>>,
    ) -> Result<Box<dyn DeviceLease>> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let preferred_rate = self.preferred_rate;

        let thread = std::thread::Builder::new()
            .name("murmur-mic".into())
            .spawn(move || {
                let (stream, sample_rate) = match open_input_stream(preferred_rate, frames) {
                    Ok(opened) => opened,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(sample_rate));

                // Blocks until the lease is released or dropped.
                let _ = stop_rx.recv();
                drop(stream);
                info!("Stopped audio recording");
            })?;

        let sample_rate = ready_rx
            .await
            .map_err(|_| MurmurError::DeviceUnavailable("input thread exited".into()))??;

        Ok(Box::new(CpalLease {
            stop_tx,
            thread: Some(thread),
            sample_rate,
        }))
    }
}

struct CpalLease {
    stop_tx: Sender<()>,
    thread: Option<JoinHandle<()>>,
    sample_rate: u32,
}

impl CpalLease {
    fn shutdown(&mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Input thread panicked");
            }
        }
    }
}

impl DeviceLease for CpalLease {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn release(mut self: Box<Self>) {
        self.shutdown();
    }
}

impl Drop for CpalLease {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn open_input_stream(
    preferred_rate: u32,
    frames: mpsc::UnboundedSender<Vec<f32>>,
) -> Result<(Stream, u32)> {
    let host = cpal::default_host();

    let device = host
        .default_input_device()
        .ok_or_else(|| MurmurError::DeviceUnavailable("No input device available".into()))?;

    info!("Using input device: {}", device.name().unwrap_or_else(|_| "Unknown".to_string()));

    let default_config = device
        .default_input_config()
        .map_err(|e| MurmurError::DeviceUnavailable(format!("Failed to get input config: {}", e)))?;

    let supports_preferred = device
        .supported_input_configs()
        .map(|mut ranges| {
            ranges.any(|range| {
                range.channels() == default_config.channels()
                    && range.sample_format() == SampleFormat::F32
                    && range.min_sample_rate().0 <= preferred_rate
                    && preferred_rate <= range.max_sample_rate().0
            })
        })
        .unwrap_or(false);

    let mut config: StreamConfig = default_config.into();
    if supports_preferred {
        config.sample_rate = SampleRate(preferred_rate);
    } else {
        debug!("Input device cannot record at {} Hz, using its default", preferred_rate);
    }

    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0;

    let err_fn = |err| {
        error!("Audio input stream error: {}", err);
    };

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Convert to mono if necessary
                let samples = if channels == 1 {
                    data.to_vec()
                } else {
                    data.chunks(channels)
                        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                        .collect()
                };

                if frames.send(samples).is_err() {
                    debug!("Capture receiver gone, dropping audio");
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| MurmurError::DeviceUnavailable(format!("Failed to build input stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| MurmurError::DeviceUnavailable(format!("Failed to start input stream: {}", e)))?;

    info!("Started audio recording at {} Hz", sample_rate);
    Ok((stream, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_and_release() {
        // No input device in most CI environments
        let (tx, mut rx) = mpsc::unbounded_channel();
        match CpalMicrophone::new(16000).acquire(tx).await {
            Ok(lease) => {
                assert!(lease.sample_rate() > 0);
                lease.release();
                while rx.try_recv().is_ok() {}
            }
            Err(e) => assert!(matches!(e, MurmurError::DeviceUnavailable(_))),
        }
    }
}
