use super::playback::AudioSink;
use super::wav::{i16_to_f32, Pcm16Reassembler};
use crate::{MurmurError, Result};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info, warn};

const DRAIN_POLL: Duration = Duration::from_millis(20);

/// Default output device via cpal, fed with mono s16le PCM.
///
/// The stream is opened at the PCM sample rate; the device is expected to
/// accept it. A dedicated thread owns the (non-`Send`) cpal stream.
pub struct CpalSpeaker {
    buffer: Arc<Mutex<VecDeque<f32>>>,
    reassembler: Mutex<Pcm16Reassembler>,
    stop_tx: Sender<()>,
    thread: Mutex<Option<JoinHandle<()>>>,
    sample_rate: u32,
}

impl CpalSpeaker {
    /// Open the default output device at `sample_rate`
    pub fn open(sample_rate: u32) -> Result<Self> {
        let buffer = Arc::new(Mutex::new(VecDeque::new()));
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let thread_buffer = Arc::clone(&buffer);
        let thread = std::thread::Builder::new()
            .name("murmur-speaker".into())
            .spawn(move || {
                let stream = match open_output_stream(sample_rate, thread_buffer) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                let _ = stop_rx.recv();
                drop(stream);
                info!("Stopped audio playback");
            })?;

        ready_rx
            .recv()
            .map_err(|_| MurmurError::DeviceUnavailable("output thread exited".into()))??;

        Ok(Self {
            buffer,
            reassembler: Mutex::new(Pcm16Reassembler::new()),
            stop_tx,
            thread: Mutex::new(Some(thread)),
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn queued_samples(&self) -> usize {
        self.buffer.lock().len()
    }
}

#[async_trait]
impl AudioSink for CpalSpeaker {
    async fn write(&self, chunk: &[u8]) -> Result<()> {
        let samples = self.reassembler.lock().push(chunk);
        self.buffer
            .lock()
            .extend(samples.into_iter().map(i16_to_f32));
        Ok(())
    }

    async fn drain(&self) -> Result<()> {
        while !self.buffer.lock().is_empty() {
            tokio::time::sleep(DRAIN_POLL).await;
        }
        Ok(())
    }

    fn stop(&self) {
        self.buffer.lock().clear();
        *self.reassembler.lock() = Pcm16Reassembler::new();
    }
}

impl Drop for CpalSpeaker {
    fn drop(&mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                warn!("Output thread panicked");
            }
        }
    }
}

fn open_output_stream(
    sample_rate: u32,
    buffer: Arc<Mutex<VecDeque<f32>>>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = host
        .default_output_device()
        .ok_or_else(|| MurmurError::DeviceUnavailable("No output device available".into()))?;

    info!("Using output device: {}", device.name().unwrap_or_else(|_| "Unknown".to_string()));

    let default_config = device
        .default_output_config()
        .map_err(|e| MurmurError::DeviceUnavailable(format!("Failed to get output config: {}", e)))?;

    let config = StreamConfig {
        channels: default_config.channels(),
        sample_rate: SampleRate(sample_rate),
        buffer_size: BufferSize::Default,
    };
    let channels = config.channels as usize;

    let err_fn = |err| {
        error!("Audio output stream error: {}", err);
    };

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut buf = buffer.lock();
                for frame in data.chunks_mut(channels) {
                    // Mono source duplicated across device channels; silence on underrun
                    let sample = buf.pop_front().unwrap_or(0.0);
                    frame.fill(sample);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| MurmurError::DeviceUnavailable(format!("Failed to build output stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| MurmurError::DeviceUnavailable(format!("Failed to start output stream: {}", e)))?;

    info!("Started audio playback at {} Hz", sample_rate);
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_speaker_queue() {
        // Might fail in CI environments without audio devices
        if let Ok(speaker) = CpalSpeaker::open(22050) {
            assert_eq!(speaker.sample_rate(), 22050);
            speaker.write(&[0, 0, 0]).await.unwrap();
            speaker.stop();
            assert_eq!(speaker.queued_samples(), 0);
        }
    }
}
