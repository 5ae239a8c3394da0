pub mod capture;
#[cfg(feature = "audio-io")]
pub mod input;
#[cfg(feature = "audio-io")]
pub mod output;
pub mod playback;
pub mod wav;

pub use capture::{
    AudioCaptureController, CaptureHandle, Clip, DeviceLease, Microphone, StopReason, StopSignal,
};
#[cfg(feature = "audio-io")]
pub use input::CpalMicrophone;
#[cfg(feature = "audio-io")]
pub use output::CpalSpeaker;
pub use playback::{AudioSink, AudioStream, PlaybackController, PlaybackSummary};
pub use wav::encode_wav;
