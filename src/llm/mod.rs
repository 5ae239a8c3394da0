//! Reply generation from the backend's streaming endpoint

pub mod sse;
pub mod stream;

pub use sse::{SseDecoder, SseFrame};
pub use stream::{ResponseStreamClient, ResponseStreamer, TextChunk, TextStream};
