//! Live room relay: connection state, track publication, token fetch

pub mod bridge;
#[cfg(feature = "livekit")]
pub mod livekit;
pub mod token;
pub mod track;

pub use bridge::{RoomBridge, RoomConnection, RoomConnectionState, RoomSignal, RoomTransport};
#[cfg(feature = "livekit")]
pub use livekit::LiveKitTransport;
pub use token::{random_identity, RoomToken, TokenClient};
pub use track::{LocalTrack, TrackFeed, TrackHandle, TrackKind, TrackSource};
