// Library exports for the music-station crate
// This allows integration tests to access the public API

pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod recovery;
pub mod sequencer;
pub mod station;

// Re-export commonly used types
pub use catalog::{Catalog, Track};
pub use codec::{Decoder, Encoder, Frame, PassthroughEncoder, PcmDecoder, TrackReader};
pub use error::{Result, StationError};
pub use events::{EncodedFrame, StationEvent};
pub use recovery::RecoveryAction;
pub use sequencer::{NavHandle, Sequencer, TrackId};
pub use station::MusicStation;
