use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One encoded frame ready for the wire, stamped at emission time.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub payload: Bytes,
    pub timestamp: DateTime<Utc>,
}

/// Player notifications, fired synchronously from the streaming task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StationEvent {
    /// A new track began playing.
    TrackChanged { channel: u32, name: String },
    /// Elapsed time in the current track, "MM:SS", once per frame.
    TrackTimer { channel: u32, elapsed: String },
    /// 1-based position in the sequence, "K of N", per track start.
    TrackNumber { channel: u32, label: String },
    /// A track was dropped after a playback error; playback continues.
    TrackWarning { name: String },
    /// The configured directory yielded no playable tracks.
    NoTracksFound { channel: u32 },
    /// Playback halted, by user request or fatal recovery failure.
    Stopped { channel: u32 },
}

/// Formats elapsed track time as "MM:SS".
pub fn format_timer(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", (secs % 3600) / 60, secs % 60)
}

/// Shortens long display names with an ellipsis marker.
pub fn shorten_name(name: &str, max: usize) -> String {
    if name.chars().count() > max {
        let head: String = name.chars().take(max).collect();
        format!("{}...", head)
    } else {
        name.to_string()
    }
}
