// Broadcast audio format: 16 kHz mono s16le, sliced into 40 ms frames.
pub const FRAME_DURATION_MS: u64 = 40;
pub const SAMPLE_RATE: u32 = 16_000;
pub const CHANNELS: u32 = 1;
pub const BYTES_PER_SAMPLE: u32 = 2;
pub const FRAME_SAMPLES: usize = (SAMPLE_RATE as usize / 1000) * FRAME_DURATION_MS as usize;
pub const FRAME_BYTES: usize =
    FRAME_SAMPLES * CHANNELS as usize * BYTES_PER_SAMPLE as usize; // 1280

// Skips within the first seconds of a track may still go backward.
pub const SKIP_GUARD_SECS: u64 = 3;

// Track names longer than this are shortened for display.
pub const TRACK_NAME_MAX: usize = 30;

// Only files with this extension (case-insensitive) are playable.
pub const TRACK_EXTENSION: &str = "mp3";

// Fan-out channel capacities
pub const FRAME_CHANNEL_CAPACITY: usize = 128;
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

// Encode/emit worker queue depth; keeps at most one frame in flight.
pub const ENCODE_QUEUE_DEPTH: usize = 1;
