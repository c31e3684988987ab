// Engine integration tests: the streaming loop is driven with scripted
// decoder/encoder doubles over real temp directories, so these verify
// frame cadence, transport controls and failure recovery end to end.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use music_station::config::FRAME_BYTES;
use music_station::{
    Decoder, Encoder, MusicStation, Result, StationError, StationEvent, TrackReader,
};
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::time::timeout;

use bytes::Bytes;

/// Produces a fixed number of 40 ms frames per track; tracks whose base
/// name is listed in `fail_names` refuse to open, like a corrupt file.
struct ScriptedDecoder {
    frames_per_track: usize,
    fail_names: Vec<String>,
}

impl ScriptedDecoder {
    fn new(frames_per_track: usize) -> Self {
        Self {
            frames_per_track,
            fail_names: Vec::new(),
        }
    }

    fn failing_on(frames_per_track: usize, names: &[&str]) -> Self {
        Self {
            frames_per_track,
            fail_names: names.iter().map(|n| n.to_string()).collect(),
        }
    }
}

impl Decoder for ScriptedDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn TrackReader>> {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        if self.fail_names.contains(&name) {
            return Err(StationError::Decode(format!("corrupt stream in {}", name)));
        }
        Ok(Box::new(ScriptedReader {
            remaining: self.frames_per_track,
            frames_read: 0,
        }))
    }
}

struct ScriptedReader {
    remaining: usize,
    frames_read: u64,
}

impl TrackReader for ScriptedReader {
    fn read_frame(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        self.remaining -= 1;
        self.frames_read += 1;
        buf.fill(0x55);
        Ok(buf.len())
    }

    fn position(&self) -> Duration {
        Duration::from_millis(self.frames_read * 40)
    }
}

struct ScriptedEncoder;

impl Encoder for ScriptedEncoder {
    fn encode(&self, pcm: &[u8]) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(pcm))
    }
}

fn music_dir(names: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for name in names {
        fs::write(dir.path().join(format!("{}.mp3", name)), b"scripted").unwrap();
    }
    dir
}

fn station_with(dir: &TempDir, decoder: ScriptedDecoder) -> MusicStation {
    let station = MusicStation::new(7, Arc::new(decoder), Arc::new(ScriptedEncoder));
    station.set_directory(dir.path());
    station
}

/// Waits for the first event the predicate accepts, discarding others.
async fn await_event<F>(
    rx: &mut broadcast::Receiver<StationEvent>,
    wait: Duration,
    mut accept: F,
) -> Option<StationEvent>
where
    F: FnMut(&StationEvent) -> bool,
{
    let deadline = Instant::now() + wait;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return None;
        }
        match timeout(remaining, rx.recv()).await {
            Ok(Ok(event)) if accept(&event) => return Some(event),
            Ok(Ok(_)) => continue,
            Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
            Ok(Err(broadcast::error::RecvError::Closed)) => return None,
            Err(_) => return None,
        }
    }
}

/// Drains every event that arrives within the window.
async fn collect_events(
    rx: &mut broadcast::Receiver<StationEvent>,
    window: Duration,
) -> Vec<StationEvent> {
    let mut events = Vec::new();
    let deadline = Instant::now() + window;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return events;
        }
        match timeout(remaining, rx.recv()).await {
            Ok(Ok(event)) => events.push(event),
            Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
            _ => return events,
        }
    }
}

fn is_track_changed(event: &StationEvent) -> bool {
    matches!(event, StationEvent::TrackChanged { .. })
}

#[tokio::test]
async fn start_with_no_tracks_warns_and_does_not_start() {
    let dir = music_dir(&[]);
    let station = station_with(&dir, ScriptedDecoder::new(5));
    let mut events = station.subscribe_events();

    station.start();

    let seen = collect_events(&mut events, Duration::from_millis(300)).await;
    let warnings = seen
        .iter()
        .filter(|e| matches!(e, StationEvent::NoTracksFound { channel: 7 }))
        .count();
    assert_eq!(warnings, 1);
    assert!(!seen.iter().any(is_track_changed));
    assert!(!station.is_playing());
}

#[tokio::test]
async fn frames_are_emitted_on_a_40ms_cadence() {
    let dir = music_dir(&["solo"]);
    let station = station_with(&dir, ScriptedDecoder::new(5));
    let mut events = station.subscribe_events();
    let mut frames = station.subscribe_frames();

    station.start();

    let changed = await_event(&mut events, Duration::from_secs(1), is_track_changed).await;
    assert_eq!(
        changed,
        Some(StationEvent::TrackChanged {
            channel: 7,
            name: "solo".to_string(),
        })
    );
    let number = await_event(&mut events, Duration::from_secs(1), |e| {
        matches!(e, StationEvent::TrackNumber { .. })
    })
    .await;
    assert_eq!(
        number,
        Some(StationEvent::TrackNumber {
            channel: 7,
            label: "1 of 1".to_string(),
        })
    );

    let first = timeout(Duration::from_secs(1), frames.recv())
        .await
        .expect("no frame within 1s")
        .unwrap();
    assert_eq!(first.payload.len(), FRAME_BYTES);

    let started = Instant::now();
    for _ in 0..4 {
        timeout(Duration::from_secs(1), frames.recv())
            .await
            .expect("frame emission stalled")
            .unwrap();
    }
    let spacing = started.elapsed();
    // Four inter-frame gaps of ~40 ms; generous tolerance for CI jitter
    assert!(
        spacing >= Duration::from_millis(120),
        "frames came too fast: {:?}",
        spacing
    );

    station.stop();
    let stopped = await_event(&mut events, Duration::from_secs(1), |e| {
        matches!(e, StationEvent::Stopped { .. })
    })
    .await;
    assert!(stopped.is_some());
}

#[tokio::test]
async fn skip_forward_switches_to_another_track() {
    let dir = music_dir(&["first", "second", "third"]);
    let station = station_with(&dir, ScriptedDecoder::new(200));
    let mut events = station.subscribe_events();

    station.start();
    assert!(
        await_event(&mut events, Duration::from_secs(1), is_track_changed)
            .await
            .is_some()
    );

    tokio::time::sleep(Duration::from_millis(120)).await;
    station.skip_forward();

    let next = await_event(&mut events, Duration::from_secs(1), is_track_changed).await;
    assert!(next.is_some(), "skip did not switch tracks");

    station.stop();
}

#[tokio::test]
async fn early_backward_skip_returns_to_previous_track() {
    let dir = music_dir(&["first", "second", "third"]);
    let station = station_with(&dir, ScriptedDecoder::new(10));
    let mut events = station.subscribe_events();

    station.start();
    let first = await_event(&mut events, Duration::from_secs(1), is_track_changed)
        .await
        .expect("no initial track");
    // Natural completion advances to the next sequence position
    let second = await_event(&mut events, Duration::from_secs(2), is_track_changed)
        .await
        .expect("playback did not advance");
    assert_ne!(first, second);

    // Well inside the 3-second guard window the veto does not apply,
    // so the skip lands one position back.
    tokio::time::sleep(Duration::from_millis(100)).await;
    station.skip_backward();

    let third = await_event(&mut events, Duration::from_secs(1), is_track_changed)
        .await
        .expect("backward skip did not restart playback");
    assert_eq!(third, first);

    station.stop();
}

#[tokio::test]
async fn failing_track_is_dropped_with_a_single_warning() {
    let dir = music_dir(&["one", "two", "bad", "four", "five"]);
    let station = station_with(&dir, ScriptedDecoder::failing_on(2, &["bad"]));
    let mut events = station.subscribe_events();

    station.start();

    let warning = await_event(&mut events, Duration::from_secs(3), |e| {
        matches!(e, StationEvent::TrackWarning { .. })
    })
    .await;
    assert_eq!(
        warning,
        Some(StationEvent::TrackWarning {
            name: "bad".to_string(),
        })
    );

    // Playback continues past the dropped track and never warns again
    let after = collect_events(&mut events, Duration::from_millis(600)).await;
    assert!(after.iter().any(is_track_changed));
    assert!(
        !after
            .iter()
            .any(|e| matches!(e, StationEvent::TrackWarning { .. })),
        "track warning repeated after removal"
    );
    assert!(station.is_playing());

    station.stop();
}

#[tokio::test]
async fn failures_without_alternatives_stop_playback() {
    let dir = music_dir(&["one", "two", "three"]);
    let station = station_with(&dir, ScriptedDecoder::failing_on(2, &["one", "two", "three"]));
    let mut events = station.subscribe_events();

    station.start();

    let mut warnings = 0;
    let mut stopped = false;
    for event in collect_events(&mut events, Duration::from_secs(2)).await {
        match event {
            StationEvent::TrackWarning { .. } => warnings += 1,
            StationEvent::Stopped { .. } => {
                stopped = true;
                break;
            }
            _ => {}
        }
    }

    // First failure leaves two tracks (drop + warn); the second leaves
    // one, which is fatal.
    assert_eq!(warnings, 1);
    assert!(stopped);
    assert!(!station.is_playing());
}

#[tokio::test]
async fn repeat_replays_the_same_track() {
    let dir = music_dir(&["alpha", "beta"]);
    let station = station_with(&dir, ScriptedDecoder::new(2));
    let mut events = station.subscribe_events();

    station.set_repeat(true);
    station.start();

    let first = await_event(&mut events, Duration::from_secs(1), is_track_changed).await;
    let second = await_event(&mut events, Duration::from_secs(1), is_track_changed).await;
    assert!(first.is_some());
    assert_eq!(first, second);

    station.stop();
}

#[tokio::test]
async fn stop_halts_the_frame_stream() {
    let dir = music_dir(&["endless"]);
    let station = station_with(&dir, ScriptedDecoder::new(1000));
    let mut events = station.subscribe_events();
    let mut frames = station.subscribe_frames();

    station.start();
    timeout(Duration::from_secs(1), frames.recv())
        .await
        .expect("no frame within 1s")
        .unwrap();

    station.stop();
    let stopped = await_event(&mut events, Duration::from_secs(1), |e| {
        matches!(e, StationEvent::Stopped { channel: 7 })
    })
    .await;
    assert!(stopped.is_some());

    // At most the in-flight frame may still arrive, then silence.
    let mut quiet = false;
    for _ in 0..5 {
        if timeout(Duration::from_millis(150), frames.recv()).await.is_err() {
            quiet = true;
            break;
        }
    }
    assert!(quiet, "frames kept flowing after stop");
}

#[tokio::test]
async fn quick_restart_keeps_a_single_stream() {
    let dir = music_dir(&["endless"]);
    let station = station_with(&dir, ScriptedDecoder::new(2000));
    let mut frames = station.subscribe_frames();

    station.start();
    timeout(Duration::from_secs(1), frames.recv())
        .await
        .expect("no frame within 1s")
        .unwrap();

    // Restart before the old loop can observe the cleared flag; the
    // superseded loop must yield instead of streaming alongside.
    station.stop();
    station.start();

    let mut count = 0u32;
    let deadline = Instant::now() + Duration::from_secs(1);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match timeout(remaining, frames.recv()).await {
            Ok(Ok(_)) => count += 1,
            Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
            _ => break,
        }
    }

    // One 40 ms cadence is ~25 frames/s; a doubled stream shows ~50.
    assert!(
        count <= 35,
        "multiple streaming loops emitting: {} frames in 1s",
        count
    );
    assert!(
        count >= 15,
        "stream did not survive the restart: {} frames in 1s",
        count
    );

    station.stop();
}

#[tokio::test]
async fn restart_after_stop_is_allowed() {
    let dir = music_dir(&["alpha", "beta"]);
    let station = station_with(&dir, ScriptedDecoder::new(50));
    let mut events = station.subscribe_events();

    station.start();
    assert!(
        await_event(&mut events, Duration::from_secs(1), is_track_changed)
            .await
            .is_some()
    );
    station.stop();
    assert!(await_event(&mut events, Duration::from_secs(1), |e| {
        matches!(e, StationEvent::Stopped { .. })
    })
    .await
    .is_some());

    station.start();
    assert!(
        await_event(&mut events, Duration::from_secs(1), is_track_changed)
            .await
            .is_some()
    );
    station.stop();
}
