use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;

use crate::catalog::Catalog;
use crate::codec::{Decoder, Encoder, Frame};
use crate::config::{
    ENCODE_QUEUE_DEPTH, EVENT_CHANNEL_CAPACITY, FRAME_BYTES, FRAME_CHANNEL_CAPACITY,
    FRAME_DURATION_MS, SKIP_GUARD_SECS, TRACK_NAME_MAX,
};
use crate::error::Result;
use crate::events::{format_timer, shorten_name, EncodedFrame, StationEvent};
use crate::recovery::{self, RecoveryAction};
use crate::sequencer::{NavHandle, Sequencer, TrackId};

/// A per-channel background music player.
///
/// Scans a directory, shuffles the catalog, and streams each track as
/// encoded 40 ms frames on a real-time cadence. Frames and player
/// notifications fan out over broadcast channels; transport controls
/// may be called from any task.
#[derive(Clone)]
pub struct MusicStation {
    channel: u32,
    directory: Arc<Mutex<Option<PathBuf>>>,
    playing: Arc<AtomicBool>,
    // Bumped on every start; a superseded loop exits instead of
    // fighting a restarted one for the playing flag.
    session: Arc<AtomicU64>,
    nav: NavHandle,
    frame_tx: broadcast::Sender<EncodedFrame>,
    event_tx: broadcast::Sender<StationEvent>,
    decoder: Arc<dyn Decoder>,
    encoder: Arc<dyn Encoder>,
}

impl MusicStation {
    pub fn new(channel: u32, decoder: Arc<dyn Decoder>, encoder: Arc<dyn Encoder>) -> Self {
        let (frame_tx, _) = broadcast::channel(FRAME_CHANNEL_CAPACITY);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            channel,
            directory: Arc::new(Mutex::new(None)),
            playing: Arc::new(AtomicBool::new(false)),
            session: Arc::new(AtomicU64::new(0)),
            nav: NavHandle::default(),
            frame_tx,
            event_tx,
            decoder,
            encoder,
        }
    }

    pub fn channel(&self) -> u32 {
        self.channel
    }

    /// Configures the source directory; takes effect on the next start.
    pub fn set_directory(&self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        debug!(
            "Music directory set to {} on station {}",
            dir.display(),
            self.channel
        );
        *self.directory.lock() = Some(dir);
    }

    pub fn subscribe_frames(&self) -> broadcast::Receiver<EncodedFrame> {
        self.frame_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<StationEvent> {
        self.event_tx.subscribe()
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn session_active(&self, session: u64) -> bool {
        self.is_playing() && self.session.load(Ordering::SeqCst) == session
    }

    /// Scans the directory, builds the shuffled sequence, and spawns
    /// the streaming task. With zero playable tracks, emits a single
    /// `NoTracksFound` and does not start.
    pub fn start(&self) {
        self.start_with_rng(StdRng::from_entropy());
    }

    /// Like [`start`](Self::start), with an injectable random source.
    pub fn start_with_rng<R>(&self, mut rng: R)
    where
        R: Rng + Send + 'static,
    {
        if self.playing.swap(true, Ordering::SeqCst) {
            warn!("Station {} is already playing", self.channel);
            return;
        }

        info!("Starting music playback on station {}", self.channel);

        let directory = self.directory.lock().clone();
        let catalog = match directory {
            Some(dir) => Catalog::scan(&dir),
            None => Catalog::default(),
        };

        if catalog.is_empty() {
            warn!("No valid audio tracks were found on station {}", self.channel);
            self.playing.store(false, Ordering::SeqCst);
            self.emit(StationEvent::NoTracksFound {
                channel: self.channel,
            });
            return;
        }

        self.nav.clear_skip();
        let sequencer = Sequencer::new(&catalog, self.nav.clone(), &mut rng);

        let session = self.session.fetch_add(1, Ordering::SeqCst) + 1;
        let station = self.clone();
        tokio::spawn(async move {
            station.stream_loop(session, catalog, sequencer, rng).await;
        });
    }

    /// Clears the playing flag; the streaming task exits within one
    /// frame duration at its next check point.
    pub fn stop(&self) {
        info!("Stopping music playback on station {}", self.channel);
        self.playing.store(false, Ordering::SeqCst);
    }

    pub fn skip_forward(&self) {
        if self.is_playing() {
            info!("Skip forward on station {}", self.channel);
            self.nav.skip_forward();
        }
    }

    pub fn skip_backward(&self) {
        if self.is_playing() {
            info!("Skip backward on station {}", self.channel);
            self.nav.skip_backward();
        }
    }

    pub fn set_repeat(&self, enabled: bool) {
        info!("Repeat set to {} on station {}", enabled, self.channel);
        self.nav.set_repeat(enabled);
    }

    fn emit(&self, event: StationEvent) {
        // Fan-out is best effort; no receivers is not an error.
        let _ = self.event_tx.send(event);
    }

    /// One long-lived task per station: pick a track, stream it, and
    /// let the recovery policy decide what a failure means. The task
    /// exits as soon as its session number is no longer current.
    async fn stream_loop<R: Rng>(
        &self,
        session: u64,
        mut catalog: Catalog,
        mut sequencer: Sequencer,
        mut rng: R,
    ) {
        let (frame_queue, worker) = self.spawn_encode_worker();

        while self.session_active(session) {
            let Some(track) = sequencer.next_track(&mut rng) else {
                warn!("Station {} unable to get next track", self.channel);
                break;
            };

            let name = catalog.display_name(&track).unwrap_or_default().to_string();
            info!("Station {} is now playing: {}", self.channel, name);

            self.emit(StationEvent::TrackChanged {
                channel: self.channel,
                name: shorten_name(&name, TRACK_NAME_MAX),
            });
            self.emit(StationEvent::TrackTimer {
                channel: self.channel,
                elapsed: "00:00".to_string(),
            });
            self.emit(StationEvent::TrackNumber {
                channel: self.channel,
                label: sequencer.position_label(),
            });

            match self
                .stream_track(session, &sequencer, &track, &frame_queue)
                .await
            {
                Ok(()) => sequencer.advance_on_complete(),
                Err(e) => {
                    error!(
                        "Error during playback of track {} on station {}: {}",
                        track.display(),
                        self.channel,
                        e
                    );
                    match recovery::on_track_failure(&track, &mut catalog, &mut sequencer) {
                        RecoveryAction::Continue => {
                            self.emit(StationEvent::TrackWarning { name });
                        }
                        RecoveryAction::Stop => break,
                    }
                }
            }
        }

        drop(frame_queue);
        let _ = worker.await;

        // Only the current session owns the flag; a quick restart may
        // already have taken it over.
        if self.session.load(Ordering::SeqCst) == session {
            self.playing.store(false, Ordering::SeqCst);
            self.emit(StationEvent::Stopped {
                channel: self.channel,
            });
        }
        info!("Station {} playback loop ended", self.channel);
    }

    /// Streams one track frame by frame until it completes, a skip is
    /// consumed, or the playing flag clears.
    async fn stream_track(
        &self,
        session: u64,
        sequencer: &Sequencer,
        track: &TrackId,
        frame_queue: &mpsc::Sender<Frame>,
    ) -> Result<()> {
        let mut reader = self.decoder.open(track)?;
        let mut buf = vec![0u8; FRAME_BYTES];
        let skip_guard = Duration::from_secs(SKIP_GUARD_SECS);

        while self.session_active(session) {
            let n = reader.read_frame(&mut buf)?;
            if n == 0 {
                break;
            }
            let elapsed = reader.position();
            debug!(
                "Station {} current track time is {}",
                self.channel,
                format_timer(elapsed)
            );

            if self.nav.skip_requested() {
                // Early in a track a backward skip is taken as-is;
                // past the guard it may not rewind behind this track.
                if elapsed >= skip_guard {
                    sequencer.reconcile_skip(track);
                }
                break;
            }

            let frame = Frame {
                pcm: Bytes::copy_from_slice(&buf[..n]),
                elapsed,
            };
            if frame_queue.send(frame).await.is_err() {
                break;
            }

            sleep(Duration::from_millis(FRAME_DURATION_MS)).await;
        }

        Ok(())
    }

    /// Single persistent worker that encodes and emits frames, so the
    /// pacing sleep overlaps encode latency instead of waiting on it.
    fn spawn_encode_worker(
        &self,
    ) -> (mpsc::Sender<Frame>, tokio::task::JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Frame>(ENCODE_QUEUE_DEPTH);

        let encoder = self.encoder.clone();
        let frame_tx = self.frame_tx.clone();
        let event_tx = self.event_tx.clone();
        let channel = self.channel;

        let worker = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                match encoder.encode(&frame.pcm) {
                    Ok(payload) => {
                        let _ = frame_tx.send(EncodedFrame {
                            payload,
                            timestamp: Utc::now(),
                        });
                        let _ = event_tx.send(StationEvent::TrackTimer {
                            channel,
                            elapsed: format_timer(frame.elapsed),
                        });
                    }
                    Err(e) => error!("Station {} failed to encode frame: {}", channel, e),
                }
            }
        });

        (tx, worker)
    }
}
