use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use bytes::Bytes;

use crate::config::{BYTES_PER_SAMPLE, CHANNELS, SAMPLE_RATE};
use crate::error::Result;

/// One fixed-duration slice of decoded audio, tagged with the elapsed
/// time within the current track.
#[derive(Debug, Clone)]
pub struct Frame {
    pub pcm: Bytes,
    pub elapsed: Duration,
}

/// Reads decoded audio from one opened track.
pub trait TrackReader: Send {
    /// Fills `buf` with the next run of decoded samples. `Ok(0)` means
    /// the track is complete.
    fn read_frame(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Elapsed playback time of the audio returned so far.
    fn position(&self) -> Duration;
}

/// The external decoder seam: turns an opaque file into PCM at the
/// broadcast format (16 kHz mono s16le).
pub trait Decoder: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn TrackReader>>;
}

/// The external codec seam: turns one PCM frame into wire bytes.
pub trait Encoder: Send + Sync {
    fn encode(&self, pcm: &[u8]) -> Result<Bytes>;
}

/// Decoder for files that already hold raw PCM in the broadcast format.
pub struct PcmDecoder;

impl Decoder for PcmDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn TrackReader>> {
        let file = File::open(path)?;
        Ok(Box::new(PcmReader {
            file,
            bytes_read: 0,
        }))
    }
}

struct PcmReader {
    file: File,
    bytes_read: u64,
}

impl TrackReader for PcmReader {
    fn read_frame(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.file.read(buf)?;
        self.bytes_read += n as u64;
        Ok(n)
    }

    fn position(&self) -> Duration {
        let bytes_per_sec = (SAMPLE_RATE * CHANNELS * BYTES_PER_SAMPLE) as u64;
        Duration::from_millis(self.bytes_read * 1000 / bytes_per_sec)
    }
}

/// Encoder that forwards PCM unchanged; stands in for the real codec.
pub struct PassthroughEncoder;

impl Encoder for PassthroughEncoder {
    fn encode(&self, pcm: &[u8]) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(pcm))
    }
}
