use std::env;
use std::sync::Arc;

use log::info;
use tokio::sync::broadcast::error::RecvError;

use music_station::{MusicStation, PassthroughEncoder, PcmDecoder, StationEvent};

#[tokio::main]
async fn main() {
    env_logger::init();

    let directory = env::args().nth(1).unwrap_or_else(|| "music".to_string());

    let station = MusicStation::new(
        1,
        Arc::new(PcmDecoder),
        Arc::new(PassthroughEncoder),
    );
    station.set_directory(&directory);

    let mut events = station.subscribe_events();
    let mut frames = station.subscribe_frames();

    station.start();

    let mut frames_emitted: u64 = 0;
    let mut bytes_emitted: u64 = 0;

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if let Ok(line) = serde_json::to_string(&event) {
                            println!("{}", line);
                        }
                        if matches!(event, StationEvent::Stopped { .. })
                            || matches!(event, StationEvent::NoTracksFound { .. })
                        {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
            frame = frames.recv() => {
                if let Ok(frame) = frame {
                    frames_emitted += 1;
                    bytes_emitted += frame.payload.len() as u64;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                station.stop();
            }
        }
    }

    info!(
        "Emitted {} frames ({} bytes) before shutdown",
        frames_emitted, bytes_emitted
    );
}
