// src/main.rs
//
// Demo driver: spins up the engine, creates a track, loads a file passed
// on the command line (or runs silent if none given), and prints the
// transport position for a few seconds.

use std::time::Duration;

use strata::{Engine, InitConfig, TrackKind};

fn main() {
    env_logger::init();

    let mut engine = Engine::new();
    engine
        .init(InitConfig::default())
        .expect("failed to initialize engine");

    let track = engine
        .track_create(TrackKind::Audio)
        .expect("failed to create track");

    if let Some(path) = std::env::args().nth(1) {
        match engine.track_load_file(track, &path) {
            Ok(()) => log::info!("loaded {path} onto track {track}"),
            Err(e) => log::error!("failed to load {path}: {e}"),
        }
    } else {
        log::info!("no file given; playing silence on track {track}");
    }

    engine.play().expect("failed to start transport");

    for _ in 0..10 {
        std::thread::sleep(Duration::from_millis(500));
        let state = engine.get_state().expect("engine not initialized");
        let (peak_l, peak_r) = engine.get_master_peaks().unwrap_or((0.0, 0.0));
        println!(
            "bar {} beat {} | {:.2}s | peaks L={:.3} R={:.3}",
            state.bar, state.beat, state.position_seconds, peak_l, peak_r
        );
    }

    engine.stop().expect("failed to stop transport");
    engine.shutdown().expect("failed to shut down engine");
}
