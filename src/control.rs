// src/control.rs
//
// Public control API.
//
// Every function here corresponds to one control operation from the
// specification. They acquire the Scene mutex for the duration of their
// mutation only; the mixer (`crate::mixer::mix`) acquires the same mutex
// once per callback on the realtime thread. See the module-level safety
// note in `ffi.rs` for the boundary this crosses into C.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::backend::{AudioBackend, BackendError, CpalBackend, MixCallback, Stream, StreamConfig};
use crate::decoder::{AudioDecoder, DecoderError, WavDecoder};
use crate::error::{ControlResult, ErrorCode};
use crate::mixer::{self, MixScratch};
use crate::state::{Clip, Scene, SceneConfig, Track, TrackId, TrackKind};

impl From<BackendError> for ErrorCode {
    fn from(_: BackendError) -> Self {
        ErrorCode::AudioDevice
    }
}

impl From<DecoderError> for ErrorCode {
    fn from(e: DecoderError) -> Self {
        match e {
            DecoderError::NotFound(_) => ErrorCode::FileNotFound,
            // A malformed-but-present file, not a missing one; the fixed
            // code set (spec §4.6) has no distinct decode-error code, so
            // this is the closer of the two caller-contract codes.
            DecoderError::Unsupported(_) => ErrorCode::InvalidParam,
            DecoderError::Decode(_) => ErrorCode::FileNotFound,
        }
    }
}

/// Requested configuration for `init`.
#[derive(Debug, Clone, Copy)]
pub struct InitConfig {
    pub sample_rate: u32,
    pub bit_depth: u32,
    pub buffer_frames: u32,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            bit_depth: 24,
            buffer_frames: 512,
        }
    }
}

/// Point-in-time snapshot returned by `get_state` (spec §4.1).
#[derive(Debug, Clone, Copy)]
pub struct EngineState {
    pub transport_state: crate::state::TransportState,
    pub bpm: f64,
    pub position_beats: f64,
    pub position_seconds: f64,
    pub bar: u32,
    pub beat: u32,
    pub n_tracks: u32,
    pub master_volume: f32,
}

/// Snapshot returned by `track_info` (spec §4.4).
#[derive(Debug, Clone)]
pub struct TrackInfo {
    pub id: TrackId,
    pub kind: TrackKind,
    pub name: String,
    pub volume: f32,
    pub pan: f32,
    pub mute: bool,
    pub solo: bool,
    pub armed: bool,
    pub peak_l: f32,
    pub peak_r: f32,
    pub clip_count: u32,
}

struct Inner {
    scene: Arc<Mutex<Scene>>,
    /// Cloned out of the Scene at `init` time so `get_master_peaks` can
    /// read it without taking the Scene mutex (spec §4.3, §5).
    master_peaks: Arc<crate::state::MasterPeaks>,
    _stream: Stream,
}

/// The engine handle. One per process (spec §3, "Only one Scene exists
/// per process"); holding a second live handle is a logic error the
/// caller must avoid by calling `shutdown` before a new `init`.
pub struct Engine {
    inner: Option<Inner>,
    backend: Box<dyn AudioBackend>,
    decoder: Box<dyn AudioDecoder>,
}

impl Engine {
    /// Construct an uninitialized engine using the default cpal backend
    /// and WAV decoder.
    pub fn new() -> Self {
        Self::with_adapters(Box::new(CpalBackend::new()), Box::new(WavDecoder::new()))
    }

    /// Construct an uninitialized engine with injected adapters, used by
    /// tests to avoid touching real hardware or the filesystem.
    pub fn with_adapters(backend: Box<dyn AudioBackend>, decoder: Box<dyn AudioDecoder>) -> Self {
        Self {
            inner: None,
            backend,
            decoder,
        }
    }

    fn lock(&self) -> ControlResult<MutexGuard<'_, Scene>> {
        let inner = self.inner.as_ref().ok_or(ErrorCode::NotInit)?;
        Ok(inner.scene.lock().unwrap_or_else(|p| p.into_inner()))
    }

    // ── 4.1 Lifecycle & Scene ──────────────────────────────────────────

    pub fn init(&mut self, config: InitConfig) -> ControlResult<()> {
        if self.inner.is_some() {
            return Err(ErrorCode::AlreadyInit);
        }

        let scene = Arc::new(Mutex::new(Scene::new(SceneConfig {
            sample_rate: config.sample_rate,
            bit_depth: config.bit_depth,
            buffer_frames: config.buffer_frames,
        })));

        let stream_config = StreamConfig {
            sample_rate: config.sample_rate,
            buffer_frames: config.buffer_frames,
            channels: 2,
        };

        let callback_scene = Arc::clone(&scene);
        let mut scratch = MixScratch::new(config.buffer_frames as usize);
        let callback: MixCallback = Box::new(move |out: &mut [f32]| {
            let n_frames = out.len() / 2;
            let mut guard = match callback_scene.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            mixer::mix(&mut guard, &mut scratch, out, n_frames);
        });

        let stream = self
            .backend
            .open_output_stream(&stream_config, callback)
            .map_err(|_| ErrorCode::AudioDevice)?;

        let master_peaks = scene
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .master_peaks
            .clone();

        self.inner = Some(Inner {
            scene,
            master_peaks,
            _stream: stream,
        });
        Ok(())
    }

    pub fn shutdown(&mut self) -> ControlResult<()> {
        if self.inner.is_none() {
            return Err(ErrorCode::NotInit);
        }
        self.inner = None;
        Ok(())
    }

    pub fn get_state(&self) -> ControlResult<EngineState> {
        let scene = self.lock()?;
        let (bar, beat) = scene.transport.bar_beat();
        Ok(EngineState {
            transport_state: scene.transport.state,
            bpm: scene.transport.bpm(),
            position_beats: scene.transport.position_beats,
            position_seconds: scene.transport.position_seconds,
            bar,
            beat,
            n_tracks: scene.track_count() as u32,
            master_volume: scene.master_volume(),
        })
    }

    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    pub fn strerror(&self, code: i32) -> &'static str {
        crate::error::strerror(code)
    }

    // ── 4.2 Transport ───────────────────────────────────────────────────

    pub fn play(&self) -> ControlResult<()> {
        let mut scene = self.lock()?;
        scene.transport.state = crate::state::TransportState::Playing;
        Ok(())
    }

    pub fn stop(&self) -> ControlResult<()> {
        let mut scene = self.lock()?;
        scene.transport.stop();
        Ok(())
    }

    pub fn pause(&self) -> ControlResult<()> {
        let mut scene = self.lock()?;
        scene.transport.pause();
        Ok(())
    }

    pub fn record(&self) -> ControlResult<()> {
        let mut scene = self.lock()?;
        scene.transport.state = crate::state::TransportState::Recording;
        Ok(())
    }

    pub fn seek(&self, beat: f64) -> ControlResult<()> {
        let mut scene = self.lock()?;
        if scene.transport.seek(beat) {
            Ok(())
        } else {
            Err(ErrorCode::InvalidParam)
        }
    }

    pub fn set_bpm(&self, bpm: f64) -> ControlResult<()> {
        let mut scene = self.lock()?;
        if scene.transport.set_bpm(bpm) {
            Ok(())
        } else {
            Err(ErrorCode::InvalidParam)
        }
    }

    pub fn set_loop(&self, enabled: bool, start: f64, end: f64) -> ControlResult<()> {
        let mut scene = self.lock()?;
        if scene.transport.set_loop(enabled, start, end) {
            Ok(())
        } else {
            Err(ErrorCode::InvalidParam)
        }
    }

    // ── 4.3 Master ──────────────────────────────────────────────────────

    pub fn set_master_volume(&self, v: f32) -> ControlResult<()> {
        let mut scene = self.lock()?;
        scene.set_master_volume(v);
        Ok(())
    }

    /// Reads the master peak meter without taking the Scene lock (spec
    /// §4.3, §5, "Meter reads"): a torn read across L/R is acceptable, and
    /// this never contends with the mixer's hold on the Scene mutex.
    pub fn get_master_peaks(&self) -> ControlResult<(f32, f32)> {
        let inner = self.inner.as_ref().ok_or(ErrorCode::NotInit)?;
        Ok(inner.master_peaks.load())
    }

    // ── 4.4 Track operations ────────────────────────────────────────────

    pub fn track_create(&self, kind: TrackKind) -> ControlResult<TrackId> {
        let mut scene = self.lock()?;
        scene.create_track(kind).ok_or(ErrorCode::OutOfMemory)
    }

    pub fn track_destroy(&self, id: TrackId) -> ControlResult<()> {
        let mut scene = self.lock()?;
        if scene.destroy_track(id) {
            Ok(())
        } else {
            Err(ErrorCode::InvalidTrack)
        }
    }

    pub fn track_info(&self, id: TrackId) -> ControlResult<TrackInfo> {
        let scene = self.lock()?;
        let track = scene.find_track(id).ok_or(ErrorCode::InvalidTrack)?;
        Ok(TrackInfo {
            id: track.id,
            kind: track.kind,
            name: track.name.clone(),
            volume: track.volume(),
            pan: track.pan(),
            mute: track.mute,
            solo: track.solo,
            armed: track.armed,
            peak_l: track.peak_l,
            peak_r: track.peak_r,
            clip_count: track.clip_count() as u32,
        })
    }

    /// Truncated to 63 bytes at a char boundary (spec §6, names bounded at
    /// 64 bytes including the FFI null terminator).
    pub fn track_set_name(&self, id: TrackId, name: impl Into<String>) -> ControlResult<()> {
        let mut scene = self.lock()?;
        let track = scene.find_track_mut(id).ok_or(ErrorCode::InvalidTrack)?;
        let mut name = name.into();
        if name.len() > 63 {
            let mut end = 63;
            while end > 0 && !name.is_char_boundary(end) {
                end -= 1;
            }
            name.truncate(end);
        }
        track.name = name;
        Ok(())
    }

    pub fn track_set_vol(&self, id: TrackId, v: f32) -> ControlResult<()> {
        let mut scene = self.lock()?;
        let track = scene.find_track_mut(id).ok_or(ErrorCode::InvalidTrack)?;
        track.set_volume(v);
        Ok(())
    }

    pub fn track_set_pan(&self, id: TrackId, p: f32) -> ControlResult<()> {
        let mut scene = self.lock()?;
        let track = scene.find_track_mut(id).ok_or(ErrorCode::InvalidTrack)?;
        track.set_pan(p);
        Ok(())
    }

    pub fn track_set_mute(&self, id: TrackId, mute: bool) -> ControlResult<()> {
        let mut scene = self.lock()?;
        let track = scene.find_track_mut(id).ok_or(ErrorCode::InvalidTrack)?;
        track.mute = mute;
        Ok(())
    }

    pub fn track_set_solo(&self, id: TrackId, solo: bool) -> ControlResult<()> {
        let mut scene = self.lock()?;
        {
            let track = scene.find_track_mut(id).ok_or(ErrorCode::InvalidTrack)?;
            track.solo = solo;
        }
        scene.refresh_any_solo();
        Ok(())
    }

    pub fn track_set_armed(&self, id: TrackId, armed: bool) -> ControlResult<()> {
        let mut scene = self.lock()?;
        let track = scene.find_track_mut(id).ok_or(ErrorCode::InvalidTrack)?;
        track.armed = armed;
        Ok(())
    }

    /// `track_load_file(id, path)` (spec §4.4).
    ///
    /// Decoding happens before the lock is taken; only clip construction
    /// and insertion happen under it, so the realtime callback never
    /// observes a half-initialized clip (spec §5).
    pub fn track_load_file(&self, id: TrackId, path: &str) -> ControlResult<()> {
        {
            let scene = self.lock()?;
            let track = scene.find_track(id).ok_or(ErrorCode::InvalidTrack)?;
            if track.is_clip_table_full() {
                return Err(ErrorCode::ClipFull);
            }
        }

        let decoded = self.decoder.decode_file(path)?;
        let mut frames = decoded.left.len();
        let (mut left, mut right) = (decoded.left, decoded.right);
        if frames == 0 {
            frames = (decoded.sample_rate as usize) * 30;
            left = vec![0.0; frames];
            right = vec![0.0; frames];
        }

        let mut scene = self.lock()?;
        let bpm = scene.transport.bpm();
        let sample_rate = scene.config.sample_rate as f64;
        let len_beats = frames as f64 * bpm / (sample_rate * 60.0);

        let track = scene.find_track_mut(id).ok_or(ErrorCode::InvalidTrack)?;
        if track.is_clip_table_full() {
            return Err(ErrorCode::ClipFull);
        }
        track.push_clip(Clip::new(left, right, 0.0, len_beats));
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendResult;
    use crate::decoder::DecodedAudio;

    struct NullBackend;
    impl AudioBackend for NullBackend {
        fn name(&self) -> &str {
            "null"
        }
        fn open_output_stream(
            &self,
            _config: &StreamConfig,
            _callback: MixCallback,
        ) -> BackendResult<Stream> {
            Ok(Stream::new(()))
        }
    }

    struct FixedDecoder {
        frames: usize,
        sample_rate: u32,
    }
    impl AudioDecoder for FixedDecoder {
        fn decode_file(&self, _path: &str) -> crate::decoder::DecoderResult<DecodedAudio> {
            Ok(DecodedAudio {
                left: vec![0.0; self.frames],
                right: vec![0.0; self.frames],
                sample_rate: self.sample_rate,
            })
        }
    }

    fn test_engine() -> Engine {
        Engine::with_adapters(
            Box::new(NullBackend),
            Box::new(FixedDecoder {
                frames: 48_000,
                sample_rate: 48_000,
            }),
        )
    }

    #[test]
    fn operations_before_init_return_not_init() {
        let engine = test_engine();
        assert_eq!(engine.play(), Err(ErrorCode::NotInit));
        assert_eq!(engine.get_state().err(), Some(ErrorCode::NotInit));
    }

    #[test]
    fn double_init_rejected() {
        let mut engine = test_engine();
        assert!(engine.init(InitConfig::default()).is_ok());
        assert_eq!(engine.init(InitConfig::default()), Err(ErrorCode::AlreadyInit));
    }

    #[test]
    fn shutdown_without_init_rejected() {
        let mut engine = test_engine();
        assert_eq!(engine.shutdown(), Err(ErrorCode::NotInit));
    }

    #[test]
    fn track_lifecycle_round_trips() {
        let mut engine = test_engine();
        engine.init(InitConfig::default()).unwrap();
        let id = engine.track_create(TrackKind::Audio).unwrap();
        let info = engine.track_info(id).unwrap();
        assert_eq!(info.name, "Audio 1");
        assert_eq!(info.volume, 1.0);
        engine.track_destroy(id).unwrap();
        assert_eq!(engine.track_info(id).err(), Some(ErrorCode::InvalidTrack));
    }

    #[test]
    fn load_file_populates_clip_with_correct_length() {
        let mut engine = test_engine();
        engine.init(InitConfig::default()).unwrap();
        let id = engine.track_create(TrackKind::Audio).unwrap();
        engine.set_bpm(120.0).unwrap();
        engine.track_load_file(id, "unused.wav").unwrap();
        let info = engine.track_info(id).unwrap();
        assert_eq!(info.clip_count, 1);
    }

    #[test]
    fn solo_sets_any_solo_flag() {
        let mut engine = test_engine();
        engine.init(InitConfig::default()).unwrap();
        let id = engine.track_create(TrackKind::Audio).unwrap();
        engine.track_set_solo(id, true).unwrap();
        let scene = engine.lock().unwrap();
        assert!(scene.any_solo);
    }

    #[test]
    fn track_name_truncates_to_63_bytes() {
        let mut engine = test_engine();
        engine.init(InitConfig::default()).unwrap();
        let id = engine.track_create(TrackKind::Audio).unwrap();
        let long_name = "x".repeat(200);
        engine.track_set_name(id, long_name).unwrap();
        let info = engine.track_info(id).unwrap();
        assert_eq!(info.name.len(), 63);
    }
}
