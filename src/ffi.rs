// C-compatible FFI bindings for the engine's control surface.
//
// Safety requirements:
// - All pointers must be non-null unless documented otherwise
// - The engine handle must be created by `strata_create` and not fabricated
// - Path/name strings must be valid null-terminated UTF-8
// - Caller must call `strata_destroy` exactly once per `strata_create`

use std::ffi::{CStr, c_char};

use crate::control::{Engine, InitConfig};
use crate::error::ErrorCode;
use crate::state::TrackKind;

// ═══════════════════════════════════════════════════════════════════════════
// Opaque Handle
// ═══════════════════════════════════════════════════════════════════════════

/// Opaque handle to one engine instance.
pub struct StrataEngine {
    inner: Engine,
}

/// Create a new, uninitialized engine handle.
///
/// The returned handle must be passed to `strata_init` before any other
/// operation, and freed exactly once with `strata_destroy`.
#[unsafe(no_mangle)]
pub extern "C" fn strata_create() -> *mut StrataEngine {
    Box::into_raw(Box::new(StrataEngine {
        inner: Engine::new(),
    }))
}

/// Destroy an engine handle, shutting it down first if still initialized.
///
/// # Safety
/// `engine` must be a valid pointer returned by `strata_create`, not
/// already destroyed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn strata_destroy(engine: *mut StrataEngine) {
    if engine.is_null() {
        return;
    }
    let mut boxed = unsafe { Box::from_raw(engine) };
    let _ = boxed.inner.shutdown();
}

// ═══════════════════════════════════════════════════════════════════════════
// Lifecycle & Scene (spec §4.1)
// ═══════════════════════════════════════════════════════════════════════════

/// Engine configuration, mirroring `InitConfig`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct StrataConfig {
    pub sample_rate: u32,
    pub bit_depth: u32,
    pub buffer_frames: u32,
}

impl Default for StrataConfig {
    fn default() -> Self {
        let c = InitConfig::default();
        Self {
            sample_rate: c.sample_rate,
            bit_depth: c.bit_depth,
            buffer_frames: c.buffer_frames,
        }
    }
}

/// `get_state` snapshot (spec §4.1).
#[repr(C)]
pub struct StrataState {
    pub transport_state: i32,
    pub bpm: f64,
    pub position_beats: f64,
    pub position_seconds: f64,
    pub bar: u32,
    pub beat: u32,
    pub n_tracks: u32,
    pub master_volume: f32,
}

fn transport_state_code(state: crate::state::TransportState) -> i32 {
    use crate::state::TransportState::*;
    match state {
        Stopped => 0,
        Playing => 1,
        Paused => 2,
        Recording => 3,
    }
}

/// Return the default engine configuration.
#[unsafe(no_mangle)]
pub extern "C" fn strata_default_config() -> StrataConfig {
    StrataConfig::default()
}

/// `init(config)` (spec §4.1).
///
/// # Safety
/// `engine` must be a valid, non-null pointer from `strata_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn strata_init(engine: *mut StrataEngine, config: StrataConfig) -> i32 {
    if engine.is_null() {
        return ErrorCode::InvalidParam.code();
    }
    let engine = unsafe { &mut *engine };
    let result = engine.inner.init(InitConfig {
        sample_rate: config.sample_rate,
        bit_depth: config.bit_depth,
        buffer_frames: config.buffer_frames,
    });
    log::info!("strata_init: {:?}", result);
    to_code(result)
}

/// `shutdown` (spec §4.1).
///
/// # Safety
/// `engine` must be a valid, non-null pointer from `strata_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn strata_shutdown(engine: *mut StrataEngine) -> i32 {
    if engine.is_null() {
        return ErrorCode::InvalidParam.code();
    }
    let engine = unsafe { &mut *engine };
    to_code(engine.inner.shutdown())
}

/// `get_state(out)` (spec §4.1).
///
/// # Safety
/// `engine` and `out` must be valid, non-null pointers; `out` must point
/// to writable memory for one `StrataState`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn strata_get_state(
    engine: *const StrataEngine,
    out: *mut StrataState,
) -> i32 {
    if engine.is_null() || out.is_null() {
        return ErrorCode::InvalidParam.code();
    }
    let engine = unsafe { &*engine };
    match engine.inner.get_state() {
        Ok(state) => {
            unsafe {
                *out = StrataState {
                    transport_state: transport_state_code(state.transport_state),
                    bpm: state.bpm,
                    position_beats: state.position_beats,
                    position_seconds: state.position_seconds,
                    bar: state.bar,
                    beat: state.beat,
                    n_tracks: state.n_tracks,
                    master_volume: state.master_volume,
                };
            }
            ErrorCode::Ok.code()
        }
        Err(e) => e.code(),
    }
}

/// `version()` (spec §4.1). The returned pointer is static and never freed.
#[unsafe(no_mangle)]
pub extern "C" fn strata_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr() as *const c_char
}

/// `strerror(code)` (spec §4.1). The returned pointer is static and never freed.
#[unsafe(no_mangle)]
pub extern "C" fn strata_strerror(code: i32) -> *const c_char {
    // strerror's messages never contain interior NULs; this is fine to
    // leak as a 'static str since it always points at one of the fixed
    // literals in `error::strerror`.
    match code {
        0 => c"ok".as_ptr(),
        -1 => c"engine is not initialized".as_ptr(),
        -2 => c"engine is already initialized".as_ptr(),
        -3 => c"audio device error".as_ptr(),
        -4 => c"invalid track id".as_ptr(),
        -5 => c"file not found or could not be opened".as_ptr(),
        -6 => c"out of memory".as_ptr(),
        -7 => c"invalid parameter".as_ptr(),
        -8 => c"track has no free clip slots".as_ptr(),
        _ => c"unknown error".as_ptr(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Transport (spec §4.2)
// ═══════════════════════════════════════════════════════════════════════════

/// # Safety
/// `engine` must be a valid, non-null pointer from `strata_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn strata_play(engine: *const StrataEngine) -> i32 {
    unsafe { with_engine(engine, |e| e.play()) }
}

/// # Safety
/// `engine` must be a valid, non-null pointer from `strata_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn strata_stop(engine: *const StrataEngine) -> i32 {
    unsafe { with_engine(engine, |e| e.stop()) }
}

/// # Safety
/// `engine` must be a valid, non-null pointer from `strata_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn strata_pause(engine: *const StrataEngine) -> i32 {
    unsafe { with_engine(engine, |e| e.pause()) }
}

/// # Safety
/// `engine` must be a valid, non-null pointer from `strata_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn strata_record(engine: *const StrataEngine) -> i32 {
    unsafe { with_engine(engine, |e| e.record()) }
}

/// # Safety
/// `engine` must be a valid, non-null pointer from `strata_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn strata_seek(engine: *const StrataEngine, beat: f64) -> i32 {
    unsafe { with_engine(engine, |e| e.seek(beat)) }
}

/// # Safety
/// `engine` must be a valid, non-null pointer from `strata_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn strata_set_bpm(engine: *const StrataEngine, bpm: f64) -> i32 {
    unsafe { with_engine(engine, |e| e.set_bpm(bpm)) }
}

/// # Safety
/// `engine` must be a valid, non-null pointer from `strata_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn strata_set_loop(
    engine: *const StrataEngine,
    enabled: bool,
    start: f64,
    end: f64,
) -> i32 {
    unsafe { with_engine(engine, |e| e.set_loop(enabled, start, end)) }
}

// ═══════════════════════════════════════════════════════════════════════════
// Master (spec §4.3)
// ═══════════════════════════════════════════════════════════════════════════

/// # Safety
/// `engine` must be a valid, non-null pointer from `strata_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn strata_set_master_volume(engine: *const StrataEngine, v: f32) -> i32 {
    unsafe { with_engine(engine, |e| e.set_master_volume(v)) }
}

/// `get_master_peaks(L, R)` (spec §4.3).
///
/// # Safety
/// `engine`, `out_l`, and `out_r` must be valid, non-null pointers.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn strata_get_master_peaks(
    engine: *const StrataEngine,
    out_l: *mut f32,
    out_r: *mut f32,
) -> i32 {
    if engine.is_null() || out_l.is_null() || out_r.is_null() {
        return ErrorCode::InvalidParam.code();
    }
    let engine = unsafe { &*engine };
    match engine.inner.get_master_peaks() {
        Ok((l, r)) => {
            unsafe {
                *out_l = l;
                *out_r = r;
            }
            ErrorCode::Ok.code()
        }
        Err(e) => e.code(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Track operations (spec §4.4)
// ═══════════════════════════════════════════════════════════════════════════

/// Maximum length of a track name, including the null terminator (spec §6,
/// "Strings are null-terminated UTF-8 bounded at 64 bytes for names").
pub const STRATA_NAME_CAP: usize = 64;

/// Track snapshot returned by `strata_track_info` (spec §4.4).
#[repr(C)]
pub struct StrataTrackInfo {
    pub id: u32,
    pub kind: i32,
    /// Null-terminated UTF-8, truncated to fit `STRATA_NAME_CAP` bytes
    /// including the terminator.
    pub name: [c_char; STRATA_NAME_CAP],
    pub volume: f32,
    pub pan: f32,
    pub mute: bool,
    pub solo: bool,
    pub armed: bool,
    pub peak_l: f32,
    pub peak_r: f32,
    pub clip_count: u32,
}

/// Copy `s` into a fixed `STRATA_NAME_CAP`-byte buffer, truncating at a
/// UTF-8 char boundary and always null-terminating.
fn pack_name(s: &str) -> [c_char; STRATA_NAME_CAP] {
    let mut buf = [0 as c_char; STRATA_NAME_CAP];
    let max = STRATA_NAME_CAP - 1;
    let mut end = s.len().min(max);
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    for (dst, &b) in buf.iter_mut().zip(s.as_bytes()[..end].iter()) {
        *dst = b as c_char;
    }
    buf
}

fn track_kind_from_code(kind: i32) -> Option<TrackKind> {
    match kind {
        0 => Some(TrackKind::Audio),
        1 => Some(TrackKind::Midi),
        2 => Some(TrackKind::Bus),
        3 => Some(TrackKind::Master),
        _ => None,
    }
}

fn track_kind_code(kind: TrackKind) -> i32 {
    match kind {
        TrackKind::Audio => 0,
        TrackKind::Midi => 1,
        TrackKind::Bus => 2,
        TrackKind::Master => 3,
    }
}

/// `track_create(type)` (spec §4.4).
///
/// # Safety
/// `engine` and `out_id` must be valid, non-null pointers.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn strata_track_create(
    engine: *const StrataEngine,
    kind: i32,
    out_id: *mut u32,
) -> i32 {
    if engine.is_null() || out_id.is_null() {
        return ErrorCode::InvalidParam.code();
    }
    let Some(kind) = track_kind_from_code(kind) else {
        return ErrorCode::InvalidParam.code();
    };
    let engine = unsafe { &*engine };
    match engine.inner.track_create(kind) {
        Ok(id) => {
            unsafe { *out_id = id };
            ErrorCode::Ok.code()
        }
        Err(e) => e.code(),
    }
}

/// # Safety
/// `engine` must be a valid, non-null pointer from `strata_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn strata_track_destroy(engine: *const StrataEngine, id: u32) -> i32 {
    unsafe { with_engine(engine, |e| e.track_destroy(id)) }
}

/// # Safety
/// `engine` and `out` must be valid, non-null pointers.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn strata_track_info(
    engine: *const StrataEngine,
    id: u32,
    out: *mut StrataTrackInfo,
) -> i32 {
    if engine.is_null() || out.is_null() {
        return ErrorCode::InvalidParam.code();
    }
    let engine = unsafe { &*engine };
    match engine.inner.track_info(id) {
        Ok(info) => {
            unsafe {
                *out = StrataTrackInfo {
                    id: info.id,
                    kind: track_kind_code(info.kind),
                    name: pack_name(&info.name),
                    volume: info.volume,
                    pan: info.pan,
                    mute: info.mute,
                    solo: info.solo,
                    armed: info.armed,
                    peak_l: info.peak_l,
                    peak_r: info.peak_r,
                    clip_count: info.clip_count,
                };
            }
            ErrorCode::Ok.code()
        }
        Err(e) => e.code(),
    }
}

/// # Safety
/// `engine` must be a valid, non-null pointer; `name` must be a valid
/// null-terminated UTF-8 string or NULL.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn strata_track_set_name(
    engine: *const StrataEngine,
    id: u32,
    name: *const c_char,
) -> i32 {
    if engine.is_null() || name.is_null() {
        return ErrorCode::InvalidParam.code();
    }
    let name = match unsafe { CStr::from_ptr(name) }.to_str() {
        Ok(s) => s,
        Err(_) => return ErrorCode::InvalidParam.code(),
    };
    let engine = unsafe { &*engine };
    to_code(engine.inner.track_set_name(id, name))
}

/// # Safety
/// `engine` must be a valid, non-null pointer from `strata_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn strata_track_set_vol(
    engine: *const StrataEngine,
    id: u32,
    v: f32,
) -> i32 {
    unsafe { with_engine(engine, |e| e.track_set_vol(id, v)) }
}

/// # Safety
/// `engine` must be a valid, non-null pointer from `strata_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn strata_track_set_pan(
    engine: *const StrataEngine,
    id: u32,
    p: f32,
) -> i32 {
    unsafe { with_engine(engine, |e| e.track_set_pan(id, p)) }
}

/// # Safety
/// `engine` must be a valid, non-null pointer from `strata_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn strata_track_set_mute(
    engine: *const StrataEngine,
    id: u32,
    mute: bool,
) -> i32 {
    unsafe { with_engine(engine, |e| e.track_set_mute(id, mute)) }
}

/// # Safety
/// `engine` must be a valid, non-null pointer from `strata_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn strata_track_set_solo(
    engine: *const StrataEngine,
    id: u32,
    solo: bool,
) -> i32 {
    unsafe { with_engine(engine, |e| e.track_set_solo(id, solo)) }
}

/// # Safety
/// `engine` must be a valid, non-null pointer from `strata_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn strata_track_set_armed(
    engine: *const StrataEngine,
    id: u32,
    armed: bool,
) -> i32 {
    unsafe { with_engine(engine, |e| e.track_set_armed(id, armed)) }
}

/// `track_load_file(id, path)` (spec §4.4).
///
/// # Safety
/// `engine` must be a valid, non-null pointer; `path` must be a valid
/// null-terminated UTF-8 string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn strata_track_load_file(
    engine: *const StrataEngine,
    id: u32,
    path: *const c_char,
) -> i32 {
    if engine.is_null() || path.is_null() {
        return ErrorCode::InvalidParam.code();
    }
    let path = match unsafe { CStr::from_ptr(path) }.to_str() {
        Ok(s) => s,
        Err(_) => return ErrorCode::InvalidParam.code(),
    };
    let engine = unsafe { &*engine };
    let result = engine.inner.track_load_file(id, path);
    if let Err(e) = &result {
        log::warn!("track_load_file({id}, {path}) failed: {e}");
    }
    to_code(result)
}

// ═══════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════

fn to_code(result: Result<(), ErrorCode>) -> i32 {
    match result {
        Ok(()) => ErrorCode::Ok.code(),
        Err(e) => e.code(),
    }
}

/// Dereference `engine` and run `f`, turning a null pointer into
/// `InvalidParam` instead of crossing the FFI boundary with a panic.
unsafe fn with_engine(
    engine: *const StrataEngine,
    f: impl FnOnce(&Engine) -> Result<(), ErrorCode>,
) -> i32 {
    if engine.is_null() {
        return ErrorCode::InvalidParam.code();
    }
    let engine = unsafe { &*engine };
    to_code(f(&engine.inner))
}
