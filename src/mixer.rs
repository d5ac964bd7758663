// src/mixer.rs
//
// Realtime mix callback.
//
// Runs exclusively on the audio device thread. Must be deterministic and
// must not allocate: every scratch buffer it touches is preallocated by
// the caller and reused callback to callback.

use crate::state::{LoopRegion, Scene, TransportState};

const PEAK_DECAY: f32 = 0.9997;

/// Scratch accumulators reused across callbacks so `mix` never allocates.
pub struct MixScratch {
    mix_l: Vec<f32>,
    mix_r: Vec<f32>,
    /// Per-track summed contribution for the callback, reused track to
    /// track. Needed so the track peak follower runs once per frame over
    /// the track's actual summed sample (see `mix` below) instead of once
    /// per clip contribution.
    track_l: Vec<f32>,
    track_r: Vec<f32>,
}

impl MixScratch {
    pub fn new(max_frames: usize) -> Self {
        Self {
            mix_l: vec![0.0; max_frames],
            mix_r: vec![0.0; max_frames],
            track_l: vec![0.0; max_frames],
            track_r: vec![0.0; max_frames],
        }
    }
}

/// Resolve `beat` against the loop region, wrapping if enabled and past
/// `loop_end` (spec §4.5 step 2b).
#[inline]
fn wrap_beat(beat: f64, loop_region: &LoopRegion) -> f64 {
    if loop_region.enabled && beat >= loop_region.end_beat {
        let span = loop_region.end_beat - loop_region.start_beat;
        loop_region.start_beat + (beat - loop_region.start_beat).rem_euclid(span)
    } else {
        beat
    }
}

/// Constant-power pan gains for a track: `a = (pan + 1) * pi/4`,
/// `gL = cos(a) * vol`, `gR = sin(a) * vol` (spec §4.5 step 1).
#[inline]
fn pan_gains(pan: f32, vol: f32) -> (f32, f32) {
    let a = (pan + 1.0) * std::f32::consts::FRAC_PI_4;
    (a.cos() * vol, a.sin() * vol)
}

#[inline]
fn follow_peak(peak: f32, sample: f32) -> f32 {
    sample.abs().max(peak * PEAK_DECAY)
}

/// Mix `n_frames` of stereo output into `out` (interleaved L/R, length
/// `n_frames * 2`).
///
/// Contract (spec §4.5): writes exactly `n_frames * 2` samples, never
/// blocks beyond the Scene lock, never allocates. Silences the buffer and
/// leaves the playhead untouched unless the transport is Playing or
/// Recording.
pub fn mix(scene: &mut Scene, scratch: &mut MixScratch, out: &mut [f32], n_frames: usize) {
    debug_assert!(out.len() >= n_frames * 2);

    if !scene.transport.state.is_audible() {
        out[..n_frames * 2].fill(0.0);
        return;
    }

    let bpm = scene.transport.bpm();
    let sample_rate = scene.config.sample_rate as f64;
    let seconds_per_beat = 60.0 / bpm;
    let seconds_per_frame = 1.0 / sample_rate;
    let beats_per_frame = seconds_per_frame / seconds_per_beat;

    scratch.mix_l[..n_frames].fill(0.0);
    scratch.mix_r[..n_frames].fill(0.0);

    let position_beats = scene.transport.position_beats;
    let loop_region = scene.transport.loop_region;
    let any_solo = scene.any_solo;

    for track in scene.tracks_mut() {
        if !track.is_audio() || track.mute {
            continue;
        }
        if any_solo && !track.solo {
            continue;
        }

        let (g_l, g_r) = pan_gains(track.pan(), track.volume());

        scratch.track_l[..n_frames].fill(0.0);
        scratch.track_r[..n_frames].fill(0.0);

        for clip in track.clips_mut() {
            if !clip.active {
                continue;
            }
            for f in 0..n_frames {
                let beat_at = wrap_beat(position_beats + f as f64 * beats_per_frame, &loop_region);

                if beat_at < clip.start_beat || beat_at >= clip.end_beat() {
                    continue;
                }

                let offset = (beat_at - clip.start_beat) / clip.len_beats;
                let frame_index = (offset * clip.n_frames() as f64).floor() as usize;
                if frame_index >= clip.n_frames() {
                    continue;
                }

                scratch.track_l[f] += clip.left()[frame_index] * g_l;
                scratch.track_r[f] += clip.right()[frame_index] * g_r;
            }
        }

        // Peak follower runs once per frame over the track's summed
        // contribution, including frames with no active clip, so the
        // meter decays (spec §4.5) instead of freezing once clips stop
        // contributing and double-decaying when clips overlap.
        let mut peak_l = track.peak_l;
        let mut peak_r = track.peak_r;
        for f in 0..n_frames {
            scratch.mix_l[f] += scratch.track_l[f];
            scratch.mix_r[f] += scratch.track_r[f];
            peak_l = follow_peak(peak_l, scratch.track_l[f]);
            peak_r = follow_peak(peak_r, scratch.track_r[f]);
        }
        track.peak_l = peak_l;
        track.peak_r = peak_r;
    }

    let master_vol = scene.master_volume();
    let (mut master_peak_l, mut master_peak_r) = scene.master_peaks.load();

    for f in 0..n_frames {
        let l = (scratch.mix_l[f] * master_vol).clamp(-1.0, 1.0);
        let r = (scratch.mix_r[f] * master_vol).clamp(-1.0, 1.0);
        out[f * 2] = l;
        out[f * 2 + 1] = r;
        master_peak_l = follow_peak(master_peak_l, l);
        master_peak_r = follow_peak(master_peak_r, r);
    }

    scene.master_peaks.store(master_peak_l, master_peak_r);

    scene.transport.position_seconds += n_frames as f64 * seconds_per_frame;
    scene.transport.position_beats += n_frames as f64 * seconds_per_frame / seconds_per_beat;

    if loop_region.enabled && scene.transport.position_beats >= loop_region.end_beat {
        scene.transport.position_beats = loop_region.start_beat;
        scene.transport.position_seconds = loop_region.start_beat * seconds_per_beat;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{SceneConfig, TrackKind};
    use crate::state::Clip;

    fn impulse_scene(sample_rate: u32, bpm: f64, n_frames: usize) -> (Scene, crate::state::TrackId) {
        let mut scene = Scene::new(SceneConfig {
            sample_rate,
            bit_depth: 24,
            buffer_frames: n_frames as u32,
        });
        scene.transport.set_bpm(bpm);
        scene.transport.state = TransportState::Playing;
        let id = scene.create_track(TrackKind::Audio).unwrap();
        let len_beats = n_frames as f64 * bpm / (sample_rate as f64 * 60.0);
        let mut left = vec![0.0f32; n_frames];
        left[0] = 1.0;
        let right = left.clone();
        let clip = Clip::new(left, right, 0.0, len_beats);
        scene.find_track_mut(id).unwrap().push_clip(clip);
        (scene, id)
    }

    #[test]
    fn s1_silence_with_no_tracks() {
        let mut scene = Scene::new(SceneConfig {
            sample_rate: 48_000,
            bit_depth: 24,
            buffer_frames: 64,
        });
        scene.transport.set_bpm(120.0);
        scene.transport.state = TransportState::Playing;
        let mut scratch = MixScratch::new(64);
        let mut out = vec![0.0f32; 128];
        mix(&mut scene, &mut scratch, &mut out, 64);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(scene.transport.position_beats, 0.0);
    }

    #[test]
    fn s1b_silence_when_stopped() {
        let mut scene = Scene::new(SceneConfig::default());
        let mut scratch = MixScratch::new(64);
        let mut out = vec![1.0f32; 128];
        mix(&mut scene, &mut scratch, &mut out, 64);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn s2_unit_impulse_centered() {
        let (mut scene, _) = impulse_scene(48_000, 120.0, 4);
        let mut scratch = MixScratch::new(4);
        let mut out = vec![0.0f32; 8];
        mix(&mut scene, &mut scratch, &mut out, 4);
        let expected = (std::f32::consts::FRAC_PI_4).cos();
        assert!((out[0] - expected).abs() < 1e-5);
        assert!((out[1] - expected).abs() < 1e-5);
        for &s in &out[2..8] {
            assert_eq!(s, 0.0);
        }
    }

    #[test]
    fn s3_pan_law_hard_right() {
        let (mut scene, id) = impulse_scene(48_000, 120.0, 4);
        scene.find_track_mut(id).unwrap().set_pan(1.0);
        let mut scratch = MixScratch::new(4);
        let mut out = vec![0.0f32; 8];
        mix(&mut scene, &mut scratch, &mut out, 4);
        assert!(out[0].abs() < 1e-6);
        assert!((out[1] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn s4_master_volume_clips() {
        let sample_rate = 48_000u32;
        let bpm = 120.0;
        let n_frames = 4usize;
        let mut scene = Scene::new(SceneConfig {
            sample_rate,
            bit_depth: 24,
            buffer_frames: n_frames as u32,
        });
        scene.transport.set_bpm(bpm);
        scene.transport.state = TransportState::Playing;
        let id = scene.create_track(TrackKind::Audio).unwrap();
        let len_beats = n_frames as f64 * bpm / (sample_rate as f64 * 60.0);
        let mut left = vec![0.0f32; n_frames];
        left[0] = 0.8;
        let right = left.clone();
        scene
            .find_track_mut(id)
            .unwrap()
            .push_clip(Clip::new(left, right, 0.0, len_beats));
        scene.set_master_volume(2.0);

        let mut scratch = MixScratch::new(n_frames);
        let mut out = vec![0.0f32; n_frames * 2];
        mix(&mut scene, &mut scratch, &mut out, n_frames);
        let expected = (0.8 * std::f32::consts::FRAC_PI_4.cos() * 2.0).clamp(-1.0, 1.0);
        assert_eq!(expected, 1.0);
        assert!((out[0] - expected).abs() < 1e-5);
    }

    #[test]
    fn s5_loop_wrap_never_reaches_end() {
        let mut scene = Scene::new(SceneConfig {
            sample_rate: 48_000,
            bit_depth: 24,
            buffer_frames: 48_000,
        });
        scene.transport.set_bpm(120.0);
        scene.transport.state = TransportState::Playing;
        scene.transport.set_loop(true, 0.0, 2.0);
        let mut scratch = MixScratch::new(48_000);
        let mut out = vec![0.0f32; 96_000];
        mix(&mut scene, &mut scratch, &mut out, 48_000);
        assert!(scene.transport.position_beats < 2.0);
        assert!(scene.transport.position_beats >= 0.0);
        mix(&mut scene, &mut scratch, &mut out, 48_000);
        assert!(scene.transport.position_beats < 2.0);
    }

    #[test]
    fn track_peak_decays_once_the_impulse_has_passed() {
        let (mut scene, id) = impulse_scene(48_000, 120.0, 1);
        let mut scratch = MixScratch::new(1);
        let mut out = vec![0.0f32; 2];

        // Frame 0: the impulse sample itself.
        mix(&mut scene, &mut scratch, &mut out, 1);
        let peak_after_impulse = scene.find_track_mut(id).unwrap().peak_l;
        assert!(peak_after_impulse > 0.0);

        // The clip only covers one frame; every callback after this one
        // contributes silence, so the meter must keep decaying rather than
        // freezing at `peak_after_impulse`.
        for _ in 0..5 {
            mix(&mut scene, &mut scratch, &mut out, 1);
        }
        let peak_after_silence = scene.find_track_mut(id).unwrap().peak_l;
        assert!(peak_after_silence < peak_after_impulse);
        assert!((peak_after_silence - peak_after_impulse * PEAK_DECAY.powi(5)).abs() < 1e-6);
    }

    #[test]
    fn solo_mutes_non_soloed_tracks() {
        let (mut scene, _a) = impulse_scene(48_000, 120.0, 4);
        let b = scene.create_track(TrackKind::Audio).unwrap();
        let mut left = vec![0.0f32; 4];
        left[0] = 1.0;
        let right = left.clone();
        scene
            .find_track_mut(b)
            .unwrap()
            .push_clip(Clip::new(left, right, 0.0, 4.0 * 120.0 / (48_000.0 * 60.0)));
        scene.find_track_mut(b).unwrap().solo = true;
        scene.refresh_any_solo();

        let mut scratch = MixScratch::new(4);
        let mut out = vec![0.0f32; 8];
        mix(&mut scene, &mut scratch, &mut out, 4);
        // Only the soloed track (b) should contribute; a is silenced.
        let expected = std::f32::consts::FRAC_PI_4.cos();
        assert!((out[0] - expected).abs() < 1e-5);
    }

    proptest::proptest! {
        #[test]
        fn pan_gains_are_constant_power(pan in -1.0f32..=1.0, vol in 0.0f32..=2.0) {
            let (g_l, g_r) = pan_gains(pan, 1.0);
            let sum_sq = g_l * g_l + g_r * g_r;
            prop_assert!((sum_sq - 1.0).abs() < 1e-6);
            // scaling by volume scales gains linearly, power by vol^2
            let (g_l_v, g_r_v) = pan_gains(pan, vol);
            let sum_sq_v = g_l_v * g_l_v + g_r_v * g_r_v;
            prop_assert!((sum_sq_v - vol * vol).abs() < 1e-5);
        }

        #[test]
        fn wrap_beat_never_reaches_loop_end(
            beat in 0.0f64..1000.0,
            start in 0.0f64..10.0,
            span in 0.1f64..10.0,
        ) {
            let region = LoopRegion { enabled: true, start_beat: start, end_beat: start + span };
            let wrapped = wrap_beat(beat, &region);
            prop_assert!(wrapped < region.end_beat);
            prop_assert!(wrapped >= region.start_beat);
        }
    }
}
