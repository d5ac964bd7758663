// src/state/scene.rs
//
// Scene: the complete mutable mix state for one process.
//
// The Scene itself carries no synchronization — it is plain data. The
// control layer (`crate::control`) is the only thing that wraps it in a
// mutex, so this module stays testable without locking machinery. The one
// exception is the master peak meter: spec §5 requires `get_master_peaks`
// to read without contending with the mixer's hold on that mutex, so it is
// backed by `MasterPeaks`'s atomics rather than plain fields.

use std::sync::Arc;

use super::meter::MasterPeaks;
use super::track::{Track, TrackId, TrackKind};
use super::transport::Transport;

/// Maximum number of tracks a Scene can hold (spec §3, §6).
pub const MAX_TRACKS: usize = 64;

/// Engine configuration fixed at `init` time.
#[derive(Debug, Clone, Copy)]
pub struct SceneConfig {
    pub sample_rate: u32,
    pub bit_depth: u32,
    pub buffer_frames: u32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            bit_depth: 24,
            buffer_frames: 512,
        }
    }
}

/// The process-wide mix state: tracks, transport, master bus.
#[derive(Debug, Clone)]
pub struct Scene {
    pub config: SceneConfig,
    tracks: Vec<Track>,
    next_track_id: TrackId,

    /// Cached `true` iff any active track has `solo` set (spec §3, §4.5).
    pub any_solo: bool,

    /// Master volume, clamped to `[0, 2]`.
    master_volume: f32,

    /// Lock-free master peak meter, read by `get_master_peaks` without the
    /// Scene mutex (spec §4.3, §5) and written by the mixer once per
    /// callback.
    pub master_peaks: Arc<MasterPeaks>,

    pub transport: Transport,
}

impl Scene {
    pub fn new(config: SceneConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_track_id: 1,
            any_solo: false,
            master_volume: 1.0,
            master_peaks: Arc::new(MasterPeaks::default()),
            transport: Transport::default(),
        }
    }

    #[inline]
    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// `set_master_volume(v)`: requires `0 <= v <= 2`, clamped on write
    /// (spec §4.3, §8 invariant 2).
    pub fn set_master_volume(&mut self, v: f32) {
        self.master_volume = v.clamp(0.0, 2.0);
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn tracks_mut(&mut self) -> &mut [Track] {
        &mut self.tracks
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn find_track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn find_track_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    /// `track_create(kind)`: allocate a new track with the next id.
    ///
    /// Returns `None` when the track table is at capacity (`OutOfMemory`
    /// at the control layer).
    pub fn create_track(&mut self, kind: TrackKind) -> Option<TrackId> {
        if self.tracks.len() >= MAX_TRACKS {
            return None;
        }
        let id = self.next_track_id;
        self.next_track_id += 1;
        let index = self.tracks.len() + 1;
        let name = format!("{} {}", kind.type_name(), index);
        self.tracks.push(Track::new(id, kind, name));
        Some(id)
    }

    /// `track_destroy(id)`: remove the track and refresh `any_solo`.
    ///
    /// Returns `false` (InvalidTrack at the control layer) if no such track.
    pub fn destroy_track(&mut self, id: TrackId) -> bool {
        let before = self.tracks.len();
        self.tracks.retain(|t| t.id != id);
        let removed = self.tracks.len() != before;
        if removed {
            self.refresh_any_solo();
        }
        removed
    }

    /// Recompute the cached `any_solo` flag from current track state.
    pub fn refresh_any_solo(&mut self) {
        self.any_solo = self.tracks.iter().any(|t| t.solo);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_ids_are_monotonic_and_unique() {
        let mut scene = Scene::new(SceneConfig::default());
        let a = scene.create_track(TrackKind::Audio).unwrap();
        let b = scene.create_track(TrackKind::Audio).unwrap();
        let c = scene.create_track(TrackKind::Audio).unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn ids_are_never_reused_after_destroy() {
        let mut scene = Scene::new(SceneConfig::default());
        let a = scene.create_track(TrackKind::Audio).unwrap();
        scene.destroy_track(a);
        let b = scene.create_track(TrackKind::Audio).unwrap();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn default_name_uses_post_increment_index() {
        let mut scene = Scene::new(SceneConfig::default());
        scene.create_track(TrackKind::Audio).unwrap();
        let id = scene.create_track(TrackKind::Audio).unwrap();
        assert_eq!(scene.find_track(id).unwrap().name, "Audio 2");
    }

    #[test]
    fn track_table_rejects_past_capacity() {
        let mut scene = Scene::new(SceneConfig::default());
        for _ in 0..MAX_TRACKS {
            assert!(scene.create_track(TrackKind::Audio).is_some());
        }
        assert!(scene.create_track(TrackKind::Audio).is_none());
    }

    #[test]
    fn any_solo_refreshes_on_destroy() {
        let mut scene = Scene::new(SceneConfig::default());
        let a = scene.create_track(TrackKind::Audio).unwrap();
        scene.find_track_mut(a).unwrap().solo = true;
        scene.refresh_any_solo();
        assert!(scene.any_solo);
        scene.destroy_track(a);
        assert!(!scene.any_solo);
    }

    #[test]
    fn master_volume_clamps() {
        let mut scene = Scene::new(SceneConfig::default());
        scene.set_master_volume(10.0);
        assert_eq!(scene.master_volume(), 2.0);
        scene.set_master_volume(-5.0);
        assert_eq!(scene.master_volume(), 0.0);
    }

    proptest::proptest! {
        #[test]
        fn master_volume_always_lands_in_bounds(v in -1000.0f32..1000.0) {
            let mut scene = Scene::new(SceneConfig::default());
            scene.set_master_volume(v);
            prop_assert!((0.0..=2.0).contains(&scene.master_volume()));
        }

        #[test]
        fn ids_strictly_increase_across_a_create_destroy_sequence(ops in proptest::collection::vec(proptest::bool::ANY, 0..50)) {
            let mut scene = Scene::new(SceneConfig::default());
            let mut last_id = 0u32;
            for create in ops {
                if create || scene.track_count() == 0 {
                    let id = scene.create_track(TrackKind::Audio).unwrap();
                    prop_assert!(id > last_id);
                    last_id = id;
                } else {
                    let id = scene.tracks()[0].id;
                    scene.destroy_track(id);
                }
            }
        }
    }
}
