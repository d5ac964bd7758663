// src/state/transport.rs
//
// Musical transport: play state, tempo, playhead, loop region.
//
// Unlike the split RT/non-RT transport some node-graph engines use, this
// transport is a single struct living inside the Scene, written under the
// Scene mutex by control operations and read under the same mutex by the
// mixer once per callback (spec §4.2, §5).

/// Transport play state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Playing,
    Paused,
    Recording,
}

impl TransportState {
    /// Whether the mixer should produce audio in this state.
    #[inline]
    pub fn is_audible(self) -> bool {
        matches!(self, TransportState::Playing | TransportState::Recording)
    }
}

/// Loop region. Valid (enabled) only when `end > start`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopRegion {
    pub enabled: bool,
    pub start_beat: f64,
    pub end_beat: f64,
}

/// The transport: playhead, tempo, and loop region.
#[derive(Debug, Clone)]
pub struct Transport {
    pub state: TransportState,
    bpm: f64,
    pub position_beats: f64,
    pub position_seconds: f64,
    pub loop_region: LoopRegion,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            state: TransportState::Stopped,
            bpm: 120.0,
            position_beats: 0.0,
            position_seconds: 0.0,
            loop_region: LoopRegion::default(),
        }
    }
}

impl Transport {
    #[inline]
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// `set_bpm`: requires `1 <= bpm <= 999` (spec §4.2).
    pub fn set_bpm(&mut self, bpm: f64) -> bool {
        if !(1.0..=999.0).contains(&bpm) {
            return false;
        }
        self.bpm = bpm;
        true
    }

    /// Recompute `position_seconds` from `position_beats` at the current tempo.
    pub fn sync_seconds(&mut self) {
        self.position_seconds = self.position_beats * 60.0 / self.bpm;
    }

    /// `seek(beat)`: requires `beat >= 0` (spec §4.2).
    pub fn seek(&mut self, beat: f64) -> bool {
        if beat < 0.0 {
            return false;
        }
        self.position_beats = beat;
        self.sync_seconds();
        true
    }

    /// `stop`: reset the playhead to zero (spec §4.2).
    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
        self.position_beats = 0.0;
        self.position_seconds = 0.0;
    }

    /// `pause`: only takes effect while Playing (spec §4.2).
    pub fn pause(&mut self) {
        if self.state == TransportState::Playing {
            self.state = TransportState::Paused;
        }
    }

    /// `set_loop(enabled, start, end)`: requires `end > start` (spec §4.2).
    pub fn set_loop(&mut self, enabled: bool, start: f64, end: f64) -> bool {
        if end <= start {
            return false;
        }
        self.loop_region = LoopRegion {
            enabled,
            start_beat: start,
            end_beat: end,
        };
        true
    }

    /// Derived 1-based bar/beat coordinates, assuming 4/4 (spec §4.1).
    pub fn bar_beat(&self) -> (u32, u32) {
        let bar = (self.position_beats / 4.0).floor() as i64 + 1;
        let beat = (self.position_beats.rem_euclid(4.0)).floor() as i64 + 1;
        (bar.max(1) as u32, beat.max(1) as u32)
    }
}
