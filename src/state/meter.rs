// src/state/meter.rs
//
// Lock-free peak storage for the master bus.
//
// `get_master_peaks` (spec §4.3, §5) must be readable without contending
// with the realtime mixer's hold on the Scene mutex, so the master peak
// values live in a pair of atomics shared between the mixer and the
// control layer, instead of as plain fields read through the same lock
// everything else in `Scene` goes through.

use std::sync::atomic::{AtomicU32, Ordering};

/// Lock-free (L, R) peak-follower state for the master bus.
///
/// Stored as bit-pattern `AtomicU32`s rather than `AtomicF32` (which
/// doesn't exist in `std`). `Relaxed` ordering is enough: a torn read
/// across the L/R pair is acceptable for a meter (spec §5).
#[derive(Debug, Default)]
pub struct MasterPeaks {
    l: AtomicU32,
    r: AtomicU32,
}

impl MasterPeaks {
    /// Current (L, R) peak values. Callable from any thread without
    /// touching the Scene mutex.
    pub fn load(&self) -> (f32, f32) {
        (
            f32::from_bits(self.l.load(Ordering::Relaxed)),
            f32::from_bits(self.r.load(Ordering::Relaxed)),
        )
    }

    /// Overwrite both channels. Called once per callback by the mixer,
    /// which already holds the Scene lock for the mutation it's doing —
    /// the atomic store itself needs no lock.
    pub fn store(&self, l: f32, r: f32) {
        self.l.store(l.to_bits(), Ordering::Relaxed);
        self.r.store(r.to_bits(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bit_pattern() {
        let peaks = MasterPeaks::default();
        peaks.store(0.25, -0.5);
        assert_eq!(peaks.load(), (0.25, -0.5));
    }

    #[test]
    fn defaults_to_silence() {
        let peaks = MasterPeaks::default();
        assert_eq!(peaks.load(), (0.0, 0.0));
    }
}
