// Declarative state layer: tracks, clips, transport, and the scene that
// aggregates them.
//
// Everything here is plain data with no synchronization of its own. The
// control layer (`crate::control`) owns a `Mutex<Scene>` and is the only
// thing that mutates or reads this state concurrently with the realtime
// mixer.

mod clip;
mod meter;
mod scene;
mod track;
mod transport;

pub use clip::Clip;
pub use meter::MasterPeaks;
pub use scene::{Scene, SceneConfig, MAX_TRACKS};
pub use track::{Track, TrackId, TrackKind, MAX_CLIPS_PER_TRACK};
pub use transport::{LoopRegion, Transport, TransportState};
