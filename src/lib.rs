// src/lib.rs
//
// Library entry point for FFI and Rust consumers.

mod backend;
mod control;
mod decoder;
mod error;
pub mod ffi;
mod mixer;
mod state;

pub use backend::{
    AudioBackend, BackendError, BackendResult, CpalBackend, MixCallback, Stream, StreamConfig,
};
pub use control::{Engine, EngineState, InitConfig, TrackInfo};
pub use decoder::{AudioDecoder, DecodedAudio, DecoderError, DecoderResult, WavDecoder};
pub use error::{strerror, ControlResult, ErrorCode};
pub use state::{Clip, Scene, SceneConfig, Track, TrackId, TrackKind, Transport, TransportState};
