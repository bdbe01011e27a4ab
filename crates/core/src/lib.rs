pub mod config;
pub mod engine_backend;
pub mod event;
pub mod gesture;
pub mod host;
pub mod mute;
pub mod orchestrator;
pub mod registry;

#[cfg(test)]
mod fake;

pub use config::{AudioConfig, AutoplayPolicy};
pub use engine_backend::{BackendError, EngineBackend};
pub use event::Event;
pub use host::{AudioBackend, GestureKind, PageHost, PlayOutcome, ReadyState, Timer};
pub use mute::ButtonStyle;
pub use orchestrator::{Orchestrator, PageKind, Parts, Stage};
pub use registry::{AudioTrack, Registry, TrackPhase};

pub use hook_decode::{decode_file, fallback_source};
pub use hook_store::{FileStore, KeyValueStore, MemoryStore, Persistence, StoreError};
pub use hook_transport::{LoopPolicy, TrackId, TrackSpec};
