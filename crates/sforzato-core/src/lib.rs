//! Shared infrastructure for the sforzato instrument-bank loaders.
//!
//! This crate carries everything the format-specific loaders have in
//! common:
//! - the synthesis data model (generators, modulators, zones, presets,
//!   samples) that both bank formats normalize into
//! - note-on parameter resolution over that model
//! - the injected file I/O abstraction and the RIFF chunk reader
//! - the process-wide, reference-counted sample cache
//! - the `SoundFont` trait that hosts program against
//!
//! The loaders themselves live in `sforzato-sf2` (SoundFont 2 banks) and
//! `sforzato-dls` (Downloadable Sounds banks).

pub mod cache;
pub mod error;
pub mod font;
pub mod gen;
pub mod io;
pub mod modulator;
pub mod resolve;
pub mod riff;
pub mod types;

pub use cache::{CacheKey, CachedSample, SampleCache, SampleUse, SampleUseGuard};
pub use error::{LoadError, Result};
pub use font::{LoaderSettings, PresetHeader, SoundFont, VoiceInit};
pub use gen::GenId;
pub use io::{FileIo, IoHandle, IoProvider, MemoryIo};
pub use modulator::{ModSource, Modulator};
pub use riff::{Chunk, FourCc, Reader};
pub use types::{Instrument, KeyVelRange, Preset, Sample, Zone};
