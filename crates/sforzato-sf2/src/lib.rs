//! SoundFont 2 (Format A) bank loader.
//!
//! A bank file is one RIFF container holding version metadata, a block
//! of 16-bit sample data, and the hydra: nine record tables describing
//! presets, instruments and samples. Loading goes in three steps:
//!
//! - [`hydra`] parses the container into a raw structure tree
//! - [`fixup`] validates references and repairs sample headers
//! - [`font`] converts the tree into the shared data model and serves
//!   the [`sforzato_core::SoundFont`] interface over it
//!
//! Most hosts only need [`load_file`].

pub mod fixup;
pub mod font;
pub mod hydra;
#[cfg(test)]
pub(crate) mod testutil;

pub use font::Sf2Font;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use sforzato_core::cache::SampleCache;
use sforzato_core::font::LoaderSettings;
use sforzato_core::io::FileIo;

/// Load a bank from the filesystem, sharing sample data through the
/// process-wide cache.
pub fn load_file(path: impl AsRef<Path>, settings: LoaderSettings) -> anyhow::Result<Sf2Font> {
    let path = path.as_ref();
    let font = Sf2Font::load(Arc::new(FileIo), path, settings, SampleCache::global())
        .with_context(|| format!("failed to load SoundFont bank {}", path.display()))?;
    Ok(font)
}
