//! Downloadable Sounds (Format B) bank loader.
//!
//! A DLS bank is one RIFF container holding a pool table, a wave pool,
//! and an instrument collection whose regions link into the pool by
//! index. Loading walks the container front to back:
//!
//! - [`cdl`] evaluates embedded conditional-load expressions that can
//!   switch off the bank, an articulation list or a region
//! - [`art`] converts connection blocks into generator values and
//!   modulators of the shared data model
//! - [`wave`] parses wave pool entries and expands 8-bit and companded
//!   sample data to 16-bit
//! - [`font`] ties it together and serves the
//!   [`sforzato_core::SoundFont`] interface
//!
//! Most hosts only need [`load_file`].

pub mod art;
pub mod cdl;
pub mod chunks;
pub mod font;
pub mod wave;
#[cfg(test)]
pub(crate) mod testutil;

pub use font::DlsFont;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use sforzato_core::cache::SampleCache;
use sforzato_core::font::LoaderSettings;
use sforzato_core::io::FileIo;

/// Load a bank from the filesystem, sharing sample data through the
/// process-wide cache.
pub fn load_file(path: impl AsRef<Path>, settings: LoaderSettings) -> anyhow::Result<DlsFont> {
    let path = path.as_ref();
    let font = DlsFont::load(Arc::new(FileIo), path, settings, SampleCache::global())
        .with_context(|| format!("failed to load DLS bank {}", path.display()))?;
    Ok(font)
}
