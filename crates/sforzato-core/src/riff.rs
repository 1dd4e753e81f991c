//! RIFF chunk reading over injected I/O.
//!
//! Both supported bank formats are RIFF containers: a tree of chunks,
//! each with a four-character id and a little-endian 32-bit payload
//! size. `RIFF` and `LIST` chunks nest; everything else is a leaf.
//! Odd-sized chunks are followed by a pad byte that is not counted in
//! the size field.

use std::fmt;
use std::io::{self, Read, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;

use crate::error::{LoadError, Result};
use crate::io::IoHandle;

/// Four-character chunk identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const fn new(id: &[u8; 4]) -> Self {
        FourCc(*id)
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({})", self)
    }
}

pub const RIFF: FourCc = FourCc::new(b"RIFF");
pub const LIST: FourCc = FourCc::new(b"LIST");

/// One vendor tool writes a 'crs1' chunk whose size field is garbage.
/// The payload of that chunk is always 28 bytes.
const CRS1: FourCc = FourCc::new(b"crs1");
const CRS1_SIZE: u32 = 28;

/// Whether a chunk is a leaf or one of the two container kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkKind {
    Plain,
    Riff,
    List,
}

/// A chunk header as read from the stream.
///
/// For `RIFF`/`LIST` chunks the four-byte form type has already been
/// consumed: `id` holds the form type and `size` the remaining payload.
#[derive(Clone, Copy, Debug)]
pub struct Chunk {
    pub id: FourCc,
    pub size: u32,
    pub kind: ChunkKind,
}

impl Chunk {
    pub fn is_list(&self) -> bool {
        self.kind != ChunkKind::Plain
    }

    /// Bytes to skip past the payload, including the RIFF pad byte.
    pub fn padded_size(&self) -> u32 {
        self.size + (self.size & 1)
    }
}

/// Sequential chunk reader over an open bank file.
///
/// Also implements `std::io::Read`, so `byteorder`'s extension methods
/// work on it directly for decoding record fields.
pub struct Reader<'a> {
    file: &'a mut dyn IoHandle,
}

impl<'a> Reader<'a> {
    pub fn new(file: &'a mut dyn IoHandle) -> Self {
        Reader { file }
    }

    /// Read the next chunk header.
    pub fn chunk(&mut self) -> Result<Chunk> {
        let mut id = [0u8; 4];
        self.read_exact(&mut id)?;
        let raw = FourCc(id);
        let mut size = self.read_u32::<LittleEndian>()?;
        if raw == RIFF || raw == LIST {
            if size < 4 {
                return Err(LoadError::BadChunkSize(raw));
            }
            let mut form = [0u8; 4];
            self.read_exact(&mut form)?;
            Ok(Chunk {
                id: FourCc(form),
                size: size - 4,
                kind: if raw == RIFF {
                    ChunkKind::Riff
                } else {
                    ChunkKind::List
                },
            })
        } else {
            if raw == CRS1 {
                debug!("'crs1' chunk: overriding bogus size {} with {}", size, CRS1_SIZE);
                size = CRS1_SIZE;
            }
            Ok(Chunk {
                id: raw,
                size,
                kind: ChunkKind::Plain,
            })
        }
    }

    /// Read the next chunk header and require a leaf chunk with this id.
    pub fn expect_chunk(&mut self, id: FourCc) -> Result<Chunk> {
        let chunk = self.chunk()?;
        if chunk.is_list() || chunk.id != id {
            return Err(LoadError::UnexpectedChunk {
                expected: id,
                found: chunk.id,
            });
        }
        Ok(chunk)
    }

    /// Read the next chunk header and require a LIST with this form type.
    pub fn expect_list(&mut self, form: FourCc) -> Result<Chunk> {
        let chunk = self.chunk()?;
        if chunk.kind != ChunkKind::List || chunk.id != form {
            return Err(LoadError::UnexpectedChunk {
                expected: form,
                found: chunk.id,
            });
        }
        Ok(chunk)
    }

    /// Walk every sub-chunk of a list payload of `size` bytes, restoring
    /// the stream position past each one regardless of how much `body`
    /// consumed.
    pub fn each_subchunk(
        &mut self,
        size: u32,
        body: &mut dyn FnMut(&mut Reader<'_>, &Chunk) -> Result<()>,
    ) -> Result<()> {
        let end = self.tell()? + u64::from(size);
        while self.tell()? < end {
            let chunk = self.chunk()?;
            let payload_start = self.tell()?;
            let next = payload_start + u64::from(chunk.padded_size());
            if next > end + 1 {
                return Err(LoadError::BadChunkSize(chunk.id));
            }
            body(self, &chunk)?;
            self.seek_to(next)?;
        }
        Ok(())
    }

    pub fn read_fourcc(&mut self) -> Result<FourCc> {
        let mut id = [0u8; 4];
        self.read_exact(&mut id)?;
        Ok(FourCc(id))
    }

    /// Read `len` bytes as a NUL-terminated fixed-size string field.
    pub fn read_fixed_str(&mut self, len: usize) -> Result<String> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        let end = buf.iter().position(|&b| b == 0).unwrap_or(len);
        Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
    }

    pub fn skip(&mut self, bytes: u64) -> Result<()> {
        self.file.seek(SeekFrom::Current(bytes as i64))?;
        Ok(())
    }

    pub fn tell(&mut self) -> Result<u64> {
        Ok(self.file.tell()?)
    }

    pub fn seek_to(&mut self, pos: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(pos))?;
        Ok(())
    }
}

impl Read for Reader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{IoProvider, MemoryIo};
    use std::path::Path;

    fn reader_over(data: Vec<u8>) -> Box<dyn IoHandle> {
        let mut io = MemoryIo::new();
        io.insert("/t", data);
        io.open(Path::new("/t")).unwrap()
    }

    #[test]
    fn test_leaf_chunk() {
        let mut data = b"abcd".to_vec();
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&[9, 9, 9, 0]); // payload + pad
        let mut file = reader_over(data);
        let mut r = Reader::new(&mut *file);
        let c = r.chunk().unwrap();
        assert_eq!(c.id, FourCc::new(b"abcd"));
        assert_eq!(c.size, 3);
        assert_eq!(c.padded_size(), 4);
        assert!(!c.is_list());
    }

    #[test]
    fn test_list_chunk_reports_form_type() {
        let mut data = b"LIST".to_vec();
        data.extend_from_slice(&12u32.to_le_bytes());
        data.extend_from_slice(b"INFO");
        data.extend_from_slice(&[0; 8]);
        let mut file = reader_over(data);
        let mut r = Reader::new(&mut *file);
        let c = r.chunk().unwrap();
        assert_eq!(c.id, FourCc::new(b"INFO"));
        assert_eq!(c.size, 8);
        assert_eq!(c.kind, ChunkKind::List);
    }

    #[test]
    fn test_crs1_size_override() {
        let mut data = b"crs1".to_vec();
        data.extend_from_slice(&0xdead_beefu32.to_le_bytes());
        let mut file = reader_over(data);
        let mut r = Reader::new(&mut *file);
        let c = r.chunk().unwrap();
        assert_eq!(c.size, 28);
    }

    #[test]
    fn test_each_subchunk_skips_pad_bytes() {
        // two leaf chunks, the first odd-sized
        let mut data = Vec::new();
        data.extend_from_slice(b"one ");
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&[7, 0]); // payload + pad
        data.extend_from_slice(b"two ");
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&[1, 2]);
        let total = data.len() as u32;
        let mut file = reader_over(data);
        let mut r = Reader::new(&mut *file);
        let mut seen = Vec::new();
        r.each_subchunk(total, &mut |_, c| {
            seen.push((c.id, c.size));
            Ok(())
        })
        .unwrap();
        assert_eq!(
            seen,
            vec![(FourCc::new(b"one "), 1), (FourCc::new(b"two "), 2)]
        );
    }
}
