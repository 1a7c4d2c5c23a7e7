//! Split (multi-datagram) response reassembly.
//!
//! Answers too large for one datagram arrive as fragments, each led by the
//! `-2` marker. Layout after the marker:
//!
//! | generation | field      | width                                        |
//! |------------|------------|----------------------------------------------|
//! | both       | id         | 32 bits, LE (Source: top bit = compressed)   |
//! | GoldSource | total      | low 4 bits of one byte                       |
//! | GoldSource | index      | high 4 bits of the same byte                 |
//! | Source     | total      | 8 bits                                       |
//! | Source     | index      | 8 bits                                       |
//! | Source     | split size | 16 bits, LE                                  |
//!
//! The rest of the datagram is payload. Payloads joined in index order form
//! one simple response, unless fragment 0 is flagged compressed, in which
//! case they hold a bzip2 stream preceded by its size and CRC32.
use std::io::Read;

use bzip2::read::BzDecoder;
use log::{debug, warn};

use crate::config::EngineGeneration;
use crate::error::{Result, SourceQueryError};
use crate::packet::PacketHeader;
use crate::parse::PacketReader;

/// Refuse to decompress anything claiming to be larger than this.
pub const MAX_DECOMPRESSED_SIZE: u32 = 1024 * 1024;

const COMPRESSED_FLAG: u32 = 0x8000_0000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Correlates the fragments of one answer.
    pub id: u32,
    pub total: u8,
    pub index: u8,
    /// Maximum fragment size the server splits at. Source only.
    pub split_size: Option<u16>,
    pub compressed: bool,
    pub payload: Vec<u8>,
}

impl Fragment {
    /// Decode one split datagram, marker included.
    pub fn decode(datagram: &[u8], generation: EngineGeneration) -> Result<Self> {
        let mut reader = PacketReader::new(datagram);

        match PacketHeader::read(&mut reader)? {
            PacketHeader::Split => {}
            PacketHeader::Single => {
                return Err(SourceQueryError::HeaderMismatch(-1));
            }
        }

        let id = reader.read_u32()?;
        let fragment = match generation {
            EngineGeneration::GoldSource => {
                let packed = reader.read_u8()?;
                Fragment {
                    id,
                    total: packed & 0x0F,
                    index: packed >> 4,
                    split_size: None,
                    compressed: false,
                    payload: Vec::new(),
                }
            }
            EngineGeneration::Source => Fragment {
                id,
                total: reader.read_u8()?,
                index: reader.read_u8()?,
                split_size: Some(reader.read_u16()?),
                compressed: id & COMPRESSED_FLAG != 0,
                payload: Vec::new(),
            },
        };

        Ok(Fragment {
            payload: datagram[reader.position()..].to_vec(),
            ..fragment
        })
    }
}

/// Collects the fragments of one split answer.
#[derive(Debug)]
pub struct Reassembler {
    id: u32,
    slots: Vec<Option<Fragment>>,
    received: usize,
}

impl Reassembler {
    /// Start collecting with the first fragment received, whichever index it has.
    /// Its declared total fixes the number of slots.
    pub fn new(first: Fragment) -> Result<Self> {
        if first.total == 0 {
            return Err(SourceQueryError::EmptySplitResponse);
        }

        let mut reassembler = Reassembler {
            id: first.id,
            slots: vec![None; first.total as usize],
            received: 0,
        };
        reassembler.push(first)?;
        Ok(reassembler)
    }

    /// Store a fragment in its slot.
    ///
    /// Fragments of a different answer are dropped.
    pub fn push(&mut self, fragment: Fragment) -> Result<()> {
        if fragment.id != self.id {
            warn!(
                "dropping fragment of answer {:#010x} while collecting {:#010x}",
                fragment.id, self.id
            );
            return Ok(());
        }

        let total = self.slots.len();
        let slot = self
            .slots
            .get_mut(fragment.index as usize)
            .ok_or(SourceQueryError::FragmentOutOfRange {
                index: fragment.index,
                total: total as u8,
            })?;
        if slot.is_some() {
            return Err(SourceQueryError::DuplicateFragment(fragment.index));
        }

        debug!(
            "received fragment {}/{} ({} bytes)",
            fragment.index + 1,
            total,
            fragment.payload.len()
        );
        *slot = Some(fragment);
        self.received += 1;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.received == self.slots.len()
    }

    /// Number of fragments still missing.
    pub fn missing(&self) -> usize {
        self.slots.len() - self.received
    }

    /// Join the payloads in index order, decompressing and verifying them if
    /// fragment 0 says so.
    pub fn finish(self) -> Result<Vec<u8>> {
        let total = self.slots.len() as u8;
        let mut fragments = Vec::with_capacity(self.slots.len());
        for (index, slot) in self.slots.into_iter().enumerate() {
            match slot {
                Some(fragment) => fragments.push(fragment),
                None => {
                    return Err(SourceQueryError::MissingFragment {
                        index: index as u8,
                        total,
                    })
                }
            }
        }

        let compressed = fragments[0].compressed;
        let payload: Vec<u8> = fragments
            .into_iter()
            .flat_map(|fragment| fragment.payload)
            .collect();

        if compressed {
            decompress(&payload)
        } else {
            Ok(payload)
        }
    }
}

/// Unpack `size (u32 LE) | crc32 (u32 LE) | bzip2 stream`.
fn decompress(payload: &[u8]) -> Result<Vec<u8>> {
    let mut reader = PacketReader::new(payload);
    let size = reader.read_u32()?;
    let checksum = reader.read_u32()?;

    if size > MAX_DECOMPRESSED_SIZE {
        return Err(SourceQueryError::DecompressedSizeTooLarge(size));
    }

    let compressed = &payload[reader.position()..];
    let mut decompressed = Vec::with_capacity(size as usize);
    // one byte past the declared size is enough to notice an overrun
    BzDecoder::new(compressed)
        .take(u64::from(size) + 1)
        .read_to_end(&mut decompressed)
        .map_err(SourceQueryError::Decompression)?;

    if decompressed.len() != size as usize {
        return Err(SourceQueryError::DecompressedSizeMismatch {
            expected: size,
            actual: decompressed.len(),
        });
    }

    let actual = crc32fast::hash(&decompressed);
    if actual != checksum {
        return Err(SourceQueryError::ChecksumMismatch {
            expected: checksum,
            actual,
        });
    }

    debug!(
        "decompressed split answer: {} -> {} bytes",
        compressed.len(),
        decompressed.len()
    );
    Ok(decompressed)
}
