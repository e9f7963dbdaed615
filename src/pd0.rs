//! PD0 ensemble framing.
//!
//! Only the outer envelope is handled here: the `0x7F 0x7F` header, the
//! little-endian byte count at offset 2 and the trailing additive checksum.
//! The leader, profile and bottom-track blocks are returned undecoded.

use log::{debug, trace};

use crate::constants::PD0_HEADER_ID;
use crate::error::{DvlError, Result};
use crate::framing::EnsembleParser;
use crate::types::Extraction;

/// Header id, data source id, byte count (2), spare, number of data types
const MIN_HEADER_SIZE: usize = 6;
const CHECKSUM_SIZE: usize = 2;

/// Frames PD0 ensembles without interpreting their contents
#[derive(Debug, Default, Clone, Copy)]
pub struct Pd0Framer;

/// One checksum-verified PD0 ensemble
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEnsemble {
    /// Header through last data type, checksum excluded
    pub bytes: Vec<u8>,
}

impl RawEnsemble {
    /// Number of data types listed in the header
    pub fn data_type_count(&self) -> usize {
        self.bytes.get(5).copied().unwrap_or(0) as usize
    }

    /// Offsets of each data type from the start of the ensemble
    pub fn data_type_offsets(&self) -> Vec<u16> {
        (0..self.data_type_count())
            .filter_map(|i| {
                let at = MIN_HEADER_SIZE + i * 2;
                self.bytes
                    .get(at..at + 2)
                    .map(|b| u16::from_le_bytes([b[0], b[1]]))
            })
            .collect()
    }

    /// Raw bytes of the data type whose two-byte id matches `id`
    pub fn data_type(&self, id: u16) -> Option<&[u8]> {
        let offsets = self.data_type_offsets();
        offsets.iter().enumerate().find_map(|(i, &start)| {
            let start = start as usize;
            let block_id = self.bytes.get(start..start + 2)?;
            if u16::from_le_bytes([block_id[0], block_id[1]]) != id {
                return None;
            }
            let end = offsets
                .get(i + 1)
                .map(|&next| next as usize)
                .unwrap_or(self.bytes.len());
            self.bytes.get(start..end)
        })
    }
}

fn checksum(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
}

impl EnsembleParser for Pd0Framer {
    type Ensemble = RawEnsemble;

    fn frame_length(&self, window: &[u8]) -> Extraction {
        for (i, &b) in window.iter().take(2).enumerate() {
            if b != PD0_HEADER_ID {
                trace!("PD0 header byte {} is {:#04X}", i, b);
                return Extraction::Malformed;
            }
        }
        if window.len() < 4 {
            return Extraction::Incomplete;
        }

        let size = u16::from_le_bytes([window[2], window[3]]) as usize;
        if size < MIN_HEADER_SIZE {
            return Extraction::Malformed;
        }
        let total = size + CHECKSUM_SIZE;
        if window.len() < total {
            return Extraction::Incomplete;
        }

        let expected = u16::from_le_bytes([window[size], window[size + 1]]);
        if checksum(&window[..size]) != expected {
            debug!("PD0 checksum mismatch, resynchronizing");
            return Extraction::Malformed;
        }
        Extraction::Frame(total)
    }

    fn decode(&mut self, frame: &[u8]) -> Result<RawEnsemble> {
        if frame.len() < MIN_HEADER_SIZE + CHECKSUM_SIZE {
            return Err(DvlError::Parse(format!("PD0 frame too short: {} bytes", frame.len())));
        }
        Ok(RawEnsemble {
            bytes: frame[..frame.len() - CHECKSUM_SIZE].to_vec(),
        })
    }
}

/// Wrap `data_types` into a complete PD0 ensemble with a valid checksum
#[cfg(test)]
pub(crate) fn build_ensemble(data_types: &[&[u8]]) -> Vec<u8> {
    let header_size = MIN_HEADER_SIZE + data_types.len() * 2;
    let size = header_size + data_types.iter().map(|d| d.len()).sum::<usize>();

    let mut frame = vec![PD0_HEADER_ID, PD0_HEADER_ID];
    frame.extend_from_slice(&(size as u16).to_le_bytes());
    frame.push(0);
    frame.push(data_types.len() as u8);
    let mut offset = header_size;
    for data in data_types {
        frame.extend_from_slice(&(offset as u16).to_le_bytes());
        offset += data.len();
    }
    for data in data_types {
        frame.extend_from_slice(data);
    }
    let sum = checksum(&frame);
    frame.extend_from_slice(&sum.to_le_bytes());
    frame
}
