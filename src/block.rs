//! Block Decoder Adapter (§4.1): CRC-gates a block, invokes the codec, and
//! translates its header's raw timestamp to µUTC.

use std::io;

use crate::codec;
use crate::crc as block_crc;
use crate::io::ReadBuffer;
use crate::time::remove_recording_time_offset;
use crate::Result;

/// Size in bytes of the fixed block header, per §3A.
pub const HEADER_BYTES: usize = 28;

/// A parsed block header, read but not yet validated or decoded.
#[derive(Debug, Clone, Copy)]
pub struct BlockHeader {
    pub block_bytes: u32,
    pub number_of_samples: u32,
    pub start_sample_relative: u64,
    pub start_time_raw: i64,
    pub crc32: u32,
}

impl BlockHeader {
    /// Reads a header from the current position of `reader`, without
    /// consuming the payload that follows it.
    pub fn read_from<R: io::Read>(reader: &mut R) -> io::Result<BlockHeader> {
        let block_bytes = reader.read_le_u32()?;
        let number_of_samples = reader.read_le_u32()?;
        let start_sample_relative = reader.read_le_u64()?;
        let start_time_raw = reader.read_le_i64()?;
        let crc32 = reader.read_le_u32()?;
        Ok(BlockHeader {
            block_bytes,
            number_of_samples,
            start_sample_relative,
            start_time_raw,
            crc32,
        })
    }
}

/// The result of a successful `decode`.
pub struct DecodedBlock {
    pub samples: Vec<i32>,
    /// µUTC start time, recording-time offset already removed.
    pub start_time_uutc: i64,
}

/// Validates a block per §4.1: the header must fit in the remaining bytes,
/// the declared size must not exceed what `max_samples` could plausibly
/// compress to, and the CRC over everything after the CRC field must match.
pub fn validate(raw_block: &[u8], remaining_bytes: usize, max_samples: u32) -> bool {
    if remaining_bytes < HEADER_BYTES {
        return false;
    }
    if raw_block.len() < HEADER_BYTES {
        return false;
    }
    let block_bytes = u32::from_le_bytes(raw_block[0..4].try_into().unwrap()) as usize;
    if block_bytes > remaining_bytes {
        return false;
    }
    // A compressed block can never be larger than one literal-coded i32 (5
    // bytes on the wire, see codec::encode) per declared sample, plus the header.
    let max_plausible = HEADER_BYTES + (max_samples as usize) * 5;
    if block_bytes > max_plausible {
        return false;
    }
    if raw_block.len() < block_bytes {
        return false;
    }
    let stored_crc = u32::from_le_bytes(raw_block[24..28].try_into().unwrap());
    let mut crc_input = Vec::with_capacity(block_bytes - 4);
    crc_input.extend_from_slice(&raw_block[0..24]);
    crc_input.extend_from_slice(&raw_block[28..block_bytes]);
    block_crc::checksum(&crc_input) == stored_crc
}

/// Decodes an already-validated block. `raw_block` must be at least
/// `header.block_bytes` long.
pub fn decode(header: &BlockHeader, raw_block: &[u8], recording_time_offset: i64) -> Result<DecodedBlock> {
    let payload = &raw_block[HEADER_BYTES..header.block_bytes as usize];
    let samples = codec::decode(payload, header.number_of_samples)?;
    Ok(DecodedBlock {
        samples,
        start_time_uutc: remove_recording_time_offset(header.start_time_raw, recording_time_offset),
    })
}
