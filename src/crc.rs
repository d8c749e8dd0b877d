//! Block CRC gating (§4.1). A block is never decoded unless its CRC matches.

use crc::{Crc, CRC_32_ISO_HDLC};

const BLOCK_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Computes the checksum the way `validate` expects to find it: over every
/// byte of the block except the CRC field itself.
pub fn checksum(bytes_excluding_crc_field: &[u8]) -> u32 {
    BLOCK_CRC.checksum(bytes_excluding_crc_field)
}
