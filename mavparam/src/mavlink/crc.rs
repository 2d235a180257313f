//! MAVLink frame checksum: CRC-16/MCRF4XX (X.25) over the frame body, then
//! the message's CRC extra byte.

use crc::{CRC_16_MCRF4XX, Crc};

const X25: Crc<u16> = Crc::<u16>::new(&CRC_16_MCRF4XX);

/// Checksum of `body` (everything after the start byte up to the end of the
/// payload) seeded with `crc_extra`.
pub fn frame_checksum(body: &[u8], crc_extra: u8) -> u16 {
    let mut digest = X25.digest();
    digest.update(body);
    digest.update(&[crc_extra]);
    digest.finalize()
}
