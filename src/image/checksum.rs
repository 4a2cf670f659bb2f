//! Additive payload checksum.
//!
//! The OTA agent sums every payload byte into a 32 bit word and
//! compares the result against the header. Overflow wraps; it is part
//! of the definition, not an error.

/// Running byte sum, fed incrementally like a CRC digest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Checksum(u32);

impl Checksum {
    pub fn new() -> Self { Self(0) }

    pub fn write(&mut self, bytes: &[u8]) {
        self.0 = bytes.iter().fold(self.0, |sum, &byte| sum.wrapping_add(u32::from(byte)));
    }

    pub fn sum32(&self) -> u32 { self.0 }
}

/// Sums all bytes of `payload`, modulo 2^32.
pub fn compute_checksum(payload: &[u8]) -> u32 {
    let mut checksum = Checksum::new();
    checksum.write(payload);
    checksum.sum32()
}
