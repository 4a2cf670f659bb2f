//! Constant fields of the OTA header.
//!
//! The header is written as eight little endian words. The first two
//! form the file header (firmware version and header count), the
//! remaining six form the image header parsed by the OTA agent.
use serde::{Deserialize, Serialize};

/// Number of image headers following the file header.
pub const HEADER_NUM: u32 = 0x0000_0001;
/// "OTA1", read as a little endian word.
pub const SIGNATURE_MARKER: u32 = 0x3141_544F;
/// Length of the image header, recorded in the `header_len` field.
pub const IMAGE_HEADER_LEN: u32 = 0x0000_0018;
/// Length of the file header preceding the image header.
pub const FILE_HEADER_LEN: u32 = 0x0000_0008;
/// Total serialized size of the OTA header.
pub const FULL_HEADER_SIZE: u32 = FILE_HEADER_LEN + IMAGE_HEADER_LEN;
/// Offset of the payload from the start of the OTA file.
pub const LOAD_OFFSET: u32 = FULL_HEADER_SIZE;
/// Flash address field of the AmebaD image header.
pub const RESERVED: u32 = 0x0800_B000;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderConfiguration {
    pub header_num: u32,
    pub signature_marker: u32,
    pub load_offset: u32,
    pub reserved: u32,
}

impl Default for HeaderConfiguration {
    fn default() -> Self {
        Self {
            header_num: HEADER_NUM,
            signature_marker: SIGNATURE_MARKER,
            load_offset: LOAD_OFFSET,
            reserved: RESERVED,
        }
    }
}
