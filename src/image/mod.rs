//! OTA image construction.
//!
//! An unsigned OTA image is the [header](header::OtaHeader) followed by
//! the raw firmware payload. Before signing, the image is zero padded to
//! the flash block size of the target's OTA agent.

pub mod assembly;
pub mod checksum;
pub mod header;

pub use assembly::{assemble, pad_to_block, pad_with_policy, padding_length};
pub use checksum::{compute_checksum, Checksum};
pub use header::{build_header, OtaHeader, HEADER_SIZE};
