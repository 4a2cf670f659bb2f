use serde::{Deserialize, Serialize};

/// Block size the OTA agent writes flash in.
pub const BLOCK_SIZE: u32 = 1024;

/// What to do with an image whose length is already a multiple of the
/// block size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum PaddingPolicy {
    /// Always append padding, a full block when already aligned.
    AlwaysPad,
    /// Append padding only when the image is not aligned.
    AlignOnly,
}

impl Default for PaddingPolicy {
    fn default() -> Self { PaddingPolicy::AlwaysPad }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaddingConfiguration {
    pub block_size: u32,
    pub policy: PaddingPolicy,
}

impl Default for PaddingConfiguration {
    fn default() -> Self { Self { block_size: BLOCK_SIZE, policy: PaddingPolicy::default() } }
}
