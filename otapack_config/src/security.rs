use serde::{Deserialize, Serialize};

/// Width of the checksum word appended to the firmware by the vendor
/// image tool.
pub const TRAILING_CHECKSUM_WIDTH: usize = 4;

/// Region of the firmware binary covered by the signature.
///
/// The two modes are not interchangeable: the device verifies exactly one
/// of these regions, so there is no default mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigningMode {
    /// Sign the whole firmware payload.
    FullPayload,
    /// Sign only the last `n` bytes of the firmware, holding a checksum
    /// embedded by an upstream build step.
    TrailingChecksum(usize),
}

#[derive(Default, Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfiguration {
    /// Unset until a configuration file or the command line selects one.
    pub signing_mode: Option<SigningMode>,
}
