//! This otapack sub-crate contains the packaging configuration: the
//! constant header fields expected by the target's OTA agent, the
//! block size the image is padded to, and which region of the firmware
//! gets signed.
//!
//! Configurations are stored as RON files. Any field not overridden by
//! a file or the command line keeps the value the Ameba OTA agent expects.

use std::{fmt::Display, fs, path::Path};

use anyhow::{Context, Result};
use header::{HeaderConfiguration, FULL_HEADER_SIZE};
use padding::PaddingConfiguration;
use security::{SecurityConfiguration, SigningMode};
use serde::{Deserialize, Serialize};

pub mod header;
pub mod padding;
pub mod security;

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Configuration {
    pub header_configuration: HeaderConfiguration,
    pub padding_configuration: PaddingConfiguration,
    pub security_configuration: SecurityConfiguration,
}

impl Configuration {
    pub fn new(
        header_configuration: HeaderConfiguration,
        padding_configuration: PaddingConfiguration,
        security_configuration: SecurityConfiguration,
    ) -> Self {
        Self { header_configuration, padding_configuration, security_configuration }
    }

    /// Parses a configuration from its RON representation. An empty
    /// string yields the default configuration.
    pub fn from_ron(string: &str) -> Result<Self> {
        if string.trim().is_empty() {
            Ok(Self::default())
        } else {
            ron::from_str(string).context("failed to parse configuration")
        }
    }

    pub fn to_ron(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .context("failed to serialize configuration")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read configuration file {}", path.display()))?;
        Self::from_ron(&contents)
            .with_context(|| format!("invalid configuration file {}", path.display()))
    }
}

impl Configuration {
    /// Settings that still need a value before an image can be signed.
    /// Only [`RequiredConfigurationStep::SigningMode`] may be left out for
    /// runs that do not sign.
    pub fn required_configuration_steps(&self) -> impl Iterator<Item = RequiredConfigurationStep> {
        [
            (self.padding_configuration.block_size == 0)
                .then_some(RequiredConfigurationStep::BlockSize),

            // The device reads the payload from `load_offset`, so it can't
            // point back into the header.
            (self.header_configuration.load_offset < FULL_HEADER_SIZE)
                .then_some(RequiredConfigurationStep::LoadOffset),

            (self.header_configuration.header_num == 0)
                .then_some(RequiredConfigurationStep::HeaderCount),

            self.security_configuration
                .signing_mode
                .is_none()
                .then_some(RequiredConfigurationStep::SigningMode),

            matches!(
                self.security_configuration.signing_mode,
                Some(SigningMode::TrailingChecksum(0))
            )
            .then_some(RequiredConfigurationStep::TrailingChecksumWidth),
        ]
        .into_iter()
        .flatten()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RequiredConfigurationStep {
    BlockSize,
    LoadOffset,
    HeaderCount,
    SigningMode,
    TrailingChecksumWidth,
}

impl Display for RequiredConfigurationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RequiredConfigurationStep::BlockSize => "[Padding] Block size must be non-zero",
            RequiredConfigurationStep::LoadOffset => {
                "[Header] Load offset must not point inside the OTA header"
            }
            RequiredConfigurationStep::HeaderCount => "[Header] Header count must be non-zero",
            RequiredConfigurationStep::SigningMode => {
                "[Security] Signing mode must be selected (full payload or trailing checksum)"
            }
            RequiredConfigurationStep::TrailingChecksumWidth => {
                "[Security] Trailing checksum width must be non-zero"
            }
        })
    }
}
