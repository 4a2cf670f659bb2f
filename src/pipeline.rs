//! End to end packaging runs.
//!
//! Every run is a straight line of stages: load inputs, checksum, build
//! the header, assemble, pad, sign, self-verify, package and write. The
//! first failing stage aborts the run and is named in the resulting
//! [`Failure`]. Outputs are staged next to their destination and only
//! moved into place by [`Outputs::commit`], so a failed run leaves no
//! artifact behind.
use crate::{
    error::{Error, File},
    image::{assemble, build_header, compute_checksum, pad_with_policy},
    metadata::{BuildMetadata, MetadataSource},
    packaging,
    signing::{message_for, verify, KeyStore, Signature, Signer, SignerCertificate},
};
use core::{fmt, num::NonZeroU32};
use log::{debug, error, info, warn};
use otapack_config::Configuration;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Load,
    Checksum,
    Header,
    Assemble,
    Pad,
    Sign,
    SelfVerify,
    Package,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Load => "load",
            Stage::Checksum => "checksum",
            Stage::Header => "header",
            Stage::Assemble => "assemble",
            Stage::Pad => "pad",
            Stage::Sign => "sign",
            Stage::SelfVerify => "self-verify",
            Stage::Package => "package",
            Stage::Write => "write",
        })
    }
}

/// An error, tagged with the stage that raised it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Failure {
    pub stage: Stage,
    pub error: Error,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.error)
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> { Some(&self.error) }
}

pub trait AtStage<T> {
    fn at(self, stage: Stage) -> Result<T, Failure>;
}

impl<T> AtStage<T> for Result<T, Error> {
    fn at(self, stage: Stage) -> Result<T, Failure> {
        self.map_err(|error| Failure { stage, error })
    }
}

pub fn load_firmware<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, Failure> {
    let path = path.as_ref();
    let firmware = fs::read(path)
        .map_err(|e| {
            error!("Cannot read firmware {}: {}", path.display(), e);
            Error::InputNotFound(File::Firmware)
        })
        .at(Stage::Load)?;
    info!("Loaded {} bytes of firmware from {}", firmware.len(), path.display());
    Ok(firmware)
}

pub fn load_metadata<M: MetadataSource>(source: &M) -> Result<BuildMetadata, Failure> {
    let metadata = source.load().at(Stage::Load)?;
    info!("Firmware version {}", metadata);
    Ok(metadata)
}

pub fn load_signer<S: KeyStore>(store: &S) -> Result<Signer, Failure> {
    Signer::from_store(store).at(Stage::Load)
}

/// Header followed by the firmware payload.
pub fn build_unsigned(
    configuration: &Configuration,
    firmware: &[u8],
    metadata: &BuildMetadata,
) -> Result<Vec<u8>, Failure> {
    let checksum = compute_checksum(firmware);
    info!("Payload checksum 0x{:08x}", checksum);

    let header =
        build_header(metadata, firmware.len(), checksum, &configuration.header_configuration)
            .at(Stage::Header)?;
    debug!("Header: {}", hex::encode(header));

    let image = assemble(&header, firmware);
    info!("Assembled unsigned image of {} bytes", image.len());
    Ok(image)
}

/// Output of an embedded mode run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmbeddedPackage {
    pub unsigned_image: Vec<u8>,
    pub signed_image: Vec<u8>,
    pub signature: Signature,
}

/// Builds, pads and signs an image, embedding the signature after it.
///
/// The signed region is chosen by the configured signing mode and is
/// always taken from the raw firmware, never from the header or padding.
pub fn package(
    configuration: &Configuration,
    firmware: &[u8],
    metadata: &BuildMetadata,
    signer: &Signer,
) -> Result<EmbeddedPackage, Failure> {
    let unsigned_image = build_unsigned(configuration, firmware, metadata)?;

    let padding = &configuration.padding_configuration;
    let block_size = NonZeroU32::new(padding.block_size)
        .ok_or(Error::Range("block size must be non-zero"))
        .at(Stage::Pad)?;
    let padded = pad_with_policy(unsigned_image.clone(), block_size, padding.policy);
    info!("Padded image to {} bytes ({} byte blocks)", padded.len(), block_size);

    let signature = sign_region(configuration, firmware, signer)?;
    let signed_image = packaging::package(padded, &signature).at(Stage::Package)?;
    info!("Packaged signed image of {} bytes", signed_image.len());

    Ok(EmbeddedPackage { unsigned_image, signed_image, signature })
}

/// Output of a detached mode run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetachedSignature {
    pub signature: Signature,
    /// Base64 text, as handed to the cloud signing service.
    pub encoded: String,
}

pub fn sign_detached(
    configuration: &Configuration,
    firmware: &[u8],
    signer: &Signer,
) -> Result<DetachedSignature, Failure> {
    let signature = sign_region(configuration, firmware, signer)?;
    let encoded = packaging::encode_detached(&signature);
    Ok(DetachedSignature { signature, encoded })
}

fn sign_region(
    configuration: &Configuration,
    firmware: &[u8],
    signer: &Signer,
) -> Result<Signature, Failure> {
    let mode = configuration
        .security_configuration
        .signing_mode
        .ok_or(Error::SigningModeUnset)
        .at(Stage::Sign)?;
    let message = message_for(mode, firmware).at(Stage::Sign)?;
    debug!("Signing {} bytes ({:?})", message.len(), mode);
    let signature = signer.sign_and_verify(message).map_err(|error| match error {
        Error::Verification => Failure { stage: Stage::SelfVerify, error },
        error => Failure { stage: Stage::Sign, error },
    })?;
    info!("Signed and verified ({} byte signature)", signature.len());
    Ok(signature)
}

/// Checks a detached signature, as written by [`sign_detached`], over
/// `firmware`.
pub fn verify_detached(
    configuration: &Configuration,
    firmware: &[u8],
    encoded: &str,
    certificate: &SignerCertificate,
) -> Result<bool, Failure> {
    let mode = configuration
        .security_configuration
        .signing_mode
        .ok_or(Error::SigningModeUnset)
        .at(Stage::SelfVerify)?;
    let signature = packaging::decode_detached(encoded).at(Stage::Load)?;
    let message = message_for(mode, firmware).at(Stage::SelfVerify)?;
    let verified = verify(certificate, &signature, message);
    info!(
        "Detached signature ({} bytes) over {:?}: verified = {}",
        signature.len(),
        mode,
        verified
    );
    Ok(verified)
}

/// Output files of a run, held in temporary files until committed.
///
/// Dropping uncommitted outputs removes their temporary files.
#[derive(Default)]
pub struct Outputs {
    staged: Vec<(File, PathBuf, NamedTempFile)>,
}

impl Outputs {
    pub fn new() -> Self { Self::default() }

    /// Writes `contents` to a temporary file in the directory of `path`.
    pub fn stage<P: AsRef<Path>>(
        &mut self,
        file: File,
        path: P,
        contents: &[u8],
    ) -> Result<(), Failure> {
        let path = path.as_ref();
        let directory = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let write = || -> std::io::Result<NamedTempFile> {
            let mut temporary =
                tempfile::Builder::new().prefix(".otapack-").tempfile_in(directory)?;
            temporary.write_all(contents)?;
            temporary.as_file().sync_all()?;
            Ok(temporary)
        };
        let temporary = write()
            .map_err(|e| {
                error!("Cannot stage {} {}: {}", file, path.display(), e);
                Error::FileWriteFailed(file)
            })
            .at(Stage::Write)?;
        self.staged.push((file, path.to_owned(), temporary));
        Ok(())
    }

    /// Moves every staged file into place. If any of them fails, the
    /// files already moved are removed again.
    pub fn commit(self) -> Result<Vec<PathBuf>, Failure> {
        let mut committed: Vec<PathBuf> = Vec::with_capacity(self.staged.len());
        for (file, path, temporary) in self.staged {
            if let Err(e) = temporary.persist(&path) {
                error!("Cannot write {} {}: {}", file, path.display(), e.error);
                for path in &committed {
                    if let Err(e) = fs::remove_file(path) {
                        warn!("Cannot roll back {}: {}", path.display(), e);
                    }
                }
                return Err(Failure { stage: Stage::Write, error: Error::FileWriteFailed(file) });
            }
            info!("Wrote {} to {}", file, path.display());
            committed.push(path);
        }
        Ok(committed)
    }
}
