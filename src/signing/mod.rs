//! P256 ECDSA/SHA256 signing of firmware images.
//!
//! Signatures are DER encoded, matching what the device side verifier
//! expects. Every signature is verified against the signer certificate
//! before it is handed out, so a key/certificate mismatch can never
//! produce an artifact.
use crate::error::Error;
use ecdsa::{der::MaxSize, elliptic_curve::generic_array::typenum::Unsigned};
use log::{debug, log_enabled, Level};
use p256::{
    ecdsa::{
        signature::{DigestSigner, DigestVerifier},
        Signature as EcdsaSignature,
        SigningKey,
    },
    NistP256,
};
use sha2::{Digest, Sha256};
use static_assertions::const_assert;

pub mod keys;

pub use keys::{load_certificate, KeyStore, PemFileStore, SignerCertificate};
pub use otapack_config::security::SigningMode;

/// Largest DER encoding of a P-256 signature.
pub const MAX_SIGNATURE_SIZE: usize = <MaxSize<NistP256> as Unsigned>::USIZE;
const_assert!(MAX_SIGNATURE_SIZE <= u8::MAX as usize);

/// Detached signature bytes. The encoded length varies from signature
/// to signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature(Vec<u8>);

impl Signature {
    /// Wraps raw signature bytes without checking their encoding.
    pub fn from_bytes(bytes: Vec<u8>) -> Self { Self(bytes) }
    pub fn as_bytes(&self) -> &[u8] { &self.0 }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Length of the signature as the single byte appended after it in
    /// embedded artifacts.
    pub fn length_marker(&self) -> Result<u8, Error> {
        u8::try_from(self.len())
            .map_err(|_| Error::Range("signature does not fit the one byte length marker"))
    }
}

/// Selects the bytes of `firmware` covered by the signature.
pub fn message_for(mode: SigningMode, firmware: &[u8]) -> Result<&[u8], Error> {
    match mode {
        SigningMode::FullPayload => Ok(firmware),
        SigningMode::TrailingChecksum(0) => Err(Error::Range("trailing checksum width is zero")),
        SigningMode::TrailingChecksum(width) => firmware
            .len()
            .checked_sub(width)
            .map(|start| &firmware[start..])
            .ok_or(Error::Range("firmware is shorter than the trailing checksum field")),
    }
}

fn digest(message: &[u8]) -> Sha256 {
    let digest = Sha256::new_with_prefix(message);
    if log_enabled!(Level::Debug) {
        debug!("SHA-256 of signed region: {}", hex::encode(digest.clone().finalize()));
    }
    digest
}

/// Signs `message` with ECDSA over its SHA-256 digest.
pub fn sign(key: &SigningKey, message: &[u8]) -> Result<Signature, Error> {
    let signature: EcdsaSignature =
        key.try_sign_digest(digest(message)).map_err(|_| Error::SigningFailed)?;
    Ok(Signature(signature.to_der().as_bytes().to_vec()))
}

/// Checks `signature` over `message` against the certificate's public
/// key. Undecodable signatures simply fail to verify.
pub fn verify(certificate: &SignerCertificate, signature: &Signature, message: &[u8]) -> bool {
    EcdsaSignature::from_der(signature.as_bytes())
        .map(|signature| {
            certificate.verifying_key().verify_digest(digest(message), &signature).is_ok()
        })
        .unwrap_or(false)
}

/// Signing key paired with the certificate the device trusts.
pub struct Signer {
    key: SigningKey,
    certificate: SignerCertificate,
}

impl Signer {
    pub fn new(key: SigningKey, certificate: SignerCertificate) -> Self {
        Self { key, certificate }
    }

    pub fn from_store<S: KeyStore>(store: &S) -> Result<Self, Error> {
        Ok(Self::new(store.signing_key()?, store.certificate()?))
    }

    pub fn certificate(&self) -> &SignerCertificate { &self.certificate }

    /// Signs `message` and verifies the result against the certificate.
    /// A signature that fails this check is never returned.
    pub fn sign_and_verify(&self, message: &[u8]) -> Result<Signature, Error> {
        let signature = sign(&self.key, message)?;
        if verify(&self.certificate, &signature, message) {
            debug!("Signature self-verification passed ({} bytes)", signature.len());
            Ok(signature)
        } else {
            Err(Error::Verification)
        }
    }

    /// Signs the region of `firmware` selected by `mode`.
    pub fn sign_firmware(&self, mode: SigningMode, firmware: &[u8]) -> Result<Signature, Error> {
        self.sign_and_verify(message_for(mode, firmware)?)
    }
}
