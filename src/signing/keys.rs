//! Signing key and certificate loading.
//!
//! Keys are supplied as PEM text: the private key either as SEC1
//! (`EC PRIVATE KEY`, as written by `openssl ecparam -genkey`) or PKCS#8
//! (`PRIVATE KEY`), and the public key inside an X.509 certificate.
//! Both must be on the P-256 curve.
use crate::error::{Error, File};
use log::error;
use p256::{
    ecdsa::{SigningKey, VerifyingKey},
    pkcs8::{DecodePrivateKey, DecodePublicKey},
    SecretKey,
};
use std::{
    fs,
    path::{Path, PathBuf},
};
use x509_cert::{
    der::{DecodePem, Encode},
    Certificate,
};

/// Public half of the signing identity, as extracted from the signer's
/// certificate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignerCertificate {
    verifying_key: VerifyingKey,
}

impl SignerCertificate {
    pub fn verifying_key(&self) -> &VerifyingKey { &self.verifying_key }
}

impl From<VerifyingKey> for SignerCertificate {
    fn from(verifying_key: VerifyingKey) -> Self { Self { verifying_key } }
}

/// Source of key material for the signer.
pub trait KeyStore {
    fn signing_key(&self) -> Result<SigningKey, Error>;
    fn certificate(&self) -> Result<SignerCertificate, Error>;
}

/// Key and certificate stored as PEM files. Files are only held open
/// while being read.
pub struct PemFileStore {
    key: PathBuf,
    certificate: PathBuf,
}

impl PemFileStore {
    pub fn new<K: AsRef<Path>, C: AsRef<Path>>(key: K, certificate: C) -> Self {
        Self { key: key.as_ref().to_owned(), certificate: certificate.as_ref().to_owned() }
    }
}

fn read_pem(path: &Path, file: File) -> Result<String, Error> {
    fs::read_to_string(path).map_err(|e| {
        error!("Cannot read {} {}: {}", file, path.display(), e);
        Error::InputNotFound(file)
    })
}

impl KeyStore for PemFileStore {
    fn signing_key(&self) -> Result<SigningKey, Error> {
        parse_private_key(&read_pem(&self.key, File::Key)?)
    }

    fn certificate(&self) -> Result<SignerCertificate, Error> {
        load_certificate(&self.certificate)
    }
}

/// Reads a certificate on its own, for checking existing signatures.
pub fn load_certificate<P: AsRef<Path>>(path: P) -> Result<SignerCertificate, Error> {
    parse_certificate(&read_pem(path.as_ref(), File::Certificate)?)
}

/// Parses a P-256 private key in PKCS#8 or SEC1 PEM form.
pub fn parse_private_key(pem: &str) -> Result<SigningKey, Error> {
    SigningKey::from_pkcs8_pem(pem)
        .or_else(|_| SecretKey::from_sec1_pem(pem).map(SigningKey::from))
        .map_err(|_| Error::KeyFormat(File::Key))
}

/// Extracts the P-256 public key from a PEM encoded X.509 certificate.
pub fn parse_certificate(pem: &str) -> Result<SignerCertificate, Error> {
    let certificate =
        Certificate::from_pem(pem.as_bytes()).map_err(|_| Error::KeyFormat(File::Certificate))?;
    let public_key = certificate
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|_| Error::KeyFormat(File::Certificate))?;
    VerifyingKey::from_public_key_der(&public_key)
        .map(SignerCertificate::from)
        .map_err(|_| Error::KeyFormat(File::Certificate))
}
