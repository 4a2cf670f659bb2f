//! Error type for the OTA packager as a whole.
use std::fmt::{self, Display, Formatter};

/// Input or output file an error relates to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum File {
    Firmware,
    Key,
    Certificate,
    VersionHeader,
    Image,
    SignedImage,
    Signature,
}

impl Display for File {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        use File::*;
        match self {
            Firmware => write!(f, "firmware"),
            Key => write!(f, "private key"),
            Certificate => write!(f, "certificate"),
            VersionHeader => write!(f, "version header"),
            Image => write!(f, "image"),
            SignedImage => write!(f, "signed image"),
            Signature => write!(f, "signature"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    /// An input file is missing or could not be read.
    InputNotFound(File),
    /// A key or certificate failed to parse, or is not an EC P-256 key.
    KeyFormat(File),
    /// A value does not fit the fixed width of the field it goes into.
    Range(&'static str),
    /// No signing mode was selected for a run that signs.
    SigningModeUnset,
    /// The signing primitive itself failed.
    SigningFailed,
    /// A freshly produced signature does not verify against the certificate.
    Verification,
    /// The checksum stored in a header disagrees with its payload.
    ChecksumMismatch { expected: u32, calculated: u32 },
    /// A required key was not found in the build metadata.
    MetadataMissing(&'static str),
    /// An OTA image failed to parse.
    MalformedImage(&'static str),
    FileWriteFailed(File),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        use Error::*;
        match self {
            InputNotFound(file) => write!(f, "Failed to read {} file.", file),
            KeyFormat(file) => write!(f, "Failed to parse the {} (expected EC P-256).", file),
            Range(what) => write!(f, "Value out of range: {}.", what),
            SigningModeUnset => {
                write!(f, "No signing mode selected (full payload or trailing checksum).")
            }
            SigningFailed => write!(f, "Failed to produce a signature."),
            Verification => {
                write!(f, "Signature self-verification failed (key and certificate mismatch?).")
            }
            ChecksumMismatch { expected, calculated } => write!(
                f,
                "Checksum mismatch: header holds 0x{:08x}, payload sums to 0x{:08x}.",
                expected, calculated
            ),
            MetadataMissing(key) => write!(f, "Build metadata is missing {}.", key),
            MalformedImage(reason) => write!(f, "Malformed OTA image: {}.", reason),
            FileWriteFailed(file) => write!(f, "Failed to write {} file.", file),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_file_involved() {
        assert_eq!(
            Error::InputNotFound(File::Certificate).to_string(),
            "Failed to read certificate file."
        );
        assert_eq!(
            Error::FileWriteFailed(File::SignedImage).to_string(),
            "Failed to write signed image file."
        );
    }

    #[test]
    fn checksum_mismatch_reports_both_values() {
        let message = Error::ChecksumMismatch { expected: 0x10, calculated: 0xABCD }.to_string();
        assert!(message.contains("0x00000010"));
        assert!(message.contains("0x0000abcd"));
    }
}
