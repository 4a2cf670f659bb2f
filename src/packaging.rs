//! Signature packaging.
//!
//! Embedded artifacts carry the signature after the padded image,
//! followed by a single byte holding the signature length:
//!
//! ```text
//! [header][payload][padding][signature][length]
//! ```
//!
//! Detached artifacts are the signature alone, as base64 text, for the
//! cloud side OTA signing service.
use crate::{error::Error, signing::Signature};

/// Appends `signature` and its length marker to `padded_image`.
///
/// Fails rather than truncating when the signature length does not fit
/// the marker byte.
pub fn package(mut padded_image: Vec<u8>, signature: &Signature) -> Result<Vec<u8>, Error> {
    let marker = signature.length_marker()?;
    padded_image.reserve(signature.len() + 1);
    padded_image.extend_from_slice(signature.as_bytes());
    padded_image.push(marker);
    Ok(padded_image)
}

/// Base64 text of the raw signature bytes, without line breaks.
pub fn encode_detached(signature: &Signature) -> String { base64::encode(signature.as_bytes()) }

/// Decodes a detached signature as written by [`encode_detached`].
pub fn decode_detached(text: &str) -> Result<Signature, Error> {
    base64::decode(text.trim())
        .map(Signature::from_bytes)
        .map_err(|_| Error::MalformedImage("detached signature is not valid base64"))
}

/// Splits an embedded artifact into the padded image and its signature.
pub fn split_trailer(artifact: &[u8]) -> Result<(&[u8], Signature), Error> {
    let (&marker, rest) =
        artifact.split_last().ok_or(Error::MalformedImage("artifact is empty"))?;
    let start = rest
        .len()
        .checked_sub(usize::from(marker))
        .ok_or(Error::MalformedImage("signature length marker exceeds the artifact"))?;
    let (padded_image, signature) = rest.split_at(start);
    Ok((padded_image, Signature::from_bytes(signature.to_vec())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_artifact_ends_with_signature_and_length() {
        let padded = vec![0xA5; 2048];
        let signature = Signature::from_bytes((0..71u8).collect());
        let artifact = package(padded.clone(), &signature).unwrap();

        assert_eq!(artifact.len(), 2048 + 71 + 1);
        assert_eq!(&artifact[..2048], padded.as_slice());
        assert_eq!(&artifact[2048..2119], signature.as_bytes());
        assert_eq!(artifact[2119], 71);
    }

    #[test]
    fn oversized_signatures_are_rejected_instead_of_truncated() {
        let signature = Signature::from_bytes(vec![0x30; 300]);
        assert!(matches!(package(vec![0; 1024], &signature), Err(Error::Range(_))));
    }

    #[test]
    fn detached_signature_is_plain_base64() {
        let signature = Signature::from_bytes(vec![0x30, 0x45, 0x02, 0x21, 0x00, 0xFF]);
        let encoded = encode_detached(&signature);
        assert_eq!(encoded, "MEUCIQD/");
        assert!(!encoded.contains('\n'));
        assert_eq!(decode_detached(&format!("{}\n", encoded)).unwrap(), signature);
        assert!(decode_detached("not base64!").is_err());
    }

    #[test]
    fn trailer_is_split_back_into_image_and_signature() {
        let signature = Signature::from_bytes(vec![7; 72]);
        let artifact = package(vec![1; 1024], &signature).unwrap();
        let (image, recovered) = split_trailer(&artifact).unwrap();
        assert_eq!(image, &[1u8; 1024][..]);
        assert_eq!(recovered, signature);
    }

    #[test]
    fn inconsistent_trailers_are_malformed() {
        assert!(matches!(split_trailer(&[]), Err(Error::MalformedImage(_))));
        assert!(matches!(split_trailer(&[1, 2, 200]), Err(Error::MalformedImage(_))));
    }
}
