//! Host side sanity check of packaged images.
//!
//! Reads back an unsigned image or an embedded artifact and checks it
//! against the same rules the device OTA agent applies before flashing:
//! header layout, payload bounds, checksum, and, when a certificate is
//! at hand, the signature.
use crate::{
    error::Error,
    image::{compute_checksum, OtaHeader, HEADER_SIZE},
    packaging::split_trailer,
    signing::{message_for, verify, Signature, SignerCertificate, SigningMode},
};
use core::{num::NonZeroU32, ops::RangeInclusive};
use log::{debug, info, warn};
use otapack_config::header::IMAGE_HEADER_LEN;

/// Header counts accepted by the OTA agent.
pub const HEADER_NUM_RANGE: RangeInclusive<u32> = 1..=2;

/// Everything learned about an image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageReport {
    pub header: OtaHeader,
    /// Zero bytes between the payload and the signature.
    pub padding_len: usize,
    /// Signature found in the trailer, if the image is signed.
    pub signature: Option<Signature>,
    /// Outcome of checking the signature, if both a signature and a
    /// certificate were available.
    pub verified: Option<bool>,
}

impl ImageReport {
    pub fn is_signed(&self) -> bool { self.signature.is_some() }
}

/// Checks `image`, and verifies its signature when `verification` names
/// the certificate and the region the signature covers.
pub fn inspect(
    image: &[u8],
    block_size: NonZeroU32,
    verification: Option<(&SignerCertificate, SigningMode)>,
) -> Result<ImageReport, Error> {
    let header = OtaHeader::from_bytes(image)?;
    debug!("Decoded header: {:x?}", header);

    if header.header_len != IMAGE_HEADER_LEN {
        return Err(Error::MalformedImage("unexpected image header length"));
    }
    if !HEADER_NUM_RANGE.contains(&header.header_num) {
        return Err(Error::MalformedImage("header count out of range"));
    }
    if header.load_offset as usize != HEADER_SIZE {
        warn!("Load offset 0x{:x} does not point at the payload", header.load_offset);
    }
    let end = HEADER_SIZE
        .checked_add(header.image_len as usize)
        .filter(|&end| end <= image.len())
        .ok_or(Error::MalformedImage("payload extends past the end of the image"))?;

    let payload = &image[HEADER_SIZE..end];
    let calculated = compute_checksum(payload);
    if calculated != header.checksum {
        return Err(Error::ChecksumMismatch { expected: header.checksum, calculated });
    }
    info!(
        "Image version {} holds {} payload bytes, checksum 0x{:08x}",
        header.version,
        payload.len(),
        calculated
    );

    if end == image.len() {
        return Ok(ImageReport { header, padding_len: 0, signature: None, verified: None });
    }

    let (padded_image, signature) = split_trailer(image)?;
    if signature.is_empty() {
        return Err(Error::MalformedImage("signature trailer is empty"));
    }
    let padding = padded_image
        .get(end..)
        .ok_or(Error::MalformedImage("signature overlaps the payload"))?;
    if padding.iter().any(|&b| b != 0) {
        return Err(Error::MalformedImage("padding is not zero filled"));
    }
    if padded_image.len() % block_size.get() as usize != 0 {
        warn!(
            "Padded image length {} is not a multiple of {}",
            padded_image.len(),
            block_size
        );
    }

    let verified = match verification {
        Some((certificate, mode)) => {
            let verified = verify(certificate, &signature, message_for(mode, payload)?);
            let outcome = if verified { "verified" } else { "does NOT verify" };
            info!("Signature ({} bytes) {}", signature.len(), outcome);
            Some(verified)
        }
        None => None,
    };

    Ok(ImageReport {
        header,
        padding_len: padding.len(),
        signature: Some(signature),
        verified,
    })
}
