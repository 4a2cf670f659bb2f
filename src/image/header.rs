use crate::{error::Error, metadata::BuildMetadata};
use byteorder::{ByteOrder, LittleEndian};
use core::mem::size_of;
use otapack_config::header::{HeaderConfiguration, FULL_HEADER_SIZE, IMAGE_HEADER_LEN};
use static_assertions::const_assert_eq;

const FIELD_COUNT: usize = 8;

/// Serialized size of the OTA header, file header included.
pub const HEADER_SIZE: usize = FULL_HEADER_SIZE as usize;
const_assert_eq!(HEADER_SIZE, FIELD_COUNT * size_of::<u32>());

/// Decoded OTA header.
///
/// Every field is stored as a little endian word, in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OtaHeader {
    /// Decimal encoded application version, compared by the device
    /// against its running version.
    pub version: u32,
    /// Number of image headers in the file.
    pub header_num: u32,
    /// Image identifier, "OTA1" for the application image.
    pub signature_marker: u32,
    /// Length of the image header (always 24).
    pub header_len: u32,
    /// Byte sum of the payload, see [`compute_checksum`](super::compute_checksum).
    pub checksum: u32,
    /// Length of the payload in bytes.
    pub image_len: u32,
    /// Recorded for the device agent. The payload always starts right after the header.
    pub load_offset: u32,
    pub reserved: u32,
}

impl OtaHeader {
    pub fn new(
        metadata: &BuildMetadata,
        image_len: usize,
        checksum: u32,
        configuration: &HeaderConfiguration,
    ) -> Result<Self, Error> {
        Ok(Self {
            version: metadata.version()?,
            header_num: configuration.header_num,
            signature_marker: configuration.signature_marker,
            header_len: IMAGE_HEADER_LEN,
            checksum,
            image_len: u32::try_from(image_len)
                .map_err(|_| Error::Range("firmware image length exceeds 32 bits"))?,
            load_offset: configuration.load_offset,
            reserved: configuration.reserved,
        })
    }

    fn fields(&self) -> [u32; FIELD_COUNT] {
        [
            self.version,
            self.header_num,
            self.signature_marker,
            self.header_len,
            self.checksum,
            self.image_len,
            self.load_offset,
            self.reserved,
        ]
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        LittleEndian::write_u32_into(&self.fields(), &mut bytes);
        bytes
    }

    /// Decodes the header at the start of `bytes`. Only the length is
    /// checked here; field semantics are left to the caller.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let bytes = bytes
            .get(..HEADER_SIZE)
            .ok_or(Error::MalformedImage("image is shorter than the OTA header"))?;
        let mut fields = [0u32; FIELD_COUNT];
        LittleEndian::read_u32_into(bytes, &mut fields);
        let [version, header_num, signature_marker, header_len, checksum, image_len, load_offset,
            reserved] = fields;
        Ok(Self {
            version,
            header_num,
            signature_marker,
            header_len,
            checksum,
            image_len,
            load_offset,
            reserved,
        })
    }
}

/// Serializes the OTA header describing a payload of `image_len` bytes
/// summing to `checksum`.
pub fn build_header(
    metadata: &BuildMetadata,
    image_len: usize,
    checksum: u32,
    configuration: &HeaderConfiguration,
) -> Result<[u8; HEADER_SIZE], Error> {
    Ok(OtaHeader::new(metadata, image_len, checksum, configuration)?.to_bytes())
}
