//! Image assembly and block padding.
use core::num::NonZeroU32;
use otapack_config::padding::PaddingPolicy;

/// Concatenates header and payload, byte for byte.
pub fn assemble(header: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut image = Vec::with_capacity(header.len() + payload.len());
    image.extend_from_slice(header);
    image.extend_from_slice(payload);
    image
}

/// Number of zero bytes needed after `length` bytes to reach the next
/// block boundary under `policy`.
///
/// With [`PaddingPolicy::AlwaysPad`] the result lies in `1..=block_size`,
/// so an already aligned image still gains a full block.
pub fn padding_length(length: usize, block_size: NonZeroU32, policy: PaddingPolicy) -> usize {
    let block_size = block_size.get() as usize;
    match (policy, length % block_size) {
        (PaddingPolicy::AlignOnly, 0) => 0,
        (_, remainder) => block_size - remainder,
    }
}

/// Pads `data` with zeroes as the OTA agent expects: always at least
/// one byte, at most a whole block.
pub fn pad_to_block(data: Vec<u8>, block_size: NonZeroU32) -> Vec<u8> {
    pad_with_policy(data, block_size, PaddingPolicy::AlwaysPad)
}

pub fn pad_with_policy(
    mut data: Vec<u8>,
    block_size: NonZeroU32,
    policy: PaddingPolicy,
) -> Vec<u8> {
    let padding = padding_length(data.len(), block_size, policy);
    data.resize(data.len() + padding, 0);
    data
}
