use feedscout_types::{LumaPatch, normalize_text};
use sha2::{Digest, Sha256};

use crate::ops::resize_average;

/// Side of the grid the perceptual image hash is computed on.
pub const IMAGE_GRID: usize = 8;

fn digest_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hash of the normalized text. Empty after normalization means no
/// signature, which is never considered seen.
pub fn text_signature(text: &str) -> String {
    let normalized = normalize_text(text);
    if normalized.is_empty() {
        return String::new();
    }
    digest_hex(normalized.as_bytes())
}

/// Hash of an identity key taken byte for byte. Unlike [`text_signature`]
/// the punctuation is kept, so `a@1,23` and `a@12,3` stay distinct.
pub fn key_signature(key: &str) -> String {
    if key.is_empty() {
        return String::new();
    }
    digest_hex(key.as_bytes())
}

/// 64 bits, row-major over the 8x8 grid: set where the cell is at least as
/// bright as the grid mean.
pub fn image_bits(patch: &LumaPatch) -> Option<u64> {
    if patch.is_empty() {
        return None;
    }
    let cells = resize_average(
        &patch.to_f32(),
        patch.width,
        patch.height,
        IMAGE_GRID,
        IMAGE_GRID,
    );
    let mean = cells.iter().sum::<f32>() / cells.len() as f32;
    let bits = cells
        .iter()
        .enumerate()
        .filter(|(_, value)| **value >= mean)
        .fold(0u64, |acc, (idx, _)| acc | (1u64 << idx));
    Some(bits)
}

/// Hash of the mean-thresholded 8x8 bitstring of `patch`.
pub fn image_signature(patch: &LumaPatch) -> String {
    match image_bits(patch) {
        Some(bits) => {
            let bitstring: String = (0..IMAGE_GRID * IMAGE_GRID)
                .map(|idx| if bits & (1u64 << idx) != 0 { '1' } else { '0' })
                .collect();
            digest_hex(bitstring.as_bytes())
        }
        None => String::new(),
    }
}
