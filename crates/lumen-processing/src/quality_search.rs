//! Quality-targeting search under a byte budget.
//!
//! Encoded size is assumed to be monotonically non-decreasing in quality; the
//! search is only as correct as that assumption holds for the codec.

use lumen_core::models::MediaFormat;

use crate::codec::CodecError;
use crate::encoder::{JPEG_DEFAULT_QUALITY, LOSSLESS_QUALITY};

/// Upper bound on encode attempts per search.
pub const MAX_PROBES: u32 = 7;

/// A single-use handle that can be encoded at a given quality.
pub trait Encodable {
    fn encode_at(self, quality: u8) -> Result<Vec<u8>, CodecError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetedOutput {
    pub bytes: Vec<u8>,
    pub format: MediaFormat,
    /// Quality that produced `bytes`.
    pub quality_used: u8,
    /// False when even the lowest quality tried exceeded the budget.
    pub budget_met: bool,
}

/// Size in KiB, rounded up.
pub fn size_in_kilobytes(len: usize) -> u64 {
    (len as u64).div_ceil(1024)
}

/// Find the highest quality in `[1, quality_hint.unwrap_or(85)]` whose output
/// fits in `target_kb`, calling `factory` for a fresh handle before every encode.
///
/// Lossless formats are encoded once and reported at quality 100 whatever the budget.
pub fn find_quality_for_budget<H, F>(
    mut factory: F,
    format: MediaFormat,
    target_kb: u32,
    quality_hint: Option<u8>,
) -> Result<BudgetedOutput, CodecError>
where
    H: Encodable,
    F: FnMut() -> Result<H, CodecError>,
{
    if format.is_lossless() {
        let bytes = factory()?.encode_at(LOSSLESS_QUALITY)?;
        return Ok(BudgetedOutput {
            bytes,
            format,
            quality_used: LOSSLESS_QUALITY,
            budget_met: true,
        });
    }

    let target = u64::from(target_kb);
    let mut low: u8 = 1;
    let mut high: u8 = quality_hint.unwrap_or(JPEG_DEFAULT_QUALITY).clamp(1, 100);
    let mut best: Option<(Vec<u8>, u8)> = None;
    let mut probes = 0;

    while low <= high && probes < MAX_PROBES {
        let mid = low + (high - low) / 2;
        let bytes = factory()?.encode_at(mid)?;
        probes += 1;

        let kb = size_in_kilobytes(bytes.len());
        tracing::trace!(quality = mid, size_kb = kb, target_kb = target, "Quality probe");

        if kb <= target {
            best = Some((bytes, mid));
            low = mid + 1;
        } else {
            high = mid - 1;
        }
    }

    if let Some((bytes, quality_used)) = best {
        tracing::debug!(format = %format, quality_used, probes, "Budget met");
        return Ok(BudgetedOutput {
            bytes,
            format,
            quality_used,
            budget_met: true,
        });
    }

    // Nothing fit; `low` never moved, so this is the floor quality.
    let bytes = factory()?.encode_at(low)?;
    tracing::debug!(
        format = %format,
        quality_used = low,
        size_kb = size_in_kilobytes(bytes.len()),
        target_kb = target,
        "Budget unreachable, returning lowest quality"
    );
    Ok(BudgetedOutput {
        bytes,
        format,
        quality_used: low,
        budget_met: false,
    })
}
