//! Hour shifting for shift-strategy DR products.
//!
//! A shift product moves load out of its implementation block into the hours
//! immediately around it. The signed series keeps `1` on implementation hours
//! and marks the compensating increase with `-1`.

use polars::prelude::DataFrame;
use tracing::warn;

use crate::config::EdgePolicy;
use crate::error::EmissionsError;
use crate::frames;
use crate::schema::indicators;

/// A maximal run of implementation hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub start: usize,
    pub len: usize,
}

impl Block {
    /// One past the last implementation hour.
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Detect the implementation blocks of a {0,1} series, left to right.
pub fn implementation_blocks(indicator: &[i8]) -> Result<Vec<Block>, EmissionsError> {
    let mut blocks = Vec::new();
    let mut current: Option<Block> = None;

    for (hour, &value) in indicator.iter().enumerate() {
        match value {
            1 => match current.as_mut() {
                Some(block) => block.len += 1,
                None => current = Some(Block { start: hour, len: 1 }),
            },
            0 => {
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
            }
            other => {
                return Err(EmissionsError::Domain(format!(
                    "indicator value {other} at hour {hour}; must be 0 or 1"
                )))
            }
        }
    }
    blocks.extend(current);

    Ok(blocks)
}

/// Mark `half_width` hours on each side of every implementation block as -1.
///
/// With `half_width = None` each block uses half its own length, which is only
/// defined for even-length blocks. A mark never overwrites an implementation
/// hour; marks from neighbouring blocks that overlap collapse into one.
pub fn shift(
    indicator: &[i8],
    half_width: Option<usize>,
    policy: EdgePolicy,
) -> Result<Vec<i8>, EmissionsError> {
    let blocks = implementation_blocks(indicator)?;
    let n = indicator.len();
    let mut shifted = indicator.to_vec();
    let mut clipped = 0usize;

    for block in &blocks {
        let width = match half_width {
            Some(w) => w,
            None if block.len % 2 == 0 => block.len / 2,
            None => {
                return Err(EmissionsError::Domain(format!(
                    "cannot split a {}-hour block starting at hour {} symmetrically",
                    block.len, block.start
                )))
            }
        };

        let before = (1..=width).map(|k| block.start.checked_sub(k));
        let after = (0..width).map(|k| Some(block.end() + k).filter(|&i| i < n));

        for target in before.chain(after) {
            match (target, policy) {
                (Some(i), _) => {
                    if shifted[i] == 0 {
                        shifted[i] = -1;
                    }
                }
                (None, EdgePolicy::Clip) => clipped += 1,
                (None, EdgePolicy::Reject) => {
                    return Err(EmissionsError::Shape(format!(
                        "shifting the block at hours {}..{} by {} leaves the {}-hour series",
                        block.start,
                        block.end(),
                        width,
                        n
                    )))
                }
            }
        }
    }

    if clipped > 0 {
        warn!(clipped, "shift marks outside the series were dropped");
    }

    Ok(shifted)
}

/// Distinct "<start> - <end>" hour-of-day windows of a product's blocks, first seen first.
pub fn implementation_windows(
    hours: &DataFrame,
    product: &str,
) -> Result<Vec<String>, EmissionsError> {
    let hour_ids = frames::int_column(hours, indicators::HOUR_ID)?;
    let indicator = frames::indicator_column(hours, product)?;

    let mut windows: Vec<String> = Vec::new();
    for block in implementation_blocks(&indicator)? {
        let window = format!("{} - {}", hour_ids[block.start], hour_ids[block.end() - 1]);
        if !windows.contains(&window) {
            windows.push(window);
        }
    }
    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn series_with_block(n: usize, start: usize, len: usize) -> Vec<i8> {
        let mut v = vec![0i8; n];
        v[start..start + len].iter_mut().for_each(|h| *h = 1);
        v
    }

    #[test]
    fn four_hour_block_is_shifted_symmetrically() {
        let indicator = series_with_block(24, 6, 4);
        let shifted = shift(&indicator, Some(2), EdgePolicy::Clip).unwrap();

        for hour in 0..24 {
            let expected = match hour {
                4 | 5 | 10 | 11 => -1,
                6..=9 => 1,
                _ => 0,
            };
            assert_eq!(shifted[hour], expected, "hour {hour}");
        }
    }

    #[test]
    fn derived_half_width_matches_explicit() {
        let indicator = series_with_block(24, 6, 4);
        assert_eq!(
            shift(&indicator, None, EdgePolicy::Clip).unwrap(),
            shift(&indicator, Some(2), EdgePolicy::Clip).unwrap()
        );
    }

    #[test]
    fn odd_block_without_half_width_is_rejected() {
        let indicator = series_with_block(24, 6, 5);
        let err = shift(&indicator, None, EdgePolicy::Clip).unwrap_err();
        assert!(matches!(err, EmissionsError::Domain(_)));

        // An explicit width makes the split well defined.
        let shifted = shift(&indicator, Some(2), EdgePolicy::Clip).unwrap();
        assert_eq!(shifted[11], -1);
        assert_eq!(shifted[12], -1);
    }

    #[test]
    fn edge_blocks_clip_or_reject() {
        let indicator = series_with_block(12, 0, 4);

        let clipped = shift(&indicator, Some(2), EdgePolicy::Clip).unwrap();
        assert_eq!(clipped, vec![1, 1, 1, 1, -1, -1, 0, 0, 0, 0, 0, 0]);

        let err = shift(&indicator, Some(2), EdgePolicy::Reject).unwrap_err();
        assert!(matches!(err, EmissionsError::Shape(_)));
    }

    #[test]
    fn marks_never_overwrite_neighbouring_blocks() {
        // Blocks at 2..4 and 5..7 with one free hour between them.
        let indicator = vec![0, 0, 1, 1, 0, 1, 1, 0, 0, 0];
        let shifted = shift(&indicator, Some(2), EdgePolicy::Clip).unwrap();
        assert_eq!(shifted, vec![-1, -1, 1, 1, -1, 1, 1, -1, -1, 0]);
    }

    #[test]
    fn blocks_detected_at_series_end() {
        let blocks = implementation_blocks(&[1, 0, 0, 1, 1]).unwrap();
        assert_eq!(
            blocks,
            vec![Block { start: 0, len: 1 }, Block { start: 3, len: 2 }]
        );
        assert!(implementation_blocks(&[0, 2]).is_err());
    }

    #[test]
    fn windows_report_distinct_hour_ranges() {
        let mut dvr = vec![0i64; 48];
        dvr[18..22].iter_mut().for_each(|h| *h = 1);
        dvr[42..46].iter_mut().for_each(|h| *h = 1);
        let hour_ids: Vec<i64> = (0..48).map(|h| h % 24).collect();

        let hours = df!("hourID" => hour_ids, "DVR" => dvr).unwrap();
        assert_eq!(implementation_windows(&hours, "DVR").unwrap(), vec!["18 - 21"]);
    }

    #[test]
    fn windows_reject_fractional_indicators() {
        let hours = df!("hourID" => [0i64, 1, 2, 3], "DVR" => [0.0, 1.7, 0.4, 0.0]).unwrap();
        let err = implementation_windows(&hours, "DVR").unwrap_err();
        assert!(matches!(err, EmissionsError::Domain(_)));
    }
}
