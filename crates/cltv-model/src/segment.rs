//! Quartile segmentation of lifetime value scores.
//!
//! Customers are ranked by score and the ranking is cut into four groups of
//! equal size (differing by at most one). Equal scores keep their input
//! order, so a tie straddling a boundary is split deterministically and a
//! customer listed earlier never lands in a higher segment than a later one
//! with the same score.
//!
//! ```
//! use cltv_model::segment::{Segment, assign_segments};
//!
//! let segments = assign_segments(&[5.0, 1.0, 8.0, 3.0]).unwrap();
//! assert_eq!(segments, [Segment::B, Segment::D, Segment::A, Segment::C]);
//! ```

use serde::{Deserialize, Serialize};

/// Number of segments a scored population is split into.
pub const SEGMENT_COUNT: usize = 4;

/// Ordinal value tier, `D` lowest to `A` highest.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::FromStr,
)]
pub enum Segment {
    D,
    C,
    B,
    A,
}

impl Segment {
    /// All segments from lowest to highest.
    pub const ALL: [Self; SEGMENT_COUNT] = [Self::D, Self::C, Self::B, Self::A];
}

/// Errors raised by [`assign_segments`].
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum SegmentationError {
    #[display("{distinct} distinct score(s) cannot form {required} segments")]
    InsufficientDistinctScores { distinct: usize, required: usize },
    #[display("score at position {index} is not finite: {score}")]
    NonFiniteScore { index: usize, score: f64 },
}

/// Assigns a segment to every score, in input order.
///
/// # Errors
///
/// - [`SegmentationError::NonFiniteScore`] if a score is NaN or infinite
/// - [`SegmentationError::InsufficientDistinctScores`] if fewer than four
///   distinct scores exist
pub fn assign_segments(scores: &[f64]) -> Result<Vec<Segment>, SegmentationError> {
    if let Some((index, &score)) = scores.iter().enumerate().find(|(_, s)| !s.is_finite()) {
        return Err(SegmentationError::NonFiniteScore { index, score });
    }

    let mut order = (0..scores.len()).collect::<Vec<_>>();
    order.sort_by(|&i, &j| scores[i].total_cmp(&scores[j]));

    let distinct = 1 + order
        .windows(2)
        .filter(|w| scores[w[0]] != scores[w[1]])
        .count();
    if scores.is_empty() || distinct < SEGMENT_COUNT {
        return Err(SegmentationError::InsufficientDistinctScores {
            distinct: if scores.is_empty() { 0 } else { distinct },
            required: SEGMENT_COUNT,
        });
    }

    let n = scores.len();
    let mut segments = vec![Segment::D; n];
    for (rank, &index) in order.iter().enumerate() {
        segments[index] = Segment::ALL[rank * SEGMENT_COUNT / n];
    }
    Ok(segments)
}
