//! Majority-vote normalization of rating answers
//!
//! The classifier is asked for exactly one of 高/中/低 but may answer with
//! commentary, repeats or several labels. Every character is scanned, each
//! label is tallied, and the most frequent label wins. Ties go to the more
//! severe label: 高 > 中 > 低.

use crate::error::LabelError;
use crate::types::Rating;

/// Occurrence counts of the three rating labels in a response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelTally {
    counts: [usize; 3],
}

impl LabelTally {
    /// Tally every label character in `raw`
    #[must_use]
    pub fn scan(raw: &str) -> Self {
        let mut tally = Self::default();
        for rating in raw.chars().filter_map(Rating::from_char) {
            tally.counts[rating.index()] += 1;
        }
        tally
    }

    /// Occurrences of one label
    #[inline]
    #[must_use]
    pub fn count(&self, rating: Rating) -> usize {
        self.counts[rating.index()]
    }

    /// Total label characters seen
    #[inline]
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Most frequent label, ties broken by `Rating::ALL` order
    #[must_use]
    pub fn winner(&self) -> Option<Rating> {
        let mut best: Option<(Rating, usize)> = None;
        for rating in Rating::ALL {
            let count = self.count(rating);
            if count == 0 {
                continue;
            }
            match best {
                Some((_, top)) if top >= count => {}
                _ => best = Some((rating, count)),
            }
        }
        best.map(|(rating, _)| rating)
    }
}

/// Reduce a raw classifier answer to a single rating
///
/// # Errors
/// `LabelError::NoLabel` if the answer contains none of 高/中/低.
pub fn normalize_label(raw: &str) -> Result<Rating, LabelError> {
    LabelTally::scan(raw)
        .winner()
        .ok_or_else(|| LabelError::NoLabel {
            response: raw.to_string(),
        })
}
