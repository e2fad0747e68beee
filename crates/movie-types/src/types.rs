//! Domain types exchanged with the movie-info and reviews upstreams.
//!
//! All of these are built per request from upstream payloads and dropped
//! once the composite [`Movie`] has been returned.

use chrono::NaiveDate;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

// =============================================================================
// Type Aliases
// =============================================================================

/// Opaque identifier assigned by the movie-info service
pub type MovieInfoId = String;

/// Opaque identifier assigned by the reviews service
pub type ReviewId = String;

// =============================================================================
// Upstream Entities
// =============================================================================

/// Metadata record served by the movie-info upstream.
///
/// The decoder accepts both the current field names and the ones the
/// movie-info service historically emitted (`movieInfoId`, `name`,
/// `release_date`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieMetadata {
    #[serde(alias = "movieInfoId")]
    pub id: MovieInfoId,
    #[serde(alias = "name")]
    pub title: String,
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default)]
    pub cast: Vec<String>,
    #[serde(default, alias = "release_date")]
    pub release_date: Option<NaiveDate>,
}

/// A single review served by the reviews upstream.
///
/// `metadata_id` is not checked against the movie-info service; it may
/// reference metadata that no longer exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(default, alias = "reviewId")]
    pub id: Option<ReviewId>,
    #[serde(alias = "movieInfoId", deserialize_with = "id_from_string_or_number")]
    pub metadata_id: MovieInfoId,
    #[serde(default)]
    pub comment: String,
    /// Non-negative when present; payloads carrying a negative rating
    /// fail to decode.
    #[serde(default, deserialize_with = "non_negative_rating")]
    pub rating: Option<f64>,
}

/// The reviews service stores the foreign key as a number, newer
/// deployments send a string.
fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}

fn non_negative_rating<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<f64>::deserialize(deserializer)? {
        Some(rating) if rating.is_nan() || rating < 0.0 => Err(de::Error::custom(format!(
            "rating must be non-negative, got {}",
            rating
        ))),
        rating => Ok(rating),
    }
}

// =============================================================================
// Composite Result
// =============================================================================

/// One metadata record plus every review found for it.
///
/// Reviews keep the order the upstream sent them in, which is not stable
/// across calls; use [`Movie::same_content`] rather than `==` when the
/// order should not matter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    #[serde(rename = "movieInfo")]
    pub metadata: MovieMetadata,
    #[serde(rename = "reviewList", default)]
    pub reviews: Vec<Review>,
}

impl Movie {
    pub fn new(metadata: MovieMetadata, reviews: Vec<Review>) -> Self {
        Self { metadata, reviews }
    }

    /// Structural equality that ignores the order of the review list.
    pub fn same_content(&self, other: &Movie) -> bool {
        if self.metadata != other.metadata || self.reviews.len() != other.reviews.len() {
            return false;
        }
        sorted_reviews(&self.reviews) == sorted_reviews(&other.reviews)
    }

    /// Mean of the reviews that carry a rating.
    pub fn average_rating(&self) -> Option<f64> {
        let ratings: Vec<f64> = self.reviews.iter().filter_map(|r| r.rating).collect();
        if ratings.is_empty() {
            return None;
        }
        Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
    }
}

fn sorted_reviews(reviews: &[Review]) -> Vec<&Review> {
    let mut sorted: Vec<&Review> = reviews.iter().collect();
    // Total order over every field, so equal multisets sort identically
    sorted.sort_by(|a, b| {
        a.id.cmp(&b.id)
            .then_with(|| a.metadata_id.cmp(&b.metadata_id))
            .then_with(|| a.comment.cmp(&b.comment))
            .then_with(|| match (a.rating, b.rating) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (x, y) => x.is_some().cmp(&y.is_some()),
            })
    });
    sorted
}
