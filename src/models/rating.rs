// Rating models - attendee ratings and the optional pre-aggregated analytics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::PresentationKey;
use crate::infrastructure::document_store::{Collection, Document};
use crate::models::fields::FieldReader;

/// Count of ratings per star value, serialized as `{"1": n, .., "5": n}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatingDistribution(BTreeMap<u8, u64>);

impl RatingDistribution {
    /// Distribution with every star value present at zero.
    pub fn zeroed() -> Self {
        Self((1..=5).map(|star| (star, 0)).collect())
    }

    pub fn record(&mut self, star: u8) {
        if (1..=5).contains(&star) {
            *self.0.entry(star).or_insert(0) += 1;
        }
    }

    /// Count a possibly fractional rating under its nearest star.
    pub fn record_value(&mut self, value: f64) {
        self.record(value.round() as u8);
    }

    pub fn merge(&mut self, other: &RatingDistribution) {
        for (star, count) in &other.0 {
            *self.0.entry(*star).or_insert(0) += count;
        }
    }

    pub fn get(&self, star: u8) -> u64 {
        self.0.get(&star).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    fn from_reader(r: &FieldReader<'_>, field: &str) -> Self {
        let mut dist = Self::default();
        if let Some(nested) = r.nested(field) {
            for star in 1..=5u8 {
                let count = nested.u64(&star.to_string());
                if count > 0 {
                    dist.0.insert(star, count);
                }
            }
        }
        dist
    }
}

/// A rating in 1.0..=5.0; anything else counts as no rating.
fn star_value(raw: Option<f64>) -> Option<f64> {
    raw.filter(|v| (1.0..=5.0).contains(v))
}

/// One attendee's rating of one presentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub id: String,
    pub presentation_id: PresentationKey,
    pub user_id: String,
    pub user_email: String,
    pub conference_title: String,
    pub presenter: String,
    pub start_time: String,
    pub date: String,
    pub presenter_rating: Option<f64>,
    pub presentation_rating: Option<f64>,
    pub comment: Option<String>,
    pub rated_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Rating {
    pub fn from_document(doc: &Document) -> Self {
        let r = FieldReader::new(Collection::Ratings, doc);
        Self {
            id: doc.id.clone(),
            presentation_id: PresentationKey::new(r.string("presentationId")),
            user_id: r.string("userId"),
            user_email: r.string("userEmail"),
            conference_title: r.string("conferenceTitle"),
            presenter: r.string("presenter"),
            start_time: r.string("startTime"),
            date: r.string("date"),
            presenter_rating: star_value(r.opt_f64("presenterRating")),
            presentation_rating: star_value(r.opt_f64("presentationRating")),
            comment: r
                .opt_string("comment")
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            rated_at: r.timestamp("ratedAt"),
            updated_at: r.timestamp("updatedAt"),
        }
    }

    pub fn has_comment(&self) -> bool {
        self.comment.is_some()
    }
}

/// Pre-aggregated ratings of one presentation, written by a backend job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationAnalytics {
    pub id: String,
    pub presentation_id: PresentationKey,
    pub conference_title: String,
    pub presenter: String,
    pub average_presenter_rating: f64,
    pub average_presentation_rating: f64,
    pub total_ratings: u64,
    pub total_comments: u64,
    pub presenter_rating_distribution: RatingDistribution,
    pub presentation_rating_distribution: RatingDistribution,
    pub last_updated: Option<DateTime<Utc>>,
}

impl PresentationAnalytics {
    pub fn from_document(doc: &Document) -> Self {
        let r = FieldReader::new(Collection::PresentationAnalytics, doc);
        Self {
            id: doc.id.clone(),
            presentation_id: PresentationKey::new(r.string("presentationId")),
            conference_title: r.string("conferenceTitle"),
            presenter: r.string("presenter"),
            average_presenter_rating: r.f64("averagePresenterRating"),
            average_presentation_rating: r.f64("averagePresentationRating"),
            total_ratings: r.u64("totalRatings"),
            total_comments: r.u64("totalComments"),
            presenter_rating_distribution: RatingDistribution::from_reader(&r, "presenterRatingDistribution"),
            presentation_rating_distribution: RatingDistribution::from_reader(
                &r,
                "presentationRatingDistribution",
            ),
            last_updated: r.timestamp("lastUpdated"),
        }
    }
}
