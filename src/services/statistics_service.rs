// StatisticsService - rating aggregates over programs, ratings and analytics
// The presentation report is rebuilt only when its input collections change

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::AppResult;
use crate::infrastructure::cache::{Cache, ContentHash};
use crate::infrastructure::document_store::{Collection, Document, DocumentStore};
use crate::models::{
    AuthUser, PresentationAnalytics, Program, Rating, RatingDistribution, UserProfile,
};

/// Number of entries the dashboard shows per list.
pub const DASHBOARD_TOP_N: usize = 5;
pub const DASHBOARD_RECENT_COMMENTS: usize = 10;

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round1(part as f64 / whole as f64 * 100.0)
    }
}

/// Aggregates for one conference talk.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationStats {
    /// Stable key when assigned, otherwise the derived key
    pub id: String,
    pub stable_key: Option<String>,
    pub derived_key: String,
    pub legacy_id: String,
    pub program_id: String,
    pub program_title: String,
    pub program_date: String,
    pub program_start: String,
    pub program_end: String,
    pub title: String,
    pub presenter: String,
    pub affiliation: String,
    pub start: String,
    pub end: String,
    pub resume: String,
    pub is_keynote: bool,
    pub average_presenter_rating: Option<f64>,
    pub average_presentation_rating: Option<f64>,
    pub average_rating: Option<f64>,
    pub rating_count: u64,
    pub comment_count: u64,
    pub presenter_rating_distribution: RatingDistribution,
    pub presentation_rating_distribution: RatingDistribution,
    pub has_rating: bool,
    pub has_comment: bool,
    pub from_analytics: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

impl PresentationStats {
    fn matches_key(&self, key: &str) -> bool {
        self.id == key
            || self.derived_key == key
            || self.legacy_id == key
            || self.stable_key.as_deref() == Some(key)
    }

    /// Keys ratings for this talk may carry.
    fn rating_keys(&self) -> Vec<&str> {
        let mut keys = vec![self.derived_key.as_str()];
        if let Some(stable) = self.stable_key.as_deref() {
            if stable != self.derived_key {
                keys.insert(0, stable);
            }
        }
        keys
    }
}

/// Aggregates for one presenter name across all of their talks.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenterStats {
    pub name: String,
    pub affiliation: String,
    /// Mean of presenter ratings weighted by how many each talk received, one decimal
    pub average_rating: f64,
    pub total_ratings: u64,
    pub rated_sessions: usize,
    pub total_sessions: usize,
    pub rating_distribution: RatingDistribution,
}

/// Everything derived from programs, ratings and analytics in one pass.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationReport {
    pub presentations: Vec<PresentationStats>,
    pub presenters: Vec<PresenterStats>,
    pub total_raw_ratings: usize,
    pub total_comments: usize,
    pub active_rating_users: usize,
}

impl PresentationReport {
    /// Build the report. Analytics records win over raw ratings when they
    /// carry at least one rating.
    pub fn build(programs: &[Program], ratings: &[Rating], analytics: &[PresentationAnalytics]) -> Self {
        let mut ratings_by_key: HashMap<&str, Vec<&Rating>> = HashMap::new();
        for rating in ratings {
            ratings_by_key
                .entry(rating.presentation_id.as_str())
                .or_default()
                .push(rating);
        }
        let analytics_by_key: HashMap<&str, &PresentationAnalytics> = analytics
            .iter()
            .filter(|a| a.total_ratings > 0)
            .map(|a| (a.presentation_id.as_str(), a))
            .collect();

        let mut presentations = Vec::new();
        for program in programs {
            for (legacy_id, conference) in program.conferences_with_legacy_ids() {
                let derived_key = conference.derived_key(&program.date).to_string();
                let stable_key = conference.stable_key().map(|k| k.to_string());

                let mut stats = PresentationStats {
                    id: stable_key.clone().unwrap_or_else(|| derived_key.clone()),
                    stable_key,
                    derived_key,
                    legacy_id,
                    program_id: program.id.clone(),
                    program_title: program.title.clone(),
                    program_date: program.date.clone(),
                    program_start: program.start.clone(),
                    program_end: program.end.clone(),
                    title: conference.title.clone(),
                    presenter: conference.presenter.clone(),
                    affiliation: conference.affiliation.clone(),
                    start: conference.start.clone(),
                    end: conference.end.clone(),
                    resume: conference.resume.clone(),
                    is_keynote: conference.is_keynote,
                    average_presenter_rating: None,
                    average_presentation_rating: None,
                    average_rating: None,
                    rating_count: 0,
                    comment_count: 0,
                    presenter_rating_distribution: RatingDistribution::zeroed(),
                    presentation_rating_distribution: RatingDistribution::zeroed(),
                    has_rating: false,
                    has_comment: false,
                    from_analytics: false,
                    last_updated: None,
                };

                let keys = stats.rating_keys();
                let record = keys.iter().find_map(|k| analytics_by_key.get(k).copied());
                let matched: Vec<&Rating> = keys
                    .iter()
                    .filter_map(|k| ratings_by_key.get(k))
                    .flatten()
                    .copied()
                    .collect();

                match record {
                    Some(a) => apply_analytics(&mut stats, a),
                    None => apply_ratings(&mut stats, &matched),
                }

                stats.average_rating = match (stats.average_presenter_rating, stats.average_presentation_rating) {
                    (Some(p), Some(q)) => Some((p + q) / 2.0),
                    (p, q) => p.or(q),
                };
                stats.has_rating = stats.average_rating.is_some();
                stats.has_comment = stats.comment_count > 0;
                presentations.push(stats);
            }
        }

        let presenters = aggregate_presenters(&presentations);

        let active_rating_users = ratings
            .iter()
            .map(|r| if r.user_id.is_empty() { r.user_email.as_str() } else { r.user_id.as_str() })
            .filter(|key| !key.is_empty())
            .collect::<HashSet<_>>()
            .len();

        Self {
            presentations,
            presenters,
            total_raw_ratings: ratings.len(),
            total_comments: ratings.iter().filter(|r| r.has_comment()).count(),
            active_rating_users,
        }
    }

    pub fn find(&self, key: &str) -> Option<&PresentationStats> {
        self.presentations.iter().find(|p| p.matches_key(key))
    }

    /// Presenters with at least one rating, best first.
    pub fn top_presenters(&self, limit: usize) -> Vec<PresenterStats> {
        let mut rated: Vec<PresenterStats> = self
            .presenters
            .iter()
            .filter(|p| p.total_ratings > 0 && p.average_rating > 0.0)
            .cloned()
            .collect();
        rated.sort_by(|a, b| {
            b.average_rating
                .total_cmp(&a.average_rating)
                .then(b.total_ratings.cmp(&a.total_ratings))
        });
        rated.truncate(limit);
        rated
    }

    /// Presentations with at least one rating, best first (average, then
    /// rating count, then program order).
    pub fn top_presentations(&self, limit: usize) -> Vec<PresentationStats> {
        let mut rated: Vec<&PresentationStats> = self
            .presentations
            .iter()
            .filter(|p| p.rating_count > 0 && p.average_rating.is_some())
            .collect();
        rated.sort_by(|a, b| {
            let (a_avg, b_avg) = (a.average_rating.unwrap_or(0.0), b.average_rating.unwrap_or(0.0));
            b_avg
                .total_cmp(&a_avg)
                .then(b.rating_count.cmp(&a.rating_count))
        });
        rated.into_iter().take(limit).cloned().collect()
    }

    /// All presentations, highest average first, unrated last, then by title.
    pub fn ranked_presentations(&self) -> Vec<PresentationStats> {
        let mut all = self.presentations.clone();
        all.sort_by(|a, b| {
            b.average_rating
                .unwrap_or(0.0)
                .total_cmp(&a.average_rating.unwrap_or(0.0))
                .then_with(|| a.title.cmp(&b.title))
        });
        all
    }
}

fn apply_analytics(stats: &mut PresentationStats, a: &PresentationAnalytics) {
    stats.average_presenter_rating = Some(a.average_presenter_rating).filter(|v| *v > 0.0);
    stats.average_presentation_rating = Some(a.average_presentation_rating).filter(|v| *v > 0.0);
    stats.rating_count = a.total_ratings;
    stats.comment_count = a.total_comments;
    stats.presenter_rating_distribution.merge(&a.presenter_rating_distribution);
    stats.presentation_rating_distribution.merge(&a.presentation_rating_distribution);
    stats.from_analytics = true;
    stats.last_updated = a.last_updated;
}

fn apply_ratings(stats: &mut PresentationStats, ratings: &[&Rating]) {
    let mut presenter_values = Vec::new();
    let mut presentation_values = Vec::new();
    for rating in ratings {
        if let Some(value) = rating.presenter_rating {
            presenter_values.push(value);
            stats.presenter_rating_distribution.record_value(value);
        }
        if let Some(value) = rating.presentation_rating {
            presentation_values.push(value);
            stats.presentation_rating_distribution.record_value(value);
        }
    }
    stats.average_presenter_rating = mean(&presenter_values);
    stats.average_presentation_rating = mean(&presentation_values);
    stats.rating_count = ratings.len() as u64;
    stats.comment_count = ratings.iter().filter(|r| r.has_comment()).count() as u64;
    stats.last_updated = ratings.iter().filter_map(|r| r.updated_at.or(r.rated_at)).max();
}

fn aggregate_presenters(presentations: &[PresentationStats]) -> Vec<PresenterStats> {
    struct Acc {
        stats: PresenterStats,
        weighted_sum: f64,
    }

    let mut order: Vec<Acc> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for p in presentations {
        let slot = *index.entry(p.presenter.as_str()).or_insert_with(|| {
            order.push(Acc {
                stats: PresenterStats {
                    name: p.presenter.clone(),
                    affiliation: p.affiliation.clone(),
                    average_rating: 0.0,
                    total_ratings: 0,
                    rated_sessions: 0,
                    total_sessions: 0,
                    rating_distribution: RatingDistribution::zeroed(),
                },
                weighted_sum: 0.0,
            });
            order.len() - 1
        });

        let acc = &mut order[slot];
        acc.stats.total_sessions += 1;
        if let Some(avg) = p.average_presenter_rating {
            // analytics records may come without a distribution
            let weight = match p.presenter_rating_distribution.total() {
                0 => p.rating_count,
                n => n,
            };
            if weight > 0 {
                acc.weighted_sum += avg * weight as f64;
                acc.stats.total_ratings += weight;
                acc.stats.rated_sessions += 1;
                acc.stats.rating_distribution.merge(&p.presenter_rating_distribution);
            }
        }
    }

    order
        .into_iter()
        .map(|mut acc| {
            if acc.stats.total_ratings > 0 {
                acc.stats.average_rating = round1(acc.weighted_sum / acc.stats.total_ratings as f64);
            }
            acc.stats
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct OverallDistribution {
    pub presenter: RatingDistribution,
    pub presentation: RatingDistribution,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCounts {
    pub total_auth_users: usize,
    pub total_profile_users: usize,
    /// The larger of the two; the collections overlap
    pub total_users: usize,
}

impl UserCounts {
    pub fn new(total_auth_users: usize, total_profile_users: usize) -> Self {
        Self {
            total_auth_users,
            total_profile_users,
            total_users: total_auth_users.max(total_profile_users),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsOverview {
    pub total_users: usize,
    pub total_auth_users: usize,
    pub total_profile_users: usize,
    pub active_rating_users: usize,
    pub total_presentations: usize,
    pub rated_presentations: usize,
    pub presentations_with_comments: usize,
    pub unique_presenters: usize,
    pub keynote_count: usize,
    pub total_individual_ratings: u64,
    pub total_comments: usize,
    pub avg_presenter_rating: f64,
    pub avg_presentation_rating: f64,
    pub rating_participation_rate: f64,
    pub user_participation_rate: f64,
    pub rating_distribution: OverallDistribution,
}

impl StatisticsOverview {
    pub fn from_report(report: &PresentationReport, users: UserCounts) -> Self {
        let presentations = &report.presentations;
        let rated = presentations.iter().filter(|p| p.has_rating).count();

        let presenter_avgs: Vec<f64> = presentations.iter().filter_map(|p| p.average_presenter_rating).collect();
        let presentation_avgs: Vec<f64> =
            presentations.iter().filter_map(|p| p.average_presentation_rating).collect();

        let mut distribution = OverallDistribution {
            presenter: RatingDistribution::zeroed(),
            presentation: RatingDistribution::zeroed(),
        };
        for p in presentations {
            distribution.presenter.merge(&p.presenter_rating_distribution);
            distribution.presentation.merge(&p.presentation_rating_distribution);
        }

        Self {
            total_users: users.total_users,
            total_auth_users: users.total_auth_users,
            total_profile_users: users.total_profile_users,
            active_rating_users: report.active_rating_users,
            total_presentations: presentations.len(),
            rated_presentations: rated,
            presentations_with_comments: presentations.iter().filter(|p| p.has_comment).count(),
            unique_presenters: presentations
                .iter()
                .map(|p| p.presenter.as_str())
                .collect::<HashSet<_>>()
                .len(),
            keynote_count: presentations.iter().filter(|p| p.is_keynote).count(),
            total_individual_ratings: presentations.iter().map(|p| p.rating_count).sum(),
            total_comments: report.total_comments,
            avg_presenter_rating: round1(mean(&presenter_avgs).unwrap_or(0.0)),
            avg_presentation_rating: round1(mean(&presentation_avgs).unwrap_or(0.0)),
            rating_participation_rate: percentage(rated, presentations.len()),
            user_participation_rate: percentage(report.active_rating_users, users.total_users),
            rating_distribution: distribution,
        }
    }
}

/// A rating with a non-blank comment, as shown in the feedback list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentEntry {
    pub id: String,
    pub presentation_id: String,
    pub presentation_title: String,
    pub presenter: String,
    pub program_title: String,
    pub program_date: String,
    pub comment: String,
    pub presenter_rating: Option<f64>,
    pub presentation_rating: Option<f64>,
    pub user_id: String,
    pub user_email: String,
    pub user_name: String,
    pub rated_at: Option<DateTime<Utc>>,
}

/// Resolves a rater to a display name from the profile collection.
pub struct UserNameResolver {
    by_id: HashMap<String, String>,
    by_email: HashMap<String, String>,
}

impl UserNameResolver {
    pub fn new(profiles: &[UserProfile]) -> Self {
        let mut by_id = HashMap::new();
        let mut by_email = HashMap::new();
        for profile in profiles {
            let name = if !profile.display_name.is_empty() {
                profile.display_name.clone()
            } else if !profile.email.is_empty() {
                profile.email.clone()
            } else {
                "Anonymous User".to_string()
            };
            by_id.insert(profile.uid.clone(), name.clone());
            by_id.insert(profile.id.clone(), name.clone());
            if !profile.email.is_empty() {
                by_email.entry(profile.email.clone()).or_insert(name);
            }
        }
        Self { by_id, by_email }
    }

    /// Profile by user id, else profile by email, else the email's local
    /// part, else `Anonymous User`.
    pub fn resolve(&self, user_id: &str, user_email: &str) -> String {
        if let Some(name) = self.by_id.get(user_id) {
            return name.clone();
        }
        if user_email.is_empty() {
            return "Anonymous User".to_string();
        }
        if let Some(name) = self.by_email.get(user_email) {
            return name.clone();
        }
        user_email.split('@').next().unwrap_or(user_email).to_string()
    }
}

/// Newest first; undated entries last.
fn newest_first<T>(items: &mut [T], at: impl Fn(&T) -> Option<DateTime<Utc>>) {
    items.sort_by(|a, b| match (at(a), at(b)) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatedPresentation {
    pub presentation_title: String,
    pub presenter: String,
    pub presenter_rating: Option<f64>,
    pub presentation_rating: Option<f64>,
    pub rated_at: Option<DateTime<Utc>>,
}

/// Rating activity of one attendee.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEngagement {
    pub user_id: String,
    pub user_email: String,
    pub total_ratings: usize,
    pub total_comments: usize,
    pub avg_presenter_rating: f64,
    pub avg_presentation_rating: f64,
    pub last_activity: Option<DateTime<Utc>>,
    pub presentations: Vec<RatedPresentation>,
}

pub fn user_engagement(ratings: &[Rating]) -> Vec<UserEngagement> {
    let mut order: Vec<UserEngagement> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for rating in ratings {
        let key = if !rating.user_id.is_empty() {
            rating.user_id.clone()
        } else if !rating.user_email.is_empty() {
            rating.user_email.clone()
        } else {
            "anonymous".to_string()
        };
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            order.push(UserEngagement {
                user_id: key,
                user_email: rating.user_email.clone(),
                total_ratings: 0,
                total_comments: 0,
                avg_presenter_rating: 0.0,
                avg_presentation_rating: 0.0,
                last_activity: None,
                presentations: Vec::new(),
            });
            order.len() - 1
        });

        let user = &mut order[slot];
        user.total_ratings += 1;
        if rating.has_comment() {
            user.total_comments += 1;
        }
        user.last_activity = user.last_activity.max(rating.rated_at);
        user.presentations.push(RatedPresentation {
            presentation_title: rating.conference_title.clone(),
            presenter: rating.presenter.clone(),
            presenter_rating: rating.presenter_rating,
            presentation_rating: rating.presentation_rating,
            rated_at: rating.rated_at,
        });
    }

    for user in &mut order {
        let presenter: Vec<f64> = user.presentations.iter().filter_map(|p| p.presenter_rating).collect();
        let presentation: Vec<f64> = user.presentations.iter().filter_map(|p| p.presentation_rating).collect();
        user.avg_presenter_rating = round1(mean(&presenter).unwrap_or(0.0));
        user.avg_presentation_rating = round1(mean(&presentation).unwrap_or(0.0));
    }

    order.sort_by(|a, b| b.total_ratings.cmp(&a.total_ratings));
    order
}

/// Number of users seen within `window` before `now`.
pub fn count_online(users: &[AuthUser], now: DateTime<Utc>, window: Duration) -> usize {
    let cutoff = now - window;
    users
        .iter()
        .filter(|u| u.last_seen().map(|seen| seen > cutoff).unwrap_or(false))
        .count()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserActivity {
    #[serde(flatten)]
    pub counts: UserCounts,
    pub online_users: usize,
    pub online_window_minutes: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub overview: StatisticsOverview,
    pub top_presenters: Vec<PresenterStats>,
    pub top_presentations: Vec<PresentationStats>,
    pub recent_comments: Vec<CommentEntry>,
}

#[derive(Clone)]
pub struct StatisticsService {
    store: Arc<dyn DocumentStore>,
    conference_name: String,
    online_window: Duration,
    memo: Arc<Mutex<Cache<ContentHash, Arc<PresentationReport>>>>,
    report_builds: Arc<AtomicU64>,
}

impl StatisticsService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        conference_name: impl Into<String>,
        cache_capacity: usize,
        online_window_minutes: i64,
    ) -> Self {
        Self {
            store,
            conference_name: conference_name.into(),
            online_window: Duration::minutes(online_window_minutes),
            memo: Arc::new(Mutex::new(Cache::new(cache_capacity))),
            report_builds: Arc::new(AtomicU64::new(0)),
        }
    }

    /// How many times the report was actually computed (cache misses).
    pub fn report_builds(&self) -> u64 {
        self.report_builds.load(Ordering::SeqCst)
    }

    async fn list_parsed<T>(&self, collection: Collection, parse: fn(&Document) -> T) -> AppResult<Vec<T>> {
        Ok(self.store.list(collection).await?.iter().map(parse).collect())
    }

    /// The presentation report, memoized on the content of its inputs.
    pub async fn report(&self) -> AppResult<Arc<PresentationReport>> {
        let (programs, ratings, analytics) = tokio::join!(
            self.store.list(Collection::Programs),
            self.store.list(Collection::Ratings),
            self.store.list(Collection::PresentationAnalytics),
        );
        let programs = programs?;
        let ratings = ratings?;
        // analytics are an optional accelerator; raw ratings still work without them
        let analytics = analytics.unwrap_or_else(|e| {
            warn!("Could not fetch analytics, using raw ratings: {}", e);
            Vec::new()
        });

        let parts: Vec<Value> = [&programs, &ratings, &analytics]
            .iter()
            .map(|docs| Value::Array(docs.iter().map(Document::to_json_with_id).collect()))
            .collect();
        let key = ContentHash::of_json(parts.iter());

        if let Some(report) = self.memo.lock().await.get(&key) {
            debug!("Statistics report cache hit ({:x})", key.value());
            return Ok(report.clone());
        }

        let programs: Vec<Program> = programs.iter().map(Program::from_document).collect();
        let ratings: Vec<Rating> = ratings.iter().map(Rating::from_document).collect();
        let analytics: Vec<PresentationAnalytics> =
            analytics.iter().map(PresentationAnalytics::from_document).collect();

        let report = Arc::new(PresentationReport::build(&programs, &ratings, &analytics));
        self.report_builds.fetch_add(1, Ordering::SeqCst);
        info!(
            "Built statistics report: {} presentations, {} ratings",
            report.presentations.len(),
            report.total_raw_ratings
        );

        self.memo.lock().await.insert(key, report.clone());
        Ok(report)
    }

    pub async fn presentations(&self) -> AppResult<Vec<PresentationStats>> {
        Ok(self.report().await?.ranked_presentations())
    }

    pub async fn top_presenters(&self, limit: usize) -> AppResult<Vec<PresenterStats>> {
        Ok(self.report().await?.top_presenters(limit))
    }

    pub async fn top_presentations(&self, limit: usize) -> AppResult<Vec<PresentationStats>> {
        Ok(self.report().await?.top_presentations(limit))
    }

    pub async fn user_counts(&self) -> AppResult<UserCounts> {
        let (auth, profiles) = tokio::try_join!(
            self.store.count(Collection::Users),
            self.store.count(Collection::UserProfiles),
        )?;
        Ok(UserCounts::new(auth, profiles))
    }

    pub async fn overview(&self) -> AppResult<StatisticsOverview> {
        let (report, users) = tokio::try_join!(self.report(), self.user_counts())?;
        Ok(StatisticsOverview::from_report(&report, users))
    }

    async fn comments_matching(&self, keep: impl Fn(&Rating) -> bool) -> AppResult<Vec<CommentEntry>> {
        let (ratings, profiles) = tokio::try_join!(
            self.list_parsed(Collection::Ratings, Rating::from_document),
            self.list_parsed(Collection::UserProfiles, UserProfile::from_document),
        )?;
        let names = UserNameResolver::new(&profiles);

        let mut comments: Vec<CommentEntry> = ratings
            .into_iter()
            .filter(|r| r.has_comment() && keep(r))
            .map(|r| CommentEntry {
                user_name: names.resolve(&r.user_id, &r.user_email),
                id: r.id,
                presentation_id: r.presentation_id.to_string(),
                presentation_title: r.conference_title,
                presenter: r.presenter,
                program_title: self.conference_name.clone(),
                program_date: r.date,
                comment: r.comment.unwrap_or_default(),
                presenter_rating: r.presenter_rating,
                presentation_rating: r.presentation_rating,
                user_id: if r.user_id.is_empty() { "anonymous".to_string() } else { r.user_id },
                user_email: r.user_email,
                rated_at: r.rated_at,
            })
            .collect();
        newest_first(&mut comments, |c| c.rated_at);
        Ok(comments)
    }

    /// Every rating with a comment, newest first.
    pub async fn all_comments(&self) -> AppResult<Vec<CommentEntry>> {
        self.comments_matching(|_| true).await
    }

    /// Comments for one presentation, looked up by any of its keys.
    pub async fn presentation_comments(&self, presentation_id: &str) -> AppResult<Vec<CommentEntry>> {
        let report = self.report().await?;
        let keys: HashSet<String> = match report.find(presentation_id) {
            Some(p) => p.rating_keys().into_iter().map(str::to_string).collect(),
            None => HashSet::from([presentation_id.to_string()]),
        };
        self.comments_matching(|r| keys.contains(r.presentation_id.as_str()))
            .await
    }

    pub async fn user_engagement(&self) -> AppResult<Vec<UserEngagement>> {
        let ratings = self.list_parsed(Collection::Ratings, Rating::from_document).await?;
        Ok(user_engagement(&ratings))
    }

    /// Profiles created per UTC day (`YYYY-MM-DD`).
    pub async fn registration_stats(&self) -> AppResult<BTreeMap<String, u64>> {
        let profiles = self
            .list_parsed(Collection::UserProfiles, UserProfile::from_document)
            .await?;
        let mut per_day = BTreeMap::new();
        for created in profiles.iter().filter_map(|p| p.created_at) {
            *per_day.entry(created.format("%Y-%m-%d").to_string()).or_insert(0) += 1;
        }
        Ok(per_day)
    }

    pub async fn online_users(&self) -> AppResult<usize> {
        let users = self.list_parsed(Collection::Users, AuthUser::from_document).await?;
        Ok(count_online(&users, Utc::now(), self.online_window))
    }

    pub async fn user_activity(&self) -> AppResult<UserActivity> {
        let (counts, online_users) = tokio::try_join!(self.user_counts(), self.online_users())?;
        Ok(UserActivity {
            counts,
            online_users,
            online_window_minutes: self.online_window.num_minutes(),
        })
    }

    pub async fn dashboard(&self) -> AppResult<Dashboard> {
        let (overview, top_presenters, top_presentations, mut recent_comments) = tokio::try_join!(
            self.overview(),
            self.top_presenters(DASHBOARD_TOP_N),
            self.top_presentations(DASHBOARD_TOP_N),
            self.all_comments(),
        )?;
        recent_comments.truncate(DASHBOARD_RECENT_COMMENTS);
        Ok(Dashboard {
            overview,
            top_presenters,
            top_presentations,
            recent_comments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PresentationKey;
    use crate::infrastructure::document_store::DocumentData;
    use crate::infrastructure::memory_store::MemoryDocumentStore;
    use crate::models::Conference;
    use serde_json::json;

    fn conf(title: &str, presenter: &str, start: &str) -> Conference {
        Conference {
            title: title.into(),
            presenter: presenter.into(),
            start: start.into(),
            ..Default::default()
        }
    }

    fn program(id: &str, date: &str, conferences: Vec<Conference>) -> Program {
        Program {
            id: id.into(),
            date: date.into(),
            conferences,
            ..Default::default()
        }
    }

    fn rating(key: &str, presenter: Option<u8>, presentation: Option<u8>) -> Rating {
        Rating {
            presentation_id: PresentationKey::new(key),
            presenter_rating: presenter.map(f64::from),
            presentation_rating: presentation.map(f64::from),
            user_id: "u1".into(),
            ..Default::default()
        }
    }

    fn key(c: &Conference, date: &str) -> String {
        c.derived_key(date).to_string()
    }

    #[test]
    fn test_example_ratings_average_to_four() {
        let talk = conf("Detection of Atherosclerosis", "Zahia Guessoum", "10:55");
        let k = key(&talk, "2025-12-08");
        let programs = vec![program("p1", "2025-12-08", vec![talk])];
        let ratings = vec![rating(&k, Some(5), Some(4)), rating(&k, Some(3), Some(4))];

        let report = PresentationReport::build(&programs, &ratings, &[]);
        let p = &report.presentations[0];
        assert_eq!(p.average_presenter_rating, Some(4.0));
        assert_eq!(p.average_presentation_rating, Some(4.0));
        assert_eq!(p.rating_count, 2);
        assert_eq!(p.presenter_rating_distribution.get(5), 1);
        assert_eq!(report.presenters[0].average_rating, 4.0);
    }

    #[test]
    fn test_unrated_presentation_has_null_averages() {
        let programs = vec![program("p1", "2025-12-08", vec![conf("A", "X", "09:00")])];
        let report = PresentationReport::build(&programs, &[], &[]);
        let p = &report.presentations[0];
        assert_eq!(p.average_rating, None);
        assert!(!p.has_rating);

        let overview = StatisticsOverview::from_report(&report, UserCounts::new(0, 0));
        assert_eq!(overview.avg_presenter_rating, 0.0);
        assert_eq!(overview.rating_participation_rate, 0.0);
        assert_eq!(overview.user_participation_rate, 0.0);
    }

    #[test]
    fn test_analytics_take_precedence() {
        let talk = conf("A", "X", "09:00");
        let k = key(&talk, "2025-12-08");
        let programs = vec![program("p1", "2025-12-08", vec![talk])];
        let ratings = vec![rating(&k, Some(1), Some(1))];
        let analytics = vec![PresentationAnalytics {
            presentation_id: PresentationKey::new(k.clone()),
            average_presenter_rating: 4.5,
            average_presentation_rating: 4.0,
            total_ratings: 10,
            total_comments: 3,
            ..Default::default()
        }];

        let report = PresentationReport::build(&programs, &ratings, &analytics);
        let p = &report.presentations[0];
        assert!(p.from_analytics);
        assert_eq!(p.average_presenter_rating, Some(4.5));
        assert_eq!(p.rating_count, 10);
        assert_eq!(p.comment_count, 3);
    }

    #[test]
    fn test_empty_analytics_record_falls_back_to_ratings() {
        let talk = conf("A", "X", "09:00");
        let k = key(&talk, "2025-12-08");
        let programs = vec![program("p1", "2025-12-08", vec![talk])];
        let analytics = vec![PresentationAnalytics {
            presentation_id: PresentationKey::new(k.clone()),
            ..Default::default()
        }];
        let report = PresentationReport::build(&programs, &[rating(&k, Some(2), None)], &analytics);
        assert!(!report.presentations[0].from_analytics);
        assert_eq!(report.presentations[0].average_rating, Some(2.0));
    }

    #[test]
    fn test_ratings_join_on_stable_and_derived_keys() {
        let mut talk = conf("A", "X", "09:00");
        talk.id = Some("stable-1".into());
        let derived = key(&talk, "2025-12-08");
        let programs = vec![program("p1", "2025-12-08", vec![talk])];
        let ratings = vec![rating("stable-1", Some(5), None), rating(&derived, Some(3), None)];

        let report = PresentationReport::build(&programs, &ratings, &[]);
        let p = &report.presentations[0];
        assert_eq!(p.id, "stable-1");
        assert_eq!(p.rating_count, 2);
        assert_eq!(p.average_presenter_rating, Some(4.0));
        assert!(report.find(&derived).is_some());
        assert!(report.find("p1_0").is_some());
    }

    #[test]
    fn test_presenter_average_is_weighted_by_rating_count() {
        let a = conf("A", "Same Person", "09:00");
        let b = conf("B", "Same Person", "10:00");
        let (ka, kb) = (key(&a, "d"), key(&b, "d"));
        let programs = vec![program("p1", "d", vec![a, b])];
        let ratings = vec![
            rating(&ka, Some(5), None),
            rating(&kb, Some(2), None),
            rating(&kb, Some(2), None),
        ];
        let report = PresentationReport::build(&programs, &ratings, &[]);
        let presenter = &report.presenters[0];
        assert_eq!(presenter.total_sessions, 2);
        assert_eq!(presenter.rated_sessions, 2);
        assert_eq!(presenter.total_ratings, 3);
        assert_eq!(presenter.average_rating, 3.0);
    }

    #[test]
    fn test_presenter_average_ignores_presentation_only_ratings() {
        let a = conf("A", "Same Person", "09:00");
        let b = conf("B", "Same Person", "10:00");
        let (ka, kb) = (key(&a, "d"), key(&b, "d"));
        let programs = vec![program("p1", "d", vec![a, b])];
        let ratings = vec![
            rating(&ka, Some(5), None),
            rating(&ka, None, Some(4)),
            rating(&kb, Some(1), None),
        ];
        let report = PresentationReport::build(&programs, &ratings, &[]);
        let presenter = &report.presenters[0];
        assert_eq!(presenter.total_ratings, 2);
        assert_eq!(presenter.average_rating, 3.0);
        assert_eq!(presenter.rating_distribution.total(), 2);
    }

    #[test]
    fn test_fractional_ratings_average_unrounded() {
        let talk = conf("A", "X", "09:00");
        let k = key(&talk, "d");
        let programs = vec![program("p1", "d", vec![talk])];
        let mut first = rating(&k, None, None);
        first.presenter_rating = Some(4.6);
        let second = rating(&k, Some(4), None);

        let report = PresentationReport::build(&programs, &[first, second], &[]);
        let p = &report.presentations[0];
        let avg = p.average_presenter_rating.unwrap();
        assert!((avg - 4.3).abs() < 1e-9);
        assert_eq!(p.presenter_rating_distribution.get(5), 1);
        assert_eq!(p.presenter_rating_distribution.get(4), 1);
    }

    #[test]
    fn test_top_presentations_order_by_unrounded_average() {
        let a = conf("A", "X", "09:00");
        let b = conf("B", "Y", "10:00");
        let (ka, kb) = (key(&a, "d"), key(&b, "d"));
        let programs = vec![program("p1", "d", vec![a, b])];
        // A averages 4.1667 over six ratings, B 4.2 over five; both show as 4.2
        let ratings: Vec<Rating> = [4u8, 4, 4, 4, 4, 5]
            .iter()
            .map(|v| rating(&ka, Some(*v), Some(*v)))
            .chain([4u8, 4, 4, 5, 4].iter().map(|v| rating(&kb, Some(*v), Some(*v))))
            .collect();
        let report = PresentationReport::build(&programs, &ratings, &[]);

        let top = report.top_presentations(2);
        assert_eq!(top[0].title, "B");
        assert_eq!(top[1].title, "A");
        assert!(top[0].average_rating >= top[1].average_rating);
    }

    #[test]
    fn test_top_n_properties() {
        let talks: Vec<Conference> = (0..6).map(|i| conf(&format!("T{}", i), &format!("P{}", i), "09:00")).collect();
        let keys: Vec<String> = talks.iter().map(|t| key(t, "d")).collect();
        let programs = vec![program("p1", "d", talks)];
        let ratings = vec![
            rating(&keys[0], Some(4), Some(4)),
            rating(&keys[1], Some(5), Some(5)),
            rating(&keys[2], Some(4), Some(4)),
            rating(&keys[2], Some(4), Some(4)),
            rating(&keys[3], Some(1), Some(2)),
            // keys[4] and keys[5] unrated
        ];
        let report = PresentationReport::build(&programs, &ratings, &[]);

        let top = report.top_presentations(10);
        assert_eq!(top.len(), 4);
        assert!(top.iter().all(|p| p.rating_count > 0));
        assert_eq!(top[0].title, "T1");
        // tie on 4.0 broken by rating count
        assert_eq!(top[1].title, "T2");
        assert_eq!(top[2].title, "T0");
        for pair in top.windows(2) {
            assert!(pair[0].average_rating >= pair[1].average_rating);
        }
        assert_eq!(report.top_presentations(2).len(), 2);

        let presenters = report.top_presenters(3);
        assert_eq!(presenters.len(), 3);
        assert_eq!(presenters[0].name, "P1");
        assert_eq!(presenters[1].name, "P2");
        assert!(report.top_presenters(10).iter().all(|p| p.total_ratings > 0));
    }

    #[test]
    fn test_averages_stay_within_bounds() {
        let talk = conf("A", "X", "09:00");
        let k = key(&talk, "d");
        let programs = vec![program("p1", "d", vec![talk])];
        let values = [1u8, 5, 3, 2, 5, 4];
        let ratings: Vec<Rating> = values.iter().map(|v| rating(&k, Some(*v), Some(*v))).collect();
        let report = PresentationReport::build(&programs, &ratings, &[]);
        let avg = report.presentations[0].average_presenter_rating.unwrap();
        assert!((1.0..=5.0).contains(&avg));
        assert!(!avg.is_nan());
    }

    #[test]
    fn test_overview_counts() {
        let mut keynote = conf("K", "Keynote Speaker", "09:00");
        keynote.is_keynote = true;
        let talk = conf("A", "X", "10:00");
        let k = key(&talk, "d");
        let programs = vec![program("p1", "d", vec![keynote, talk, conf("B", "X", "11:00")])];
        let mut commented = rating(&k, Some(4), Some(5));
        commented.comment = Some("Nice".into());
        let report = PresentationReport::build(&programs, &[commented], &[]);

        let overview = StatisticsOverview::from_report(&report, UserCounts::new(4, 2));
        assert_eq!(overview.total_presentations, 3);
        assert_eq!(overview.rated_presentations, 1);
        assert_eq!(overview.presentations_with_comments, 1);
        assert_eq!(overview.unique_presenters, 2);
        assert_eq!(overview.keynote_count, 1);
        assert_eq!(overview.rating_participation_rate, 33.3);
        assert_eq!(overview.total_users, 4);
        assert_eq!(overview.user_participation_rate, 25.0);
        assert_eq!(overview.rating_distribution.presentation.get(5), 1);
    }

    #[test]
    fn test_user_name_resolution() {
        let profiles = vec![
            UserProfile {
                id: "doc1".into(),
                uid: "u1".into(),
                display_name: "Amina".into(),
                email: "amina@x.com".into(),
                ..Default::default()
            },
            UserProfile {
                id: "doc2".into(),
                uid: "u2".into(),
                email: "karim@x.com".into(),
                ..Default::default()
            },
        ];
        let names = UserNameResolver::new(&profiles);
        assert_eq!(names.resolve("u1", ""), "Amina");
        assert_eq!(names.resolve("doc1", ""), "Amina");
        assert_eq!(names.resolve("u2", ""), "karim@x.com");
        assert_eq!(names.resolve("zz", "amina@x.com"), "Amina");
        assert_eq!(names.resolve("zz", "sara@y.org"), "sara");
        assert_eq!(names.resolve("zz", ""), "Anonymous User");
    }

    #[test]
    fn test_online_window() {
        let now = Utc::now();
        let users = vec![
            AuthUser {
                last_active_at: Some(now - Duration::minutes(2)),
                ..Default::default()
            },
            AuthUser {
                last_login_at: Some(now - Duration::minutes(5)),
                ..Default::default()
            },
            AuthUser {
                // activity wins over a recent login
                last_active_at: Some(now - Duration::minutes(30)),
                last_login_at: Some(now - Duration::minutes(1)),
                ..Default::default()
            },
            AuthUser::default(),
        ];
        assert_eq!(count_online(&users, now, Duration::minutes(10)), 2);
    }

    #[test]
    fn test_engagement_sorted_by_activity() {
        let mut a = rating("k", Some(5), Some(3));
        a.user_id = "a".into();
        let mut b1 = rating("k", Some(4), None);
        b1.user_id = "b".into();
        b1.comment = Some("ok".into());
        let mut b2 = rating("k2", Some(2), Some(2));
        b2.user_id = "b".into();

        let engagement = user_engagement(&[a, b1, b2]);
        assert_eq!(engagement[0].user_id, "b");
        assert_eq!(engagement[0].total_ratings, 2);
        assert_eq!(engagement[0].total_comments, 1);
        assert_eq!(engagement[0].avg_presenter_rating, 3.0);
        assert_eq!(engagement[0].avg_presentation_rating, 2.0);
    }

    fn data(value: serde_json::Value) -> DocumentData {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_report_memoized_until_inputs_change() {
        let store = Arc::new(MemoryDocumentStore::new());
        store
            .add(
                Collection::Programs,
                data(json!({"title": "S", "date": "2025-12-08", "conferences": [{"title": "A", "presenter": "X", "start": "09:00"}]})),
            )
            .await
            .unwrap();
        let service = StatisticsService::new(store.clone(), "RIF 2025", 4, 10);

        service.overview().await.unwrap();
        service.top_presenters(3).await.unwrap();
        assert_eq!(service.report_builds(), 1);

        store
            .add(
                Collection::Ratings,
                data(json!({"presentationId": "a_x_0900_20251208", "presenterRating": 5, "presentationRating": 5})),
            )
            .await
            .unwrap();
        let top = service.top_presenters(3).await.unwrap();
        assert_eq!(service.report_builds(), 2);
        assert_eq!(top[0].average_rating, 5.0);
    }

    #[tokio::test]
    async fn test_comments_and_dashboard() {
        let store = Arc::new(MemoryDocumentStore::new());
        store
            .add(
                Collection::Programs,
                data(json!({"title": "S", "date": "2025-12-08", "conferences": [{"title": "A", "presenter": "X", "start": "09:00"}]})),
            )
            .await
            .unwrap();
        store
            .add(
                Collection::Ratings,
                data(json!({
                    "presentationId": "a_x_0900_20251208",
                    "presenterRating": 4,
                    "presentationRating": 5,
                    "comment": "Great",
                    "userEmail": "sara@y.org",
                    "ratedAt": "2025-12-08T10:00:00Z"
                })),
            )
            .await
            .unwrap();
        store
            .add(
                Collection::Ratings,
                data(json!({"presentationId": "other", "comment": "Later", "ratedAt": "2025-12-09T10:00:00Z"})),
            )
            .await
            .unwrap();
        let service = StatisticsService::new(store, "RIF 2025", 4, 10);

        let all = service.all_comments().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].comment, "Later");
        assert_eq!(all[1].user_name, "sara");
        assert_eq!(all[1].program_title, "RIF 2025");

        let scoped = service.presentation_comments("a_x_0900_20251208").await.unwrap();
        assert_eq!(scoped.len(), 1);

        let dashboard = service.dashboard().await.unwrap();
        assert_eq!(dashboard.overview.total_presentations, 1);
        assert_eq!(dashboard.top_presentations.len(), 1);
        assert_eq!(dashboard.recent_comments.len(), 2);
    }
}
