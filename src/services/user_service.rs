// UserService - merged user directory, counts and profile reminders

use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::AppResult;
use crate::infrastructure::document_store::{Collection, Document, DocumentStore};
use crate::models::{AuthUser, MergedUser, Notification, UserProfile};
use crate::services::statistics_service::UserCounts;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

pub const NO_NAME: &str = "No Name";

pub fn looks_like_email(value: &str) -> bool {
    EMAIL_PATTERN.is_match(value.trim())
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn full_name(first: &str, last: &str) -> Option<String> {
    match (non_blank(first), non_blank(last)) {
        (Some(f), Some(l)) => Some(format!("{} {}", f, l)),
        _ => None,
    }
}

/// Display name for a merged row. Profile values are consulted before auth
/// values at every step.
pub fn resolve_name(auth: Option<&AuthUser>, profile: Option<&UserProfile>) -> String {
    let first_last = profile
        .and_then(|p| full_name(&p.first_name, &p.last_name))
        .or_else(|| auth.and_then(|a| full_name(&a.first_name, &a.last_name)));
    if let Some(name) = first_last {
        return name;
    }

    let plain = profile
        .and_then(|p| non_blank(&p.name))
        .or_else(|| auth.and_then(|a| non_blank(&a.name)));
    if let Some(name) = plain {
        return name.to_string();
    }

    let display = profile
        .and_then(|p| non_blank(&p.display_name))
        .into_iter()
        .chain(auth.and_then(|a| non_blank(&a.display_name)))
        .find(|d| !looks_like_email(d));
    display.map(str::to_string).unwrap_or_else(|| NO_NAME.to_string())
}

fn prefer<'a>(first: Option<&'a str>, second: Option<&'a str>) -> String {
    first
        .and_then(non_blank)
        .or_else(|| second.and_then(non_blank))
        .unwrap_or_default()
        .to_string()
}

/// Join auth records and profiles on `uid`, one row per user.
pub fn merge_users(auth_users: &[AuthUser], profiles: &[UserProfile]) -> Vec<MergedUser> {
    let mut order: Vec<&str> = Vec::new();
    let mut auth_by_uid: HashMap<&str, &AuthUser> = HashMap::new();
    let mut profile_by_uid: HashMap<&str, &UserProfile> = HashMap::new();

    for user in auth_users {
        if auth_by_uid.insert(user.uid.as_str(), user).is_none() {
            order.push(user.uid.as_str());
        }
    }
    for profile in profiles {
        let uid = profile.uid.as_str();
        if profile_by_uid.insert(uid, profile).is_none() && !auth_by_uid.contains_key(uid) {
            order.push(uid);
        }
    }

    let mut merged: Vec<MergedUser> = order
        .into_iter()
        .map(|uid| {
            let auth = auth_by_uid.get(uid).copied();
            let profile = profile_by_uid.get(uid).copied();
            MergedUser {
                uid: uid.to_string(),
                name: resolve_name(auth, profile),
                email: prefer(auth.map(|a| a.email.as_str()), profile.map(|p| p.email.as_str())),
                photo_url: prefer(
                    auth.map(|a| a.photo_url.as_str()),
                    profile.map(|p| p.photo_url.as_str()),
                ),
                first_name: prefer(
                    profile.map(|p| p.first_name.as_str()),
                    auth.map(|a| a.first_name.as_str()),
                ),
                last_name: prefer(
                    profile.map(|p| p.last_name.as_str()),
                    auth.map(|a| a.last_name.as_str()),
                ),
                school: profile.map(|p| p.school.clone()).unwrap_or_default(),
                school_level: profile.map(|p| p.school_level.clone()).unwrap_or_default(),
                location: profile.map(|p| p.location.clone()).unwrap_or_default(),
                gender: profile.map(|p| p.gender.clone()).unwrap_or_default(),
                is_profile_complete: profile.map(|p| p.is_profile_complete).unwrap_or(false),
                email_verified: auth.map(|a| a.email_verified).unwrap_or(false),
                disabled: auth.map(|a| a.disabled).unwrap_or(false),
                created_at: auth
                    .and_then(|a| a.created_at)
                    .or_else(|| profile.and_then(|p| p.created_at)),
                last_login_at: auth.and_then(|a| a.last_login_at),
                has_profile: profile.is_some(),
                has_auth_record: auth.is_some(),
            }
        })
        .collect();

    // stable sort keeps first-seen order among equal timestamps
    merged.sort_by(|a, b| match (a.created_at, b.created_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    merged
}

/// Case-insensitive filter over name, email, school, location and level.
pub fn search_users(users: &[MergedUser], term: &str) -> Vec<MergedUser> {
    let needle = term.trim().to_lowercase();
    if needle.is_empty() {
        return users.to_vec();
    }
    users
        .iter()
        .filter(|u| {
            [&u.name, &u.email, &u.school, &u.location, &u.school_level]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifiedUser {
    pub uid: String,
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationReport {
    pub success: bool,
    pub message: String,
    pub notifications_sent: usize,
    pub users: Vec<NotifiedUser>,
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn DocumentStore>,
    conference_name: String,
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>, conference_name: impl Into<String>) -> Self {
        Self {
            store,
            conference_name: conference_name.into(),
        }
    }

    /// Change feeds of the two collections the merge reads.
    pub fn subscribe_sources(&self) -> (watch::Receiver<u64>, watch::Receiver<u64>) {
        (
            self.store.subscribe(Collection::Users),
            self.store.subscribe(Collection::UserProfiles),
        )
    }

    pub async fn source_documents(&self) -> AppResult<(Vec<Document>, Vec<Document>)> {
        tokio::try_join!(
            self.store.list(Collection::Users),
            self.store.list(Collection::UserProfiles),
        )
    }

    pub async fn load_sources(&self) -> AppResult<(Vec<AuthUser>, Vec<UserProfile>)> {
        let (auth_docs, profile_docs) = self.source_documents().await?;
        Ok((
            auth_docs.iter().map(AuthUser::from_document).collect(),
            profile_docs.iter().map(UserProfile::from_document).collect(),
        ))
    }

    pub async fn merged_users(&self) -> AppResult<Vec<MergedUser>> {
        let (auth, profiles) = self.load_sources().await?;
        let merged = merge_users(&auth, &profiles);
        info!(
            "Merged {} users from {} auth records and {} profiles",
            merged.len(),
            auth.len(),
            profiles.len()
        );
        Ok(merged)
    }

    pub async fn search(&self, term: &str) -> AppResult<Vec<MergedUser>> {
        Ok(search_users(&self.merged_users().await?, term))
    }

    pub async fn user_counts(&self) -> AppResult<UserCounts> {
        let (auth, profiles) = tokio::try_join!(
            self.store.count(Collection::Users),
            self.store.count(Collection::UserProfiles),
        )?;
        Ok(UserCounts::new(auth, profiles))
    }

    /// Write a `profile_completion` notification for every incomplete
    /// profile. Writes run concurrently; failed writes are logged and left
    /// out of the count.
    pub async fn notify_incomplete_profiles(&self) -> AppResult<NotificationReport> {
        let profiles: Vec<UserProfile> = self
            .store
            .list(Collection::UserProfiles)
            .await?
            .iter()
            .map(UserProfile::from_document)
            .filter(|p| !p.is_profile_complete)
            .collect();

        if profiles.is_empty() {
            return Ok(NotificationReport {
                success: true,
                message: "No users with incomplete profiles found.".to_string(),
                notifications_sent: 0,
                users: Vec::new(),
            });
        }

        let writes = profiles.iter().map(|profile| async move {
            let notification =
                Notification::profile_completion(&profile.uid, &profile.display_name, &self.conference_name);
            let data = notification.to_document_data()?;
            self.store.add(Collection::Notifications, data).await
        });
        let results = join_all(writes).await;

        let mut users = Vec::new();
        for (profile, result) in profiles.iter().zip(results) {
            match result {
                Ok(_) => users.push(NotifiedUser {
                    uid: profile.uid.clone(),
                    email: profile.email.clone(),
                    display_name: profile.display_name.clone(),
                }),
                Err(e) => warn!("Failed to notify user {}: {}", profile.uid, e),
            }
        }

        info!("Sent {} profile completion notifications", users.len());
        Ok(NotificationReport {
            success: true,
            message: format!(
                "Successfully sent notifications to {} users with incomplete profiles.",
                users.len()
            ),
            notifications_sent: users.len(),
            users,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::document_store::DocumentData;
    use crate::infrastructure::memory_store::MemoryDocumentStore;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn auth(uid: &str) -> AuthUser {
        AuthUser {
            id: uid.into(),
            uid: uid.into(),
            ..Default::default()
        }
    }

    fn profile(uid: &str) -> UserProfile {
        UserProfile {
            id: uid.into(),
            uid: uid.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_email_detection() {
        assert!(looks_like_email("someone@example.com"));
        assert!(!looks_like_email("Someone Example"));
        assert!(!looks_like_email("half@way"));
    }

    #[test]
    fn test_name_precedence() {
        let mut a = auth("u");
        let mut p = profile("u");
        assert_eq!(resolve_name(Some(&a), Some(&p)), NO_NAME);

        a.display_name = "x@y.com".into();
        assert_eq!(resolve_name(Some(&a), Some(&p)), NO_NAME);

        a.display_name = "Display".into();
        assert_eq!(resolve_name(Some(&a), Some(&p)), "Display");

        a.name = "Plain".into();
        assert_eq!(resolve_name(Some(&a), Some(&p)), "Plain");

        a.first_name = "Auth".into();
        a.last_name = "Name".into();
        assert_eq!(resolve_name(Some(&a), Some(&p)), "Auth Name");

        p.first_name = "Profile".into();
        // last name missing, profile pair incomplete
        assert_eq!(resolve_name(Some(&a), Some(&p)), "Auth Name");
        p.last_name = "Person".into();
        assert_eq!(resolve_name(Some(&a), Some(&p)), "Profile Person");
    }

    #[test]
    fn test_one_row_per_user() {
        let auth_users = vec![auth("both"), auth("auth-only")];
        let profiles = vec![profile("both"), profile("profile-only")];
        let merged = merge_users(&auth_users, &profiles);

        assert_eq!(merged.len(), 3);
        let both = merged.iter().find(|u| u.uid == "both").unwrap();
        assert!(both.has_profile && both.has_auth_record);
        let auth_only = merged.iter().find(|u| u.uid == "auth-only").unwrap();
        assert!(!auth_only.has_profile);
        let profile_only = merged.iter().find(|u| u.uid == "profile-only").unwrap();
        assert!(!profile_only.has_auth_record);
    }

    #[test]
    fn test_field_sources_and_ordering() {
        let mut old = auth("old");
        old.created_at = Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        old.email = "old@x.com".into();
        let mut new = profile("new");
        new.created_at = Some(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        new.email = "new@x.com".into();
        new.school = "ESI".into();
        let undated = auth("undated");

        let merged = merge_users(&[undated, old], &[new]);
        let uids: Vec<&str> = merged.iter().map(|u| u.uid.as_str()).collect();
        assert_eq!(uids, vec!["new", "old", "undated"]);
        assert_eq!(merged[0].email, "new@x.com");
        assert_eq!(merged[0].school, "ESI");
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let mut u = MergedUser {
            uid: "1".into(),
            name: "Amina Belkacem".into(),
            ..Default::default()
        };
        u.location = "Constantine".into();
        let users = vec![u, MergedUser::default()];
        assert_eq!(search_users(&users, "constan").len(), 1);
        assert_eq!(search_users(&users, "AMINA").len(), 1);
        assert_eq!(search_users(&users, "  ").len(), 2);
    }

    fn data(value: serde_json::Value) -> DocumentData {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_notify_incomplete_profiles() {
        let store = Arc::new(MemoryDocumentStore::new());
        store
            .add(Collection::UserProfiles, data(json!({"uid": "a", "displayName": "Amina"})))
            .await
            .unwrap();
        store
            .add(Collection::UserProfiles, data(json!({"uid": "b", "isProfileComplete": true})))
            .await
            .unwrap();
        let service = UserService::new(store.clone(), "RIF 2025");

        let report = service.notify_incomplete_profiles().await.unwrap();
        assert_eq!(report.notifications_sent, 1);
        assert_eq!(report.users[0].uid, "a");
        assert_eq!(
            report.message,
            "Successfully sent notifications to 1 users with incomplete profiles."
        );

        let notes = store.list(Collection::Notifications).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].get("userId"), Some(&json!("a")));
    }

    #[tokio::test]
    async fn test_notify_with_nothing_to_do() {
        let store = Arc::new(MemoryDocumentStore::new());
        let report = UserService::new(store, "RIF").notify_incomplete_profiles().await.unwrap();
        assert_eq!(report.notifications_sent, 0);
        assert_eq!(report.message, "No users with incomplete profiles found.");
    }
}
