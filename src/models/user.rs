// User models - auth records, profile records and the merged console row

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::infrastructure::document_store::{Collection, Document};
use crate::models::fields::FieldReader;

/// Record from `users`, written on sign-in by the mobile client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub id: String,
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub email_verified: bool,
    pub disabled: bool,
    #[serde(rename = "photoURL")]
    pub photo_url: String,
    pub created_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_active_at: Option<DateTime<Utc>>,
}

impl AuthUser {
    pub fn from_document(doc: &Document) -> Self {
        let r = FieldReader::new(Collection::Users, doc);
        Self {
            id: doc.id.clone(),
            uid: r.opt_string("uid").filter(|u| !u.is_empty()).unwrap_or_else(|| doc.id.clone()),
            email: r.string("email"),
            display_name: r.string("displayName"),
            name: r.string("name"),
            first_name: r.string("firstName"),
            last_name: r.string("lastName"),
            email_verified: r.bool("emailVerified"),
            disabled: r.bool("disabled"),
            photo_url: r.string("photoURL"),
            created_at: r.timestamp("createdAt"),
            last_login_at: r.timestamp("lastLoginAt"),
            last_active_at: r.timestamp("lastActiveAt"),
        }
    }

    /// Most recent sign of life: `lastActiveAt`, else `lastLoginAt`.
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.last_active_at.or(self.last_login_at)
    }
}

/// Record from `user_profiles`, filled in by attendees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(rename = "photoURL")]
    pub photo_url: String,
    pub school: String,
    pub school_level: String,
    pub gender: String,
    pub birthday: Option<DateTime<Utc>>,
    pub location: String,
    pub is_profile_complete: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn from_document(doc: &Document) -> Self {
        let r = FieldReader::new(Collection::UserProfiles, doc);
        Self {
            id: doc.id.clone(),
            uid: r.opt_string("uid").filter(|u| !u.is_empty()).unwrap_or_else(|| doc.id.clone()),
            email: r.string("email"),
            display_name: r.string("displayName"),
            name: r.string("name"),
            first_name: r.string("firstName"),
            last_name: r.string("lastName"),
            photo_url: r.string("photoURL"),
            school: r.string("school"),
            school_level: r.string("schoolLevel"),
            gender: r.string("gender"),
            birthday: r.timestamp("birthday"),
            location: r.string("location"),
            is_profile_complete: r.bool("isProfileComplete"),
            created_at: r.timestamp("createdAt"),
            updated_at: r.timestamp("updatedAt"),
        }
    }
}

/// One row of the users page: auth record and profile joined on `uid`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedUser {
    pub uid: String,
    pub name: String,
    pub email: String,
    #[serde(rename = "photoURL")]
    pub photo_url: String,
    pub first_name: String,
    pub last_name: String,
    pub school: String,
    pub school_level: String,
    pub location: String,
    pub gender: String,
    pub is_profile_complete: bool,
    pub email_verified: bool,
    pub disabled: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub has_profile: bool,
    pub has_auth_record: bool,
}
