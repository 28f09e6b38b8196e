use serde::Serialize;

use crate::core::now_rfc3339;
use crate::error::AppResult;
use crate::infrastructure::document_store::DocumentData;

pub const PROFILE_COMPLETION: &str = "profile_completion";

/// In-app notification as read by the mobile client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub user_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub is_read: bool,
    pub priority: String,
    pub created_at: String,
}

impl Notification {
    /// Reminder sent to attendees whose profile is not complete yet.
    pub fn profile_completion(user_id: &str, display_name: &str, conference_name: &str) -> Self {
        let greeting = if display_name.trim().is_empty() {
            "there"
        } else {
            display_name.trim()
        };
        Self {
            user_id: user_id.to_string(),
            title: "Complete Your Profile".to_string(),
            message: format!(
                "Hi {}! Please complete your profile to enjoy all features of the {} conference app. \
                 Update your school, location, and other details to get personalized recommendations.",
                greeting, conference_name
            ),
            notification_type: PROFILE_COMPLETION.to_string(),
            is_read: false,
            priority: "normal".to_string(),
            created_at: now_rfc3339(),
        }
    }

    pub fn to_document_data(&self) -> AppResult<DocumentData> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Ok(DocumentData::new()),
        }
    }
}
