use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Ad, Condition, Proposal};
use crate::pagination::PageWindow;

// -- JWT Claims --

/// Bearer token claims. `sub` is the user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignupRequest {
    pub username: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Validation --

/// Field-level and form-level validation messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub fields: BTreeMap<String, Vec<String>>,
    pub form: Vec<String>,
}

impl ValidationErrors {
    pub fn add_field(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn add_form(&mut self, message: impl Into<String>) {
        self.form.push(message.into());
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.form.is_empty()
    }
}

// -- Ads --

/// Ad form input. Unknown keys (e.g. an `owner`) are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdInput {
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub category: String,
    pub condition: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdListQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub condition: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdFormContext {
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub num_pages: u32,
    pub total: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow) -> Self {
        Self {
            items,
            page: window.number,
            num_pages: window.num_pages,
            total: window.total,
            has_next: window.has_next(),
            has_previous: window.has_previous(),
        }
    }
}

// -- Proposals --

/// Proposal form input. Ids arrive as strings so that malformed or unknown
/// ids become field errors instead of body rejections.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProposalInput {
    pub ad_sender: Option<String>,
    pub ad_receiver: Option<String>,
    pub comment: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProposalFormQuery {
    pub ad_receiver_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProposalFormContext {
    pub user_ads: Vec<Ad>,
    pub ad_receiver: Option<Ad>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProposalListQuery {
    pub status: Option<String>,
    pub sender: Option<String>,
    pub receiver: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProposalListResponse {
    pub proposals: Vec<Proposal>,
    /// Caller's own ads, for the "what I offer" filter.
    pub user_ads: Vec<Ad>,
    /// Other users' ads requested in the listed proposals.
    pub other_ads: Vec<Ad>,
}

/// `status` of any JSON type is accepted. Values that are not strings read
/// as empty, which no transition acts on.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatusUpdateRequest {
    #[serde(deserialize_with = "text_or_empty")]
    pub status: String,
}

fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Loose::deserialize(deserializer)? {
        Loose::Text(text) => text,
        Loose::Other(_) => String::new(),
    })
}

/// A proposal together with the notification shown to the user.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProposalResponse {
    pub message: String,
    pub proposal: Proposal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
