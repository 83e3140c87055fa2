//! Database row types. These map directly to SQLite rows and are converted to
//! the barter-types models at the edge.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use uuid::Uuid;

use barter_types::models::{Ad, Proposal, User};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

pub struct AdRow {
    pub id: String,
    pub owner_id: String,
    pub owner_username: String,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub category: String,
    pub condition: String,
    pub created_at: String,
}

pub struct ProposalRow {
    pub id: String,
    pub comment: String,
    pub status: String,
    pub created_at: String,
    pub sender: AdRow,
    pub receiver: AdRow,
}

/// Timestamps are stored as fixed-width RFC 3339 strings so that text order
/// equals time order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by hand with datetime('now') have no timezone.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("bad timestamp '{raw}'"))
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    raw.parse()
        .with_context(|| format!("corrupt {what} '{raw}'"))
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: parse_id(&row.id, "user id")?,
            username: row.username,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

impl TryFrom<AdRow> for Ad {
    type Error = anyhow::Error;

    fn try_from(row: AdRow) -> Result<Self> {
        let condition = row
            .condition
            .parse()
            .map_err(|_| anyhow!("corrupt condition '{}' on ad '{}'", row.condition, row.id))?;

        Ok(Ad {
            id: parse_id(&row.id, "ad id")?,
            owner_id: parse_id(&row.owner_id, "owner id")?,
            owner_username: row.owner_username,
            title: row.title,
            description: row.description,
            image_url: row.image_url,
            category: row.category,
            condition,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

impl TryFrom<ProposalRow> for Proposal {
    type Error = anyhow::Error;

    fn try_from(row: ProposalRow) -> Result<Self> {
        let status = row
            .status
            .parse()
            .map_err(|_| anyhow!("corrupt status '{}' on proposal '{}'", row.status, row.id))?;

        Ok(Proposal {
            id: parse_id(&row.id, "proposal id")?,
            ad_sender: row.sender.try_into()?,
            ad_receiver: row.receiver.try_into()?,
            comment: row.comment,
            status,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}
