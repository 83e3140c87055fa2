use crate::Database;
use crate::models::{AdRow, ProposalRow, UserRow, format_timestamp};
use anyhow::Result;
use barter_types::models::ProposalStatus;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params_from_iter};

const AD_SELECT: &str = "SELECT a.id, a.owner_id, u.username, a.title, a.description, a.image_url,
        a.category, a.condition, a.created_at
     FROM ads a
     JOIN users u ON u.id = a.owner_id";

const PROPOSAL_SELECT: &str = "SELECT p.id, p.comment, p.status, p.created_at,
        s.id, s.owner_id, su.username, s.title, s.description, s.image_url,
        s.category, s.condition, s.created_at,
        r.id, r.owner_id, ru.username, r.title, r.description, r.image_url,
        r.category, r.condition, r.created_at
     FROM proposals p
     JOIN ads s ON s.id = p.ad_sender_id
     JOIN users su ON su.id = s.owner_id
     JOIN ads r ON r.id = p.ad_receiver_id
     JOIN users ru ON ru.id = r.owner_id";

/// Editable ad columns, already cleaned by the form layer.
#[derive(Debug, Clone, Copy)]
pub struct AdFields<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub image_url: Option<&'a str>,
    pub category: &'a str,
    pub condition: &'a str,
}

/// Conjunctive ad listing filters. Empty strings count as absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdFilter<'a> {
    /// Case-insensitive substring of title or description.
    pub query: Option<&'a str>,
    /// Case-insensitive substring of category.
    pub category: Option<&'a str>,
    /// Exact condition value.
    pub condition: Option<&'a str>,
}

impl AdFilter<'_> {
    fn where_clause(&self) -> (String, Vec<String>) {
        let mut clauses = Vec::new();
        let mut params = Vec::new();

        if let Some(q) = non_empty(self.query) {
            let needle = q.to_lowercase();
            clauses.push("(instr(casefold(a.title), ?) > 0 OR instr(casefold(a.description), ?) > 0)");
            params.push(needle.clone());
            params.push(needle);
        }
        if let Some(category) = non_empty(self.category) {
            clauses.push("instr(casefold(a.category), ?) > 0");
            params.push(category.to_lowercase());
        }
        if let Some(condition) = non_empty(self.condition) {
            clauses.push("a.condition = ?");
            params.push(condition.to_string());
        }

        (join_where(&clauses), params)
    }
}

/// Conjunctive proposal listing filters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProposalFilter<'a> {
    pub status: Option<ProposalStatus>,
    pub sender: Option<&'a str>,
    pub receiver: Option<&'a str>,
}

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        password_hash: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password, created_at) VALUES (?1, ?2, ?3, ?4)",
                (id, username, password_hash, format_timestamp(created_at)),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    // -- Ads --

    pub fn insert_ad(
        &self,
        id: &str,
        owner_id: &str,
        fields: AdFields<'_>,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO ads (id, owner_id, title, description, image_url, category, condition, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    id,
                    owner_id,
                    fields.title,
                    fields.description,
                    fields.image_url,
                    fields.category,
                    fields.condition,
                    format_timestamp(created_at),
                ],
            )?;
            Ok(())
        })
    }

    /// Overwrite the editable columns. Owner and creation time never change.
    /// Returns false if the ad does not exist.
    pub fn update_ad(&self, id: &str, fields: AdFields<'_>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE ads SET title = ?2, description = ?3, image_url = ?4, category = ?5, condition = ?6
                 WHERE id = ?1",
                rusqlite::params![
                    id,
                    fields.title,
                    fields.description,
                    fields.image_url,
                    fields.category,
                    fields.condition,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    /// Hard delete. Proposals referencing the ad go with it.
    pub fn delete_ad(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM ads WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    pub fn get_ad(&self, id: &str) -> Result<Option<AdRow>> {
        self.with_conn(|conn| {
            let sql = format!("{AD_SELECT} WHERE a.id = ?1");
            conn.query_row(&sql, [id], |row| ad_from_row(row, 0)).optional()
        })
    }

    /// One page of ads, newest first.
    pub fn list_ads(&self, filter: &AdFilter<'_>, limit: u32, offset: u64) -> Result<Vec<AdRow>> {
        let (where_sql, params) = filter.where_clause();
        self.with_conn(|conn| {
            let sql = format!(
                "{AD_SELECT}{where_sql} ORDER BY a.created_at DESC, a.rowid DESC LIMIT {limit} OFFSET {offset}"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), |row| ad_from_row(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_ads(&self, filter: &AdFilter<'_>) -> Result<u64> {
        let (where_sql, params) = filter.where_clause();
        self.with_conn(|conn| {
            let sql = format!("SELECT COUNT(*) FROM ads a{where_sql}");
            let count: i64 =
                conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
    }

    pub fn ads_by_owner(&self, owner_id: &str) -> Result<Vec<AdRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{AD_SELECT} WHERE a.owner_id = ?1 ORDER BY a.created_at DESC, a.rowid DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([owner_id], |row| ad_from_row(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Proposals --

    pub fn insert_proposal(
        &self,
        id: &str,
        ad_sender_id: &str,
        ad_receiver_id: &str,
        comment: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO proposals (id, ad_sender_id, ad_receiver_id, comment, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
                rusqlite::params![
                    id,
                    ad_sender_id,
                    ad_receiver_id,
                    comment,
                    format_timestamp(created_at)
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_proposal(&self, id: &str) -> Result<Option<ProposalRow>> {
        self.with_conn(|conn| {
            let sql = format!("{PROPOSAL_SELECT} WHERE p.id = ?1");
            conn.query_row(&sql, [id], proposal_from_row).optional()
        })
    }

    /// Proposals in which `user_id` owns the sender ad or the receiver ad.
    pub fn list_proposals_for_user(
        &self,
        user_id: &str,
        filter: &ProposalFilter<'_>,
    ) -> Result<Vec<ProposalRow>> {
        let mut clauses = vec!["(s.owner_id = ? OR r.owner_id = ?)"];
        let mut params = vec![user_id.to_string(), user_id.to_string()];

        if let Some(status) = filter.status {
            clauses.push("p.status = ?");
            params.push(status.as_str().to_string());
        }
        if let Some(sender) = non_empty(filter.sender) {
            clauses.push("p.ad_sender_id = ?");
            params.push(sender.to_string());
        }
        if let Some(receiver) = non_empty(filter.receiver) {
            clauses.push("p.ad_receiver_id = ?");
            params.push(receiver.to_string());
        }

        self.with_conn(|conn| {
            let sql = format!(
                "{PROPOSAL_SELECT}{} ORDER BY p.created_at DESC, p.rowid DESC",
                join_where(&clauses)
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), proposal_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Move a pending proposal to `status`. Returns false when the proposal
    /// is missing or no longer pending; the check and the write are one statement.
    pub fn update_proposal_status(&self, id: &str, status: ProposalStatus) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE proposals SET status = ?2 WHERE id = ?1 AND status = 'pending'",
                (id, status.as_str()),
            )?;
            Ok(changed > 0)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT id, username, password, created_at FROM users WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn ad_from_row(row: &Row<'_>, start: usize) -> rusqlite::Result<AdRow> {
    Ok(AdRow {
        id: row.get(start)?,
        owner_id: row.get(start + 1)?,
        owner_username: row.get(start + 2)?,
        title: row.get(start + 3)?,
        description: row.get(start + 4)?,
        image_url: row.get(start + 5)?,
        category: row.get(start + 6)?,
        condition: row.get(start + 7)?,
        created_at: row.get(start + 8)?,
    })
}

fn proposal_from_row(row: &Row<'_>) -> rusqlite::Result<ProposalRow> {
    Ok(ProposalRow {
        id: row.get(0)?,
        comment: row.get(1)?,
        status: row.get(2)?,
        created_at: row.get(3)?,
        sender: ad_from_row(row, 4)?,
        receiver: ad_from_row(row, 13)?,
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn join_where(clauses: &[&str]) -> String {
    if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    }
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn user(db: &Database, name: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_user(&id, name, "hash", Utc::now()).unwrap();
        id
    }

    fn ad(db: &Database, owner: &str, title: &str, category: &str, condition: &str) -> String {
        ad_at(db, owner, title, category, condition, Utc::now())
    }

    fn ad_at(
        db: &Database,
        owner: &str,
        title: &str,
        category: &str,
        condition: &str,
        at: DateTime<Utc>,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let fields = AdFields {
            title,
            description: "desc",
            image_url: None,
            category,
            condition,
        };
        db.insert_ad(&id, owner, fields, at).unwrap();
        id
    }

    fn titles(rows: &[AdRow]) -> Vec<&str> {
        rows.iter().map(|r| r.title.as_str()).collect()
    }

    #[test]
    fn ad_is_joined_with_owner_name() {
        let db = Database::open_in_memory().unwrap();
        let u1 = user(&db, "u1");
        let id = ad(&db, &u1, "T", "Books", "new");

        let row = db.get_ad(&id).unwrap().unwrap();
        assert_eq!(row.owner_id, u1);
        assert_eq!(row.owner_username, "u1");
        assert!(db.get_ad(&Uuid::new_v4().to_string()).unwrap().is_none());
    }

    #[test]
    fn listing_is_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let u1 = user(&db, "u1");
        let t0 = Utc::now();
        ad_at(&db, &u1, "old", "B", "new", t0);
        ad_at(&db, &u1, "new", "B", "new", t0 + Duration::seconds(5));
        ad_at(&db, &u1, "mid", "B", "new", t0 + Duration::seconds(2));

        let rows = db.list_ads(&AdFilter::default(), 10, 0).unwrap();
        assert_eq!(titles(&rows), ["new", "mid", "old"]);
    }

    #[test]
    fn search_matches_title_or_description_ignoring_case() {
        let db = Database::open_in_memory().unwrap();
        let u1 = user(&db, "u1");
        ad(&db, &u1, "Rare Vintage Book", "Books", "used");
        ad(&db, &u1, "Лампа", "Дом", "used");
        ad(&db, &u1, "Toy", "Toys", "new");

        let filter = AdFilter { query: Some("vintage"), ..Default::default() };
        assert_eq!(titles(&db.list_ads(&filter, 10, 0).unwrap()), ["Rare Vintage Book"]);

        let filter = AdFilter { query: Some("ЛАМП"), ..Default::default() };
        assert_eq!(titles(&db.list_ads(&filter, 10, 0).unwrap()), ["Лампа"]);

        let filter = AdFilter { query: Some("DESC"), ..Default::default() };
        assert_eq!(db.count_ads(&filter).unwrap(), 3);
    }

    #[test]
    fn filters_compose() {
        let db = Database::open_in_memory().unwrap();
        let u1 = user(&db, "u1");
        ad(&db, &u1, "Q", "B", "new");
        ad(&db, &u1, "Toy", "Toys", "used");
        ad(&db, &u1, "Toy car", "Toys", "new");

        let filter = AdFilter {
            category: Some("toys"),
            condition: Some("used"),
            ..Default::default()
        };
        assert_eq!(titles(&db.list_ads(&filter, 10, 0).unwrap()), ["Toy"]);
        assert_eq!(db.count_ads(&filter).unwrap(), 1);

        let filter = AdFilter { condition: Some("Used"), ..Default::default() };
        assert_eq!(db.count_ads(&filter).unwrap(), 0);
    }

    #[test]
    fn empty_filters_are_ignored() {
        let db = Database::open_in_memory().unwrap();
        let u1 = user(&db, "u1");
        ad(&db, &u1, "A", "B", "new");

        let filter = AdFilter {
            query: Some(""),
            category: Some(""),
            condition: Some(""),
        };
        assert_eq!(db.count_ads(&filter).unwrap(), 1);
    }

    #[test]
    fn limit_and_offset_page_through_results() {
        let db = Database::open_in_memory().unwrap();
        let u1 = user(&db, "u1");
        for i in 0..15 {
            ad(&db, &u1, &format!("Ad {i}"), "B", "used");
        }

        assert_eq!(db.list_ads(&AdFilter::default(), 10, 0).unwrap().len(), 10);
        assert_eq!(db.list_ads(&AdFilter::default(), 10, 10).unwrap().len(), 5);
    }

    #[test]
    fn update_keeps_owner_and_creation_time() {
        let db = Database::open_in_memory().unwrap();
        let u1 = user(&db, "u1");
        let id = ad(&db, &u1, "T", "B", "new");
        let before = db.get_ad(&id).unwrap().unwrap();

        let fields = AdFields {
            title: "Updated",
            description: "D2",
            image_url: Some("https://example.com/x.png"),
            category: "C",
            condition: "used",
        };
        assert!(db.update_ad(&id, fields).unwrap());

        let after = db.get_ad(&id).unwrap().unwrap();
        assert_eq!(after.title, "Updated");
        assert_eq!(after.image_url.as_deref(), Some("https://example.com/x.png"));
        assert_eq!(after.owner_id, before.owner_id);
        assert_eq!(after.created_at, before.created_at);

        assert!(!db.update_ad(&Uuid::new_v4().to_string(), fields).unwrap());
    }

    #[test]
    fn proposals_are_visible_to_both_parties_only() {
        let db = Database::open_in_memory().unwrap();
        let u1 = user(&db, "u1");
        let u2 = user(&db, "u2");
        let u3 = user(&db, "u3");
        let a1 = ad(&db, &u1, "A1", "B", "new");
        let a2 = ad(&db, &u2, "A2", "B", "new");
        let pid = Uuid::new_v4().to_string();
        db.insert_proposal(&pid, &a1, &a2, "hi", Utc::now()).unwrap();

        let none = ProposalFilter::default();
        assert_eq!(db.list_proposals_for_user(&u1, &none).unwrap().len(), 1);
        assert_eq!(db.list_proposals_for_user(&u2, &none).unwrap().len(), 1);
        assert!(db.list_proposals_for_user(&u3, &none).unwrap().is_empty());

        let row = db.get_proposal(&pid).unwrap().unwrap();
        assert_eq!(row.status, "pending");
        assert_eq!(row.sender.title, "A1");
        assert_eq!(row.receiver.owner_username, "u2");
    }

    #[test]
    fn proposal_filters_compose() {
        let db = Database::open_in_memory().unwrap();
        let u1 = user(&db, "u1");
        let u2 = user(&db, "u2");
        let a1 = ad(&db, &u1, "A1", "B", "new");
        let a2 = ad(&db, &u2, "A2", "B", "new");
        let a3 = ad(&db, &u2, "A3", "B", "new");
        let p1 = Uuid::new_v4().to_string();
        let p2 = Uuid::new_v4().to_string();
        db.insert_proposal(&p1, &a1, &a2, "x", Utc::now()).unwrap();
        db.insert_proposal(&p2, &a1, &a3, "y", Utc::now()).unwrap();
        db.update_proposal_status(&p2, ProposalStatus::Rejected).unwrap();

        let filter = ProposalFilter {
            status: Some(ProposalStatus::Pending),
            ..Default::default()
        };
        let rows = db.list_proposals_for_user(&u1, &filter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, p1);

        let filter = ProposalFilter {
            sender: Some(a1.as_str()),
            receiver: Some(a3.as_str()),
            ..Default::default()
        };
        let rows = db.list_proposals_for_user(&u2, &filter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, p2);
    }

    #[test]
    fn status_moves_only_from_pending() {
        let db = Database::open_in_memory().unwrap();
        let u1 = user(&db, "u1");
        let u2 = user(&db, "u2");
        let a1 = ad(&db, &u1, "A1", "B", "new");
        let a2 = ad(&db, &u2, "A2", "B", "new");
        let pid = Uuid::new_v4().to_string();
        db.insert_proposal(&pid, &a1, &a2, "hi", Utc::now()).unwrap();
        let created = db.get_proposal(&pid).unwrap().unwrap().created_at;

        assert!(db.update_proposal_status(&pid, ProposalStatus::Accepted).unwrap());
        assert!(!db.update_proposal_status(&pid, ProposalStatus::Rejected).unwrap());

        let row = db.get_proposal(&pid).unwrap().unwrap();
        assert_eq!(row.status, "accepted");
        assert_eq!(row.created_at, created);
    }

    #[test]
    fn deleting_an_ad_removes_its_proposals() {
        let db = Database::open_in_memory().unwrap();
        let u1 = user(&db, "u1");
        let u2 = user(&db, "u2");
        let a1 = ad(&db, &u1, "A1", "B", "new");
        let a2 = ad(&db, &u2, "A2", "B", "new");
        let pid = Uuid::new_v4().to_string();
        db.insert_proposal(&pid, &a1, &a2, "hi", Utc::now()).unwrap();

        assert!(db.delete_ad(&a2).unwrap());
        assert!(!db.delete_ad(&a2).unwrap());
        assert!(db.get_proposal(&pid).unwrap().is_none());
    }

    #[test]
    fn self_trade_is_rejected_by_schema() {
        let db = Database::open_in_memory().unwrap();
        let u1 = user(&db, "u1");
        let a1 = ad(&db, &u1, "A1", "B", "new");
        let pid = Uuid::new_v4().to_string();
        assert!(db.insert_proposal(&pid, &a1, &a1, "hi", Utc::now()).is_err());
    }

    #[test]
    fn usernames_are_unique() {
        let db = Database::open_in_memory().unwrap();
        user(&db, "u1");
        let again = db.create_user(&Uuid::new_v4().to_string(), "u1", "hash", Utc::now());
        assert!(again.is_err());
        assert!(db.get_user_by_username("u1").unwrap().is_some());
    }
}
