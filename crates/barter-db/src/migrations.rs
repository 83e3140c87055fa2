use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, ads, proposals)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE ads (
                id          TEXT PRIMARY KEY,
                owner_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title       TEXT NOT NULL,
                description TEXT NOT NULL,
                image_url   TEXT,
                category    TEXT NOT NULL,
                condition   TEXT NOT NULL CHECK (condition IN ('new', 'used')),
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_ads_created ON ads(created_at);
            CREATE INDEX idx_ads_owner ON ads(owner_id);

            CREATE TABLE proposals (
                id              TEXT PRIMARY KEY,
                ad_sender_id    TEXT NOT NULL REFERENCES ads(id) ON DELETE CASCADE,
                ad_receiver_id  TEXT NOT NULL REFERENCES ads(id) ON DELETE CASCADE,
                comment         TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT 'pending'
                                CHECK (status IN ('pending', 'accepted', 'rejected')),
                created_at      TEXT NOT NULL,
                CHECK (ad_sender_id <> ad_receiver_id)
            );

            CREATE INDEX idx_proposals_sender ON proposals(ad_sender_id);
            CREATE INDEX idx_proposals_receiver ON proposals(ad_receiver_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
