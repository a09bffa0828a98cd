//! SQLite backend.
//!
//! Uses a single SQLite database file with three tables:
//! - `turns`: append-only conversation log
//! - `files`: stored documents with their bytes
//! - `offers`: quote requests being assembled

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use offerdesk_core::error::StoreError;
use offerdesk_core::message::{FileId, NewTurn, Role, Turn, UserId};
use offerdesk_core::offer::{Offer, OfferField, OfferFields, OfferId, OfferStatus};
use offerdesk_core::store::{ensure_owner, ConversationStore, FileMeta, FileStore, OfferStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

const OFFER_COLUMNS: &str =
    "id, user_id, product, brand, budget, quantity, notes, status, pending_field, created_at, updated_at";

/// A SQLite store for turns, files and offers.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store from a file path.
    ///
    /// The database and all tables/indexes are created automatically.
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Run schema migrations.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS turns (
                iid          INTEGER PRIMARY KEY AUTOINCREMENT,
                id           TEXT UNIQUE NOT NULL,
                user_id      TEXT NOT NULL,
                role         TEXT NOT NULL,
                content      TEXT,
                attachment   TEXT,
                by_operator  INTEGER NOT NULL DEFAULT 0,
                off_policy   INTEGER NOT NULL DEFAULT 0,
                created_at   TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("turns table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_turns_user ON turns(user_id, iid DESC)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("turns index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                id           TEXT PRIMARY KEY,
                filename     TEXT NOT NULL,
                mime_type    TEXT NOT NULL,
                size         INTEGER NOT NULL,
                owner        TEXT,
                content      BLOB NOT NULL,
                created_at   TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("files table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS offers (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id       TEXT NOT NULL,
                product       TEXT,
                brand         TEXT,
                budget        REAL,
                quantity      INTEGER,
                notes         TEXT,
                status        TEXT NOT NULL,
                pending_field TEXT,
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("offers table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Store a file with its content. Replaces a file with the same id.
    pub async fn put_file(&self, meta: &FileMeta, bytes: &[u8]) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO files (id, filename, mime_type, size, owner, content, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                filename = excluded.filename,
                mime_type = excluded.mime_type,
                size = excluded.size,
                owner = excluded.owner,
                content = excluded.content
            "#,
        )
        .bind(meta.id.as_str())
        .bind(&meta.filename)
        .bind(&meta.mime_type)
        .bind(meta.size as i64)
        .bind(meta.owner.as_ref().map(|u| u.as_str()))
        .bind(bytes)
        .bind(meta.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("insert file: {e}")))?;
        Ok(())
    }

    fn parse_time(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
    where
        T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
    {
        row.try_get(name)
            .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
    }

    /// Parse a `Turn` from a SQLite row.
    fn row_to_turn(row: &SqliteRow) -> Result<Turn, StoreError> {
        let role: String = Self::column(row, "role")?;
        let created_at: String = Self::column(row, "created_at")?;
        let attachment: Option<String> = Self::column(row, "attachment")?;
        let user_id: String = Self::column(row, "user_id")?;

        Ok(Turn {
            id: Self::column(row, "id")?,
            user_id: UserId(user_id),
            role: Role::parse(&role)
                .ok_or_else(|| StoreError::InvalidValue(format!("turn role '{role}'")))?,
            content: Self::column(row, "content")?,
            attachment: attachment.map(FileId),
            by_operator: Self::column::<i64>(row, "by_operator")? != 0,
            off_policy: Self::column::<i64>(row, "off_policy")? != 0,
            created_at: Self::parse_time(&created_at),
        })
    }

    /// Parse an `Offer` from a SQLite row.
    fn row_to_offer(row: &SqliteRow) -> Result<Offer, StoreError> {
        let status: String = Self::column(row, "status")?;
        let pending: Option<String> = Self::column(row, "pending_field")?;
        let quantity: Option<i64> = Self::column(row, "quantity")?;
        let created_at: String = Self::column(row, "created_at")?;
        let updated_at: String = Self::column(row, "updated_at")?;
        let user_id: String = Self::column(row, "user_id")?;

        Ok(Offer {
            id: Self::column(row, "id")?,
            user_id: UserId(user_id),
            fields: OfferFields {
                product: Self::column(row, "product")?,
                brand: Self::column(row, "brand")?,
                budget: Self::column(row, "budget")?,
                quantity: quantity.map(|q| q.clamp(0, u32::MAX as i64) as u32),
                notes: Self::column(row, "notes")?,
            },
            status: OfferStatus::parse(&status)
                .ok_or_else(|| StoreError::InvalidValue(format!("offer status '{status}'")))?,
            pending_field: pending.as_deref().and_then(OfferField::parse),
            created_at: Self::parse_time(&created_at),
            updated_at: Self::parse_time(&updated_at),
        })
    }

    async fn fetch_offer(&self, id: OfferId) -> Result<Offer, StoreError> {
        let row = sqlx::query(&format!("SELECT {OFFER_COLUMNS} FROM offers WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("select offer: {e}")))?
            .ok_or_else(|| StoreError::NotFound {
                kind: "offer",
                id: id.to_string(),
            })?;
        Self::row_to_offer(&row)
    }

    async fn write_offer(&self, offer: &Offer) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE offers SET
                product = ?, brand = ?, budget = ?, quantity = ?, notes = ?,
                status = ?, pending_field = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&offer.fields.product)
        .bind(&offer.fields.brand)
        .bind(offer.fields.budget)
        .bind(offer.fields.quantity.map(i64::from))
        .bind(&offer.fields.notes)
        .bind(offer.status.as_str())
        .bind(offer.pending_field.map(|f| f.as_str()))
        .bind(offer.updated_at.to_rfc3339())
        .bind(offer.id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("update offer: {e}")))?;
        Ok(())
    }

    /// Load, check ownership, mutate and write back an offer.
    async fn modify_offer<F>(&self, user_id: &UserId, id: OfferId, f: F) -> Result<Offer, StoreError>
    where
        F: FnOnce(&mut Offer) + Send,
    {
        let mut offer = self.fetch_offer(id).await?;
        ensure_owner(&offer, user_id)?;
        f(&mut offer);
        self.write_offer(&offer).await?;
        Ok(offer)
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn load_recent_turns(&self, user_id: &UserId, limit: usize) -> Result<Vec<Turn>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, role, content, attachment, by_operator, off_policy, created_at
            FROM turns
            WHERE user_id = ?
            ORDER BY iid DESC
            LIMIT ?
            "#,
        )
        .bind(user_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("select turns: {e}")))?;

        let mut turns = rows.iter().map(Self::row_to_turn).collect::<Result<Vec<_>, _>>()?;
        turns.reverse();
        Ok(turns)
    }

    async fn append_turn(&self, turn: NewTurn) -> Result<Turn, StoreError> {
        let turn = turn.into_turn();
        sqlx::query(
            r#"
            INSERT INTO turns (id, user_id, role, content, attachment, by_operator, off_policy, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&turn.id)
        .bind(turn.user_id.as_str())
        .bind(turn.role.as_str())
        .bind(&turn.content)
        .bind(turn.attachment.as_ref().map(|f| f.as_str()))
        .bind(turn.by_operator as i64)
        .bind(turn.off_policy as i64)
        .bind(turn.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("insert turn: {e}")))?;

        debug!(user_id = %turn.user_id, role = turn.role.as_str(), "Stored turn");
        Ok(turn)
    }
}

#[async_trait]
impl FileStore for SqliteStore {
    async fn resolve_file(&self, id: &FileId) -> Result<FileMeta, StoreError> {
        let row = sqlx::query("SELECT id, filename, mime_type, size, owner, created_at FROM files WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("select file: {e}")))?
            .ok_or_else(|| StoreError::NotFound {
                kind: "file",
                id: id.to_string(),
            })?;

        let owner: Option<String> = Self::column(&row, "owner")?;
        let size: i64 = Self::column(&row, "size")?;
        let created_at: String = Self::column(&row, "created_at")?;
        Ok(FileMeta {
            id: FileId(Self::column(&row, "id")?),
            filename: Self::column(&row, "filename")?,
            mime_type: Self::column(&row, "mime_type")?,
            size: size.max(0) as u64,
            owner: owner.map(UserId),
            created_at: Self::parse_time(&created_at),
        })
    }

    async fn read_file(&self, id: &FileId) -> Result<Vec<u8>, StoreError> {
        let row = sqlx::query("SELECT content FROM files WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("select file content: {e}")))?
            .ok_or_else(|| StoreError::NotFound {
                kind: "file",
                id: id.to_string(),
            })?;
        Self::column(&row, "content")
    }
}

#[async_trait]
impl OfferStore for SqliteStore {
    async fn create_offer(&self, user_id: &UserId, fields: OfferFields) -> Result<Offer, StoreError> {
        let mut offer = Offer::new(0, user_id.clone(), fields);
        let result = sqlx::query(
            r#"
            INSERT INTO offers (user_id, product, brand, budget, quantity, notes, status, pending_field, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, NULL, ?, ?)
            "#,
        )
        .bind(user_id.as_str())
        .bind(&offer.fields.product)
        .bind(&offer.fields.brand)
        .bind(offer.fields.budget)
        .bind(offer.fields.quantity.map(i64::from))
        .bind(&offer.fields.notes)
        .bind(offer.status.as_str())
        .bind(offer.created_at.to_rfc3339())
        .bind(offer.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("insert offer: {e}")))?;

        offer.id = result.last_insert_rowid();
        debug!(offer_id = offer.id, user_id = %user_id, "Created offer");
        Ok(offer)
    }

    async fn update_offer(&self, user_id: &UserId, id: OfferId, patch: OfferFields) -> Result<Offer, StoreError> {
        self.modify_offer(user_id, id, |offer| offer.apply(patch)).await
    }

    async fn get_offer(&self, user_id: &UserId, id: OfferId) -> Result<Offer, StoreError> {
        let offer = self.fetch_offer(id).await?;
        ensure_owner(&offer, user_id)?;
        Ok(offer)
    }

    async fn list_offers(&self, user_id: &UserId) -> Result<Vec<Offer>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {OFFER_COLUMNS} FROM offers WHERE user_id = ? ORDER BY id"))
            .bind(user_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("select offers: {e}")))?;
        rows.iter().map(Self::row_to_offer).collect()
    }

    async fn record_question(&self, user_id: &UserId, id: OfferId, field: OfferField) -> Result<Offer, StoreError> {
        self.modify_offer(user_id, id, |offer| {
            offer.pending_field = Some(field);
            offer.updated_at = Utc::now();
        })
        .await
    }
}
