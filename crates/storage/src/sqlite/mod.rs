use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

use snafu::{OptionExt, ResultExt};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use tokio::sync::watch;

use super::error::{
    ConnectSnafu, CreateDatabaseDirectorySnafu, DatabaseUrlSnafu, IdReusedSnafu,
    MessageVanishedSnafu, MigrateSnafu, NegativeTimestampSnafu, PragmaSnafu, QuerySnafu,
    StorageResult,
};
use super::ids::MessageId;
use super::types::{AuthorId, LatestMessagesQuery, MessageRecord, NewMessage};
use super::{BoxFuture, MessageFeed, MessageStore};

#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
    // Bumped after every effective insert; feeds re-query when it moves.
    revision: Arc<watch::Sender<u64>>,
}

impl SqliteStorage {
    pub async fn open(database_location: &str) -> StorageResult<Self> {
        ensure_database_directory(database_location)?;

        let database_url = normalize_database_url(database_location);
        let in_memory = database_url.contains(":memory:");
        let connect_options = SqliteConnectOptions::from_str(&database_url)
            .context(DatabaseUrlSnafu {
                stage: "sqlite-open-parse-url",
                database_url: database_url.clone(),
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(5_000));

        let mut pool_options = SqlitePoolOptions::new().max_connections(1);
        if in_memory {
            // An in-memory database lives only as long as its single connection.
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .context(ConnectSnafu {
                stage: "sqlite-open-connect",
                database_url: database_url.clone(),
            })?;

        sqlx::query("PRAGMA busy_timeout = 5000;")
            .execute(&pool)
            .await
            .context(PragmaSnafu {
                stage: "sqlite-open-pragma-busy-timeout",
                pragma: "busy_timeout",
            })?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context(MigrateSnafu {
                stage: "sqlite-open-migrate",
            })?;

        let (revision, _) = watch::channel(0_u64);
        tracing::info!(database_url = %database_url, "opened sqlite message store");

        Ok(Self {
            pool,
            revision: Arc::new(revision),
        })
    }

    async fn find_message(&self, message_id: MessageId) -> StorageResult<Option<MessageRecord>> {
        let row = sqlx::query_as::<_, MessageRow>(
            "SELECT id, text, author_id, is_ai, created_at FROM messages WHERE id = ?",
        )
        .bind(message_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context(QuerySnafu {
            stage: "message-get-query",
        })?;

        row.map(message_row_to_record).transpose()
    }

    async fn append_message(&self, input: NewMessage) -> StorageResult<MessageRecord> {
        let now = unix_timestamp_millis();
        let insert_result = sqlx::query(
            "INSERT INTO messages (id, text, author_id, is_ai, created_at) VALUES (?, ?, ?, ?, ?) ON CONFLICT(id) DO NOTHING",
        )
        .bind(input.id.to_string())
        .bind(input.text.clone())
        .bind(input.author.as_str().to_string())
        .bind(input.is_ai)
        .bind(now)
        .execute(&self.pool)
        .await
        .context(QuerySnafu {
            stage: "message-append-insert",
        })?;

        if insert_result.rows_affected() == 0 {
            return self.resolve_existing_append(input).await;
        }

        self.revision.send_modify(|revision| *revision += 1);
        tracing::debug!(
            message_id = %input.id,
            author_id = %input.author.as_str(),
            is_ai = input.is_ai,
            "appended message"
        );

        Ok(MessageRecord {
            id: input.id,
            text: input.text,
            author: input.author,
            is_ai: input.is_ai,
            created_at_unix_millis: i64_to_u64(now, "message-append-created-at")?,
        })
    }

    async fn resolve_existing_append(&self, input: NewMessage) -> StorageResult<MessageRecord> {
        let Some(existing) = self.find_message(input.id).await? else {
            return MessageVanishedSnafu {
                stage: "message-append-existing-missing",
                id: input.id.to_string(),
            }
            .fail();
        };

        let same_payload = existing.text == input.text
            && existing.author == input.author
            && existing.is_ai == input.is_ai;
        if !same_payload {
            return IdReusedSnafu {
                stage: "message-append-id-reuse",
                id: input.id.to_string(),
            }
            .fail();
        }

        tracing::info!(message_id = %input.id, "append skipped, message already stored");
        Ok(existing)
    }
}

impl MessageStore for SqliteStorage {
    fn append<'a>(&'a self, input: NewMessage) -> BoxFuture<'a, StorageResult<MessageRecord>> {
        Box::pin(self.append_message(input))
    }

    fn subscribe_latest(&self, query: LatestMessagesQuery) -> Box<dyn MessageFeed> {
        Box::new(SqliteMessageFeed {
            pool: self.pool.clone(),
            query,
            revisions: self.revision.subscribe(),
            primed: false,
        })
    }
}

/// Live "latest N" query backed by the store's revision counter.
pub struct SqliteMessageFeed {
    pool: SqlitePool,
    query: LatestMessagesQuery,
    revisions: watch::Receiver<u64>,
    primed: bool,
}

impl SqliteMessageFeed {
    async fn next_snapshot(&mut self) -> Option<StorageResult<Vec<MessageRecord>>> {
        if self.primed && self.revisions.changed().await.is_err() {
            return None;
        }

        self.primed = true;
        // Several appends may land while we were away; one query covers them all.
        self.revisions.borrow_and_update();
        Some(load_latest(&self.pool, self.query).await)
    }
}

impl MessageFeed for SqliteMessageFeed {
    fn next(&mut self) -> BoxFuture<'_, Option<StorageResult<Vec<MessageRecord>>>> {
        Box::pin(self.next_snapshot())
    }
}

async fn load_latest(
    pool: &SqlitePool,
    query: LatestMessagesQuery,
) -> StorageResult<Vec<MessageRecord>> {
    let rows = sqlx::query_as::<_, MessageRow>(
        "SELECT id, text, author_id, is_ai, created_at FROM messages ORDER BY created_at DESC, seq DESC LIMIT ?",
    )
    .bind(i64::from(query.limit))
    .fetch_all(pool)
    .await
    .context(QuerySnafu {
        stage: "message-latest-query",
    })?;

    rows.into_iter().map(message_row_to_record).collect()
}

#[derive(Debug, FromRow)]
struct MessageRow {
    id: String,
    text: String,
    author_id: String,
    is_ai: bool,
    created_at: i64,
}

fn message_row_to_record(row: MessageRow) -> StorageResult<MessageRecord> {
    Ok(MessageRecord {
        id: MessageId::parse(&row.id)?,
        text: row.text,
        author: AuthorId::from_stored(row.author_id),
        is_ai: row.is_ai,
        created_at_unix_millis: i64_to_u64(row.created_at, "message-row-created-at")?,
    })
}

fn unix_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0_i64, |duration| duration.as_millis() as i64)
}

fn i64_to_u64(value: i64, stage: &'static str) -> StorageResult<u64> {
    u64::try_from(value).ok().context(NegativeTimestampSnafu { stage, value })
}

fn ensure_database_directory(database_location: &str) -> StorageResult<()> {
    if database_location.starts_with("sqlite:") || database_location == ":memory:" {
        return Ok(());
    }

    let path = Path::new(database_location);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context(CreateDatabaseDirectorySnafu {
            stage: "sqlite-open-create-directory",
            path: parent.display().to_string(),
        })?;
    }

    Ok(())
}

fn normalize_database_url(database_location: &str) -> String {
    if database_location.starts_with("sqlite:") {
        return database_location.to_string();
    }

    if database_location == ":memory:" {
        return "sqlite::memory:".to_string();
    }

    format!("sqlite://{database_location}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::types::AI_AUTHOR_ID;

    async fn stored_count(store: &SqliteStorage) -> usize {
        load_latest(&store.pool, LatestMessagesQuery::new(1_000))
            .await
            .expect("count query")
            .len()
    }

    async fn memory_store() -> SqliteStorage {
        SqliteStorage::open(":memory:")
            .await
            .expect("in-memory store should open")
    }

    #[tokio::test]
    async fn append_stamps_and_returns_record() {
        let store = memory_store().await;
        let id = MessageId::new_v7();

        let record = store
            .append(NewMessage::human(id, "u1", "hello"))
            .await
            .expect("append should succeed");

        assert_eq!(record.id, id);
        assert_eq!(record.author, AuthorId::user("u1"));
        assert!(!record.is_ai);
        assert!(record.created_at_unix_millis > 0);
        assert_eq!(stored_count(&store).await, 1);
    }

    #[tokio::test]
    async fn reappending_same_id_does_not_duplicate() {
        let store = memory_store().await;
        let id = MessageId::new_v7();

        let first = store
            .append(NewMessage::human(id, "u1", "hello"))
            .await
            .expect("first append");
        let second = store
            .append(NewMessage::human(id, "u1", "hello"))
            .await
            .expect("second append");

        assert_eq!(first, second);
        assert_eq!(stored_count(&store).await, 1);
    }

    #[tokio::test]
    async fn reusing_id_for_other_payload_is_a_conflict() {
        let store = memory_store().await;
        let id = MessageId::new_v7();

        store
            .append(NewMessage::human(id, "u1", "hello"))
            .await
            .expect("first append");
        let result = store.append(NewMessage::human(id, "u1", "bye")).await;

        assert!(matches!(result, Err(StorageError::IdReused { .. })));
    }

    #[tokio::test]
    async fn ai_author_round_trips_through_sqlite() {
        let store = memory_store().await;
        let id = MessageId::new_v7();
        store
            .append(NewMessage::ai(id, "hi there"))
            .await
            .expect("append ai");

        let stored = store
            .find_message(id)
            .await
            .expect("query")
            .expect("message present");
        assert_eq!(stored.author, AuthorId::Ai);
        assert_eq!(stored.author.as_str(), AI_AUTHOR_ID);
        assert!(stored.is_ai);
    }

    #[tokio::test]
    async fn feed_returns_latest_window_newest_first() {
        let store = memory_store().await;
        for index in 0..5 {
            store
                .append(NewMessage::human(
                    MessageId::new_v7(),
                    "u1",
                    format!("message-{index}"),
                ))
                .await
                .expect("append");
        }

        let mut feed = store.subscribe_latest(LatestMessagesQuery::new(3));
        let snapshot = feed
            .next()
            .await
            .expect("feed open")
            .expect("snapshot query");

        let texts = snapshot
            .iter()
            .map(|message| message.text.as_str())
            .collect::<Vec<_>>();
        assert_eq!(texts, vec!["message-4", "message-3", "message-2"]);
    }

    #[tokio::test]
    async fn feed_emits_after_each_append() {
        let store = memory_store().await;
        let mut feed = store.subscribe_latest(LatestMessagesQuery::default());

        let initial = feed.next().await.expect("feed open").expect("snapshot");
        assert!(initial.is_empty());

        store
            .append(NewMessage::human(MessageId::new_v7(), "u1", "hello"))
            .await
            .expect("append");

        let updated = feed.next().await.expect("feed open").expect("snapshot");
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].text, "hello");
    }

    #[tokio::test]
    async fn file_backed_store_creates_parent_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("messages.db");
        let location = path.display().to_string();

        let store = SqliteStorage::open(&location).await.expect("open file store");
        store
            .append(NewMessage::human(MessageId::new_v7(), "u1", "persisted"))
            .await
            .expect("append");

        assert!(path.exists());
    }

    #[test]
    fn database_urls_are_normalized() {
        assert_eq!(normalize_database_url(":memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_database_url("sqlite://already.db"),
            "sqlite://already.db"
        );
        assert_eq!(normalize_database_url("data/chat.db"), "sqlite://data/chat.db");
    }

    #[test]
    fn negative_timestamp_is_reported_not_wrapped() {
        let error = i64_to_u64(-5, "message-row-created-at").expect_err("negative");
        assert!(matches!(
            error,
            StorageError::NegativeTimestamp { value: -5, .. }
        ));
        assert_eq!(error.to_string(), "stored timestamp -5 is negative");
    }
}
