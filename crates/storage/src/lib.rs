use std::future::Future;
use std::pin::Pin;

pub mod error;
pub mod ids;
pub mod sqlite;
pub mod types;

pub use error::{StorageError, StorageResult};
pub use ids::MessageId;
pub use sqlite::{SqliteMessageFeed, SqliteStorage};
pub use types::{
    AI_AUTHOR_ID, AuthorId, DEFAULT_MESSAGE_LIMIT, LatestMessagesQuery, MessageRecord, NewMessage,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait MessageStore: Send + Sync {
    /// Appends one message. Appending an id that already exists with the same
    /// payload returns the stored record without writing again.
    fn append<'a>(&'a self, input: NewMessage) -> BoxFuture<'a, StorageResult<MessageRecord>>;

    /// Opens a live feed over the latest `query.limit` messages, newest first.
    fn subscribe_latest(&self, query: LatestMessagesQuery) -> Box<dyn MessageFeed>;
}

pub trait MessageFeed: Send {
    /// Yields the current snapshot on the first call and a fresh snapshot after
    /// every later change. `None` means the store went away.
    fn next(&mut self) -> BoxFuture<'_, Option<StorageResult<Vec<MessageRecord>>>>;
}
