use super::ids::MessageId;

/// Stored author id of every AI turn.
pub const AI_AUTHOR_ID: &str = "ai";
/// Size of the live window the chat view subscribes to.
pub const DEFAULT_MESSAGE_LIMIT: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuthorId {
    User(String),
    Ai,
}

impl AuthorId {
    pub fn user(uid: impl Into<String>) -> Self {
        Self::User(uid.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::User(uid) => uid,
            Self::Ai => AI_AUTHOR_ID,
        }
    }

    pub fn from_stored(raw: String) -> Self {
        if raw == AI_AUTHOR_ID {
            Self::Ai
        } else {
            Self::User(raw)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: MessageId,
    pub text: String,
    pub author: AuthorId,
    pub is_ai: bool,
    pub created_at_unix_millis: u64,
}

/// Append payload; the store stamps `created_at` on first insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub id: MessageId,
    pub text: String,
    pub author: AuthorId,
    pub is_ai: bool,
}

impl NewMessage {
    pub fn human(id: MessageId, uid: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            author: AuthorId::user(uid),
            is_ai: false,
        }
    }

    pub fn ai(id: MessageId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            author: AuthorId::Ai,
            is_ai: true,
        }
    }
}

/// "Latest N messages, newest first" live query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestMessagesQuery {
    pub limit: u32,
}

impl LatestMessagesQuery {
    pub fn new(limit: u32) -> Self {
        Self {
            limit: limit.max(1),
        }
    }
}

impl Default for LatestMessagesQuery {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGE_LIMIT)
    }
}
