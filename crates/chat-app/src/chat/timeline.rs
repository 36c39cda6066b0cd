use parley_storage::MessageRecord;

/// Which side of the transcript a message sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubbleSide {
    Left,
    Right,
}

impl BubbleSide {
    pub fn for_message(message: &MessageRecord) -> Self {
        if message.is_ai { Self::Left } else { Self::Right }
    }
}

/// Turns a newest-first store snapshot into a transcript read top to bottom.
///
/// The store breaks `created_at` ties by insertion order, so reversing keeps
/// equal timestamps in the order they were written.
pub fn chronological(mut snapshot: Vec<MessageRecord>) -> Vec<MessageRecord> {
    snapshot.reverse();
    // Stable sort: only repairs snapshots that did not arrive newest-first.
    snapshot.sort_by_key(|message| message.created_at_unix_millis);
    snapshot
}

#[cfg(test)]
mod tests {
    use parley_storage::{AuthorId, MessageId};

    use super::*;

    fn record(text: &str, created_at_unix_millis: u64, is_ai: bool) -> MessageRecord {
        MessageRecord {
            id: MessageId::new_v7(),
            text: text.to_string(),
            author: if is_ai {
                AuthorId::Ai
            } else {
                AuthorId::user("u1")
            },
            is_ai,
            created_at_unix_millis,
        }
    }

    fn texts(messages: &[MessageRecord]) -> Vec<&str> {
        messages.iter().map(|message| message.text.as_str()).collect()
    }

    #[test]
    fn newest_first_snapshot_renders_newest_last() {
        let snapshot = vec![
            record("hi there", 20, true),
            record("hello", 10, false),
            record("first", 5, false),
        ];
        assert_eq!(
            texts(&chronological(snapshot)),
            vec!["first", "hello", "hi there"]
        );
    }

    #[test]
    fn equal_timestamps_keep_write_order() {
        let snapshot = vec![record("second", 10, true), record("first", 10, false)];
        assert_eq!(texts(&chronological(snapshot)), vec!["first", "second"]);
    }

    #[test]
    fn ai_messages_sit_left_and_human_messages_right() {
        assert_eq!(BubbleSide::for_message(&record("a", 1, true)), BubbleSide::Left);
        assert_eq!(BubbleSide::for_message(&record("h", 1, false)), BubbleSide::Right);
    }
}
