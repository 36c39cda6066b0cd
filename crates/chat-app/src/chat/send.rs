use parley_llm::{CompletionError, CompletionProvider, CompletionRequest};
use parley_storage::{MessageId, MessageRecord, MessageStore, NewMessage, StorageError};
use snafu::{OptionExt, ResultExt, Snafu};
use tokio::sync::mpsc;

use crate::chat::compose::{SendPhase, SendTicket};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SendError {
    #[snafu(display("failed to store user message on `{stage}`: {source}"))]
    PersistUserMessage {
        stage: &'static str,
        source: StorageError,
    },
    #[snafu(display("completion is not configured"))]
    CompletionUnavailable { stage: &'static str },
    #[snafu(display("completion failed on `{stage}`: {source}"))]
    RequestCompletion {
        stage: &'static str,
        source: CompletionError,
    },
    #[snafu(display("failed to store AI message on `{stage}`: {source}"))]
    PersistAiMessage {
        stage: &'static str,
        source: StorageError,
    },
    #[snafu(display("send task stopped before finishing"))]
    Interrupted { stage: &'static str },
}

impl SendError {
    /// Whether the human turn reached the store before the failure.
    pub fn user_message_stored(&self) -> bool {
        !matches!(
            self,
            Self::PersistUserMessage { .. } | Self::Interrupted { .. }
        )
    }
}

pub type SendResult<T> = Result<T, SendError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub user_message: MessageRecord,
    /// `None` when the endpoint answered without text.
    pub ai_message: Option<MessageRecord>,
}

/// Runs one turn: store the human text, ask for a completion, store the answer.
///
/// Every phase change is reported on `progress` before the step runs; the
/// receiver may be gone without affecting the turn.
pub async fn send_turn(
    store: &dyn MessageStore,
    completion: Option<&dyn CompletionProvider>,
    ticket: SendTicket,
    progress: &mpsc::UnboundedSender<SendPhase>,
) -> SendResult<SendOutcome> {
    let SendTicket {
        message_id,
        uid,
        text,
        model_id,
    } = ticket;

    let user_message = store
        .append(NewMessage::human(message_id, uid, text.clone()))
        .await
        .context(PersistUserMessageSnafu {
            stage: "send-persist-user-message",
        })?;
    tracing::debug!(message_id = %user_message.id, "user message stored");

    let _ = progress.send(SendPhase::RequestingCompletion);
    let completion = completion.context(CompletionUnavailableSnafu {
        stage: "send-request-completion",
    })?;
    let reply = completion
        .complete(CompletionRequest::new(model_id, text))
        .await
        .context(RequestCompletionSnafu {
            stage: "send-request-completion",
        })?;

    let Some(reply) = reply.filter(|reply| !reply.is_empty()) else {
        tracing::info!(message_id = %user_message.id, "completion returned no text, skipping AI message");
        let _ = progress.send(SendPhase::Idle);
        return Ok(SendOutcome {
            user_message,
            ai_message: None,
        });
    };

    let _ = progress.send(SendPhase::SendingAiMessage);
    let ai_message = store
        .append(NewMessage::ai(MessageId::new_v7(), reply))
        .await
        .context(PersistAiMessageSnafu {
            stage: "send-persist-ai-message",
        })?;
    let _ = progress.send(SendPhase::Idle);

    Ok(SendOutcome {
        user_message,
        ai_message: Some(ai_message),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use parley_llm::{BoxFuture, CompletionResult};
    use parley_storage::{AuthorId, LatestMessagesQuery, MessageFeed, StorageResult};

    use super::*;
    use crate::chat::compose::{ComposeState, SendSettled};
    use crate::notice::Notice;

    #[derive(Default)]
    struct RecordingStore {
        appended: Mutex<Vec<NewMessage>>,
        fail: bool,
    }

    impl RecordingStore {
        fn failing() -> Self {
            Self {
                appended: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn appended(&self) -> Vec<NewMessage> {
            self.appended.lock().expect("lock").clone()
        }
    }

    struct NoFeed;

    impl MessageFeed for NoFeed {
        fn next(&mut self) -> parley_storage::BoxFuture<'_, Option<StorageResult<Vec<MessageRecord>>>> {
            Box::pin(async { None })
        }
    }

    impl MessageStore for RecordingStore {
        fn append<'a>(
            &'a self,
            input: NewMessage,
        ) -> parley_storage::BoxFuture<'a, StorageResult<MessageRecord>> {
            Box::pin(async move {
                if self.fail {
                    return Err(StorageError::InvariantViolation {
                        stage: "test-append",
                        details: "store offline".to_string(),
                    });
                }

                let mut appended = self.appended.lock().expect("lock");
                let created_at_unix_millis = appended.len() as u64 + 1;
                appended.push(input.clone());
                Ok(MessageRecord {
                    id: input.id,
                    text: input.text,
                    author: input.author,
                    is_ai: input.is_ai,
                    created_at_unix_millis,
                })
            })
        }

        fn subscribe_latest(&self, _query: LatestMessagesQuery) -> Box<dyn MessageFeed> {
            Box::new(NoFeed)
        }
    }

    enum Reply {
        Text(&'static str),
        Empty,
        Fail,
    }

    struct ScriptedCompletion {
        store: Arc<RecordingStore>,
        reply: Reply,
        calls: Mutex<Vec<CompletionRequest>>,
        stored_before_call: Mutex<Vec<usize>>,
    }

    impl ScriptedCompletion {
        fn new(store: Arc<RecordingStore>, reply: Reply) -> Self {
            Self {
                store,
                reply,
                calls: Mutex::new(Vec::new()),
                stored_before_call: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<CompletionRequest> {
            self.calls.lock().expect("lock").clone()
        }
    }

    impl CompletionProvider for ScriptedCompletion {
        fn id(&self) -> &str {
            "scripted"
        }

        fn name(&self) -> &str {
            "Scripted"
        }

        fn default_model(&self) -> &str {
            "gpt-3.5-turbo"
        }

        fn complete<'a>(
            &'a self,
            request: CompletionRequest,
        ) -> BoxFuture<'a, CompletionResult<Option<String>>> {
            Box::pin(async move {
                self.stored_before_call
                    .lock()
                    .expect("lock")
                    .push(self.store.appended().len());
                let model_id = request.model_id.clone();
                self.calls.lock().expect("lock").push(request);

                match self.reply {
                    Reply::Text(text) => Ok(Some(text.to_string())),
                    Reply::Empty => Ok(None),
                    Reply::Fail => Err(CompletionError::TimedOut {
                        stage: "test-complete",
                        model_id,
                        timeout_secs: 60,
                    }),
                }
            })
        }
    }

    struct Harness {
        store: Arc<RecordingStore>,
        completion: ScriptedCompletion,
        compose: ComposeState,
        settled: Option<SendSettled>,
    }

    impl Harness {
        fn new(reply: Reply, input: &str) -> Self {
            Self::with_store(Arc::new(RecordingStore::default()), reply, input)
        }

        fn with_store(store: Arc<RecordingStore>, reply: Reply, input: &str) -> Self {
            let completion = ScriptedCompletion::new(store.clone(), reply);
            let mut compose = ComposeState::new();
            compose.set_input(input);
            Self {
                store,
                completion,
                compose,
                settled: None,
            }
        }

        /// Mirrors the chat view: begin, run the job, apply the outcome.
        async fn submit(&mut self, uid: Option<&str>) -> Option<SendResult<SendOutcome>> {
            let ticket = self.compose.begin_send(uid, "gpt-3.5-turbo")?;
            let (progress, mut phases) = mpsc::unbounded_channel();
            let result = send_turn(
                self.store.as_ref(),
                Some(&self.completion as &dyn CompletionProvider),
                ticket,
                &progress,
            )
            .await;
            drop(progress);
            while let Some(phase) = phases.recv().await {
                if !phase.is_idle() {
                    self.compose.advance(phase);
                }
            }
            self.settled = Some(self.compose.settle(&result));
            Some(result)
        }
    }

    #[tokio::test]
    async fn hello_turn_writes_human_then_ai_and_clears_input() {
        let mut harness = Harness::new(Reply::Text("hi there"), "hello");

        let outcome = harness
            .submit(Some("u1"))
            .await
            .expect("send started")
            .expect("send succeeded");

        let appended = harness.store.appended();
        assert_eq!(appended.len(), 2);
        assert_eq!(appended[0].text, "hello");
        assert_eq!(appended[0].author, AuthorId::user("u1"));
        assert!(!appended[0].is_ai);
        assert_eq!(appended[1].text, "hi there");
        assert_eq!(appended[1].author, AuthorId::Ai);
        assert!(appended[1].is_ai);
        assert!(outcome.ai_message.is_some());

        assert_eq!(harness.compose.input(), "");
        assert!(harness.compose.phase().is_idle());
        assert_eq!(harness.settled, Some(SendSettled::ClearComposer));
        let calls = harness.completion.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].prompt, "hello");
        assert_eq!(calls[0].model_id, "gpt-3.5-turbo");
    }

    #[tokio::test]
    async fn human_message_is_stored_before_completion_is_requested() {
        let mut harness = Harness::new(Reply::Text("hi"), "hello");
        harness.submit(Some("u1")).await.expect("send started").expect("ok");

        assert_eq!(*harness.completion.stored_before_call.lock().expect("lock"), vec![1]);
    }

    #[tokio::test]
    async fn empty_completion_writes_no_ai_message() {
        let mut harness = Harness::new(Reply::Empty, "hello");
        let outcome = harness
            .submit(Some("u1"))
            .await
            .expect("send started")
            .expect("empty answer is not an error");

        assert_eq!(outcome.ai_message, None);
        assert_eq!(harness.store.appended().len(), 1);
        assert_eq!(harness.compose.input(), "");
    }

    #[tokio::test]
    async fn failing_completion_keeps_human_message_and_input() {
        let mut harness = Harness::new(Reply::Fail, "hello");
        let error = harness
            .submit(Some("u1"))
            .await
            .expect("send started")
            .expect_err("completion fails");

        assert!(matches!(error, SendError::RequestCompletion { .. }));
        assert!(error.user_message_stored());
        let appended = harness.store.appended();
        assert_eq!(appended.len(), 1);
        assert!(!appended[0].is_ai);
        assert_eq!(harness.compose.input(), "hello");
        assert!(harness.compose.phase().is_idle());
        assert_eq!(harness.settled, Some(SendSettled::Notify(Notice::send_failed())));
        assert_eq!(
            harness.settled.and_then(|settled| match settled {
                SendSettled::Notify(notice) => Some(notice.message),
                SendSettled::ClearComposer => None,
            }),
            Some("Failed to send message".to_string())
        );
    }

    #[tokio::test]
    async fn blank_input_makes_no_writes_and_no_calls() {
        let mut harness = Harness::new(Reply::Text("hi"), "   ");
        assert!(harness.submit(Some("u1")).await.is_none());

        assert!(harness.store.appended().is_empty());
        assert!(harness.completion.calls().is_empty());
    }

    #[tokio::test]
    async fn signed_out_user_makes_no_writes() {
        let mut harness = Harness::new(Reply::Text("hi"), "hello");
        assert!(harness.submit(None).await.is_none());
        assert!(harness.store.appended().is_empty());
    }

    #[tokio::test]
    async fn store_failure_skips_completion() {
        let mut harness =
            Harness::with_store(Arc::new(RecordingStore::failing()), Reply::Text("hi"), "hello");
        let error = harness
            .submit(Some("u1"))
            .await
            .expect("send started")
            .expect_err("store fails");

        assert!(matches!(error, SendError::PersistUserMessage { .. }));
        assert!(!error.user_message_stored());
        assert!(harness.completion.calls().is_empty());
        assert_eq!(harness.compose.input(), "hello");
    }

    #[tokio::test]
    async fn resubmitting_after_failure_reuses_the_human_message_id() {
        let mut harness = Harness::new(Reply::Fail, "hello");
        harness.submit(Some("u1")).await.expect("send started").expect_err("fails");
        harness.submit(Some("u1")).await.expect("send started").expect_err("fails");

        let appended = harness.store.appended();
        assert_eq!(appended.len(), 2);
        assert_eq!(appended[0].id, appended[1].id);
    }

    #[tokio::test]
    async fn missing_completion_provider_fails_after_storing_human_turn() {
        let store = Arc::new(RecordingStore::default());
        let mut compose = ComposeState::new();
        compose.set_input("hello");
        let ticket = compose.begin_send(Some("u1"), "m").expect("send starts");
        let (progress, _phases) = mpsc::unbounded_channel();

        let error = send_turn(store.as_ref(), None, ticket, &progress)
            .await
            .expect_err("no provider");

        assert!(matches!(error, SendError::CompletionUnavailable { .. }));
        assert_eq!(store.appended().len(), 1);
    }
}
