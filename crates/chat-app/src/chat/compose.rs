use parley_storage::MessageId;

use crate::chat::send::SendResult;
use crate::chat::voice::VoiceCapture;
use crate::notice::Notice;

/// In-flight indicator of one send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendPhase {
    #[default]
    Idle,
    SendingUserMessage,
    RequestingCompletion,
    SendingAiMessage,
}

/// Transition input for the send lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendTransition {
    Begin,
    UserMessageStored,
    CompletionReceived,
    Finish,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendTransitionRejection {
    AlreadySending(SendPhase),
    NotSending,
    OutOfOrder {
        phase: SendPhase,
        attempted: SendTransition,
    },
}

pub type SendTransitionResult = Result<SendPhase, SendTransitionRejection>;

impl SendPhase {
    pub fn is_idle(self) -> bool {
        self == Self::Idle
    }

    /// Applies one transition. Only `Idle` may begin; failure from any
    /// middle phase returns to `Idle`.
    pub fn apply(self, transition: SendTransition) -> SendTransitionResult {
        match (self, transition) {
            (Self::Idle, SendTransition::Begin) => Ok(Self::SendingUserMessage),
            (phase, SendTransition::Begin) => Err(SendTransitionRejection::AlreadySending(phase)),
            (Self::Idle, _) => Err(SendTransitionRejection::NotSending),
            (Self::SendingUserMessage, SendTransition::UserMessageStored) => {
                Ok(Self::RequestingCompletion)
            }
            (Self::RequestingCompletion, SendTransition::CompletionReceived) => {
                Ok(Self::SendingAiMessage)
            }
            (Self::RequestingCompletion | Self::SendingAiMessage, SendTransition::Finish) => {
                Ok(Self::Idle)
            }
            (_, SendTransition::Fail) => Ok(Self::Idle),
            (phase, attempted) => Err(SendTransitionRejection::OutOfOrder { phase, attempted }),
        }
    }
}

/// Human turn that reached the store while a later step failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTurn {
    pub id: MessageId,
    pub text: String,
}

/// Everything one send job needs, captured when the send begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendTicket {
    pub message_id: MessageId,
    pub uid: String,
    pub text: String,
    pub model_id: String,
}

/// What the view does once a send has settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendSettled {
    ClearComposer,
    Notify(Notice),
}

/// Compose box state owned by the chat view.
#[derive(Debug, Default)]
pub struct ComposeState {
    input: String,
    phase: SendPhase,
    pending: Option<PendingTurn>,
    pub voice: VoiceCapture,
}

impl ComposeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn phase(&self) -> SendPhase {
        self.phase
    }

    pub fn pending(&self) -> Option<&PendingTurn> {
        self.pending.as_ref()
    }

    /// Mirrors the compose box. Editing away from the pending text forgets it.
    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
        if self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.text != self.input)
        {
            self.pending = None;
        }
    }

    pub fn can_send(&self) -> bool {
        self.phase.is_idle() && !self.input.trim().is_empty()
    }

    /// Starts a send of the current input for `uid`.
    ///
    /// Returns `None` without touching any state when the input is blank, no
    /// user is signed in, or another send is still running.
    pub fn begin_send(&mut self, uid: Option<&str>, model_id: &str) -> Option<SendTicket> {
        let uid = uid.filter(|uid| !uid.is_empty())?;
        if self.input.trim().is_empty() {
            return None;
        }

        let next_phase = match self.phase.apply(SendTransition::Begin) {
            Ok(phase) => phase,
            Err(rejection) => {
                tracing::debug!(?rejection, "send refused");
                return None;
            }
        };

        let message_id = match &self.pending {
            Some(pending) if pending.text == self.input => pending.id,
            _ => MessageId::new_v7(),
        };
        self.pending = Some(PendingTurn {
            id: message_id,
            text: self.input.clone(),
        });
        self.phase = next_phase;

        Some(SendTicket {
            message_id,
            uid: uid.to_string(),
            text: self.input.clone(),
            model_id: model_id.to_string(),
        })
    }

    /// Applies progress reported by the running send job.
    pub fn advance(&mut self, phase: SendPhase) {
        let transition = match phase {
            SendPhase::RequestingCompletion => SendTransition::UserMessageStored,
            SendPhase::SendingAiMessage => SendTransition::CompletionReceived,
            SendPhase::Idle => SendTransition::Finish,
            SendPhase::SendingUserMessage => return,
        };

        match self.phase.apply(transition) {
            Ok(next) => self.phase = next,
            Err(rejection) => tracing::debug!(?rejection, "ignored stale send progress"),
        }
    }

    /// Ends the running send. Success clears the input and forgets the
    /// pending turn; failure keeps both so a resubmission reuses the id and
    /// asks the view to show the send failure.
    pub fn settle<T>(&mut self, result: &SendResult<T>) -> SendSettled {
        let transition = if result.is_ok() {
            SendTransition::Finish
        } else {
            SendTransition::Fail
        };
        // Progress may lag behind the job; a failure step always reaches idle.
        let phase = self.phase;
        self.phase = phase
            .apply(transition)
            .or_else(|rejection| {
                tracing::debug!(?rejection, "send settled ahead of its progress");
                phase.apply(SendTransition::Fail)
            })
            .unwrap_or(SendPhase::Idle);

        if result.is_ok() {
            self.pending = None;
            self.input.clear();
            SendSettled::ClearComposer
        } else {
            SendSettled::Notify(Notice::send_failed())
        }
    }
}
