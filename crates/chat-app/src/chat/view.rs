use gpui::*;
use gpui_component::{
    ActiveTheme, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    label::Label,
    notification::NotificationList,
    v_flex,
};
use gpui_tokio_bridge::Tokio;
use parley_identity::User;
use parley_speech::SpeechEvent;
use parley_storage::{MessageRecord, StorageResult};
use tokio::sync::{mpsc, oneshot};

use crate::chat::compose::{ComposeState, SendPhase, SendSettled};
use crate::chat::composer::Composer;
use crate::chat::events::{InputChanged, Submit, ToggleVoice};
use crate::chat::message_list::MessageList;
use crate::chat::send::{InterruptedSnafu, SendError, SendOutcome, SendResult, send_turn};
use crate::chat::voice::{VoiceEffect, VoiceStart};
use crate::notice::{LOAD_FAILED, Notice, SIGN_OUT_FAILED};
use crate::services::ChatServices;

pub const APP_TITLE: &str = "Parley";

/// Signed-in screen: live transcript, compose box and the send pipeline.
pub struct ChatView {
    services: ChatServices,
    user: User,
    notifications: Entity<NotificationList>,
    composer: Entity<Composer>,
    message_list: Entity<MessageList>,
    compose: ComposeState,
    _feed_worker: Task<Result<(), gpui_tokio_bridge::JoinError>>,
    _feed_reader: Task<()>,
    send_task: Option<Task<()>>,
    speech_worker: Option<Task<Result<(), gpui_tokio_bridge::JoinError>>>,
    speech_reader: Option<Task<()>>,
    speech_stop: Option<oneshot::Sender<()>>,
    sign_out_task: Option<Task<()>>,
}

impl ChatView {
    pub fn new(
        services: ChatServices,
        user: User,
        notifications: Entity<NotificationList>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let composer = cx.new(|cx| Composer::new(window, cx));
        let message_list = cx.new(MessageList::new);

        cx.subscribe_in(&composer, window, |this, _, _event: &Submit, window, cx| {
            this.handle_submit(window, cx);
        })
        .detach();

        cx.subscribe(&composer, |this, _, event: &InputChanged, cx| {
            this.compose.set_input(event.text.clone());
            this.sync_composer(cx);
        })
        .detach();

        cx.subscribe_in(&composer, window, |this, _, _event: &ToggleVoice, window, cx| {
            this.handle_toggle_voice(window, cx);
        })
        .detach();

        let (feed_worker, feed_reader) = Self::spawn_feed(&services, window, cx);

        Self {
            services,
            user,
            notifications,
            composer,
            message_list,
            compose: ComposeState::new(),
            _feed_worker: feed_worker,
            _feed_reader: feed_reader,
            send_task: None,
            speech_worker: None,
            speech_reader: None,
            speech_stop: None,
            sign_out_task: None,
        }
    }

    /// Subscribes to the latest-messages window. Both tasks end when the view
    /// is dropped.
    fn spawn_feed(
        services: &ChatServices,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> (Task<Result<(), gpui_tokio_bridge::JoinError>>, Task<()>) {
        let mut feed = services.store.subscribe_latest(services.latest_query);
        let (snapshot_tx, mut snapshot_rx) =
            mpsc::unbounded_channel::<StorageResult<Vec<MessageRecord>>>();

        let worker = Tokio::spawn(cx, async move {
            loop {
                tokio::select! {
                    next = feed.next() => match next {
                        Some(snapshot) => {
                            if snapshot_tx.send(snapshot).is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                    _ = snapshot_tx.closed() => break,
                }
            }
            tracing::debug!("message feed worker stopped");
        });

        let reader = cx.spawn_in(window, async move |this, cx| {
            while let Some(snapshot) = snapshot_rx.recv().await {
                let _ = this.update_in(cx, |this, window, cx| {
                    this.apply_snapshot(snapshot, window, cx);
                });
            }
        });

        (worker, reader)
    }

    fn apply_snapshot(
        &mut self,
        snapshot: StorageResult<Vec<MessageRecord>>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        match snapshot {
            Ok(messages) => {
                tracing::debug!(count = messages.len(), "message snapshot received");
                self.message_list.update(cx, |list, cx| {
                    list.set_snapshot(messages, cx);
                });
            }
            Err(error) => {
                tracing::error!(error = %error, "message subscription failed");
                Notice::error(LOAD_FAILED).push(&self.notifications, window, cx);
            }
        }
    }

    fn sync_composer(&mut self, cx: &mut Context<Self>) {
        let can_send = self.compose.can_send();
        let busy = !self.compose.phase().is_idle();
        let listening = self.compose.voice.is_listening();
        self.composer.update(cx, |composer, cx| {
            composer.set_state(can_send, busy, listening, cx);
        });
        cx.notify();
    }

    fn handle_submit(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        let Some(ticket) = self
            .compose
            .begin_send(Some(&self.user.uid), &self.services.model_id)
        else {
            return;
        };
        tracing::info!(message_id = %ticket.message_id, "sending message");
        self.sync_composer(cx);

        let store = self.services.store.clone();
        let completion = self.services.completion.clone();
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();

        let job = Tokio::spawn(cx, async move {
            send_turn(store.as_ref(), completion.as_deref(), ticket, &progress_tx).await
        });

        self.send_task = Some(cx.spawn_in(window, async move |this, cx| {
            // The channel closes once the job drops its sender.
            while let Some(phase) = progress_rx.recv().await {
                // Only `settle` may return the phase to idle.
                if phase.is_idle() {
                    continue;
                }
                let _ = this.update(cx, |this, cx| {
                    this.compose.advance(phase);
                    this.sync_composer(cx);
                });
            }

            let result = match job.await {
                Ok(result) => result,
                Err(error) => {
                    tracing::error!(error = %error, "send task aborted");
                    Err(InterruptedSnafu { stage: "send-join" }.build())
                }
            };

            let _ = this.update_in(cx, |this, window, cx| {
                this.finish_send(result, window, cx);
            });
        }));
    }

    fn finish_send(
        &mut self,
        result: SendResult<SendOutcome>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        self.send_task = None;

        match &result {
            Ok(outcome) => tracing::info!(
                message_id = %outcome.user_message.id,
                answered = outcome.ai_message.is_some(),
                "message sent"
            ),
            Err(error) => log_send_error(error),
        }

        match self.compose.settle(&result) {
            SendSettled::ClearComposer => {
                self.composer.update(cx, |composer, cx| {
                    composer.clear(window, cx);
                });
            }
            SendSettled::Notify(notice) => notice.push(&self.notifications, window, cx),
        }

        self.sync_composer(cx);
    }

    fn handle_toggle_voice(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        let supported = self.services.speech.is_available();
        match self.compose.voice.toggle_listening(supported) {
            VoiceStart::AlreadyListening => {}
            VoiceStart::Unsupported => {
                tracing::warn!("speech recognition requested but unavailable");
                Notice::speech_unsupported().push(&self.notifications, window, cx);
            }
            VoiceStart::Begin => {
                self.start_speech(window, cx);
                self.sync_composer(cx);
            }
        }
    }

    fn start_speech(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        let speech = self.services.speech.clone();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<SpeechEvent>();
        let (stop_tx, stop_rx) = oneshot::channel();

        self.speech_stop = Some(stop_tx);
        self.speech_worker = Some(Tokio::spawn(cx, async move {
            speech.listen(events_tx, stop_rx).await;
        }));

        self.speech_reader = Some(cx.spawn_in(window, async move |this, cx| {
            while let Some(event) = events_rx.recv().await {
                let _ = this.update_in(cx, |this, window, cx| {
                    this.apply_speech_event(event, window, cx);
                });
            }

            let _ = this.update(cx, |this, cx| {
                this.finish_speech(cx);
            });
        }));
    }

    fn apply_speech_event(&mut self, event: SpeechEvent, window: &mut Window, cx: &mut Context<Self>) {
        match self.compose.voice.on_event(event) {
            Some(VoiceEffect::ReplaceInput(transcript)) => {
                self.compose.set_input(transcript.clone());
                self.composer.update(cx, |composer, cx| {
                    composer.set_text(transcript, window, cx);
                });
            }
            Some(VoiceEffect::Failed(message)) => {
                tracing::warn!(error = %message, "speech recognition failed");
                Notice::speech_failed().push(&self.notifications, window, cx);
            }
            None => {}
        }
        self.sync_composer(cx);
    }

    fn finish_speech(&mut self, cx: &mut Context<Self>) {
        self.compose.voice.reset();
        self.speech_stop = None;
        self.speech_worker = None;
        self.speech_reader = None;
        self.sync_composer(cx);
    }

    fn handle_sign_out(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        if self.sign_out_task.is_some() {
            return;
        }

        if let Some(stop) = self.speech_stop.take() {
            let _ = stop.send(());
        }

        let identity = self.services.identity.clone();
        let job = Tokio::spawn(cx, async move { identity.sign_out().await });

        self.sign_out_task = Some(cx.spawn_in(window, async move |this, cx| {
            let failed = match job.await {
                Ok(Ok(())) => None,
                Ok(Err(error)) => Some(error.to_string()),
                Err(error) => Some(error.to_string()),
            };

            // On success the shell swaps this view out from the session watch.
            let _ = this.update_in(cx, |this, window, cx| {
                this.sign_out_task = None;
                if let Some(error) = failed {
                    tracing::error!(error = %error, "sign out failed");
                    Notice::error(SIGN_OUT_FAILED).push(&this.notifications, window, cx);
                }
            });
        }));
    }
}

fn log_send_error(error: &SendError) {
    if error.user_message_stored() {
        tracing::error!(error = %error, "send failed after the user message was stored");
    } else {
        tracing::error!(error = %error, "send failed");
    }
}

impl Render for ChatView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let phase_label = match self.compose.phase() {
            SendPhase::Idle => None,
            SendPhase::SendingUserMessage => Some("Sending..."),
            SendPhase::RequestingCompletion => Some("Waiting for reply..."),
            SendPhase::SendingAiMessage => Some("Saving reply..."),
        };

        let header = h_flex()
            .w_full()
            .px_4()
            .py_2()
            .gap_3()
            .items_center()
            .justify_between()
            .border_b_1()
            .border_color(theme.border)
            .child(Label::new(APP_TITLE).font_semibold())
            .child(
                h_flex()
                    .gap_3()
                    .items_center()
                    .children(phase_label.map(|label| {
                        Label::new(label)
                            .text_xs()
                            .text_color(theme.muted_foreground)
                    }))
                    .child(
                        Label::new(self.user.label().to_string())
                            .text_sm()
                            .text_color(theme.muted_foreground),
                    )
                    .child(
                        Button::new("chat-sign-out")
                            .small()
                            .ghost()
                            .child("Sign out")
                            .loading(self.sign_out_task.is_some())
                            .on_click(cx.listener(|this, _, window, cx| {
                                this.handle_sign_out(window, cx);
                            })),
                    ),
            );

        v_flex()
            .size_full()
            .bg(theme.background)
            .child(header)
            .child(div().flex_1().min_h_0().child(self.message_list.clone()))
            .child(self.composer.clone())
    }
}
