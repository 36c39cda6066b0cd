use std::sync::Arc;

use gpui::*;
use gpui_component::{
    ActiveTheme, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    input::{Input, InputEvent, InputState},
    label::Label,
    notification::NotificationList,
    v_flex,
};
use gpui_tokio_bridge::Tokio;
use parley_identity::{AuthResult, IdentityProvider, OAuthProvider, User};

use crate::login::form::{LoginForm, LoginMode};
use crate::notice::Notice;

const FORM_WIDTH: Pixels = px(360.);

/// Credential form shown while nobody is signed in.
pub struct LoginView {
    identity: Arc<dyn IdentityProvider>,
    notifications: Entity<NotificationList>,
    form: LoginForm,
    email_input: Entity<InputState>,
    password_input: Entity<InputState>,
    auth_task: Option<Task<()>>,
}

impl LoginView {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        notifications: Entity<NotificationList>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let email_input = cx.new(|cx| InputState::new(window, cx).placeholder("Email"));
        let password_input =
            cx.new(|cx| InputState::new(window, cx).placeholder("Password").masked(true));

        cx.subscribe_in(
            &email_input,
            window,
            |this, state, event: &InputEvent, window, cx| match event {
                InputEvent::PressEnter { .. } => this.submit(window, cx),
                _ => {
                    this.form.set_email(state.read(cx).value().to_string());
                    cx.notify();
                }
            },
        )
        .detach();

        cx.subscribe_in(
            &password_input,
            window,
            |this, state, event: &InputEvent, window, cx| match event {
                InputEvent::PressEnter { .. } => this.submit(window, cx),
                _ => {
                    this.form.set_password(state.read(cx).value().to_string());
                    cx.notify();
                }
            },
        )
        .detach();

        Self {
            identity,
            notifications,
            form: LoginForm::new(),
            email_input,
            password_input,
            auth_task: None,
        }
    }

    fn submit(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        let Some(credentials) = self.form.begin_submit() else {
            return;
        };
        tracing::info!(mode = ?credentials.mode, "submitting credentials");

        let identity = self.identity.clone();
        let job = Tokio::spawn(cx, async move {
            match credentials.mode {
                LoginMode::SignIn => {
                    identity
                        .sign_in(&credentials.email, &credentials.password)
                        .await
                }
                LoginMode::SignUp => {
                    identity
                        .sign_up(&credentials.email, &credentials.password)
                        .await
                }
            }
        });
        self.await_auth(job, window, cx);
    }

    fn sign_in_with_provider(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        if !self.form.begin_provider_sign_in() {
            return;
        }
        let provider = OAuthProvider::Google;
        tracing::info!(provider = provider.label(), "starting provider sign-in");

        let identity = self.identity.clone();
        let job = Tokio::spawn(cx, async move { identity.sign_in_with_provider(provider).await });
        self.await_auth(job, window, cx);
    }

    /// Waits for one identity call. Success is picked up from the session
    /// watch by the shell, so only failures are handled here.
    fn await_auth(
        &mut self,
        job: Task<Result<AuthResult<User>, gpui_tokio_bridge::JoinError>>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        cx.notify();
        self.auth_task = Some(cx.spawn_in(window, async move |this, cx| {
            let failure = match job.await {
                Ok(Ok(user)) => {
                    tracing::info!(uid = %user.uid, "signed in");
                    None
                }
                Ok(Err(error)) => Some(error.to_string()),
                Err(error) => Some(error.to_string()),
            };

            let _ = this.update_in(cx, |this, window, cx| {
                this.auth_task = None;
                this.form.finish_submit();
                if let Some(message) = failure {
                    tracing::warn!(error = %message, "authentication failed");
                    Notice::error(message).push(&this.notifications, window, cx);
                }
                cx.notify();
            });
        }));
    }

    fn toggle_mode(&mut self, cx: &mut Context<Self>) {
        self.form.toggle_mode();
        cx.notify();
    }
}

impl Render for LoginView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let mode = self.form.mode();
        let submitting = self.form.is_submitting();

        v_flex()
            .size_full()
            .items_center()
            .justify_center()
            .bg(theme.background)
            .child(
                v_flex()
                    .w(FORM_WIDTH)
                    .gap_3()
                    .p_6()
                    .rounded_lg()
                    .border_1()
                    .border_color(theme.border)
                    .child(Label::new(mode.title()).text_xl().font_semibold())
                    .child(Input::new(&self.email_input).w_full())
                    .child(Input::new(&self.password_input).w_full())
                    .child(
                        Button::new("login-submit")
                            .primary()
                            .w_full()
                            .child(mode.submit_label())
                            .loading(submitting)
                            .disabled(!self.form.can_submit())
                            .on_click(cx.listener(|this, _, window, cx| {
                                this.submit(window, cx);
                            })),
                    )
                    .child(
                        Button::new("login-google")
                            .outline()
                            .w_full()
                            .child(format!("Continue with {}", OAuthProvider::Google.label()))
                            .disabled(submitting)
                            .on_click(cx.listener(|this, _, window, cx| {
                                this.sign_in_with_provider(window, cx);
                            })),
                    )
                    .child(
                        h_flex()
                            .gap_1()
                            .justify_center()
                            .items_center()
                            .child(
                                Label::new(mode.switch_prompt())
                                    .text_sm()
                                    .text_color(theme.muted_foreground),
                            )
                            .child(
                                Button::new("login-switch-mode")
                                    .link()
                                    .small()
                                    .child(mode.switch_label())
                                    .on_click(cx.listener(|this, _, _window, cx| {
                                        this.toggle_mode(cx);
                                    })),
                            ),
                    ),
            )
    }
}
