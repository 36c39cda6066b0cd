use std::path::PathBuf;
use std::sync::Arc;

use gpui::*;
use gpui_component::{
    ActiveTheme,
    label::Label,
    notification::NotificationList,
    v_flex,
};
use gpui_tokio_bridge::Tokio;
use parley_identity::SessionState;
use parley_storage::{MessageStore, SqliteStorage};

use crate::chat::ChatView;
use crate::login::LoginView;
use crate::notice::Notice;
use crate::root::RootScreen;
use crate::services::Services;

pub const LOADING_LABEL: &str = "Loading...";
pub const STORE_UNAVAILABLE: &str = "Message store is unavailable";

gpui::actions!(shell, [Quit]);

/// Directory scanned for user themes.
pub fn default_themes_path() -> PathBuf {
    PathBuf::from("./themes")
}

enum Screen {
    Loading,
    Login(Entity<LoginView>),
    Chat(Entity<ChatView>),
}

/// Root view: picks the login or chat screen from the identity session.
pub struct AppShell {
    services: Services,
    notifications: Entity<NotificationList>,
    store: Option<Arc<dyn MessageStore>>,
    store_failed: bool,
    session: SessionState,
    current: RootScreen,
    screen: Screen,
    _store_task: Task<()>,
    _session_task: Task<()>,
    _restore_task: Task<Result<(), gpui_tokio_bridge::JoinError>>,
}

impl AppShell {
    pub fn new(
        services: Services,
        notifications: Entity<NotificationList>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let location = services.database_location.clone();
        let open = Tokio::spawn(cx, async move { SqliteStorage::open(&location).await });
        let store_task = cx.spawn_in(window, async move |this, cx| {
            let opened = match open.await {
                Ok(result) => result.map_err(|error| error.to_string()),
                Err(error) => Err(error.to_string()),
            };
            let _ = this.update_in(cx, |this, window, cx| {
                this.apply_store(opened, window, cx);
            });
        });

        let mut session_rx = services.identity.session();
        let initial = session_rx.borrow_and_update().clone();
        let session_task = cx.spawn_in(window, async move |this, cx| {
            while session_rx.changed().await.is_ok() {
                let state = session_rx.borrow_and_update().clone();
                if this
                    .update_in(cx, |this, window, cx| {
                        this.apply_session(state, window, cx);
                    })
                    .is_err()
                {
                    break;
                }
            }
        });

        let identity = services.identity.clone();
        let restore_task = Tokio::spawn(cx, async move { identity.restore().await });

        let mut this = Self {
            services,
            notifications,
            store: None,
            store_failed: false,
            session: initial,
            current: RootScreen::Loading,
            screen: Screen::Loading,
            _store_task: store_task,
            _session_task: session_task,
            _restore_task: restore_task,
        };
        this.refresh_screen(window, cx);
        this
    }

    fn apply_store(
        &mut self,
        opened: Result<SqliteStorage, String>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        match opened {
            Ok(store) => self.store = Some(Arc::new(store)),
            Err(error) => {
                tracing::error!(error = %error, "failed to open message store");
                self.store_failed = true;
                Notice::error(STORE_UNAVAILABLE).push(&self.notifications, window, cx);
            }
        }
        self.refresh_screen(window, cx);
    }

    fn apply_session(&mut self, session: SessionState, window: &mut Window, cx: &mut Context<Self>) {
        tracing::debug!(
            loading = session.loading,
            signed_in = session.user.is_some(),
            "session changed"
        );
        self.session = session;
        self.refresh_screen(window, cx);
    }

    /// Chat waits for the store as well as the session.
    fn target_screen(&self) -> RootScreen {
        match RootScreen::for_session(&self.session) {
            RootScreen::Chat(_) if self.store.is_none() => RootScreen::Loading,
            screen => screen,
        }
    }

    fn refresh_screen(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        let next = self.target_screen();
        if !self.current.differs_from(&next) {
            return;
        }

        self.screen = match &next {
            RootScreen::Loading => Screen::Loading,
            RootScreen::Login => {
                let identity = self.services.identity.clone();
                let notifications = self.notifications.clone();
                Screen::Login(cx.new(|cx| LoginView::new(identity, notifications, window, cx)))
            }
            RootScreen::Chat(user) => {
                let Some(store) = self.store.clone() else {
                    return;
                };
                let services = self.services.with_store(store);
                let user = user.clone();
                let notifications = self.notifications.clone();
                Screen::Chat(cx.new(|cx| ChatView::new(services, user, notifications, window, cx)))
            }
        };
        tracing::info!(screen = ?next, "switched screen");
        self.current = next;
        cx.notify();
    }

    fn render_loading(&self, cx: &Context<Self>) -> AnyElement {
        let theme = cx.theme();
        let label = if self.store_failed && self.session.user.is_some() {
            STORE_UNAVAILABLE
        } else {
            LOADING_LABEL
        };

        v_flex()
            .size_full()
            .items_center()
            .justify_center()
            .text_color(theme.muted_foreground)
            .child(Label::new(label))
            .into_any_element()
    }
}

impl Render for AppShell {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let content = match &self.screen {
            Screen::Loading => self.render_loading(cx),
            Screen::Login(view) => view.clone().into_any_element(),
            Screen::Chat(view) => view.clone().into_any_element(),
        };

        div()
            .size_full()
            .relative()
            .bg(theme.background)
            .child(content)
            // Notification layer for toasts
            .child(self.notifications.clone())
    }
}
