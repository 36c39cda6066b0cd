use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl User {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Best human-readable label: display name, then email, then uid.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or(self.email.as_deref())
            .unwrap_or(&self.uid)
    }
}

/// Read-only projection of the identity session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub user: Option<User>,
    pub loading: bool,
}

impl SessionState {
    pub fn loading() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }

    pub fn signed_in(user: User) -> Self {
        Self {
            user: Some(user),
            loading: false,
        }
    }

    pub fn signed_out() -> Self {
        Self {
            user: None,
            loading: false,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::loading()
    }
}

/// Owner side of the session channel. Starts in the loading state.
#[derive(Debug)]
pub struct SessionPublisher {
    sender: watch::Sender<SessionState>,
}

impl SessionPublisher {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(SessionState::loading());
        Self { sender }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.sender.subscribe()
    }

    pub fn publish_signed_in(&self, user: User) {
        tracing::info!(uid = %user.uid, "session signed in");
        self.sender.send_replace(SessionState::signed_in(user));
    }

    pub fn publish_signed_out(&self) {
        tracing::info!("session signed out");
        self.sender.send_replace(SessionState::signed_out());
    }
}

impl Default for SessionPublisher {
    fn default() -> Self {
        Self::new()
    }
}
