use parley_identity::{SessionState, User};

/// Screen the shell shows for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootScreen {
    Loading,
    Login,
    Chat(User),
}

impl RootScreen {
    pub fn for_session(session: &SessionState) -> Self {
        if session.loading {
            return Self::Loading;
        }

        match &session.user {
            Some(user) => Self::Chat(user.clone()),
            None => Self::Login,
        }
    }

    /// Whether switching from `self` to `next` needs a new view.
    pub fn differs_from(&self, next: &Self) -> bool {
        match (self, next) {
            (Self::Chat(current), Self::Chat(next)) => current.uid != next.uid,
            (current, next) => std::mem::discriminant(current) != std::mem::discriminant(next),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_session_blocks_both_views() {
        let mut session = SessionState::signed_in(User::new("u1"));
        session.loading = true;
        assert_eq!(RootScreen::for_session(&session), RootScreen::Loading);
    }

    #[test]
    fn resolved_session_picks_chat_or_login() {
        assert_eq!(
            RootScreen::for_session(&SessionState::signed_out()),
            RootScreen::Login
        );
        assert_eq!(
            RootScreen::for_session(&SessionState::signed_in(User::new("u1"))),
            RootScreen::Chat(User::new("u1"))
        );
    }

    #[test]
    fn same_user_keeps_the_chat_view() {
        let chat = RootScreen::Chat(User::new("u1"));
        let refreshed = RootScreen::Chat(User::new("u1").with_email("a@b.c"));
        assert!(!chat.differs_from(&refreshed));
        assert!(chat.differs_from(&RootScreen::Chat(User::new("u2"))));
        assert!(chat.differs_from(&RootScreen::Login));
        assert!(!RootScreen::Login.differs_from(&RootScreen::Login));
    }
}
