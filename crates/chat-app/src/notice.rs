use gpui::*;
use gpui_component::notification::{Notification, NotificationList};

pub const ERROR_TITLE: &str = "Error";
pub const SEND_FAILED: &str = "Failed to send message";
pub const SPEECH_UNSUPPORTED: &str = "Speech recognition is not supported on this device";
pub const SPEECH_FAILED: &str = "Speech recognition failed";
pub const SIGN_OUT_FAILED: &str = "Failed to sign out";
pub const LOAD_FAILED: &str = "Failed to load messages";

/// A transient error toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: &'static str,
    pub message: String,
}

impl Notice {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            title: ERROR_TITLE,
            message: message.into(),
        }
    }

    pub fn send_failed() -> Self {
        Self::error(SEND_FAILED)
    }

    pub fn speech_unsupported() -> Self {
        Self::error(SPEECH_UNSUPPORTED)
    }

    pub fn speech_failed() -> Self {
        Self::error(SPEECH_FAILED)
    }

    pub fn push(self, list: &Entity<NotificationList>, window: &mut Window, cx: &mut App) {
        let notification = Notification::error(self.message).title(self.title);
        list.update(cx, |list, cx| list.push(notification, window, cx));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_failure_uses_fixed_text() {
        let notice = Notice::send_failed();
        assert_eq!(notice.title, "Error");
        assert_eq!(notice.message, "Failed to send message");
    }

    #[test]
    fn auth_messages_pass_through_verbatim() {
        let notice = Notice::error("EMAIL_NOT_FOUND");
        assert_eq!(notice.message, "EMAIL_NOT_FOUND");
    }
}
