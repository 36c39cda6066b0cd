/// Emitted when the user asks to send the compose box contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submit;

/// Emitted after every edit of the compose box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputChanged {
    pub text: String,
}

/// Emitted when the voice button is pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleVoice;
