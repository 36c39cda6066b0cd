use parley_speech::SpeechEvent;

/// Outcome of pressing the voice button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceStart {
    /// A new recognition session should be started.
    Begin,
    AlreadyListening,
    Unsupported,
}

/// What the chat view should do after a speech event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEffect {
    ReplaceInput(String),
    Failed(String),
}

/// One-shot recognition state: `Idle -> Listening -> Idle`.
#[derive(Debug, Default)]
pub struct VoiceCapture {
    listening: bool,
}

impl VoiceCapture {
    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn toggle_listening(&mut self, supported: bool) -> VoiceStart {
        if self.listening {
            return VoiceStart::AlreadyListening;
        }
        if !supported {
            return VoiceStart::Unsupported;
        }

        self.listening = true;
        VoiceStart::Begin
    }

    pub fn on_event(&mut self, event: SpeechEvent) -> Option<VoiceEffect> {
        match event {
            SpeechEvent::Started => {
                self.listening = true;
                None
            }
            SpeechEvent::Result(transcript) => Some(VoiceEffect::ReplaceInput(transcript)),
            SpeechEvent::Error(message) => {
                self.listening = false;
                Some(VoiceEffect::Failed(message))
            }
            SpeechEvent::Ended => {
                self.listening = false;
                None
            }
        }
    }

    /// Forgets the running session without waiting for `Ended`.
    pub fn reset(&mut self) {
        self.listening = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_while_listening_keeps_one_session() {
        let mut voice = VoiceCapture::default();
        assert_eq!(voice.toggle_listening(true), VoiceStart::Begin);
        assert_eq!(voice.toggle_listening(true), VoiceStart::AlreadyListening);
        assert_eq!(voice.toggle_listening(true), VoiceStart::AlreadyListening);
        assert!(voice.is_listening());
    }

    #[test]
    fn unsupported_platform_never_starts() {
        let mut voice = VoiceCapture::default();
        assert_eq!(voice.toggle_listening(false), VoiceStart::Unsupported);
        assert!(!voice.is_listening());
    }

    #[test]
    fn result_replaces_input_and_end_returns_to_idle() {
        let mut voice = VoiceCapture::default();
        voice.toggle_listening(true);

        assert_eq!(voice.on_event(SpeechEvent::Started), None);
        assert_eq!(
            voice.on_event(SpeechEvent::Result("hello there".to_string())),
            Some(VoiceEffect::ReplaceInput("hello there".to_string()))
        );
        assert!(voice.is_listening());
        assert_eq!(voice.on_event(SpeechEvent::Ended), None);
        assert!(!voice.is_listening());
        assert_eq!(voice.toggle_listening(true), VoiceStart::Begin);
    }

    #[test]
    fn error_returns_to_idle() {
        let mut voice = VoiceCapture::default();
        voice.toggle_listening(true);

        assert_eq!(
            voice.on_event(SpeechEvent::Error("no microphone".to_string())),
            Some(VoiceEffect::Failed("no microphone".to_string()))
        );
        assert!(!voice.is_listening());
    }
}
