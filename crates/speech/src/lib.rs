use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parley_llm::{AudioClip, TranscriptionProvider};
use snafu::ResultExt;
use tokio::sync::{mpsc, oneshot};

pub mod capture;
pub mod error;
pub mod wav;

pub use capture::{Capture, CapturedAudio};
pub use error::{SpeechError, SpeechResult};

use error::{CaptureThreadSnafu, TranscriptionSnafu, UnsupportedSnafu};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub const DEFAULT_MAX_CAPTURE: Duration = Duration::from_secs(30);

/// Lifecycle of one recognition session. `Ended` is always the last event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Started,
    Result(String),
    Error(String),
    Ended,
}

pub trait SpeechRecognizer: Send + Sync {
    /// Whether a session could start right now.
    fn is_available(&self) -> bool;

    /// Runs one session until `stop` fires, the sender is dropped, or the
    /// capture limit is reached.
    fn listen<'a>(
        &'a self,
        events: mpsc::UnboundedSender<SpeechEvent>,
        stop: oneshot::Receiver<()>,
    ) -> BoxFuture<'a, ()>;
}

/// Records from the default microphone and transcribes the clip once the
/// session stops.
pub struct CpalWhisperRecognizer {
    transcriber: Option<Arc<dyn TranscriptionProvider>>,
    max_duration: Duration,
}

impl CpalWhisperRecognizer {
    pub fn new(transcriber: Option<Arc<dyn TranscriptionProvider>>, max_duration: Duration) -> Self {
        let max_duration = if max_duration.is_zero() {
            DEFAULT_MAX_CAPTURE
        } else {
            max_duration
        };
        Self {
            transcriber,
            max_duration,
        }
    }

    async fn recognize(
        &self,
        events: &mpsc::UnboundedSender<SpeechEvent>,
        stop: oneshot::Receiver<()>,
    ) -> SpeechResult<Option<String>> {
        let Some(transcriber) = self.transcriber.clone() else {
            return UnsupportedSnafu {
                stage: "recognize-transcriber",
                reason: "no transcription model configured",
            }
            .fail();
        };

        let max_duration = self.max_duration;
        let mut capture = tokio::task::spawn_blocking(move || Capture::start(max_duration))
            .await
            .ok()
            .ok_or_else(|| {
                CaptureThreadSnafu {
                    stage: "recognize-start",
                }
                .build()
            })??;

        let _ = events.send(SpeechEvent::Started);

        let ended = capture.ended();
        tokio::select! {
            _ = stop => {}
            _ = ended => {
                tracing::debug!("capture ended without an explicit stop");
            }
        }

        let audio = tokio::task::spawn_blocking(move || capture.finish())
            .await
            .ok()
            .ok_or_else(|| {
                CaptureThreadSnafu {
                    stage: "recognize-finish",
                }
                .build()
            })??;

        if events.is_closed() || audio.samples.is_empty() {
            return Ok(None);
        }

        let clip = AudioClip::wav(wav::encode_mono_pcm16(&audio.samples, audio.sample_rate));
        let text = transcriber.transcribe(clip).await.context(TranscriptionSnafu {
            stage: "recognize-transcribe",
        })?;

        Ok(Some(text).filter(|text| !text.is_empty()))
    }
}

impl SpeechRecognizer for CpalWhisperRecognizer {
    fn is_available(&self) -> bool {
        self.transcriber.is_some() && capture::has_input_device()
    }

    fn listen<'a>(
        &'a self,
        events: mpsc::UnboundedSender<SpeechEvent>,
        stop: oneshot::Receiver<()>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            match self.recognize(&events, stop).await {
                Ok(Some(text)) => {
                    let _ = events.send(SpeechEvent::Result(text));
                }
                Ok(None) => tracing::debug!("speech session produced no text"),
                Err(error) => {
                    tracing::warn!(error = %error, "speech session failed");
                    let _ = events.send(SpeechEvent::Error(error.to_string()));
                }
            }
            let _ = events.send(SpeechEvent::Ended);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizer_without_transcriber_is_unavailable() {
        let recognizer = CpalWhisperRecognizer::new(None, Duration::from_secs(5));
        assert!(!recognizer.is_available());
    }

    #[test]
    fn zero_limit_falls_back_to_default() {
        let recognizer = CpalWhisperRecognizer::new(None, Duration::ZERO);
        assert_eq!(recognizer.max_duration, DEFAULT_MAX_CAPTURE);
    }

    #[tokio::test]
    async fn unsupported_session_reports_error_then_ends() {
        let recognizer = CpalWhisperRecognizer::new(None, Duration::from_secs(5));
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (_stop_tx, stop_rx) = oneshot::channel();

        recognizer.listen(events_tx, stop_rx).await;

        let first = events_rx.recv().await.expect("error event");
        assert!(matches!(first, SpeechEvent::Error(_)));
        assert_eq!(events_rx.recv().await, Some(SpeechEvent::Ended));
        assert_eq!(events_rx.recv().await, None);
    }
}
