use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use snafu::Snafu;

pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider_id: String,
    pub api_key: String,
    pub base_url: String,
    /// Upper bound for a single completion call. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl ProviderConfig {
    pub fn new(
        provider_id: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into().trim().to_string(),
            api_key: api_key.into().trim().to_string(),
            base_url: base_url.into().trim().to_string(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|timeout| !timeout.is_zero());
        self
    }
}

/// One single-turn completion: the prompt is sent as the only user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model_id: String,
    pub prompt: String,
}

impl CompletionRequest {
    pub fn new(model_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            prompt: prompt.into(),
        }
    }
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type CompletionResult<T> = Result<T, CompletionError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CompletionError {
    #[snafu(display("missing API key for provider '{provider_id}'"))]
    MissingApiKey {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("provider '{provider_id}' is not supported"))]
    UnsupportedProvider {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("completion prompt is empty"))]
    EmptyPrompt { stage: &'static str },
    #[snafu(display("http client failed on `{stage}`, {source}"))]
    HttpClient {
        stage: &'static str,
        source: rig::http_client::Error,
    },
    #[snafu(display("completions failed on `{stage}`, {source}"))]
    CompletionsFailed {
        stage: &'static str,
        source: rig::completion::CompletionError,
    },
    #[snafu(display("transcription audio is empty"))]
    EmptyAudio { stage: &'static str },
    #[snafu(display("transcription failed on `{stage}`, {source}"))]
    TranscriptionFailed {
        stage: &'static str,
        source: rig::transcription::TranscriptionError,
    },
    #[snafu(display("completion with model '{model_id}' timed out after {timeout_secs}s"))]
    TimedOut {
        stage: &'static str,
        model_id: String,
        timeout_secs: u64,
    },
}

pub trait CompletionProvider: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn default_model(&self) -> &str;
    /// Resolves to `None` when the endpoint answers without any text.
    fn complete<'a>(
        &'a self,
        request: CompletionRequest,
    ) -> BoxFuture<'a, CompletionResult<Option<String>>>;
}

/// Encoded audio handed to a speech-to-text model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub data: Vec<u8>,
    pub filename: String,
}

impl AudioClip {
    pub fn wav(data: Vec<u8>) -> Self {
        Self {
            data,
            filename: "speech.wav".to_string(),
        }
    }
}

pub trait TranscriptionProvider: Send + Sync {
    fn model(&self) -> &str;
    /// Resolves to the recognized text, trimmed. Silence yields an empty string.
    fn transcribe<'a>(&'a self, clip: AudioClip) -> BoxFuture<'a, CompletionResult<String>>;
}
