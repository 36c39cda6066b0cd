use rig::prelude::TranscriptionClient;
use rig::transcription::TranscriptionModel;
use snafu::{ResultExt, ensure};

use super::provider::{
    AudioClip, BoxFuture, CompletionResult, DEFAULT_TRANSCRIPTION_MODEL, EmptyAudioSnafu,
    MissingApiKeySnafu, ProviderConfig, TimedOutSnafu, TranscriptionFailedSnafu,
    TranscriptionProvider,
};
use super::rig_adapter::RigCompletionAdapter;

pub struct RigTranscriptionAdapter {
    config: ProviderConfig,
    model: String,
}

impl RigTranscriptionAdapter {
    pub fn new(config: ProviderConfig, model: Option<String>) -> CompletionResult<Self> {
        ensure!(
            !config.api_key.is_empty(),
            MissingApiKeySnafu {
                stage: "rig-transcription-new",
                provider_id: config.provider_id.clone(),
            }
        );

        let model = model
            .map(|model| model.trim().to_string())
            .filter(|model| !model.is_empty())
            .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string());

        Ok(Self { config, model })
    }

    async fn request_transcription(&self, clip: AudioClip) -> CompletionResult<String> {
        let client = RigCompletionAdapter::build_client(&self.config)?;
        let model = client.transcription_model(self.model.clone());

        let response = model
            .transcription_request()
            .data(clip.data)
            .filename(Some(clip.filename))
            .send()
            .await
            .context(TranscriptionFailedSnafu {
                stage: "send-transcription",
            })?;

        Ok(response.text.trim().to_string())
    }
}

impl TranscriptionProvider for RigTranscriptionAdapter {
    fn model(&self) -> &str {
        &self.model
    }

    fn transcribe<'a>(&'a self, clip: AudioClip) -> BoxFuture<'a, CompletionResult<String>> {
        Box::pin(async move {
            ensure!(
                !clip.data.is_empty(),
                EmptyAudioSnafu {
                    stage: "transcribe-validate-audio",
                }
            );

            tracing::debug!(model_id = %self.model, bytes = clip.data.len(), "requesting transcription");

            let result = match self.config.timeout {
                Some(timeout) => {
                    match tokio::time::timeout(timeout, self.request_transcription(clip)).await {
                        Ok(result) => result,
                        Err(_) => TimedOutSnafu {
                            stage: "transcribe-timeout",
                            model_id: self.model.clone(),
                            timeout_secs: timeout.as_secs(),
                        }
                        .fail(),
                    }
                }
                None => self.request_transcription(clip).await,
            };

            if let Err(error) = &result {
                tracing::warn!(model_id = %self.model, error = %error, "transcription failed");
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::CompletionError;

    #[test]
    fn transcription_requires_api_key() {
        let config = ProviderConfig::new("openai", "", "");
        assert!(matches!(
            RigTranscriptionAdapter::new(config, None),
            Err(CompletionError::MissingApiKey { .. })
        ));
    }

    #[test]
    fn transcription_defaults_to_whisper() {
        let config = ProviderConfig::new("openai", "sk-test", "");
        let adapter = RigTranscriptionAdapter::new(config, None).expect("adapter");
        assert_eq!(adapter.model(), DEFAULT_TRANSCRIPTION_MODEL);
    }

    #[tokio::test]
    async fn empty_audio_is_rejected_before_any_request() {
        let config = ProviderConfig::new("openai", "sk-test", "http://127.0.0.1:9");
        let adapter = RigTranscriptionAdapter::new(config, None).expect("adapter");
        let error = adapter
            .transcribe(AudioClip::wav(Vec::new()))
            .await
            .expect_err("empty audio");
        assert!(matches!(error, CompletionError::EmptyAudio { .. }));
    }
}
