use std::sync::Arc;

mod provider;
mod rig_adapter;
mod rig_transcription;

pub use provider::{
    AudioClip, BoxFuture, CompletionError, CompletionProvider, CompletionRequest,
    CompletionResult, DEFAULT_COMPLETION_MODEL, DEFAULT_ENDPOINT, DEFAULT_TRANSCRIPTION_MODEL,
    ProviderConfig, TranscriptionProvider,
};
pub use rig_adapter::{RIG_OPENAI_PROVIDER_ID, RigCompletionAdapter};
pub use rig_transcription::RigTranscriptionAdapter;

pub fn create_provider(
    mut config: ProviderConfig,
    default_model: Option<String>,
) -> CompletionResult<Arc<dyn CompletionProvider>> {
    if config.provider_id.trim().is_empty() {
        config.provider_id = RIG_OPENAI_PROVIDER_ID.to_string();
    }

    match config.provider_id.as_str() {
        "openai" | "rig-openai" => {
            config.provider_id = RIG_OPENAI_PROVIDER_ID.to_string();
            Ok(Arc::new(RigCompletionAdapter::new(config, default_model)?))
        }
        _ => Err(CompletionError::UnsupportedProvider {
            stage: "create-provider",
            provider_id: config.provider_id,
        }),
    }
}

pub fn create_transcriber(
    mut config: ProviderConfig,
    model: Option<String>,
) -> CompletionResult<Arc<dyn TranscriptionProvider>> {
    if config.provider_id.trim().is_empty() {
        config.provider_id = RIG_OPENAI_PROVIDER_ID.to_string();
    }

    match config.provider_id.as_str() {
        "openai" | "rig-openai" => {
            config.provider_id = RIG_OPENAI_PROVIDER_ID.to_string();
            Ok(Arc::new(RigTranscriptionAdapter::new(config, model)?))
        }
        _ => Err(CompletionError::UnsupportedProvider {
            stage: "create-transcriber",
            provider_id: config.provider_id,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_is_rejected() {
        let config = ProviderConfig::new("anthropic", "key", "");
        assert!(matches!(
            create_provider(config, None),
            Err(CompletionError::UnsupportedProvider { .. })
        ));
    }

    #[test]
    fn blank_provider_id_resolves_to_openai() {
        let config = ProviderConfig::new("", "key", "");
        let provider = create_provider(config, None).expect("openai provider should build");
        assert_eq!(provider.id(), RIG_OPENAI_PROVIDER_ID);
    }
}
