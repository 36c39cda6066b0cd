use std::sync::Arc;

use parley_identity::{FirebaseConfig, FirebaseIdentity, IdentityProvider, StaticTokenSource};
use parley_llm::{CompletionProvider, TranscriptionProvider, create_provider, create_transcriber};
use parley_speech::{CpalWhisperRecognizer, SpeechRecognizer};
use parley_storage::{LatestMessagesQuery, MessageStore};

use crate::settings::{ChatSettings, SettingsStore};

/// Collaborators shared by every view, built once from settings.
#[derive(Clone)]
pub struct Services {
    pub identity: Arc<dyn IdentityProvider>,
    pub completion: Option<Arc<dyn CompletionProvider>>,
    pub speech: Arc<dyn SpeechRecognizer>,
    pub model_id: String,
    pub latest_query: LatestMessagesQuery,
    pub database_location: String,
}

/// Services plus the opened message store, handed to the chat view.
#[derive(Clone)]
pub struct ChatServices {
    pub store: Arc<dyn MessageStore>,
    pub completion: Option<Arc<dyn CompletionProvider>>,
    pub speech: Arc<dyn SpeechRecognizer>,
    pub identity: Arc<dyn IdentityProvider>,
    pub model_id: String,
    pub latest_query: LatestMessagesQuery,
}

impl Services {
    pub fn from_settings(settings: &ChatSettings, store: &SettingsStore) -> Self {
        let identity_config = FirebaseConfig::new(settings.firebase_api_key.clone())
            .with_session_path(store.session_path());
        let token_source = Arc::new(StaticTokenSource::new(settings.google_id_token()));
        let identity: Arc<dyn IdentityProvider> =
            Arc::new(FirebaseIdentity::with_token_source(identity_config, token_source));

        let completion = settings.to_provider_config().and_then(|config| {
            match create_provider(config, Some(settings.model.clone())) {
                Ok(provider) => Some(provider),
                Err(error) => {
                    tracing::error!(error = %error, "failed to initialize completion provider");
                    None
                }
            }
        });
        if completion.is_none() {
            tracing::warn!("no completion API key configured, sends will fail");
        }

        let transcriber: Option<Arc<dyn TranscriptionProvider>> =
            settings.to_provider_config().and_then(|config| {
                create_transcriber(config, Some(settings.transcription_model.clone()))
                    .map_err(|error| {
                        tracing::warn!(error = %error, "speech transcription unavailable");
                    })
                    .ok()
            });
        let speech: Arc<dyn SpeechRecognizer> = Arc::new(CpalWhisperRecognizer::new(
            transcriber,
            settings.speech_max_duration(),
        ));

        Self {
            identity,
            completion,
            speech,
            model_id: settings.model.clone(),
            latest_query: LatestMessagesQuery::new(settings.message_limit),
            database_location: settings.database_location(),
        }
    }

    pub fn with_store(&self, store: Arc<dyn MessageStore>) -> ChatServices {
        ChatServices {
            store,
            completion: self.completion.clone(),
            speech: self.speech.clone(),
            identity: self.identity.clone(),
            model_id: self.model_id.clone(),
            latest_query: self.latest_query,
        }
    }
}
