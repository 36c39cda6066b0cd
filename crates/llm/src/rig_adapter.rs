use rig::completion::{CompletionModel, Message as RigMessage};
use rig::message::AssistantContent;
use rig::prelude::CompletionClient;
use rig::providers::openai;
use snafu::{ResultExt, ensure};

use super::provider::{
    BoxFuture, CompletionProvider, CompletionRequest, CompletionResult,
    CompletionsFailedSnafu, DEFAULT_COMPLETION_MODEL, EmptyPromptSnafu, HttpClientSnafu,
    MissingApiKeySnafu, ProviderConfig, TimedOutSnafu,
};

pub const RIG_OPENAI_PROVIDER_ID: &str = "openai";

pub struct RigCompletionAdapter {
    config: ProviderConfig,
    default_model: String,
}

impl RigCompletionAdapter {
    pub fn new(config: ProviderConfig, default_model: Option<String>) -> CompletionResult<Self> {
        ensure!(
            !config.api_key.is_empty(),
            MissingApiKeySnafu {
                stage: "rig-adapter-new",
                provider_id: config.provider_id.clone(),
            }
        );

        let default_model = default_model
            .map(|model| model.trim().to_string())
            .filter(|model| !model.is_empty())
            .unwrap_or_else(|| DEFAULT_COMPLETION_MODEL.to_string());

        Ok(Self {
            config,
            default_model,
        })
    }

    pub(crate) fn build_client(config: &ProviderConfig) -> CompletionResult<openai::Client> {
        let mut builder = openai::Client::builder().api_key(config.api_key.as_str());
        if !config.base_url.is_empty() {
            builder = builder.base_url(config.base_url.as_str());
        }
        builder.build().context(HttpClientSnafu {
            stage: "build-client",
        })
    }

    async fn request_completion(
        config: &ProviderConfig,
        request: &CompletionRequest,
    ) -> CompletionResult<Option<String>> {
        // Chat completions, not the Responses API: compatible servers only
        // implement the former.
        let client = Self::build_client(config)?.completions_api();
        let model = client.completion_model(request.model_id.clone());

        let response = model
            .completion_request(RigMessage::user(request.prompt.clone()))
            .send()
            .await
            .context(CompletionsFailedSnafu {
                stage: "send-completion",
            })?;

        Ok(collect_text(response.choice.iter()))
    }
}

/// Joins every text part of an assistant answer; tool calls and reasoning are ignored.
fn collect_text<'a>(contents: impl IntoIterator<Item = &'a AssistantContent>) -> Option<String> {
    let text = contents
        .into_iter()
        .filter_map(|content| match content {
            AssistantContent::Text(text) => Some(text.text.as_str()),
            _ => None,
        })
        .collect::<String>();

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

impl CompletionProvider for RigCompletionAdapter {
    fn id(&self) -> &str {
        &self.config.provider_id
    }

    fn name(&self) -> &str {
        "Rig OpenAI"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn complete<'a>(
        &'a self,
        request: CompletionRequest,
    ) -> BoxFuture<'a, CompletionResult<Option<String>>> {
        Box::pin(async move {
            ensure!(
                !request.prompt.trim().is_empty(),
                EmptyPromptSnafu {
                    stage: "complete-validate-prompt",
                }
            );

            tracing::debug!(
                provider_id = %self.config.provider_id,
                model_id = %request.model_id,
                prompt_chars = request.prompt.chars().count(),
                "requesting completion"
            );

            let result = match self.config.timeout {
                Some(timeout) => {
                    match tokio::time::timeout(
                        timeout,
                        Self::request_completion(&self.config, &request),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => TimedOutSnafu {
                            stage: "complete-timeout",
                            model_id: request.model_id.clone(),
                            timeout_secs: timeout.as_secs(),
                        }
                        .fail(),
                    }
                }
                None => Self::request_completion(&self.config, &request).await,
            };

            match &result {
                Ok(Some(text)) => tracing::debug!(
                    model_id = %request.model_id,
                    response_chars = text.chars().count(),
                    "completion returned text"
                ),
                Ok(None) => tracing::info!(
                    model_id = %request.model_id,
                    "completion returned no text"
                ),
                Err(error) => tracing::warn!(
                    model_id = %request.model_id,
                    error = %error,
                    "completion failed"
                ),
            }

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    use super::*;
    use crate::provider::CompletionError;

    const CHAT_COMPLETION_BODY: &str = r#"{"id":"chatcmpl-1","object":"chat.completion","created":0,"model":"gpt-3.5-turbo","choices":[{"index":0,"message":{"role":"assistant","content":"hi there"},"finish_reason":"stop"}],"usage":{"prompt_tokens":1,"completion_tokens":2,"total_tokens":3}}"#;

    async fn read_head(socket: &mut tokio::net::TcpStream) -> String {
        let mut received = Vec::new();
        let mut buffer = [0_u8; 1024];
        while !received.windows(4).any(|window| window == b"\r\n\r\n") {
            let read = socket.read(&mut buffer).await.expect("read request");
            if read == 0 {
                break;
            }
            received.extend_from_slice(&buffer[..read]);
        }
        String::from_utf8_lossy(&received).into_owned()
    }

    fn adapter_for(address: std::net::SocketAddr, timeout: Option<Duration>) -> RigCompletionAdapter {
        let config = ProviderConfig::new("openai", "sk-test", format!("http://{address}/v1"))
            .with_timeout(timeout);
        RigCompletionAdapter::new(config, None).expect("adapter should build")
    }

    #[test]
    fn collects_only_text_parts() {
        let contents = vec![
            AssistantContent::text("hi "),
            AssistantContent::text("there"),
        ];
        assert_eq!(collect_text(&contents), Some("hi there".to_string()));
    }

    #[test]
    fn blank_answer_counts_as_no_text() {
        let contents = vec![AssistantContent::text("  \n")];
        assert_eq!(collect_text(&contents), None);
        assert_eq!(collect_text(&Vec::<AssistantContent>::new()), None);
    }

    #[test]
    fn adapter_requires_api_key() {
        let config = ProviderConfig::new("openai", "  ", "");
        assert!(matches!(
            RigCompletionAdapter::new(config, None),
            Err(CompletionError::MissingApiKey { .. })
        ));
    }

    #[test]
    fn adapter_falls_back_to_default_model() {
        let config = ProviderConfig::new("openai", "sk-test", "");
        let adapter = RigCompletionAdapter::new(config, Some("   ".to_string()))
            .expect("adapter with key should build");
        assert_eq!(adapter.default_model(), DEFAULT_COMPLETION_MODEL);
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected_before_any_request() {
        let config = ProviderConfig::new("openai", "sk-test", "http://127.0.0.1:9");
        let adapter = RigCompletionAdapter::new(config, None).expect("adapter should build");
        let result = adapter
            .complete(CompletionRequest::new(DEFAULT_COMPLETION_MODEL, "   "))
            .await;
        assert!(matches!(result, Err(CompletionError::EmptyPrompt { .. })));
    }

    #[tokio::test]
    async fn completion_posts_to_chat_completions_endpoint() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        let (line_tx, line_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let head = read_head(&mut socket).await;
            let request_line = head.lines().next().unwrap_or_default().to_string();
            let _ = line_tx.send(request_line);

            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                CHAT_COMPLETION_BODY.len(),
                CHAT_COMPLETION_BODY
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });

        let adapter = adapter_for(address, Some(Duration::from_secs(10)));
        let _ = adapter
            .complete(CompletionRequest::new(DEFAULT_COMPLETION_MODEL, "hello"))
            .await;

        let request_line = line_rx.await.expect("server saw a request");
        assert!(
            request_line.starts_with("POST /v1/chat/completions "),
            "unexpected request line: {request_line}"
        );
    }

    #[tokio::test]
    async fn silent_endpoint_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let _ = read_head(&mut socket).await;
            // Hold the connection open without answering.
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let adapter = adapter_for(address, Some(Duration::from_secs(1)));
        let started = std::time::Instant::now();
        let result = adapter
            .complete(CompletionRequest::new(DEFAULT_COMPLETION_MODEL, "hello"))
            .await;

        assert!(matches!(
            result,
            Err(CompletionError::TimedOut { timeout_secs: 1, .. })
        ));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
