//! `generateContent` client over reqwest.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{classify_failure, AnalysisClient, AnalysisRequest, SILENT_SENTINEL};
use crate::config::ClientConfig;
use crate::errors::AnalysisError;

const USER_AGENT: &str = concat!("promptforge/", env!("CARGO_PKG_VERSION"));
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestPart<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

fn build_body<'a>(request: &'a AnalysisRequest, prompt: &'a str) -> GenerateContentRequest<'a> {
    let mut parts: Vec<RequestPart<'a>> = request
        .media
        .stills()
        .iter()
        .map(|still| RequestPart {
            inline_data: Some(InlineData {
                mime_type: &still.mime_type,
                data: &still.data,
            }),
            text: None,
        })
        .collect();
    parts.push(RequestPart {
        inline_data: None,
        text: Some(prompt),
    });

    GenerateContentRequest {
        contents: vec![RequestContent { parts }],
    }
}

/// Extracts "STATUS: message" from an error body, or returns the raw body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.status.is_empty() => {
            format!("{}: {}", envelope.error.status, envelope.error.message)
        }
        Ok(envelope) => envelope.error.message,
        Err(_) => body.to_string(),
    }
}

/// [`AnalysisClient`] for the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http_client: reqwest::Client,
    config: ClientConfig,
}

impl GeminiClient {
    /// Creates a client from configuration.
    pub fn new(config: ClientConfig) -> Result<Self, AnalysisError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .build()
            .map_err(|e| AnalysisError::transport(e.to_string()))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{model}:generateContent",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl AnalysisClient for GeminiClient {
    async fn analyze(&self, request: AnalysisRequest) -> Result<String, AnalysisError> {
        let model = self.config.model_for(request.tier);
        let prompt = request.prompt();
        let body = build_body(&request, &prompt);

        debug!(
            stage = %request.stage_id,
            model,
            parts = request.media.len() + 1,
            "Sending generateContent request"
        );

        let response = self
            .http_client
            .post(self.endpoint(model))
            .header(API_KEY_HEADER, request.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_failure(e.status().map(|s| s.as_u16()), &e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = classify_failure(Some(status.as_u16()), &error_message(&text));
            warn!(stage = %request.stage_id, status = status.as_u16(), error = %err, "Request failed");
            return Err(err);
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::malformed(e.to_string()))?;

        let text = parsed.text();
        if text.trim().is_empty() {
            debug!(stage = %request.stage_id, "Empty response, returning sentinel");
            return Ok(SILENT_SENTINEL.to_string());
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiKey;
    use crate::core::ModelTier;
    use crate::errors::FailureKind;
    use crate::media::{EncodedStill, MediaPayload};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn request(media: MediaPayload) -> AnalysisRequest {
        AnalysisRequest {
            stage_id: "analyst".to_string(),
            media: Arc::new(media),
            instructions: "ROLE: TEST".to_string(),
            context: "Audit the media.".to_string(),
            tier: ModelTier::Fast,
            api_key: ApiKey::new("test-key"),
        }
    }

    #[test]
    fn test_body_puts_media_before_text() {
        let media = MediaPayload::Frames(vec![
            EncodedStill::jpeg(b"a"),
            EncodedStill::jpeg(b"b"),
            EncodedStill::jpeg(b"c"),
        ]);
        let req = request(media);
        let body = serde_json::to_value(build_body(&req, "prompt text")).unwrap();

        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], EncodedStill::jpeg(b"a").data);
        assert!(parts[0].get("text").is_none());
        assert_eq!(parts[3]["text"], "prompt text");
    }

    #[test]
    fn test_response_text_concatenates_parts() {
        let parsed: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"foo "},{"text":"bar"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.text(), "foo bar");

        let empty: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.text(), "");
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(error_message(body), "RESOURCE_EXHAUSTED: Quota exceeded");
        assert_eq!(error_message("plain failure"), "plain failure");
    }

    /// Serves one canned HTTP response and hands back the raw request.
    async fn serve_once(status_line: &str, body: &str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(split) = text.find("\r\n\r\n") {
                    let length = text[..split]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if raw.len() >= split + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&raw).to_string()
        });

        (format!("http://{addr}"), handle)
    }

    fn client_for(base_url: String) -> GeminiClient {
        GeminiClient::new(ClientConfig::default().with_base_url(base_url)).unwrap()
    }

    #[tokio::test]
    async fn test_success_round_trip() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"candidates":[{"content":{"parts":[{"text":"dense descriptors"}]}}]}"#,
        )
        .await;

        let text = client_for(url)
            .analyze(request(MediaPayload::Image(EncodedStill::jpeg(b"x"))))
            .await
            .unwrap();
        assert_eq!(text, "dense descriptors");

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /models/gemini-3-flash-preview:generateContent"));
        assert!(raw.to_ascii_lowercase().contains("x-goog-api-key: test-key"));
    }

    #[tokio::test]
    async fn test_empty_text_returns_sentinel() {
        let (url, _server) = serve_once("200 OK", r#"{"candidates":[]}"#).await;
        let text = client_for(url)
            .analyze(request(MediaPayload::Image(EncodedStill::jpeg(b"x"))))
            .await
            .unwrap();
        assert_eq!(text, SILENT_SENTINEL);
    }

    #[tokio::test]
    async fn test_rate_limit_status_is_transient() {
        let (url, _server) = serve_once(
            "429 Too Many Requests",
            r#"{"error":{"code":429,"message":"slow down","status":"RESOURCE_EXHAUSTED"}}"#,
        )
        .await;
        let err = client_for(url)
            .analyze(request(MediaPayload::Image(EncodedStill::jpeg(b"x"))))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_not_found_is_credential_invalid() {
        let (url, _server) = serve_once(
            "404 Not Found",
            r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND"}}"#,
        )
        .await;
        let err = client_for(url)
            .analyze(request(MediaPayload::Image(EncodedStill::jpeg(b"x"))))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::CredentialInvalid);
    }

    #[tokio::test]
    async fn test_reasoning_tier_uses_reasoning_model() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"candidates":[{"content":{"parts":[{"text":"ok"}]}}]}"#,
        )
        .await;
        let mut req = request(MediaPayload::Image(EncodedStill::jpeg(b"x")));
        req.tier = ModelTier::Reasoning;

        client_for(url).analyze(req).await.unwrap();
        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /models/gemini-3-pro-preview:generateContent"));
    }
}
