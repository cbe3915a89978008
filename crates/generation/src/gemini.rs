//! Gemini REST backend (`generateContent` + `countTokens`).

use std::time::Duration;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use {async_trait::async_trait, reqwest::Client};

use crate::backend::{CompletionBackend, GenerationError};

/// How much of an error body to keep in logs and error values.
const ERROR_BODY_MAX: usize = 512;

pub struct GeminiBackend {
    client: Client,
    base_url: String,
    model: String,
    api_key: Secret<String>,
}

impl GeminiBackend {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Secret<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/v1beta/models/{}:{action}", self.base_url, self.model)
    }

    async fn post(
        &self,
        action: &str,
        request: &GenerateRequest<'_>,
    ) -> Result<reqwest::Response, GenerationError> {
        let response = self
            .client
            .post(self.endpoint(action))
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(ERROR_BODY_MAX);
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl CompletionBackend for GeminiBackend {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let request = GenerateRequest::single(prompt);
        let response = self.post("generateContent", &request).await?;
        let body: GenerateResponse = response.json().await?;

        let text = body
            .candidates
            .into_iter()
            .next()
            .map(|c| c.text())
            .unwrap_or_default();

        debug!(model = %self.model, reply_len = text.len(), "completion received");
        Ok(text)
    }

    async fn count_tokens(&self, text: &str) -> Result<i64, GenerationError> {
        let request = GenerateRequest::single(text);
        let response = self.post("countTokens", &request).await?;
        let body: CountTokensResponse = response.json().await?;
        if body.total_tokens < 0 {
            return Err(GenerationError::Malformed(format!(
                "negative totalTokens: {}",
                body.total_tokens
            )));
        }
        Ok(body.total_tokens)
    }
}

// ── Wire types ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

impl<'a> GenerateRequest<'a> {
    fn single(text: &'a str) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part { text }],
            }],
        }
    }
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

impl Candidate {
    fn text(self) -> String {
        self.content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountTokensResponse {
    total_tokens: i64,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn backend(url: &str) -> GeminiBackend {
        GeminiBackend::new(
            url,
            "gemini-1.5-flash",
            Secret::new("test-key".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn complete_parses_first_candidate() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .with_status(200)
            .with_body(
                r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"there."}]}}]}"#,
            )
            .create_async()
            .await;

        let reply = backend(&server.url()).complete("hi").await.unwrap();
        assert_eq!(reply, "Hello there.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn complete_with_no_candidates_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
            .with_status(200)
            .with_body(r#"{}"#)
            .create_async()
            .await;

        let reply = backend(&server.url()).complete("hi").await.unwrap();
        assert_eq!(reply, "");
    }

    #[tokio::test]
    async fn server_error_surfaces_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/v1beta/models/gemini-1.5-flash:generateContent")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let err = backend(&server.url()).complete("hi").await.unwrap_err();
        match err {
            GenerationError::Api { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "overloaded");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn count_tokens_parses_total() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/v1beta/models/gemini-1.5-flash:countTokens")
            .with_status(200)
            .with_body(r#"{"totalTokens":42}"#)
            .create_async()
            .await;

        let total = backend(&server.url()).count_tokens("text").await.unwrap();
        assert_eq!(total, 42);
    }
}
