use std::{future::Future, time::Duration};

use {
    async_trait::async_trait,
    teloxide::{Bot, RequestError, prelude::*, types::ChatId},
    tracing::{info, warn},
};

use parley_common::{DeliveryChannel, RetryPolicy, text::truncate_at_char_boundary};

/// Telegram message size limit. Longer replies are truncated, not split.
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

/// Outbound message sender for tenant bots.
///
/// One shared HTTP client serves every tenant; a per-send [`Bot`] binds the
/// tenant's token to it. Sends are best-effort: transport and server errors
/// burn through the retry budget with exponential backoff, rate limits sleep
/// the channel-specified wait inside the same budget, and exhaustion yields
/// `false` rather than an error.
pub struct TelegramDelivery {
    client: reqwest::Client,
    api_url: reqwest::Url,
    retry: RetryPolicy,
}

impl TelegramDelivery {
    pub fn new(api_url: &str, timeout: Duration, retry: RetryPolicy) -> anyhow::Result<Self> {
        // Client timeout above Telegram's own processing window so slow
        // sends fail on the server's terms, not ours.
        let client = teloxide::net::default_reqwest_settings()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            api_url: reqwest::Url::parse(api_url)?,
            retry,
        })
    }

    fn bot_for(&self, bot_token: &str) -> Bot {
        Bot::with_client(bot_token, self.client.clone()).set_api_url(self.api_url.clone())
    }

    async fn send_with_retry<T, F, Fut>(&self, chat_id: i64, mut request: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RequestError>>,
    {
        let mut attempt = 1u32;
        loop {
            match request().await {
                Ok(value) => return Some(value),
                Err(err) => {
                    let rate_limit_wait = retry_after_duration(&err);
                    if rate_limit_wait.is_none() && !is_retryable(&err) {
                        warn!(chat_id, error = %err, "telegram send failed permanently");
                        return None;
                    }
                    if !self.retry.has_attempts_left(attempt) {
                        warn!(
                            chat_id,
                            attempt,
                            max_attempts = self.retry.max_attempts,
                            error = %err,
                            "telegram send failed, retry budget exhausted"
                        );
                        return None;
                    }
                    let wait = match rate_limit_wait {
                        Some(wait) => {
                            warn!(
                                chat_id,
                                attempt,
                                retry_after_secs = wait.as_secs(),
                                "telegram rate limited, honoring retry-after"
                            );
                            wait
                        },
                        None => {
                            warn!(chat_id, attempt, error = %err, "telegram send failed, backing off");
                            self.retry.delay_after(attempt)
                        },
                    };
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                },
            }
        }
    }
}

#[async_trait]
impl DeliveryChannel for TelegramDelivery {
    async fn send(&self, bot_token: &str, chat_id: i64, text: &str) -> bool {
        let bot = self.bot_for(bot_token);
        let chunk = truncate_at_char_boundary(text, TELEGRAM_MAX_MESSAGE_LEN);

        let delivered = self
            .send_with_retry(chat_id, || {
                let req = bot.send_message(ChatId(chat_id), chunk);
                async move { req.await }
            })
            .await
            .is_some();

        if delivered {
            info!(chat_id, text_len = chunk.len(), "telegram message delivered");
        }
        delivered
    }
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

/// Transport and server-side failures are worth another attempt; Telegram
/// API rejections (bad chat, blocked bot) are not.
fn is_retryable(error: &RequestError) -> bool {
    matches!(
        error,
        RequestError::Network(_) | RequestError::Io(_) | RequestError::InvalidJson { .. }
    )
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use {rstest::rstest, teloxide::ApiError};

    use super::*;

    fn delivery() -> TelegramDelivery {
        TelegramDelivery::new(
            "https://api.telegram.org",
            Duration::from_secs(1),
            RetryPolicy::new(3, Duration::ZERO),
        )
        .unwrap()
    }

    fn io_error() -> RequestError {
        RequestError::Io(std::io::Error::other("boom"))
    }

    #[tokio::test]
    async fn retry_budget_is_exactly_three_attempts() {
        let calls = AtomicU32::new(0);
        let result: Option<()> = delivery()
            .send_with_retry(42, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(io_error()) }
            })
            .await;
        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn transient_failure_then_success_recovers() {
        let calls = AtomicU32::new(0);
        let result = delivery()
            .send_with_retry(42, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n == 0 { Err(io_error()) } else { Ok(n) } }
            })
            .await;
        assert_eq!(result, Some(1));
    }

    #[tokio::test]
    async fn api_rejection_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Option<()> = delivery()
            .send_with_retry(42, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(RequestError::Api(ApiError::BotBlocked)) }
            })
            .await;
        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rate_limit_sleeps_then_continues_within_budget() {
        let calls = AtomicU32::new(0);
        let result = delivery()
            .send_with_retry(42, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(RequestError::RetryAfter(
                            teloxide::types::Seconds::from_seconds(0),
                        ))
                    } else {
                        Ok("sent")
                    }
                }
            })
            .await;
        assert_eq!(result, Some("sent"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn retry_after_duration_extracts_wait() {
        let err = RequestError::RetryAfter(teloxide::types::Seconds::from_seconds(42));
        assert_eq!(retry_after_duration(&err), Some(Duration::from_secs(42)));
    }

    #[test]
    fn retry_after_duration_ignores_other_errors() {
        assert_eq!(retry_after_duration(&io_error()), None);
    }

    #[rstest]
    #[case("short", "short")]
    #[case("☃☃☃", "☃☃☃")]
    fn short_messages_pass_through_untruncated(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(
            truncate_at_char_boundary(input, TELEGRAM_MAX_MESSAGE_LEN),
            expected
        );
    }

    #[test]
    fn oversized_message_is_cut_to_channel_limit() {
        let text = "a".repeat(TELEGRAM_MAX_MESSAGE_LEN + 100);
        let cut = truncate_at_char_boundary(&text, TELEGRAM_MAX_MESSAGE_LEN);
        assert_eq!(cut.len(), TELEGRAM_MAX_MESSAGE_LEN);
    }
}
