use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::error::{RestError, RestResult};
use super::rate_limit::RateLimiter;
use super::routes::{GATEWAY_BUCKET, Route};
use super::transport::{HttpRequest, HttpResponse, HttpTransport, ResponseClass};
use crate::domain::entities::{
    AccountChanges, ChannelId, Message, MessageId, PrivateChannel, User, UserId,
};
use crate::infrastructure::discord::dto::{
    ChannelDto, ChannelObject, CreateMessageBody, CreatePrivateChannelBody, EditMessageBody,
    GatewayUrlResponse, MessageDto, ModifyCurrentUserBody, UserDto,
};
use crate::infrastructure::discord::gateway::{GATEWAY_COMMAND_WINDOW, GATEWAY_COMMANDS_PER_WINDOW};

/// REST call settings.
#[derive(Debug, Clone)]
pub struct RestConfig {
    pub base_url: String,
    /// Upper bound for a single attempt.
    pub request_timeout: Duration,
    /// Extra attempts after 429 responses before giving up.
    pub max_throttle_retries: u32,
    /// Extra attempts after 5xx, network failures and timeouts.
    pub max_server_retries: u32,
    pub retry_delay_base: Duration,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: super::transport::DISCORD_API_BASE.to_string(),
            request_timeout: Duration::from_secs(30),
            max_throttle_retries: 3,
            max_server_retries: 3,
            retry_delay_base: Duration::from_millis(500),
        }
    }
}

impl RestConfig {
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_retries(mut self, throttle: u32, server: u32) -> Self {
        self.max_throttle_retries = throttle;
        self.max_server_retries = server;
        self
    }
}

/// Issues commands through the rate limiter, retrying what can be retried.
pub struct RestExecutor {
    transport: Arc<dyn HttpTransport>,
    limiter: Arc<RateLimiter>,
    config: RestConfig,
    closed: AtomicBool,
}

impl RestExecutor {
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>, config: RestConfig) -> Self {
        let limiter = RateLimiter::new().with_fixed_bucket(
            GATEWAY_BUCKET,
            GATEWAY_COMMANDS_PER_WINDOW,
            GATEWAY_COMMAND_WINDOW,
        );
        Self {
            transport,
            limiter: Arc::new(limiter),
            config,
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub const fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Rejects new calls; calls already running finish normally.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn open(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn retry_delay(&self, failures: u32) -> Duration {
        self.config
            .retry_delay_base
            .saturating_mul(2_u32.saturating_pow(failures.saturating_sub(1).min(10)))
    }

    /// Runs one routed call to completion.
    ///
    /// # Errors
    ///
    /// `Rejected` for 4xx, `Throttled` or `Unavailable` once the retry budgets
    /// are spent, `Closed` after [`close`](Self::close).
    pub async fn execute(&self, route: Route, body: Option<Value>) -> RestResult<HttpResponse> {
        if self.is_closed() {
            return Err(RestError::Closed);
        }

        let request = HttpRequest {
            method: route.method(),
            path: route.path(),
            body,
        };
        let mut permit = self.limiter.acquire(&route.bucket_key()).await;
        let mut throttles: u32 = 0;
        let mut failures: u32 = 0;

        loop {
            let outcome = timeout(self.config.request_timeout, self.transport.execute(&request))
                .await
                .unwrap_or(Err(RestError::Timeout));

            let failure = match outcome {
                Ok(response) => {
                    permit.update(&response.quota);
                    match response.classify() {
                        ResponseClass::Success => {
                            debug!(route = %route, status = response.status, "Request succeeded");
                            return Ok(response);
                        }
                        ResponseClass::ClientError => {
                            let message = response.error_message();
                            warn!(route = %route, status = response.status, %message, "Request rejected");
                            return Err(RestError::rejected(response.status, message));
                        }
                        ResponseClass::Throttled {
                            retry_after,
                            global,
                        } => {
                            throttles += 1;
                            permit.throttled(retry_after, global);
                            if throttles > self.config.max_throttle_retries {
                                return Err(RestError::Throttled {
                                    attempts: throttles,
                                    retry_after_ms: u64::try_from(retry_after.as_millis())
                                        .unwrap_or(u64::MAX),
                                });
                            }
                            permit.wait_ready().await;
                            continue;
                        }
                        ResponseClass::ServerError => {
                            RestError::server(response.status, response.error_message())
                        }
                    }
                }
                Err(e) if e.is_retryable() => e,
                Err(e) => return Err(e),
            };

            failures += 1;
            if failures > self.config.max_server_retries {
                warn!(route = %route, attempts = failures, error = %failure, "Giving up on request");
                return Err(RestError::Unavailable {
                    attempts: failures,
                    last_error: failure.to_string(),
                });
            }
            let delay = self.retry_delay(failures);
            debug!(route = %route, attempt = failures, delay_ms = delay.as_millis(), error = %failure, "Retrying request");
            sleep(delay).await;
            permit.wait_ready().await;
        }
    }

    fn body<T: Serialize>(body: &T) -> RestResult<Option<Value>> {
        serde_json::to_value(body)
            .map(Some)
            .map_err(|e| RestError::request(e.to_string()))
    }

    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn create_message(
        &self,
        channel_id: ChannelId,
        content: &str,
        tts: bool,
    ) -> RestResult<(Message, User)> {
        let body = Self::body(&CreateMessageBody { content, tts })?;
        let response = self
            .execute(Route::CreateMessage { channel_id }, body)
            .await?;
        Ok(response.decode::<MessageDto>()?.into_parts())
    }

    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn edit_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: &str,
    ) -> RestResult<(Message, User)> {
        let body = Self::body(&EditMessageBody { content })?;
        let response = self
            .execute(
                Route::EditMessage {
                    channel_id,
                    message_id,
                },
                body,
            )
            .await?;
        Ok(response.decode::<MessageDto>()?.into_parts())
    }

    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn delete_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> RestResult<()> {
        self.execute(
            Route::DeleteMessage {
                channel_id,
                message_id,
            },
            None,
        )
        .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn current_user(&self) -> RestResult<User> {
        let response = self.execute(Route::GetCurrentUser, None).await?;
        Ok(response.decode::<UserDto>()?.into())
    }

    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn modify_current_user(&self, changes: &AccountChanges) -> RestResult<User> {
        let body = Self::body(&ModifyCurrentUserBody {
            username: changes.new_username(),
            email: changes.new_email(),
            password: changes.current_password(),
            avatar: changes.new_avatar(),
        })?;
        let response = self.execute(Route::ModifyCurrentUser, body).await?;
        Ok(response.decode::<UserDto>()?.into())
    }

    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn trigger_typing(&self, channel_id: ChannelId) -> RestResult<()> {
        self.execute(Route::TriggerTyping { channel_id }, None)
            .await?;
        Ok(())
    }

    /// Opens (or returns the existing) DM channel with a user.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute); `Decode` if the reply is not a DM.
    pub async fn create_private_channel(
        &self,
        recipient_id: UserId,
    ) -> RestResult<(PrivateChannel, User)> {
        let body = Self::body(&CreatePrivateChannelBody {
            recipient_id: recipient_id.to_string(),
        })?;
        let response = self.execute(Route::CreatePrivateChannel, body).await?;
        match response.decode::<ChannelDto>()?.into_object(None) {
            ChannelObject::Private(channel, recipient) => Ok((channel, recipient)),
            _ => Err(RestError::decode("expected a direct message channel")),
        }
    }

    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn gateway_url(&self) -> RestResult<String> {
        let response = self.execute(Route::GetGateway, None).await?;
        Ok(response.decode::<GatewayUrlResponse>()?.url)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::time::Instant;

    use super::super::transport::mock::{ScriptedHttp, ok, status, throttled};
    use super::super::transport::{HttpResponse, MockHttpTransport, QuotaMetadata};
    use super::*;

    fn executor(http: &ScriptedHttp) -> RestExecutor {
        RestExecutor::new(Arc::new(http.clone()), RestConfig::default())
    }

    fn message_json(id: u64, content: &str) -> Value {
        json!({
            "id": id.to_string(),
            "channel_id": "10",
            "author": {"id": "1", "username": "me", "discriminator": "0001"},
            "content": content,
            "timestamp": "2024-01-01T00:00:00+00:00",
            "edited_timestamp": null
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_message_decodes_reply() {
        let http = ScriptedHttp::new([ok(message_json(99, "hello"))]);
        let rest = executor(&http);

        let (message, author) = rest
            .create_message(ChannelId(10), "hello", false)
            .await
            .unwrap();

        assert_eq!(message.id(), MessageId(99));
        assert_eq!(message.content(), "hello");
        assert_eq!(author.username(), "me");

        let calls = http.calls();
        assert_eq!(calls[0].path, "/channels/10/messages");
        assert_eq!(calls[0].body, Some(json!({"content": "hello", "tts": false})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_error_is_not_retried() {
        let mut transport = MockHttpTransport::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::json(403, &json!({"message": "Missing Access"}))));
        let rest = RestExecutor::new(Arc::new(transport), RestConfig::default());

        let err = rest
            .delete_message(ChannelId(1), MessageId(2))
            .await
            .unwrap_err();
        assert_eq!(err, RestError::rejected(403, "Missing Access"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_delays_retry_by_retry_after() {
        let http = ScriptedHttp::new([throttled(2.0, false), ok(message_json(1, "hi"))]);
        let rest = executor(&http);

        rest.create_message(ChannelId(10), "hi", false)
            .await
            .unwrap();

        let times = http.call_times();
        assert_eq!(times.len(), 2);
        assert!(times[1] - times[0] >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_delays_next_call_on_same_route() {
        let http = ScriptedHttp::new([
            Ok(HttpResponse::new(204, "")
                .with_quota(QuotaMetadata::window(5, 0, Duration::from_secs(2)))),
            Ok(HttpResponse::new(204, "")),
        ]);
        let rest = executor(&http);

        rest.trigger_typing(ChannelId(3)).await.unwrap();
        let start = Instant::now();
        rest.trigger_typing(ChannelId(3)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_budget_exhausted() {
        let http = ScriptedHttp::new([
            throttled(1.0, false),
            throttled(1.0, false),
            throttled(1.0, false),
        ]);
        let rest = RestExecutor::new(
            Arc::new(http.clone()),
            RestConfig::default().with_retries(2, 3),
        );

        let err = rest.trigger_typing(ChannelId(3)).await.unwrap_err();
        assert_eq!(
            err,
            RestError::Throttled {
                attempts: 3,
                retry_after_ms: 1000
            }
        );
        assert_eq!(http.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_retried_then_surfaced() {
        let http = ScriptedHttp::new([
            status(502, "Bad Gateway"),
            Err(RestError::network("connection reset")),
            status(503, "Service Unavailable"),
        ]);
        let rest = RestExecutor::new(
            Arc::new(http.clone()),
            RestConfig::default().with_retries(3, 2),
        );

        let err = rest.trigger_typing(ChannelId(3)).await.unwrap_err();
        assert!(matches!(err, RestError::Unavailable { attempts: 3, .. }));

        let times = http.call_times();
        assert_eq!(times.len(), 3);
        assert!(times[1] - times[0] >= Duration::from_millis(500));
        assert!(times[2] - times[1] >= Duration::from_millis(1000));
    }

    /// Transport whose calls never complete.
    #[derive(Default)]
    struct StalledHttp {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl HttpTransport for StalledHttp {
        async fn execute(&self, _request: &HttpRequest) -> RestResult<HttpResponse> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_attempts_time_out_then_surface_unavailable() {
        let http = Arc::new(StalledHttp::default());
        let rest = RestExecutor::new(
            http.clone(),
            RestConfig::default()
                .with_request_timeout(Duration::from_secs(5))
                .with_retries(3, 2),
        );
        let start = Instant::now();

        let err = rest.trigger_typing(ChannelId(3)).await.unwrap_err();

        assert_eq!(
            err,
            RestError::Unavailable {
                attempts: 3,
                last_error: RestError::Timeout.to_string()
            }
        );
        assert_eq!(http.attempts.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_recovers() {
        let http = ScriptedHttp::new([status(500, "oops"), ok(json!({"url": "wss://gw.test"}))]);
        let rest = executor(&http);

        assert_eq!(rest.gateway_url().await.unwrap(), "wss://gw.test");
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_executor_fails_fast() {
        let http = ScriptedHttp::default();
        let rest = executor(&http);
        rest.close();

        assert_eq!(
            rest.trigger_typing(ChannelId(1)).await,
            Err(RestError::Closed)
        );
        assert!(http.calls().is_empty());

        rest.open();
        assert!(rest.trigger_typing(ChannelId(1)).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_modify_current_user_sends_only_changed_fields() {
        let http = ScriptedHttp::new([ok(
            json!({"id": "1", "username": "ferris", "discriminator": "0001"}),
        )]);
        let rest = executor(&http);

        let user = rest
            .modify_current_user(&AccountChanges::new().username("ferris").email(""))
            .await
            .unwrap();

        assert_eq!(user.username(), "ferris");
        assert_eq!(http.calls()[0].body, Some(json!({"username": "ferris"})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_private_channel() {
        let http = ScriptedHttp::new([ok(json!({
            "id": "77",
            "type": 1,
            "recipients": [{"id": "9", "username": "bob", "discriminator": "0"}]
        }))]);
        let rest = executor(&http);

        let (channel, recipient) = rest.create_private_channel(UserId(9)).await.unwrap();
        assert_eq!(channel.id(), ChannelId(77));
        assert_eq!(recipient.id(), UserId(9));
        assert_eq!(http.calls()[0].body, Some(json!({"recipient_id": "9"})));
    }
}
