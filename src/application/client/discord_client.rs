use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::config::ClientConfig;
use crate::application::cache::StateCache;
use crate::application::dispatcher::EventDispatcher;
use crate::application::sink::SessionEventSink;
use crate::domain::entities::{
    AccountChanges, AuthToken, Channel, ChannelId, Guild, GuildId, Message, MessageId, Presence,
    PresenceStatus, PrivateChannel, User, UserId,
};
use crate::domain::errors::{ClientError, ClientResult};
use crate::infrastructure::discord::gateway::GatewayTransport;
use crate::infrastructure::discord::rest::GATEWAY_BUCKET;
use crate::infrastructure::discord::{
    ConnectionState, GatewayConnection, HttpTransport, ReqwestTransport, RestExecutor,
    WebSocketTransport,
};

/// Produces a fresh streaming transport for each login.
pub type GatewayTransportFactory = Box<dyn Fn() -> Box<dyn GatewayTransport> + Send + Sync>;

/// Session facade: one authenticated account, its live gateway session, the
/// mirrored state and the command API.
///
/// Reads are served from the cache and never block on the network. Commands
/// go through the rate-limited REST executor and commit their results to the
/// cache before returning.
pub struct DiscordClient {
    token: AuthToken,
    config: ClientConfig,
    cache: Arc<StateCache>,
    dispatcher: Arc<EventDispatcher>,
    rest: Arc<RestExecutor>,
    gateway: RwLock<Option<Arc<GatewayConnection>>>,
    gateway_transport: GatewayTransportFactory,
    login_lock: AsyncMutex<()>,
    pm_lock: AsyncMutex<()>,
}

impl DiscordClient {
    /// Client over the real network transports.
    ///
    /// # Errors
    ///
    /// Returns `TransportFailure` if the HTTP client cannot be created.
    pub fn new(token: AuthToken, config: ClientConfig) -> ClientResult<Self> {
        Self::builder(token).config(config).build()
    }

    #[must_use]
    pub fn builder(token: AuthToken) -> ClientBuilder {
        ClientBuilder::new(token)
    }

    /// Connects and waits until the session is ready.
    ///
    /// # Errors
    ///
    /// `AlreadyLoggedIn` while a session is live, `AuthenticationFailure` if
    /// the token is rejected, `TransportFailure` if no session could be
    /// established within the retry budget or the login timeout.
    pub async fn login(&self) -> ClientResult<()> {
        let gateway = self.start_session().await?;

        let ready = match timeout(self.config.login_timeout, gateway.wait_ready()).await {
            Ok(result) => result.map_err(ClientError::from),
            Err(_) => Err(ClientError::transport(format!(
                "session not ready after {}s",
                self.config.login_timeout.as_secs()
            ))),
        };

        if let Err(e) = ready {
            warn!(error = %e, "Login failed");
            gateway.shutdown().await;

            // A logout may have replaced or cleared the session meanwhile.
            let _guard = self.login_lock.lock().await;
            let mut current = self.gateway.write();
            if current.as_ref().is_some_and(|g| Arc::ptr_eq(g, &gateway)) {
                current.take();
                self.rest.close();
            }
            return Err(e);
        }

        if let Some(user) = self.cache.our_user() {
            info!(user = %user.tag(), guilds = self.cache.guild_count(), "Logged in");
        }
        Ok(())
    }

    /// Spawns the gateway session and publishes it, so that `logout` can
    /// cancel it while `login` is still waiting for READY.
    async fn start_session(&self) -> ClientResult<Arc<GatewayConnection>> {
        let _guard = self.login_lock.lock().await;

        let previous = self.gateway.read().clone();
        if let Some(previous) = previous {
            if previous.failure().is_none() {
                return Err(ClientError::AlreadyLoggedIn);
            }
            debug!("Replacing failed gateway session");
            previous.shutdown().await;
        }

        info!(token = %self.token.masked(), "Logging in");
        self.rest.open();

        let mut gateway_config = self.config.gateway.clone();
        if self.config.discover_gateway_url {
            match self.rest.gateway_url().await {
                Ok(url) => gateway_config.url = url,
                Err(e) => {
                    warn!(error = %e, url = %gateway_config.url, "Gateway discovery failed, using configured URL");
                }
            }
        }

        let sink = Arc::new(SessionEventSink::new(
            self.cache.clone(),
            self.dispatcher.clone(),
        ));
        let gateway = Arc::new(GatewayConnection::start(
            (self.gateway_transport)(),
            self.token.clone(),
            gateway_config,
            sink,
        ));
        *self.gateway.write() = Some(gateway.clone());
        Ok(gateway)
    }

    /// Ends the session, including one still being established by `login`.
    /// New commands fail with `NotConnected` afterwards; commands already
    /// running complete.
    pub async fn logout(&self) {
        let gateway = {
            let _guard = self.login_lock.lock().await;
            self.rest.close();
            self.gateway.write().take()
        };
        if let Some(gateway) = gateway {
            gateway.shutdown().await;
        }
        self.cache.clear();
        info!("Logged out");
    }

    #[must_use]
    pub const fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    #[must_use]
    pub const fn token(&self) -> &AuthToken {
        &self.token
    }

    fn gateway(&self) -> Option<Arc<GatewayConnection>> {
        self.gateway.read().clone()
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.gateway()
            .map_or(ConnectionState::Disconnected, |g| g.state())
    }

    /// Whether the session is currently `Connected`.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.gateway().is_some_and(|g| g.is_ready())
    }

    /// Round trip of the last acknowledged heartbeat.
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        self.gateway().and_then(|g| g.latency())
    }

    fn our_id(&self) -> ClientResult<UserId> {
        self.cache
            .our_user()
            .map(|user| user.id())
            .ok_or(ClientError::NotConnected)
    }

    /// # Errors
    ///
    /// Propagates the REST failure classification.
    pub async fn send_message(
        &self,
        channel_id: ChannelId,
        content: &str,
        tts: bool,
    ) -> ClientResult<Message> {
        let (message, _author) = self.rest.create_message(channel_id, content, tts).await?;
        debug!(channel = %channel_id, message = %message.id(), "Message sent");
        Ok(message)
    }

    /// # Errors
    ///
    /// Propagates the REST failure classification.
    pub async fn edit_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: &str,
    ) -> ClientResult<Message> {
        let (message, _author) = self
            .rest
            .edit_message(channel_id, message_id, content)
            .await?;
        Ok(message)
    }

    /// # Errors
    ///
    /// Propagates the REST failure classification.
    pub async fn delete_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> ClientResult<()> {
        self.rest.delete_message(channel_id, message_id).await?;
        Ok(())
    }

    /// Changes username, email, password or avatar. Fields left empty stay
    /// unchanged; with nothing to change no request is made.
    ///
    /// # Errors
    ///
    /// `NotConnected` before login, otherwise the REST failure classification.
    pub async fn change_account_info(&self, changes: &AccountChanges) -> ClientResult<User> {
        if changes.is_empty() {
            debug!("No account changes requested");
            return self.cache.our_user().ok_or(ClientError::NotConnected);
        }
        let user = self.rest.modify_current_user(changes).await?;
        info!(%changes, "Account updated");
        self.cache.set_our_user(user.clone());
        Ok(user)
    }

    /// Fetches our account from the API and replaces the cached copy.
    ///
    /// # Errors
    ///
    /// `NotConnected` before login, otherwise the REST failure classification.
    pub async fn refresh_our_user(&self) -> ClientResult<User> {
        let user = self.rest.current_user().await?;
        self.cache.set_our_user(user.clone());
        Ok(user)
    }

    /// Sets our status and game over the live session.
    ///
    /// # Errors
    ///
    /// `NotConnected` unless the session is ready.
    pub async fn update_presence(
        &self,
        status: PresenceStatus,
        game: Option<String>,
    ) -> ClientResult<()> {
        let gateway = self.gateway().ok_or(ClientError::NotConnected)?;
        let our_id = self.our_id()?;

        let permit = self.rest.limiter().acquire(GATEWAY_BUCKET).await;
        gateway.update_presence(status, game.clone()).await?;
        drop(permit);

        self.cache.set_presence(our_id, Presence::new(status, game));
        Ok(())
    }

    #[must_use]
    pub fn our_user(&self) -> Option<User> {
        self.cache.our_user()
    }

    #[must_use]
    pub fn channel_by_id(&self, channel_id: ChannelId) -> Option<Channel> {
        self.cache.channel(channel_id)
    }

    #[must_use]
    pub fn guild_by_id(&self, guild_id: GuildId) -> Option<Guild> {
        self.cache.guild(guild_id)
    }

    /// Guilds in the order they were received.
    #[must_use]
    pub fn guilds(&self) -> Vec<Guild> {
        self.cache.guilds()
    }

    /// Looks a user up by id, the only unique key a user has.
    #[must_use]
    pub fn user_by_id(&self, user_id: UserId) -> Option<User> {
        self.cache.user(user_id)
    }

    #[must_use]
    pub fn private_channels(&self) -> Vec<PrivateChannel> {
        self.cache.private_channels()
    }

    #[must_use]
    pub fn presence(&self, user_id: UserId) -> Option<Presence> {
        self.cache.presence(user_id)
    }

    /// Returns the DM channel with a user, opening one if none is known.
    ///
    /// Concurrent calls for the same user open at most one channel.
    ///
    /// # Errors
    ///
    /// Propagates the REST failure classification.
    pub async fn get_or_create_pm_channel(&self, user_id: UserId) -> ClientResult<PrivateChannel> {
        if let Some(channel) = self.cache.private_channel_with(user_id) {
            return Ok(channel);
        }

        let _guard = self.pm_lock.lock().await;
        if let Some(channel) = self.cache.private_channel_with(user_id) {
            return Ok(channel);
        }

        let (channel, recipient) = self.rest.create_private_channel(user_id).await?;
        debug!(channel = %channel.id(), recipient = %user_id, "Opened private channel");
        self.cache.upsert_private_channel(&channel, &recipient);
        Ok(channel)
    }

    /// Shows our typing indicator in a channel, refreshing it if shown.
    ///
    /// # Errors
    ///
    /// `NotConnected` before login, otherwise the REST failure classification.
    pub async fn trigger_typing(&self, channel_id: ChannelId) -> ClientResult<()> {
        let our_id = self.our_id()?;
        self.rest.trigger_typing(channel_id).await?;
        self.cache.start_typing(channel_id, our_id, Utc::now());
        Ok(())
    }

    /// Flips our typing indicator in a channel and returns the new status.
    ///
    /// The service has no stop command, so stopping only drops the local
    /// indicator; remote clients let it expire.
    ///
    /// # Errors
    ///
    /// `NotConnected` before login, otherwise the REST failure classification.
    pub async fn toggle_typing_status(&self, channel_id: ChannelId) -> ClientResult<bool> {
        let our_id = self.our_id()?;
        if self.cache.is_typing(channel_id, our_id) {
            self.cache.stop_typing(channel_id, our_id);
            return Ok(false);
        }
        self.trigger_typing(channel_id).await?;
        Ok(true)
    }

    /// Whether our typing indicator is live in a channel.
    #[must_use]
    pub fn typing_status(&self, channel_id: ChannelId) -> bool {
        self.cache
            .our_user()
            .is_some_and(|me| self.cache.is_typing(channel_id, me.id()))
    }
}

/// Builder for [`DiscordClient`] that allows swapping the transports.
pub struct ClientBuilder {
    token: AuthToken,
    config: ClientConfig,
    http: Option<Arc<dyn HttpTransport>>,
    gateway_transport: Option<GatewayTransportFactory>,
}

impl ClientBuilder {
    #[must_use]
    pub fn new(token: AuthToken) -> Self {
        Self {
            token,
            config: ClientConfig::default(),
            http: None,
            gateway_transport: None,
        }
    }

    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn http_transport(mut self, http: Arc<dyn HttpTransport>) -> Self {
        self.http = Some(http);
        self
    }

    #[must_use]
    pub fn gateway_transport<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn GatewayTransport> + Send + Sync + 'static,
    {
        self.gateway_transport = Some(Box::new(factory));
        self
    }

    /// # Errors
    ///
    /// Returns `TransportFailure` if the default HTTP client cannot be created.
    pub fn build(self) -> ClientResult<DiscordClient> {
        let http: Arc<dyn HttpTransport> = match self.http {
            Some(http) => http,
            None => Arc::new(ReqwestTransport::new(
                self.token.clone(),
                self.config.rest.base_url.clone(),
                self.config.rest.request_timeout,
            )?),
        };
        let gateway_transport = self
            .gateway_transport
            .unwrap_or_else(|| Box::new(|| Box::new(WebSocketTransport::new())));

        let rest = RestExecutor::new(http, self.config.rest.clone());
        rest.close();

        Ok(DiscordClient {
            cache: Arc::new(StateCache::with_typing_timeout(self.config.typing_timeout)),
            dispatcher: Arc::new(EventDispatcher::new()),
            rest: Arc::new(rest),
            gateway: RwLock::new(None),
            gateway_transport,
            login_lock: AsyncMutex::new(()),
            pm_lock: AsyncMutex::new(()),
            token: self.token,
            config: self.config,
        })
    }
}
