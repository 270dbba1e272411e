use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::config::GatewayConfig;
use super::constants::{MAX_FAILED_RESUMES, RECONNECT_JITTER_MAX};
use super::error::{GatewayError, GatewayResult};
use super::handler::{ConnectionHandler, GatewayCommand};
use super::state::{ConnectionState, GatewayState, LatencyGauge};
use super::transport::GatewayTransport;
use crate::domain::entities::{AuthToken, PresenceStatus};
use crate::domain::events::GatewayEvent;
use crate::domain::ports::GatewayEventSink;

const COMMAND_QUEUE_SIZE: usize = 16;

/// Handle to a running gateway session.
///
/// The session runs on its own task and reconnects on its own; this handle
/// observes its state and forwards outbound commands to it.
pub struct GatewayConnection {
    state_rx: watch::Receiver<ConnectionState>,
    shutdown_tx: watch::Sender<bool>,
    commands: mpsc::Sender<GatewayCommand>,
    latency: LatencyGauge,
    task: Mutex<Option<JoinHandle<()>>>,
    failure: Arc<Mutex<Option<GatewayError>>>,
}

impl GatewayConnection {
    /// Spawns the session task. Must be called inside a tokio runtime.
    #[must_use]
    pub fn start(
        transport: Box<dyn GatewayTransport>,
        token: AuthToken,
        config: GatewayConfig,
        sink: Arc<dyn GatewayEventSink>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let state_tx = Arc::new(state_tx);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_SIZE);
        let latency = LatencyGauge::new();
        let failure = Arc::new(Mutex::new(None));

        let handler = ConnectionHandler::new(
            transport,
            GatewayState::new(state_tx.clone(), latency.clone()),
            token,
            config.clone(),
            sink.clone(),
            command_rx,
            shutdown_rx,
        );
        let supervisor = Supervisor {
            handler,
            config,
            failure: failure.clone(),
        };

        let task_failure = failure.clone();
        let task = tokio::spawn(async move {
            let result = AssertUnwindSafe(supervisor.run()).catch_unwind().await;

            if let Err(panic_info) = result {
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    (*s).to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };

                error!(panic = %panic_msg, "Gateway task panicked");
                *task_failure.lock() = Some(GatewayError::transport(format!(
                    "gateway task panicked: {panic_msg}"
                )));
                sink.publish(GatewayEvent::Error {
                    message: format!("Gateway task panicked: {panic_msg}"),
                    recoverable: false,
                });
                state_tx.send_replace(ConnectionState::Disconnected);
            }
        });

        Self {
            state_rx,
            shutdown_tx,
            commands: command_tx,
            latency,
            task: Mutex::new(Some(task)),
            failure,
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state().is_connected()
    }

    /// Round trip of the last acknowledged heartbeat.
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        self.latency.get()
    }

    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// The error that ended the session, if it ended on its own.
    #[must_use]
    pub fn failure(&self) -> Option<GatewayError> {
        self.failure.lock().clone()
    }

    /// Waits until the session is `Connected`.
    ///
    /// # Errors
    ///
    /// Returns the terminal error if the session gives up before becoming
    /// ready, or `ShuttingDown` if it was stopped.
    pub async fn wait_ready(&self) -> GatewayResult<()> {
        let mut rx = self.state_rx.clone();
        loop {
            let state = *rx.borrow_and_update();
            match state {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::ShuttingDown => return Err(GatewayError::ShuttingDown),
                ConnectionState::Disconnected => {
                    if let Some(err) = self.failure() {
                        return Err(err);
                    }
                }
                _ => {}
            }
            if rx.changed().await.is_err() {
                return Err(self.failure().unwrap_or(GatewayError::ShuttingDown));
            }
        }
    }

    /// Sends a presence update over the live session.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` unless the session is `Connected`, or the
    /// transport error if the frame could not be written.
    pub async fn update_presence(
        &self,
        status: PresenceStatus,
        game: Option<String>,
    ) -> GatewayResult<()> {
        if !self.is_ready() {
            return Err(GatewayError::NotConnected);
        }
        let (reply, response) = oneshot::channel();
        self.commands
            .send(GatewayCommand::UpdatePresence {
                status,
                game,
                reply,
            })
            .await
            .map_err(|_| GatewayError::NotConnected)?;
        response.await.map_err(|_| GatewayError::NotConnected)?
    }

    /// Stops the session and waits for the task to finish. No reconnect
    /// happens afterwards.
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        let task = self.task.lock().take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            warn!(error = %e, "Gateway task ended abnormally");
        }
    }
}

impl Drop for GatewayConnection {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}

/// Reconnect policy around [`ConnectionHandler`].
struct Supervisor {
    handler: ConnectionHandler,
    config: GatewayConfig,
    failure: Arc<Mutex<Option<GatewayError>>>,
}

impl Supervisor {
    async fn run(mut self) {
        let mut attempt: u32 = 0;
        let mut failed_resumes: u32 = 0;
        let mut invalidations: u32 = 0;

        loop {
            let resuming = self.handler.session.can_resume();
            let result = self.handler.run_connection().await;

            if self.handler.reached_connected() {
                attempt = 0;
                failed_resumes = 0;
                invalidations = 0;
            }

            let err = match result {
                Ok(()) => break,
                Err(_) if self.handler.shutdown_requested() => break,
                Err(err) => err,
            };
            self.handler.close_transport().await;
            warn!(error = %err, "Gateway connection lost");

            let err = match err {
                GatewayError::SessionInvalidated { .. } => {
                    invalidations += 1;
                    if invalidations > self.config.max_session_invalidations {
                        GatewayError::InvalidationLimit {
                            attempts: invalidations,
                        }
                    } else {
                        err
                    }
                }
                other => other,
            };

            if err.is_fatal() {
                self.fail(err);
                return;
            }

            if !err.can_resume() {
                self.handler.session.clear();
                failed_resumes = 0;
            } else if resuming && !self.handler.reached_connected() {
                failed_resumes += 1;
                if failed_resumes >= MAX_FAILED_RESUMES {
                    info!(
                        failed_resumes,
                        "Resume keeps failing, falling back to identify"
                    );
                    self.handler.session.clear();
                    failed_resumes = 0;
                }
            }

            attempt += 1;
            if attempt > self.config.max_reconnect_attempts {
                error!(attempts = attempt, "Max reconnection attempts exceeded");
                self.fail(GatewayError::RetriesExhausted {
                    attempts: attempt,
                    last_error: err.to_string(),
                });
                return;
            }

            self.handler.publish(GatewayEvent::Disconnected {
                reason: err.to_string(),
                can_resume: self.handler.session.can_resume(),
            });
            self.handler
                .state
                .transition(ConnectionState::Reconnecting { attempt });
            self.handler
                .publish(GatewayEvent::Reconnecting { attempt });

            let delay = calculate_backoff_delay(
                attempt,
                self.config.reconnect_delay_base,
                self.config.reconnect_delay_max,
            );
            info!(
                attempt,
                delay_ms = delay.as_millis(),
                "Reconnecting to gateway"
            );
            if !self.handler.backoff(delay).await {
                break;
            }
        }

        self.handler.state.transition(ConnectionState::ShuttingDown);
        self.handler.close_transport().await;
        self.handler.session.clear();
        self.handler.state.transition(ConnectionState::Disconnected);
        self.handler.publish(GatewayEvent::Disconnected {
            reason: "logout".to_string(),
            can_resume: false,
        });
        info!("Gateway session stopped");
    }

    /// Ends the session for good; the error is kept for `wait_ready`.
    fn fail(&mut self, err: GatewayError) {
        error!(error = %err, "Gateway session failed");
        self.handler.session.clear();
        *self.failure.lock() = Some(err.clone());
        self.handler.publish(GatewayEvent::Error {
            message: err.to_string(),
            recoverable: false,
        });
        self.handler.publish(GatewayEvent::Disconnected {
            reason: err.to_string(),
            can_resume: false,
        });
        self.handler.state.transition(ConnectionState::Disconnected);
    }
}

/// `base * 2^(attempt - 1)`, capped at `max`, plus up to half a second of jitter.
fn calculate_backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let base_delay = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    let max_delay = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    let jitter_max = u64::try_from(RECONNECT_JITTER_MAX.as_millis()).unwrap_or(0);

    let exponent = attempt.saturating_sub(1).min(16);
    let exponential_delay = base_delay.saturating_mul(2_u64.saturating_pow(exponent));
    let capped_delay = exponential_delay.min(max_delay);

    Duration::from_millis(capped_delay.saturating_add(rand_jitter(jitter_max)))
}

fn rand_jitter(max: u64) -> u64 {
    use std::time::SystemTime;

    if max == 0 {
        return 0;
    }
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()))
        .unwrap_or(0);

    nanos % max
}
