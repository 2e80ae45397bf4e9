//! Long-polling loop that feeds messages to per-request tasks.

pub mod handler;

pub use handler::{Handler, Route};

use std::sync::Arc;
use std::time::Duration;

use circlecast_core::config::BotConfig;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::pipeline::ConversionPipeline;
use crate::telegram::{Messenger, TelegramClient};

/// The running bot: one poller plus one task per message.
pub struct Bot {
    client: Arc<TelegramClient>,
    handler: Arc<Handler>,
    poll_timeout: Duration,
    poll_backoff: Duration,
    shutdown_grace: Duration,
}

impl Bot {
    pub fn new(config: &BotConfig, client: TelegramClient, pipeline: ConversionPipeline) -> Self {
        let client = Arc::new(client);
        let messenger: Arc<dyn Messenger> = client.clone();
        let handler = Arc::new(Handler::new(Arc::new(pipeline), messenger));

        Self {
            client,
            handler,
            poll_timeout: config.poll_timeout(),
            poll_backoff: config.poll_backoff(),
            shutdown_grace: config.shutdown_grace(),
        }
    }

    /// Poll until `shutdown` is cancelled, then wait for in-flight requests.
    ///
    /// # Errors
    ///
    /// Fails only if the startup identity check (`getMe`) fails, which
    /// usually means the token is wrong.
    pub async fn run(self, shutdown: CancellationToken) -> circlecast_core::Result<()> {
        let me = self.client.get_me().await?;
        tracing::info!(
            "Bot started as @{} (id {})",
            me.username.as_deref().unwrap_or(&me.first_name),
            me.id
        );

        let tracker = TaskTracker::new();
        let mut offset: Option<i64> = None;

        loop {
            let polled = tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,
                polled = self.client.get_updates(offset, self.poll_timeout) => polled,
            };

            let updates = match polled {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!("getUpdates failed: {e}; retrying in {:?}", self.poll_backoff);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_backoff) => continue,
                    }
                }
            };

            for update in updates {
                offset = Some(update.update_id + 1);
                let Some(message) = update.message else {
                    continue;
                };
                let handler = self.handler.clone();
                tracker.spawn(async move {
                    handler.handle_message(message).await;
                });
            }
        }

        tracker.close();
        if !tracker.is_empty() {
            tracing::info!(
                "Waiting up to {:?} for {} in-flight request(s)",
                self.shutdown_grace,
                tracker.len()
            );
        }
        if tokio::time::timeout(self.shutdown_grace, tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                "Abandoning {} in-flight request(s) after shutdown grace period",
                tracker.len()
            );
        }

        tracing::info!("Bot stopped");
        Ok(())
    }
}
