use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::LifecycleEvent;

/// Delivery seam for lifecycle events.
///
/// Called after the appointment write has committed. A delivery failure is
/// reported to the caller but never undoes the write.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &LifecycleEvent) -> Result<()>;
}

/// Writes events to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, event: &LifecycleEvent) -> Result<()> {
        info!(
            recipient = %event.recipient_user_id,
            appointment = %event.appointment_id,
            occurs_at = %event.occurs_at,
            "{}",
            event.kind
        );
        Ok(())
    }
}

/// Fans events out to in-process subscribers.
pub struct BroadcastNotifier {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn notify(&self, event: &LifecycleEvent) -> Result<()> {
        // No subscribers is not an error.
        match self.sender.send(event.clone()) {
            Ok(receivers) => debug!("{} delivered to {} subscribers", event.kind, receivers),
            Err(_) => debug!("{} dropped, no subscribers", event.kind),
        }
        Ok(())
    }
}

/// Persists events as rows of the `notifications` table.
pub struct SupabaseNotifier {
    supabase: SupabaseClient,
}

impl SupabaseNotifier {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }
}

#[async_trait]
impl Notifier for SupabaseNotifier {
    async fn notify(&self, event: &LifecycleEvent) -> Result<()> {
        let body = json!({
            "user_id": event.recipient_user_id,
            "kind": event.kind,
            "appointment_id": event.appointment_id,
            "occurs_at": event.occurs_at.to_rfc3339(),
            "created_at": event.emitted_at.to_rfc3339(),
            "is_read": false,
        });

        let _: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/notifications",
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .with_context(|| format!("Failed to store {} notification", event.kind))?;

        debug!("Notification {} stored for user {}", event.kind, event.recipient_user_id);
        Ok(())
    }
}
