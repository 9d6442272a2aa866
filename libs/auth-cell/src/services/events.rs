use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::models::AuthStateChange;

const CHANNEL_CAPACITY: usize = 64;

/// Process-wide fan-out of sign-in and sign-out events.
#[derive(Clone)]
pub struct AuthStateHub {
    sender: Arc<broadcast::Sender<AuthStateChange>>,
}

impl Default for AuthStateHub {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthStateHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Returns the number of listeners that saw the event.
    pub fn publish(&self, change: AuthStateChange) -> usize {
        debug!("Auth state change: {:?}", change);
        self.sender.send(change).unwrap_or(0)
    }

    pub fn subscribe(&self) -> AuthSubscription {
        debug!("Auth state listener subscribed");
        AuthSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Live listener registration; dropping it unsubscribes.
pub struct AuthSubscription {
    receiver: broadcast::Receiver<AuthStateChange>,
}

impl AuthSubscription {
    /// Next change, or `None` once the hub is gone. Lagged events are skipped.
    pub async fn next(&mut self) -> Option<AuthStateChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Auth state listener lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        debug!("Auth state listener unsubscribed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_models::auth::Role;

    #[tokio::test]
    async fn subscribers_receive_changes_and_drop_unsubscribes() {
        let hub = AuthStateHub::new();
        let mut first = hub.subscribe();
        let second = hub.subscribe();
        assert_eq!(hub.listener_count(), 2);

        drop(second);
        assert_eq!(hub.listener_count(), 1);

        let delivered = hub.publish(AuthStateChange::SignedIn {
            user_id: "u-1".to_string(),
            email: "ana@example.com".to_string(),
            role: Role::Patient,
        });
        assert_eq!(delivered, 1);

        assert_eq!(
            first.next().await,
            Some(AuthStateChange::SignedIn {
                user_id: "u-1".to_string(),
                email: "ana@example.com".to_string(),
                role: Role::Patient,
            })
        );
    }

    #[test]
    fn publishing_without_listeners_is_harmless() {
        let hub = AuthStateHub::default();
        assert_eq!(
            hub.publish(AuthStateChange::SignedOut { user_id: "u-1".to_string() }),
            0
        );
    }
}
