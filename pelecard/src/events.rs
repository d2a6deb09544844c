//! Billing events and listeners.
//!
//! Every state change worth reacting to is a [`BillingEvent`]. Operations
//! that change billing state return the event instead of dispatching it, so
//! the caller decides when to hand it to an [`EventDispatcher`].

use std::fmt::{self, Debug};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::billing::Subscription;
use crate::response::Response;
use crate::token::CardDetails;

/// A billing state change.
#[derive(Debug, Clone, PartialEq)]
pub enum BillingEvent {
    /// The gateway approved a payment.
    PaymentSucceeded {
        /// Id of the paying owner, when known.
        owner_id: Option<String>,
        /// Gateway reply.
        response: Response,
    },
    /// The gateway declined a payment.
    PaymentFailed {
        /// Id of the paying owner, when known.
        owner_id: Option<String>,
        /// Gateway reply.
        response: Response,
    },
    /// A card token became the owner's default payment method.
    CardSaved {
        /// Id of the card owner.
        owner_id: String,
        /// Gateway card token.
        token: String,
        /// Card details reported with the token.
        card: CardDetails,
    },
    /// A subscription was created.
    SubscriptionCreated {
        /// The new subscription.
        subscription: Subscription,
    },
    /// A subscription changed plan, quantity or cancellation state.
    SubscriptionUpdated {
        /// The subscription after the change.
        subscription: Subscription,
        /// Plan before a swap.
        previous_plan: Option<String>,
    },
    /// A subscription was cancelled.
    SubscriptionCancelled {
        /// The subscription after cancellation.
        subscription: Subscription,
    },
}

impl BillingEvent {
    /// Dotted event name, e.g. `payment.succeeded`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PaymentSucceeded { .. } => "payment.succeeded",
            Self::PaymentFailed { .. } => "payment.failed",
            Self::CardSaved { .. } => "card.saved",
            Self::SubscriptionCreated { .. } => "subscription.created",
            Self::SubscriptionUpdated { .. } => "subscription.updated",
            Self::SubscriptionCancelled { .. } => "subscription.cancelled",
        }
    }
}

impl fmt::Display for BillingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives billing events.
///
/// The default implementation ignores every event. This trait is
/// dyn-compatible for use in listener lists.
pub trait EventListener: Send + Sync {
    /// Called once per dispatched event.
    fn on_event<'a>(
        &'a self,
        _event: &'a BillingEvent,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async {})
    }
}

/// Fans events out to registered listeners, in registration order.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    listeners: Vec<Arc<dyn EventListener>>,
}

impl Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl EventDispatcher {
    /// Creates a dispatcher without listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn EventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Registers a listener in place.
    pub fn listen(&mut self, listener: Arc<dyn EventListener>) {
        self.listeners.push(listener);
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Delivers `event` to every listener.
    pub async fn dispatch(&self, event: &BillingEvent) {
        #[cfg(feature = "telemetry")]
        tracing::debug!(event = event.name(), listeners = self.listeners.len(), "pelecard.event.dispatch");
        for listener in &self.listeners {
            listener.on_event(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<&'static str>>,
    }

    impl EventListener for Recorder {
        fn on_event<'a>(
            &'a self,
            event: &'a BillingEvent,
        ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
            Box::pin(async move {
                self.seen.lock().await.push(event.name());
            })
        }
    }

    struct Silent;

    impl EventListener for Silent {}

    fn succeeded() -> BillingEvent {
        BillingEvent::PaymentSucceeded {
            owner_id: Some("42".to_owned()),
            response: Response::new(Map::new(), 200),
        }
    }

    #[tokio::test]
    async fn test_dispatch_reaches_all_listeners() {
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        let first_listener: Arc<dyn EventListener> = Arc::<Recorder>::clone(&first);
        let second_listener: Arc<dyn EventListener> = Arc::<Recorder>::clone(&second);
        let dispatcher = EventDispatcher::new()
            .with_listener(first_listener)
            .with_listener(Arc::new(Silent))
            .with_listener(second_listener);
        assert_eq!(dispatcher.len(), 3);

        dispatcher.dispatch(&succeeded()).await;
        assert_eq!(*first.seen.lock().await, vec!["payment.succeeded"]);
        assert_eq!(*second.seen.lock().await, vec!["payment.succeeded"]);
    }

    #[tokio::test]
    async fn test_empty_dispatcher() {
        let dispatcher = EventDispatcher::new();
        assert!(dispatcher.is_empty());
        dispatcher.dispatch(&succeeded()).await;
    }

    #[test]
    fn test_event_names() {
        assert_eq!(succeeded().to_string(), "payment.succeeded");
        let failed = BillingEvent::PaymentFailed {
            owner_id: None,
            response: Response::new(Map::new(), 402),
        };
        assert_eq!(failed.name(), "payment.failed");
    }
}
