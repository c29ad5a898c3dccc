// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Domain Events
//
// In-memory event streaming over a tokio broadcast channel. Services publish
// after a write has been persisted; observers (see
// `application::enrollment_observer`) react asynchronously.
//
// Events are not durable: anything published while no subscriber is attached
// is dropped.

use crate::domain::events::{EnrollmentEvent, ForumEvent, PaymentEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Unified domain event type for the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Payment(PaymentEvent),
    Enrollment(EnrollmentEvent),
    Forum(ForumEvent),
}

#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many events can be buffered before lagging receivers drop old ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish_payment_event(&self, event: PaymentEvent) {
        self.publish(DomainEvent::Payment(event));
    }

    pub fn publish_enrollment_event(&self, event: EnrollmentEvent) {
        self.publish(DomainEvent::Enrollment(event));
    }

    pub fn publish_forum_event(&self, event: ForumEvent) {
        self.publish(DomainEvent::Forum(event));
    }

    fn publish(&self, event: DomainEvent) {
        debug!("Publishing event: {:?}", event);

        // send() only fails when nobody is subscribed
        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all domain events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to enrollment events only
    pub fn subscribe_enrollments(&self) -> EnrollmentEventReceiver {
        EnrollmentEventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all domain events
pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without waiting
    pub fn try_recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver that skips everything except enrollment events
pub struct EnrollmentEventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl EnrollmentEventReceiver {
    pub async fn recv(&mut self) -> Result<EnrollmentEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if let DomainEvent::Enrollment(enrollment_event) = event {
                return Ok(enrollment_event);
            }
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::course::CourseId;
    use crate::domain::enrollment::EnrollmentId;
    use crate::domain::payment::PaymentId;
    use crate::domain::user::UserId;
    use chrono::Utc;

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let payment_id = PaymentId::new();
        event_bus.publish_payment_event(PaymentEvent::PaymentCompleted {
            payment_id,
            user_id: UserId::new(),
            course_id: CourseId::new(),
            completed_at: Utc::now(),
        });

        match receiver.recv().await.unwrap() {
            DomainEvent::Payment(PaymentEvent::PaymentCompleted { payment_id: id, .. }) => {
                assert_eq!(id, payment_id);
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_enrollment_event_filtering() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe_enrollments();

        event_bus.publish_payment_event(PaymentEvent::PaymentFailed {
            payment_id: PaymentId::new(),
            reason: "declined".to_string(),
            failed_at: Utc::now(),
        });
        let enrollment_id = EnrollmentId::new();
        event_bus.publish_enrollment_event(EnrollmentEvent::EnrollmentCompleted {
            enrollment_id,
            user_id: UserId::new(),
            course_id: CourseId::new(),
            completed_at: Utc::now(),
        });

        match receiver.recv().await.unwrap() {
            EnrollmentEvent::EnrollmentCompleted { enrollment_id: id, .. } => assert_eq!(id, enrollment_id),
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();
        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus.publish_forum_event(ForumEvent::PollClosed {
            poll_id: crate::domain::poll::PollId::new(),
            closed_at: Utc::now(),
        });

        let _ = receiver1.recv().await.unwrap();
        let _ = receiver2.recv().await.unwrap();
        assert!(matches!(receiver1.try_recv(), Err(EventBusError::Empty)));
    }
}
