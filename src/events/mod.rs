// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live event bus: volatile fan-out of state-change notifications to
//! every connected live client.
//!
//! No persistence, no replay, no per-client cursor. A client that
//! connects receives no backlog; a client that disconnects is pruned
//! and receives nothing. Reconnecting clients re-fetch current state
//! through the backing store.

pub mod bridge;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::{DriverProfile, Ride, Role};

/// Event vocabulary carried by the bus and the live WebSocket channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    RideAdded {
        ride: Ride,
    },
    RideUpdated {
        ride: Ride,
    },
    RideRemoved {
        ride_id: String,
    },
    DriverAdded {
        profile: DriverProfile,
    },
    DriverUpdated {
        profile: DriverProfile,
    },
    DriverRemoved {
        user_id: String,
    },
    /// Raw position sample relayed verbatim between clients watching a
    /// ride; never persisted.
    LocationUpdate {
        ride_id: String,
        sender_role: Role,
        lat: f64,
        lng: f64,
    },
}

/// Default channel capacity. A client lagging behind this many events is
/// dropped rather than slowing everyone else down.
const DEFAULT_CAPACITY: usize = 256;

/// Fan-out broadcaster over a tokio broadcast channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LiveEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to every current subscriber.
    ///
    /// Returns the number of subscribers the event was delivered to.
    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, event: LiveEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to all future events (no backlog).
    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.tx.subscribe()
    }

    /// Number of currently connected subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LocationPoint, RideStatus, VehicleType};

    fn make_ride(id: &str) -> Ride {
        Ride {
            id: id.to_string(),
            rider_id: "rider-1".to_string(),
            driver_id: None,
            pickup: LocationPoint {
                address: "A".to_string(),
                lat: 0.0,
                lng: 0.0,
            },
            dropoff: LocationPoint {
                address: "B".to_string(),
                lat: 1.0,
                lng: 1.0,
            },
            vehicle_type: VehicleType::EBike,
            status: RideStatus::Pending,
            estimated_fare: 50.0,
            actual_fare: None,
            distance_km: 2.0,
            co2_saved_kg: 0.4,
            eco_points: 4,
            requested_at: crate::time_utils::now_rfc3339(),
            accepted_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
        }
    }

    #[tokio::test]
    async fn test_fanout_reaches_every_subscriber_exactly_once() {
        let bus = EventBus::default();
        let mut receivers: Vec<_> = (0..5).map(|_| bus.subscribe()).collect();

        let delivered = bus.publish(LiveEvent::RideAdded {
            ride: make_ride("ride-1"),
        });
        assert_eq!(delivered, 5);

        for rx in &mut receivers {
            match rx.recv().await.unwrap() {
                LiveEvent::RideAdded { ride } => assert_eq!(ride.id, "ride-1"),
                other => panic!("unexpected event: {:?}", other),
            }
            // Exactly one event: nothing else queued.
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_no_backlog() {
        let bus = EventBus::default();
        let mut early = bus.subscribe();

        bus.publish(LiveEvent::RideRemoved {
            ride_id: "ride-1".to_string(),
        });

        let mut late = bus.subscribe();
        bus.publish(LiveEvent::RideRemoved {
            ride_id: "ride-2".to_string(),
        });

        // Early receiver sees both; late receiver only the second.
        assert!(matches!(
            early.recv().await.unwrap(),
            LiveEvent::RideRemoved { ride_id } if ride_id == "ride-1"
        ));
        assert!(matches!(
            late.recv().await.unwrap(),
            LiveEvent::RideRemoved { ride_id } if ride_id == "ride-2"
        ));
        assert!(late.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let bus = EventBus::default();
        let rx = bus.subscribe();
        assert_eq!(bus.receiver_count(), 1);

        drop(rx);
        let delivered = bus.publish(LiveEvent::DriverRemoved {
            user_id: "driver-1".to_string(),
        });
        assert_eq!(delivered, 0);
        assert_eq!(bus.receiver_count(), 0);
    }

    #[test]
    fn test_event_wire_format() {
        let event = LiveEvent::LocationUpdate {
            ride_id: "ride-1".to_string(),
            sender_role: Role::Driver,
            lat: 28.61,
            lng: 77.2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "location_update");
        assert_eq!(json["sender_role"], "driver");
    }
}
