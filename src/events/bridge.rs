// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Change-feed bridge: translates Firestore's native change notifications
//! into the bus's own event vocabulary.
//!
//! Only active when the Firestore backend is selected. Started once at
//! process initialization; its only job is translation, so the bus's
//! fan-out logic stays backend-agnostic.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use firestore::{
    FirestoreDb, FirestoreListenEvent, FirestoreListener, FirestoreListenerTarget,
    FirestoreTempFilesListenStateStorage,
};

use crate::events::{EventBus, LiveEvent};
use crate::models::{DriverProfile, Ride};
use crate::store::collections;

const RIDES_TARGET: u32 = 1;
const DRIVERS_TARGET: u32 = 2;

/// Owns the Firestore listener feeding the event bus.
pub struct ChangeFeedBridge {
    listener: FirestoreListener<FirestoreDb, FirestoreTempFilesListenStateStorage>,
}

impl ChangeFeedBridge {
    /// Subscribe to the rides and driver-profiles collections and start
    /// re-emitting their changes onto the bus.
    pub async fn start(db: &FirestoreDb, bus: EventBus) -> anyhow::Result<Self> {
        let mut listener = db
            .create_listener(FirestoreTempFilesListenStateStorage::new())
            .await?;

        db.fluent()
            .select()
            .from(collections::RIDES)
            .listen()
            .add_target(FirestoreListenerTarget::new(RIDES_TARGET), &mut listener)?;

        db.fluent()
            .select()
            .from(collections::DRIVER_PROFILES)
            .listen()
            .add_target(FirestoreListenerTarget::new(DRIVERS_TARGET), &mut listener)?;

        // Firestore reports both creations and modifications as document
        // changes; first sight of an id is an add, later sights updates.
        let seen: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));

        listener
            .start(move |event| {
                let bus = bus.clone();
                let seen = seen.clone();
                async move {
                    match event {
                        FirestoreListenEvent::DocumentChange(ref change) => {
                            if let Some(doc) = &change.document {
                                handle_change(&bus, &seen, &doc.name, doc);
                            }
                        }
                        FirestoreListenEvent::DocumentDelete(ref deleted) => {
                            handle_delete(&bus, &seen, &deleted.document);
                        }
                        _ => {}
                    }
                    Ok(())
                }
            })
            .await?;

        tracing::info!("Change-feed bridge started");
        Ok(Self { listener })
    }

    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        self.listener.shutdown().await?;
        Ok(())
    }
}

/// Split a document path `.../documents/<collection>/<id>`.
fn collection_and_id(path: &str) -> Option<(&str, &str)> {
    let mut parts = path.rsplit('/');
    let id = parts.next()?;
    let collection = parts.next()?;
    Some((collection, id))
}

fn first_sight(seen: &Mutex<HashSet<String>>, path: &str) -> bool {
    match seen.lock() {
        Ok(mut seen) => seen.insert(path.to_string()),
        Err(_) => false,
    }
}

fn handle_change(
    bus: &EventBus,
    seen: &Mutex<HashSet<String>>,
    path: &str,
    doc: &firestore::FirestoreDocument,
) {
    let Some((collection, _id)) = collection_and_id(path) else {
        return;
    };
    let added = first_sight(seen, path);

    match collection {
        collections::RIDES => match FirestoreDb::deserialize_doc_to::<Ride>(doc) {
            Ok(ride) => {
                let event = if added {
                    LiveEvent::RideAdded { ride }
                } else {
                    LiveEvent::RideUpdated { ride }
                };
                bus.publish(event);
            }
            Err(e) => tracing::warn!(path, error = %e, "Ignoring undecodable ride change"),
        },
        collections::DRIVER_PROFILES => {
            match FirestoreDb::deserialize_doc_to::<DriverProfile>(doc) {
                Ok(profile) => {
                    let event = if added {
                        LiveEvent::DriverAdded { profile }
                    } else {
                        LiveEvent::DriverUpdated { profile }
                    };
                    bus.publish(event);
                }
                Err(e) => tracing::warn!(path, error = %e, "Ignoring undecodable driver change"),
            }
        }
        _ => {}
    }
}

fn handle_delete(bus: &EventBus, seen: &Mutex<HashSet<String>>, path: &str) {
    if let Ok(mut seen) = seen.lock() {
        seen.remove(path);
    }
    let Some((collection, id)) = collection_and_id(path) else {
        return;
    };
    match collection {
        collections::RIDES => {
            bus.publish(LiveEvent::RideRemoved {
                ride_id: id.to_string(),
            });
        }
        collections::DRIVER_PROFILES => {
            bus.publish(LiveEvent::DriverRemoved {
                user_id: id.to_string(),
            });
        }
        _ => {}
    }
}
