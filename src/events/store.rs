use k8s_openapi::api::core::v1::Event;

use super::EventKey;

#[derive(Debug)]
pub(crate) enum StoreError {
    Lookup(anyhow::Error),
    Write(anyhow::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Lookup(err) => write!(f, "Failed to look up license event: {err:#}"),
            StoreError::Write(err) => write!(f, "Failed to write license event: {err:#}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Lookup(err) | StoreError::Write(err) => Some(err.as_ref()),
        }
    }
}

/// Where license events are persisted.
pub(crate) trait EventStore {
    /// The stored event for `key`. When several match, the last one listed wins.
    async fn find(&self, key: &EventKey) -> Result<Option<Event>, StoreError>;

    async fn create(&self, event: Event) -> Result<Event, StoreError>;

    async fn update(&self, event: Event) -> Result<Event, StoreError>;
}

#[cfg(test)]
pub(crate) mod memory {
    use std::sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    };

    use anyhow::anyhow;

    use super::*;

    /// An event store backed by a `Vec`, assigning names the way the API
    /// server does for `generateName`.
    #[derive(Debug, Default)]
    pub(crate) struct InMemoryEventStore {
        events: Mutex<Vec<Event>>,
        fail_lookups: AtomicBool,
        fail_writes: AtomicBool,
    }

    impl InMemoryEventStore {
        pub(crate) fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        pub(crate) fn insert(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }

        pub(crate) fn fail_lookups(&self, fail: bool) {
            self.fail_lookups.store(fail, Ordering::SeqCst);
        }

        pub(crate) fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }
    }

    impl EventStore for InMemoryEventStore {
        async fn find(&self, key: &EventKey) -> Result<Option<Event>, StoreError> {
            if self.fail_lookups.load(Ordering::SeqCst) {
                return Err(StoreError::Lookup(anyhow!("event store unavailable")));
            }

            Ok(self
                .events
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|event| EventKey::from_event(event).as_ref() == Some(key))
                .cloned())
        }

        async fn create(&self, mut event: Event) -> Result<Event, StoreError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Write(anyhow!("event store unavailable")));
            }

            let mut events = self.events.lock().unwrap();

            if event.metadata.name.is_none() {
                let prefix = event.metadata.generate_name.clone().unwrap_or_default();
                event.metadata.name = Some(format!("{prefix}{:05}", events.len()));
            }

            events.push(event.clone());

            Ok(event)
        }

        async fn update(&self, event: Event) -> Result<Event, StoreError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StoreError::Write(anyhow!("event store unavailable")));
            }

            let mut events = self.events.lock().unwrap();

            let Some(existing) = events
                .iter_mut()
                .find(|existing| existing.metadata.name == event.metadata.name)
            else {
                return Err(StoreError::Write(anyhow!(
                    "event {:?} not found",
                    event.metadata.name
                )));
            };

            *existing = event.clone();

            Ok(event)
        }
    }
}
