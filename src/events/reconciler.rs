use chrono::{DateTime, Utc};
use k8s_openapi::{
    api::core::v1::{Event, EventSource},
    apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time},
};
use tracing::{debug, info, instrument};

use super::{EventKey, EventStore, PodReference, SOURCE_COMPONENT, StoreError, Validity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ReconcileOutcome {
    Created { name: Option<String> },
    Updated { name: Option<String>, count: i32 },
}

/// Keeps one Kubernetes Event per (pod, application, reason, expiration
/// date) and counts repeat observations on it.
///
/// Not safe for concurrent use against the same key; callers serialize
/// observations.
#[derive(Debug)]
pub(crate) struct EventReconciler<S> {
    store: S,
    pod: PodReference,
}

impl<S: EventStore> EventReconciler<S> {
    pub(crate) fn new(store: S, pod: PodReference) -> Self {
        Self { store, pod }
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    /// Record that the license was seen with `validity` at `now`.
    ///
    /// `now` becomes the first and last timestamp of a newly created event.
    #[instrument(level = "debug", skip(self, now), fields(pod = %self.pod))]
    pub(crate) async fn record_observation(
        &self,
        application: &str,
        validity: Validity,
        expiration: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome, StoreError> {
        let key = EventKey::new(&self.pod, application, validity, expiration);

        if let Some(mut event) = self.store.find(&key).await? {
            let count = event.count.unwrap_or(1).saturating_add(1);
            event.count = Some(count);

            debug!(
                name = event.metadata.name.as_deref(),
                count,
                "Incrementing existing license event"
            );

            let event = self.store.update(event).await?;

            return Ok(ReconcileOutcome::Updated {
                name: event.metadata.name,
                count,
            });
        }

        let event = self.new_event(&key, application, validity, expiration, now);
        let event = self.store.create(event).await?;

        info!(
            name = event.metadata.name.as_deref(),
            reason = %validity,
            "Created license event"
        );

        Ok(ReconcileOutcome::Created {
            name: event.metadata.name,
        })
    }

    fn new_event(
        &self,
        key: &EventKey,
        application: &str,
        validity: Validity,
        expiration: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Event {
        Event {
            metadata: ObjectMeta {
                generate_name: Some(format!("{}.", application.to_lowercase())),
                namespace: Some(self.pod.namespace.clone()),
                labels: Some(key.labels()),
                ..Default::default()
            },
            type_: Some(validity.event_type().to_owned()),
            reason: Some(validity.as_str().to_owned()),
            message: Some(validity.message(application, expiration)),
            involved_object: self.pod.object_reference(),
            first_timestamp: Some(Time(now)),
            last_timestamp: Some(Time(now)),
            source: Some(EventSource {
                component: Some(SOURCE_COMPONENT.to_owned()),
                ..Default::default()
            }),
            count: Some(1),
            ..Default::default()
        }
    }
}
