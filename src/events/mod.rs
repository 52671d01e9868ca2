//! License status as Kubernetes Events.
//!
//! Each check is reported against the enforcer's own pod. Repeat
//! observations of the same outcome for the same expiration date bump the
//! `count` of a single Event instead of creating a new one.

mod kubernetes;
mod reconciler;
mod record;
mod store;

pub(crate) use kubernetes::KubernetesEventStore;
pub(crate) use reconciler::{EventReconciler, ReconcileOutcome};
pub(crate) use record::{EventKey, PodReference, SOURCE_COMPONENT, Validity};
pub(crate) use store::{EventStore, StoreError};

#[cfg(test)]
pub(crate) use store::memory::InMemoryEventStore;
