use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use k8s_openapi::api::core::v1::{Event, ObjectReference};

pub(crate) const APPLICATION_LABEL: &str = "replicated.com/application";
pub(crate) const EXPIRES_AT_LABEL: &str = "replicated.com/expires-at";
pub(crate) const SOURCE_COMPONENT: &str = "replicated";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Outcome of comparing a verified expiration date to the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Validity {
    Valid,
    Expired,
}

impl Validity {
    /// A license expiring exactly at `now` is still valid.
    pub(crate) fn at(expiration: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if expiration < now {
            Validity::Expired
        } else {
            Validity::Valid
        }
    }

    /// Event `reason`.
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Validity::Valid => "Valid",
            Validity::Expired => "Expired",
        }
    }

    /// Event `type`.
    pub(crate) fn event_type(self) -> &'static str {
        match self {
            Validity::Valid => "Normal",
            Validity::Expired => "Warning",
        }
    }

    pub(crate) fn message(self, application: &str, expiration: DateTime<Utc>) -> String {
        match self {
            Validity::Valid => format!("{application} license is valid, expires {expiration}"),
            Validity::Expired => {
                format!("{application} license is not valid, expired {expiration}")
            }
        }
    }
}

impl std::fmt::Display for Validity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The pod an event is reported against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PodReference {
    pub(crate) name: String,
    pub(crate) namespace: String,
    pub(crate) uid: Option<String>,
}

impl PodReference {
    pub(crate) fn object_reference(&self) -> ObjectReference {
        ObjectReference {
            api_version: Some("v1".to_owned()),
            kind: Some("Pod".to_owned()),
            name: Some(self.name.clone()),
            namespace: Some(self.namespace.clone()),
            uid: self.uid.clone(),
            ..Default::default()
        }
    }
}

impl std::fmt::Display for PodReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Identity of a license event.
///
/// Observations that map to the same key are one logical event. The
/// expiration is bucketed by its UTC calendar date, so a renewed license
/// produces a new key even when both licenses are valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct EventKey {
    pub(crate) pod_name: String,
    pub(crate) namespace: String,
    pub(crate) application: String,
    pub(crate) reason: Validity,
    pub(crate) expires_on: NaiveDate,
}

impl EventKey {
    pub(crate) fn new(
        pod: &PodReference,
        application: &str,
        reason: Validity,
        expiration: DateTime<Utc>,
    ) -> Self {
        Self {
            pod_name: pod.name.clone(),
            namespace: pod.namespace.clone(),
            application: application.to_owned(),
            reason,
            expires_on: expiration.date_naive(),
        }
    }

    pub(crate) fn field_selector(&self) -> String {
        format!(
            "involvedObject.name={},involvedObject.namespace={},reason={}",
            self.pod_name, self.namespace, self.reason
        )
    }

    pub(crate) fn label_selector(&self) -> String {
        format!(
            "{APPLICATION_LABEL}={},{EXPIRES_AT_LABEL}={}",
            self.application,
            self.expires_on_label()
        )
    }

    pub(crate) fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (APPLICATION_LABEL.to_owned(), self.application.clone()),
            (EXPIRES_AT_LABEL.to_owned(), self.expires_on_label()),
        ])
    }

    fn expires_on_label(&self) -> String {
        self.expires_on.format(DATE_FORMAT).to_string()
    }

    /// Recover the key an event was stored under, if it is a license event.
    pub(crate) fn from_event(event: &Event) -> Option<Self> {
        let labels = event.metadata.labels.as_ref()?;

        let reason = match event.reason.as_deref()? {
            "Valid" => Validity::Valid,
            "Expired" => Validity::Expired,
            _ => return None,
        };

        Some(Self {
            pod_name: event.involved_object.name.clone()?,
            namespace: event.involved_object.namespace.clone()?,
            application: labels.get(APPLICATION_LABEL)?.clone(),
            reason,
            expires_on: NaiveDate::parse_from_str(labels.get(EXPIRES_AT_LABEL)?, DATE_FORMAT)
                .ok()?,
        })
    }
}

impl std::fmt::Display for EventKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} {} {} {}",
            self.namespace,
            self.pod_name,
            self.application,
            self.reason,
            self.expires_on_label()
        )
    }
}
