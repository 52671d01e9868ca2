use chrono::{DateTime, Utc};
use tracing::{error, info, instrument};

use crate::{
    events::{EventReconciler, EventStore, ReconcileOutcome, StoreError, Validity},
    license::{AppIdentity, LicenseError, LicenseSource},
};

use super::{LICENSE_EXPIRED_CTA, backoff::ExponentialBackoff};

#[derive(Debug)]
pub(crate) enum CheckError {
    License(LicenseError),
    Store(StoreError),
    Expired {
        application: String,
        expiration: DateTime<Utc>,
    },
}

impl CheckError {
    /// Whether running the check again could change the outcome.
    pub(crate) fn is_transient(&self) -> bool {
        match self {
            CheckError::License(err) => err.is_transient(),
            CheckError::Store(_) => true,
            CheckError::Expired { .. } => false,
        }
    }
}

impl std::fmt::Display for CheckError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckError::License(err) => write!(f, "{err}"),
            CheckError::Store(err) => write!(f, "{err}"),
            CheckError::Expired {
                application,
                expiration,
            } => write!(f, "License for {application} expired {expiration}"),
        }
    }
}

impl std::error::Error for CheckError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CheckError::License(err) => Some(err),
            CheckError::Store(err) => Some(err),
            CheckError::Expired { .. } => None,
        }
    }
}

impl From<LicenseError> for CheckError {
    fn from(err: LicenseError) -> Self {
        CheckError::License(err)
    }
}

impl From<StoreError> for CheckError {
    fn from(err: StoreError) -> Self {
        CheckError::Store(err)
    }
}

/// A verified expiration date and what it means right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LicenseStatus {
    pub(crate) application: String,
    pub(crate) expiration: DateTime<Utc>,
    pub(crate) validity: Validity,
}

/// Checks the license and reports the result as a Kubernetes Event.
#[derive(Debug)]
pub(crate) struct LicenseEnforcer<L, S> {
    source: L,
    reconciler: EventReconciler<S>,
    backoff: ExponentialBackoff,
}

impl<L: LicenseSource, S: EventStore> LicenseEnforcer<L, S> {
    pub(crate) fn new(
        source: L,
        reconciler: EventReconciler<S>,
        backoff: ExponentialBackoff,
    ) -> Self {
        Self {
            source,
            reconciler,
            backoff,
        }
    }

    #[cfg(test)]
    pub(crate) fn reconciler(&self) -> &EventReconciler<S> {
        &self.reconciler
    }

    /// One verify, compare and record pass against the current time.
    pub(crate) async fn check(&self) -> Result<LicenseStatus, CheckError> {
        self.check_at(Utc::now()).await
    }

    /// One verify, compare and record pass as of `now`.
    ///
    /// The event is recorded for expired licenses too, before
    /// [`CheckError::Expired`] is returned.
    #[instrument(level = "debug", skip(self))]
    pub(crate) async fn check_at(&self, now: DateTime<Utc>) -> Result<LicenseStatus, CheckError> {
        let expiration = self.source.expiration_date().await?;
        let validity = Validity::at(expiration, now);

        let AppIdentity { slug, name } = self.source.app_identity().await?;

        let outcome = self
            .reconciler
            .record_observation(&slug, validity, expiration, now)
            .await?;

        match outcome {
            ReconcileOutcome::Created { name: event } => {
                info!(event = event.as_deref(), "Recorded {validity} license event");
            }
            ReconcileOutcome::Updated { name: event, count } => {
                info!(
                    event = event.as_deref(),
                    count,
                    "Updated {validity} license event"
                );
            }
        }

        if validity == Validity::Expired {
            error!(application = %name, %expiration, "License is expired");
            eprintln!("{LICENSE_EXPIRED_CTA}");

            return Err(CheckError::Expired {
                application: name,
                expiration,
            });
        }

        info!(application = %name, %expiration, "License is valid");

        Ok(LicenseStatus {
            application: name,
            expiration,
            validity,
        })
    }

    /// [`check`](Self::check), retrying transient failures with backoff.
    pub(crate) async fn validate(&self) -> Result<LicenseStatus, CheckError> {
        self.backoff
            .retry(|| self.check(), CheckError::is_transient)
            .await
    }
}
