//! License expiry enforcement.
//!
//! A check runs three steps in order:
//!
//! 1. Fetch the `expires_at` license field from the Replicated SDK and verify
//!    its signature. Nothing below runs if verification fails.
//! 2. Compare the verified expiration to the current time.
//! 3. Record the outcome as a Kubernetes Event on this pod, reusing the event
//!    from an earlier check of the same license.
//!
//! An expired license still gets its event recorded. The check then fails
//! with `CheckError::Expired` and an operator banner is printed to stderr.
//!
//! ## Retries
//!
//! SDK transport failures and event store failures are retried with
//! exponential backoff up to a bounded elapsed time. Verification failures,
//! malformed expirations, missing fields and expired licenses are final.
//!
//! ## Monitoring
//!
//! [`monitor`] repeats the check on a fixed interval. A failed check is
//! logged and the schedule carries on until the process is signalled.

mod backoff;
mod check;
mod messages;
mod monitor;

pub(crate) use backoff::{DEFAULT_MAX_ELAPSED, ExponentialBackoff};
pub(crate) use check::LicenseEnforcer;
pub(crate) use messages::LICENSE_EXPIRED_CTA;
pub(crate) use monitor::{DEFAULT_RECHECK_INTERVAL, monitor};
