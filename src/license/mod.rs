//! License field verification.
//!
//! Every license field the SDK hands out carries an RSA-PSS signature made by
//! the license issuer over a canonical string form of the field's value.
//! Nothing read from the license is trusted until that signature has been
//! checked against the [`TrustAnchor`]: a field whose signature does not
//! verify, or whose value does not have the type the field declares, is
//! reported as [`LicenseError::VerificationFailed`] and never reaches the
//! expiration check.

mod error;
mod field;
mod trust_anchor;
mod verifier;

pub(crate) use error::LicenseError;
pub(crate) use field::RawLicenseField;
pub(crate) use trust_anchor::TrustAnchor;
pub(crate) use verifier::{AppIdentity, LicenseBackend, LicenseSource, LicenseVerifier};

#[cfg(test)]
pub(crate) use trust_anchor::tests as trust_anchor_tests;
#[cfg(test)]
pub(crate) use verifier::tests as verifier_tests;
