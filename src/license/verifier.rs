use anyhow::{Context as _, anyhow};
use base64::prelude::*;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument, trace, warn};

use crate::sdk::AppInfo;

use super::{
    LicenseError, TrustAnchor,
    field::{FieldValue, LicenseField, RawLicenseField, ValueType},
};

pub(crate) const EXPIRES_AT_FIELD: &str = "expires_at";

/// The license SDK operations the verifier depends on.
pub(crate) trait LicenseBackend {
    async fn license_field(&self, name: &str) -> Result<RawLicenseField, LicenseError>;

    async fn app_info(&self) -> Result<AppInfo, LicenseError>;
}

/// The application a license belongs to, taken from a single app info read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AppIdentity {
    /// Keys and labels license events.
    pub(crate) slug: String,
    /// Human readable, for logs and errors.
    pub(crate) name: String,
}

/// What license enforcement needs to know about the license. The expiration
/// date is authenticated before it is returned.
pub(crate) trait LicenseSource {
    async fn expiration_date(&self) -> Result<DateTime<Utc>, LicenseError>;

    async fn app_identity(&self) -> Result<AppIdentity, LicenseError>;
}

/// Check a raw field's value against its declared type and signature.
///
/// This is the only way to obtain a [`LicenseField`].
pub(crate) fn verify_field(
    raw: RawLicenseField,
    trust_anchor: &TrustAnchor,
) -> Result<LicenseField, LicenseError> {
    let RawLicenseField {
        name,
        title,
        description,
        value,
        value_type,
        signature,
    } = raw;

    let value_type = value_type
        .parse::<ValueType>()
        .map_err(LicenseError::VerificationFailed)?;

    let value = FieldValue::from_json(value_type, &value)
        .with_context(|| format!("License field {name:?} value does not match its type"))
        .map_err(LicenseError::VerificationFailed)?;

    let decoded_signature = BASE64_STANDARD
        .decode(&signature.v1)
        .with_context(|| format!("License field {name:?} signature is not valid base64"))
        .map_err(LicenseError::VerificationFailed)?;

    trust_anchor
        .verify_pss_md5(value.canonical().as_bytes(), &decoded_signature)
        .with_context(|| format!("License field {name:?} signature verification failed"))
        .map_err(LicenseError::VerificationFailed)?;

    Ok(LicenseField {
        name,
        title,
        description,
        value_type,
        value,
        signature,
    })
}

#[derive(Debug)]
pub(crate) struct LicenseVerifier<B> {
    backend: B,
    trust_anchor: TrustAnchor,
}

impl<B: LicenseBackend> LicenseVerifier<B> {
    pub(crate) fn new(backend: B, trust_anchor: TrustAnchor) -> Self {
        Self {
            backend,
            trust_anchor,
        }
    }

    #[cfg(test)]
    pub(crate) fn backend(&self) -> &B {
        &self.backend
    }

    /// Fetch a license field and return it only if its signature verifies.
    #[instrument(level = "debug", skip(self))]
    pub(crate) async fn fetch_verified_field(
        &self,
        name: &str,
    ) -> Result<LicenseField, LicenseError> {
        if name.is_empty() {
            return Err(LicenseError::EmptyFieldName);
        }

        let raw = self.backend.license_field(name).await?;

        debug!(
            field = %raw.name,
            value_type = %raw.value_type,
            value = %raw.value,
            "Verifying license field"
        );

        match verify_field(raw, &self.trust_anchor) {
            Ok(field) => {
                debug!(
                    field = %field.name,
                    title = %field.title,
                    description = field.description.as_deref(),
                    "License field verified"
                );
                trace!(signature = %field.signature.v1, "Verified signature");
                Ok(field)
            }
            Err(err) => {
                warn!(field = name, "{err}");
                Err(err)
            }
        }
    }
}

impl<B: LicenseBackend> LicenseSource for LicenseVerifier<B> {
    #[instrument(level = "debug", skip(self))]
    async fn expiration_date(&self) -> Result<DateTime<Utc>, LicenseError> {
        let field = self.fetch_verified_field(EXPIRES_AT_FIELD).await?;

        let (ValueType::String, FieldValue::Text(value)) = (field.value_type, &field.value) else {
            return Err(LicenseError::InvalidExpiration(anyhow!(
                "{EXPIRES_AT_FIELD} is a {} field, expected String",
                field.value_type
            )));
        };

        let expiration = DateTime::parse_from_rfc3339(value)
            .with_context(|| format!("Failed to parse {EXPIRES_AT_FIELD} value {value:?}"))
            .map_err(LicenseError::InvalidExpiration)?
            .with_timezone(&Utc);

        debug!(%expiration, "License expiration date verified");

        Ok(expiration)
    }

    async fn app_identity(&self) -> Result<AppIdentity, LicenseError> {
        let app_info = self.backend.app_info().await?;
        app_info.log();

        Ok(AppIdentity {
            slug: app_info.app_slug,
            name: app_info.app_name,
        })
    }
}
