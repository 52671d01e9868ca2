use std::{error::Error, fmt};

#[derive(Debug)]
pub(crate) enum LicenseError {
    /// A field was requested without a name. Never sent to the SDK.
    EmptyFieldName,

    /// The SDK has no license field with this name.
    NotFound(String),

    /// The field's signature did not verify or its value does not match its
    /// declared type. The license may have been tampered with.
    VerificationFailed(anyhow::Error),

    /// The expiration field verified but its value is not a timestamp.
    InvalidExpiration(anyhow::Error),

    /// The SDK was unreachable or answered with something we can't use.
    Transport(anyhow::Error),
}

impl LicenseError {
    /// Whether retrying the same request could produce a different outcome.
    pub(crate) fn is_transient(&self) -> bool {
        matches!(self, LicenseError::Transport(_))
    }
}

impl fmt::Display for LicenseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LicenseError::EmptyFieldName => write!(f, "License field name must not be empty"),
            LicenseError::NotFound(field) => {
                write!(f, "License field {field:?} was not found in the license")
            }
            LicenseError::VerificationFailed(err) => {
                write!(
                    f,
                    "License field failed verification, license may have been tampered with: {err:#}"
                )
            }
            LicenseError::InvalidExpiration(err) => {
                write!(f, "License expiration date is invalid: {err:#}")
            }
            LicenseError::Transport(err) => write!(f, "{err:#}"),
        }
    }
}

impl Error for LicenseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LicenseError::EmptyFieldName | LicenseError::NotFound(_) => None,
            LicenseError::VerificationFailed(err)
            | LicenseError::InvalidExpiration(err)
            | LicenseError::Transport(err) => Some(err.as_ref()),
        }
    }
}
