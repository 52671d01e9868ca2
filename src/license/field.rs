use std::{fmt, str::FromStr};

use anyhow::{anyhow, bail};
use serde::Deserialize;
use serde_json::Value;

/// A license field exactly as the SDK returned it. Nothing in here has been
/// verified; use [`super::verifier::verify_field`] to turn it into a [`LicenseField`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawLicenseField {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    pub(crate) value: Value,
    pub(crate) value_type: String,
    pub(crate) signature: Signature,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct Signature {
    pub(crate) v1: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueType {
    String,
    Text,
    Integer,
    Boolean,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::String => write!(f, "String"),
            ValueType::Text => write!(f, "Text"),
            ValueType::Integer => write!(f, "Integer"),
            ValueType::Boolean => write!(f, "Boolean"),
        }
    }
}

impl FromStr for ValueType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "String" => Ok(Self::String),
            "Text" => Ok(Self::Text),
            "Integer" => Ok(Self::Integer),
            "Boolean" => Ok(Self::Boolean),
            s => bail!("Unsupported license field value type '{s}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FieldValue {
    Text(String),
    /// Wide enough for every integer JSON carries, signed or unsigned.
    Integer(i128),
    Boolean(bool),
}

impl FieldValue {
    /// Interpret a JSON value according to the field's declared type.
    ///
    /// Fails when the runtime JSON type disagrees with `value_type`.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::float_cmp
    )]
    pub(crate) fn from_json(value_type: ValueType, value: &Value) -> anyhow::Result<Self> {
        match (value_type, value) {
            (ValueType::String | ValueType::Text, Value::String(text)) => {
                Ok(FieldValue::Text(text.clone()))
            }
            (ValueType::Integer, Value::Number(number)) => {
                if let Some(integer) = number.as_i64() {
                    return Ok(FieldValue::Integer(integer.into()));
                }

                if let Some(integer) = number.as_u64() {
                    return Ok(FieldValue::Integer(integer.into()));
                }

                // Integers that went through a float on the issuing side, e.g. `100.0`
                match number.as_f64() {
                    Some(float)
                        if float.fract() == 0.0
                            && float >= i64::MIN as f64
                            && float < i64::MAX as f64 =>
                    {
                        Ok(FieldValue::Integer((float as i64).into()))
                    }
                    _ => Err(anyhow!("{value_type} value {number} is not an integer")),
                }
            }
            (ValueType::Boolean, Value::Bool(boolean)) => Ok(FieldValue::Boolean(*boolean)),
            (value_type, value) => Err(anyhow!(
                "{value_type} field holds a {} value",
                json_type_name(value)
            )),
        }
    }

    /// The exact string the license issuer signed for this value.
    pub(crate) fn canonical(&self) -> String {
        match self {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Integer(integer) => integer.to_string(),
            FieldValue::Boolean(boolean) => boolean.to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A license field whose value has been authenticated against the trust
/// anchor. Only [`super::verifier::verify_field`] constructs these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LicenseField {
    pub(crate) name: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) value_type: ValueType,
    pub(crate) value: FieldValue,
    pub(crate) signature: Signature,
}
