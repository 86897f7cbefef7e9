// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Bucket used for sensors whose integration is missing or malformed.
pub const UNKNOWN_INTEGRATION: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("integration identifier must not be empty")]
pub struct InvalidIntegrationId;

/// Normalized integration identifier (e.g. "shelly", "tplink").
///
/// Always trimmed and lowercased so that "Shelly " and "shelly" land in the
/// same selection bucket.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IntegrationId(String);

impl IntegrationId {
    pub fn parse(raw: &str) -> Result<Self, InvalidIntegrationId> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(InvalidIntegrationId);
        }
        Ok(Self(normalized))
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN_INTEGRATION.to_owned())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_INTEGRATION
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for IntegrationId {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for IntegrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for IntegrationId {
    type Err = InvalidIntegrationId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for IntegrationId {
    type Error = InvalidIntegrationId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<IntegrationId> for String {
    fn from(value: IntegrationId) -> Self {
        value.0
    }
}

impl AsRef<str> for IntegrationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for IntegrationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Lenient deserializer for record fields: malformed or missing values map to
/// the `unknown` bucket instead of failing the whole catalog.
pub(crate) fn lenient<'de, D>(deserializer: D) -> Result<IntegrationId, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .and_then(|value| IntegrationId::parse(&value).ok())
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_case_and_whitespace() {
        let a = IntegrationId::parse("  Shelly ").unwrap();
        let b = IntegrationId::parse("shelly").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "shelly");
    }

    #[test]
    fn test_rejects_blank() {
        assert_eq!(IntegrationId::parse("   "), Err(InvalidIntegrationId));
        assert!("".parse::<IntegrationId>().is_err());
    }

    #[test]
    fn test_serde_goes_through_validation() {
        let id: IntegrationId = serde_json::from_str("\"TPLink\"").unwrap();
        assert_eq!(id.as_str(), "tplink");
        assert!(serde_json::from_str::<IntegrationId>("\"\"").is_err());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"tplink\"");
    }

    #[test]
    fn test_default_is_unknown() {
        assert!(IntegrationId::default().is_unknown());
    }
}
