//! JWT claims and the verified access token

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A claim that may be a single string or an array of strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    /// Build from a comma-separated list; a single item stays a string.
    pub fn from_delimited(value: &str) -> Option<Self> {
        let mut items: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect();

        match items.len() {
            0 => None,
            1 => items.pop().map(Self::One),
            _ => Some(Self::Many(items)),
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::One(s) => s == value,
            Self::Many(v) => v.iter().any(|s| s == value),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::One(s) => s.is_empty(),
            Self::Many(v) => v.is_empty(),
        }
    }

    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s.clone()],
            Self::Many(v) => v.clone(),
        }
    }
}

impl fmt::Display for OneOrMany {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One(s) => f.write_str(s),
            Self::Many(v) => write!(f, "[{}]", v.join(", ")),
        }
    }
}

impl From<&str> for OneOrMany {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<Vec<String>> for OneOrMany {
    fn from(value: Vec<String>) -> Self {
        Self::Many(value)
    }
}

/// Claims read from a signature-verified token payload.
///
/// Every field is optional; presence rules are enforced by
/// [`ClaimPolicy`](super::ClaimPolicy), not by deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub exp: Option<f64>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Option<OneOrMany>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    /// OAuth2 `scope`: space or comma delimited string, or an array
    #[serde(default)]
    pub scope: Option<OneOrMany>,
    /// Azure AD / Okta style `scp`
    #[serde(default)]
    pub scp: Option<OneOrMany>,
}

impl Claims {
    /// Caller identity: `client_id`, then `email`, then `sub`, else `"unknown"`
    pub fn client_identity(&self) -> String {
        [&self.client_id, &self.email, &self.sub]
            .into_iter()
            .flatten()
            .find(|value| !value.is_empty())
            .cloned()
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
    }

    pub fn scopes(&self) -> BTreeSet<String> {
        [&self.scope, &self.scp]
            .into_iter()
            .flatten()
            .flat_map(split_scopes)
            .collect()
    }
}

pub const UNKNOWN_CLIENT: &str = "unknown";

fn split_scopes(claim: &OneOrMany) -> Vec<String> {
    match claim {
        OneOrMany::One(s) => s
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|item| !item.is_empty())
            .map(ToString::to_string)
            .collect(),
        OneOrMany::Many(v) => v
            .iter()
            .map(|item| item.trim())
            .filter(|item| !item.is_empty())
            .map(ToString::to_string)
            .collect(),
    }
}

/// Result of a successful verification
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct AccessToken {
    #[serde(skip_serializing)]
    pub token: String,
    pub client_id: String,
    pub scopes: BTreeSet<String>,
    pub expires_at: Option<i64>,
}

// Raw bearer token is never printed
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl AccessToken {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }
}
