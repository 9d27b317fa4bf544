//! Core type definitions

use crate::CoreError;
use serde::{Deserialize, Serialize};

/// Opaque external identifier of one metadata record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ediid(String);

impl Ediid {
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CoreError::InvalidEdiid(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Ediid {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Ediid> for String {
    fn from(id: Ediid) -> Self {
        id.0
    }
}

impl std::str::FromStr for Ediid {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Ediid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Ediid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller identity as presented to the access guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// No credentials were supplied
    Anonymous,

    /// Bearer token credentials
    Token {
        token: String,
        /// Optional human-readable subject, used only for logging
        subject: Option<String>,
    },
}

impl Principal {
    pub fn token(token: impl Into<String>) -> Self {
        Self::Token {
            token: token.into(),
            subject: None,
        }
    }

    /// Name safe to put in logs (never the raw token)
    pub fn display_name(&self) -> &str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Token {
                subject: Some(subject),
                ..
            } => subject,
            Self::Token { .. } => "token-holder",
        }
    }
}

/// Operation kinds gated by the access guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Update,
    Discard,
    /// Service-wide statistics
    Inspect,
}

impl Operation {
    /// Whether the operation changes the staged copy
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Update | Self::Discard)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Read => "read",
            Self::Update => "update",
            Self::Discard => "discard",
            Self::Inspect => "inspect",
        };
        f.write_str(name)
    }
}
