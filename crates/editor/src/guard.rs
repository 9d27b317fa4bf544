//! Access guard: decides who may read or change a staged record

use async_trait::async_trait;
use ned_core::{Ediid, Operation, Principal};
use std::collections::HashSet;

/// Outcome of an authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied,
}

/// Capability check consulted before every editor operation
#[async_trait]
pub trait AccessGuard: Send + Sync {
    async fn authorize(&self, principal: &Principal, ediid: &Ediid, operation: Operation) -> Decision;

    /// Whether `principal` may see service-wide statistics
    async fn authorize_stats(&self, principal: &Principal) -> Decision;
}

/// Allows every request. For development only.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl AccessGuard for AllowAll {
    async fn authorize(&self, _principal: &Principal, _ediid: &Ediid, _operation: Operation) -> Decision {
        Decision::Allowed
    }

    async fn authorize_stats(&self, _principal: &Principal) -> Decision {
        Decision::Allowed
    }
}

/// Static bearer-token guard
///
/// Editor tokens may perform every operation; read-only tokens may only read.
/// Either kind may view statistics.
#[derive(Debug, Clone, Default)]
pub struct TokenGuard {
    editor_tokens: HashSet<String>,
    read_only_tokens: HashSet<String>,
}

impl TokenGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tokens<E, R>(editors: E, readers: R) -> Self
    where
        E: IntoIterator<Item = String>,
        R: IntoIterator<Item = String>,
    {
        Self {
            editor_tokens: editors.into_iter().collect(),
            read_only_tokens: readers.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn with_editor_token(mut self, token: impl Into<String>) -> Self {
        self.editor_tokens.insert(token.into());
        self
    }

    #[must_use]
    pub fn with_read_only_token(mut self, token: impl Into<String>) -> Self {
        self.read_only_tokens.insert(token.into());
        self
    }

    /// True when no token has been configured
    pub fn is_empty(&self) -> bool {
        self.editor_tokens.is_empty() && self.read_only_tokens.is_empty()
    }
}

#[async_trait]
impl AccessGuard for TokenGuard {
    async fn authorize(&self, principal: &Principal, _ediid: &Ediid, operation: Operation) -> Decision {
        let token = match principal {
            Principal::Token { token, .. } => token,
            Principal::Anonymous => return Decision::Denied,
        };

        if self.editor_tokens.contains(token) {
            return Decision::Allowed;
        }
        if !operation.is_mutation() && self.read_only_tokens.contains(token) {
            return Decision::Allowed;
        }
        Decision::Denied
    }

    async fn authorize_stats(&self, principal: &Principal) -> Decision {
        match principal {
            Principal::Token { token, .. }
                if self.editor_tokens.contains(token) || self.read_only_tokens.contains(token) =>
            {
                Decision::Allowed
            }
            _ => Decision::Denied,
        }
    }
}
