//! Caller identity and scope checks for write operations
//!
//! The caller is already authenticated upstream; this module only decides
//! whether a resolved caller holds the scope an operation needs.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scope {
    #[serde(rename = "product:read")]
    Read,
    #[serde(rename = "product:write")]
    Write,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Read => "product:read",
            Scope::Write => "product:write",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "product:read" => Ok(Scope::Read),
            "product:write" => Ok(Scope::Write),
            other => Err(format!("Unknown scope: {}", other)),
        }
    }
}

/// Resolved identity of the caller, passed explicitly to every write
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    pub subject: Option<String>,
    pub scopes: BTreeSet<Scope>,
}

impl CallerContext {
    /// A caller with no subject and no scopes
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn new<S: Into<String>>(subject: S) -> Self {
        Self {
            subject: Some(subject.into()),
            scopes: BTreeSet::new(),
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scopes.insert(scope);
        self
    }

    /// Builds a context from a space-separated scope claim, skipping unknown scopes
    pub fn from_scope_claim(subject: Option<String>, claim: &str) -> Self {
        Self {
            subject,
            scopes: claim.split_whitespace().filter_map(|s| s.parse().ok()).collect(),
        }
    }

    pub fn has_scope(&self, scope: Scope) -> bool {
        self.scopes.contains(&scope)
    }

    /// Subject for log lines
    pub fn display_subject(&self) -> &str {
        self.subject.as_deref().unwrap_or("anonymous")
    }
}

/// Decides whether a caller may perform an operation requiring `scope`
#[cfg_attr(test, mockall::automock)]
pub trait AuthorizationGate: Send + Sync {
    fn check(&self, caller: &CallerContext, scope: Scope) -> bool;
}

/// Grants a scope held by the caller or left open for everyone
#[derive(Debug, Clone)]
pub struct ScopeGate {
    open_scopes: BTreeSet<Scope>,
}

impl Default for ScopeGate {
    /// Reads are open, writes need the caller's scope
    fn default() -> Self {
        Self::new([Scope::Read])
    }
}

impl ScopeGate {
    pub fn new<I: IntoIterator<Item = Scope>>(open_scopes: I) -> Self {
        Self {
            open_scopes: open_scopes.into_iter().collect(),
        }
    }

    /// A gate that requires every scope explicitly
    pub fn strict() -> Self {
        Self::new(std::iter::empty())
    }
}

impl AuthorizationGate for ScopeGate {
    fn check(&self, caller: &CallerContext, scope: Scope) -> bool {
        self.open_scopes.contains(&scope) || caller.has_scope(scope)
    }
}
