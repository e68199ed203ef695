use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The four independent preflight categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyCategory {
    Llm,
    Database,
    ExternalService,
    Runtime,
}

impl DependencyCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyCategory::Llm => "llm",
            DependencyCategory::Database => "database",
            DependencyCategory::ExternalService => "external_service",
            DependencyCategory::Runtime => "runtime",
        }
    }
}

impl fmt::Display for DependencyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much a status can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    /// A live probe succeeded.
    Verified,
    /// Assumed available without a probe (no way to test this kind).
    Unverified,
    Failed,
}

/// Result of checking one dependency. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyStatus {
    pub name: String,
    pub category: DependencyCategory,
    pub available: bool,
    pub required: bool,
    pub error_message: Option<String>,
    pub version: Option<String>,
    pub connection_test_passed: bool,
    pub note: Option<String>,
}

impl DependencyStatus {
    pub fn verified(name: impl Into<String>, category: DependencyCategory) -> Self {
        Self {
            name: name.into(),
            category,
            available: true,
            required: true,
            error_message: None,
            version: None,
            connection_test_passed: true,
            note: None,
        }
    }

    pub fn unverified(
        name: impl Into<String>,
        category: DependencyCategory,
        note: impl Into<String>,
    ) -> Self {
        Self {
            connection_test_passed: false,
            note: Some(note.into()),
            ..Self::verified(name, category)
        }
    }

    pub fn missing(
        name: impl Into<String>,
        category: DependencyCategory,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            available: false,
            connection_test_passed: false,
            error_message: Some(error_message.into()),
            ..Self::verified(name, category)
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn verification(&self) -> Verification {
        match (self.available, self.connection_test_passed) {
            (false, _) => Verification::Failed,
            (true, true) => Verification::Verified,
            (true, false) => Verification::Unverified,
        }
    }

    /// Unavailable and needed: blocks generation.
    pub fn is_blocking(&self) -> bool {
        self.required && !self.available
    }
}

/// Every status from one round of checks, for display. Building it never fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyReport {
    pub blueprint: String,
    pub statuses: Vec<DependencyStatus>,
    pub generated_at: DateTime<Utc>,
}

impl DependencyReport {
    pub fn new(blueprint: impl Into<String>, statuses: Vec<DependencyStatus>) -> Self {
        Self {
            blueprint: blueprint.into(),
            statuses,
            generated_at: Utc::now(),
        }
    }

    pub fn is_ready(&self) -> bool {
        !self.statuses.iter().any(DependencyStatus::is_blocking)
    }

    pub fn missing(&self) -> Vec<&DependencyStatus> {
        self.statuses.iter().filter(|s| s.is_blocking()).collect()
    }

    pub fn unverified(&self) -> Vec<&DependencyStatus> {
        self.statuses
            .iter()
            .filter(|s| s.verification() == Verification::Unverified)
            .collect()
    }

    pub fn by_category(&self, category: DependencyCategory) -> Vec<&DependencyStatus> {
        self.statuses
            .iter()
            .filter(|s| s.category == category)
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum DependencyError {
    /// Every blocking status from one preflight, never just the first.
    #[error("missing required dependencies: {}", describe_statuses(.missing))]
    Missing { missing: Vec<DependencyStatus> },
}

/// Render statuses as `N missing: name: reason; name: reason`.
pub fn describe_statuses(statuses: &[DependencyStatus]) -> String {
    let details: Vec<String> = statuses
        .iter()
        .map(|s| {
            let reason = s.error_message.as_deref().unwrap_or("unavailable");
            format!("{}: {reason}", s.name)
        })
        .collect();
    format!("{} missing: {}", statuses.len(), details.join("; "))
}
