// Preflight and in-flight dependency checks. Read-only: nothing here mutates what it probes.
mod checker;
mod database;
mod llm;
mod runtime;
mod services;
mod types;

pub use checker::{DependencyCheck, DependencyChecker};
pub use database::{DatabaseCheck, DatabaseConnector, PostgresConnector, redact_connection_string};
pub use llm::LlmCheck;
pub use runtime::RuntimeCheck;
pub use services::ServiceCheck;
pub use types::{
    DependencyCategory, DependencyError, DependencyReport, DependencyStatus, Verification,
    describe_statuses,
};
