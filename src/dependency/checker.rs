use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{info, instrument, warn};

use crate::blueprint::Blueprint;
use crate::config::{DependencyConfig, Environment};

use super::database::{DatabaseCheck, PostgresConnector};
use super::llm::LlmCheck;
use super::runtime::RuntimeCheck;
use super::services::ServiceCheck;
use super::types::{DependencyCategory, DependencyError, DependencyReport, DependencyStatus};

/// One category of read-only availability checks.
///
/// A check reports problems as statuses; it never returns early on the first
/// failure and never mutates anything it probes.
#[async_trait]
pub trait DependencyCheck: Send + Sync {
    fn category(&self) -> DependencyCategory;

    async fn check(&self, blueprint: &Blueprint) -> Vec<DependencyStatus>;
}

/// Runs every configured check and aggregates the outcome.
#[derive(Clone, Default)]
pub struct DependencyChecker {
    checks: Vec<Arc<dyn DependencyCheck>>,
}

impl DependencyChecker {
    pub fn new(checks: Vec<Arc<dyn DependencyCheck>>) -> Self {
        Self { checks }
    }

    /// The standard four categories: LLM, database, declared services, runtime.
    pub fn from_config(config: &DependencyConfig, env: Environment) -> Result<Self, reqwest::Error> {
        let checks: Vec<Arc<dyn DependencyCheck>> = vec![
            Arc::new(LlmCheck::new(
                config.llm_providers.clone(),
                env.clone(),
                config.llm_probe_timeout.duration(),
            )),
            Arc::new(DatabaseCheck::new(
                config.database_env_vars.clone(),
                env,
                Arc::new(PostgresConnector),
                config.database_timeout.duration(),
            )),
            Arc::new(ServiceCheck::new(config.service_timeout.duration())?),
            Arc::new(RuntimeCheck::new(config.runtime.clone())),
        ];
        Ok(Self { checks })
    }

    pub fn with_check(mut self, check: Arc<dyn DependencyCheck>) -> Self {
        self.checks.push(check);
        self
    }

    pub fn categories(&self) -> Vec<DependencyCategory> {
        self.checks.iter().map(|c| c.category()).collect()
    }

    /// Run every check concurrently and collect all statuses. Never fails.
    #[instrument(skip_all, fields(blueprint = %blueprint.name))]
    pub async fn report(&self, blueprint: &Blueprint) -> DependencyReport {
        self.collect(blueprint, |_| true).await
    }

    /// Fail with one error naming every blocking dependency, or return the
    /// full report when nothing blocks.
    #[instrument(skip_all, fields(blueprint = %blueprint.name))]
    pub async fn preflight(&self, blueprint: &Blueprint) -> Result<DependencyReport, DependencyError> {
        let report = self.collect(blueprint, |_| true).await;
        Self::gate(report)
    }

    /// Re-run the checks of one category mid-run.
    pub async fn verify(
        &self,
        category: DependencyCategory,
        blueprint: &Blueprint,
    ) -> Result<DependencyReport, DependencyError> {
        let report = self.collect(blueprint, |c| c == category).await;
        Self::gate(report)
    }

    async fn collect(
        &self,
        blueprint: &Blueprint,
        include: impl Fn(DependencyCategory) -> bool,
    ) -> DependencyReport {
        let selected = self.checks.iter().filter(|c| include(c.category()));
        let statuses: Vec<DependencyStatus> = join_all(selected.map(|c| c.check(blueprint)))
            .await
            .into_iter()
            .flatten()
            .collect();

        for status in &statuses {
            if status.is_blocking() {
                warn!(
                    dependency = %status.name,
                    category = %status.category,
                    error = status.error_message.as_deref().unwrap_or(""),
                    "dependency unavailable"
                );
            } else if !status.connection_test_passed && status.available {
                warn!(
                    dependency = %status.name,
                    note = status.note.as_deref().unwrap_or(""),
                    "dependency assumed available without verification"
                );
            }
        }

        let report = DependencyReport::new(blueprint.name.clone(), statuses);
        info!(
            checked = report.statuses.len(),
            missing = report.missing().len(),
            unverified = report.unverified().len(),
            "dependency checks finished"
        );
        report
    }

    fn gate(report: DependencyReport) -> Result<DependencyReport, DependencyError> {
        if report.is_ready() {
            return Ok(report);
        }
        let missing = report.missing().into_iter().cloned().collect();
        Err(DependencyError::Missing { missing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::{Component, ComponentType};

    struct Fixed {
        category: DependencyCategory,
        statuses: Vec<DependencyStatus>,
    }

    #[async_trait]
    impl DependencyCheck for Fixed {
        fn category(&self) -> DependencyCategory {
            self.category
        }

        async fn check(&self, _blueprint: &Blueprint) -> Vec<DependencyStatus> {
            self.statuses.clone()
        }
    }

    fn fixed(category: DependencyCategory, statuses: Vec<DependencyStatus>) -> Arc<dyn DependencyCheck> {
        Arc::new(Fixed { category, statuses })
    }

    fn blueprint() -> Blueprint {
        Blueprint::new("bp", vec![Component::new("a", ComponentType::Source)])
    }

    #[tokio::test]
    async fn preflight_collects_failures_across_categories() {
        let checker = DependencyChecker::new(vec![
            fixed(
                DependencyCategory::Llm,
                vec![DependencyStatus::missing("llm", DependencyCategory::Llm, "no key")],
            ),
            fixed(
                DependencyCategory::Database,
                vec![DependencyStatus::missing("database", DependencyCategory::Database, "refused")],
            ),
            fixed(
                DependencyCategory::Runtime,
                vec![DependencyStatus::verified("python3", DependencyCategory::Runtime)],
            ),
        ]);

        let err = checker.preflight(&blueprint()).await.unwrap_err();
        let DependencyError::Missing { missing } = &err;
        assert_eq!(missing.len(), 2);
        let msg = err.to_string();
        assert!(msg.contains("llm: no key"));
        assert!(msg.contains("database: refused"));
        assert!(!msg.contains("python3"));
    }

    #[tokio::test]
    async fn report_never_fails_and_is_repeatable() {
        let checker = DependencyChecker::new(vec![fixed(
            DependencyCategory::Llm,
            vec![DependencyStatus::missing("llm", DependencyCategory::Llm, "no key")],
        )]);
        let first = checker.report(&blueprint()).await;
        let second = checker.report(&blueprint()).await;
        assert!(!first.is_ready());
        let flags = |r: &DependencyReport| r.statuses.iter().map(|s| s.available).collect::<Vec<_>>();
        assert_eq!(flags(&first), flags(&second));
    }

    #[tokio::test]
    async fn verify_only_runs_the_requested_category() {
        let checker = DependencyChecker::new(vec![
            fixed(
                DependencyCategory::Llm,
                vec![DependencyStatus::verified("llm", DependencyCategory::Llm)],
            ),
            fixed(
                DependencyCategory::Database,
                vec![DependencyStatus::missing("database", DependencyCategory::Database, "down")],
            ),
        ]);
        let report = checker
            .verify(DependencyCategory::Llm, &blueprint())
            .await
            .unwrap();
        assert_eq!(report.statuses.len(), 1);
        assert!(checker.preflight(&blueprint()).await.is_err());
    }

    #[tokio::test]
    async fn empty_checker_is_ready() {
        let checker = DependencyChecker::default();
        assert!(checker.preflight(&blueprint()).await.is_ok());
    }
}
