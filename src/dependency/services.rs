use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;

use crate::blueprint::{Blueprint, DeclaredService, ServiceKind};

use super::checker::DependencyCheck;
use super::types::{DependencyCategory, DependencyStatus};

/// Probes the external services components declare.
///
/// HTTP services get one bounded GET; any answer below 500 counts as
/// reachable, and an HTTP service with no endpoint is missing. Other
/// transports cannot be probed here and are reported as available but
/// unverified.
pub struct ServiceCheck {
    client: Client,
    timeout: Duration,
}

impl ServiceCheck {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }

    async fn probe(&self, service: &DeclaredService) -> DependencyStatus {
        let name = format!("service:{} ({})", service.name, service.component);
        let category = DependencyCategory::ExternalService;

        let status = match &service.kind {
            ServiceKind::Other { service_type } => DependencyStatus::unverified(
                name,
                category,
                format!("{service_type} services are not testable; assumed available"),
            ),
            ServiceKind::HttpWithoutEndpoint => {
                DependencyStatus::missing(name, category, "http service declares no endpoint")
            }
            ServiceKind::Http { url } => match self.client.get(url).send().await {
                Ok(response) if response.status().is_server_error() => DependencyStatus::missing(
                    name,
                    category,
                    format!("{url} answered HTTP {}", response.status().as_u16()),
                ),
                Ok(response) => DependencyStatus::verified(name, category)
                    .with_note(format!("{url} answered HTTP {}", response.status().as_u16())),
                Err(err) if err.is_timeout() => DependencyStatus::missing(
                    name,
                    category,
                    format!("{url} timed out after {}s", self.timeout.as_secs()),
                ),
                Err(err) => {
                    DependencyStatus::missing(name, category, format!("{url} unreachable: {err}"))
                }
            },
        };
        status.required(service.required)
    }
}

#[async_trait]
impl DependencyCheck for ServiceCheck {
    fn category(&self) -> DependencyCategory {
        DependencyCategory::ExternalService
    }

    async fn check(&self, blueprint: &Blueprint) -> Vec<DependencyStatus> {
        let mut seen = HashSet::new();
        let services: Vec<DeclaredService> = blueprint
            .declared_services()
            .into_iter()
            .filter(|s| seen.insert((s.component.clone(), s.name.clone())))
            .collect();
        join_all(services.iter().map(|s| self.probe(s))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::parse_blueprint;
    use crate::dependency::Verification;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn blueprint_with(deps: &str) -> Blueprint {
        parse_blueprint(&format!(
            "name: svc\ncomponents:\n  - name: api\n    type: APIEndpoint\n    behavioral_dependencies:\n{deps}"
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn http_service_is_probed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let bp = blueprint_with(&format!(
            "      - name: catalog\n        service_type: http\n        endpoint: {}/health\n",
            server.uri()
        ));
        let check = ServiceCheck::new(Duration::from_secs(2)).unwrap();
        let statuses = check.check(&bp).await;
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].verification(), Verification::Verified);
    }

    #[tokio::test]
    async fn server_errors_and_unreachable_hosts_fail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let bp = blueprint_with(&format!(
            "      - {{name: flaky, service_type: http, endpoint: '{}/x'}}\n      - {{name: gone, service_type: http, endpoint: 'http://127.0.0.1:9/'}}\n",
            server.uri()
        ));
        let check = ServiceCheck::new(Duration::from_secs(2)).unwrap();
        let statuses = check.check(&bp).await;
        assert_eq!(statuses.len(), 2);
        assert!(statuses.iter().all(|s| !s.available));
        assert!(statuses[0].error_message.as_deref().unwrap().contains("502"));
    }

    #[tokio::test]
    async fn non_http_services_are_unverified_not_verified() {
        let bp = blueprint_with("      - {name: events, service_type: kafka}\n      - cache\n");
        let check = ServiceCheck::new(Duration::from_secs(1)).unwrap();
        let statuses = check.check(&bp).await;
        assert_eq!(statuses.len(), 2);
        for status in &statuses {
            assert!(status.available);
            assert_eq!(status.verification(), Verification::Unverified);
            assert!(status.note.as_deref().unwrap().contains("assumed available"));
        }
    }

    #[tokio::test]
    async fn http_service_without_endpoint_is_missing() {
        let bp = blueprint_with(
            "      - {name: payments, service_type: http}\n      - {name: ledger, service_type: https, required: false}\n",
        );
        let check = ServiceCheck::new(Duration::from_secs(1)).unwrap();
        let statuses = check.check(&bp).await;
        assert_eq!(statuses.len(), 2);
        assert!(statuses.iter().all(|s| !s.available));
        assert_eq!(statuses[0].verification(), Verification::Failed);
        assert!(statuses[0].is_blocking());
        assert_eq!(
            statuses[0].error_message.as_deref(),
            Some("http service declares no endpoint")
        );
        assert!(!statuses[1].is_blocking());
    }

    #[tokio::test]
    async fn optional_service_failure_is_not_blocking() {
        let bp = blueprint_with(
            "      - {name: gone, service_type: http, endpoint: 'http://127.0.0.1:9/', required: false}\n",
        );
        let check = ServiceCheck::new(Duration::from_secs(1)).unwrap();
        let statuses = check.check(&bp).await;
        assert!(!statuses[0].available);
        assert!(!statuses[0].is_blocking());
    }
}
