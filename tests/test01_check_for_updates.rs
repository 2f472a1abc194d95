use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use podman_compose_updater::checker::{CheckContext, CheckerConfig, UpdateChecker};
use podman_compose_updater::domain::{CheckStatus, Container, ContainerUpdate};
use podman_compose_updater::errors::{RegistryError, RuntimeError, UpdateCheckError};
use podman_compose_updater::ports::{MockRuntimePort, RegistryPort, RuntimePort};
use podman_compose_updater::utils::check_logger::RecordingLogger;

fn container(name: &str, image: &str, service: Option<&str>) -> Container {
    let mut labels = HashMap::new();
    if let Some(service) = service {
        labels.insert("com.docker.compose.service".to_string(), service.to_string());
    }
    Container {
        id: format!("{name}-id"),
        name: name.to_string(),
        image: image.to_string(),
        labels,
    }
}

#[derive(Default)]
struct FakeRuntime {
    containers: Vec<Container>,
    local: HashSet<String>,
    versions: HashMap<String, String>,
    digests: HashMap<String, String>,
}

#[async_trait]
impl RuntimePort for FakeRuntime {
    async fn list_containers(&self) -> Result<Vec<Container>, RuntimeError> {
        Ok(self.containers.clone())
    }

    async fn is_local_image(&self, image_ref: &str) -> Result<bool, RuntimeError> {
        Ok(self.local.contains(image_ref))
    }

    async fn get_image_version(&self, image_name: &str) -> Result<String, RuntimeError> {
        Ok(self.versions.get(image_name).cloned().unwrap_or_default())
    }

    async fn get_image_digest(&self, image_name: &str) -> Result<String, RuntimeError> {
        Ok(self.digests.get(image_name).cloned().unwrap_or_default())
    }

    async fn close(&self) -> Result<(), RuntimeError> {
        Ok(())
    }
}

/// Registry keyed by repository path. Calls numbered in `fail_calls` (1
/// based, counted across every method) return a 503.
#[derive(Default)]
struct FakeRegistry {
    tags: HashMap<String, Vec<String>>,
    digests: HashMap<(String, String), String>,
    fail_calls: HashSet<usize>,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    delay: Option<Duration>,
}

impl FakeRegistry {
    async fn enter(&self, what: &str) -> Result<(), RegistryError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        if self.fail_calls.contains(&call) {
            return Err(RegistryError::Status {
                status: 503,
                url: what.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RegistryPort for FakeRegistry {
    async fn list_tags(&self, image: &str) -> Result<Vec<String>, RegistryError> {
        self.enter(image).await?;
        self.tags
            .get(image)
            .cloned()
            .ok_or_else(|| RegistryError::NoTags(image.to_string()))
    }

    async fn get_tag_digest(&self, image_ref: &str, tag: &str) -> Result<String, RegistryError> {
        self.enter(image_ref).await?;
        self.digests
            .get(&(image_ref.to_string(), tag.to_string()))
            .cloned()
            .ok_or_else(|| RegistryError::MissingDigest(format!("{image_ref}:{tag}")))
    }
}

fn tags(list: &[&str]) -> Vec<String> {
    list.iter().map(|t| t.to_string()).collect()
}

fn by_name<'a>(updates: &'a [ContainerUpdate], name: &str) -> &'a ContainerUpdate {
    updates
        .iter()
        .find(|u| u.container_name == name)
        .unwrap_or_else(|| panic!("no row for {name}"))
}

fn standard_registry() -> FakeRegistry {
    FakeRegistry {
        tags: HashMap::from([
            (
                "docker.io/library/nginx".to_string(),
                tags(&["1.27.0-alpine", "1.26.1", "1.25.3", "latest"]),
            ),
            (
                "docker.io/library/postgres".to_string(),
                tags(&["16.1", "15.5", "latest"]),
            ),
            (
                "docker.io/library/redis".to_string(),
                tags(&["7.2.4", "7.2.3", "7.2.3-alpine"]),
            ),
        ]),
        ..FakeRegistry::default()
    }
}

fn three_containers() -> Vec<Container> {
    vec![
        container("web", "nginx:1.25.3", Some("web")),
        container("db", "postgres:16.1", Some("db")),
        container("cache", "redis:7.2.3", None),
    ]
}

#[tokio::test]
async fn no_running_containers_is_an_empty_report() {
    let checker = UpdateChecker::new(
        Arc::new(FakeRuntime::default()),
        Arc::new(FakeRegistry::default()),
    );
    let outcome = checker.check_for_updates(&CheckContext::new()).await;
    assert!(outcome.is_complete());
    assert_eq!(outcome.report.total_checked, 0);
    assert!(outcome.report.updates.is_empty());
}

#[tokio::test]
async fn listing_failure_returns_empty_report_and_error() {
    let mut runtime = MockRuntimePort::new();
    runtime.expect_list_containers().times(1).returning(|| {
        Err(RuntimeError::CommandExecution(
            "podman ps failed: connection refused".to_string(),
        ))
    });
    let checker = UpdateChecker::new(Arc::new(runtime), Arc::new(FakeRegistry::default()));

    let outcome = checker.check_for_updates(&CheckContext::new()).await;
    assert_eq!(outcome.report.total_checked, 0);
    assert!(outcome.report.updates.is_empty());
    let err = outcome.error.expect("listing failure is a run error");
    assert!(matches!(
        err,
        UpdateCheckError::ListContainers(RuntimeError::CommandExecution(_))
    ));
    assert!(!err.to_string().is_empty());
    assert!(err.to_string().contains("connection refused"));
}

#[tokio::test]
async fn versioned_tags_are_compared_on_their_track() {
    let runtime = FakeRuntime {
        containers: three_containers(),
        versions: HashMap::from([("nginx:1.25.3".to_string(), "1.25.3".to_string())]),
        ..FakeRuntime::default()
    };
    let logger = RecordingLogger::default();
    let checker = UpdateChecker::new(Arc::new(runtime), Arc::new(standard_registry()))
        .with_logger(Arc::new(logger.clone()));

    let report = checker
        .check_for_updates(&CheckContext::new())
        .await
        .into_result()
        .expect("complete run");

    assert_eq!(report.total_checked, 3);
    assert_eq!(report.updates.len(), 3);
    assert_eq!(report.failed, 0);

    let web = by_name(&report.updates, "web");
    assert_eq!(web.status, CheckStatus::UpdateAvailable);
    assert_eq!(web.service_name, "web");
    assert_eq!(web.current_version, "1.25.3");
    assert_eq!(web.resolved_version, "1.25.3");
    assert_eq!(web.latest_version, "1.26.1");

    let db = by_name(&report.updates, "db");
    assert_eq!(db.status, CheckStatus::UpToDate);
    assert_eq!(db.latest_version, "16.1");

    let cache = by_name(&report.updates, "cache");
    assert_eq!(cache.status, CheckStatus::UpdateAvailable);
    assert_eq!(cache.latest_version, "7.2.4");
    assert_eq!(cache.service_name, "");

    assert!(!logger.logs().is_empty());
}

#[tokio::test]
async fn registry_failures_become_failed_rows() {
    let registry = FakeRegistry {
        fail_calls: HashSet::from([1, 2]),
        ..standard_registry()
    };
    let runtime = FakeRuntime {
        containers: three_containers(),
        ..FakeRuntime::default()
    };
    let checker = UpdateChecker::new(Arc::new(runtime), Arc::new(registry));

    let outcome = checker.check_for_updates(&CheckContext::new()).await;
    assert!(outcome.is_complete(), "per-container failures are not run errors");
    let report = outcome.report;

    assert_eq!(report.total_checked, 3);
    assert_eq!(report.updates.len(), 3);
    assert!(report.failed >= 1);
    // Each check starts with one tag listing, so the first two calls belong
    // to two different containers.
    assert_eq!(report.failed, 2);
    for failed in report
        .updates
        .iter()
        .filter(|u| u.status == CheckStatus::CheckFailed)
    {
        assert!(failed.error.contains("503"), "error was {:?}", failed.error);
        assert!(failed.latest_version.is_empty());
    }
}

#[tokio::test]
async fn unparseable_and_plain_version_tags_side_by_side() {
    let runtime = FakeRuntime {
        containers: vec![
            container("odd", "registry.example.com/team/odd:weird-tag-format-!!!", None),
            container("myapp", "registry.example.com/team/myapp:1.2.3", Some("app")),
        ],
        digests: HashMap::from([(
            "registry.example.com/team/odd:weird-tag-format-!!!".to_string(),
            "sha256:aaa".to_string(),
        )]),
        ..FakeRuntime::default()
    };
    let registry = FakeRegistry {
        tags: HashMap::from([(
            "registry.example.com/team/myapp".to_string(),
            tags(&["1.10.0", "1.9.9", "1.2.3"]),
        )]),
        digests: HashMap::from([
            (
                (
                    "registry.example.com/team/odd".to_string(),
                    "weird-tag-format-!!!".to_string(),
                ),
                "sha256:bbb".to_string(),
            ),
            (
                (
                    "registry.example.com/team/myapp".to_string(),
                    "1.10.0".to_string(),
                ),
                "sha256:ccc".to_string(),
            ),
        ]),
        ..FakeRegistry::default()
    };
    let checker = UpdateChecker::new(Arc::new(runtime), Arc::new(registry));

    let report = checker
        .check_for_updates(&CheckContext::new())
        .await
        .into_result()
        .expect("complete run");

    assert_eq!(report.total_checked, 2);
    let odd = by_name(&report.updates, "odd");
    assert_eq!(odd.status, CheckStatus::UpdateAvailable);
    assert_eq!(odd.current_digest, "sha256:aaa");
    assert_eq!(odd.latest_digest, "sha256:bbb");

    let myapp = by_name(&report.updates, "myapp");
    assert_eq!(myapp.status, CheckStatus::UpdateAvailable);
    assert_eq!(myapp.latest_version, "1.10.0");
    assert_eq!(myapp.latest_digest, "sha256:ccc");
}

#[tokio::test]
async fn local_images_are_skipped_without_registry_calls() {
    let runtime = FakeRuntime {
        containers: vec![container("dev", "localhost/myapp:dev", Some("dev"))],
        local: HashSet::from(["localhost/myapp:dev".to_string()]),
        ..FakeRuntime::default()
    };
    let registry = Arc::new(FakeRegistry::default());
    let checker = UpdateChecker::new(Arc::new(runtime), registry.clone());

    let report = checker
        .check_for_updates(&CheckContext::new())
        .await
        .into_result()
        .expect("complete run");

    assert_eq!(report.total_checked, 1);
    assert_eq!(report.updates[0].status, CheckStatus::Skipped);
    assert_eq!(report.skipped().count(), 1);
    assert_eq!(report.failed, 0);
    assert_eq!(registry.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn concurrency_limit_is_respected() {
    let containers: Vec<Container> = (0..6)
        .map(|i| container(&format!("web{i}"), "nginx:1.25.3", None))
        .collect();
    let runtime = FakeRuntime {
        containers,
        ..FakeRuntime::default()
    };
    let registry = Arc::new(FakeRegistry {
        delay: Some(Duration::from_millis(20)),
        ..standard_registry()
    });
    let checker = UpdateChecker::new(Arc::new(runtime), registry.clone())
        .with_config(CheckerConfig { max_concurrency: 2 });

    let report = checker
        .check_for_updates(&CheckContext::new())
        .await
        .into_result()
        .expect("complete run");

    assert_eq!(report.total_checked, 6);
    assert_eq!(report.updates_available().count(), 6);
    assert!(registry.max_active.load(Ordering::SeqCst) <= 2);
}

/// Registry whose checks of one repository blow up mid-flight.
struct PanickingRegistry {
    inner: FakeRegistry,
    poisoned: &'static str,
}

#[async_trait]
impl RegistryPort for PanickingRegistry {
    async fn list_tags(&self, image: &str) -> Result<Vec<String>, RegistryError> {
        if image == self.poisoned {
            panic!("registry client bug for {image}");
        }
        self.inner.list_tags(image).await
    }

    async fn get_tag_digest(&self, image_ref: &str, tag: &str) -> Result<String, RegistryError> {
        self.inner.get_tag_digest(image_ref, tag).await
    }
}

#[tokio::test]
async fn panicking_check_is_recorded_as_failed_row() {
    let runtime = FakeRuntime {
        containers: vec![
            container("web", "nginx:1.25.3", Some("web")),
            container("bad", "registry.example.com/team/bad:1.0.0", Some("bad")),
        ],
        ..FakeRuntime::default()
    };
    let registry = PanickingRegistry {
        inner: standard_registry(),
        poisoned: "registry.example.com/team/bad",
    };
    let checker = UpdateChecker::new(Arc::new(runtime), Arc::new(registry));

    let outcome = checker.check_for_updates(&CheckContext::new()).await;
    assert!(outcome.is_complete());
    let report = outcome.report;

    assert_eq!(report.total_checked, 2);
    assert_eq!(report.total_checked, report.updates.len());
    assert_eq!(report.failed, 1);

    let bad = by_name(&report.updates, "bad");
    assert_eq!(bad.status, CheckStatus::CheckFailed);
    assert_eq!(bad.service_name, "bad");
    assert!(!bad.error.is_empty());
    assert_eq!(by_name(&report.updates, "web").status, CheckStatus::UpdateAvailable);
}

#[tokio::test]
async fn tags_with_digests_leaves_out_failed_lookups() {
    let repo = "docker.io/library/nginx".to_string();
    let registry = FakeRegistry {
        tags: HashMap::from([(repo.clone(), tags(&["1.26.1", "1.25.3", "latest"]))]),
        digests: HashMap::from([
            ((repo.clone(), "1.26.1".to_string()), "sha256:aaa".to_string()),
            ((repo.clone(), "latest".to_string()), "sha256:aaa".to_string()),
        ]),
        ..FakeRegistry::default()
    };

    let mapped = registry
        .list_tags_with_digests(&repo)
        .await
        .expect("tag listing succeeds");

    assert_eq!(mapped.len(), 2);
    assert_eq!(mapped.get("1.26.1"), Some(&vec!["sha256:aaa".to_string()]));
    assert_eq!(mapped.get("latest"), Some(&vec!["sha256:aaa".to_string()]));
    assert!(!mapped.contains_key("1.25.3"));
    // one listing plus one lookup per tag
    assert_eq!(registry.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn tags_with_digests_propagates_listing_failure() {
    let registry = FakeRegistry {
        fail_calls: HashSet::from([1]),
        ..standard_registry()
    };
    let err = registry
        .list_tags_with_digests("docker.io/library/nginx")
        .await
        .expect_err("listing fails");
    assert!(matches!(err, RegistryError::Status { status: 503, .. }));
}
