use crate::domain::Container;

pub const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";
pub const PODMAN_COMPOSE_SERVICE_LABEL: &str = "io.podman.compose.service";
pub const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";

/// Compose service a container belongs to, or an empty string.
#[must_use]
pub fn extract_service_name(container: &Container) -> String {
    [COMPOSE_SERVICE_LABEL, PODMAN_COMPOSE_SERVICE_LABEL]
        .iter()
        .find_map(|label| container.labels.get(*label))
        .cloned()
        .unwrap_or_default()
}

/// Service names of the containers named in `names`, skipping containers
/// that are not part of a compose project.
#[must_use]
pub fn extract_service_names(containers: &[Container], names: &[String]) -> Vec<String> {
    containers
        .iter()
        .filter(|c| names.contains(&c.name))
        .map(extract_service_name)
        .filter(|svc| !svc.is_empty())
        .collect()
}

#[must_use]
pub fn extract_project_name(container: &Container) -> String {
    container
        .labels
        .get(COMPOSE_PROJECT_LABEL)
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn container(name: &str, labels: &[(&str, &str)]) -> Container {
        Container {
            id: format!("{name}-id"),
            name: name.to_string(),
            image: "nginx:latest".to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn service_label_present() {
        let c = container("web-1", &[(COMPOSE_SERVICE_LABEL, "web")]);
        assert_eq!(extract_service_name(&c), "web");
    }

    #[test]
    fn podman_compose_label_is_a_fallback() {
        let c = container("db-1", &[(PODMAN_COMPOSE_SERVICE_LABEL, "db")]);
        assert_eq!(extract_service_name(&c), "db");
    }

    #[test]
    fn no_label_gives_empty_name() {
        assert_eq!(extract_service_name(&container("plain", &[])), "");
    }

    #[test]
    fn collects_only_named_containers_with_services() {
        let containers = vec![
            container("web-1", &[(COMPOSE_SERVICE_LABEL, "web")]),
            container("db-1", &[(COMPOSE_SERVICE_LABEL, "db")]),
            container("plain", &[]),
        ];
        let names = vec!["web-1".to_string(), "plain".to_string()];
        assert_eq!(extract_service_names(&containers, &names), vec!["web"]);
    }

    #[test]
    fn project_name_from_label() {
        let c = container("web-1", &[(COMPOSE_PROJECT_LABEL, "blog")]);
        assert_eq!(extract_project_name(&c), "blog");
        assert_eq!(extract_project_name(&container("x", &[])), "");
    }
}
