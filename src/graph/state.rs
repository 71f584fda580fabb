use std::collections::{BTreeMap, BTreeSet};

use crate::document::ConfigDocument;

use super::dynamic::{EntityKind, GITHUB_OIDC_NODE_ID, PGADMIN_NODE_ID};
use super::template;
use super::{BoardEdge, BoardNode};

pub const INACTIVE_EDGE_OPACITY: f64 = 0.3;
pub const INACTIVE_EDGE_STROKE: &str = "#b8c2cc";

/// Whether the AWS feature behind `node_id` is turned on in `document`.
///
/// Unknown ids are treated as structural and reported enabled.
pub fn is_enabled(node_id: &str, document: &ConfigDocument) -> bool {
    if let Some((kind, slug)) = EntityKind::parse_node_id(node_id) {
        return match kind {
            EntityKind::Service => document.service(slug).is_some_and(|service| service.enabled),
            EntityKind::ScheduledTask => document.scheduled_task(slug).is_some(),
            EntityKind::EventProcessorTask => document.event_processor_task(slug).is_some(),
            EntityKind::AmplifyApp => document.amplify_app(slug).is_some(),
        };
    }

    match node_id {
        template::SES_ID => document.ses.enabled,
        template::SQS_ID => document.sqs.enabled,
        template::SNS_ID => document.workload.setup_fcnsns,
        template::XRAY_ID => document.workload.xray_enabled,
        template::ALB_ID => document.alb.enabled,
        template::POSTGRES_ID => document.postgres.enabled,
        template::COGNITO_ID => document.cognito.enabled,
        template::ROUTE53_ID => document.domain.enabled,
        template::APPSYNC_ID => document.appsync.enabled,
        template::EVENTBRIDGE_ID => {
            !document.scheduled_tasks.is_empty() || !document.event_processor_tasks.is_empty()
        }
        PGADMIN_NODE_ID => document.workload.install_pg_admin,
        GITHUB_OIDC_NODE_ID => document.workload.enable_github_oidc,
        template::FRONTEND_GROUP_ID => !document.amplify_apps.is_empty(),
        _ => true,
    }
}

pub fn node_properties(node_id: &str, document: &ConfigDocument) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    let mut put = |key: &str, value: String| {
        if !value.trim().is_empty() {
            properties.insert(key.to_owned(), value);
        }
    };

    if let Some((kind, slug)) = EntityKind::parse_node_id(node_id) {
        match kind {
            EntityKind::Service => {
                if let Some(service) = document.service(slug) {
                    put("image", service.docker_image.clone());
                    put("port", opt_to_string(service.container_port));
                    put("cpu", opt_to_string(service.cpu));
                    put("memory", opt_to_string(service.memory));
                    put("desiredCount", opt_to_string(service.desired_count));
                    put("healthPath", service.health_path.clone());
                }
            }
            EntityKind::ScheduledTask => {
                if let Some(task) = document.scheduled_task(slug) {
                    put("schedule", task.schedule.clone());
                    put("image", task.external_docker_image.clone());
                    put("command", task.container_command.clone());
                }
            }
            EntityKind::EventProcessorTask => {
                if let Some(task) = document.event_processor_task(slug) {
                    put("rule", task.rule_name.clone());
                    put("sources", task.sources.join(", "));
                    put("detailTypes", task.detail_types.join(", "));
                    put("image", task.external_docker_image.clone());
                }
            }
            EntityKind::AmplifyApp => {
                if let Some(app) = document.amplify_app(slug) {
                    put("repository", app.github_repository.clone());
                    put("branch", app.branch.clone());
                    put("customDomain", app.custom_domain.clone().unwrap_or_default());
                }
            }
        }
        return properties;
    }

    match node_id {
        template::BACKEND_SERVICE_ID => {
            put("port", nonzero_to_string(document.workload.backend_image_port));
            put("health", document.workload.backend_health_endpoint.clone());
            put("image", document.workload.backend_external_docker_image.clone());
        }
        template::ECS_CLUSTER_ID => {
            put("project", document.project.clone());
            put("region", document.region.clone());
        }
        template::POSTGRES_ID => {
            put("database", document.postgres.dbname.clone());
            put("username", document.postgres.username.clone());
            put("engine", document.postgres.engine_version.clone());
            put("publicAccess", document.postgres.public_access.to_string());
        }
        template::SES_ID => {
            put("domain", document.ses.domain_name.clone());
            put("testEmails", document.ses.test_emails.len().to_string());
        }
        template::SQS_ID => put("queue", document.sqs.name.clone()),
        template::ROUTE53_ID => {
            put("domain", document.domain.domain_name.clone());
            put("createZone", document.domain.create_domain_zone.to_string());
        }
        template::COGNITO_ID => {
            put("webClient", document.cognito.enable_web_client.to_string());
            put(
                "dashboardClient",
                document.cognito.enable_dashboard_client.to_string(),
            );
        }
        template::EVENTBRIDGE_ID => {
            put("scheduledTasks", document.scheduled_tasks.len().to_string());
            put(
                "eventTasks",
                document.event_processor_tasks.len().to_string(),
            );
        }
        _ => {}
    }
    properties
}

pub fn node_description(node_id: &str, document: &ConfigDocument) -> Option<String> {
    if let Some((kind, slug)) = EntityKind::parse_node_id(node_id) {
        return match kind {
            EntityKind::Service => document.service(slug).map(|service| {
                match service.container_port {
                    Some(port) => format!("ECS service on port {port}"),
                    None => "ECS service".to_owned(),
                }
            }),
            EntityKind::ScheduledTask => document.scheduled_task(slug).map(|task| {
                format!(
                    "Scheduled task ({})",
                    non_empty_or(&task.schedule, "no schedule")
                )
            }),
            EntityKind::EventProcessorTask => document.event_processor_task(slug).map(|task| {
                format!(
                    "Event processor for rule {}",
                    non_empty_or(&task.rule_name, "unnamed")
                )
            }),
            EntityKind::AmplifyApp => document.amplify_app(slug).map(|app| {
                match app
                    .custom_domain
                    .as_deref()
                    .filter(|domain| !domain.trim().is_empty())
                {
                    Some(domain) => format!("Amplify app served at {domain}"),
                    None => "Amplify app".to_owned(),
                }
            }),
        };
    }

    let description = match node_id {
        template::BACKEND_SERVICE_ID => {
            if document.workload.backend_image_port > 0 {
                format!("Main backend on port {}", document.workload.backend_image_port)
            } else {
                "Main backend service".to_owned()
            }
        }
        template::ECS_CLUSTER_ID => format!(
            "Fargate cluster for {}",
            non_empty_or(&document.project, "project")
        ),
        template::POSTGRES_ID => format!(
            "RDS PostgreSQL {}",
            non_empty_or(&document.postgres.engine_version, "")
        )
        .trim_end()
        .to_owned(),
        template::SES_ID => format!(
            "Email from {}",
            non_empty_or(&document.ses.domain_name, "default domain")
        ),
        template::SQS_ID => format!("Queue {}", non_empty_or(&document.sqs.name, "default")),
        template::SNS_ID => "Push notifications".to_owned(),
        template::XRAY_ID => "Distributed tracing".to_owned(),
        template::ALB_ID => "Application load balancer".to_owned(),
        template::ROUTE53_ID => format!(
            "DNS for {}",
            non_empty_or(&document.domain.domain_name, "no domain")
        ),
        template::COGNITO_ID => "User pool authentication".to_owned(),
        template::APPSYNC_ID => "Realtime pub/sub API".to_owned(),
        template::EVENTBRIDGE_ID => "Schedules and event rules".to_owned(),
        template::GITHUB_ID => "CI/CD pipeline".to_owned(),
        template::ECR_ID => "Container image registry".to_owned(),
        _ => return None,
    };
    Some(description)
}

fn opt_to_string<T: ToString>(value: Option<T>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}

fn nonzero_to_string(value: u16) -> String {
    if value == 0 {
        String::new()
    } else {
        value.to_string()
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() { fallback } else { trimmed }
}

/// Returns a copy of `nodes` with `disabled`, `description` and `properties` derived from
/// `document`. Nothing else on the nodes changes.
pub fn apply_node_states(nodes: &[BoardNode], document: &ConfigDocument) -> Vec<BoardNode> {
    nodes
        .iter()
        .cloned()
        .map(|mut node| {
            node.data.disabled = !is_enabled(&node.id, document);
            if !node.is_container() {
                node.data.description = node_description(&node.id, document);
                node.data.properties = node_properties(&node.id, document);
            }
            node
        })
        .collect()
}

/// Dims and stops animating every edge touching a disabled node.
pub fn apply_edge_states(edges: &[BoardEdge], nodes: &[BoardNode]) -> Vec<BoardEdge> {
    let disabled = nodes
        .iter()
        .filter(|node| node.data.disabled)
        .map(|node| node.id.as_str())
        .collect::<BTreeSet<_>>();

    edges
        .iter()
        .cloned()
        .map(|mut edge| {
            let active = !disabled.contains(edge.source.as_str())
                && !disabled.contains(edge.target.as_str());
            edge.animated = active;
            edge.style = if active {
                super::EdgeStyle::default()
            } else {
                super::EdgeStyle {
                    stroke: INACTIVE_EDGE_STROKE.to_owned(),
                    opacity: INACTIVE_EDGE_OPACITY,
                    ..super::EdgeStyle::default()
                }
            };
            edge
        })
        .collect()
}

/// Visible nodes and edges for rendering. Disabled nodes are hidden only when
/// `show_inactive` is false; edges are always limited to visible endpoints.
pub fn visible_subgraph(
    nodes: &[BoardNode],
    edges: &[BoardEdge],
    show_inactive: bool,
) -> (Vec<BoardNode>, Vec<BoardEdge>) {
    let visible_nodes = nodes
        .iter()
        .filter(|node| show_inactive || !node.data.disabled)
        .cloned()
        .collect::<Vec<_>>();
    let visible_edges = super::retain_connected_edges(edges.to_vec(), &visible_nodes);
    (visible_nodes, visible_edges)
}

#[cfg(test)]
mod tests {
    use crate::document::ConfigDocument;
    use crate::graph::assemble_board_graph;
    use crate::test_support::SAMPLE_CONFIG_YAML;

    use super::{
        INACTIVE_EDGE_OPACITY, apply_edge_states, apply_node_states, is_enabled,
        node_description, node_properties, visible_subgraph,
    };

    fn sample() -> ConfigDocument {
        ConfigDocument::from_yaml_str(SAMPLE_CONFIG_YAML).expect("sample parses")
    }

    #[test]
    fn feature_nodes_follow_their_toggles() {
        let document = sample();
        assert!(is_enabled("ses", &document));
        assert!(!is_enabled("sqs", &document));
        assert!(!is_enabled("sns", &document));
        assert!(is_enabled("xray", &document));
        assert!(is_enabled("alb", &document));
        assert!(!is_enabled("cognito", &document));
        assert!(is_enabled("eventbridge", &document));
    }

    #[test]
    fn structural_and_unknown_nodes_are_enabled() {
        let document = ConfigDocument::default();
        for id in ["ecs-cluster", "backend-service", "ecr", "github", "not-a-known-node"] {
            assert!(is_enabled(id, &document), "{id} should be enabled");
        }
    }

    #[test]
    fn generated_nodes_require_their_backing_entity() {
        let mut document = sample();
        assert!(is_enabled("service-worker", &document));
        assert!(is_enabled("amplify-storefront", &document));
        assert!(!is_enabled("service-ghost", &document));

        document.services[0].enabled = false;
        assert!(!is_enabled("service-worker", &document));
    }

    #[test]
    fn evaluation_is_repeatable_for_every_node() {
        let document = sample();
        let graph = assemble_board_graph(&document, "dev");
        for node in &graph.nodes {
            assert_eq!(
                is_enabled(&node.id, &document),
                is_enabled(&node.id, &document)
            );
            assert_eq!(
                node_properties(&node.id, &document),
                node_properties(&node.id, &document)
            );
            assert_eq!(
                node_description(&node.id, &document),
                node_description(&node.id, &document)
            );
        }
    }

    #[test]
    fn properties_and_descriptions_summarize_config() {
        let document = sample();
        let worker = node_properties("service-worker", &document);
        assert_eq!(worker.get("port").map(String::as_str), Some("9000"));
        assert_eq!(worker.get("cpu").map(String::as_str), Some("256"));
        assert!(!worker.contains_key("image"), "empty values are omitted");

        assert_eq!(
            node_description("scheduled-nightly-report", &document).as_deref(),
            Some("Scheduled task (rate(1 hour))")
        );
        assert_eq!(
            node_description("postgres", &document).as_deref(),
            Some("RDS PostgreSQL 16")
        );
        assert_eq!(node_description("hidden-ssm-parameters", &document), None);
    }

    #[test]
    fn disabling_ses_dims_its_edges_without_removing_them() {
        let mut document = sample();
        let graph = assemble_board_graph(&document, "dev");

        let nodes = apply_node_states(&graph.nodes, &document);
        let edges = apply_edge_states(&graph.edges, &nodes);
        let ses_edge = edges
            .iter()
            .find(|edge| edge.target == "ses")
            .expect("ses edge should exist");
        assert!(ses_edge.animated);
        assert_eq!(ses_edge.style.opacity, 1.0);

        document.ses.enabled = false;
        let nodes = apply_node_states(&graph.nodes, &document);
        let edges = apply_edge_states(&graph.edges, &nodes);

        let ses = nodes
            .iter()
            .find(|node| node.id == "ses")
            .expect("ses node should still be present");
        assert!(ses.data.disabled);
        assert_eq!(nodes.len(), graph.nodes.len());
        assert_eq!(edges.len(), graph.edges.len());
        for edge in edges.iter().filter(|edge| edge.source == "ses" || edge.target == "ses") {
            assert!(!edge.animated);
            assert_eq!(edge.style.opacity, INACTIVE_EDGE_OPACITY);
        }

        let (visible_nodes, visible_edges) = visible_subgraph(&nodes, &edges, true);
        assert!(visible_nodes.iter().any(|node| node.id == "ses"));
        assert!(visible_edges.iter().any(|edge| edge.target == "ses"));

        let (visible_nodes, visible_edges) = visible_subgraph(&nodes, &edges, false);
        assert!(!visible_nodes.iter().any(|node| node.id == "ses"));
        assert!(!visible_edges.iter().any(|edge| edge.target == "ses"));
    }
}
