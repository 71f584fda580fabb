use std::collections::BTreeSet;

use crate::document::ConfigDocument;

use super::template::{
    ALB_ID, DATA_LABEL, ECR_ID, ECS_CLUSTER_LABEL, EVENTBRIDGE_ID, FRONTEND_LABEL, GITHUB_ID,
    OBSERVABILITY_LABEL, ROUTE53_ID, S3_ID, default_position,
};
use super::{BoardEdge, BoardNode, Handle, Position};

pub const DYNAMIC_NODE_SPACING_X: f64 = 180.0;
pub const DYNAMIC_NODE_SPACING_Y: f64 = 120.0;

pub const LOG_GROUP_NODE_ID: &str = "hidden-log-group";
pub const SSM_PARAMETERS_NODE_ID: &str = "hidden-ssm-parameters";
pub const PGADMIN_NODE_ID: &str = "hidden-pgadmin";
pub const GITHUB_OIDC_NODE_ID: &str = "hidden-github-oidc";

/// Config entity kinds that each produce one generated node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Service,
    ScheduledTask,
    EventProcessorTask,
    AmplifyApp,
}

impl EntityKind {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::ScheduledTask => "scheduled",
            Self::EventProcessorTask => "event",
            Self::AmplifyApp => "amplify",
        }
    }

    fn lane(self) -> usize {
        match self {
            Self::Service => 0,
            Self::ScheduledTask => 1,
            Self::EventProcessorTask => 2,
            Self::AmplifyApp => 3,
        }
    }

    fn node_type(self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::ScheduledTask => "scheduled-task",
            Self::EventProcessorTask => "event-task",
            Self::AmplifyApp => "amplify",
        }
    }

    fn group_label(self) -> &'static str {
        match self {
            Self::AmplifyApp => FRONTEND_LABEL,
            Self::Service | Self::ScheduledTask | Self::EventProcessorTask => ECS_CLUSTER_LABEL,
        }
    }

    /// Splits a generated node id back into its kind and slug.
    pub fn parse_node_id(node_id: &str) -> Option<(Self, &str)> {
        [
            Self::Service,
            Self::ScheduledTask,
            Self::EventProcessorTask,
            Self::AmplifyApp,
        ]
        .into_iter()
        .find_map(|kind| {
            node_id
                .strip_prefix(kind.prefix())
                .and_then(|rest| rest.strip_prefix('-'))
                .filter(|slug| !slug.is_empty())
                .map(|slug| (kind, slug))
        })
    }
}

pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Id of the node generated for a named config entity.
///
/// The id depends on nothing but the kind and the name, so an entity keeps its id (and its
/// saved position) across regenerations. Renaming is a delete followed by a create.
pub fn entity_node_id(kind: EntityKind, name: &str) -> String {
    format!("{}-{}", kind.prefix(), slugify(name))
}

fn staggered_position(anchor: Position, kind: EntityKind, index: usize) -> Position {
    anchor.offset(
        index as f64 * DYNAMIC_NODE_SPACING_X,
        (kind.lane() + 1) as f64 * DYNAMIC_NODE_SPACING_Y,
    )
}

fn entity_node(kind: EntityKind, name: &str, index: usize, anchor: Position) -> BoardNode {
    BoardNode::service(
        entity_node_id(kind, name),
        name.trim(),
        kind.node_type(),
        staggered_position(anchor, kind, index),
    )
    .in_group(kind.group_label())
}

pub fn generate_service_nodes(document: &ConfigDocument, anchor: Position) -> Vec<BoardNode> {
    let mut nodes = Vec::new();
    let mut seen = BTreeSet::new();
    let mut push_unique = |node: BoardNode, nodes: &mut Vec<BoardNode>| {
        if seen.insert(node.id.clone()) {
            nodes.push(node);
        }
    };

    for (index, service) in document.services.iter().enumerate() {
        push_unique(
            entity_node(EntityKind::Service, &service.name, index, anchor),
            &mut nodes,
        );
    }
    for (index, task) in document.scheduled_tasks.iter().enumerate() {
        push_unique(
            entity_node(EntityKind::ScheduledTask, &task.name, index, anchor),
            &mut nodes,
        );
    }
    for (index, task) in document.event_processor_tasks.iter().enumerate() {
        push_unique(
            entity_node(EntityKind::EventProcessorTask, &task.name, index, anchor),
            &mut nodes,
        );
    }
    for (index, app) in document.amplify_apps.iter().enumerate() {
        push_unique(
            entity_node(EntityKind::AmplifyApp, &app.name, index, anchor),
            &mut nodes,
        );
    }

    nodes
}

/// Nodes for infrastructure the environment creates implicitly rather than as a named entity.
pub fn generate_hidden_component_nodes(
    document: &ConfigDocument,
    environment: &str,
) -> Vec<BoardNode> {
    let project = if document.project.trim().is_empty() {
        "app"
    } else {
        document.project.trim()
    };
    let near = |id: &str, dx: f64, dy: f64| {
        default_position(id)
            .unwrap_or_default()
            .offset(dx, dy)
    };

    let mut nodes = vec![
        BoardNode::service(
            LOG_GROUP_NODE_ID,
            format!("/ecs/{project}-{environment}"),
            "log-group",
            near(super::template::CLOUDWATCH_ID, 0.0, DYNAMIC_NODE_SPACING_Y),
        )
        .in_group(OBSERVABILITY_LABEL),
        BoardNode::service(
            SSM_PARAMETERS_NODE_ID,
            format!("/{environment}/{project}/backend"),
            "ssm",
            near(ECR_ID, 0.0, 180.0),
        ),
    ];

    if document.workload.install_pg_admin {
        nodes.push(
            BoardNode::service(
                PGADMIN_NODE_ID,
                "pgAdmin",
                "pgadmin",
                near(super::template::ECS_CLUSTER_ID, 0.0, DYNAMIC_NODE_SPACING_Y),
            )
            .in_group(ECS_CLUSTER_LABEL),
        );
    }

    if document.workload.enable_github_oidc {
        nodes.push(BoardNode::service(
            GITHUB_OIDC_NODE_ID,
            "GitHub OIDC Role",
            "iam-role",
            near(GITHUB_ID, 0.0, 180.0),
        ));
    }

    let mut seen = BTreeSet::new();
    for (index, bucket) in document.buckets.iter().enumerate() {
        let slug = slugify(&bucket.name);
        if slug.is_empty() || !seen.insert(slug.clone()) {
            continue;
        }
        nodes.push(
            BoardNode::service(
                format!("bucket-{slug}"),
                format!("{project}-{environment}-{slug}"),
                "s3-bucket",
                near(S3_ID, 0.0, (index + 1) as f64 * DYNAMIC_NODE_SPACING_Y),
            )
            .in_group(DATA_LABEL),
        );
    }

    nodes
}

pub fn generate_dynamic_edges(document: &ConfigDocument) -> Vec<BoardEdge> {
    let mut edges = Vec::new();

    for service in &document.services {
        let id = entity_node_id(EntityKind::Service, &service.name);
        edges.push(BoardEdge::new(ECR_ID, &id).with_handles(Handle::Bottom, Handle::Top));
        if document.alb.enabled && service.container_port.is_some() {
            edges.push(BoardEdge::new(ALB_ID, &id).with_handles(Handle::Bottom, Handle::Top));
        }
    }
    for task in &document.scheduled_tasks {
        let id = entity_node_id(EntityKind::ScheduledTask, &task.name);
        let edge = BoardEdge::new(EVENTBRIDGE_ID, &id).with_handles(Handle::Left, Handle::Right);
        edges.push(if task.schedule.trim().is_empty() {
            edge
        } else {
            edge.with_label(task.schedule.trim())
        });
    }
    for task in &document.event_processor_tasks {
        let id = entity_node_id(EntityKind::EventProcessorTask, &task.name);
        edges.push(
            BoardEdge::new(EVENTBRIDGE_ID, &id).with_handles(Handle::Left, Handle::Right),
        );
    }
    for app in &document.amplify_apps {
        let has_domain = app
            .custom_domain
            .as_deref()
            .is_some_and(|domain| !domain.trim().is_empty());
        if has_domain {
            let id = entity_node_id(EntityKind::AmplifyApp, &app.name);
            edges.push(BoardEdge::new(&id, ROUTE53_ID).with_handles(Handle::Top, Handle::Bottom));
        }
    }
    for bucket in &document.buckets {
        let slug = slugify(&bucket.name);
        if !slug.is_empty() {
            edges.push(
                BoardEdge::new(S3_ID, format!("bucket-{slug}"))
                    .with_handles(Handle::Bottom, Handle::Top),
            );
        }
    }

    edges
}

/// Appends `child_ids` to a dynamic group's membership, skipping ids already present.
pub fn update_group_membership(group: &BoardNode, child_ids: &[String]) -> BoardNode {
    let mut updated = group.clone();
    let mut seen = updated
        .data
        .node_ids
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>();
    for child_id in child_ids {
        if seen.insert(child_id.clone()) {
            updated.data.node_ids.push(child_id.clone());
        }
    }
    updated
}

#[cfg(test)]
mod tests {
    use crate::document::{ConfigDocument, ServiceConfig};
    use crate::graph::template::ECS_CLUSTER_GROUP_ID;
    use crate::graph::{BoardNode, NodeKind, Position};
    use crate::test_support::SAMPLE_CONFIG_YAML;

    use super::{
        EntityKind, entity_node_id, generate_dynamic_edges, generate_hidden_component_nodes,
        generate_service_nodes, slugify, update_group_membership,
    };

    #[test]
    fn slugify_collapses_separators_and_lowercases() {
        assert_eq!(slugify("worker"), "worker");
        assert_eq!(slugify("  Image  Resizer__v2 "), "image-resizer-v2");
        assert_eq!(slugify("--api--"), "api");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn entity_ids_round_trip_through_parse() {
        let id = entity_node_id(EntityKind::ScheduledTask, "Nightly Report");
        assert_eq!(id, "scheduled-nightly-report");
        assert_eq!(
            EntityKind::parse_node_id(&id),
            Some((EntityKind::ScheduledTask, "nightly-report"))
        );
        assert_eq!(EntityKind::parse_node_id("service-"), None);
        assert_eq!(EntityKind::parse_node_id("ses"), None);
    }

    #[test]
    fn single_service_generates_service_worker_node() {
        let document = ConfigDocument {
            services: vec![ServiceConfig {
                name: "worker".to_owned(),
                ..ServiceConfig::default()
            }],
            ..ConfigDocument::default()
        };

        let nodes = generate_service_nodes(&document, Position::new(480.0, 360.0));
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, "service-worker");
        assert_eq!(nodes[0].kind, NodeKind::Service);
        assert_eq!(nodes[0].position, Position::new(480.0, 480.0));
        assert_eq!(nodes[0].data.group.as_deref(), Some("ECS Cluster"));
    }

    #[test]
    fn generated_nodes_are_staggered_per_lane() {
        let document = ConfigDocument::from_yaml_str(
            "services:\n  - name: a\n  - name: b\nscheduled_tasks:\n  - name: c\n",
        )
        .expect("document should parse");

        let nodes = generate_service_nodes(&document, Position::default());
        let positions = nodes.iter().map(|node| node.position).collect::<Vec<_>>();
        assert_eq!(
            positions,
            vec![
                Position::new(0.0, 120.0),
                Position::new(180.0, 120.0),
                Position::new(0.0, 240.0),
            ]
        );
    }

    #[test]
    fn unrelated_edits_keep_generated_ids_stable() {
        let before = ConfigDocument::from_yaml_str(SAMPLE_CONFIG_YAML).expect("sample parses");
        let mut after = before.clone();
        after.services[0].container_port = Some(9100);
        after.scheduled_tasks[0].schedule = "rate(5 minutes)".to_owned();

        let ids = |document: &ConfigDocument| {
            generate_service_nodes(document, Position::default())
                .into_iter()
                .map(|node| node.id)
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(&before), ids(&after));
    }

    #[test]
    fn renaming_an_entity_changes_its_id() {
        let before = ConfigDocument::from_yaml_str(SAMPLE_CONFIG_YAML).expect("sample parses");
        let mut after = before.clone();
        after.services[0].name = "worker-v2".to_owned();

        let nodes = generate_service_nodes(&after, Position::default());
        assert!(nodes.iter().any(|node| node.id == "service-worker-v2"));
        assert!(!nodes.iter().any(|node| node.id == "service-worker"));
    }

    #[test]
    fn hidden_components_follow_feature_flags_and_environment() {
        let mut document =
            ConfigDocument::from_yaml_str(SAMPLE_CONFIG_YAML).expect("sample parses");
        let nodes = generate_hidden_component_nodes(&document, "dev");

        let labels = nodes
            .iter()
            .map(|node| node.data.label.as_str())
            .collect::<Vec<_>>();
        assert!(labels.contains(&"/ecs/shop-dev"));
        assert!(labels.contains(&"/dev/shop/backend"));
        assert!(labels.contains(&"shop-dev-uploads"));
        assert!(nodes.iter().any(|node| node.id == "hidden-github-oidc"));
        assert!(!nodes.iter().any(|node| node.id == "hidden-pgadmin"));

        document.workload.install_pg_admin = true;
        let nodes = generate_hidden_component_nodes(&document, "prod");
        assert!(nodes.iter().any(|node| node.id == "hidden-pgadmin"));
        assert!(nodes.iter().any(|node| node.data.label == "/ecs/shop-prod"));
    }

    #[test]
    fn amplify_edges_only_for_custom_domains() {
        let document = ConfigDocument::from_yaml_str(
            "amplify_apps:\n  - name: site\n    custom_domain: site.example.com\n  - name: admin\n",
        )
        .expect("document should parse");

        let edges = generate_dynamic_edges(&document);
        let amplify_edges = edges
            .iter()
            .filter(|edge| edge.source.starts_with("amplify-"))
            .map(|edge| edge.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(amplify_edges, vec!["edge-amplify-site-route53"]);
    }

    #[test]
    fn alb_edge_requires_enabled_alb_and_exposed_port() {
        let mut document =
            ConfigDocument::from_yaml_str(SAMPLE_CONFIG_YAML).expect("sample parses");
        assert!(
            generate_dynamic_edges(&document)
                .iter()
                .any(|edge| edge.id == "edge-alb-service-worker")
        );

        document.alb.enabled = false;
        assert!(
            !generate_dynamic_edges(&document)
                .iter()
                .any(|edge| edge.id == "edge-alb-service-worker")
        );
    }

    #[test]
    fn update_group_membership_appends_without_duplicates() {
        let mut group =
            BoardNode::container(ECS_CLUSTER_GROUP_ID, NodeKind::DynamicGroup, "ECS Cluster");
        group.data.node_ids = vec!["service-a".to_owned(), "service-b".to_owned()];

        let updated = update_group_membership(
            &group,
            &[
                "service-b".to_owned(),
                "service-c".to_owned(),
                "service-c".to_owned(),
            ],
        );

        assert_eq!(
            updated.data.node_ids,
            vec!["service-a", "service-b", "service-c"]
        );
        assert_eq!(group.data.node_ids.len(), 2, "input must not be mutated");
        assert_eq!(updated.data.label, group.data.label);
    }
}
