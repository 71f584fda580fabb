use std::collections::BTreeMap;

use super::{BoardEdge, BoardNode, Handle, NodeKind, Position};

pub const GITHUB_ID: &str = "github";
pub const ECR_ID: &str = "ecr";
pub const ROUTE53_ID: &str = "route53";
pub const COGNITO_ID: &str = "cognito";
pub const APPSYNC_ID: &str = "appsync";
pub const ALB_ID: &str = "alb";
pub const ECS_CLUSTER_ID: &str = "ecs-cluster";
pub const BACKEND_SERVICE_ID: &str = "backend-service";
pub const POSTGRES_ID: &str = "postgres";
pub const S3_ID: &str = "s3";
pub const SES_ID: &str = "ses";
pub const SNS_ID: &str = "sns";
pub const SQS_ID: &str = "sqs";
pub const EVENTBRIDGE_ID: &str = "eventbridge";
pub const XRAY_ID: &str = "xray";
pub const CLOUDWATCH_ID: &str = "cloudwatch";

pub const ECS_CLUSTER_GROUP_ID: &str = "group-ecs-cluster";
pub const MESSAGING_GROUP_ID: &str = "group-messaging";
pub const DATA_GROUP_ID: &str = "group-data";
pub const FRONTEND_GROUP_ID: &str = "group-frontend";
pub const OBSERVABILITY_GROUP_ID: &str = "group-observability";

pub const ECS_CLUSTER_LABEL: &str = "ECS Cluster";
pub const MESSAGING_LABEL: &str = "Messaging";
pub const DATA_LABEL: &str = "Data";
pub const FRONTEND_LABEL: &str = "Frontend";
pub const OBSERVABILITY_LABEL: &str = "Observability";

/// First-run positions used when an environment has no saved positions.
const DEFAULT_POSITIONS: &[(&str, f64, f64)] = &[
    (GITHUB_ID, 0.0, 0.0),
    (ECR_ID, 240.0, 0.0),
    (ROUTE53_ID, 720.0, 0.0),
    (COGNITO_ID, 960.0, 0.0),
    (APPSYNC_ID, 1200.0, 0.0),
    (ALB_ID, 720.0, 180.0),
    (ECS_CLUSTER_ID, 240.0, 360.0),
    (BACKEND_SERVICE_ID, 480.0, 360.0),
    (POSTGRES_ID, 0.0, 360.0),
    (S3_ID, 0.0, 540.0),
    (SES_ID, 960.0, 360.0),
    (SNS_ID, 1200.0, 360.0),
    (SQS_ID, 960.0, 540.0),
    (EVENTBRIDGE_ID, 1200.0, 540.0),
    (XRAY_ID, 960.0, 720.0),
    (CLOUDWATCH_ID, 1200.0, 720.0),
];

pub fn default_positions() -> BTreeMap<&'static str, Position> {
    DEFAULT_POSITIONS
        .iter()
        .map(|(id, x, y)| (*id, Position::new(*x, *y)))
        .collect()
}

pub fn default_position(node_id: &str) -> Option<Position> {
    DEFAULT_POSITIONS
        .iter()
        .find(|(id, _, _)| *id == node_id)
        .map(|(_, x, y)| Position::new(*x, *y))
}

/// Moves every node listed in the default table back to its table position.
pub fn apply_default_positions(nodes: &[BoardNode]) -> Vec<BoardNode> {
    nodes
        .iter()
        .cloned()
        .map(|mut node| {
            if let Some(position) = default_position(&node.id) {
                node.position = position;
            }
            node
        })
        .collect()
}

pub fn static_nodes() -> Vec<BoardNode> {
    let at = |id: &str| default_position(id).unwrap_or_default();

    vec![
        BoardNode::container(ECS_CLUSTER_GROUP_ID, NodeKind::DynamicGroup, ECS_CLUSTER_LABEL),
        BoardNode::container(MESSAGING_GROUP_ID, NodeKind::Group, MESSAGING_LABEL),
        BoardNode::container(DATA_GROUP_ID, NodeKind::Group, DATA_LABEL),
        BoardNode::container(FRONTEND_GROUP_ID, NodeKind::DynamicGroup, FRONTEND_LABEL),
        BoardNode::container(OBSERVABILITY_GROUP_ID, NodeKind::Group, OBSERVABILITY_LABEL),
        BoardNode::service(GITHUB_ID, "GitHub Actions", "github", at(GITHUB_ID)).non_deletable(),
        BoardNode::service(ECR_ID, "ECR", "ecr", at(ECR_ID)).non_deletable(),
        BoardNode::service(ROUTE53_ID, "Route 53", "route53", at(ROUTE53_ID)),
        BoardNode::service(COGNITO_ID, "Cognito", "cognito", at(COGNITO_ID)),
        BoardNode::service(APPSYNC_ID, "AppSync Pub/Sub", "appsync", at(APPSYNC_ID)),
        BoardNode::service(ALB_ID, "Load Balancer", "alb", at(ALB_ID)),
        BoardNode::service(ECS_CLUSTER_ID, "ECS Cluster", "ecs", at(ECS_CLUSTER_ID))
            .in_group(ECS_CLUSTER_LABEL)
            .non_deletable(),
        BoardNode::service(
            BACKEND_SERVICE_ID,
            "Backend Service",
            "service",
            at(BACKEND_SERVICE_ID),
        )
        .in_group(ECS_CLUSTER_LABEL)
        .anchored()
        .non_deletable(),
        BoardNode::service(POSTGRES_ID, "PostgreSQL", "postgres", at(POSTGRES_ID))
            .in_group(DATA_LABEL),
        BoardNode::service(S3_ID, "S3", "s3", at(S3_ID)).in_group(DATA_LABEL),
        BoardNode::service(SES_ID, "SES", "ses", at(SES_ID)).in_subgroup(MESSAGING_LABEL),
        BoardNode::service(SNS_ID, "SNS", "sns", at(SNS_ID)).in_subgroup(MESSAGING_LABEL),
        BoardNode::service(SQS_ID, "SQS", "sqs", at(SQS_ID)).in_subgroup(MESSAGING_LABEL),
        BoardNode::service(EVENTBRIDGE_ID, "EventBridge", "eventbridge", at(EVENTBRIDGE_ID))
            .in_subgroup(MESSAGING_LABEL),
        BoardNode::service(XRAY_ID, "X-Ray", "xray", at(XRAY_ID)).in_group(OBSERVABILITY_LABEL),
        BoardNode::service(CLOUDWATCH_ID, "CloudWatch", "cloudwatch", at(CLOUDWATCH_ID))
            .in_group(OBSERVABILITY_LABEL),
    ]
}

pub fn static_edges() -> Vec<BoardEdge> {
    use Handle::{Bottom, Left, Right, Top};

    vec![
        BoardEdge::new(GITHUB_ID, ECR_ID)
            .with_handles(Right, Left)
            .with_label("push image"),
        BoardEdge::new(ECR_ID, BACKEND_SERVICE_ID).with_handles(Bottom, Top),
        BoardEdge::new(ECS_CLUSTER_ID, BACKEND_SERVICE_ID).with_handles(Right, Left),
        BoardEdge::new(ROUTE53_ID, ALB_ID).with_handles(Bottom, Top),
        BoardEdge::new(ALB_ID, BACKEND_SERVICE_ID).with_handles(Bottom, Top),
        BoardEdge::new(COGNITO_ID, BACKEND_SERVICE_ID).with_handles(Bottom, Right),
        BoardEdge::new(APPSYNC_ID, BACKEND_SERVICE_ID).with_handles(Bottom, Right),
        BoardEdge::new(BACKEND_SERVICE_ID, POSTGRES_ID).with_handles(Left, Right),
        BoardEdge::new(BACKEND_SERVICE_ID, S3_ID).with_handles(Left, Right),
        BoardEdge::new(BACKEND_SERVICE_ID, SES_ID).with_handles(Right, Left),
        BoardEdge::new(BACKEND_SERVICE_ID, SNS_ID).with_handles(Right, Left),
        BoardEdge::new(BACKEND_SERVICE_ID, SQS_ID).with_handles(Right, Left),
        BoardEdge::new(BACKEND_SERVICE_ID, XRAY_ID).with_handles(Bottom, Left),
        BoardEdge::new(BACKEND_SERVICE_ID, CLOUDWATCH_ID).with_handles(Bottom, Left),
    ]
}
