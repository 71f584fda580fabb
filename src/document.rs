use std::fs;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

/// Environment configuration as read from `<env>.yaml`.
///
/// The board never mutates a document; every edit produces a new document that is
/// handed to [`crate::board::BoardState`] as a whole.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigDocument {
    pub project: String,
    pub env: String,
    pub is_prod: bool,
    pub region: String,
    pub workload: Workload,
    pub domain: Domain,
    pub postgres: Postgres,
    pub cognito: Cognito,
    pub ses: Ses,
    pub sqs: Sqs,
    pub alb: Alb,
    #[serde(rename = "pubsub_appsync")]
    pub appsync: AppSync,
    pub services: Vec<ServiceConfig>,
    pub scheduled_tasks: Vec<ScheduledTask>,
    pub event_processor_tasks: Vec<EventProcessorTask>,
    pub amplify_apps: Vec<AmplifyApp>,
    pub buckets: Vec<BucketConfig>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Workload {
    pub backend_health_endpoint: String,
    pub backend_external_docker_image: String,
    pub backend_image_port: u16,
    pub setup_fcnsns: bool,
    pub xray_enabled: bool,
    pub enable_github_oidc: bool,
    pub install_pg_admin: bool,
    pub slack_webhook: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Domain {
    pub enabled: bool,
    pub create_domain_zone: bool,
    pub domain_name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Postgres {
    pub enabled: bool,
    pub dbname: String,
    pub username: String,
    pub public_access: bool,
    pub engine_version: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Cognito {
    pub enabled: bool,
    pub enable_web_client: bool,
    pub enable_dashboard_client: bool,
    pub enable_user_pool_domain: bool,
    pub user_pool_domain_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Ses {
    pub enabled: bool,
    pub domain_name: String,
    pub test_emails: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Sqs {
    pub enabled: bool,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Alb {
    pub enabled: bool,
    pub certificate_arn: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSync {
    pub enabled: bool,
    pub schema: bool,
    pub auth_lambda: bool,
    pub resolvers: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub enabled: bool,
    pub docker_image: String,
    pub container_port: Option<u16>,
    pub cpu: Option<u32>,
    pub memory: Option<u32>,
    pub desired_count: Option<u32>,
    pub health_path: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            enabled: true,
            docker_image: String::new(),
            container_port: None,
            cpu: None,
            memory: None,
            desired_count: None,
            health_path: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduledTask {
    pub name: String,
    pub schedule: String,
    #[serde(rename = "docker_image")]
    pub external_docker_image: String,
    pub container_command: String,
    pub allow_public_access: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventProcessorTask {
    pub name: String,
    pub rule_name: String,
    pub detail_types: Vec<String>,
    pub sources: Vec<String>,
    #[serde(rename = "docker_image")]
    pub external_docker_image: String,
    pub container_command: String,
    pub allow_public_access: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AmplifyApp {
    pub name: String,
    pub github_repository: String,
    pub branch: String,
    pub custom_domain: Option<String>,
    pub subdomain_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketConfig {
    pub name: String,
    pub public: bool,
}

impl ConfigDocument {
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let document =
            serde_yaml::from_str::<Self>(raw).context("failed to parse config document")?;
        document.validate()?;
        Ok(document)
    }

    pub fn service(&self, slug: &str) -> Option<&ServiceConfig> {
        self.services
            .iter()
            .find(|service| crate::graph::dynamic::slugify(&service.name) == slug)
    }

    pub fn scheduled_task(&self, slug: &str) -> Option<&ScheduledTask> {
        self.scheduled_tasks
            .iter()
            .find(|task| crate::graph::dynamic::slugify(&task.name) == slug)
    }

    pub fn event_processor_task(&self, slug: &str) -> Option<&EventProcessorTask> {
        self.event_processor_tasks
            .iter()
            .find(|task| crate::graph::dynamic::slugify(&task.name) == slug)
    }

    pub fn amplify_app(&self, slug: &str) -> Option<&AmplifyApp> {
        self.amplify_apps
            .iter()
            .find(|app| crate::graph::dynamic::slugify(&app.name) == slug)
    }

    fn validate(&self) -> Result<()> {
        let named = self
            .services
            .iter()
            .map(|service| ("services", service.name.as_str()))
            .chain(
                self.scheduled_tasks
                    .iter()
                    .map(|task| ("scheduled_tasks", task.name.as_str())),
            )
            .chain(
                self.event_processor_tasks
                    .iter()
                    .map(|task| ("event_processor_tasks", task.name.as_str())),
            )
            .chain(
                self.amplify_apps
                    .iter()
                    .map(|app| ("amplify_apps", app.name.as_str())),
            );
        for (section, name) in named {
            ensure!(
                !crate::graph::dynamic::slugify(name).is_empty(),
                "{section} entry has an empty or unusable name: `{name}`"
            );
        }
        Ok(())
    }
}

pub fn load_config_document(path: &Path) -> Result<ConfigDocument> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config document `{}`", path.display()))?;
    ConfigDocument::from_yaml_str(&raw)
        .with_context(|| format!("invalid config document `{}`", path.display()))
}
