use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

pub const SAMPLE_CONFIG_YAML: &str = r#"
project: shop
env: dev
region: us-east-1
workload:
  backend_image_port: 8080
  backend_health_endpoint: /health
  xray_enabled: true
  setup_fcnsns: false
  install_pg_admin: false
  enable_github_oidc: true
domain:
  enabled: true
  domain_name: example.com
postgres:
  enabled: true
  dbname: shop
  username: shop
  engine_version: "16"
cognito:
  enabled: false
ses:
  enabled: true
  domain_name: mail.example.com
sqs:
  enabled: false
alb:
  enabled: true
services:
  - name: worker
    container_port: 9000
    cpu: 256
    memory: 512
scheduled_tasks:
  - name: nightly-report
    schedule: rate(1 hour)
    docker_image: shop/report:latest
event_processor_tasks:
  - name: order-events
    rule_name: orders
    detail_types: [OrderPlaced]
    sources: [shop.orders]
amplify_apps:
  - name: storefront
    github_repository: acme/storefront
    branch: main
    custom_domain: app.example.com
buckets:
  - name: uploads
    public: false
"#;

pub fn temp_path(prefix: &str) -> PathBuf {
    let now_ns = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "infra_board_{prefix}_{}_{}",
        std::process::id(),
        now_ns
    ))
}

pub fn remove_dir_if_exists(path: &Path) {
    let _ = std::fs::remove_dir_all(path);
}

/// Points a spawned `infra_board` process at `positions_dir` with fast debounce timers.
pub fn apply_board_test_env(command: &mut Command, positions_dir: &Path, api_base_url: &str) {
    command
        .env("BOARD_POSITIONS_DIR", positions_dir)
        .env("BOARD_API_BASE_URL", api_base_url)
        .env("BOARD_POSITION_SAVE_DEBOUNCE_MS", "20")
        .env("BOARD_HANDLE_SAVE_DEBOUNCE_MS", "20")
        .env("BOARD_HTTP_TIMEOUT_MS", "2000")
        .env("BOARD_SHOW_INACTIVE", "true")
        .env_remove("BOARD_LOG_DIR")
        .env("RUST_LOG", "warn");
}
