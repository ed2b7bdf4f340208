// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates a commented cloudrun-deploy.yml starter file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, Settings};

/// Write a starter config into `dir`, refusing to overwrite unless `force`.
pub fn init_config(dir: &Path, project: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let settings = Settings::template().with_overrides(project, None)?;
    std::fs::write(&config_path, generate_template_yaml(&settings))?;

    Ok(config_path)
}

fn generate_template_yaml(settings: &Settings) -> String {
    let project = match &settings.project {
        Some(project) => format!("project: {project}"),
        None => "# project: my-project".to_string(),
    };
    format!(
        r#"{project}
region: {region}
# Deploy services publicly reachable (invoker IAM check disabled).
skip_iam_check: {skip}
timings:
  poll_interval: {poll}
  log_propagation_delay: {logs}
  activation_retry_delay: {activation}
gcp:
  request_timeout: {timeout}
  operation_poll_interval: {operation}
"#,
        region = settings.region,
        skip = settings.skip_iam_check,
        poll = human(settings.timings.poll_interval),
        logs = human(settings.timings.log_propagation_delay),
        activation = human(settings.timings.activation_retry_delay),
        timeout = human(settings.gcp.request_timeout),
        operation = human(settings.gcp.operation_poll_interval),
    )
}

/// Render a duration the way humantime parses it back.
fn human(duration: Duration) -> String {
    if duration.subsec_millis() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
