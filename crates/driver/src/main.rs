use anyhow::{Context, Result};
use clap::Parser;
use quobyte_csi::{
  backend::QuobyteConnector,
  config::{self, DriverConfig, VolumeDefaults},
  server::{self, Endpoint},
  QuobyteController,
};
use std::{sync::Arc, time::Duration};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Quobyte CSI controller plugin
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
  /// CSI endpoint, unix://<path> or tcp://<ip>:<port>
  #[arg(long, env = "CSI_ENDPOINT", default_value = server::DEFAULT_ENDPOINT)]
  csi_endpoint: String,

  /// Quobyte API URL, e.g. http://quobyte-api.quobyte:7860
  #[arg(long, env = "QUOBYTE_API_URL")]
  quobyte_api_url: String,

  /// Driver name reported to the CO
  #[arg(long, env = "DRIVER_NAME", default_value = config::DEFAULT_DRIVER_NAME)]
  driver_name: String,

  /// Driver version reported to the CO
  #[arg(long, env = "DRIVER_VERSION", default_value = env!("CARGO_PKG_VERSION"))]
  driver_version: String,

  /// Use the PVC namespace as Quobyte tenant (requires csi-provisioner
  /// with --extra-create-metadata)
  #[arg(long, env = "USE_K8S_NAMESPACE_AS_TENANT")]
  use_k8s_namespace_as_tenant: bool,

  /// Tenant used when the storage class does not name one
  #[arg(long, env = "DEFAULT_TENANT", default_value = config::DEFAULT_TENANT)]
  default_tenant: String,

  /// Volume configuration used when the storage class does not name one
  #[arg(long, env = "DEFAULT_CONFIG", default_value = config::DEFAULT_CONFIGURATION)]
  default_config: String,

  /// Timeout for a single Quobyte API call, in seconds
  #[arg(long, env = "API_TIMEOUT_SECS", default_value = "30")]
  api_timeout_secs: u64,

  /// Log level (trace, debug, info, warn, error)
  #[arg(long, env = "LOG_LEVEL", default_value = "info")]
  log_level: Level,

  /// Output logs as JSON
  #[arg(long, env = "LOG_JSON")]
  log_json: bool,
}

impl Args {
  fn driver_config(&self) -> DriverConfig {
    DriverConfig {
      driver_name: self.driver_name.clone(),
      driver_version: self.driver_version.clone(),
      api_url: self.quobyte_api_url.clone(),
      api_timeout: Duration::from_secs(self.api_timeout_secs),
      namespace_as_tenant: self.use_k8s_namespace_as_tenant,
      defaults: VolumeDefaults {
        tenant: self.default_tenant.clone(),
        configuration: self.default_config.clone(),
        ..VolumeDefaults::default()
      },
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  init_logging(&args)?;

  let endpoint: Endpoint = args
    .csi_endpoint
    .parse()
    .context("invalid --csi-endpoint")?;
  let config = args.driver_config();

  info!(
    name = %config.driver_name,
    version = %config.driver_version,
    api = %config.api_url,
    namespace_as_tenant = config.namespace_as_tenant,
    "Starting Quobyte CSI controller"
  );

  let connector = QuobyteConnector::new(config.api_url.clone(), config.api_timeout)
    .context("failed to build Quobyte API client")?;
  let controller = Arc::new(QuobyteController::new(connector, &config));

  server::serve(&endpoint, controller, shutdown_signal())
    .await
    .context("CSI server failed")?;

  info!("Shutdown complete");
  Ok(())
}

fn init_logging(args: &Args) -> Result<()> {
  let filter = EnvFilter::from_default_env()
    .add_directive(args.log_level.into())
    .add_directive("h2=warn".parse()?)
    .add_directive("hyper=warn".parse()?)
    .add_directive("tower=warn".parse()?);

  if args.log_json {
    tracing_subscriber::registry()
      .with(filter)
      .with(fmt::layer().json())
      .init();
  } else {
    tracing_subscriber::registry()
      .with(filter)
      .with(fmt::layer().with_target(true))
      .init();
  }

  Ok(())
}

async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      tracing::error!(error = %e, "Failed to listen for SIGINT");
      futures::future::pending::<()>().await;
    }
  };

  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut sigterm) => {
        sigterm.recv().await;
      }
      Err(e) => {
        tracing::error!(error = %e, "Failed to listen for SIGTERM");
        futures::future::pending::<()>().await;
      }
    }
  };

  tokio::select! {
    _ = ctrl_c => info!("Received SIGINT"),
    _ = terminate => info!("Received SIGTERM"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::CommandFactory;

  fn parse(extra: &[&str]) -> Result<Args, clap::Error> {
    let mut argv = vec!["quobyte-csi", "--quobyte-api-url", "http://quobyte-api:7860"];
    argv.extend_from_slice(extra);
    Args::try_parse_from(argv)
  }

  #[test]
  fn command_is_well_formed() {
    Args::command().debug_assert();
  }

  #[test]
  fn log_level_is_parsed() {
    assert_eq!(parse(&["--log-level", "warn"]).unwrap().log_level, Level::WARN);
    assert_eq!(parse(&["--log-level", "DEBUG"]).unwrap().log_level, Level::DEBUG);
  }

  #[test]
  fn unknown_log_level_is_rejected() {
    let err = parse(&["--log-level", "verbose"]).unwrap_err();
    assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
  }

  #[test]
  fn flags_reach_the_driver_config() {
    let config = parse(&[
      "--use-k8s-namespace-as-tenant",
      "--default-tenant",
      "team-a",
      "--api-timeout-secs",
      "5",
    ])
    .unwrap()
    .driver_config();

    assert!(config.namespace_as_tenant);
    assert_eq!(config.defaults.tenant, "team-a");
    assert_eq!(config.api_timeout, Duration::from_secs(5));
    assert_eq!(config.api_url, "http://quobyte-api:7860");
  }
}
