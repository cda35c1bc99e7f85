use std::{env, process, str::FromStr as _, sync::Arc};

use clap::Parser as _;
use config_rs::{Config as ConfigRs, ConfigError};
use tracing::{debug, trace};

use crate::{
    app_info::AppInfo,
    checker::Checker,
    cli::{Cli, Commands},
    commands::{migrate, serve, version},
    config::Config,
    environment::Environment,
    setup_tracing::setup_tracing_for_command,
};

const ENVIRONMENT_VARIABLE: &str = "APP_ENVIRONMENT";

/// What a binary supplies to run the scheduler: its own metadata and the
/// checker that fired jobs call.
pub struct BootConfig {
    pub app_info: AppInfo,
    pub checker: Arc<dyn Checker>,
}

impl BootConfig {
    #[must_use]
    pub fn new(app_info: AppInfo, checker: Arc<dyn Checker>) -> Self {
        Self { app_info, checker }
    }
}

pub async fn boot(config: BootConfig) {
    let cli = Cli::parse();

    let environment = set_environment();

    if matches!(cli.command, Some(Commands::Version)) {
        // Printed without tracing, and even when the config is broken
        let app_config = read_config(&environment).ok();
        version::print_version_info(config.app_info, app_config.as_ref());
        return;
    }

    let app_config = match read_config(&environment) {
        Ok(app_config) => app_config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration for '{environment}': {e}");
            process::exit(1);
        }
    };

    setup_tracing_for_command(&cli.command, &app_config.tracing.log_level);

    debug!("Environment set to: {:?}", environment);
    trace!("Configuration loaded: {:?}", app_config);

    handle_command(app_config, cli, config).await;
}

#[must_use]
pub fn set_environment() -> Environment {
    env::var(ENVIRONMENT_VARIABLE)
        .ok()
        .and_then(|s| Environment::from_str(&s).ok())
        .unwrap_or_default()
}

/// Layer `config/{environment}` under `APP_*` environment variables.
pub fn read_config(environment: &Environment) -> Result<Config, ConfigError> {
    let config_file_name = environment.config_file();

    trace!("Reading configuration from: {}", config_file_name);

    ConfigRs::builder()
        .add_source(config_rs::File::with_name(&config_file_name))
        .add_source(config_rs::Environment::with_prefix("APP").separator("__"))
        .build()?
        .try_deserialize()
}

pub async fn handle_command(config: Config, cli: Cli, boot_config: BootConfig) {
    match cli.command {
        Some(Commands::Migrate { action }) => {
            migrate::handle_migrate_command(&config, action).await;
        }
        Some(Commands::Version) => {
            version::print_version_info(boot_config.app_info, Some(&config));
        }
        Some(Commands::Serve) | None => {
            serve::handle_serve_command(boot_config.app_info, config, boot_config.checker).await;
        }
    }
}
