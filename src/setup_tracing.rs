use time::format_description::parse;
use tracing_subscriber::fmt::time::OffsetTime;

use crate::cli::Commands;

pub fn setup_tracing_for_command(command: &Option<Commands>, server_log_level: &str) {
    // One-shot commands stay quiet, the scheduler process logs at the configured level.
    // RUST_LOG overrides both.
    let default_level = match command {
        Some(Commands::Migrate { .. }) => "warn",
        Some(Commands::Version) => "error",
        Some(Commands::Serve) | None => server_log_level,
    };

    let mut env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Filter out noisy third-party logs
    for directive in [
        "sqlx::postgres::notice=warn",
        "sea_orm_migration::migrator=warn",
    ] {
        if let Ok(directive) = directive.parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    let timer_format = parse("[hour]:[minute]:[second].[subsecond digits:2]").unwrap_or_default();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_level(true)
        .with_ansi(true)
        .with_timer(OffsetTime::new(
            time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC),
            timer_format,
        ))
        .compact()
        .init();
}
