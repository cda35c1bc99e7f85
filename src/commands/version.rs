use std::env;

use crate::{app_info::AppInfo, config::Config};

/// Print version, build and (when it could be loaded) configuration details.
pub fn print_version_info(app: AppInfo, config: Option<&Config>) {
    let core = AppInfo::healthcron();

    let git_hash = option_env!("GIT_HASH").unwrap_or("unknown");
    let build_timestamp = option_env!("BUILD_TIMESTAMP").unwrap_or("unknown");

    println!("📦 {}", app.label());

    if !app.description.is_empty() {
        println!("📝 {}", app.description);
    }

    if !app.is_healthcron() {
        println!("🧱 Uses {}", core.label());
    }

    println!();
    println!("🔨 Build: {git_hash} ({build_timestamp})");
    println!("💻 Runtime: {}/{}", env::consts::OS, env::consts::ARCH);

    if let Some(config) = config {
        println!();
        println!("⏰ Scheduler:");
        println!("  💾 Storage: {}", config.storage.describe());
        println!(
            "  📜 History: {} per job, {} shared, pages of {}",
            config.scheduler.history_limit,
            config.scheduler.global_history_limit,
            config.scheduler.default_history_page
        );
    }
}
