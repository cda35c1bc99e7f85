use std::{env, sync::Arc, time::Duration};

use async_trait::async_trait;
use healthcron::{
    app_info::AppInfo,
    boot::{boot, BootConfig},
    checker::{Checker, CheckerError, SweepReport},
};
use tokio::{net::TcpStream, time::timeout};
use tracing::debug;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

// Checks that each `host:port` in SWEEP_TARGETS accepts TCP connections
struct TcpChecker {
    targets: Vec<String>,
}

impl TcpChecker {
    fn from_env() -> Self {
        let targets = env::var("SWEEP_TARGETS")
            .unwrap_or_else(|_| "127.0.0.1:5432".to_string())
            .split(',')
            .map(str::trim)
            .filter(|target| !target.is_empty())
            .map(ToString::to_string)
            .collect();

        Self { targets }
    }
}

#[async_trait]
impl Checker for TcpChecker {
    async fn sweep(&self) -> Result<SweepReport, CheckerError> {
        if self.targets.is_empty() {
            return Err(CheckerError::Failed("no targets configured".to_string()));
        }

        let mut down = Vec::new();
        for target in &self.targets {
            let reachable = matches!(
                timeout(CONNECT_TIMEOUT, TcpStream::connect(target)).await,
                Ok(Ok(_))
            );
            debug!("{} reachable: {}", target, reachable);
            if !reachable {
                down.push(target.as_str());
            }
        }

        let mut report = SweepReport::new(self.targets.len(), down.len());
        if !down.is_empty() {
            report.message = Some(format!("unreachable: {}", down.join(", ")));
        }
        Ok(report)
    }
}

#[tokio::main]
async fn main() {
    let app_info = AppInfo::new(
        "sweep-scheduler-example",
        env!("CARGO_PKG_VERSION"),
        "Sweeps TCP endpoints on the schedules stored by healthcron",
    );

    boot(BootConfig::new(app_info, Arc::new(TcpChecker::from_env()))).await;
}
