use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use chrono::{DateTime, Local, Utc};
use tokio::{
    task::JoinHandle,
    time::{sleep, sleep_until, Instant},
};
use tracing::{debug, error};

use crate::cron_expression::{next_minute_boundary, CronExpression};

/// Type alias for timer callback futures to reduce type complexity
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type TimerCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// A live schedule registered with a [`TimerDriver`].
pub trait TimerHandle: Send + Sync {
    /// Stop future fires. Executions already started run to completion.
    fn cancel(&self);
}

/// Registers callbacks that fire on every minute matching a cron expression.
pub trait TimerDriver: Send + Sync {
    fn schedule(&self, expression: CronExpression, callback: TimerCallback)
        -> Box<dyn TimerHandle>;
}

impl TimerHandle for JoinHandle<()> {
    fn cancel(&self) {
        self.abort();
    }
}

/// Source of the current wall-clock time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Wall-clock driver: one tokio task per timer, waking at every minute
/// boundary and checking the expression against local time.
#[derive(Clone)]
pub struct TokioTimerDriver {
    clock: Clock,
}

impl TokioTimerDriver {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(Utc::now))
    }

    /// Driver reading time from `clock` instead of the system clock. Sleeps
    /// still go through tokio, so a clock that follows tokio's time can be
    /// driven with a paused runtime.
    pub fn with_clock(clock: Clock) -> Self {
        Self { clock }
    }
}

impl Default for TokioTimerDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerDriver for TokioTimerDriver {
    fn schedule(
        &self,
        expression: CronExpression,
        callback: TimerCallback,
    ) -> Box<dyn TimerHandle> {
        Box::new(tokio::spawn(run_timer(
            expression,
            callback,
            Arc::clone(&self.clock),
        )))
    }
}

async fn run_timer(expression: CronExpression, callback: TimerCallback, clock: Clock) {
    debug!("📅 Timer armed for '{}'", expression);

    let mut last_tick = clock();

    loop {
        let now = clock();
        // Never look at the same minute twice, even if the wall clock lags the sleep
        let Some(tick) = next_minute_boundary(&now.max(last_tick)) else {
            error!("❌ Could not determine next minute boundary for '{}'", expression);
            sleep(Duration::from_secs(60)).await;
            continue;
        };

        wait_until_tick(tick, now).await;
        last_tick = tick;

        if expression.matches(&tick.with_timezone(&Local)) {
            debug!("⏰ '{}' fired at {}", expression, tick);
            // Detached so cancelling the timer never aborts a running execution
            tokio::spawn(callback());
        }
    }
}

async fn wait_until_tick(tick: DateTime<Utc>, now: DateTime<Utc>) {
    let sleep_duration = (tick - now).to_std().unwrap_or_default();
    if sleep_duration > Duration::ZERO {
        sleep_until(Instant::now() + sleep_duration).await;
    }
}
