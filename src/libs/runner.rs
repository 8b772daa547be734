//! Poll runner: one independent loop per device.
//!
//! Each device gets its own task driving its poller at the configured
//! cadence; a slow or failing device never stalls the others, and the
//! single loop per device is what keeps `apply_poll` calls in poll order.
//! Poll and apply errors are logged and swallowed - the loop only exits
//! on parent cancellation.

use crate::db::sessions::SessionStore;
use crate::libs::clock::Clock;
use crate::libs::config::DeviceConfig;
use crate::libs::poller::DevicePoller;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub struct PollRunner {
    devices: Vec<DeviceConfig>,
    store: Arc<SessionStore>,
    clock: Arc<dyn Clock>,
}

impl PollRunner {
    pub fn new(devices: Vec<DeviceConfig>, store: Arc<SessionStore>, clock: Arc<dyn Clock>) -> Self {
        PollRunner { devices, store, clock }
    }

    /// Spawns every device loop. The loops run until `token` is
    /// cancelled.
    pub fn spawn(self, token: CancellationToken) -> Vec<JoinHandle<()>> {
        self.devices
            .into_iter()
            .map(|device| {
                let store = self.store.clone();
                let clock = self.clock.clone();
                let token = token.clone();
                tokio::spawn(run_device(device, store, clock, token))
            })
            .collect()
    }
}

async fn run_device(device: DeviceConfig, store: Arc<SessionStore>, clock: Arc<dyn Clock>, token: CancellationToken) {
    let poller = DevicePoller::new(&device.id, &device.base_url, clock);

    // The first tick fires immediately, giving the initial poll on start.
    let mut ticker = tokio::time::interval(Duration::from_secs(device.poll_interval_seconds));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(device = %device.id, interval = device.poll_interval_seconds, "starting poll loop");

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                tracing::info!(device = %device.id, "poll loop stopped");
                return;
            }
            _ = ticker.tick() => {
                poll_once(&poller, &store, &device.id).await;
            }
        }
    }
}

async fn poll_once(poller: &DevicePoller, store: &SessionStore, device_id: &str) {
    let result = match poller.poll().await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(device = %device_id, error = %e, "poll error");
            return;
        }
    };

    if let Err(e) = store.apply_poll(&result.into_update()) {
        tracing::warn!(device = %device_id, error = %e, "apply poll error");
    }
}
