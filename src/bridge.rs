//! # Bridge
//!
//! Runs one [`Supervisor`] per configured socket and owns everything that is
//! shared between them:
//!
//! - The [`StatusBoard`], fed by the supervisors over a channel
//! - The periodic stats line
//! - Uniform release of every slot's device on a fatal error or shutdown

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::{Config, SlotMode};
use crate::device::{new_slot, DeviceSlot, VirtualDeviceController};
use crate::error::Result;
use crate::status::{status_channel, StatusBoard};
use crate::supervisor::{RetryPolicy, Supervisor};

/// One device slot as configured
struct Slot<C: VirtualDeviceController> {
    socket: PathBuf,
    mode: SlotMode,
    device: DeviceSlot<C>,
}

/// Composition of all device slots
pub struct Bridge<C: VirtualDeviceController> {
    slots: Vec<Slot<C>>,
    retry: RetryPolicy,
    stats_interval: Duration,
}

impl<C: VirtualDeviceController> Bridge<C> {
    /// Builds a bridge with one controller per configured socket.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `controller` - Called once per slot index to build its device handle
    ///
    /// # Examples
    ///
    /// ```
    /// use gamepad_bridge::bridge::Bridge;
    /// use gamepad_bridge::config::Config;
    /// use gamepad_bridge::device::uinput::UinputController;
    ///
    /// let config = Config::default();
    /// let bridge = Bridge::new(&config, |_| UinputController::new());
    /// assert_eq!(bridge.slot_count(), 4);
    /// ```
    pub fn new(config: &Config, mut controller: impl FnMut(usize) -> C) -> Self {
        let slots = config
            .socket_paths()
            .into_iter()
            .zip(config.slot_modes())
            .enumerate()
            .map(|(i, (socket, mode))| Slot {
                socket,
                mode,
                device: new_slot(controller(i)),
            })
            .collect();

        Self {
            slots,
            retry: RetryPolicy::from(config),
            stats_interval: config.stats_interval(),
        }
    }

    /// Number of device slots
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Device handle of one slot
    pub fn device(&self, slot: usize) -> Option<DeviceSlot<C>> {
        self.slots.get(slot).map(|s| Arc::clone(&s.device))
    }

    /// Runs every supervisor until `shutdown` resolves or one fails fatally.
    ///
    /// Either way all supervisors are stopped and every slot's device is
    /// destroyed before returning.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that stopped a supervisor
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let (sender, mut updates) = status_channel();
        let mut board = StatusBoard::new(self.slots.iter().map(|s| s.socket.clone()));
        let mut supervisors = JoinSet::new();

        for (i, slot) in self.slots.iter().enumerate() {
            let supervisor = Supervisor::new(
                slot.socket.clone(),
                slot.mode,
                Arc::clone(&slot.device),
                self.retry,
                sender.reporter(i),
            );
            supervisors.spawn(supervisor.run());
        }
        drop(sender);

        let stable = self.slots.iter().filter(|s| s.mode == SlotMode::Stable).count();
        info!(
            "Started {} device slots ({} stable, {} dynamic)",
            self.slots.len(),
            stable,
            self.slots.len() - stable
        );

        let mut stats = interval(self.stats_interval);
        stats.set_missed_tick_behavior(MissedTickBehavior::Delay);
        stats.tick().await;
        tokio::pin!(shutdown);

        let outcome = loop {
            tokio::select! {
                Some(update) = updates.recv() => board.apply(update),

                _ = stats.tick() => board.log_stats(),

                Some(joined) = supervisors.join_next() => match joined {
                    Ok(Err(e)) => {
                        error!("Fatal error, releasing all devices: {}", e);
                        break Err(e);
                    }
                    Ok(Ok(())) => warn!("Supervisor exited"),
                    Err(e) => error!("Supervisor task failed: {}", e),
                },

                _ = &mut shutdown => {
                    info!("Shutdown requested, releasing all devices");
                    break Ok(());
                }
            }
        };

        supervisors.shutdown().await;
        self.release_all().await;

        while let Ok(update) = updates.try_recv() {
            board.apply(update);
        }
        board.log_stats();

        outcome
    }

    /// Destroys the device of every slot.
    pub async fn release_all(&self) {
        for slot in &self.slots {
            slot.device.lock().await.destroy();
        }
    }
}
