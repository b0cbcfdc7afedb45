//! # Status Module
//!
//! Last known status of every device slot.
//!
//! The [`StatusBoard`] is owned by the bridge task. Supervisors never touch it
//! directly; they hold a [`StatusReporter`] and send [`StatusUpdate`]
//! messages over an unbounded channel, so the table has a single writer.
//!
//! This module handles:
//! - Logging slot state transitions once per actual change
//! - Logging changes in the number of forwarding slots
//! - Per-slot event counters and periodic stats lines

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

/// Lifecycle state of one connection supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Not connected, waiting to (re)connect
    Idle,
    /// Dialing the producer socket
    Connecting,
    /// Connected, waiting for the config record
    ConfigPending,
    /// Virtual device exists for this epoch
    DeviceReady,
    /// Replaying events onto the device
    Forwarding,
    /// Closing the socket and releasing the device
    Releasing,
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SlotState::Idle => "idle",
            SlotState::Connecting => "connecting",
            SlotState::ConfigPending => "config pending",
            SlotState::DeviceReady => "device ready",
            SlotState::Forwarding => "forwarding",
            SlotState::Releasing => "releasing",
        };
        f.write_str(name)
    }
}

/// Message from a supervisor to the status board
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    /// Slot entered a new lifecycle state
    State { slot: usize, state: SlotState },
    /// An event record was read from the socket
    Received { slot: usize },
    /// An event was written to the virtual device
    Injected { slot: usize },
    /// An event was dropped (mapping or injection failure)
    Dropped { slot: usize },
    /// A connection epoch ended with an error
    EpochFailed { slot: usize },
}

/// Sending half held by one supervisor.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    slot: usize,
    tx: UnboundedSender<StatusUpdate>,
}

impl StatusReporter {
    /// Slot index this reporter speaks for
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn state(&self, state: SlotState) {
        self.send(StatusUpdate::State { slot: self.slot, state });
    }

    pub fn received(&self) {
        self.send(StatusUpdate::Received { slot: self.slot });
    }

    pub fn injected(&self) {
        self.send(StatusUpdate::Injected { slot: self.slot });
    }

    pub fn dropped(&self) {
        self.send(StatusUpdate::Dropped { slot: self.slot });
    }

    pub fn epoch_failed(&self) {
        self.send(StatusUpdate::EpochFailed { slot: self.slot });
    }

    fn send(&self, update: StatusUpdate) {
        // The board only goes away during shutdown
        let _ = self.tx.send(update);
    }
}

/// Creates the channel between supervisors and the board
pub fn status_channel() -> (StatusSender, UnboundedReceiver<StatusUpdate>) {
    let (tx, rx) = unbounded_channel();
    (StatusSender { tx }, rx)
}

/// Factory for per-slot reporters
#[derive(Debug, Clone)]
pub struct StatusSender {
    tx: UnboundedSender<StatusUpdate>,
}

impl StatusSender {
    /// Reporter bound to one slot
    pub fn reporter(&self, slot: usize) -> StatusReporter {
        StatusReporter {
            slot,
            tx: self.tx.clone(),
        }
    }
}

/// Counters and state of one slot
#[derive(Debug, Clone)]
pub struct SlotStatus {
    pub socket: PathBuf,
    pub state: SlotState,
    pub epochs: u64,
    pub received: u64,
    pub injected: u64,
    pub dropped: u64,
    pub failures: u64,
    pub last_active: Option<DateTime<Local>>,
}

impl SlotStatus {
    fn new(socket: PathBuf) -> Self {
        Self {
            socket,
            state: SlotState::Idle,
            epochs: 0,
            received: 0,
            injected: 0,
            dropped: 0,
            failures: 0,
            last_active: None,
        }
    }
}

/// Table of slot statuses, owned by the bridge.
#[derive(Debug)]
pub struct StatusBoard {
    slots: Vec<SlotStatus>,
}

impl StatusBoard {
    /// One idle entry per socket path
    pub fn new(sockets: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            slots: sockets.into_iter().map(SlotStatus::new).collect(),
        }
    }

    /// Status of one slot
    pub fn slot(&self, slot: usize) -> Option<&SlotStatus> {
        self.slots.get(slot)
    }

    /// Number of slots currently forwarding events
    pub fn active_connections(&self) -> usize {
        self.slots
            .iter()
            .filter(|status| status.state == SlotState::Forwarding)
            .count()
    }

    /// Applies one update, logging state changes.
    pub fn apply(&mut self, update: StatusUpdate) {
        let slot = match &update {
            StatusUpdate::State { slot, .. }
            | StatusUpdate::Received { slot }
            | StatusUpdate::Injected { slot }
            | StatusUpdate::Dropped { slot }
            | StatusUpdate::EpochFailed { slot } => *slot,
        };
        let active_before = self.active_connections();

        let Some(status) = self.slots.get_mut(slot) else {
            warn!("Status update for unknown slot {}", slot);
            return;
        };

        match update {
            StatusUpdate::State { state, .. } => {
                if status.state == state {
                    return;
                }
                info!(
                    "Slot {} ({}): {} -> {}",
                    slot,
                    status.socket.display(),
                    status.state,
                    state
                );
                if state == SlotState::Forwarding {
                    status.epochs += 1;
                }
                status.state = state;
            }
            StatusUpdate::Received { .. } => {
                status.received += 1;
                status.last_active = Some(Local::now());
            }
            StatusUpdate::Injected { .. } => status.injected += 1,
            StatusUpdate::Dropped { .. } => status.dropped += 1,
            StatusUpdate::EpochFailed { .. } => status.failures += 1,
        }

        let active_after = self.active_connections();
        if active_after != active_before {
            info!("Active connections: {} -> {}", active_before, active_after);
        }
    }

    /// Logs one stats line per slot that has seen a connection.
    pub fn log_stats(&self) {
        for (slot, status) in self.slots.iter().enumerate() {
            if status.epochs == 0 && status.failures == 0 {
                continue;
            }
            let idle_for = status
                .last_active
                .map(|at| format!("{}s ago", (Local::now() - at).num_seconds()))
                .unwrap_or_else(|| "never".to_string());
            info!(
                "Slot {} stats: state={}, epochs={}, received={}, injected={}, dropped={}, failed epochs={}, last active {}",
                slot,
                status.state,
                status.epochs,
                status.received,
                status.injected,
                status.dropped,
                status.failures,
                idle_for
            );
        }
    }
}
