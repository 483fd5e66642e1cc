//! Lock-free snapshot hand-off from the simulation thread
//!
//! One [`SnapshotPublisher`] feeds any number of [`SnapshotReader`]s. Each
//! reader owns a one-slot mailbox: publishing replaces whatever the reader
//! has not picked up yet, so a reader always gets the most recent state no
//! matter how far behind it fell. A reader that polls faster than the
//! simulation ticks (the audio callback) keeps its last snapshot.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::trace;

use crate::state::VehicleState;

struct Mailbox {
    tx: Sender<VehicleState>,
    /// Publisher-side handle used to evict a stale snapshot
    evict: Receiver<VehicleState>,
}

/// Writer side, owned by the simulation loop
pub struct SnapshotPublisher {
    mailboxes: Vec<Mailbox>,
    last: VehicleState,
    overwritten: u64,
}

/// Reader side, one per consumer thread
pub struct SnapshotReader {
    rx: Receiver<VehicleState>,
    last: VehicleState,
}

impl SnapshotPublisher {
    pub fn new() -> Self {
        Self {
            mailboxes: Vec::new(),
            last: VehicleState::default(),
            overwritten: 0,
        }
    }

    /// Attach a new reader; it starts from the last published snapshot
    pub fn subscribe(&mut self) -> SnapshotReader {
        let (tx, rx) = bounded(1);
        self.mailboxes.push(Mailbox {
            tx,
            evict: rx.clone(),
        });
        SnapshotReader { rx, last: self.last }
    }

    /// Hand a copy of `state` to every reader, replacing unread snapshots
    pub fn publish(&mut self, state: VehicleState) {
        self.last = state;
        for mailbox in &self.mailboxes {
            if let Err(TrySendError::Full(state)) = mailbox.tx.try_send(state) {
                // Only this side ever fills the slot, so after the evict it is empty
                if mailbox.evict.try_recv().is_ok() {
                    self.overwritten += 1;
                    trace!(overwritten = self.overwritten, "unread snapshot replaced");
                }
                let _ = mailbox.tx.try_send(state);
            }
        }
    }

    pub fn readers(&self) -> usize {
        self.mailboxes.len()
    }

    /// Snapshots replaced before their reader picked them up
    pub fn overwritten(&self) -> u64 {
        self.overwritten
    }
}

impl Default for SnapshotPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotReader {
    /// Newest snapshot available, never blocks
    pub fn latest(&mut self) -> VehicleState {
        while let Ok(state) = self.rx.try_recv() {
            self.last = state;
        }
        self.last
    }
}
