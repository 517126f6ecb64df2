//! Endpoint reachability and the header status line.

use parking_lot::Mutex;
use providers::{probe, ProbeOutcome};
use shared::busy::{Activity, BusyFlags};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderStatus {
    Active,
    Typing,
    Tutoring,
    NotReachable,
}

impl HeaderStatus {
    pub fn label(&self) -> &'static str {
        match self {
            HeaderStatus::Active => "Active",
            HeaderStatus::Typing => "Typing...",
            HeaderStatus::Tutoring => "Tutoring",
            HeaderStatus::NotReachable => "Not reachable",
        }
    }
}

/// Shared view of what the header shows
#[derive(Debug, Default)]
pub struct StatusBoard {
    reachable: AtomicBool,
    tutoring: AtomicBool,
    last_probe: Mutex<Option<ProbeOutcome>>,
}

impl StatusBoard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    pub fn set_tutoring(&self, active: bool) {
        self.tutoring.store(active, Ordering::SeqCst);
    }

    pub fn is_tutoring(&self) -> bool {
        self.tutoring.load(Ordering::SeqCst)
    }

    pub fn record(&self, outcome: ProbeOutcome) {
        self.set_reachable(outcome.is_reachable());
        *self.last_probe.lock() = Some(outcome);
    }

    pub fn last_probe(&self) -> Option<ProbeOutcome> {
        self.last_probe.lock().clone()
    }

    pub fn header(&self, busy: &BusyFlags) -> HeaderStatus {
        if busy.is_set(Activity::AiResponding) {
            HeaderStatus::Typing
        } else if self.is_tutoring() {
            HeaderStatus::Tutoring
        } else if self.is_reachable() {
            HeaderStatus::Active
        } else {
            HeaderStatus::NotReachable
        }
    }
}

/// User-requested check. Runs even while tutoring; None if one is already running.
pub async fn check_now(endpoint: &str, busy: &Arc<BusyFlags>, board: &StatusBoard) -> Option<ProbeOutcome> {
    let _guard = busy.try_begin(Activity::CheckingStatus)?;
    let outcome = probe(endpoint).await;
    board.record(outcome.clone());
    Some(outcome)
}

/// Background check for the header. Skipped while a reply is in flight,
/// a manual check runs, or tutoring is active.
pub async fn check_for_header(endpoint: &str, busy: &BusyFlags, board: &StatusBoard) -> Option<ProbeOutcome> {
    if busy.is_responding() || busy.is_set(Activity::CheckingStatus) || board.is_tutoring() {
        debug!("header check skipped");
        return None;
    }
    let outcome = probe(endpoint).await;
    // A send may have started while probing; its own result wins.
    if busy.is_responding() {
        return None;
    }
    board.record(outcome.clone());
    Some(outcome)
}

/// Periodic header check on a fixed interval; the first tick fires at once.
pub fn spawn_monitor(
    endpoint: String,
    every: Duration,
    busy: Arc<BusyFlags>,
    board: Arc<StatusBoard>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Some(outcome) = check_for_header(&endpoint, &busy, &board).await {
                debug!("reachability: {}", outcome);
            }
        }
    })
}
