//! Mutual exclusion for the single conversation.
//!
//! Sends are not queued: while the model is answering a chat message or a
//! tutor step, a new send is simply dropped by the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    AiResponding,
    TutorResponding,
    CheckingStatus,
}

#[derive(Debug, Default)]
pub struct BusyFlags {
    ai_responding: AtomicBool,
    tutor_responding: AtomicBool,
    checking_status: AtomicBool,
}

impl BusyFlags {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn flag(&self, activity: Activity) -> &AtomicBool {
        match activity {
            Activity::AiResponding => &self.ai_responding,
            Activity::TutorResponding => &self.tutor_responding,
            Activity::CheckingStatus => &self.checking_status,
        }
    }

    pub fn is_set(&self, activity: Activity) -> bool {
        self.flag(activity).load(Ordering::SeqCst)
    }

    /// True while either the chat model or the tutor is producing a reply
    pub fn is_responding(&self) -> bool {
        self.is_set(Activity::AiResponding) || self.is_set(Activity::TutorResponding)
    }

    /// Claim an activity. Returns None if it is already running.
    pub fn try_begin(self: &Arc<Self>, activity: Activity) -> Option<BusyGuard> {
        self.flag(activity)
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| BusyGuard {
                flags: Arc::clone(self),
                activity,
            })
    }
}

/// Clears its activity flag when dropped, including on early return or error.
#[derive(Debug)]
pub struct BusyGuard {
    flags: Arc<BusyFlags>,
    activity: Activity,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flags.flag(self.activity).store(false, Ordering::SeqCst);
    }
}
