//! Spending governor
//!
//! A per-period budget gating every outbound send. The check and the
//! reservation happen in one critical section, so concurrent sends can never
//! jointly overshoot the ceiling. Periods are aligned to the unix epoch.

use std::fmt;
use std::sync::Arc;

use noteline_storage_traits::spending::types::SpendRecord;
use noteline_storage_traits::{NotelineStorageProvider, unix_now};
use parking_lot::Mutex;

use crate::error::Error;

/// Source of unix seconds
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// The requested amount does not fit in what is left of the period's budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Spending limit exceeded: requested {requested}, spent {spent}, reserved {reserved}, ceiling {ceiling}")]
pub struct SpendingExceeded {
    /// Amount asked for
    pub requested: u64,
    /// Already committed this period
    pub spent: u64,
    /// Held by in-flight sends
    pub reserved: u64,
    /// Period ceiling
    pub ceiling: u64,
}

/// Point-in-time view of the budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpendingSnapshot {
    /// Start of the current period (unix seconds)
    pub period_start: u64,
    /// Committed spend this period
    pub spent: u64,
    /// Held by in-flight sends
    pub reserved: u64,
    /// Period ceiling
    pub ceiling: u64,
}

impl SpendingSnapshot {
    /// Budget still available for new reservations
    pub fn remaining(&self) -> u64 {
        self.ceiling
            .saturating_sub(self.spent)
            .saturating_sub(self.reserved)
    }
}

#[derive(Debug)]
struct PeriodState {
    period_start: u64,
    spent: u64,
    reserved: u64,
}

/// Per-period spending circuit breaker
pub struct SpendingGovernor {
    ceiling: u64,
    period_secs: u64,
    clock: Clock,
    state: Mutex<PeriodState>,
    storage: Option<Arc<dyn NotelineStorageProvider>>,
}

impl fmt::Debug for SpendingGovernor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpendingGovernor")
            .field("ceiling", &self.ceiling)
            .field("period_secs", &self.period_secs)
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl SpendingGovernor {
    /// Create an in-memory governor using the system clock
    pub fn new(ceiling: u64, period_secs: u64) -> Self {
        Self::with_clock(ceiling, period_secs, Arc::new(unix_now))
    }

    /// Create an in-memory governor with an injected clock
    pub fn with_clock(ceiling: u64, period_secs: u64, clock: Clock) -> Self {
        let period_secs = period_secs.max(1);
        let period_start = align(clock(), period_secs);
        Self {
            ceiling,
            period_secs,
            clock,
            state: Mutex::new(PeriodState {
                period_start,
                spent: 0,
                reserved: 0,
            }),
            storage: None,
        }
    }

    /// Persist debits to `storage` and seed the current period's total from it
    pub fn with_storage(mut self, storage: Arc<dyn NotelineStorageProvider>) -> Result<Self, Error> {
        {
            let mut state = self.state.lock();
            state.spent = storage.total_spent_since(state.period_start)?;
            tracing::debug!(
                spent = state.spent,
                period_start = state.period_start,
                "Seeded spending governor from storage"
            );
        }
        self.storage = Some(storage);
        Ok(self)
    }

    /// Check whether `estimated` would currently fit, without reserving it
    pub fn check_limit(&self, estimated: u64) -> Result<(), SpendingExceeded> {
        let mut state = self.state.lock();
        self.roll_period(&mut state);
        self.fits(&state, estimated)
    }

    /// Atomically check `estimated` against the budget and hold it.
    ///
    /// The returned reservation must be committed with the actual cost or it
    /// is released when dropped.
    pub fn reserve(self: &Arc<Self>, estimated: u64) -> Result<SpendReservation, SpendingExceeded> {
        let mut state = self.state.lock();
        self.roll_period(&mut state);
        self.fits(&state, estimated)?;
        state.reserved += estimated;

        Ok(SpendReservation {
            governor: Arc::clone(self),
            amount: estimated,
            settled: false,
        })
    }

    /// Current budget view
    pub fn snapshot(&self) -> SpendingSnapshot {
        let mut state = self.state.lock();
        self.roll_period(&mut state);
        SpendingSnapshot {
            period_start: state.period_start,
            spent: state.spent,
            reserved: state.reserved,
            ceiling: self.ceiling,
        }
    }

    fn fits(&self, state: &PeriodState, estimated: u64) -> Result<(), SpendingExceeded> {
        let total = state
            .spent
            .saturating_add(state.reserved)
            .saturating_add(estimated);
        if total > self.ceiling {
            return Err(SpendingExceeded {
                requested: estimated,
                spent: state.spent,
                reserved: state.reserved,
                ceiling: self.ceiling,
            });
        }
        Ok(())
    }

    fn roll_period(&self, state: &mut PeriodState) {
        let period_start = align((self.clock)(), self.period_secs);
        if period_start > state.period_start {
            tracing::info!(
                previous_spent = state.spent,
                period_start,
                "Spending period rolled over"
            );
            state.period_start = period_start;
            state.spent = 0;
        }
    }

    fn settle(&self, reserved: u64, actual: Option<(u64, &str)>) {
        let record = {
            let mut state = self.state.lock();
            state.reserved = state.reserved.saturating_sub(reserved);
            let (amount, participant) = match actual {
                Some(actual) => actual,
                None => return,
            };
            // The ceiling was checked against the reservation, so never debit past it
            let debited = amount.min(reserved);
            if amount > debited {
                tracing::warn!(
                    participant = %participant,
                    actual = amount,
                    reserved,
                    unbilled = amount - debited,
                    "Actual fee exceeded the reservation"
                );
            }
            state.spent = state.spent.saturating_add(debited);
            SpendRecord {
                participant: participant.to_string(),
                amount: debited,
                recorded_at: (self.clock)(),
            }
        };

        if let Some(storage) = &self.storage
            && let Err(e) = storage.record_spend(record)
        {
            tracing::warn!(error = %e, "Failed to persist spend record");
        }
    }
}

fn align(now: u64, period_secs: u64) -> u64 {
    now - now % period_secs
}

/// Budget held for one in-flight send
#[derive(Debug)]
pub struct SpendReservation {
    governor: Arc<SpendingGovernor>,
    amount: u64,
    settled: bool,
}

impl SpendReservation {
    /// Amount held
    pub fn amount(&self) -> u64 {
        self.amount
    }

    /// Release the hold and debit the actual cost, capped at the amount held
    pub fn commit(mut self, actual: u64, participant: &str) {
        self.settled = true;
        self.governor
            .settle(self.amount, Some((actual, participant)));
    }

    /// Release the hold without spending anything
    pub fn release(mut self) {
        self.settled = true;
        self.governor.settle(self.amount, None);
    }
}

impl Drop for SpendReservation {
    fn drop(&mut self) {
        if !self.settled {
            self.governor.settle(self.amount, None);
        }
    }
}
