//! Greedy budget packing of due candidates.
//!
//! The policy is single-pass and order-dependent by design: candidates are
//! walked in priority order and once a tier's threshold is crossed, every
//! further candidate in that tier overflows, even an individually small one.
//! This is not knapsack-optimal and is not meant to be.

use std::collections::BTreeMap;

use crate::types::Reminder;

/// Characters of budget per abstract budget unit.
const CHARS_PER_UNIT: usize = 4;
/// Fixed per-reminder metadata overhead, in characters.
const METADATA_OVERHEAD: usize = 30;

/// Content caps per priority (1 through 5). Priorities 4 and 5 are never
/// included, so their caps are zero.
fn content_cap(priority: u8) -> usize {
    match priority {
        1 => 200,
        2 => 100,
        3 => 60,
        _ => 0,
    }
}

/// Result of a budget allocation pass.
#[derive(Debug, Clone)]
pub struct BudgetAllocation {
    /// Candidates that fit the budget, in priority order.
    pub included: Vec<Reminder>,
    /// Candidates excluded purely for budget reasons, tallied per priority.
    pub overflow: BTreeMap<u8, usize>,
    /// Total candidate count prior to trimming.
    pub total_triggered: usize,
}

impl BudgetAllocation {
    /// Overflow count for a priority level.
    pub fn overflow_for(&self, priority: u8) -> usize {
        self.overflow.get(&priority).copied().unwrap_or(0)
    }
}

/// Greedy per-priority budget packer.
pub struct BudgetAllocator {
    budget_units: u32,
}

impl BudgetAllocator {
    /// Create an allocator for the given budget, in abstract units.
    pub fn new(budget_units: u32) -> Self {
        Self { budget_units }
    }

    /// Select which candidates fit the budget.
    ///
    /// Processing is priority-ordered (1 first):
    /// - priority 1 is always included (its size still accumulates)
    /// - priority 2 is included while the running total is within 60% of the
    ///   character ceiling, priority 3 while within 85%
    /// - priority 4 always overflows; priority 5 is dropped without being
    ///   counted as overflow
    pub fn allocate(&self, mut candidates: Vec<Reminder>) -> BudgetAllocation {
        let total_triggered = candidates.len();
        let ceiling = self.budget_units as usize * CHARS_PER_UNIT;

        // Stable sort keeps input order within a tier.
        candidates.sort_by_key(|r| r.priority.get());

        let mut included = Vec::new();
        let mut overflow: BTreeMap<u8, usize> = BTreeMap::new();
        let mut used = 0usize;

        for reminder in candidates {
            let priority = reminder.priority.get();
            match priority {
                5 => {}
                4 => {
                    *overflow.entry(4).or_default() += 1;
                }
                _ => {
                    let fits = match priority {
                        1 => true,
                        2 => used <= ceiling * 60 / 100,
                        _ => used <= ceiling * 85 / 100,
                    };
                    if fits {
                        used += contributed_size(&reminder);
                        included.push(reminder);
                    } else {
                        *overflow.entry(priority).or_default() += 1;
                    }
                }
            }
        }

        BudgetAllocation {
            included,
            overflow,
            total_triggered,
        }
    }
}

/// Size a candidate contributes to the running total: content truncated to
/// its priority cap, plus the fixed metadata overhead.
fn contributed_size(reminder: &Reminder) -> usize {
    let cap = content_cap(reminder.priority.get());
    reminder.content.chars().count().min(cap) + METADATA_OVERHEAD
}
