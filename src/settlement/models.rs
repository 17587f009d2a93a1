use alloy_primitives::U256;

/// One recurring payment stream as reported by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObligationRecord {
    pub id: String,
    /// Unix seconds of the last settled instant
    pub last_settled: i64,
    /// Unix seconds after which the stream pays nothing further
    pub window_end: i64,
    /// Seconds between payments
    pub frequency: i64,
    /// Pool contract the settlement call goes to
    pub settlement_target: String,
    pub token_address: String,
}

impl ObligationRecord {
    /// `last_settled + frequency`, capped at `window_end`. Registry values are
    /// uint256 on chain, so the sum saturates instead of overflowing.
    pub fn next_due(&self) -> i64 {
        self.last_settled
            .saturating_add(self.frequency)
            .min(self.window_end)
    }

    /// Fully paid out; never due again
    pub fn is_exhausted(&self) -> bool {
        self.last_settled == self.window_end
    }
}

/// A record paired with its computed next payment instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueObligation {
    pub record: ObligationRecord,
    pub next_due: i64,
}

impl DueObligation {
    pub fn new(record: ObligationRecord) -> Self {
        let next_due = record.next_due();
        Self { record, next_due }
    }
}

/// Grouping key: obligations settle together only on an exact match
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub settlement_target: String,
    pub token_address: String,
    pub next_due: i64,
}

/// Due obligations settled with a single call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementGroup {
    pub key: GroupKey,
    pub obligations: Vec<DueObligation>,
}

impl SettlementGroup {
    pub fn stream_ids(&self) -> Vec<String> {
        self.obligations
            .iter()
            .map(|o| o.record.id.clone())
            .collect()
    }
}

/// Result of one group's settlement attempt
#[derive(Debug, Clone, PartialEq)]
pub enum GroupOutcome {
    Settled {
        key: GroupKey,
        stream_ids: Vec<String>,
        scaled_price: U256,
        transaction_hash: String,
    },
    Failed {
        key: GroupKey,
        reason: String,
    },
}

/// Summary of one pipeline pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Groups found due at the start of the pass
    pub due_groups: usize,
    pub outcomes: Vec<GroupOutcome>,
}

impl RunSummary {
    pub fn new(due_groups: usize) -> Self {
        Self {
            due_groups,
            outcomes: Vec::with_capacity(due_groups),
        }
    }

    pub fn settled(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, GroupOutcome::Settled { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.settled()
    }
}
