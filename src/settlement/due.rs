use std::collections::BTreeMap;

use crate::settlement::models::{DueObligation, GroupKey, ObligationRecord, SettlementGroup};

/// Select the obligations due before `now` and batch them per settlement call.
///
/// Exhausted streams are skipped even when their arithmetic next payment lies
/// in the past. Groups come back ordered by key; each group keeps the
/// registry's record order.
pub fn find_due_groups(now: i64, records: &[ObligationRecord]) -> Vec<SettlementGroup> {
    let mut groups: BTreeMap<GroupKey, Vec<DueObligation>> = BTreeMap::new();

    for record in records {
        if record.is_exhausted() {
            continue;
        }
        let due = DueObligation::new(record.clone());
        if due.next_due >= now {
            continue;
        }

        let key = GroupKey {
            settlement_target: record.settlement_target.clone(),
            token_address: record.token_address.clone(),
            next_due: due.next_due,
        };
        groups.entry(key).or_default().push(due);
    }

    groups
        .into_iter()
        .map(|(key, obligations)| SettlementGroup { key, obligations })
        .collect()
}
