//! Cross-source deduplication

use crate::{models::Target, types::Carrier};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Whether `candidate` should replace `incumbent` for the same key
///
/// Higher source priority wins. Equal priorities fall back to the smaller
/// endpoint then label, so the survivor never depends on arrival order.
fn replaces(candidate: &Target, incumbent: &Target) -> bool {
    match candidate.source_priority.cmp(&incumbent.source_priority) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => {
            (candidate.endpoint.to_string(), &candidate.label) < (incumbent.endpoint.to_string(), &incumbent.label)
        }
    }
}

/// Collapse targets sharing a (carrier, region) key, keeping the best source
///
/// Targets without a key (catalog entries) pass through untouched. The
/// result is ordered by region, then label.
pub fn merge(targets: Vec<Target>) -> Vec<Target> {
    let mut keyed: HashMap<(Carrier, String), Target> = HashMap::new();
    let mut unkeyed = Vec::new();

    for target in targets {
        let key = match target.merge_key() {
            Some((carrier, region)) => (carrier, region.to_string()),
            None => {
                unkeyed.push(target);
                continue;
            }
        };
        let keep_incumbent = keyed
            .get(&key)
            .is_some_and(|incumbent| !replaces(&target, incumbent));
        if !keep_incumbent {
            keyed.insert(key, target);
        }
    }

    let mut merged: Vec<Target> = keyed.into_values().collect();
    merged.sort_by(|a, b| a.region.cmp(&b.region).then_with(|| a.label.cmp(&b.label)));
    unkeyed.sort_by(|a, b| a.label.cmp(&b.label));
    merged.extend(unkeyed);
    merged
}
