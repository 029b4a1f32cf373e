//! Per-cage live counts, recomputed from the registry and ledger on every call.

use std::collections::HashMap;

use serde::Serialize;

use crate::types::{CageName, OrderRecord};

/// In-cage count for a single registered cage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CageCount {
    pub cage: CageName,
    pub in_cage: usize,
}

/// Counts for every registered cage, in registry display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CageCounts(Vec<CageCount>);

impl CageCounts {
    /// Count for `cage`, or `None` if it is not a registered cage.
    pub fn get(&self, cage: &str) -> Option<usize> {
        self.0.iter().find(|c| c.cage.0 == cage).map(|c| c.in_cage)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CageCount> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total in-cage orders across registered cages.
    pub fn total(&self) -> usize {
        self.0.iter().map(|c| c.in_cage).sum()
    }
}

impl<'a> IntoIterator for &'a CageCounts {
    type Item = &'a CageCount;
    type IntoIter = std::slice::Iter<'a, CageCount>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Count in-cage records per registered cage.
///
/// Every cage in `cages` is reported (zero if empty). Records pointing at
/// unregistered cages, unassigned records and non-`InCage` records are
/// ignored. Runs in O(cages + records).
pub fn counts_by_cage(cages: &[CageName], records: &[OrderRecord]) -> CageCounts {
    let mut counts: Vec<CageCount> = cages
        .iter()
        .map(|cage| CageCount {
            cage: cage.clone(),
            in_cage: 0,
        })
        .collect();
    let slots: HashMap<&str, usize> = cages
        .iter()
        .enumerate()
        .map(|(i, cage)| (cage.as_str(), i))
        .collect();

    for record in records.iter().filter(|r| r.status.is_in_cage()) {
        let Some(cage) = record.cage.as_ref() else {
            continue;
        };
        if let Some(&slot) = slots.get(cage.as_str()) {
            counts[slot].in_cage += 1;
        }
    }
    CageCounts(counts)
}

/// Cage values referenced by records but missing from `cages`, sorted and
/// deduplicated.
pub fn orphaned_cages(cages: &[CageName], records: &[OrderRecord]) -> Vec<CageName> {
    let mut orphaned: Vec<CageName> = records
        .iter()
        .filter_map(|r| r.cage.as_ref())
        .filter(|c| !cages.contains(c))
        .cloned()
        .collect();
    orphaned.sort();
    orphaned.dedup();
    orphaned
}
