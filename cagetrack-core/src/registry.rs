//! Ordered cage registry.
//!
//! The registry is the set of valid cage names in display order. It is seeded
//! with a default list and mutated only by [`CageRegistry::add`],
//! [`CageRegistry::rename`] and [`CageRegistry::reset_to_default`].
//!
//! Renaming here does not touch order records. Callers that own a ledger
//! must cascade the rename in the same step; [`crate::state::TrackerState`]
//! does that for the local variant.

use crate::error::{LedgerError, RenameRejection};
use crate::types::CageName;

/// Cages seeded at startup when no `default_cages` override is configured.
pub const DEFAULT_CAGES: [&str; 19] = [
    "A-01", "A-02", "A-03", "A-04", "A-05", "A-06", "A-07", "A-08", "A-09", "A-10", "A-11",
    "A-12", "A-13", "A-14", "A-15", "B-01", "B-02", "C-01", "C-02",
];

/// Ordered set of cage names plus the default list it resets to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CageRegistry {
    cages: Vec<CageName>,
    defaults: Vec<CageName>,
}

impl Default for CageRegistry {
    fn default() -> Self {
        Self::seeded(DEFAULT_CAGES.iter().map(|c| CageName::from(*c)).collect())
    }
}

impl CageRegistry {
    /// A registry holding exactly `defaults`, in order.
    ///
    /// Blank and repeated names are dropped so the set invariant holds even
    /// for a hand-edited config.
    pub fn seeded(defaults: Vec<CageName>) -> Self {
        let defaults = dedup_names(defaults);
        Self {
            cages: defaults.clone(),
            defaults,
        }
    }

    /// Restore a registry from persisted cages, keeping `defaults` for resets.
    pub fn restore(cages: Vec<CageName>, defaults: Vec<CageName>) -> Self {
        Self {
            cages: dedup_names(cages),
            defaults: dedup_names(defaults),
        }
    }

    pub fn cages(&self) -> &[CageName] {
        &self.cages
    }

    pub fn defaults(&self) -> &[CageName] {
        &self.defaults
    }

    pub fn len(&self) -> usize {
        self.cages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cages.is_empty()
    }

    /// Whether `name` is currently a valid cage selection.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.cages.iter().position(|c| c.0 == name)
    }

    pub fn first(&self) -> Option<&CageName> {
        self.cages.first()
    }

    /// Keep `current` if it is still registered, else fall back to the first cage.
    pub fn resolve_selection(&self, current: Option<&str>) -> Option<CageName> {
        match current {
            Some(name) if self.contains(name) => Some(CageName::from(name)),
            _ => self.first().cloned(),
        }
    }

    /// Append a new cage at the end of the display order.
    pub fn add(&mut self, name: &str) -> Result<CageName, LedgerError> {
        let trimmed = name.trim();
        if trimmed.is_empty() || self.contains(trimmed) {
            return Err(LedgerError::DuplicateCage {
                name: trimmed.to_string(),
            });
        }
        let cage = CageName::from(trimmed);
        self.cages.push(cage.clone());
        Ok(cage)
    }

    /// Validate a rename without applying it.
    ///
    /// Returns the position of `old` and the trimmed new name.
    pub fn check_rename(&self, old: &str, new: &str) -> Result<(usize, CageName), LedgerError> {
        let trimmed = new.trim();
        let reject = |reason| LedgerError::InvalidRename {
            from: old.to_string(),
            to: trimmed.to_string(),
            reason,
        };

        let Some(index) = self.position(old) else {
            return Err(reject(RenameRejection::UnknownCage));
        };
        if trimmed.is_empty() {
            return Err(reject(RenameRejection::EmptyName));
        }
        if trimmed == old {
            return Err(reject(RenameRejection::SameName));
        }
        if self.contains(trimmed) {
            return Err(reject(RenameRejection::NameTaken));
        }
        Ok((index, CageName::from(trimmed)))
    }

    /// Substitute `old` with `new` in place, preserving its position.
    ///
    /// Returns `(old, new)` as registered names.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(CageName, CageName), LedgerError> {
        let (index, new_name) = self.check_rename(old, new)?;
        let old_name = std::mem::replace(&mut self.cages[index], new_name.clone());
        Ok((old_name, new_name))
    }

    /// Replace the registry with the default list.
    ///
    /// Returns the cages that were dropped. Order records are not touched.
    pub fn reset_to_default(&mut self) -> Vec<CageName> {
        let removed = self
            .cages
            .iter()
            .filter(|c| !self.defaults.contains(c))
            .cloned()
            .collect();
        self.cages = self.defaults.clone();
        removed
    }
}

fn dedup_names(names: Vec<CageName>) -> Vec<CageName> {
    let mut out: Vec<CageName> = Vec::with_capacity(names.len());
    for name in names {
        let trimmed = name.0.trim();
        if trimmed.is_empty() || out.iter().any(|c| c.0 == trimmed) {
            continue;
        }
        out.push(CageName::from(trimmed));
    }
    out
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> CageRegistry {
        CageRegistry::seeded(vec!["A-01".into(), "A-02".into(), "B-01".into()])
    }

    #[test]
    fn default_registry_has_seed_list() {
        let reg = CageRegistry::default();
        assert_eq!(reg.len(), 19);
        assert_eq!(reg.first().map(CageName::as_str), Some("A-01"));
        assert!(reg.contains("C-02"));
    }

    #[test]
    fn add_trims_and_appends() {
        let mut reg = small();
        let added = reg.add("  D-01 ").expect("add");
        assert_eq!(added.as_str(), "D-01");
        assert_eq!(reg.cages().last(), Some(&added));
    }

    #[test]
    fn add_rejects_empty_and_existing() {
        let mut reg = small();
        assert!(matches!(reg.add("   "), Err(LedgerError::DuplicateCage { .. })));
        assert!(matches!(reg.add("A-02"), Err(LedgerError::DuplicateCage { .. })));
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn rename_preserves_position() {
        let mut reg = small();
        let (old, new) = reg.rename("A-02", " Z-09 ").expect("rename");
        assert_eq!(old.as_str(), "A-02");
        assert_eq!(new.as_str(), "Z-09");
        assert_eq!(reg.position("Z-09"), Some(1));
        assert!(!reg.contains("A-02"));
    }

    #[test]
    fn rename_rejections() {
        let reg = small();
        let reason = |res: Result<(usize, CageName), LedgerError>| match res {
            Err(LedgerError::InvalidRename { reason, .. }) => reason,
            other => panic!("expected InvalidRename, got {other:?}"),
        };
        assert_eq!(reason(reg.check_rename("Q-01", "Q-02")), RenameRejection::UnknownCage);
        assert_eq!(reason(reg.check_rename("A-01", "  ")), RenameRejection::EmptyName);
        assert_eq!(reason(reg.check_rename("A-01", "A-01 ")), RenameRejection::SameName);
        assert_eq!(reason(reg.check_rename("A-01", "B-01")), RenameRejection::NameTaken);
    }

    #[test]
    fn reset_drops_custom_cages() {
        let mut reg = small();
        reg.add("X-01").expect("add");
        reg.rename("A-01", "A-99").expect("rename");
        let removed = reg.reset_to_default();
        assert_eq!(removed, vec![CageName::from("A-99"), CageName::from("X-01")]);
        assert_eq!(reg.cages(), reg.defaults());
        assert!(!reg.contains("X-01"));
    }

    #[test]
    fn resolve_selection_falls_back_to_first() {
        let reg = small();
        assert_eq!(reg.resolve_selection(Some("B-01")), Some(CageName::from("B-01")));
        assert_eq!(reg.resolve_selection(Some("gone")), Some(CageName::from("A-01")));
        assert_eq!(reg.resolve_selection(None), Some(CageName::from("A-01")));
        assert_eq!(CageRegistry::seeded(vec![]).resolve_selection(Some("A-01")), None);
    }

    #[test]
    fn seeded_drops_blank_and_repeated_names() {
        let reg = CageRegistry::seeded(vec!["A".into(), " ".into(), "A ".into(), "B".into()]);
        assert_eq!(reg.cages(), &[CageName::from("A"), CageName::from("B")]);
    }
}
