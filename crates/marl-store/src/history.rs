//! Three-generation history storage for staged values.
//!
//! Per registered id the store keeps three `Location`-keyed maps —
//! `current`, `old`, `older` — rotated wholesale on shift, in the spirit
//! of a double-buffered arena swap: the rotation moves containers, never
//! entries. `external_curr` tracks which `(id, location)` pairs were
//! pulled since the last shift, so historical reads know whether they
//! must force an evaluation to keep the staging chain alive.

use std::collections::{BTreeMap, BTreeSet};

use marl_core::{Location, StoreError, StoredValue, ValueId};

pub(crate) type HistoryMap = BTreeMap<Location, Box<dyn StoredValue>>;

/// Which historical generation an accessor reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Generation {
    Old,
    Older,
}

#[derive(Default)]
pub(crate) struct History {
    current: Vec<HistoryMap>,
    old: Vec<HistoryMap>,
    older: Vec<HistoryMap>,
    /// `(id, loc)` pairs pulled through `get` since the last shift.
    external_curr: Vec<BTreeSet<Location>>,
    want_old: Vec<bool>,
    want_older: Vec<bool>,
}

impl History {
    /// Extend all parallel tables for a newly registered id.
    pub(crate) fn push_slot(&mut self) {
        self.current.push(BTreeMap::new());
        self.old.push(BTreeMap::new());
        self.older.push(BTreeMap::new());
        self.external_curr.push(BTreeSet::new());
        self.want_old.push(false);
        self.want_older.push(false);
    }

    pub(crate) fn wants_history(&self, id: ValueId) -> bool {
        self.want_old[id.index()] || self.want_older[id.index()]
    }

    pub(crate) fn wants(&self, gen: Generation, id: ValueId) -> bool {
        match gen {
            Generation::Old => self.want_old[id.index()],
            Generation::Older => self.want_older[id.index()],
        }
    }

    pub(crate) fn set_want(&mut self, gen: Generation, id: ValueId) {
        match gen {
            Generation::Old => self.want_old[id.index()] = true,
            Generation::Older => self.want_older[id.index()] = true,
        }
    }

    pub(crate) fn mark_external(&mut self, id: ValueId, loc: &Location) {
        if !self.external_curr[id.index()].contains(loc) {
            self.external_curr[id.index()].insert(loc.clone());
        }
    }

    pub(crate) fn clear_external(&mut self, id: ValueId, loc: &Location) {
        self.external_curr[id.index()].remove(loc);
    }

    pub(crate) fn is_external(&self, id: ValueId, loc: &Location) -> bool {
        self.external_curr[id.index()].contains(loc)
    }

    /// Record a freshly computed value so it becomes `old` on the next
    /// shift, replacing (and dropping) any previously staged entry.
    pub(crate) fn stage_current(&mut self, id: ValueId, loc: &Location, val: Box<dyn StoredValue>) {
        self.current[id.index()].insert(loc.clone(), val);
    }

    pub(crate) fn entry(
        &self,
        gen: Generation,
        id: ValueId,
        loc: &Location,
    ) -> Option<&dyn StoredValue> {
        let maps = match gen {
            Generation::Old => &self.old,
            Generation::Older => &self.older,
        };
        maps[id.index()].get(loc).map(|v| v.as_ref())
    }

    #[cfg(test)]
    pub(crate) fn current_entry(&self, id: ValueId, loc: &Location) -> Option<&dyn StoredValue> {
        self.current[id.index()].get(loc).map(|v| v.as_ref())
    }

    /// The whole `Location`-keyed map for one generation of one id.
    pub(crate) fn map(&self, gen: Generation, id: ValueId) -> &HistoryMap {
        match gen {
            Generation::Old => &self.old[id.index()],
            Generation::Older => &self.older[id.index()],
        }
    }

    /// Place a reloaded entry directly into a history map.
    pub(crate) fn insert_entry(
        &mut self,
        gen: Generation,
        id: ValueId,
        loc: Location,
        val: Box<dyn StoredValue>,
    ) {
        match gen {
            Generation::Old => self.old[id.index()].insert(loc, val),
            Generation::Older => self.older[id.index()].insert(loc, val),
        };
    }

    /// Advance history one step: `older <- old <- current <- {}`.
    ///
    /// The rotation swaps the map containers themselves — O(number of
    /// ids), never O(number of entries). Entries displaced from `older`
    /// are dropped here; the external-pull markers reset for the new
    /// step.
    pub(crate) fn shift(&mut self) {
        let fresh: Vec<HistoryMap> = (0..self.current.len()).map(|_| BTreeMap::new()).collect();
        let staged = std::mem::replace(&mut self.current, fresh);
        let prev_old = std::mem::replace(&mut self.old, staged);
        self.older = prev_old;
        for set in &mut self.external_curr {
            set.clear();
        }
    }

    /// Move `old` entries from source locations to destination locations,
    /// one-to-one.
    ///
    /// All source entries are cloned before any source key is removed, so
    /// arbitrary overlap between `srcs` and `dsts` (including aliasing)
    /// is safe. A destination whose source has no entry ends up empty.
    pub(crate) fn project(
        &mut self,
        srcs: &[Location],
        dsts: &[Location],
    ) -> Result<(), StoreError> {
        if srcs.len() != dsts.len() {
            return Err(StoreError::ProjectionSizeMismatch {
                srcs: srcs.len(),
                dsts: dsts.len(),
            });
        }
        for map in &mut self.old {
            let clones: Vec<Option<Box<dyn StoredValue>>> = srcs
                .iter()
                .map(|src| map.get(src).map(|v| v.clone_boxed()))
                .collect();
            for src in srcs {
                map.remove(src);
            }
            for (dst, clone) in dsts.iter().zip(clones) {
                match clone {
                    Some(v) => {
                        map.insert(dst.clone(), v);
                    }
                    None => {
                        map.remove(dst);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boxed(v: f64) -> Box<dyn StoredValue> {
        Box::new(v)
    }

    fn payload(h: &History, gen: Generation, id: ValueId, loc: &Location) -> Option<f64> {
        h.entry(gen, id, loc)
            .and_then(|v| v.as_any().downcast_ref::<f64>())
            .copied()
    }

    fn two_slot_history() -> History {
        let mut h = History::default();
        h.push_slot();
        h.push_slot();
        h
    }

    #[test]
    fn shift_rotates_all_three_generations() {
        let mut h = two_slot_history();
        let loc = Location::new(1, 0, 2);
        let id = ValueId(0);

        h.stage_current(id, &loc, boxed(1.0));
        h.shift();
        assert_eq!(payload(&h, Generation::Old, id, &loc), Some(1.0));
        assert_eq!(payload(&h, Generation::Older, id, &loc), None);

        h.stage_current(id, &loc, boxed(2.0));
        h.shift();
        assert_eq!(payload(&h, Generation::Old, id, &loc), Some(2.0));
        assert_eq!(payload(&h, Generation::Older, id, &loc), Some(1.0));

        // nothing staged this step: old empties, the 2.0 moves to older,
        // the 1.0 is discarded
        h.shift();
        assert_eq!(payload(&h, Generation::Old, id, &loc), None);
        assert_eq!(payload(&h, Generation::Older, id, &loc), Some(2.0));
    }

    #[test]
    fn shift_clears_external_markers() {
        let mut h = two_slot_history();
        let loc = Location::new(1, 0, 2);
        h.mark_external(ValueId(1), &loc);
        assert!(h.is_external(ValueId(1), &loc));
        h.shift();
        assert!(!h.is_external(ValueId(1), &loc));
    }

    #[test]
    fn restaging_replaces_prior_entry() {
        let mut h = two_slot_history();
        let loc = Location::new(1, 0, 2);
        let id = ValueId(0);
        h.stage_current(id, &loc, boxed(1.0));
        h.stage_current(id, &loc, boxed(5.0));
        h.shift();
        assert_eq!(payload(&h, Generation::Old, id, &loc), Some(5.0));
    }

    #[test]
    fn project_moves_old_entries() {
        let mut h = two_slot_history();
        let id = ValueId(0);
        let src = Location::new(1, 0, 2);
        let dst = Location::new(9, 0, 2);
        h.stage_current(id, &src, boxed(3.0));
        h.shift();

        h.project(&[src.clone()], &[dst.clone()]).unwrap();
        assert_eq!(payload(&h, Generation::Old, id, &dst), Some(3.0));
        assert_eq!(payload(&h, Generation::Old, id, &src), None);
    }

    #[test]
    fn project_with_overlapping_locations() {
        // swap two locations: srcs and dsts fully overlap
        let mut h = two_slot_history();
        let id = ValueId(0);
        let a = Location::new(1, 0, 2);
        let b = Location::new(2, 0, 2);
        h.stage_current(id, &a, boxed(1.0));
        h.stage_current(id, &b, boxed(2.0));
        h.shift();

        h.project(&[a.clone(), b.clone()], &[b.clone(), a.clone()])
            .unwrap();
        assert_eq!(payload(&h, Generation::Old, id, &a), Some(2.0));
        assert_eq!(payload(&h, Generation::Old, id, &b), Some(1.0));
    }

    #[test]
    fn project_identity_is_a_no_op() {
        let mut h = two_slot_history();
        let id = ValueId(0);
        let a = Location::new(1, 0, 2);
        h.stage_current(id, &a, boxed(4.0));
        h.shift();
        h.project(&[a.clone()], &[a.clone()]).unwrap();
        assert_eq!(payload(&h, Generation::Old, id, &a), Some(4.0));
    }

    #[test]
    fn project_empty_lists_is_a_no_op() {
        let mut h = two_slot_history();
        let id = ValueId(0);
        let a = Location::new(1, 0, 2);
        h.stage_current(id, &a, boxed(4.0));
        h.shift();
        h.project(&[], &[]).unwrap();
        assert_eq!(payload(&h, Generation::Old, id, &a), Some(4.0));
    }

    #[test]
    fn project_length_mismatch_is_fatal() {
        let mut h = two_slot_history();
        let a = Location::new(1, 0, 2);
        let err = h.project(&[a.clone()], &[]).unwrap_err();
        assert_eq!(
            err,
            StoreError::ProjectionSizeMismatch { srcs: 1, dsts: 0 }
        );
    }

    #[test]
    fn project_from_missing_source_clears_destination() {
        let mut h = two_slot_history();
        let id = ValueId(0);
        let src = Location::new(1, 0, 2);
        let dst = Location::new(2, 0, 2);
        h.stage_current(id, &dst, boxed(9.0));
        h.shift();
        // src has no old entry; dst's stale value must not survive
        h.project(&[src], &[dst.clone()]).unwrap();
        assert_eq!(payload(&h, Generation::Old, id, &dst), None);
    }
}
