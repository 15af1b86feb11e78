//! Region-dispatch registration: one name, many per-region sub-values.

use std::collections::BTreeSet;

use marl_core::{RegionId, StoreError, ValueId};
use marl_store::ValueStore;

/// Registers a mapper that routes one property name to sub-values by
/// mesh region.
///
/// A common FE pattern: a quantity like `conductivity` is defined by
/// different models on different subdomains, but consumers want a single
/// name. The umbrella installs a mapper that picks the sub-value whose
/// region set contains the location's region; locations outside every
/// region set fail with [`StoreError::MapperMissingTarget`].
///
/// Sub-names are resolved at pull time, so they may be registered before
/// or after the umbrella. Entries are consulted in the given order and
/// the first match wins.
///
/// # Examples
///
/// ```
/// use marl_core::Location;
/// use marl_store::ValueStore;
/// use marl_valuers::{ConstValuer, Umbrella};
///
/// let mut store = ValueStore::new();
/// store.add("k_steel", ConstValuer::new(45.0)).unwrap();
/// store.add("k_copper", ConstValuer::new(400.0)).unwrap();
/// Umbrella::register(
///     &mut store,
///     "conductivity",
///     vec![
///         ("k_steel".into(), (0..=5).collect()),
///         ("k_copper".into(), (6..=8).collect()),
///     ],
/// )
/// .unwrap();
///
/// let in_steel = Location::new(1, 0, 4).with_region(4);
/// let in_copper = Location::new(1, 0, 4).with_region(7);
/// assert_eq!(store.get_named::<f64>("conductivity", &in_steel).unwrap(), 45.0);
/// assert_eq!(store.get_named::<f64>("conductivity", &in_copper).unwrap(), 400.0);
/// ```
pub struct Umbrella;

impl Umbrella {
    /// Install the mapper for `name` over the given `(sub-name, regions)`
    /// entries. Returns the mapper's id.
    pub fn register(
        store: &mut ValueStore,
        name: &str,
        subprops: Vec<(String, BTreeSet<RegionId>)>,
    ) -> Result<ValueId, StoreError> {
        let owned_name = name.to_string();
        store.add_mapper(name, move |store, loc| {
            for (sub, regions) in &subprops {
                if regions.contains(&loc.region()) {
                    return store.id(sub);
                }
            }
            Err(StoreError::MapperMissingTarget {
                name: owned_name.clone(),
                region: loc.region(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConstValuer;
    use marl_core::Location;

    fn region_split_store() -> ValueStore {
        let mut store = ValueStore::new();
        store.add("v1", ConstValuer::new(42.0)).unwrap();
        store.add("v2", ConstValuer::new(43.0)).unwrap();
        Umbrella::register(
            &mut store,
            "vv",
            vec![
                ("v1".into(), (0..=5).collect()),
                ("v2".into(), (6..=8).collect()),
            ],
        )
        .unwrap();
        store
    }

    fn at_region(region: u32) -> Location {
        Location::new(1, 0, 4).with_region(region)
    }

    #[test]
    fn routes_by_region() {
        let store = region_split_store();
        assert_eq!(store.get_named::<f64>("vv", &at_region(4)).unwrap(), 42.0);
        assert_eq!(store.get_named::<f64>("vv", &at_region(5)).unwrap(), 42.0);
        assert_eq!(store.get_named::<f64>("vv", &at_region(6)).unwrap(), 43.0);
        assert_eq!(store.get_named::<f64>("vv", &at_region(7)).unwrap(), 43.0);
    }

    #[test]
    fn uncovered_region_is_a_missing_target() {
        let store = region_split_store();
        let err = store.get_named::<f64>("vv", &at_region(9)).unwrap_err();
        assert_eq!(
            err,
            StoreError::MapperMissingTarget {
                name: "vv".into(),
                region: 9,
            }
        );
    }

    #[test]
    fn historical_reads_route_through_the_umbrella() {
        let mut store = region_split_store();
        let loc = at_region(3);
        // the first historical read routes to v1, auto-enables its
        // tracking, and stages the current 42 while falling back to zero
        assert_eq!(store.get_old_named::<f64>("vv", &loc).unwrap(), 0.0);
        store.shift();
        // history lives under the routed target (v1), reached via "vv"
        assert_eq!(store.get_old_named::<f64>("vv", &loc).unwrap(), 42.0);
        assert_eq!(store.get_old_named::<f64>("v1", &loc).unwrap(), 42.0);
    }

    #[test]
    fn sub_values_may_register_after_the_umbrella() {
        let mut store = ValueStore::new();
        Umbrella::register(
            &mut store,
            "late",
            vec![("target".into(), [0u32].into_iter().collect())],
        )
        .unwrap();
        store.add("target", ConstValuer::new(7.0)).unwrap();
        assert_eq!(
            store
                .get_named::<f64>("late", &Location::new(1, 0, 4))
                .unwrap(),
            7.0
        );
    }
}
