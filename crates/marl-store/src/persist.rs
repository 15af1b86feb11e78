//! Saving and loading staged history for restart.
//!
//! The format is a magic/version header followed by one record per
//! `(value, generation)` pair whose history is wanted. Each record is the
//! value's name, its registered type name, a generation tag, and the
//! `Location -> value` entries as `(element, face, qp)` triples plus the
//! value's own encoding. The quadrature count and region are not
//! persisted; the mesh driver re-derives them after load (typically by
//! re-keying with [`ValueStore::project`]).
//!
//! The format is not bit-stable across type changes: a load refuses any
//! record whose type name disagrees with the registered valuer.

use std::io::{Read, Write};

use marl_core::codec::{
    read_length_prefixed_str, read_u32_le, read_u8, write_length_prefixed_str, write_u32_le,
    write_u8,
};
use marl_core::{Location, PersistError, ValueId};

use crate::history::Generation;
use crate::store::ValueStore;

/// Leading magic bytes of a persisted history stream.
pub const MAGIC: [u8; 4] = *b"MARL";

/// Current format version.
pub const FORMAT_VERSION: u8 = 1;

const TAG_OLD: u8 = 0;
const TAG_OLDER: u8 = 1;

fn generation_tag(gen: Generation) -> u8 {
    match gen {
        Generation::Old => TAG_OLD,
        Generation::Older => TAG_OLDER,
    }
}

/// Write every wanted history map of `store` to `w`.
///
/// Only valuer slots with `want_old` (resp. `want_older`) enabled
/// contribute records; mappers hold no history and are skipped.
pub fn save_history(store: &ValueStore, w: &mut dyn Write) -> Result<(), PersistError> {
    let history = store.history_ref();

    // count records first: one per (id, generation) with history wanted
    let mut record_count: u32 = 0;
    for index in 0..store.len() {
        let id = ValueId(index as u32);
        if store.valuer_slot(id).is_none() {
            continue;
        }
        for gen in [Generation::Old, Generation::Older] {
            if history.wants(gen, id) {
                record_count += 1;
            }
        }
    }

    w.write_all(&MAGIC)?;
    write_u8(w, FORMAT_VERSION)?;
    write_u32_le(w, record_count)?;

    for index in 0..store.len() {
        let id = ValueId(index as u32);
        let Some(slot) = store.valuer_slot(id) else {
            continue;
        };
        for gen in [Generation::Old, Generation::Older] {
            if !history.wants(gen, id) {
                continue;
            }
            let map = history.map(gen, id);
            write_length_prefixed_str(w, store.name_of(id))?;
            write_length_prefixed_str(w, slot.type_name)?;
            write_u8(w, generation_tag(gen))?;
            write_u32_le(w, map.len() as u32)?;
            for (loc, value) in map {
                write_u32_le(w, loc.element())?;
                write_u32_le(w, loc.face())?;
                write_u32_le(w, loc.qp())?;
                match loc.custom() {
                    Some(key) => {
                        write_u8(w, 1)?;
                        key.encode(w)?;
                    }
                    None => write_u8(w, 0)?,
                }
                value.encode(w)?;
            }
        }
    }
    Ok(())
}

/// Read a stream written by [`save_history`] back into `store`.
///
/// Every record's name must be registered and its type name must match
/// the registered valuer's. Loaded entries land in the corresponding
/// history map and enable its want flag, so the next shift treats them
/// exactly like natively staged values.
pub fn load_history(store: &mut ValueStore, r: &mut dyn Read) -> Result<(), PersistError> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(PersistError::BadMagic);
    }
    let version = read_u8(r)?;
    if version != FORMAT_VERSION {
        return Err(PersistError::UnsupportedVersion { found: version });
    }

    let record_count = read_u32_le(r)?;
    for _ in 0..record_count {
        let name = read_length_prefixed_str(r)?;
        let type_name = read_length_prefixed_str(r)?;
        let id = store
            .id(&name)
            .map_err(|_| PersistError::NameUnknown { name: name.clone() })?;
        let (registered_type, decode) = match store.valuer_slot(id) {
            Some(slot) => (slot.type_name, slot.decode),
            None => {
                return Err(PersistError::MalformedRecord {
                    detail: format!("'{name}' is a mapper and cannot hold history"),
                })
            }
        };
        if type_name != registered_type {
            return Err(PersistError::TypeNameMismatch {
                name,
                stored: type_name,
                registered: registered_type.to_string(),
            });
        }
        let gen = match read_u8(r)? {
            TAG_OLD => Generation::Old,
            TAG_OLDER => Generation::Older,
            other => {
                return Err(PersistError::MalformedRecord {
                    detail: format!("unknown generation tag {other}"),
                })
            }
        };
        let entry_count = read_u32_le(r)?;
        for _ in 0..entry_count {
            let element = read_u32_le(r)?;
            let face = read_u32_le(r)?;
            let qp = read_u32_le(r)?;
            match read_u8(r)? {
                0 => {}
                1 => {
                    return Err(PersistError::MalformedRecord {
                        detail: format!("'{name}' entry carries a custom key; \
                                         custom keys are not reloadable"),
                    })
                }
                other => {
                    return Err(PersistError::MalformedRecord {
                        detail: format!("invalid custom-key presence byte {other}"),
                    })
                }
            }
            let value = decode(r)?;
            // qp count is not persisted; identity ignores it, so the
            // smallest consistent count is used until the driver re-keys
            let loc = Location::new(element, qp, qp + 1).with_face(face);
            store.history_mut().insert_entry(gen, id, loc, value);
        }
        store.history_mut().set_want(gen, id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreConfig;
    use crate::valuer::Valuer;
    use marl_core::StoreError;

    struct Counter(f64);

    impl Valuer<f64> for Counter {
        fn value(&self, _s: &ValueStore, _l: &Location) -> Result<f64, StoreError> {
            Ok(self.0)
        }
        fn on_shift(&mut self) {
            self.0 += 1.0;
        }
    }

    struct Tagged(String);

    impl Valuer<String> for Tagged {
        fn value(&self, _s: &ValueStore, _l: &Location) -> Result<String, StoreError> {
            Ok(self.0.clone())
        }
    }

    fn populated_store() -> ValueStore {
        let mut store = ValueStore::with_config(StoreConfig { errcheck: true });
        store.add("count", Counter(10.0)).unwrap();
        store.add("label", Tagged("phase-a".into())).unwrap();
        store.want_old("count").unwrap();
        store.want_older("count").unwrap();
        store.want_old("label").unwrap();

        for element in 1..=3u32 {
            let loc = Location::new(element, 0, 2);
            store.get_named::<f64>("count", &loc).unwrap();
            store.get_named::<String>("label", &loc).unwrap();
        }
        store.shift();
        for element in 1..=3u32 {
            let loc = Location::new(element, 0, 2);
            store.get_named::<f64>("count", &loc).unwrap();
            store.get_named::<String>("label", &loc).unwrap();
        }
        store.shift();
        store
    }

    fn fresh_twin() -> ValueStore {
        let mut store = ValueStore::with_config(StoreConfig { errcheck: true });
        store.add("count", Counter(0.0)).unwrap();
        store.add("label", Tagged(String::new())).unwrap();
        store
    }

    #[test]
    fn save_load_round_trips_history() {
        let saved = populated_store();
        let mut buf = Vec::new();
        save_history(&saved, &mut buf).unwrap();

        let mut loaded = fresh_twin();
        load_history(&mut loaded, &mut buf.as_slice()).unwrap();

        for element in 1..=3u32 {
            let loc = Location::new(element, 0, 2);
            assert_eq!(loaded.get_old_named::<f64>("count", &loc).unwrap(), 11.0);
            assert_eq!(loaded.get_older_named::<f64>("count", &loc).unwrap(), 10.0);
            assert_eq!(
                loaded.get_old_named::<String>("label", &loc).unwrap(),
                "phase-a"
            );
        }
    }

    #[test]
    fn unwanted_history_is_not_written() {
        let mut store = ValueStore::new();
        store.add("count", Counter(1.0)).unwrap();
        // no want flags: the file holds zero records
        let mut buf = Vec::new();
        save_history(&store, &mut buf).unwrap();

        let mut r = buf.as_slice();
        let mut magic = [0u8; 4];
        std::io::Read::read_exact(&mut r, &mut magic).unwrap();
        assert_eq!(magic, MAGIC);
        assert_eq!(read_u8(&mut r).unwrap(), FORMAT_VERSION);
        assert_eq!(read_u32_le(&mut r).unwrap(), 0);
        assert!(r.is_empty());
    }

    #[test]
    fn bad_magic_rejected() {
        let mut loaded = fresh_twin();
        let buf = b"NOPE\x01\x00\x00\x00\x00".to_vec();
        assert!(matches!(
            load_history(&mut loaded, &mut buf.as_slice()),
            Err(PersistError::BadMagic)
        ));
    }

    #[test]
    fn unsupported_version_rejected() {
        let mut loaded = fresh_twin();
        let mut buf = MAGIC.to_vec();
        buf.push(99);
        assert!(matches!(
            load_history(&mut loaded, &mut buf.as_slice()),
            Err(PersistError::UnsupportedVersion { found: 99 })
        ));
    }

    #[test]
    fn unknown_name_rejected() {
        let saved = populated_store();
        let mut buf = Vec::new();
        save_history(&saved, &mut buf).unwrap();

        let mut loaded = ValueStore::new();
        loaded.add("something_else", Counter(0.0)).unwrap();
        assert!(matches!(
            load_history(&mut loaded, &mut buf.as_slice()),
            Err(PersistError::NameUnknown { .. })
        ));
    }

    #[test]
    fn type_name_mismatch_rejected() {
        let saved = populated_store();
        let mut buf = Vec::new();
        save_history(&saved, &mut buf).unwrap();

        // same names, but 'count' re-registered with a different type
        let mut loaded = ValueStore::new();
        loaded.add("count", Tagged(String::new())).unwrap();
        loaded.add("label", Tagged(String::new())).unwrap();
        match load_history(&mut loaded, &mut buf.as_slice()) {
            Err(PersistError::TypeNameMismatch {
                name,
                stored,
                registered,
            }) => {
                assert_eq!(name, "count");
                assert_eq!(stored, "f64");
                assert_eq!(registered, "string");
            }
            other => panic!("expected TypeNameMismatch, got {other:?}"),
        }
    }

    #[test]
    fn truncated_stream_rejected() {
        let saved = populated_store();
        let mut buf = Vec::new();
        save_history(&saved, &mut buf).unwrap();
        buf.truncate(buf.len() - 3);

        let mut loaded = fresh_twin();
        assert!(matches!(
            load_history(&mut loaded, &mut buf.as_slice()),
            Err(PersistError::Io(_))
        ));
    }
}
