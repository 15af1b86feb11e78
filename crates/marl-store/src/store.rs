//! The [`ValueStore`]: registration, typed dispatch, and history access.

use std::any::TypeId;
use std::cell::RefCell;
use std::io::Read;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use marl_core::{Location, PersistError, StoreError, StoredValue, Value, ValueId};

use crate::history::{Generation, History};
use crate::valuer::{ErasedValuer, SharedTypedValuer, TypedValuer, Valuer};

/// A mapper: a location-dependent redirect from one registered name to
/// another id.
///
/// Mappers receive the store so they can resolve names at call time;
/// chains of mappers are followed until a valuer slot is reached.
pub type MapperFn = Box<dyn Fn(&ValueStore, &Location) -> Result<ValueId, StoreError>>;

/// Construction options for a [`ValueStore`].
#[derive(Clone, Copy, Debug, Default)]
pub struct StoreConfig {
    /// Run cycle and type checks on every retrieval.
    ///
    /// Off by default; turn it on during development and in tests. With
    /// it off, a dependency cycle recurses without bound instead of
    /// reporting a clean error.
    pub errcheck: bool,
}

/// Everything the store knows about a registered valuer.
pub(crate) struct ValuerSlot {
    pub(crate) valuer: Box<dyn ErasedValuer>,
    /// Whether the store owns the valuer or shares it with the caller.
    pub(crate) owned: bool,
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) guarantees: &'static [&'static str],
    /// Deserializer for persisted history entries of this slot's type.
    pub(crate) decode: fn(&mut dyn Read) -> Result<Box<dyn StoredValue>, PersistError>,
}

pub(crate) enum SlotKind {
    Valuer(ValuerSlot),
    Mapper(MapperFn),
}

pub(crate) struct Slot {
    pub(crate) name: String,
    pub(crate) kind: SlotKind,
}

fn decode_boxed<T: Value>(r: &mut dyn Read) -> Result<Box<dyn StoredValue>, PersistError> {
    Ok(Box::new(T::decode(r)?))
}

/// A typed, on-demand evaluator and history cache for named quantities
/// computed at mesh locations.
///
/// Names are registered once and resolve to dense [`ValueId`]s. Pulling a
/// value invokes its valuer, which may pull further values through the
/// store; the store detects cycles, checks types, and stages values whose
/// history is wanted so that [`shift`](Self::shift) can rotate them into
/// `old` and `older`.
///
/// All retrieval goes through `&self`: the store uses interior mutability
/// so valuers can re-enter it. One store belongs to one thread.
pub struct ValueStore {
    slots: Vec<Slot>,
    ids: IndexMap<String, ValueId>,
    history: RefCell<History>,
    /// One frame per in-flight retrieval chain; history reads push a
    /// fresh frame because they break dependency chains.
    cycle: RefCell<Vec<IndexSet<ValueId>>>,
    errcheck: bool,
}

impl Default for ValueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ValueStore {
    /// An empty store with checks disabled.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// An empty store with the given options.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            slots: Vec::new(),
            ids: IndexMap::new(),
            history: RefCell::new(History::default()),
            cycle: RefCell::new(vec![IndexSet::new()]),
            errcheck: config.errcheck,
        }
    }

    /// Toggle runtime cycle and type checking.
    pub fn set_errcheck(&mut self, on: bool) {
        self.errcheck = on;
    }

    // ── Registration ───────────────────────────────────────────────

    /// Register a valuer under `name`, transferring ownership to the store.
    pub fn add<T: Value>(
        &mut self,
        name: &str,
        valuer: impl Valuer<T>,
    ) -> Result<ValueId, StoreError> {
        let guarantees = valuer.guarantees();
        self.insert_valuer_slot::<T>(name, Box::new(TypedValuer::new(valuer)), true, guarantees)
    }

    /// Register a shared valuer; the caller keeps its handle.
    ///
    /// Useful when a driver wants to inspect or adjust the valuer between
    /// pulls. The store borrows the cell only for the duration of each
    /// call.
    pub fn add_shared<T: Value, V: Valuer<T>>(
        &mut self,
        name: &str,
        valuer: Rc<RefCell<V>>,
    ) -> Result<ValueId, StoreError> {
        let guarantees = valuer.borrow().guarantees();
        self.insert_valuer_slot::<T>(
            name,
            Box::new(SharedTypedValuer::new(valuer)),
            false,
            guarantees,
        )
    }

    fn insert_valuer_slot<T: Value>(
        &mut self,
        name: &str,
        valuer: Box<dyn ErasedValuer>,
        owned: bool,
        guarantees: &'static [&'static str],
    ) -> Result<ValueId, StoreError> {
        let id = self.claim_name(name)?;
        self.slots.push(Slot {
            name: name.to_string(),
            kind: SlotKind::Valuer(ValuerSlot {
                valuer,
                owned,
                type_id: TypeId::of::<T>(),
                type_name: T::type_name(),
                guarantees,
                decode: decode_boxed::<T>,
            }),
        });
        self.history.get_mut().push_slot();
        Ok(id)
    }

    /// Register a mapper under `name`: a conditional alias that redirects
    /// every operation on this id to the id the mapper returns for the
    /// supplied location.
    pub fn add_mapper(
        &mut self,
        name: &str,
        mapper: impl Fn(&ValueStore, &Location) -> Result<ValueId, StoreError> + 'static,
    ) -> Result<ValueId, StoreError> {
        let id = self.claim_name(name)?;
        self.slots.push(Slot {
            name: name.to_string(),
            kind: SlotKind::Mapper(Box::new(mapper)),
        });
        self.history.get_mut().push_slot();
        Ok(id)
    }

    fn claim_name(&mut self, name: &str) -> Result<ValueId, StoreError> {
        if self.ids.contains_key(name) {
            return Err(StoreError::DuplicateName {
                name: name.to_string(),
            });
        }
        let id = ValueId(self.slots.len() as u32);
        self.ids.insert(name.to_string(), id);
        Ok(id)
    }

    // ── Introspection ──────────────────────────────────────────────

    /// Resolve a registered name to its id.
    pub fn id(&self, name: &str) -> Result<ValueId, StoreError> {
        self.ids
            .get(name)
            .copied()
            .ok_or_else(|| StoreError::NameUnknown {
                name: name.to_string(),
            })
    }

    /// The name an id was registered under.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this store.
    pub fn name_of(&self, id: ValueId) -> &str {
        &self.slots[id.index()].name
    }

    /// Number of registered slots (valuers and mappers).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slots are registered.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The registered type name of a valuer slot; `None` for mappers.
    pub fn type_name_of(&self, id: ValueId) -> Option<&'static str> {
        match &self.slots[id.index()].kind {
            SlotKind::Valuer(vs) => Some(vs.type_name),
            SlotKind::Mapper(_) => None,
        }
    }

    /// The guarantee tags a valuer slot declares; empty for mappers.
    pub fn guarantees_of(&self, id: ValueId) -> &'static [&'static str] {
        match &self.slots[id.index()].kind {
            SlotKind::Valuer(vs) => vs.guarantees,
            SlotKind::Mapper(_) => &[],
        }
    }

    /// Whether the store owns the slot's valuer. `false` for shared
    /// valuers and mappers.
    pub fn is_owned(&self, id: ValueId) -> bool {
        match &self.slots[id.index()].kind {
            SlotKind::Valuer(vs) => vs.owned,
            SlotKind::Mapper(_) => false,
        }
    }

    /// Whether the slot is a mapper.
    pub fn is_mapper(&self, id: ValueId) -> bool {
        matches!(self.slots[id.index()].kind, SlotKind::Mapper(_))
    }

    // ── History opt-in ─────────────────────────────────────────────

    /// Declare that `old` values of `name` are required.
    ///
    /// Also enabled automatically by the first [`get_old`](Self::get_old).
    pub fn want_old(&mut self, name: &str) -> Result<(), StoreError> {
        let id = self.id(name)?;
        self.history.get_mut().set_want(Generation::Old, id);
        Ok(())
    }

    /// Declare that `older` values of `name` are required.
    pub fn want_older(&mut self, name: &str) -> Result<(), StoreError> {
        let id = self.id(name)?;
        self.history.get_mut().set_want(Generation::Older, id);
        Ok(())
    }

    // ── Retrieval ──────────────────────────────────────────────────

    /// Pull the current value of `id` at `loc`.
    ///
    /// Invokes the valuer (resolving mapper indirection first), stages the
    /// result for history if history is wanted, and returns it. Fails with
    /// [`StoreError::CyclicDependency`] on re-entry and
    /// [`StoreError::TypeMismatch`] when `T` is not the registered type.
    pub fn get<T: Value>(&self, id: ValueId, loc: &Location) -> Result<T, StoreError> {
        let boxed = self.get_stored(id, loc, Some((TypeId::of::<T>(), T::type_name())))?;
        self.downcast::<T>(id, boxed)
    }

    /// [`get`](Self::get) by registered name.
    pub fn get_named<T: Value>(&self, name: &str, loc: &Location) -> Result<T, StoreError> {
        self.get(self.id(name)?, loc)
    }

    /// Pull the previous-step value of `id` at `loc`.
    ///
    /// Enables history tracking for the id, forces a current evaluation if
    /// none was pulled since the last shift (so staging stays alive), and
    /// returns the stored `old` entry — or the valuer's `initial_old`
    /// when none exists. The fallback is not staged.
    pub fn get_old<T: Value>(&self, id: ValueId, loc: &Location) -> Result<T, StoreError> {
        self.get_history(id, loc, Generation::Old)
    }

    /// [`get_old`](Self::get_old) by registered name.
    pub fn get_old_named<T: Value>(&self, name: &str, loc: &Location) -> Result<T, StoreError> {
        self.get_old(self.id(name)?, loc)
    }

    /// Pull the value of `id` at `loc` from two steps ago.
    ///
    /// Falls back to the valuer's `initial_older` when no `older` entry
    /// exists — even if an `old` entry does.
    pub fn get_older<T: Value>(&self, id: ValueId, loc: &Location) -> Result<T, StoreError> {
        self.get_history(id, loc, Generation::Older)
    }

    /// [`get_older`](Self::get_older) by registered name.
    pub fn get_older_named<T: Value>(
        &self,
        name: &str,
        loc: &Location,
    ) -> Result<T, StoreError> {
        self.get_older(self.id(name)?, loc)
    }

    /// Pull the current value, first checking the valuer declares every
    /// guarantee tag in `needs`.
    pub fn get_requiring<T: Value>(
        &self,
        id: ValueId,
        loc: &Location,
        needs: &[&str],
    ) -> Result<T, StoreError> {
        let resolved = self.resolve_mapper(id, loc)?;
        let declared = self.guarantees_of(resolved);
        for need in needs {
            if !declared.iter().any(|g| g == need) {
                return Err(StoreError::MissingGuarantee {
                    name: self.slots[resolved.index()].name.clone(),
                    guarantee: need.to_string(),
                });
            }
        }
        self.get(resolved, loc)
    }

    // ── History maintenance ────────────────────────────────────────

    /// Advance history one step and notify every valuer.
    ///
    /// Rotates `older <- old <- current <- {}` (a container swap, not an
    /// entry-by-entry move), then calls `on_shift` on each registered
    /// valuer. Values displaced from `older` are dropped.
    pub fn shift(&mut self) {
        self.history.get_mut().shift();
        for slot in &mut self.slots {
            if let SlotKind::Valuer(vs) = &mut slot.kind {
                vs.valuer.on_shift_erased();
            }
        }
    }

    /// Move stored `old` entries from `srcs[i]` to `dsts[i]`, one-to-one,
    /// for every registered id.
    ///
    /// Used after mesh adaptation to re-key history onto the new mesh.
    /// Must be called between [`shift`](Self::shift) and the next
    /// historical read. Sources and destinations may overlap; every
    /// destination receives a copy taken before any source is dropped.
    pub fn project(&mut self, srcs: &[Location], dsts: &[Location]) -> Result<(), StoreError> {
        self.history.get_mut().project(srcs, dsts)
    }

    // ── Dispatch internals ─────────────────────────────────────────

    /// Follow mapper indirection until a valuer slot is reached.
    ///
    /// Used by the history accessors and guarantee checks; current-value
    /// dispatch resolves mappers recursively inside [`Self::get_stored`]
    /// so the mapper ids participate in the cycle frames.
    fn resolve_mapper(&self, start: ValueId, loc: &Location) -> Result<ValueId, StoreError> {
        let mut id = start;
        let mut visited: IndexSet<ValueId> = IndexSet::new();
        loop {
            match &self.slots[id.index()].kind {
                SlotKind::Valuer(_) => return Ok(id),
                SlotKind::Mapper(func) => {
                    if !visited.insert(id) {
                        let chain = visited
                            .iter()
                            .map(|i| self.slots[i.index()].name.clone())
                            .collect();
                        return Err(StoreError::CyclicDependency { chain });
                    }
                    id = func(self, loc)?;
                }
            }
        }
    }

    /// Type-erased pull: resolve mappers, run checks, invoke the valuer,
    /// mark the external pull, and stage for history when wanted.
    ///
    /// `wanted` carries the caller's requested type for errcheck-time
    /// verification at the terminal slot; the internal pull forced by
    /// historical reads passes `None`.
    fn get_stored(
        &self,
        id: ValueId,
        loc: &Location,
        wanted: Option<(TypeId, &'static str)>,
    ) -> Result<Box<dyn StoredValue>, StoreError> {
        match &self.slots[id.index()].kind {
            SlotKind::Mapper(func) => {
                if self.errcheck {
                    self.enter_frame(id)?;
                }
                let result = func(self, loc).and_then(|target| self.get_stored(target, loc, wanted));
                if self.errcheck {
                    self.leave_frame(id);
                }
                result
            }
            SlotKind::Valuer(vs) => {
                if self.errcheck {
                    self.enter_frame(id)?;
                    if let Some((type_id, wanted_name)) = wanted {
                        if type_id != vs.type_id {
                            self.leave_frame(id);
                            return Err(StoreError::TypeMismatch {
                                name: self.slots[id.index()].name.clone(),
                                wanted: wanted_name,
                                found: vs.type_name,
                            });
                        }
                    }
                }
                // The pull is marked external before the valuer runs, so a
                // valuer reading its own history does not re-trigger its
                // own evaluation through the historical accessors.
                self.history.borrow_mut().mark_external(id, loc);
                let computed = vs.valuer.value_erased(self, loc);
                if self.errcheck {
                    self.leave_frame(id);
                }
                let val = computed?;
                let mut h = self.history.borrow_mut();
                if h.wants_history(id) {
                    h.stage_current(id, loc, val.clone_boxed());
                }
                Ok(val)
            }
        }
    }

    fn get_history<T: Value>(
        &self,
        id: ValueId,
        loc: &Location,
        gen: Generation,
    ) -> Result<T, StoreError> {
        let id = self.resolve_mapper(id, loc)?;
        let vs = match &self.slots[id.index()].kind {
            SlotKind::Valuer(vs) => vs,
            SlotKind::Mapper(_) => unreachable!("resolve_mapper returns valuer slots"),
        };
        if self.errcheck {
            // History reads break dependency chains: they may re-enter a
            // value that is mid-evaluation without forming a true cycle.
            self.cycle.borrow_mut().push(IndexSet::new());
            if TypeId::of::<T>() != vs.type_id {
                self.cycle.borrow_mut().pop();
                return Err(StoreError::TypeMismatch {
                    name: self.slots[id.index()].name.clone(),
                    wanted: T::type_name(),
                    found: vs.type_name,
                });
            }
        }
        let result = self.get_history_inner::<T>(id, vs, loc, gen);
        if self.errcheck {
            self.cycle.borrow_mut().pop();
        }
        result
    }

    fn get_history_inner<T: Value>(
        &self,
        id: ValueId,
        vs: &ValuerSlot,
        loc: &Location,
        gen: Generation,
    ) -> Result<T, StoreError> {
        self.history.borrow_mut().set_want(gen, id);

        // Keep the staging chain alive: if nothing pulled this value
        // since the last shift, pull it now so a current entry exists to
        // become old. The internal pull does not count as external.
        let need_force = !self.history.borrow().is_external(id, loc);
        if need_force {
            self.get_stored(id, loc, None)?;
            self.history.borrow_mut().clear_external(id, loc);
        }

        {
            let h = self.history.borrow();
            if let Some(entry) = h.entry(gen, id, loc) {
                let cloned = entry.clone_boxed();
                drop(h);
                return self.downcast::<T>(id, cloned);
            }
        }

        // No history: fall back to the valuer's initial value. Not staged.
        let fallback = match gen {
            Generation::Old => vs.valuer.initial_old_erased(loc),
            Generation::Older => vs.valuer.initial_older_erased(loc),
        };
        self.downcast::<T>(id, fallback)
    }

    fn downcast<T: Value>(
        &self,
        id: ValueId,
        boxed: Box<dyn StoredValue>,
    ) -> Result<T, StoreError> {
        let found = boxed.value_type_name();
        boxed
            .into_any()
            .downcast::<T>()
            .map(|b| *b)
            .map_err(|_| StoreError::TypeMismatch {
                name: self.slots[id.index()].name.clone(),
                wanted: T::type_name(),
                found,
            })
    }

    fn enter_frame(&self, id: ValueId) -> Result<(), StoreError> {
        let mut stack = self.cycle.borrow_mut();
        let frame = stack.last_mut().expect("cycle stack always has a base frame");
        if frame.contains(&id) {
            let chain = frame
                .iter()
                .map(|i| self.slots[i.index()].name.clone())
                .collect();
            return Err(StoreError::CyclicDependency { chain });
        }
        frame.insert(id);
        Ok(())
    }

    fn leave_frame(&self, id: ValueId) {
        let mut stack = self.cycle.borrow_mut();
        let frame = stack.last_mut().expect("cycle stack always has a base frame");
        frame.shift_remove(&id);
    }

    // ── Persistence plumbing ───────────────────────────────────────

    pub(crate) fn valuer_slot(&self, id: ValueId) -> Option<&ValuerSlot> {
        match &self.slots[id.index()].kind {
            SlotKind::Valuer(vs) => Some(vs),
            SlotKind::Mapper(_) => None,
        }
    }

    pub(crate) fn history_ref(&self) -> std::cell::Ref<'_, History> {
        self.history.borrow()
    }

    pub(crate) fn history_mut(&mut self) -> &mut History {
        self.history.get_mut()
    }
}
