//! Closure-backed valuers.

use std::cell::RefCell;
use std::rc::Rc;

use marl_core::{Location, StoreError, Value};
use marl_store::{ValueStore, Valuer};

/// Wraps a closure as a valuer.
///
/// The closure receives the store so it can pull other registered values.
/// Optional constant overrides replace the zero-value defaults for the
/// historical fallbacks.
///
/// # Examples
///
/// ```
/// use marl_core::Location;
/// use marl_store::ValueStore;
/// use marl_valuers::LambdaValuer;
///
/// let mut store = ValueStore::new();
/// store
///     .add("porosity", LambdaValuer::new(|_store, loc: &Location| {
///         Ok(0.3 + 0.01 * f64::from(loc.qp()))
///     }))
///     .unwrap();
///
/// let loc = Location::new(1, 2, 4);
/// assert_eq!(store.get_named::<f64>("porosity", &loc).unwrap(), 0.32);
/// ```
pub struct LambdaValuer<T, F> {
    func: RefCell<F>,
    initial_old: Option<T>,
    initial_older: Option<T>,
}

impl<T, F> LambdaValuer<T, F>
where
    T: Value,
    F: FnMut(&ValueStore, &Location) -> Result<T, StoreError> + 'static,
{
    /// Wrap `func` as a valuer.
    pub fn new(func: F) -> Self {
        Self {
            func: RefCell::new(func),
            initial_old: None,
            initial_older: None,
        }
    }

    /// Use `value` instead of the zero default as the initial-old fallback.
    pub fn with_initial_old(mut self, value: T) -> Self {
        self.initial_old = Some(value);
        self
    }

    /// Use `value` instead of the zero default as the initial-older fallback.
    pub fn with_initial_older(mut self, value: T) -> Self {
        self.initial_older = Some(value);
        self
    }
}

impl<T, F> Valuer<T> for LambdaValuer<T, F>
where
    T: Value,
    F: FnMut(&ValueStore, &Location) -> Result<T, StoreError> + 'static,
{
    fn value(&self, store: &ValueStore, loc: &Location) -> Result<T, StoreError> {
        (self.func.borrow_mut())(store, loc)
    }

    fn initial_old(&self, _loc: &Location) -> T {
        self.initial_old.clone().unwrap_or_default()
    }

    fn initial_older(&self, _loc: &Location) -> T {
        self.initial_older.clone().unwrap_or_default()
    }
}

/// A fixed value at every location.
pub struct ConstValuer<T> {
    value: T,
}

impl<T: Value> ConstValuer<T> {
    /// A valuer that always yields `value`.
    pub fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T: Value> Valuer<T> for ConstValuer<T> {
    fn value(&self, _store: &ValueStore, _loc: &Location) -> Result<T, StoreError> {
        Ok(self.value.clone())
    }

    fn guarantees(&self) -> &'static [&'static str] {
        &["constant"]
    }
}

/// An output cell shared between a procedure and the valuers reading it.
pub type SharedSlot<T> = Rc<RefCell<T>>;

/// Allocate a [`SharedSlot`] holding the type's zero value.
pub fn shared_slot<T: Value>() -> SharedSlot<T> {
    Rc::new(RefCell::new(T::default()))
}

/// A valuer fed by a procedure that computes several outputs together.
///
/// One procedure (a material-style bundle) writes into any number of
/// [`SharedSlot`]s; each output registers its own `LambdaVarValuer`
/// pointing at the shared procedure and its slot. The last evaluated
/// location is cached so the procedure runs once per location per step
/// no matter how many of its outputs are pulled; the cache clears on
/// shift.
///
/// # Examples
///
/// ```
/// use marl_core::Location;
/// use marl_store::ValueStore;
/// use marl_valuers::{shared_slot, LambdaVarValuer};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let density = shared_slot::<f64>();
/// let viscosity = shared_slot::<f64>();
///
/// let procedure = {
///     let density = density.clone();
///     let viscosity = viscosity.clone();
///     Rc::new(RefCell::new(move |_: &ValueStore, loc: &Location| {
///         *density.borrow_mut() = 1000.0 + f64::from(loc.element());
///         *viscosity.borrow_mut() = 0.001 * f64::from(loc.element());
///         Ok(())
///     }))
/// };
///
/// let mut store = ValueStore::new();
/// store
///     .add("density", LambdaVarValuer::new(procedure.clone(), density))
///     .unwrap();
/// store
///     .add("viscosity", LambdaVarValuer::new(procedure, viscosity))
///     .unwrap();
///
/// let loc = Location::new(3, 0, 4);
/// assert_eq!(store.get_named::<f64>("density", &loc).unwrap(), 1003.0);
/// assert_eq!(store.get_named::<f64>("viscosity", &loc).unwrap(), 0.003);
/// ```
pub struct LambdaVarValuer<T, F> {
    procedure: Rc<RefCell<F>>,
    slot: SharedSlot<T>,
    prev_loc: RefCell<Option<Location>>,
}

impl<T, F> LambdaVarValuer<T, F>
where
    T: Value,
    F: FnMut(&ValueStore, &Location) -> Result<(), StoreError> + 'static,
{
    /// Bind an output `slot` of the shared `procedure`.
    pub fn new(procedure: Rc<RefCell<F>>, slot: SharedSlot<T>) -> Self {
        Self {
            procedure,
            slot,
            prev_loc: RefCell::new(None),
        }
    }
}

impl<T, F> Valuer<T> for LambdaVarValuer<T, F>
where
    T: Value,
    F: FnMut(&ValueStore, &Location) -> Result<(), StoreError> + 'static,
{
    fn value(&self, store: &ValueStore, loc: &Location) -> Result<T, StoreError> {
        if self.prev_loc.borrow().as_ref() != Some(loc) {
            (self.procedure.borrow_mut())(store, loc)?;
            *self.prev_loc.borrow_mut() = Some(loc.clone());
        }
        Ok(self.slot.borrow().clone())
    }

    fn on_shift(&mut self) {
        *self.prev_loc.get_mut() = None;
    }
}
