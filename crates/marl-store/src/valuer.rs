//! The [`Valuer`] trait and its type-erased plumbing.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

use marl_core::{Location, StoreError, StoredValue, Value};

use crate::store::ValueStore;

/// A producer of one typed quantity per mesh location.
///
/// # Contract
///
/// - `value()` MUST be idempotent between shifts: two pulls at the same
///   location with no intervening [`ValueStore::shift`] return the same
///   value.
/// - `&self` — pulls re-enter the store, and a valuer may even read its
///   own history while it executes, so evaluation cannot hold an
///   exclusive borrow. Per-step caches and counters go through `Cell` /
///   `RefCell` fields.
/// - A valuer that needs other quantities pulls them through the `store`
///   argument; the store detects cycles and evaluates dependencies on
///   demand. There is no back-pointer — the store hands itself in.
/// - `initial_old` / `initial_older` supply the fallback returned by
///   historical reads before any history has been staged; the default is
///   the type's zero value.
/// - `on_shift` is called once per [`ValueStore::shift`], after the
///   history rotation; valuers use it to drop per-step caches. No
///   evaluation is in flight during a shift, so it takes `&mut self`.
/// - `guarantees` is free-form metadata (e.g. `"constant"`,
///   `"positive"`); nothing checks it unless a consumer asks via
///   [`ValueStore::get_requiring`].
///
/// # Examples
///
/// A valuer that doubles another registered quantity:
///
/// ```
/// use marl_core::{Location, StoreError, ValueId};
/// use marl_store::{ValueStore, Valuer};
///
/// struct Doubled {
///     source: ValueId,
/// }
///
/// impl Valuer<f64> for Doubled {
///     fn value(&self, store: &ValueStore, loc: &Location) -> Result<f64, StoreError> {
///         Ok(2.0 * store.get::<f64>(self.source, loc)?)
///     }
/// }
/// ```
pub trait Valuer<T: Value>: 'static {
    /// Compute the current value at `loc`.
    fn value(&self, store: &ValueStore, loc: &Location) -> Result<T, StoreError>;

    /// The value reported by `get_old` before any old value is staged.
    fn initial_old(&self, _loc: &Location) -> T {
        T::default()
    }

    /// The value reported by `get_older` before any older value is staged.
    fn initial_older(&self, _loc: &Location) -> T {
        T::default()
    }

    /// Notification that the store advanced its history.
    fn on_shift(&mut self) {}

    /// Free-form capability tags consumers may require.
    fn guarantees(&self) -> &'static [&'static str] {
        &[]
    }
}

/// Object-safe form of [`Valuer`] the store keeps in its slots.
///
/// The typed bridge ([`TypedValuer`], [`SharedTypedValuer`]) boxes the
/// computed value; the store's typed accessors downcast it back.
pub(crate) trait ErasedValuer {
    fn value_erased(
        &self,
        store: &ValueStore,
        loc: &Location,
    ) -> Result<Box<dyn StoredValue>, StoreError>;

    fn initial_old_erased(&self, loc: &Location) -> Box<dyn StoredValue>;

    fn initial_older_erased(&self, loc: &Location) -> Box<dyn StoredValue>;

    fn on_shift_erased(&mut self);
}

/// Bridges an owned `V: Valuer<T>` into the erased slot form.
pub(crate) struct TypedValuer<T, V> {
    inner: V,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Value, V: Valuer<T>> TypedValuer<T, V> {
    pub(crate) fn new(inner: V) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }
}

impl<T: Value, V: Valuer<T>> ErasedValuer for TypedValuer<T, V> {
    fn value_erased(
        &self,
        store: &ValueStore,
        loc: &Location,
    ) -> Result<Box<dyn StoredValue>, StoreError> {
        Ok(Box::new(self.inner.value(store, loc)?))
    }

    fn initial_old_erased(&self, loc: &Location) -> Box<dyn StoredValue> {
        Box::new(self.inner.initial_old(loc))
    }

    fn initial_older_erased(&self, loc: &Location) -> Box<dyn StoredValue> {
        Box::new(self.inner.initial_older(loc))
    }

    fn on_shift_erased(&mut self) {
        self.inner.on_shift();
    }
}

/// Bridges a shared `Rc<RefCell<V>>` valuer into the erased slot form.
///
/// The caller keeps its handle and may inspect or adjust the valuer
/// between pulls; during a pull the store holds a shared borrow.
pub(crate) struct SharedTypedValuer<T, V> {
    inner: Rc<RefCell<V>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Value, V: Valuer<T>> SharedTypedValuer<T, V> {
    pub(crate) fn new(inner: Rc<RefCell<V>>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }
}

impl<T: Value, V: Valuer<T>> ErasedValuer for SharedTypedValuer<T, V> {
    fn value_erased(
        &self,
        store: &ValueStore,
        loc: &Location,
    ) -> Result<Box<dyn StoredValue>, StoreError> {
        Ok(Box::new(self.inner.borrow().value(store, loc)?))
    }

    fn initial_old_erased(&self, loc: &Location) -> Box<dyn StoredValue> {
        Box::new(self.inner.borrow().initial_old(loc))
    }

    fn initial_older_erased(&self, loc: &Location) -> Box<dyn StoredValue> {
        Box::new(self.inner.borrow().initial_older(loc))
    }

    fn on_shift_erased(&mut self) {
        self.inner.borrow_mut().on_shift();
    }
}
