//! The typed value contract and its type-erased form.
//!
//! The store keys history by [`Location`](crate::Location) and holds the
//! payloads as `Box<dyn StoredValue>`. Consumers and valuers only ever see
//! the concrete type `T`; the store only ever sees the [`StoredValue`]
//! vtable (clone, compare, serialize, downcast). A `TypeId` carried per
//! slot makes retrieval type-checkable at runtime.

use std::any::{Any, TypeId};
use std::io::{Read, Write};

use crate::codec;
use crate::error::PersistError;

/// A type that can be produced by a valuer and stored in history.
///
/// Implemented for the scalar and vector types the runtime supports.
/// `Default` provides the zero value used as the initial-old fallback;
/// `PartialOrd` backs the stored-value comparison hook; `encode`/`decode`
/// back persisted history.
pub trait Value: Clone + PartialOrd + Default + std::fmt::Debug + 'static {
    /// Serialize this value to a stream.
    fn encode(&self, w: &mut dyn Write) -> Result<(), PersistError>;

    /// Deserialize a value of this type from a stream.
    fn decode(r: &mut dyn Read) -> Result<Self, PersistError>
    where
        Self: Sized;

    /// Stable, human-readable type name.
    ///
    /// Used for mismatch reporting and validated on history load, so it
    /// must not change between the writing and reading build.
    fn type_name() -> &'static str;
}

/// Object-safe view of a stored history value.
///
/// The store never inspects payloads directly — only through this
/// vtable. Blanket-implemented for every [`Value`].
pub trait StoredValue: std::fmt::Debug {
    /// Deep-copy the value.
    fn clone_boxed(&self) -> Box<dyn StoredValue>;

    /// Serialize the value to a stream.
    fn encode(&self, w: &mut dyn Write) -> Result<(), PersistError>;

    /// Strict-weak ordering against another stored value.
    ///
    /// Values of different concrete types, and unordered pairs (e.g.
    /// NaN), compare as not-less-than.
    fn lt(&self, other: &dyn StoredValue) -> bool;

    /// The `TypeId` of the concrete payload.
    fn value_type_id(&self) -> TypeId;

    /// The payload's stable type name.
    fn value_type_name(&self) -> &'static str;

    /// Borrow as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Consume into `Any` for by-value downcasting.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Value> StoredValue for T {
    fn clone_boxed(&self) -> Box<dyn StoredValue> {
        Box::new(self.clone())
    }

    fn encode(&self, w: &mut dyn Write) -> Result<(), PersistError> {
        Value::encode(self, w)
    }

    fn lt(&self, other: &dyn StoredValue) -> bool {
        match other.as_any().downcast_ref::<T>() {
            Some(o) => self < o,
            None => false,
        }
    }

    fn value_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn value_type_name(&self) -> &'static str {
        T::type_name()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

macro_rules! scalar_value {
    ($ty:ty, $name:literal, $write:path, $read:path) => {
        impl Value for $ty {
            fn encode(&self, w: &mut dyn Write) -> Result<(), PersistError> {
                $write(w, *self)
            }
            fn decode(r: &mut dyn Read) -> Result<Self, PersistError> {
                $read(r)
            }
            fn type_name() -> &'static str {
                $name
            }
        }
    };
}

scalar_value!(f64, "f64", codec::write_f64_le, codec::read_f64_le);
scalar_value!(f32, "f32", codec::write_f32_le, codec::read_f32_le);
scalar_value!(i32, "i32", codec::write_i32_le, codec::read_i32_le);
scalar_value!(u32, "u32", codec::write_u32_le, codec::read_u32_le);
scalar_value!(i64, "i64", codec::write_i64_le, codec::read_i64_le);
scalar_value!(u64, "u64", codec::write_u64_le, codec::read_u64_le);

impl Value for bool {
    fn encode(&self, w: &mut dyn Write) -> Result<(), PersistError> {
        codec::write_u8(w, u8::from(*self))
    }
    fn decode(r: &mut dyn Read) -> Result<Self, PersistError> {
        match codec::read_u8(r)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(PersistError::MalformedRecord {
                detail: format!("invalid bool byte {other}"),
            }),
        }
    }
    fn type_name() -> &'static str {
        "bool"
    }
}

impl Value for String {
    fn encode(&self, w: &mut dyn Write) -> Result<(), PersistError> {
        codec::write_length_prefixed_str(w, self)
    }
    fn decode(r: &mut dyn Read) -> Result<Self, PersistError> {
        codec::read_length_prefixed_str(r)
    }
    fn type_name() -> &'static str {
        "string"
    }
}

/// Spatial gradient components, the per-point vector quantity of FE
/// assembly. Fixed-size, so it costs no length prefix on the wire.
impl Value for [f64; 3] {
    fn encode(&self, w: &mut dyn Write) -> Result<(), PersistError> {
        for v in self {
            codec::write_f64_le(w, *v)?;
        }
        Ok(())
    }
    fn decode(r: &mut dyn Read) -> Result<Self, PersistError> {
        let mut out = [0.0; 3];
        for v in &mut out {
            *v = codec::read_f64_le(r)?;
        }
        Ok(out)
    }
    fn type_name() -> &'static str {
        "f64x3"
    }
}

impl Value for Vec<f64> {
    fn encode(&self, w: &mut dyn Write) -> Result<(), PersistError> {
        codec::write_u32_le(w, self.len() as u32)?;
        for v in self {
            codec::write_f64_le(w, *v)?;
        }
        Ok(())
    }
    fn decode(r: &mut dyn Read) -> Result<Self, PersistError> {
        let len = codec::read_u32_le(r)? as usize;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(codec::read_f64_le(r)?);
        }
        Ok(out)
    }
    fn type_name() -> &'static str {
        "vec<f64>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip<T: Value>(v: &T) -> T {
        let mut buf = Vec::new();
        Value::encode(v, &mut buf).unwrap();
        let mut r = buf.as_slice();
        let out = T::decode(&mut r).unwrap();
        assert!(r.is_empty(), "decode left trailing bytes");
        out
    }

    #[test]
    fn scalar_round_trips() {
        assert_eq!(round_trip(&1.25f64), 1.25);
        assert_eq!(round_trip(&-3i32), -3);
        assert_eq!(round_trip(&7u64), 7);
        assert_eq!(round_trip(&true), true);
        assert_eq!(round_trip(&"heat_flux".to_string()), "heat_flux");
        assert_eq!(round_trip(&vec![1.0, 2.5, -4.0]), vec![1.0, 2.5, -4.0]);
        assert_eq!(round_trip(&[0.5, -1.0, 2.0]), [0.5, -1.0, 2.0]);
    }

    #[test]
    fn erased_clone_preserves_payload() {
        let boxed: Box<dyn StoredValue> = Box::new(42.0f64);
        let copy = boxed.clone_boxed();
        assert_eq!(copy.as_any().downcast_ref::<f64>(), Some(&42.0));
        assert_eq!(copy.value_type_name(), "f64");
        assert_eq!(copy.value_type_id(), TypeId::of::<f64>());
    }

    #[test]
    fn erased_ordering_only_within_one_type() {
        let a: Box<dyn StoredValue> = Box::new(1.0f64);
        let b: Box<dyn StoredValue> = Box::new(2.0f64);
        let c: Box<dyn StoredValue> = Box::new(3i32);
        assert!(a.lt(b.as_ref()));
        assert!(!b.lt(a.as_ref()));
        // cross-type comparison is not-less-than in both directions
        assert!(!a.lt(c.as_ref()));
        assert!(!c.lt(a.as_ref()));
    }

    #[test]
    fn into_any_downcasts_by_value() {
        let boxed: Box<dyn StoredValue> = Box::new(vec![1.0f64, 2.0]);
        let v = boxed.into_any().downcast::<Vec<f64>>().unwrap();
        assert_eq!(*v, vec![1.0, 2.0]);
    }
}
