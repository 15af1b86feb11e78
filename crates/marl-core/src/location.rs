//! Mesh evaluation locations.

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::io::Write;

use crate::error::PersistError;
use crate::id::RegionId;

/// An opaque, owned extension key attached to a [`Location`].
///
/// Drivers that evaluate at points a plain `(element, face, qp)` triple
/// cannot distinguish (e.g. ghosted neighbors, multi-mesh couplings)
/// attach one of these. The store only ever clones, compares, and
/// serializes the key; it never inspects the concrete type.
///
/// `key_cmp` must be a total order. The conventional implementation
/// downcasts `other` and compares values, falling back to `TypeId`
/// ordering for keys of different concrete types:
///
/// ```
/// use marl_core::{CustomKey, PersistError};
/// use std::any::Any;
/// use std::cmp::Ordering;
/// use std::io::Write;
///
/// #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
/// struct NeighborKey(u32);
///
/// impl CustomKey for NeighborKey {
///     fn clone_boxed(&self) -> Box<dyn CustomKey> {
///         Box::new(self.clone())
///     }
///     fn key_cmp(&self, other: &dyn CustomKey) -> Ordering {
///         match other.as_any().downcast_ref::<Self>() {
///             Some(o) => self.cmp(o),
///             None => self.type_id().cmp(&other.as_any().type_id()),
///         }
///     }
///     fn encode(&self, w: &mut dyn Write) -> Result<(), PersistError> {
///         w.write_all(&self.0.to_le_bytes())?;
///         Ok(())
///     }
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
/// }
/// ```
pub trait CustomKey: fmt::Debug + 'static {
    /// Deep-clone the key.
    fn clone_boxed(&self) -> Box<dyn CustomKey>;

    /// Totally order this key against another (possibly of a different
    /// concrete type).
    fn key_cmp(&self, other: &dyn CustomKey) -> Ordering;

    /// Serialize the key for persisted history.
    fn encode(&self, w: &mut dyn Write) -> Result<(), PersistError>;

    /// Downcasting access for `key_cmp` implementations.
    fn as_any(&self) -> &dyn Any;
}

/// A point on the mesh where values are evaluated.
///
/// Constructed by the mesh driver once per evaluation and used by the
/// store to key history entries. Identity is structural over
/// `(element, face, qp, custom)`; the quadrature count and region are
/// carried for valuers to read but do not participate in ordering.
///
/// The custom key, when present, is exclusively owned by its location
/// and deep-cloned on copy.
#[derive(Debug)]
pub struct Location {
    element: u32,
    face: u32,
    qp: u32,
    nqp: u32,
    region: RegionId,
    custom: Option<Box<dyn CustomKey>>,
}

impl Location {
    /// A location at quadrature point `qp` of `nqp` on an element.
    ///
    /// # Panics
    ///
    /// Panics if `qp >= nqp`; that is a driver bug, not a data error.
    pub fn new(element: u32, qp: u32, nqp: u32) -> Self {
        assert!(
            qp < nqp,
            "quadrature index {qp} out of range (count {nqp})"
        );
        Self {
            element,
            face: 0,
            qp,
            nqp,
            region: 0,
            custom: None,
        }
    }

    /// Set the face identifier (for face and side evaluations).
    pub fn with_face(mut self, face: u32) -> Self {
        self.face = face;
        self
    }

    /// Set the mesh region (subdomain / block) identifier.
    pub fn with_region(mut self, region: RegionId) -> Self {
        self.region = region;
        self
    }

    /// Attach an owned custom key.
    pub fn with_custom(mut self, key: Box<dyn CustomKey>) -> Self {
        self.custom = Some(key);
        self
    }

    /// The element identifier.
    pub fn element(&self) -> u32 {
        self.element
    }

    /// The face identifier (0 for volumetric evaluations).
    pub fn face(&self) -> u32 {
        self.face
    }

    /// The quadrature point index within the element.
    pub fn qp(&self) -> u32 {
        self.qp
    }

    /// The number of quadrature points on the element.
    pub fn nqp(&self) -> u32 {
        self.nqp
    }

    /// The mesh region this location lies in.
    pub fn region(&self) -> RegionId {
        self.region
    }

    /// The custom key, if any.
    pub fn custom(&self) -> Option<&dyn CustomKey> {
        self.custom.as_deref()
    }
}

impl Clone for Location {
    fn clone(&self) -> Self {
        Self {
            element: self.element,
            face: self.face,
            qp: self.qp,
            nqp: self.nqp,
            region: self.region,
            custom: self.custom.as_ref().map(|k| k.clone_boxed()),
        }
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Location {}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Location {
    fn cmp(&self, other: &Self) -> Ordering {
        self.element
            .cmp(&other.element)
            .then_with(|| self.face.cmp(&other.face))
            .then_with(|| self.qp.cmp(&other.qp))
            .then_with(|| match (&self.custom, &other.custom) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => a.key_cmp(b.as_ref()),
            })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "elem {} face {} qp {}/{}",
            self.element, self.face, self.qp, self.nqp
        )
    }
}
