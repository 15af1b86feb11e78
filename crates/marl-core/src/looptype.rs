//! The mesh loop taxonomy: [`LoopCategory`] and [`LoopType`].

use std::fmt;

use crate::id::RegionId;

/// The kind of mesh iteration a value is evaluated in.
///
/// The elemental variants differ in which points of an element they
/// visit (volumetric quadrature, finite-volume quadrature, boundary
/// sides, internal sides), but all walk the same element sets, so any
/// two of them may share a loop. `None` marks values computed outside
/// any mesh iteration (e.g. reductions over other reductions).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LoopCategory {
    /// Computed outside any mesh loop.
    None,
    /// Evaluated per mesh node.
    Nodal,
    /// Evaluated per face (finite-volume flux points).
    Face,
    /// Evaluated per element at volumetric quadrature points.
    ElementalOnElement,
    /// Evaluated per element at finite-volume quadrature points.
    ElementalOnElementFv,
    /// Evaluated per element on boundary sides.
    ElementalOnBoundary,
    /// Evaluated per element on internal sides.
    ElementalOnInternalSide,
}

impl LoopCategory {
    /// Whether this category belongs to the elemental family.
    pub fn is_elemental(self) -> bool {
        matches!(
            self,
            Self::ElementalOnElement
                | Self::ElementalOnElementFv
                | Self::ElementalOnBoundary
                | Self::ElementalOnInternalSide
        )
    }

    /// Whether loops of this category and `other` may be fused.
    ///
    /// Categories are mergeable when equal, or when both are elemental:
    /// the elemental variants iterate the same element sets and only
    /// differ in which points they visit.
    pub fn mergeable_with(self, other: Self) -> bool {
        self == other || (self.is_elemental() && other.is_elemental())
    }
}

impl fmt::Display for LoopCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Nodal => "nodal",
            Self::Face => "face",
            Self::ElementalOnElement => "elemental_on_element",
            Self::ElementalOnElementFv => "elemental_on_element_fv",
            Self::ElementalOnBoundary => "elemental_on_boundary",
            Self::ElementalOnInternalSide => "elemental_on_internal_side",
        };
        f.write_str(s)
    }
}

/// Where a dependency-graph node is evaluated: a category plus a mesh region.
///
/// Two loop types are equal only when both parts match; the partitioner
/// never places nodes of different loop types in the same loop, except
/// through the explicit category-merge rules of the sibling merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoopType {
    /// The iteration kind.
    pub category: LoopCategory,
    /// The subdomain or boundary the iteration covers.
    pub region: RegionId,
}

impl LoopType {
    /// A loop type with an explicit category and region.
    pub fn new(category: LoopCategory, region: RegionId) -> Self {
        Self { category, region }
    }

    /// Shorthand for a category on region 0.
    pub fn of(category: LoopCategory) -> Self {
        Self::new(category, 0)
    }
}

impl Default for LoopType {
    fn default() -> Self {
        Self::new(LoopCategory::ElementalOnElement, 0)
    }
}

impl fmt::Display for LoopType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:region{}", self.category, self.region)
    }
}
