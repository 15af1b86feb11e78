//! Family-oriented graph construction.
//!
//! FE systems rarely declare nodes one at a time: a "kernel" exists once
//! per region it acts on, a "material" once per region and loop kind, and
//! a dependency like `kernel -> material` means a whole set of edges
//! between matching instances. [`GraphBuilder`] captures that layer. A
//! *family* is one base name expanded over `(category, region)` pairs;
//! [`bind`](GraphBuilder::bind) wires two families together following the
//! admissibility rules:
//!
//! - an instance binds to the dependency instance of its own category, or
//!   — when the dependency family lacks that category — to its single
//!   cached category (values cannot cross loop kinds uncached);
//! - a reducing dependency binds across *all* of its regions (a reduction
//!   is global over its domain), a non-reducing one region-to-region.

use std::fmt;

use indexmap::IndexMap;

use marl_core::{GraphError, LoopCategory, LoopType, NodeId, RegionId};

use crate::graph::Graph;

/// Every category that names an actual mesh iteration.
pub fn all_categories() -> Vec<LoopCategory> {
    vec![
        LoopCategory::Nodal,
        LoopCategory::Face,
        LoopCategory::ElementalOnElement,
        LoopCategory::ElementalOnElementFv,
        LoopCategory::ElementalOnBoundary,
        LoopCategory::ElementalOnInternalSide,
    ]
}

/// Errors from family declaration and binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuilderError {
    /// A family name was declared twice.
    DuplicateFamily {
        /// The repeated name.
        name: String,
    },
    /// A bind referenced a family that was never declared.
    UnknownFamily {
        /// The missing name.
        name: String,
    },
    /// A reducing family was declared without any region.
    ReducingWithoutRegions {
        /// The offending family.
        name: String,
    },
    /// A consumer category has no counterpart in the dependency family,
    /// and the dependency is not cached, so its value cannot cross loops.
    UncachedAcrossCategories {
        /// The consuming family.
        consumer: String,
        /// The dependency family.
        dependency: String,
    },
    /// A cross-category dependency family spans several categories, so
    /// there is no single loop to take its value from.
    AmbiguousCrossCategory {
        /// The consuming family.
        consumer: String,
        /// The dependency family.
        dependency: String,
    },
    /// The dependency family has no instance on a region the consumer
    /// needs it on.
    MissingRegion {
        /// The dependency family.
        dependency: String,
        /// The region with no instance.
        region: RegionId,
    },
    /// The underlying edge insertion failed.
    Graph(GraphError),
}

impl fmt::Display for BuilderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateFamily { name } => {
                write!(f, "family '{name}' is already declared")
            }
            Self::UnknownFamily { name } => write!(f, "family '{name}' is not declared"),
            Self::ReducingWithoutRegions { name } => {
                write!(f, "reducing family '{name}' must operate on at least one region")
            }
            Self::UncachedAcrossCategories {
                consumer,
                dependency,
            } => {
                write!(
                    f,
                    "'{consumer}' cannot bind to '{dependency}': a dependency in a \
                     different loop category must be cached"
                )
            }
            Self::AmbiguousCrossCategory {
                consumer,
                dependency,
            } => {
                write!(
                    f,
                    "'{consumer}' cannot bind to '{dependency}': a cross-category \
                     dependency spanning several categories is ambiguous"
                )
            }
            Self::MissingRegion { dependency, region } => {
                write!(f, "'{dependency}' has no instance on region {region}")
            }
            Self::Graph(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for BuilderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Graph(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GraphError> for BuilderError {
    fn from(e: GraphError) -> Self {
        Self::Graph(e)
    }
}

struct Family {
    cached: bool,
    reducing: bool,
    regions: Vec<RegionId>,
    categories: Vec<LoopCategory>,
    /// Instances keyed by loop type.
    instances: IndexMap<LoopType, NodeId>,
}

/// Declares node families and binds them into a [`Graph`].
#[derive(Default)]
pub struct GraphBuilder {
    graph: Graph,
    families: IndexMap<String, Family>,
}

impl GraphBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a family of nodes named `name`, one instance per
    /// `(category, region)` pair.
    ///
    /// An empty `regions` list declares a single out-of-loop instance
    /// ([`LoopCategory::None`], region 0) — the shape of a global
    /// postprocessor or solution vector; reducing families must name
    /// their regions. An empty `categories` list expands over
    /// [`all_categories`].
    pub fn family(
        &mut self,
        name: &str,
        cached: bool,
        reducing: bool,
        regions: &[RegionId],
        categories: &[LoopCategory],
    ) -> Result<(), BuilderError> {
        if self.families.contains_key(name) {
            return Err(BuilderError::DuplicateFamily {
                name: name.to_string(),
            });
        }
        if regions.is_empty() && reducing {
            return Err(BuilderError::ReducingWithoutRegions {
                name: name.to_string(),
            });
        }

        let (regions, categories): (Vec<RegionId>, Vec<LoopCategory>) = if regions.is_empty() {
            (vec![0], vec![LoopCategory::None])
        } else if categories.is_empty() {
            (regions.to_vec(), all_categories())
        } else {
            (regions.to_vec(), categories.to_vec())
        };

        let mut instances = IndexMap::new();
        for &region in &regions {
            for &category in &categories {
                let loop_type = LoopType::new(category, region);
                let node = self.graph.create(name, cached, reducing, loop_type);
                instances.insert(loop_type, node);
            }
        }
        self.families.insert(
            name.to_string(),
            Family {
                cached,
                reducing,
                regions,
                categories,
                instances,
            },
        );
        Ok(())
    }

    /// The instance of `name` at one `(category, region)`, if declared.
    pub fn node(&self, name: &str, category: LoopCategory, region: RegionId) -> Option<NodeId> {
        self.families
            .get(name)?
            .instances
            .get(&LoopType::new(category, region))
            .copied()
    }

    /// All instances of a family, in declaration order.
    pub fn family_nodes(&self, name: &str) -> Vec<NodeId> {
        self.families
            .get(name)
            .map(|f| f.instances.values().copied().collect())
            .unwrap_or_default()
    }

    /// Bind every instance of `consumer` to the matching instances of
    /// `dependency`. Fails when the dependency lacks an instance on a
    /// region the consumer covers.
    pub fn bind(&mut self, consumer: &str, dependency: &str) -> Result<(), BuilderError> {
        self.bind_inner(consumer, dependency, false)
    }

    /// Like [`bind`](Self::bind), but silently skips consumer regions the
    /// dependency does not cover.
    pub fn bind_allowing_gaps(
        &mut self,
        consumer: &str,
        dependency: &str,
    ) -> Result<(), BuilderError> {
        self.bind_inner(consumer, dependency, true)
    }

    fn bind_inner(
        &mut self,
        consumer: &str,
        dependency: &str,
        allow_gaps: bool,
    ) -> Result<(), BuilderError> {
        let src = self
            .families
            .get(consumer)
            .ok_or_else(|| BuilderError::UnknownFamily {
                name: consumer.to_string(),
            })?;
        let dep = self
            .families
            .get(dependency)
            .ok_or_else(|| BuilderError::UnknownFamily {
                name: dependency.to_string(),
            })?;

        let mut edges: Vec<(NodeId, NodeId)> = Vec::new();
        for &cat in &src.categories {
            // take the dependency from the consumer's own loop kind, or —
            // when it has none — from its single cached category
            let dst_cat = if dep.categories.contains(&cat) {
                cat
            } else {
                if !(dep.cached || dep.reducing) {
                    return Err(BuilderError::UncachedAcrossCategories {
                        consumer: consumer.to_string(),
                        dependency: dependency.to_string(),
                    });
                }
                if dep.categories.len() > 1 {
                    return Err(BuilderError::AmbiguousCrossCategory {
                        consumer: consumer.to_string(),
                        dependency: dependency.to_string(),
                    });
                }
                dep.categories[0]
            };

            for &region in &src.regions {
                let src_node = src.instances[&LoopType::new(cat, region)];
                if dep.reducing {
                    // a reduction is global over its domain: depend on
                    // every region it covers
                    for &dep_region in &dep.regions {
                        edges.push((src_node, dep.instances[&LoopType::new(dst_cat, dep_region)]));
                    }
                } else {
                    match dep.instances.get(&LoopType::new(dst_cat, region)) {
                        Some(&dep_node) => edges.push((src_node, dep_node)),
                        None if allow_gaps => {}
                        None => {
                            return Err(BuilderError::MissingRegion {
                                dependency: dependency.to_string(),
                                region,
                            })
                        }
                    }
                }
            }
        }

        for (a, b) in edges {
            // repeated binds are no-ops; an edge the graph already
            // implies in the other direction would cycle, so skip it
            if self.graph.depends_on(b, a) {
                continue;
            }
            self.graph.needs(a, b)?;
        }
        Ok(())
    }

    /// Borrow the graph built so far.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Finish building and take the graph.
    pub fn finish(self) -> Graph {
        self.graph
    }
}
