//! Error types shared across the Marl workspace.
//!
//! Organized by subsystem: the value store, the dependency graph, and
//! history persistence. Nothing here is retried or recovered internally;
//! errors propagate to the caller, who decides what to do.

use std::error::Error;
use std::fmt;
use std::io;

use crate::id::RegionId;

/// Errors from the value store during registration or retrieval.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// A name was looked up that was never registered.
    NameUnknown {
        /// The unknown name.
        name: String,
    },
    /// A registration tried to rebind an already-bound name.
    DuplicateName {
        /// The name that is already bound.
        name: String,
    },
    /// A typed retrieval asked for a type other than the one registered.
    ///
    /// The valuer is never invoked when this is reported.
    TypeMismatch {
        /// Name of the value being retrieved.
        name: String,
        /// The type the caller asked for.
        wanted: &'static str,
        /// The type the valuer was registered with.
        found: &'static str,
    },
    /// A retrieval re-entered a value already being evaluated.
    CyclicDependency {
        /// Names of the values in the in-flight dependency chain,
        /// in discovery order.
        chain: Vec<String>,
    },
    /// A mapper could not produce a target ID for the supplied location.
    MapperMissingTarget {
        /// Name of the mapper.
        name: String,
        /// The region the location carried.
        region: RegionId,
    },
    /// `project` was called with source/destination lists of unequal length.
    ProjectionSizeMismatch {
        /// Number of source locations.
        srcs: usize,
        /// Number of destination locations.
        dsts: usize,
    },
    /// A consumer required a guarantee tag the valuer does not declare.
    MissingGuarantee {
        /// Name of the value.
        name: String,
        /// The required tag.
        guarantee: String,
    },
    /// A valuer reported a failure while computing its value.
    ValuerFailed {
        /// Name of the failing value.
        name: String,
        /// Human-readable description of the failure.
        reason: String,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameUnknown { name } => write!(f, "value '{name}' doesn't exist"),
            Self::DuplicateName { name } => write!(f, "value '{name}' is already registered"),
            Self::TypeMismatch {
                name,
                wanted,
                found,
            } => {
                write!(f, "wrong type requested for '{name}': {wanted} != {found}")
            }
            Self::CyclicDependency { chain } => {
                write!(f, "cyclic value dependency: ")?;
                for (i, name) in chain.iter().enumerate() {
                    if i > 0 {
                        write!(f, " -> ")?;
                    }
                    write!(f, "{name}")?;
                }
                Ok(())
            }
            Self::MapperMissingTarget { name, region } => {
                write!(f, "value '{name}' is not defined on region {region}")
            }
            Self::ProjectionSizeMismatch { srcs, dsts } => {
                write!(
                    f,
                    "projection source/destination length mismatch: {srcs} != {dsts}"
                )
            }
            Self::MissingGuarantee { name, guarantee } => {
                write!(f, "value '{name}' does not guarantee '{guarantee}'")
            }
            Self::ValuerFailed { name, reason } => {
                write!(f, "valuer for '{name}' failed: {reason}")
            }
        }
    }
}

impl Error for StoreError {}

/// Errors from dependency graph construction.
///
/// Both indicate misuse of the `needs` API during setup; the graph is
/// unchanged when either is returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GraphError {
    /// A node declared a dependency on itself.
    SelfDependency {
        /// Name of the node.
        name: String,
    },
    /// The requested edge would close a dependency cycle.
    DependencyCycle {
        /// Name of the depending node.
        from: String,
        /// Name of the dependency that already depends on `from`.
        to: String,
    },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfDependency { name } => {
                write!(f, "node '{name}' cannot depend on itself")
            }
            Self::DependencyCycle { from, to } => {
                write!(
                    f,
                    "edge '{from}' -> '{to}' would create a dependency cycle"
                )
            }
        }
    }
}

impl Error for GraphError {}

/// Errors from saving or loading persisted history.
#[derive(Debug)]
pub enum PersistError {
    /// An I/O error occurred during read or write.
    Io(io::Error),
    /// The stream does not start with the expected magic bytes.
    BadMagic,
    /// The format version is not supported by this build.
    UnsupportedVersion {
        /// The version found in the stream.
        found: u8,
    },
    /// A persisted record names a value that is not registered.
    NameUnknown {
        /// The unregistered name.
        name: String,
    },
    /// A persisted record's type name disagrees with the registered valuer.
    TypeNameMismatch {
        /// Name of the value.
        name: String,
        /// Type name found in the stream.
        stored: String,
        /// Type name the valuer was registered with.
        registered: String,
    },
    /// A record could not be decoded (truncated or corrupt data).
    MalformedRecord {
        /// Human-readable description of what went wrong.
        detail: String,
    },
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::BadMagic => write!(f, "invalid magic bytes (expected b\"MARL\")"),
            Self::UnsupportedVersion { found } => {
                write!(f, "unsupported format version {found}")
            }
            Self::NameUnknown { name } => {
                write!(f, "persisted value '{name}' is not registered")
            }
            Self::TypeNameMismatch {
                name,
                stored,
                registered,
            } => {
                write!(
                    f,
                    "persisted value '{name}' has type {stored}, \
                     but is registered as {registered}"
                )
            }
            Self::MalformedRecord { detail } => write!(f, "malformed record: {detail}"),
        }
    }
}

impl Error for PersistError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for PersistError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyclic_dependency_lists_chain_in_order() {
        let err = StoreError::CyclicDependency {
            chain: vec!["a".into(), "b".into(), "c".into()],
        };
        assert_eq!(err.to_string(), "cyclic value dependency: a -> b -> c");
    }

    #[test]
    fn type_mismatch_names_both_types() {
        let err = StoreError::TypeMismatch {
            name: "pressure".into(),
            wanted: "i32",
            found: "f64",
        };
        assert_eq!(
            err.to_string(),
            "wrong type requested for 'pressure': i32 != f64"
        );
    }

    #[test]
    fn persist_io_error_has_source() {
        let err = PersistError::from(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert!(err.source().is_some());
    }
}
