//! Archgen Core
//!
//! Merges configuration fragments contributed by the architectural layers of
//! a generated application into one tree.
//!
//! # Precedence
//!
//! 1. Domain (lowest)
//! 2. UseCase
//! 3. Repository
//! 4. Interface (highest)
//!
//! Mappings merge recursively; scalars and sequences from a higher layer
//! replace those of a lower one. Every replacement of a differing value is
//! recorded as a [`Conflict`].
//!
//! # Example
//!
//! ```
//! use archgen_core::{ConfigurationLayer, HierarchicalMerger, LayerKind};
//!
//! let domain = ConfigurationLayer::inline(
//!     LayerKind::Domain,
//!     "domain.yaml",
//!     "default_settings:\n  validation: true\n  logging: true\n",
//! )
//! .loaded();
//! let interface = ConfigurationLayer::inline(
//!     LayerKind::Interface,
//!     "interface.yaml",
//!     "default_settings:\n  validation: false\n",
//! )
//! .loaded();
//!
//! let result = HierarchicalMerger::default().merge(&[domain, interface])?;
//! assert_eq!(result.get("default_settings.validation"), Some(&serde_json::json!(false)));
//! assert_eq!(result.conflicts.len(), 1);
//! # Ok::<(), archgen_core::MergeError>(())
//! ```

#![allow(missing_docs)]

mod error;
pub mod interpolate;
pub mod layer;
pub mod merge;
mod merger;
pub mod resolver;
mod result;
mod tree;
pub mod validation;

pub use error::{LayerError, MergeError, MergeOutcome};
pub use layer::{discover_layers, ConfigurationLayer, LayerKind, LayerSource};
pub use merge::{deep_merge, overlay, LayerContribution, Provenance};
pub use merger::{merge_layers, merge_metadata, HierarchicalMerger};
pub use resolver::{Conflict, ConflictResolver, ResolutionStrategy};
pub use result::{HierarchicalMergeResult, LayerMergeMetadata, PerformanceMetrics};
pub use tree::{ConfigTree, KeyPath, MERGE_METADATA_KEY};
pub use validation::{validate_mapping, validate_tree};
