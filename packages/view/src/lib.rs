//! # Entityverse View
//!
//! Authoring side of the entity mirror: lightweight entity views, the
//! per-namespace view space that tracks their topology, and the change
//! accumulators that turn mutations into a replayable change trail.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ EntityView: proxy handle (id, token)        │
//! └─────────────────────────────────────────────┘
//!                     ↓ forwards every mutation
//! ┌─────────────────────────────────────────────┐
//! │ EntityViewSpace (one per namespace)         │
//! │  - root list + ordered child lists          │
//! │  - one EntityChanges per entity             │
//! │  - build_change_trails()                    │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ ChangeTrail: create / set parent / order    │
//! │              → properties → destroy         │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use entityverse_view::{ChangeTrailEntry, EntityView, ViewSpaceRegistry};
//!
//! let registry = ViewSpaceRegistry::new();
//! let space = registry.global();
//!
//! let a = EntityView::new(&space, "a")?;
//! let b = EntityView::child_of(&a, "b")?;
//! b.set_property("xyz", 123);
//!
//! let trail = space.build_change_trails();
//! assert_eq!(trail.len(), 2);
//! assert!(matches!(&trail[0], ChangeTrailEntry::CreateEntity { id, .. } if id == a.id()));
//! # Ok::<(), entityverse_view::EntityError>(())
//! ```

mod changes;
mod registry;
mod space;
mod trail;
mod view;

pub use changes::{EntityChanges, PropertyEq};
pub use registry::ViewSpaceRegistry;
pub use space::{EntityViewSpace, ViewSpace};
pub use trail::{ChangeTrail, ChangeTrailEntry, ChangeTrailPhase, PropertyChange};
pub use view::{EntityView, EntityViewBuilder};

// Re-export common types for convenience
pub use entityverse_common::{EntityError, EntityId, EntityResult, Namespace};
