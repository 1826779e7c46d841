//! # Entityverse Env
//!
//! Synchronization handshake between the authoring side (entity views in a
//! view space) and the side that consumes their change trails.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐  sync()   ┌──────────────────────────────┐
//! │ EntityView mutations │ ────────► │ EntityEnv                    │
//! └──────────────────────┘           │  - readiness gate            │
//!                                    │  - coalesced first cycle     │
//!                                    └──────────────────────────────┘
//!                                          ↓ SyncEvent
//!                     ┌────────────────────┼────────────────────┐
//!                     ↓                    ↓                    ↓
//!               on_sync listeners   subscribe() channels   ChangeTrailConsumer
//!                                                          (EntityLocalEnv)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use entityverse_env::{EntityLocalEnv, SyncEvent};
//! use entityverse_view::{EntityView, ViewSpaceRegistry};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), entityverse_view::EntityError> {
//! let registry = ViewSpaceRegistry::new();
//! let local = EntityLocalEnv::new(registry.global(), Vec::<SyncEvent>::new());
//!
//! let a = EntityView::new(&registry.global(), "a")?;
//! a.set_property("foo", "bar");
//!
//! let pending = local.sync();
//! local.start();
//! pending.await;
//!
//! assert_eq!(local.consumer()[0].change_trail.len(), 1);
//! # Ok(())
//! # }
//! ```

mod config;
mod env;
mod error;
mod event;
mod local_env;

pub use config::{EnvConfig, DEFAULT_CONFIG_NAME};
pub use env::EntityEnv;
pub use error::EnvError;
pub use event::SyncEvent;
pub use local_env::{ChangeTrailConsumer, EntityLocalEnv};
