//! A dependency ordered entity component system runtime.
//!
//! Component and system kinds are registered against a [`RegistryBuilder`]
//! along with their requirements and ordering constraints. Finalizing the
//! builder sorts every kind topologically, rejects cycles and assigns dense
//! ids in update order, so that dependency checks at runtime are plain mask
//! tests.
//!
//! A [`Level`] owns the entities and the component and system instances of a
//! running simulation. Structural changes are validated against the
//! finalized requirements, and become visible to iteration at frame
//! boundaries.
//!
//! # Features
//! - Required components, systems and ancestor components, checked on attach
//!   and detach
//! - Deterministic update order
//! - Capabilities for dispatching over every kind implementing a trait
//! - Dependency respecting parallel dispatch
//!
//! ```rust
//! use std::sync::Arc;
//! use ordo::*;
//!
//! #[derive(Default)]
//! struct Physics;
//! impl System for Physics {}
//!
//! #[derive(Default)]
//! struct Position(f32);
//! impl Component for Position {
//!     type Data = f32;
//!
//!     fn init(&mut self, _: &mut InitContext<'_>, data: f32) -> anyhow::Result<()> {
//!         self.0 = data;
//!         Ok(())
//!     }
//! }
//!
//! #[derive(Default)]
//! struct Velocity(f32);
//! impl Component for Velocity {
//!     type Data = ();
//! }
//!
//! impl Update for Velocity {
//!     fn update(&mut self, ctx: &mut UpdateContext<'_>) {
//!         let dt = ctx.dt();
//!         let velocity = self.0;
//!         if let Some(position) = ctx.entity().and_then(|id| ctx.get_mut::<Position>(id)) {
//!             position.0 += velocity * dt;
//!         }
//!     }
//! }
//!
//! implements!(Velocity => Updatable);
//!
//! # fn main() -> Result<()> {
//! let mut kinds = RegistryBuilder::new();
//! kinds.system::<Physics>("physics")?;
//! kinds.component::<Position>("position")?;
//! kinds
//!     .component::<Velocity>("velocity")?
//!     .requires::<Position>()
//!     .requires_system::<Physics>()
//!     .implements::<Updatable>();
//!
//! let mut level = Level::new(Arc::new(kinds.finalize()?));
//! let id = level.create_entity()?;
//! level.add_component_with::<Position>(id, 1.0)?;
//!
//! // Physics has not been added yet
//! assert!(level.add_component::<Velocity>(id).is_err());
//!
//! level.add_system::<Physics>()?;
//! level.add_component::<Velocity>(id)?;
//! level.get_mut::<Velocity>(id).unwrap().0 = 2.0;
//!
//! level.update(0.125);
//! assert_eq!(level.get::<Position>(id).unwrap().0, 1.25);
//! # Ok(())
//! # }
//! ```
extern crate alloc;

mod bitfield;
mod capability;
/// Component traits and storage
pub mod component;
mod entity;
/// Error types
pub mod error;
mod format;
mod level;
/// The kind registry
pub mod registry;
mod schedule;
/// System traits and storage
pub mod system;

pub use bitfield::BitField;
pub use capability::{
    AsAny, Capability, CapabilityId, ComponentListener, Editable, Hierarchy, HierarchyNode,
    Implements, Listener, Update, Updatable,
};
pub use component::{Component, ComponentCollection, ComponentId, ComponentObject, Properties};
pub use entity::{Entity, EntityCollection, EntityCreationInfo, EntityFlags, EntityId};
pub use error::{Error, Result};
pub use level::{
    Ancestors, Clock, InitContext, Level, LevelConfig, Scene, SystemContext, UpdateContext,
};
pub use registry::{Registry, RegistryBuilder};
pub use system::{System, SystemCollection, SystemId, SystemObject};
