use core::ops::{Deref, DerefMut};

use crate::{
    component::{downcast_mut, downcast_ref},
    Clock, Component, ComponentCollection, EntityCollection, EntityId, Registry, Scene, System,
    SystemCollection,
};

/// Passed to [`Component::init`].
///
/// Allows reading and writing the other components of the level, but not
/// structural changes. The component being initialised is not yet attached.
pub struct InitContext<'a> {
    entity: EntityId,
    registry: &'a Registry,
    entities: &'a EntityCollection,
    components: &'a mut ComponentCollection,
    systems: &'a SystemCollection,
}

impl<'a> InitContext<'a> {
    pub(crate) fn new(
        entity: EntityId,
        registry: &'a Registry,
        entities: &'a EntityCollection,
        components: &'a mut ComponentCollection,
        systems: &'a SystemCollection,
    ) -> Self {
        Self {
            entity,
            registry,
            entities,
            components,
            systems,
        }
    }

    /// The entity the component is being attached to
    #[inline]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    pub fn entities(&self) -> &EntityCollection {
        self.entities
    }

    /// Access a component of any entity
    pub fn get<T: Component>(&self, entity: EntityId) -> Option<&T> {
        let kind = self.registry.component_id::<T>().ok()?;
        downcast_ref(self.components.get(kind, entity)?)
    }

    pub fn get_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        let kind = self.registry.component_id::<T>().ok()?;
        downcast_mut(self.components.get_mut(kind, entity)?)
    }

    pub fn system<S: System>(&self) -> Option<&S> {
        self.systems.get::<S>()
    }
}

/// Passed to [`System::init`]
pub struct SystemContext<'a> {
    registry: &'a Registry,
    systems: &'a SystemCollection,
}

impl<'a> SystemContext<'a> {
    pub(crate) fn new(registry: &'a Registry, systems: &'a SystemCollection) -> Self {
        Self { registry, systems }
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    /// Access an already present system
    pub fn system<S: System>(&self) -> Option<&S> {
        self.systems.get::<S>()
    }
}

/// Passed to [`Update::update`](crate::Update::update).
///
/// Dereferences to the [`Scene`] of the level, which allows creating and
/// destroying entities and components while the level is updating.
pub struct UpdateContext<'a> {
    clock: &'a Clock,
    entity: Option<EntityId>,
    scene: Scene<'a>,
}

impl<'a> UpdateContext<'a> {
    pub(crate) fn new(clock: &'a Clock, entity: Option<EntityId>, scene: Scene<'a>) -> Self {
        Self {
            clock,
            entity,
            scene,
        }
    }

    #[inline]
    pub fn clock(&self) -> &Clock {
        self.clock
    }

    /// Simulation delta of the current frame
    #[inline]
    pub fn dt(&self) -> f32 {
        self.clock.delta()
    }

    /// The entity of the component being updated, `None` for systems
    #[inline]
    pub fn entity(&self) -> Option<EntityId> {
        self.entity
    }
}

impl<'a> Deref for UpdateContext<'a> {
    type Target = Scene<'a>;

    fn deref(&self) -> &Self::Target {
        &self.scene
    }
}

impl<'a> DerefMut for UpdateContext<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.scene
    }
}
