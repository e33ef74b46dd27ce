mod clock;
mod config;
mod context;
mod scene;

use alloc::sync::Arc;
use core::fmt;

use atomic_refcell::AtomicRefCell;
use itertools::Itertools;

pub use clock::Clock;
pub use config::LevelConfig;
pub use context::{InitContext, SystemContext, UpdateContext};
pub use scene::{Ancestors, Scene};

use crate::{
    capability::{Capability, Caster},
    component::KindStore,
    error::Result,
    schedule, BitField, Component, ComponentCollection, ComponentId, ComponentObject, Entity,
    EntityCollection, EntityCreationInfo, EntityId, Properties, Registry, System,
    SystemCollection, SystemId, Updatable,
};

/// The composition root of a simulation.
///
/// Owns the clock, the entities and the component and system instances of a
/// running world, all described by a shared, finalized [`Registry`].
///
/// Each [`update`](Self::update) promotes the components attached during the
/// previous frame, sweeps the detached ones, advances the clock and then
/// updates every [`Updatable`] system followed by every `Updatable`
/// component, in dependency order.
pub struct Level {
    registry: Arc<Registry>,
    clock: Clock,
    entities: EntityCollection,
    components: ComponentCollection,
    systems: SystemCollection,
    config: LevelConfig,
    pool: Option<rayon::ThreadPool>,
}

impl Level {
    /// Creates a level with the default configuration
    pub fn new(registry: Arc<Registry>) -> Self {
        let config = LevelConfig::default();
        Self::from_parts(registry, config, None)
    }

    /// Creates a level, building a dedicated worker pool if configured
    pub fn with_config(registry: Arc<Registry>, config: LevelConfig) -> Result<Self> {
        let pool = config.build_pool()?;
        Ok(Self::from_parts(registry, config, pool))
    }

    fn from_parts(
        registry: Arc<Registry>,
        config: LevelConfig,
        pool: Option<rayon::ThreadPool>,
    ) -> Self {
        tracing::debug!(
            components = registry.component_count(),
            systems = registry.system_count(),
            "create level"
        );

        Self {
            clock: Clock::new(config.time_rate),
            entities: EntityCollection::new(),
            components: ComponentCollection::new(registry.component_count()),
            systems: SystemCollection::new(registry.clone()),
            registry,
            config,
            pool,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &LevelConfig {
        &self.config
    }

    #[inline]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    pub fn entities(&self) -> &EntityCollection {
        &self.entities
    }

    pub fn components(&self) -> &ComponentCollection {
        &self.components
    }

    pub fn systems(&self) -> &SystemCollection {
        &self.systems
    }

    /// The kinds of the systems currently present
    pub fn systems_mask(&self) -> BitField {
        self.systems.mask()
    }

    /// Structural access to entities and components
    pub fn scene(&mut self) -> Scene<'_> {
        Scene::new(
            &self.registry,
            &mut self.entities,
            &mut self.components,
            &self.systems,
        )
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn create_entity(&mut self) -> Result<EntityId> {
        self.entities.create()
    }

    pub fn create_entity_at(&mut self, id: EntityId) -> Result<EntityId> {
        self.entities.create_at(id)
    }

    /// See [`Scene::create_entities`]
    pub fn create_entities(
        &mut self,
        infos: impl IntoIterator<Item = EntityCreationInfo>,
    ) -> Result<Vec<EntityId>> {
        self.scene().create_entities(infos)
    }

    pub fn destroy_entity(&mut self, id: EntityId) -> Result<()> {
        self.scene().destroy_entity(id)
    }

    pub fn destroy_entity_recursive(&mut self, id: EntityId) -> Result<()> {
        self.scene().destroy_entity_recursive(id)
    }

    pub fn destroy_entities(&mut self, ids: &[EntityId]) -> Result<()> {
        self.scene().destroy_entities(ids)
    }

    pub fn add_component<T: Component>(&mut self, entity: EntityId) -> Result<()> {
        self.scene().add_component::<T>(entity)
    }

    pub fn add_component_with<T: Component>(
        &mut self,
        entity: EntityId,
        data: T::Data,
    ) -> Result<()> {
        self.scene().add_component_with::<T>(entity, data)
    }

    pub fn add_component_dyn(
        &mut self,
        entity: EntityId,
        kind: ComponentId,
        properties: Option<Properties>,
    ) -> Result<()> {
        self.scene().add_component_dyn(entity, kind, properties)
    }

    pub fn remove_component<T: Component>(&mut self, entity: EntityId) -> Result<()> {
        self.scene().remove_component::<T>(entity)
    }

    pub fn remove_component_dyn(&mut self, entity: EntityId, kind: ComponentId) -> Result<()> {
        self.scene().remove_component_dyn(entity, kind)
    }

    pub fn get<T: Component>(&self, entity: EntityId) -> Option<&T> {
        let kind = self.registry.component_id::<T>().ok()?;
        crate::component::downcast_ref(self.components.get(kind, entity)?)
    }

    pub fn get_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        let kind = self.registry.component_id::<T>().ok()?;
        crate::component::downcast_mut(self.components.get_mut(kind, entity)?)
    }

    pub fn has<T: Component>(&self, entity: EntityId) -> bool {
        let Ok(kind) = self.registry.component_id::<T>() else {
            return false;
        };

        self.entities
            .get(entity)
            .is_some_and(|v| v.mask().get(kind.index()))
    }

    /// The number of attached components of `kind`, including the ones
    /// attached this frame
    pub fn component_count(&self, kind: ComponentId) -> usize {
        self.components.len(kind)
    }

    /// Adds a default constructed system
    pub fn add_system<S: System>(&mut self) -> Result<()> {
        let kind = self.registry.system_id::<S>()?;
        self.systems.add(kind)
    }

    /// Adds a default constructed system by id
    pub fn add_system_dyn(&mut self, kind: SystemId) -> Result<()> {
        self.systems.add(kind)
    }

    /// Adds a preconfigured system
    pub fn insert_system<S: System>(&mut self, system: S) -> Result<()> {
        self.systems.insert(system)
    }

    pub fn remove_system<S: System>(&mut self) -> Result<()> {
        let kind = self.registry.system_id::<S>()?;
        self.remove_system_dyn(kind)
    }

    /// Removes a system, failing if a present system or attached component
    /// still requires it
    pub fn remove_system_dyn(&mut self, kind: SystemId) -> Result<()> {
        let in_use = self.entities.used_mask();
        self.systems.remove(kind, in_use)
    }

    pub fn system<S: System>(&self) -> Option<&S> {
        self.systems.get::<S>()
    }

    pub fn system_mut<S: System>(&mut self) -> Option<&mut S> {
        self.systems.get_mut::<S>()
    }

    /// Performs the start of frame bookkeeping.
    ///
    /// Components attached since the previous frame become live and
    /// components detached since then are dropped.
    pub fn begin_frame(&mut self) {
        self.components.promote_new_components();
        self.components.remove_dead_components();
    }

    /// Advances the level by a frame of `dt` real seconds
    #[tracing::instrument(level = "trace", skip(self), fields(frame = self.clock.frame()))]
    pub fn update(&mut self, dt: f32) {
        self.begin_frame();
        self.clock.advance(dt, self.config.max_delta);

        let registry = self.registry.clone();

        let systems = registry.systems_implementing::<Updatable>() & self.systems.mask();
        for kind in systems {
            let kind = SystemId::from_index(kind);
            let Some(caster) = registry.system_caster::<Updatable>(kind) else {
                continue;
            };

            let Some(mut instance) = self.systems.checkout(kind) else {
                continue;
            };

            let scene = Scene::new(
                &registry,
                &mut self.entities,
                &mut self.components,
                &self.systems,
            );
            let mut ctx = UpdateContext::new(&self.clock, None, scene);
            if let Some(system) = (caster.get_mut)(&mut *instance) {
                system.update(&mut ctx);
            }

            self.systems.checkin(kind, instance);
        }

        for kind in registry.components_implementing::<Updatable>() {
            let kind = ComponentId::from_index(kind);
            let Some(caster) = registry.component_caster::<Updatable>(kind) else {
                continue;
            };

            // Components attached or detached while iterating do not disturb
            // the snapshot
            for entity in self.components.live_entities(kind) {
                let Some(mut instance) = self.components.checkout(kind, entity) else {
                    continue;
                };

                let scene = Scene::new(
                    &registry,
                    &mut self.entities,
                    &mut self.components,
                    &self.systems,
                );
                let mut ctx = UpdateContext::new(&self.clock, Some(entity), scene);
                if let Some(component) = (caster.get_mut)(&mut *instance) {
                    component.update(&mut ctx);
                }

                self.components.checkin(kind, entity, instance);
            }
        }
    }

    /// Invokes `action` on every live component implementing `C`, kind by
    /// kind in update order
    pub fn for_each_component<C: Capability>(
        &mut self,
        mut action: impl FnMut(EntityId, &mut C::Object),
    ) {
        let registry = &self.registry;
        let stores = self.components.stores_mut();

        for kind in registry.components_implementing::<C>() {
            let Some(caster) = registry.component_caster::<C>(ComponentId::from_index(kind)) else {
                continue;
            };

            for (entity, instance) in stores[kind].iter_live_mut() {
                if let Some(object) = (caster.get_mut)(instance) {
                    action(entity, object);
                }
            }
        }
    }

    /// Invokes `action` on every live component implementing `C` on the
    /// worker pool of the level.
    ///
    /// See [`for_each_component_par_in`](Self::for_each_component_par_in).
    pub fn for_each_component_par<C: Capability>(
        &mut self,
        action: impl Fn(EntityId, &mut C::Object) + Sync,
    ) {
        dispatch::<C>(
            &self.registry,
            &mut self.components,
            self.pool.as_ref(),
            &action,
        );
    }

    /// Invokes `action` on every live component implementing `C` on `pool`.
    ///
    /// Each kind is processed as a single task. A kind only starts once
    /// every kind implementing `C` which it depends on, directly or through
    /// other kinds, has completed. Kinds without such a dependency between
    /// them run concurrently. Blocks until all kinds have been processed.
    pub fn for_each_component_par_in<C: Capability>(
        &mut self,
        pool: &rayon::ThreadPool,
        action: impl Fn(EntityId, &mut C::Object) + Sync,
    ) {
        dispatch::<C>(&self.registry, &mut self.components, Some(pool), &action);
    }

    /// Tears the level down.
    ///
    /// Destroys every entity, detaching components in reverse update order,
    /// then shuts down the systems in reverse update order.
    pub fn dispose(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if self.entities.is_empty() && self.systems.mask().is_empty() {
            return;
        }

        tracing::debug!(
            entities = self.entities.len(),
            systems = self.systems.mask().count(),
            "dispose level"
        );

        let ids = self.entities.ids().collect_vec();
        // Every id is alive
        let _ = self.scene().destroy_entities(&ids);
        self.begin_frame();

        self.systems.clear(BitField::new());
    }
}

/// Capability scoped parallel dispatch over the live components
#[tracing::instrument(level = "debug", skip_all, fields(capability = %C::name()))]
fn dispatch<C: Capability>(
    registry: &Registry,
    components: &mut ComponentCollection,
    pool: Option<&rayon::ThreadPool>,
    action: &(dyn Fn(EntityId, &mut C::Object) + Sync),
) {
    let kinds = registry.components_implementing::<C>();

    let casters: Vec<Option<&Caster<dyn ComponentObject, C>>> = (0..registry
        .component_count())
        .map(|kind| {
            if kinds.get(kind) {
                registry.component_caster::<C>(ComponentId::from_index(kind))
            } else {
                None
            }
        })
        .collect_vec();

    // Each kind is borrowed by exactly one task
    let stores: Vec<AtomicRefCell<&mut KindStore>> = components
        .stores_mut()
        .iter_mut()
        .map(AtomicRefCell::new)
        .collect_vec();

    schedule::run_ordered(
        pool,
        kinds,
        |kind| registry.component(ComponentId::from_index(kind)).depends_on(),
        |kind| {
            let Some(caster) = casters[kind] else {
                return;
            };

            let mut store = stores[kind].borrow_mut();
            for (entity, instance) in store.iter_live_mut() {
                if let Some(object) = (caster.get_mut)(instance) {
                    action(entity, object);
                }
            }
        },
    );
}

impl Drop for Level {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&crate::format::LevelFormatter::new(self), f)
    }
}
