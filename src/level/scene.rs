use alloc::collections::BTreeSet;

use itertools::Itertools;
use smallvec::SmallVec;

use crate::{
    component::{downcast_mut, downcast_ref, InitError},
    error::{KindNames, Result},
    BitField, Component, ComponentCollection, ComponentId, Entity, EntityCollection,
    EntityCreationInfo, EntityId, Error, Hierarchy, HierarchyNode, InitContext, Listener,
    Properties, Registry, System, SystemCollection,
};

/// Structural access to the entities and components of a level.
///
/// Every attachment and detachment goes through here and is validated
/// against the finalized requirements of the kinds involved. Borrowed from a
/// [`Level`](crate::Level) directly, or through the
/// [`UpdateContext`](crate::UpdateContext) while updating.
pub struct Scene<'a> {
    pub(crate) registry: &'a Registry,
    pub(crate) entities: &'a mut EntityCollection,
    pub(crate) components: &'a mut ComponentCollection,
    pub(crate) systems: &'a SystemCollection,
}

impl<'a> Scene<'a> {
    pub(crate) fn new(
        registry: &'a Registry,
        entities: &'a mut EntityCollection,
        components: &'a mut ComponentCollection,
        systems: &'a SystemCollection,
    ) -> Self {
        Self {
            registry,
            entities,
            components,
            systems,
        }
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    pub fn entities(&self) -> &EntityCollection {
        self.entities
    }

    pub fn components(&self) -> &ComponentCollection {
        self.components
    }

    pub fn systems(&self) -> &SystemCollection {
        self.systems
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Creates an empty entity
    pub fn create_entity(&mut self) -> Result<EntityId> {
        self.entities.create()
    }

    /// Creates an empty entity at a specific id
    pub fn create_entity_at(&mut self, id: EntityId) -> Result<EntityId> {
        self.entities.create_at(id)
    }

    /// Creates a batch of entities and attaches their components.
    ///
    /// Every entity is created before any component is attached, and
    /// components are attached kind by kind in update order across the whole
    /// batch. Requirements between entities of the same batch, such as a
    /// child requiring a component on its parent, are therefore satisfied
    /// regardless of the order of `infos`.
    ///
    /// If any entity or component fails, everything created so far is torn
    /// down again and the error returned.
    pub fn create_entities(
        &mut self,
        infos: impl IntoIterator<Item = EntityCreationInfo>,
    ) -> Result<Vec<EntityId>> {
        let mut infos = infos.into_iter().collect_vec();
        let mut created = Vec::with_capacity(infos.len());

        let result = self.create_batch(&mut infos, &mut created);

        if let Err(err) = result {
            tracing::debug!(%err, count = created.len(), "rolling back entity batch");
            self.teardown(&created);
            return Err(err);
        }

        Ok(created)
    }

    fn create_batch(
        &mut self,
        infos: &mut [EntityCreationInfo],
        created: &mut Vec<EntityId>,
    ) -> Result<()> {
        for info in infos.iter() {
            let id = match info.id {
                Some(id) => self.entities.create_at(id)?,
                None => self.entities.create()?,
            };

            created.push(id);
        }

        let used = infos
            .iter()
            .fold(BitField::new(), |acc, v| acc | v.components);

        for kind in used {
            let kind = ComponentId::from_index(kind);
            for (info, &id) in infos.iter_mut().zip(created.iter()) {
                if info.components.get(kind.index()) {
                    let properties = info.properties.remove(&kind);
                    self.add_component_dyn(id, kind, properties)?;
                }
            }
        }

        Ok(())
    }

    /// Attaches a default initialised component
    pub fn add_component<T: Component>(&mut self, entity: EntityId) -> Result<()> {
        let kind = self.registry.component_id::<T>()?;
        self.add_component_dyn(entity, kind, None)
    }

    /// Attaches a component initialised with `data`
    pub fn add_component_with<T: Component>(
        &mut self,
        entity: EntityId,
        data: T::Data,
    ) -> Result<()> {
        let kind = self.registry.component_id::<T>()?;
        self.add_component_dyn(entity, kind, Some(Box::new(data)))
    }

    /// Attaches a component of `kind` to `entity`.
    ///
    /// Fails if the kind is already attached, or any required system,
    /// component or ancestor component is missing. All missing dependencies
    /// are reported at once.
    ///
    /// The new component is visible to lookups immediately, but only joins
    /// the live generation at the start of the next frame.
    pub fn add_component_dyn(
        &mut self,
        entity: EntityId,
        kind: ComponentId,
        properties: Option<Properties>,
    ) -> Result<()> {
        let registry = self.registry;
        let info = registry.component(kind);
        let mask = self.entities.mask(entity)?;

        if mask.get(kind.index()) {
            return Err(Error::DuplicateComponent {
                entity,
                kind: info.name().into(),
            });
        }

        let missing_systems = info.required_systems().difference(self.systems.mask());
        let missing_components = info.required_components().difference(mask);

        let on_ancestor = info.requires_on_ancestor();
        let on_ancestor_or_self = info.requires_on_ancestor_or_self();
        let missing_ancestors = if on_ancestor.is_empty() && on_ancestor_or_self.is_empty() {
            BitField::new()
        } else {
            let ancestors = self.ancestor_mask(entity);
            on_ancestor.difference(ancestors) | on_ancestor_or_self.difference(ancestors | mask)
        };

        if !missing_systems.is_empty()
            || !missing_components.is_empty()
            || !missing_ancestors.is_empty()
        {
            return Err(Error::MissingDependencies {
                entity,
                kind: info.name().into(),
                systems: registry.system_names(missing_systems),
                components: registry.component_names(missing_components),
                ancestors: registry.component_names(missing_ancestors),
            });
        }

        let mut instance = registry.instantiate_component(kind);
        let mut ctx = InitContext::new(
            entity,
            registry,
            self.entities,
            self.components,
            self.systems,
        );

        instance
            .init_dyn(&mut ctx, properties)
            .map_err(|err| match err {
                InitError::Properties { expected } => Error::InvalidProperties {
                    kind: info.name().into(),
                    expected: expected.into(),
                },
                InitError::Failed(cause) => Error::Init {
                    kind: info.name().into(),
                    entity: Some(entity),
                    cause,
                },
            })?;

        // The entity may not be destroyed during init
        let Some(record) = self.entities.get_mut(entity) else {
            return Err(Error::NoSuchEntity(entity));
        };

        record.mask_mut().insert(kind.index());
        self.components.insert(kind, entity, instance);
        tracing::trace!(%entity, kind = info.name(), "add component");

        self.notify(entity, kind, mask, true);

        Ok(())
    }

    /// Detaches a component from an entity.
    pub fn remove_component<T: Component>(&mut self, entity: EntityId) -> Result<()> {
        let kind = self.registry.component_id::<T>()?;
        self.remove_component_dyn(entity, kind)
    }

    /// Detaches a component of `kind` from `entity`.
    ///
    /// A no-op if the component is not attached. Fails if another component
    /// of the entity still requires it.
    ///
    /// The component is shut down immediately, but lingers flagged as dead in
    /// the live generation until the start of the next frame.
    pub fn remove_component_dyn(&mut self, entity: EntityId, kind: ComponentId) -> Result<()> {
        let registry = self.registry;
        let mask = self.entities.mask(entity)?;

        if !mask.get(kind.index()) {
            return Ok(());
        }

        let provided_by_ancestor = self.ancestor_mask(entity).get(kind.index());
        let dependents: KindNames = mask
            .iter()
            .filter(|&other| other != kind.index())
            .map(|other| registry.component(ComponentId::from_index(other)))
            .filter(|other| {
                other.required_components().get(kind.index())
                    || !provided_by_ancestor
                        && other.requires_on_ancestor_or_self().get(kind.index())
            })
            .map(|other| other.name().into())
            .collect();

        if !dependents.is_empty() {
            return Err(Error::StillRequired {
                entity,
                kind: registry.component_name(kind).into(),
                dependents,
            });
        }

        self.detach(entity, kind);
        Ok(())
    }

    /// Detaches without validation
    fn detach(&mut self, entity: EntityId, kind: ComponentId) {
        let Some(record) = self.entities.get_mut(entity) else {
            return;
        };

        record.mask_mut().remove(kind.index());
        let mask = record.mask();

        self.components.remove(kind, entity);
        tracing::trace!(%entity, kind = self.registry.component_name(kind), "remove component");

        self.notify(entity, kind, mask, false);
    }

    /// Notifies the listeners among `mask` of a component of `kind` being
    /// attached or detached
    fn notify(&mut self, entity: EntityId, kind: ComponentId, mask: BitField, added: bool) {
        let registry = self.registry;
        let listeners = registry.components_implementing::<Listener>() & mask;

        for listener in listeners {
            let listener = ComponentId::from_index(listener);
            if listener == kind {
                continue;
            }

            let Some(caster) = registry.component_caster::<Listener>(listener) else {
                continue;
            };

            // Skips listeners which are currently updating
            let Some(instance) = self.components.get_mut(listener, entity) else {
                continue;
            };

            let Some(listener) = (caster.get_mut)(instance) else {
                continue;
            };

            if added {
                listener.component_added(entity, kind);
            } else {
                listener.component_removed(entity, kind);
            }
        }
    }

    /// Destroys a single entity, detaching its components in reverse update
    /// order. Descendants are left in place.
    pub fn destroy_entity(&mut self, entity: EntityId) -> Result<()> {
        if !self.entities.contains(entity) {
            return Err(Error::NoSuchEntity(entity));
        }

        self.teardown(&[entity]);
        Ok(())
    }

    /// Destroys an entity and all of its descendants
    pub fn destroy_entity_recursive(&mut self, entity: EntityId) -> Result<()> {
        self.destroy_entities(&[entity])
    }

    /// Destroys a batch of entities along with all of their descendants.
    ///
    /// Components are detached kind by kind in reverse update order across
    /// the whole set, so no component outlives another which requires it.
    pub fn destroy_entities(&mut self, entities: &[EntityId]) -> Result<()> {
        if let Some(&missing) = entities.iter().find(|&&v| !self.entities.contains(v)) {
            return Err(Error::NoSuchEntity(missing));
        }

        let mut visited = BTreeSet::new();
        let mut set = Vec::new();
        for &entity in entities {
            self.collect_subtree(entity, &mut visited, &mut set);
        }

        self.teardown(&set);
        Ok(())
    }

    fn collect_subtree(
        &self,
        entity: EntityId,
        visited: &mut BTreeSet<EntityId>,
        set: &mut Vec<EntityId>,
    ) {
        let mut stack = vec![entity];
        while let Some(entity) = stack.pop() {
            if !self.entities.contains(entity) || !visited.insert(entity) {
                continue;
            }

            set.push(entity);
            // Reversed so children are visited in declaration order
            stack.extend(self.children(entity).iter().rev().copied());
        }
    }

    /// Detaches every component of `set` in reverse update order, then
    /// retires the entities
    fn teardown(&mut self, set: &[EntityId]) {
        let used = set
            .iter()
            .filter_map(|&v| self.entities.get(v))
            .fold(BitField::new(), |acc, v| acc | v.mask());

        for kind in used.reversed() {
            let kind = ComponentId::from_index(kind);
            for &entity in set {
                if self
                    .entities
                    .get(entity)
                    .is_some_and(|v| v.mask().get(kind.index()))
                {
                    self.detach(entity, kind);
                }
            }
        }

        for &entity in set {
            // `set` only holds distinct, existing entities
            let _ = self.entities.retire(entity);
        }
    }

    /// Access the component `T` of an entity.
    ///
    /// Returns `None` if absent or currently updating.
    pub fn get<T: Component>(&self, entity: EntityId) -> Option<&T> {
        let kind = self.registry.component_id::<T>().ok()?;
        downcast_ref(self.components.get(kind, entity)?)
    }

    pub fn get_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        let kind = self.registry.component_id::<T>().ok()?;
        downcast_mut(self.components.get_mut(kind, entity)?)
    }

    /// Returns true if `T` is attached to the entity
    pub fn has<T: Component>(&self, entity: EntityId) -> bool {
        let Ok(kind) = self.registry.component_id::<T>() else {
            return false;
        };

        self.entities
            .get(entity)
            .is_some_and(|v| v.mask().get(kind.index()))
    }

    pub fn system<S: System>(&self) -> Option<&S> {
        self.systems.get::<S>()
    }

    fn hierarchy(&self, entity: EntityId) -> Option<&dyn Hierarchy> {
        let mask = self.entities.get(entity)?.mask();
        let kind = (self.registry.components_implementing::<HierarchyNode>() & mask).first()?;
        let kind = ComponentId::from_index(kind);

        let instance = self.components.get(kind, entity)?;
        self.registry.cast_component::<HierarchyNode>(kind, instance)
    }

    /// The parent of an entity, as reported by its hierarchy component
    pub fn parent(&self, entity: EntityId) -> Option<EntityId> {
        self.hierarchy(entity)?.parent()
    }

    /// The children of an entity, as reported by its hierarchy component
    pub fn children(&self, entity: EntityId) -> &[EntityId] {
        self.hierarchy(entity)
            .map(|v| v.children())
            .unwrap_or_default()
    }

    /// Iterates the strict ancestors of an entity, nearest first
    pub fn ancestors(&self, entity: EntityId) -> Ancestors<'_, 'a> {
        Ancestors {
            scene: self,
            current: self.parent(entity),
            remaining: self.entities.len(),
        }
    }

    /// The union of the component masks of the strict ancestors
    pub fn ancestor_mask(&self, entity: EntityId) -> BitField {
        self.ancestors(entity)
            .filter_map(|v| self.entities.get(v))
            .fold(BitField::new(), |acc, v| acc | v.mask())
    }

    /// Returns the entity and all its descendants, parents before children
    pub fn subtree(&self, entity: EntityId) -> SmallVec<[EntityId; 8]> {
        let mut visited = BTreeSet::new();
        let mut set = Vec::new();
        self.collect_subtree(entity, &mut visited, &mut set);
        set.into_iter().collect()
    }
}

/// Walks up the hierarchy.
///
/// Bounded by the number of entities so a malformed, cyclic hierarchy
/// terminates.
pub struct Ancestors<'s, 'a> {
    scene: &'s Scene<'a>,
    current: Option<EntityId>,
    remaining: usize,
}

impl<'s, 'a> Iterator for Ancestors<'s, 'a> {
    type Item = EntityId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current.take()?;
        if self.remaining == 0 || !self.scene.entities.contains(current) {
            return None;
        }

        self.remaining -= 1;
        self.current = self.scene.parent(current);
        Some(current)
    }
}
