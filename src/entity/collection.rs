use alloc::collections::BTreeMap;

use super::{Entity, EntityId};
use crate::{error::Result, BitField, ComponentId, Error, Properties};

/// Describes an entity to create as part of a batch.
///
/// Supplied by persistence or prefab layers: an optional id to create the
/// entity at, the kinds to attach and their property blobs.
#[derive(Default)]
pub struct EntityCreationInfo {
    pub id: Option<EntityId>,
    pub components: BitField,
    pub properties: BTreeMap<ComponentId, Properties>,
}

impl EntityCreationInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the entity at a specific id
    pub fn at(id: EntityId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    /// Attach a kind with default properties
    pub fn with(mut self, kind: ComponentId) -> Self {
        self.components.insert(kind.index());
        self
    }

    /// Attach a kind with the given properties
    pub fn with_properties(mut self, kind: ComponentId, properties: Properties) -> Self {
        self.components.insert(kind.index());
        self.properties.insert(kind, properties);
        self
    }
}

impl core::fmt::Debug for EntityCreationInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EntityCreationInfo")
            .field("id", &self.id)
            .field("components", &self.components)
            .field("properties", &self.properties.keys())
            .finish()
    }
}

/// Holds the entities of a level.
#[derive(Debug)]
pub struct EntityCollection {
    entities: BTreeMap<EntityId, Entity>,
    /// The next id to hand out. Never decreases, and exceeds `u32::MAX` once
    /// every id has been used.
    next: u64,
}

impl Default for EntityCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityCollection {
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            next: 1,
        }
    }

    /// Creates a new empty entity with a fresh id.
    ///
    /// Fails once every id up to `u32::MAX` has been handed out.
    pub fn create(&mut self) -> Result<EntityId> {
        let id = u32::try_from(self.next)
            .ok()
            .and_then(EntityId::from_raw)
            .ok_or(Error::EntityIdsExhausted)?;
        self.next += 1;

        self.entities.insert(id, Entity::new(id));
        tracing::trace!(%id, "create entity");
        Ok(id)
    }

    /// Creates a new empty entity at the provided id.
    ///
    /// Fails if the id is in use.
    pub fn create_at(&mut self, id: EntityId) -> Result<EntityId> {
        if self.entities.contains_key(&id) {
            return Err(Error::EntityOccupied(id));
        }

        self.next = self.next.max(u64::from(id.get()) + 1);
        self.entities.insert(id, Entity::new(id));
        tracing::trace!(%id, "create entity at");
        Ok(id)
    }

    /// Removes an entity whose components have all been detached.
    pub(crate) fn retire(&mut self, id: EntityId) -> Result<()> {
        let entity = self.entities.remove(&id).ok_or(Error::NoSuchEntity(id))?;
        debug_assert!(
            entity.mask().is_empty(),
            "Entity {id} still has components"
        );
        tracing::trace!(%id, "destroy entity");
        Ok(())
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Returns the component mask of an alive entity
    pub fn mask(&self, id: EntityId) -> Result<BitField> {
        self.get(id).map(Entity::mask).ok_or(Error::NoSuchEntity(id))
    }

    #[inline]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterates all alive entities in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// Returns the union of the component masks of every entity
    pub fn used_mask(&self) -> BitField {
        self.entities
            .values()
            .fold(BitField::new(), |acc, v| acc | v.mask())
    }
}
