use alloc::collections::BTreeMap;

use crate::{ComponentId, ComponentObject, EntityId};

pub(crate) struct Slot {
    /// Vacant while the instance is checked out for its own callback
    pub(crate) instance: Option<Box<dyn ComponentObject>>,
    pub(crate) dead: bool,
    /// The component was detached while checked out and is shut down on
    /// check in
    shutdown_pending: bool,
}

impl Slot {
    fn new(instance: Box<dyn ComponentObject>) -> Self {
        Self {
            instance: Some(instance),
            dead: false,
            shutdown_pending: false,
        }
    }

    /// Marks the slot as dead and shuts the instance down.
    fn kill(&mut self) {
        debug_assert!(!self.dead);
        self.dead = true;
        match &mut self.instance {
            Some(instance) => instance.shutdown_dyn(),
            None => self.shutdown_pending = true,
        }
    }
}

/// Storage of a single component kind.
///
/// Components attached during a frame land in `new` and are only visible to
/// per kind iteration once promoted into `live` at the start of the next
/// frame. Detached components are flagged dead and linger in their store
/// until swept.
#[derive(Default)]
pub(crate) struct KindStore {
    pub(crate) live: BTreeMap<EntityId, Slot>,
    pub(crate) new: BTreeMap<EntityId, Slot>,
}

impl KindStore {
    fn slot(&self, entity: EntityId) -> Option<&Slot> {
        self.new
            .get(&entity)
            .filter(|v| !v.dead)
            .or_else(|| self.live.get(&entity).filter(|v| !v.dead))
    }

    fn slot_mut(&mut self, entity: EntityId) -> Option<&mut Slot> {
        match self.new.get_mut(&entity) {
            Some(slot) if !slot.dead => Some(slot),
            _ => self.live.get_mut(&entity).filter(|v| !v.dead),
        }
    }

    /// Iterates the live, non dead components
    pub(crate) fn iter_live_mut(
        &mut self,
    ) -> impl Iterator<Item = (EntityId, &mut dyn ComponentObject)> + '_ {
        self.live.iter_mut().filter_map(|(&id, slot)| {
            if slot.dead {
                return None;
            }

            Some((id, slot.instance.as_deref_mut()?))
        })
    }
}

/// Per kind component instance storage with frame atomic visibility.
///
/// Instances are keyed by (kind, entity). The collection does not validate
/// dependencies, which is done by the [`Scene`](crate::Scene) attaching them.
pub struct ComponentCollection {
    stores: Vec<KindStore>,
}

impl ComponentCollection {
    /// Creates storage for `kind_count` component kinds
    pub fn new(kind_count: usize) -> Self {
        Self {
            stores: (0..kind_count).map(|_| KindStore::default()).collect(),
        }
    }

    /// Returns the number of component kinds
    pub fn kind_count(&self) -> usize {
        self.stores.len()
    }

    fn store(&self, kind: ComponentId) -> &KindStore {
        self.stores
            .get(kind.index())
            .unwrap_or_else(|| panic!("Unknown component kind {kind:?}"))
    }

    fn store_mut(&mut self, kind: ComponentId) -> &mut KindStore {
        self.stores
            .get_mut(kind.index())
            .unwrap_or_else(|| panic!("Unknown component kind {kind:?}"))
    }

    pub(crate) fn stores_mut(&mut self) -> &mut [KindStore] {
        &mut self.stores
    }

    /// Registers a freshly initialised instance into the new generation.
    pub(crate) fn insert(
        &mut self,
        kind: ComponentId,
        entity: EntityId,
        instance: Box<dyn ComponentObject>,
    ) {
        let store = self.store_mut(kind);
        debug_assert!(
            store.slot(entity).is_none(),
            "Duplicate component {kind:?} on {entity}"
        );

        tracing::trace!(?kind, %entity, "insert");
        store.new.insert(entity, Slot::new(instance));
    }

    /// Flags the component as dead and shuts it down.
    ///
    /// The instance remains resident until the next
    /// [`remove_dead_components`](Self::remove_dead_components).
    pub(crate) fn remove(&mut self, kind: ComponentId, entity: EntityId) -> bool {
        match self.store_mut(kind).slot_mut(entity) {
            Some(slot) => {
                tracing::trace!(?kind, %entity, "remove");
                slot.kill();
                true
            }
            None => false,
        }
    }

    /// Returns true if a non dead component of `kind` is attached to `entity`
    pub fn contains(&self, kind: ComponentId, entity: EntityId) -> bool {
        self.store(kind).slot(entity).is_some()
    }

    /// Access a component of either generation.
    ///
    /// Returns `None` while the instance is being updated.
    pub fn get(&self, kind: ComponentId, entity: EntityId) -> Option<&dyn ComponentObject> {
        self.store(kind).slot(entity)?.instance.as_deref()
    }

    /// Mutably access a component of either generation
    pub fn get_mut(
        &mut self,
        kind: ComponentId,
        entity: EntityId,
    ) -> Option<&mut dyn ComponentObject> {
        self.store_mut(kind).slot_mut(entity)?.instance.as_deref_mut()
    }

    /// Returns true if the component is in the live generation, dead or not
    pub fn is_live(&self, kind: ComponentId, entity: EntityId) -> bool {
        self.store(kind).live.contains_key(&entity)
    }

    /// Returns true if the component has been detached but not yet swept
    pub fn is_dead(&self, kind: ComponentId, entity: EntityId) -> bool {
        let store = self.store(kind);
        let dead = |slot: &Slot| slot.dead;
        store.live.get(&entity).is_some_and(dead) && !store.new.contains_key(&entity)
            || store.new.get(&entity).is_some_and(dead)
    }

    /// Iterates the live generation of `kind`, including dead components.
    ///
    /// Dead components are flagged so callers can skip them.
    pub fn live(&self, kind: ComponentId) -> impl Iterator<Item = LiveComponent<'_>> + '_ {
        self.store(kind)
            .live
            .iter()
            .map(|(&entity, slot)| LiveComponent {
                entity,
                dead: slot.dead,
                instance: slot.instance.as_deref(),
            })
    }

    /// Returns the entities of the live, non dead components of `kind`
    pub fn live_entities(&self, kind: ComponentId) -> Vec<EntityId> {
        self.store(kind)
            .live
            .iter()
            .filter(|(_, slot)| !slot.dead)
            .map(|(&id, _)| id)
            .collect()
    }

    /// Returns the number of attached, non dead components of `kind` across
    /// both generations
    pub fn len(&self, kind: ComponentId) -> usize {
        let store = self.store(kind);
        let live = store
            .live
            .iter()
            .filter(|(id, v)| !v.dead && !store.new.contains_key(id))
            .count();

        live + store.new.values().filter(|v| !v.dead).count()
    }

    /// Moves every component attached since the last promotion into the live
    /// generation.
    pub fn promote_new_components(&mut self) {
        for (index, store) in self.stores.iter_mut().enumerate() {
            if store.new.is_empty() {
                continue;
            }

            tracing::trace!(kind = index, count = store.new.len(), "promote");
            // A re-attached component replaces its dead predecessor
            store.live.append(&mut store.new);
        }
    }

    /// Drops every dead component from the live generation
    pub fn remove_dead_components(&mut self) {
        for store in &mut self.stores {
            store.live.retain(|_, slot| !slot.dead);
        }
    }

    /// Takes a live component out of its slot for the duration of its own
    /// callback.
    pub(crate) fn checkout(
        &mut self,
        kind: ComponentId,
        entity: EntityId,
    ) -> Option<Box<dyn ComponentObject>> {
        let slot = self.store_mut(kind).live.get_mut(&entity)?;
        if slot.dead {
            return None;
        }

        slot.instance.take()
    }

    /// Returns a checked out component to its slot, completing a shutdown
    /// requested while it was out.
    pub(crate) fn checkin(
        &mut self,
        kind: ComponentId,
        entity: EntityId,
        mut instance: Box<dyn ComponentObject>,
    ) {
        match self.store_mut(kind).live.get_mut(&entity) {
            Some(slot) if slot.instance.is_none() => {
                if slot.shutdown_pending {
                    slot.shutdown_pending = false;
                    instance.shutdown_dyn();
                }

                slot.instance = Some(instance);
            }
            _ => {
                tracing::warn!(?kind, %entity, "Checked out component lost its slot");
                instance.shutdown_dyn();
            }
        }
    }
}

impl core::fmt::Debug for ComponentCollection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map()
            .entries(self.stores.iter().enumerate().map(|(kind, store)| {
                (
                    kind,
                    (store.live.len(), store.new.len()),
                )
            }))
            .finish()
    }
}

/// An entry of the live generation
#[derive(Debug)]
pub struct LiveComponent<'a> {
    pub entity: EntityId,
    /// Detached this frame, awaiting the sweep
    pub dead: bool,
    /// `None` while the component is being updated
    pub instance: Option<&'a dyn ComponentObject>,
}
