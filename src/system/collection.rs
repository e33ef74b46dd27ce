use alloc::sync::Arc;

use itertools::Itertools;
use smallvec::SmallVec;

use crate::{
    error::{KindNames, Result},
    BitField, ComponentId, Error, Registry, System, SystemContext, SystemId, SystemObject,
};

/// Level wide storage of at most one instance per system kind.
///
/// Attachment is validated against the finalized requirements just like
/// components, without per entity multiplicity.
pub struct SystemCollection {
    registry: Arc<Registry>,
    /// `None` for absent systems and while a system is checked out
    slots: Vec<Option<Box<dyn SystemObject>>>,
    mask: BitField,
}

impl SystemCollection {
    pub fn new(registry: Arc<Registry>) -> Self {
        let slots = (0..registry.system_count()).map(|_| None).collect_vec();
        Self {
            registry,
            slots,
            mask: BitField::new(),
        }
    }

    /// The kinds of the systems currently present
    #[inline]
    pub fn mask(&self) -> BitField {
        self.mask
    }

    #[inline]
    pub fn contains(&self, kind: SystemId) -> bool {
        self.mask.get(kind.index())
    }

    /// Adds a default constructed instance of `kind`
    pub fn add(&mut self, kind: SystemId) -> Result<()> {
        let instance = self.registry.instantiate_system(kind);
        self.add_instance(kind, instance)
    }

    /// Adds a preconfigured system
    pub fn insert<S: System>(&mut self, system: S) -> Result<()> {
        let kind = self.registry.system_id::<S>()?;
        self.add_instance(kind, Box::new(system))
    }

    /// Validates and initialises `instance` as the system of `kind`.
    ///
    /// Fails if the kind is already present or any of its transitively
    /// required systems is missing.
    pub fn add_instance(
        &mut self,
        kind: SystemId,
        mut instance: Box<dyn SystemObject>,
    ) -> Result<()> {
        let registry = self.registry.clone();
        let info = registry.system(kind);

        if self.contains(kind) {
            return Err(Error::DuplicateSystem(info.name().into()));
        }

        let missing = info.required_systems().difference(self.mask);
        if !missing.is_empty() {
            return Err(Error::MissingSystems {
                kind: info.name().into(),
                missing: registry.system_names(missing),
            });
        }

        let ctx = SystemContext::new(&registry, self);
        instance.init_dyn(&ctx).map_err(|cause| Error::Init {
            kind: info.name().into(),
            entity: None,
            cause,
        })?;

        tracing::debug!(name = info.name(), "add system");
        self.slots[kind.index()] = Some(instance);
        self.mask.insert(kind.index());

        Ok(())
    }

    /// Removes and shuts down a system.
    ///
    /// A no-op if the system is absent. Fails if another present system or
    /// any component kind in `components_in_use` still requires it.
    pub fn remove(&mut self, kind: SystemId, components_in_use: BitField) -> Result<()> {
        if !self.contains(kind) {
            return Ok(());
        }

        let registry = &self.registry;
        let mut dependents: KindNames = self
            .mask
            .iter()
            .filter(|&other| {
                registry
                    .system(SystemId::from_index(other))
                    .required_systems()
                    .get(kind.index())
            })
            .map(|other| registry.system(SystemId::from_index(other)).name().into())
            .collect();

        dependents.extend(
            registry
                .components_requiring_system(kind)
                .iter()
                .filter(|&v| components_in_use.get(v))
                .map(|v| registry.component_name(ComponentId::from_index(v)).into()),
        );

        if !dependents.is_empty() {
            return Err(Error::SystemStillRequired {
                kind: registry.system(kind).name().into(),
                dependents,
            });
        }

        tracing::debug!(name = registry.system(kind).name(), "remove system");
        self.mask.remove(kind.index());
        if let Some(mut instance) = self.slots[kind.index()].take() {
            instance.shutdown_dyn();
        }

        Ok(())
    }

    /// Shuts down every system in reverse dependency order.
    ///
    /// # Panics
    /// If a component kind in `components_in_use` still requires a present
    /// system.
    pub fn clear(&mut self, components_in_use: BitField) {
        let required = components_in_use
            .iter()
            .fold(BitField::new(), |acc, v| {
                acc | self
                    .registry
                    .component(ComponentId::from_index(v))
                    .required_systems()
            })
            & self.mask;

        assert!(
            required.is_empty(),
            "Unable to clear systems {:?} which are still required by components",
            self.registry.system_names(required)
        );

        for kind in self.mask.reversed() {
            if let Some(mut instance) = self.slots[kind].take() {
                tracing::debug!(
                    name = self.registry.system(SystemId::from_index(kind)).name(),
                    "shutdown system"
                );
                instance.shutdown_dyn();
            }
        }

        self.mask = BitField::new();
    }

    /// Access the system of `kind`, if present
    pub fn get_dyn(&self, kind: SystemId) -> Option<&dyn SystemObject> {
        self.slots.get(kind.index())?.as_deref()
    }

    pub fn get_dyn_mut(&mut self, kind: SystemId) -> Option<&mut dyn SystemObject> {
        self.slots.get_mut(kind.index())?.as_deref_mut()
    }

    /// Access a system by type
    pub fn get<S: System>(&self) -> Option<&S> {
        let kind = self.registry.system_id::<S>().ok()?;
        self.get_dyn(kind)?.as_any().downcast_ref::<S>()
    }

    pub fn get_mut<S: System>(&mut self) -> Option<&mut S> {
        let kind = self.registry.system_id::<S>().ok()?;
        self.get_dyn_mut(kind)?.as_any_mut().downcast_mut::<S>()
    }

    /// Iterates the present systems in update order
    pub fn iter(&self) -> impl Iterator<Item = (SystemId, &dyn SystemObject)> + '_ {
        self.mask.iter().filter_map(|kind| {
            Some((SystemId::from_index(kind), self.slots[kind].as_deref()?))
        })
    }

    pub(crate) fn checkout(&mut self, kind: SystemId) -> Option<Box<dyn SystemObject>> {
        self.slots[kind.index()].take()
    }

    pub(crate) fn checkin(&mut self, kind: SystemId, instance: Box<dyn SystemObject>) {
        debug_assert!(self.contains(kind));
        self.slots[kind.index()] = Some(instance);
    }
}

impl core::fmt::Debug for SystemCollection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let names: SmallVec<[&str; 8]> = self
            .mask
            .iter()
            .map(|v| self.registry.system(SystemId::from_index(v)).name())
            .collect();

        f.debug_list().entries(names).finish()
    }
}
