mod builder;
mod finalize;

use alloc::collections::BTreeMap;
use core::{any::TypeId, fmt};

pub use builder::{ComponentBuilder, RegistryBuilder, SystemBuilder};

use crate::{
    capability::{Capability, Caster},
    error::{KindNames, Result},
    BitField, CapabilityId, ComponentId, ComponentObject, Error, SystemId, SystemObject,
};

pub(crate) use builder::ErasedCaster;

/// Finalized description of a component or system kind
pub struct KindInfo<O: ?Sized> {
    name: String,
    type_name: String,
    required_components: BitField,
    required_systems: BitField,
    depends_on: BitField,
    dependents: BitField,
    requires_on_ancestor: BitField,
    requires_on_ancestor_or_self: BitField,
    capabilities: BTreeMap<CapabilityId, ErasedCaster>,
    construct: fn() -> Box<O>,
}

/// A finalized component kind
pub type ComponentKind = KindInfo<dyn ComponentObject>;
/// A finalized system kind
pub type SystemKind = KindInfo<dyn SystemObject>;

impl<O: ?Sized> KindInfo<O> {
    /// The registered name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The short name of the rust type
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Transitively closed hard component dependencies.
    ///
    /// Always empty for systems.
    #[inline]
    pub fn required_components(&self) -> BitField {
        self.required_components
    }

    /// Transitively closed hard system dependencies
    #[inline]
    pub fn required_systems(&self) -> BitField {
        self.required_systems
    }

    /// Transitively closed ordering dependencies within the kind's namespace.
    ///
    /// A superset of the required kinds of the same namespace.
    #[inline]
    pub fn depends_on(&self) -> BitField {
        self.depends_on
    }

    /// The kinds whose [`depends_on`](Self::depends_on) contains this kind
    #[inline]
    pub fn dependents(&self) -> BitField {
        self.dependents
    }

    /// Components which must be present on a strict ancestor
    #[inline]
    pub fn requires_on_ancestor(&self) -> BitField {
        self.requires_on_ancestor
    }

    /// Components which must be present on the entity itself or an ancestor
    #[inline]
    pub fn requires_on_ancestor_or_self(&self) -> BitField {
        self.requires_on_ancestor_or_self
    }

    pub fn implements(&self, capability: CapabilityId) -> bool {
        self.capabilities.contains_key(&capability)
    }

    pub(crate) fn caster<C: Capability>(&self, capability: CapabilityId) -> Option<&Caster<O, C>>
    where
        O: 'static,
    {
        self.capabilities
            .get(&capability)?
            .downcast_ref::<Caster<O, C>>()
    }
}

impl<O: ?Sized> fmt::Debug for KindInfo<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindInfo")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("required_components", &self.required_components)
            .field("required_systems", &self.required_systems)
            .field("depends_on", &self.depends_on)
            .field("dependents", &self.dependents)
            .finish_non_exhaustive()
    }
}

/// The kinds implementing a capability
#[derive(Debug, Clone)]
pub struct CapabilityInfo {
    name: String,
    components: BitField,
    systems: BitField,
}

impl CapabilityInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn components(&self) -> BitField {
        self.components
    }

    pub fn systems(&self) -> BitField {
        self.systems
    }
}

/// The immutable, finalized kind registry.
///
/// Kind ids are dense and assigned in update order: every kind has a higher
/// id than the kinds it depends on. Produced by [`RegistryBuilder::finalize`]
/// and shared between levels through an [`Arc`](alloc::sync::Arc).
pub struct Registry {
    components: Vec<ComponentKind>,
    systems: Vec<SystemKind>,
    component_ids: BTreeMap<TypeId, ComponentId>,
    system_ids: BTreeMap<TypeId, SystemId>,
    capabilities: Vec<CapabilityInfo>,
    capability_ids: BTreeMap<TypeId, CapabilityId>,
    /// For each system, the component kinds which require it
    components_requiring_system: Vec<BitField>,
}

impl Registry {
    /// Shorthand for [`RegistryBuilder::new`]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Returns the id of a registered component type
    pub fn component_id<T: 'static>(&self) -> Result<ComponentId> {
        self.component_ids
            .get(&TypeId::of::<T>())
            .copied()
            .ok_or_else(|| Error::UnknownType(tynm::type_name::<T>()))
    }

    /// Looks up a component kind by name.
    ///
    /// Data driven content may name kinds which do not exist, which is
    /// signalled by `None`.
    pub fn component_id_by_name(&self, name: &str) -> Option<ComponentId> {
        self.components
            .iter()
            .position(|v| v.name == name)
            .map(ComponentId::from_index)
    }

    /// Returns the id of a registered system type
    pub fn system_id<T: 'static>(&self) -> Result<SystemId> {
        self.system_ids
            .get(&TypeId::of::<T>())
            .copied()
            .ok_or_else(|| Error::UnknownType(tynm::type_name::<T>()))
    }

    /// Looks up a system kind by name.
    ///
    /// Fails for unknown names.
    pub fn system_id_by_name(&self, name: &str) -> Result<SystemId> {
        self.systems
            .iter()
            .position(|v| v.name == name)
            .map(SystemId::from_index)
            .ok_or_else(|| Error::UnknownKind(name.into()))
    }

    /// # Panics
    /// If the id does not belong to this registry
    pub fn component(&self, id: ComponentId) -> &ComponentKind {
        self.components
            .get(id.index())
            .unwrap_or_else(|| panic!("Unknown component kind {id:?}"))
    }

    /// # Panics
    /// If the id does not belong to this registry
    pub fn system(&self, id: SystemId) -> &SystemKind {
        self.systems
            .get(id.index())
            .unwrap_or_else(|| panic!("Unknown system kind {id:?}"))
    }

    pub fn component_name(&self, id: ComponentId) -> &str {
        self.component(id).name()
    }

    pub fn system_name(&self, id: SystemId) -> &str {
        self.system(id).name()
    }

    /// All component kinds in update order
    pub fn components(&self) -> impl Iterator<Item = (ComponentId, &ComponentKind)> {
        self.components
            .iter()
            .enumerate()
            .map(|(i, v)| (ComponentId::from_index(i), v))
    }

    /// All system kinds in update order
    pub fn systems(&self) -> impl Iterator<Item = (SystemId, &SystemKind)> {
        self.systems
            .iter()
            .enumerate()
            .map(|(i, v)| (SystemId::from_index(i), v))
    }

    pub fn component_names(&self, mask: BitField) -> KindNames {
        mask.iter()
            .map(|v| self.components[v].name.clone())
            .collect()
    }

    pub fn system_names(&self, mask: BitField) -> KindNames {
        mask.iter().map(|v| self.systems[v].name.clone()).collect()
    }

    /// The component kinds which require `system`
    pub fn components_requiring_system(&self, system: SystemId) -> BitField {
        self.components_requiring_system[system.index()]
    }

    /// Returns the id of a capability, or `None` if no kind ever declared it
    pub fn capability_id<C: Capability>(&self) -> Option<CapabilityId> {
        self.capability_ids.get(&TypeId::of::<C>()).copied()
    }

    pub fn capability(&self, id: CapabilityId) -> &CapabilityInfo {
        &self.capabilities[id.index()]
    }

    /// Component kinds implementing `C`.
    ///
    /// Empty if no kind declared the capability.
    pub fn components_implementing<C: Capability>(&self) -> BitField {
        self.capability_id::<C>()
            .map(|id| self.capabilities[id.index()].components)
            .unwrap_or_default()
    }

    /// System kinds implementing `C`.
    ///
    /// Empty if no kind declared the capability.
    pub fn systems_implementing<C: Capability>(&self) -> BitField {
        self.capability_id::<C>()
            .map(|id| self.capabilities[id.index()].systems)
            .unwrap_or_default()
    }

    pub(crate) fn component_caster<C: Capability>(
        &self,
        id: ComponentId,
    ) -> Option<&Caster<dyn ComponentObject, C>> {
        let capability = self.capability_id::<C>()?;
        self.component(id).caster::<C>(capability)
    }

    pub(crate) fn system_caster<C: Capability>(
        &self,
        id: SystemId,
    ) -> Option<&Caster<dyn SystemObject, C>> {
        let capability = self.capability_id::<C>()?;
        self.system(id).caster::<C>(capability)
    }

    /// Views a component instance as the object of capability `C`.
    ///
    /// Returns `None` if the kind does not implement `C` or the instance is
    /// not of the kind's type.
    pub fn cast_component<'a, C: Capability>(
        &self,
        id: ComponentId,
        instance: &'a dyn ComponentObject,
    ) -> Option<&'a C::Object> {
        let caster = self.component_caster::<C>(id)?;
        (caster.get)(instance)
    }

    /// Constructs a default instance of a component kind
    pub fn instantiate_component(&self, id: ComponentId) -> Box<dyn ComponentObject> {
        (self.component(id).construct)()
    }

    /// Constructs a default instance of a system kind
    pub fn instantiate_system(&self, id: SystemId) -> Box<dyn SystemObject> {
        (self.system(id).construct)()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field(
                "components",
                &self.components.iter().map(|v| &v.name).collect::<Vec<_>>(),
            )
            .field(
                "systems",
                &self.systems.iter().map(|v| &v.name).collect::<Vec<_>>(),
            )
            .field(
                "capabilities",
                &self.capabilities.iter().map(|v| &v.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}
