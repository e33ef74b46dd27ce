use alloc::collections::BTreeMap;
use core::{
    any::{Any, TypeId},
    marker::PhantomData,
};

use crate::{
    capability::{Capability, Caster, Implements},
    error::Result,
    BitField, CapabilityId, Component, ComponentObject, Error, Registry, System, SystemObject,
};

/// A reference to a kind by type, resolved when the registry is finalized
#[derive(Debug, Clone, Copy)]
pub(crate) struct TypeRef {
    pub(crate) id: TypeId,
    pub(crate) name: &'static str,
}

impl TypeRef {
    fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: core::any::type_name::<T>(),
        }
    }
}

pub(crate) type ErasedCaster = Box<dyn Any + Send + Sync>;

/// The declarations of a kind prior to finalization
pub(crate) struct KindDecl<O: ?Sized> {
    pub(crate) name: String,
    pub(crate) ty: TypeRef,
    /// Short type name for diagnostics
    pub(crate) type_name: String,
    pub(crate) requires: Vec<TypeRef>,
    pub(crate) requires_systems: Vec<TypeRef>,
    pub(crate) after: Vec<TypeRef>,
    pub(crate) before: Vec<TypeRef>,
    pub(crate) requires_on_ancestor: Vec<TypeRef>,
    pub(crate) requires_on_ancestor_or_self: Vec<TypeRef>,
    pub(crate) capabilities: Vec<(CapabilityId, ErasedCaster)>,
    pub(crate) construct: fn() -> Box<O>,
}

impl<O: ?Sized> KindDecl<O> {
    fn new(name: String, ty: TypeRef, type_name: String, construct: fn() -> Box<O>) -> Self {
        Self {
            name,
            ty,
            type_name,
            requires: Vec::new(),
            requires_systems: Vec::new(),
            after: Vec::new(),
            before: Vec::new(),
            requires_on_ancestor: Vec::new(),
            requires_on_ancestor_or_self: Vec::new(),
            capabilities: Vec::new(),
            construct,
        }
    }

    pub(crate) fn implements(&self, capability: CapabilityId) -> bool {
        self.capabilities.iter().any(|(id, _)| *id == capability)
    }
}

pub(crate) struct CapabilityDecl {
    pub(crate) name: String,
}

fn construct_component<T: Component>() -> Box<dyn ComponentObject> {
    Box::<T>::default()
}

fn construct_system<T: System>() -> Box<dyn SystemObject> {
    Box::<T>::default()
}

/// Collects component and system kinds and their dependency declarations.
///
/// Once every kind is registered the builder is consumed by
/// [`RegistryBuilder::finalize`], which sorts, validates and assigns the dense
/// ids used by every [`Level`](crate::Level).
#[derive(Default)]
pub struct RegistryBuilder {
    pub(crate) components: Vec<KindDecl<dyn ComponentObject>>,
    pub(crate) systems: Vec<KindDecl<dyn SystemObject>>,
    pub(crate) capabilities: Vec<CapabilityDecl>,
    pub(crate) capability_ids: BTreeMap<TypeId, CapabilityId>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every registration
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Returns true if `T` is registered as either a component or a system
    pub fn is_registered<T: 'static>(&self) -> bool {
        let id = TypeId::of::<T>();
        self.components.iter().any(|v| v.ty.id == id) || self.systems.iter().any(|v| v.ty.id == id)
    }

    fn check_unique<O: ?Sized>(
        &self,
        decls: &[KindDecl<O>],
        name: &str,
        ty: TypeRef,
    ) -> Result<()> {
        if self.components.iter().any(|v| v.ty.id == ty.id)
            || self.systems.iter().any(|v| v.ty.id == ty.id)
        {
            return Err(Error::DuplicateType(ty.name.into()));
        }

        if decls.iter().any(|v| v.name == name) {
            return Err(Error::DuplicateKind(name.into()));
        }

        if decls.len() >= BitField::CAPACITY {
            return Err(Error::TooManyKinds {
                name: name.into(),
                max: BitField::CAPACITY,
            });
        }

        Ok(())
    }

    /// Register a component kind.
    ///
    /// Fails if the type or the name is already registered.
    pub fn component<T: Component>(
        &mut self,
        name: impl Into<String>,
    ) -> Result<ComponentBuilder<'_, T>> {
        let name = name.into();
        let ty = TypeRef::of::<T>();
        self.check_unique(&self.components, &name, ty)?;

        let index = self.components.len();
        self.components
            .push(KindDecl::new(
                name,
                ty,
                tynm::type_name::<T>(),
                construct_component::<T>,
            ));

        Ok(ComponentBuilder {
            registry: self,
            index,
            _marker: PhantomData,
        })
    }

    /// Register a system kind.
    ///
    /// Fails if the type or the name is already registered.
    pub fn system<T: System>(&mut self, name: impl Into<String>) -> Result<SystemBuilder<'_, T>> {
        let name = name.into();
        let ty = TypeRef::of::<T>();
        self.check_unique(&self.systems, &name, ty)?;

        let index = self.systems.len();
        self.systems
            .push(KindDecl::new(
                name,
                ty,
                tynm::type_name::<T>(),
                construct_system::<T>,
            ));

        Ok(SystemBuilder {
            registry: self,
            index,
            _marker: PhantomData,
        })
    }

    /// Returns the id of a capability, assigning one on first use
    pub(crate) fn capability_id<C: Capability>(&mut self) -> CapabilityId {
        let next = CapabilityId(self.capabilities.len() as u16);
        let id = *self
            .capability_ids
            .entry(TypeId::of::<C>())
            .or_insert(next);

        if id == next {
            self.capabilities.push(CapabilityDecl { name: C::name() });
        }

        id
    }

    /// Sorts, validates and remaps every registered kind.
    ///
    /// See [`Registry`].
    pub fn finalize(self) -> Result<Registry> {
        super::finalize::finalize(self)
    }
}

/// Declares the dependencies and capabilities of a component kind
pub struct ComponentBuilder<'a, T> {
    registry: &'a mut RegistryBuilder,
    index: usize,
    _marker: PhantomData<T>,
}

impl<'a, T: Component> ComponentBuilder<'a, T> {
    fn decl(&mut self) -> &mut KindDecl<dyn ComponentObject> {
        &mut self.registry.components[self.index]
    }

    /// `U` must be attached to the same entity before `T`, and may not be
    /// detached while `T` is. Implies [`after`](Self::after).
    pub fn requires<U: Component>(&mut self) -> &mut Self {
        self.decl().requires.push(TypeRef::of::<U>());
        self
    }

    /// The system `S` must be present in the level while `T` is attached
    pub fn requires_system<S: System>(&mut self) -> &mut Self {
        self.decl().requires_systems.push(TypeRef::of::<S>());
        self
    }

    /// `T` updates after `U`
    pub fn after<U: Component>(&mut self) -> &mut Self {
        self.decl().after.push(TypeRef::of::<U>());
        self
    }

    /// `T` updates before `U`
    pub fn before<U: Component>(&mut self) -> &mut Self {
        self.decl().before.push(TypeRef::of::<U>());
        self
    }

    /// `U` must be attached to a strict ancestor of the entity
    pub fn requires_on_ancestor<U: Component>(&mut self) -> &mut Self {
        self.decl().requires_on_ancestor.push(TypeRef::of::<U>());
        self
    }

    /// `U` must be attached to the entity itself or one of its ancestors
    pub fn requires_on_ancestor_or_self<U: Component>(&mut self) -> &mut Self {
        self.decl()
            .requires_on_ancestor_or_self
            .push(TypeRef::of::<U>());
        self
    }

    /// Declare that `T` implements the capability `C`
    pub fn implements<C: Capability>(&mut self) -> &mut Self
    where
        T: Implements<C>,
    {
        let id = self.registry.capability_id::<C>();
        let caster: ErasedCaster = Box::new(Caster::<dyn ComponentObject, C>::new::<T>());
        let decl = self.decl();
        if !decl.implements(id) {
            decl.capabilities.push((id, caster));
        }
        self
    }
}

/// Declares the dependencies and capabilities of a system kind.
///
/// Systems may only depend on other systems.
pub struct SystemBuilder<'a, T> {
    registry: &'a mut RegistryBuilder,
    index: usize,
    _marker: PhantomData<T>,
}

impl<'a, T: System> SystemBuilder<'a, T> {
    fn decl(&mut self) -> &mut KindDecl<dyn SystemObject> {
        &mut self.registry.systems[self.index]
    }

    /// `S` must be present in the level before `T` is added, and may not be
    /// removed while `T` is present. Implies [`after`](Self::after).
    pub fn requires<S: System>(&mut self) -> &mut Self {
        self.decl().requires.push(TypeRef::of::<S>());
        self
    }

    /// `T` updates after `S`
    pub fn after<S: System>(&mut self) -> &mut Self {
        self.decl().after.push(TypeRef::of::<S>());
        self
    }

    /// `T` updates before `S`
    pub fn before<S: System>(&mut self) -> &mut Self {
        self.decl().before.push(TypeRef::of::<S>());
        self
    }

    /// Declare that `T` implements the capability `C`
    pub fn implements<C: Capability>(&mut self) -> &mut Self
    where
        T: Implements<C>,
    {
        let id = self.registry.capability_id::<C>();
        let caster: ErasedCaster = Box::new(Caster::<dyn SystemObject, C>::new::<T>());
        let decl = self.decl();
        if !decl.implements(id) {
            decl.capabilities.push((id, caster));
        }
        self
    }
}
