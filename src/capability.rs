use core::{any::Any, fmt};

use crate::{ComponentId, EntityId, UpdateContext};

/// A cross cutting contract which component and system kinds may implement.
///
/// A capability is a marker type naming the trait object through which its
/// behaviour is invoked. The registry indexes which kinds implement each
/// capability when it is finalized, so dispatch never inspects instances.
///
/// ```rust
/// use ordo::{Capability, implements};
///
/// pub trait Draw {
///     fn draw(&self) -> String;
/// }
///
/// pub struct Drawable;
///
/// impl Capability for Drawable {
///     type Object = dyn Draw;
/// }
///
/// #[derive(Default)]
/// struct Sprite;
///
/// impl Draw for Sprite {
///     fn draw(&self) -> String {
///         "sprite".into()
///     }
/// }
///
/// implements!(Sprite => Drawable);
/// ```
pub trait Capability: 'static {
    /// The object through which the capability is invoked
    type Object: ?Sized + 'static;

    /// Human friendly name used in diagnostics
    fn name() -> String {
        tynm::type_name::<Self>()
    }
}

/// Declares that a kind type can be viewed as the object of capability `C`.
///
/// Usually implemented through [`implements!`](crate::implements).
pub trait Implements<C: Capability> {
    /// Cast to the capability object
    fn cast(&self) -> &C::Object;
    /// Cast to the capability object mutably
    fn cast_mut(&mut self) -> &mut C::Object;
}

/// Implements [`Implements`] for one or more capabilities of a type.
#[macro_export]
macro_rules! implements {
    ($ty: ty => $($capability: ty),+ $(,)?) => {
        $(
            impl $crate::Implements<$capability> for $ty {
                fn cast(&self) -> &<$capability as $crate::Capability>::Object {
                    self
                }

                fn cast_mut(&mut self) -> &mut <$capability as $crate::Capability>::Object {
                    self
                }
            }
        )+
    };
}

/// Identifies a capability within a registry.
///
/// Assigned the first time a capability is mentioned during registration.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CapabilityId(pub(crate) u16);

impl CapabilityId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CapabilityId({})", self.0)
    }
}

/// Casts an erased kind instance `O` to the object of capability `C`.
///
/// One caster is stored per (kind, capability) pair. Instances which are not
/// of the kind's type yield `None`.
pub(crate) struct Caster<O: ?Sized + 'static, C: Capability> {
    pub(crate) get: for<'a> fn(&'a O) -> Option<&'a C::Object>,
    pub(crate) get_mut: for<'a> fn(&'a mut O) -> Option<&'a mut C::Object>,
}

impl<O: ?Sized + 'static, C: Capability> Caster<O, C> {
    pub(crate) fn new<T>() -> Self
    where
        T: Implements<C> + 'static,
        O: AsAny,
    {
        Self {
            get: cast_ref::<T, O, C>,
            get_mut: cast_mut::<T, O, C>,
        }
    }
}

/// Erased instances which can report their concrete type
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn cast_ref<T, O, C>(obj: &O) -> Option<&C::Object>
where
    T: Implements<C> + 'static,
    O: ?Sized + AsAny,
    C: Capability,
{
    AsAny::as_any(obj).downcast_ref::<T>().map(<T as Implements<C>>::cast)
}

fn cast_mut<T, O, C>(obj: &mut O) -> Option<&mut C::Object>
where
    T: Implements<C> + 'static,
    O: ?Sized + AsAny,
    C: Capability,
{
    AsAny::as_any_mut(obj).downcast_mut::<T>().map(<T as Implements<C>>::cast_mut)
}

/// Per frame update, dispatched in dependency order
pub trait Update {
    fn update(&mut self, ctx: &mut UpdateContext<'_>);
}

/// Capability for kinds updated by [`Level::update`](crate::Level::update)
pub struct Updatable;

impl Capability for Updatable {
    type Object = dyn Update;
}

/// Marker capability for kinds exposed to editing tools.
///
/// Editable components may only depend on other editable components.
pub struct Editable;

impl Capability for Editable {
    type Object = dyn Any;
}

/// Notified when other components are attached to or detached from the same
/// entity.
pub trait ComponentListener {
    fn component_added(&mut self, _entity: EntityId, _kind: ComponentId) {}
    fn component_removed(&mut self, _entity: EntityId, _kind: ComponentId) {}
}

/// Capability for [`ComponentListener`]
pub struct Listener;

impl Capability for Listener {
    type Object = dyn ComponentListener;
}

/// Parent and child links provided by a hierarchy component.
///
/// The level does not maintain a hierarchy itself. Ancestor requirements and
/// recursive destruction query the component implementing this on each entity.
pub trait Hierarchy {
    fn parent(&self) -> Option<EntityId>;
    fn children(&self) -> &[EntityId];
}

/// Capability for [`Hierarchy`]
pub struct HierarchyNode;

impl Capability for HierarchyNode {
    type Object = dyn Hierarchy;
}
