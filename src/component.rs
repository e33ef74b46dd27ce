use core::{any::Any, fmt};

use crate::{capability::AsAny, InitContext};

mod collection;

pub use collection::ComponentCollection;
pub(crate) use collection::KindStore;

/// Trait alias for a 'static + Send + Sync type which can be used as
/// declarative component properties
pub trait ComponentValue: Send + Sync + 'static {}
impl<T> ComponentValue for T where T: Send + Sync + 'static {}

/// An opaque, per kind construction property blob.
///
/// Downcast to [`Component::Data`] when the component is attached.
pub type Properties = Box<dyn Any + Send + Sync>;

/// Dense identifier of a registered component kind.
///
/// Ids are assigned when the registry is finalized, in update order: a kind
/// always has a higher id than every kind it depends on.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComponentId(u8);

impl ComponentId {
    /// Constructs an id from a bit index
    ///
    /// # Panics
    /// If the index exceeds the capacity of a [`BitField`](crate::BitField)
    pub fn from_index(index: usize) -> Self {
        assert!(
            index < crate::BitField::CAPACITY,
            "Component index {index} out of range"
        );
        Self(index as u8)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentId({})", self.0)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A component kind.
///
/// A default instance is constructed by the registry whenever the kind is
/// attached to an entity, after which [`Component::init`] receives the typed
/// declarative properties. The instance lives until it is detached or its
/// entity is destroyed, upon which [`Component::shutdown`] is called.
pub trait Component: Default + Send + Sync + 'static {
    /// Declarative properties parsed by the embedding application
    type Data: Default + ComponentValue;

    /// Called once when attached, before the component becomes visible to
    /// other components of the entity.
    fn init(&mut self, _ctx: &mut InitContext<'_>, _data: Self::Data) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once when detached.
    fn shutdown(&mut self) {}
}

/// Reason an erased initialization failed
#[doc(hidden)]
pub enum InitError {
    Properties { expected: &'static str },
    Failed(anyhow::Error),
}

/// Type erased [`Component`] instance
pub trait ComponentObject: AsAny + Send + Sync + 'static {
    /// The name of the concrete type
    fn type_name(&self) -> &'static str;

    #[doc(hidden)]
    fn init_dyn(
        &mut self,
        ctx: &mut InitContext<'_>,
        properties: Option<Properties>,
    ) -> Result<(), InitError>;

    #[doc(hidden)]
    fn shutdown_dyn(&mut self);
}

impl<T: Component> ComponentObject for T {
    fn type_name(&self) -> &'static str {
        core::any::type_name::<T>()
    }

    fn init_dyn(
        &mut self,
        ctx: &mut InitContext<'_>,
        properties: Option<Properties>,
    ) -> Result<(), InitError> {
        let data = match properties {
            Some(properties) => *properties
                .downcast::<T::Data>()
                .map_err(|_| InitError::Properties {
                    expected: core::any::type_name::<T::Data>(),
                })?,
            None => T::Data::default(),
        };

        Component::init(self, ctx, data).map_err(InitError::Failed)
    }

    fn shutdown_dyn(&mut self) {
        Component::shutdown(self)
    }
}

impl fmt::Debug for dyn ComponentObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Downcasts an erased instance to its concrete type
pub(crate) fn downcast_ref<T: 'static>(obj: &dyn ComponentObject) -> Option<&T> {
    obj.as_any().downcast_ref::<T>()
}

pub(crate) fn downcast_mut<T: 'static>(obj: &mut dyn ComponentObject) -> Option<&mut T> {
    obj.as_any_mut().downcast_mut::<T>()
}
