mod collection;

use core::fmt;

pub use collection::SystemCollection;

use crate::{capability::AsAny, SystemContext};

/// Dense identifier of a registered system kind, in update order
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SystemId(u8);

impl SystemId {
    /// Constructs an id from a bit index
    ///
    /// # Panics
    /// If the index exceeds the capacity of a [`BitField`](crate::BitField)
    pub fn from_index(index: usize) -> Self {
        assert!(
            index < crate::BitField::CAPACITY,
            "System index {index} out of range"
        );
        Self(index as u8)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SystemId({})", self.0)
    }
}

/// A level wide singleton kind.
///
/// At most one instance of each system kind exists per level. Systems always
/// update before components within a frame.
pub trait System: Default + Send + Sync + 'static {
    fn init(&mut self, _ctx: &SystemContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn shutdown(&mut self) {}
}

/// Type erased [`System`] instance
pub trait SystemObject: AsAny + Send + Sync + 'static {
    fn type_name(&self) -> &'static str;

    #[doc(hidden)]
    fn init_dyn(&mut self, ctx: &SystemContext<'_>) -> anyhow::Result<()>;

    #[doc(hidden)]
    fn shutdown_dyn(&mut self);
}

impl<T: System> SystemObject for T {
    fn type_name(&self) -> &'static str {
        core::any::type_name::<T>()
    }

    fn init_dyn(&mut self, ctx: &SystemContext<'_>) -> anyhow::Result<()> {
        System::init(self, ctx)
    }

    fn shutdown_dyn(&mut self) {
        System::shutdown(self)
    }
}

impl fmt::Debug for dyn SystemObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}
