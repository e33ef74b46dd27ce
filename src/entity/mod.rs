mod collection;

use core::{fmt, num::NonZeroU32};

pub use collection::*;

use crate::BitField;

/// Identifies an entity within a [`Level`](crate::Level).
///
/// Ids are 1-based and assigned monotonically. An id is never handed out twice
/// by the same level.
#[derive(PartialOrd, Clone, Copy, PartialEq, Eq, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct EntityId(NonZeroU32);

impl EntityId {
    /// Construct an id from its raw value.
    ///
    /// Returns `None` for zero, which is never a valid id.
    pub fn from_raw(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(Self)
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

bitflags::bitflags! {
    /// Lifecycle state of an entity
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(
        feature = "serde",
        derive(serde::Serialize, serde::Deserialize),
        serde(transparent)
    )]
    pub struct EntityFlags: u8 {
        /// The entity has been created and may receive components
        const INITIALISED = 1;
    }
}

/// An entity: its identity and the mask of attached component kinds.
///
/// Component instances are owned by the
/// [`ComponentCollection`](crate::ComponentCollection), keyed by kind and
/// entity id.
#[derive(Clone, PartialEq, Eq)]
pub struct Entity {
    id: EntityId,
    mask: BitField,
    flags: EntityFlags,
}

impl Entity {
    pub(crate) fn new(id: EntityId) -> Self {
        Self {
            id,
            mask: BitField::new(),
            flags: EntityFlags::INITIALISED,
        }
    }

    #[inline]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The kinds of the components currently attached
    #[inline]
    pub fn mask(&self) -> BitField {
        self.mask
    }

    #[inline]
    pub fn flags(&self) -> EntityFlags {
        self.flags
    }

    pub fn is_alive(&self) -> bool {
        self.flags.contains(EntityFlags::INITIALISED)
    }

    pub(crate) fn mask_mut(&mut self) -> &mut BitField {
        &mut self.mask
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("mask", &self.mask)
            .field("flags", &self.flags)
            .finish()
    }
}
