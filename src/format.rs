use core::fmt::{self, Debug, Formatter};

use crate::{BitField, ComponentId, EntityCollection, Level, Registry};

/// Debug formats every entity of a level along with the names of its
/// components.
///
/// Used by the [`Debug`] implementation of [`Level`].
pub(crate) struct LevelFormatter<'a> {
    level: &'a Level,
}

impl<'a> LevelFormatter<'a> {
    pub(crate) fn new(level: &'a Level) -> Self {
        Self { level }
    }
}

impl<'a> Debug for LevelFormatter<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let registry = self.level.registry();

        f.debug_struct("Level")
            .field("clock", self.level.clock())
            .field("systems", self.level.systems())
            .field(
                "entities",
                &EntitiesFormatter {
                    registry,
                    entities: self.level.entities(),
                },
            )
            .finish()
    }
}

struct EntitiesFormatter<'a> {
    registry: &'a Registry,
    entities: &'a EntityCollection,
}

impl<'a> Debug for EntitiesFormatter<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();

        for entity in self.entities.iter() {
            map.entry(
                &entity.id(),
                &MaskFormatter {
                    registry: self.registry,
                    mask: entity.mask(),
                },
            );
        }

        map.finish()
    }
}

/// Formats a component mask by kind names
struct MaskFormatter<'a> {
    registry: &'a Registry,
    mask: BitField,
}

impl<'a> Debug for MaskFormatter<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(
                self.mask
                    .iter()
                    .map(|v| self.registry.component_name(ComponentId::from_index(v))),
            )
            .finish()
    }
}
