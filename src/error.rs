use itertools::Itertools;
use smallvec::SmallVec;
use thiserror::Error;

use crate::EntityId;

/// A list of kind names reported by an error
pub type KindNames = SmallVec<[String; 4]>;

#[derive(Error, Debug)]
pub enum Error {
    // Configuration
    #[error("The type {0} is already registered")]
    DuplicateType(String),
    #[error("A kind named {0:?} is already registered")]
    DuplicateKind(String),
    #[error("The type {0} is not registered")]
    UnknownType(String),
    #[error("No kind named {0:?} is registered")]
    UnknownKind(String),
    #[error("Unable to register {name:?}, at most {max} kinds are supported per namespace")]
    TooManyKinds { name: String, max: usize },
    #[error("Circular dependency between {kind:?} and {dependency:?}")]
    CircularDependency { kind: String, dependency: String },
    #[error("The editable kind {kind:?} depends on {dependency:?} which is not editable")]
    NotEditable { kind: String, dependency: String },

    // Attach time
    #[error("The entity {0} does not exist or has been destroyed")]
    NoSuchEntity(EntityId),
    #[error("The entity id {0} is already in use")]
    EntityOccupied(EntityId),
    #[error("Entity ids are exhausted")]
    EntityIdsExhausted,
    #[error("The entity {entity} already has the component {kind:?}")]
    DuplicateComponent { entity: EntityId, kind: String },
    #[error("{}", format_missing(.entity, .kind, .systems, .components, .ancestors))]
    MissingDependencies {
        entity: EntityId,
        kind: String,
        systems: KindNames,
        components: KindNames,
        ancestors: KindNames,
    },
    #[error("Unable to remove {kind:?} from {entity}, it is still required by {}", .dependents.iter().format(", "))]
    StillRequired {
        entity: EntityId,
        kind: String,
        dependents: KindNames,
    },
    #[error("The system {0:?} has already been added to the level")]
    DuplicateSystem(String),
    #[error("Unable to add the system {kind:?}, missing the systems {}", .missing.iter().format(", "))]
    MissingSystems { kind: String, missing: KindNames },
    #[error("Unable to remove the system {kind:?}, it is still required by {}", .dependents.iter().format(", "))]
    SystemStillRequired { kind: String, dependents: KindNames },
    #[error("The properties supplied for {kind:?} are not of the type {expected}")]
    InvalidProperties { kind: String, expected: String },
    #[error("Failed to initialise {kind:?}{}: {cause:#}", .entity.map(|v| format!(" on {v}")).unwrap_or_default())]
    Init {
        kind: String,
        entity: Option<EntityId>,
        cause: anyhow::Error,
    },

    #[error("Failed to build the worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

fn format_missing(
    entity: &EntityId,
    kind: &str,
    systems: &[String],
    components: &[String],
    ancestors: &[String],
) -> String {
    let mut missing = Vec::new();
    if !systems.is_empty() {
        missing.push(format!("systems [{}]", systems.iter().format(", ")));
    }
    if !components.is_empty() {
        missing.push(format!("components [{}]", components.iter().format(", ")));
    }
    if !ancestors.is_empty() {
        missing.push(format!(
            "ancestor components [{}]",
            ancestors.iter().format(", ")
        ));
    }

    format!(
        "Unable to add {kind:?} to {entity}, missing {}",
        missing.iter().format(" and ")
    )
}

/// Result alias for [crate::error::Error]
pub type Result<T> = core::result::Result<T, Error>;
