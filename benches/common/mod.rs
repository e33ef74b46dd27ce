#![allow(clippy::new_without_default)]

pub mod add_remove;
pub mod despawn_children;
pub mod schedule;
pub mod simple_insert;
