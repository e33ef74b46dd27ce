#![allow(clippy::new_without_default)]
use std::sync::Arc;

use ordo::*;

#[derive(Default)]
struct Position([f32; 3]);

impl Component for Position {
    type Data = [f32; 3];

    fn init(&mut self, _: &mut InitContext<'_>, data: Self::Data) -> anyhow::Result<()> {
        self.0 = data;
        Ok(())
    }
}

#[derive(Default)]
struct Rotation([f32; 3]);

impl Component for Rotation {
    type Data = ();
}

#[derive(Default)]
struct Velocity([f32; 3]);

impl Component for Velocity {
    type Data = ();
}

pub struct Benchmark(Arc<Registry>);

impl Benchmark {
    pub fn new() -> Self {
        let mut kinds = RegistryBuilder::new();
        kinds.component::<Position>("position").unwrap();
        kinds.component::<Rotation>("rotation").unwrap();
        kinds
            .component::<Velocity>("velocity")
            .unwrap()
            .requires::<Position>();

        Self(Arc::new(kinds.finalize().unwrap()))
    }

    pub fn run(&mut self) {
        let mut level = Level::new(self.0.clone());
        let registry = self.0.clone();

        let position = registry.component_id::<Position>().unwrap();
        let rotation = registry.component_id::<Rotation>().unwrap();
        let velocity = registry.component_id::<Velocity>().unwrap();

        level
            .create_entities((0..10_000).map(|_| {
                EntityCreationInfo::new()
                    .with_properties(position, Box::new([1.0f32, 0.0, 0.0]))
                    .with(rotation)
                    .with(velocity)
            }))
            .unwrap();
    }
}
