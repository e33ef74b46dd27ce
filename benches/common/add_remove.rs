use std::sync::Arc;

use ordo::*;

#[derive(Default)]
struct A(f32);

impl Component for A {
    type Data = ();
}

#[derive(Default)]
struct B(f32);

impl Component for B {
    type Data = ();
}

pub struct Benchmark(Level, Vec<EntityId>);

impl Benchmark {
    pub fn new() -> Self {
        let mut kinds = RegistryBuilder::new();
        kinds.component::<A>("a").unwrap();
        kinds.component::<B>("b").unwrap().requires::<A>();

        let mut level = Level::new(Arc::new(kinds.finalize().unwrap()));
        let a = level.registry().component_id::<A>().unwrap();

        let ids = level
            .create_entities((0..10_000).map(|_| EntityCreationInfo::new().with(a)))
            .unwrap();

        Self(level, ids)
    }

    pub fn run(&mut self) {
        for id in &self.1 {
            self.0.add_component::<B>(*id).unwrap();
        }

        for id in &self.1 {
            self.0.remove_component::<B>(*id).unwrap();
        }

        self.0.begin_frame();
    }
}
