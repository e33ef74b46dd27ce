use std::sync::Arc;

use ordo::*;

pub trait Swap {
    fn swap(&mut self);
}

pub struct Swappable;

impl Capability for Swappable {
    type Object = dyn Swap;
}

macro_rules! swapping {
    ($($name: ident),*) => {
        $(
            #[derive(Default)]
            struct $name([f32; 2]);

            impl Component for $name {
                type Data = ();
            }

            impl Swap for $name {
                fn swap(&mut self) {
                    for _ in 0..64 {
                        self.0.swap(0, 1);
                        self.0[0] = (self.0[0] + 1.0).sqrt();
                    }
                }
            }

            implements!($name => Swappable);
        )*
    };
}

swapping!(Ab, Cd, Ce, Ef);

pub struct Benchmark(Level);

impl Benchmark {
    pub fn new() -> Self {
        let mut kinds = RegistryBuilder::new();
        kinds.component::<Ab>("ab").unwrap().implements::<Swappable>();
        kinds.component::<Cd>("cd").unwrap().implements::<Swappable>();
        kinds
            .component::<Ce>("ce")
            .unwrap()
            .after::<Cd>()
            .implements::<Swappable>();
        kinds.component::<Ef>("ef").unwrap().implements::<Swappable>();

        let registry = Arc::new(kinds.finalize().unwrap());
        let mask = ["ab", "cd", "ce", "ef"]
            .iter()
            .map(|v| registry.component_id_by_name(v).unwrap().index())
            .collect::<BitField>();

        let mut level = Level::new(registry);
        level
            .create_entities((0..10_000).map(|_| EntityCreationInfo {
                components: mask,
                ..Default::default()
            }))
            .unwrap();
        level.begin_frame();

        Self(level)
    }

    pub fn run(&mut self) {
        self.0.for_each_component_par::<Swappable>(|_, v| v.swap());
    }

    pub fn run_seq(&mut self) {
        self.0.for_each_component::<Swappable>(|_, v| v.swap());
    }
}
