use std::sync::Arc;

use ordo::*;

#[derive(Default)]
struct Node {
    parent: Option<EntityId>,
    children: Vec<EntityId>,
}

impl Component for Node {
    type Data = Option<EntityId>;

    fn init(&mut self, ctx: &mut InitContext<'_>, parent: Self::Data) -> anyhow::Result<()> {
        let id = ctx.entity();
        self.parent = parent;
        if let Some(parent) = parent.and_then(|v| ctx.get_mut::<Node>(v)) {
            parent.children.push(id);
        }

        Ok(())
    }
}

impl Hierarchy for Node {
    fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    fn children(&self) -> &[EntityId] {
        &self.children
    }
}

implements!(Node => HierarchyNode);

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

pub struct Benchmark(Arc<Registry>);

fn spawn(level: &mut Level, parent: Option<EntityId>, a: bool, b: bool) -> EntityId {
    let id = level.create_entity().unwrap();
    level.add_component_with::<Node>(id, parent).unwrap();

    if a {
        level.add_component::<A>(id).unwrap();
    }

    if b {
        level.add_component::<B>(id).unwrap();
    }

    id
}

impl Benchmark {
    pub fn new() -> Self {
        let mut kinds = RegistryBuilder::new();
        kinds
            .component::<Node>("node")
            .unwrap()
            .implements::<HierarchyNode>();
        kinds.component::<A>("a").unwrap();
        kinds
            .component::<B>("b")
            .unwrap()
            .requires_on_ancestor_or_self::<Node>();

        Self(Arc::new(kinds.finalize().unwrap()))
    }

    pub fn run(&mut self) {
        let mut level = Level::new(self.0.clone());
        let root = spawn(&mut level, None, false, false);

        for _ in 0..100 {
            let parent = spawn(&mut level, Some(root), false, false);

            for i in 0..300 {
                spawn(&mut level, Some(parent), i < 100, (100..200).contains(&i));
            }
        }

        level.destroy_entity_recursive(root).unwrap();
        assert!(level.entities().is_empty());
    }
}
