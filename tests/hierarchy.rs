use std::sync::Arc;

use itertools::Itertools;
use ordo::*;
use pretty_assertions::assert_eq;

/// Links as persisted by a prefab
#[derive(Default, Debug, Clone)]
struct Links {
    parent: Option<EntityId>,
    children: Vec<EntityId>,
}

#[derive(Default, Debug)]
struct Node {
    links: Links,
}

impl Component for Node {
    type Data = Links;

    fn init(&mut self, ctx: &mut InitContext<'_>, links: Links) -> anyhow::Result<()> {
        let id = ctx.entity();
        self.links = links;

        if let Some(parent) = self.links.parent.and_then(|v| ctx.get_mut::<Node>(v)) {
            if !parent.links.children.contains(&id) {
                parent.links.children.push(id);
            }
        }

        Ok(())
    }
}

impl Hierarchy for Node {
    fn parent(&self) -> Option<EntityId> {
        self.links.parent
    }

    fn children(&self) -> &[EntityId] {
        &self.links.children
    }
}

implements!(Node => HierarchyNode);

#[derive(Default)]
struct Body;

impl Component for Body {
    type Data = ();
}

/// Must be attached below a body
#[derive(Default)]
struct Collider;

impl Component for Collider {
    type Data = ();
}

/// Must be attached to or below a body
#[derive(Default)]
struct Skin;

impl Component for Skin {
    type Data = ();
}

fn registry() -> Arc<Registry> {
    let mut kinds = RegistryBuilder::new();
    kinds
        .component::<Node>("node")
        .unwrap()
        .implements::<HierarchyNode>();
    kinds.component::<Body>("body").unwrap();
    kinds
        .component::<Collider>("collider")
        .unwrap()
        .after::<Node>()
        .requires_on_ancestor::<Body>();
    kinds
        .component::<Skin>("skin")
        .unwrap()
        .after::<Node>()
        .requires_on_ancestor_or_self::<Body>();

    Arc::new(kinds.finalize().unwrap())
}

fn spawn(level: &mut Level, parent: Option<EntityId>) -> EntityId {
    let id = level.create_entity().unwrap();
    level
        .add_component_with::<Node>(
            id,
            Links {
                parent,
                children: Vec::new(),
            },
        )
        .unwrap();
    id
}

#[test]
fn ancestor_requirements() {
    let mut level = Level::new(registry());

    let root = spawn(&mut level, None);
    let child = spawn(&mut level, Some(root));
    let grandchild = spawn(&mut level, Some(child));

    assert_eq!(level.scene().ancestors(grandchild).collect_vec(), [child, root]);
    assert_eq!(level.scene().children(root), [child]);

    let err = level.add_component::<Collider>(grandchild).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Unable to add \"collider\" to 3, missing ancestor components [body]"
    );

    assert!(matches!(
        level.add_component::<Skin>(root),
        Err(Error::MissingDependencies { ancestors, .. }) if ancestors.as_slice() == ["body"]
    ));

    level.add_component::<Body>(root).unwrap();
    level.add_component::<Collider>(grandchild).unwrap();
    level.add_component::<Skin>(child).unwrap();

    // The body is not an ancestor of itself
    assert!(matches!(
        level.add_component::<Collider>(root),
        Err(Error::MissingDependencies { .. })
    ));
    level.add_component::<Skin>(root).unwrap();

    let err = level.remove_component::<Body>(root).unwrap_err();
    assert!(
        matches!(&err, Error::StillRequired { dependents, .. } if dependents.as_slice() == ["skin"]),
        "{err}"
    );

    level.remove_component::<Skin>(root).unwrap();
    level.remove_component::<Body>(root).unwrap();
}

#[test]
fn provided_by_ancestor() {
    let mut level = Level::new(registry());

    let root = spawn(&mut level, None);
    let child = spawn(&mut level, Some(root));

    level.add_component::<Body>(root).unwrap();
    level.add_component::<Body>(child).unwrap();
    level.add_component::<Skin>(child).unwrap();

    // Still satisfied through the root
    level.remove_component::<Body>(child).unwrap();
    assert!(level.has::<Skin>(child));
}

#[test]
fn batch_with_parents() {
    let registry = registry();
    let node = registry.component_id::<Node>().unwrap();
    let body = registry.component_id::<Body>().unwrap();
    let collider = registry.component_id::<Collider>().unwrap();

    let mut level = Level::new(registry);

    let root = EntityId::from_raw(10).unwrap();
    let child = EntityId::from_raw(11).unwrap();

    // The child is listed before its parent
    level
        .create_entities([
            EntityCreationInfo::at(child)
                .with_properties(
                    node,
                    Box::new(Links {
                        parent: Some(root),
                        children: Vec::new(),
                    }),
                )
                .with(collider),
            EntityCreationInfo::at(root)
                .with_properties(
                    node,
                    Box::new(Links {
                        parent: None,
                        children: vec![child],
                    }),
                )
                .with(body),
        ])
        .unwrap();

    assert!(level.has::<Collider>(child));
    assert_eq!(level.scene().subtree(root).as_slice(), [root, child]);

    level.destroy_entity_recursive(root).unwrap();
    assert!(level.entities().is_empty());
}

#[test]
fn destroy() {
    let mut level = Level::new(registry());

    let root = spawn(&mut level, None);
    let a = spawn(&mut level, Some(root));
    let b = spawn(&mut level, Some(a));
    let c = spawn(&mut level, Some(root));
    let other = spawn(&mut level, None);

    level.destroy_entity(c).unwrap();
    assert_eq!(level.entities().len(), 4);

    level.destroy_entities(&[a, root]).unwrap();
    assert_eq!(level.entities().ids().collect_vec(), [other]);
    assert!(level.entity(b).is_none());

    assert!(matches!(
        level.destroy_entity_recursive(root),
        Err(Error::NoSuchEntity(v)) if v == root
    ));
}

#[test]
fn orphans() {
    let mut level = Level::new(registry());

    let root = spawn(&mut level, None);
    let child = spawn(&mut level, Some(root));

    level.destroy_entity(root).unwrap();

    // The parent link dangles, which ends the chain
    assert_eq!(level.scene().parent(child), Some(root));
    assert_eq!(level.scene().ancestors(child).count(), 0);
}

#[test]
fn cyclic_hierarchy_terminates() {
    let mut level = Level::new(registry());

    let a = level.create_entity().unwrap();
    let b = level.create_entity().unwrap();

    level
        .add_component_with::<Node>(
            a,
            Links {
                parent: Some(b),
                children: Vec::new(),
            },
        )
        .unwrap();
    level
        .add_component_with::<Node>(
            b,
            Links {
                parent: Some(a),
                children: Vec::new(),
            },
        )
        .unwrap();

    assert_eq!(level.scene().ancestors(a).collect_vec(), [b, a]);
    assert_eq!(level.scene().subtree(a).as_slice(), [a, b]);

    level.destroy_entity_recursive(a).unwrap();
    assert!(level.entities().is_empty());
}

#[test]
fn deep_hierarchy() {
    let mut level = Level::new(registry());

    let root = spawn(&mut level, None);
    let leaf = (0..50_000).fold(root, |parent, _| spawn(&mut level, Some(parent)));

    let subtree = level.scene().subtree(root);
    assert_eq!(subtree.len(), 50_001);
    assert_eq!(subtree.first(), Some(&root));
    assert_eq!(subtree.last(), Some(&leaf));

    level.destroy_entity_recursive(root).unwrap();
    assert!(level.entities().is_empty());
}
