use alloc::collections::BTreeMap;
use core::any::TypeId;

use itertools::Itertools;

use super::{
    builder::{KindDecl, TypeRef},
    CapabilityInfo, KindInfo, Registry, RegistryBuilder,
};
use crate::{
    error::Result, BitField, ComponentId, Editable, Error, SystemId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    Visiting,
    Done,
}

/// Dependency edges of one namespace in provisional ids
struct Graph<'a> {
    names: Vec<&'a str>,
    /// Direct ordering dependencies, including the ones injected by `before`
    depends: Vec<BitField>,
    /// Direct hard dependencies
    requires: Vec<BitField>,
}

/// The result of sorting a namespace
struct Sorted {
    /// Provisional ids in update order
    order: Vec<usize>,
    /// `map[provisional] = final`
    map: Vec<usize>,
    depends: Vec<BitField>,
    requires: Vec<BitField>,
}

impl<'a> Graph<'a> {
    fn new<O: ?Sized>(
        decls: &'a [KindDecl<O>],
        ids: &BTreeMap<TypeId, usize>,
        depends_of: impl Fn(&'a KindDecl<O>) -> Vec<&'a TypeRef>,
    ) -> Result<Self> {
        let mut depends = vec![BitField::new(); decls.len()];
        let mut requires = vec![BitField::new(); decls.len()];

        for (index, decl) in decls.iter().enumerate() {
            requires[index] = resolve(ids, &decl.requires)?;
            depends[index] |= requires[index];
            depends[index] |= resolve(ids, depends_of(decl))?;

            // `K.before(X)` is `X.after(K)`
            for dependent in resolve(ids, &decl.before)? {
                depends[dependent].insert(index);
            }
        }

        Ok(Self {
            names: decls.iter().map(|v| v.name.as_str()).collect(),
            depends,
            requires,
        })
    }

    /// Depth first topological sort which closes the dependency masks
    /// transitively as it unwinds.
    fn sort(&self) -> Result<Sorted> {
        fn visit(
            graph: &Graph,
            index: usize,
            state: &mut [Visit],
            sorted: &mut Sorted,
        ) -> Result<()> {
            if state[index] == Visit::Done {
                return Ok(());
            }

            state[index] = Visit::Visiting;

            let mut depends = graph.depends[index];
            let mut requires = graph.requires[index];

            // Make sure every dependency is placed first
            for dependency in graph.depends[index] {
                if state[dependency] == Visit::Visiting {
                    return Err(Error::CircularDependency {
                        kind: graph.names[index].into(),
                        dependency: graph.names[dependency].into(),
                    });
                }

                visit(graph, dependency, state, sorted)?;

                depends |= sorted.depends[dependency];
                if graph.requires[index].get(dependency) {
                    requires |= sorted.requires[dependency];
                }
            }

            state[index] = Visit::Done;
            sorted.depends[index] = depends;
            sorted.requires[index] = requires;
            sorted.map[index] = sorted.order.len();
            sorted.order.push(index);

            Ok(())
        }

        let len = self.names.len();
        let mut sorted = Sorted {
            order: Vec::with_capacity(len),
            map: vec![0; len],
            depends: vec![BitField::new(); len],
            requires: vec![BitField::new(); len],
        };

        let mut state = vec![Visit::Unvisited; len];
        for index in 0..len {
            visit(self, index, &mut state, &mut sorted)?;
        }

        Ok(sorted)
    }
}

fn resolve<'a>(
    ids: &BTreeMap<TypeId, usize>,
    refs: impl IntoIterator<Item = &'a TypeRef>,
) -> Result<BitField> {
    refs.into_iter()
        .map(|v| {
            ids.get(&v.id)
                .copied()
                .ok_or_else(|| Error::UnknownType(v.name.into()))
        })
        .collect()
}

fn type_ids<O: ?Sized>(decls: &[KindDecl<O>]) -> BTreeMap<TypeId, usize> {
    decls
        .iter()
        .enumerate()
        .map(|(i, v)| (v.ty.id, i))
        .collect()
}

/// Turns the declarations of a [`RegistryBuilder`] into a [`Registry`].
///
/// Each namespace is sorted independently. Hard and ordering dependencies are
/// transitively closed, editable components are validated and every mask is
/// rewritten into the final, sorted id space.
#[tracing::instrument(level = "debug", skip_all, fields(
    components = builder.components.len(),
    systems = builder.systems.len()
))]
pub(super) fn finalize(builder: RegistryBuilder) -> Result<Registry> {
    let RegistryBuilder {
        components,
        systems,
        capabilities,
        capability_ids,
    } = builder;

    let component_ids = type_ids(&components);
    let system_ids = type_ids(&systems);

    let component_graph = Graph::new(&components, &component_ids, |decl| {
        decl.after
            .iter()
            .chain(&decl.requires_on_ancestor)
            .chain(&decl.requires_on_ancestor_or_self)
            .collect()
    })?;
    let system_graph = Graph::new(&systems, &system_ids, |decl| decl.after.iter().collect())?;

    let sorted_components = component_graph.sort()?;
    let sorted_systems = system_graph.sort()?;

    // Editable components may only depend on editable components, including
    // kinds which order themselves before them
    if let Some(&editable) = capability_ids.get(&TypeId::of::<Editable>()) {
        for (index, decl) in components.iter().enumerate() {
            if !decl.implements(editable) {
                continue;
            }

            for dependency in component_graph.depends[index] {
                if !components[dependency].implements(editable) {
                    return Err(Error::NotEditable {
                        kind: decl.name.clone(),
                        dependency: components[dependency].name.clone(),
                    });
                }
            }
        }
    }

    // Hard system requirements, in provisional system ids
    let direct_required_systems = components
        .iter()
        .map(|v| resolve(&system_ids, &v.requires_systems))
        .collect::<Result<Vec<_>>>()?;

    let component_map = &sorted_components.map;
    let system_map = &sorted_systems.map;

    let close_systems = |systems: BitField| {
        systems
            .iter()
            .fold(systems, |acc, v| acc | sorted_systems.requires[v])
            .remap(system_map)
    };

    let mut capability_info = capabilities
        .into_iter()
        .map(|v| CapabilityInfo {
            name: v.name,
            components: BitField::new(),
            systems: BitField::new(),
        })
        .collect_vec();

    let mut components_requiring_system = vec![BitField::new(); systems.len()];

    // Move the declarations into final order
    let mut component_decls = components.into_iter().map(Some).collect_vec();
    let mut component_infos = Vec::with_capacity(component_decls.len());

    for (new, &old) in sorted_components.order.iter().enumerate() {
        let Some(decl) = component_decls[old].take() else {
            unreachable!("Component {old} sorted twice")
        };

        let required_components = sorted_components.requires[old].remap(component_map);
        let required_systems = sorted_components.requires[old]
            .iter()
            .fold(direct_required_systems[old], |acc, v| {
                acc | direct_required_systems[v]
            });
        let required_systems = close_systems(required_systems);

        for system in required_systems {
            components_requiring_system[system].insert(new);
        }

        for (capability, _) in &decl.capabilities {
            capability_info[capability.index()].components.insert(new);
        }

        component_infos.push(KindInfo {
            type_name: decl.type_name,
            required_components,
            required_systems,
            depends_on: sorted_components.depends[old].remap(component_map),
            dependents: BitField::new(),
            requires_on_ancestor: resolve(&component_ids, &decl.requires_on_ancestor)?
                .remap(component_map),
            requires_on_ancestor_or_self: resolve(
                &component_ids,
                &decl.requires_on_ancestor_or_self,
            )?
            .remap(component_map),
            capabilities: decl.capabilities.into_iter().collect(),
            construct: decl.construct,
            name: decl.name,
        });
    }

    let mut system_decls = systems.into_iter().map(Some).collect_vec();
    let mut system_infos = Vec::with_capacity(system_decls.len());

    for (new, &old) in sorted_systems.order.iter().enumerate() {
        let Some(decl) = system_decls[old].take() else {
            unreachable!("System {old} sorted twice")
        };

        for (capability, _) in &decl.capabilities {
            capability_info[capability.index()].systems.insert(new);
        }

        system_infos.push(KindInfo {
            type_name: decl.type_name,
            required_components: BitField::new(),
            required_systems: sorted_systems.requires[old].remap(system_map),
            depends_on: sorted_systems.depends[old].remap(system_map),
            dependents: BitField::new(),
            requires_on_ancestor: BitField::new(),
            requires_on_ancestor_or_self: BitField::new(),
            capabilities: decl.capabilities.into_iter().collect(),
            construct: decl.construct,
            name: decl.name,
        });
    }

    link_dependents(&mut component_infos);
    link_dependents(&mut system_infos);

    tracing::debug!(
        components = ?component_infos.iter().map(|v| &v.name).collect_vec(),
        systems = ?system_infos.iter().map(|v| &v.name).collect_vec(),
        "finalized"
    );

    Ok(Registry {
        component_ids: component_ids
            .into_iter()
            .map(|(ty, old)| (ty, ComponentId::from_index(component_map[old])))
            .collect(),
        system_ids: system_ids
            .into_iter()
            .map(|(ty, old)| (ty, SystemId::from_index(system_map[old])))
            .collect(),
        components: component_infos,
        systems: system_infos,
        capabilities: capability_info,
        capability_ids,
        components_requiring_system,
    })
}

/// Fills in the reverse edges of `depends_on`
fn link_dependents<O: ?Sized>(kinds: &mut [KindInfo<O>]) {
    for index in 0..kinds.len() {
        for dependency in kinds[index].depends_on {
            kinds[dependency].dependents.insert(index);
        }
    }
}

#[cfg(test)]
mod test {
    use itertools::Itertools;
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;
    use crate::{implements, Component, Registry, System};

    macro_rules! components {
        ($($name: ident),*) => {
            $(
                #[derive(Default)]
                struct $name;
                impl Component for $name {
                    type Data = ();
                }
            )*
        };
    }

    components!(A, B, C, D, E);

    implements!(A => Editable);
    implements!(B => Editable);
    implements!(C => Editable);

    #[derive(Default)]
    struct Physics;
    impl System for Physics {}

    #[derive(Default)]
    struct Audio;
    impl System for Audio {}

    fn names(registry: &Registry) -> Vec<&str> {
        registry.components().map(|(_, v)| v.name()).collect_vec()
    }

    #[test]
    fn order_and_closure() {
        let mut kinds = Registry::builder();
        // Registered in reverse so the sort has to move things around
        kinds.component::<C>("c").unwrap().requires::<B>();
        kinds.component::<B>("b").unwrap().requires::<A>();
        kinds.component::<A>("a").unwrap().after::<D>();
        kinds.component::<D>("d").unwrap();
        kinds.component::<E>("e").unwrap().before::<D>();

        let registry = kinds.finalize().unwrap();
        assert_eq!(names(&registry), ["e", "d", "a", "b", "c"]);

        let id = |name: &str| registry.component_id_by_name(name).unwrap();
        let mask = |names: &[&str]| names.iter().map(|&v| id(v).index()).collect::<BitField>();

        let c = registry.component(id("c"));
        assert_eq!(c.required_components(), mask(&["a", "b"]));
        assert_eq!(c.depends_on(), mask(&["a", "b", "d", "e"]));
        assert!(c.depends_on().contains_all(c.required_components()));

        let d = registry.component(id("d"));
        assert_eq!(d.dependents(), mask(&["a", "b", "c"]));
        assert_eq!(d.depends_on(), mask(&["e"]));

        assert_eq!(registry.component_id::<A>().unwrap(), id("a"));
        assert_eq!(registry.component(id("a")).type_name(), "A");
        assert!(registry.component_id_by_name("f").is_none());
    }

    #[test]
    fn cycles() {
        let mut kinds = Registry::builder();
        kinds.component::<A>("a").unwrap().after::<C>();
        kinds.component::<B>("b").unwrap().requires::<A>();
        kinds.component::<C>("c").unwrap().requires::<B>();

        let err = kinds.finalize().unwrap_err();
        assert!(
            matches!(&err, Error::CircularDependency { kind, dependency } if kind == "b" && dependency == "a"),
            "{err}"
        );

        let mut kinds = Registry::builder();
        kinds.system::<Physics>("physics").unwrap().after::<Physics>();
        assert!(matches!(
            kinds.finalize(),
            Err(Error::CircularDependency { kind, dependency }) if kind == dependency
        ));
    }

    #[test]
    fn unknown_dependency() {
        let mut kinds = Registry::builder();
        kinds.component::<A>("a").unwrap().requires::<B>();

        assert!(matches!(kinds.finalize(), Err(Error::UnknownType(name)) if name.ends_with("B")));
    }

    #[test]
    fn system_requirements() {
        let mut kinds = Registry::builder();
        kinds.system::<Audio>("audio").unwrap().requires::<Physics>();
        kinds.system::<Physics>("physics").unwrap();
        kinds.component::<A>("a").unwrap().requires_system::<Audio>();
        kinds.component::<B>("b").unwrap().requires::<A>();

        let registry = kinds.finalize().unwrap();

        let physics = registry.system_id::<Physics>().unwrap();
        let audio = registry.system_id_by_name("audio").unwrap();
        assert!(physics < audio);

        let b = registry.component(registry.component_id::<B>().unwrap());
        assert_eq!(
            b.required_systems(),
            BitField::from_iter([physics.index(), audio.index()])
        );

        assert_eq!(
            registry.components_requiring_system(physics).count(),
            2
        );
        assert!(matches!(
            registry.system_id_by_name("render"),
            Err(Error::UnknownKind(_))
        ));
    }

    #[test]
    fn editable() {
        let mut kinds = Registry::builder();
        kinds.component::<A>("a").unwrap().implements::<Editable>();
        kinds
            .component::<B>("b")
            .unwrap()
            .implements::<Editable>()
            .requires::<A>();
        kinds
            .component::<C>("c")
            .unwrap()
            .implements::<Editable>()
            .before::<B>();

        let registry = kinds.finalize().unwrap();
        assert_eq!(registry.components_implementing::<Editable>().count(), 3);

        // Ordering a plain kind before an editable one is a dependency too
        let mut kinds = Registry::builder();
        kinds.component::<A>("a").unwrap().implements::<Editable>();
        kinds.component::<C>("c").unwrap().before::<A>();

        assert!(matches!(
            kinds.finalize(),
            Err(Error::NotEditable { kind, dependency }) if kind == "a" && dependency == "c"
        ));

        let mut kinds = Registry::builder();
        kinds.component::<C>("c").unwrap();
        kinds
            .component::<A>("a")
            .unwrap()
            .implements::<Editable>()
            .after::<C>();

        assert!(matches!(
            kinds.finalize(),
            Err(Error::NotEditable { kind, dependency }) if kind == "a" && dependency == "c"
        ));
    }

    #[test]
    fn undeclared_capability() {
        let mut kinds = Registry::builder();
        kinds.component::<A>("a").unwrap();
        let registry = kinds.finalize().unwrap();

        assert!(registry.components_implementing::<Editable>().is_empty());
        assert!(registry.systems_implementing::<Editable>().is_empty());
        assert!(registry.capability_id::<Editable>().is_none());
    }

    /// A random acyclic graph over `len` kinds. Edges only point to kinds
    /// of lower rank in a random permutation so provisional ids are not
    /// already sorted.
    fn random_graph(rng: &mut StdRng, len: usize) -> (Vec<String>, Vec<BitField>, Vec<BitField>) {
        let mut rank = (0..len).collect_vec();
        for i in (1..len).rev() {
            rank.swap(i, rng.gen_range(0..=i));
        }

        let mut depends = vec![BitField::new(); len];
        let mut requires = vec![BitField::new(); len];
        for i in 0..len {
            for j in 0..len {
                if rank[j] < rank[i] && rng.gen_bool(0.1) {
                    depends[i].insert(j);
                    if rng.gen_bool(0.5) {
                        requires[i].insert(j);
                    }
                }
            }
        }

        ((0..len).map(|v| v.to_string()).collect(), depends, requires)
    }

    #[test]
    fn random_dags_sort_topologically() {
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..64 {
            let len = rng.gen_range(1..=BitField::CAPACITY);
            let (names, depends, requires) = random_graph(&mut rng, len);
            let graph = Graph {
                names: names.iter().map(|v| v.as_str()).collect(),
                depends: depends.clone(),
                requires: requires.clone(),
            };

            let sorted = graph.sort().unwrap();
            assert_eq!(sorted.order.iter().copied().sorted().collect_vec(), (0..len).collect_vec());

            for kind in 0..len {
                let closed = sorted.depends[kind];
                assert!(closed.contains_all(depends[kind]));
                assert!(closed.contains_all(sorted.requires[kind]));
                assert!(sorted.requires[kind].contains_all(requires[kind]));

                for dep in closed {
                    assert!(sorted.map[dep] < sorted.map[kind]);
                    assert!(closed.contains_all(sorted.depends[dep]));
                }

                for dep in sorted.requires[kind] {
                    assert!(sorted.requires[kind].contains_all(sorted.requires[dep]));
                }
            }
        }
    }

    #[test]
    fn random_cycles_are_rejected() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..64 {
            let len = rng.gen_range(2..=BitField::CAPACITY);
            let (names, mut depends, requires) = random_graph(&mut rng, len);

            // Close a loop through a chain of at least two kinds
            let a = rng.gen_range(0..len);
            let b = (a + rng.gen_range(1..len)) % len;
            depends[a].insert(b);
            depends[b].insert(a);

            let graph = Graph {
                names: names.iter().map(|v| v.as_str()).collect(),
                depends,
                requires,
            };

            assert!(matches!(
                graph.sort(),
                Err(Error::CircularDependency { .. })
            ));
        }
    }
}
