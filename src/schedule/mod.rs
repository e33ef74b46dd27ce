use core::sync::atomic::{AtomicUsize, Ordering};

use rayon::{Scope, ThreadPool};

use crate::BitField;

/// Shared state of a dispatch
struct Graph<'t, F> {
    /// Number of dependencies of each node which have not yet completed
    remaining: [AtomicUsize; BitField::CAPACITY],
    /// The nodes waiting on each node
    dependents: [BitField; BitField::CAPACITY],
    task: &'t F,
}

impl<'t, F> Graph<'t, F>
where
    F: Fn(usize) + Sync,
{
    fn spawn<'s>(&'s self, scope: &Scope<'s>, node: usize) {
        scope.spawn(move |scope| {
            (self.task)(node);

            for dependent in self.dependents[node] {
                // The last dependency to complete releases the dependent
                if self.remaining[dependent].fetch_sub(1, Ordering::AcqRel) == 1 {
                    self.spawn(scope, dependent);
                }
            }
        });
    }
}

/// Runs `task` once for every node of `nodes` on a worker pool.
///
/// A node only starts once every node of `nodes` in its `dependencies` has
/// completed. Nodes without a pending dependency between them run
/// concurrently. Blocks until every node has completed.
///
/// `dependencies` must describe an acyclic graph, otherwise the nodes on a
/// cycle are never run.
pub(crate) fn run_ordered<D, F>(pool: Option<&ThreadPool>, nodes: BitField, dependencies: D, task: F)
where
    D: Fn(usize) -> BitField,
    F: Fn(usize) + Sync,
{
    let mut graph = Graph {
        remaining: core::array::from_fn(|_| AtomicUsize::new(0)),
        dependents: [BitField::new(); BitField::CAPACITY],
        task: &task,
    };

    let mut roots = BitField::new();
    for node in nodes {
        let dependencies = dependencies(node) & nodes;
        debug_assert!(!dependencies.get(node), "Node {node} depends on itself");

        *graph.remaining[node].get_mut() = dependencies.count();
        for dependency in dependencies {
            graph.dependents[dependency].insert(node);
        }

        if dependencies.is_empty() {
            roots.insert(node);
        }
    }

    let graph = &graph;
    match pool {
        Some(pool) => pool.scope(|scope| roots.iter().for_each(|root| graph.spawn(scope, root))),
        None => rayon::scope(|scope| roots.iter().for_each(|root| graph.spawn(scope, root))),
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use itertools::Itertools;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    #[test]
    fn random_dags() {
        let mut rng = StdRng::seed_from_u64(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(4)
            .build()
            .unwrap();

        for round in 0..128 {
            let len = rng.gen_range(1..=BitField::CAPACITY);
            // Edges only point to lower indices
            let dependencies = (0..len)
                .map(|i| (0..i).filter(|_| rng.gen_bool(0.15)).collect::<BitField>())
                .collect_vec();

            // A random subset of participating nodes
            let nodes = (0..len).filter(|_| rng.gen_bool(0.8)).collect::<BitField>();

            let visited = Mutex::new(Vec::new());
            let pool = (round % 2 == 0).then_some(&pool);

            run_ordered(
                pool,
                nodes,
                |node| dependencies[node],
                |node| visited.lock().unwrap().push(node),
            );

            let visited = visited.into_inner().unwrap();
            assert_eq!(
                visited.iter().copied().sorted().collect_vec(),
                nodes.iter().collect_vec(),
                "Every node is visited exactly once"
            );

            for (i, &node) in visited.iter().enumerate() {
                for dependency in dependencies[node] & nodes {
                    assert!(
                        visited[..i].contains(&dependency),
                        "{node} visited before its dependency {dependency}"
                    );
                }
            }
        }
    }

    #[test]
    fn empty() {
        run_ordered(None, BitField::new(), |_| BitField::new(), |_| {
            panic!("No nodes to run")
        });
    }
}
