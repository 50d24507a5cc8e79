//! Evaluation order for default setters.
//!
//! Setters may read sibling fields that are themselves waiting for a
//! default. The pending setters form a graph with an edge from each field
//! to every pending field it reads; its strongly connected components come
//! out dependencies first, and any component that is not a single acyclic
//! node is a cycle.

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// One step of a default-setter plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DefaultStep {
    /// Call this field's setter; everything it reads is settled.
    Resolve(String),
    /// These setters read each other and cannot be called.
    Cycle(Vec<String>),
}

/// Order pending setters, given as `(field, reads)` in schema order.
pub(crate) fn plan<'a, I, R>(pending: I) -> Vec<DefaultStep>
where
    I: IntoIterator<Item = (&'a str, R)>,
    R: IntoIterator<Item = &'a str>,
{
    let mut graph: DiGraph<&'a str, ()> = DiGraph::new();
    let mut indices: HashMap<&'a str, NodeIndex> = HashMap::new();
    let mut reads: Vec<(NodeIndex, Vec<&'a str>)> = Vec::new();

    for (field, field_reads) in pending {
        let index = graph.add_node(field);
        indices.insert(field, index);
        reads.push((index, field_reads.into_iter().collect()));
    }

    for (index, field_reads) in &reads {
        for read in field_reads {
            if let Some(&target) = indices.get(read) {
                graph.update_edge(*index, target, ());
            }
        }
    }

    // Components arrive in reverse topological order of the read edges,
    // which puts every field after the fields it reads.
    kosaraju_scc(&graph)
        .into_iter()
        .map(|mut component| {
            let cyclic = component.len() > 1
                || component
                    .first()
                    .is_some_and(|&node| graph.contains_edge(node, node));
            if cyclic {
                component.sort();
                DefaultStep::Cycle(
                    component
                        .into_iter()
                        .map(|node| graph[node].to_string())
                        .collect(),
                )
            } else {
                DefaultStep::Resolve(graph[component[0]].to_string())
            }
        })
        .collect()
}
