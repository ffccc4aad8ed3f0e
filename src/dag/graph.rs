// src/dag/graph.rs

use std::collections::{HashMap, HashSet, VecDeque};

use crate::config::model::Blueprint;
use crate::types::TaskCode;

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    /// Insertion position (authored order).
    position: usize,
    /// Direct dependencies: tasks that must complete before this one starts.
    deps: Vec<TaskCode>,
    /// Direct dependents: tasks that list this one in their `depends_on`.
    dependents: Vec<TaskCode>,
}

/// Lightweight adjacency view of a task graph keyed by task code.
///
/// Acyclicity of blueprints is checked in `config::validate`; here we only
/// keep adjacency and insertion order for walking and diagnostics.
/// Dependencies that name codes outside the graph are kept on the node but
/// contribute no edge.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    nodes: HashMap<TaskCode, DagNode>,
    order: Vec<TaskCode>,
}

impl DagGraph {
    /// Build a graph from a blueprint, preserving its authored order.
    pub fn from_blueprint(bp: &Blueprint) -> Self {
        Self::from_edges(
            bp.definitions()
                .iter()
                .map(|def| (def.code.clone(), def.depends_on.clone())),
        )
    }

    /// Build a graph from `(code, depends_on)` pairs in insertion order.
    ///
    /// A repeated code keeps its first position and the last dependency list.
    pub fn from_edges(edges: impl IntoIterator<Item = (TaskCode, Vec<TaskCode>)>) -> Self {
        let mut nodes: HashMap<TaskCode, DagNode> = HashMap::new();
        let mut order = Vec::new();

        // First pass: create nodes with their dependency lists.
        for (code, deps) in edges {
            match nodes.get_mut(&code) {
                Some(node) => node.deps = deps,
                None => {
                    nodes.insert(
                        code.clone(),
                        DagNode {
                            position: order.len(),
                            deps,
                            dependents: Vec::new(),
                        },
                    );
                    order.push(code);
                }
            }
        }

        // Second pass: populate dependents based on deps.
        for code in &order {
            let deps = nodes.get(code).map(|n| n.deps.clone()).unwrap_or_default();
            for dep in deps {
                if let Some(dep_node) = nodes.get_mut(&dep) {
                    dep_node.dependents.push(code.clone());
                }
            }
        }

        Self { nodes, order }
    }

    /// First `(task, dependency)` pair where the dependency is inserted
    /// after the task, i.e. where insertion order is not topological.
    pub fn first_out_of_order(&self) -> Option<(TaskCode, TaskCode)> {
        for code in &self.order {
            let node = &self.nodes[code];
            for dep in &node.deps {
                if let Some(dep_node) = self.nodes.get(dep) {
                    if dep_node.position > node.position {
                        return Some((code.clone(), dep.clone()));
                    }
                }
            }
        }
        None
    }

    /// Topological order that stays as close to insertion order as possible
    /// (Kahn's algorithm, always taking the earliest-inserted ready node).
    /// `petgraph::visit::Topo` gives no such tie-break, and the recompute walk
    /// must follow authored order among independent tasks.
    ///
    /// Nodes that sit on a cycle cannot be ordered; they are appended at the
    /// end in insertion order so every node is still returned exactly once.
    pub fn topological_order(&self) -> Vec<TaskCode> {
        let mut in_degree: HashMap<&TaskCode, usize> = self
            .order
            .iter()
            .map(|code| {
                let deg = self.nodes[code]
                    .deps
                    .iter()
                    .filter(|d| self.nodes.contains_key(*d))
                    .count();
                (code, deg)
            })
            .collect();

        let mut ready: VecDeque<&TaskCode> = self
            .order
            .iter()
            .filter(|code| in_degree[code] == 0)
            .collect();

        let mut out = Vec::with_capacity(self.order.len());
        let mut emitted: HashSet<&TaskCode> = HashSet::new();

        while let Some(code) = pop_earliest(&mut ready, &self.nodes) {
            emitted.insert(code);
            out.push(code.clone());
            for dependent in &self.nodes[code].dependents {
                if let Some(deg) = in_degree.get_mut(dependent) {
                    *deg = deg.saturating_sub(1);
                    if *deg == 0 {
                        ready.push_back(dependent);
                    }
                }
            }
        }

        out.extend(
            self.order
                .iter()
                .filter(|code| !emitted.contains(code))
                .cloned(),
        );
        out
    }
}

fn pop_earliest<'a>(
    ready: &mut VecDeque<&'a TaskCode>,
    nodes: &HashMap<TaskCode, DagNode>,
) -> Option<&'a TaskCode> {
    let idx = ready
        .iter()
        .enumerate()
        .min_by_key(|(_, code)| nodes[**code].position)
        .map(|(i, _)| i)?;
    ready.remove(idx)
}
