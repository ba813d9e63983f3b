//! Step graph, cycle detection, and wave computation.
//!
//! Uses `petgraph` to model step dependencies as a directed graph whose node
//! weights are declaration indices. Waves are computed with Kahn's algorithm;
//! every ordering decision inside a wave goes through [`ScheduleKey`], so no
//! two steps ever compare equal and nothing depends on hash iteration order.
//!
//! Waves are internal. They never appear in the public result.

use std::cmp::Reverse;
use std::collections::HashMap;

use cadence_types::error::WorkflowError;
use cadence_types::workflow::Step;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

/// One topological layer: steps whose dependencies all sit in earlier waves.
pub(crate) type Wave<'a> = Vec<&'a Step>;

// ---------------------------------------------------------------------------
// Tie-break hierarchy
// ---------------------------------------------------------------------------

/// Total order over scheduled steps.
///
/// Field order is the tie-break hierarchy: wave (topology) first, then
/// declaration index, then priority (higher first), then `step_id` as the
/// never-ambiguous fallback.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct ScheduleKey<'a> {
    pub wave: usize,
    pub declaration_index: usize,
    pub priority: Reverse<i64>,
    pub step_id: &'a str,
}

// ---------------------------------------------------------------------------
// Step graph
// ---------------------------------------------------------------------------

/// Dependency graph over a step slice. Edges point dependency -> dependent.
///
/// Unknown `depends_on` targets are left out of the graph (the validator
/// reports them separately); duplicate entries collapse into one edge.
pub(crate) struct StepGraph<'a> {
    steps: &'a [Step],
    graph: DiGraph<usize, ()>,
}

impl<'a> StepGraph<'a> {
    pub fn build(steps: &'a [Step]) -> Self {
        let mut graph = DiGraph::<usize, ()>::with_capacity(steps.len(), steps.len());
        let nodes: Vec<NodeIndex> = (0..steps.len()).map(|i| graph.add_node(i)).collect();

        // First declaration wins for duplicate IDs; duplicates are a structural error anyway.
        let mut id_to_idx: HashMap<&str, usize> = HashMap::with_capacity(steps.len());
        for (i, step) in steps.iter().enumerate() {
            id_to_idx.entry(step.step_id.as_str()).or_insert(i);
        }

        for (to, step) in steps.iter().enumerate() {
            for dep in &step.depends_on {
                if let Some(&from) = id_to_idx.get(dep.as_str()) {
                    graph.update_edge(nodes[from], nodes[to], ());
                }
            }
        }

        Self { steps, graph }
    }

    /// Declaration indices of a node's neighbors in one direction, ascending.
    fn sorted_neighbors(&self, idx: usize, direction: Direction) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .graph
            .neighbors_directed(NodeIndex::new(idx), direction)
            .map(|n| self.graph[n])
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    fn key(&self, wave: usize, idx: usize) -> ScheduleKey<'a> {
        let step = &self.steps[idx];
        ScheduleKey {
            wave,
            declaration_index: idx,
            priority: Reverse(step.priority),
            step_id: step.step_id.as_str(),
        }
    }

    /// Find dependency cycles with a depth-first walk that tracks the
    /// recursion stack.
    ///
    /// Walks along `depends_on` edges, starting from each step in declaration
    /// order. Each returned path starts and ends with the same step ID and
    /// reads "depends on" left to right.
    pub fn find_cycles(&self) -> Vec<Vec<&'a str>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            OnStack,
            Done,
        }

        struct Frame {
            node: usize,
            children: Vec<usize>,
            next: usize,
        }

        let n = self.steps.len();
        let mut marks = vec![Mark::Unvisited; n];
        let mut cycles = Vec::new();

        for root in 0..n {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            marks[root] = Mark::OnStack;
            let mut frames = vec![Frame {
                node: root,
                children: self.sorted_neighbors(root, Direction::Incoming),
                next: 0,
            }];

            loop {
                let Some(frame) = frames.last_mut() else {
                    break;
                };
                let node = frame.node;
                let child = frame.children.get(frame.next).copied();
                frame.next += 1;

                match child {
                    Some(child) => match marks[child] {
                        Mark::Unvisited => {
                            marks[child] = Mark::OnStack;
                            frames.push(Frame {
                                node: child,
                                children: self.sorted_neighbors(child, Direction::Incoming),
                                next: 0,
                            });
                        }
                        Mark::OnStack => {
                            let start = frames
                                .iter()
                                .position(|f| f.node == child)
                                .unwrap_or(0);
                            let mut path: Vec<&'a str> = frames[start..]
                                .iter()
                                .map(|f| self.steps[f.node].step_id.as_str())
                                .collect();
                            path.push(self.steps[child].step_id.as_str());
                            cycles.push(path);
                        }
                        Mark::Done => {}
                    },
                    None => {
                        marks[node] = Mark::Done;
                        frames.pop();
                    }
                }
            }
        }

        cycles
    }

    /// Kahn's algorithm, layer by layer.
    ///
    /// Returns the waves placed so far plus the declaration indices that could
    /// never be placed (non-empty only when the graph has a cycle).
    fn layers(&self) -> (Vec<Vec<usize>>, Vec<usize>) {
        let n = self.steps.len();
        let mut in_degree: Vec<usize> = (0..n)
            .map(|i| self.sorted_neighbors(i, Direction::Incoming).len())
            .collect();

        let mut waves: Vec<Vec<usize>> = Vec::new();
        let mut placed = vec![false; n];
        let mut current: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();

        while !current.is_empty() {
            let wave_idx = waves.len();
            current.sort_by(|&a, &b| self.key(wave_idx, a).cmp(&self.key(wave_idx, b)));

            let mut next = Vec::new();
            for &idx in &current {
                placed[idx] = true;
                for dependent in self.sorted_neighbors(idx, Direction::Outgoing) {
                    in_degree[dependent] -= 1;
                    if in_degree[dependent] == 0 {
                        next.push(dependent);
                    }
                }
            }

            waves.push(current);
            current = next;
        }

        let unplaced = (0..n).filter(|&i| !placed[i]).collect();
        (waves, unplaced)
    }
}

// ---------------------------------------------------------------------------
// Wave computation
// ---------------------------------------------------------------------------

/// Group steps into ordered waves.
///
/// Wave 0 holds every step with no dependencies (explicit `depends_on = []`
/// roots included), in declaration order. Each later wave holds the steps
/// whose last dependency was placed in the previous wave, again in
/// declaration order.
///
/// Fails with a cycle error when some steps can never be placed.
pub(crate) fn compute_waves(steps: &[Step]) -> Result<Vec<Wave<'_>>, WorkflowError> {
    if steps.is_empty() {
        return Ok(vec![]);
    }

    let graph = StepGraph::build(steps);
    let (layers, unplaced) = graph.layers();

    if !unplaced.is_empty() {
        let ids: Vec<&str> = unplaced
            .iter()
            .map(|&i| steps[i].step_id.as_str())
            .collect();
        return Err(WorkflowError::cycle(format!(
            "cycle detected: steps {ids:?} can never be scheduled"
        ))
        .with_field("depends_on"));
    }

    Ok(layers
        .into_iter()
        .map(|layer| layer.into_iter().map(|i| &steps[i]).collect())
        .collect())
}

/// Flatten waves into the single execution order.
pub(crate) fn flatten_waves<'a>(waves: Vec<Wave<'a>>) -> Vec<&'a Step> {
    waves.into_iter().flatten().collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
