//! Traversal engine: directional slicing, subgraph extraction, attribute
//! partitioning, transitive-closure reachability and partition-then-connect
//! summarization.
//!
//! Every operation returns new `Graph` instances built from cloned records;
//! the source graph is never mutated. Walks use an explicit worklist with a
//! visited set owned by the call, so deep graphs cannot overflow the stack.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::Value;

use crate::codec::{Arc, Edge};
use crate::error::{Result, SliceError};

use super::Graph;

/// Slicing direction: child edges, parent edges, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
    Both,
}

impl Direction {
    pub fn parse(s: &str) -> Result<Direction> {
        match s {
            "forward" => Ok(Direction::Forward),
            "backward" => Ok(Direction::Backward),
            "both" => Ok(Direction::Both),
            other => Err(SliceError::BadArgument(format!(
                "bad direction '{}', expected one of {{forward, backward, both}}",
                other
            ))),
        }
    }
}

/// Optional label filters applied by every traversal operation.
///
/// Node labels in `nodes` are never *expanded into* during a walk, though a
/// vertex already reached some other way stays in the result. Edge labels in
/// `edges` are treated as absent; an arc blocks expansion only when every
/// edge it carries is filtered.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Filters {
    pub edges: HashSet<String>,
    pub nodes: HashSet<String>,
}

impl Filters {
    pub fn none() -> Self {
        Filters::default()
    }

    fn node_blocked(&self, label: &str) -> bool {
        self.nodes.contains(label)
    }

    fn edge_blocked(&self, label: &str) -> bool {
        self.edges.contains(label)
    }

    /// True when every edge on the arc has a filtered label. An arc with a
    /// single surviving edge stays traversable.
    fn arc_blocked(&self, graph: &Graph, arc: Arc) -> bool {
        if self.edges.is_empty() {
            return false;
        }
        graph.edges_on(arc).iter().all(|e| self.edge_blocked(&e.label))
    }
}

/// Precomputed all-pairs reachability matrix (Floyd-Warshall over unit
/// weights, ignoring all filters). Built at most once per graph instance.
pub(crate) struct ReachClosure {
    idx: HashMap<i64, usize>,
    reach: Vec<bool>,
    n: usize,
}

impl ReachClosure {
    fn build(graph: &Graph) -> Self {
        let ordered = graph.vertex_ids();
        let n = ordered.len();
        let idx: HashMap<i64, usize> =
            ordered.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        let mut reach = vec![false; n * n];
        for arc in graph.edges.keys() {
            if let (Some(&i), Some(&j)) = (idx.get(&arc.src), idx.get(&arc.targ)) {
                reach[i * n + j] = true;
            }
        }
        for k in 0..n {
            for i in 0..n {
                if !reach[i * n + k] {
                    continue;
                }
                for j in 0..n {
                    if reach[k * n + j] {
                        reach[i * n + j] = true;
                    }
                }
            }
        }

        ReachClosure { idx, reach, n }
    }

    fn reaches(&self, u: i64, v: i64) -> bool {
        match (self.idx.get(&u), self.idx.get(&v)) {
            (Some(&i), Some(&j)) => self.reach[i * self.n + j],
            _ => false,
        }
    }
}

impl Graph {
    /// Depth-first reachability closure from `start` in the chosen
    /// direction, rendered as a vertex-induced subgraph.
    ///
    /// A neighbor is expanded only if it is unseen, its label is not node
    /// filtered, and the connecting arc is not fully edge filtered. The
    /// start vertex itself is always included. Once the visited set is
    /// fixed, every unfiltered edge of the original graph with both
    /// endpoints visited is added, so the result can contain edges that
    /// were never walked.
    pub fn walk(&self, start: i64, direction: Direction, filters: &Filters) -> Graph {
        let mut seen: HashSet<i64> = HashSet::new();
        let mut stack = vec![start];
        seen.insert(start);

        while let Some(id) = stack.pop() {
            let forward = matches!(direction, Direction::Forward | Direction::Both);
            let backward = matches!(direction, Direction::Backward | Direction::Both);

            if forward {
                for &kid in self.kids_of(id) {
                    if self.expandable(kid, Arc { src: id, targ: kid }, &seen, filters) {
                        seen.insert(kid);
                        stack.push(kid);
                    }
                }
            }
            if backward {
                for &parent in self.parents_of(id) {
                    if self.expandable(parent, Arc { src: parent, targ: id }, &seen, filters) {
                        seen.insert(parent);
                        stack.push(parent);
                    }
                }
            }
        }

        self.induced(&seen, filters)
    }

    fn expandable(&self, id: i64, arc: Arc, seen: &HashSet<i64>, filters: &Filters) -> bool {
        if seen.contains(&id) {
            return false;
        }
        // Dangling endpoints (no vertex record) are never expanded into.
        let Some(v) = self.vertex(id) else {
            return false;
        };
        !filters.node_blocked(&v.label) && !filters.arc_blocked(self, arc)
    }

    /// Vertex-induced subgraph over `members`: the member vertices plus
    /// every unfiltered edge whose endpoints are both members.
    fn induced(&self, members: &HashSet<i64>, filters: &Filters) -> Graph {
        let mut g = Graph::new();

        let mut ids: Vec<i64> = members.iter().copied().collect();
        ids.sort_unstable();
        for id in ids {
            if let Some(v) = self.vertex(id) {
                g.add_vertex(v.clone());
            }
        }

        let mut arcs: Vec<Arc> = self
            .edges
            .keys()
            .filter(|arc| members.contains(&arc.src) && members.contains(&arc.targ))
            .copied()
            .collect();
        arcs.sort_unstable();
        for arc in arcs {
            for edge in self.edges_on(arc) {
                if !filters.edge_blocked(&edge.label) {
                    g.add_edge(edge.clone());
                }
            }
        }

        g
    }

    /// One slice per vertex whose label matches `prefix`: labels in
    /// lexicographic index order, vertices in per-bucket insertion order.
    pub fn slice(&self, prefix: &str, direction: Direction, filters: &Filters) -> Vec<Graph> {
        let mut slices = Vec::new();
        for (_, ids) in self.index.prefix_iter(prefix) {
            for &id in ids {
                slices.push(self.walk(id, direction, filters));
            }
        }
        slices
    }

    /// Vertex-induced subgraph over an explicit id set. Unknown ids are an
    /// error; node-filtered labels are excluded from the set.
    pub fn sub_graph(&self, ids: &[i64], filters: &Filters) -> Result<Graph> {
        let mut members = HashSet::new();
        for &id in ids {
            let v = self.vertex(id).ok_or(SliceError::NoSuchNode(id))?;
            if !filters.node_blocked(&v.label) {
                members.insert(id);
            }
        }
        Ok(self.induced(&members, filters))
    }

    /// Group vertices by the string value of `attr`, one induced filtered
    /// graph per distinct value in sorted value order. Fails with
    /// `MissingAttribute` if any vertex lacks the key; a value held by a
    /// single vertex still yields a one-vertex, zero-edge graph.
    pub fn partition(&self, attr: &str, filters: &Filters) -> Result<Vec<Graph>> {
        let mut groups: BTreeMap<String, Vec<i64>> = BTreeMap::new();
        for id in self.vertex_ids() {
            let v = &self.vertices[&id];
            let value = match v.rest.get(attr) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => return Err(SliceError::MissingAttribute(attr.to_string())),
            };
            groups.entry(value).or_default().push(id);
        }

        let mut parts = Vec::with_capacity(groups.len());
        for ids in groups.values() {
            let members: HashSet<i64> = ids
                .iter()
                .copied()
                .filter(|&id| !filters.node_blocked(&self.vertices[&id].label))
                .collect();
            parts.push(self.induced(&members, filters));
        }
        Ok(parts)
    }

    /// Transitive reachability over a path of at least one edge, ignoring
    /// all filters. The closure is computed on first use and cached for the
    /// lifetime of this graph instance; O(V^3) once, O(1) per query.
    pub fn reaches(&self, u: i64, v: i64) -> bool {
        self.closure
            .get_or_init(|| ReachClosure::build(self))
            .reaches(u, v)
    }

    /// Transitive summary over the vertices whose label matches `prefix`:
    /// the matched vertices, plus a label-less edge for every ordered pair
    /// (u, v) of distinct matches with `reaches(u, v)` in this graph.
    pub fn select_and_connect(&self, prefix: &str) -> Graph {
        let mut g = Graph::new();
        let mut selected: Vec<i64> = Vec::new();
        let mut picked = HashSet::new();
        for (_, ids) in self.index.prefix_iter(prefix) {
            for &id in ids {
                if picked.insert(id) {
                    selected.push(id);
                    g.add_vertex(self.vertices[&id].clone());
                }
            }
        }

        for &u in &selected {
            for &v in &selected {
                if u != v && self.reaches(u, v) {
                    g.add_edge(Edge::new(u, v, ""));
                }
            }
        }
        g
    }

    /// Partition by `attr`, then summarize each partition with
    /// `select_and_connect(prefix)`, keeping only summaries that connected
    /// at least one pair.
    pub fn projected_partition(
        &self,
        prefix: &str,
        attr: &str,
        filters: &Filters,
    ) -> Result<Vec<Graph>> {
        let parts = self.partition(attr, filters)?;
        Ok(parts
            .iter()
            .map(|p| p.select_and_connect(prefix))
            .filter(|g| g.edge_count() > 0)
            .collect())
    }
}
