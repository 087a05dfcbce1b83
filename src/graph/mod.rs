//! Graph store: vertex/edge tables, adjacency lists and the label index.
//!
//! A `Graph` is built once by incremental insertion (usually via
//! [`Graph::load`]) and then treated as immutable for all querying.
//! Traversal operations live in [`traversal`] and always produce new
//! `Graph` instances, never mutating their source.

pub mod label_index;
pub mod traversal;

use std::collections::HashMap;
use std::fmt;
use std::io::{BufRead, Write};
use std::sync::OnceLock;

use crate::codec::{self, Arc, Attributes, Edge, Vertex};
use crate::error::{ParseErrors, Result, SerializeErrors, SliceError};

pub use label_index::LabelIndex;
pub use traversal::{Direction, Filters};

/// A labeled directed multigraph with a label-prefix index.
///
/// Adjacency lists and the label index are maintained incrementally at
/// insertion time and are always consistent with the tables. The
/// reachability closure is the only lazily derived structure; it is
/// computed at most once per instance and graphs are never mutated after
/// it has been requested.
pub struct Graph {
    vertices: HashMap<i64, Vertex>,
    edges: HashMap<Arc, Vec<Edge>>,
    kids: HashMap<i64, Vec<i64>>,
    parents: HashMap<i64, Vec<i64>>,
    index: LabelIndex,
    pub(crate) closure: OnceLock<traversal::ReachClosure>,
}

/// A label bucket matched by a CANDIDATES query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub label: String,
    pub count: usize,
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.count, self.label)
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Graph {
            vertices: HashMap::new(),
            edges: HashMap::new(),
            kids: HashMap::new(),
            parents: HashMap::new(),
            index: LabelIndex::new(),
            closure: OnceLock::new(),
        }
    }

    /// Insert a vertex and index its label (empty labels are not indexed).
    pub fn add_vertex(&mut self, v: Vertex) {
        self.index.insert(&v.label, v.id);
        self.vertices.insert(v.id, v);
    }

    /// Insert an edge: appended to the per-arc set (multiple edges with
    /// distinct labels may share an arc) and to both adjacency lists.
    pub fn add_edge(&mut self, e: Edge) {
        let arc = e.arc;
        self.kids.entry(arc.src).or_default().push(arc.targ);
        self.parents.entry(arc.targ).or_default().push(arc.src);
        self.edges.entry(arc).or_default().push(e);
    }

    pub fn vertex(&self, id: i64) -> Option<&Vertex> {
        self.vertices.get(&id)
    }

    /// All edges on the arc (src, targ). Empty slice if the arc carries none.
    pub fn edges_on(&self, arc: Arc) -> &[Edge] {
        self.edges.get(&arc).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn kids_of(&self, id: i64) -> &[i64] {
        self.kids.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn parents_of(&self, id: i64) -> &[i64] {
        self.parents.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn index(&self) -> &LabelIndex {
        &self.index
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(|es| es.len()).sum()
    }

    /// Vertex ids sorted ascending. Canonical iteration order for
    /// serialization and the reachability closure.
    pub fn vertex_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.vertices.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// The attributes of vertex `id`, without the lifted id/label fields.
    pub fn node_attributes(&self, id: i64) -> Result<&Attributes> {
        self.vertices
            .get(&id)
            .map(|v| &v.rest)
            .ok_or(SliceError::NoSuchNode(id))
    }

    /// The attributes of every edge on arc (src, targ), in insertion order.
    pub fn edge_attributes(&self, src: i64, targ: i64) -> Result<Vec<&Attributes>> {
        let edges = self.edges_on(Arc { src, targ });
        if edges.is_empty() {
            return Err(SliceError::NoSuchEdge { src, targ });
        }
        Ok(edges.iter().map(|e| &e.rest).collect())
    }

    /// (label, count) pairs for index buckets matching `prefix` with at
    /// least `minimum` members, in lexicographic label order.
    pub fn candidates(&self, prefix: &str, minimum: usize) -> Vec<Candidate> {
        self.index
            .prefix_iter(prefix)
            .filter(|(_, ids)| ids.len() >= minimum)
            .map(|(label, ids)| Candidate { label: label.to_string(), count: ids.len() })
            .collect()
    }

    /// Best-effort load from the interchange format.
    ///
    /// Blank lines and lines without a tab are silently skipped. Records
    /// that fail schema decoding and unknown record-type keywords are
    /// recorded in `ParseErrors` and skipped. Only a stream read failure
    /// aborts the load. Edges referencing undeclared vertex ids are legal.
    pub fn load(reader: impl BufRead) -> Result<(Graph, ParseErrors)> {
        let mut graph = Graph::new();
        let mut errors = ParseErrors::default();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() || !line.contains('\t') {
                continue;
            }
            // The tab was just checked; parse_line cannot fail here.
            let Ok((kind, payload)) = codec::parse_line(&line) else {
                continue;
            };
            match kind {
                "vertex" => match codec::decode_vertex(payload) {
                    Ok(v) => graph.add_vertex(v),
                    Err(err) => errors.push(err),
                },
                "edge" => match codec::decode_edge(payload) {
                    Ok(e) => graph.add_edge(e),
                    Err(err) => errors.push(err),
                },
                other => errors.push(SliceError::UnknownRecordType(other.to_string())),
            }
        }

        Ok((graph, errors))
    }

    /// Serialize to the interchange format: all vertices, then all edges,
    /// each in ascending id/arc order. Per-record failures are aggregated
    /// while the rest still serializes; only a write failure aborts.
    pub fn serialize(&self, out: &mut impl Write) -> Result<SerializeErrors> {
        let mut errors = SerializeErrors::default();

        for id in self.vertex_ids() {
            match codec::encode_vertex(&self.vertices[&id]) {
                Ok(json) => writeln!(out, "vertex\t{}", json)?,
                Err(err) => errors.push(err),
            }
        }

        let mut arcs: Vec<Arc> = self.edges.keys().copied().collect();
        arcs.sort_unstable();
        for arc in arcs {
            for edge in &self.edges[&arc] {
                match codec::encode_edge(edge) {
                    Ok(json) => writeln!(out, "edge\t{}", json)?,
                    Err(err) => errors.push(err),
                }
            }
        }

        Ok(errors)
    }

    /// Serialize into an owned byte buffer.
    pub fn serialize_to_vec(&self) -> Result<(Vec<u8>, SerializeErrors)> {
        let mut buf = Vec::new();
        let errors = self.serialize(&mut buf)?;
        Ok((buf, errors))
    }
}
