//! Interchange codec for the line-delimited graph format.
//!
//! One record per line, record type and JSON payload separated by a
//! single tab:
//!
//!   vertex\t{"id":136,"label":"call"}
//!   edge\t{"src":23,"targ":25,"label":"ddg"}
//!
//! Required fields are lifted into typed structs; every other field is
//! preserved verbatim in `rest` so unknown attributes survive a
//! decode/encode round-trip. Integers are carried as `serde_json::Number`
//! end to end, so 64-bit ids never pass through a float.

use serde_json::{Map, Value};

use crate::error::{Result, SliceError};

/// Open-ended attribute mapping carried by vertices and edges.
pub type Attributes = Map<String, Value>;

/// A vertex of a program dependence graph. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    pub id: i64,
    pub label: String,
    /// Every payload field other than `id` and `label`.
    pub rest: Attributes,
}

/// Ordered pair of vertex ids identifying a potential connection.
///
/// An arc may carry any number of `Edge` records with distinct labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Arc {
    pub src: i64,
    pub targ: i64,
}

/// A labeled edge on an arc. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub arc: Arc,
    pub label: String,
    /// Every payload field other than `src`, `targ` and `label`.
    pub rest: Attributes,
}

impl Vertex {
    pub fn new(id: i64, label: impl Into<String>) -> Self {
        Vertex { id, label: label.into(), rest: Attributes::new() }
    }
}

impl Edge {
    pub fn new(src: i64, targ: i64, label: impl Into<String>) -> Self {
        Edge { arc: Arc { src, targ }, label: label.into(), rest: Attributes::new() }
    }
}

/// Split a record line on its first tab.
///
/// Returns the trimmed record-type keyword and the trimmed JSON payload.
/// Lines without a tab are malformed; callers skip them rather than
/// aborting the whole load.
pub fn parse_line(line: &str) -> Result<(&str, &str)> {
    match line.split_once('\t') {
        Some((kind, payload)) => Ok((kind.trim(), payload.trim())),
        None => Err(SliceError::MalformedLine),
    }
}

fn parse_object(payload: &str) -> Result<Attributes> {
    match serde_json::from_str::<Value>(payload)? {
        Value::Object(obj) => Ok(obj),
        other => Err(SliceError::Schema(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

fn take_int(obj: &mut Attributes, key: &str) -> Result<i64> {
    match obj.remove(key) {
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| {
            SliceError::Schema(format!("field '{}' is not a 64-bit integer", key))
        }),
        Some(_) => Err(SliceError::Schema(format!("field '{}' is not an integer", key))),
        None => Err(SliceError::Schema(format!("missing field '{}'", key))),
    }
}

fn take_string(obj: &mut Attributes, key: &str) -> Result<String> {
    match obj.remove(key) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(SliceError::Schema(format!("field '{}' is not a string", key))),
        None => Err(SliceError::Schema(format!("missing field '{}'", key))),
    }
}

/// Decode a vertex payload. Requires `id` (integer) and `label` (string).
pub fn decode_vertex(payload: &str) -> Result<Vertex> {
    let mut obj = parse_object(payload)?;
    let id = take_int(&mut obj, "id")?;
    let label = take_string(&mut obj, "label")?;
    Ok(Vertex { id, label, rest: obj })
}

/// Decode an edge payload. Requires `src`, `targ` (integers) and `label`.
pub fn decode_edge(payload: &str) -> Result<Edge> {
    let mut obj = parse_object(payload)?;
    let src = take_int(&mut obj, "src")?;
    let targ = take_int(&mut obj, "targ")?;
    let label = take_string(&mut obj, "label")?;
    Ok(Edge { arc: Arc { src, targ }, label, rest: obj })
}

/// Encode a vertex as one JSON object: `id` and `label` merged with `rest`.
pub fn encode_vertex(v: &Vertex) -> Result<String> {
    let mut obj = Attributes::new();
    obj.insert("id".to_string(), Value::from(v.id));
    obj.insert("label".to_string(), Value::from(v.label.clone()));
    for (k, val) in &v.rest {
        obj.insert(k.clone(), val.clone());
    }
    Ok(serde_json::to_string(&Value::Object(obj))?)
}

/// Encode an edge as one JSON object: arc and label merged with `rest`.
pub fn encode_edge(e: &Edge) -> Result<String> {
    let mut obj = Attributes::new();
    obj.insert("src".to_string(), Value::from(e.arc.src));
    obj.insert("targ".to_string(), Value::from(e.arc.targ));
    obj.insert("label".to_string(), Value::from(e.label.clone()));
    for (k, val) in &e.rest {
        obj.insert(k.clone(), val.clone());
    }
    Ok(serde_json::to_string(&Value::Object(obj))?)
}
