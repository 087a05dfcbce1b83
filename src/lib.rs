//! pdgslice — a query engine for labeled, directed multigraphs
//! representing program dependence graphs, exposed over a stateful
//! command protocol.
//!
//! The library is layered leaves-first:
//!
//! - [`codec`]: the line-delimited vertex/edge interchange format
//! - [`graph`]: the in-memory graph store with its label-prefix index,
//!   and the traversal engine (slicing, subgraphs, partitions,
//!   reachability, transitive summaries)
//! - [`input`]: path resolution (file / gzip / directory) for LOAD
//! - [`protocol`]: frame codec, command parsing, response encoding
//! - [`session`]: the per-connection state machine tying it together
//!
//! Graphs are built once and queried many times; every query produces new
//! graphs and no graph is ever shared between sessions, so the engine
//! needs no internal locking.

pub mod codec;
pub mod error;
pub mod graph;
pub mod input;
pub mod protocol;
pub mod session;

pub use codec::{Arc, Attributes, Edge, Vertex};
pub use error::{ParseErrors, Result, SerializeErrors, SliceError};
pub use graph::{Direction, Filters, Graph};
pub use session::{dispatch, SessionState};
