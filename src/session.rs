//! Per-connection session state machine.
//!
//! A session is either `Start` (no graph loaded) or `Loaded` (owns exactly
//! one graph). [`dispatch`] maps a parsed command and the current state to
//! the next state and exactly one response; command failures produce an
//! ERROR response and never tear the session down. There is no session-level
//! shared state: each connection worker owns its state value outright.

use std::path::Path;

use tracing::warn;

use crate::error::{Result, SliceError};
use crate::graph::Graph;
use crate::input;
use crate::protocol::{Command, Response};

/// Connection lifecycle state. Holds the session's graph, if any; loading a
/// new graph drops the previous one.
pub enum SessionState {
    Start,
    Loaded(Graph),
}

impl SessionState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, SessionState::Loaded(_))
    }
}

/// Process one command: `(state, command) -> (state, response)`.
///
/// `LOAD` is legal in either state and replaces any current graph on
/// success; a failed `LOAD` leaves the state unchanged. Every other command
/// requires `Loaded` and yields an unexpected-command error in `Start`.
pub fn dispatch(state: SessionState, command: Command) -> (SessionState, Response) {
    match command {
        Command::Load { path } => match load_path(&path) {
            Ok(graph) => (SessionState::Loaded(graph), Response::Ok),
            Err(err) => (state, Response::Error(err.to_string())),
        },
        other => match state {
            SessionState::Start => {
                let err = SliceError::UnexpectedCommand(other.name().to_string());
                (SessionState::Start, Response::Error(err.to_string()))
            }
            SessionState::Loaded(graph) => {
                let response =
                    query(&graph, other).unwrap_or_else(|err| Response::Error(err.to_string()));
                (SessionState::Loaded(graph), response)
            }
        },
    }
}

/// Resolve and load a graph path, best-effort. Per-record parse failures
/// are logged and skipped; only a stream/IO failure fails the load.
fn load_path(path: &str) -> Result<Graph> {
    let reader = input::open(Path::new(path))?;
    let (graph, errors) = Graph::load(reader)?;
    if !errors.is_empty() {
        warn!(path, skipped = errors.len(), "load skipped bad records: {}", errors);
    }
    Ok(graph)
}

/// Run a query command against the loaded graph.
fn query(graph: &Graph, command: Command) -> Result<Response> {
    match command {
        Command::Candidates { prefix } => {
            let mut text = String::new();
            for candidate in graph.candidates(&prefix, 1) {
                text.push_str(&candidate.to_string());
                text.push('\n');
            }
            Ok(Response::Candidates(text))
        }
        Command::Slice { prefix, direction, filters } => {
            let slices = graph.slice(&prefix, direction, &filters);
            Ok(Response::Graphs(serialize_graphs(&slices)?))
        }
        Command::Node { id } => {
            let attrs = graph.node_attributes(id)?;
            Ok(Response::Node(serde_json::to_vec(attrs)?))
        }
        Command::Edge { src, targ } => {
            let attrs = graph.edge_attributes(src, targ)?;
            Ok(Response::Edge(serde_json::to_vec(&attrs)?))
        }
        Command::SubGraph { ids, filters } => {
            let sub = graph.sub_graph(&ids, &filters)?;
            let (bytes, errors) = sub.serialize_to_vec()?;
            if !errors.is_empty() {
                warn!("subgraph serialization skipped records: {}", errors);
            }
            Ok(Response::Graph(bytes))
        }
        Command::Partition { attr, filters } => {
            let parts = graph.partition(&attr, &filters)?;
            Ok(Response::Graphs(serialize_graphs(&parts)?))
        }
        Command::ProjectedPartition { prefix, attr, filters } => {
            let summaries = graph.projected_partition(&prefix, &attr, &filters)?;
            Ok(Response::Graphs(serialize_graphs(&summaries)?))
        }
        Command::Load { .. } => unreachable!("LOAD is handled by dispatch"),
    }
}

/// Serialize a sequence of graphs: each graph's records followed by a blank
/// line, with one more blank line terminating the sequence.
fn serialize_graphs(graphs: &[Graph]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for graph in graphs {
        let errors = graph.serialize(&mut out)?;
        if !errors.is_empty() {
            warn!("graph serialization skipped records: {}", errors);
        }
        out.push(b'\n');
    }
    out.push(b'\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn fixture_file(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn chain_fixture() -> NamedTempFile {
        fixture_file(
            "vertex\t{\"id\":1,\"label\":\"call\",\"line\":4}\n\
             vertex\t{\"id\":2,\"label\":\"stmt\",\"line\":5}\n\
             vertex\t{\"id\":3,\"label\":\"call\",\"line\":6}\n\
             edge\t{\"src\":1,\"targ\":2,\"label\":\"cfg\"}\n\
             edge\t{\"src\":2,\"targ\":3,\"label\":\"cfg\"}\n",
        )
    }

    fn parse(cmd: &str, rest: &str) -> Command {
        Command::parse(cmd, rest).unwrap()
    }

    #[test]
    fn test_query_before_load_errors_but_session_survives() {
        let state = SessionState::Start;
        let (state, response) = dispatch(state, parse("SLICE", "-p call"));
        match response {
            Response::Error(msg) => assert!(msg.contains("unexpected command")),
            other => panic!("expected ERROR, got {:?}", other),
        }
        assert!(!state.is_loaded());

        // The connection is still usable for a LOAD.
        let file = chain_fixture();
        let (state, response) =
            dispatch(state, parse("LOAD", file.path().to_str().unwrap()));
        assert_eq!(response, Response::Ok);
        assert!(state.is_loaded());
    }

    #[test]
    fn test_load_failure_leaves_state_unchanged() {
        let (state, response) =
            dispatch(SessionState::Start, parse("LOAD", "/no/such/graph.pdg"));
        assert!(matches!(response, Response::Error(_)));
        assert!(!state.is_loaded());
    }

    #[test]
    fn test_load_replaces_previous_graph() {
        let first = fixture_file("vertex\t{\"id\":1,\"label\":\"old\"}\n");
        let second = fixture_file("vertex\t{\"id\":1,\"label\":\"new\"}\n");

        let (state, _) = dispatch(SessionState::Start, parse("LOAD", first.path().to_str().unwrap()));
        let (state, response) = dispatch(state, parse("LOAD", second.path().to_str().unwrap()));
        assert_eq!(response, Response::Ok);

        let (_, response) = dispatch(state, parse("CANDIDATES", "new"));
        match response {
            Response::Candidates(text) => assert_eq!(text, "1, new\n"),
            other => panic!("expected CANDIDATES, got {:?}", other),
        }
    }

    #[test]
    fn test_load_is_best_effort_over_bad_records() {
        let file = fixture_file(
            "vertex\t{\"id\":1,\"label\":\"call\"}\n\
             vertex\t{\"label\":\"missing-id\"}\n\
             junk without a tab\n\
             vertex\t{\"id\":2,\"label\":\"call\"}\n",
        );
        let (state, response) =
            dispatch(SessionState::Start, parse("LOAD", file.path().to_str().unwrap()));
        assert_eq!(response, Response::Ok);

        let (_, response) = dispatch(state, parse("CANDIDATES", "call"));
        match response {
            Response::Candidates(text) => assert_eq!(text, "2, call\n"),
            other => panic!("expected CANDIDATES, got {:?}", other),
        }
    }

    #[test]
    fn test_node_returns_extra_attributes_only() {
        let file = chain_fixture();
        let (state, _) = dispatch(SessionState::Start, parse("LOAD", file.path().to_str().unwrap()));
        let (state, response) = dispatch(state, parse("NODE", "1"));
        match response {
            Response::Node(bytes) => assert_eq!(bytes, b"{\"line\":4}".to_vec()),
            other => panic!("expected NODE, got {:?}", other),
        }

        let (state, response) = dispatch(state, parse("NODE", "99"));
        match response {
            Response::Error(msg) => assert!(msg.contains("no such node")),
            other => panic!("expected ERROR, got {:?}", other),
        }
        // Lookup misses do not close the session.
        assert!(state.is_loaded());
    }

    #[test]
    fn test_edge_returns_attributes_of_every_edge_on_arc() {
        let file = fixture_file(
            "vertex\t{\"id\":1,\"label\":\"a\"}\n\
             vertex\t{\"id\":2,\"label\":\"b\"}\n\
             edge\t{\"src\":1,\"targ\":2,\"label\":\"x\",\"w\":1}\n\
             edge\t{\"src\":1,\"targ\":2,\"label\":\"y\",\"w\":2}\n",
        );
        let (state, _) = dispatch(SessionState::Start, parse("LOAD", file.path().to_str().unwrap()));
        let (state, response) = dispatch(state, parse("EDGE", "1 2"));
        match response {
            Response::Edge(bytes) => {
                let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
                let arr = value.as_array().unwrap();
                assert_eq!(arr.len(), 2);
                assert_eq!(arr[0]["w"], 1);
                assert_eq!(arr[1]["w"], 2);
            }
            other => panic!("expected EDGE, got {:?}", other),
        }

        let (_, response) = dispatch(state, parse("EDGE", "2 1"));
        match response {
            Response::Error(msg) => assert!(msg.contains("no such edge")),
            other => panic!("expected ERROR, got {:?}", other),
        }
    }

    #[test]
    fn test_slice_response_frames_each_graph_with_blank_line() {
        let file = chain_fixture();
        let (state, _) = dispatch(SessionState::Start, parse("LOAD", file.path().to_str().unwrap()));
        let (_, response) = dispatch(state, parse("SLICE", "-p call -d forward"));
        match response {
            Response::Graphs(bytes) => {
                let text = String::from_utf8(bytes).unwrap();
                // Two "call" vertices, so two slices, each closed by a
                // blank line, plus the terminator.
                let chunks: Vec<&str> =
                    text.trim_end_matches('\n').split("\n\n").collect();
                assert_eq!(chunks.len(), 2);
                assert!(chunks[0].contains("\"id\":1"));
                assert!(chunks[1].contains("\"id\":3"));
            }
            other => panic!("expected GRAPHS, got {:?}", other),
        }
    }

    #[test]
    fn test_partition_missing_attribute_is_an_error_response() {
        let file = chain_fixture();
        let (state, _) = dispatch(SessionState::Start, parse("LOAD", file.path().to_str().unwrap()));
        let (state, response) = dispatch(state, parse("PARTITION", "-a color"));
        match response {
            Response::Error(msg) => assert!(msg.contains("missing attribute")),
            other => panic!("expected ERROR, got {:?}", other),
        }
        assert!(state.is_loaded());
    }

    #[test]
    fn test_subgraph_returns_single_graph() {
        let file = chain_fixture();
        let (state, _) = dispatch(SessionState::Start, parse("LOAD", file.path().to_str().unwrap()));
        let (_, response) = dispatch(state, parse("SUBGRAPH", "1 2"));
        match response {
            Response::Graph(bytes) => {
                let text = String::from_utf8(bytes).unwrap();
                assert!(text.contains("\"id\":1"));
                assert!(text.contains("\"id\":2"));
                assert!(!text.contains("\"id\":3"));
                assert!(text.contains("edge\t"));
            }
            other => panic!("expected GRAPH, got {:?}", other),
        }
    }
}
