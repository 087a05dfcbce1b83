//! Wire protocol: frame codec, command parsing and response encoding.
//!
//! Framing: [4-byte length BE] [frame body]. A frame body is a command tag,
//! optionally followed by one space and the payload bytes. The payload of a
//! query command is an option string in shell-style argv form, a raw path,
//! a raw prefix, or raw integers, depending on the command.

use std::io::{Read, Write};

use crate::error::{Result, SliceError};
use crate::graph::traversal::{Direction, Filters};

/// Frames larger than this are rejected as corrupt.
const MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

// ============================================================================
// Frame codec
// ============================================================================

/// Read one length-prefixed frame. `Ok(None)` on a clean EOF between frames.
pub fn read_frame(stream: &mut impl Read) -> std::io::Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame too large: {} bytes", len),
        ));
    }

    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf)?;
    Ok(Some(buf))
}

/// Write one length-prefixed frame.
pub fn write_frame(stream: &mut impl Write, body: &[u8]) -> std::io::Result<()> {
    let len = body.len() as u32;
    stream.write_all(&len.to_be_bytes())?;
    stream.write_all(body)?;
    stream.flush()?;
    Ok(())
}

/// Encode a frame body from a tag and payload.
pub fn encode_message(tag: &str, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(tag.len() + 1 + payload.len());
    body.extend_from_slice(tag.as_bytes());
    if !payload.is_empty() {
        body.push(b' ');
        body.extend_from_slice(payload);
    }
    body
}

/// Split a frame body into its tag and payload at the first space.
pub fn decode_message(body: &[u8]) -> (&[u8], &[u8]) {
    match body.iter().position(|&b| b == b' ') {
        Some(i) => (&body[..i], &body[i + 1..]),
        None => (body, &[][..]),
    }
}

// ============================================================================
// Commands
// ============================================================================

/// A parsed inbound command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Load { path: String },
    Candidates { prefix: String },
    Slice { prefix: String, direction: Direction, filters: Filters },
    Node { id: i64 },
    Edge { src: i64, targ: i64 },
    SubGraph { ids: Vec<i64>, filters: Filters },
    Partition { attr: String, filters: Filters },
    ProjectedPartition { prefix: String, attr: String, filters: Filters },
}

impl Command {
    /// The protocol name of this command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Load { .. } => "LOAD",
            Command::Candidates { .. } => "CANDIDATES",
            Command::Slice { .. } => "SLICE",
            Command::Node { .. } => "NODE",
            Command::Edge { .. } => "EDGE",
            Command::SubGraph { .. } => "SUBGRAPH",
            Command::Partition { .. } => "PARTITION",
            Command::ProjectedPartition { .. } => "PROJECTED-PARTITION",
        }
    }

    /// Parse a `(command, argument)` pair decoded from a frame.
    pub fn parse(cmd: &str, rest: &str) -> Result<Command> {
        match cmd {
            "LOAD" => Ok(Command::Load { path: rest.trim().to_string() }),
            "CANDIDATES" => Ok(Command::Candidates { prefix: rest.trim().to_string() }),
            "SLICE" => {
                let args = CommandArgs::parse(rest)?;
                let prefix = args.prefix.clone().filter(|p| !p.is_empty()).ok_or_else(|| {
                    SliceError::BadArgument("you must supply a prefix".to_string())
                })?;
                Ok(Command::Slice {
                    prefix,
                    direction: args.direction.unwrap_or(Direction::Backward),
                    filters: args.filters,
                })
            }
            "NODE" => {
                let id = parse_int(rest.trim())?;
                Ok(Command::Node { id })
            }
            "EDGE" => {
                let parts: Vec<&str> = rest.split_whitespace().collect();
                if parts.len() != 2 {
                    return Err(SliceError::BadArgument(format!(
                        "expected 'u v', got '{}'",
                        rest.trim()
                    )));
                }
                Ok(Command::Edge { src: parse_int(parts[0])?, targ: parse_int(parts[1])? })
            }
            "SUBGRAPH" => {
                let args = CommandArgs::parse(rest)?;
                Ok(Command::SubGraph { ids: args.ids, filters: args.filters })
            }
            "PARTITION" => {
                let args = CommandArgs::parse(rest)?;
                let attr = args.attr.clone().ok_or_else(|| {
                    SliceError::BadArgument("you must supply an attr".to_string())
                })?;
                Ok(Command::Partition { attr, filters: args.filters })
            }
            "PROJECTED-PARTITION" => {
                let args = CommandArgs::parse(rest)?;
                let prefix = args.prefix.clone().filter(|p| !p.is_empty()).ok_or_else(|| {
                    SliceError::BadArgument("you must supply a prefix".to_string())
                })?;
                let attr = args.attr.clone().ok_or_else(|| {
                    SliceError::BadArgument("you must supply an attr".to_string())
                })?;
                Ok(Command::ProjectedPartition { prefix, attr, filters: args.filters })
            }
            other => Err(SliceError::UnexpectedCommand(other.to_string())),
        }
    }
}

fn parse_int(s: &str) -> Result<i64> {
    s.parse::<i64>()
        .map_err(|_| SliceError::BadArgument(format!("expected an int, got '{}'", s)))
}

/// Shell-style option string shared by the query commands:
/// `-p/--prefix`, `-d/--direction`, `-a/--attr`, repeatable
/// `-e/--edge-filter` and `-n/--node-filter`, plus positional integer ids.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CommandArgs {
    pub prefix: Option<String>,
    pub direction: Option<Direction>,
    pub attr: Option<String>,
    pub filters: Filters,
    pub ids: Vec<i64>,
}

impl CommandArgs {
    pub fn parse(rest: &str) -> Result<CommandArgs> {
        let argv: Vec<&str> = rest.split_whitespace().collect();
        let mut args = CommandArgs::default();

        let mut i = 0;
        while i < argv.len() {
            let arg = argv[i];
            let (opt, mut value) = match arg.split_once('=') {
                Some((opt, value)) if arg.starts_with("--") => (opt, Some(value.to_string())),
                _ => (arg, None),
            };

            let mut take_value = |i: &mut usize| -> Result<String> {
                if let Some(v) = value.take() {
                    return Ok(v);
                }
                *i += 1;
                argv.get(*i).map(|s| s.to_string()).ok_or_else(|| {
                    SliceError::BadArgument(format!("option '{}' needs a value", opt))
                })
            };

            match opt {
                "-p" | "--prefix" => args.prefix = Some(take_value(&mut i)?),
                "-d" | "--direction" => {
                    args.direction = Some(Direction::parse(&take_value(&mut i)?)?)
                }
                "-a" | "--attr" => args.attr = Some(take_value(&mut i)?),
                "-e" | "--edge-filter" => {
                    args.filters.edges.insert(take_value(&mut i)?);
                }
                "-n" | "--node-filter" => {
                    args.filters.nodes.insert(take_value(&mut i)?);
                }
                _ if opt.starts_with('-') => {
                    return Err(SliceError::BadArgument(format!("unknown option '{}'", opt)));
                }
                _ => args.ids.push(parse_int(opt)?),
            }
            i += 1;
        }

        Ok(args)
    }
}

// ============================================================================
// Responses
// ============================================================================

/// An outbound response frame: tag plus payload bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Ok,
    Error(String),
    Candidates(String),
    Graph(Vec<u8>),
    Graphs(Vec<u8>),
    Node(Vec<u8>),
    Edge(Vec<u8>),
}

impl Response {
    pub fn tag(&self) -> &'static str {
        match self {
            Response::Ok => "OK",
            Response::Error(_) => "ERROR",
            Response::Candidates(_) => "CANDIDATES",
            Response::Graph(_) => "GRAPH",
            Response::Graphs(_) => "GRAPHS",
            Response::Node(_) => "NODE",
            Response::Edge(_) => "EDGE",
        }
    }

    /// Encode into a frame body.
    pub fn into_frame(self) -> Vec<u8> {
        let tag = self.tag();
        match self {
            Response::Ok => encode_message(tag, &[]),
            Response::Error(msg) => encode_message(tag, msg.as_bytes()),
            Response::Candidates(text) => encode_message(tag, text.as_bytes()),
            Response::Graph(bytes)
            | Response::Graphs(bytes)
            | Response::Node(bytes)
            | Response::Edge(bytes) => encode_message(tag, &bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_frame_round_trip() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"SLICE -p call").unwrap();
        write_frame(&mut buf, b"OK").unwrap();

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_frame(&mut cursor).unwrap().unwrap(), b"SLICE -p call");
        assert_eq!(read_frame(&mut cursor).unwrap().unwrap(), b"OK");
        assert!(read_frame(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn test_frame_with_embedded_newlines() {
        let body = encode_message("GRAPHS", b"vertex\t{}\n\nvertex\t{}\n\n");
        let mut buf = Vec::new();
        write_frame(&mut buf, &body).unwrap();
        let frame = read_frame(&mut Cursor::new(buf)).unwrap().unwrap();
        let (tag, payload) = decode_message(&frame);
        assert_eq!(tag, b"GRAPHS");
        assert_eq!(payload, b"vertex\t{}\n\nvertex\t{}\n\n");
    }

    #[test]
    fn test_decode_message_without_payload() {
        let (tag, payload) = decode_message(b"OK");
        assert_eq!(tag, b"OK");
        assert!(payload.is_empty());
    }

    #[test]
    fn test_oversized_frame_is_invalid_data() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(u32::MAX).to_be_bytes());
        let err = read_frame(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_parse_slice_command() {
        let cmd = Command::parse("SLICE", "-p call -d forward -e cfg -e ddg -n exit").unwrap();
        match cmd {
            Command::Slice { prefix, direction, filters } => {
                assert_eq!(prefix, "call");
                assert_eq!(direction, Direction::Forward);
                assert!(filters.edges.contains("cfg"));
                assert!(filters.edges.contains("ddg"));
                assert!(filters.nodes.contains("exit"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_slice_direction_defaults_to_backward() {
        let cmd = Command::parse("SLICE", "--prefix=call").unwrap();
        match cmd {
            Command::Slice { direction, .. } => assert_eq!(direction, Direction::Backward),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_slice_without_prefix_is_rejected() {
        assert!(matches!(
            Command::parse("SLICE", "-d forward"),
            Err(SliceError::BadArgument(_))
        ));
    }

    #[test]
    fn test_empty_prefix_is_rejected() {
        // An empty prefix would match every index bucket; it is refused
        // the same way a missing prefix is.
        assert!(matches!(
            Command::parse("SLICE", "--prefix="),
            Err(SliceError::BadArgument(_))
        ));
        assert!(matches!(
            Command::parse("PROJECTED-PARTITION", "--prefix= -a method"),
            Err(SliceError::BadArgument(_))
        ));
    }

    #[test]
    fn test_parse_subgraph_positional_ids() {
        let cmd = Command::parse("SUBGRAPH", "-e cfg 1 2 3").unwrap();
        match cmd {
            Command::SubGraph { ids, filters } => {
                assert_eq!(ids, vec![1, 2, 3]);
                assert!(filters.edges.contains("cfg"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_edge_pair() {
        assert_eq!(
            Command::parse("EDGE", "3 9").unwrap(),
            Command::Edge { src: 3, targ: 9 }
        );
        assert!(Command::parse("EDGE", "3").is_err());
        assert!(Command::parse("EDGE", "3 x").is_err());
    }

    #[test]
    fn test_parse_projected_partition_requires_prefix_and_attr() {
        let cmd = Command::parse("PROJECTED-PARTITION", "-p call -a method").unwrap();
        assert_eq!(cmd.name(), "PROJECTED-PARTITION");
        assert!(Command::parse("PROJECTED-PARTITION", "-p call").is_err());
        assert!(Command::parse("PROJECTED-PARTITION", "-a method").is_err());
    }

    #[test]
    fn test_unknown_command_is_unexpected() {
        assert!(matches!(
            Command::parse("FROBNICATE", ""),
            Err(SliceError::UnexpectedCommand(_))
        ));
    }

    #[test]
    fn test_bad_direction_is_rejected() {
        assert!(matches!(
            Command::parse("SLICE", "-p x -d sideways"),
            Err(SliceError::BadArgument(_))
        ));
    }

    #[test]
    fn test_response_frames() {
        assert_eq!(Response::Ok.into_frame(), b"OK".to_vec());
        assert_eq!(
            Response::Error("no such node: 9".to_string()).into_frame(),
            b"ERROR no such node: 9".to_vec()
        );
        let frame = Response::Node(b"{\"line\":4}".to_vec()).into_frame();
        let (tag, payload) = decode_message(&frame);
        assert_eq!(tag, b"NODE");
        assert_eq!(payload, b"{\"line\":4}");
    }
}
