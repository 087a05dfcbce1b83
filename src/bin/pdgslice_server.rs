//! pdgslice server - slicing query service over Unix socket or stdio
//!
//! Usage:
//!   pdgslice-server [--socket /tmp/pdgslice.sock] [--stdio]
//!
//! Protocol:
//!   Request:  [4-byte length BE] [command SP argument-bytes]
//!   Response: [4-byte length BE] [tag SP payload-bytes]
//!
//! Each connection is served by its own worker thread and owns its own
//! session (and graph); commands are processed strictly in order, one
//! response frame per request frame. A command failure produces an ERROR
//! frame and leaves the connection open.

use std::io::{self, Read, Write};
use std::os::unix::net::UnixListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use anyhow::Context;

use pdgslice::protocol::{decode_message, read_frame, write_frame, Command, Response};
use pdgslice::session::{dispatch, SessionState};

// Global client ID counter
static NEXT_CLIENT_ID: AtomicUsize = AtomicUsize::new(1);

const DEFAULT_SOCKET: &str = "/tmp/pdgslice.sock";

/// Serve one connection: a writer thread drains outbound frames from a
/// channel while this thread reads, dispatches and enqueues responses, so
/// the read loop never blocks on a slow client.
fn serve_connection<R, W>(client_id: usize, reader: R, writer: W)
where
    R: Read,
    W: Write + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::unbounded::<Vec<u8>>();

    let writer_handle = thread::spawn(move || {
        let mut writer = writer;
        for frame in rx {
            if let Err(e) = write_frame(&mut writer, &frame) {
                eprintln!("[pdgslice] Client {} write error: {}", client_id, e);
                break;
            }
        }
    });

    let mut reader = reader;
    let mut state = SessionState::Start;

    loop {
        let frame = match read_frame(&mut reader) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                eprintln!("[pdgslice] Client {} disconnected", client_id);
                break;
            }
            Err(e) => {
                eprintln!("[pdgslice] Client {} read error: {}", client_id, e);
                break;
            }
        };

        let (cmd, rest) = decode_message(&frame);
        let response = match (std::str::from_utf8(cmd), std::str::from_utf8(rest)) {
            (Ok(cmd), Ok(rest)) => match Command::parse(cmd, rest) {
                Ok(command) => {
                    let previous = std::mem::replace(&mut state, SessionState::Start);
                    let (next, response) = dispatch(previous, command);
                    state = next;
                    response
                }
                Err(err) => Response::Error(err.to_string()),
            },
            _ => Response::Error("frame is not valid UTF-8".to_string()),
        };

        if tx.send(response.into_frame()).is_err() {
            break;
        }
    }

    drop(tx);
    let _ = writer_handle.join();
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("pdgslice-server {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("pdgslice-server {}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Slicing query service for program dependence graphs");
        println!();
        println!("Usage: pdgslice-server [--socket <socket-path>] [--stdio]");
        println!();
        println!("Flags:");
        println!("  --socket       Unix socket path (default: {})", DEFAULT_SOCKET);
        println!("  --stdio        Serve a single session on stdin/stdout");
        println!("  -V, --version  Print version information");
        println!("  -h, --help     Print this help message");
        return Ok(());
    }

    // Keep stdout clean: in --stdio mode it carries protocol frames.
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    if args.iter().any(|a| a == "--stdio") {
        serve_connection(0, io::stdin(), io::stdout());
        return Ok(());
    }

    let socket_path = args
        .iter()
        .position(|a| a == "--socket")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
        .unwrap_or(DEFAULT_SOCKET)
        .to_string();

    // Remove stale socket file
    let _ = std::fs::remove_file(&socket_path);

    let listener = UnixListener::bind(&socket_path)
        .with_context(|| format!("failed to bind socket {}", socket_path))?;
    eprintln!("[pdgslice] Listening on {}", socket_path);

    let socket_path_for_signal = socket_path.clone();
    let mut signals = signal_hook::iterator::Signals::new([
        signal_hook::consts::SIGINT,
        signal_hook::consts::SIGTERM,
    ])
    .context("failed to register signal handlers")?;

    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            eprintln!("[pdgslice] Received signal {}, exiting", sig);
            let _ = std::fs::remove_file(&socket_path_for_signal);
            std::process::exit(0);
        }
    });

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let client_id = NEXT_CLIENT_ID.fetch_add(1, Ordering::SeqCst);
                eprintln!("[pdgslice] Client {} connected", client_id);
                match stream.try_clone() {
                    Ok(write_half) => {
                        thread::spawn(move || serve_connection(client_id, stream, write_half));
                    }
                    Err(e) => {
                        eprintln!("[pdgslice] Client {} clone error: {}", client_id, e);
                    }
                }
            }
            Err(e) => {
                eprintln!("[pdgslice] Accept error: {}", e);
            }
        }
    }

    Ok(())
}
