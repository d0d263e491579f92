//! Reference device model: the external collaborator the `interface` crate's fault interceptor
//! talks to. Not part of the core crate (§1) - this exists so the core's testable properties
//! (§8) can be exercised end-to-end without a real hardware simulator.
//!
//! Behavior: each device gets its own byte-addressed store. A `WRITE` records `data` at
//! `address`; a `READ` returns the last value written at `address` (0 if never written) -
//! exactly the "cooperating echo-model" the round-trip law in §8 is stated against.

use clap::{Parser, Subcommand};
use interface::wire::{Command as WireCommand, Record};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Parser)]
#[command(about = "Reference device model for the interface crate")]
struct Cli {
    #[arg(long, default_value = "/tmp/driver_simulator_socket")]
    socket: PathBuf,

    #[command(subcommand)]
    command: Option<ModelCommand>,
}

#[derive(Subcommand)]
enum ModelCommand {
    /// Serve the wire protocol until killed (the default when no subcommand is given).
    Serve,
    /// Write the interrupt side-channel file for `pid` and raise the notification signal.
    SendInterrupt {
        pid: i32,
        device_id: u32,
        interrupt_id: u32,
        #[arg(long, default_value = "/tmp")]
        runtime_dir: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command.unwrap_or(ModelCommand::Serve) {
        ModelCommand::Serve => serve(&cli.socket),
        ModelCommand::SendInterrupt { pid, device_id, interrupt_id, runtime_dir } => {
            send_interrupt(&runtime_dir, pid, device_id, interrupt_id)
        }
    }
}

type Store = Arc<Mutex<HashMap<(u32, u32), u32>>>;

fn serve(socket_path: &Path) {
    let _ = std::fs::remove_file(socket_path);
    let listener = UnixListener::bind(socket_path).expect("failed to bind model socket");
    tracing::info!(socket = %socket_path.display(), "model listening");

    let store: Store = Arc::new(Mutex::new(HashMap::new()));

    for connection in listener.incoming() {
        match connection {
            Ok(stream) => handle_connection(stream, &store),
            Err(err) => tracing::warn!(%err, "failed to accept connection"),
        }
    }
}

fn handle_connection(mut stream: UnixStream, store: &Store) {
    let mut bytes = [0u8; std::mem::size_of::<Record>()];
    if stream.read_exact(&mut bytes).is_err() {
        return;
    }
    let request = Record::from_bytes(bytes);

    let response = match request.command() {
        Some(WireCommand::Write) => {
            store.lock().unwrap().insert((request.device_id, request.address), request.data);
            tracing::info!(
                device_id = request.device_id,
                address = %format_args!("{:#x}", request.address),
                data = %format_args!("{:#x}", request.data),
                "write"
            );
            Record { result: 0, ..request }
        }
        Some(WireCommand::Read) => {
            let data = store.lock().unwrap().get(&(request.device_id, request.address)).copied().unwrap_or(0);
            let truncated = truncate_to_length(data, request.length);
            tracing::info!(
                device_id = request.device_id,
                address = %format_args!("{:#x}", request.address),
                data = %format_args!("{:#x}", truncated),
                "read"
            );
            Record { data: truncated, result: 0, ..request }
        }
        None => Record { result: -1, ..request },
    };

    let _ = stream.write_all(&response.to_bytes());
}

fn truncate_to_length(value: u32, length: u32) -> u32 {
    match length {
        1 => value & 0xFF,
        2 => value & 0xFFFF,
        _ => value,
    }
}

fn send_interrupt(runtime_dir: &Path, pid: i32, device_id: u32, interrupt_id: u32) {
    let path = runtime_dir.join(format!("interrupt_info_{pid}"));
    std::fs::write(&path, format!("{device_id},{interrupt_id}")).expect("failed to write side-channel file");
    kill(Pid::from_raw(pid), Signal::SIGUSR1).expect("failed to signal driver process");
    tracing::info!(pid, device_id, interrupt_id, "sent interrupt notification");
}
