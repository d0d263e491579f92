//! Scenario 5: register an interrupt callback, ask the reference model to raise a notification
//! for this process, and observe the callback fire exactly once with the expected argument.

use interface::Config;
use std::process::Command;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// The `model` binary built alongside this one, found next to our own executable so the demo
/// works from `cargo run` and from an installed `target/debug`/`target/release` directory alike.
fn model_binary_path() -> std::path::PathBuf {
    let mut path = std::env::current_exe().expect("failed to resolve current executable path");
    path.set_file_name(if cfg!(windows) { "model.exe" } else { "model" });
    path
}

fn main() {
    tracing_subscriber::fmt::init();

    interface::init(Config::default().permissive_startup(true)).expect("interface init failed");

    let observed = Arc::new(AtomicU32::new(u32::MAX));
    let observed_in_handler = observed.clone();
    interface::interrupt::register_interrupt_handler(0, move |interrupt_id| {
        observed_in_handler.store(interrupt_id, Ordering::SeqCst);
    })
    .expect("register_interrupt_handler failed");

    let pid = std::process::id();
    let status = Command::new(model_binary_path())
        .args(["send-interrupt", &pid.to_string(), "0", "7"])
        .status()
        .expect("failed to run model send-interrupt");
    assert!(status.success(), "model send-interrupt exited non-zero");

    // The notification signal is delivered asynchronously; give the handler a moment to run.
    for _ in 0..50 {
        if observed.load(Ordering::SeqCst) == 7 {
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    assert_eq!(observed.load(Ordering::SeqCst), 7, "interrupt callback did not fire with the expected argument");
    tracing::info!("interrupt demo completed successfully");
    interface::cleanup();
}
