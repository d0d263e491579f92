use nix::sys::signal::Signal;
use std::path::PathBuf;

/// Process-wide tunables, read once by [`crate::init`] and never mutated afterwards.
///
/// Every field has a default that matches the wire protocol and file layout fixed by the
/// external interfaces this crate implements against; the setters exist for tests and for
/// drivers that need to point at an alternate model instance.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) registry_capacity: usize,
    pub(crate) socket_path: PathBuf,
    pub(crate) runtime_dir: PathBuf,
    pub(crate) permissive_startup: bool,
    pub(crate) notification_signal: Signal,
    pub(crate) strict_decode: bool,
}

/// Hard cap on registered devices, matching the reference implementation's fixed-size table.
pub const DEFAULT_REGISTRY_CAPACITY: usize = 16;

impl Default for Config {
    fn default() -> Self {
        Config {
            registry_capacity: DEFAULT_REGISTRY_CAPACITY,
            socket_path: PathBuf::from("/tmp/driver_simulator_socket"),
            runtime_dir: PathBuf::from("/tmp"),
            permissive_startup: false,
            notification_signal: Signal::SIGUSR1,
            strict_decode: false,
        }
    }
}

impl Config {
    pub fn registry_capacity(mut self, capacity: usize) -> Self {
        self.registry_capacity = capacity;
        self
    }

    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = path.into();
        self
    }

    pub fn runtime_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.runtime_dir = dir.into();
        self
    }

    /// When set, an unreachable model channel is treated as a benign zero-value success
    /// instead of a fatal error. An absent model being silently treated as success can mask
    /// real driver bugs, so this defaults to off; call sites that need to tolerate a model
    /// that hasn't started yet can opt in explicitly.
    pub fn permissive_startup(mut self, permissive: bool) -> Self {
        self.permissive_startup = permissive;
        self
    }

    pub fn notification_signal(mut self, signal: Signal) -> Self {
        self.notification_signal = signal;
        self
    }

    /// When set, the decoder returns `DecodeError::UnknownOpcode` for unrecognized forms
    /// instead of the reference's silent 4-byte-load fallback.
    pub fn strict_decode(mut self, strict: bool) -> Self {
        self.strict_decode = strict;
        self
    }

    pub(crate) fn publication_path(&self, pid: i32) -> PathBuf {
        self.runtime_dir.join(format!("interface_driver_{pid}"))
    }

    pub(crate) fn side_channel_path(&self, pid: i32) -> PathBuf {
        self.runtime_dir.join(format!("interrupt_info_{pid}"))
    }
}
