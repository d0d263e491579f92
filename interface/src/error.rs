use thiserror::Error;

/// Errors returned by registration APIs, called from normal (non-signal) execution context.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry is full (capacity {capacity})")]
    Full { capacity: usize },

    #[error("device id {0} is already registered")]
    DuplicateId(u32),

    #[error("address window [{base:#x}, {end:#x}) overlaps device {other_id}")]
    Overlap { base: usize, end: usize, other_id: u32 },

    #[error("failed to reserve address window: {0}")]
    ReservationFailed(#[from] ProtectorError),

    #[error("device id {0} is not registered")]
    NotFound(u32),
}

/// Errors reserving or releasing a fixed-address protected window.
#[derive(Debug, Error)]
pub enum ProtectorError {
    #[error("base address {0:#x} is not page-aligned")]
    Misaligned(usize),

    #[error("window size must be non-zero and a multiple of the page size")]
    InvalidSize,

    #[error("mmap at fixed address {address:#x} failed: {source}")]
    MapFailed { address: usize, source: nix::Error },

    #[error("munmap at {address:#x} failed: {source}")]
    UnmapFailed { address: usize, source: nix::Error },
}

/// Errors from a single round trip over the model channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("model endpoint unreachable: {0}")]
    Unreachable(#[source] std::io::Error),

    #[error("short write to model channel ({written} of {expected} bytes)")]
    ShortWrite { written: usize, expected: usize },

    #[error("short read from model channel ({read} of {expected} bytes)")]
    ShortRead { read: usize, expected: usize },

    #[error("model reported error result {0}")]
    ModelError(i32),
}

/// Errors installing the library's signal handlers and publication file.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to install access-violation handler: {0}")]
    SignalInstall(#[source] nix::Error),

    #[error("failed to write publication file {path}: {source}")]
    PublicationWrite { path: String, source: std::io::Error },
}

/// Instruction forms the decoder doesn't recognize, surfaced only in strict decode mode.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unrecognized opcode {opcode:#x} at instruction pointer {rip:#x}")]
    UnknownOpcode { opcode: u8, rip: usize },
}
