use crate::config::Config;
use crate::error::{InitError, RegistryError};
use crate::{fault, interrupt, state};
use std::io::Write;

/// Installs the access-violation handler, the interrupt notification handler, and the
/// publication file, in that order (§4.7). Idempotent-safety is not required: calling `init`
/// twice reuses the first call's process-wide state (see [`crate::state::install`]) but
/// reinstalls both signal handlers.
pub fn init(config: Config) -> Result<(), InitError> {
    let state = state::install(config);

    fault::install()?;
    interrupt::install(&state.config)?;

    let path = state.config.publication_path(state.pid);
    let mut file = std::fs::File::create(&path)
        .map_err(|source| InitError::PublicationWrite { path: path.display().to_string(), source })?;
    write!(file, "{}", state.pid)
        .map_err(|source| InitError::PublicationWrite { path: path.display().to_string(), source })?;

    tracing::info!(pid = state.pid, publication = %path.display(), "interface initialized");
    Ok(())
}

/// `init` with every [`Config`] default (§6: zero-argument `init()` in the distilled table).
pub fn init_default() -> Result<(), InitError> {
    init(Config::default())
}

/// Reserves `[base, base + size)` for `device_id`, rejecting overlaps, duplicate ids, and ids
/// beyond the registry's capacity (§4.1).
pub fn register_device(device_id: u32, base: usize, size: usize) -> Result<(), RegistryError> {
    let state = state::get().expect("interface::init must be called before register_device");
    state.registry.register(device_id, base, size)
}

/// Releases `device_id`'s reserved window and removes its entry. Callers must quiesce any
/// in-flight fault for this device before unregistering (§4.1).
pub fn unregister_device(device_id: u32) -> Result<(), RegistryError> {
    let state = state::get().expect("interface::init must be called before unregister_device");
    state.registry.unregister(device_id)
}

/// Releases every registered device's reservation, empties the registry, and removes the
/// publication file. Signal handlers are left installed (§4.7).
pub fn cleanup() {
    let Some(state) = state::get() else { return };

    state.registry.clear();

    let path = state.config.publication_path(state.pid);
    let _ = std::fs::remove_file(&path);

    tracing::info!(pid = state.pid, "interface cleaned up");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> usize {
        unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
    }

    #[test]
    fn register_and_unregister_device_round_trip() {
        let runtime_dir = std::env::temp_dir().join(format!("interface-lifecycle-test-{}", std::process::id()));
        std::fs::create_dir_all(&runtime_dir).unwrap();
        init(Config::default().runtime_dir(&runtime_dir)).unwrap();

        let page = page();
        let base = 0x0000_7fa0_0000_0000usize & !(page - 1);
        register_device(0, base, page).unwrap();
        unregister_device(0).unwrap();
        cleanup();

        let _ = std::fs::remove_dir_all(&runtime_dir);
    }
}
