use crate::error::InitError;
use crate::state::{self, GlobalState};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet};
use std::io::Read;

/// Installs the notification-signal handler (`Config::notification_signal`, default `SIGUSR1`).
pub(crate) fn install(config: &crate::config::Config) -> Result<(), InitError> {
    let action = SigAction::new(SigHandler::SigAction(handle_notification), SaFlags::SA_SIGINFO, SigSet::empty());

    // SAFETY: `handle_notification` only touches state installed by `state::install`, which
    // runs before this handler is reachable.
    unsafe {
        sigaction(config.notification_signal, &action).map_err(InitError::SignalInstall)?;
    }
    Ok(())
}

extern "C" fn handle_notification(_signum: libc::c_int, _siginfo: *mut libc::siginfo_t, _ucontext: *mut libc::c_void) {
    let Some(state) = state::get() else { return };

    let Some((device_id, interrupt_id)) = read_side_channel(state) else { return };

    let dispatch = state.dispatch.lock().unwrap();
    if let Some(Some(callback)) = dispatch.get(device_id as usize) {
        callback(interrupt_id);
    }
}

/// Reads and deletes the side-channel file, returning `None` on any absence or malformation so
/// spurious notifications never crash the driver (§4.6, §7).
fn read_side_channel(state: &GlobalState) -> Option<(u32, u32)> {
    let path = state.config.side_channel_path(state.pid);
    let mut contents = String::new();
    std::fs::File::open(&path).ok()?.read_to_string(&mut contents).ok()?;
    let _ = std::fs::remove_file(&path);

    let (device_id, interrupt_id) = contents.trim().split_once(',')?;
    let device_id: u32 = device_id.parse().ok()?;
    let interrupt_id: u32 = interrupt_id.parse().ok()?;
    Some((device_id, interrupt_id))
}

/// Registers `callback` as the handler for `device_id`'s interrupts. Called synchronously from
/// normal execution context, never from within the signal handler itself (§4.6).
pub fn register_interrupt_handler<F>(device_id: u32, callback: F) -> Result<(), InitError>
where
    F: Fn(u32) + Send + Sync + 'static,
{
    let state = state::get().expect("interface::init must be called before registering interrupt handlers");
    let mut dispatch = state.dispatch.lock().unwrap();
    let slot = dispatch
        .get_mut(device_id as usize)
        .unwrap_or_else(|| panic!("device id {device_id} exceeds registry capacity"));
    *slot = Some(Box::new(callback));
    Ok(())
}

#[cfg(test)]
fn empty_dispatch(capacity: usize) -> crate::state::DispatchTable {
    let mut dispatch = Vec::with_capacity(capacity);
    dispatch.resize_with(capacity, || None);
    dispatch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::{Arc, Mutex};

    #[test]
    fn missing_side_channel_file_is_ignored() {
        let config = Config::default().runtime_dir(std::env::temp_dir());
        let state = GlobalState {
            registry: crate::registry::Registry::new(4),
            dispatch: Mutex::new(empty_dispatch(4)),
            pid: 999_999,
            config,
        };
        assert!(read_side_channel(&state).is_none());
    }

    #[test]
    fn well_formed_file_parses_and_is_deleted() {
        let config = Config::default().runtime_dir(std::env::temp_dir());
        let pid = std::process::id() as i32 + 12345;
        let path = config.side_channel_path(pid);
        std::fs::write(&path, "0,7").unwrap();

        let state = GlobalState { registry: crate::registry::Registry::new(4), dispatch: Mutex::new(empty_dispatch(4)), pid, config };
        let parsed = read_side_channel(&state);
        assert_eq!(parsed, Some((0, 7)));
        assert!(!path.exists());
    }

    #[test]
    fn malformed_file_is_ignored_and_deleted() {
        let config = Config::default().runtime_dir(std::env::temp_dir());
        let pid = std::process::id() as i32 + 23456;
        let path = config.side_channel_path(pid);
        std::fs::write(&path, "not-a-valid-record").unwrap();

        let state = GlobalState { registry: crate::registry::Registry::new(4), dispatch: Mutex::new(empty_dispatch(4)), pid, config };
        assert!(read_side_channel(&state).is_none());
    }

    #[test]
    fn dispatch_invokes_registered_callback_once() {
        let invocations = Arc::new(Mutex::new(Vec::new()));
        let invocations_clone = invocations.clone();
        let dispatch: crate::state::DispatchTable =
            vec![Some(Box::new(move |id| invocations_clone.lock().unwrap().push(id))), None];

        let config = Config::default();
        let state = GlobalState { registry: crate::registry::Registry::new(4), dispatch: Mutex::new(dispatch), pid: 1, config };

        if let Some(Some(callback)) = state.dispatch.lock().unwrap().first() {
            callback(7);
        }
        assert_eq!(*invocations.lock().unwrap(), vec![7]);
    }
}
