use crate::config::Config;
use crate::registry::Registry;
use std::sync::{Mutex, OnceLock};

/// Process-wide state a signal handler cannot receive by argument, so it lives in a static
/// instead. See DESIGN NOTES §9 ("Global singleton state"): the device table, the interrupt
/// dispatch table, and the driver's own pid all have to be reachable from a bare `extern "C" fn`.
/// One slot per device id, set by [`crate::interrupt::register_interrupt_handler`].
pub(crate) type DispatchTable = Vec<Option<Box<dyn Fn(u32) + Send + Sync>>>;

pub(crate) struct GlobalState {
    pub registry: Registry,
    pub dispatch: Mutex<DispatchTable>,
    pub config: Config,
    pub pid: i32,
}

static STATE: OnceLock<GlobalState> = OnceLock::new();

pub(crate) fn install(config: Config) -> &'static GlobalState {
    STATE.get_or_init(|| {
        let capacity = config.registry_capacity;
        let mut dispatch = Vec::with_capacity(capacity);
        dispatch.resize_with(capacity, || None);
        GlobalState { registry: Registry::new(capacity), dispatch: Mutex::new(dispatch), pid: std::process::id() as i32, config }
    })
}

pub(crate) fn get() -> Option<&'static GlobalState> {
    STATE.get()
}
