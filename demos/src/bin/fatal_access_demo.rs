//! Scenario 6: touching an address outside every registered window is a genuine fault. The
//! process is expected to print a diagnostic naming the faulting address and exit non-zero.

use interface::Config;
use std::ptr;

fn main() {
    tracing_subscriber::fmt::init();

    let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize };
    let base = 0x0000_6f10_0000_0000usize & !(page - 1);
    let unmapped = base + 0x1000_0000;

    interface::init(Config::default()).expect("interface init failed");
    interface::register_device(0, base, page).expect("register_device failed");

    tracing::warn!(address = %format_args!("{unmapped:#x}"), "about to touch an address outside every registered window");

    unsafe {
        ptr::read_volatile(unmapped as *const u32);
    }

    unreachable!("fault interceptor should have terminated the process before this point");
}
