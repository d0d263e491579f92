//! Scenarios 1-4 of the testable properties: a 32-bit store, a 32-bit load-after-store, an 8-bit
//! store/load pair, and an immediate store, all against a single registered device window.
//!
//! Requires a `model` instance already serving on the default socket path.

use interface::Config;
use std::ptr;

fn main() {
    tracing_subscriber::fmt::init();

    let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize };
    let base = 0x0000_6f00_0000_0000usize & !(page - 1);

    interface::init(Config::default().permissive_startup(true)).expect("interface init failed");
    interface::register_device(0, base, page).expect("register_device failed");

    unsafe {
        let word = base as *mut u32;
        ptr::write_volatile(word, 0x0000_0055);
        let readback = ptr::read_volatile(word);
        assert_eq!(readback, 0x0000_0055, "32-bit round trip did not echo the stored value");

        let byte = (base + 3) as *mut u8;
        ptr::write_volatile(byte, 0xAB);
        assert_eq!(ptr::read_volatile(byte), 0xAB, "8-bit round trip did not echo the stored value");

        ptr::write_volatile((base + 8) as *mut u32, 0x0000_0001);
    }

    tracing::info!("store/load demo completed successfully");
    interface::unregister_device(0).expect("unregister_device failed");
    interface::cleanup();
}
