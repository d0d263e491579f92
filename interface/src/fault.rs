use crate::decoder::{self, Direction, Operand};
use crate::error::InitError;
use crate::state;
use crate::wire::{Command, Record};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

/// Longest instruction form this decoder recognizes: up to 2 prefix bytes, opcode, ModR/M, SIB,
/// 4 bytes of displacement, 4 bytes of immediate.
const MAX_INSTRUCTION_BYTES: usize = 12;

/// Installs the access-violation handler for `SIGSEGV` and `SIGBUS` (the two signals Linux can
/// raise for a `PROT_NONE` access, depending on the precise fault).
pub(crate) fn install() -> Result<(), InitError> {
    let action = SigAction::new(SigHandler::SigAction(handle_access_violation), SaFlags::SA_SIGINFO, SigSet::empty());

    // SAFETY: `handle_access_violation` only touches the process-wide state installed by
    // `state::install`, which is called before this handler can possibly run.
    unsafe {
        sigaction(Signal::SIGSEGV, &action).map_err(InitError::SignalInstall)?;
        sigaction(Signal::SIGBUS, &action).map_err(InitError::SignalInstall)?;
    }
    Ok(())
}

extern "C" fn handle_access_violation(_signum: libc::c_int, siginfo: *mut libc::siginfo_t, ucontext: *mut libc::c_void) {
    let Some(state) = state::get() else {
        fatal_exit(b"access violation before interface::init\n");
    };

    // SAFETY: invoked only by the kernel for SIGSEGV/SIGBUS, with a valid siginfo_t.
    let fault_addr = unsafe { (*siginfo).si_addr() as usize };

    // SAFETY: per §5, faults and registration never run concurrently in this design (single
    // driver thread; registration confined to non-signal context).
    let device = match unsafe { state.registry.find(fault_addr) } {
        Some(device) => device,
        None => write_fatal_diagnostic(fault_addr),
    };

    // SAFETY: `ucontext` is the `ucontext_t*` the kernel hands to an `SA_SIGINFO` handler.
    let mcontext = unsafe { &mut (*(ucontext as *mut libc::ucontext_t)).uc_mcontext };
    let rip = mcontext.gregs[libc::REG_RIP as usize] as usize;

    // SAFETY: `rip` points into the driver's own executable text, readable from this handler.
    let instruction_bytes = unsafe { std::slice::from_raw_parts(rip as *const u8, MAX_INSTRUCTION_BYTES) };

    let decoded = match decoder::decode(instruction_bytes, state.config.strict_decode, rip) {
        Ok(decoded) => decoded,
        Err(_) => write_fatal_decode_diagnostic(rip),
    };

    let data = match (decoded.direction, decoded.operand) {
        (Direction::Store, Operand::Immediate(value)) => value,
        (Direction::Store, Operand::Register(register)) => {
            let raw = mcontext.gregs[register.greg_index()] as u64;
            mask_to_width(raw, decoded.width)
        }
        (Direction::Load, _) => 0,
    };

    let command = if decoded.direction == Direction::Store { Command::Write } else { Command::Read };
    let request = Record::request(device.device_id, command, fault_addr as u32, data, decoded.width);

    let response = match crate::channel::round_trip(&state.config, request) {
        Ok(response) => response,
        Err(_) => fatal_exit(b"model channel round trip failed\n"),
    };

    if let (Direction::Load, Operand::Register(register)) = (decoded.direction, decoded.operand) {
        let slot = &mut mcontext.gregs[register.greg_index()];
        *slot = write_back(*slot as u64, response.data, decoded.width) as i64;
    }

    mcontext.gregs[libc::REG_RIP as usize] = (rip + decoded.instruction_length) as i64;
}

fn mask_to_width(value: u64, width: u32) -> u32 {
    match width {
        1 => (value & 0xFF) as u32,
        2 => (value & 0xFFFF) as u32,
        _ => (value & 0xFFFF_FFFF) as u32,
    }
}

/// Writes `data` into `current`, preserving upper bits not covered by `width` (§4.3 step 6):
/// width 1 touches only the low byte, width 2 the low halfword, width 4 zero-extends the full
/// 32-bit slot (clearing the upper 32 bits, matching real 32-bit `mov` semantics on x86-64).
fn write_back(current: u64, data: u32, width: u32) -> u64 {
    match width {
        1 => (current & !0xFFu64) | (data as u64 & 0xFF),
        2 => (current & !0xFFFFu64) | (data as u64 & 0xFFFF),
        _ => data as u64,
    }
}

fn write_fatal_diagnostic(fault_addr: usize) -> ! {
    write_fatal_diagnostic_with_prefix(b"fatal access violation at 0x", fault_addr)
}

fn write_fatal_decode_diagnostic(rip: usize) -> ! {
    write_fatal_diagnostic_with_prefix(b"unrecognized instruction at 0x", rip)
}

fn write_fatal_diagnostic_with_prefix(prefix: &[u8], address: usize) -> ! {
    let mut buf = [0u8; 64];
    let mut len = 0usize;
    for &b in prefix {
        buf[len] = b;
        len += 1;
    }
    len += write_hex(&mut buf[len..], address as u64);
    buf[len] = b'\n';
    len += 1;
    // SAFETY: `buf[..len]` is a fully initialized, ASCII-only slice written above.
    unsafe {
        libc::write(libc::STDERR_FILENO, buf.as_ptr() as *const libc::c_void, len);
    }
    unsafe { libc::_exit(1) }
}

fn fatal_exit(message: &[u8]) -> ! {
    // SAFETY: `message` is a valid byte slice owned by the caller for the duration of this call.
    unsafe {
        libc::write(libc::STDERR_FILENO, message.as_ptr() as *const libc::c_void, message.len());
    }
    unsafe { libc::_exit(1) }
}

/// Writes the hex digits of `value` (no leading zeros beyond a single `0`) into `out`, returning
/// the number of bytes written. Allocation-free, for use on the signal-handler hot path.
fn write_hex(out: &mut [u8], value: u64) -> usize {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    if value == 0 {
        out[0] = b'0';
        return 1;
    }
    let mut digits = [0u8; 16];
    let mut count = 0;
    let mut v = value;
    while v > 0 {
        digits[count] = DIGITS[(v & 0xF) as usize];
        v >>= 4;
        count += 1;
    }
    for i in 0..count {
        out[i] = digits[count - 1 - i];
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_hex_formats_without_leading_zeros() {
        let mut buf = [0u8; 16];
        let len = write_hex(&mut buf, 0x4000_0000);
        assert_eq!(&buf[..len], b"40000000");
    }

    #[test]
    fn write_hex_handles_zero() {
        let mut buf = [0u8; 16];
        let len = write_hex(&mut buf, 0);
        assert_eq!(&buf[..len], b"0");
    }

    #[test]
    fn write_back_preserves_upper_bits_by_width() {
        assert_eq!(write_back(0xFFFF_FFFF_FFFF_FF00, 0xAB, 1), 0xFFFF_FFFF_FFFF_FFAB);
        assert_eq!(write_back(0xFFFF_FFFF_FFFF_0000, 0xABCD, 2), 0xFFFF_FFFF_FFFF_ABCD);
        assert_eq!(write_back(0xFFFF_FFFF_0000_0000, 0x1234_5678, 4), 0x0000_0000_1234_5678);
    }
}
