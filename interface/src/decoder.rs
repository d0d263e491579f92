use crate::error::DecodeError;

/// Direction of the faulting memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Load,
    Store,
}

/// Where a store's value comes from, or where a load's result goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// The x86-64 general-purpose register named by a ModR/M `reg` field (0-7: rax, rcx, rdx,
    /// rbx, rsp, rbp, rsi, rdi - the register set addressable without a REX.R extension bit,
    /// per the decoder's documented minimalism, §4.4).
    Register(GpRegister),
    /// An immediate value embedded in the instruction bytes after the addressing bytes.
    Immediate(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum GpRegister {
    Rax,
    Rcx,
    Rdx,
    Rbx,
    Rsp,
    Rbp,
    Rsi,
    Rdi,
}

impl GpRegister {
    fn from_modrm_field(field: u8) -> Option<Self> {
        Some(match field & 0b111 {
            0 => GpRegister::Rax,
            1 => GpRegister::Rcx,
            2 => GpRegister::Rdx,
            3 => GpRegister::Rbx,
            4 => GpRegister::Rsp,
            5 => GpRegister::Rbp,
            6 => GpRegister::Rsi,
            7 => GpRegister::Rdi,
            _ => return None,
        })
    }

    /// Index into `mcontext_t::gregs`, per Linux's `sys/ucontext.h` `REG_*` offsets.
    pub fn greg_index(self) -> usize {
        (match self {
            GpRegister::Rax => libc::REG_RAX,
            GpRegister::Rcx => libc::REG_RCX,
            GpRegister::Rdx => libc::REG_RDX,
            GpRegister::Rbx => libc::REG_RBX,
            GpRegister::Rsp => libc::REG_RSP,
            GpRegister::Rbp => libc::REG_RBP,
            GpRegister::Rsi => libc::REG_RSI,
            GpRegister::Rdi => libc::REG_RDI,
        }) as usize
    }
}

/// Everything the fault interceptor needs to build a request and resume the driver: direction,
/// width, data source/destination, and the faulting instruction's total byte length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub direction: Direction,
    pub width: u32,
    pub operand: Operand,
    pub instruction_length: usize,
}

const MOV_STORE_R8_TO_RM8: u8 = 0x88;
const MOV_STORE_R32_TO_RM32: u8 = 0x89;
const MOV_LOAD_RM8_TO_R8: u8 = 0x8A;
const MOV_LOAD_RM32_TO_R32: u8 = 0x8B;
const MOV_STORE_IMM8_TO_RM8: u8 = 0xC6;
const MOV_STORE_IMM32_TO_RM32: u8 = 0xC7;
const OPERAND_SIZE_PREFIX: u8 = 0x66;

/// Decodes the instruction at `bytes` (read from the interrupted instruction pointer `rip`,
/// included only to label a `DecodeError::UnknownOpcode` with the address it came from).
///
/// Supports the register-memory and immediate-memory move forms listed in §4.4, with their
/// 16-bit-operand-size-prefixed variants. Unrecognized opcodes fall back to a 4-byte load
/// (legacy reference behavior, a known limitation rather than a correctness goal) unless
/// `strict` is set, in which case they surface as [`DecodeError::UnknownOpcode`].
pub fn decode(bytes: &[u8], strict: bool, rip: usize) -> Result<Decoded, DecodeError> {
    let mut cursor = 0usize;

    let mut operand_size_prefix = false;
    while let Some(&byte) = bytes.get(cursor) {
        match byte {
            OPERAND_SIZE_PREFIX => {
                operand_size_prefix = true;
                cursor += 1;
            }
            // REX prefixes (0x40-0x4F): consumed for length accounting; the extension bits are
            // not decoded (documented limitation, see `GpRegister::from_modrm_field`).
            0x40..=0x4F => cursor += 1,
            _ => break,
        }
    }

    let opcode = *bytes.get(cursor).ok_or(DecodeError::UnknownOpcode { opcode: 0, rip })?;
    let opcode_at = cursor;
    cursor += 1;

    let is_immediate_store = matches!(opcode, MOV_STORE_IMM8_TO_RM8 | MOV_STORE_IMM32_TO_RM32);
    let recognized = matches!(
        opcode,
        MOV_STORE_R8_TO_RM8
            | MOV_STORE_R32_TO_RM32
            | MOV_LOAD_RM8_TO_R8
            | MOV_LOAD_RM32_TO_R32
            | MOV_STORE_IMM8_TO_RM8
            | MOV_STORE_IMM32_TO_RM32
    );

    if !recognized {
        if strict {
            return Err(DecodeError::UnknownOpcode { opcode, rip });
        }
        // Legacy fallback: treat as a 4-byte load with no decodable operand, per §4.4.
        return Ok(Decoded {
            direction: Direction::Load,
            width: 4,
            operand: Operand::Register(GpRegister::Rax),
            instruction_length: opcode_at + 1,
        });
    }

    let modrm = *bytes.get(cursor).ok_or(DecodeError::UnknownOpcode { opcode, rip })?;
    cursor += 1;
    let modrm_mod = modrm >> 6;
    let modrm_reg = (modrm >> 3) & 0b111;
    let modrm_rm = modrm & 0b111;

    // SIB byte: present whenever mod != 11 and rm == 100.
    let has_sib = modrm_mod != 0b11 && modrm_rm == 0b100;
    let mut sib_base_is_disp32 = false;
    if has_sib {
        let sib = *bytes.get(cursor).ok_or(DecodeError::UnknownOpcode { opcode, rip })?;
        cursor += 1;
        sib_base_is_disp32 = modrm_mod == 0b00 && (sib & 0b111) == 0b101;
    }

    let displacement_bytes = match modrm_mod {
        0b00 if modrm_rm == 0b101 => 4, // RIP-relative disp32
        0b00 if sib_base_is_disp32 => 4,
        0b00 => 0,
        0b01 => 1,
        0b10 => 4,
        _ => 0, // 0b11: register-direct, no displacement (not a memory operand)
    };
    cursor += displacement_bytes;

    let width: u32 = if matches!(opcode, MOV_STORE_R8_TO_RM8 | MOV_LOAD_RM8_TO_R8 | MOV_STORE_IMM8_TO_RM8) {
        1
    } else if operand_size_prefix {
        2
    } else {
        4
    };

    let direction = if matches!(opcode, MOV_LOAD_RM32_TO_R32 | MOV_LOAD_RM8_TO_R8) {
        Direction::Load
    } else {
        Direction::Store
    };

    let operand = if is_immediate_store {
        let imm_bytes = width.min(4) as usize;
        let start = cursor;
        let end = cursor + imm_bytes;
        let raw = bytes.get(start..end).ok_or(DecodeError::UnknownOpcode { opcode, rip })?;
        cursor = end;
        let mut value = 0u32;
        for (i, byte) in raw.iter().enumerate() {
            value |= (*byte as u32) << (8 * i);
        }
        Operand::Immediate(value)
    } else {
        let register = GpRegister::from_modrm_field(modrm_reg).ok_or(DecodeError::UnknownOpcode { opcode, rip })?;
        Operand::Register(register)
    };

    Ok(Decoded { direction, width, operand, instruction_length: cursor })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_32bit_store_register_to_memory() {
        // mov [rax], ecx -> 89 08  (modrm: mod=00 reg=001(ecx) rm=000(rax))
        let bytes = [0x89, 0x08, 0xCC, 0xCC];
        let decoded = decode(&bytes, true, 0).unwrap();
        assert_eq!(decoded.direction, Direction::Store);
        assert_eq!(decoded.width, 4);
        assert_eq!(decoded.operand, Operand::Register(GpRegister::Rcx));
        assert_eq!(decoded.instruction_length, 2);
    }

    #[test]
    fn decodes_32bit_load_memory_to_register() {
        // mov eax, [rbx] -> 8B 03 (modrm: mod=00 reg=000(eax) rm=011(rbx))
        let bytes = [0x8B, 0x03];
        let decoded = decode(&bytes, true, 0).unwrap();
        assert_eq!(decoded.direction, Direction::Load);
        assert_eq!(decoded.width, 4);
        assert_eq!(decoded.operand, Operand::Register(GpRegister::Rax));
        assert_eq!(decoded.instruction_length, 2);
    }

    #[test]
    fn decodes_8bit_store_and_load() {
        // mov [rax], cl -> 88 08
        let store = decode(&[0x88, 0x08], true, 0).unwrap();
        assert_eq!(store.direction, Direction::Store);
        assert_eq!(store.width, 1);
        assert_eq!(store.operand, Operand::Register(GpRegister::Rcx));

        // mov al, [rbx] -> 8A 03
        let load = decode(&[0x8A, 0x03], true, 0).unwrap();
        assert_eq!(load.direction, Direction::Load);
        assert_eq!(load.width, 1);
        assert_eq!(load.operand, Operand::Register(GpRegister::Rax));
    }

    #[test]
    fn decodes_32bit_immediate_store() {
        // mov dword [rax], 0x00000001 -> C7 00 01 00 00 00
        let bytes = [0xC7, 0x00, 0x01, 0x00, 0x00, 0x00];
        let decoded = decode(&bytes, true, 0).unwrap();
        assert_eq!(decoded.direction, Direction::Store);
        assert_eq!(decoded.width, 4);
        assert_eq!(decoded.operand, Operand::Immediate(1));
        assert_eq!(decoded.instruction_length, 6);
    }

    #[test]
    fn decodes_8bit_immediate_store() {
        // mov byte [rax], 0xAB -> C6 00 AB
        let bytes = [0xC6, 0x00, 0xAB];
        let decoded = decode(&bytes, true, 0).unwrap();
        assert_eq!(decoded.width, 1);
        assert_eq!(decoded.operand, Operand::Immediate(0xAB));
        assert_eq!(decoded.instruction_length, 3);
    }

    #[test]
    fn decodes_16bit_prefixed_variant() {
        // mov [rax], cx -> 66 89 08
        let bytes = [0x66, 0x89, 0x08];
        let decoded = decode(&bytes, true, 0).unwrap();
        assert_eq!(decoded.width, 2);
        assert_eq!(decoded.instruction_length, 3);
    }

    #[test]
    fn handles_sib_and_displacement() {
        // mov [rax + rbx*1 + 0x10], ecx -> 89 4C 18 10 (modrm mod=01 reg=ecx rm=100(SIB), sib=00 011 000, disp8=0x10)
        let bytes = [0x89, 0x4C, 0x18, 0x10];
        let decoded = decode(&bytes, true, 0).unwrap();
        assert_eq!(decoded.instruction_length, 4);
    }

    #[test]
    fn strict_mode_rejects_unknown_opcode() {
        let err = decode(&[0x90], true, 0x4000_1234);
        assert!(matches!(err, Err(DecodeError::UnknownOpcode { opcode: 0x90, rip: 0x4000_1234 })));
    }

    #[test]
    fn legacy_mode_falls_back_to_4byte_load() {
        let decoded = decode(&[0x90], false, 0x1000).unwrap();
        assert_eq!(decoded.direction, Direction::Load);
        assert_eq!(decoded.width, 4);
    }
}
