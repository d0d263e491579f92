use bytemuck::{Pod, Zeroable};

/// Command discriminant for the fixed-layout wire record (§6: `command: u32`, 1=READ, 2=WRITE).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Read = 1,
    Write = 2,
}

/// The fault-triggered request/response record, transmitted as-is over the model channel.
///
/// Layout is fixed by the external interface: six native-endian `u32`/`i32` fields, in this
/// order, with no framing beyond one record per direction per connection. `Pod`/`Zeroable`
/// give us a zero-copy cast to and from `[u8; size_of::<Record>()]` without hand-rolled
/// byte-shuffling.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct Record {
    pub device_id: u32,
    pub command: u32,
    pub address: u32,
    pub data: u32,
    pub length: u32,
    pub result: i32,
}

impl Record {
    pub fn request(device_id: u32, command: Command, address: u32, data: u32, length: u32) -> Self {
        Record { device_id, command: command as u32, address, data, length, result: 0 }
    }

    pub fn command(&self) -> Option<Command> {
        match self.command {
            1 => Some(Command::Read),
            2 => Some(Command::Write),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.result < 0
    }

    pub fn to_bytes(&self) -> [u8; std::mem::size_of::<Record>()] {
        bytemuck::cast(*self)
    }

    pub fn from_bytes(bytes: [u8; std::mem::size_of::<Record>()]) -> Self {
        bytemuck::cast(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let record = Record::request(3, Command::Write, 0x4000_0000, 0x55, 4);
        let bytes = record.to_bytes();
        assert_eq!(Record::from_bytes(bytes), record);
    }

    #[test]
    fn write_request_ignores_data_on_read_response() {
        let response = Record { device_id: 0, command: 1, address: 0x40000000, data: 0x55, length: 4, result: 0 };
        assert_eq!(response.command(), Some(Command::Read));
        assert!(!response.is_error());
    }
}
