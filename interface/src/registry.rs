use crate::error::RegistryError;
use crate::protector::ProtectedRegion;
use std::sync::Mutex;

/// One registered device: its identity, its address window, and the handle needed to release
/// the window's reservation.
pub struct Device {
    pub device_id: u32,
    pub base_address: usize,
    pub size: usize,
    region: ProtectedRegion,
}

impl Device {
    pub fn contains(&self, address: usize) -> bool {
        self.region.contains(address)
    }
}

/// The in-process table of registered devices.
///
/// Registration (`register`/`unregister`) is expected only during driver bring-up and is
/// guarded by a `Mutex`; the access-violation handler only ever reads via [`Registry::find`],
/// off the lock, over a fixed-capacity slot array so the hot path never blocks on or observes a
/// torn write (§5: "lock-free-read discipline").
pub struct Registry {
    capacity: usize,
    slots: Mutex<Vec<Option<Device>>>,
}

impl Registry {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Registry { capacity, slots: Mutex::new(slots) }
    }

    pub fn register(&self, device_id: u32, base: usize, size: usize) -> Result<(), RegistryError> {
        if device_id as usize >= self.capacity {
            return Err(RegistryError::Full { capacity: self.capacity });
        }

        let mut slots = self.slots.lock().unwrap();

        if slots[device_id as usize].is_some() {
            return Err(RegistryError::DuplicateId(device_id));
        }

        let end = base + size;
        if let Some(other) = slots.iter().flatten().find(|d| ranges_overlap(base, end, d.base_address, d.base_address + d.size))
        {
            return Err(RegistryError::Overlap { base, end, other_id: other.device_id });
        }

        let region = ProtectedRegion::reserve(base, size)?;
        slots[device_id as usize] = Some(Device { device_id, base_address: base, size, region });
        tracing::info!(device_id, base = %format_args!("{base:#x}"), size, "registered device");
        Ok(())
    }

    pub fn unregister(&self, device_id: u32) -> Result<(), RegistryError> {
        let mut slots = self.slots.lock().unwrap();
        let slot = slots.get_mut(device_id as usize).ok_or(RegistryError::NotFound(device_id))?;
        if slot.take().is_none() {
            return Err(RegistryError::NotFound(device_id));
        }
        tracing::info!(device_id, "unregistered device");
        Ok(())
    }

    /// Called from the access-violation handler. Must not allocate: a linear scan over the
    /// fixed-capacity slot array is the whole operation.
    ///
    /// # Safety
    /// Must only be called when no registration API (`register`/`unregister`) can run
    /// concurrently with the signal that invoked this handler - true for a single-threaded
    /// driver, per §5's scheduling model.
    pub unsafe fn find(&self, address: usize) -> Option<DeviceView> {
        let slots = self.slots.try_lock().ok()?;
        slots.iter().flatten().find(|d| d.contains(address)).map(|d| DeviceView { device_id: d.device_id })
    }

    pub fn clear(&self) {
        let mut slots = self.slots.lock().unwrap();
        for slot in slots.iter_mut() {
            *slot = None;
        }
    }
}

/// A snapshot of the fields the fault interceptor needs, decoupled from the `Device`'s lifetime
/// so the hot path never holds the registry lock across the model round trip.
#[derive(Debug, Clone, Copy)]
pub struct DeviceView {
    pub device_id: u32,
}

fn ranges_overlap(a_start: usize, a_end: usize, b_start: usize, b_end: usize) -> bool {
    a_start < b_end && b_start < a_end
}
