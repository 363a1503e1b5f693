use crate::firmware::{Compatibility, FirmwareVersion};
use std::sync::{Arc, Mutex, MutexGuard};

/// What the host knows about the attached device between poll cycles.
#[derive(Clone, Debug, Default)]
pub struct DeviceSession {
    pub previous_id: Option<String>,
    pub firmware_version: FirmwareVersion,
    pub firmware_description: String,
    pub compatibility: Option<Compatibility>,
    pub firmware_warning_shown: bool,
    pub version_warning_shown: bool,
    /// Set while a configuration write is in flight.
    pub communicating: bool,
}

impl DeviceSession {
    /// Records `id` and reports whether it differs from the previous one.
    /// A different id means a different physical device, so the one-time
    /// warnings are armed again.
    pub fn observe_id(&mut self, id: &str) -> bool {
        if self.previous_id.as_deref() == Some(id) {
            return false;
        }
        self.firmware_warning_shown = false;
        self.version_warning_shown = false;
        self.previous_id = Some(id.to_string());
        true
    }

    /// Returns true the first time it is called for the current device.
    pub fn take_firmware_warning(&mut self) -> bool {
        !std::mem::replace(&mut self.firmware_warning_shown, true)
    }

    pub fn take_version_warning(&mut self) -> bool {
        !std::mem::replace(&mut self.version_warning_shown, true)
    }
}

/// Handle shared by the polling loop and the transmission scheduler.
/// The lock is never held across an `.await`.
#[derive(Clone, Debug, Default)]
pub struct SessionHandle(Arc<Mutex<DeviceSession>>);

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, DeviceSession> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_communicating(&self) -> bool {
        self.lock().communicating
    }

    pub fn snapshot(&self) -> DeviceSession {
        self.lock().clone()
    }

    /// Raises `communicating` until the returned guard is dropped.
    pub fn begin_communication(&self) -> CommunicationGuard {
        self.lock().communicating = true;
        CommunicationGuard {
            session: self.clone(),
        }
    }
}

pub struct CommunicationGuard {
    session: SessionHandle,
}

impl Drop for CommunicationGuard {
    fn drop(&mut self) {
        self.session.lock().communicating = false;
    }
}
