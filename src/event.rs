use crate::firmware::FirmwareVersion;
use crate::protocol::Configuration;
use tokio::sync::mpsc;

/// Why the configuration display is cleared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Unavailable {
    NoDevice,
    CommunicationFailure,
    UnsupportedFirmware,
}

/// Shown at most once per device id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
    UnsupportedFirmware,
    UpdateRecommended(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteResult {
    Success,
    Failure(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Firmware {
        id: String,
        version: FirmwareVersion,
        description: String,
        update_recommended: bool,
    },
    Configuration(Configuration),
    Unavailable(Unavailable),
    Warning(Warning),
    WriteResult(WriteResult),
}

pub type EventSender = mpsc::UnboundedSender<Event>;
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
