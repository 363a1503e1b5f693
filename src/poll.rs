use crate::device::Device;
use crate::error::{Error, Result};
use crate::event::{Event, EventSender, Unavailable, Warning};
use crate::firmware::{Compatibility, FirmwareVersion, VersionResolver};
use crate::protocol::{self, Configuration};
use crate::retry::Retry;
use crate::session::SessionHandle;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const MILLISECONDS_IN_SECOND: u64 = 1000;

/// Time until the next half-second mark of the wall clock. Polls stay
/// phase-aligned to that mark however long the previous cycle took.
pub fn next_poll_delay(now: SystemTime) -> Duration {
    let millis = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64 % MILLISECONDS_IN_SECOND)
        .unwrap_or(0);
    let half = MILLISECONDS_IN_SECOND / 2;
    let delay = if millis <= half {
        half - millis
    } else {
        MILLISECONDS_IN_SECOND + half - millis
    };
    Duration::from_millis(delay)
}

/// Raw results of one round of reads.
#[derive(Clone, Debug)]
pub struct DeviceReadout {
    pub id: String,
    pub description: String,
    pub version: FirmwareVersion,
    pub frame: Vec<u8>,
}

pub struct PollingLoop<D: Device> {
    device: Arc<D>,
    session: SessionHandle,
    resolver: VersionResolver,
    retry: Retry,
    events: EventSender,
}

impl<D: Device> PollingLoop<D> {
    pub fn new(device: Arc<D>, session: SessionHandle, retry: Retry, events: EventSender) -> Self {
        Self {
            device,
            session,
            resolver: VersionResolver::default(),
            retry,
            events,
        }
    }

    pub fn with_resolver(mut self, resolver: VersionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    fn publish(&self, event: Event) {
        let _ = self.events.send(event);
    }

    async fn read_device(&mut self) -> Result<DeviceReadout> {
        let device = &*self.device;
        let id = self.retry.call("read id", || device.read_id()).await?;
        let description = self
            .retry
            .call("read firmware description", || device.read_firmware_description())
            .await?;
        let version = self
            .retry
            .call("read firmware version", || device.read_firmware_version())
            .await?;
        let frame = self.retry.call("read packet", || device.read_packet()).await?;
        Ok(DeviceReadout {
            id,
            description,
            version,
            frame,
        })
    }

    /// One cycle: read everything, check the firmware, publish.
    ///
    /// Returns the configuration that was published, or `None` when
    /// publishing was skipped because a write is in flight.
    pub async fn poll_once(&mut self) -> Result<Option<Configuration>> {
        let readout = match self.read_device().await {
            Ok(readout) => readout,
            Err(err) => {
                let reason = match err {
                    Error::NoDeviceAttached => Unavailable::NoDevice,
                    _ => Unavailable::CommunicationFailure,
                };
                debug!("Device unavailable: {err}");
                self.publish(Event::Unavailable(reason));
                return Err(err);
            }
        };

        let compatibility = self
            .resolver
            .resolve(&readout.description, &readout.version);

        let (show_firmware_warning, show_version_warning, communicating) = {
            let mut session = self.session.lock();
            if session.observe_id(&readout.id) {
                info!(
                    "Device {} attached: {} {}",
                    readout.id, readout.description, readout.version
                );
            }
            session.firmware_version = readout.version;
            session.firmware_description = readout.description.clone();
            session.compatibility = Some(compatibility);
            match compatibility {
                Compatibility::Incompatible => {
                    (session.take_firmware_warning(), false, session.communicating)
                }
                Compatibility::Usable {
                    update_recommended: true,
                } => (false, session.take_version_warning(), session.communicating),
                Compatibility::Usable { .. } => (false, false, session.communicating),
            }
        };

        self.publish(Event::Firmware {
            id: readout.id.clone(),
            version: readout.version,
            description: readout.description.clone(),
            update_recommended: matches!(
                compatibility,
                Compatibility::Usable {
                    update_recommended: true
                }
            ),
        });

        if !compatibility.is_usable() {
            if show_firmware_warning {
                warn!("Unsupported firmware {:?} on {}", readout.description, readout.id);
                self.publish(Event::Warning(Warning::UnsupportedFirmware));
            }
            self.publish(Event::Unavailable(Unavailable::UnsupportedFirmware));
            return Err(Error::UnsupportedFirmware {
                description: readout.description,
            });
        }

        if show_version_warning {
            info!(
                "Firmware {} is older than {}; update recommended",
                readout.version, self.resolver.latest
            );
            self.publish(Event::Warning(Warning::UpdateRecommended(
                self.resolver.latest.to_string(),
            )));
        }

        if communicating {
            debug!("Write in flight, not publishing this cycle");
            return Ok(None);
        }

        let config = protocol::decode_response(&readout.frame);
        self.publish(Event::Configuration(config));
        Ok(Some(config))
    }

    /// Polls forever, re-arming on the next half-second mark after every cycle.
    pub async fn run(mut self) {
        loop {
            let _ = self.poll_once().await;
            tokio::time::sleep(next_poll_delay(SystemTime::now())).await;
        }
    }
}
