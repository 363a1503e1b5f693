//! Clock-aligned configuration writes.
//!
//! The device sets its real-time clock from the timestamp embedded in the
//! packet, so the packet is held back until it will land on the whole second
//! it names. `USB_LAG` covers the time the HID pipeline takes to deliver it.

use crate::device::Device;
use crate::error::{Error, Result};
use crate::event::{Event, EventSender, WriteResult};
use crate::firmware::{Compatibility, VersionResolver};
use crate::protocol;
use crate::retry::Retry;
use crate::session::SessionHandle;
use crate::settings::Settings;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const USB_LAG: Duration = Duration::from_millis(20);
pub const MINIMUM_DELAY: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendPlan {
    /// How long to wait before handing the packet to the device.
    pub delay: Duration,
    /// Unix seconds to embed in the packet.
    pub timestamp: u32,
}

pub fn plan_send(now: SystemTime) -> SendPlan {
    let now_ms = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let lag = USB_LAG.as_millis() as i64;
    let minimum = MINIMUM_DELAY.as_millis() as i64;

    // Negative within the last `lag` ms of a second.
    let into_second = (now_ms % 1000) as i64;
    let mut delay = 1000 - into_second - lag;
    if delay < minimum {
        delay += 1000;
    }
    let delay = delay as u64;

    let send_ms = now_ms + delay;
    SendPlan {
        delay: Duration::from_millis(delay),
        timestamp: ((send_ms + 500) / 1000) as u32,
    }
}

pub struct Transmitter<D: Device> {
    device: Arc<D>,
    session: SessionHandle,
    resolver: VersionResolver,
    retry: Retry,
    events: EventSender,
}

impl<D: Device> Transmitter<D> {
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

    /// Builds the packet for `settings`, waits for the next send instant,
    /// writes it and checks the echo. The outcome is also published as a
    /// [`WriteResult`]. Nothing is resent on failure.
    pub async fn configure(&mut self, settings: &Settings) -> Result<()> {
        let result = self.schedule_and_send(settings).await;
        let outcome = match &result {
            Ok(()) => {
                info!("Configuration applied");
                WriteResult::Success
            }
            Err(err) => {
                warn!("Configuration failed: {err}");
                WriteResult::Failure(err.to_string())
            }
        };
        let _ = self.events.send(Event::WriteResult(outcome));
        result
    }

    async fn schedule_and_send(&mut self, settings: &Settings) -> Result<()> {
        let session = self.session.snapshot();
        if let Some(Compatibility::Incompatible) = session.compatibility {
            return Err(Error::UnsupportedFirmware {
                description: session.firmware_description,
            });
        }

        // Newer firmware only ever grows the packet, so build the longest one.
        let mut packet = protocol::encode(settings, self.resolver.max_packet_length())?;

        let plan = plan_send(SystemTime::now());
        protocol::set_timestamp(&mut packet, plan.timestamp);
        debug!("Configuring device: {:?}", protocol::decode(&packet));

        let _communicating = self.session.begin_communication();
        debug!("Sending in {:?}", plan.delay);
        tokio::time::sleep(plan.delay).await;

        self.send(&packet).await
    }

    async fn send(&mut self, packet: &[u8]) -> Result<()> {
        let device = &*self.device;
        let response = self
            .retry
            .call("write packet", || device.write_packet(packet))
            .await?;

        // Length goes by the firmware attached now, not the layout the packet
        // was built with; older firmware echoes a truncated view.
        let version = self.session.lock().firmware_version;
        let fallback = packet.len().min(response.len().saturating_sub(1));
        let length = self.resolver.packet_length(&version, fallback);
        debug!("Using packet length {length}");

        protocol::verify_echo(packet, &response, length)
    }
}
