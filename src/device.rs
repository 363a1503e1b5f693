use crate::error::DeviceError;
use crate::firmware::FirmwareVersion;
use hidapi::HidApi;
use log::{debug, trace};
use std::future::Future;
use std::sync::{Arc, Mutex};

// Keep these in sync with the firmware's USB descriptor and message handler.
pub const VENDOR_ID: u16 = 0x10C4;
pub const PRODUCT_ID: u16 = 0x0002;
pub const REPORT_SIZE: usize = 64;
pub const READ_TIMEOUT_MS: i32 = 1000;

pub const MSG_GET_UID: u8 = 0x03;
pub const MSG_GET_APP_PACKET: u8 = 0x05;
pub const MSG_SET_APP_PACKET: u8 = 0x06;
pub const MSG_GET_FIRMWARE_VERSION: u8 = 0x07;
pub const MSG_GET_FIRMWARE_DESCRIPTION: u8 = 0x08;

const UID_LEN: usize = 8;
const FIRMWARE_DESCRIPTION_LEN: usize = 32;

pub type DeviceResult<T> = Result<Option<T>, DeviceError>;

/// The primitive calls the rest of the crate needs from a device.
///
/// `Ok(None)` means no device is attached. Packet calls return the whole
/// response frame, message-type byte included.
pub trait Device: Send + Sync {
    fn read_id(&self) -> impl Future<Output = DeviceResult<String>> + Send;

    fn read_firmware_version(&self) -> impl Future<Output = DeviceResult<FirmwareVersion>> + Send;

    fn read_firmware_description(&self) -> impl Future<Output = DeviceResult<String>> + Send;

    fn read_packet(&self) -> impl Future<Output = DeviceResult<Vec<u8>>> + Send;

    fn write_packet(&self, packet: &[u8]) -> impl Future<Output = DeviceResult<Vec<u8>>> + Send;
}

/// USB HID backend. The device is looked up and opened for every call so a
/// replugged or swapped unit is picked up without restarting.
#[derive(Clone)]
pub struct HidDevice {
    api: Arc<Mutex<HidApi>>,
    vendor_id: u16,
    product_id: u16,
}

impl HidDevice {
    pub fn new() -> Result<Self, DeviceError> {
        Ok(Self {
            api: Arc::new(Mutex::new(HidApi::new()?)),
            vendor_id: VENDOR_ID,
            product_id: PRODUCT_ID,
        })
    }

    async fn transfer(&self, message_type: u8, payload: &[u8]) -> DeviceResult<Vec<u8>> {
        let api = Arc::clone(&self.api);
        let (vendor_id, product_id) = (self.vendor_id, self.product_id);

        let mut request = vec![0u8; REPORT_SIZE + 1];
        request[1] = message_type;
        let room = REPORT_SIZE - 1;
        request[2..2 + payload.len().min(room)].copy_from_slice(&payload[..payload.len().min(room)]);

        tokio::task::spawn_blocking(move || -> DeviceResult<Vec<u8>> {
            let mut api = api
                .lock()
                .map_err(|err| DeviceError::Hid(format!("HID API lock poisoned: {err}")))?;
            api.refresh_devices()?;
            let present = api
                .device_list()
                .any(|info| info.vendor_id() == vendor_id && info.product_id() == product_id);
            if !present {
                return Ok(None);
            }

            let device = api.open(vendor_id, product_id)?;
            trace!("HID write {:02X?}", &request[..8]);
            device.write(&request)?;

            let mut response = vec![0u8; REPORT_SIZE];
            let read = device.read_timeout(&mut response, READ_TIMEOUT_MS)?;
            if read == 0 {
                return Err(DeviceError::ShortReply {
                    expected: 1,
                    actual: 0,
                });
            }
            response.truncate(read);
            if response[0] != message_type {
                return Err(DeviceError::UnexpectedReply {
                    expected: message_type,
                    actual: response[0],
                });
            }
            Ok(Some(response))
        })
        .await?
    }
}

fn require_len(frame: &[u8], expected: usize) -> Result<(), DeviceError> {
    if frame.len() < expected {
        Err(DeviceError::ShortReply {
            expected,
            actual: frame.len(),
        })
    } else {
        Ok(())
    }
}

/// UID bytes arrive least significant first; the id reads most significant first.
pub fn format_id(uid: &[u8]) -> String {
    uid.iter().rev().map(|byte| format!("{byte:02X}")).collect()
}

pub fn parse_description(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

impl Device for HidDevice {
    async fn read_id(&self) -> DeviceResult<String> {
        let Some(frame) = self.transfer(MSG_GET_UID, &[]).await? else {
            return Ok(None);
        };
        require_len(&frame, 1 + UID_LEN)?;
        Ok(Some(format_id(&frame[1..1 + UID_LEN])))
    }

    async fn read_firmware_version(&self) -> DeviceResult<FirmwareVersion> {
        let Some(frame) = self.transfer(MSG_GET_FIRMWARE_VERSION, &[]).await? else {
            return Ok(None);
        };
        require_len(&frame, 4)?;
        Ok(Some(FirmwareVersion::new(frame[1], frame[2], frame[3])))
    }

    async fn read_firmware_description(&self) -> DeviceResult<String> {
        let Some(frame) = self.transfer(MSG_GET_FIRMWARE_DESCRIPTION, &[]).await? else {
            return Ok(None);
        };
        let end = frame.len().min(1 + FIRMWARE_DESCRIPTION_LEN);
        Ok(Some(parse_description(&frame[1..end])))
    }

    async fn read_packet(&self) -> DeviceResult<Vec<u8>> {
        self.transfer(MSG_GET_APP_PACKET, &[]).await
    }

    async fn write_packet(&self, packet: &[u8]) -> DeviceResult<Vec<u8>> {
        debug!("Sending packet: {packet:?}");
        self.transfer(MSG_SET_APP_PACKET, packet).await
    }
}
