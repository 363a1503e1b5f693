//! Byte layout of the configuration packet.
//!
//! All multi-byte fields are little-endian:
//!
//! | offset | size | field |
//! | ------ | ---- | ----- |
//! | 0      | 4    | unix time of the scheduled transmission |
//! | 4      | 1    | gain |
//! | 5      | 1    | clock divider |
//! | 6      | 1    | acquisition cycles |
//! | 7      | 1    | oversample rate |
//! | 8      | 4    | sample rate |
//! | 12     | 1    | sample rate divider |
//! | 13     | 2    | lower filter frequency |
//! | 15     | 2    | higher filter frequency |
//! | 17     | 1    | flags |
//!
//! Packets read back from the device arrive in a response frame whose first
//! byte is the message type; the payload starts at [`RESPONSE_HEADER_LEN`].

use crate::error::{Error, Result};
use crate::settings::{Filter, Settings};
use std::fmt;

pub const UINT16_MAX: u16 = 0xFFFF;

pub const RESPONSE_HEADER_LEN: usize = 1;

pub const TIME_OFFSET: usize = 0;
const GAIN_OFFSET: usize = 4;
const CLOCK_DIVIDER_OFFSET: usize = 5;
const ACQUISITION_CYCLES_OFFSET: usize = 6;
const OVERSAMPLE_RATE_OFFSET: usize = 7;
const SAMPLE_RATE_OFFSET: usize = 8;
const SAMPLE_RATE_DIVIDER_OFFSET: usize = 12;
const LOWER_FILTER_OFFSET: usize = 13;
const HIGHER_FILTER_OFFSET: usize = 15;
const FLAGS_OFFSET: usize = 17;

/// Bytes covered by the layout above.
pub const LAYOUT_LEN: usize = FLAGS_OFFSET + 1;

const FLAG_ENERGY_SAVER: u8 = 1 << 0;
const FLAG_DISABLE_48HZ_DC_FILTER: u8 = 1 << 1;
const FLAG_LOW_GAIN_RANGE: u8 = 1 << 2;
const FLAG_DISABLE_LED: u8 = 1 << 3;

pub const GAIN_LABELS: [&str; 5] = ["Low", "Low-Medium", "Medium", "Medium-High", "High"];

fn write_le(packet: &mut [u8], start: usize, bytes: &[u8]) {
    for (i, byte) in bytes.iter().enumerate() {
        if let Some(slot) = packet.get_mut(start + i) {
            *slot = *byte;
        }
    }
}

fn read_le(packet: &[u8], start: usize, count: usize) -> u32 {
    (0..count).fold(0, |value, i| {
        let byte = packet.get(start + i).copied().unwrap_or(0);
        value | (byte as u32) << (8 * i)
    })
}

/// Serializes `settings` into a zero-filled buffer of `packet_length` bytes.
///
/// The time field is left at zero; see [`set_timestamp`].
pub fn encode(settings: &Settings, packet_length: usize) -> Result<Vec<u8>> {
    settings.validate()?;
    if packet_length < LAYOUT_LEN {
        return Err(Error::InvalidSettings(format!(
            "packet length {packet_length} cannot hold the {LAYOUT_LEN}-byte layout"
        )));
    }

    let mut packet = vec![0u8; packet_length];
    let profile = settings.sample_rate.profile();

    packet[GAIN_OFFSET] = settings.gain.level();
    packet[CLOCK_DIVIDER_OFFSET] = profile.clock_divider;
    packet[ACQUISITION_CYCLES_OFFSET] = profile.acquisition_cycles;
    packet[OVERSAMPLE_RATE_OFFSET] = profile.oversample_rate;
    write_le(&mut packet, SAMPLE_RATE_OFFSET, &profile.sample_rate.to_le_bytes());
    packet[SAMPLE_RATE_DIVIDER_OFFSET] = profile.sample_rate_divider;

    let (lower, higher) = settings.filter.bounds();
    write_le(&mut packet, LOWER_FILTER_OFFSET, &lower.to_le_bytes());
    write_le(&mut packet, HIGHER_FILTER_OFFSET, &higher.to_le_bytes());

    let mut flags = 0;
    if settings.energy_saver {
        flags |= FLAG_ENERGY_SAVER;
    }
    if settings.disable_48hz_dc_filter {
        flags |= FLAG_DISABLE_48HZ_DC_FILTER;
    }
    if settings.low_gain_range {
        flags |= FLAG_LOW_GAIN_RANGE;
    }
    if !settings.led_enabled {
        flags |= FLAG_DISABLE_LED;
    }
    packet[FLAGS_OFFSET] = flags;

    Ok(packet)
}

pub fn set_timestamp(packet: &mut [u8], unix_seconds: u32) {
    write_le(packet, TIME_OFFSET, &unix_seconds.to_le_bytes());
}

/// What the device reports it is configured with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Configuration {
    pub time: u32,
    /// Raw gain byte; may be outside the known levels.
    pub gain: u8,
    pub sample_rate: u32,
    pub sample_rate_divider: u8,
    pub filter: Filter,
    pub led_enabled: bool,
    pub energy_saver: bool,
    pub disable_48hz_dc_filter: bool,
    pub low_gain_range: bool,
}

/// Decodes a packet payload. Fields past the end of `packet` read as zero.
pub fn decode(packet: &[u8]) -> Configuration {
    let byte = |offset: usize| packet.get(offset).copied().unwrap_or(0);
    let flags = byte(FLAGS_OFFSET);
    let lower = read_le(packet, LOWER_FILTER_OFFSET, 2) as u16;
    let higher = read_le(packet, HIGHER_FILTER_OFFSET, 2) as u16;

    Configuration {
        time: read_le(packet, TIME_OFFSET, 4),
        gain: byte(GAIN_OFFSET),
        sample_rate: read_le(packet, SAMPLE_RATE_OFFSET, 4),
        sample_rate_divider: byte(SAMPLE_RATE_DIVIDER_OFFSET),
        filter: Filter::from_bounds(lower, higher),
        led_enabled: flags & FLAG_DISABLE_LED == 0,
        energy_saver: flags & FLAG_ENERGY_SAVER != 0,
        disable_48hz_dc_filter: flags & FLAG_DISABLE_48HZ_DC_FILTER != 0,
        low_gain_range: flags & FLAG_LOW_GAIN_RANGE != 0,
    }
}

/// Decodes a full response frame, skipping the message-type byte.
pub fn decode_response(frame: &[u8]) -> Configuration {
    decode(frame.get(RESPONSE_HEADER_LEN..).unwrap_or(&[]))
}

/// Compares `sent` with the payload of the device's echo over `length` bytes.
pub fn verify_echo(sent: &[u8], response: &[u8], length: usize) -> Result<()> {
    for offset in 0..length {
        let expected = sent.get(offset).copied().unwrap_or(0);
        let received = response.get(offset + RESPONSE_HEADER_LEN).copied();
        if received != Some(expected) {
            log::debug!("({offset}) {expected} - {received:?}");
            return Err(Error::ConfigurationMismatch {
                offset,
                sent: expected,
                received,
            });
        }
    }
    Ok(())
}

/// Formats a frequency in units of 100 Hz as kHz with one decimal place.
pub fn format_khz(frequency: u16) -> String {
    format!("{}.{}", frequency / 10, frequency % 10)
}

impl Configuration {
    pub fn gain_label(&self) -> &'static str {
        GAIN_LABELS.get(self.gain as usize).copied().unwrap_or("-")
    }

    pub fn sample_rate_label(&self) -> String {
        if self.sample_rate_divider == 0 {
            return "-".to_string();
        }
        let khz = self.sample_rate as f64 / self.sample_rate_divider as f64 / 1000.0;
        format!("{khz}kHz")
    }

    pub fn filter_label(&self) -> String {
        match self.filter {
            Filter::None => "None".to_string(),
            Filter::LowPass(higher) => format!("Low-pass ({}kHz)", format_khz(higher)),
            Filter::HighPass(lower) => format!("High-pass ({}kHz)", format_khz(lower)),
            Filter::BandPass(lower, higher) => format!(
                "Band-pass ({} - {}kHz)",
                format_khz(lower),
                format_khz(higher)
            ),
        }
    }

    pub fn additional_label(&self) -> String {
        let labels: Vec<&str> = [
            (self.disable_48hz_dc_filter, "Disable 48Hz DC filter"),
            (self.energy_saver, "Energy saver mode"),
            (self.low_gain_range, "Low gain range"),
        ]
        .into_iter()
        .filter_map(|(enabled, label)| enabled.then_some(label))
        .collect();

        if labels.is_empty() {
            "None".to_string()
        } else {
            labels.join(" / ")
        }
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sample rate: {}", self.sample_rate_label())?;
        writeln!(f, "Gain:        {}", self.gain_label())?;
        writeln!(f, "Filter:      {}", self.filter_label())?;
        write!(f, "Additional:  {}", self.additional_label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Gain, SampleRate};

    fn settings(filter: Filter) -> Settings {
        Settings {
            sample_rate: SampleRate::Khz48,
            gain: Gain::MediumHigh,
            filter,
            led_enabled: false,
            energy_saver: true,
            disable_48hz_dc_filter: false,
            low_gain_range: true,
        }
    }

    #[test]
    fn test_encoding_layout() {
        let mut packet = encode(&settings(Filter::BandPass(20, 0x1234)), 20).unwrap();
        set_timestamp(&mut packet, 0x6500_0001);
        assert_eq!(
            packet,
            vec![
                0x01, 0x00, 0x00, 0x65, // time
                3,    // gain
                4, 16, 1, // clock
                0x00, 0xDC, 0x05, 0x00, // 384000
                8,    // divider
                20, 0, // lower
                0x34, 0x12, // higher
                0b1101, // energy saver, low gain range, LED off
                0, 0, // zero fill
            ]
        );
    }

    #[test]
    fn test_encode_rejects_short_length() {
        assert!(encode(&settings(Filter::None), LAYOUT_LEN - 1).is_err());
    }

    #[test]
    fn test_round_trip_all_rates_gains_and_filters() {
        let filters = [
            Filter::None,
            Filter::LowPass(0),
            Filter::LowPass(120),
            Filter::HighPass(0),
            Filter::HighPass(35),
            Filter::BandPass(0, 1),
            Filter::BandPass(15, 1920),
        ];
        for rate in SampleRate::ALL {
            for level in 0..=4 {
                for filter in filters {
                    let mut input = settings(filter);
                    input.sample_rate = rate;
                    input.gain = Gain::from_level(level).unwrap();
                    input.led_enabled = level % 2 == 0;
                    input.disable_48hz_dc_filter = level > 2;

                    let config = decode(&encode(&input, LAYOUT_LEN).unwrap());
                    assert_eq!(config.gain, level);
                    assert_eq!(config.sample_rate, rate.profile().sample_rate);
                    assert_eq!(config.sample_rate_divider, rate.profile().sample_rate_divider);
                    assert_eq!(config.filter, filter);
                    assert_eq!(config.led_enabled, input.led_enabled);
                    assert_eq!(config.energy_saver, input.energy_saver);
                    assert_eq!(config.disable_48hz_dc_filter, input.disable_48hz_dc_filter);
                    assert_eq!(config.low_gain_range, input.low_gain_range);
                }
            }
        }
    }

    #[test]
    fn test_disabled_filter_encodes_zero_bounds() {
        let packet = encode(&settings(Filter::None), LAYOUT_LEN).unwrap();
        assert_eq!(&packet[13..17], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_zero_bounds_decode_as_no_filter() {
        let mut packet = vec![0xAB; LAYOUT_LEN];
        packet[13..17].copy_from_slice(&[0, 0, 0, 0]);
        assert_eq!(decode(&packet).filter, Filter::None);
    }

    #[test]
    fn test_low_pass_sentinel() {
        let packet = encode(&settings(Filter::LowPass(80)), LAYOUT_LEN).unwrap();
        assert_eq!(&packet[13..15], &[0xFF, 0xFF]);

        for higher in (0..UINT16_MAX).step_by(97).chain([0xFFFE]) {
            let mut packet = vec![0; LAYOUT_LEN];
            packet[13..15].copy_from_slice(&UINT16_MAX.to_le_bytes());
            packet[15..17].copy_from_slice(&higher.to_le_bytes());
            assert_eq!(decode(&packet).filter, Filter::LowPass(higher));
        }
    }

    #[test]
    fn test_high_pass_sentinel() {
        let packet = encode(&settings(Filter::HighPass(55)), LAYOUT_LEN).unwrap();
        assert_eq!(&packet[13..17], &[55, 0, 0xFF, 0xFF]);
        assert_eq!(decode(&packet).filter, Filter::HighPass(55));
    }

    #[test]
    fn test_decode_short_buffer() {
        let full = encode(&settings(Filter::LowPass(120)), LAYOUT_LEN).unwrap();

        let config = decode(&full[..LAYOUT_LEN - 1]);
        assert_eq!(config.sample_rate, 384_000);
        assert_eq!(config.filter, Filter::LowPass(120));
        assert!(config.led_enabled);
        assert!(!config.energy_saver);

        let config = decode(&full[..10]);
        assert_eq!(config.gain, 3);
        assert_eq!(config.sample_rate, 0xDC00);
        assert_eq!(config.filter, Filter::None);

        assert_eq!(decode(&[]).sample_rate, 0);
    }

    #[test]
    fn test_decode_response_skips_header() {
        let payload = encode(&settings(Filter::HighPass(10)), LAYOUT_LEN).unwrap();
        let mut frame = vec![0x05];
        frame.extend_from_slice(&payload);
        assert_eq!(decode_response(&frame), decode(&payload));
        assert_eq!(decode_response(&[]).gain, 0);
    }

    #[test]
    fn test_verify_echo_ignores_bytes_past_length() {
        let sent = vec![1, 2, 3, 4, 5, 6];
        let mut response = vec![0x06, 1, 2, 3, 4, 9, 9];
        assert!(verify_echo(&sent, &response, 4).is_ok());

        response[3] = 0;
        match verify_echo(&sent, &response, 4) {
            Err(Error::ConfigurationMismatch {
                offset,
                sent,
                received,
            }) => {
                assert_eq!(offset, 2);
                assert_eq!(sent, 3);
                assert_eq!(received, Some(0));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_verify_echo_short_response() {
        let sent = vec![1, 2, 3];
        assert!(verify_echo(&sent, &[0x06, 1, 2], 3).is_err());
    }

    #[test]
    fn test_format_khz_uses_integer_division() {
        assert_eq!(format_khz(0), "0.0");
        assert_eq!(format_khz(7), "0.7");
        assert_eq!(format_khz(123), "12.3");
        assert_eq!(format_khz(1920), "192.0");
    }

    #[test]
    fn test_labels() {
        let mut config = decode(&encode(&settings(Filter::BandPass(15, 1920)), LAYOUT_LEN).unwrap());
        assert_eq!(config.sample_rate_label(), "48kHz");
        assert_eq!(config.gain_label(), "Medium-High");
        assert_eq!(config.filter_label(), "Band-pass (1.5 - 192.0kHz)");
        assert_eq!(config.additional_label(), "Energy saver mode / Low gain range");

        config.gain = 7;
        config.energy_saver = false;
        config.low_gain_range = false;
        config.filter = Filter::LowPass(45);
        assert_eq!(config.gain_label(), "-");
        assert_eq!(config.additional_label(), "None");
        assert_eq!(config.filter_label(), "Low-pass (4.5kHz)");
    }
}
