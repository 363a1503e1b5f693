use crate::error::{Error, Result};
use crate::protocol::UINT16_MAX;

/// Clock parameters the firmware needs for one sample rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleRateProfile {
    pub clock_divider: u8,
    pub acquisition_cycles: u8,
    pub oversample_rate: u8,
    pub sample_rate: u32,
    pub sample_rate_divider: u8,
}

const fn profile(sample_rate: u32, sample_rate_divider: u8) -> SampleRateProfile {
    SampleRateProfile {
        clock_divider: 4,
        acquisition_cycles: 16,
        oversample_rate: 1,
        sample_rate,
        sample_rate_divider,
    }
}

// Keep these in sync with the firmware.
pub const SAMPLE_RATE_PROFILES: [SampleRateProfile; 8] = [
    profile(384_000, 48),
    profile(384_000, 24),
    profile(384_000, 12),
    profile(384_000, 8),
    profile(384_000, 4),
    profile(384_000, 2),
    profile(250_000, 1),
    profile(384_000, 1),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SampleRate {
    Khz8,
    Khz16,
    Khz32,
    Khz48,
    Khz96,
    Khz192,
    Khz250,
    Khz384,
}

impl SampleRate {
    pub const ALL: [SampleRate; 8] = [
        SampleRate::Khz8,
        SampleRate::Khz16,
        SampleRate::Khz32,
        SampleRate::Khz48,
        SampleRate::Khz96,
        SampleRate::Khz192,
        SampleRate::Khz250,
        SampleRate::Khz384,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn from_hz(hz: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|rate| rate.hz() == hz)
    }

    pub fn profile(self) -> &'static SampleRateProfile {
        &SAMPLE_RATE_PROFILES[self.index()]
    }

    /// Effective rate after the divider is applied.
    pub fn hz(self) -> u32 {
        let profile = self.profile();
        profile.sample_rate / profile.sample_rate_divider as u32
    }

    /// Granularity of filter frequencies at this rate, in Hz.
    pub fn filter_step_hz(self) -> u32 {
        match self {
            SampleRate::Khz8 | SampleRate::Khz16 | SampleRate::Khz32 | SampleRate::Khz48 => 100,
            SampleRate::Khz96 => 200,
            SampleRate::Khz192 | SampleRate::Khz250 => 500,
            SampleRate::Khz384 => 1000,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Gain {
    Low,
    LowMedium,
    Medium,
    MediumHigh,
    High,
}

impl Gain {
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Gain::Low),
            1 => Some(Gain::LowMedium),
            2 => Some(Gain::Medium),
            3 => Some(Gain::MediumHigh),
            4 => Some(Gain::High),
            _ => None,
        }
    }

    pub fn level(self) -> u8 {
        self as u8
    }
}

/// Filter frequencies are in the firmware's unit of 100 Hz.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Filter {
    None,
    LowPass(u16),
    HighPass(u16),
    BandPass(u16, u16),
}

impl Filter {
    /// Band-pass with the bounds put in order.
    pub fn band_pass(a: u16, b: u16) -> Self {
        Filter::BandPass(a.min(b), a.max(b))
    }

    /// Converts a frequency in Hz to the firmware unit, clamped to the Nyquist
    /// frequency of `rate` and rounded to the filter step for that rate.
    pub fn frequency_from_hz(rate: SampleRate, hz: u32) -> u16 {
        let step = rate.filter_step_hz();
        let clamped = hz.min(rate.hz() / 2);
        let snapped = ((clamped + step / 2) / step) * step;
        let snapped = snapped.min(rate.hz() / 2);
        (snapped / 100).min(UINT16_MAX as u32 - 1) as u16
    }

    /// The `(lower, higher)` pair written to the packet, sentinels included.
    pub fn bounds(self) -> (u16, u16) {
        match self {
            Filter::None => (0, 0),
            Filter::LowPass(higher) => (UINT16_MAX, higher),
            Filter::HighPass(lower) => (lower, UINT16_MAX),
            Filter::BandPass(lower, higher) => (lower, higher),
        }
    }

    /// Inverse of [`Filter::bounds`]. `(0, 0)` wins over every other reading.
    pub fn from_bounds(lower: u16, higher: u16) -> Self {
        if lower == 0 && higher == 0 {
            Filter::None
        } else if lower == UINT16_MAX {
            Filter::LowPass(higher)
        } else if higher == UINT16_MAX {
            Filter::HighPass(lower)
        } else {
            Filter::BandPass(lower, higher)
        }
    }
}

/// Everything the user picked, with no defaults filled in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    pub sample_rate: SampleRate,
    pub gain: Gain,
    pub filter: Filter,
    pub led_enabled: bool,
    pub energy_saver: bool,
    pub disable_48hz_dc_filter: bool,
    pub low_gain_range: bool,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let sentinel = |f: u16| f == UINT16_MAX;
        match self.filter {
            Filter::None => Ok(()),
            Filter::LowPass(f) | Filter::HighPass(f) if sentinel(f) => Err(Error::InvalidSettings(
                format!("filter frequency {f} is reserved"),
            )),
            Filter::LowPass(_) | Filter::HighPass(_) => Ok(()),
            Filter::BandPass(lower, higher) => {
                if sentinel(lower) || sentinel(higher) {
                    Err(Error::InvalidSettings(format!(
                        "band-pass bounds {lower}-{higher} use a reserved value"
                    )))
                } else if lower > higher {
                    Err(Error::InvalidSettings(format!(
                        "band-pass lower bound {lower} is above higher bound {higher}"
                    )))
                } else if lower == 0 && higher == 0 {
                    Err(Error::InvalidSettings(
                        "band-pass of 0-0 is indistinguishable from no filtering".to_string(),
                    ))
                } else {
                    Ok(())
                }
            }
        }
    }
}
