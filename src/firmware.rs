// Information about the firmware, not the firmware itself.
// Keep these tables in sync with the firmware releases.

use std::cmp::Ordering;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl FirmwareVersion {
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Three numeric components compared in order; equal is not older.
    pub fn is_older_than(&self, other: &FirmwareVersion) -> bool {
        let a = [self.major, self.minor, self.patch];
        let b = [other.major, other.minor, other.patch];
        for (x, y) in a.iter().zip(b.iter()) {
            match x.cmp(y) {
                Ordering::Greater => return false,
                Ordering::Less => return true,
                Ordering::Equal => {}
            }
        }
        false
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl From<[u8; 3]> for FirmwareVersion {
    fn from(v: [u8; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

pub fn is_older_version(a: [u8; 3], b: [u8; 3]) -> bool {
    FirmwareVersion::from(a).is_older_than(&FirmwareVersion::from(b))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketLengthVersion {
    pub firmware_version: FirmwareVersion,
    pub packet_length: usize,
}

/// Ascending by version; newer firmware understands longer packets.
pub const PACKET_LENGTH_VERSIONS: &[PacketLengthVersion] = &[
    PacketLengthVersion {
        firmware_version: FirmwareVersion::new(1, 0, 0),
        packet_length: 17,
    },
    PacketLengthVersion {
        firmware_version: FirmwareVersion::new(1, 1, 0),
        packet_length: 18,
    },
];

pub const LATEST_FIRMWARE_VERSION: FirmwareVersion = FirmwareVersion::new(1, 2, 0);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    OfficialRelease,
    OfficialReleaseCandidate,
    /// Custom build that reports the official version it is equivalent to.
    CustomEquivalent,
    Unsupported,
}

pub const KNOWN_DESCRIPTIONS: &[(&str, Classification)] = &[
    ("AudioMoth-USB-Microphone", Classification::OfficialRelease),
    (
        "AudioMoth-USB-Microphone-RC",
        Classification::OfficialReleaseCandidate,
    ),
    (
        "AudioMoth-USB-Microphone-Custom",
        Classification::CustomEquivalent,
    ),
];

pub fn classify(description: &str) -> Classification {
    VersionResolver::default().classify(description)
}

/// Length of the newest layout; the buffer every packet is built in.
pub fn max_packet_length(table: &[PacketLengthVersion]) -> usize {
    table.last().map(|entry| entry.packet_length).unwrap_or(0)
}

/// Walks `table` and keeps the length of the last entry whose version is not
/// newer than `version`. If the first entry is already newer, the first
/// entry's length is the floor. An empty table selects `fallback`.
pub fn select_packet_length(
    table: &[PacketLengthVersion],
    version: &FirmwareVersion,
    fallback: usize,
) -> usize {
    let mut length = match table.first() {
        Some(first) => first.packet_length,
        None => return fallback,
    };
    for entry in table {
        if version.is_older_than(&entry.firmware_version) {
            break;
        }
        length = entry.packet_length;
    }
    length
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compatibility {
    Usable { update_recommended: bool },
    Incompatible,
}

impl Compatibility {
    pub fn is_usable(&self) -> bool {
        matches!(self, Compatibility::Usable { .. })
    }
}

/// Resolves a description/version pair against the static tables.
#[derive(Clone, Copy, Debug)]
pub struct VersionResolver {
    pub known_descriptions: &'static [(&'static str, Classification)],
    pub packet_lengths: &'static [PacketLengthVersion],
    pub latest: FirmwareVersion,
}

impl Default for VersionResolver {
    fn default() -> Self {
        Self {
            known_descriptions: KNOWN_DESCRIPTIONS,
            packet_lengths: PACKET_LENGTH_VERSIONS,
            latest: LATEST_FIRMWARE_VERSION,
        }
    }
}

impl VersionResolver {
    pub fn classify(&self, description: &str) -> Classification {
        self.known_descriptions
            .iter()
            .find(|(known, _)| *known == description)
            .map(|(_, classification)| *classification)
            .unwrap_or(Classification::Unsupported)
    }

    pub fn resolve(&self, description: &str, version: &FirmwareVersion) -> Compatibility {
        match self.classify(description) {
            Classification::Unsupported => Compatibility::Incompatible,
            Classification::OfficialRelease
            | Classification::OfficialReleaseCandidate
            | Classification::CustomEquivalent => Compatibility::Usable {
                update_recommended: version.is_older_than(&self.latest),
            },
        }
    }

    pub fn max_packet_length(&self) -> usize {
        max_packet_length(self.packet_lengths)
    }

    pub fn packet_length(&self, version: &FirmwareVersion, fallback: usize) -> usize {
        select_packet_length(self.packet_lengths, version, fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_older_version() {
        assert!(is_older_version([1, 2, 3], [1, 2, 4]));
        assert!(!is_older_version([1, 3, 0], [1, 2, 9]));
        assert!(!is_older_version([1, 2, 3], [1, 2, 3]));
        assert!(is_older_version([0, 9, 9], [1, 0, 0]));
        assert!(!is_older_version([2, 0, 0], [1, 9, 9]));
    }

    #[test]
    fn test_select_packet_length() {
        let table = [
            PacketLengthVersion {
                firmware_version: FirmwareVersion::new(0, 0, 0),
                packet_length: 10,
            },
            PacketLengthVersion {
                firmware_version: FirmwareVersion::new(1, 0, 0),
                packet_length: 12,
            },
            PacketLengthVersion {
                firmware_version: FirmwareVersion::new(2, 0, 0),
                packet_length: 16,
            },
        ];
        assert_eq!(select_packet_length(&table, &FirmwareVersion::new(1, 5, 0), 99), 12);
        assert_eq!(select_packet_length(&table, &FirmwareVersion::new(0, 9, 0), 99), 10);
        assert_eq!(select_packet_length(&table, &FirmwareVersion::new(2, 0, 0), 99), 16);
        assert_eq!(select_packet_length(&table, &FirmwareVersion::new(9, 0, 0), 99), 16);
        assert_eq!(select_packet_length(&[], &FirmwareVersion::new(1, 0, 0), 99), 99);
        assert_eq!(max_packet_length(&table), 16);
    }

    #[test]
    fn test_select_packet_length_below_first_entry() {
        assert_eq!(
            select_packet_length(PACKET_LENGTH_VERSIONS, &FirmwareVersion::new(0, 1, 0), 42),
            17
        );
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("AudioMoth-USB-Microphone"), Classification::OfficialRelease);
        assert_eq!(
            classify("AudioMoth-USB-Microphone-RC"),
            Classification::OfficialReleaseCandidate
        );
        assert_eq!(
            classify("AudioMoth-USB-Microphone-Custom"),
            Classification::CustomEquivalent
        );
        assert_eq!(classify("AudioMoth-Firmware-Basic"), Classification::Unsupported);
        assert_eq!(classify(""), Classification::Unsupported);
    }

    #[test]
    fn test_resolve() {
        let resolver = VersionResolver::default();
        let old = FirmwareVersion::new(1, 0, 0);

        assert_eq!(
            resolver.resolve("AudioMoth-USB-Microphone", &old),
            Compatibility::Usable {
                update_recommended: true
            }
        );
        assert_eq!(
            resolver.resolve("AudioMoth-USB-Microphone-Custom", &LATEST_FIRMWARE_VERSION),
            Compatibility::Usable {
                update_recommended: false
            }
        );
        assert_eq!(
            resolver.resolve("Something-Else", &LATEST_FIRMWARE_VERSION),
            Compatibility::Incompatible
        );
        assert!(!Compatibility::Incompatible.is_usable());
    }

    #[test]
    fn test_version_display() {
        assert_eq!(FirmwareVersion::new(1, 10, 2).to_string(), "1.10.2");
    }
}
