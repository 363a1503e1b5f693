use crate::event::{Event, EventReceiver, Unavailable, Warning, WriteResult};

/// Turns an event into the lines the CLI prints for it.
pub fn render(event: &Event) -> Vec<String> {
    match event {
        Event::Firmware {
            id,
            version,
            description,
            update_recommended,
        } => {
            let suffix = if *update_recommended {
                " (Update recommended)"
            } else {
                ""
            };
            vec![
                format!("Device ID:   {id}"),
                format!("Firmware:    {version}{suffix}"),
                format!("Description: {description}"),
            ]
        }
        Event::Configuration(config) => config.to_string().lines().map(String::from).collect(),
        Event::Unavailable(reason) => vec![match reason {
            Unavailable::NoDevice => "No device detected.".to_string(),
            Unavailable::CommunicationFailure => {
                "Device detected but not responding. Check the connection.".to_string()
            }
            Unavailable::UnsupportedFirmware => {
                "Configuration unavailable: unsupported firmware.".to_string()
            }
        }],
        Event::Warning(Warning::UnsupportedFirmware) => vec![
            "Warning: the firmware installed on this device is not supported by this app."
                .to_string(),
        ],
        Event::Warning(Warning::UpdateRecommended(latest)) => vec![format!(
            "Warning: firmware update recommended. Update to at least version {latest} to use all the features of this app."
        )],
        Event::WriteResult(WriteResult::Success) => vec!["Configuration applied.".to_string()],
        Event::WriteResult(WriteResult::Failure(reason)) => {
            vec![format!("Configuration failed: {reason}")]
        }
    }
}

/// Prints events until every sender is gone.
pub async fn print_events(mut events: EventReceiver) {
    while let Some(event) = events.recv().await {
        for line in render(&event) {
            println!("{line}");
        }
        if matches!(event, Event::Configuration(_)) {
            println!();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware::FirmwareVersion;

    #[test]
    fn test_render_firmware() {
        let lines = render(&Event::Firmware {
            id: "0123456789ABCDEF".to_string(),
            version: FirmwareVersion::new(1, 0, 0),
            description: "AudioMoth-USB-Microphone".to_string(),
            update_recommended: true,
        });
        assert_eq!(lines[1], "Firmware:    1.0.0 (Update recommended)");
    }

    #[test]
    fn test_render_unavailable() {
        assert_eq!(
            render(&Event::Unavailable(Unavailable::NoDevice)),
            vec!["No device detected.".to_string()]
        );
    }
}
