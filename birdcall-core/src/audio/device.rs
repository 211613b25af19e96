//! Audio input device enumeration.
//!
//! Device ids are positions in host enumeration order, which is what
//! [`DeviceStream::open`](super::DeviceStream::open) resolves them against.
//! The list is therefore never re-sorted.

use serde::{Deserialize, Serialize};

/// Metadata about an audio input device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Index to pass to `open`.
    pub id: usize,
    /// Human-readable device name reported by the OS.
    pub name: String,
    /// Largest channel count any supported input config offers.
    pub max_input_channels: u16,
    /// Whether this is the system default input device.
    pub is_default: bool,
    /// Heuristic flag for devices that likely capture system output.
    pub is_loopback_like: bool,
}

const LOOPBACK_KEYWORDS: &[&str] = &[
    "stereo mix",
    "what u hear",
    "loopback",
    "monitor of",
    "wave out",
];

/// Best-effort check for capture devices that record playback instead of a mic.
pub fn is_loopback_like_name(name: &str) -> bool {
    let lowered = name.trim().to_ascii_lowercase();
    LOOPBACK_KEYWORDS.iter().any(|k| lowered.contains(k))
}

/// List all audio input devices, in host order.
///
/// Returns an empty `Vec` if enumeration fails or no devices exist.
#[cfg(feature = "audio-cpal")]
pub fn list_input_devices() -> Vec<DeviceInfo> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    match host.input_devices() {
        Ok(devices) => devices
            .enumerate()
            .map(|(id, device)| {
                let name = device
                    .name()
                    .unwrap_or_else(|_| format!("Input Device {}", id + 1));
                let max_input_channels = device
                    .supported_input_configs()
                    .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
                    .unwrap_or(0);
                DeviceInfo {
                    id,
                    is_default: default_name.as_deref() == Some(name.as_str()),
                    is_loopback_like: is_loopback_like_name(&name),
                    max_input_channels,
                    name,
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!("failed to enumerate input devices: {e}");
            Vec::new()
        }
    }
}

#[cfg(not(feature = "audio-cpal"))]
pub fn list_input_devices() -> Vec<DeviceInfo> {
    vec![]
}

impl std::fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let marker = if self.is_default { ">" } else { " " };
        write!(
            f,
            "{marker} {:>2} {} ({} in)",
            self.id, self.name, self.max_input_channels
        )?;
        if self.is_loopback_like {
            write!(f, " [loopback?]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_loopback_names() {
        assert!(is_loopback_like_name("Stereo Mix (Realtek Audio)"));
        assert!(is_loopback_like_name("Monitor of Built-in Audio"));
        assert!(!is_loopback_like_name("Microphone Array (USB PnP Audio Device)"));
    }

    #[test]
    fn display_marks_default_and_loopback() {
        let info = DeviceInfo {
            id: 3,
            name: "Stereo Mix".into(),
            max_input_channels: 2,
            is_default: true,
            is_loopback_like: true,
        };
        assert_eq!(info.to_string(), ">  3 Stereo Mix (2 in) [loopback?]");
    }
}
