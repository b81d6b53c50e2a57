use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};


/// Represents the status of a device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeviceStatus {
    Online,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeviceProtocol {
    Unknown,
    Speedwire,
}

impl DeviceProtocol {
    pub fn to_string(&self) -> String {
        match self {
            DeviceProtocol::Speedwire => "Speedwire".to_string(),
            DeviceProtocol::Unknown => "Unknown".to_string(),
        }
    }
}

/// Identity of the meter we are receiving from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// SusyID as used for the model lookup, 0 if the model is not known
    pub susy_id: u16,
    /// Model name out of the known hardware table
    pub model: String,
    /// Serial number as sent in the datagram header
    pub serial: u32,
    /// Firmware version, rendered from the software version record
    pub firmware: String,
    /// Current status of the device
    pub status: DeviceStatus,
    /// Last time the device was seen online
    pub last_seen: DateTime<Utc>,
}


impl Device {
    /// Create a device which has not been heard of yet
    pub fn new(susy_id: u16, model: String) -> Self {
        Device {
            susy_id,
            model,
            serial: 0,
            firmware: String::new(),
            status: DeviceStatus::Unknown,
            last_seen: Utc::now(),
        }
    }

    /// Update the device status
    pub fn update_status(&mut self, status: DeviceStatus) {
        self.status = status.clone();
        if self.status == DeviceStatus::Online {
            self.last_seen = Utc::now();
        }
    }

    pub fn is_active(&self) -> bool {
        return self.status == DeviceStatus::Online;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_names() {
        assert_eq!(DeviceProtocol::Speedwire.to_string(), "Speedwire");
        assert_eq!(DeviceProtocol::Unknown.to_string(), "Unknown");
    }

    #[test]
    fn test_device_goes_online() {
        let mut dev = Device::new(349, "SMA-EM20".to_string());
        assert!(!dev.is_active());
        let before = dev.last_seen;
        dev.update_status(DeviceStatus::Online);
        assert!(dev.is_active());
        assert!(dev.last_seen >= before);
    }
}
