//! Speedwire bridge library
//!
//! Decodes the multicast datagrams of SMA energy meters, calculates the
//! derived values and hands them over to MQTT.

pub mod models;
pub mod mqtt;
pub mod config;
pub mod metering_speedwire;
pub mod obis_utils;

// Re-export common types for easier access
pub use models::{Device, DeviceStatus, DeviceProtocol};
pub use mqtt::{CALLBACKS, MeteringData};
pub use config::CONFIG;
pub use metering_speedwire::{SpeedwireManager, SpeedwireError};
pub use metering_speedwire::session::DecodingSession;

pub fn get_unix_ts() -> u64 {
    return std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
}

pub fn get_id(protocol: String, meter_name: &String) -> String {
    return format!("{}-{}-{:?}", protocol, meter_name, get_unix_ts());
}
