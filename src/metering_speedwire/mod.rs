use crate::{config::{ConfigBases, SpeedwireConfig}, get_config_or_panic, models::DeviceProtocol};
use crate::mqtt::{ha_interface::{HaComponent, HaDiscover}, MeteringData, SubscribeData, TranmissionValueType, Transmission};
use log::{debug, error, info, warn};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, SocketAddrV4, Ipv4Addr};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::Sender;

pub mod structs;
pub mod parser;
pub mod utils;
pub mod meter_definitions;
pub mod derived;
pub mod session;

use session::DecodingSession;
use structs::Snapshot;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpeedwireError {
    #[error("Not a Speedwire datagram")]
    NotSpeedwire,
    #[error("Unknown SusyID {0}")]
    UnknownDevice(u16),
    #[error("Malformed datagram: {0}")]
    Malformed(String),
}

pub struct SpeedwireManager {
    sender: Sender<Transmission>,
    config: SpeedwireConfig,
    session: DecodingSession,
    announced: Option<u16>,
}

/// Bind to the Speedwire multicast group, other listeners on the same port are allowed
pub fn bind_multicast(config: &SpeedwireConfig) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port));
    socket.bind(&addr.into())?;
    socket.join_multicast_v4(&config.multicast_ip, &config.interface)?;
    socket.set_nonblocking(true)?;

    UdpSocket::from_std(socket.into())
}

/// Writes to our outputs are done by someone else, we accept all of them
pub fn handle_external_write(name: &str, value: &str) -> bool {
    debug!("someone else updated {name} to {value}");
    true
}

impl SpeedwireManager {
    pub fn new(sender: Sender<Transmission>) -> Self {
        let config: SpeedwireConfig = get_config_or_panic!("speedwire", ConfigBases::Speedwire);
        Self::with_config(sender, config)
    }

    pub fn with_config(sender: Sender<Transmission>, config: SpeedwireConfig) -> Self {
        let session = DecodingSession::new(config.variant, config.zero_voltage);
        SpeedwireManager {
            sender,
            config,
            session,
            announced: None,
        }
    }

    pub async fn start_thread(&mut self) {
        info!("Starting Speedwire thread");

        let socket = match bind_multicast(&self.config) {
            Ok(s) => s,
            Err(e) => {
                error!("Unable to listen on {}:{}: {e}", self.config.multicast_ip, self.config.port);
                return;
            }
        };

        self.register_writable_outputs().await;

        info!("Waiting for Speedwire datagrams on {}:{}", self.config.multicast_ip, self.config.port);
        let mut buf = vec![0u8; self.config.buffer_size];
        loop {
            match socket.recv_from(&mut buf).await {
                Ok((len, from)) => {
                    debug!("Received {len} bytes from {from}");
                    self.handle_datagram(&buf[..len]).await;
                }
                Err(e) => {
                    error!("Error receiving from Speedwire socket: {e}");
                    continue;
                }
            }
        }
    }

    async fn register_writable_outputs(&self) {
        let snapshot = self.session.snapshot();
        for value in snapshot.values {
            let (sender, mut receiver) = tokio::sync::mpsc::channel::<String>(10);
            let register = Transmission::Subscribe(SubscribeData {
                topic: format!("speedwire/set/{}", value.name),
                sender,
            });
            if self.sender.send(register).await.is_err() {
                error!("Unable to register write hook for {}", value.name);
                continue;
            }

            let name = value.name;
            tokio::spawn(async move {
                while let Some(payload) = receiver.recv().await {
                    handle_external_write(&name, &payload);
                }
            });
        }
    }

    pub async fn handle_datagram(&mut self, data: &[u8]) {
        match self.session.decode(data) {
            Ok(snapshot) => {
                if self.announced != Some(snapshot.device.susy_id) {
                    self.announce(&snapshot).await;
                    self.announced = Some(snapshot.device.susy_id);
                }
                self.publish(&snapshot).await;
            }
            Err(SpeedwireError::NotSpeedwire) => {
                debug!("Dropping {} bytes, not a Speedwire datagram", data.len());
            }
            Err(e) => {
                warn!("Could not read from SMA Energy Meter: {e}");
                debug!("Datagram: {}", hex::encode(data));
                let snapshot = self.session.snapshot();
                self.publish(&snapshot).await;
            }
        }
    }

    pub fn to_metering_data(&self, snapshot: &Snapshot) -> MeteringData {
        let mut metered_values = serde_json::Map::new();
        for value in snapshot.values.iter() {
            let v = match value.value {
                Some(v) => serde_json::json!(v),
                None => serde_json::Value::Null,
            };
            metered_values.insert(value.name.clone(), v);
        }
        metered_values.insert("update_index".to_string(), serde_json::json!(snapshot.update_index));
        metered_values.insert("serial".to_string(), serde_json::json!(snapshot.device.serial));
        metered_values.insert("model".to_string(), serde_json::json!(snapshot.device.model));
        metered_values.insert("firmware".to_string(), serde_json::json!(snapshot.device.firmware));

        let now = crate::get_unix_ts();
        MeteringData {
            id: crate::get_id("speedwire".to_string(), &self.config.meter_name),
            meter_name: self.config.meter_name.clone(),
            protocol: DeviceProtocol::Speedwire,
            transmission_time: now,
            transmission_type: TranmissionValueType::Now,
            metered_time: now,
            metered_values,
        }
    }

    pub fn discovery(&self, snapshot: &Snapshot) -> HaDiscover {
        let proto = DeviceProtocol::Speedwire.to_string();
        let mut disc = HaDiscover::new(
            self.config.meter_name.clone(),
            "SMA".to_string(),
            snapshot.device.model.clone(),
            proto.clone(),
        );
        disc.set_identity(snapshot.device.serial.to_string(), snapshot.device.firmware.clone());

        for value in snapshot.values.iter() {
            let cmp = HaComponent::for_unit(&self.config.meter_name, &proto, &value.name, &value.name, &value.unit);
            match serde_json::to_value(cmp) {
                Ok(v) => { disc.cmps.insert(value.name.clone(), v); }
                Err(e) => error!("Unable to build discovery for {}: {e}", value.name),
            }
        }
        disc
    }

    async fn announce(&self, snapshot: &Snapshot) {
        let disc = self.discovery(snapshot);
        if let Err(e) = self.sender.send(Transmission::AutoDiscovery(disc)).await {
            error!("Failed to send Speedwire discovery: {e}");
        }
    }

    async fn publish(&self, snapshot: &Snapshot) {
        let data = self.to_metering_data(snapshot);
        if let Err(e) = self.sender.send(Transmission::Metering(data)).await {
            error!("Failed to send Speedwire metering data: {e}");
        }
    }

    pub fn session(&self) -> &DecodingSession {
        &self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SpeedwireVariant, ZeroVoltagePolicy};
    use super::meter_definitions::*;
    use super::parser::test_frames::FrameBuilder;
    use tokio::sync::mpsc::Receiver;

    fn manager() -> (SpeedwireManager, Receiver<Transmission>) {
        let (tx, rx) = tokio::sync::mpsc::channel(32);
        let config = SpeedwireConfig {
            variant: SpeedwireVariant::Subtractive,
            zero_voltage: ZeroVoltagePolicy::Unavailable,
            ..SpeedwireConfig::default()
        };
        (SpeedwireManager::with_config(tx, config), rx)
    }

    fn frame(import: u32, export: u32) -> Vec<u8> {
        let l1 = PHASES[0];
        FrameBuilder::new(349, 1900123456)
            .u32_record(OBIS_IMPORT_POWER, import)
            .u32_record(OBIS_EXPORT_POWER, export)
            .u32_record(l1.voltage, 230_000)
            .u32_record(l1.import_power, 2_300)
            .u32_record(OBIS_SW_VERSION, 0x02001252)
            .end()
    }

    #[test]
    fn test_external_write_accepted() {
        assert!(handle_external_write("power", "42"));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(SpeedwireError::NotSpeedwire.to_string(), "Not a Speedwire datagram");
        assert_eq!(SpeedwireError::UnknownDevice(7).to_string(), "Unknown SusyID 7");
    }

    #[tokio::test]
    async fn test_first_datagram_announces() {
        let (mut mgr, mut rx) = manager();
        mgr.handle_datagram(&frame(1000, 200)).await;

        match rx.recv().await {
            Some(Transmission::AutoDiscovery(disc)) => {
                assert_eq!(disc.discover_topic, "homeassistant/device/sw2m_Speedwire-sma_em/config");
                let json = serde_json::to_value(&disc).unwrap();
                assert_eq!(json["dev"]["model"], "SMA-EM20");
                assert_eq!(json["dev"]["sw_version"], "2.0.18.R");
                assert_eq!(json["cmps"]["power"]["device_class"], "power");
                assert_eq!(json["cmps"]["import_energy"]["unit_of_measurement"], "kWh");
            }
            _ => panic!("expected discovery first"),
        }

        match rx.recv().await {
            Some(Transmission::Metering(data)) => {
                assert_eq!(data.meter_name, "sma_em");
                assert_eq!(data.protocol, DeviceProtocol::Speedwire);
                assert_eq!(data.metered_values["power"], serde_json::json!(80.0));
                assert_eq!(data.metered_values["l1_power"], serde_json::json!(230.0));
                assert_eq!(data.metered_values["l1_current"], serde_json::json!(1.0));
                assert_eq!(data.metered_values["l2_current"], serde_json::Value::Null);
                assert_eq!(data.metered_values["serial"], serde_json::json!(1900123456u32));
                assert_eq!(data.metered_values["update_index"], serde_json::json!(1));
                assert!(data.metered_values.get("sw_version_raw").is_none());
            }
            _ => panic!("expected metering data"),
        }

        mgr.handle_datagram(&frame(500, 0)).await;
        match rx.recv().await {
            Some(Transmission::Metering(data)) => {
                assert_eq!(data.metered_values["power"], serde_json::json!(50.0));
                assert_eq!(data.metered_values["update_index"], serde_json::json!(2));
            }
            _ => panic!("discovery is only sent once"),
        }
    }

    #[tokio::test]
    async fn test_foreign_datagram_is_ignored() {
        let (mut mgr, mut rx) = manager();
        mgr.handle_datagram(b"M-SEARCH * HTTP/1.1").await;
        assert!(rx.try_recv().is_err());
        assert_eq!(mgr.session().snapshot().update_index, 0);
    }

    #[tokio::test]
    async fn test_malformed_publishes_zero_power() {
        let (mut mgr, mut rx) = manager();
        mgr.handle_datagram(&frame(1000, 0)).await;
        let _ = rx.recv().await;
        let _ = rx.recv().await;

        let broken = FrameBuilder::new(349, 1900123456)
            .padded()
            .u32_record(OBIS_IMPORT_POWER, 9999)
            .raw(&OBIS_EXPORT_ENERGY.to_be_bytes())
            .raw(&[0x01, 0x02])
            .unterminated();
        mgr.handle_datagram(&broken).await;

        match rx.recv().await {
            Some(Transmission::Metering(data)) => {
                assert_eq!(data.metered_values["power"], serde_json::json!(0.0));
                assert_eq!(data.metered_values["l1_voltage"], serde_json::json!(230.0));
                assert_eq!(data.metered_values["update_index"], serde_json::json!(1));
            }
            _ => panic!("expected snapshot after malformed datagram"),
        }
        assert!(!mgr.session().snapshot().valid);
    }

    #[tokio::test]
    async fn test_register_writable_outputs() {
        let (mgr, mut rx) = manager();
        mgr.register_writable_outputs().await;

        let mut topics = Vec::new();
        while let Ok(Transmission::Subscribe(s)) = rx.try_recv() {
            topics.push(s.topic);
        }
        assert!(topics.contains(&"speedwire/set/power".to_string()));
        assert!(topics.contains(&"speedwire/set/l3_current".to_string()));
        assert!(!topics.contains(&"speedwire/set/import_power".to_string()));
    }
}
