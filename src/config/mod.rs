use lazy_static::lazy_static;
use log::{error, info};
use serde::{Deserialize, Serialize};
use serde_yml;
use std::fs::File;
use std::io::prelude::*;
use std::net::Ipv4Addr;
use std::sync::RwLock;
use thiserror::Error;

fn mqtt_client_name_default() -> String { return "speedwire2mqtt".to_string() }
fn mqtt_ha_enabled_default() -> bool { return true }

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub pass: String,
    #[serde(default="mqtt_ha_enabled_default")]
    pub ha_enabled: bool,
    #[serde(default="mqtt_client_name_default")]
    pub client_name: String,
}

/// Which set of records the meter sends and therefore which formulas
/// are used to fill the calculated values.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpeedwireVariant {
    /// Per phase import and export power is on the wire, current is derived
    Subtractive,
    /// Per phase current is on the wire, power is derived
    Multiplicative,
}

/// What to report for a phase current when the phase voltage is zero
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZeroVoltagePolicy {
    Unavailable,
    Zero,
}

fn speedwire_multicast_ip_default() -> Ipv4Addr { return Ipv4Addr::new(239, 12, 255, 254) }
fn speedwire_port_default() -> u16 { return 9522 }
fn speedwire_interface_default() -> Ipv4Addr { return Ipv4Addr::UNSPECIFIED }
fn speedwire_buffer_size_default() -> usize { return 1024 }
fn speedwire_variant_default() -> SpeedwireVariant { return SpeedwireVariant::Subtractive }
fn speedwire_zero_voltage_default() -> ZeroVoltagePolicy { return ZeroVoltagePolicy::Unavailable }
fn speedwire_meter_name_default() -> String { return "sma_em".to_string() }

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct SpeedwireConfig {
    #[serde(default="speedwire_multicast_ip_default")]
    pub multicast_ip: Ipv4Addr,
    #[serde(default="speedwire_port_default")]
    pub port: u16,
    #[serde(default="speedwire_interface_default")]
    pub interface: Ipv4Addr,
    #[serde(default="speedwire_buffer_size_default")]
    pub buffer_size: usize,
    #[serde(default="speedwire_variant_default")]
    pub variant: SpeedwireVariant,
    #[serde(default="speedwire_zero_voltage_default")]
    pub zero_voltage: ZeroVoltagePolicy,
    #[serde(default="speedwire_meter_name_default")]
    pub meter_name: String,
}

impl Default for SpeedwireConfig {
    fn default() -> Self {
        return SpeedwireConfig {
            multicast_ip: speedwire_multicast_ip_default(),
            port: speedwire_port_default(),
            interface: speedwire_interface_default(),
            buffer_size: speedwire_buffer_size_default(),
            variant: speedwire_variant_default(),
            zero_voltage: speedwire_zero_voltage_default(),
            meter_name: speedwire_meter_name_default(),
        }
    }
}

fn speedwire_default() -> SpeedwireConfig { return SpeedwireConfig::default() }

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    pub mqtt: MqttConfig,
    #[serde(default="speedwire_default")]
    pub speedwire: SpeedwireConfig,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read the config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unable to parse the config: {0}")]
    Parse(#[from] serde_yml::Error),
}

pub struct ConfigHolder {
    pub config: Config,
    pub base_path: String,
}

pub enum ConfigBases {
    Mqtt(MqttConfig),
    Speedwire(SpeedwireConfig),
}

impl ConfigHolder {
    pub fn load() -> Self {
        /* Check for the two paths of the config file */
        let loaded = match Self::load_from("config/") {
            Ok(c) => Ok(c),
            Err(e) => {
                info!("No usable config/sw2m.yaml ({e}), trying sw2m.yaml");
                Self::load_from("")
            }
        };

        match loaded {
            Ok(holder) => {
                info!("Using config {}sw2m.yaml", holder.base_path);
                holder
            },
            Err(e) => {
                error!("Unable to load the config on config/sw2m.yaml or sw2m.yaml: {e}");
                panic!("Unable to load the config on config/sw2m.yaml or sw2m.yaml: {e}");
            }
        }
    }

    pub fn load_from(base_path: &str) -> Result<Self, ConfigError> {
        let mut file = File::open(format!("{base_path}sw2m.yaml"))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        return Ok(ConfigHolder {
            config: Self::parse(&contents)?,
            base_path: base_path.to_string(),
        });
    }

    pub fn parse(contents: &str) -> Result<Config, ConfigError> {
        let c: Config = serde_yml::from_str(contents)?;
        return Ok(c);
    }

    pub fn get_copy(&self, base: &str) -> Option<ConfigBases> {
        match base {
            "mqtt" => { return Some(ConfigBases::Mqtt(self.config.mqtt.clone())) },
            "speedwire" => { return Some(ConfigBases::Speedwire(self.config.speedwire.clone())) },
            _ => { return None }
        }
    }
}

lazy_static! {
    pub static ref CONFIG: RwLock<ConfigHolder> = RwLock::new(ConfigHolder::load());
}

#[macro_export]
macro_rules! get_config_or_panic {
    ($base: expr, $pat: path) => {
        {
            let c = $crate::CONFIG.read().unwrap().get_copy($base).expect("config base not known");
            if let $pat(a) = c { // #1
                a
            } else {
                panic!(
                    "mismatch variant when cast to {}",
                    stringify!($pat)); // #2
            }
        }
    };
}
