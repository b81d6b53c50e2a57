pub mod internal_commands;
pub mod ha_interface;

use std::collections::HashMap;
use lazy_static::lazy_static;
use tokio::sync::RwLock;
use crate::mqtt::ha_interface::HaDiscover;
use crate::{config::{ConfigBases, MqttConfig}, models::DeviceProtocol};
use crate::get_config_or_panic;
use log::{debug, error, info, warn};
use tokio::sync::mpsc::{Receiver, Sender};
use serde::{Serialize, Deserialize};
use serde_json;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::{Duration, Instant};

pub const TOPIC_PREFIX: &str = "speedwire2mqtt";

#[derive(Clone)]
pub struct AppStatus {
    pub start_time: Instant,
}

impl AppStatus {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub enum TranmissionValueType{
    Now,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct MeteringData {
    pub id: String,
    pub meter_name: String,
    pub protocol: DeviceProtocol,
    pub transmission_time: u64,
    pub transmission_type: TranmissionValueType,
    pub metered_time: u64,
    pub metered_values: serde_json::Map<String, serde_json::Value>
}

impl MeteringData {
    pub fn new() -> Self {
        return MeteringData {
            id: "".to_string(),
            meter_name: "".to_string(),
            protocol: DeviceProtocol::Unknown,
            transmission_time: 0,
            transmission_type: TranmissionValueType::Now,
            metered_time: 0,
            metered_values: serde_json::Map::new()
        };
    }
}

pub struct PublishData {
    pub topic: String,
    pub payload: String,
    pub qos: u8,
    pub retain: bool,
}

pub struct SubscribeData {
    pub topic: String,
    pub sender: tokio::sync::mpsc::Sender<String>
}

pub enum Transmission {
    Metering(MeteringData),
    AutoDiscovery(HaDiscover),
    Subscribe(SubscribeData),
    Publish(PublishData)
}

pub struct MqttManager {
    rx: Receiver<Transmission>,
    exit_thread: bool,
    ha_enabled: bool,
    client: AsyncClient,
}

pub struct Callbacks {
    calls: HashMap<String, Vec<tokio::sync::mpsc::Sender<String>>>,
}

impl Callbacks {
    pub fn new() -> Self {
        return Callbacks { calls: HashMap::new() };
    }

    pub fn insert(&mut self, topic: String, callback: tokio::sync::mpsc::Sender<String>) {
        debug!("Adding a callback to topic {topic}");
        self.calls.entry(topic).or_insert_with(Vec::new).push(callback);
    }

    pub async fn send(&self, topic: String, payload: String) {
        let v = match self.calls.get(&topic) {
            Some(v) => v,
            None => {
                debug!("Send for unknown topic {topic}");
                return;
            }
        };

        for call in v {
            debug!("Sending to callback: {payload}");
            if let Err(e) = call.send(payload.clone()).await {
                warn!("Callback for {topic} is gone: {e}");
            }
        }
    }

    pub fn get_topics(&self) -> Vec<String> {
        return self.calls.keys().cloned().collect();
    }

}

lazy_static! {
    pub static ref CALLBACKS: RwLock<Callbacks> = RwLock::new(Callbacks::new());
    pub static ref APP_STATUS: RwLock<AppStatus> = RwLock::new(AppStatus::new());
}

fn qos_from_u8(qos: u8) -> QoS {
    match qos {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtMostOnce,
    }
}

pub fn device_topic(data: &MeteringData) -> String {
    return format!("{}/devs/{:?}/{}", TOPIC_PREFIX, data.protocol, data.meter_name);
}

impl MqttManager {
    pub fn new() -> (Self, Sender<Transmission>) {
        let config: MqttConfig = get_config_or_panic!("mqtt", ConfigBases::Mqtt);
        return Self::with_config(&config);
    }

    pub fn with_config(config: &MqttConfig) -> (Self, Sender<Transmission>) {
        let (mtx,mrx) = tokio::sync::mpsc::channel(100);

        info!("MQTT connection to {}:{} starting up", config.host, config.port);
        let mut mqttoptions = MqttOptions::new(config.client_name.clone(), config.host.clone(), config.port);
        mqttoptions.set_keep_alive(Duration::from_secs(5));
        if !config.user.is_empty() {
            mqttoptions.set_credentials(config.user.clone(), config.pass.clone());
        }

        let (client, mut eventloop) = AsyncClient::new(mqttoptions, 10);

        // Spawn a new thread to handle the incomming commands
        let reconnect_c = client.clone();
        tokio::spawn( async move {
            info!("MQTT Eventloop started");
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(p))) => {
                        let topic = p.topic;
                        let payload = match String::from_utf8(p.payload.to_vec()) {
                            Ok(payload) => payload,
                            Err(_) => {
                                warn!("Ignoring non UTF-8 payload on {topic}");
                                continue;
                            }
                        };
                        debug!("Received MQTT message on {topic}: {payload:?}");

                        let callback = CALLBACKS.read().await;
                        callback.send(topic, payload).await;
                    },
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("Connected, resubscribing everything");

                        /* We are connected resubstribe to everything */
                        let callbacks = CALLBACKS.read().await.get_topics();
                        for callback in callbacks {
                            /* Move the resubscription to it's own thread */
                            let client_clone = reconnect_c.clone();
                            tokio::spawn(async move {
                                if let Err(e) = client_clone.subscribe(callback.clone(), QoS::AtLeastOnce).await {
                                    error!("Resubscribing {callback} failed: {e}");
                                }
                            });
                        }
                    },
                    Ok(_) => {},
                    Err(e) => {
                        error!("Error in MQTT {:?}, reconnecting ", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        return (MqttManager {
            client: client,
            rx: mrx,
            exit_thread: false,
            ha_enabled: config.ha_enabled,
        }, mtx);
    }

    pub async fn start_thread(&mut self) {

        // Handle all the incomming metering stuff
        while !self.exit_thread {
            let option = self.rx.recv().await;

            let transmission = match option {
                Some(t) => t,
                None => {
                    debug!("Reading returned none, we exit now");
                    self.exit_thread = true;
                    continue;
                }
            };

            match transmission {
                Transmission::Metering(data) => {
                    debug!("Metering data received: {}", data.id);
                    let raw = match serde_json::to_string(&data) {
                        Ok(raw) => raw,
                        Err(e) => { error!("Unable to serialize metering data: {e}"); continue; }
                    };
                    match self.client.publish(format!("{TOPIC_PREFIX}/raw"), QoS::AtLeastOnce, false, raw).await {
                        Err(e) => { error!("Error sending: {}", e); },
                        Ok(_) => { debug!("Send successfully"); }
                    }

                    if let Ok(values) = serde_json::to_string(&data.metered_values) {
                        let _ = self.client.publish(device_topic(&data), QoS::AtLeastOnce, false, values).await;
                    }
                },
                Transmission::AutoDiscovery(disc) => {
                    if !self.ha_enabled {
                        debug!("Home Assistant discovery disabled, dropping {}", disc.get_dev_id());
                        continue;
                    }
                    info!("Announcing {} to Home Assistant", disc.get_dev_id());
                    if let Ok(doc) = serde_json::to_string(&disc) {
                        let _ = self.client.publish(disc.discover_topic.clone(), QoS::AtLeastOnce, true, doc).await;
                    }
                }
                Transmission::Subscribe(subscribe_data) =>  {
                    let topic = format!("{TOPIC_PREFIX}/{}", subscribe_data.topic);
                    if self.client.subscribe(topic.clone(), QoS::AtLeastOnce).await.is_ok() {
                        CALLBACKS.write().await.insert(topic.clone(), subscribe_data.sender);
                        info!("Registered Callback {topic}");
                    }
                },
                Transmission::Publish(publish_data) => {
                    match self.client.publish(
                        publish_data.topic,
                        qos_from_u8(publish_data.qos),
                        publish_data.retain,
                        publish_data.payload
                    ).await {
                        Err(e) => { error!("Error publishing: {}", e); },
                        Ok(_) => { debug!("Published successfully"); }
                    }
                },
            };
        }

        info!("Thread exit, waiting");
    }
}

pub async fn get_app_status() -> AppStatus {
    APP_STATUS.read().await.clone()
}

pub async fn publish_uptime(mqtt_sender: &Sender<Transmission>) {
    let app_status = get_app_status().await;

    let uptime_publish = PublishData {
        topic: format!("{TOPIC_PREFIX}/mgt/uptime"),
        payload: app_status.uptime_seconds().to_string(),
        qos: 1,
        retain: true,
    };
    let _ = mqtt_sender.send(Transmission::Publish(uptime_publish)).await;
}
