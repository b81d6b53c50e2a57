use log::{info, warn};
use tokio::sync::mpsc::Sender;
use crate::mqtt::{PublishData, SubscribeData, Transmission, TOPIC_PREFIX};

pub const BRIDGE_DISCOVERY_TOPIC: &str = "homeassistant/device/sw2m_bridge/config";

pub struct CommandHandler {
   sender: Sender<Transmission>,
}

/// Discovery document for the bridge itself, restart button and uptime sensor
pub fn bridge_discovery() -> String {
    /* We are not using the HaDiscover and HaComponent stuff here because we know the json  */
    let json = r###"
    {
      "dev": {
        "ids":"sw2m_management",
        "name":"speedwire2mqtt Bridge",
        "manufacturer":"speedwire2mqtt",
        "model":"Bridge"
      },
      "o": {
        "name":"speedwire2mqtt",
        "sw_version":"@VERSION@"
      },
      "cmps":{
        "restart": {
          "p":"button",
          "device_class":"restart",
          "name":"restart",
          "object_id":"bridge_restart",
          "payload_press":"restart",
          "unique_id":"sw2m_management_bridge_restart",
          "command_topic": "@PREFIX@/mgt/command"
        },
        "uptime": {
          "p":"sensor",
          "name":"uptime",
          "object_id":"uptime",
          "unique_id":"sw2m_management_uptime",
          "state_topic": "@PREFIX@/mgt/uptime",
          "state_class": "measurement",
          "unit_of_measurement": "s"
        }
      }
    }"###;

    json.replace("@VERSION@", env!("CARGO_PKG_VERSION"))
        .replace("@PREFIX@", TOPIC_PREFIX)
}

impl CommandHandler {

  pub fn new(sender: Sender<Transmission>) -> Self {
    return CommandHandler {
      sender: sender,
    }
  }

  pub async fn start_thread(&self) {
        info!("Starting CommandHandler thread");
        /* We need to subscribe to an MQTT topic and wait for data to fill our buffers */
        let (sender, mut receiver) = tokio::sync::mpsc::channel(10);

        let register = Transmission::Subscribe(SubscribeData{
            topic: "mgt/command".to_string(),
            sender
        });

        if self.sender.send(register).await.is_err() {
            warn!("MQTT is gone, no commands will be received");
            return;
        }

        let p = Transmission::Publish(PublishData {
            topic: BRIDGE_DISCOVERY_TOPIC.to_string(),
            payload: bridge_discovery(),
            qos: 0,
            retain: true,
        });

        /* Send our data */
        let _ = self.sender.send(p).await;

        info!("Start waiting for command messages");
        while let Some(c) = receiver.recv().await {
            info!("Received command {c}");

            if c == "restart" {
                /* if we exit that thread the rest will exit, too */
                info!("Request to shutdown received");
                return;
            }
        }
  }
}
