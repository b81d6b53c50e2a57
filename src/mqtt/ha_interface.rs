use serde::Serialize;

pub const ORIGIN_NAME: &str = "speedwire2mqtt";

#[derive(Serialize)]
pub struct HaDevice {
    ids: String,
    name: String,
    manufacturer: String,
    model: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    serial_number: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    sw_version: String,
}
#[derive(Serialize)]
pub struct HaOrigin {
    pub name: String,
    pub sw_version: String,
}

fn is_none_str(value: &String) -> bool {
    if value.is_empty() || value == "NONE" {
        return true;
    }
    return false;
}

#[derive(Serialize)]
pub struct HaComponent {
    pub p: String,
    pub name: String,
    #[serde(skip_serializing_if = "is_none_str")]
    pub device_class: String,
    #[serde(skip_serializing_if = "is_none_str")]
    pub unit_of_measurement: String,
    pub value_template: String,
    pub unique_id: String,
    pub object_id: String,
    pub via_device: String,
    #[serde(skip_serializing_if = "is_none_str")]
    pub state_class: String,
}

impl HaComponent {
    fn new_sensor(device: &str, proto: &str, name: &str, json_key: &str, dclass: &str, uof: &str, state_class: &str) -> Self {
        let safe_name = name.replace(" ", "_");
        return HaComponent {
            p: "sensor".to_string(),
            name: name.to_string(),
            device_class: dclass.to_string(),
            unit_of_measurement: uof.to_string(),
            value_template: format!("{{{{ value_json.{json_key} }}}}"),
            unique_id: format!("sw2m_{proto}_{device}_{safe_name}").to_lowercase(),
            object_id: format!("{device}_{safe_name}").to_lowercase(),
            state_class: state_class.to_string(),
            via_device: "sw2m_management".to_string(),
        }
    }

    pub fn new_energy(device: &str, uof: &str, proto: &str, name: &str, json_key: &str) -> Self {
        return Self::new_sensor(device, proto, name, json_key, "energy", uof, "total_increasing");
    }

    pub fn new_current(device: &str, proto: &str, name: &str, json_key: &str) -> Self {
        return Self::new_sensor(device, proto, name, json_key, "current", "A", "measurement");
    }

    pub fn new_power(device: &str, proto: &str, name: &str, json_key: &str) -> Self {
        return Self::new_sensor(device, proto, name, json_key, "power", "W", "measurement");
    }

    pub fn new_voltage(device: &str, proto: &str, name: &str, json_key: &str) -> Self {
        return Self::new_sensor(device, proto, name, json_key, "voltage", "V", "measurement");
    }

    /// Pick the component type from the unit of a published value
    pub fn for_unit(device: &str, proto: &str, name: &str, json_key: &str, unit: &str) -> Self {
        match unit {
            "W" => Self::new_power(device, proto, name, json_key),
            "V" => Self::new_voltage(device, proto, name, json_key),
            "A" => Self::new_current(device, proto, name, json_key),
            "kWh" | "Wh" => Self::new_energy(device, unit, proto, name, json_key),
            _ => Self::new_sensor(device, proto, name, json_key, "NONE", unit, "measurement"),
        }
    }
}

#[derive(Serialize)]
pub struct HaDiscover {
    pub dev: HaDevice,
    pub o: HaOrigin,
    pub cmps: serde_json::Map<String, serde_json::Value>,
    pub state_topic: String,
    pub qos: u32,
    #[serde(skip_serializing)]
    pub discover_topic: String,
}

impl HaDiscover {
    pub fn new(name: String, manu: String, model: String, proto: String) -> Self {
        return HaDiscover {
            discover_topic: format!("homeassistant/device/sw2m_{}-{}/config", proto, name),
            dev: HaDevice {
                ids: format!("sw2m_{}_{}", proto, name),
                name: name.clone(),
                manufacturer: manu,
                model: model,
                serial_number: String::new(),
                sw_version: String::new(),
            },
            o: HaOrigin {
                name: ORIGIN_NAME.to_string(),
                sw_version: env!("CARGO_PKG_VERSION").to_string(),
            },
            cmps: serde_json::Map::new(),
            state_topic: format!("speedwire2mqtt/devs/{}/{}", proto, name),
            qos: 2
        }
    }

    pub fn set_identity(&mut self, serial: String, sw_version: String) {
        self.dev.serial_number = serial;
        self.dev.sw_version = sw_version;
    }

    pub fn get_dev_id(&self) -> String {
        return self.dev.ids.clone();
    }
}
