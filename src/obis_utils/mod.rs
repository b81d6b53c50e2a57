use std::collections::HashMap;
use std::fmt;
use lazy_static::lazy_static;

/// Speedwire OBIS id as sent on the wire: channel, index, type and tariff byte.
/// The type byte is 4 for actual values and 8 for counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedwireObis {
    pub channel: u8,
    pub index: u8,
    pub kind: u8,
    pub tariff: u8,
}

impl SpeedwireObis {
    pub fn from_id(id: u32) -> Self {
        let b = id.to_be_bytes();
        SpeedwireObis {
            channel: b[0],
            index: b[1],
            kind: b[2],
            tariff: b[3],
        }
    }

    pub fn to_id(&self) -> u32 {
        u32::from_be_bytes([self.channel, self.index, self.kind, self.tariff])
    }

    pub fn description(&self) -> Option<&'static str> {
        get_obis_description(&self.to_string())
    }
}

impl fmt::Display for SpeedwireObis {
    /// Electricity OBIS notation, the Speedwire channel is the B group
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "1-{}:{}.{}.{}", self.channel, self.index, self.kind, self.tariff)
    }
}

pub fn get_obis_description(obis_code: &str) -> Option<&'static str> {
    OBIS_DESCRIPTIONS.get(obis_code).map(|d| d.as_str())
}

lazy_static! {
    static ref OBIS_DESCRIPTIONS: HashMap<String, String> = get_speedwire_obis_descriptions();
}

fn get_speedwire_obis_descriptions() -> HashMap<String, String> {
    let mut map = HashMap::new();

    // Sum values
    let sums = [
        (1, "Active power +"),
        (2, "Active power -"),
        (3, "Reactive power +"),
        (4, "Reactive power -"),
        (9, "Apparent power +"),
        (10, "Apparent power -"),
    ];
    for (index, text) in sums {
        map.insert(format!("1-0:{index}.4.0"), format!("{text} (total)"));
        map.insert(format!("1-0:{index}.8.0"), format!("{} (total)", text.replace("power", "energy")));
    }
    map.insert("1-0:13.4.0".to_string(), "Power factor".to_string());
    map.insert("1-0:14.4.0".to_string(), "Supply frequency".to_string());

    // Phase values, L1 starts at index 21, L2 at 41, L3 at 61
    for (phase, base) in [("L1", 20u8), ("L2", 40u8), ("L3", 60u8)] {
        for (offset, text) in sums {
            map.insert(format!("1-0:{}.4.0", base + offset), format!("{text} ({phase})"));
            map.insert(format!("1-0:{}.8.0", base + offset), format!("{} ({phase})", text.replace("power", "energy")));
        }
        map.insert(format!("1-0:{}.4.0", base + 11), format!("Current ({phase})"));
        map.insert(format!("1-0:{}.4.0", base + 12), format!("Voltage ({phase})"));
        map.insert(format!("1-0:{}.4.0", base + 13), format!("Power factor ({phase})"));
    }

    // Software version
    map.insert("1-144:0.0.0".to_string(), "Software version".to_string());

    map
}
