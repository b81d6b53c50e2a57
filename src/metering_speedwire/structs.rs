use std::collections::HashMap;
use serde::Serialize;
use crate::models::Device;
use super::utils::round2;

// Speedwire framing
pub const SMA_MARKER: &[u8; 3] = b"SMA";
pub const MIN_DATAGRAM_LEN: usize = 101;
pub const SUSY_ID_OFFSET: usize = 18;
pub const SERIAL_OFFSET: usize = 20;
pub const TIME_TICK_OFFSET: usize = 24;
pub const OBIS_START_OFFSET: usize = 28;

/// Static description of one OBIS field, either read from the wire or calculated
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub obis_id: u32,
    pub name: &'static str,
    /// 4 or 8 for wire fields, 0 for calculated ones
    pub byte_length: usize,
    pub factor: f64,
    pub unit: &'static str,
    /// Where the value is exposed, decode-only fields have none
    pub output_slot: Option<&'static str>,
}

impl FieldSpec {
    pub const fn wire(obis_id: u32, name: &'static str, byte_length: usize, factor: f64, unit: &'static str, output_slot: Option<&'static str>) -> Self {
        FieldSpec { obis_id, name, byte_length, factor, unit, output_slot }
    }

    pub const fn derived(obis_id: u32, name: &'static str, unit: &'static str, output_slot: &'static str) -> Self {
        FieldSpec { obis_id, name, byte_length: 0, factor: 1.0, unit, output_slot: Some(output_slot) }
    }

    pub fn is_derived(&self) -> bool {
        return self.byte_length == 0;
    }

    pub fn scale(&self, raw: u64) -> f64 {
        return round2(raw as f64 * self.factor);
    }
}

/// Runtime value of one field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub raw: u64,
    pub value: f64,
    pub available: bool,
}

impl Reading {
    pub fn new() -> Self {
        return Reading { raw: 0, value: 0.0, available: true };
    }

    pub fn as_option(&self) -> Option<f64> {
        if self.available {
            return Some(self.value);
        }
        return None;
    }
}

/// All readings of a session, keyed by OBIS id
#[derive(Debug, Clone)]
pub struct Readings {
    values: HashMap<u32, Reading>,
}

impl Readings {
    pub fn for_table(table: &[FieldSpec]) -> Self {
        let mut values = HashMap::with_capacity(table.len());
        for spec in table {
            values.insert(spec.obis_id, Reading::new());
        }
        return Readings { values };
    }

    pub fn get(&self, obis_id: u32) -> Option<&Reading> {
        return self.values.get(&obis_id);
    }

    /// Scaled value, 0 for ids which are not part of the table
    pub fn value(&self, obis_id: u32) -> f64 {
        return self.values.get(&obis_id).map(|r| r.value).unwrap_or(0.0);
    }

    pub fn set_wire(&mut self, spec: &FieldSpec, raw: u64) {
        self.values.insert(spec.obis_id, Reading { raw, value: spec.scale(raw), available: true });
    }

    pub fn set_derived(&mut self, obis_id: u32, value: Option<f64>) {
        let reading = match value {
            Some(v) => Reading { raw: 0, value: round2(v), available: true },
            None => Reading { raw: 0, value: 0.0, available: false },
        };
        self.values.insert(obis_id, reading);
    }

    pub fn force_zero(&mut self, obis_id: u32) {
        self.values.insert(obis_id, Reading::new());
    }
}

/// Fixed header of every Speedwire datagram
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeviceHeader {
    pub susy_id: u16,
    pub serial_number: u32,
    pub time_tick: u32,
}

/// Result of walking one datagram, nothing is committed yet
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub header: DeviceHeader,
    pub records: Vec<(u32, u64)>,
}

/// Entry of the hardware table
#[derive(Debug, Clone, PartialEq)]
pub struct KnownDevice {
    pub susy_id: u16,
    pub name: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotValue {
    pub name: String,
    pub value: Option<f64>,
    pub unit: String,
    pub slot: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub values: Vec<SnapshotValue>,
    pub header: DeviceHeader,
    pub device: Device,
    pub update_index: u8,
    pub valid: bool,
}

impl Snapshot {
    pub fn get(&self, name: &str) -> Option<&SnapshotValue> {
        return self.values.iter().find(|v| v.name == name);
    }

    pub fn value_of(&self, name: &str) -> Option<f64> {
        return self.get(name).and_then(|v| v.value);
    }
}
