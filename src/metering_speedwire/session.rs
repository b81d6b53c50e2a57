use crate::config::{SpeedwireVariant, ZeroVoltagePolicy};
use crate::models::{Device, DeviceStatus};
use super::derived::apply_derived_metrics;
use super::meter_definitions::{get_field_table, identify_device, spec_of, unknown_device, OBIS_NET_POWER, OBIS_SW_VERSION};
use super::parser::decode_frame;
use super::structs::*;
use super::utils::format_firmware;
use super::SpeedwireError;
use log::{debug, info, warn};

/// Long living decoder state for one meter stream.
///
/// Values which are missing in a datagram keep their last value, a
/// datagram which can not be decoded is never applied partially.
pub struct DecodingSession {
    variant: SpeedwireVariant,
    zero_voltage: ZeroVoltagePolicy,
    table: &'static [FieldSpec],
    readings: Readings,
    header: DeviceHeader,
    device: Device,
    update_index: u8,
    valid: bool,
    unknown_reported: bool,
}

impl DecodingSession {
    pub fn new(variant: SpeedwireVariant, zero_voltage: ZeroVoltagePolicy) -> Self {
        let table = get_field_table(variant);
        let unknown = unknown_device();
        DecodingSession {
            variant,
            zero_voltage,
            table,
            readings: Readings::for_table(table),
            header: DeviceHeader::default(),
            device: Device::new(unknown.susy_id, unknown.name.to_string()),
            update_index: 0,
            valid: false,
            unknown_reported: false,
        }
    }

    pub fn decode(&mut self, data: &[u8]) -> Result<Snapshot, SpeedwireError> {
        let frame = match decode_frame(data, self.variant) {
            Ok(frame) => frame,
            Err(SpeedwireError::NotSpeedwire) => return Err(SpeedwireError::NotSpeedwire),
            Err(e) => return Err(self.fail(e)),
        };

        let mut staged = self.readings.clone();
        for (obis_id, raw) in frame.records.iter() {
            if let Some(spec) = spec_of(self.variant, *obis_id) {
                staged.set_wire(spec, *raw);
            }
        }

        if let Err(e) = apply_derived_metrics(&mut staged, self.variant, self.zero_voltage) {
            return Err(self.fail(e));
        }

        self.readings = staged;
        self.header = frame.header;
        self.valid = true;
        self.update_index = self.update_index.wrapping_add(1);
        self.update_identity();

        Ok(self.snapshot())
    }

    /// Drop the whole datagram, only the net power is touched
    fn fail(&mut self, e: SpeedwireError) -> SpeedwireError {
        self.readings.force_zero(OBIS_NET_POWER);
        self.valid = false;
        e
    }

    fn update_identity(&mut self) {
        let known = match identify_device(self.header.susy_id) {
            Ok(known) => known,
            Err(e) => {
                if !self.unknown_reported {
                    warn!("{e}, using {} as identity", unknown_device().name);
                    self.unknown_reported = true;
                }
                unknown_device()
            }
        };

        if !self.device.is_active() || self.device.susy_id != known.susy_id {
            let mut device = Device::new(known.susy_id, known.name.to_string());
            device.serial = self.header.serial_number;
            self.device = device;
            self.device.firmware = self.firmware();
            info!("Receiving from {} serial {} firmware {}", self.device.model, self.device.serial, self.device.firmware);
        } else if self.device.firmware.is_empty() {
            self.device.firmware = self.firmware();
        }

        self.device.update_status(DeviceStatus::Online);
        debug!("Update index is now {}", self.update_index);
    }

    /// Empty until a software version record has been received
    fn firmware(&self) -> String {
        match self.readings.get(OBIS_SW_VERSION) {
            Some(sw) if sw.raw != 0 => format_firmware(sw.raw),
            _ => String::new(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let mut values = Vec::new();
        for spec in self.table {
            let slot = match spec.output_slot {
                Some(slot) => slot,
                None => continue,
            };
            let value = self.readings.get(spec.obis_id).and_then(|r| r.as_option());
            values.push(SnapshotValue {
                name: spec.name.to_string(),
                value,
                unit: spec.unit.to_string(),
                slot: slot.to_string(),
            });
        }

        Snapshot {
            values,
            header: self.header,
            device: self.device.clone(),
            update_index: self.update_index,
            valid: self.valid,
        }
    }

    pub fn readings(&self) -> &Readings {
        &self.readings
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn variant(&self) -> SpeedwireVariant {
        self.variant
    }
}
