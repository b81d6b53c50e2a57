use crate::config::SpeedwireVariant;
use super::structs::{FieldSpec, KnownDevice};
use super::SpeedwireError;

// Values read from the wire
pub const OBIS_IMPORT_POWER: u32 = 0x00010400;
pub const OBIS_IMPORT_ENERGY: u32 = 0x00010800;
pub const OBIS_EXPORT_POWER: u32 = 0x00020400;
pub const OBIS_EXPORT_ENERGY: u32 = 0x00020800;
pub const OBIS_SW_VERSION: u32 = 0x90000000;

// Calculated values, these ids never show up in a datagram
pub const OBIS_NET_POWER: u32 = 0x00000001;

const POWER_FACTOR: f64 = 1.0 / 10.0;
const ENERGY_FACTOR: f64 = 1.0 / 3_600_000.0;
const VOLTAGE_FACTOR: f64 = 1.0 / 1000.0;
const CURRENT_FACTOR: f64 = 1.0 / 1000.0;

/// OBIS ids belonging to one phase
#[derive(Debug, Clone, Copy)]
pub struct PhaseIds {
    pub voltage: u32,
    pub import_power: u32,
    pub export_power: u32,
    pub wire_current: u32,
    pub power: u32,
    pub derived_current: u32,
}

pub const PHASES: [PhaseIds; 3] = [
    PhaseIds { voltage: 0x00200400, import_power: 0x00150400, export_power: 0x00160400, wire_current: 0x001F0400, power: 0x00000002, derived_current: 0x00000005 },
    PhaseIds { voltage: 0x00340400, import_power: 0x00290400, export_power: 0x002A0400, wire_current: 0x00330400, power: 0x00000003, derived_current: 0x00000006 },
    PhaseIds { voltage: 0x00480400, import_power: 0x003D0400, export_power: 0x003E0400, wire_current: 0x00470400, power: 0x00000004, derived_current: 0x00000007 },
];

/// Meters sending per phase import and export power (SMA-EM, Sunny Home Manager 2.0)
static SUBTRACTIVE_FIELDS: [FieldSpec; 21] = [
    FieldSpec::wire(OBIS_IMPORT_POWER,  "import_power",     4, POWER_FACTOR,   "W",   None),
    FieldSpec::wire(OBIS_IMPORT_ENERGY, "import_energy",    8, ENERGY_FACTOR,  "kWh", Some("/Ac/Energy/Forward")),
    FieldSpec::wire(OBIS_EXPORT_POWER,  "export_power",     4, POWER_FACTOR,   "W",   None),
    FieldSpec::wire(OBIS_EXPORT_ENERGY, "export_energy",    8, ENERGY_FACTOR,  "kWh", Some("/Ac/Energy/Reverse")),
    FieldSpec::wire(0x00200400,         "l1_voltage",       4, VOLTAGE_FACTOR, "V",   Some("/Ac/L1/Voltage")),
    FieldSpec::wire(0x00340400,         "l2_voltage",       4, VOLTAGE_FACTOR, "V",   Some("/Ac/L2/Voltage")),
    FieldSpec::wire(0x00480400,         "l3_voltage",       4, VOLTAGE_FACTOR, "V",   Some("/Ac/L3/Voltage")),
    FieldSpec::wire(0x00150400,         "l1_import_power",  4, POWER_FACTOR,   "W",   None),
    FieldSpec::wire(0x00290400,         "l2_import_power",  4, POWER_FACTOR,   "W",   None),
    FieldSpec::wire(0x003D0400,         "l3_import_power",  4, POWER_FACTOR,   "W",   None),
    FieldSpec::wire(0x00160400,         "l1_export_power",  4, POWER_FACTOR,   "W",   None),
    FieldSpec::wire(0x002A0400,         "l2_export_power",  4, POWER_FACTOR,   "W",   None),
    FieldSpec::wire(0x003E0400,         "l3_export_power",  4, POWER_FACTOR,   "W",   None),
    FieldSpec::wire(OBIS_SW_VERSION,    "sw_version_raw",   4, 1.0,            "",    None),
    FieldSpec::derived(OBIS_NET_POWER,  "power",      "W", "/Ac/Power"),
    FieldSpec::derived(0x00000002,      "l1_power",   "W", "/Ac/L1/Power"),
    FieldSpec::derived(0x00000003,      "l2_power",   "W", "/Ac/L2/Power"),
    FieldSpec::derived(0x00000004,      "l3_power",   "W", "/Ac/L3/Power"),
    FieldSpec::derived(0x00000005,      "l1_current", "A", "/Ac/L1/Current"),
    FieldSpec::derived(0x00000006,      "l2_current", "A", "/Ac/L2/Current"),
    FieldSpec::derived(0x00000007,      "l3_current", "A", "/Ac/L3/Current"),
];

/// Meters sending the phase currents directly
static MULTIPLICATIVE_FIELDS: [FieldSpec; 15] = [
    FieldSpec::wire(OBIS_IMPORT_POWER,  "import_power",  4, POWER_FACTOR,   "W",   None),
    FieldSpec::wire(OBIS_IMPORT_ENERGY, "import_energy", 8, ENERGY_FACTOR,  "kWh", Some("/Ac/Energy/Forward")),
    FieldSpec::wire(OBIS_EXPORT_POWER,  "export_power",  4, POWER_FACTOR,   "W",   None),
    FieldSpec::wire(OBIS_EXPORT_ENERGY, "export_energy", 8, ENERGY_FACTOR,  "kWh", Some("/Ac/Energy/Reverse")),
    FieldSpec::wire(0x00200400,         "l1_voltage",    4, VOLTAGE_FACTOR, "V",   Some("/Ac/L1/Voltage")),
    FieldSpec::wire(0x00340400,         "l2_voltage",    4, VOLTAGE_FACTOR, "V",   Some("/Ac/L2/Voltage")),
    FieldSpec::wire(0x00480400,         "l3_voltage",    4, VOLTAGE_FACTOR, "V",   Some("/Ac/L3/Voltage")),
    FieldSpec::wire(0x001F0400,         "l1_current",    4, CURRENT_FACTOR, "A",   Some("/Ac/L1/Current")),
    FieldSpec::wire(0x00330400,         "l2_current",    4, CURRENT_FACTOR, "A",   Some("/Ac/L2/Current")),
    FieldSpec::wire(0x00470400,         "l3_current",    4, CURRENT_FACTOR, "A",   Some("/Ac/L3/Current")),
    FieldSpec::wire(OBIS_SW_VERSION,    "sw_version_raw",4, 1.0,            "",    None),
    FieldSpec::derived(OBIS_NET_POWER,  "power",    "W", "/Ac/Power"),
    FieldSpec::derived(0x00000002,      "l1_power", "W", "/Ac/L1/Power"),
    FieldSpec::derived(0x00000003,      "l2_power", "W", "/Ac/L2/Power"),
    FieldSpec::derived(0x00000004,      "l3_power", "W", "/Ac/L3/Power"),
];

pub static KNOWN_DEVICES: [KnownDevice; 4] = [
    KnownDevice { susy_id: 0,   name: "UNKNOWN" },
    KnownDevice { susy_id: 270, name: "SMA-EM10" },
    KnownDevice { susy_id: 349, name: "SMA-EM20" },
    KnownDevice { susy_id: 372, name: "SHM2.0" },
];

pub fn get_field_table(variant: SpeedwireVariant) -> &'static [FieldSpec] {
    match variant {
        SpeedwireVariant::Subtractive => &SUBTRACTIVE_FIELDS,
        SpeedwireVariant::Multiplicative => &MULTIPLICATIVE_FIELDS,
    }
}

pub fn spec_of(variant: SpeedwireVariant, obis_id: u32) -> Option<&'static FieldSpec> {
    get_field_table(variant).iter().find(|spec| spec.obis_id == obis_id)
}

pub fn unknown_device() -> &'static KnownDevice {
    &KNOWN_DEVICES[0]
}

/// Look up the hardware by SusyID, the sentinel entry 0 never matches a real device
pub fn identify_device(susy_id: u16) -> Result<&'static KnownDevice, SpeedwireError> {
    KNOWN_DEVICES.iter()
        .skip(1)
        .find(|dev| dev.susy_id == susy_id)
        .ok_or(SpeedwireError::UnknownDevice(susy_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const VARIANTS: [SpeedwireVariant; 2] = [SpeedwireVariant::Subtractive, SpeedwireVariant::Multiplicative];

    #[test]
    fn test_wire_fields_are_4_or_8_bytes() {
        for variant in VARIANTS {
            for spec in get_field_table(variant) {
                assert!(matches!(spec.byte_length, 0 | 4 | 8), "{} has length {}", spec.name, spec.byte_length);
                if spec.is_derived() {
                    assert!(spec.output_slot.is_some(), "{} is calculated but never published", spec.name);
                    assert!(spec.obis_id <= 7);
                }
            }
        }
    }

    #[test]
    fn test_ids_and_names_are_unique() {
        for variant in VARIANTS {
            let table = get_field_table(variant);
            let ids: HashSet<u32> = table.iter().map(|s| s.obis_id).collect();
            let names: HashSet<&str> = table.iter().map(|s| s.name).collect();
            assert_eq!(ids.len(), table.len());
            assert_eq!(names.len(), table.len());
        }
    }

    #[test]
    fn test_spec_of() {
        let energy = spec_of(SpeedwireVariant::Subtractive, OBIS_IMPORT_ENERGY).unwrap();
        assert_eq!(energy.byte_length, 8);
        assert_eq!(energy.unit, "kWh");
        assert_eq!(energy.output_slot, Some("/Ac/Energy/Forward"));

        let current = spec_of(SpeedwireVariant::Multiplicative, 0x001F0400).unwrap();
        assert_eq!(current.byte_length, 4);
        assert_eq!(current.output_slot, Some("/Ac/L1/Current"));

        assert!(spec_of(SpeedwireVariant::Subtractive, 0x001F0400).is_none());
        assert!(spec_of(SpeedwireVariant::Multiplicative, 0x00150400).is_none());
        assert!(spec_of(SpeedwireVariant::Multiplicative, 0x00000005).is_none());
    }

    #[test]
    fn test_phase_ids_match_tables() {
        for phase in PHASES {
            let sub = SpeedwireVariant::Subtractive;
            let mul = SpeedwireVariant::Multiplicative;
            assert_eq!(spec_of(sub, phase.voltage).unwrap().unit, "V");
            assert_eq!(spec_of(sub, phase.import_power).unwrap().unit, "W");
            assert_eq!(spec_of(sub, phase.export_power).unwrap().unit, "W");
            assert!(spec_of(sub, phase.derived_current).unwrap().is_derived());
            assert!(spec_of(sub, phase.power).unwrap().is_derived());
            assert_eq!(spec_of(mul, phase.wire_current).unwrap().unit, "A");
            assert!(spec_of(mul, phase.power).unwrap().is_derived());
        }
    }

    #[test]
    fn test_identify_device() {
        assert_eq!(identify_device(349).unwrap().name, "SMA-EM20");
        assert_eq!(identify_device(372).unwrap().name, "SHM2.0");
        assert!(matches!(identify_device(1234), Err(SpeedwireError::UnknownDevice(1234))));
        assert!(identify_device(0).is_err());
        assert_eq!(unknown_device().name, "UNKNOWN");
    }
}
