use crate::config::{SpeedwireVariant, ZeroVoltagePolicy};
use super::meter_definitions::{PHASES, OBIS_EXPORT_POWER, OBIS_IMPORT_POWER, OBIS_NET_POWER};
use super::structs::Readings;
use super::utils::round2;
use super::SpeedwireError;
use log::debug;

/// Recalculate every derived reading from the current raw readings.
///
/// Voltages and currents are the last known values, a phase which was
/// missing in the latest datagram is calculated with its previous readings.
pub fn apply_derived_metrics(readings: &mut Readings, variant: SpeedwireVariant, zero_voltage: ZeroVoltagePolicy) -> Result<(), SpeedwireError> {
    let net_power = readings.value(OBIS_IMPORT_POWER) - readings.value(OBIS_EXPORT_POWER);
    readings.set_derived(OBIS_NET_POWER, Some(finite("power", net_power)?));

    for (n, phase) in PHASES.iter().enumerate() {
        let voltage = readings.value(phase.voltage);

        match variant {
            SpeedwireVariant::Subtractive => {
                let power = readings.value(phase.import_power) - readings.value(phase.export_power);
                readings.set_derived(phase.power, Some(finite("phase power", power)?));

                let current = if voltage == 0.0 {
                    debug!("L{} voltage is zero, current not available", n + 1);
                    match zero_voltage {
                        ZeroVoltagePolicy::Unavailable => None,
                        ZeroVoltagePolicy::Zero => Some(0.0),
                    }
                } else {
                    Some(finite("phase current", power / voltage)?)
                };
                readings.set_derived(phase.derived_current, current);
            }
            SpeedwireVariant::Multiplicative => {
                let power = voltage * readings.value(phase.wire_current);
                readings.set_derived(phase.power, Some(finite("phase power", power)?));
            }
        }
    }

    return Ok(());
}

fn finite(what: &str, value: f64) -> Result<f64, SpeedwireError> {
    if !value.is_finite() {
        return Err(SpeedwireError::Malformed(format!("Calculated {what} is not a number")));
    }
    return Ok(round2(value));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metering_speedwire::meter_definitions::{get_field_table, spec_of};

    fn readings_with(variant: SpeedwireVariant, raw: &[(u32, u64)]) -> Readings {
        let mut readings = Readings::for_table(get_field_table(variant));
        for (obis_id, value) in raw {
            readings.set_wire(spec_of(variant, *obis_id).unwrap(), *value);
        }
        readings
    }

    #[test]
    fn test_net_power() {
        let mut r = readings_with(SpeedwireVariant::Subtractive, &[(OBIS_IMPORT_POWER, 1000), (OBIS_EXPORT_POWER, 200)]);
        apply_derived_metrics(&mut r, SpeedwireVariant::Subtractive, ZeroVoltagePolicy::Unavailable).unwrap();
        assert_eq!(r.value(OBIS_IMPORT_POWER), 100.0);
        assert_eq!(r.value(OBIS_EXPORT_POWER), 20.0);
        assert_eq!(r.value(OBIS_NET_POWER), 80.0);
    }

    #[test]
    fn test_subtractive_phase_values() {
        let l1 = PHASES[0];
        let mut r = readings_with(SpeedwireVariant::Subtractive, &[
            (l1.voltage, 230_000),
            (l1.import_power, 4_600),
            (l1.export_power, 1_150),
        ]);
        apply_derived_metrics(&mut r, SpeedwireVariant::Subtractive, ZeroVoltagePolicy::Unavailable).unwrap();

        assert_eq!(r.value(l1.power), 345.0);
        assert_eq!(r.value(l1.derived_current), 1.5);
    }

    #[test]
    fn test_subtractive_negative_phase_power() {
        let l2 = PHASES[1];
        let mut r = readings_with(SpeedwireVariant::Subtractive, &[
            (l2.voltage, 231_000),
            (l2.import_power, 0),
            (l2.export_power, 23_100),
        ]);
        apply_derived_metrics(&mut r, SpeedwireVariant::Subtractive, ZeroVoltagePolicy::Unavailable).unwrap();

        assert_eq!(r.value(l2.power), -2310.0);
        assert_eq!(r.value(l2.derived_current), -10.0);
    }

    #[test]
    fn test_zero_voltage_unavailable() {
        let l3 = PHASES[2];
        let mut r = readings_with(SpeedwireVariant::Subtractive, &[(l3.import_power, 500)]);
        apply_derived_metrics(&mut r, SpeedwireVariant::Subtractive, ZeroVoltagePolicy::Unavailable).unwrap();

        let current = r.get(l3.derived_current).unwrap();
        assert!(!current.available);
        assert_eq!(current.as_option(), None);
        assert!(current.value.is_finite());
        assert_eq!(r.value(l3.power), 50.0);
    }

    #[test]
    fn test_zero_voltage_zero() {
        let l1 = PHASES[0];
        let mut r = readings_with(SpeedwireVariant::Subtractive, &[(l1.import_power, 500)]);
        apply_derived_metrics(&mut r, SpeedwireVariant::Subtractive, ZeroVoltagePolicy::Zero).unwrap();

        assert_eq!(r.get(l1.derived_current).unwrap().as_option(), Some(0.0));
    }

    #[test]
    fn test_voltage_recovers_after_zero() {
        let l1 = PHASES[0];
        let mut r = readings_with(SpeedwireVariant::Subtractive, &[(l1.import_power, 2_300)]);
        apply_derived_metrics(&mut r, SpeedwireVariant::Subtractive, ZeroVoltagePolicy::Unavailable).unwrap();
        assert_eq!(r.get(l1.derived_current).unwrap().as_option(), None);

        r.set_wire(spec_of(SpeedwireVariant::Subtractive, l1.voltage).unwrap(), 230_000);
        apply_derived_metrics(&mut r, SpeedwireVariant::Subtractive, ZeroVoltagePolicy::Unavailable).unwrap();
        assert_eq!(r.get(l1.derived_current).unwrap().as_option(), Some(1.0));
    }

    #[test]
    fn test_multiplicative_phase_power() {
        let l1 = PHASES[0];
        let mut r = readings_with(SpeedwireVariant::Multiplicative, &[
            (l1.voltage, 230_000),
            (l1.wire_current, 2_500),
            (OBIS_IMPORT_POWER, 5_750),
        ]);
        apply_derived_metrics(&mut r, SpeedwireVariant::Multiplicative, ZeroVoltagePolicy::Unavailable).unwrap();

        assert_eq!(r.value(l1.wire_current), 2.5);
        assert_eq!(r.value(l1.power), 575.0);
        assert_eq!(r.value(OBIS_NET_POWER), 575.0);
        assert!(r.get(l1.derived_current).is_none());
    }

    #[test]
    fn test_multiplicative_zero_voltage_is_zero_power() {
        let l2 = PHASES[1];
        let mut r = readings_with(SpeedwireVariant::Multiplicative, &[(l2.wire_current, 3_000)]);
        apply_derived_metrics(&mut r, SpeedwireVariant::Multiplicative, ZeroVoltagePolicy::Unavailable).unwrap();
        assert_eq!(r.value(l2.power), 0.0);
    }

    #[test]
    fn test_finite_guard() {
        assert!(matches!(finite("x", f64::NAN), Err(SpeedwireError::Malformed(_))));
        assert!(matches!(finite("x", f64::INFINITY), Err(SpeedwireError::Malformed(_))));
        assert_eq!(finite("x", 1.005).unwrap(), round2(1.005));
    }
}
