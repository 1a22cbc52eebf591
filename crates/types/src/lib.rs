#![allow(dead_code)]

use serde::{Deserialize, Serialize};

/// The four readings exposed by a SOLPLUS inverter's status page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementKind {
    Energy,
    DcVoltage,
    AcVoltage,
    Power,
}

/// How the presentation layer should treat a value over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateClass {
    /// Cumulative counter that only grows within a day and resets daily.
    TotalIncreasing,
    /// Instantaneous reading with no carry-forward semantics.
    Measurement,
}

impl MeasurementKind {
    pub const ALL: [MeasurementKind; 4] = [
        MeasurementKind::Energy,
        MeasurementKind::DcVoltage,
        MeasurementKind::AcVoltage,
        MeasurementKind::Power,
    ];

    pub fn unit(self) -> &'static str {
        match self {
            MeasurementKind::Energy => "kWh",
            MeasurementKind::DcVoltage | MeasurementKind::AcVoltage => "V",
            MeasurementKind::Power => "W",
        }
    }

    /// Display suffix appended to the device name.
    pub fn label(self) -> &'static str {
        match self {
            MeasurementKind::Energy => "Energy",
            MeasurementKind::DcVoltage => "DC Voltage",
            MeasurementKind::AcVoltage => "AC Voltage",
            MeasurementKind::Power => "Power",
        }
    }

    /// Identifier fragment used to build per-sensor ids.
    pub fn slug(self) -> &'static str {
        match self {
            MeasurementKind::Energy => "energy",
            MeasurementKind::DcVoltage => "dc_voltage",
            MeasurementKind::AcVoltage => "ac_voltage",
            MeasurementKind::Power => "power",
        }
    }

    pub fn state_class(self) -> StateClass {
        match self {
            MeasurementKind::Energy => StateClass::TotalIncreasing,
            MeasurementKind::DcVoltage | MeasurementKind::AcVoltage | MeasurementKind::Power => {
                StateClass::Measurement
            }
        }
    }
}

/// One value per measurement kind; all four are always present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MeasurementSet {
    pub energy: u32,
    pub dc_voltage: u32,
    pub ac_voltage: u32,
    pub power: u32,
}

impl MeasurementSet {
    pub fn get(&self, kind: MeasurementKind) -> u32 {
        match kind {
            MeasurementKind::Energy => self.energy,
            MeasurementKind::DcVoltage => self.dc_voltage,
            MeasurementKind::AcVoltage => self.ac_voltage,
            MeasurementKind::Power => self.power,
        }
    }

    pub fn set(&mut self, kind: MeasurementKind, value: u32) {
        match kind {
            MeasurementKind::Energy => self.energy = value,
            MeasurementKind::DcVoltage => self.dc_voltage = value,
            MeasurementKind::AcVoltage => self.ac_voltage = value,
            MeasurementKind::Power => self.power = value,
        }
    }
}

/// Basic identity for a configured inverter. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub id: String,
    pub name: String,
    pub host: String,
}

impl DeviceIdentity {
    /// Id of the sensor exposing `kind` for this device.
    pub fn sensor_id(&self, kind: MeasurementKind) -> String {
        format!("{}_{}", self.id, kind.slug())
    }

    /// Display name of the sensor exposing `kind` for this device.
    pub fn sensor_name(&self, kind: MeasurementKind) -> String {
        format!("{} {}", self.name, kind.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measurement_set_round_trips_all_kinds() {
        let mut set = MeasurementSet::default();
        for (index, kind) in MeasurementKind::ALL.into_iter().enumerate() {
            set.set(kind, index as u32 + 1);
        }
        assert_eq!(set.get(MeasurementKind::Energy), 1);
        assert_eq!(set.get(MeasurementKind::DcVoltage), 2);
        assert_eq!(set.get(MeasurementKind::AcVoltage), 3);
        assert_eq!(set.get(MeasurementKind::Power), 4);
    }

    #[test]
    fn sensor_ids_follow_device_and_kind() {
        let device = DeviceIdentity {
            id: "garage".to_string(),
            name: "Garage Roof".to_string(),
            host: "192.168.1.40".to_string(),
        };
        assert_eq!(device.sensor_id(MeasurementKind::Energy), "garage_energy");
        assert_eq!(
            device.sensor_name(MeasurementKind::AcVoltage),
            "Garage Roof AC Voltage"
        );
    }

    #[test]
    fn only_energy_is_total_increasing() {
        for kind in MeasurementKind::ALL {
            let expected = matches!(kind, MeasurementKind::Energy);
            assert_eq!(kind.state_class() == StateClass::TotalIncreasing, expected);
        }
    }
}
