#![allow(dead_code)]

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::warn;
use types::{MeasurementKind, MeasurementSet};

const P_ENERGY: &str = r"<li>Energie Tag:\s*([\d.,]+)\s*kWh";
const P_POWER: &str = r"<b>Leistung AC:\s*([\d.,]+)\s*Watt</b>";
const P_AC_VOLTAGE: &str = r"<b>Netzspannung:\s*([\d.,]+)\s*Volt</b>";
const P_DC_VOLTAGE: &str = r"<b>Gleichspannung:\s*([\d.,]+)\s*Volt</b>";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParserError {
    #[error("marker for {0:?} not found in status page")]
    MissingMarker(MeasurementKind),
    #[error("marker for {kind:?} captured malformed number {literal:?}")]
    InvalidNumber {
        kind: MeasurementKind,
        literal: String,
    },
}

fn marker(kind: MeasurementKind) -> &'static Regex {
    static ENERGY: OnceLock<Regex> = OnceLock::new();
    static POWER: OnceLock<Regex> = OnceLock::new();
    static AC_VOLTAGE: OnceLock<Regex> = OnceLock::new();
    static DC_VOLTAGE: OnceLock<Regex> = OnceLock::new();

    let (cell, pattern) = match kind {
        MeasurementKind::Energy => (&ENERGY, P_ENERGY),
        MeasurementKind::Power => (&POWER, P_POWER),
        MeasurementKind::AcVoltage => (&AC_VOLTAGE, P_AC_VOLTAGE),
        MeasurementKind::DcVoltage => (&DC_VOLTAGE, P_DC_VOLTAGE),
    };
    cell.get_or_init(|| Regex::new(pattern).expect("hard-coded pattern compiles"))
}

/// Extracts all four readings from the inverter's HTML status page.
///
/// All markers are mandatory. A page missing any of them most likely means a
/// firmware change or an error page, so the whole parse fails rather than
/// producing a partial set that downstream code would mistake for real data.
pub fn parse_status_page(html: &str) -> Result<MeasurementSet, ParserError> {
    let mut values = MeasurementSet::default();
    // Checked in the same sequence the device renders them.
    for kind in [
        MeasurementKind::Energy,
        MeasurementKind::Power,
        MeasurementKind::AcVoltage,
        MeasurementKind::DcVoltage,
    ] {
        let captures = marker(kind).captures(html).ok_or_else(|| {
            warn!(?kind, "status page marker not found");
            ParserError::MissingMarker(kind)
        })?;
        let literal = &captures[1];
        let value = normalize_number(literal).ok_or_else(|| {
            warn!(?kind, literal, "status page number malformed");
            ParserError::InvalidNumber {
                kind,
                literal: literal.to_string(),
            }
        })?;
        values.set(kind, value);
    }
    Ok(values)
}

/// The device prints numbers with `.` as thousands separator and `,` as
/// decimal separator. Thousands separators are stripped and the fractional
/// part is discarded, not rounded.
fn normalize_number(literal: &str) -> Option<u32> {
    let integer_part = literal.split(',').next().unwrap_or_default();
    let digits: String = integer_part.chars().filter(|ch| *ch != '.').collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
