use solplus_parser::{parse_status_page, ParserError};
use types::MeasurementKind;

const STATUS_PAGE: &str = include_str!("fixtures/status-page.html");

#[test]
fn parse_status_page_extracts_all_four_readings() {
    let values = parse_status_page(STATUS_PAGE).expect("parse status page");
    assert_eq!(values.energy, 12_345);
    assert_eq!(values.power, 1_480);
    assert_eq!(values.ac_voltage, 231);
    assert_eq!(values.dc_voltage, 412);
}

#[test]
fn parse_discards_fractional_part_without_rounding() {
    let html = "<li>Energie Tag: 8,9 kWh</li>\
                <b>Leistung AC: 1.999,9 Watt</b>\
                <b>Netzspannung: 230,6 Volt</b>\
                <b>Gleichspannung: 399,5 Volt</b>";
    let values = parse_status_page(html).expect("parse fractions");
    assert_eq!(values.energy, 8);
    assert_eq!(values.power, 1_999);
    assert_eq!(values.ac_voltage, 230);
    assert_eq!(values.dc_voltage, 399);
}

#[test]
fn any_missing_marker_fails_the_whole_parse() {
    let markers = [
        "<li>Energie Tag: 12 kWh</li>",
        "<b>Leistung AC: 100 Watt</b>",
        "<b>Netzspannung: 230 Volt</b>",
        "<b>Gleichspannung: 400 Volt</b>",
    ];

    for missing in 0..markers.len() {
        let html: String = markers
            .iter()
            .enumerate()
            .filter(|(index, _)| *index != missing)
            .map(|(_, marker)| *marker)
            .collect();
        let result = parse_status_page(&html);
        assert!(
            matches!(result, Err(ParserError::MissingMarker(_))),
            "expected failure with marker {missing} removed"
        );
    }
}

#[test]
fn malformed_literal_fails_the_whole_parse() {
    let html = "<li>Energie Tag: , kWh</li>\
                <b>Leistung AC: 100 Watt</b>\
                <b>Netzspannung: 230 Volt</b>\
                <b>Gleichspannung: 400 Volt</b>";
    assert_eq!(
        parse_status_page(html),
        Err(ParserError::InvalidNumber {
            kind: MeasurementKind::Energy,
            literal: ",".to_string(),
        })
    );
}

#[test]
fn error_page_yields_no_partial_set() {
    let html = "<html><body><h1>500 Internal Error</h1></body></html>";
    assert!(parse_status_page(html).is_err());
}
