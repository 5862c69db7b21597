use thrust_core::gateway::{ForcePayload, PowerPayload, RpmPayload, ThrusterStatus};
use thrust_core::{decode, GatewayError, TestResult};
use thrust_io::parse_response;

#[test]
fn decodes_sensor_payloads() {
    let rpm: RpmPayload =
        decode(parse_response(200, r#"{"status":"success","rpm":1440.0}"#)).unwrap();
    assert_eq!(rpm.rpm, 1440.0);

    let power: PowerPayload = decode(parse_response(
        200,
        r#"{"status":"success","voltage":15.92,"current":1.71}"#,
    ))
    .unwrap();
    assert_eq!(power.voltage, 15.92);
    assert_eq!(power.current, 1.71);
}

#[test]
fn null_force_decodes_as_absent() {
    let force: ForcePayload =
        decode(parse_response(200, r#"{"status":"success","force":null}"#)).unwrap();
    assert_eq!(force.force, None);

    let force: ForcePayload =
        decode(parse_response(200, r#"{"status":"success","force":-0.42}"#)).unwrap();
    assert_eq!(force.force, Some(-0.42));
}

#[test]
fn decodes_thruster_status() {
    let status: ThrusterStatus = decode(parse_response(
        200,
        r#"{"status":"success","pwm_enabled":true,"pwm_frequency":333}"#,
    ))
    .unwrap();
    assert!(status.pwm_enabled);
    assert_eq!(status.pwm_frequency, 333.0);
}

#[test]
fn decodes_test_summary() {
    let result: TestResult = decode(parse_response(
        200,
        r#"{
            "status":"success",
            "duration":10,
            "data_points":40,
            "filename":"thruster_test_1700000000.csv"
        }"#,
    ))
    .unwrap();
    assert_eq!(result.data_point_count, 40);
    assert_eq!(result.duration_s, Some(10.0));
    assert_eq!(
        result.filename.as_deref(),
        Some("thruster_test_1700000000.csv")
    );
}

#[test]
fn missing_payload_field_is_malformed() {
    let err = decode::<RpmPayload>(parse_response(200, r#"{"status":"success"}"#)).unwrap_err();
    assert!(matches!(err, GatewayError::Malformed(_)));
}

#[test]
fn service_error_message_is_passed_through() {
    let err = decode::<PowerPayload>(parse_response(
        500,
        r#"{"status":"error","message":"Could not connect to power supply"}"#,
    ))
    .unwrap_err();
    assert_eq!(err.to_string(), "Could not connect to power supply");
}
