use kiln_core::mocks::FakeElement;
use kiln_core::{BuildError, Calibration, Oven, OvenConfig, SensorCell};
use rstest::rstest;
use std::sync::Arc;

fn build_err(cfg: OvenConfig, calibration: Calibration) -> BuildError {
    let err = Oven::builder()
        .with_element(FakeElement::new())
        .with_sensor(Arc::new(SensorCell::new()))
        .with_config(cfg)
        .with_calibration(calibration)
        .try_build()
        .expect_err("invalid config must be rejected");
    err.downcast_ref::<BuildError>()
        .cloned()
        .expect("BuildError")
}

#[test]
fn missing_element_is_reported() {
    let err = Oven::builder()
        .with_sensor(Arc::new(SensorCell::new()))
        .try_build()
        .expect_err("no element");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingElement)
    ));
}

#[test]
fn missing_sensor_is_reported() {
    let err = Oven::builder()
        .with_element(FakeElement::new())
        .try_build()
        .expect_err("no sensor");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingSensor)
    ));
}

#[test]
fn defaults_build() {
    let oven = Oven::builder()
        .with_element(FakeElement::new())
        .with_sensor(Arc::new(SensorCell::new()))
        .build()
        .expect("defaults are valid");
    assert_eq!(oven.config().sensor.time_step_s, 2.0);
}

#[rstest]
#[case::zero_step(|c: &mut OvenConfig| c.sensor.time_step_s = 0.0, "time_step_s")]
#[case::no_samples(|c: &mut OvenConfig| c.sensor.average_samples = 0, "average_samples")]
#[case::negative_gain(|c: &mut OvenConfig| c.pid.kp = -1.0, "gains")]
#[case::zero_ki(|c: &mut OvenConfig| c.pid.ki = 0.0, "ki")]
#[case::zero_window(|c: &mut OvenConfig| c.pid.control_window = 0.0, "control_window")]
#[case::no_cooldown(|c: &mut OvenConfig| c.cooldown.max_hours = 0.0, "max_hours")]
#[case::negative_rate(|c: &mut OvenConfig| c.cost.kwh_rate = -0.1, "cost")]
#[case::negative_skip(|c: &mut OvenConfig| c.schedule.warmup_skip_threshold = -5.0, "warmup")]
fn invalid_config_is_rejected(#[case] tweak: fn(&mut OvenConfig), #[case] needle: &str) {
    let mut cfg = OvenConfig::default();
    tweak(&mut cfg);
    match build_err(cfg, Calibration::default()) {
        BuildError::InvalidConfig(msg) => assert!(msg.contains(needle), "{msg}"),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn unsorted_calibration_table_is_rejected() {
    let table = Calibration::Table(vec![(100.0, 1.0), (50.0, 2.0)]);
    assert!(matches!(
        build_err(OvenConfig::default(), table),
        BuildError::InvalidConfig(_)
    ));
}
