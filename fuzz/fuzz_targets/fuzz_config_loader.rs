#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse errors and validation errors are both fine; panics are not.
    if let Ok(cfg) = kiln_config::load_toml(data) {
        if cfg.validate().is_ok() {
            // a validated config must also pass the controller's own checks
            let _ = kiln_core::OvenConfig::from(&cfg);
            let _ = kiln_core::Calibration::from(&cfg.calibration);
        }
    }
});
