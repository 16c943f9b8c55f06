#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: (&str, f64, f64)| {
    let (json, t, temp) = data;
    let Ok(file) = kiln_config::parse_profile_json(json) else {
        return;
    };
    let Ok(profile) = kiln_core::ScheduleProfile::try_from(&file) else {
        return;
    };
    // lookups must not panic for any time or temperature
    let _ = profile.target_temperature(t);
    let _ = profile.find_time_for_temperature(temp, t);
    let _ = profile.duration();
});
