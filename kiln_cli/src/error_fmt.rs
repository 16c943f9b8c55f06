//! Human-readable error descriptions and structured JSON error formatting.

use crate::cli::LAST_SHUTOFF;
use kiln_core::error::{AbortReason, BuildError, KilnError};
use kiln_store::StoreError;

pub fn abort_reason_name(r: &AbortReason) -> &'static str {
    match r {
        AbortReason::TempTooHigh => "TempTooHigh",
        AbortReason::LostConnection => "LostConnection",
        AbortReason::UnknownError => "UnknownError",
        AbortReason::TooManyErrors => "TooManyErrors",
        AbortReason::Actuator(_) => "Actuator",
        AbortReason::Operator => "Operator",
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingElement => {
                "What happened: No heating element was provided to the controller.\nLikely causes: The relay driver failed to initialize or was not wired into the builder.\nHow to fix: Check [pins].heat and GPIO permissions, or enable [simulation].".to_string()
            }
            BuildError::MissingSensor => {
                "What happened: No temperature sensor was provided to the controller.\nLikely causes: The thermocouple thread was not started.\nHow to fix: Ensure the MAX31855 initializes and its cell is passed via with_sensor(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/kiln.toml for a sample."
            ),
        };
    }

    if let Some(ke) = err.downcast_ref::<KilnError>() {
        match ke {
            KilnError::Abort(reason) => {
                return match reason {
                    AbortReason::TempTooHigh => "What happened: Emergency shutoff temperature reached; the element was turned off.\nLikely causes: Stuck relay, wrong profile, or safety.emergency_shutoff_temp set too low.\nHow to fix: Let the kiln cool, inspect the relay, and review the profile and [safety] limits.".to_string(),
                    AbortReason::LostConnection => "What happened: Lost connection to the thermocouple.\nLikely causes: Broken or unplugged thermocouple wire.\nHow to fix: Check the thermocouple and its terminals before firing again.".to_string(),
                    AbortReason::UnknownError => "What happened: The thermocouple converter reported an unknown error.\nLikely causes: Electrical noise or a failing MAX31855 board.\nHow to fix: Check grounding and wiring; set safety.ignore_unknown_error only if you understand the risk.".to_string(),
                    AbortReason::TooManyErrors => "What happened: Too many bad thermocouple readings in a short period.\nLikely causes: Noisy wiring or an intermittent short.\nHow to fix: Inspect the thermocouple wiring, or raise sensor.average_samples.".to_string(),
                    AbortReason::Actuator(msg) => format!(
                        "What happened: The heating element failed ({msg}).\nLikely causes: Relay driver fault or GPIO access lost.\nHow to fix: Check the relay wiring and [pins].heat, then start a new run."
                    ),
                    AbortReason::Operator => "What happened: The run was aborted by the operator.\nLikely causes: Ctrl-C or an abort command.\nHow to fix: Start a new run when ready.".to_string(),
                };
            }
            KilnError::StartRefused(msg) => {
                return format!(
                    "What happened: Refused to start the run ({msg}).\nLikely causes: The thermocouple reports a fault before heating.\nHow to fix: Fix the thermocouple wiring, or set the matching safety.ignore_* flag."
                );
            }
            KilnError::InvalidProfile(msg) => {
                return format!(
                    "What happened: The firing profile is invalid ({msg}).\nLikely causes: Empty or malformed data points.\nHow to fix: Edit the profile JSON so it has at least one [seconds, temperature] point."
                );
            }
            _ => {}
        }
        // Fallback to generic for other domain errors
        return format!(
            "What happened: {ke}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
        );
    }

    if let Some(se) = err.downcast_ref::<StoreError>() {
        return match se {
            StoreError::SchemaTooNew { found, supported } => format!(
                "What happened: The session database uses schema v{found}, newer than this build supports (v{supported}).\nLikely causes: The database was written by a newer kiln version.\nHow to fix: Upgrade kiln, or point storage.db_path at a different file."
            ),
            other => format!(
                "What happened: Session database error ({other}).\nLikely causes: Unwritable storage.db_path or a corrupt database file.\nHow to fix: Check the path and permissions in [storage]."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("calibration csv must have headers") {
        return "Invalid headers in calibration CSV. Expected 'temp,offset'.".to_string();
    }

    if lower.contains("profile") && (lower.contains("no such file") || lower.contains("read")) {
        return format!(
            "What happened: Could not load the firing profile.\nLikely causes: No matching JSON file in restart.profiles_dir.\nHow to fix: Check the profile name and directory. Original: {msg}"
        );
    }

    if lower.contains("session") && lower.contains("not found") {
        return format!("What happened: {msg}.\nHow to fix: List sessions with `kiln sessions`.");
    }

    if lower.contains("must be")
        || lower.contains("invalid configuration")
        || lower.contains("parse config")
        || (lower.contains("pin") && lower.contains("missing"))
    {
        return format!(
            "What happened: Configuration is invalid or incomplete ({msg}).\nLikely causes: Out-of-range values or missing [pins] for the hardware backend.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: abort reasons and start refusal get their own; everything else is 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<KilnError>() {
        Some(KilnError::Abort(reason)) => match reason {
            AbortReason::Operator => 2,
            AbortReason::TempTooHigh => 3,
            AbortReason::LostConnection => 4,
            AbortReason::UnknownError => 5,
            AbortReason::TooManyErrors => 6,
            AbortReason::Actuator(_) => 7,
        },
        Some(KilnError::StartRefused(_)) => 8,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let msg = humanize(err);
    match err.downcast_ref::<KilnError>() {
        Some(KilnError::Abort(reason)) => {
            let name = abort_reason_name(reason);
            let details = match reason {
                AbortReason::TempTooHigh => LAST_SHUTOFF
                    .get()
                    .map(|t| json!({ "emergency_shutoff_temp": t })),
                AbortReason::Actuator(m) => Some(json!({ "element_error": m })),
                _ => None,
            };
            match details {
                Some(d) => json!({ "reason": name, "details": d, "message": msg }),
                None => json!({ "reason": name, "message": msg }),
            }
            .to_string()
        }
        Some(KilnError::StartRefused(_)) => {
            json!({ "reason": "StartRefused", "message": msg }).to_string()
        }
        // Generic error JSON
        _ => json!({ "reason": "Error", "message": msg }).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn abort(r: AbortReason) -> eyre::Report {
        eyre::Report::new(KilnError::Abort(r))
    }

    #[rstest]
    #[case(AbortReason::Operator, 2)]
    #[case(AbortReason::TempTooHigh, 3)]
    #[case(AbortReason::LostConnection, 4)]
    #[case(AbortReason::UnknownError, 5)]
    #[case(AbortReason::TooManyErrors, 6)]
    #[case(AbortReason::Actuator("x".into()), 7)]
    fn abort_reasons_have_stable_exit_codes(#[case] r: AbortReason, #[case] code: i32) {
        assert_eq!(exit_code_for_error(&abort(r)), code);
    }

    #[test]
    fn other_errors_exit_with_one() {
        assert_eq!(exit_code_for_error(&eyre::eyre!("boom")), 1);
        let refused = eyre::Report::new(KilnError::StartRefused("no connection".into()));
        assert_eq!(exit_code_for_error(&refused), 8);
    }

    #[test]
    fn humanize_explains_emergency_shutoff() {
        let text = humanize(&abort(AbortReason::TempTooHigh));
        assert!(text.contains("Emergency shutoff"), "{text}");
    }

    #[test]
    fn json_error_carries_reason_name() {
        let v: serde_json::Value =
            serde_json::from_str(&format_error_json(&abort(AbortReason::LostConnection)))
                .expect("json");
        assert_eq!(v["reason"], "LostConnection");
        assert!(v["message"].as_str().is_some_and(|m| m.contains("thermocouple")));
    }

    #[test]
    fn calibration_header_is_special_cased() {
        let e = eyre::eyre!("calibration CSV must have headers 'temp,offset'; got: a,b");
        assert!(humanize(&e).contains("Expected 'temp,offset'"));
    }
}
