//! Maps `Box<dyn Error>` from trait boundaries to typed `KilnError`.
//!
//! The traits in `kiln_traits` use `Box<dyn Error + Send + Sync>`; this module
//! converts those to our typed error enum, with an optional feature-gated path
//! for `kiln_hardware::HwError` downcasting.

use crate::error::KilnError;

/// Map a trait-boundary error to a typed `KilnError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> KilnError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<kiln_hardware::error::HwError>() {
            return match hw {
                kiln_hardware::error::HwError::Timeout => KilnError::Timeout,
                other => KilnError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        KilnError::Timeout
    } else {
        KilnError::Hardware(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_strings_map_to_timeout() {
        let e = std::io::Error::other("spi timeout");
        assert!(matches!(map_hw_error(&e), KilnError::Timeout));
    }

    #[test]
    fn other_errors_keep_their_message() {
        let e = std::io::Error::other("relay stuck");
        match map_hw_error(&e) {
            KilnError::Hardware(msg) => assert_eq!(msg, "relay stuck"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn typed_hw_errors_are_downcast() {
        let e = kiln_hardware::error::HwError::Gpio("pin busy".into());
        assert!(matches!(map_hw_error(&e), KilnError::HardwareFault(_)));
        let e = kiln_hardware::error::HwError::Timeout;
        assert!(matches!(map_hw_error(&e), KilnError::Timeout));
    }
}
