/// Unit tests for phone normalization and call qualification
/// Tests the pure decision logic the pipeline is built on
use chrono::{TimeZone, Utc};
use rc_zoho_sync::models::{CallDirection, CallLeg, CallRecord};
use rc_zoho_sync::phone;
use rc_zoho_sync::qualifier::{self, Qualification};

fn leg(result: &str, telephony_status: &str) -> CallLeg {
    CallLeg {
        result: result.to_string(),
        telephony_status: telephony_status.to_string(),
    }
}

fn call_with_legs(legs: Vec<CallLeg>) -> CallRecord {
    CallRecord {
        id: "call-1".to_string(),
        direction: CallDirection::Inbound,
        from_number: Some("+12025550123".to_string()),
        to_extension_id: Some("101".to_string()),
        start_time: Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap(),
        duration_seconds: 60,
        legs,
        recording_ref: None,
        spam: false,
        blocked: false,
    }
}

#[cfg(test)]
mod phone_normalization_tests {
    use super::*;

    #[test]
    fn test_equivalent_formats_normalize_identically() {
        assert_eq!(
            phone::normalize("(202) 555-0123"),
            Some("2025550123".to_string())
        );
        assert_eq!(
            phone::normalize("2025550123"),
            Some("2025550123".to_string())
        );
        assert_eq!(
            phone::normalize("+1 202 555 0123"),
            Some("2025550123".to_string())
        );
    }

    #[test]
    fn test_leading_one_dropped_from_eleven_digits() {
        assert_eq!(
            phone::normalize("12025550123"),
            Some("2025550123".to_string())
        );
        assert_eq!(
            phone::normalize("+1-202-555-0123"),
            Some("2025550123".to_string())
        );
    }

    #[test]
    fn test_eleven_digits_without_leading_one_kept() {
        assert_eq!(
            phone::normalize("22025550123"),
            Some("22025550123".to_string())
        );
    }

    #[test]
    fn test_short_numbers_are_invalid() {
        assert_eq!(phone::normalize("911"), None);
        assert_eq!(phone::normalize("555-0123"), None);
        assert_eq!(phone::normalize(""), None);
        assert_eq!(phone::normalize("   "), None);
    }

    #[test]
    fn test_letters_are_stripped_not_translated() {
        // Vanity numbers lose their letters entirely
        assert_eq!(phone::normalize("1-800-FLOWERS"), None);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let normalized = phone::normalize("(202) 555-0123").unwrap();
        assert_eq!(phone::normalize(&normalized), Some(normalized.clone()));
    }
}

#[cfg(test)]
mod search_variant_tests {
    use super::*;

    #[test]
    fn test_ten_digit_number_gets_four_variants() {
        let variants = phone::search_variants("2025550123");
        assert_eq!(
            variants,
            vec![
                "2025550123".to_string(),
                "12025550123".to_string(),
                "+12025550123".to_string(),
                "(202) 555-0123".to_string(),
            ]
        );
    }

    #[test]
    fn test_longer_number_gets_only_itself() {
        let variants = phone::search_variants("22025550123");
        assert_eq!(variants, vec!["22025550123".to_string()]);
    }
}

#[cfg(test)]
mod qualifier_tests {
    use super::*;

    #[test]
    fn test_accepted_leg_with_connected_status_qualifies() {
        let call = call_with_legs(vec![leg("Accepted", "CallConnected")]);
        assert_eq!(qualifier::qualify(&call), Qualification::Accepted);
    }

    #[test]
    fn test_every_connected_status_qualifies() {
        for status in ["CallConnected", "Answered", "HoldOn", "HoldOff"] {
            let call = call_with_legs(vec![leg("Accepted", status)]);
            assert_eq!(
                qualifier::qualify(&call),
                Qualification::Accepted,
                "status {} should qualify",
                status
            );
        }
    }

    #[test]
    fn test_accepted_result_without_connection_does_not_qualify() {
        let call = call_with_legs(vec![leg("Accepted", "NoCall")]);
        assert_eq!(qualifier::qualify(&call), Qualification::NotAccepted);
    }

    #[test]
    fn test_any_qualifying_leg_is_enough() {
        let call = call_with_legs(vec![
            leg("Missed", "NoCall"),
            leg("Accepted", "Answered"),
        ]);
        assert_eq!(qualifier::qualify(&call), Qualification::Accepted);
    }

    #[test]
    fn test_connected_status_on_unaccepted_leg_does_not_qualify() {
        // Both conditions must hold on the same leg
        let call = call_with_legs(vec![
            leg("Missed", "CallConnected"),
            leg("Accepted", "NoCall"),
        ]);
        assert_eq!(qualifier::qualify(&call), Qualification::NotAccepted);
    }

    #[test]
    fn test_result_comparison_is_exact() {
        let call = call_with_legs(vec![leg("accepted", "CallConnected")]);
        assert_eq!(qualifier::qualify(&call), Qualification::NotAccepted);
    }

    #[test]
    fn test_empty_legs_do_not_qualify() {
        let call = call_with_legs(Vec::new());
        assert_eq!(qualifier::qualify(&call), Qualification::NotAccepted);
    }

    #[test]
    fn test_spam_short_circuits_qualifying_legs() {
        let mut call = call_with_legs(vec![leg("Accepted", "CallConnected")]);
        call.spam = true;
        assert_eq!(qualifier::qualify(&call), Qualification::NotAccepted);
    }

    #[test]
    fn test_blocked_short_circuits_qualifying_legs() {
        let mut call = call_with_legs(vec![leg("Accepted", "Answered")]);
        call.blocked = true;
        assert_eq!(qualifier::qualify(&call), Qualification::NotAccepted);
    }
}

#[cfg(test)]
mod missed_sense_tests {
    use super::*;

    #[test]
    fn test_unanswered_call_is_missed() {
        let call = call_with_legs(vec![leg("Missed", "NoCall")]);
        assert!(qualifier::is_missed(&call));
    }

    #[test]
    fn test_voicemail_call_is_missed() {
        let call = call_with_legs(vec![leg("VoiceMail", "VoiceMail")]);
        assert!(qualifier::is_missed(&call));
    }

    #[test]
    fn test_accepted_call_is_not_missed() {
        let call = call_with_legs(vec![leg("Accepted", "CallConnected")]);
        assert!(!qualifier::is_missed(&call));
    }

    #[test]
    fn test_spam_and_blocked_calls_are_not_missed() {
        let mut spam_call = call_with_legs(vec![leg("Missed", "NoCall")]);
        spam_call.spam = true;
        assert!(!qualifier::is_missed(&spam_call));

        let mut blocked_call = call_with_legs(vec![leg("Missed", "NoCall")]);
        blocked_call.blocked = true;
        assert!(!qualifier::is_missed(&blocked_call));
    }

    #[test]
    fn test_call_without_legs_is_not_missed() {
        // Insufficient data qualifies for neither job
        let call = call_with_legs(Vec::new());
        assert!(!qualifier::is_missed(&call));
    }
}
