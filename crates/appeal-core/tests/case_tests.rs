use appeal_core::angles::match_angles;
use appeal_core::jurisdictions::resolve;
use appeal_core::prompt::analysis_prompt;
use appeal_core::{CitationCase, Evidence};
use serde_json::json;

fn from_json(value: serde_json::Value) -> CitationCase {
    serde_json::from_value(value).unwrap()
}

// =============================================================================
// Wire format
// =============================================================================

#[test]
fn test_flat_string_details_reach_facts() {
    let case = from_json(json!({
        "citation_number": "LA-77",
        "citation_date": "2024-02-10",
        "location": "W 3rd St",
        "violation_type": "No parking",
        "state": "CA",
        "emergency_situation": true,
        "emergency_description": "rushed child to ER",
    }));

    assert!(case.flags.emergency_situation);
    assert_eq!(
        case.details.get("emergency_description").map(String::as_str),
        Some("rushed child to ER")
    );
    assert!(case
        .facts()
        .contains(&("Emergency Description".to_string(), "rushed child to ER".to_string())));

    let prompt = analysis_prompt(&case, resolve(&case.state, None), &match_angles(&case));
    assert!(prompt.contains("Emergency Description: rushed child to ER"));
}

#[test]
fn test_nested_details_and_non_string_leftovers() {
    let case = from_json(json!({
        "citation_number": "NY-9",
        "citation_date": "2024-04-01",
        "location": "Broadway",
        "violation_type": "Expired meter",
        "state": "NY",
        "details": { "payment_method": "ParkNYC app", "attempts": 3 },
        "meter_id": "M-2231",
        "photo_count": 4,
    }));

    assert_eq!(case.details.get("payment_method").map(String::as_str), Some("ParkNYC app"));
    assert_eq!(case.details.get("meter_id").map(String::as_str), Some("M-2231"));
    assert!(!case.details.contains_key("attempts"));
    assert!(!case.details.contains_key("photo_count"));
    // Named fields never leak into the details map.
    assert!(!case.details.contains_key("location"));
    assert_eq!(case.location, "Broadway");
}

#[test]
fn test_flags_default_to_false_and_are_not_details() {
    let case = from_json(json!({
        "citation_number": "C-1",
        "state": "TX",
        "first_violation": true,
    }));
    assert!(case.flags.first_violation);
    assert!(!case.flags.unclear_signage);
    assert!(case.details.is_empty());
    assert_eq!(case.flags.active(), vec!["first_violation"]);
}

#[test]
fn test_evidence_accepts_string_or_object() {
    let case = from_json(json!({
        "evidence": [
            "Witness statements",
            { "item": "Police report", "details": "case 4411" },
        ],
    }));
    assert_eq!(
        case.evidence,
        vec![
            Evidence::new("Witness statements"),
            Evidence::new("Police report").with_details("case 4411"),
        ]
    );
}
