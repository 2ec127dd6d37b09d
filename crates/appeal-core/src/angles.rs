use crate::types::{AppealAngle, CitationCase, Evidence, SituationFlags, Strength};

/// Bumped whenever an angle is added, removed, reordered, or its trigger changes.
pub const CATALOG_VERSION: &str = "2024.1";

pub fn all_angles() -> &'static [AppealAngle] {
    &CATALOG
}

pub fn angle(key: &str) -> Option<&'static AppealAngle> {
    CATALOG.iter().find(|a| a.key == key)
}

/// Position of `key` in the catalog. Unknown keys sort last.
pub fn catalog_index(key: &str) -> usize {
    CATALOG
        .iter()
        .position(|a| a.key == key)
        .unwrap_or(CATALOG.len())
}

/// Order-preserving filter of the catalog by trigger. An empty result is valid.
pub fn match_angles(case: &CitationCase) -> Vec<&'static AppealAngle> {
    CATALOG.iter().filter(|a| a.applies_to(case)).collect()
}

/// Share of the angle's typical evidence the case can produce:
/// at least 70% is strong, at least 40% moderate.
pub fn evidence_strength(angle: &AppealAngle, evidence: &[Evidence]) -> Strength {
    if angle.required_evidence.is_empty() {
        return Strength::Weak;
    }
    let covered = angle
        .required_evidence
        .iter()
        .filter(|required| evidence.iter().any(|e| covers(&e.item, required)))
        .count();
    let ratio = covered as f64 / angle.required_evidence.len() as f64;
    if ratio >= 0.7 {
        Strength::Strong
    } else if ratio >= 0.4 {
        Strength::Moderate
    } else {
        Strength::Weak
    }
}

fn slug(s: &str) -> String {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Items match on their slug, or when a multi-word item is contained in the
/// other one ("parking receipt" covers "Original parking receipt").
fn covers(item: &str, required: &str) -> bool {
    let item = slug(item);
    let required = slug(required);
    if item.is_empty() {
        return false;
    }
    if item == required {
        return true;
    }
    let multi_word = |s: &str| s.contains('_');
    (multi_word(&item) && required.contains(&item))
        || (multi_word(&required) && item.contains(&required))
}

// ── Triggers ─────────────────────────────────────────────────────────────

fn procedural_error(f: &SituationFlags) -> bool {
    f.has_errors || f.missing_info || f.incorrect_vehicle_info
}

fn signage_issues(f: &SituationFlags) -> bool {
    f.unclear_signage || f.no_visible_signs || f.conflicting_signs
}

fn meter_malfunction(f: &SituationFlags) -> bool {
    f.meter_malfunction || f.payment_failed || f.paid_but_cited
}

fn emergency_circumstances(f: &SituationFlags) -> bool {
    f.emergency_situation
}

fn payment_display_issue(f: &SituationFlags) -> bool {
    f.paid_not_displayed || f.receipt_not_visible
}

fn zone_confusion(f: &SituationFlags) -> bool {
    f.unclear_zone || f.zone_boundary_unclear
}

fn first_violation(f: &SituationFlags) -> bool {
    f.first_violation
}

fn disability_accommodation(f: &SituationFlags) -> bool {
    f.disability_related || f.has_disability_placard
}

fn time_discrepancy(f: &SituationFlags) -> bool {
    f.time_incorrect || f.timeline_conflicts
}

// ── Catalog ──────────────────────────────────────────────────────────────

static CATALOG: [AppealAngle; 9] = [
    AppealAngle {
        key: "procedural_error",
        name: "Procedural Error",
        description: "Citation was issued incorrectly or does not follow proper procedures",
        trigger: procedural_error,
        strength_indicators: &[
            "Incorrect vehicle information",
            "Wrong date or time",
            "Citation not properly attached",
            "Missing required information",
            "Officer signature missing",
        ],
        required_evidence: &[
            "Photos of the citation showing errors",
            "Vehicle registration showing correct information",
            "Photos showing improper attachment if applicable",
        ],
        questions: &[
            "Was the citation securely attached to your vehicle?",
            "Are all details on the citation accurate (date, time, location, vehicle info)?",
            "Did the officer follow proper procedures when issuing the {violation_type} citation?",
            "Is the citation number valid and legible?",
        ],
    },
    AppealAngle {
        key: "signage_issues",
        name: "Inadequate or Confusing Signage",
        description: "Parking restrictions were not clearly posted or signs were confusing",
        trigger: signage_issues,
        strength_indicators: &[
            "No sign visible from parking spot",
            "Sign obstructed by trees/objects",
            "Conflicting information from multiple signs",
            "Faded or illegible signs",
            "Sign not meeting MUTCD standards",
        ],
        required_evidence: &[
            "Photos showing parking spot and nearby signage",
            "Photos of any obstructions or damaged signs",
            "Photos showing perspective from driver's position",
            "Multiple angles showing sign placement",
        ],
        questions: &[
            "Were there clear signs indicating the parking restriction at {location}?",
            "Were the signs visible and unobstructed?",
            "Were there conflicting signs in the area?",
            "Was the sign text legible and in compliance with local standards?",
        ],
    },
    AppealAngle {
        key: "meter_malfunction",
        name: "Meter or Payment System Malfunction",
        description: "The parking meter or payment system was not working properly",
        trigger: meter_malfunction,
        strength_indicators: &[
            "Meter displayed 'out of order'",
            "Payment transaction failed but money charged",
            "Receipt showing payment attempt",
            "Multiple users reporting same issue",
        ],
        required_evidence: &[
            "Photos of meter showing malfunction",
            "Payment receipts or transaction records",
            "Credit card statement showing charge",
            "Report filed about meter malfunction",
        ],
        questions: &[
            "Did you attempt to pay for parking at {location}?",
            "Was the meter displaying any error messages?",
            "Did you report the malfunction?",
            "Do you have proof of attempted payment?",
        ],
    },
    AppealAngle {
        key: "emergency_circumstances",
        name: "Emergency or Extenuating Circumstances",
        description: "Parking violation occurred due to an emergency situation",
        trigger: emergency_circumstances,
        strength_indicators: &[
            "Medical emergency",
            "Vehicle breakdown",
            "Avoiding accident",
            "Personal safety concern",
            "Family emergency",
        ],
        required_evidence: &[
            "Medical records or doctor's note",
            "Police report if applicable",
            "Tow truck receipt or mechanic report",
            "Photos showing vehicle condition",
            "Witness statements if available",
        ],
        questions: &[
            "What was the nature of the emergency on {citation_date}?",
            "Do you have documentation of the emergency?",
            "Was this your first parking violation?",
            "How long was the vehicle parked?",
        ],
    },
    AppealAngle {
        key: "payment_display_issue",
        name: "Valid Payment Not Displayed",
        description: "Payment was made but receipt was not properly displayed",
        trigger: payment_display_issue,
        strength_indicators: &[
            "Receipt timestamp before citation time",
            "Payment for correct zone/meter",
            "Receipt fell inside vehicle",
            "Wind blew receipt away",
        ],
        required_evidence: &[
            "Original parking receipt",
            "Credit card or app payment confirmation",
            "Photos of receipt with timestamp",
            "Transaction records from parking app",
        ],
        questions: &[
            "Did you pay for parking before the citation was issued?",
            "Do you have the parking receipt?",
            "Why was the receipt not displayed?",
            "What time was payment made vs. citation issued?",
        ],
    },
    AppealAngle {
        key: "zone_confusion",
        name: "Unclear Zone or Time Restrictions",
        description: "Zone boundaries or time restrictions were unclear or ambiguous",
        trigger: zone_confusion,
        strength_indicators: &[
            "No clear zone boundary markings",
            "Conflicting zone signs",
            "Time restriction periods unclear",
            "Street cleaning schedule ambiguous",
        ],
        required_evidence: &[
            "Photos showing zone markings (or lack thereof)",
            "Photos of relevant signage",
            "Screenshot of official parking map if applicable",
            "Photos showing perspective of parking location",
        ],
        questions: &[
            "Were zone boundaries clearly marked at {location}?",
            "Were time restrictions clearly posted?",
            "Were there multiple overlapping zones?",
            "Was the zone map accurate?",
        ],
    },
    AppealAngle {
        key: "first_violation",
        name: "First-Time Violation / Good Record",
        description: "Request for leniency based on clean parking record",
        trigger: first_violation,
        strength_indicators: &[
            "No prior parking citations",
            "Long-time resident or worker in area",
            "Regular parker with good history",
            "Simple misunderstanding of rules",
        ],
        required_evidence: &[
            "Driving record or DMV printout",
            "Statement of good parking history",
            "Proof of residency or employment in area",
            "Character reference if applicable",
        ],
        questions: &[
            "Is this your first parking violation in this jurisdiction?",
            "How long have you been parking in this area?",
            "Do you have a generally good compliance record?",
            "Was this an honest mistake?",
        ],
    },
    AppealAngle {
        key: "disability_accommodation",
        name: "Disability-Related Accommodation",
        description: "Citation related to disability parking or accommodation needs",
        trigger: disability_accommodation,
        strength_indicators: &[
            "Valid disability placard not recognized",
            "Accessible space markings faded or unclear",
            "No accessible parking available",
            "Time limit insufficient for disability needs",
        ],
        required_evidence: &[
            "Copy of disability placard documentation",
            "Photos showing placard displayed",
            "Photos of parking space markings",
            "Medical documentation if relevant",
        ],
        questions: &[
            "Do you have a valid disability placard or license plate?",
            "Was the placard properly displayed?",
            "Was the accessible parking space properly marked?",
            "Were you denied reasonable accommodation?",
        ],
    },
    AppealAngle {
        key: "time_discrepancy",
        name: "Time Discrepancy or Error",
        description: "Citation time is incorrect or conflicts with actual circumstances",
        trigger: time_discrepancy,
        strength_indicators: &[
            "Citation time impossible or implausible",
            "Proof of being elsewhere at citation time",
            "Multiple citations same time different locations",
            "Meter time conflicts with citation time",
        ],
        required_evidence: &[
            "Timestamped photos or videos",
            "Receipt or parking payment with timestamp",
            "GPS or phone location data",
            "Witness statements",
            "Business receipts showing location at citation time",
        ],
        questions: &[
            "What time did you park?",
            "What time did you leave?",
            "Do you have proof of your timeline?",
            "What time does the citation show?",
        ],
    },
];
