use std::sync::LazyLock;

use serde::Serialize;
use tracing::debug;

use crate::types::{JurisdictionRule, RuleLevel};

/// Deadline used when nothing more specific is registered.
pub const GENERIC_DEADLINE_DAYS: u32 = 21;

/// Appeal grounds that apply across jurisdictions.
pub const COMMON_GROUNDS: &[&str] = &[
    "unclear_signage",
    "emergency_circumstances",
    "vehicle_malfunction",
    "medical_emergency",
    "incorrect_citation_details",
    "meter_malfunction",
    "conflicting_signs",
    "first_time_offense",
    "extenuating_circumstances",
    "procedural_errors",
    "incorrect_vehicle_info",
    "paid_but_not_displayed",
    "time_discrepancy",
    "zone_confusion",
    "disability_accommodation",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSummary {
    pub code: &'static str,
    pub name: &'static str,
}

struct StateEntry {
    code: &'static str,
    name: &'static str,
    deadline_days: u32,
    appeal_process: &'static str,
    defenses: &'static [&'static str],
}

struct CityEntry {
    name: &'static str,
    state: &'static str,
    rules: &'static [&'static str],
    online_appeal: bool,
    fee_waiver_available: bool,
}

const STATES: &[StateEntry] = &[
    StateEntry {
        code: "CA",
        name: "California",
        deadline_days: 21,
        appeal_process: "City parking authority or designated appeals board",
        defenses: &[
            "CVC 22507.8 - Disabled parking violations require proper investigation",
            "CVC 40215 - Notice of parking violation must be securely attached",
            "Signage must comply with Manual on Uniform Traffic Control Devices (MUTCD)",
        ],
    },
    StateEntry {
        code: "NY",
        name: "New York",
        deadline_days: 30,
        appeal_process: "Department of Finance, Parking Violations Bureau",
        defenses: &[
            "NYC Traffic Rules require clear and visible signage",
            "Broken meters - proof required within 7 days",
            "Emergency vehicles - documentation required",
        ],
    },
    StateEntry {
        code: "TX",
        name: "Texas",
        deadline_days: 21,
        appeal_process: "Municipal court or designated hearing officer",
        defenses: &[
            "Transportation Code 681.0101 - Proper notice requirements",
            "Sign visibility and compliance with state standards",
            "Meter malfunction - immediate reporting helps case",
        ],
    },
    StateEntry {
        code: "FL",
        name: "Florida",
        deadline_days: 30,
        appeal_process: "City clerk or parking violations bureau",
        defenses: &[
            "F.S. 316.1967 - Parking regulations must be clearly posted",
            "Meter violations - malfunction must be documented",
            "Emergency circumstances with supporting documentation",
        ],
    },
    StateEntry {
        code: "IL",
        name: "Illinois",
        deadline_days: 21,
        appeal_process: "Department of Administrative Hearings",
        defenses: &[
            "Chicago Municipal Code - signage requirements",
            "Meter payment issues - transaction records",
            "Medical emergency documentation",
        ],
    },
];

const CITIES: &[CityEntry] = &[
    CityEntry {
        name: "San Francisco",
        state: "CA",
        rules: &[
            "SFMTA requires photos of signage for signage-related appeals",
            "Street cleaning violations - check SFMTA calendar",
            "Residential permit zones - proof of residency required",
        ],
        online_appeal: true,
        fee_waiver_available: true,
    },
    CityEntry {
        name: "Los Angeles",
        state: "CA",
        rules: &[
            "LADOT handles parking enforcement",
            "First-time violators may get reduced fines",
            "Photo evidence highly recommended",
        ],
        online_appeal: true,
        fee_waiver_available: false,
    },
    CityEntry {
        name: "New York City",
        state: "NY",
        rules: &[
            "Online appeals through NYC.gov required for most violations",
            "Hearing requests must be filed within 30 days",
            "Evidence upload system available online",
        ],
        online_appeal: true,
        fee_waiver_available: false,
    },
    CityEntry {
        name: "Chicago",
        state: "IL",
        rules: &[
            "City of Chicago parking ticket portal",
            "Early payment discount available (not applicable if appealing)",
            "Administrative hearing process",
        ],
        online_appeal: true,
        fee_waiver_available: false,
    },
    CityEntry {
        name: "Houston",
        state: "TX",
        rules: &[
            "Houston Municipal Courts handle appeals",
            "Written statement required for appeal",
            "Court appearance may be required for some violations",
        ],
        online_appeal: false,
        fee_waiver_available: true,
    },
    CityEntry {
        name: "Miami",
        state: "FL",
        rules: &[
            "Miami Parking Authority handles enforcement",
            "Online contest system available",
            "Supporting documents must be uploaded or mailed",
        ],
        online_appeal: true,
        fee_waiver_available: false,
    },
];

struct Registry {
    states: Vec<JurisdictionRule>,
    cities: Vec<JurisdictionRule>,
    generic: JurisdictionRule,
}

static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::build);

impl Registry {
    fn build() -> Self {
        let state_rule = |s: &StateEntry| JurisdictionRule {
            state: s.code.to_string(),
            state_name: s.name.to_string(),
            city: None,
            deadline_days: s.deadline_days,
            appeal_process: s.appeal_process.to_string(),
            notes: s.defenses.iter().map(|d| d.to_string()).collect(),
            online_appeal: None,
            fee_waiver_available: None,
            level: RuleLevel::State,
        };

        let states: Vec<JurisdictionRule> = STATES.iter().map(state_rule).collect();

        let cities = CITIES
            .iter()
            .filter_map(|c| {
                let parent = STATES.iter().find(|s| s.code == c.state)?;
                let mut rule = state_rule(parent);
                rule.city = Some(c.name.to_string());
                rule.notes.extend(c.rules.iter().map(|r| r.to_string()));
                rule.online_appeal = Some(c.online_appeal);
                rule.fee_waiver_available = Some(c.fee_waiver_available);
                rule.level = RuleLevel::City;
                Some(rule)
            })
            .collect();

        let generic = JurisdictionRule {
            state: String::new(),
            state_name: "Unregistered jurisdiction".into(),
            city: None,
            deadline_days: GENERIC_DEADLINE_DAYS,
            appeal_process: "The agency named on the citation (parking authority, \
                             municipal court, or hearing office)"
                .into(),
            notes: vec![
                "Confirm the appeal deadline printed on the citation".into(),
                "Posted signage should be clear, visible and consistent".into(),
                "Keep copies of every document submitted with the appeal".into(),
            ],
            online_appeal: None,
            fee_waiver_available: None,
            level: RuleLevel::Generic,
        };

        Self {
            states,
            cities,
            generic,
        }
    }
}

fn norm(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Exact (state, city) first, then the state rule, then the generic rule.
/// Never fails.
pub fn resolve(state: &str, city: Option<&str>) -> &'static JurisdictionRule {
    let reg = &*REGISTRY;
    let state_key = norm(state);
    let Some(state_rule) = reg.states.iter().find(|r| r.state.to_lowercase() == state_key) else {
        debug!(state, "unregistered state, using generic jurisdiction rule");
        return &reg.generic;
    };

    let city_key = city.map(norm).filter(|c| !c.is_empty());
    if let Some(city_key) = city_key {
        let found = reg.cities.iter().find(|r| {
            r.state == state_rule.state
                && r.city.as_deref().map(norm).as_deref() == Some(city_key.as_str())
        });
        if let Some(rule) = found {
            return rule;
        }
        debug!(
            state = %state_rule.state,
            city = %city_key,
            "city not registered under state, using state rule"
        );
    }
    state_rule
}

pub fn states() -> Vec<StateSummary> {
    STATES
        .iter()
        .map(|s| StateSummary {
            code: s.code,
            name: s.name,
        })
        .collect()
}

/// City names registered under `state`, in registry order.
pub fn cities_for_state(state: &str) -> Vec<&'static str> {
    let key = norm(state);
    CITIES
        .iter()
        .filter(|c| c.state.to_lowercase() == key)
        .map(|c| c.name)
        .collect()
}

pub fn common_grounds() -> &'static [&'static str] {
    COMMON_GROUNDS
}

/// Rule text as embedded in prompts.
pub fn describe(rule: &JurisdictionRule) -> String {
    let mut out = String::new();
    out.push_str(&format!("Jurisdiction: {}\n", rule.display_name()));
    out.push_str(&format!(
        "Appeal Deadline: {} days from citation\n",
        rule.deadline_days
    ));
    out.push_str(&format!("Appeal Process: {}\n", rule.appeal_process));
    if let Some(online) = rule.online_appeal {
        out.push_str(&format!(
            "Online Appeal Available: {}\n",
            if online { "yes" } else { "no" }
        ));
    }
    if let Some(waiver) = rule.fee_waiver_available {
        out.push_str(&format!(
            "Fee Waiver Available: {}\n",
            if waiver { "yes" } else { "no" }
        ));
    }
    if !rule.notes.is_empty() {
        out.push_str("\nRelevant Regulations and Local Rules:\n");
        for note in &rule.notes {
            out.push_str(&format!("- {note}\n"));
        }
    }
    out
}
