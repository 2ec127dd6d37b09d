use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::AppealError;

// ── Situational Flags ────────────────────────────────────────────────────

/// Generates `SituationFlags` plus name-based accessors so callers can
/// address flags by their wire name (follow-up answers, prompt rendering).
macro_rules! situation_flags {
    ($($(#[$doc:meta])* $field:ident,)*) => {
        /// Boolean facts about the parking situation. Flattened into the case
        /// record on the wire; every flag defaults to false.
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct SituationFlags {
            $($(#[$doc])* pub $field: bool,)*
        }

        impl SituationFlags {
            pub const NAMES: &'static [&'static str] = &[$(stringify!($field)),*];

            pub fn get(&self, name: &str) -> Option<bool> {
                match name {
                    $(stringify!($field) => Some(self.$field),)*
                    _ => None,
                }
            }

            /// Set a flag by name. Returns false if the name is unknown.
            pub fn set(&mut self, name: &str) -> bool {
                match name {
                    $(stringify!($field) => {
                        self.$field = true;
                        true
                    })*
                    _ => false,
                }
            }
        }
    };
}

situation_flags! {
    /// Citation contains errors of any kind.
    has_errors,
    /// Required information is missing from the citation.
    missing_info,
    incorrect_vehicle_info,
    unclear_signage,
    no_visible_signs,
    conflicting_signs,
    meter_malfunction,
    payment_failed,
    paid_but_cited,
    emergency_situation,
    paid_for_parking,
    paid_not_displayed,
    receipt_not_visible,
    unclear_zone,
    zone_boundary_unclear,
    /// First parking violation in this jurisdiction.
    first_violation,
    disability_related,
    has_disability_placard,
    time_incorrect,
    timeline_conflicts,
}

impl SituationFlags {
    /// Names of all flags currently set, in declaration order.
    pub fn active(&self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .copied()
            .filter(|name| self.get(name) == Some(true))
            .collect()
    }
}

// ── Case Record ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleInfo {
    pub make: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
    pub license_plate: Option<String>,
}

impl VehicleInfo {
    /// "Blue Honda Civic (plate 7ABC123)", or None when nothing is known.
    pub fn describe(&self) -> Option<String> {
        let body: Vec<&str> = [&self.color, &self.make, &self.model]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect();
        let plate = self
            .license_plate
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());
        match (body.is_empty(), plate) {
            (true, None) => None,
            (true, Some(p)) => Some(format!("plate {p}")),
            (false, None) => Some(body.join(" ")),
            (false, Some(p)) => Some(format!("{} (plate {p})", body.join(" "))),
        }
    }
}

/// One piece of evidence the person holds. Accepts either a bare string or
/// `{ "item": ..., "details": ... }` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "EvidenceRepr")]
pub struct Evidence {
    pub item: String,
    pub details: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EvidenceRepr {
    Item(String),
    Detailed {
        item: String,
        #[serde(default)]
        details: Option<String>,
    },
}

impl From<EvidenceRepr> for Evidence {
    fn from(repr: EvidenceRepr) -> Self {
        match repr {
            EvidenceRepr::Item(item) => Self { item, details: None },
            EvidenceRepr::Detailed { item, details } => Self { item, details },
        }
    }
}

impl Evidence {
    pub fn new(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// The facts of one contested citation as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CitationCase {
    pub citation_number: String,
    pub citation_date: String,
    pub citation_time: Option<String>,
    pub location: String,
    pub violation_type: String,
    pub fine_amount: Option<String>,
    /// Two-letter state code.
    pub state: String,
    pub city: Option<String>,
    pub vehicle: VehicleInfo,
    #[serde(flatten)]
    pub flags: SituationFlags,
    /// Free-text situational details (`emergency_description`, `payment_method`, ...).
    /// Read from any string field sent flat on the record, or from a nested
    /// `details` object.
    #[serde(flatten, deserialize_with = "string_details")]
    pub details: BTreeMap<String, String>,
    pub evidence: Vec<Evidence>,
    pub additional_info: Option<String>,
}

impl CitationCase {
    /// Reject a case that is missing any field the appeal cannot do without.
    pub fn validate(&self) -> Result<(), AppealError> {
        let required = [
            ("citation_number", &self.citation_number),
            ("citation_date", &self.citation_date),
            ("location", &self.location),
            ("violation_type", &self.violation_type),
            ("state", &self.state),
        ];
        let missing: Vec<String> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| (*name).to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppealError::InvalidInput { missing })
        }
    }

    /// Labeled, non-empty case facts in a stable order for prompt rendering.
    pub fn facts(&self) -> Vec<(String, String)> {
        let mut facts = Vec::new();
        let mut push = |label: &str, value: Option<&str>| {
            if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
                facts.push((label.to_string(), v.to_string()));
            }
        };
        push("Citation Number", Some(&self.citation_number));
        push("Citation Date", Some(&self.citation_date));
        push("Citation Time", self.citation_time.as_deref());
        push("Location", Some(&self.location));
        push("Violation Type", Some(&self.violation_type));
        push("Fine Amount", self.fine_amount.as_deref());
        let vehicle = self.vehicle.describe();
        push("Vehicle", vehicle.as_deref());
        for (key, value) in &self.details {
            push(&title_case(key), Some(value));
        }
        push("Additional Info", self.additional_info.as_deref());
        facts
    }
}

/// Collects the string fields left over once the named fields and flags are
/// taken. Non-string leftovers are ignored.
fn string_details<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let rest = BTreeMap::<String, Value>::deserialize(deserializer)?;
    let mut details = BTreeMap::new();
    for (key, value) in rest {
        match value {
            Value::String(s) => {
                details.insert(key, s);
            },
            Value::Object(nested) if key == "details" => {
                for (k, v) in nested {
                    if let Value::String(s) = v {
                        details.insert(k, s);
                    }
                }
            },
            _ => {},
        }
    }
    Ok(details)
}

/// `emergency_description` → `Emergency Description`.
pub fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Follow-up ────────────────────────────────────────────────────────────

/// A suggested question, tagged with the angle that contributed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpQuestion {
    pub angle: String,
    pub question: String,
}

/// The caller's answer to a follow-up question. Untagged answers apply to
/// every document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpAnswer {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub angle: Option<String>,
}

impl FollowUpAnswer {
    pub fn applies_to(&self, angle_key: &str) -> bool {
        self.angle.as_deref().map_or(true, |a| a == angle_key)
    }
}

/// Everything a caller may supply in the optional follow-up round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowUpResponse {
    pub answers: Vec<FollowUpAnswer>,
    /// Extra situational flags revealed by the answers.
    pub flags: Vec<String>,
}

// ── Angles ───────────────────────────────────────────────────────────────

pub type TriggerFn = fn(&SituationFlags) -> bool;

/// A named argument strategy for contesting a citation.
#[derive(Serialize)]
pub struct AppealAngle {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    #[serde(skip)]
    pub trigger: TriggerFn,
    pub strength_indicators: &'static [&'static str],
    pub required_evidence: &'static [&'static str],
    /// Question templates; `{location}`, `{violation_type}` and
    /// `{citation_date}` are filled from the case.
    pub questions: &'static [&'static str],
}

impl fmt::Debug for AppealAngle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppealAngle")
            .field("key", &self.key)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl AppealAngle {
    pub fn applies_to(&self, case: &CitationCase) -> bool {
        (self.trigger)(&case.flags)
    }

    pub fn render_questions(&self, case: &CitationCase) -> Vec<String> {
        self.questions
            .iter()
            .map(|template| {
                template
                    .replace("{location}", or_placeholder(&case.location, "the citation location"))
                    .replace("{violation_type}", or_placeholder(&case.violation_type, "the violation"))
                    .replace("{citation_date}", or_placeholder(&case.citation_date, "the citation date"))
            })
            .collect()
    }
}

fn or_placeholder<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback
    } else {
        trimmed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Strong,
    Moderate,
    Weak,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AngleStrength {
    pub angle: String,
    pub strength: Strength,
}

// ── Jurisdiction ─────────────────────────────────────────────────────────

/// Which level of the registry answered a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleLevel {
    City,
    State,
    Generic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JurisdictionRule {
    /// Two-letter code, or empty for the generic rule.
    pub state: String,
    pub state_name: String,
    pub city: Option<String>,
    pub deadline_days: u32,
    pub appeal_process: String,
    /// State-level defenses followed by city rules.
    pub notes: Vec<String>,
    pub online_appeal: Option<bool>,
    pub fee_waiver_available: Option<bool>,
    pub level: RuleLevel,
}

impl JurisdictionRule {
    pub fn display_name(&self) -> String {
        match (&self.city, self.level) {
            (_, RuleLevel::Generic) => self.state_name.clone(),
            (Some(city), _) => format!("{city}, {}", self.state_name),
            (None, _) => self.state_name.clone(),
        }
    }
}

// ── Analysis ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Generated,
    /// The generation service was unavailable; `analysis` is a placeholder.
    Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Matched angle keys in catalog order.
    pub angle_keys: Vec<String>,
    pub jurisdiction: JurisdictionRule,
    pub analysis: String,
    pub status: AnalysisStatus,
    pub strengths: Vec<AngleStrength>,
    pub questions: Vec<FollowUpQuestion>,
}

impl AnalysisResult {
    pub fn is_degraded(&self) -> bool {
        self.status == AnalysisStatus::Degraded
    }

    pub fn angles(&self) -> Vec<&'static AppealAngle> {
        self.angle_keys
            .iter()
            .filter_map(|key| crate::angles::angle(key))
            .collect()
    }
}

// ── Documents ────────────────────────────────────────────────────────────

/// Key of the consolidated letter. Never an angle key.
pub const COMPREHENSIVE_KEY: &str = "comprehensive";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Generated,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub model: String,
    pub generated_at: DateTime<Utc>,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppealDocument {
    /// Angle key, or `COMPREHENSIVE_KEY`.
    pub key: String,
    pub name: String,
    pub text: String,
    pub status: DocumentStatus,
    pub error: Option<String>,
    pub metadata: GenerationMetadata,
}

impl AppealDocument {
    pub fn is_comprehensive(&self) -> bool {
        self.key == COMPREHENSIVE_KEY
    }

    pub fn is_generated(&self) -> bool {
        self.status == DocumentStatus::Generated
    }
}

/// Which documents a generation pass produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationScope {
    /// One letter per angle, then the comprehensive letter.
    #[default]
    Full,
    ComprehensiveOnly,
}

// ── Result Package ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Complete,
    Degraded,
}

/// Everything a finished run hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPackage {
    pub citation_number: String,
    pub status: RunStatus,
    pub analysis: AnalysisResult,
    /// Per-angle documents in catalog order, comprehensive last.
    pub documents: Vec<AppealDocument>,
    pub angles_used: Vec<String>,
    pub warnings: Vec<String>,
}

impl ResultPackage {
    pub fn comprehensive(&self) -> Option<&AppealDocument> {
        self.documents.iter().find(|d| d.is_comprehensive())
    }

    pub fn individual(&self) -> impl Iterator<Item = &AppealDocument> {
        self.documents.iter().filter(|d| !d.is_comprehensive())
    }
}

// ── Workflow Stage ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Gathering,
    Analyzed,
    FollowedUp,
    Generated,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Gathering => "gathering",
            Self::Analyzed => "analyzed",
            Self::FollowedUp => "followed_up",
            Self::Generated => "generated",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}
