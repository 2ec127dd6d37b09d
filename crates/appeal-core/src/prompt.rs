use crate::jurisdictions;
use crate::types::{AppealAngle, CitationCase, FollowUpAnswer, JurisdictionRule};

/// Characters of each per-angle draft quoted in the comprehensive prompt.
pub const DRAFT_EXCERPT_CHARS: usize = 600;

/// Indicators per angle listed in the comprehensive prompt.
const COMPREHENSIVE_INDICATORS: usize = 3;

pub fn analysis_prompt(
    case: &CitationCase,
    rule: &JurisdictionRule,
    angles: &[&AppealAngle],
) -> String {
    let mut s = String::new();
    s.push_str(ANALYSIS_PREAMBLE);
    push_section(&mut s, "CITATION DETAILS", &format_facts(case));
    push_section(&mut s, "JURISDICTION", &jurisdictions::describe(rule));
    push_section(&mut s, "AVAILABLE EVIDENCE", &format_evidence(case));
    let angle_list = if angles.is_empty() {
        "None of the standard appeal angles were identified.\n".to_string()
    } else {
        angles
            .iter()
            .map(|a| format!("- {}: {}\n", a.name, a.description))
            .collect()
    };
    push_section(&mut s, "CANDIDATE APPEAL ANGLES", &angle_list);
    s.push_str(ANALYSIS_INSTRUCTION);
    s
}

/// Prompt for one angle's letter. Answers tagged to other angles are left out.
pub fn angle_prompt(
    case: &CitationCase,
    rule: &JurisdictionRule,
    angle: &AppealAngle,
    answers: &[FollowUpAnswer],
) -> String {
    let mut s = String::new();
    s.push_str(LETTER_PREAMBLE);
    s.push_str(&format!(
        "\n\nAPPEAL STRATEGY: {}\nSTRATEGY DESCRIPTION: {}\n",
        angle.name, angle.description
    ));
    push_section(&mut s, "CITATION DETAILS", &format_facts(case));
    push_section(&mut s, "JURISDICTION INFORMATION", &jurisdictions::describe(rule));
    push_section(&mut s, "AVAILABLE EVIDENCE", &format_evidence(case));

    let relevant: Vec<&FollowUpAnswer> =
        answers.iter().filter(|a| a.applies_to(angle.key)).collect();
    if !relevant.is_empty() {
        push_section(&mut s, "ADDITIONAL INFORMATION FROM FOLLOW-UP", &format_answers(&relevant));
    }

    let points: String = angle
        .strength_indicators
        .iter()
        .map(|p| format!("- {p}\n"))
        .collect();
    push_section(&mut s, "KEY POINTS FOR THIS APPEAL ANGLE", &points);

    s.push_str(&LETTER_STRUCTURE.replace("{ANGLE}", angle.name));
    s.push_str(LETTER_GUIDELINES);
    s
}

/// Prompt for the single consolidated letter. `drafts` pairs each successful
/// per-angle document name with its text.
pub fn comprehensive_prompt(
    case: &CitationCase,
    rule: &JurisdictionRule,
    angles: &[&AppealAngle],
    answers: &[FollowUpAnswer],
    drafts: &[(&str, &str)],
) -> String {
    let mut s = String::new();
    s.push_str(COMPREHENSIVE_PREAMBLE);
    push_section(&mut s, "CITATION DETAILS", &format_facts(case));
    push_section(&mut s, "JURISDICTION", &jurisdictions::describe(rule));
    push_section(&mut s, "AVAILABLE EVIDENCE", &format_evidence(case));

    if !answers.is_empty() {
        let all: Vec<&FollowUpAnswer> = answers.iter().collect();
        push_section(&mut s, "ADDITIONAL INFORMATION FROM FOLLOW-UP", &format_answers(&all));
    }

    if angles.is_empty() {
        push_section(
            &mut s,
            "APPEAL ANGLES TO INCORPORATE",
            "No specific angle was identified. Argue from the citation details, the \
             evidence and the jurisdiction's general requirements.\n",
        );
    } else {
        let mut block = String::new();
        for angle in angles {
            block.push_str(&format!(
                "\n{}:\nDescription: {}\nKey points:\n",
                angle.name, angle.description
            ));
            for point in angle.strength_indicators.iter().take(COMPREHENSIVE_INDICATORS) {
                block.push_str(&format!("  - {point}\n"));
            }
        }
        push_section(&mut s, "APPEAL ANGLES TO INCORPORATE", &block);
    }

    if !drafts.is_empty() {
        let mut block = String::new();
        for (name, text) in drafts {
            block.push_str(&format!("\n[{name}]\n{}\n", excerpt(text, DRAFT_EXCERPT_CHARS)));
        }
        push_section(&mut s, "EXCERPTS FROM INDIVIDUAL DRAFTS", &block);
    }

    s.push_str(COMPREHENSIVE_INSTRUCTION);
    s
}

pub fn follow_up_prompt(case: &CitationCase, angle: &AppealAngle) -> String {
    let mut s = String::new();
    s.push_str(FOLLOW_UP_PREAMBLE);
    s.push_str(&format!("\n\nAPPEAL ANGLE: {}\n", angle.name));
    push_section(&mut s, "CURRENT INFORMATION", &format_facts(case));
    let standard: String = angle
        .render_questions(case)
        .iter()
        .map(|q| format!("- {q}\n"))
        .collect();
    push_section(&mut s, "STANDARD QUESTIONS FOR THIS ANGLE", &standard);
    s.push_str(FOLLOW_UP_INSTRUCTION);
    s
}

fn push_section(s: &mut String, title: &str, body: &str) {
    s.push_str("\n\n");
    s.push_str(title);
    s.push_str(":\n");
    s.push_str(body);
}

fn format_facts(case: &CitationCase) -> String {
    let facts = case.facts();
    let mut out: String = facts.iter().map(|(k, v)| format!("- {k}: {v}\n")).collect();
    let active = case.flags.active();
    if !active.is_empty() {
        let circumstances = active.join(", ").replace('_', " ");
        out.push_str(&format!("- Reported Circumstances: {circumstances}\n"));
    }
    if out.is_empty() {
        out.push_str("None provided\n");
    }
    out
}

fn format_evidence(case: &CitationCase) -> String {
    if case.evidence.is_empty() {
        return "None provided\n".into();
    }
    case.evidence
        .iter()
        .map(|e| match e.details.as_deref().filter(|d| !d.trim().is_empty()) {
            Some(d) => format!("- {}: {}\n", e.item, d),
            None => format!("- {}\n", e.item),
        })
        .collect()
}

fn format_answers(answers: &[&FollowUpAnswer]) -> String {
    answers
        .iter()
        .map(|a| format!("Q: {}\nA: {}\n", a.question, a.answer))
        .collect()
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

// ── Prompt constants ─────────────────────────────────────────────────────

const LETTER_PREAMBLE: &str = "You are an expert legal assistant specializing in parking citation appeals.
Your task is to write a compelling, professional, and legally sound appeal letter.";

const LETTER_STRUCTURE: &str = "

REQUIRED STRUCTURE:
1. Opening: Brief, professional greeting and statement of purpose
2. Citation Information: Reference the citation number, date, location
3. Main Argument: Present the {ANGLE} case clearly and persuasively
4. Supporting Evidence: Reference all available evidence that supports this angle
5. Legal/Regulatory Basis: Cite relevant regulations from the jurisdiction
6. Conclusion: Respectful request for dismissal or reduction
7. Closing: Professional sign-off";

const LETTER_GUIDELINES: &str = "

TONE REQUIREMENTS:
- Professional and respectful
- Factual and objective
- Confident but not aggressive
- Empathetic where appropriate
- Legally informed

IMPORTANT GUIDELINES:
- Do NOT fabricate facts or evidence not provided
- Cite specific regulations when applicable
- Keep the letter concise (300-500 words ideal)
- Use formal business letter format
- Be specific about dates, times, and locations
- Request specific relief (dismissal or reduction of fine)

Generate the appeal letter now:";

const ANALYSIS_PREAMBLE: &str = "You are a parking citation appeal expert. Analyze this situation and provide
a brief assessment of the likelihood of a successful appeal.";

const ANALYSIS_INSTRUCTION: &str = "

Provide a concise analysis including:
1. Overall appeal strength (Strong/Moderate/Weak)
2. Best appeal angles to pursue (top 2-3)
3. Key factors supporting the appeal
4. Potential weaknesses to address
5. Recommended next steps

Keep the analysis under 300 words.";

const COMPREHENSIVE_PREAMBLE: &str = "You are an expert legal assistant specializing in parking citation appeals.
Write a single, comprehensive appeal letter that strategically incorporates multiple strong arguments.";

const COMPREHENSIVE_INSTRUCTION: &str = "

Create a single, unified appeal letter that:
1. Opens professionally with citation reference
2. Presents the strongest arguments from the available angles
3. Weaves multiple points together coherently (don't list angles separately)
4. Cites relevant regulations and laws
5. References all supporting evidence naturally
6. Maintains a respectful, professional tone throughout
7. Concludes with a clear request for relief

Do NOT fabricate facts or evidence not provided. Draft excerpts, when present,
may be reused but the letter must read as a cohesive whole, not as separate
sections for each angle. Aim for 400-600 words. Use formal business letter format.";

const FOLLOW_UP_PREAMBLE: &str = "Based on this parking citation appeal case, suggest 3-5 specific questions
that would help gather additional information to strengthen the appeal.";

const FOLLOW_UP_INSTRUCTION: &str = "

Generate additional specific questions that:
1. Are directly relevant to this specific situation
2. Would uncover helpful evidence or details
3. Are clear and easy to answer
4. Haven't already been covered

Format: Return only the questions, one per line, numbered.";
