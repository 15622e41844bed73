//! Prompt construction for the hosted analysis model.
//!
//! The prompt is bounded: the HTML excerpt is hard-capped with an explicit
//! truncation marker, and every optional input degrades to a placeholder
//! instead of failing.

use formpilot_form_perceiver::{ElementSnapshot, PageContext};

use crate::provider::AnalysisRequest;

/// Hard cap on the HTML excerpt embedded in the prompt.
pub const HTML_EXCERPT_CAP: usize = 8_000;
const TRUNCATION_MARKER: &str = "\n<!-- [truncated] -->";
const MAX_ELEMENT_LINES: usize = 60;

/// System instruction: role, the required JSON shape, field-by-field
/// semantics, and worked positive/negative examples.
pub const ANALYSIS_SYSTEM_PROMPT: &str = r#"You are a form analysis engine. You receive the interactive-element inventory of a web page and must identify which elements are legitimate form fields, which are checkboxes, which element submits the form, and which elements are honeypot traps planted to catch automated fillers.

## Response Format

Respond with ONE JSON object and nothing else. No prose, no code fences.

{
  "analysis": "one-sentence description of the page",
  "pageType": "signup|login|contact|checkout|survey|unknown",
  "confidence": 0.0,
  "fields": [
    {
      "purpose": "email|password|confirmPassword|firstName|lastName|fullName|username|phone|company|country|other",
      "selector": "CSS selector resolving to exactly one element",
      "elementType": "input|textarea|select",
      "required": true,
      "importance": "critical|important|optional"
    }
  ],
  "checkboxes": [
    { "selector": "...", "labelText": "visible label text", "required": false }
  ],
  "honeypots": [
    { "selector": "...", "reasons": ["why this is a trap"], "confidence": 0.9 }
  ],
  "submitButton": { "selector": "...", "text": "visible button text" }
}

### Field semantics
- "purpose" drives what value gets filled. Use "other" when unsure.
- "importance": "critical" = the form cannot submit without it (email,
  password), "important" = expected but recoverable, "optional" = may be
  skipped entirely.
- "confidence" is your overall certainty in THIS analysis, 0.0-1.0.
- Every array must be present even when empty.

### Honeypot judgment
An element is a honeypot when it is hidden (display:none,
visibility:hidden, opacity 0, zero size), positioned far off screen,
aria-hidden, tabindex=-1, or carries a bait name. NEVER list a honeypot
in "fields" or "checkboxes".

### Worked example (positive)
Input includes: <input name="email" type="email"> with label "Email".
Correct: {"purpose": "email", "selector": "input[name=\"email\"]",
"elementType": "input", "required": true, "importance": "critical"}

### Worked example (negative)
Input includes: <input name="website" style="position:absolute;left:-9999px">.
Correct: list under "honeypots" with reason "off-screen positioning and
decoy name" - NOT under "fields", even though the name looks fillable.
"#;

/// Build the bounded user prompt from whatever page data is available.
pub fn build_user_prompt(context: &PageContext, elements: &[ElementSnapshot]) -> String {
    let mut prompt = String::new();

    prompt.push_str("## Page\n");
    prompt.push_str(&format!(
        "URL: {}\nTitle: {}\n",
        placeholder_if_empty(&context.url, "(unknown url)"),
        placeholder_if_empty(&context.title, "(untitled)"),
    ));
    prompt.push_str(&format!(
        "Signals: signup={} login={} forms={} frames={} challengeWidget={}\n",
        context.looks_like_signup,
        context.looks_like_login,
        context.form_count,
        context.frame_count,
        context.has_challenge_widget,
    ));

    prompt.push_str(&format!("\n## Interactive Elements ({} total)\n", elements.len()));
    if elements.is_empty() {
        prompt.push_str("(no interactive elements captured)\n");
    }
    for (index, element) in elements.iter().take(MAX_ELEMENT_LINES).enumerate() {
        prompt.push_str(&element_line(index, element));
    }
    if elements.len() > MAX_ELEMENT_LINES {
        prompt.push_str(&format!(
            "... {} more elements omitted\n",
            elements.len() - MAX_ELEMENT_LINES
        ));
    }

    prompt.push_str("\n## Form HTML\n");
    prompt.push_str(&bounded_excerpt(&context.html_excerpt));
    prompt.push_str("\n\nRespond with the JSON object now.");
    prompt
}

/// Assemble the full request with the client's generation settings.
pub fn build_analysis_request(
    context: &PageContext,
    elements: &[ElementSnapshot],
) -> AnalysisRequest {
    AnalysisRequest {
        system_instruction: ANALYSIS_SYSTEM_PROMPT.to_string(),
        user_prompt: build_user_prompt(context, elements),
        max_output_tokens: 4096,
        temperature: 0.1,
    }
}

fn element_line(index: usize, element: &ElementSnapshot) -> String {
    let mut line = format!("[{}] <{}", index, element.tag);
    if let Some(input_type) = &element.input_type {
        line.push_str(&format!(" type={input_type}"));
    }
    if let Some(name) = &element.name {
        line.push_str(&format!(" name=\"{name}\""));
    }
    if let Some(id) = &element.id {
        line.push_str(&format!(" id=\"{id}\""));
    }
    if let Some(placeholder) = &element.placeholder {
        line.push_str(&format!(" placeholder=\"{}\"", truncate(placeholder, 40)));
    }
    if element.required {
        line.push_str(" required");
    }
    line.push('>');
    let labels = element.label_text();
    if !labels.is_empty() {
        line.push_str(&format!(" label=\"{}\"", truncate(&labels, 60)));
    }
    line.push_str(&format!(" selector={}", element.selector));
    line.push('\n');
    line
}

fn bounded_excerpt(excerpt: &str) -> String {
    if excerpt.is_empty() {
        return "(no form HTML captured)".to_string();
    }
    if excerpt.chars().count() <= HTML_EXCERPT_CAP {
        return excerpt.to_string();
    }
    let mut bounded: String = excerpt.chars().take(HTML_EXCERPT_CAP).collect();
    bounded.push_str(TRUNCATION_MARKER);
    bounded
}

fn placeholder_if_empty<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.trim().is_empty() {
        placeholder
    } else {
        value
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(selector: &str) -> ElementSnapshot {
        ElementSnapshot {
            tag: "input".into(),
            input_type: Some("email".into()),
            name: Some("email".into()),
            required: true,
            nearby_labels: vec!["Email address".into()],
            selector: selector.into(),
            ..Default::default()
        }
    }

    #[test]
    fn prompt_contains_signals_elements_and_html() {
        let context = PageContext {
            url: "https://example.test/signup".into(),
            title: "Join".into(),
            looks_like_signup: true,
            form_count: 1,
            html_excerpt: "<form><input name=\"email\"></form>".into(),
            ..Default::default()
        };
        let prompt = build_user_prompt(&context, &[element("#email")]);
        assert!(prompt.contains("signup=true"));
        assert!(prompt.contains("[0] <input type=email name=\"email\""));
        assert!(prompt.contains("<form>"));
    }

    #[test]
    fn empty_inputs_degrade_to_placeholders() {
        let prompt = build_user_prompt(&PageContext::default(), &[]);
        assert!(prompt.contains("(unknown url)"));
        assert!(prompt.contains("(no interactive elements captured)"));
        assert!(prompt.contains("(no form HTML captured)"));
    }

    #[test]
    fn oversized_excerpt_is_capped_with_marker() {
        let context = PageContext {
            html_excerpt: "x".repeat(HTML_EXCERPT_CAP + 500),
            ..Default::default()
        };
        let prompt = build_user_prompt(&context, &[]);
        assert!(prompt.contains("[truncated]"));
        let excerpt_section = prompt.split("## Form HTML\n").nth(1).unwrap();
        assert!(excerpt_section.len() < HTML_EXCERPT_CAP + 200);
    }

    #[test]
    fn system_prompt_spells_out_the_contract() {
        assert!(ANALYSIS_SYSTEM_PROMPT.contains("\"pageType\""));
        assert!(ANALYSIS_SYSTEM_PROMPT.contains("\"honeypots\""));
        assert!(ANALYSIS_SYSTEM_PROMPT.contains("NEVER list a honeypot"));
    }
}
