//! Parsing of raw verdict output with partial recovery
//!
//! Model output is sometimes cut off mid-array or has one malformed entry.
//! Rather than discarding the whole batch, the verdict objects that are
//! complete and well-formed before the point of failure are salvaged. Nothing
//! after the first bad object is trusted.

use crate::model::extracted::{ExtractedVerdict, ExtractedVerdicts};
use crate::service::capabilities::GenerationOutcome;

/// Parse raw generation output into a tagged outcome
///
/// - `Parsed`: the whole document deserialized
/// - `Partial`: JSON-shaped output that failed to parse; well-formed verdict
///   objects before the failure are salvaged (possibly none)
/// - `Unparseable`: empty or not JSON at all
pub fn parse_verdicts(raw: &str) -> GenerationOutcome {
    let text = strip_code_fence(raw.trim());
    if text.is_empty() {
        return GenerationOutcome::Unparseable("empty output".to_string());
    }

    let error = match serde_json::from_str::<ExtractedVerdicts>(text) {
        Ok(parsed) => return GenerationOutcome::Parsed(parsed.verdicts),
        Err(e) => e,
    };
    if let Ok(list) = serde_json::from_str::<Vec<ExtractedVerdict>>(text) {
        return GenerationOutcome::Parsed(list);
    }

    let Some(array_start) = verdict_array_start(text) else {
        return GenerationOutcome::Unparseable(format!("no verdict array found: {}", error));
    };

    let salvaged = salvage_objects(&text[array_start..]);
    tracing::debug!(
        salvaged = salvaged.len(),
        error = %error,
        "Recovered verdicts from malformed output"
    );

    GenerationOutcome::Partial {
        salvaged,
        error: error.to_string(),
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the language tag line
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Byte offset of the '[' opening the verdict array
fn verdict_array_start(text: &str) -> Option<usize> {
    if let Some(key) = text.find("\"verdicts\"") {
        let after_key = key + "\"verdicts\"".len();
        return text[after_key..].find('[').map(|offset| after_key + offset);
    }
    text.starts_with('[').then_some(0)
}

/// Deserialize top-level objects inside the array at `text[0]`, stopping at
/// the first one that does not deserialize
fn salvage_objects(text: &str) -> Vec<ExtractedVerdict> {
    let mut salvaged = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut object_start = None;

    // Skip the opening '['
    for (i, ch) in text.char_indices().skip(1) {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => {
                if depth == 0 {
                    object_start = Some(i);
                }
                depth += 1;
            }
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0
                    && let Some(start) = object_start.take()
                {
                    match serde_json::from_str::<ExtractedVerdict>(&text[start..=i]) {
                        Ok(verdict) => salvaged.push(verdict),
                        Err(e) => {
                            tracing::debug!(
                                error = %e,
                                salvaged = salvaged.len(),
                                "Malformed verdict object, discarding the rest of the output"
                            );
                            break;
                        }
                    }
                }
            }
            ']' if depth == 0 => break,
            _ => {}
        }
    }

    salvaged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict_json(claim_id: &str, truth: u8) -> String {
        format!(
            r#"{{"claim_id": "{}", "truth_percentage": {}, "confidence": 70, "reasoning": "Evidence {{E1}} says \"yes\"", "supporting_evidence_ids": ["E1"], "contradicting_evidence_ids": []}}"#,
            claim_id, truth
        )
    }

    #[test]
    fn test_complete_output_parses() {
        let raw = format!(
            r#"{{"verdicts": [{}, {}]}}"#,
            verdict_json("C1", 80),
            verdict_json("C2", 20)
        );
        match parse_verdicts(&raw) {
            GenerationOutcome::Parsed(v) => {
                assert_eq!(v.len(), 2);
                assert_eq!(v[1].claim_id, "C2");
            }
            other => panic!("expected parsed, got {:?}", other),
        }
    }

    #[test]
    fn test_bare_array_and_code_fence() {
        let raw = format!("```json\n[{}]\n```", verdict_json("C1", 80));
        assert!(matches!(parse_verdicts(&raw), GenerationOutcome::Parsed(v) if v.len() == 1));
    }

    #[test]
    fn test_truncated_output_salvages_complete_objects() {
        let full = format!(
            r#"{{"verdicts": [{}, {}, {}]}}"#,
            verdict_json("C1", 80),
            verdict_json("C2", 20),
            verdict_json("C3", 55)
        );
        // Cut inside the third object
        let cut = full.rfind("\"reasoning\"").unwrap();
        let truncated = &full[..cut];

        match parse_verdicts(truncated) {
            GenerationOutcome::Partial { salvaged, .. } => {
                let ids: Vec<&str> = salvaged.iter().map(|v| v.claim_id.as_str()).collect();
                assert_eq!(ids, vec!["C1", "C2"]);
            }
            other => panic!("expected partial, got {:?}", other),
        }
    }

    #[test]
    fn test_salvage_stops_at_malformed_entry() {
        let raw = format!(
            r#"{{"verdicts": [{}, {{"claim_id": "C2", "truth_percentage": "high"}}, {}]}}"#,
            verdict_json("C1", 80),
            verdict_json("C3", 30)
        );
        match parse_verdicts(&raw) {
            GenerationOutcome::Partial { salvaged, error } => {
                let ids: Vec<&str> = salvaged.iter().map(|v| v.claim_id.as_str()).collect();
                assert_eq!(ids, vec!["C1"]);
                assert!(!error.is_empty());
            }
            other => panic!("expected partial, got {:?}", other),
        }
    }

    #[test]
    fn test_prose_is_unparseable() {
        assert!(matches!(
            parse_verdicts("I cannot evaluate these claims."),
            GenerationOutcome::Unparseable(_)
        ));
        assert!(matches!(parse_verdicts("   "), GenerationOutcome::Unparseable(_)));
    }
}
