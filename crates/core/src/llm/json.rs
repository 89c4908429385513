use crate::domain::analysis::AnalysisResult;
use crate::domain::contract::ModelAnalysis;
use crate::error::AnalysisError;
use anyhow::Context;

/// Removes Markdown code fences (```json ... ``` or ``` ... ```) anywhere in the text.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Returns the first `{...}` span whose braces balance, ignoring braces inside strings.
pub fn first_balanced_object(text: &str) -> Option<&str> {
    text.char_indices()
        .filter(|&(_, c)| c == '{')
        .find_map(|(start, _)| balanced_end(&text[start..]).map(|end| &text[start..start + end]))
}

fn balanced_end(s: &str) -> Option<usize> {
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx + c.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_candidate(candidate: &str) -> anyhow::Result<AnalysisResult> {
    serde_json::from_str::<ModelAnalysis>(candidate)
        .context("model output is not valid analysis JSON")?
        .validate_and_into_result()
}

/// Recovers an [`AnalysisResult`] from free-form model output.
///
/// Fences are stripped and the remainder parsed directly; if that fails, the first balanced
/// brace span is parsed once more before giving up with [`AnalysisError::Parse`].
pub fn parse_analysis(text: &str) -> Result<AnalysisResult, AnalysisError> {
    let cleaned = strip_code_fences(text);
    let first_err = match parse_candidate(&cleaned) {
        Ok(result) => return Ok(result),
        Err(err) => err,
    };

    let err = match first_balanced_object(&cleaned) {
        Some(span) if span != cleaned => {
            tracing::debug!(span_chars = span.len(), "extracted JSON object from model output");
            match parse_candidate(span) {
                Ok(result) => return Ok(result),
                Err(err) => err,
            }
        }
        _ => first_err,
    };

    Err(AnalysisError::Parse {
        detail: format!("{err:#}"),
        raw_output: Some(text.to_string()),
    })
}
