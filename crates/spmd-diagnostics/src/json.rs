// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! JSON diagnostic output for tools.
//!
//! Each diagnostic carries its code, category, 1-based locations, and the
//! source line it points at, so a consumer never has to re-read the source.

use serde::Serialize;
use spmd_ast::{LineMap, Span};

use crate::{codes::ErrorCodeRegistry, Diagnostic, LabelStyle};

/// All diagnostics from one compilation run.
#[derive(Debug, Serialize)]
pub struct DiagnosticReport {
    /// Schema version.
    pub version: u32,
    pub file: String,
    /// No errors were reported.
    pub success: bool,
    /// Stage that produced the diagnostics, e.g. `"lower"`.
    pub phase: String,
    pub diagnostics: Vec<JsonDiagnostic>,
    pub error_count: usize,
}

#[derive(Debug, Serialize)]
pub struct JsonDiagnostic {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub message: String,
    /// Where the primary label starts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    pub labels: Vec<JsonLabel>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<JsonSuggestion>,
}

#[derive(Debug, Serialize)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
    pub byte_offset: usize,
    pub source_line: String,
}

#[derive(Debug, Serialize)]
pub struct JsonLabel {
    /// `"primary"` or `"secondary"`.
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub start: LineCol,
    pub end: LineCol,
    pub source_line: String,
}

#[derive(Debug, Serialize)]
pub struct LineCol {
    pub line: usize,
    pub column: usize,
    pub byte_offset: usize,
}

#[derive(Debug, Serialize)]
pub struct JsonSuggestion {
    pub span: Span,
    pub replacement: String,
    /// The line with the replacement applied.
    pub result_line: String,
}

/// Build a report for one file.
pub fn to_json_report(
    diagnostics: &[Diagnostic],
    source: &str,
    file: &str,
    phase: &str,
) -> DiagnosticReport {
    let registry = ErrorCodeRegistry::default();
    let lines = LineMap::new(source);
    let error_count = diagnostics.len();

    DiagnosticReport {
        version: 1,
        file: file.to_string(),
        success: error_count == 0,
        phase: phase.to_string(),
        diagnostics: diagnostics
            .iter()
            .map(|d| to_json_diagnostic(d, source, &lines, &registry))
            .collect(),
        error_count,
    }
}

fn to_json_diagnostic(
    diag: &Diagnostic,
    source: &str,
    lines: &LineMap,
    registry: &ErrorCodeRegistry,
) -> JsonDiagnostic {
    let code = diag.code.as_ref().map(|c| c.0.clone());
    let category = code
        .as_deref()
        .and_then(|c| registry.get(c))
        .map(|info| info.category.to_string());
    let line_text = |line| lines.line(source, line).unwrap_or("").to_string();
    let line_col = |offset| {
        let (line, column) = lines.locate(offset);
        LineCol { line, column, byte_offset: offset }
    };

    let location = diag.primary_span().map(|span| {
        let (line, column) = lines.locate(span.start);
        SourceLocation { line, column, byte_offset: span.start, source_line: line_text(line) }
    });

    let labels = diag
        .labels
        .iter()
        .map(|l| {
            let start = line_col(l.span.start);
            JsonLabel {
                role: match l.style {
                    LabelStyle::Primary => "primary".to_string(),
                    LabelStyle::Secondary => "secondary".to_string(),
                },
                message: l.message.clone(),
                source_line: line_text(start.line),
                start,
                end: line_col(l.span.end),
            }
        })
        .collect();

    let suggestion = diag.help.as_ref().and_then(|h| h.suggestion.as_ref()).map(|s| {
        let (line, col) = lines.locate(s.span.start);
        let original = lines.line(source, line).unwrap_or("");
        let start = (col - 1).min(original.len());
        let end = (start + s.span.len()).min(original.len());
        JsonSuggestion {
            span: s.span,
            replacement: s.replacement.clone(),
            result_line: format!("{}{}{}", &original[..start], s.replacement, &original[end..]),
        }
    });

    JsonDiagnostic {
        code,
        category,
        message: diag.message.clone(),
        location,
        labels,
        notes: diag.notes.clone(),
        help: diag.help.as_ref().map(|h| h.message.clone()),
        suggestion,
    }
}

/// Pretty-printed JSON for a report.
pub fn to_json_string(report: &DiagnosticReport) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "fn f() {\n    total = x\n}\n";

    #[test]
    fn report_counts_and_locates() {
        let start = SOURCE.find("total").unwrap();
        let diags = vec![
            Diagnostic::error("cannot write uniform variable `total` under varying control flow")
                .with_code("E0104")
                .with_primary(Span::new(start, start + 5), "`total` is uniform")
                .with_help("declare `total` as varying")
                .with_suggestion(Span::new(start, start + 5), "vtotal"),
            Diagnostic::error("bad target config"),
        ];
        let report = to_json_report(&diags, SOURCE, "k.spmd", "lower");

        assert!(!report.success);
        assert_eq!(report.error_count, 2);

        let first = &report.diagnostics[0];
        assert_eq!(first.category.as_deref(), Some("Assignment"));
        let location = first.location.as_ref().unwrap();
        assert_eq!((location.line, location.column), (2, 5));
        assert_eq!(location.source_line, "    total = x");
        assert_eq!(first.labels[0].end.column, 10);
        assert_eq!(
            first.suggestion.as_ref().map(|s| s.result_line.as_str()),
            Some("    vtotal = x")
        );
        assert!(report.diagnostics[1].location.is_none());
    }

    #[test]
    fn empty_fields_are_omitted() {
        let report = to_json_report(&[Diagnostic::error("bad target config")], "", "k.spmd", "lower");
        let json: serde_json::Value = serde_json::from_str(&to_json_string(&report)).unwrap();
        let diag = &json["diagnostics"][0];
        assert_eq!(diag["message"], "bad target config");
        assert!(diag.get("code").is_none());
        assert!(diag.get("notes").is_none());
        assert_eq!(json["version"], 1);
    }
}
