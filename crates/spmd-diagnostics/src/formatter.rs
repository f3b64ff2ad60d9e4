// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Terminal rendering of diagnostics.
//!
//! ```text
//! error[E0300]: `break` under a varying condition
//!   --> kernel.spmd:4:13
//!    |
//!  4 |             break
//!    |             ^^^^^ some lanes would leave the loop early
//!    |
//!    = help: move the exit out of the varying branch, ...
//!    |
//!  4 |             continue
//!    |             ~~~~~~~~
//! ```

use std::collections::BTreeMap;

use colored::Colorize;
use spmd_ast::LineMap;

use crate::{Diagnostic, Help, LabelStyle};

pub struct DiagnosticFormatter<'a> {
    source: &'a str,
    file_name: Option<&'a str>,
    line_map: LineMap,
}

struct AnnotatedLine {
    line_num: usize,
    text: String,
    annotations: Vec<Annotation>,
}

struct Annotation {
    col_start: usize,
    col_end: usize,
    style: LabelStyle,
    message: Option<String>,
}

impl<'a> DiagnosticFormatter<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source, file_name: None, line_map: LineMap::new(source) }
    }

    pub fn with_file_name(mut self, name: &'a str) -> Self {
        self.file_name = Some(name);
        self
    }

    /// Render every diagnostic, separated by blank lines.
    pub fn format_all(&self, diagnostics: &[Diagnostic]) -> String {
        diagnostics.iter().map(|d| self.format(d)).collect::<Vec<_>>().join("\n")
    }

    pub fn format(&self, diagnostic: &Diagnostic) -> String {
        let mut out = String::new();
        self.format_header(&mut out, diagnostic);

        let annotated = self.collect_annotated_lines(diagnostic);
        let (Some(first), Some(span)) = (annotated.first(), diagnostic.primary_span()) else {
            self.format_footer(&mut out, diagnostic);
            return out;
        };

        let file = self.file_name.unwrap_or("<source>");
        let (line, col) = self.line_map.locate(span.start);
        out.push_str(&format!("  {} {}:{}:{}\n", "-->".blue(), file, line, col));

        let max_line = annotated.last().map(|a| a.line_num).unwrap_or(first.line_num);
        let gutter_width = max_line.to_string().len().max(2);

        let mut prev_line_num: Option<usize> = None;
        for annotated_line in &annotated {
            match prev_line_num {
                None => {
                    out.push_str(&format!("{} {}\n", " ".repeat(gutter_width + 1), "|".blue()));
                }
                Some(prev) if annotated_line.line_num > prev + 1 => {
                    out.push_str(&format!("{} {}\n", " ".repeat(gutter_width), "...".blue()));
                }
                Some(_) => {}
            }

            out.push_str(&format!(
                "{:>width$} {} {}\n",
                annotated_line.line_num.to_string().blue().bold(),
                "|".blue(),
                annotated_line.text,
                width = gutter_width + 1,
            ));
            self.format_annotations(&mut out, annotated_line, gutter_width);

            prev_line_num = Some(annotated_line.line_num);
        }

        self.format_footer(&mut out, diagnostic);
        out
    }

    fn format_header(&self, out: &mut String, diagnostic: &Diagnostic) {
        let heading = "error".red().bold();

        match diagnostic.code {
            Some(ref code) => out.push_str(&format!(
                "{}[{}]: {}\n",
                heading,
                code.0.as_str().red().bold(),
                diagnostic.message.bold()
            )),
            None => out.push_str(&format!("{}: {}\n", heading, diagnostic.message.bold())),
        }
    }

    fn format_footer(&self, out: &mut String, diagnostic: &Diagnostic) {
        let gutter_width = 2;

        for note in &diagnostic.notes {
            out.push_str(&format!(
                "{} {} {}: {}\n",
                " ".repeat(gutter_width + 1),
                "=".cyan(),
                "note".cyan().bold(),
                note
            ));
        }

        if let Some(ref help) = diagnostic.help {
            self.format_help(out, help, gutter_width);
        }
    }

    fn format_help(&self, out: &mut String, help: &Help, gutter_width: usize) {
        out.push_str(&format!(
            "{} {} {}: {}\n",
            " ".repeat(gutter_width + 1),
            "=".cyan(),
            "help".cyan().bold(),
            help.message
        ));

        let Some(ref suggestion) = help.suggestion else {
            return;
        };
        let (line, col) = self.line_map.locate(suggestion.span.start);
        let Some(source_line) = self.line_map.line(self.source, line) else {
            return;
        };
        let start = (col - 1).min(source_line.len());
        let end = (start + suggestion.span.len()).min(source_line.len());

        out.push_str(&format!("{} {}\n", " ".repeat(gutter_width + 1), "|".blue()));
        out.push_str(&format!(
            "{:>width$} {} {}{}{}\n",
            line.to_string().blue().bold(),
            "|".blue(),
            &source_line[..start],
            suggestion.replacement.green(),
            &source_line[end..],
            width = gutter_width,
        ));
        out.push_str(&format!(
            "{} {} {}{}\n",
            " ".repeat(gutter_width + 1),
            "|".blue(),
            " ".repeat(start),
            "~".repeat(suggestion.replacement.len()).green(),
        ));
    }

    fn collect_annotated_lines(&self, diagnostic: &Diagnostic) -> Vec<AnnotatedLine> {
        let mut lines: BTreeMap<usize, AnnotatedLine> = BTreeMap::new();

        for label in &diagnostic.labels {
            let (line_num, col_start) = self.line_map.locate(label.span.start);
            let (end_line, col_end) = self.line_map.locate(label.span.end);
            let text = self.line_map.line(self.source, line_num).unwrap_or("");

            // Multi-line spans underline the rest of their first line.
            let col_end = if end_line == line_num { col_end } else { text.len() + 1 };

            let entry = lines.entry(line_num).or_insert_with(|| AnnotatedLine {
                line_num,
                text: text.to_string(),
                annotations: Vec::new(),
            });
            entry.annotations.push(Annotation {
                col_start,
                col_end: col_end.max(col_start + 1),
                style: label.style,
                message: label.message.clone(),
            });
        }

        lines.into_values().collect()
    }

    /// One underline row per label, primary labels first.
    fn format_annotations(&self, out: &mut String, line: &AnnotatedLine, gutter_width: usize) {
        let mut sorted: Vec<&Annotation> = line.annotations.iter().collect();
        sorted.sort_by_key(|a| (a.style != LabelStyle::Primary, a.col_start));

        let pad = " ".repeat(gutter_width + 1);
        for ann in sorted {
            let (mark, message) = match ann.style {
                LabelStyle::Primary => ('^', ann.message.as_deref().unwrap_or("").red().bold()),
                LabelStyle::Secondary => ('-', ann.message.as_deref().unwrap_or("").blue()),
            };
            let marks = mark.to_string().repeat(ann.col_end - ann.col_start);
            let marks = match ann.style {
                LabelStyle::Primary => marks.red().bold(),
                LabelStyle::Secondary => marks.blue(),
            };
            let row = format!("{}{} {}", " ".repeat(ann.col_start - 1), marks, message);
            out.push_str(&format!("{} {} {}\n", pad, "|".blue(), row.trim_end()));
        }
    }
}
