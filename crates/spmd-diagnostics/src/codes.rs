// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Error code registry.
//!
//! Maps each stable code to a short title and a category.

use std::collections::HashMap;

pub struct ErrorCodeRegistry {
    codes: HashMap<&'static str, ErrorCodeInfo>,
}

pub struct ErrorCodeInfo {
    pub code: &'static str,
    pub title: &'static str,
    pub category: ErrorCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Assignment,
    Cast,
    ControlFlow,
    Visibility,
    Context,
    Lowering,
    Config,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Assignment => write!(f, "Assignment"),
            ErrorCategory::Cast => write!(f, "Cast"),
            ErrorCategory::ControlFlow => write!(f, "ControlFlow"),
            ErrorCategory::Visibility => write!(f, "Visibility"),
            ErrorCategory::Context => write!(f, "Context"),
            ErrorCategory::Lowering => write!(f, "Lowering"),
            ErrorCategory::Config => write!(f, "Config"),
        }
    }
}

macro_rules! register_codes {
    ($($code:literal => ($title:literal, $cat:expr)),* $(,)?) => {{
        let mut map = HashMap::new();
        $(
            map.insert($code, ErrorCodeInfo {
                code: $code,
                title: $title,
                category: $cat,
            });
        )*
        map
    }};
}

impl Default for ErrorCodeRegistry {
    fn default() -> Self {
        use ErrorCategory::*;

        Self {
            codes: register_codes! {
                // Assignment errors (E01xx)
                "E0100" => ("varying value assigned to uniform", Assignment),
                "E0101" => ("constrained lane count mismatch", Assignment),
                "E0102" => ("element type mismatch", Assignment),
                "E0103" => ("register capacity exceeded", Assignment),
                "E0104" => ("uniform write under varying control", Assignment),

                // Cast errors (E02xx)
                "E0200" => ("cast exceeds register limit", Cast),
                "E0201" => ("varying to uniform cast", Cast),
                "E0202" => ("cast changes lane count", Cast),
                "E0203" => ("unsupported cast", Cast),

                // Control-flow errors (E03xx)
                "E0300" => ("exit under varying condition", ControlFlow),
                "E0301" => ("exit after varying continue", ControlFlow),
                "E0302" => ("nested data-parallel loop", ControlFlow),
                "E0303" => ("data-parallel loop in SPMD function", ControlFlow),

                // Visibility errors (E04xx)
                "E0400" => ("public SPMD function", Visibility),

                // Context errors (E05xx)
                "E0500" => ("builtin outside lane context", Context),

                // Lowering errors (E06xx)
                "E0600" => ("unresolved variable", Lowering),
                "E0601" => ("unknown function", Lowering),
                "E0602" => ("wrong number of arguments", Lowering),
                "E0603" => ("lane count mismatch", Lowering),
                "E0604" => ("invalid construct", Lowering),

                // Target configuration (E07xx)
                "E0700" => ("invalid target configuration", Config),
            },
        }
    }
}

impl ErrorCodeRegistry {
    pub fn get(&self, code: &str) -> Option<&ErrorCodeInfo> {
        self.codes.get(code)
    }

    pub fn all(&self) -> impl Iterator<Item = &ErrorCodeInfo> {
        self.codes.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_prefix_matches_category() {
        let registry = ErrorCodeRegistry::default();
        for info in registry.all() {
            let expected = match &info.code[..3] {
                "E01" => ErrorCategory::Assignment,
                "E02" => ErrorCategory::Cast,
                "E03" => ErrorCategory::ControlFlow,
                "E04" => ErrorCategory::Visibility,
                "E05" => ErrorCategory::Context,
                "E06" => ErrorCategory::Lowering,
                "E07" => ErrorCategory::Config,
                other => panic!("unexpected code range {other}"),
            };
            assert_eq!(info.category, expected, "{}", info.code);
        }
    }

    #[test]
    fn unknown_code_is_absent() {
        assert!(ErrorCodeRegistry::default().get("E9999").is_none());
        assert_eq!(ErrorCodeRegistry::default().get("E0400").map(|i| i.title), Some("public SPMD function"));
    }
}
