// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Target parameters the lowering is specialized for.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use spmd_ast::BaseType;

/// Register and vector geometry of the code generator's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetConfig {
    /// Widest value, in bits, a single varying register may hold.
    pub register_limit_bits: u32,
    /// Native vector width in bits; sets lane counts per element type.
    pub vector_bits: u32,
    /// Lane count for functions whose width no data type determines.
    pub default_lanes: u32,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self { register_limit_bits: 512, vector_bits: 128, default_lanes: 4 }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read target config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed target config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("`{field}` must be a non-zero power of two, got {value}")]
    InvalidWidth { field: &'static str, value: u32 },
    #[error("vector width {vector_bits} exceeds the {limit}-bit register limit")]
    VectorExceedsLimit { vector_bits: u32, limit: u32 },
}

impl TargetConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: TargetConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        let config = Self::from_json_str(&text)?;
        log::debug!("loaded target config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("register_limit_bits", self.register_limit_bits),
            ("vector_bits", self.vector_bits),
            ("default_lanes", self.default_lanes),
        ] {
            if !value.is_power_of_two() {
                return Err(ConfigError::InvalidWidth { field, value });
            }
        }
        if self.vector_bits > self.register_limit_bits {
            return Err(ConfigError::VectorExceedsLimit {
                vector_bits: self.vector_bits,
                limit: self.register_limit_bits,
            });
        }
        Ok(())
    }

    /// Lanes that fit in one vector for elements of `bits` width.
    pub fn lanes_for_bits(&self, bits: u32) -> u32 {
        (self.vector_bits / bits.max(1)).max(1)
    }

    /// Lanes for a varying base type; `bool` and bool arrays fall back to
    /// `default_lanes`.
    pub fn lanes_for(&self, base: &BaseType) -> u32 {
        match base.lane_bits() {
            Some(bits) => self.lanes_for_bits(bits),
            None => self.default_lanes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spmd_ast::ScalarType;
    use std::io::Write;

    #[test]
    fn defaults() {
        let c = TargetConfig::default();
        assert_eq!(c.register_limit_bits, 512);
        assert_eq!(c.vector_bits, 128);
        assert_eq!(c.default_lanes, 4);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn lanes_per_element() {
        let c = TargetConfig::default();
        assert_eq!(c.lanes_for(&BaseType::Scalar(ScalarType::U8)), 16);
        assert_eq!(c.lanes_for(&BaseType::Scalar(ScalarType::F32)), 4);
        assert_eq!(c.lanes_for(&BaseType::Scalar(ScalarType::I64)), 2);
        assert_eq!(c.lanes_for(&BaseType::Scalar(ScalarType::Bool)), 4);
        let narrow = TargetConfig { vector_bits: 32, ..c };
        assert_eq!(narrow.lanes_for(&BaseType::Scalar(ScalarType::F64)), 1);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c = TargetConfig::from_json_str(r#"{ "register_limit_bits": 128 }"#).unwrap();
        assert_eq!(c.register_limit_bits, 128);
        assert_eq!(c.vector_bits, 128);
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = TargetConfig::from_json_str(r#"{ "lanes": 8 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_bad_widths() {
        let err = TargetConfig::from_json_str(r#"{ "vector_bits": 96 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWidth { field: "vector_bits", value: 96 }));
        let err = TargetConfig::from_json_str(r#"{ "vector_bits": 1024 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::VectorExceedsLimit { .. }));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "vector_bits": 256, "default_lanes": 8 }}"#).unwrap();
        let c = TargetConfig::load(file.path()).unwrap();
        assert_eq!(c.vector_bits, 256);
        assert_eq!(c.default_lanes, 8);
        assert_eq!(c.register_limit_bits, 512);
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = TargetConfig::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
