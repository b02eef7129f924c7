//! Synthesis configuration: TOML file, environment overrides, validation

use crate::errors::{Result, SynthError};
use crate::expression::{
    MagnitudeTieBreak, RenderOptions, DEFAULT_ROUNDING_TOLERANCE, DEFAULT_SOLUTION_PRECISION,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

/// Objective used when several trees fit exactly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Regularization {
    /// Minimize the sum of absolute coefficient values
    #[default]
    L1,
    /// Accept any feasible tree
    None,
}

impl FromStr for Regularization {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l1" => Ok(Regularization::L1),
            "none" => Ok(Regularization::None),
            other => Err(SynthError::InvalidConfig(format!(
                "unknown regularization `{other}` (expected `l1` or `none`)"
            ))),
        }
    }
}

impl fmt::Display for Regularization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regularization::L1 => f.write_str("l1"),
            Regularization::None => f.write_str("none"),
        }
    }
}

/// Synthesizer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    pub regularization: Regularization,
    /// Deepest tree attempted before giving up
    pub max_depth: usize,
    /// Rounding applied to rendered coefficients and split sums
    pub rounding_tolerance: f64,
    /// Relative grid solved coefficients are snapped to in raw units; also
    /// the rounding applied to split sums during prediction
    pub solution_precision: f64,
    pub magnitude_tie_break: MagnitudeTieBreak,
    /// Spaces per indentation level in emitted source
    pub indent_width: usize,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            regularization: Regularization::L1,
            max_depth: 6,
            rounding_tolerance: DEFAULT_ROUNDING_TOLERANCE,
            solution_precision: DEFAULT_SOLUTION_PRECISION,
            magnitude_tie_break: MagnitudeTieBreak::Largest,
            indent_width: 2,
        }
    }
}

impl SynthConfig {
    /// Load configuration from a TOML file. Missing fields keep their
    /// defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)?;
        let config: SynthConfig = toml::from_str(&content)
            .map_err(|e| SynthError::ConfigParse(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| SynthError::ConfigParse(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Apply `EXACTREE_*` environment variables.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup. Unparseable values are
    /// logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("EXACTREE_REGULARIZATION") {
            match val.parse() {
                Ok(parsed) => self.regularization = parsed,
                Err(e) => warn!("Ignoring EXACTREE_REGULARIZATION: {}", e),
            }
        }
        if let Some(val) = lookup("EXACTREE_MAX_DEPTH") {
            match val.trim().parse() {
                Ok(parsed) => self.max_depth = parsed,
                Err(e) => warn!("Ignoring EXACTREE_MAX_DEPTH={}: {}", val, e),
            }
        }
        if let Some(val) = lookup("EXACTREE_ROUNDING_TOLERANCE") {
            match val.trim().parse() {
                Ok(parsed) => self.rounding_tolerance = parsed,
                Err(e) => warn!("Ignoring EXACTREE_ROUNDING_TOLERANCE={}: {}", val, e),
            }
        }
        if let Some(val) = lookup("EXACTREE_SOLUTION_PRECISION") {
            match val.trim().parse() {
                Ok(parsed) => self.solution_precision = parsed,
                Err(e) => warn!("Ignoring EXACTREE_SOLUTION_PRECISION={}: {}", val, e),
            }
        }
    }

    /// Reject settings the synthesizer cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(SynthError::InvalidConfig(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if !self.rounding_tolerance.is_finite() || self.rounding_tolerance < 0.0 {
            return Err(SynthError::InvalidConfig(format!(
                "rounding_tolerance must be a non-negative number, got {}",
                self.rounding_tolerance
            )));
        }
        if !self.solution_precision.is_finite() || self.solution_precision < 0.0 {
            return Err(SynthError::InvalidConfig(format!(
                "solution_precision must be a non-negative number, got {}",
                self.solution_precision
            )));
        }
        Ok(())
    }

    /// Settings that are legal but likely to produce surprising output.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.max_depth > 10 {
            warnings.push(format!(
                "max_depth {} yields {} leaves; solving may be very slow",
                self.max_depth,
                1u64 << (self.max_depth - 1).min(63)
            ));
        }
        if self.rounding_tolerance == 0.0 {
            warnings.push("Rounding tolerance is 0, solver noise will be emitted verbatim".to_string());
        }
        if self.rounding_tolerance > 1e-6 {
            warnings.push("Rounding tolerance above 1e-6 may merge distinct coefficients".to_string());
        }
        if self.solution_precision > 1e-3 {
            warnings.push("Solution precision above 1e-3 may break exactness".to_string());
        }
        if self.indent_width == 0 {
            warnings.push("Indent width is 0, emitted source will not parse".to_string());
        }

        if !warnings.is_empty() {
            warn!("Configuration validation warnings: {:?}", warnings);
        }
        warnings
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            tolerance: self.rounding_tolerance,
            precision: self.solution_precision,
            tie_break: self.magnitude_tie_break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = SynthConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.warnings().is_empty());
        assert_eq!(config.max_depth, 6);
        assert_eq!(config.regularization, Regularization::L1);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("exactree.toml");

        let config = SynthConfig {
            regularization: Regularization::None,
            max_depth: 3,
            magnitude_tie_break: MagnitudeTieBreak::Smallest,
            ..SynthConfig::default()
        };
        config.save_to_file(&config_path).unwrap();

        let loaded = SynthConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("partial.toml");
        std::fs::write(&config_path, "max_depth = 4\nregularization = \"none\"\n").unwrap();

        let loaded = SynthConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.max_depth, 4);
        assert_eq!(loaded.regularization, Regularization::None);
        assert_eq!(loaded.indent_width, 2);
    }

    #[test]
    fn test_malformed_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("bad.toml");
        std::fs::write(&config_path, "max_depth = \"deep\"").unwrap();

        let err = SynthConfig::load_from_file(&config_path).unwrap_err();
        assert!(matches!(err, SynthError::ConfigParse(_)));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("EXACTREE_REGULARIZATION", "none"),
            ("EXACTREE_MAX_DEPTH", "9"),
            ("EXACTREE_SOLUTION_PRECISION", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = SynthConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.regularization, Regularization::None);
        assert_eq!(config.max_depth, 9);
        assert_eq!(config.solution_precision, 1e-9);
    }

    #[test]
    fn test_validation_errors() {
        let config = SynthConfig {
            max_depth: 0,
            ..SynthConfig::default()
        };
        assert!(matches!(config.validate(), Err(SynthError::InvalidConfig(_))));

        let config = SynthConfig {
            rounding_tolerance: -1.0,
            ..SynthConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SynthConfig {
            solution_precision: f64::NAN,
            ..SynthConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_warnings() {
        let config = SynthConfig {
            max_depth: 12,
            indent_width: 0,
            ..SynthConfig::default()
        };
        assert_eq!(config.warnings().len(), 2);
    }

    #[test]
    fn test_regularization_parsing() {
        assert_eq!("L1".parse::<Regularization>().unwrap(), Regularization::L1);
        assert_eq!(" none ".parse::<Regularization>().unwrap(), Regularization::None);
        assert!("l2".parse::<Regularization>().is_err());
        assert_eq!(Regularization::None.to_string(), "none");
    }
}
