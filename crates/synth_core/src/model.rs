//! Synthesized model: schemas plus the solved tree
//!
//! Supports prediction on raw records, source emission, and persistence as
//! canonical JSON with a BLAKE3 fingerprint.

use crate::canon::{fingerprint_hex, to_canonical_json, write_canonical_pretty};
use crate::codegen::emit_function;
use crate::config::Regularization;
use crate::errors::{Result, SynthError};
use crate::expression::RenderOptions;
use crate::record::Record;
use crate::tree::Node;
use crate::vectorizer::Vectorizer;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Format version written into saved models
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// An exact-fit tree together with the schemas needed to apply it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizedModel {
    format_version: u32,
    input: Vectorizer,
    output: Vectorizer,
    root: Node,
    depth: usize,
    regularization: Regularization,
    render: RenderOptions,
    indent_width: usize,
}

impl SynthesizedModel {
    pub(crate) fn new(
        input: Vectorizer,
        output: Vectorizer,
        root: Node,
        regularization: Regularization,
        render: RenderOptions,
        indent_width: usize,
    ) -> Self {
        let depth = root.depth();
        Self {
            format_version: MODEL_FORMAT_VERSION,
            input,
            output,
            root,
            depth,
            regularization,
            render,
            indent_width,
        }
    }

    pub fn input_schema(&self) -> &Vectorizer {
        &self.input
    }

    pub fn output_schema(&self) -> &Vectorizer {
        &self.output
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Depth the tree was solved at
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn regularization(&self) -> Regularization {
        self.regularization
    }

    pub fn render_options(&self) -> &RenderOptions {
        &self.render
    }

    /// Apply the tree to a raw record. Split sums are rounded to the
    /// solution precision, so solver noise around a boundary routes to
    /// `greater`.
    pub fn predict(&self, record: &Record) -> Record {
        let x = self.input.to_vector(record);
        let y = self.root.evaluate(&x, self.render.precision);
        self.output.from_vector(&y)
    }

    pub fn predict_many(&self, records: &[Record]) -> Vec<Record> {
        records.iter().map(|r| self.predict(r)).collect()
    }

    /// Render the tree as a function named `function_name`.
    pub fn emit_source(&self, function_name: &str) -> String {
        emit_function(
            function_name,
            &self.root,
            &self.input,
            &self.output,
            &self.render,
            self.indent_width,
        )
    }

    pub fn to_canonical_json(&self) -> Result<String> {
        to_canonical_json(self)
    }

    /// BLAKE3 hex digest of the compact canonical JSON
    pub fn fingerprint(&self) -> Result<String> {
        fingerprint_hex(self)
    }

    /// Check that the tree matches the schemas it was saved with.
    pub fn validate(&self) -> Result<()> {
        if self.format_version != MODEL_FORMAT_VERSION {
            return Err(SynthError::ShapeMismatch(format!(
                "unsupported model format version {}",
                self.format_version
            )));
        }
        self.input.validate()?;
        self.output.validate()?;
        if !self.input.includes_constant() || self.output.includes_constant() {
            return Err(SynthError::ShapeMismatch(
                "input schema must carry the constant column and output schema must not"
                    .to_string(),
            ));
        }
        self.root.validate(self.input.width(), self.output.width())?;
        if self.root.depth() != self.depth {
            return Err(SynthError::ShapeMismatch(format!(
                "recorded depth {} but tree has depth {}",
                self.depth,
                self.root.depth()
            )));
        }
        Ok(())
    }

    /// Write the model as indented canonical JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        write_canonical_pretty(&mut writer, self)?;
        writer.flush()?;
        info!(path = %path.display(), depth = self.depth, "Saved model");
        Ok(())
    }

    /// Read and validate a model written by [`SynthesizedModel::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let model: SynthesizedModel = serde_json::from_str(&content)?;
        model.validate()?;
        info!(path = %path.display(), depth = model.depth, "Loaded model");
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{record, Value};
    use tempfile::tempdir;

    fn step_model() -> SynthesizedModel {
        let inputs: Vec<Record> = (0..4).map(|x| record([("x", x)])).collect();
        let outputs: Vec<Record> = [-1, -1, 1, 1].iter().map(|y| record([("y", *y)])).collect();
        SynthesizedModel::new(
            Vectorizer::fit(&inputs, true).unwrap(),
            Vectorizer::fit(&outputs, false).unwrap(),
            Node::internal(
                vec![0.15, -0.05],
                Node::leaf(vec![vec![0.0, 1.0]]),
                Node::leaf(vec![vec![0.0, -1.0]]),
            ),
            Regularization::L1,
            RenderOptions::default(),
            2,
        )
    }

    #[test]
    fn test_predict() {
        let model = step_model();
        for (x, y) in [(0, -1.0), (1, -1.0), (2, 1.0), (3, 1.0)] {
            let out = model.predict(&record([("x", x)]));
            assert_eq!(out["y"], Value::Number(y));
        }
        assert_eq!(model.depth(), 2);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        let model = step_model();
        model.save(&path).unwrap();

        let loaded = SynthesizedModel::load(&path).unwrap();
        assert_eq!(loaded, model);
        assert_eq!(loaded.fingerprint().unwrap(), model.fingerprint().unwrap());
        assert_eq!(loaded.emit_source("f"), model.emit_source("f"));
    }

    #[test]
    fn test_load_rejects_inconsistent_tree() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        let mut model = step_model();
        model.root = Node::leaf(vec![vec![1.0, 2.0, 3.0]]);
        model.depth = 1;
        model.save(&path).unwrap();

        let err = SynthesizedModel::load(&path).unwrap_err();
        assert!(matches!(err, SynthError::ShapeMismatch(_)));
    }

    #[test]
    fn test_load_rejects_schema_without_ranges() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        let mut json: serde_json::Value =
            serde_json::from_str(&step_model().to_canonical_json().unwrap()).unwrap();
        json["input"]["ranges"] = serde_json::json!([]);
        std::fs::write(&path, json.to_string()).unwrap();

        let err = SynthesizedModel::load(&path).unwrap_err();
        assert!(matches!(err, SynthError::ShapeMismatch(_)));
    }

    #[test]
    fn test_predict_routes_boundary_noise_greater() {
        let mut model = step_model();
        // x = 2 sits 1e-12 below the boundary
        model.root = Node::internal(
            vec![0.15, -0.05 - 1e-12],
            Node::leaf(vec![vec![0.0, 1.0]]),
            Node::leaf(vec![vec![0.0, -1.0]]),
        );
        assert_eq!(model.predict(&record([("x", 2)]))["y"], Value::Number(1.0));
        assert_eq!(model.predict(&record([("x", 1)]))["y"], Value::Number(-1.0));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let model = step_model();
        let mut other = step_model();
        other.root = Node::internal(
            vec![0.15, -0.05],
            Node::leaf(vec![vec![0.0, 1.0]]),
            Node::leaf(vec![vec![0.0, 0.0]]),
        );
        assert_ne!(model.fingerprint().unwrap(), other.fingerprint().unwrap());
        assert!(model.to_canonical_json().unwrap().starts_with("{\"depth\":2,"));
    }
}
