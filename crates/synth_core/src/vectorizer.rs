//! Feature schema fitting and record <-> vector conversion
//!
//! Vector layout: `[value columns][missingness columns][constant]`.
//! Value columns are rescaled per key into `[-1, 1]` using the observed
//! `(min, max)` range.

use crate::errors::{Result, SynthError};
use crate::expression::{
    render_condition, LinearForm, NullableExpression, OutputExpression, RenderOptions,
};
use crate::record::{Record, Value};
use serde::{Deserialize, Serialize};

/// Per-key affine map `scaled = slope * raw + intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleMap {
    pub slope: f64,
    pub intercept: f64,
}

impl ScaleMap {
    /// Map `[min, max]` onto `[-1, 1]`. A constant feature gets slope 0 and
    /// an intercept equal to the constant.
    pub fn from_range(min: f64, max: f64) -> Self {
        if min == max {
            return Self {
                slope: 0.0,
                intercept: min,
            };
        }
        Self {
            slope: 2.0 / (max - min),
            intercept: -(min + max) / (max - min),
        }
    }

    pub fn apply(&self, raw: f64) -> f64 {
        self.slope * raw + self.intercept
    }

    pub fn invert(&self, scaled: f64) -> f64 {
        if self.slope == 0.0 {
            return self.intercept;
        }
        (scaled - self.intercept) / self.slope
    }

    pub fn is_degenerate(&self) -> bool {
        self.slope == 0.0
    }
}

/// Fitted column layout plus per-key scaling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vectorizer {
    value_keys: Vec<String>,
    ranges: Vec<(f64, f64)>,
    missing_keys: Vec<String>,
    include_constant: bool,
}

impl Vectorizer {
    /// Fit a schema over `records`, assigning columns in first-seen key order.
    pub fn fit(records: &[Record], include_constant: bool) -> Result<Self> {
        let mut value_keys: Vec<String> = Vec::new();
        let mut ranges: Vec<(f64, f64)> = Vec::new();
        let mut missing_keys: Vec<String> = Vec::new();

        for record in records {
            for (key, value) in record {
                match *value {
                    Value::Number(v) if !v.is_finite() => {
                        return Err(SynthError::InvalidValueKind {
                            key: key.clone(),
                            found: v.to_string(),
                        });
                    }
                    Value::Number(v) => match value_keys.iter().position(|k| k == key) {
                        Some(idx) => {
                            let (min, max) = ranges[idx];
                            ranges[idx] = (min.min(v), max.max(v));
                        }
                        None => {
                            value_keys.push(key.clone());
                            ranges.push((v, v));
                        }
                    },
                    Value::Null => {
                        if !missing_keys.contains(key) {
                            missing_keys.push(key.clone());
                        }
                    }
                }
            }
        }

        Ok(Self {
            value_keys,
            ranges,
            missing_keys,
            include_constant,
        })
    }

    /// Check the internal layout of a deserialized schema.
    pub fn validate(&self) -> Result<()> {
        if self.ranges.len() != self.value_keys.len() {
            return Err(SynthError::ShapeMismatch(format!(
                "schema has {} value keys but {} ranges",
                self.value_keys.len(),
                self.ranges.len()
            )));
        }
        if let Some((min, max)) = self
            .ranges
            .iter()
            .find(|(min, max)| !min.is_finite() || !max.is_finite() || min > max)
        {
            return Err(SynthError::ShapeMismatch(format!(
                "invalid value range ({min}, {max})"
            )));
        }
        Ok(())
    }

    /// Total vector width
    pub fn width(&self) -> usize {
        self.value_keys.len() + self.missing_keys.len() + usize::from(self.include_constant)
    }

    pub fn value_keys(&self) -> &[String] {
        &self.value_keys
    }

    pub fn missing_keys(&self) -> &[String] {
        &self.missing_keys
    }

    pub fn includes_constant(&self) -> bool {
        self.include_constant
    }

    pub fn value_index(&self, key: &str) -> Option<usize> {
        self.value_keys.iter().position(|k| k == key)
    }

    pub fn missing_index(&self, key: &str) -> Option<usize> {
        self.missing_keys
            .iter()
            .position(|k| k == key)
            .map(|idx| self.value_keys.len() + idx)
    }

    pub fn is_nullable(&self, key: &str) -> bool {
        self.missing_keys.iter().any(|k| k == key)
    }

    /// Observed `(min, max)` of a value key
    pub fn range(&self, key: &str) -> Option<(f64, f64)> {
        self.value_index(key).map(|idx| self.ranges[idx])
    }

    pub fn scale_map(&self, key: &str) -> Option<ScaleMap> {
        self.range(key)
            .map(|(min, max)| ScaleMap::from_range(min, max))
    }

    pub fn to_scaled_value(&self, key: &str, value: f64) -> Option<f64> {
        self.scale_map(key).map(|map| map.apply(value))
    }

    pub fn from_scaled_value(&self, key: &str, value: f64) -> Option<f64> {
        self.scale_map(key).map(|map| map.invert(value))
    }

    /// Parameter names for emitted code: value keys, then keys that were
    /// only ever observed as null.
    pub fn argument_keys(&self) -> Vec<&str> {
        self.value_keys
            .iter()
            .chain(
                self.missing_keys
                    .iter()
                    .filter(|k| !self.value_keys.contains(k)),
            )
            .map(String::as_str)
            .collect()
    }

    /// Vectorize one record. Absent keys count as null; unknown keys are
    /// ignored.
    pub fn to_vector(&self, record: &Record) -> Vec<f64> {
        let mut vector = vec![0.0; self.width()];
        for (idx, key) in self.value_keys.iter().enumerate() {
            if let Some(Value::Number(v)) = record.get(key) {
                vector[idx] = ScaleMap::from_range(self.ranges[idx].0, self.ranges[idx].1).apply(*v);
            }
        }
        let offset = self.value_keys.len();
        for (idx, key) in self.missing_keys.iter().enumerate() {
            let is_null = record.get(key).map_or(true, Value::is_null);
            vector[offset + idx] = if is_null { 1.0 } else { 0.0 };
        }
        if self.include_constant {
            if let Some(last) = vector.last_mut() {
                *last = 1.0;
            }
        }
        vector
    }

    pub fn to_vectors(&self, records: &[Record]) -> Vec<Vec<f64>> {
        records.iter().map(|r| self.to_vector(r)).collect()
    }

    /// Decode a result vector.
    pub fn from_vector(&self, vector: &[f64]) -> Record {
        let mut out = Record::new();
        for key in &self.missing_keys {
            if let Some(idx) = self.missing_index(key) {
                if vector.get(idx).copied().unwrap_or(0.0) > 0.5 {
                    out.insert(key.clone(), Value::Null);
                }
            }
        }
        for (idx, key) in self.value_keys.iter().enumerate() {
            if out.contains_key(key) {
                continue;
            }
            let (min, max) = self.ranges[idx];
            let scaled = vector.get(idx).copied().unwrap_or(0.0);
            out.insert(
                key.clone(),
                Value::Number(ScaleMap::from_range(min, max).invert(scaled)),
            );
        }
        out
    }

    /// Symbolic form of `row · vector(record)` expressed in raw key units.
    ///
    /// A null key's value column holds 0, so for nullable keys the scaling
    /// offset is cancelled through the missingness coefficient and only
    /// applies while the key is present.
    pub fn linear_form(&self, row: &[f64], tolerance: f64) -> LinearForm {
        let mut form = LinearForm::new(tolerance).with_nullable_keys(self.missing_keys.iter().cloned());
        let coefficient = |idx: usize| row.get(idx).copied().unwrap_or(0.0);

        for (idx, key) in self.value_keys.iter().enumerate() {
            let (min, max) = self.ranges[idx];
            let map = ScaleMap::from_range(min, max);
            let offset = map.intercept * coefficient(idx);
            form.add_coefficient(key, map.slope * coefficient(idx));
            form.add_constant(offset);
            if self.is_nullable(key) {
                form.add_missing_coefficient(key, -offset);
            }
        }
        let offset = self.value_keys.len();
        for (idx, key) in self.missing_keys.iter().enumerate() {
            form.add_missing_coefficient(key, coefficient(offset + idx));
        }
        if self.include_constant {
            form.add_constant(coefficient(self.width() - 1));
        }
        form
    }

    /// Split condition `row · vector(record) >= 0` in raw units, with the
    /// missingness terms of keys known to be non-null removed.
    pub fn condition_form(&self, row: &[f64], present: &[String], options: &RenderOptions) -> LinearForm {
        let mut form = self.linear_form(row, options.tolerance);
        for key in present {
            form.assume_present(key);
        }
        form
    }

    /// Render `row · vector(record) >= 0` as source text.
    pub fn condition_source(&self, row: &[f64], options: &RenderOptions) -> String {
        render_condition(&self.condition_form(row, &[], options), options)
    }

    /// Render each output key of a solved leaf map as source text over the
    /// `input` schema's keys. `self` is the output schema; its scaling is
    /// undone so the emitted code works in raw output units, and the result
    /// is snapped to the precision grid. `present` lists input keys the
    /// enclosing branches prove non-null.
    pub fn mapped_expressions(
        &self,
        matrix: &[Vec<f64>],
        input: &Vectorizer,
        present: &[String],
        options: &RenderOptions,
    ) -> Vec<(String, String)> {
        let empty: Vec<f64> = Vec::new();
        let row = |idx: usize| matrix.get(idx).unwrap_or(&empty);

        let mut entries: Vec<(String, OutputExpression)> = Vec::new();
        for (idx, key) in self.value_keys.iter().enumerate() {
            let (min, max) = self.ranges[idx];
            let map = ScaleMap::from_range(min, max);

            let value = if map.is_degenerate() {
                let mut constant = LinearForm::new(options.tolerance);
                constant.add_constant(map.intercept);
                constant
            } else {
                let mut value = input.condition_form(row(idx), present, options);
                value.shift_by(-map.intercept);
                value.scale_by(1.0 / map.slope);
                value.snap(options.precision);
                value
            };

            let expression = match self.missing_index(key) {
                Some(missing_idx) => {
                    let mut nullable = NullableExpression::new(input.condition_form(
                        row(missing_idx),
                        present,
                        options,
                    ));
                    nullable.set_value(value);
                    OutputExpression::Nullable(nullable)
                }
                None => OutputExpression::Plain(value),
            };
            entries.push((key.clone(), expression));
        }

        for key in &self.missing_keys {
            if self.value_keys.contains(key) {
                continue;
            }
            if let Some(missing_idx) = self.missing_index(key) {
                let condition = input.condition_form(row(missing_idx), present, options);
                entries.push((
                    key.clone(),
                    OutputExpression::Nullable(NullableExpression::new(condition)),
                ));
            }
        }

        entries
            .into_iter()
            .map(|(key, expr)| (key, expr.render(options)))
            .collect()
    }
}
