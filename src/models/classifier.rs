//! Classifier capability and its ONNX Runtime implementation

use crate::error::{ChurnError, Result};
use anyhow::Context;
use ort::memory::Allocator;
use ort::session::{Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use std::sync::Mutex;
use tracing::{debug, warn};

/// A trained binary classifier over an ordered feature array
pub trait Classifier: Send + Sync {
    /// Binary churn decision
    fn predict(&self, features: &[f32]) -> Result<bool>;

    /// `[p_negative, p_positive]`
    fn predict_probability(&self, features: &[f32]) -> Result<[f64; 2]>;

    /// Decision and probabilities together.
    ///
    /// Implementations that produce both from one evaluation should override this.
    fn evaluate(&self, features: &[f32]) -> Result<(bool, [f64; 2])> {
        Ok((self.predict(features)?, self.predict_probability(features)?))
    }
}

/// Raw output of one ONNX session run
#[derive(Debug, Clone, Copy)]
struct RawPrediction {
    label: Option<bool>,
    p_positive: f64,
}

/// Classifier backed by an ONNX Runtime session
pub struct OnnxClassifier {
    name: String,
    session: Mutex<Session>,
    input_name: String,
    label_output: Option<String>,
    probability_output: String,
}

impl OnnxClassifier {
    pub fn new(
        name: String,
        session: Session,
        input_name: String,
        label_output: Option<String>,
        probability_output: String,
    ) -> Self {
        Self {
            name,
            session: Mutex::new(session),
            input_name,
            label_output,
            probability_output,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, features: &[f32]) -> Result<RawPrediction> {
        self.run_session(features)
            .map_err(|e| ChurnError::Prediction(format!("{}: {:#}", self.name, e)))
    }

    fn run_session(&self, features: &[f32]) -> anyhow::Result<RawPrediction> {
        // Input tensor shape [1, num_features]
        let shape = vec![1_i64, features.len() as i64];
        let input_tensor =
            Tensor::from_array((shape, features.to_vec())).context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let outputs = session.run(ort::inputs![&self.input_name => input_tensor])?;

        let p_positive = self.extract_probability(&outputs)?;
        let label = self.extract_label(&outputs);

        debug!(
            model = %self.name,
            p_positive = p_positive,
            label = ?label,
            "Churn model inference complete"
        );

        Ok(RawPrediction { label, p_positive })
    }

    /// Read the class label output, if the model exposes one
    fn extract_label(&self, outputs: &SessionOutputs) -> Option<bool> {
        let output = outputs.get(self.label_output.as_deref()?)?;
        let (_, data) = output.try_extract_tensor::<i64>().ok()?;
        data.first().map(|&class| class == 1)
    }

    /// Extract churn probability from model output.
    /// Handles both tensor outputs and seq(map) ZipMap outputs.
    fn extract_probability(&self, outputs: &SessionOutputs) -> anyhow::Result<f64> {
        if let Some(output) = outputs.get(&self.probability_output) {
            if let Some(prob) = self.probability_from_value(output) {
                return Ok(prob);
            }
        }

        // Fallback: any non-label output that looks like probabilities
        for (name, output) in outputs.iter() {
            if name.contains("label") {
                continue;
            }
            if let Some(prob) = self.probability_from_value(&output) {
                debug!(model = %self.name, output = %name, prob = prob, "Extracted probability (fallback)");
                return Ok(prob);
            }
        }

        warn!(model = %self.name, "Model produced no probability output");
        anyhow::bail!("no probability output found")
    }

    fn probability_from_value(&self, output: &DynValue) -> Option<f64> {
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            return positive_class_from_tensor(&dims, data);
        }

        if DynSequenceValueType::can_downcast(&output.dtype()) {
            return self.extract_from_sequence_map(output).ok();
        }

        None
    }

    /// Extract probability from seq(map(int64, float)) format
    fn extract_from_sequence_map(&self, output: &DynValue) -> anyhow::Result<f64> {
        let allocator = Allocator::default();

        let sequence = output
            .downcast_ref::<DynSequenceValueType>()
            .map_err(|e| anyhow::anyhow!("Failed to downcast to sequence: {}", e))?;

        let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
        let map_value = maps
            .first()
            .ok_or_else(|| anyhow::anyhow!("Empty sequence"))?;

        let kv_pairs = map_value.try_extract_key_values::<i64, f32>()?;

        if let Some((_, prob)) = kv_pairs.iter().find(|(class, _)| *class == 1) {
            return Ok(*prob as f64);
        }
        if let Some((_, prob)) = kv_pairs.iter().find(|(class, _)| *class == 0) {
            return Ok(1.0 - *prob as f64);
        }

        Err(anyhow::anyhow!("No probability found in map"))
    }
}

/// Positive class probability from a `[batch, classes]` or `[classes]` tensor
fn positive_class_from_tensor(dims: &[i64], data: &[f32]) -> Option<f64> {
    let classes = match dims {
        [_, classes] | [classes] => *classes,
        _ => return data.last().map(|&v| v as f64),
    };

    match classes {
        n if n >= 2 => data.get(1).map(|&v| v as f64),
        1 => data.first().map(|&v| v as f64),
        _ => None,
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, features: &[f32]) -> Result<bool> {
        let raw = self.run(features)?;
        Ok(raw.label.unwrap_or(raw.p_positive >= 0.5))
    }

    fn predict_probability(&self, features: &[f32]) -> Result<[f64; 2]> {
        let raw = self.run(features)?;
        Ok([1.0 - raw.p_positive, raw.p_positive])
    }

    fn evaluate(&self, features: &[f32]) -> Result<(bool, [f64; 2])> {
        let raw = self.run(features)?;
        let label = raw.label.unwrap_or(raw.p_positive >= 0.5);
        Ok((label, [1.0 - raw.p_positive, raw.p_positive]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_class_from_tensor() {
        assert_eq!(positive_class_from_tensor(&[1, 2], &[0.25, 0.75]), Some(0.75));
        assert_eq!(positive_class_from_tensor(&[2], &[0.75, 0.25]), Some(0.25));
        assert_eq!(positive_class_from_tensor(&[1, 1], &[0.5]), Some(0.5));
        assert_eq!(positive_class_from_tensor(&[1, 0], &[]), None);
    }
}
