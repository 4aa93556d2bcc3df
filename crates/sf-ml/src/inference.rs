//! ONNX inference engine
//!
//! Pure Rust CPU inference through tract. Tensors cross the tract boundary
//! as flat row-major slices, so host code works with `ndarray` arrays only.

use std::path::Path;

use ndarray::{Array3, Array4};

use crate::error::{MlError, MlResult};

/// Configuration for inference engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceConfig {
    /// Run tract's graph optimizer after loading
    pub optimize_graph: bool,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            optimize_graph: true,
        }
    }
}

/// Tract model wrapper
struct TractModel {
    model: tract_onnx::prelude::SimplePlan<
        tract_onnx::prelude::TypedFact,
        Box<dyn tract_onnx::prelude::TypedOp>,
        tract_onnx::prelude::Graph<
            tract_onnx::prelude::TypedFact,
            Box<dyn tract_onnx::prelude::TypedOp>,
        >,
    >,
}

/// Loaded ONNX model with a fixed `[batch, channels, samples]` input
pub struct InferenceEngine {
    tract_model: TractModel,
    input_shape: [usize; 3],
}

impl InferenceEngine {
    /// Load model and specialize it for `input_shape`
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        input_shape: [usize; 3],
        config: &InferenceConfig,
    ) -> MlResult<Self> {
        let path = model_path.as_ref();

        if !path.exists() {
            return Err(MlError::Tract(format!(
                "model file not found: {}",
                path.display()
            )));
        }

        log::info!(
            "Loading ONNX model {} with input {:?}",
            path.display(),
            input_shape
        );

        let tract_model = Self::load_tract_model(path, input_shape, config)?;

        Ok(Self {
            tract_model,
            input_shape,
        })
    }

    /// Load tract model
    fn load_tract_model(
        path: &Path,
        input_shape: [usize; 3],
        config: &InferenceConfig,
    ) -> MlResult<TractModel> {
        use tract_onnx::prelude::*;

        let model = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| MlError::Tract(e.to_string()))?
            .with_input_fact(0, f32::fact(input_shape).into())
            .map_err(|e| MlError::Tract(e.to_string()))?;

        let typed = if config.optimize_graph {
            model.into_optimized()
        } else {
            model.into_typed()
        }
        .map_err(|e| MlError::Tract(e.to_string()))?;

        let model = typed
            .into_runnable()
            .map_err(|e| MlError::Tract(e.to_string()))?;

        Ok(TractModel { model })
    }

    pub fn input_shape(&self) -> [usize; 3] {
        self.input_shape
    }

    /// Run inference with 3D array input, return 4D array output
    /// Input: [batch, channels, samples]
    /// Output: [batch, stems, channels, samples]
    pub fn run_array3(&self, input: &Array3<f32>) -> MlResult<Array4<f32>> {
        use tract_onnx::prelude::*;

        if input.shape() != self.input_shape {
            return Err(MlError::Tract(format!(
                "input shape {:?} does not match model input {:?}",
                input.shape(),
                self.input_shape
            )));
        }

        let data: Vec<f32> = input.iter().copied().collect();
        let tensor = Tensor::from_shape(input.shape(), &data)
            .map_err(|e| MlError::Tract(e.to_string()))?;

        let outputs = self
            .tract_model
            .model
            .run(tvec!(tensor.into()))
            .map_err(|e| MlError::Tract(e.to_string()))?;

        let output = outputs
            .first()
            .ok_or_else(|| MlError::Tract("no output from model".into()))?;

        let shape = output.shape().to_vec();
        let &[batch, stems, channels, samples] = shape.as_slice() else {
            return Err(MlError::InvalidOutputShape {
                expected: "4D tensor [batch, stems, channels, samples]".into(),
                got: format!("{}D tensor {:?}", shape.len(), shape),
            });
        };

        let values = output
            .as_slice::<f32>()
            .map_err(|e| MlError::Tract(e.to_string()))?;

        Array4::from_shape_vec((batch, stems, channels, samples), values.to_vec()).map_err(|e| {
            MlError::InvalidOutputShape {
                expected: format!("{:?}", shape),
                got: e.to_string(),
            }
        })
    }
}
