use std::sync::{Mutex, PoisonError};

use ndarray::ArrayD;

use crate::inference::domain::inference_session::InferenceSession;
use crate::shared::error::SwapError;

/// [`InferenceSession`] over an ONNX Runtime session.
///
/// `ort::session::Session::run` needs exclusive access, so calls from the
/// per-face workers are serialized here.
pub struct OrtSession {
    session: Mutex<ort::session::Session>,
    input_names: Vec<String>,
    input_shapes: Vec<Option<Vec<i64>>>,
}

impl OrtSession {
    pub fn new(session: ort::session::Session) -> Self {
        let mut input_names = Vec::new();
        let mut input_shapes = Vec::new();
        for input in session.inputs() {
            input_names.push(input.name().to_string());
            let shape = if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                Some(shape.iter().copied().collect())
            } else {
                None
            };
            input_shapes.push(shape);
        }
        Self {
            session: Mutex::new(session),
            input_names,
            input_shapes,
        }
    }
}

impl InferenceSession for OrtSession {
    fn run(&self, inputs: Vec<ArrayD<f32>>) -> Result<Vec<ArrayD<f32>>, SwapError> {
        if inputs.len() != self.input_names.len() {
            return Err(SwapError::Inference(format!(
                "model expects {} inputs, got {}",
                self.input_names.len(),
                inputs.len()
            )));
        }

        let mut feed = Vec::with_capacity(inputs.len());
        for (name, array) in self.input_names.iter().zip(inputs) {
            let tensor = ort::value::Tensor::from_array(array).map_err(SwapError::inference)?;
            feed.push((name.clone(), tensor));
        }

        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        let outputs = session.run(feed).map_err(SwapError::inference)?;
        if outputs.len() == 0 {
            return Err(SwapError::Inference("model produced no outputs".into()));
        }

        let mut results = Vec::with_capacity(outputs.len());
        for i in 0..outputs.len() {
            let array = outputs[i]
                .try_extract_array::<f32>()
                .map_err(SwapError::inference)?;
            results.push(array.to_owned());
        }
        Ok(results)
    }

    fn input_shape(&self, index: usize) -> Option<Vec<i64>> {
        self.input_shapes.get(index).cloned().flatten()
    }
}
