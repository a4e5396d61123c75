//! OpenVINO-backed cascade classifier

use std::sync::Arc;

use openvino::{ElementType, Shape, Tensor};

use crate::error::{CascadeError, Result};
use crate::utils::math::{argmax, softmax_at};

use super::pool::ModelPool;
use super::preprocess::ImageTensor;
use super::routing::{ClassifierBank, Classifier};
use super::slot::ClassifierSlot;

/// Runs the compiled model of one slot and returns the arg-max label
pub struct OpenVinoClassifier {
    pool: Arc<ModelPool>,
    slot: ClassifierSlot,
    input_size: (usize, usize),
    num_classes: usize,
}

impl OpenVinoClassifier {
    /// Compile the slot's model and record the class count its output reports
    pub fn load(
        pool: Arc<ModelPool>,
        slot: ClassifierSlot,
        input_size: (u32, u32),
    ) -> Result<Self> {
        let num_classes = pool.output_classes(slot)?;
        Ok(Self {
            pool,
            slot,
            input_size: (input_size.0 as usize, input_size.1 as usize),
            num_classes,
        })
    }

    /// Raw logits for one image
    fn infer(&self, image: &ImageTensor) -> Result<Vec<f32>> {
        let slot = self.slot;
        let fail = |e: openvino::InferenceError| CascadeError::classifier(slot, e);

        let model = self.pool.get_model(slot)?;
        let mut request = model.create_infer_request().map_err(fail)?;

        let shape = Shape::new(&image.shape_i64()).map_err(fail)?;
        let mut input = Tensor::new(ElementType::F32, &shape).map_err(fail)?;
        let src = image.as_slice()?;
        let dst = input.get_data_mut::<f32>().map_err(fail)?;
        if dst.len() != src.len() {
            return Err(CascadeError::invalid_input(format!(
                "input tensor holds {} values, image has {}",
                dst.len(),
                src.len()
            )));
        }
        dst.copy_from_slice(src);

        request.set_input_tensor(&input).map_err(fail)?;
        request.infer().map_err(fail)?;

        let output = request.get_output_tensor().map_err(fail)?;
        let logits = output.get_data::<f32>().map_err(fail)?.to_vec();

        tracing::debug!("{} raw output: {:?}", slot, logits);
        Ok(logits)
    }
}

impl Classifier<ImageTensor> for OpenVinoClassifier {
    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn classify(&self, image: &ImageTensor) -> Result<usize> {
        image.ensure_size(self.input_size.0, self.input_size.1)?;

        let logits = self.infer(image)?;
        let label = label_from_logits(self.slot, &logits)?;

        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!("{} -> {} (p={:.3})", self.slot, label, softmax_at(&logits, label));
        }

        Ok(label)
    }
}

/// Arg-max over a slot's logits, rejecting outputs of the wrong width
pub fn label_from_logits(slot: ClassifierSlot, logits: &[f32]) -> Result<usize> {
    if logits.len() != slot.num_classes() {
        return Err(CascadeError::classifier(
            slot,
            format!(
                "model produced {} logits, expected {}",
                logits.len(),
                slot.num_classes()
            ),
        ));
    }
    if logits.iter().any(|v| v.is_nan()) {
        return Err(CascadeError::classifier(slot, "model produced NaN logits"));
    }
    Ok(argmax(logits))
}

/// Build a complete bank of OpenVINO classifiers over one pool
///
/// Every model is compiled here. A model whose output width differs from
/// its slot's cardinality fails the bank build.
pub fn openvino_bank(
    pool: Arc<ModelPool>,
    input_size: (u32, u32),
) -> Result<ClassifierBank<ImageTensor>> {
    let mut builder = ClassifierBank::builder();
    for slot in ClassifierSlot::all() {
        builder = builder.insert(slot, OpenVinoClassifier::load(pool.clone(), slot, input_size)?);
    }
    builder.build()
}
