//! Weight blobs in safetensors format.
//!
//! Snapshots carry weights as bytes so they can be shipped to workers and
//! written to disk unchanged. Loading is strict: every variable of the
//! target VarStore must be present with the same shape.

use safetensors::tensor::{serialize, Dtype, SafeTensors, TensorView};
use std::collections::HashMap;
use tch::{nn, Kind, Tensor};

use crate::neural::policy::PolicyError;

/// Serialize every variable of `vs` into a safetensors blob.
pub fn varstore_to_bytes(vs: &nn::VarStore) -> Result<Vec<u8>, PolicyError> {
    let mut buffers: HashMap<String, (Vec<usize>, Vec<u8>)> = HashMap::new();

    for (name, tensor) in vs.variables() {
        let shape: Vec<usize> = tensor.size().iter().map(|&x| x as usize).collect();
        let data = tensor_to_bytes(&tensor)?;
        buffers.insert(name, (shape, data));
    }

    let mut views: HashMap<String, TensorView<'_>> = HashMap::new();
    for (name, (shape, data)) in &buffers {
        let view = TensorView::new(Dtype::F32, shape.clone(), data)
            .map_err(|e| PolicyError::Weights(format!("tensor '{}': {}", name, e)))?;
        views.insert(name.clone(), view);
    }

    serialize(views, &None).map_err(|e| PolicyError::Weights(e.to_string()))
}

/// Copy a safetensors blob into the variables of `vs`.
pub fn load_varstore_from_bytes(vs: &mut nn::VarStore, bytes: &[u8]) -> Result<(), PolicyError> {
    let tensors = SafeTensors::deserialize(bytes).map_err(|e| PolicyError::Weights(e.to_string()))?;

    let variables = vs.variables();
    let stored = tensors.names().len();
    if stored != variables.len() {
        return Err(PolicyError::ShapeMismatch {
            what: "tensor count",
            expected: variables.len(),
            actual: stored,
        });
    }

    for (name, mut var) in variables {
        let view = tensors
            .tensor(&name)
            .map_err(|_| PolicyError::Weights(format!("tensor '{}' not found in weights", name)))?;

        let expected: Vec<usize> = var.size().iter().map(|&x| x as usize).collect();
        if view.shape() != expected.as_slice() {
            return Err(PolicyError::Weights(format!(
                "tensor '{}' has shape {:?}, model expects {:?}",
                name,
                view.shape(),
                expected
            )));
        }

        let loaded = tensor_view_to_tensor(&view)?;
        tch::no_grad(|| var.f_copy_(&loaded))?;
    }

    Ok(())
}

fn tensor_to_bytes(tensor: &Tensor) -> Result<Vec<u8>, PolicyError> {
    // Flatten the tensor for conversion, then get contiguous data on CPU
    let tensor = tensor.to_device(tch::Device::Cpu).flatten(0, -1).contiguous();

    match tensor.kind() {
        Kind::Float => {
            let data: Vec<f32> = Vec::<f32>::try_from(&tensor)?;
            Ok(data.iter().flat_map(|x| x.to_le_bytes()).collect())
        }
        kind => Err(PolicyError::Weights(format!("unsupported tensor kind: {:?}", kind))),
    }
}

fn tensor_view_to_tensor(view: &TensorView) -> Result<Tensor, PolicyError> {
    let shape: Vec<i64> = view.shape().iter().map(|&x| x as i64).collect();

    match view.dtype() {
        Dtype::F32 => {
            let floats: Vec<f32> = view
                .data()
                .chunks_exact(4)
                .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect();
            Ok(Tensor::from_slice(&floats).reshape(&shape))
        }
        dtype => Err(PolicyError::Weights(format!("unsupported dtype: {:?}", dtype))),
    }
}
