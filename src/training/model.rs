//! Model collaborator trait and parameter-state records

use std::collections::BTreeMap;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A model whose parameters can be checkpointed
pub trait Model {
    /// Architecture name stored in checkpoints
    fn arch(&self) -> &str;

    /// Class labels stored alongside the parameters
    fn classes(&self) -> Vec<String> {
        Vec::new()
    }

    /// Snapshot of all parameters
    fn state_dict(&self) -> Result<StateDict>;

    /// Replace all parameters from a snapshot
    fn load_state_dict(&mut self, state: &StateDict) -> Result<()>;
}

/// Host-side copy of a single tensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorState {
    /// Tensor shape
    pub shape: Vec<usize>,

    /// Data type name of the source tensor
    pub dtype: String,

    /// Tensor data (flattened, widened to f64)
    pub data: Vec<f64>,
}

impl TensorState {
    /// Copy a tensor to the host
    ///
    /// Widening to f64 happens on the CPU; not every accelerator has f64.
    pub fn from_tensor(tensor: &Tensor) -> Result<Self> {
        let host = tensor.flatten_all()?.to_device(&Device::Cpu)?;
        Ok(Self {
            shape: tensor.dims().to_vec(),
            dtype: tensor.dtype().as_str().to_string(),
            data: host.to_dtype(DType::F64)?.to_vec1::<f64>()?,
        })
    }

    /// Rebuild the tensor on `device` with the given data type
    pub fn to_tensor(&self, dtype: DType, device: &Device) -> Result<Tensor> {
        self.check_len()?;
        let host = Tensor::from_vec(self.data.clone(), self.shape.as_slice(), &Device::Cpu)?;
        Ok(host.to_dtype(dtype)?.to_device(device)?)
    }

    /// Whether the data length agrees with the shape
    pub fn is_consistent(&self) -> bool {
        self.data.len() == self.shape.iter().product::<usize>()
    }

    fn check_len(&self) -> Result<()> {
        if self.is_consistent() {
            Ok(())
        } else {
            Err(Error::checkpoint(format!(
                "tensor holds {} values but its shape {:?} needs {}",
                self.data.len(),
                self.shape,
                self.shape.iter().product::<usize>()
            )))
        }
    }

    /// Number of scalar elements
    pub fn elem_count(&self) -> usize {
        self.data.len()
    }
}

/// Named parameter snapshot, ordered by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDict {
    tensors: BTreeMap<String, TensorState>,
}

impl StateDict {
    /// Create an empty state dict
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot every variable of a `VarMap`
    pub fn from_varmap(varmap: &VarMap) -> Result<Self> {
        let data = varmap
            .data()
            .lock()
            .map_err(|_| Error::internal("VarMap lock poisoned"))?;

        let mut state = Self::new();
        for (name, var) in data.iter() {
            state.insert(name.clone(), TensorState::from_tensor(var.as_tensor())?);
        }
        Ok(state)
    }

    /// Overwrite every variable of a `VarMap` in place
    ///
    /// The names and shapes must match exactly and every tensor's data must
    /// fill its shape; a partial or mismatched snapshot is rejected before
    /// any variable is touched.
    pub fn load_into_varmap(&self, varmap: &VarMap) -> Result<()> {
        let data = varmap
            .data()
            .lock()
            .map_err(|_| Error::internal("VarMap lock poisoned"))?;

        for (name, var) in data.iter() {
            let Some(saved) = self.tensors.get(name) else {
                return Err(Error::checkpoint(format!("missing parameter `{}`", name)));
            };
            if saved.shape.as_slice() != var.dims() {
                return Err(Error::checkpoint(format!(
                    "shape mismatch for `{}`: checkpoint {:?}, model {:?}",
                    name,
                    saved.shape,
                    var.dims()
                )));
            }
            if !saved.is_consistent() {
                return Err(Error::checkpoint(format!(
                    "parameter `{}` holds {} values but its shape {:?} needs {}",
                    name,
                    saved.data.len(),
                    saved.shape,
                    var.elem_count()
                )));
            }
        }
        if let Some(unexpected) = self.tensors.keys().find(|name| !data.contains_key(*name)) {
            return Err(Error::checkpoint(format!("unexpected parameter `{}`", unexpected)));
        }

        for (name, var) in data.iter() {
            let tensor = self.tensors[name].to_tensor(var.dtype(), var.device())?;
            var.set(&tensor)?;
        }
        Ok(())
    }

    /// Insert or replace a tensor
    pub fn insert(&mut self, name: impl Into<String>, tensor: TensorState) {
        self.tensors.insert(name.into(), tensor);
    }

    /// Look up a tensor by name
    pub fn get(&self, name: &str) -> Option<&TensorState> {
        self.tensors.get(name)
    }

    /// Iterate over tensors in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &TensorState)> {
        self.tensors.iter()
    }

    /// Number of tensors
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Whether the snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Total scalar parameter count
    pub fn parameter_count(&self) -> usize {
        self.tensors.values().map(TensorState::elem_count).sum()
    }
}
