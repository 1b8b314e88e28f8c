use serde::{Serialize, Deserialize};

use crate::error::{NnError, Result};
use crate::math::tensor::Tensor;

/// Handle to one tensor inside a `ParamStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamId(pub usize);

/// A named tensor owned by a model.
///
/// `trainable == false` marks buffers (batch-norm running statistics) that
/// are saved with the weights but never touched by an optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: Tensor,
    #[serde(skip)]
    pub grad: Tensor,
    pub trainable: bool,
}

/// Ordered collection of every parameter and buffer of one model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamStore {
    params: Vec<Parameter>,
}

impl ParamStore {
    pub fn new() -> ParamStore {
        ParamStore { params: Vec::new() }
    }

    /// Registers a trainable parameter and returns its handle.
    pub fn register(&mut self, name: impl Into<String>, value: Tensor) -> ParamId {
        self.push(name.into(), value, true)
    }

    /// Registers a non-trainable buffer.
    pub fn register_buffer(&mut self, name: impl Into<String>, value: Tensor) -> ParamId {
        self.push(name.into(), value, false)
    }

    fn push(&mut self, name: String, value: Tensor, trainable: bool) -> ParamId {
        let grad = Tensor::zeros(&value.shape);
        self.params.push(Parameter { name, value, grad, trainable });
        ParamId(self.params.len() - 1)
    }

    pub fn get(&self, id: ParamId) -> &Parameter {
        &self.params[id.0]
    }

    pub fn value(&self, id: ParamId) -> &Tensor {
        &self.params[id.0].value
    }

    pub fn value_mut(&mut self, id: ParamId) -> &mut Tensor {
        &mut self.params[id.0].value
    }

    pub fn grad(&self, id: ParamId) -> &Tensor {
        &self.params[id.0].grad
    }

    /// Adds `grad` into the accumulated gradient of `id`.
    pub fn accumulate_grad(&mut self, id: ParamId, grad: &Tensor) -> Result<()> {
        let param = &mut self.params[id.0];
        if param.grad.shape != param.value.shape {
            param.grad = Tensor::zeros(&param.value.shape);
        }
        param.grad.add_assign(grad)
    }

    /// Resets every accumulated gradient to zero.
    pub fn zero_grad(&mut self) {
        for p in &mut self.params {
            if p.grad.shape == p.value.shape {
                p.grad.fill(0.0);
            } else {
                p.grad = Tensor::zeros(&p.value.shape);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Parameter> {
        self.params.iter_mut()
    }

    /// Number of trainable scalars.
    pub fn num_trainable(&self) -> usize {
        self.params.iter().filter(|p| p.trainable).map(|p| p.value.numel()).sum()
    }

    /// Copies values from `other`, which must hold the same names and shapes
    /// in the same order.
    pub fn load_from(&mut self, other: &ParamStore) -> Result<()> {
        if other.len() != self.len() {
            return Err(NnError::ParamMismatch(format!(
                "expected {} parameters, found {}", self.len(), other.len()
            )));
        }
        for (mine, theirs) in self.params.iter().zip(&other.params) {
            if mine.name != theirs.name || mine.value.shape != theirs.value.shape {
                return Err(NnError::ParamMismatch(format!(
                    "{} {:?} does not match {} {:?}",
                    mine.name, mine.value.shape, theirs.name, theirs.value.shape
                )));
            }
        }
        for (mine, theirs) in self.params.iter_mut().zip(&other.params) {
            mine.value = theirs.value.clone();
        }
        self.zero_grad();
        Ok(())
    }

    /// Serializes all parameter values to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a store previously written by `save_json`.
    pub fn load_json(path: &str) -> Result<ParamStore> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let mut store: ParamStore = serde_json::from_reader(reader)?;
        store.zero_grad();
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate_then_zero_grad() {
        let mut store = ParamStore::new();
        let id = store.register("w", Tensor::zeros(&[2]));
        let g = Tensor::from_vec(&[2], vec![1.0, 2.0]).unwrap();
        store.accumulate_grad(id, &g).unwrap();
        store.accumulate_grad(id, &g).unwrap();
        assert_eq!(store.grad(id).data, vec![2.0, 4.0]);
        store.zero_grad();
        assert_eq!(store.grad(id).data, vec![0.0, 0.0]);
    }

    #[test]
    fn load_from_rejects_mismatched_shapes() {
        let mut a = ParamStore::new();
        a.register("w", Tensor::zeros(&[2, 2]));
        let mut b = ParamStore::new();
        b.register("w", Tensor::zeros(&[3, 2]));
        assert!(matches!(a.load_from(&b), Err(NnError::ParamMismatch(_))));
    }

    #[test]
    fn buffers_are_not_counted_as_trainable() {
        let mut store = ParamStore::new();
        store.register("w", Tensor::zeros(&[3, 2]));
        store.register_buffer("running_mean", Tensor::zeros(&[4]));
        assert_eq!(store.num_trainable(), 6);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn json_round_trip_is_bit_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        let path = path.to_str().unwrap();

        let values = vec![0.1 + 0.2, 1.0 / 3.0, -2.718281828459045e-7, f64::MIN_POSITIVE, 123456.78901234567];
        let mut store = ParamStore::new();
        store.register("w", Tensor::from_vec(&[5], values.clone()).unwrap());
        store.register_buffer("running_var", Tensor::from_vec(&[1], vec![0.9999999999999999]).unwrap());
        store.save_json(path).unwrap();

        let loaded = ParamStore::load_json(path).unwrap();
        let bits = |s: &ParamStore| -> Vec<u64> { s.iter().flat_map(|p| p.value.data.iter().map(|v| v.to_bits())).collect() };
        assert_eq!(bits(&loaded), bits(&store));
        assert_eq!(loaded.value(ParamId(0)).data, values);
    }
}
