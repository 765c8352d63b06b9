use tch::{Device, Tensor, nn, nn::Module};

use crate::error::Result;

/// 隐藏层宽度
pub const HIDDEN_UNITS: i64 = 128;

/// Q 网络: obs -> 128 -> 128 -> n_actions，隐藏层之间使用 ReLU，输出层无激活
pub struct MLP {
    pub model: nn::Sequential,
    pub var_store: nn::VarStore, // 👈 保存 VarStore 的所有权
    input_dim: usize,
    output_dim: usize,
}

impl MLP {
    pub fn new(vs: nn::VarStore, input_dim: usize, output_dim: usize) -> Self {
        let root = vs.root();
        let model = nn::seq()
            .add(nn::linear(
                &root / "layer1",
                input_dim as i64,
                HIDDEN_UNITS,
                Default::default(),
            ))
            .add_fn(|xs| xs.relu())
            .add(nn::linear(
                &root / "layer2",
                HIDDEN_UNITS,
                HIDDEN_UNITS,
                Default::default(),
            ))
            .add_fn(|xs| xs.relu())
            .add(nn::linear(
                &root / "layer3",
                HIDDEN_UNITS,
                output_dim as i64,
                Default::default(),
            ));
        MLP {
            model,
            var_store: vs,
            input_dim,
            output_dim,
        }
    }

    /// Maps a `[batch, input_dim]` tensor to `[batch, output_dim]` action values.
    pub fn evaluate(&self, states: &Tensor) -> Tensor {
        self.model.forward(&states.to_device(self.device()))
    }

    /// Overwrites every parameter with the matching one of `other`.
    pub fn load_from(&mut self, other: &MLP) -> Result<()> {
        self.var_store.copy(&other.var_store)?;
        Ok(())
    }

    /// Parameter names, sorted.
    pub fn parameter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.var_store.variables().into_keys().collect();
        names.sort();
        names
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.var_store
    }

    pub fn device(&self) -> Device {
        self.var_store.device()
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }
}
