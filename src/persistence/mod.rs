//! JSON persistence of a trained network.

use std::{fs, path::Path};

use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    Result, RnnErr,
    arch::recurrent::{HiddenLayer, Model, ModelParams},
    configs::RnnConfig,
    matrix::{Matrix, MatrixId},
    training::{RnnTimeStep, generate_rng},
};

const MODEL_TYPE: &str = "RnnTimeStep";

/// A matrix as stored on disk, weights are row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixJson {
    pub rows: usize,
    pub columns: usize,
    pub weights: Vec<f32>,
}

impl From<&Matrix> for MatrixJson {
    fn from(matrix: &Matrix) -> Self {
        Self {
            rows: matrix.rows(),
            columns: matrix.columns(),
            weights: matrix.to_weights_vec(),
        }
    }
}

impl TryFrom<MatrixJson> for Matrix {
    type Error = RnnErr;

    fn try_from(json: MatrixJson) -> Result<Self> {
        Matrix::from_weights(json.rows, json.columns, json.weights)
    }
}

/// The serialized form of an `RnnTimeStep`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelJson {
    #[serde(rename = "type")]
    pub kind: String,
    pub options: RnnConfig,
    pub input: MatrixJson,
    pub hidden_layers: Vec<HiddenLayer<MatrixJson>>,
    pub output_connector: MatrixJson,
    pub output: MatrixJson,
}

impl ModelJson {
    fn from_model(options: RnnConfig, model: &Model) -> Result<Self> {
        let matrix = |id: MatrixId| model.matrix(id).map(MatrixJson::from);

        let hidden_layers = model
            .hidden_layers()
            .iter()
            .map(|layer| layer.try_map(matrix))
            .collect::<Result<_>>()?;

        Ok(Self {
            kind: MODEL_TYPE.into(),
            options,
            input: matrix(model.input())?,
            hidden_layers,
            output_connector: matrix(model.output_connector())?,
            output: matrix(model.output())?,
        })
    }

    fn into_model(self) -> Result<(RnnConfig, Model)> {
        if self.kind != MODEL_TYPE {
            return Err(RnnErr::Configuration(format!(
                "expected a {MODEL_TYPE} model, got {}",
                self.kind
            )));
        }

        let params = ModelParams {
            input: self.input.try_into()?,
            hidden_layers: self
                .hidden_layers
                .into_iter()
                .map(|layer| layer.try_map(Matrix::try_from))
                .collect::<Result<_>>()?,
            output_connector: self.output_connector.try_into()?,
            output: self.output.try_into()?,
        };

        let options = self.options;
        let model = Model::new(params, options.act_fn.into(), options.max_graphs)?;

        let sizes = (model.input_size(), model.hidden_sizes(), model.output_size());
        if sizes != (options.input_size, options.hidden_sizes.clone(), options.output_size) {
            return Err(RnnErr::Configuration(format!(
                "the options describe a {}-{:?}-{} network but the matrices a {}-{:?}-{} one",
                options.input_size,
                options.hidden_sizes,
                options.output_size,
                sizes.0,
                sizes.1,
                sizes.2
            )));
        }

        Ok((options, model))
    }
}

impl<R: Rng> RnnTimeStep<R> {
    /// Captures the weights and hyperparameters of the network.
    pub fn to_json(&self) -> Result<ModelJson> {
        ModelJson::from_model(self.config().clone(), self.model())
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_json()?)?)
    }

    /// Writes the network to `path` as JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path.as_ref(), self.to_json_string()?)?;
        info!("saved network to {}", path.as_ref().display());
        Ok(())
    }

    /// Restores a network from `json`, drawing random numbers from `rng`.
    ///
    /// Exactly one equation is bound so the network can `run` right away.
    pub fn from_json_with_rng(json: ModelJson, rng: R) -> Result<Self> {
        let (options, model) = json.into_model()?;
        let mut net = Self::from_model(options, model, rng);
        net.grow_graphs(1)?;
        Ok(net)
    }
}

impl RnnTimeStep {
    /// Restores a network from `json`, the random number generator is seeded from the stored
    /// options.
    pub fn from_json(json: ModelJson) -> Result<Self> {
        let rng = generate_rng(json.options.seed);
        Self::from_json_with_rng(json, rng)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::from_json(serde_json::from_str(json)?)
    }

    /// Reads a network previously written with `save`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let net = Self::from_json_str(&content)?;
        info!("loaded network from {}", path.as_ref().display());
        Ok(net)
    }
}
