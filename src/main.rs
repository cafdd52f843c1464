use std::{env, fs, path::PathBuf};

use anyhow::Context;
use log::{debug, info};
use serde::Deserialize;

use rnn_time_step::{
    RnnTimeStep,
    codec::{CharCodec, SequenceCodec},
    configs::{RnnConfig, TrainingConfig},
    training::TrainingEvent,
};

/// The demo's settings, read from the JSON file given as the first argument.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    network: RnnConfig,
    training: TrainingConfig,
    /// Every text becomes one training sequence, framed by end tokens.
    data: Vec<String>,
    prefix: String,
    max_length: usize,
    model_out: Option<PathBuf>,
    program_out: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: RnnConfig {
                hidden_sizes: vec![5],
                ..Default::default()
            },
            training: TrainingConfig::default(),
            data: vec!["abc".into()],
            prefix: String::new(),
            max_length: 10,
            model_out: None,
            program_out: None,
        }
    }
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    let content = fs::read_to_string(path).with_context(|| format!("cannot read '{path}'"))?;
    serde_json::from_str(&content).with_context(|| format!("invalid config in '{path}'"))
}

/// Encodes `text` between a leading and a trailing end token.
fn frame(codec: &CharCodec, text: &str) -> rnn_time_step::Result<Vec<usize>> {
    let mut sequence = vec![0];
    sequence.extend(codec.encode(text)?);
    sequence.push(0);
    Ok(sequence)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => load_config(&path)?,
        None => Config::default(),
    };

    let codec = CharCodec::from_texts(&config.data);
    let data = config
        .data
        .iter()
        .map(|text| frame(&codec, text))
        .collect::<rnn_time_step::Result<Vec<_>>>()?;
    info!(
        "loaded {} sequences over a vocabulary of {} tokens",
        data.len(),
        codec.vocab_size()
    );

    let network = RnnConfig {
        data_formatter: Some(codec.clone()),
        ..config.network
    };
    let mut net = RnnTimeStep::new(network).context("cannot build the network")?;

    let summary = net.train_with(&data, &config.training, |event| {
        if let TrainingEvent::Progress { iteration, error } = event {
            debug!("iteration {iteration}: error {error}");
        }
    })?;
    info!(
        "trained for {} iterations, final error {}",
        summary.iterations, summary.error
    );

    let mut prefix = frame(&codec, &config.prefix)?;
    prefix.pop();
    if config.prefix.is_empty() {
        prefix.clear();
    }
    let continuation = net.run(&prefix, config.max_length, false, 1.)?;
    println!("{}{}", config.prefix, codec.decode(&continuation));

    if let Some(path) = &config.model_out {
        net.save(path)
            .with_context(|| format!("cannot save the model to {}", path.display()))?;
    }

    if let Some(path) = &config.program_out {
        let program = net.compile()?;
        fs::write(path, serde_json::to_string(&program)?)
            .with_context(|| format!("cannot write the program to {}", path.display()))?;
        info!("wrote the compiled program to {}", path.display());
    }

    Ok(())
}
