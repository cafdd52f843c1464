use log::warn;
use ndarray::Array2;
use rand::{Rng, rngs::StdRng};

use super::{Program, ProgramOp, SlotKind};
use crate::{
    Result, RnnErr,
    arch::activations::ActFn,
    codec::{CharCodec, SequenceCodec},
    decoding,
    training::generate_rng,
};

/// Runs a compiled `Program` forward, one token at a time.
///
/// Generation follows the exact rules of `RnnTimeStep::run`, without any of the training
/// machinery.
#[derive(Debug)]
pub struct Predictor<R: Rng = StdRng> {
    program: Program,
    values: Vec<Array2<f32>>,
    rng: R,
}

impl Predictor<StdRng> {
    /// Creates a new `Predictor`, sampling from a generator seeded with `seed` if present.
    ///
    /// # Returns
    /// An error if the program is malformed.
    pub fn new(program: Program, seed: Option<u64>) -> Result<Self> {
        Self::with_rng(program, generate_rng(seed))
    }

    pub fn from_json_str(json: &str, seed: Option<u64>) -> Result<Self> {
        Self::new(serde_json::from_str(json)?, seed)
    }
}

impl<R: Rng> Predictor<R> {
    pub fn with_rng(program: Program, rng: R) -> Result<Self> {
        let values = program
            .slots
            .iter()
            .map(|slot| match &slot.kind {
                SlotKind::Param { weights, .. } => {
                    Array2::from_shape_vec((slot.rows, slot.columns), weights.clone()).map_err(
                        |_| RnnErr::ShapeMismatch {
                            op: "param",
                            left: (slot.rows, slot.columns),
                            right: (1, weights.len()),
                        },
                    )
                }
                _ => Ok(Array2::zeros((slot.rows, slot.columns))),
            })
            .collect::<Result<_>>()?;

        validate(&program)?;

        Ok(Self {
            program,
            values,
            rng,
        })
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn data_formatter(&self) -> Option<&CharCodec> {
        self.program.data_formatter.as_ref()
    }

    /// Generates the continuation of `prefix`.
    ///
    /// # Arguments
    /// * `prefix` - The start of the sequence, an empty one is started with the end token.
    /// * `max_length` - The maximum length of prefix and continuation together.
    /// * `sample` - Whether to sample the next token instead of taking the most likely one.
    /// * `temperature` - Scales the output logits when sampling.
    ///
    /// A program with a single output rounds it to the nearest token, `sample` and
    /// `temperature` are ignored and no random number is drawn.
    ///
    /// # Returns
    /// The generated tokens without the prefix.
    pub fn run(
        &mut self,
        prefix: &[usize],
        max_length: usize,
        sample: bool,
        temperature: f32,
    ) -> Vec<usize> {
        self.reset();

        let start = [0];
        let seeded = if prefix.is_empty() { &start[..] } else { prefix };

        let mut output = Vec::new();
        for &token in seeded {
            output = self.step(token);
        }

        let mut continuation = Vec::new();
        while prefix.len() + continuation.len() < max_length {
            let next = decoding::decode(&output, sample, temperature, &mut self.rng);
            if next == 0 {
                break;
            }
            continuation.push(next);

            if prefix.len() + continuation.len() < max_length {
                output = self.step(next);
            }
        }

        continuation
    }

    /// Generates the continuation of `prefix` as text, through the program's codec.
    ///
    /// # Returns
    /// A `Configuration` error if the program carries no codec, `UnknownToken` if `prefix` has a
    /// character outside its vocabulary.
    pub fn run_text(
        &mut self,
        prefix: &str,
        max_length: usize,
        sample: bool,
        temperature: f32,
    ) -> Result<String> {
        let codec = self.program.data_formatter.clone().ok_or_else(|| {
            RnnErr::Configuration("the program was compiled without a data formatter".into())
        })?;

        let tokens = codec.encode(prefix)?;
        let continuation = self.run(&tokens, max_length, sample, temperature);
        Ok(codec.decode(&continuation))
    }

    /// Runs `sequence` from a zero hidden state.
    ///
    /// # Returns
    /// The output column of every position.
    pub fn forward_sequence(&mut self, sequence: &[usize]) -> Vec<Vec<f32>> {
        self.reset();
        sequence.iter().map(|&token| self.step(token)).collect()
    }

    fn reset(&mut self) {
        for (slot, value) in self.program.slots.iter().zip(&mut self.values) {
            if let SlotKind::PreviousHidden { .. } = slot.kind {
                value.fill(0.);
            }
        }
    }

    fn step(&mut self, token: usize) -> Vec<f32> {
        let values = &mut self.values;
        values[self.program.input].fill(token as f32);

        for op in &self.program.ops {
            let (value, product) = match *op {
                ProgramOp::Multiply {
                    left,
                    right,
                    product,
                } => (values[left].dot(&values[right]), product),
                ProgramOp::Add {
                    left,
                    right,
                    product,
                } => (&values[left] + &values[right], product),
                ProgramOp::Activation {
                    act_fn,
                    left,
                    product,
                } => {
                    let act_fn = ActFn::from(act_fn);
                    (values[left].mapv(|z| act_fn.f(z)), product)
                }
            };
            values[product] = value;
        }

        let output = values[self.program.output].iter().copied().collect();

        for &(from, into) in &self.program.recurrence {
            let hidden = values[from].clone();
            values[into].assign(&hidden);
        }

        output
    }
}

/// Checks every index and shape of `program` so that running it can't fail.
fn validate(program: &Program) -> Result<()> {
    let shape = |index: usize| {
        program
            .slots
            .get(index)
            .map(|slot| (slot.rows, slot.columns))
            .ok_or_else(|| RnnErr::Configuration(format!("slot {index} does not exist")))
    };
    let kind = |index: usize| shape(index).map(|_| &program.slots[index].kind);
    let mismatch = |op, left, right| RnnErr::ShapeMismatch { op, left, right };

    if kind(program.input)? != &SlotKind::Input {
        return Err(RnnErr::Configuration(format!(
            "slot {} is not an input slot",
            program.input
        )));
    }
    shape(program.output)?;

    for op in &program.ops {
        let (expected, product) = match *op {
            ProgramOp::Multiply {
                left,
                right,
                product,
            } => {
                let (l, r) = (shape(left)?, shape(right)?);
                if l.1 != r.0 {
                    return Err(mismatch("multiply", l, r));
                }
                ((l.0, r.1), product)
            }
            ProgramOp::Add {
                left,
                right,
                product,
            } => {
                let (l, r) = (shape(left)?, shape(right)?);
                if l != r {
                    return Err(mismatch("add", l, r));
                }
                (l, product)
            }
            ProgramOp::Activation { left, product, .. } => (shape(left)?, product),
        };

        if kind(product)? != &SlotKind::Intermediate {
            return Err(RnnErr::Configuration(format!(
                "slot {product} is written by an operation but is not an intermediate"
            )));
        }
        if shape(product)? != expected {
            return Err(mismatch("product", shape(product)?, expected));
        }
    }

    for &(from, into) in &program.recurrence {
        if !matches!(kind(into)?, SlotKind::PreviousHidden { .. }) {
            return Err(RnnErr::Configuration(format!(
                "slot {into} receives a hidden state but is not a previous hidden slot"
            )));
        }
        if shape(from)? != shape(into)? {
            return Err(mismatch("recurrence", shape(from)?, shape(into)?));
        }
    }

    if program.recurrence.is_empty() {
        warn!("the program carries no hidden state between time steps");
    }

    Ok(())
}
