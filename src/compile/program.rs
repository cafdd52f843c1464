use std::collections::HashMap;

use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    Result, RnnErr,
    arch::{activations::ActFnSpec, recurrent::Role},
    codec::CharCodec,
    graph::OpKind,
    matrix::MatrixId,
    training::RnnTimeStep,
};

/// What a slot of a `Program` holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    /// A trained parameter with its weights baked in, row-major.
    Param { role: Role, weights: Vec<f32> },
    /// The hidden output of a layer in the previous time step, zero on the first one.
    PreviousHidden { layer: usize },
    /// The current token, written into every element.
    Input,
    /// The product of an operation.
    Intermediate,
}

/// A matrix-shaped storage location of a `Program`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub rows: usize,
    pub columns: usize,
    pub kind: SlotKind,
}

/// An operation over slot indices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramOp {
    Multiply {
        left: usize,
        right: usize,
        product: usize,
    },
    Add {
        left: usize,
        right: usize,
        product: usize,
    },
    Activation {
        act_fn: ActFnSpec,
        left: usize,
        product: usize,
    },
}

/// A single time step of a trained network, detached from the graph it was captured from.
///
/// Running the operations in order computes the output slot from the input and previous hidden
/// slots. Afterwards each `(from, into)` pair of the recurrence copies a hidden output into the
/// previous hidden slot read by the next time step. The codec of the network travels along so
/// the program can be fed text directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub slots: Vec<Slot>,
    pub ops: Vec<ProgramOp>,
    pub input: usize,
    pub output: usize,
    pub recurrence: Vec<(usize, usize)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_formatter: Option<CharCodec>,
}

/// Assigns slots to the matrices of the captured equation in order of first appearance.
struct SlotMap<'a, R: Rng> {
    net: &'a RnnTimeStep<R>,
    roles: HashMap<MatrixId, Role>,
    slots: Vec<Slot>,
    indices: HashMap<MatrixId, usize>,
}

impl<'a, R: Rng> SlotMap<'a, R> {
    fn new(net: &'a RnnTimeStep<R>) -> Self {
        Self {
            net,
            roles: net.model().all_matrices().iter().map(|&(r, id)| (id, r)).collect(),
            slots: Vec::new(),
            indices: HashMap::new(),
        }
    }

    /// Returns the slot of an operand, creating it on first sight.
    fn operand(&mut self, id: MatrixId) -> Result<usize> {
        if let Some(&index) = self.indices.get(&id) {
            return Ok(index);
        }

        let model = self.net.model();
        let kind = if let Some(&role) = self.roles.get(&id) {
            SlotKind::Param {
                role,
                weights: model.matrix(id)?.to_weights_vec(),
            }
        } else if let Some(layer) = model.initial_state().iter().position(|&s| s == id) {
            SlotKind::PreviousHidden { layer }
        } else {
            return Err(RnnErr::UnknownMatrix(id.index()));
        };

        self.insert(id, kind)
    }

    fn insert(&mut self, id: MatrixId, kind: SlotKind) -> Result<usize> {
        let (rows, columns) = self.net.model().matrix(id)?.shape();
        self.slots.push(Slot {
            rows,
            columns,
            kind,
        });
        self.indices.insert(id, self.slots.len() - 1);
        Ok(self.slots.len() - 1)
    }

    fn get(&self, id: MatrixId) -> Result<usize> {
        self.indices
            .get(&id)
            .copied()
            .ok_or(RnnErr::UnknownMatrix(id.index()))
    }
}

impl<R: Rng> RnnTimeStep<R> {
    /// Captures the first time step as a standalone `Program`.
    ///
    /// # Returns
    /// `NotReady` if no equation is bound.
    pub fn compile(&self) -> Result<Program> {
        let model = self.model();
        let equation = model.equations().first().ok_or(RnnErr::NotReady)?;
        let mut slots = SlotMap::new(self);
        let mut ops = Vec::with_capacity(equation.len());
        let mut input = None;

        for state in equation.states() {
            let op = match (state.kind, state.right) {
                (OpKind::Input, _) => {
                    input = Some(slots.insert(state.product, SlotKind::Input)?);
                    continue;
                }
                (OpKind::Multiply, Some(right)) => ProgramOp::Multiply {
                    left: slots.operand(state.left)?,
                    right: slots.operand(right)?,
                    product: slots.insert(state.product, SlotKind::Intermediate)?,
                },
                (OpKind::Add, Some(right)) => ProgramOp::Add {
                    left: slots.operand(state.left)?,
                    right: slots.operand(right)?,
                    product: slots.insert(state.product, SlotKind::Intermediate)?,
                },
                (OpKind::Activation(act_fn), None) => ProgramOp::Activation {
                    act_fn: act_fn.spec(),
                    left: slots.operand(state.left)?,
                    product: slots.insert(state.product, SlotKind::Intermediate)?,
                },
                (kind, _) => {
                    return Err(RnnErr::Configuration(format!(
                        "cannot compile a malformed {} operation",
                        kind.name()
                    )));
                }
            };
            ops.push(op);
        }

        let output = equation.output().ok_or(RnnErr::NotReady)?;
        let output = slots.get(output)?;
        let input = input.ok_or_else(|| RnnErr::Configuration("the equation has no input".into()))?;

        let hidden_outputs = model.equation_connections().first().ok_or(RnnErr::NotReady)?;
        let recurrence = hidden_outputs
            .iter()
            .zip(model.initial_state())
            .map(|(&from, &into)| -> Result<(usize, usize)> {
                Ok((slots.get(from)?, slots.get(into)?))
            })
            .collect::<Result<_>>()?;

        info!(
            "compiled a program with {} slots and {} operations",
            slots.slots.len(),
            ops.len()
        );

        Ok(Program {
            slots: slots.slots,
            ops,
            input,
            output,
            recurrence,
            data_formatter: self.data_formatter().cloned(),
        })
    }
}
