//! Where action indices come from.
//!
//! A [`DecisionSource`] is asked for an index each step. Implementations provided here:
//! - [`RemotePolicy`]: posts the state to a policy server, falls back to 0 on any failure
//! - [`Operator`]: a human at the terminal
//! - [`FirstAction`]: always 0
//! - [`from_fn`]: any closure
//!
//! The returned index is not trusted: the environment validates it against the action list.

use crate::observation::{ActionDescriptor, Observation};
use crate::state::RawState;

mod interactive;
mod remote;

pub use interactive::{parse_operator_input, Operator, OperatorCommand};
pub use remote::{parse_policy_answer, RemotePolicy};

/// Everything a decision source may look at.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext<'a> {
    pub observation: &'a Observation,
    pub actions: &'a [ActionDescriptor],
    pub state: &'a RawState,
    /// Seat of the player being decided for.
    pub seat: usize,
}

/// The operator asked to quit. Ends the whole process, not just the episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorAbort;

impl std::fmt::Display for OperatorAbort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "operator requested to quit")
    }
}

impl std::error::Error for OperatorAbort {}

/// Produces an action index for the current step.
pub trait DecisionSource {
    /// Pick an index into `ctx.actions`.
    ///
    /// # Error
    /// Only [`OperatorAbort`]. Every other failure must be absorbed by the implementation.
    fn choose(&mut self, ctx: &DecisionContext<'_>) -> Result<i64, OperatorAbort>;
}

impl<D: DecisionSource + ?Sized> DecisionSource for Box<D> {
    fn choose(&mut self, ctx: &DecisionContext<'_>) -> Result<i64, OperatorAbort> {
        (**self).choose(ctx)
    }
}

impl<D: DecisionSource + ?Sized> DecisionSource for &mut D {
    fn choose(&mut self, ctx: &DecisionContext<'_>) -> Result<i64, OperatorAbort> {
        (**self).choose(ctx)
    }
}

/// Always picks the first action.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstAction;

impl DecisionSource for FirstAction {
    fn choose(&mut self, _ctx: &DecisionContext<'_>) -> Result<i64, OperatorAbort> {
        Ok(0)
    }
}

/// Decision source built from a closure, see [`from_fn`].
#[derive(Debug, Clone)]
pub struct FromFn<F>(F);

/// Wrap `f` as a [`DecisionSource`].
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: FnMut(&DecisionContext<'_>) -> i64,
{
    FromFn(f)
}

impl<F> DecisionSource for FromFn<F>
where
    F: FnMut(&DecisionContext<'_>) -> i64,
{
    fn choose(&mut self, ctx: &DecisionContext<'_>) -> Result<i64, OperatorAbort> {
        Ok((self.0)(ctx))
    }
}

/// One line per action: `  [i] type: card (cost) [instant]`.
pub fn describe_actions(actions: &[ActionDescriptor]) -> String {
    actions
        .iter()
        .map(|action| format!("  [{}] {action}", action.index))
        .collect::<Vec<_>>()
        .join("\n")
}
