//! IR emission capability.
//!
//! The lowering engine only ever talks to a [`Backend`]; [`TextModule`] is
//! the concrete implementation shipped with the crate.

mod opt;
mod text;

pub use opt::Opts;
pub use text::{FunctionId, Instruction, TextModule, Value};

/// Operations on two numeric values. Comparisons produce a numeric 0.0 or 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    FAdd,
    FSub,
    FMul,
    /// Ordered less than: false when either side is NaN.
    FCmpOlt,
}

impl BinaryOp {
    pub fn is_commutative(self) -> bool {
        matches!(self, BinaryOp::FAdd | BinaryOp::FMul)
    }

    /// Evaluates the operation on two constants.
    pub fn eval(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinaryOp::FAdd => lhs + rhs,
            BinaryOp::FSub => lhs - rhs,
            BinaryOp::FMul => lhs * rhs,
            BinaryOp::FCmpOlt => {
                if lhs < rhs {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum VerifyError {
    #[error("function {0} has no body")]
    MissingBody(String),
    #[error("function {0} does not end in a return")]
    MissingTerminator(String),
    #[error("function {0} has instructions after its return")]
    TrailingInstruction(String),
    #[error("function {0} uses %{1} before it is defined")]
    UndefinedValue(String, String),
    #[error("function {0} calls a function that is not in the module")]
    UnknownCallee(String),
    #[error("function {0} calls {1} with {3} arguments, expected {2}")]
    CallArity(String, String, usize, usize),
}

/// Everything the lowering engine needs from an IR emitter. All functions
/// take numeric parameters and return one numeric value.
pub trait Backend {
    type Value: Copy;
    type Function: Copy + PartialEq;

    fn const_number(&mut self, value: f64) -> Self::Value;

    fn build_binary(
        &mut self,
        op: BinaryOp,
        lhs: Self::Value,
        rhs: Self::Value,
        name: &str,
    ) -> Self::Value;

    fn build_call(
        &mut self,
        callee: Self::Function,
        args: &[Self::Value],
        name: &str,
    ) -> Self::Value;

    fn build_return(&mut self, value: Self::Value);

    /// Looks up a named function. Unnamed functions are never found.
    fn get_function(&self, name: &str) -> Option<Self::Function>;

    fn declare_function(&mut self, name: &str, params: &[String]) -> Self::Function;

    fn param_count(&self, function: Self::Function) -> usize;

    fn params(&self, function: Self::Function) -> Vec<Self::Value>;

    fn set_param_names(&mut self, function: Self::Function, names: &[String]);

    fn has_body(&self, function: Self::Function) -> bool;

    /// Gives the function an empty entry block and positions the builder
    /// at its end.
    fn append_entry_block(&mut self, function: Self::Function);

    fn verify_function(&self, function: Self::Function) -> Result<(), VerifyError>;

    fn optimize_function(&mut self, function: Self::Function);

    fn erase_function(&mut self, function: Self::Function);

    fn print_function(&self, function: Self::Function) -> String;

    fn print_module(&self) -> String;
}
