//! Optimization Pipeline
//!
//! Machine-independent passes over a single function body, repeated until
//! none of the enabled passes changes anything.

use std::collections::{HashMap, HashSet};

use super::text::{Instruction, Value};
use super::BinaryOp;

/// Which passes run on each completed function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opts {
    pub fold: bool,
    pub cse: bool,
    pub dce: bool,
}

impl Opts {
    pub fn none() -> Self {
        Opts {
            fold: false,
            cse: false,
            dce: false,
        }
    }

    pub fn all() -> Self {
        Opts {
            fold: true,
            cse: true,
            dce: true,
        }
    }

    /// `0` disables every pass, anything higher enables all of them.
    pub fn from_level(level: u8) -> Self {
        if level == 0 {
            Opts::none()
        } else {
            Opts::all()
        }
    }

    pub fn any_passes_enabled(&self) -> bool {
        self.fold || self.cse || self.dce
    }
}

impl Default for Opts {
    fn default() -> Self {
        Opts::all()
    }
}

pub fn optimize_function(body: &mut Vec<Instruction>, opts: &Opts) {
    if !opts.any_passes_enabled() || body.is_empty() {
        return;
    }

    loop {
        let mut changed = false;

        if opts.fold {
            changed |= fold_constants(body);
        }
        if opts.cse {
            changed |= eliminate_common_subexpressions(body);
        }
        if opts.dce {
            changed |= eliminate_dead_code(body);
        }

        if !changed {
            break;
        }
    }
}

fn substitute(inst: &mut Instruction, replacements: &HashMap<usize, Value>) {
    for operand in inst.operands_mut() {
        if let Value::Reg(r) = *operand {
            if let Some(value) = replacements.get(&r) {
                *operand = *value;
            }
        }
    }
}

/// The value an instruction can be replaced with, if it is known statically.
fn simplify(inst: &Instruction) -> Option<(usize, Value)> {
    match *inst {
        Instruction::Binary {
            op,
            lhs: Value::Const(l),
            rhs: Value::Const(r),
            dst,
        } => Some((dst, Value::Const(op.eval(l, r)))),
        Instruction::Binary {
            op: BinaryOp::FMul,
            lhs,
            rhs,
            dst,
        } => match (lhs, rhs) {
            (Value::Const(one), other) | (other, Value::Const(one)) if one == 1.0 => {
                Some((dst, other))
            }
            _ => None,
        },
        // A folded comparison is already 0.0 or 1.0.
        Instruction::UiToFp {
            src: Value::Const(c),
            dst,
        } => Some((dst, Value::Const(c))),
        _ => None,
    }
}

fn fold_constants(body: &mut Vec<Instruction>) -> bool {
    let mut replacements = HashMap::new();
    let mut kept = Vec::with_capacity(body.len());

    for mut inst in body.drain(..) {
        substitute(&mut inst, &replacements);
        match simplify(&inst) {
            Some((dst, value)) => {
                replacements.insert(dst, value);
            }
            None => kept.push(inst),
        }
    }

    *body = kept;
    !replacements.is_empty()
}

type OperandKey = (bool, u64);

#[derive(Debug, PartialEq, Eq, Hash)]
enum ExprKey {
    Binary(BinaryOp, OperandKey, OperandKey),
    UiToFp(OperandKey),
}

fn operand_key(value: Value) -> OperandKey {
    match value {
        Value::Const(c) => (false, c.to_bits()),
        Value::Reg(r) => (true, r as u64),
    }
}

fn expr_key(inst: &Instruction) -> Option<ExprKey> {
    match inst {
        Instruction::Binary { op, lhs, rhs, .. } => {
            let (mut l, mut r) = (operand_key(*lhs), operand_key(*rhs));
            if op.is_commutative() && r < l {
                std::mem::swap(&mut l, &mut r);
            }
            Some(ExprKey::Binary(*op, l, r))
        }
        Instruction::UiToFp { src, .. } => Some(ExprKey::UiToFp(operand_key(*src))),
        // Calls may reach externs with side effects.
        _ => None,
    }
}

fn eliminate_common_subexpressions(body: &mut Vec<Instruction>) -> bool {
    let mut available: HashMap<ExprKey, usize> = HashMap::new();
    let mut replacements = HashMap::new();
    let mut kept = Vec::with_capacity(body.len());

    for mut inst in body.drain(..) {
        substitute(&mut inst, &replacements);
        if let (Some(key), Some(dst)) = (expr_key(&inst), inst.dst()) {
            if let Some(&prev) = available.get(&key) {
                replacements.insert(dst, Value::Reg(prev));
                continue;
            }
            available.insert(key, dst);
        }
        kept.push(inst);
    }

    *body = kept;
    !replacements.is_empty()
}

fn eliminate_dead_code(body: &mut Vec<Instruction>) -> bool {
    let used: HashSet<usize> = body
        .iter()
        .flat_map(Instruction::operands)
        .filter_map(|value| match value {
            Value::Reg(r) => Some(r),
            Value::Const(_) => None,
        })
        .collect();

    let before = body.len();
    body.retain(|inst| match inst {
        Instruction::Binary { dst, .. } | Instruction::UiToFp { dst, .. } => used.contains(dst),
        _ => true,
    });
    body.len() != before
}
