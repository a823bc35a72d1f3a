//! Textual SSA module in the style of LLVM assembly.

use std::collections::HashSet;
use std::fmt::Write;

use super::opt::{self, Opts};
use super::{Backend, BinaryOp, VerifyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(usize);

/// An operand: a double constant or a register of the function being built.
/// Registers `0..params` are the parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Const(f64),
    Reg(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Binary {
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
        dst: usize,
    },
    /// Widens an `i1` comparison result to `0.0` or `1.0`.
    UiToFp { src: Value, dst: usize },
    Call {
        callee: FunctionId,
        args: Vec<Value>,
        dst: usize,
    },
    Ret(Value),
}

impl Instruction {
    pub fn dst(&self) -> Option<usize> {
        match self {
            Instruction::Binary { dst, .. }
            | Instruction::UiToFp { dst, .. }
            | Instruction::Call { dst, .. } => Some(*dst),
            Instruction::Ret(_) => None,
        }
    }

    pub fn operands(&self) -> Vec<Value> {
        match self {
            Instruction::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            Instruction::UiToFp { src, .. } => vec![*src],
            Instruction::Call { args, .. } => args.clone(),
            Instruction::Ret(value) => vec![*value],
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut Value> {
        match self {
            Instruction::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            Instruction::UiToFp { src, .. } => vec![src],
            Instruction::Call { args, .. } => args.iter_mut().collect(),
            Instruction::Ret(value) => vec![value],
        }
    }
}

#[derive(Debug)]
struct FunctionData {
    id: FunctionId,
    name: String,
    params: usize,
    /// Register names, indexed by register number.
    names: Vec<String>,
    body: Option<Vec<Instruction>>,
}

impl FunctionData {
    fn unique_name(&self, base: &str) -> String {
        if !self.names.iter().any(|n| n == base) {
            return base.to_string();
        }
        (1..)
            .map(|i| format!("{}{}", base, i))
            .find(|candidate| !self.names.iter().any(|n| n == candidate))
            .unwrap_or_else(|| base.to_string())
    }

    fn push(&mut self, name: &str, make: impl FnOnce(usize) -> Instruction) -> Value {
        let dst = self.names.len();
        let unique = self.unique_name(name);
        self.names.push(unique);
        let inst = make(dst);
        self.body.get_or_insert_with(Vec::new).push(inst);
        Value::Reg(dst)
    }
}

/// Formats a double the way LLVM assembly does: `%.6e` with a two digit
/// exponent when that round-trips, otherwise the raw bit pattern in hex.
pub fn format_double(value: f64) -> String {
    let sci = format!("{:.6e}", value);
    if let (Ok(back), Some((mantissa, exp))) = (sci.parse::<f64>(), sci.split_once('e')) {
        if let Ok(exp) = exp.parse::<i32>() {
            if back.to_bits() == value.to_bits() {
                let sign = if exp < 0 { '-' } else { '+' };
                return format!("{}e{}{:02}", mantissa, sign, exp.abs());
            }
        }
    }
    format!("0x{:016X}", value.to_bits())
}

/// A module of functions plus a builder positioned inside at most one of them.
#[derive(Debug)]
pub struct TextModule {
    name: String,
    functions: Vec<FunctionData>,
    next_id: usize,
    insert_point: Option<FunctionId>,
    opts: Opts,
}

impl TextModule {
    pub fn new(name: impl Into<String>, opts: Opts) -> Self {
        TextModule {
            name: name.into(),
            functions: Vec::new(),
            next_id: 0,
            insert_point: None,
            opts,
        }
    }

    pub fn function_names(&self) -> Vec<&str> {
        self.functions.iter().map(|f| f.name.as_str()).collect()
    }

    /// The instructions of a defined function.
    pub fn body(&self, function: FunctionId) -> Option<&[Instruction]> {
        self.function(function).and_then(|f| f.body.as_deref())
    }

    fn function(&self, id: FunctionId) -> Option<&FunctionData> {
        self.functions.iter().find(|f| f.id == id)
    }

    fn function_mut(&mut self, id: FunctionId) -> Option<&mut FunctionData> {
        self.functions.iter_mut().find(|f| f.id == id)
    }

    fn build(&mut self, name: &str, make: impl FnOnce(usize) -> Instruction) -> Value {
        let current = self.insert_point;
        match current.and_then(|id| self.function_mut(id)) {
            Some(func) => func.push(name, make),
            None => {
                debug_assert!(false, "building {} without an insertion point", name);
                Value::Const(f64::NAN)
            }
        }
    }

    fn global_name(&self, func: &FunctionData) -> String {
        if func.name.is_empty() {
            let slot = self
                .functions
                .iter()
                .filter(|f| f.name.is_empty())
                .position(|f| f.id == func.id)
                .unwrap_or(0);
            format!("@{}", slot)
        } else {
            format!("@{}", func.name)
        }
    }

    fn callee_name(&self, id: FunctionId) -> String {
        match self.function(id) {
            Some(func) => self.global_name(func),
            None => "@<erased>".to_string(),
        }
    }

    fn is_called_elsewhere(&self, id: FunctionId) -> bool {
        self.functions.iter().filter(|f| f.id != id).any(|f| {
            f.body.iter().flatten().any(|inst| {
                matches!(inst, Instruction::Call { callee, .. } if *callee == id)
            })
        })
    }

    fn render_value(func: &FunctionData, value: Value) -> String {
        match value {
            Value::Const(c) => format_double(c),
            Value::Reg(r) => format!(
                "%{}",
                func.names.get(r).map(String::as_str).unwrap_or("<undef>")
            ),
        }
    }

    fn render_instruction(&self, func: &FunctionData, inst: &Instruction) -> String {
        let val = |v: Value| Self::render_value(func, v);
        let reg = |r: usize| Self::render_value(func, Value::Reg(r));
        match inst {
            Instruction::Binary { op, lhs, rhs, dst } => {
                let opcode = match op {
                    BinaryOp::FAdd => "fadd",
                    BinaryOp::FSub => "fsub",
                    BinaryOp::FMul => "fmul",
                    BinaryOp::FCmpOlt => "fcmp olt",
                };
                format!("{} = {} double {}, {}", reg(*dst), opcode, val(*lhs), val(*rhs))
            }
            Instruction::UiToFp { src, dst } => {
                format!("{} = uitofp i1 {} to double", reg(*dst), val(*src))
            }
            Instruction::Call { callee, args, dst } => {
                let args = args
                    .iter()
                    .map(|a| format!("double {}", val(*a)))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{} = call double {}({})", reg(*dst), self.callee_name(*callee), args)
            }
            Instruction::Ret(value) => format!("ret double {}", val(*value)),
        }
    }

    fn render_function(&self, func: &FunctionData) -> String {
        let mut out = String::new();
        match &func.body {
            None => {
                let params = vec!["double"; func.params].join(", ");
                let _ = writeln!(out, "declare double {}({})", self.global_name(func), params);
            }
            Some(body) => {
                let params = (0..func.params)
                    .map(|r| format!("double {}", Self::render_value(func, Value::Reg(r))))
                    .collect::<Vec<_>>()
                    .join(", ");
                let _ = writeln!(out, "define double {}({}) {{", self.global_name(func), params);
                let _ = writeln!(out, "entry:");
                for inst in body {
                    let _ = writeln!(out, "  {}", self.render_instruction(func, inst));
                }
                let _ = writeln!(out, "}}");
            }
        }
        out
    }
}

impl Backend for TextModule {
    type Value = Value;
    type Function = FunctionId;

    fn const_number(&mut self, value: f64) -> Value {
        Value::Const(value)
    }

    fn build_binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value, name: &str) -> Value {
        if let (Value::Const(l), Value::Const(r)) = (lhs, rhs) {
            return Value::Const(op.eval(l, r));
        }
        let result = self.build(name, |dst| Instruction::Binary { op, lhs, rhs, dst });
        if op == BinaryOp::FCmpOlt {
            self.build("booltmp", |dst| Instruction::UiToFp { src: result, dst })
        } else {
            result
        }
    }

    fn build_call(&mut self, callee: FunctionId, args: &[Value], name: &str) -> Value {
        let args = args.to_vec();
        self.build(name, |dst| Instruction::Call { callee, args, dst })
    }

    fn build_return(&mut self, value: Value) {
        let current = self.insert_point;
        match current.and_then(|id| self.function_mut(id)) {
            Some(func) => func.body.get_or_insert_with(Vec::new).push(Instruction::Ret(value)),
            None => debug_assert!(false, "building ret without an insertion point"),
        }
    }

    fn get_function(&self, name: &str) -> Option<FunctionId> {
        if name.is_empty() {
            return None;
        }
        self.functions.iter().find(|f| f.name == name).map(|f| f.id)
    }

    fn declare_function(&mut self, name: &str, params: &[String]) -> FunctionId {
        let id = FunctionId(self.next_id);
        self.next_id += 1;
        let mut func = FunctionData {
            id,
            name: name.to_string(),
            params: params.len(),
            names: Vec::with_capacity(params.len()),
            body: None,
        };
        for param in params {
            let unique = func.unique_name(param);
            func.names.push(unique);
        }
        self.functions.push(func);
        id
    }

    fn param_count(&self, function: FunctionId) -> usize {
        self.function(function).map_or(0, |f| f.params)
    }

    fn params(&self, function: FunctionId) -> Vec<Value> {
        (0..self.param_count(function)).map(Value::Reg).collect()
    }

    fn set_param_names(&mut self, function: FunctionId, names: &[String]) {
        if let Some(func) = self.function_mut(function) {
            let mut seen = HashSet::new();
            for (i, name) in names.iter().enumerate().take(func.params) {
                let mut unique = name.clone();
                let mut n = 0;
                while !seen.insert(unique.clone()) {
                    n += 1;
                    unique = format!("{}{}", name, n);
                }
                func.names[i] = unique;
            }
        }
    }

    fn has_body(&self, function: FunctionId) -> bool {
        self.function(function).map_or(false, |f| f.body.is_some())
    }

    fn append_entry_block(&mut self, function: FunctionId) {
        if let Some(func) = self.function_mut(function) {
            func.body = Some(Vec::new());
            self.insert_point = Some(function);
        }
    }

    fn verify_function(&self, function: FunctionId) -> Result<(), VerifyError> {
        let func = match self.function(function) {
            Some(func) => func,
            None => return Err(VerifyError::MissingBody("@<erased>".to_string())),
        };
        let name = self.global_name(func);
        let body = func
            .body
            .as_ref()
            .ok_or_else(|| VerifyError::MissingBody(name.clone()))?;

        let mut defined: HashSet<usize> = (0..func.params).collect();
        for (i, inst) in body.iter().enumerate() {
            if let Instruction::Ret(_) = inst {
                if i + 1 != body.len() {
                    return Err(VerifyError::TrailingInstruction(name));
                }
            }
            for operand in inst.operands() {
                if let Value::Reg(r) = operand {
                    if !defined.contains(&r) {
                        let reg = func.names.get(r).cloned().unwrap_or_else(|| r.to_string());
                        return Err(VerifyError::UndefinedValue(name, reg));
                    }
                }
            }
            if let Instruction::Call { callee, args, .. } = inst {
                let target = self
                    .function(*callee)
                    .ok_or_else(|| VerifyError::UnknownCallee(name.clone()))?;
                if target.params != args.len() {
                    return Err(VerifyError::CallArity(
                        name,
                        self.global_name(target),
                        target.params,
                        args.len(),
                    ));
                }
            }
            if let Some(dst) = inst.dst() {
                defined.insert(dst);
            }
        }

        match body.last() {
            Some(Instruction::Ret(_)) => Ok(()),
            _ => Err(VerifyError::MissingTerminator(name)),
        }
    }

    fn optimize_function(&mut self, function: FunctionId) {
        let opts = self.opts;
        if let Some(body) = self.function_mut(function).and_then(|f| f.body.as_mut()) {
            opt::optimize_function(body, &opts);
        }
    }

    /// Removes the function from the module. A function that other bodies
    /// still call is reduced to a bare declaration instead.
    fn erase_function(&mut self, function: FunctionId) {
        if self.insert_point == Some(function) {
            self.insert_point = None;
        }
        if self.is_called_elsewhere(function) {
            if let Some(func) = self.function_mut(function) {
                func.body = None;
                func.names.truncate(func.params);
            }
        } else {
            self.functions.retain(|f| f.id != function);
        }
    }

    fn print_function(&self, function: FunctionId) -> String {
        self.function(function)
            .map(|func| self.render_function(func))
            .unwrap_or_default()
    }

    fn print_module(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "; ModuleID = '{}'", self.name);
        let _ = writeln!(out, "source_filename = \"{}\"", self.name);
        for func in &self.functions {
            let _ = writeln!(out);
            out.push_str(&self.render_function(func));
        }
        out
    }
}
