use std::collections::HashMap;

use crate::ast::{ASTNode, Expression, Function, Prototype};
use crate::backend::{Backend, BinaryOp, VerifyError};

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum CodegenError {
    #[error("unknown variable name {0}")]
    UnknownVariable(String),
    #[error("invalid binary operator {0}")]
    UnknownOperator(char),
    #[error("unknown function referenced {0}")]
    UnknownFunction(String),
    #[error("incorrect number of arguments in call to {0}, expected {1} found {2}")]
    InvalidCall(String, usize, usize),
    #[error("function {0} cannot be redefined")]
    Redefinition(String),
    #[error("function {0} redeclared with a different number of arguments, expected {1} found {2}")]
    SignatureMismatch(String, usize, usize),
    #[error("failed to verify function: {0}")]
    InvalidFunction(#[from] VerifyError),
}

/// Lowers AST nodes into a backend.
///
/// Owns the two pieces of lowering state: the prototype table, which lives
/// as long as the module, and the symbol table of the function currently
/// being built.
pub struct Codegen<B: Backend> {
    pub backend: B,
    named_values: HashMap<String, B::Value>,
    prototypes: HashMap<String, Prototype>,
}

impl<B: Backend> Codegen<B> {
    pub fn new(backend: B) -> Self {
        Codegen {
            backend,
            named_values: HashMap::new(),
            prototypes: HashMap::new(),
        }
    }

    /// The last prototype recorded for `name` by an extern or definition.
    pub fn prototype(&self, name: &str) -> Option<&Prototype> {
        self.prototypes.get(name)
    }

    fn codegen_expr(&mut self, expr: &Expression) -> Result<B::Value, CodegenError> {
        match expr {
            Expression::Literal(value) => Ok(self.backend.const_number(*value)),
            Expression::Variable(name) => match self.named_values.get(name) {
                Some(var) => Ok(*var),
                None => Err(CodegenError::UnknownVariable(name.clone())),
            },
            Expression::Binary(op, left, right) => {
                let lhs = self.codegen_expr(left)?;
                let rhs = self.codegen_expr(right)?;

                let (op, name) = match op {
                    '+' => (BinaryOp::FAdd, "addtmp"),
                    '-' => (BinaryOp::FSub, "subtmp"),
                    '*' => (BinaryOp::FMul, "multmp"),
                    '<' => (BinaryOp::FCmpOlt, "cmptmp"),
                    _ => return Err(CodegenError::UnknownOperator(*op)),
                };
                Ok(self.backend.build_binary(op, lhs, rhs, name))
            }
            Expression::Call(callee, args) => match self.backend.get_function(callee) {
                Some(func) => {
                    let expected = match self.prototypes.get(callee) {
                        Some(proto) => proto.args.len(),
                        None => self.backend.param_count(func),
                    };
                    if expected != args.len() {
                        return Err(CodegenError::InvalidCall(
                            callee.clone(),
                            expected,
                            args.len(),
                        ));
                    }

                    let mut gened_args = Vec::with_capacity(args.len());

                    for arg in args {
                        gened_args.push(self.codegen_expr(arg)?);
                    }

                    Ok(self.backend.build_call(func, &gened_args, "calltmp"))
                }
                None => Err(CodegenError::UnknownFunction(callee.clone())),
            },
        }
    }

    /// Declares the prototype, or returns the existing function of that name
    /// when the arity agrees.
    pub fn compile_proto(&mut self, proto: &Prototype) -> Result<B::Function, CodegenError> {
        if let Some(existing) = self.backend.get_function(&proto.name) {
            let expected = self.backend.param_count(existing);
            if expected != proto.args.len() {
                return Err(CodegenError::SignatureMismatch(
                    proto.name.clone(),
                    expected,
                    proto.args.len(),
                ));
            }
            return Ok(existing);
        }

        let fn_val = self.backend.declare_function(&proto.name, &proto.args);
        if !proto.is_anonymous() {
            self.prototypes.insert(proto.name.clone(), proto.clone());
        }
        Ok(fn_val)
    }

    pub fn compile_fn(&mut self, function: &Function) -> Result<B::Function, CodegenError> {
        let Function {
            prototype: proto,
            body,
        } = function;

        let fn_val = match self.backend.get_function(&proto.name) {
            Some(existing) if self.backend.has_body(existing) => {
                return Err(CodegenError::Redefinition(proto.name.clone()));
            }
            Some(existing) => existing,
            None => self.compile_proto(proto)?,
        };

        let declared = self.backend.param_count(fn_val);
        if declared != proto.args.len() {
            return Err(CodegenError::SignatureMismatch(
                proto.name.clone(),
                declared,
                proto.args.len(),
            ));
        }

        self.backend.set_param_names(fn_val, &proto.args);
        self.backend.append_entry_block(fn_val);

        self.named_values.clear();
        self.named_values.reserve(proto.args.len());
        for (name, arg) in proto.args.iter().zip(self.backend.params(fn_val)) {
            self.named_values.insert(name.clone(), arg);
        }

        let ret = match self.codegen_expr(body) {
            Ok(ret) => ret,
            Err(err) => {
                self.erase_function(fn_val, &proto.name);
                return Err(err);
            }
        };

        self.backend.build_return(ret);

        if let Err(err) = self.backend.verify_function(fn_val) {
            self.erase_function(fn_val, &proto.name);
            return Err(err.into());
        }

        self.backend.optimize_function(fn_val);

        if !proto.is_anonymous() {
            self.prototypes.insert(proto.name.clone(), proto.clone());
        }
        Ok(fn_val)
    }

    /// Removes a function from the backend, forgetting its prototype once the
    /// backend no longer knows the name.
    pub fn erase_function(&mut self, function: B::Function, name: &str) {
        self.backend.erase_function(function);
        if self.backend.get_function(name).is_none() {
            self.prototypes.remove(name);
        }
    }

    pub fn compile_node(&mut self, node: &ASTNode) -> Result<B::Function, CodegenError> {
        match node {
            ASTNode::Function(func) => self.compile_fn(func),
            ASTNode::Extern(proto) => self.compile_proto(proto),
        }
    }

    pub fn codegen(&mut self, ast_nodes: &[ASTNode]) -> Result<(), CodegenError> {
        for node in ast_nodes {
            self.compile_node(node)?;
        }

        Ok(())
    }
}
