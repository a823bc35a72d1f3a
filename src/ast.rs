use std::fmt;

#[derive(Debug, PartialEq, Clone)]
pub struct Prototype {
    pub name: String,
    pub args: Vec<String>,
}

impl Prototype {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Prototype {
            name: name.into(),
            args,
        }
    }

    /// The nameless, parameterless prototype a bare top-level expression is
    /// wrapped in.
    pub fn anonymous() -> Self {
        Prototype::new("", Vec::new())
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }
}

impl fmt::Display for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.args.join(" "))
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Literal(f64),
    Variable(String),
    Binary(char, Box<Expression>, Box<Expression>),
    Call(String, Vec<Expression>),
}

impl Expression {
    pub fn binary(op: char, lhs: Expression, rhs: Expression) -> Self {
        Expression::Binary(op, Box::new(lhs), Box::new(rhs))
    }
}

/// Binary nodes print fully parenthesized, so the tree shape is visible.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(value) => write!(f, "{}", value),
            Expression::Variable(name) => write!(f, "{}", name),
            Expression::Binary(op, lhs, rhs) => write!(f, "({} {} {})", lhs, op, rhs),
            Expression::Call(callee, args) => {
                write!(f, "{}(", callee)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Function {
    pub prototype: Prototype,
    pub body: Expression,
}

impl Function {
    /// Wraps a bare expression so it can be lowered like any definition.
    pub fn anonymous(body: Expression) -> Self {
        Function {
            prototype: Prototype::anonymous(),
            body,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum ASTNode {
    Extern(Prototype),
    Function(Function),
}

impl fmt::Display for ASTNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ASTNode::Extern(proto) => write!(f, "extern {}", proto),
            ASTNode::Function(func) if func.prototype.is_anonymous() => write!(f, "{}", func.body),
            ASTNode::Function(func) => write!(f, "def {} {}", func.prototype, func.body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_parenthesizes_binaries() {
        let expr = Expression::binary(
            '+',
            Expression::Literal(1.0),
            Expression::binary('*', Expression::Literal(2.0), Expression::Variable("x".into())),
        );
        assert_eq!(expr.to_string(), "(1 + (2 * x))");
    }

    #[test]
    fn display_nodes() {
        let call = Expression::Call(
            "f".into(),
            vec![Expression::Literal(1.5), Expression::Variable("y".into())],
        );
        let def = ASTNode::Function(Function {
            prototype: Prototype::new("g", vec!["y".into(), "z".into()]),
            body: call.clone(),
        });
        assert_eq!(def.to_string(), "def g(y z) f(1.5, y)");
        assert_eq!(ASTNode::Function(Function::anonymous(call)).to_string(), "f(1.5, y)");
        assert_eq!(
            ASTNode::Extern(Prototype::new("sin", vec!["x".into()])).to_string(),
            "extern sin(x)"
        );
    }
}
