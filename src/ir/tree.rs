use serde::{Deserialize, Serialize};
use tinystr::TinyAsciiStr;

use super::types::{BasicType, ScalarKind, UnifiedType};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub enum Literal {
    Int(i32),
    Uint(u32),
    Bool(bool),
    Float(f32),
}

impl Literal {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Self::Int(_) => ScalarKind::Int,
            Self::Uint(_) => ScalarKind::Uint,
            Self::Bool(_) => ScalarKind::Bool,
            Self::Float(_) => ScalarKind::Float,
        }
    }

    /// `value` converted to a literal of `kind`.
    pub fn of_kind(kind: ScalarKind, value: i64) -> Self {
        match kind {
            ScalarKind::Int => Self::Int(value as i32),
            ScalarKind::Uint => Self::Uint(value as u32),
            ScalarKind::Bool => Self::Bool(value != 0),
            ScalarKind::Float => Self::Float(value as f32),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negate,
    Plus,
    LogicalNot,
    BitwiseNot,
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

impl UnaryOp {
    pub fn has_side_effect(self) -> bool {
        matches!(
            self,
            Self::PreIncrement | Self::PreDecrement | Self::PostIncrement | Self::PostDecrement
        )
    }

    pub fn is_postfix(self) -> bool {
        matches!(self, Self::PostIncrement | Self::PostDecrement)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Negate => "-",
            Self::Plus => "+",
            Self::LogicalNot => "!",
            Self::BitwiseNot => "~",
            Self::PreIncrement | Self::PostIncrement => "++",
            Self::PreDecrement | Self::PostDecrement => "--",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    ShiftLeft,
    ShiftRight,
    BitAnd,
    BitOr,
    BitXor,
    LogicalAnd,
    LogicalOr,
    LogicalXor,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Comma,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::ShiftLeft => "<<",
            Self::ShiftRight => ">>",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::LogicalAnd => "&&",
            Self::LogicalOr => "||",
            Self::LogicalXor => "^^",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::Comma => ",",
        }
    }

    /// GLSL binding strength, higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            Self::Multiply | Self::Divide | Self::Modulo => 13,
            Self::Add | Self::Subtract => 12,
            Self::ShiftLeft | Self::ShiftRight => 11,
            Self::Less | Self::LessEqual | Self::Greater | Self::GreaterEqual => 10,
            Self::Equal | Self::NotEqual => 9,
            Self::BitAnd => 8,
            Self::BitXor => 7,
            Self::BitOr => 6,
            Self::LogicalAnd => 5,
            Self::LogicalXor => 4,
            Self::LogicalOr => 3,
            Self::Comma => 0,
        }
    }

    /// Operators whose left operand is fully evaluated before the right one.
    pub fn is_sequenced(self) -> bool {
        matches!(self, Self::LogicalAnd | Self::LogicalOr | Self::Comma)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::Less
                | Self::LessEqual
                | Self::Greater
                | Self::GreaterEqual
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Self::LogicalAnd | Self::LogicalOr | Self::LogicalXor)
    }

    pub fn is_shift(self) -> bool {
        matches!(self, Self::ShiftLeft | Self::ShiftRight)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssignOp {
    Assign,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    ShiftLeft,
    ShiftRight,
    BitAnd,
    BitOr,
    BitXor,
}

impl AssignOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Assign => "=",
            Self::Add => "+=",
            Self::Subtract => "-=",
            Self::Multiply => "*=",
            Self::Divide => "/=",
            Self::Modulo => "%=",
            Self::ShiftLeft => "<<=",
            Self::ShiftRight => ">>=",
            Self::BitAnd => "&=",
            Self::BitOr => "|=",
            Self::BitXor => "^=",
        }
    }

    /// The binary operator a compound assignment applies.
    pub fn binary(self) -> Option<BinaryOp> {
        Some(match self {
            Self::Assign => return None,
            Self::Add => BinaryOp::Add,
            Self::Subtract => BinaryOp::Subtract,
            Self::Multiply => BinaryOp::Multiply,
            Self::Divide => BinaryOp::Divide,
            Self::Modulo => BinaryOp::Modulo,
            Self::ShiftLeft => BinaryOp::ShiftLeft,
            Self::ShiftRight => BinaryOp::ShiftRight,
            Self::BitAnd => BinaryOp::BitAnd,
            Self::BitOr => BinaryOp::BitOr,
            Self::BitXor => BinaryOp::BitXor,
        })
    }
}

/// Up to four component letters out of one of `xyzw`, `rgba` or `stpq`.
pub type SwizzleLetters = TinyAsciiStr<4>;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Var(String),
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Swizzle {
        base: Box<Expr>,
        letters: SwizzleLetters,
    },
    /// `base.length()`
    Length(Box<Expr>),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        accept: Box<Expr>,
        reject: Box<Expr>,
    },
    Paren(Box<Expr>),
    Call {
        callee: String,
        args: Vec<Expr>,
    },
    /// Vector constructor (`ivec2(3)`) or array initializer list
    /// (`int[2](a, b)`).
    Construct {
        ty: UnifiedType,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    pub fn int(value: i32) -> Self {
        Self::Literal(Literal::Int(value))
    }

    pub fn uint(value: u32) -> Self {
        Self::Literal(Literal::Uint(value))
    }

    pub fn float(value: f32) -> Self {
        Self::Literal(Literal::Float(value))
    }

    pub fn boolean(value: bool) -> Self {
        Self::Literal(Literal::Bool(value))
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, expr: Expr) -> Self {
        Self::Unary {
            op,
            expr: Box::new(expr),
        }
    }

    pub fn assign(op: AssignOp, target: Expr, value: Expr) -> Self {
        Self::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    pub fn ternary(cond: Expr, accept: Expr, reject: Expr) -> Self {
        Self::Ternary {
            cond: Box::new(cond),
            accept: Box::new(accept),
            reject: Box::new(reject),
        }
    }

    pub fn call(callee: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::Call {
            callee: callee.into(),
            args,
        }
    }

    pub fn construct(ty: impl Into<UnifiedType>, args: Vec<Expr>) -> Self {
        Self::Construct {
            ty: ty.into(),
            args,
        }
    }

    pub fn index(base: Expr, index: Expr) -> Self {
        Self::Index {
            base: Box::new(base),
            index: Box::new(index),
        }
    }

    pub fn paren(expr: Expr) -> Self {
        Self::Paren(Box::new(expr))
    }

    /// A literal of `ty`: the scalar itself, or a splat constructor.
    pub fn splat(ty: BasicType, value: Literal) -> Self {
        if ty.is_scalar() {
            Self::Literal(value)
        } else {
            Self::construct(ty, vec![Self::Literal(value)])
        }
    }

    /// The variable an lvalue ultimately designates.
    pub fn root_variable(&self) -> Option<&str> {
        match self {
            Self::Var(name) => Some(name),
            Self::Index { base, .. } | Self::Swizzle { base, .. } | Self::Paren(base) => {
                base.root_variable()
            }
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct VarDecl {
    pub ty: UnifiedType,
    pub name: String,
    pub init: Option<Expr>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SwitchCase {
    /// `None` is the `default` label.
    pub label: Option<Literal>,
    pub body: Vec<Stmt>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Stmt {
    Decl(VarDecl),
    Expr(Expr),
    Block(Vec<Stmt>),
    If {
        cond: Expr,
        accept: Box<Stmt>,
        reject: Option<Box<Stmt>>,
    },
    Switch {
        selector: Expr,
        cases: Vec<SwitchCase>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
}

impl Stmt {
    /// The body of a `while`, `do` or `for`; `None` for every other statement.
    pub fn loop_body_mut(&mut self) -> Option<&mut Box<Stmt>> {
        match self {
            Self::While { body, .. } | Self::DoWhile { body, .. } | Self::For { body, .. } => {
                Some(body)
            }
            _ => None,
        }
    }

    /// Wraps `stmts` into a single statement, synthesizing a block when
    /// there is more than one.
    pub fn from_stmts(mut stmts: Vec<Stmt>) -> Stmt {
        if stmts.len() == 1 {
            stmts.remove(0)
        } else {
            Stmt::Block(stmts)
        }
    }

    /// The statements of a loop or branch body, turning a single statement
    /// into a block.
    pub fn into_block(self) -> Vec<Stmt> {
        match self {
            Stmt::Block(stmts) => stmts,
            other => vec![other],
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamQualifier {
    In,
    Out,
    Inout,
}

impl ParamQualifier {
    pub fn is_write(self) -> bool {
        matches!(self, Self::Out | Self::Inout)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Param {
    pub qualifier: ParamQualifier,
    pub ty: BasicType,
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Prototype {
    pub name: String,
    /// `None` is `void`.
    pub ret: Option<BasicType>,
    pub params: Vec<Param>,
}

impl Prototype {
    pub fn param_types(&self) -> Vec<BasicType> {
        self.params.iter().map(|p| p.ty).collect()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub proto: Prototype,
    pub body: Vec<Stmt>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct InterfaceBlock {
    pub name: String,
    pub binding: u32,
    pub layout: String,
    pub qualifiers: super::types::Qualifiers,
    pub members: Vec<(UnifiedType, String)>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum ExternalDecl {
    Buffer(InterfaceBlock),
    Global(VarDecl),
    Prototype(Prototype),
    Function(FunctionDef),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TranslationUnit {
    pub version: u32,
    pub local_size: [u32; 3],
    pub decls: Vec<ExternalDecl>,
}

impl TranslationUnit {
    pub fn new(local_size: [u32; 3]) -> Self {
        Self {
            version: 450,
            local_size,
            decls: Vec::new(),
        }
    }

    pub fn main_index(&self) -> Option<usize> {
        self.decls.iter().position(
            |decl| matches!(decl, ExternalDecl::Function(f) if f.proto.name == "main"),
        )
    }

    pub fn main(&self) -> Option<&FunctionDef> {
        self.decls.iter().find_map(|decl| match decl {
            ExternalDecl::Function(f) if f.proto.name == "main" => Some(f),
            _ => None,
        })
    }

    /// Inserts `decls` right before `main`, or at the end if there is none.
    pub fn insert_before_main(&mut self, decls: impl IntoIterator<Item = ExternalDecl>) {
        let at = self.main_index().unwrap_or(self.decls.len());
        self.decls.splice(at..at, decls);
    }

    pub fn functions_mut(&mut self) -> impl Iterator<Item = &mut FunctionDef> {
        self.decls.iter_mut().filter_map(|decl| match decl {
            ExternalDecl::Function(f) => Some(f),
            _ => None,
        })
    }
}
