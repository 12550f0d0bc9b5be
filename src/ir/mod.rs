mod buffer;
pub mod iter;
pub mod printer;
mod tree;
mod types;
pub mod typing;

pub use buffer::Buffer;
pub use tree::{
    AssignOp, BinaryOp, Expr, ExternalDecl, FunctionDef, InterfaceBlock, Literal, Param,
    ParamQualifier, Prototype, Stmt, SwitchCase, SwizzleLetters, TranslationUnit, UnaryOp,
    VarDecl,
};
pub use types::{BasicType, Qualifiers, ScalarKind, UnifiedType};
