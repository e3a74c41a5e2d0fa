//! AST node definitions (spec §3).

pub mod expr;
pub mod stmt;

pub use expr::{
    BehaviorExpr, BehaviorSegment, BinaryOpKind, BoolOpKind, CompareOpKind, Expr, Literal, Scene,
    UnaryOpKind,
};
pub use stmt::{ExceptHandler, LlmTemplate, Param, PromptSegment, Stmt};
