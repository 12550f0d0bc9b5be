use std::num::NonZeroU32;

use serde::Deserialize;

use super::{context::GenerationMode, expression::assign_ops, generateir::FunctionGenCtx};
use crate::{
    error::GenError,
    ir::{
        BasicType, BinaryOp, Expr, Literal, ScalarKind, Stmt, SwitchCase, UnaryOp, UnifiedType,
        VarDecl,
    },
    randomext::RandomnessExt,
};

trait StatementGenerator {
    /// `None` when the statement cannot be produced in the current scope.
    fn generate(ctx: &mut FunctionGenCtx) -> Result<Option<Stmt>, GenError>;
}

#[derive(Clone, Copy, Debug, Deserialize, Hash, Eq, PartialEq)]
pub enum StatementKind {
    Declaration,
    Assignment,
    Expression,
    If,
    Switch,
    While,
    DoWhile,
    For,
}

impl StatementKind {
    pub const COUNT: usize = 8;
    pub const ALL: [Self; Self::COUNT] = [
        Self::Declaration,
        Self::Assignment,
        Self::Expression,
        Self::If,
        Self::Switch,
        Self::While,
        Self::DoWhile,
        Self::For,
    ];

    pub fn generate(self, ctx: &mut FunctionGenCtx) -> Result<Option<Stmt>, GenError> {
        match self {
            Self::Declaration => DeclarationGenerator::generate(ctx),
            Self::Assignment => AssignmentGenerator::generate(ctx),
            Self::Expression => ExpressionStmtGenerator::generate(ctx),
            Self::If => IfGenerator::generate(ctx),
            Self::Switch => SwitchGenerator::generate(ctx),
            Self::While => WhileGenerator::generate(ctx),
            Self::DoWhile => DoWhileGenerator::generate(ctx),
            Self::For => ForGenerator::generate(ctx),
        }
    }

    /// Kinds that open a nested scope, only drawn below the scope budget.
    pub fn may_recurse(self) -> bool {
        matches!(
            self,
            Self::If | Self::Switch | Self::While | Self::DoWhile | Self::For
        )
    }
}

struct DeclarationGenerator;
impl StatementGenerator for DeclarationGenerator {
    fn generate(ctx: &mut FunctionGenCtx) -> Result<Option<Stmt>, GenError> {
        let basic = ctx.strategy.basic_type(ctx.rng);
        let max_len = ctx.config.max_array_length;
        let array_len = if max_len > 0 && ctx.rng.probability(0.2) {
            NonZeroU32::new(ctx.rng.long_between(1, max_len as i64 + 1) as u32)
        } else {
            None
        };
        let (ty, init) = match array_len {
            Some(len) => {
                let ty = UnifiedType::array(basic, len);
                let elements = (0..len.get())
                    .map(|_| ctx.generate_expr(basic))
                    .collect::<Result<Vec<_>, _>>()?;
                (ty, Expr::construct(ty, elements))
            }
            None => (UnifiedType::basic(basic), ctx.generate_expr(basic)?),
        };

        // the initializer is generated first: it still sees the outer name
        let shadowable = ctx.state.scope.shadowable();
        let name = if !shadowable.is_empty() && ctx.rng.probability(ctx.config.shadowing_probability)
        {
            let id = *ctx.rng.choose(&shadowable);
            ctx.state.counters.shadowed_offset += 1;
            ctx.state.scope.entry(id).name.clone()
        } else {
            ctx.state.next_variable_name()
        };
        ctx.state.scope.declare(&name, ty, true)?;
        Ok(Some(Stmt::Decl(VarDecl {
            ty,
            name,
            init: Some(init),
        })))
    }
}

struct AssignmentGenerator;
impl StatementGenerator for AssignmentGenerator {
    fn generate(ctx: &mut FunctionGenCtx) -> Result<Option<Stmt>, GenError> {
        let writable = ctx.state.scope.entries_writable();
        if writable.is_empty() {
            return Ok(None);
        }
        let id = *ctx.rng.choose(&writable);
        let element = ctx.state.scope.entry(id).ty.element();
        let ty = if element.is_vector() && ctx.rng.boolean() {
            element.with_size(ctx.rng.int_between(1, element.size as i32 + 1) as u8)
        } else {
            element
        };
        let op = *ctx.rng.choose(assign_ops(ty));
        let target = ctx.write_variable(ty)?;
        let value = if op.binary().is_some_and(BinaryOp::is_shift) {
            let kind = *ctx.rng.choose(&[ScalarKind::Int, ScalarKind::Uint]);
            ctx.with_mode(GenerationMode::SHIFT_OPERAND, true, |ctx| {
                ctx.generate_expr(BasicType::scalar(kind))
            })?
        } else {
            ctx.generate_expr(ty)?
        };
        Ok(Some(Stmt::Expr(Expr::assign(op, target, value))))
    }
}

struct ExpressionStmtGenerator;
impl StatementGenerator for ExpressionStmtGenerator {
    fn generate(ctx: &mut FunctionGenCtx) -> Result<Option<Stmt>, GenError> {
        let ty = ctx.strategy.basic_type(ctx.rng);
        Ok(Some(Stmt::Expr(ctx.generate_expr(ty)?)))
    }
}

struct IfGenerator;
impl StatementGenerator for IfGenerator {
    fn generate(ctx: &mut FunctionGenCtx) -> Result<Option<Stmt>, GenError> {
        let cond = ctx.generate_expr(BasicType::BOOL)?;
        let accept = Stmt::Block(ctx.generate_scope(ctx.config.scope_statements)?);
        let reject = if ctx.rng.boolean() {
            Some(Box::new(Stmt::Block(
                ctx.generate_scope(ctx.config.scope_statements)?,
            )))
        } else {
            None
        };
        Ok(Some(Stmt::If {
            cond,
            accept: Box::new(accept),
            reject,
        }))
    }
}

struct SwitchGenerator;
impl SwitchGenerator {
    fn case_body(ctx: &mut FunctionGenCtx) -> Result<Vec<Stmt>, GenError> {
        let body = ctx.generate_scope(ctx.config.loop_statements)?;
        Ok(vec![Stmt::Block(body), Stmt::Break])
    }
}

impl StatementGenerator for SwitchGenerator {
    fn generate(ctx: &mut FunctionGenCtx) -> Result<Option<Stmt>, GenError> {
        let kind = *ctx.rng.choose(&[ScalarKind::Int, ScalarKind::Uint]);
        let selector = ctx.generate_expr(BasicType::scalar(kind))?;
        let count = ctx.config.switch_cases.choose(ctx.rng);

        let mut labels: Vec<Literal> = Vec::new();
        for _ in 0..count * 4 {
            if labels.len() == count as usize {
                break;
            }
            let label = ctx.with_mode(GenerationMode::CONSTANT, true, |ctx| {
                ctx.scalar_literal(kind)
            });
            if !labels.contains(&label) {
                labels.push(label);
            }
        }

        let mut cases = Vec::with_capacity(labels.len() + 1);
        for label in labels {
            cases.push(SwitchCase {
                label: Some(label),
                body: Self::case_body(ctx)?,
            });
        }
        cases.push(SwitchCase {
            label: None,
            body: Self::case_body(ctx)?,
        });
        Ok(Some(Stmt::Switch { selector, cases }))
    }
}

struct WhileGenerator;
impl StatementGenerator for WhileGenerator {
    fn generate(ctx: &mut FunctionGenCtx) -> Result<Option<Stmt>, GenError> {
        let cond = ctx.generate_expr(BasicType::BOOL)?;
        let body = ctx.generate_scope(ctx.config.loop_statements)?;
        Ok(Some(Stmt::While {
            cond,
            body: Box::new(Stmt::Block(body)),
        }))
    }
}

struct DoWhileGenerator;
impl StatementGenerator for DoWhileGenerator {
    fn generate(ctx: &mut FunctionGenCtx) -> Result<Option<Stmt>, GenError> {
        let body = ctx.generate_scope(ctx.config.loop_statements)?;
        ctx.state.counters.expr_depth = 0;
        let cond = ctx.generate_expr(BasicType::BOOL)?;
        Ok(Some(Stmt::DoWhile {
            body: Box::new(Stmt::Block(body)),
            cond,
        }))
    }
}

/// `for (int i = 0; i < bound; i++)` with a constant bound.
struct ForGenerator;
impl StatementGenerator for ForGenerator {
    fn generate(ctx: &mut FunctionGenCtx) -> Result<Option<Stmt>, GenError> {
        ctx.state.scope.push();
        let name = ctx.state.next_variable_name();
        let id = ctx.state.scope.declare(&name, BasicType::INT.into(), false)?;
        ctx.state.scope.mark_read(id);
        ctx.state.scope.mark_written(id);
        let bound = ctx.with_mode(GenerationMode::CONSTANT, true, |ctx| {
            ctx.generate_expr(BasicType::INT)
        });
        let body = bound.and_then(|bound| {
            let body = ctx.generate_scope(ctx.config.loop_statements)?;
            Ok((bound, body))
        });
        ctx.state.scope.pop()?;
        let (bound, body) = body?;

        Ok(Some(Stmt::For {
            init: Some(Box::new(Stmt::Decl(VarDecl {
                ty: BasicType::INT.into(),
                name: name.clone(),
                init: Some(Expr::int(0)),
            }))),
            cond: Some(Expr::binary(BinaryOp::Less, Expr::var(&name), bound)),
            step: Some(Expr::unary(UnaryOp::PostIncrement, Expr::var(name))),
            body: Box::new(Stmt::Block(body)),
        }))
    }
}
