use super::{context::GenerationMode, generateir::FunctionGenCtx, scope::EntryId};
use crate::{
    error::GenError,
    ir::{
        typing::SWIZZLE_SETS, AssignOp, BasicType, Expr, ScalarKind, SwizzleLetters, UnaryOp,
    },
    randomext::RandomnessExt,
};

trait ExpressionGenerator {
    /// `None` when no expression of `ty` can be built this way.
    fn generate(ctx: &mut FunctionGenCtx, ty: BasicType) -> Result<Option<Expr>, GenError>;
}

/// The recursive expression shapes. Terminals (literals and variable reads)
/// are produced by [`FunctionGenCtx::generate_terminal`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum ExpressionGenerators {
    Binary,
    ParenBinary,
    Ternary,
    Unary,
    ParenUnary,
    Assignment,
    IncDec,
    Builtin,
    Constructor,
}

impl ExpressionGenerators {
    pub const ALL: [Self; 9] = [
        Self::Binary,
        Self::ParenBinary,
        Self::Ternary,
        Self::Unary,
        Self::ParenUnary,
        Self::Assignment,
        Self::IncDec,
        Self::Builtin,
        Self::Constructor,
    ];

    pub fn generate(
        self,
        ctx: &mut FunctionGenCtx,
        ty: BasicType,
    ) -> Result<Option<Expr>, GenError> {
        match self {
            Self::Binary => BinaryGenerator::generate(ctx, ty),
            Self::ParenBinary => Ok(BinaryGenerator::generate(ctx, ty)?.map(Expr::paren)),
            Self::Ternary => TernaryGenerator::generate(ctx, ty),
            Self::Unary => UnaryGenerator::generate(ctx, ty),
            Self::ParenUnary => Ok(UnaryGenerator::generate(ctx, ty)?.map(Expr::paren)),
            Self::Assignment => AssignmentGenerator::generate(ctx, ty),
            Self::IncDec => IncDecGenerator::generate(ctx, ty),
            Self::Builtin => BuiltinGenerator::generate(ctx, ty),
            Self::Constructor => ConstructorGenerator::generate(ctx, ty),
        }
    }

    fn has_side_effect(self) -> bool {
        matches!(self, Self::Assignment | Self::IncDec)
    }
}

struct BinaryGenerator;
impl ExpressionGenerator for BinaryGenerator {
    fn generate(ctx: &mut FunctionGenCtx, ty: BasicType) -> Result<Option<Expr>, GenError> {
        let Some(op) = ctx.strategy.binary_op(ctx.rng, ty) else {
            return Ok(None);
        };
        let (l, r) = ctx.strategy.operand_types(ctx.rng, op, ty);
        let left = ctx.generate_expr(l)?;
        let right = ctx.with_mode(GenerationMode::SHIFT_OPERAND, op.is_shift(), |ctx| {
            ctx.generate_expr(r)
        })?;
        Ok(Some(Expr::binary(op, left, right)))
    }
}

struct UnaryGenerator;
impl ExpressionGenerator for UnaryGenerator {
    fn generate(ctx: &mut FunctionGenCtx, ty: BasicType) -> Result<Option<Expr>, GenError> {
        let Some(op) = ctx.strategy.unary_op(ctx.rng, ty) else {
            return Ok(None);
        };
        Ok(Some(Expr::unary(op, ctx.generate_expr(ty)?)))
    }
}

struct TernaryGenerator;
impl ExpressionGenerator for TernaryGenerator {
    fn generate(ctx: &mut FunctionGenCtx, ty: BasicType) -> Result<Option<Expr>, GenError> {
        let cond = ctx.generate_expr(BasicType::BOOL)?;
        let accept = ctx.generate_expr(ty)?;
        let reject = ctx.generate_expr(ty)?;
        Ok(Some(Expr::ternary(cond, accept, reject)))
    }
}

/// Compound assignments legal for a target of `ty`.
pub(super) fn assign_ops(ty: BasicType) -> &'static [AssignOp] {
    use AssignOp as A;
    match ty.kind {
        ScalarKind::Bool => &[A::Assign],
        ScalarKind::Float => &[A::Assign, A::Add, A::Subtract, A::Multiply, A::Divide],
        ScalarKind::Int | ScalarKind::Uint => &[
            A::Assign,
            A::Add,
            A::Subtract,
            A::Multiply,
            A::Divide,
            A::Modulo,
            A::ShiftLeft,
            A::ShiftRight,
            A::BitAnd,
            A::BitOr,
            A::BitXor,
        ],
    }
}

struct AssignmentGenerator;
impl ExpressionGenerator for AssignmentGenerator {
    fn generate(ctx: &mut FunctionGenCtx, ty: BasicType) -> Result<Option<Expr>, GenError> {
        if ctx.state.scope.entries_writable_as(ty).is_empty() {
            return Ok(None);
        }
        let op = *ctx.rng.choose(assign_ops(ty));
        let target = ctx.write_variable(ty)?;
        let value = match op {
            AssignOp::ShiftLeft | AssignOp::ShiftRight => {
                let kind = *ctx.rng.choose(&[ScalarKind::Int, ScalarKind::Uint]);
                ctx.with_mode(GenerationMode::SHIFT_OPERAND, true, |ctx| {
                    ctx.generate_expr(BasicType::scalar(kind))
                })?
            }
            AssignOp::Assign => ctx.generate_expr(ty)?,
            _ if ty.is_vector() && ctx.rng.boolean() => ctx.generate_expr(ty.element_type())?,
            _ => ctx.generate_expr(ty)?,
        };
        Ok(Some(Expr::assign(op, target, value)))
    }
}

struct IncDecGenerator;
impl ExpressionGenerator for IncDecGenerator {
    fn generate(ctx: &mut FunctionGenCtx, ty: BasicType) -> Result<Option<Expr>, GenError> {
        if !ty.kind.is_numeric() || ctx.state.scope.entries_writable_as(ty).is_empty() {
            return Ok(None);
        }
        let op = *ctx.rng.choose(&[
            UnaryOp::PreIncrement,
            UnaryOp::PreDecrement,
            UnaryOp::PostIncrement,
            UnaryOp::PostDecrement,
        ]);
        let target = ctx.write_variable(ty)?;
        Ok(Some(Expr::unary(op, target)))
    }
}

struct BuiltinGenerator;
impl ExpressionGenerator for BuiltinGenerator {
    fn generate(ctx: &mut FunctionGenCtx, ty: BasicType) -> Result<Option<Expr>, GenError> {
        let Some(choice) = ctx.strategy.builtin(ctx.rng, ty) else {
            return Ok(None);
        };
        let args = choice
            .args
            .iter()
            .map(|arg| ctx.generate_expr(*arg))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(Expr::call(choice.callee, args)))
    }
}

struct ConstructorGenerator;
impl ConstructorGenerator {
    /// Element kinds whose conversion to `target` is defined for every value.
    fn source_kinds(target: ScalarKind) -> &'static [ScalarKind] {
        match target {
            ScalarKind::Int | ScalarKind::Uint => {
                &[ScalarKind::Int, ScalarKind::Uint, ScalarKind::Bool]
            }
            ScalarKind::Float | ScalarKind::Bool => &ScalarKind::ALL,
        }
    }
}

impl ExpressionGenerator for ConstructorGenerator {
    fn generate(ctx: &mut FunctionGenCtx, ty: BasicType) -> Result<Option<Expr>, GenError> {
        let args = match ctx.rng.int_below(3) {
            0 if ty.is_vector() => vec![ctx.generate_expr(ty.element_type())?],
            1 if ty.is_vector() => (0..ty.size)
                .map(|_| ctx.generate_expr(ty.element_type()))
                .collect::<Result<Vec<_>, _>>()?,
            _ => {
                let kind = *ctx.rng.choose(Self::source_kinds(ty.kind));
                vec![ctx.generate_expr(ty.with_kind(kind))?]
            }
        };
        Ok(Some(Expr::construct(ty, args)))
    }
}

impl FunctionGenCtx<'_> {
    /// An expression of type `ty`. The deeper the recursion, the likelier a
    /// terminal; at the depth budget only terminals are produced.
    pub fn generate_expr(&mut self, ty: BasicType) -> Result<Expr, GenError> {
        let depth = self.state.counters.expr_depth;
        let max = self.config.max_expr_depth;
        let terminate =
            depth >= max || self.rng.probability((depth + 1) as f64 / (max + 1) as f64);
        if !terminate {
            let constant = self.state.mode.contains(GenerationMode::CONSTANT);
            let kind = *self.rng.choose(&ExpressionGenerators::ALL);
            if !(constant && kind.has_side_effect()) {
                if let Some(expr) = self.deeper(|ctx| kind.generate(ctx, ty))? {
                    return Ok(expr);
                }
            }
        }
        self.generate_terminal(ty)
    }

    /// A literal or, outside constant mode and when one exists, a read of a
    /// compatible variable.
    pub fn generate_terminal(&mut self, ty: BasicType) -> Result<Expr, GenError> {
        let constant = self.state.mode.contains(GenerationMode::CONSTANT);
        if !constant
            && !self.state.scope.entries_readable_as(ty).is_empty()
            && self.rng.boolean()
        {
            self.read_variable(ty)
        } else {
            Ok(self.generate_literal(ty))
        }
    }

    pub fn generate_literal(&mut self, ty: BasicType) -> Expr {
        let value = self.scalar_literal(ty.kind);
        Expr::splat(ty, value)
    }

    pub fn read_variable(&mut self, ty: BasicType) -> Result<Expr, GenError> {
        let candidates = self.state.scope.entries_readable_as(ty);
        if candidates.is_empty() {
            return Err(GenError::NoReadableVariable(ty));
        }
        let id = *self.rng.choose(&candidates);
        self.state.scope.mark_read(id);
        self.with_mode(GenerationMode::LVALUE, false, |ctx| ctx.access(id, ty))
    }

    pub fn write_variable(&mut self, ty: BasicType) -> Result<Expr, GenError> {
        let candidates = self.state.scope.entries_writable_as(ty);
        if candidates.is_empty() {
            return Err(GenError::NoWritableVariable(ty));
        }
        let id = *self.rng.choose(&candidates);
        self.state.scope.mark_written(id);
        self.with_mode(GenerationMode::LVALUE, true, |ctx| ctx.access(id, ty))
    }

    /// `entry`, indexed when it is an array and swizzled down to `ty` when
    /// its element is a vector of another size.
    fn access(&mut self, id: EntryId, ty: BasicType) -> Result<Expr, GenError> {
        let entry = self.state.scope.entry(id);
        let entry_ty = entry.ty;
        let mut expr = Expr::var(entry.name.clone());
        if entry_ty.is_array() {
            // bounds are enforced by the indexing pass
            let index = self.with_mode(GenerationMode::LVALUE, false, |ctx| {
                ctx.deeper(|ctx| ctx.generate_expr(BasicType::INT))
            })?;
            expr = Expr::index(expr, index);
        }
        let element = entry_ty.element();
        if element != ty {
            expr = self.swizzle(expr, element.size, ty.size);
        }
        Ok(expr)
    }

    /// Possibly chained swizzles from a `from`-wide vector down to `to`
    /// letters. Lvalue swizzles never repeat a letter.
    fn swizzle(&mut self, base: Expr, from: u8, to: u8) -> Expr {
        let lvalue = self.state.mode.contains(GenerationMode::LVALUE);
        let mut base = base;
        let mut width = from;
        while self.state.counters.swizzle_depth + 1 < self.config.max_swizzle_depth
            && self.rng.boolean()
        {
            let (lo, hi) = if lvalue { (to.max(2), width) } else { (2, 4) };
            if lo > hi {
                break;
            }
            let size = self.rng.int_between(lo as i32, hi as i32 + 1) as u8;
            base = self.swizzle_letters(base, width, size, lvalue);
            width = size;
            self.state.counters.swizzle_depth += 1;
        }
        let expr = self.swizzle_letters(base, width, to, lvalue);
        self.state.counters.swizzle_depth = 0;
        expr
    }

    fn swizzle_letters(&mut self, base: Expr, width: u8, size: u8, distinct: bool) -> Expr {
        let set = self.rng.choose(&SWIZZLE_SETS).as_bytes();
        let mut available = set[..width as usize].to_vec();
        let mut letters = Vec::with_capacity(size as usize);
        for _ in 0..size {
            let idx = self.rng.index(available.len());
            letters.push(available[idx]);
            if distinct {
                available.remove(idx);
            }
        }
        Expr::Swizzle {
            base: Box::new(base),
            letters: SwizzleLetters::from_bytes(&letters)
                .expect("swizzles have one to four ascii letters"),
        }
    }
}
