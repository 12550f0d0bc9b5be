//! Safe-operation synthesis: every operator or builtin with an undefined
//! result on some inputs is routed through a `SAFE_*` function whose body
//! tests for those inputs and falls back to a defined computation.

mod builder;
mod synth;

use std::collections::BTreeSet;

use hashbrown::HashSet;
use log::debug;

pub(crate) use builder::{is_index_clamp, is_length};

use super::walk::{map_children, rewrite_functions, ExprRewriter};
use crate::{
    error::{PassError, TypeError},
    generator::GenerationContext,
    ir::{
        iter::ExpressionVisitor,
        typing::{binary_result, TypeEnv}, AssignOp, BasicType, BinaryOp, Buffer,
        Expr, ExternalDecl, FunctionDef, Param, ParamQualifier, Prototype, ScalarKind,
        UnaryOp, UnifiedType,
    },
};

pub const TRACE_BUFFER: &str = "trace_buffer";
pub const TRACE_MEMBER: &str = "trace_ids";
pub(crate) const ID_PARAM: &str = "id";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    Abs,
    Div,
    DivAssign,
    Mod,
    ModAssign,
    LShift,
    LShiftAssign,
    RShift,
    RShiftAssign,
    BitfieldExtract,
    BitfieldInsert,
    Clamp,
    Add,
    AddAssign,
    Sub,
    SubAssign,
    Mul,
    MulAssign,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl Operation {
    pub const ALL: [Operation; 22] = [
        Self::Abs,
        Self::Div,
        Self::DivAssign,
        Self::Mod,
        Self::ModAssign,
        Self::LShift,
        Self::LShiftAssign,
        Self::RShift,
        Self::RShiftAssign,
        Self::BitfieldExtract,
        Self::BitfieldInsert,
        Self::Clamp,
        Self::Add,
        Self::AddAssign,
        Self::Sub,
        Self::SubAssign,
        Self::Mul,
        Self::MulAssign,
        Self::PreInc,
        Self::PreDec,
        Self::PostInc,
        Self::PostDec,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Abs => "SAFE_ABS",
            Self::Div => "SAFE_DIV",
            Self::DivAssign => "SAFE_DIV_ASSIGN",
            Self::Mod => "SAFE_MOD",
            Self::ModAssign => "SAFE_MOD_ASSIGN",
            Self::LShift => "SAFE_LSHIFT",
            Self::LShiftAssign => "SAFE_LSHIFT_ASSIGN",
            Self::RShift => "SAFE_RSHIFT",
            Self::RShiftAssign => "SAFE_RSHIFT_ASSIGN",
            Self::BitfieldExtract => "SAFE_BITFIELD_EXTRACT",
            Self::BitfieldInsert => "SAFE_BITFIELD_INSERT",
            Self::Clamp => "SAFE_CLAMP",
            Self::Add => "SAFE_ADD",
            Self::AddAssign => "SAFE_ADD_ASSIGN",
            Self::Sub => "SAFE_SUB",
            Self::SubAssign => "SAFE_SUB_ASSIGN",
            Self::Mul => "SAFE_MUL",
            Self::MulAssign => "SAFE_MUL_ASSIGN",
            Self::PreInc => "SAFE_PRE_INC",
            Self::PreDec => "SAFE_PRE_DEC",
            Self::PostInc => "SAFE_POST_INC",
            Self::PostDec => "SAFE_POST_DEC",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// Number of arguments at an untraced call site.
    pub fn arity(self) -> usize {
        match self {
            Self::Abs | Self::PreInc | Self::PreDec | Self::PostInc | Self::PostDec => 1,
            Self::BitfieldExtract | Self::Clamp => 3,
            Self::BitfieldInsert => 4,
            _ => 2,
        }
    }

    /// Whether the first parameter is `inout`.
    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            Self::DivAssign
                | Self::ModAssign
                | Self::LShiftAssign
                | Self::RShiftAssign
                | Self::AddAssign
                | Self::SubAssign
                | Self::MulAssign
                | Self::PreInc
                | Self::PreDec
                | Self::PostInc
                | Self::PostDec
        )
    }

    pub(crate) fn for_binary(op: BinaryOp) -> Option<Self> {
        Some(match op {
            BinaryOp::Divide => Self::Div,
            BinaryOp::Modulo => Self::Mod,
            BinaryOp::ShiftLeft => Self::LShift,
            BinaryOp::ShiftRight => Self::RShift,
            BinaryOp::Add => Self::Add,
            BinaryOp::Subtract => Self::Sub,
            BinaryOp::Multiply => Self::Mul,
            _ => return None,
        })
    }

    pub(crate) fn for_assign(op: AssignOp) -> Option<Self> {
        Some(match op {
            AssignOp::Divide => Self::DivAssign,
            AssignOp::Modulo => Self::ModAssign,
            AssignOp::ShiftLeft => Self::LShiftAssign,
            AssignOp::ShiftRight => Self::RShiftAssign,
            AssignOp::Add => Self::AddAssign,
            AssignOp::Subtract => Self::SubAssign,
            AssignOp::Multiply => Self::MulAssign,
            _ => return None,
        })
    }

    pub(crate) fn for_unary(op: UnaryOp) -> Option<Self> {
        Some(match op {
            UnaryOp::PreIncrement => Self::PreInc,
            UnaryOp::PreDecrement => Self::PreDec,
            UnaryOp::PostIncrement => Self::PostInc,
            UnaryOp::PostDecrement => Self::PostDec,
            _ => return None,
        })
    }

    /// The binary operator the wrapper guards, for arithmetic and assignment
    /// forms.
    fn binary_op(self) -> Option<BinaryOp> {
        Some(match self {
            Self::Div | Self::DivAssign => BinaryOp::Divide,
            Self::Mod | Self::ModAssign => BinaryOp::Modulo,
            Self::LShift | Self::LShiftAssign => BinaryOp::ShiftLeft,
            Self::RShift | Self::RShiftAssign => BinaryOp::ShiftRight,
            Self::Add | Self::AddAssign | Self::PreInc | Self::PostInc => BinaryOp::Add,
            Self::Sub | Self::SubAssign | Self::PreDec | Self::PostDec => BinaryOp::Subtract,
            Self::Mul | Self::MulAssign => BinaryOp::Multiply,
            _ => return None,
        })
    }

    fn assign_op(self) -> Option<AssignOp> {
        Some(match self {
            Self::DivAssign => AssignOp::Divide,
            Self::ModAssign => AssignOp::Modulo,
            Self::LShiftAssign => AssignOp::ShiftLeft,
            Self::RShiftAssign => AssignOp::ShiftRight,
            Self::AddAssign => AssignOp::Add,
            Self::SubAssign => AssignOp::Subtract,
            Self::MulAssign => AssignOp::Multiply,
            _ => return None,
        })
    }

    fn unary_op(self) -> Option<UnaryOp> {
        Some(match self {
            Self::PreInc => UnaryOp::PreIncrement,
            Self::PreDec => UnaryOp::PreDecrement,
            Self::PostInc => UnaryOp::PostIncrement,
            Self::PostDec => UnaryOp::PostDecrement,
            _ => return None,
        })
    }

    /// The raw, unguarded operation applied to `args`. Inverse of the call
    /// site rewrite.
    pub fn unwrapped(self, mut args: Vec<Expr>) -> Expr {
        let builtin = match self {
            Self::Abs => Some("abs"),
            Self::Clamp => Some("clamp"),
            Self::BitfieldExtract => Some("bitfieldExtract"),
            Self::BitfieldInsert => Some("bitfieldInsert"),
            _ => None,
        };
        if let Some(callee) = builtin {
            return Expr::call(callee, args);
        }
        let first = args.remove(0);
        if let Some(op) = self.unary_op() {
            return Expr::unary(op, first);
        }
        let second = args.remove(0);
        match (self.assign_op(), self.binary_op()) {
            (Some(op), _) => Expr::assign(op, first, second),
            (None, Some(op)) => Expr::binary(op, first, second),
            (None, None) => unreachable!("{self:?} is neither a builtin nor an operator"),
        }
    }
}

pub fn is_wrapper_name(name: &str) -> bool {
    Operation::from_name(name).is_some()
}

/// One wrapper to emit: the operation at concrete operand types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WrapperObligation {
    pub op: Operation,
    pub a: BasicType,
    pub b: Option<BasicType>,
}

impl WrapperObligation {
    pub fn new(op: Operation, a: BasicType, b: Option<BasicType>) -> Self {
        Self { op, a, b }
    }

    /// The obligation a call site with argument types `args` needs.
    pub fn from_args(op: Operation, args: &[BasicType]) -> Result<Self, PassError> {
        let Some(&a) = args.first() else {
            return Err(TypeError::NoMatchingPrototype {
                callee: op.name().to_string(),
                args: Vec::new(),
            }
            .into());
        };
        let b = if op == Operation::Clamp || op.arity() == 2 {
            args.get(1).copied()
        } else {
            None
        };
        let obligation = Self::new(op, a, b);
        if !obligation.is_supported() {
            return Err(PassError::UnsupportedOperand {
                construct: op.name(),
                ty: UnifiedType::basic(a),
            });
        }
        Ok(obligation)
    }

    fn is_supported(&self) -> bool {
        use Operation as O;
        let a = self.a.kind;
        match self.op {
            O::Abs => a == ScalarKind::Int,
            O::Div | O::DivAssign => a.is_numeric() && self.b.is_some(),
            O::Mod | O::ModAssign | O::LShift | O::LShiftAssign | O::RShift | O::RShiftAssign => {
                a.is_integer() && self.b.is_some_and(|b| b.kind.is_integer())
            }
            O::BitfieldExtract | O::BitfieldInsert => a.is_integer(),
            O::Clamp => a.is_numeric() && self.b.is_some(),
            O::Add | O::AddAssign | O::Sub | O::SubAssign | O::Mul | O::MulAssign => {
                a == ScalarKind::Float && self.b.is_some()
            }
            O::PreInc | O::PreDec | O::PostInc | O::PostDec => a == ScalarKind::Float,
        }
    }

    pub fn name(&self) -> &'static str {
        self.op.name()
    }

    pub fn ret(&self) -> BasicType {
        match (self.op.is_assignment(), self.op.binary_op(), self.b) {
            (false, Some(op), Some(b)) => binary_result(op, self.a, b).unwrap_or(self.a),
            _ => self.a,
        }
    }

    pub fn param_types(&self) -> Vec<BasicType> {
        let a = self.a;
        let b = self.b.unwrap_or(a);
        match self.op {
            Operation::BitfieldExtract => vec![a, BasicType::INT, BasicType::INT],
            Operation::BitfieldInsert => vec![a, a, BasicType::INT, BasicType::INT],
            Operation::Clamp => vec![a, b, b],
            op if op.arity() == 1 => vec![a],
            _ => vec![a, b],
        }
    }

    pub fn prototype(&self, traced: bool) -> Prototype {
        const NAMES: [&str; 4] = ["A", "B", "C", "D"];
        let mut params: Vec<Param> = self
            .param_types()
            .into_iter()
            .zip(NAMES)
            .enumerate()
            .map(|(idx, (ty, name))| Param {
                qualifier: if idx == 0 && self.op.is_assignment() {
                    ParamQualifier::Inout
                } else {
                    ParamQualifier::In
                },
                ty,
                name: name.to_string(),
            })
            .collect();
        if traced {
            params.push(Param {
                qualifier: ParamQualifier::In,
                ty: BasicType::INT,
                name: ID_PARAM.to_string(),
            });
        }
        Prototype {
            name: self.name().to_string(),
            ret: Some(self.ret()),
            params,
        }
    }

    /// The wrapper definition plus the wrappers its body calls.
    pub fn definition(&self, traced: bool) -> (FunctionDef, Vec<WrapperObligation>) {
        let (body, deps) = synth::body(self, traced);
        (
            FunctionDef {
                proto: self.prototype(traced),
                body,
            },
            deps,
        )
    }
}

/// How call sites and wrapper bodies are realized.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum WrapperMode {
    #[default]
    Plain,
    /// Every call site gets an id and records the branch it took.
    Traced,
    /// Only the listed call sites keep their wrapper.
    Reduced(BTreeSet<u32>),
}

impl WrapperMode {
    /// Reduced mode from the dumped contents of the trace buffer: call site
    /// `i` keeps its wrapper iff value `i` has the fallback bit set.
    pub fn reduced_from_trace(text: &str) -> Result<Self, PassError> {
        let mut keep = BTreeSet::new();
        let values = text
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|token| !token.is_empty());
        for (id, token) in values.enumerate() {
            let value: i64 = token
                .parse()
                .map_err(|_| PassError::Trace(format!("`{token}` is not an integer")))?;
            if value & 1 != 0 {
                keep.insert(id as u32);
            }
        }
        Ok(Self::Reduced(keep))
    }
}

/// Routes every unsafe operation through its wrapper and records the
/// obligations. The wrappers themselves are emitted by [`realize_wrappers`].
pub fn safe_wrappers(mut ctx: GenerationContext) -> Result<GenerationContext, PassError> {
    let env = TypeEnv::for_unit(&ctx.unit);
    let mut builder = builder::WrapperBuilder::default();
    rewrite_functions(&mut ctx.unit, &env, &mut builder)?;
    for obligation in builder.into_obligations() {
        ctx.require_wrapper(obligation);
    }
    Ok(ctx)
}

/// Numbers wrapper call sites in post-order, appending ids in traced mode
/// and undoing unselected rewrites in reduced mode.
#[derive(Debug)]
struct CallSites<'a> {
    mode: &'a WrapperMode,
    next_id: u32,
    used: Vec<WrapperObligation>,
}

impl ExprRewriter for CallSites<'_> {
    fn rewrite(
        &mut self,
        env: &TypeEnv,
        expr: Expr,
    ) -> Result<Expr, PassError> {
        let site = match &expr {
            Expr::Call { callee, args } => match Operation::from_name(callee) {
                Some(op) if args.len() == op.arity() => {
                    let types = args
                        .iter()
                        .map(|arg| env.infer_basic(arg))
                        .collect::<Result<Vec<_>, _>>()?;
                    Some(WrapperObligation::from_args(op, &types)?)
                }
                _ => None,
            },
            _ => None,
        };
        let expr = map_children(expr, &mut |child| self.rewrite(env, child))?;
        let Some(obligation) = site else {
            return Ok(expr);
        };
        let id = self.next_id;
        self.next_id += 1;
        Ok(match (self.mode, expr) {
            (WrapperMode::Traced, Expr::Call { callee, mut args }) => {
                args.push(Expr::int(id as i32));
                self.used.push(obligation);
                Expr::Call { callee, args }
            }
            (WrapperMode::Reduced(keep), Expr::Call { args, .. }) if !keep.contains(&id) => {
                obligation.op.unwrapped(args)
            }
            (_, expr) => {
                self.used.push(obligation);
                expr
            }
        })
    }
}

fn called_wrappers(ctx: &GenerationContext) -> HashSet<String, ahash::RandomState> {
    let mut names = HashSet::default();
    for decl in &ctx.unit.decls {
        let ExternalDecl::Function(function) = decl else {
            continue;
        };
        if is_wrapper_name(&function.proto.name) {
            continue;
        }
        function.visit_expressions(|expr: &Expr| {
            if let Expr::Call { callee, .. } = expr {
                if is_wrapper_name(callee) {
                    names.insert(callee.clone());
                }
            }
            true
        });
    }
    names
}

/// Emits every wrapper the program calls: prototypes first, then bodies,
/// all in front of `main`. Wrappers already declared are skipped.
pub fn realize_wrappers(
    mut ctx: GenerationContext,
    mode: &WrapperMode,
) -> Result<GenerationContext, PassError> {
    let traced = *mode == WrapperMode::Traced;
    let mut env = TypeEnv::for_unit(&ctx.unit);
    for obligation in ctx.obligations() {
        env.add_prototype(&obligation.prototype(false));
    }
    let mut sites = CallSites {
        mode,
        next_id: 0,
        used: Vec::new(),
    };
    rewrite_functions(&mut ctx.unit, &env, &mut sites)?;
    let CallSites { next_id, used, .. } = sites;

    let mut pending: Vec<WrapperObligation> = match mode {
        WrapperMode::Reduced(_) => {
            let called = called_wrappers(&ctx);
            ctx.obligations()
                .iter()
                .filter(|obligation| called.contains(obligation.name()))
                .copied()
                .chain(used)
                .collect()
        }
        _ => ctx.obligations().iter().copied().chain(used).collect(),
    };

    let declared = TypeEnv::for_unit(&ctx.unit);
    let mut seen = HashSet::<WrapperObligation, ahash::RandomState>::default();
    let mut realized = Vec::new();
    while let Some(obligation) = pending.pop() {
        if !seen.insert(obligation) {
            continue;
        }
        ctx.require_wrapper(obligation);
        let proto = obligation.prototype(traced);
        if declared.has_function(&proto.name, &proto.param_types()) {
            continue;
        }
        let (definition, deps) = obligation.definition(traced);
        pending.extend(deps);
        realized.push((obligation, definition));
    }
    realized.sort_by_key(|(obligation, _)| *obligation);
    debug!("realizing {} wrappers", realized.len());
    let prototypes = realized
        .iter()
        .map(|(_, definition)| ExternalDecl::Prototype(definition.proto.clone()));
    let bodies = realized
        .iter()
        .map(|(_, definition)| ExternalDecl::Function(definition.clone()));
    let decls: Vec<_> = prototypes.chain(bodies).collect();
    ctx.unit.insert_before_main(decls);

    if traced && next_id > 0 && ctx.buffer(TRACE_BUFFER).is_none() {
        let len = std::num::NonZeroU32::new(next_id).expect("next_id > 0");
        let binding = ctx.next_binding();
        let mut buffer = Buffer::new(TRACE_BUFFER, binding, false);
        buffer.push_member(
            TRACE_MEMBER.to_string(),
            UnifiedType::array(BasicType::INT, len),
            &vec![0; next_id as usize],
        );
        ctx.add_buffer(buffer)?;
    }
    Ok(ctx)
}
