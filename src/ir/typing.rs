//! Type inference over the IR, used by the rewrite passes to learn operand
//! types at call sites and the declared type of every variable.

use hashbrown::HashMap;

use super::{
    tree::{BinaryOp, Expr, ExternalDecl, Literal, ParamQualifier, Prototype, TranslationUnit, UnaryOp},
    types::{BasicType, ScalarKind, UnifiedType},
};
use crate::error::TypeError;

pub const SWIZZLE_SETS: [&str; 3] = ["xyzw", "rgba", "stpq"];

/// Position of a swizzle letter inside its letter set.
pub fn swizzle_component(letter: char) -> Option<usize> {
    SWIZZLE_SETS.iter().find_map(|set| set.find(letter))
}

#[derive(Clone, Debug, PartialEq)]
pub struct Signature {
    pub params: Vec<(ParamQualifier, BasicType)>,
    pub ret: Option<BasicType>,
}

impl From<&Prototype> for Signature {
    fn from(proto: &Prototype) -> Self {
        Self {
            params: proto.params.iter().map(|p| (p.qualifier, p.ty)).collect(),
            ret: proto.ret,
        }
    }
}

/// Lexical variable environment plus the table of declared functions.
#[derive(Clone, Debug)]
pub struct TypeEnv {
    frames: Vec<HashMap<String, UnifiedType>>,
    functions: HashMap<String, Vec<Signature>>,
}

impl Default for TypeEnv {
    fn default() -> Self {
        Self {
            frames: vec![HashMap::new()],
            functions: HashMap::new(),
        }
    }
}

impl TypeEnv {
    /// Environment holding every global and function of `unit`.
    pub fn for_unit(unit: &TranslationUnit) -> Self {
        let mut env = Self::default();
        for decl in &unit.decls {
            match decl {
                ExternalDecl::Buffer(block) => {
                    for (ty, name) in &block.members {
                        env.declare(name, ty.qualified(block.qualifiers));
                    }
                }
                ExternalDecl::Global(var) => env.declare(&var.name, var.ty),
                ExternalDecl::Prototype(proto) => env.add_prototype(proto),
                ExternalDecl::Function(function) => env.add_prototype(&function.proto),
            }
        }
        env
    }

    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        assert!(self.frames.len() > 1, "popped the global frame");
        self.frames.pop();
    }

    pub fn declare(&mut self, name: &str, ty: UnifiedType) {
        self.frames
            .last_mut()
            .expect("the global frame is never popped")
            .insert(name.to_string(), ty);
    }

    pub fn lookup(&self, name: &str) -> Option<&UnifiedType> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    pub fn add_prototype(&mut self, proto: &Prototype) {
        let signature = Signature::from(proto);
        let overloads = self.functions.entry(proto.name.clone()).or_default();
        if !overloads.contains(&signature) {
            overloads.push(signature);
        }
    }

    pub fn has_function(&self, name: &str, params: &[BasicType]) -> bool {
        self.functions.get(name).is_some_and(|overloads| {
            overloads
                .iter()
                .any(|sig| sig.params.iter().map(|(_, ty)| *ty).eq(params.iter().copied()))
        })
    }

    fn user_signature(&self, callee: &str, args: &[BasicType]) -> Option<&Signature> {
        self.functions.get(callee)?.iter().find(|sig| {
            sig.params.len() == args.len()
                && sig.params.iter().zip(args).all(|((_, p), a)| p == a)
        })
    }

    /// Qualifiers of the parameters a call binds its arguments to, taken
    /// from the overload matching the argument types. Arity decides only
    /// when an argument type cannot be inferred. Builtins only take `in`
    /// parameters.
    pub fn param_qualifiers(&self, callee: &str, args: &[Expr]) -> Vec<ParamQualifier> {
        let types: Option<Vec<BasicType>> =
            args.iter().map(|arg| self.infer_basic(arg).ok()).collect();
        let signature = match types {
            Some(types) => self.user_signature(callee, &types),
            None => self
                .functions
                .get(callee)
                .and_then(|overloads| overloads.iter().find(|sig| sig.params.len() == args.len())),
        };
        signature
            .map(|sig| sig.params.iter().map(|(q, _)| *q).collect())
            .unwrap_or_else(|| vec![ParamQualifier::In; args.len()])
    }

    pub fn infer_basic(&self, expr: &Expr) -> Result<BasicType, TypeError> {
        let ty = self.infer(expr)?;
        ty.as_basic().ok_or(TypeError::NotBasic(ty))
    }

    pub fn infer(&self, expr: &Expr) -> Result<UnifiedType, TypeError> {
        match expr {
            Expr::Literal(literal) => Ok(BasicType::scalar(literal.kind()).into()),
            Expr::Var(name) => self
                .lookup(name)
                .copied()
                .ok_or_else(|| TypeError::UnknownVariable(name.clone())),
            Expr::Index { base, .. } => {
                let base = self.infer(base)?;
                if base.is_array() {
                    Ok(base.element().into())
                } else if base.basic.is_vector() {
                    Ok(base.basic.element_type().into())
                } else {
                    Err(TypeError::NotBasic(base))
                }
            }
            Expr::Swizzle { base, letters } => {
                let base = self.infer_basic(base)?;
                let in_range = letters
                    .as_str()
                    .chars()
                    .all(|c| swizzle_component(c).is_some_and(|idx| idx < base.size as usize));
                if !in_range {
                    return Err(TypeError::Swizzle(letters.to_string()));
                }
                Ok(base.with_size(letters.len() as u8).into())
            }
            Expr::Length(_) => Ok(BasicType::INT.into()),
            Expr::Unary { op, expr } => {
                let ty = self.infer_basic(expr)?;
                match op {
                    UnaryOp::LogicalNot => Ok(BasicType::BOOL.into()),
                    _ => Ok(ty.into()),
                }
            }
            Expr::Binary { op, left, right } => {
                if *op == BinaryOp::Comma {
                    return self.infer(right);
                }
                let l = self.infer_basic(left)?;
                let r = self.infer_basic(right)?;
                binary_result(*op, l, r)
                    .map(UnifiedType::from)
                    .ok_or(TypeError::Operands {
                        op: op.symbol(),
                        left: l.into(),
                        right: r.into(),
                    })
            }
            Expr::Assign { target, .. } => Ok(self.infer(target)?.unqualified()),
            Expr::Ternary { accept, .. } => Ok(self.infer(accept)?.unqualified()),
            Expr::Paren(inner) => self.infer(inner),
            Expr::Call { callee, args } => {
                let arg_types = args
                    .iter()
                    .map(|arg| self.infer_basic(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                let ret = match self.user_signature(callee, &arg_types) {
                    Some(sig) => sig.ret,
                    None => builtin_result(callee, &arg_types),
                };
                ret.map(UnifiedType::from)
                    .ok_or_else(|| TypeError::NoMatchingPrototype {
                        callee: callee.clone(),
                        args: arg_types.into_iter().map(UnifiedType::from).collect(),
                    })
            }
            Expr::Construct { ty, .. } => Ok(*ty),
        }
    }
}

/// Result type of a binary operator, `None` when GLSL rejects the operands.
pub fn binary_result(op: BinaryOp, left: BasicType, right: BasicType) -> Option<BasicType> {
    use BinaryOp as B;
    let mixed_shape = || -> Option<BasicType> {
        if left.kind != right.kind {
            return None;
        }
        match (left.size, right.size) {
            (l, r) if l == r => Some(left),
            (1, _) => Some(right),
            (_, 1) => Some(left),
            _ => None,
        }
    };
    match op {
        B::Add | B::Subtract | B::Multiply | B::Divide => {
            left.kind.is_numeric().then(mixed_shape).flatten()
        }
        B::Modulo | B::BitAnd | B::BitOr | B::BitXor => {
            left.kind.is_integer().then(mixed_shape).flatten()
        }
        B::ShiftLeft | B::ShiftRight => {
            let sizes_ok = right.size == 1 || right.size == left.size;
            (left.kind.is_integer() && right.kind.is_integer() && sizes_ok).then_some(left)
        }
        B::LogicalAnd | B::LogicalOr | B::LogicalXor => {
            (left == BasicType::BOOL && right == BasicType::BOOL).then_some(BasicType::BOOL)
        }
        B::Equal | B::NotEqual => (left == right).then_some(BasicType::BOOL),
        B::Less | B::LessEqual | B::Greater | B::GreaterEqual => {
            (left == right && left.is_scalar() && left.kind.is_numeric()).then_some(BasicType::BOOL)
        }
        B::Comma => Some(right),
    }
}

/// Result type of the builtin functions the generator and the wrappers use.
pub fn builtin_result(callee: &str, args: &[BasicType]) -> Option<BasicType> {
    let same_or_scalar = |a: BasicType, b: BasicType| a == b || (b.is_scalar() && b.kind == a.kind);
    match (callee, args) {
        ("abs", [a]) if a.kind == ScalarKind::Int || a.kind == ScalarKind::Float => Some(*a),
        ("min" | "max", [a, b]) if a.kind.is_numeric() && same_or_scalar(*a, *b) => Some(*a),
        ("clamp", [a, lo, hi])
            if a.kind.is_numeric() && lo == hi && same_or_scalar(*a, *lo) =>
        {
            Some(*a)
        }
        ("bitfieldExtract", [a, offset, bits])
            if a.kind.is_integer() && *offset == BasicType::INT && *bits == BasicType::INT =>
        {
            Some(*a)
        }
        ("bitfieldInsert", [a, insert, offset, bits])
            if a.kind.is_integer()
                && a == insert
                && *offset == BasicType::INT
                && *bits == BasicType::INT =>
        {
            Some(*a)
        }
        ("any" | "all", [a]) if a.kind == ScalarKind::Bool && a.is_vector() => Some(BasicType::BOOL),
        ("not", [a]) if a.kind == ScalarKind::Bool && a.is_vector() => Some(*a),
        ("equal" | "notEqual", [a, b]) if a == b && a.is_vector() => Some(a.with_kind(ScalarKind::Bool)),
        ("lessThan" | "lessThanEqual" | "greaterThan" | "greaterThanEqual", [a, b])
            if a == b && a.is_vector() && a.kind.is_numeric() =>
        {
            Some(a.with_kind(ScalarKind::Bool))
        }
        ("int" | "uint" | "float" | "bool", [a]) if a.is_scalar() => {
            let kind = match callee {
                "int" => ScalarKind::Int,
                "uint" => ScalarKind::Uint,
                "float" => ScalarKind::Float,
                _ => ScalarKind::Bool,
            };
            Some(BasicType::scalar(kind))
        }
        _ => None,
    }
}

/// Literal `value` typed as the element kind of `ty`.
pub fn literal_of(ty: BasicType, value: i64) -> Literal {
    Literal::of_kind(ty.kind, value)
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use super::*;
    use crate::ir::{AssignOp, Param};

    fn env() -> TypeEnv {
        let mut env = TypeEnv::default();
        env.declare("i", BasicType::INT.into());
        env.declare("v", BasicType::make_vector(ScalarKind::Int, 3).into());
        env.declare(
            "arr",
            UnifiedType::array(BasicType::UINT, NonZeroU32::new(4).unwrap()),
        );
        env
    }

    #[test]
    fn infers_swizzles_and_indexing() {
        let env = env();
        let swz = Expr::Swizzle {
            base: Box::new(Expr::var("v")),
            letters: "xxy".parse().unwrap(),
        };
        assert_eq!(
            env.infer_basic(&swz).unwrap(),
            BasicType::make_vector(ScalarKind::Int, 3)
        );
        let bad = Expr::Swizzle {
            base: Box::new(Expr::var("v")),
            letters: "w".parse().unwrap(),
        };
        assert!(matches!(env.infer(&bad), Err(TypeError::Swizzle(_))));
        let idx = Expr::index(Expr::var("arr"), Expr::var("i"));
        assert_eq!(env.infer_basic(&idx).unwrap(), BasicType::UINT);
    }

    #[test]
    fn infers_mixed_vector_scalar_arithmetic() {
        let env = env();
        let expr = Expr::binary(BinaryOp::Multiply, Expr::var("i"), Expr::var("v"));
        assert_eq!(
            env.infer_basic(&expr).unwrap(),
            BasicType::make_vector(ScalarKind::Int, 3)
        );
        let shift = Expr::binary(BinaryOp::ShiftLeft, Expr::var("v"), Expr::uint(3));
        assert_eq!(
            env.infer_basic(&shift).unwrap(),
            BasicType::make_vector(ScalarKind::Int, 3)
        );
        let wrong = Expr::binary(BinaryOp::Add, Expr::var("i"), Expr::uint(1));
        assert!(env.infer(&wrong).is_err());
    }

    #[test]
    fn resolves_overloaded_prototypes() {
        let mut env = env();
        env.add_prototype(&Prototype {
            name: "SAFE_DIV_ASSIGN".into(),
            ret: Some(BasicType::INT),
            params: vec![
                Param {
                    qualifier: ParamQualifier::Inout,
                    ty: BasicType::INT,
                    name: "A".into(),
                },
                Param {
                    qualifier: ParamQualifier::In,
                    ty: BasicType::INT,
                    name: "B".into(),
                },
            ],
        });
        let call = Expr::call("SAFE_DIV_ASSIGN", vec![Expr::var("i"), Expr::int(3)]);
        assert_eq!(env.infer_basic(&call).unwrap(), BasicType::INT);
        assert_eq!(
            env.param_qualifiers("SAFE_DIV_ASSIGN", &[Expr::var("i"), Expr::int(3)]),
            vec![ParamQualifier::Inout, ParamQualifier::In]
        );
        let unknown = Expr::call("frobnicate", vec![Expr::var("i")]);
        assert!(matches!(
            env.infer(&unknown),
            Err(TypeError::NoMatchingPrototype { .. })
        ));
        let assign = Expr::assign(AssignOp::Add, Expr::var("i"), Expr::int(1));
        assert_eq!(env.infer_basic(&assign).unwrap(), BasicType::INT);
    }

    #[test]
    fn qualifiers_follow_the_overload_the_arguments_select() {
        let mut env = env();
        let param = |qualifier, ty| Param {
            qualifier,
            ty,
            name: "p".into(),
        };
        env.add_prototype(&Prototype {
            name: "h".into(),
            ret: None,
            params: vec![
                param(ParamQualifier::Out, BasicType::INT),
                param(ParamQualifier::In, BasicType::INT),
            ],
        });
        env.add_prototype(&Prototype {
            name: "h".into(),
            ret: None,
            params: vec![
                param(ParamQualifier::In, BasicType::UINT),
                param(ParamQualifier::Inout, BasicType::UINT),
            ],
        });
        let unsigned = [Expr::index(Expr::var("arr"), Expr::int(0)), Expr::uint(1)];
        assert_eq!(
            env.param_qualifiers("h", &unsigned),
            vec![ParamQualifier::In, ParamQualifier::Inout]
        );
        assert_eq!(
            env.param_qualifiers("h", &[Expr::var("i"), Expr::int(1)]),
            vec![ParamQualifier::Out, ParamQualifier::In]
        );
        assert_eq!(
            env.param_qualifiers("abs", &[Expr::var("i")]),
            vec![ParamQualifier::In]
        );
    }

    #[test]
    fn frames_shadow_outer_declarations() {
        let mut env = env();
        env.push();
        env.declare("i", BasicType::FLOAT.into());
        assert_eq!(env.lookup("i").unwrap().basic, BasicType::FLOAT);
        env.pop();
        assert_eq!(env.lookup("i").unwrap().basic, BasicType::INT);
    }
}
