//! Evaluation-order normalization.
//!
//! Initializer lists and call arguments are evaluated in an unspecified
//! order. Within one such unsequenced group, a variable that is both written
//! and accessed elsewhere makes the result compiler dependent. The
//! normalizer walks every group, tracking the names read and written so far,
//! and redirects every conflicting access to a temporary holding the value
//! the variable had before the statement ran:
//!
//! * a conflicting read becomes `<name>_<group>_<idx>_temp_read`, one name
//!   per variable and group, so all such reads see one snapshot;
//! * a conflicting write is redirected to a fresh
//!   `<name>_<group>_<idx>_temp_<n>`, which nothing reads afterwards.
//!
//! The temporaries are declared right before the statement owning the group.

use hashbrown::{HashMap, HashSet};
use log::debug;

use super::wrappers::{is_wrapper_name, Operation};
use crate::{
    error::{PassError, TypeError},
    generator::GenerationContext,
    ir::{typing::TypeEnv, Expr, Stmt, UnaryOp, VarDecl},
};

type NameSet = HashSet<String, ahash::RandomState>;

#[derive(Debug, Default)]
struct Frame {
    reads: NameSet,
    writes: NameSet,
}

impl Frame {
    fn merge(&mut self, other: Frame) {
        self.reads.extend(other.reads);
        self.writes.extend(other.writes);
    }

    fn touches(&self, name: &str) -> bool {
        self.reads.contains(name) || self.writes.contains(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GroupKind {
    /// A whole top-level expression.
    Expr,
    /// The elements of a constructor with more than one argument.
    Init,
    /// The arguments of a call.
    Func,
}

impl GroupKind {
    fn tag(self) -> &'static str {
        match self {
            Self::Expr => "expr",
            Self::Init => "init",
            Self::Func => "func",
        }
    }
}

#[derive(Debug)]
struct Group {
    kind: GroupKind,
    index: u32,
    next_temp: u32,
    read_temps: HashMap<String, String, ahash::RandomState>,
}

impl Group {
    fn prefix(&self, name: &str) -> String {
        format!("{name}_{}_{}_temp", self.kind.tag(), self.index)
    }
}

#[derive(Debug)]
struct Normalizer {
    env: TypeEnv,
    frames: Vec<Frame>,
    groups: Vec<Group>,
    /// Groups opened so far, per kind.
    opened: [u32; 3],
    issued: NameSet,
    pending: Vec<Stmt>,
}

fn rename_root(expr: &mut Expr, to: &str) {
    match expr {
        Expr::Var(name) => *name = to.to_string(),
        Expr::Index { base, .. } | Expr::Swizzle { base, .. } | Expr::Paren(base) => {
            rename_root(base, to)
        }
        _ => {}
    }
}

/// `if (!(cond)) break;`
fn break_unless(cond: Expr) -> Stmt {
    Stmt::If {
        cond: Expr::unary(UnaryOp::LogicalNot, Expr::paren(cond)),
        accept: Box::new(Stmt::Break),
        reject: None,
    }
}

impl Normalizer {
    fn new(env: TypeEnv) -> Self {
        Self {
            env,
            frames: Vec::new(),
            groups: Vec::new(),
            opened: [0; 3],
            issued: NameSet::default(),
            pending: Vec::new(),
        }
    }

    fn top(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("accesses happen inside a group")
    }

    fn group(&mut self) -> &mut Group {
        self.groups.last_mut().expect("accesses happen inside a group")
    }

    fn open_group(&mut self, kind: GroupKind) {
        let index = self.opened[kind as usize];
        self.opened[kind as usize] += 1;
        self.groups.push(Group {
            kind,
            index,
            next_temp: 0,
            read_temps: HashMap::default(),
        });
        self.frames.push(Frame::default());
    }

    fn close_group(&mut self) {
        self.groups.pop();
        let frame = self.frames.pop().expect("every group owns a frame");
        if let Some(parent) = self.frames.last_mut() {
            parent.merge(frame);
        }
    }

    fn grouped(
        &mut self,
        kind: GroupKind,
        f: impl FnOnce(&mut Self) -> Result<(), PassError>,
    ) -> Result<(), PassError> {
        self.open_group(kind);
        let result = f(self);
        self.close_group();
        result
    }

    /// Runs `f` in a sequenced sub-frame and hands the frame back unmerged.
    fn sub_frame(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<(), PassError>,
    ) -> Result<Frame, PassError> {
        self.frames.push(Frame::default());
        let result = f(self);
        let frame = self.frames.pop().expect("pushed above");
        result.map(|()| frame)
    }

    fn is_written(&self, name: &str) -> bool {
        self.frames.iter().any(|frame| frame.writes.contains(name))
    }

    fn is_accessed(&self, name: &str) -> bool {
        self.frames.iter().any(|frame| frame.touches(name))
    }

    fn declare_temp(&mut self, temp: String, source: &str) -> Result<(), PassError> {
        let ty = self
            .env
            .lookup(source)
            .ok_or_else(|| TypeError::UnknownVariable(source.to_string()))?
            .unqualified();
        self.issued.insert(temp.clone());
        self.pending.push(Stmt::Decl(VarDecl {
            ty,
            name: temp,
            init: Some(Expr::var(source)),
        }));
        Ok(())
    }

    /// Neither in scope nor handed out earlier in this run.
    fn is_free(&self, candidate: &str) -> bool {
        self.env.lookup(candidate).is_none() && !self.issued.contains(candidate)
    }

    fn read_temp(&mut self, name: &str) -> Result<String, PassError> {
        if let Some(temp) = self.group().read_temps.get(name) {
            return Ok(temp.clone());
        }
        let base = format!("{}_read", self.group().prefix(name));
        let temp = if self.is_free(&base) {
            base
        } else {
            (1u32..)
                .map(|n| format!("{base}_{n}"))
                .find(|candidate| self.is_free(candidate))
                .expect("an unbounded range yields a free name")
        };
        self.group()
            .read_temps
            .insert(name.to_string(), temp.clone());
        self.declare_temp(temp.clone(), name)?;
        Ok(temp)
    }

    fn fresh_temp(&mut self, name: &str) -> Result<String, PassError> {
        let temp = loop {
            let group = self.group();
            let candidate = format!("{}_{}", group.prefix(name), group.next_temp);
            group.next_temp += 1;
            if self.is_free(&candidate) {
                break candidate;
            }
        };
        self.declare_temp(temp.clone(), name)?;
        Ok(temp)
    }

    fn read(&mut self, name: &mut String) -> Result<(), PassError> {
        if self.is_written(name) {
            *name = self.read_temp(name)?;
        } else {
            self.top().reads.insert(name.clone());
        }
        Ok(())
    }

    /// Index expressions inside an lvalue are plain reads.
    fn lvalue_indices(&mut self, target: &mut Expr) -> Result<(), PassError> {
        match target {
            Expr::Var(_) => Ok(()),
            Expr::Index { base, index } => {
                self.lvalue_indices(base)?;
                self.visit(index)
            }
            Expr::Swizzle { base, .. } | Expr::Paren(base) => self.lvalue_indices(base),
            other => self.visit(other),
        }
    }

    /// Records the write to `target`'s root variable, or redirects it to a
    /// temporary when the variable was already accessed in an enclosing
    /// frame or written while evaluating the stored value.
    fn store(&mut self, target: &mut Expr, value: &Frame) -> Result<(), PassError> {
        let Some(name) = target.root_variable().map(str::to_string) else {
            return Ok(());
        };
        if self.is_accessed(&name) || value.writes.contains(&name) {
            let temp = self.fresh_temp(&name)?;
            rename_root(target, &temp);
        } else {
            self.top().writes.insert(name);
        }
        Ok(())
    }

    fn visit(&mut self, expr: &mut Expr) -> Result<(), PassError> {
        match expr {
            Expr::Literal(_) | Expr::Length(_) => {}
            Expr::Var(name) => self.read(name)?,
            Expr::Index { base, index } => {
                self.visit(base)?;
                self.visit(index)?;
            }
            Expr::Swizzle { base, .. } | Expr::Paren(base) => self.visit(base)?,
            Expr::Unary { op, expr: operand } if op.has_side_effect() => {
                self.lvalue_indices(operand)?;
                self.store(operand, &Frame::default())?;
            }
            Expr::Unary { expr: operand, .. } => self.visit(operand)?,
            Expr::Binary { op, left, right } if op.is_sequenced() => {
                let left = self.sub_frame(|n| n.visit(left))?;
                let right = self.sub_frame(|n| n.visit(right))?;
                let top = self.top();
                top.merge(left);
                top.merge(right);
            }
            Expr::Binary { left, right, .. } => {
                self.visit(left)?;
                self.visit(right)?;
            }
            Expr::Ternary {
                cond,
                accept,
                reject,
            } => {
                let frames = [
                    self.sub_frame(|n| n.visit(cond))?,
                    self.sub_frame(|n| n.visit(accept))?,
                    self.sub_frame(|n| n.visit(reject))?,
                ];
                let top = self.top();
                for frame in frames {
                    top.merge(frame);
                }
            }
            Expr::Assign { target, value, .. } => {
                self.lvalue_indices(target)?;
                let value_frame = self.sub_frame(|n| n.visit(value))?;
                self.store(target, &value_frame)?;
                self.top().merge(value_frame);
            }
            // `SAFE_*_ASSIGN(x, ..)` stands for `x op= ..` and is treated
            // like the assignment it replaced
            Expr::Call { callee, args }
                if Operation::from_name(callee).is_some_and(Operation::is_assignment) =>
            {
                let Some((target, rest)) = args.split_first_mut() else {
                    return Ok(());
                };
                self.lvalue_indices(target)?;
                let value_frame =
                    self.sub_frame(|n| rest.iter_mut().try_for_each(|arg| n.visit(arg)))?;
                self.store(target, &value_frame)?;
                self.top().merge(value_frame);
            }
            Expr::Call { callee, args } => {
                let qualifiers = self.env.param_qualifiers(callee, args.as_slice());
                self.grouped(GroupKind::Func, |n| {
                    for (arg, qualifier) in args.iter_mut().zip(qualifiers) {
                        if qualifier.is_write() {
                            n.lvalue_indices(arg)?;
                            n.store(arg, &Frame::default())?;
                        } else {
                            n.visit(arg)?;
                        }
                    }
                    Ok(())
                })?;
            }
            Expr::Construct { args, .. } if args.len() >= 2 => {
                self.grouped(GroupKind::Init, |n| {
                    args.iter_mut().try_for_each(|arg| n.visit(arg))
                })?;
            }
            Expr::Construct { args, .. } => {
                for arg in args {
                    self.visit(arg)?;
                }
            }
        }
        Ok(())
    }

    /// Normalizes one top-level expression and returns the declarations
    /// that must precede it.
    fn top_level(&mut self, expr: &mut Expr) -> Result<Vec<Stmt>, PassError> {
        self.grouped(GroupKind::Expr, |n| n.visit(expr))?;
        debug_assert!(self.frames.is_empty());
        Ok(std::mem::take(&mut self.pending))
    }

    fn block(&mut self, stmts: Vec<Stmt>) -> Result<Vec<Stmt>, PassError> {
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            out.extend(self.stmt(stmt)?);
        }
        Ok(out)
    }

    /// A branch or loop body in its own scope, wrapped in a block if
    /// declarations had to be placed in front of it.
    fn body(&mut self, stmt: Stmt) -> Result<Box<Stmt>, PassError> {
        self.env.push();
        let result = self.stmt(stmt);
        self.env.pop();
        Ok(Box::new(Stmt::from_stmts(result?)))
    }

    /// `stmt` rewritten, preceded by the temporaries it needs.
    fn stmt(&mut self, stmt: Stmt) -> Result<Vec<Stmt>, PassError> {
        Ok(match stmt {
            Stmt::Decl(mut decl) => {
                let mut out = match &mut decl.init {
                    Some(init) => self.top_level(init)?,
                    None => Vec::new(),
                };
                self.env.declare(&decl.name, decl.ty);
                out.push(Stmt::Decl(decl));
                out
            }
            Stmt::Expr(mut expr) => {
                let mut out = self.top_level(&mut expr)?;
                out.push(Stmt::Expr(expr));
                out
            }
            Stmt::Return(Some(mut expr)) => {
                let mut out = self.top_level(&mut expr)?;
                out.push(Stmt::Return(Some(expr)));
                out
            }
            Stmt::Block(stmts) => {
                self.env.push();
                let result = self.block(stmts);
                self.env.pop();
                vec![Stmt::Block(result?)]
            }
            Stmt::If {
                mut cond,
                accept,
                reject,
            } => {
                let mut out = self.top_level(&mut cond)?;
                let accept = self.body(*accept)?;
                let reject = reject.map(|reject| self.body(*reject)).transpose()?;
                out.push(Stmt::If {
                    cond,
                    accept,
                    reject,
                });
                out
            }
            Stmt::Switch {
                mut selector,
                mut cases,
            } => {
                let mut out = self.top_level(&mut selector)?;
                self.env.push();
                let result = cases.iter_mut().try_for_each(|case| {
                    case.body = self.block(std::mem::take(&mut case.body))?;
                    Ok::<_, PassError>(())
                });
                self.env.pop();
                result?;
                out.push(Stmt::Switch { selector, cases });
                out
            }
            Stmt::While { mut cond, body } => {
                let decls = self.top_level(&mut cond)?;
                let body = self.body(*body)?;
                if decls.is_empty() {
                    vec![Stmt::While { cond, body }]
                } else {
                    // the snapshot is retaken before every test
                    let mut stmts = decls;
                    stmts.push(break_unless(cond));
                    stmts.push(*body);
                    vec![Stmt::While {
                        cond: Expr::boolean(true),
                        body: Box::new(Stmt::Block(stmts)),
                    }]
                }
            }
            Stmt::DoWhile { body, mut cond } => {
                let body = self.body(*body)?;
                let decls = self.top_level(&mut cond)?;
                if decls.is_empty() {
                    vec![Stmt::DoWhile { body, cond }]
                } else {
                    let mut stmts = vec![*body];
                    stmts.extend(decls);
                    stmts.push(break_unless(cond));
                    vec![Stmt::DoWhile {
                        body: Box::new(Stmt::Block(stmts)),
                        cond: Expr::boolean(true),
                    }]
                }
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => {
                self.env.push();
                let result = self.for_loop(init, cond, step, body);
                self.env.pop();
                result?
            }
            stmt @ (Stmt::Break | Stmt::Continue | Stmt::Return(None)) => vec![stmt],
        })
    }

    fn for_loop(
        &mut self,
        init: Option<Box<Stmt>>,
        mut cond: Option<Expr>,
        mut step: Option<Expr>,
        body: Box<Stmt>,
    ) -> Result<Vec<Stmt>, PassError> {
        let mut init = match init {
            Some(init) => self.stmt(*init)?,
            None => Vec::new(),
        };
        let cond_decls = match &mut cond {
            Some(cond) => self.top_level(cond)?,
            None => Vec::new(),
        };
        let step_decls = match &mut step {
            Some(step) => self.top_level(step)?,
            None => Vec::new(),
        };
        let body = self.body(*body)?;

        if cond_decls.is_empty() && step_decls.is_empty() {
            // temporaries of the initializer only need to exist once
            let header = init.pop().map(Box::new);
            init.push(Stmt::For {
                init: header,
                cond,
                step,
                body,
            });
            return Ok(init);
        }

        // `for (init; cond; step) body` as `{ init; while (true) { ... } }`
        let mut looped = cond_decls;
        if let Some(cond) = cond {
            looped.push(break_unless(cond));
        }
        looped.push(*body);
        looped.extend(step_decls);
        looped.extend(step.map(Stmt::Expr));
        init.push(Stmt::While {
            cond: Expr::boolean(true),
            body: Box::new(Stmt::Block(looped)),
        });
        Ok(vec![Stmt::Block(init)])
    }
}

/// Makes the result of every function but the safe wrappers independent of
/// the order in which unsequenced operands are evaluated.
pub fn normalize_evaluation_order(
    mut ctx: GenerationContext,
) -> Result<GenerationContext, PassError> {
    let mut normalizer = Normalizer::new(TypeEnv::for_unit(&ctx.unit));
    for function in ctx.unit.functions_mut() {
        if is_wrapper_name(&function.proto.name) {
            continue;
        }
        normalizer.env.push();
        for param in &function.proto.params {
            normalizer.env.declare(&param.name, param.ty.into());
        }
        let result = normalizer.block(std::mem::take(&mut function.body));
        normalizer.env.pop();
        function.body = result?;
    }
    debug!("introduced {} temporaries", normalizer.issued.len());
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{
            printer::{print_stmt, print_unit},
            AssignOp, BasicType, BinaryOp, ExternalDecl, Param, ParamQualifier, Prototype, ScalarKind,
            UnifiedType,
        },
        passes::testutil::{decl, main_text, program},
    };

    fn ivec3() -> BasicType {
        BasicType::make_vector(ScalarKind::Int, 3)
    }

    fn normalized(ctx: GenerationContext) -> GenerationContext {
        normalize_evaluation_order(ctx).unwrap()
    }

    fn with_out_pair(mut ctx: GenerationContext) -> GenerationContext {
        let param = |name: &str| Param {
            qualifier: ParamQualifier::Out,
            ty: BasicType::INT,
            name: name.to_string(),
        };
        ctx.unit.decls.insert(
            0,
            ExternalDecl::Prototype(Prototype {
                name: "f".to_string(),
                ret: None,
                params: vec![param("x"), param("y")],
            }),
        );
        ctx
    }

    #[test]
    fn read_after_write_in_initializer_uses_snapshot() {
        let arr = UnifiedType::array(ivec3(), std::num::NonZeroU32::new(2).unwrap());
        let init = Expr::construct(
            arr,
            vec![
                Expr::assign(AssignOp::Add, Expr::var("var_0"), Expr::int(2)),
                Expr::var("var_0"),
            ],
        );
        let ctx = normalized(program(vec![
            decl(ivec3(), "var_0", Some(Expr::construct(ivec3(), vec![Expr::int(1)]))),
            decl(arr, "var_1", Some(init)),
        ]));
        assert_eq!(
            main_text(&ctx),
            "ivec3 var_0 = ivec3(1);\n\
             ivec3 var_0_init_0_temp_read = var_0;\n\
             ivec3 var_1[2] = ivec3[2](var_0 += 2, var_0_init_0_temp_read);\n"
        );
    }

    #[test]
    fn snapshot_names_avoid_existing_variables() {
        let init = Expr::construct(
            ivec3(),
            vec![
                Expr::unary(UnaryOp::PreIncrement, Expr::var("var_0")),
                Expr::var("var_0"),
                Expr::var("var_0_init_0_temp_read"),
            ],
        );
        let ctx = normalized(program(vec![
            decl(BasicType::INT, "var_0", Some(Expr::int(0))),
            decl(BasicType::INT, "var_0_init_0_temp_read", Some(Expr::int(5))),
            decl(ivec3(), "var_1", Some(init)),
        ]));
        let text = main_text(&ctx);
        assert!(text.contains("int var_0_init_0_temp_read_1 = var_0;\n"));
        assert!(text.contains(
            "ivec3(++var_0, var_0_init_0_temp_read_1, var_0_init_0_temp_read)"
        ));
    }

    #[test]
    fn second_out_argument_is_redirected() {
        let call = Expr::call("f", vec![Expr::var("var_0"), Expr::var("var_0")]);
        let ctx = normalized(with_out_pair(program(vec![
            decl(BasicType::INT, "var_0", Some(Expr::int(0))),
            Stmt::Expr(call),
        ])));
        assert_eq!(
            main_text(&ctx),
            "int var_0 = 0;\nint var_0_func_0_temp_0 = var_0;\nf(var_0, var_0_func_0_temp_0);\n"
        );
    }

    #[test]
    fn every_read_of_a_group_shares_one_snapshot() {
        let init = Expr::construct(
            ivec3(),
            vec![
                Expr::unary(UnaryOp::PreIncrement, Expr::var("var_0")),
                Expr::var("var_0"),
                Expr::var("var_0"),
            ],
        );
        let ctx = normalized(program(vec![
            decl(BasicType::INT, "var_0", Some(Expr::int(0))),
            decl(ivec3(), "var_1", Some(init)),
        ]));
        let text = main_text(&ctx);
        assert_eq!(text.matches("int var_0_init_0_temp_read = var_0;").count(), 1);
        assert!(text.contains(
            "ivec3(++var_0, var_0_init_0_temp_read, var_0_init_0_temp_read)"
        ));
    }

    #[test]
    fn sequenced_operands_are_left_alone() {
        let both = Expr::binary(
            BinaryOp::LogicalAnd,
            Expr::binary(
                BinaryOp::Greater,
                Expr::unary(UnaryOp::PostIncrement, Expr::var("var_0")),
                Expr::int(1),
            ),
            Expr::binary(BinaryOp::Less, Expr::var("var_0"), Expr::int(4)),
        );
        let assign = Expr::assign(
            AssignOp::Assign,
            Expr::var("var_0"),
            Expr::binary(BinaryOp::Add, Expr::var("var_0"), Expr::int(1)),
        );
        let body = vec![
            decl(BasicType::INT, "var_0", Some(Expr::int(0))),
            decl(BasicType::BOOL, "var_1", Some(both)),
            Stmt::Expr(assign),
        ];
        let before: String = body.iter().map(print_stmt).collect();
        let ctx = normalized(program(body));
        assert_eq!(main_text(&ctx), before);
    }

    #[test]
    fn loop_condition_snapshots_are_retaken_each_iteration() {
        let cond = Expr::call(
            "g",
            vec![Expr::var("var_0"), Expr::var("var_0")],
        );
        let mut ctx = program(vec![
            decl(BasicType::INT, "var_0", Some(Expr::int(0))),
            Stmt::While {
                cond,
                body: Box::new(Stmt::Block(vec![Stmt::Break])),
            },
        ]);
        ctx.unit.decls.insert(
            0,
            ExternalDecl::Prototype(Prototype {
                name: "g".to_string(),
                ret: Some(BasicType::BOOL),
                params: vec![
                    Param {
                        qualifier: ParamQualifier::Inout,
                        ty: BasicType::INT,
                        name: "x".to_string(),
                    },
                    Param {
                        qualifier: ParamQualifier::In,
                        ty: BasicType::INT,
                        name: "y".to_string(),
                    },
                ],
            }),
        );
        let ctx = normalized(ctx);
        let main = &ctx.unit.main().unwrap().body;
        let Stmt::While { cond, body } = &main[1] else {
            panic!("expected a while loop, got {:?}", main[1]);
        };
        assert_eq!(*cond, Expr::boolean(true));
        let stmts = match body.as_ref() {
            Stmt::Block(stmts) => stmts,
            other => panic!("expected a block, got {other:?}"),
        };
        assert_eq!(print_stmt(&stmts[0]), "int var_0_func_0_temp_read = var_0;\n");
        assert!(print_stmt(&stmts[1]).starts_with("if (!(g(var_0, var_0_func_0_temp_read)))"));
        assert_eq!(stmts[2], Stmt::Block(vec![Stmt::Break]));
    }

    #[test]
    fn wrapped_programs_stay_normalized() {
        let self_divide = Expr::assign(AssignOp::Divide, Expr::var("var_0"), Expr::var("var_0"));
        let shifted = Expr::binary(
            BinaryOp::ShiftLeft,
            Expr::unary(UnaryOp::PostIncrement, Expr::var("var_1")),
            Expr::var("var_1"),
        );
        let ctx = program(vec![
            decl(BasicType::INT, "var_0", Some(Expr::int(7))),
            decl(BasicType::INT, "var_1", Some(Expr::int(1))),
            Stmt::Expr(self_divide),
            decl(ivec3(), "var_2", Some(Expr::construct(ivec3(), vec![shifted, Expr::int(0)]))),
        ]);
        let normalized_once = normalized(ctx);
        let wrapped = crate::passes::wrappers::safe_wrappers(normalized_once).unwrap();
        let before = main_text(&wrapped);
        assert!(before.contains("SAFE_DIV_ASSIGN(var_0, var_0);"));
        let again = normalized(wrapped);
        assert_eq!(main_text(&again), before);
    }

    #[test]
    fn normalizing_twice_changes_nothing() {
        let call = Expr::call("f", vec![Expr::var("var_0"), Expr::var("var_0")]);
        let init = Expr::construct(
            ivec3(),
            vec![
                Expr::assign(AssignOp::Multiply, Expr::var("var_0"), Expr::int(2)),
                Expr::var("var_0"),
                Expr::unary(UnaryOp::PostDecrement, Expr::var("var_0")),
            ],
        );
        let ctx = with_out_pair(program(vec![
            decl(BasicType::INT, "var_0", Some(Expr::int(0))),
            Stmt::Expr(call),
            decl(ivec3(), "var_1", Some(init)),
        ]));
        let once = normalized(ctx);
        let first = print_unit(&once.unit);
        assert!(first.contains("var_0_init_0_temp_0--"));
        let twice = normalized(once);
        assert_eq!(print_unit(&twice.unit), first);
    }
}
