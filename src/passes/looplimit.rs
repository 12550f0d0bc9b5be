use serde::Deserialize;

use crate::{
    generator::GenerationContext,
    ir::{
        iter::StatementVisitorMut, BasicType, BinaryOp, Expr, ExternalDecl, Stmt, UnaryOp,
        VarDecl,
    },
};

pub const GLOBAL_LIMITER: &str = "global_limiter";
const LOCAL_LIMITER_PREFIX: &str = "local_limiter_";

/// Whether all loops share one iteration budget or each gets its own.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum LimiterMode {
    #[default]
    Global,
    Local,
}

fn is_limiter(name: &str) -> bool {
    name == GLOBAL_LIMITER || name.starts_with(LOCAL_LIMITER_PREFIX)
}

fn is_guarded(body: &Stmt) -> bool {
    let Stmt::Block(stmts) = body else {
        return false;
    };
    matches!(
        stmts.first(),
        Some(Stmt::Expr(Expr::Unary {
            op: UnaryOp::PostIncrement,
            expr,
        })) if matches!(expr.as_ref(), Expr::Var(name) if is_limiter(name))
    )
}

/// `counter++; if (counter > budget) break;` in front of `body`.
fn guard(body: &mut Box<Stmt>, counter: &str, budget: u32) {
    let original = std::mem::replace(body.as_mut(), Stmt::Break);
    let mut stmts = vec![
        Stmt::Expr(Expr::unary(UnaryOp::PostIncrement, Expr::var(counter))),
        Stmt::If {
            cond: Expr::binary(
                BinaryOp::Greater,
                Expr::var(counter),
                Expr::int(budget as i32),
            ),
            accept: Box::new(Stmt::Break),
            reject: None,
        },
    ];
    stmts.extend(original.into_block());
    **body = Stmt::Block(stmts);
}

fn declared_globals(ctx: &GenerationContext) -> Vec<String> {
    ctx.unit
        .decls
        .iter()
        .filter_map(|decl| match decl {
            ExternalDecl::Global(var) => Some(var.name.clone()),
            _ => None,
        })
        .collect()
}

/// Bounds the iterations of every loop by `budget`, counted either across
/// all loops or per loop. The counters are `int` globals initialized to 0,
/// declared ahead of the functions.
pub fn limit_loops(mut ctx: GenerationContext, mode: LimiterMode, budget: u32) -> GenerationContext {
    let existing = declared_globals(&ctx);
    let mut next_local = existing
        .iter()
        .filter_map(|name| name.strip_prefix(LOCAL_LIMITER_PREFIX)?.parse::<u32>().ok())
        .map(|idx| idx + 1)
        .max()
        .unwrap_or(0);

    let mut counters = Vec::new();
    ctx.unit.visit_statements_mut(|stmt: &mut Stmt| {
        if let Some(body) = stmt.loop_body_mut() {
            if !is_guarded(body) {
                let counter = match mode {
                    LimiterMode::Global => GLOBAL_LIMITER.to_string(),
                    LimiterMode::Local => {
                        let name = format!("{LOCAL_LIMITER_PREFIX}{next_local}");
                        next_local += 1;
                        name
                    }
                };
                guard(body, &counter, budget);
                counters.push(counter);
            }
        }
        true
    });
    counters.dedup();

    let decls: Vec<_> = counters
        .into_iter()
        .filter(|name| !existing.contains(name))
        .map(|name| {
            ExternalDecl::Global(VarDecl {
                ty: BasicType::INT.into(),
                name,
                init: Some(Expr::int(0)),
            })
        })
        .collect();
    let at = ctx
        .unit
        .decls
        .iter()
        .position(|decl| matches!(decl, ExternalDecl::Prototype(_) | ExternalDecl::Function(_)))
        .unwrap_or(ctx.unit.decls.len());
    ctx.unit.decls.splice(at..at, decls);
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{printer::print_unit, ScalarKind},
        passes::testutil::{decl, main_text, program},
    };

    fn ivec2() -> BasicType {
        BasicType::make_vector(ScalarKind::Int, 2)
    }

    fn forever(body: Vec<Stmt>) -> Stmt {
        Stmt::While {
            cond: Expr::boolean(true),
            body: Box::new(Stmt::Block(body)),
        }
    }

    fn ivec2_decl(name: &str) -> Stmt {
        decl(
            ivec2(),
            name,
            Some(Expr::construct(ivec2(), vec![Expr::int(0)])),
        )
    }

    #[test]
    fn global_limiter_guards_a_while_loop() {
        let ctx = limit_loops(
            program(vec![forever(vec![ivec2_decl("var_0")])]),
            LimiterMode::Global,
            10,
        );
        assert_eq!(
            main_text(&ctx),
            "while (true) {\n    global_limiter++;\n    if (global_limiter > 10)\n        break;\n    ivec2 var_0 = ivec2(0);\n}\n"
        );
        assert_eq!(
            ctx.unit.decls[0],
            ExternalDecl::Global(VarDecl {
                ty: BasicType::INT.into(),
                name: GLOBAL_LIMITER.to_string(),
                init: Some(Expr::int(0)),
            })
        );
        assert!(print_unit(&ctx.unit).contains("int global_limiter = 0;\n\nvoid main()"));
    }

    #[test]
    fn local_limiters_are_numbered_per_loop() {
        let inner = Stmt::For {
            init: Some(Box::new(decl(BasicType::INT, "i", Some(Expr::int(0))))),
            cond: Some(Expr::binary(BinaryOp::Less, Expr::var("i"), Expr::int(3))),
            step: Some(Expr::unary(UnaryOp::PostIncrement, Expr::var("i"))),
            body: Box::new(Stmt::Break),
        };
        let outer = Stmt::DoWhile {
            body: Box::new(Stmt::Block(vec![inner])),
            cond: Expr::boolean(false),
        };
        let ctx = limit_loops(program(vec![outer]), LimiterMode::Local, 4);
        let text = main_text(&ctx);
        assert!(text.contains("local_limiter_0++;"));
        assert!(text.contains("if (local_limiter_1 > 4)"));
        let globals = declared_globals(&ctx);
        assert_eq!(globals, vec!["local_limiter_0", "local_limiter_1"]);
    }

    #[test]
    fn limiting_twice_adds_nothing() {
        for mode in [LimiterMode::Global, LimiterMode::Local] {
            let once = limit_loops(
                program(vec![forever(vec![]), forever(vec![Stmt::Break])]),
                mode,
                10,
            );
            let text = print_unit(&once.unit);
            let twice = limit_loops(once, mode, 10);
            assert_eq!(print_unit(&twice.unit), text);
        }
    }

    #[test]
    fn new_local_counters_follow_existing_ones() {
        let once = limit_loops(program(vec![forever(vec![])]), LimiterMode::Local, 2);
        let mut ctx = once;
        if let Some(ExternalDecl::Function(main)) = ctx.unit.decls.last_mut() {
            main.body.push(forever(vec![]));
        }
        let ctx = limit_loops(ctx, LimiterMode::Local, 2);
        assert_eq!(
            declared_globals(&ctx),
            vec!["local_limiter_0", "local_limiter_1"]
        );
    }
}
