//! GLSL text for the IR. Parentheses are added only where operator
//! precedence requires them; `Expr::Paren` nodes always print theirs.

use std::fmt::Write;

use super::{
    tree::{
        Expr, ExternalDecl, FunctionDef, InterfaceBlock, Literal, ParamQualifier, Prototype, Stmt,
        TranslationUnit, VarDecl,
    },
    types::UnifiedType,
};

const INDENT: &str = "    ";

const PREC_COMMA: u8 = 0;
const PREC_ASSIGN: u8 = 1;
const PREC_TERNARY: u8 = 2;
const PREC_PREFIX: u8 = 15;
const PREC_POSTFIX: u8 = 16;
const PREC_PRIMARY: u8 = 17;

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Literal(Literal::Int(v)) if *v < 0 => PREC_PREFIX,
        Expr::Literal(Literal::Float(v)) if v.is_sign_negative() => PREC_PREFIX,
        Expr::Literal(_)
        | Expr::Var(_)
        | Expr::Paren(_)
        | Expr::Call { .. }
        | Expr::Construct { .. } => PREC_PRIMARY,
        Expr::Index { .. } | Expr::Swizzle { .. } | Expr::Length(_) => PREC_POSTFIX,
        Expr::Unary { op, .. } if op.is_postfix() => PREC_POSTFIX,
        Expr::Unary { .. } => PREC_PREFIX,
        Expr::Binary { op, .. } => op.precedence(),
        Expr::Ternary { .. } => PREC_TERNARY,
        Expr::Assign { .. } => PREC_ASSIGN,
    }
}

fn write_literal(out: &mut String, literal: &Literal) {
    match literal {
        Literal::Int(v) => write!(out, "{v}"),
        Literal::Uint(v) => write!(out, "{v}u"),
        Literal::Bool(v) => write!(out, "{v}"),
        Literal::Float(v) => write!(out, "{v:?}"),
    }
    .expect("writing to a String cannot fail");
}

fn write_args(out: &mut String, args: &[Expr]) {
    out.push('(');
    for (idx, arg) in args.iter().enumerate() {
        if idx > 0 {
            out.push_str(", ");
        }
        write_expr(out, arg, PREC_ASSIGN);
    }
    out.push(')');
}

fn write_expr(out: &mut String, expr: &Expr, min_prec: u8) {
    let wrap = precedence(expr) < min_prec;
    if wrap {
        out.push('(');
    }
    match expr {
        Expr::Literal(literal) => write_literal(out, literal),
        Expr::Var(name) => out.push_str(name),
        Expr::Index { base, index } => {
            write_expr(out, base, PREC_POSTFIX);
            out.push('[');
            write_expr(out, index, PREC_COMMA);
            out.push(']');
        }
        Expr::Swizzle { base, letters } => {
            write_expr(out, base, PREC_POSTFIX);
            out.push('.');
            out.push_str(letters.as_str());
        }
        Expr::Length(base) => {
            write_expr(out, base, PREC_POSTFIX);
            out.push_str(".length()");
        }
        Expr::Unary { op, expr } if op.is_postfix() => {
            write_expr(out, expr, PREC_POSTFIX);
            out.push_str(op.symbol());
        }
        Expr::Unary { op, expr } => {
            out.push_str(op.symbol());
            let mut operand = String::new();
            write_expr(&mut operand, expr, PREC_PREFIX);
            if operand.starts_with(['-', '+']) {
                write!(out, "({operand})").expect("writing to a String cannot fail");
            } else {
                out.push_str(&operand);
            }
        }
        Expr::Binary { op, left, right } => {
            let prec = op.precedence();
            write_expr(out, left, prec);
            if op.is_sequenced() && prec == PREC_COMMA {
                out.push_str(", ");
            } else {
                write!(out, " {} ", op.symbol()).expect("writing to a String cannot fail");
            }
            write_expr(out, right, prec + 1);
        }
        Expr::Assign { op, target, value } => {
            write_expr(out, target, PREC_PREFIX);
            write!(out, " {} ", op.symbol()).expect("writing to a String cannot fail");
            write_expr(out, value, PREC_ASSIGN);
        }
        Expr::Ternary {
            cond,
            accept,
            reject,
        } => {
            write_expr(out, cond, PREC_TERNARY + 1);
            out.push_str(" ? ");
            write_expr(out, accept, PREC_COMMA);
            out.push_str(" : ");
            write_expr(out, reject, PREC_ASSIGN);
        }
        Expr::Paren(inner) => {
            out.push('(');
            write_expr(out, inner, PREC_COMMA);
            out.push(')');
        }
        Expr::Call { callee, args } => {
            out.push_str(callee);
            write_args(out, args);
        }
        Expr::Construct { ty, args } => {
            out.push_str(&ty.basic.to_string());
            if let Some(len) = ty.array_len {
                write!(out, "[{len}]").expect("writing to a String cannot fail");
            }
            write_args(out, args);
        }
    }
    if wrap {
        out.push(')');
    }
}

pub fn print_expr(expr: &Expr) -> String {
    let mut out = String::new();
    write_expr(&mut out, expr, PREC_COMMA);
    out
}

fn declarator(ty: &UnifiedType, name: &str) -> String {
    let mut out = String::new();
    if !ty.qualifiers.is_empty() {
        write!(out, "{} ", ty.qualifiers).expect("writing to a String cannot fail");
    }
    write!(out, "{} {}", ty.basic, name).expect("writing to a String cannot fail");
    if let Some(len) = ty.array_len {
        write!(out, "[{len}]").expect("writing to a String cannot fail");
    }
    out
}

fn var_decl(decl: &VarDecl) -> String {
    let mut out = declarator(&decl.ty, &decl.name);
    if let Some(init) = &decl.init {
        out.push_str(" = ");
        write_expr(&mut out, init, PREC_ASSIGN);
    }
    out.push(';');
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn write_block(out: &mut String, stmts: &[Stmt], depth: usize) {
    out.push_str("{\n");
    for stmt in stmts {
        write_stmt(out, stmt, depth + 1);
    }
    indent(out, depth);
    out.push('}');
}

/// Writes a loop or branch body right after its header.
fn write_body(out: &mut String, body: &Stmt, depth: usize) {
    match body {
        Stmt::Block(stmts) => {
            out.push(' ');
            write_block(out, stmts, depth);
            out.push('\n');
        }
        other => {
            out.push('\n');
            write_stmt(out, other, depth + 1);
        }
    }
}

fn write_stmt(out: &mut String, stmt: &Stmt, depth: usize) {
    indent(out, depth);
    match stmt {
        Stmt::Decl(decl) => {
            out.push_str(&var_decl(decl));
            out.push('\n');
        }
        Stmt::Expr(expr) => {
            write_expr(out, expr, PREC_COMMA);
            out.push_str(";\n");
        }
        Stmt::Block(stmts) => {
            write_block(out, stmts, depth);
            out.push('\n');
        }
        Stmt::If {
            cond,
            accept,
            reject,
        } => {
            write!(out, "if ({})", print_expr(cond)).expect("writing to a String cannot fail");
            write_body(out, accept, depth);
            if let Some(reject) = reject {
                indent(out, depth);
                out.push_str("else");
                write_body(out, reject, depth);
            }
        }
        Stmt::Switch { selector, cases } => {
            writeln!(out, "switch ({}) {{", print_expr(selector))
                .expect("writing to a String cannot fail");
            for case in cases {
                indent(out, depth + 1);
                match &case.label {
                    Some(label) => {
                        out.push_str("case ");
                        write_literal(out, label);
                        out.push_str(":\n");
                    }
                    None => out.push_str("default:\n"),
                }
                for stmt in &case.body {
                    write_stmt(out, stmt, depth + 2);
                }
            }
            indent(out, depth);
            out.push_str("}\n");
        }
        Stmt::While { cond, body } => {
            write!(out, "while ({})", print_expr(cond)).expect("writing to a String cannot fail");
            write_body(out, body, depth);
        }
        Stmt::DoWhile { body, cond } => {
            out.push_str("do");
            match body.as_ref() {
                Stmt::Block(stmts) => {
                    out.push(' ');
                    write_block(out, stmts, depth);
                    out.push(' ');
                }
                other => {
                    out.push('\n');
                    write_stmt(out, other, depth + 1);
                    indent(out, depth);
                }
            }
            writeln!(out, "while ({});", print_expr(cond)).expect("writing to a String cannot fail");
        }
        Stmt::For {
            init,
            cond,
            step,
            body,
        } => {
            out.push_str("for (");
            match init.as_deref() {
                Some(Stmt::Decl(decl)) => out.push_str(&var_decl(decl)),
                Some(Stmt::Expr(expr)) => {
                    write_expr(out, expr, PREC_COMMA);
                    out.push(';');
                }
                _ => out.push(';'),
            }
            if let Some(cond) = cond {
                out.push(' ');
                write_expr(out, cond, PREC_COMMA);
            }
            out.push(';');
            if let Some(step) = step {
                out.push(' ');
                write_expr(out, step, PREC_COMMA);
            }
            out.push(')');
            write_body(out, body, depth);
        }
        Stmt::Break => out.push_str("break;\n"),
        Stmt::Continue => out.push_str("continue;\n"),
        Stmt::Return(None) => out.push_str("return;\n"),
        Stmt::Return(Some(expr)) => {
            writeln!(out, "return {};", print_expr(expr)).expect("writing to a String cannot fail");
        }
    }
}

pub fn print_stmt(stmt: &Stmt) -> String {
    let mut out = String::new();
    write_stmt(&mut out, stmt, 0);
    out
}

fn prototype_header(proto: &Prototype) -> String {
    let ret = proto
        .ret
        .map(|ty| ty.to_string())
        .unwrap_or_else(|| "void".to_string());
    let params: Vec<String> = proto
        .params
        .iter()
        .map(|param| {
            let qualifier = match param.qualifier {
                ParamQualifier::In => "",
                ParamQualifier::Out => "out ",
                ParamQualifier::Inout => "inout ",
            };
            format!("{qualifier}{} {}", param.ty, param.name)
        })
        .collect();
    format!("{ret} {}({})", proto.name, params.join(", "))
}

fn write_interface_block(out: &mut String, block: &InterfaceBlock) {
    write!(out, "layout({}, binding = {}) ", block.layout, block.binding)
        .expect("writing to a String cannot fail");
    if !block.qualifiers.is_empty() {
        write!(out, "{} ", block.qualifiers).expect("writing to a String cannot fail");
    }
    writeln!(out, "buffer {} {{", block.name).expect("writing to a String cannot fail");
    for (ty, name) in &block.members {
        writeln!(out, "{INDENT}{};", declarator(ty, name)).expect("writing to a String cannot fail");
    }
    out.push_str("};\n");
}

fn write_function(out: &mut String, function: &FunctionDef) {
    out.push_str(&prototype_header(&function.proto));
    out.push(' ');
    write_block(out, &function.body, 0);
    out.push('\n');
}

pub fn print_unit(unit: &TranslationUnit) -> String {
    let mut out = String::new();
    writeln!(out, "#version {}", unit.version).expect("writing to a String cannot fail");
    out.push('\n');
    let [x, y, z] = unit.local_size;
    writeln!(
        out,
        "layout(local_size_x = {x}, local_size_y = {y}, local_size_z = {z}) in;"
    )
    .expect("writing to a String cannot fail");
    for decl in &unit.decls {
        out.push('\n');
        match decl {
            ExternalDecl::Buffer(block) => write_interface_block(&mut out, block),
            ExternalDecl::Global(decl) => {
                out.push_str(&var_decl(decl));
                out.push('\n');
            }
            ExternalDecl::Prototype(proto) => {
                out.push_str(&prototype_header(proto));
                out.push_str(";\n");
            }
            ExternalDecl::Function(function) => write_function(&mut out, function),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use super::*;
    use crate::ir::{AssignOp, BasicType, BinaryOp, ScalarKind, UnaryOp};

    #[test]
    fn adds_parentheses_by_precedence() {
        let sum = Expr::binary(BinaryOp::Add, Expr::var("a"), Expr::var("b"));
        let product = Expr::binary(BinaryOp::Multiply, sum.clone(), Expr::var("c"));
        assert_eq!(print_expr(&product), "(a + b) * c");
        let right = Expr::binary(BinaryOp::Add, Expr::var("c"), sum.clone());
        assert_eq!(print_expr(&right), "c + (a + b)");
        let left = Expr::binary(BinaryOp::Add, sum, Expr::var("c"));
        assert_eq!(print_expr(&left), "a + b + c");
    }

    #[test]
    fn prints_assignments_inside_initializer_lists() {
        let ivec3 = BasicType::make_vector(ScalarKind::Int, 3);
        let init = Expr::construct(
            crate::ir::UnifiedType::array(ivec3, NonZeroU32::new(2).unwrap()),
            vec![
                Expr::assign(AssignOp::Add, Expr::var("var_0"), Expr::int(2)),
                Expr::var("var_0"),
            ],
        );
        assert_eq!(print_expr(&init), "ivec3[2](var_0 += 2, var_0)");
    }

    #[test]
    fn negation_of_negative_literal_is_parenthesized() {
        let expr = Expr::unary(UnaryOp::Negate, Expr::int(-5));
        assert_eq!(print_expr(&expr), "-(-5)");
        let post = Expr::unary(UnaryOp::PostIncrement, Expr::var("x"));
        assert_eq!(print_expr(&Expr::unary(UnaryOp::Negate, post)), "-x++");
    }

    #[test]
    fn prints_ternary_with_assignment_branches() {
        let expr = Expr::ternary(
            Expr::binary(BinaryOp::Equal, Expr::var("B"), Expr::int(0)),
            Expr::assign(AssignOp::Divide, Expr::var("A"), Expr::int(2)),
            Expr::assign(AssignOp::Divide, Expr::var("A"), Expr::var("B")),
        );
        assert_eq!(print_expr(&expr), "B == 0 ? A /= 2 : A /= B");
    }

    #[test]
    fn prints_loops_and_blocks() {
        let stmt = Stmt::While {
            cond: Expr::boolean(true),
            body: Box::new(Stmt::Block(vec![Stmt::Break])),
        };
        assert_eq!(print_stmt(&stmt), "while (true) {\n    break;\n}\n");
    }

    #[test]
    fn prints_unit_skeleton() {
        let mut unit = TranslationUnit::new([1, 1, 1]);
        unit.decls.push(ExternalDecl::Function(FunctionDef {
            proto: Prototype {
                name: "main".into(),
                ret: None,
                params: vec![],
            },
            body: vec![],
        }));
        let text = print_unit(&unit);
        assert!(text.starts_with("#version 450\n"));
        assert!(text.contains("layout(local_size_x = 1, local_size_y = 1, local_size_z = 1) in;"));
        assert!(text.contains("void main() {\n}"));
    }
}
