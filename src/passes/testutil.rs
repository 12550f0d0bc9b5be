use crate::{
    generator::GenerationContext,
    ir::{
        printer::print_stmt, Expr, ExternalDecl, FunctionDef, Prototype, Stmt, UnifiedType,
        VarDecl,
    },
};

pub(crate) fn decl(ty: impl Into<UnifiedType>, name: &str, init: Option<Expr>) -> Stmt {
    Stmt::Decl(VarDecl {
        ty: ty.into(),
        name: name.to_string(),
        init,
    })
}

pub(crate) fn void_proto(name: &str) -> Prototype {
    Prototype {
        name: name.to_string(),
        ret: None,
        params: Vec::new(),
    }
}

/// A program whose only function is `main` with `body`.
pub(crate) fn program(body: Vec<Stmt>) -> GenerationContext {
    let mut ctx = GenerationContext::new([1, 1, 1]);
    ctx.unit.decls.push(ExternalDecl::Function(FunctionDef {
        proto: void_proto("main"),
        body,
    }));
    ctx
}

pub(crate) fn main_text(ctx: &GenerationContext) -> String {
    ctx.unit
        .main()
        .expect("test programs have a main")
        .body
        .iter()
        .map(print_stmt)
        .collect()
}

pub(crate) fn function<'a>(ctx: &'a GenerationContext, name: &str) -> &'a FunctionDef {
    ctx.unit
        .decls
        .iter()
        .find_map(|decl| match decl {
            ExternalDecl::Function(f) if f.proto.name == name => Some(f),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no function {name}"))
}
