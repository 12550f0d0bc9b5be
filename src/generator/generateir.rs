use std::num::NonZeroU32;

use log::debug;

use super::{
    config::{GeneratorConfig, MinMax},
    context::{GenerationContext, GenerationMode},
    statement::StatementKind,
    strategy::{DefaultTypeStrategy, TypeStrategy},
};
use crate::{
    error::GenError,
    ir::{
        BasicType, Buffer, ExternalDecl, FunctionDef, Literal, Prototype, ScalarKind, Stmt,
        UnifiedType,
    },
    randomext::{Randomness, RandomnessExt},
};

/// Inclusive-exclusive literal range of every element kind.
pub(super) fn literal_range(kind: ScalarKind) -> (i64, i64) {
    match kind {
        ScalarKind::Int => (i32::MIN as i64, i32::MAX as i64 + 1),
        ScalarKind::Uint => (0, u32::MAX as i64 + 1),
        ScalarKind::Bool => (0, 2),
        // integral floats stay exact
        ScalarKind::Float => (-(1 << 16), (1 << 16) + 1),
    }
}

/// Generation state of the function body being built.
pub struct FunctionGenCtx<'a> {
    pub config: &'a GeneratorConfig,
    pub rng: &'a mut dyn Randomness,
    pub strategy: &'a dyn TypeStrategy,
    pub state: &'a mut GenerationContext,
}

impl std::fmt::Debug for FunctionGenCtx<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionGenCtx")
            .field("scope_depth", &self.state.scope.depth())
            .field("counters", &self.state.counters)
            .finish()
    }
}

impl<'a> FunctionGenCtx<'a> {
    pub fn new(
        config: &'a GeneratorConfig,
        rng: &'a mut dyn Randomness,
        strategy: &'a dyn TypeStrategy,
        state: &'a mut GenerationContext,
    ) -> Self {
        Self {
            config,
            rng,
            strategy,
            state,
        }
    }

    /// Runs `f` with `mode` switched on or off, restoring the previous
    /// flags afterwards.
    pub fn with_mode<T>(
        &mut self,
        mode: GenerationMode,
        on: bool,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        let saved = self.state.mode;
        self.state.mode.set(mode, on);
        let out = f(self);
        self.state.mode = saved;
        out
    }

    /// Runs `f` one expression level deeper.
    pub fn deeper<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.state.counters.expr_depth += 1;
        let out = f(self);
        self.state.counters.expr_depth -= 1;
        out
    }

    pub fn can_open_scope(&self) -> bool {
        self.state.scope.depth() < self.config.max_scope_depth as usize
    }

    /// A block of `len` statements in a fresh scope.
    pub fn generate_scope(&mut self, len: MinMax<u32>) -> Result<Vec<Stmt>, GenError> {
        self.state.scope.push();
        let count = len.choose(self.rng);
        let body = (0..count)
            .map(|_| self.generate_statement())
            .collect::<Result<Vec<_>, _>>();
        self.state.scope.pop()?;
        body
    }

    pub fn generate_statement(&mut self) -> Result<Stmt, GenError> {
        let can_recurse = self.can_open_scope();
        let mut weights: Vec<u32> = StatementKind::ALL
            .iter()
            .map(|kind| {
                if kind.may_recurse() && !can_recurse {
                    0
                } else {
                    self.config.statement_weight_map.weight(*kind)
                }
            })
            .collect();
        loop {
            self.state.counters.expr_depth = 0;
            // a declaration is always possible
            let kind = self
                .rng
                .weighted(&weights)
                .map_or(StatementKind::Declaration, |idx| StatementKind::ALL[idx]);
            if let Some(stmt) = kind.generate(self)? {
                return Ok(stmt);
            }
            weights[kind as usize] = 0;
        }
    }

    /// A biased literal of the element kind of `kind`.
    pub fn scalar_literal(&mut self, kind: ScalarKind) -> Literal {
        let (lo, hi) = if self.state.mode.contains(GenerationMode::SHIFT_OPERAND)
            && kind.is_integer()
        {
            (0, 40)
        } else {
            literal_range(kind)
        };
        Literal::of_kind(kind, self.rng.value_between(lo, hi))
    }
}

/// Builds whole programs: buffers, then the body of `main`.
#[derive(Debug)]
pub struct ProgramGenerator {
    config: GeneratorConfig,
    strategy: Box<dyn TypeStrategy>,
}

impl ProgramGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self::with_strategy(config, Box::new(DefaultTypeStrategy))
    }

    pub fn with_strategy(config: GeneratorConfig, strategy: Box<dyn TypeStrategy>) -> Self {
        Self { config, strategy }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn generate(&self, rng: &mut dyn Randomness) -> Result<GenerationContext, GenError> {
        let mut state = GenerationContext::new(self.config.local_size);
        let inputs = self.config.input_buffers.choose(rng);
        let outputs = self.config.output_buffers.choose(rng);
        let kinds = std::iter::repeat(true)
            .take(inputs as usize)
            .chain(std::iter::repeat(false).take(outputs as usize));
        for is_input in kinds {
            self.generate_buffer(&mut state, rng, is_input)?;
        }

        let body = {
            let mut ctx = FunctionGenCtx::new(&self.config, rng, self.strategy.as_ref(), &mut state);
            ctx.generate_scope(self.config.scope_statements)?
        };
        debug!(
            "generated {} buffers and {} top-level statements",
            state.buffers().len(),
            body.len()
        );
        state.unit.decls.push(ExternalDecl::Function(FunctionDef {
            proto: Prototype {
                name: "main".to_string(),
                ret: None,
                params: Vec::new(),
            },
            body,
        }));
        Ok(state)
    }

    fn generate_buffer(
        &self,
        state: &mut GenerationContext,
        rng: &mut dyn Randomness,
        is_input: bool,
    ) -> Result<(), GenError> {
        let binding = state.next_binding();
        let name = state.next_buffer_name();
        let mut buffer = Buffer::new(name, binding, is_input);
        let members = self.config.buffer_elements.choose(rng).max(1);
        for _ in 0..members {
            let kind = *rng.choose(&[ScalarKind::Int, ScalarKind::Uint]);
            let element = BasicType::scalar(kind);
            let ty = match NonZeroU32::new(self.config.max_array_length) {
                Some(max) if rng.boolean() => {
                    let len = rng.long_between(1, max.get() as i64 + 1) as u32;
                    UnifiedType::array(element, NonZeroU32::new(len).unwrap_or(max))
                }
                _ => UnifiedType::basic(element),
            };
            let (lo, hi) = literal_range(kind);
            let values: Vec<i64> = (0..ty.array_length().unwrap_or(1))
                .map(|_| rng.value_between(lo, hi))
                .collect();
            let member = state.next_member_name();
            buffer.push_member(member, ty, &values);
        }
        state.add_buffer(buffer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{printer::print_unit, typing::TypeEnv, Expr, Stmt},
        randomext::{scripted::ScriptedRandom, MultiRangeRandom, UniformRandom},
    };

    fn check_types(env: &mut TypeEnv, stmts: &[Stmt]) {
        for stmt in stmts {
            match stmt {
                Stmt::Decl(decl) => {
                    if let Some(init) = &decl.init {
                        let ty = env.infer(init).unwrap();
                        assert!(ty.same_shape(&decl.ty), "{} = {:?}", decl.ty, init);
                    }
                    env.declare(&decl.name, decl.ty);
                }
                Stmt::Expr(expr) => {
                    env.infer(expr).unwrap();
                }
                Stmt::Block(body) => {
                    env.push();
                    check_types(env, body);
                    env.pop();
                }
                Stmt::If {
                    cond,
                    accept,
                    reject,
                } => {
                    assert_eq!(env.infer_basic(cond).unwrap(), BasicType::BOOL);
                    check_types(env, std::slice::from_ref(accept.as_ref()));
                    if let Some(reject) = reject {
                        check_types(env, std::slice::from_ref(reject.as_ref()));
                    }
                }
                Stmt::Switch { selector, cases } => {
                    assert!(env.infer_basic(selector).unwrap().kind.is_integer());
                    for case in cases {
                        check_types(env, &case.body);
                    }
                }
                Stmt::While { cond, body } | Stmt::DoWhile { body, cond } => {
                    assert_eq!(env.infer_basic(cond).unwrap(), BasicType::BOOL);
                    check_types(env, std::slice::from_ref(body.as_ref()));
                }
                Stmt::For {
                    init,
                    cond,
                    step,
                    body,
                } => {
                    env.push();
                    if let Some(init) = init {
                        check_types(env, std::slice::from_ref(init.as_ref()));
                    }
                    if let Some(cond) = cond {
                        assert_eq!(env.infer_basic(cond).unwrap(), BasicType::BOOL);
                    }
                    if let Some(step) = step {
                        env.infer(step).unwrap();
                    }
                    check_types(env, std::slice::from_ref(body.as_ref()));
                    env.pop();
                }
                Stmt::Break | Stmt::Continue | Stmt::Return(_) => {}
            }
        }
    }

    #[test]
    fn generated_programs_are_well_typed() {
        let generator = ProgramGenerator::new(GeneratorConfig::default());
        for seed in 0..40 {
            let mut rng = MultiRangeRandom::with_seed(seed);
            let ctx = generator.generate(&mut rng).unwrap();
            let mut env = TypeEnv::for_unit(&ctx.unit);
            let main = ctx.unit.main().unwrap();
            env.push();
            check_types(&mut env, &main.body);
        }
    }

    #[test]
    fn buffers_precede_main() {
        let generator = ProgramGenerator::new(GeneratorConfig::default());
        let mut rng = UniformRandom::with_seed(11);
        let ctx = generator.generate(&mut rng).unwrap();
        let input_count = ctx.buffers().iter().filter(|b| b.is_input).count();
        assert!(input_count >= 1);
        assert!(ctx.buffers().iter().any(|b| !b.is_input));
        for (idx, buffer) in ctx.buffers().iter().enumerate() {
            assert_eq!(buffer.binding, idx as u32);
            assert_eq!(buffer.name, format!("buffer_{idx}"));
            assert!(!buffer.member_names.is_empty());
        }
        assert_eq!(ctx.unit.main_index(), Some(ctx.buffers().len()));
        let text = print_unit(&ctx.unit);
        assert!(text.starts_with("#version 450\n"));
        assert!(text.contains("layout(std430, binding = 0) readonly buffer buffer_0 {"));
    }

    #[test]
    fn scripted_program_is_exact() {
        let config = GeneratorConfig {
            input_buffers: MinMax { min: 1, max: 1 },
            output_buffers: MinMax { min: 0, max: 0 },
            buffer_elements: MinMax { min: 1, max: 1 },
            scope_statements: MinMax { min: 1, max: 1 },
            ..Default::default()
        };
        // one int member holding 7, then `int var_0 = -3;`
        let script = [
            0,                       // input buffers
            0,                       // output buffers
            0,                       // members
            0,                       // member kind: int
            0,                       // scalar member
            7 - i32::MIN as i64,     // member value 7
            0,                       // statement count
            0,                       // weighted pick: declaration
            0,                       // scalar kind: int
            0,                       // size 1
            9999,                    // not an array
            0,                       // terminate the expression
            0,                       // literal rather than a read of ext_0
            -(i32::MIN as i64) - 3,  // value -3
        ];
        let mut rng = ScriptedRandom::new(script);
        let ctx = ProgramGenerator::new(config).generate(&mut rng).unwrap();
        assert_eq!(ctx.buffers()[0].values, vec![7]);
        let main = ctx.unit.main().unwrap();
        match &main.body[..] {
            [Stmt::Decl(decl)] => {
                assert_eq!(decl.name, "var_0");
                assert_eq!(decl.ty, BasicType::INT.into());
                assert_eq!(decl.init, Some(Expr::int(-3)));
            }
            other => panic!("unexpected body {other:?}"),
        }
    }
}
