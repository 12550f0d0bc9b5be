//! The rewrite pipeline run over every generated program. Each stage takes
//! the generation context by value and hands it to the next one.

pub mod arrayindex;
pub mod evalorder;
pub mod looplimit;
pub mod validate;
mod walk;
pub mod wrappers;

#[cfg(test)]
pub(crate) mod testutil;

use log::debug;
use serde::Deserialize;

pub use arrayindex::IndexMode;
pub use looplimit::LimiterMode;
pub use wrappers::WrapperMode;

use crate::{error::PassError, generator::GenerationContext};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    EvalOrder,
    LoopLimiter,
    SafeWrappers,
    SafeIndexing,
}

/// Which stages a run applies.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum Extent {
    #[default]
    Full,
    /// Evaluation order and loop limits.
    Core,
    /// Safe wrappers and array indexing.
    Extra,
}

impl Extent {
    pub fn stages(self) -> &'static [Stage] {
        match self {
            Self::Full => &[
                Stage::EvalOrder,
                Stage::LoopLimiter,
                Stage::SafeWrappers,
                Stage::SafeIndexing,
            ],
            Self::Core => &[Stage::EvalOrder, Stage::LoopLimiter],
            Self::Extra => &[Stage::SafeWrappers, Stage::SafeIndexing],
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all(deserialize = "camelCase"), default)]
pub struct PipelineConfig {
    pub extent: Extent,
    /// Iterations a loop (or all loops, with the global limiter) may run.
    pub loop_budget: u32,
    pub limiter: LimiterMode,
    pub index_mode: IndexMode,
    #[serde(skip)]
    pub wrapper_mode: WrapperMode,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            extent: Extent::Full,
            loop_budget: 10,
            limiter: LimiterMode::Global,
            index_mode: IndexMode::Clamp,
            wrapper_mode: WrapperMode::Plain,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn with_extent(mut self, extent: Extent) -> Self {
        self.config.extent = extent;
        self
    }

    pub fn with_wrapper_mode(mut self, mode: WrapperMode) -> Self {
        self.config.wrapper_mode = mode;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run_stage(
        &self,
        stage: Stage,
        ctx: GenerationContext,
    ) -> Result<GenerationContext, PassError> {
        debug!("running {stage:?}");
        Ok(match stage {
            Stage::EvalOrder => evalorder::normalize_evaluation_order(ctx)?,
            Stage::LoopLimiter => {
                looplimit::limit_loops(ctx, self.config.limiter, self.config.loop_budget)
            }
            Stage::SafeWrappers => wrappers::safe_wrappers(ctx)?,
            Stage::SafeIndexing => arrayindex::safe_indexing(ctx, self.config.index_mode)?,
        })
    }

    /// Applies the configured stages in order, then emits the wrappers they
    /// asked for.
    pub fn run(&self, mut ctx: GenerationContext) -> Result<GenerationContext, PassError> {
        if ctx.unit.main_index().is_none() {
            return Err(PassError::MissingMain);
        }
        for stage in self.config.extent.stages() {
            ctx = self.run_stage(*stage, ctx)?;
        }
        wrappers::realize_wrappers(ctx, &self.config.wrapper_mode)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use super::*;
    use crate::{
        generator::ProgramGenerator,
        ir::{
            iter::StatementVisitor,
            printer::{print_stmt, print_unit},
            BasicType, BinaryOp, Expr, Stmt, UnifiedType,
        },
        passes::testutil::{decl, main_text, program},
        randomext::UniformRandom,
        GeneratorConfig,
    };

    fn sample() -> GenerationContext {
        let arr = UnifiedType::array(BasicType::INT, NonZeroU32::new(3).unwrap());
        program(vec![
            decl(arr, "var_0", None),
            decl(
                BasicType::INT,
                "var_1",
                Some(Expr::binary(
                    BinaryOp::Divide,
                    Expr::index(Expr::var("var_0"), Expr::int(4)),
                    Expr::int(0),
                )),
            ),
            Stmt::While {
                cond: Expr::boolean(true),
                body: Box::new(Stmt::Block(vec![])),
            },
        ])
    }

    #[test]
    fn full_run_applies_every_stage() {
        let ctx = Pipeline::new(PipelineConfig::default()).run(sample()).unwrap();
        let text = main_text(&ctx);
        assert!(text.contains("int var_1 = SAFE_DIV(var_0[clamp(4, 0, var_0.length() - 1)], 0);"));
        assert!(text.contains("global_limiter++;"));
        assert!(print_unit(&ctx.unit).contains("int SAFE_DIV(int A, int B) {"));
    }

    #[test]
    fn extents_select_stages() {
        let core = Pipeline::new(PipelineConfig::default())
            .with_extent(Extent::Core)
            .run(sample())
            .unwrap();
        let text = main_text(&core);
        assert!(text.contains("var_0[4] / 0"));
        assert!(text.contains("global_limiter++;"));

        let extra = Pipeline::new(PipelineConfig::default())
            .with_extent(Extent::Extra)
            .run(sample())
            .unwrap();
        let text = main_text(&extra);
        assert!(text.contains("SAFE_DIV("));
        assert!(!text.contains("limiter"));
    }

    #[test]
    fn program_without_main_is_rejected() {
        let ctx = GenerationContext::new([1, 1, 1]);
        assert!(matches!(
            Pipeline::new(PipelineConfig::default()).run(ctx),
            Err(PassError::MissingMain)
        ));
    }

    #[test]
    fn config_reads_camel_case_yaml() {
        let config: PipelineConfig =
            serde_yaml::from_str("loopBudget: 3\nlimiter: local\nindexMode: modulo\n").unwrap();
        assert_eq!(config.loop_budget, 3);
        assert_eq!(config.limiter, LimiterMode::Local);
        assert_eq!(config.index_mode, IndexMode::Modulo);
        assert_eq!(config.extent, Extent::Full);
    }

    #[test]
    fn generated_programs_survive_the_pipeline() {
        let generator = ProgramGenerator::new(GeneratorConfig::default());
        let pipeline = Pipeline::new(PipelineConfig::default());
        for seed in 0..8 {
            let mut rng = UniformRandom::with_seed(seed);
            let ctx = generator.generate(&mut rng).unwrap();
            let ctx = pipeline.run(ctx).unwrap();
            let main = ctx.unit.main().unwrap();
            let mut loops = 0;
            let mut guarded = 0;
            main.visit_statements(|stmt: &Stmt| {
                match stmt {
                    Stmt::While { body, .. }
                    | Stmt::DoWhile { body, .. }
                    | Stmt::For { body, .. } => {
                        loops += 1;
                        if first_statement(body).starts_with("global_limiter++;") {
                            guarded += 1;
                        }
                    }
                    _ => {}
                }
                true
            });
            assert_eq!(loops, guarded, "seed {seed}");
        }
    }

    fn first_statement(body: &Stmt) -> String {
        match body {
            Stmt::Block(stmts) => stmts.first().map(print_stmt).unwrap_or_default(),
            other => print_stmt(other),
        }
    }
}
