mod config;
mod context;
mod expression;
mod generateir;
mod scope;
mod statement;
mod strategy;

pub use config::{GeneratorConfig, MinMax, StatementWeightMap};
pub use context::{Counters, GenerationContext, GenerationMode, ProgramSnapshot};
pub use generateir::{FunctionGenCtx, ProgramGenerator};
pub use scope::{EntryId, Scope, ScopeEntry};
pub use statement::StatementKind;
pub use strategy::{BuiltinChoice, DefaultTypeStrategy, TypeStrategy};
