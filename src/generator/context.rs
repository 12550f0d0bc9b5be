use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use super::scope::Scope;
use crate::{
    error::ScopeError,
    ir::{iter::StatementVisitor, Buffer, ExternalDecl, Stmt, TranslationUnit},
    passes::wrappers::WrapperObligation,
};

bitflags::bitflags! {
    /// Transient flags describing what the expression being generated is
    /// used for.
    #[derive(Default)]
    pub struct GenerationMode: u8 {
        const LVALUE = 0b001;
        const CONSTANT = 0b010;
        const SHIFT_OPERAND = 0b100;
    }
}

#[derive(Debug, Default, Clone)]
pub struct Counters {
    pub binding_offset: u32,
    pub buffer_offset: u32,
    pub member_offset: u32,
    pub variable_offset: u32,
    pub shadowed_offset: u32,
    pub expr_depth: u32,
    pub swizzle_depth: u32,
}

/// What is persisted next to an emitted harness and reloaded by the
/// post-processor.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProgramSnapshot {
    pub unit: TranslationUnit,
    pub buffers: Vec<Buffer>,
}

/// One past the highest `{prefix}N` among `names`.
fn next_index<S: AsRef<str>>(names: impl IntoIterator<Item = S>, prefix: &str) -> u32 {
    names
        .into_iter()
        .filter_map(|name| name.as_ref().strip_prefix(prefix)?.parse::<u32>().ok())
        .map(|idx| idx + 1)
        .max()
        .unwrap_or(0)
}

/// Every generated local (`var_N`) declaration of `unit`, repeats included.
fn declared_variables(unit: &TranslationUnit) -> Vec<String> {
    let mut names = Vec::new();
    unit.visit_statements(|stmt: &Stmt| {
        if let Stmt::Decl(var) = stmt {
            if var.name.starts_with("var_") {
                names.push(var.name.clone());
            }
        }
        true
    });
    names
}

/// Mutable state of one program: created empty, filled by the generator,
/// then threaded by value through every pipeline stage.
#[derive(Debug)]
pub struct GenerationContext {
    pub unit: TranslationUnit,
    pub scope: Scope,
    pub counters: Counters,
    pub mode: GenerationMode,
    buffers: Vec<Buffer>,
    obligations: Vec<WrapperObligation>,
    obligation_set: HashSet<WrapperObligation, ahash::RandomState>,
}

impl GenerationContext {
    pub fn new(local_size: [u32; 3]) -> Self {
        Self {
            unit: TranslationUnit::new(local_size),
            scope: Scope::default(),
            counters: Counters::default(),
            mode: GenerationMode::empty(),
            buffers: Vec::new(),
            obligations: Vec::new(),
            obligation_set: HashSet::default(),
        }
    }

    /// Rebuilds a context around a previously emitted program.
    pub fn from_snapshot(snapshot: ProgramSnapshot) -> Self {
        let mut ctx = Self::new(snapshot.unit.local_size);
        ctx.counters.binding_offset = snapshot
            .buffers
            .iter()
            .map(|b| b.binding + 1)
            .max()
            .unwrap_or(0);
        ctx.counters.buffer_offset = snapshot.buffers.len() as u32;
        ctx.counters.member_offset = next_index(
            snapshot.buffers.iter().flat_map(|b| b.member_names.iter()),
            "ext_",
        );
        let declared = declared_variables(&snapshot.unit);
        ctx.counters.variable_offset = next_index(&declared, "var_");
        let distinct: HashSet<&String, ahash::RandomState> = declared.iter().collect();
        ctx.counters.shadowed_offset = (declared.len() - distinct.len()) as u32;
        ctx.unit = snapshot.unit;
        ctx.buffers = snapshot.buffers;
        ctx
    }

    pub fn snapshot(&self) -> ProgramSnapshot {
        ProgramSnapshot {
            unit: self.unit.clone(),
            buffers: self.buffers.clone(),
        }
    }

    pub fn next_binding(&mut self) -> u32 {
        let binding = self.counters.binding_offset;
        self.counters.binding_offset += 1;
        binding
    }

    pub fn next_buffer_name(&mut self) -> String {
        let name = format!("buffer_{}", self.counters.buffer_offset);
        self.counters.buffer_offset += 1;
        name
    }

    pub fn next_member_name(&mut self) -> String {
        let name = format!("ext_{}", self.counters.member_offset);
        self.counters.member_offset += 1;
        name
    }

    pub fn next_variable_name(&mut self) -> String {
        let name = format!("var_{}", self.counters.variable_offset);
        self.counters.variable_offset += 1;
        name
    }

    pub fn buffers(&self) -> &[Buffer] {
        &self.buffers
    }

    pub fn buffer(&self, name: &str) -> Option<&Buffer> {
        self.buffers.iter().find(|b| b.name == name)
    }

    /// Adds `buffer` to the table, declares its members in the root scope
    /// and emits its interface block in front of every other declaration
    /// but the existing blocks.
    pub fn add_buffer(&mut self, buffer: Buffer) -> Result<(), ScopeError> {
        let qualifiers = buffer.member_qualifiers();
        for (name, ty) in buffer.member_names.iter().zip(&buffer.member_types) {
            self.scope
                .declare_buffer_variable(name, ty.qualified(qualifiers))?;
        }
        let at = self
            .unit
            .decls
            .iter()
            .take_while(|decl| matches!(decl, ExternalDecl::Buffer(_)))
            .count();
        self.unit
            .decls
            .insert(at, ExternalDecl::Buffer(buffer.interface_block()));
        self.buffers.push(buffer);
        Ok(())
    }

    /// Records a wrapper obligation; returns `false` if it was already
    /// known.
    pub fn require_wrapper(&mut self, obligation: WrapperObligation) -> bool {
        if self.obligation_set.insert(obligation) {
            self.obligations.push(obligation);
            true
        } else {
            false
        }
    }

    pub fn obligations(&self) -> &[WrapperObligation] {
        &self.obligations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        generator::{GeneratorConfig, ProgramGenerator},
        ir::BasicType,
        passes::wrappers::Operation,
        randomext::UniformRandom,
    };

    #[test]
    fn buffers_get_monotonic_bindings() {
        let mut ctx = GenerationContext::new([1, 1, 1]);
        for is_input in [true, false] {
            let binding = ctx.next_binding();
            let name = ctx.next_buffer_name();
            let mut buffer = Buffer::new(name, binding, is_input);
            let member = ctx.next_member_name();
            buffer.push_member(member, BasicType::INT.into(), &[3]);
            ctx.add_buffer(buffer).unwrap();
        }
        let bindings: Vec<u32> = ctx.buffers().iter().map(|b| b.binding).collect();
        assert_eq!(bindings, vec![0, 1]);
        assert_eq!(ctx.buffer("buffer_1").unwrap().member_names, vec!["ext_1"]);
        assert_eq!(ctx.unit.decls.len(), 2);
        assert!(!ctx.scope.entry(ctx.scope.lookup("ext_0").unwrap()).ty.is_writable());

        let restored = GenerationContext::from_snapshot(ctx.snapshot());
        assert_eq!(restored.counters.binding_offset, 2);
        assert_eq!(restored.buffers().len(), 2);
        assert_eq!(restored.counters.member_offset, 2);
    }

    #[test]
    fn restored_contexts_issue_unused_names() {
        let mut rng = UniformRandom::with_seed(3);
        let ctx = ProgramGenerator::new(GeneratorConfig::default())
            .generate(&mut rng)
            .unwrap();
        let snapshot = ctx.snapshot();
        let declared = declared_variables(&snapshot.unit);
        let members: Vec<String> = snapshot
            .buffers
            .iter()
            .flat_map(|b| b.member_names.clone())
            .collect();

        let mut restored = GenerationContext::from_snapshot(snapshot);
        let variable = restored.next_variable_name();
        assert!(!declared.contains(&variable), "{variable} reissued");
        let member = restored.next_member_name();
        assert!(!members.contains(&member), "{member} reissued");
        assert!(restored.counters.shadowed_offset <= ctx.counters.shadowed_offset);
    }

    #[test]
    fn obligations_are_deduplicated_in_order() {
        let mut ctx = GenerationContext::new([1, 1, 1]);
        let div = WrapperObligation::new(Operation::Div, BasicType::INT, Some(BasicType::INT));
        let abs = WrapperObligation::new(Operation::Abs, BasicType::INT, None);
        assert!(ctx.require_wrapper(div));
        assert!(ctx.require_wrapper(abs));
        assert!(!ctx.require_wrapper(div));
        assert_eq!(ctx.obligations(), &[div, abs]);
    }

    #[test]
    fn snapshots_survive_ron() {
        let mut rng = UniformRandom::with_seed(7);
        let ctx = ProgramGenerator::new(GeneratorConfig::default())
            .generate(&mut rng)
            .unwrap();
        let snapshot = ctx.snapshot();
        let text = ron::to_string(&snapshot).unwrap();
        let restored: ProgramSnapshot = ron::from_str(&text).unwrap();
        assert_eq!(restored, snapshot);
    }
}
