//! Lexical environment of the generator. Frames form a chain from the
//! current block back to the root frame, which holds the buffer-backed
//! variables.

use crate::{
    error::ScopeError,
    ir::{BasicType, UnifiedType},
};

#[derive(Clone, Debug, PartialEq)]
pub struct ScopeEntry {
    pub name: String,
    pub ty: UnifiedType,
    pub can_be_shadowed: bool,
    pub has_been_read: bool,
    pub has_been_written: bool,
}

impl ScopeEntry {
    pub fn is_array(&self) -> bool {
        self.ty.is_array()
    }

    /// Whether a value of `target` can be obtained from this entry by exact
    /// match, indexing an array or swizzling a vector.
    pub fn readable_as(&self, target: BasicType) -> bool {
        let element = self.ty.element();
        element.kind == target.kind && (element == target || element.is_vector())
    }

    /// Whether `target` can be assigned through this entry, possibly via an
    /// index and a distinct-letter swizzle.
    pub fn writable_as(&self, target: BasicType) -> bool {
        let element = self.ty.element();
        self.ty.is_writable()
            && element.kind == target.kind
            && (element == target || (element.is_vector() && target.size <= element.size))
    }
}

/// Handle to an entry: frame depth and position inside the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryId {
    depth: usize,
    slot: usize,
}

#[derive(Debug)]
pub struct Scope {
    frames: Vec<Vec<ScopeEntry>>,
}

impl Default for Scope {
    fn default() -> Self {
        Self {
            frames: vec![Vec::new()],
        }
    }
}

impl Scope {
    /// `depth == chain length - 1`, the root frame being depth 0.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn push(&mut self) {
        self.frames.push(Vec::new());
    }

    pub fn pop(&mut self) -> Result<(), ScopeError> {
        if self.frames.len() == 1 {
            return Err(ScopeError::PopRoot);
        }
        self.frames.pop();
        Ok(())
    }

    pub fn declare(
        &mut self,
        name: &str,
        ty: UnifiedType,
        can_be_shadowed: bool,
    ) -> Result<EntryId, ScopeError> {
        let depth = self.frames.len() - 1;
        let frame = self.frames.last_mut().expect("root frame is never popped");
        if frame.iter().any(|entry| entry.name == name) {
            return Err(ScopeError::Redeclared(name.to_string()));
        }
        frame.push(ScopeEntry {
            name: name.to_string(),
            ty,
            can_be_shadowed,
            has_been_read: false,
            has_been_written: false,
        });
        Ok(EntryId {
            depth,
            slot: frame.len() - 1,
        })
    }

    /// Declares a buffer-backed variable, which is only legal in the root
    /// frame.
    pub fn declare_buffer_variable(
        &mut self,
        name: &str,
        ty: UnifiedType,
    ) -> Result<EntryId, ScopeError> {
        if self.depth() != 0 {
            return Err(ScopeError::AlreadyDepth0Violation {
                name: name.to_string(),
                depth: self.depth(),
            });
        }
        self.declare(name, ty, false)
    }

    pub fn entry(&self, id: EntryId) -> &ScopeEntry {
        &self.frames[id.depth][id.slot]
    }

    pub fn mark_read(&mut self, id: EntryId) {
        self.frames[id.depth][id.slot].has_been_read = true;
    }

    pub fn mark_written(&mut self, id: EntryId) {
        self.frames[id.depth][id.slot].has_been_written = true;
    }

    /// Entries visible from the current frame; an inner declaration hides
    /// every outer one of the same name.
    fn visible(&self) -> impl Iterator<Item = (EntryId, &ScopeEntry)> {
        self.frames
            .iter()
            .enumerate()
            .rev()
            .flat_map(|(depth, frame)| {
                frame
                    .iter()
                    .enumerate()
                    .map(move |(slot, entry)| (EntryId { depth, slot }, entry))
            })
            .scan(Vec::<&str>::new(), |seen, (id, entry)| {
                let hidden = seen.contains(&entry.name.as_str());
                seen.push(entry.name.as_str());
                Some((!hidden).then_some((id, entry)))
            })
            .flatten()
    }

    pub fn lookup(&self, name: &str) -> Option<EntryId> {
        self.visible()
            .find(|(_, entry)| entry.name == name)
            .map(|(id, _)| id)
    }

    pub fn entries_readable_as(&self, target: BasicType) -> Vec<EntryId> {
        self.visible()
            .filter(|(_, entry)| entry.readable_as(target))
            .map(|(id, _)| id)
            .collect()
    }

    /// Assignment targets visible anywhere along the chain.
    pub fn entries_writable(&self) -> Vec<EntryId> {
        self.visible()
            .filter(|(_, entry)| entry.ty.is_writable())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn entries_writable_as(&self, target: BasicType) -> Vec<EntryId> {
        self.visible()
            .filter(|(_, entry)| entry.writable_as(target))
            .map(|(id, _)| id)
            .collect()
    }

    /// Outer-frame locals a declaration in the current frame may shadow.
    pub fn shadowable(&self) -> Vec<EntryId> {
        let current = self.depth();
        let local_names: Vec<&str> = self.frames[current]
            .iter()
            .map(|entry| entry.name.as_str())
            .collect();
        self.visible()
            .filter(|(id, entry)| {
                id.depth != current
                    && id.depth != 0
                    && entry.can_be_shadowed
                    && !local_names.contains(&entry.name.as_str())
            })
            .map(|(id, _)| id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use super::*;
    use crate::ir::{Qualifiers, ScalarKind};

    #[test]
    fn buffer_variables_only_at_root() {
        let mut scope = Scope::default();
        scope
            .declare_buffer_variable("ext_0", BasicType::INT.into())
            .unwrap();
        scope.push();
        assert_eq!(scope.depth(), 1);
        assert_eq!(
            scope.declare_buffer_variable("ext_1", BasicType::INT.into()),
            Err(ScopeError::AlreadyDepth0Violation {
                name: "ext_1".into(),
                depth: 1
            })
        );
        scope.pop().unwrap();
        assert_eq!(scope.pop(), Err(ScopeError::PopRoot));
    }

    #[test]
    fn readable_entries_include_swizzle_sources() {
        let mut scope = Scope::default();
        let ivec3 = BasicType::make_vector(ScalarKind::Int, 3);
        scope.push();
        let v = scope.declare("var_0", ivec3.into(), true).unwrap();
        let a = scope
            .declare(
                "var_1",
                UnifiedType::array(BasicType::INT, NonZeroU32::new(2).unwrap()),
                true,
            )
            .unwrap();
        scope.declare("var_2", BasicType::UINT.into(), true).unwrap();
        let readable = scope.entries_readable_as(BasicType::INT);
        assert!(readable.contains(&v));
        assert!(readable.contains(&a));
        assert_eq!(readable.len(), 2);
        let wide = scope.entries_readable_as(BasicType::make_vector(ScalarKind::Int, 4));
        assert_eq!(wide, vec![v]);
    }

    #[test]
    fn readonly_entries_are_not_writable() {
        let mut scope = Scope::default();
        scope
            .declare_buffer_variable(
                "ext_0",
                UnifiedType::basic(BasicType::INT).qualified(Qualifiers::READONLY),
            )
            .unwrap();
        let out = scope
            .declare_buffer_variable("ext_1", BasicType::INT.into())
            .unwrap();
        assert_eq!(scope.entries_writable(), vec![out]);
    }

    #[test]
    fn inner_declarations_hide_outer_ones() {
        let mut scope = Scope::default();
        scope.push();
        let outer = scope.declare("var_0", BasicType::INT.into(), true).unwrap();
        scope.push();
        assert_eq!(scope.shadowable(), vec![outer]);
        let inner = scope.declare("var_0", BasicType::FLOAT.into(), true).unwrap();
        assert_eq!(scope.lookup("var_0"), Some(inner));
        assert!(scope.entries_readable_as(BasicType::INT).is_empty());
        assert!(scope.shadowable().is_empty());
        scope.mark_written(inner);
        assert!(scope.entry(inner).has_been_written);
        assert!(!scope.entry(outer).has_been_written);
    }
}
