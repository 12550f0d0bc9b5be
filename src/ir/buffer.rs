use serde::{Deserialize, Serialize};

use super::{
    tree::InterfaceBlock,
    types::{Qualifiers, ScalarKind, UnifiedType},
};

/// A shader storage buffer as seen by both the shader and the harness.
///
/// `member_names` and `member_types` are parallel and in declaration order;
/// `values` is the row-major flattening of every member's contents.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Buffer {
    pub name: String,
    pub binding: u32,
    pub layout_qualifiers: String,
    pub interface_qualifier: String,
    pub member_names: Vec<String>,
    pub member_types: Vec<UnifiedType>,
    pub values: Vec<i64>,
    pub is_input: bool,
}

impl Buffer {
    pub fn new(name: impl Into<String>, binding: u32, is_input: bool) -> Self {
        Self {
            name: name.into(),
            binding,
            layout_qualifiers: "std430".to_string(),
            interface_qualifier: "buffer".to_string(),
            member_names: Vec::new(),
            member_types: Vec::new(),
            values: Vec::new(),
            is_input,
        }
    }

    pub fn push_member(&mut self, name: String, ty: UnifiedType, values: &[i64]) {
        assert_eq!(values.len(), ty.array_length().unwrap_or(1) as usize);
        self.member_names.push(name);
        self.member_types.push(ty);
        self.values.extend_from_slice(values);
    }

    /// Every member is a 4-byte scalar or an array of them under std430.
    pub fn size_bytes(&self) -> usize {
        self.values.len() * 4
    }

    /// The flat values grouped with the element kind of their member.
    pub fn typed_values(&self) -> impl Iterator<Item = (ScalarKind, i64)> + '_ {
        self.member_types
            .iter()
            .flat_map(|ty| {
                std::iter::repeat(ty.element().kind).take(ty.array_length().unwrap_or(1) as usize)
            })
            .zip(self.values.iter().copied())
    }

    pub fn member_qualifiers(&self) -> Qualifiers {
        if self.is_input {
            Qualifiers::READONLY
        } else {
            Qualifiers::empty()
        }
    }

    pub fn interface_block(&self) -> InterfaceBlock {
        InterfaceBlock {
            name: self.name.clone(),
            binding: self.binding,
            layout: self.layout_qualifiers.clone(),
            qualifiers: self.member_qualifiers(),
            members: self
                .member_types
                .iter()
                .map(|ty| ty.unqualified())
                .zip(self.member_names.iter().cloned())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use super::*;
    use crate::ir::BasicType;

    #[test]
    fn flattens_members_in_order() {
        let mut buffer = Buffer::new("buffer_0", 0, true);
        buffer.push_member("ext_0".into(), BasicType::INT.into(), &[7]);
        buffer.push_member(
            "ext_1".into(),
            UnifiedType::array(BasicType::UINT, NonZeroU32::new(2).unwrap()),
            &[1, 2],
        );
        assert_eq!(buffer.size_bytes(), 12);
        let typed: Vec<_> = buffer.typed_values().collect();
        assert_eq!(
            typed,
            vec![(ScalarKind::Int, 7), (ScalarKind::Uint, 1), (ScalarKind::Uint, 2)]
        );
        let block = buffer.interface_block();
        assert_eq!(block.qualifiers, Qualifiers::READONLY);
        assert_eq!(block.members[1].1, "ext_1");
    }
}
