use std::{fmt, num::NonZeroU32};

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarKind {
    Int,
    Uint,
    Bool,
    Float,
}

impl ScalarKind {
    pub const ALL: [ScalarKind; 4] = [Self::Int, Self::Uint, Self::Bool, Self::Float];

    pub fn is_integer(self) -> bool {
        matches!(self, Self::Int | Self::Uint)
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::Bool)
    }

    fn scalar_name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Bool => "bool",
            Self::Float => "float",
        }
    }

    fn vector_prefix(self) -> &'static str {
        match self {
            Self::Int => "ivec",
            Self::Uint => "uvec",
            Self::Bool => "bvec",
            Self::Float => "vec",
        }
    }
}

/// Element kind times arity, `size == 1` being a scalar.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BasicType {
    pub kind: ScalarKind,
    pub size: u8,
}

impl BasicType {
    pub const INT: BasicType = BasicType::scalar(ScalarKind::Int);
    pub const UINT: BasicType = BasicType::scalar(ScalarKind::Uint);
    pub const BOOL: BasicType = BasicType::scalar(ScalarKind::Bool);
    pub const FLOAT: BasicType = BasicType::scalar(ScalarKind::Float);

    pub const fn scalar(kind: ScalarKind) -> Self {
        Self { kind, size: 1 }
    }

    pub fn make_vector(kind: ScalarKind, size: u8) -> Self {
        assert!((1..=4).contains(&size), "arity {size} out of range");
        Self { kind, size }
    }

    pub fn element_type(self) -> BasicType {
        Self::scalar(self.kind)
    }

    pub fn arity(self) -> u8 {
        self.size
    }

    pub fn is_vector(self) -> bool {
        self.size > 1
    }

    pub fn is_scalar(self) -> bool {
        self.size == 1
    }

    /// Same element kind, other arity.
    pub fn with_size(self, size: u8) -> Self {
        Self::make_vector(self.kind, size)
    }

    pub fn with_kind(self, kind: ScalarKind) -> Self {
        Self { kind, size: self.size }
    }

    /// Every basic type the generator knows about.
    pub fn all() -> impl Iterator<Item = BasicType> {
        ScalarKind::ALL
            .into_iter()
            .flat_map(|kind| (1..=4).map(move |size| BasicType { kind, size }))
    }
}

impl fmt::Display for BasicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.size == 1 {
            f.write_str(self.kind.scalar_name())
        } else {
            write!(f, "{}{}", self.kind.vector_prefix(), self.size)
        }
    }
}

bitflags::bitflags! {
    #[derive(Serialize, Deserialize, Default)]
    #[serde(transparent)]
    pub struct Qualifiers: u8 {
        const CONST = 0b0001;
        const READONLY = 0b0010;
        const WRITEONLY = 0b0100;
        const COHERENT = 0b1000;
    }
}

impl fmt::Display for Qualifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Qualifiers::CONST, "const"),
            (Qualifiers::COHERENT, "coherent"),
            (Qualifiers::READONLY, "readonly"),
            (Qualifiers::WRITEONLY, "writeonly"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    f.write_str(" ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// A basic type, optionally wrapped in one fixed-length array dimension and
/// optionally qualified.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UnifiedType {
    pub basic: BasicType,
    pub array_len: Option<NonZeroU32>,
    pub qualifiers: Qualifiers,
}

impl UnifiedType {
    pub fn basic(basic: BasicType) -> Self {
        Self {
            basic,
            array_len: None,
            qualifiers: Qualifiers::empty(),
        }
    }

    pub fn array(basic: BasicType, len: NonZeroU32) -> Self {
        Self {
            basic,
            array_len: Some(len),
            qualifiers: Qualifiers::empty(),
        }
    }

    pub fn qualified(mut self, qualifiers: Qualifiers) -> Self {
        self.qualifiers = qualifiers;
        self
    }

    pub fn is_array(&self) -> bool {
        self.array_len.is_some()
    }

    pub fn array_length(&self) -> Option<u32> {
        self.array_len.map(NonZeroU32::get)
    }

    /// The scalar/vector type of the value, or of one element for arrays.
    pub fn element(&self) -> BasicType {
        self.basic
    }

    /// The type as a plain basic value; `None` for arrays.
    pub fn as_basic(&self) -> Option<BasicType> {
        (!self.is_array()).then_some(self.basic)
    }

    pub fn is_writable(&self) -> bool {
        !self
            .qualifiers
            .intersects(Qualifiers::CONST | Qualifiers::READONLY)
    }

    /// Unqualified copy, used for snapshot temporaries.
    pub fn unqualified(&self) -> Self {
        Self {
            qualifiers: Qualifiers::empty(),
            ..*self
        }
    }

    /// Structural equality ignoring qualifiers.
    pub fn same_shape(&self, other: &UnifiedType) -> bool {
        self.basic == other.basic && self.array_len == other.array_len
    }
}

impl From<BasicType> for UnifiedType {
    fn from(value: BasicType) -> Self {
        Self::basic(value)
    }
}

impl fmt::Display for UnifiedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.qualifiers.is_empty() {
            write!(f, "{} ", self.qualifiers)?;
        }
        match self.array_len {
            Some(len) => write!(f, "{}[{}]", self.basic, len),
            None => write!(f, "{}", self.basic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glsl_names() {
        assert_eq!(BasicType::INT.to_string(), "int");
        assert_eq!(BasicType::make_vector(ScalarKind::Uint, 3).to_string(), "uvec3");
        assert_eq!(BasicType::make_vector(ScalarKind::Float, 4).to_string(), "vec4");
        assert_eq!(BasicType::make_vector(ScalarKind::Bool, 2).to_string(), "bvec2");
        let arr = UnifiedType::array(
            BasicType::make_vector(ScalarKind::Int, 3),
            NonZeroU32::new(2).unwrap(),
        );
        assert_eq!(arr.to_string(), "ivec3[2]");
        assert_eq!(
            UnifiedType::basic(BasicType::INT)
                .qualified(Qualifiers::READONLY)
                .to_string(),
            "readonly int"
        );
    }

    #[test]
    fn shape_queries() {
        let v = BasicType::make_vector(ScalarKind::Int, 3);
        assert!(v.is_vector());
        assert_eq!(v.element_type(), BasicType::INT);
        assert_eq!(v.arity(), 3);
        assert!(BasicType::BOOL.is_scalar());
        assert_eq!(BasicType::all().count(), 16);
    }

    #[test]
    fn writability_follows_qualifiers() {
        let ro = UnifiedType::basic(BasicType::INT).qualified(Qualifiers::READONLY);
        assert!(!ro.is_writable());
        assert!(ro.unqualified().is_writable());
        assert!(ro.same_shape(&UnifiedType::basic(BasicType::INT)));
    }
}
