//! Test-harness adapters. A harness embeds the printed shader together with
//! the buffers it reads and writes; both formats are handled through the
//! [`Harness`] trait.

mod amber;
mod shadertrap;

use std::{num::NonZeroU32, sync::OnceLock};

use regex::Regex;

pub use amber::Amber;
pub use shadertrap::ShaderTrap;

use crate::{
    error::HarnessError,
    generator::GenerationContext,
    ir::{BasicType, Buffer, UnifiedType},
};

pub trait Harness {
    /// File extension of harnesses in this format, without the dot.
    fn extension(&self) -> &'static str;

    fn print_harness(&self, ctx: &GenerationContext) -> String;

    /// The GLSL source embedded in `text`.
    fn shader_code(&self, text: &str) -> Result<String, HarnessError>;

    /// `text` with its embedded shader replaced by `glsl`.
    fn change_shader(&self, text: &str, glsl: &str) -> Result<String, HarnessError>;

    fn buffers(&self, text: &str) -> Result<Vec<Buffer>, HarnessError>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum HarnessKind {
    #[default]
    Shadertrap,
    Amber,
}

impl HarnessKind {
    pub fn build(self) -> Box<dyn Harness> {
        match self {
            Self::Shadertrap => Box::new(ShaderTrap),
            Self::Amber => Box::new(Amber),
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "shadertrap" => Some(Self::Shadertrap),
            "amber" => Some(Self::Amber),
            _ => None,
        }
    }
}

/// An interface block recovered from shader text.
#[derive(Debug, Clone, PartialEq)]
struct BlockLayout {
    name: String,
    binding: u32,
    layout: String,
    readonly: bool,
    members: Vec<(UnifiedType, String)>,
}

fn block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"layout\((\w+), binding = (\d+)\) (readonly )?buffer (\w+) \{([^}]*)\};",
        )
        .expect("static regex must compile")
    })
}

fn member_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\w+) (\w+)(?:\[(\d+)\])?;").expect("static regex must compile")
    })
}

fn parse_basic(name: &str) -> Option<BasicType> {
    BasicType::all().find(|ty| ty.to_string() == name)
}

fn parse_blocks(glsl: &str) -> Result<Vec<BlockLayout>, HarnessError> {
    block_regex()
        .captures_iter(glsl)
        .map(|caps| -> Result<BlockLayout, HarnessError> {
            let members = member_regex()
                .captures_iter(&caps[5])
                .map(|member| -> Result<(UnifiedType, String), HarnessError> {
                    let basic = parse_basic(&member[1]).ok_or_else(|| {
                        HarnessError::Buffer(format!("unknown member type `{}`", &member[1]))
                    })?;
                    let ty = match member.get(3) {
                        Some(len) => {
                            let len = len
                                .as_str()
                                .parse()
                                .ok()
                                .and_then(NonZeroU32::new)
                                .ok_or_else(|| {
                                    HarnessError::Buffer(format!("bad array length in `{}`", &member[0]))
                                })?;
                            UnifiedType::array(basic, len)
                        }
                        None => UnifiedType::basic(basic),
                    };
                    Ok((ty, member[2].to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(BlockLayout {
                name: caps[4].to_string(),
                binding: caps[2]
                    .parse()
                    .map_err(|_| HarnessError::Buffer(format!("bad binding `{}`", &caps[2])))?,
                layout: caps[1].to_string(),
                readonly: caps.get(3).is_some(),
                members,
            })
        })
        .collect()
}

/// Rebuilds the buffer table from the interface blocks of `glsl` and the
/// flat contents `values_of` finds in the harness for each buffer name.
fn assemble_buffers(
    glsl: &str,
    mut values_of: impl FnMut(&BlockLayout) -> Result<Vec<i64>, HarnessError>,
) -> Result<Vec<Buffer>, HarnessError> {
    parse_blocks(glsl)?
        .into_iter()
        .map(|block| -> Result<Buffer, HarnessError> {
            let values = values_of(&block)?;
            let expected: usize = block
                .members
                .iter()
                .map(|(ty, _)| ty.array_length().unwrap_or(1) as usize)
                .sum();
            if values.len() != expected {
                return Err(HarnessError::Buffer(format!(
                    "`{}` holds {} values, its members need {expected}",
                    block.name,
                    values.len()
                )));
            }
            let mut buffer = Buffer::new(block.name, block.binding, block.readonly);
            buffer.layout_qualifiers = block.layout;
            let mut rest = values.as_slice();
            for (ty, name) in block.members {
                let (head, tail) = rest.split_at(ty.array_length().unwrap_or(1) as usize);
                buffer.push_member(name, ty, head);
                rest = tail;
            }
            Ok(buffer)
        })
        .collect()
}

/// The text between `start` and the next `END` line, as a byte range.
fn embedded_span(
    text: &str,
    start: &'static str,
) -> Result<std::ops::Range<usize>, HarnessError> {
    let begin = text
        .find(start)
        .map(|at| at + start.len())
        .ok_or(HarnessError::MissingMarker(start))?;
    let len = text[begin..]
        .find("\nEND\n")
        .or_else(|| text[begin..].strip_suffix("\nEND").map(str::len))
        .ok_or(HarnessError::MissingMarker("END"))?;
    Ok(begin..begin + len + 1)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ir::{
        AssignOp, BinaryOp, Expr, ExternalDecl, FunctionDef, Prototype, ScalarKind, Stmt, VarDecl,
    };

    /// One input and one output buffer, and a `main` copying between them.
    pub(crate) fn sample() -> GenerationContext {
        let mut ctx = GenerationContext::new([1, 1, 1]);
        let mut input = Buffer::new("buffer_0", ctx.next_binding(), true);
        input.push_member("ext_0".to_string(), BasicType::INT.into(), &[-7]);
        input.push_member(
            "ext_1".to_string(),
            UnifiedType::array(BasicType::UINT, NonZeroU32::new(2).unwrap()),
            &[1, 4294967295],
        );
        ctx.add_buffer(input).unwrap();
        let mut output = Buffer::new("buffer_1", ctx.next_binding(), false);
        output.push_member("ext_2".to_string(), BasicType::INT.into(), &[0]);
        ctx.add_buffer(output).unwrap();
        let copy = Expr::assign(
            AssignOp::Assign,
            Expr::var("ext_2"),
            Expr::binary(BinaryOp::Add, Expr::var("ext_0"), Expr::int(1)),
        );
        ctx.unit.decls.push(ExternalDecl::Function(FunctionDef {
            proto: Prototype {
                name: "main".to_string(),
                ret: None,
                params: Vec::new(),
            },
            body: vec![
                Stmt::Decl(VarDecl {
                    ty: BasicType::make_vector(ScalarKind::Int, 2).into(),
                    name: "var_0".to_string(),
                    init: None,
                }),
                Stmt::Expr(copy),
            ],
        }));
        ctx
    }

    #[test]
    fn blocks_are_recovered_from_glsl() {
        let glsl = crate::ir::printer::print_unit(&sample().unit);
        let blocks = parse_blocks(&glsl).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].name, "buffer_0");
        assert!(blocks[0].readonly);
        assert_eq!(blocks[0].layout, "std430");
        assert_eq!(
            blocks[0].members[1],
            (
                UnifiedType::array(BasicType::UINT, NonZeroU32::new(2).unwrap()),
                "ext_1".to_string()
            )
        );
        assert_eq!(blocks[1].binding, 1);
        assert!(!blocks[1].readonly);
    }

    #[test]
    fn value_count_must_match_members() {
        let glsl = crate::ir::printer::print_unit(&sample().unit);
        let result = assemble_buffers(&glsl, |_| Ok(vec![1]));
        assert!(matches!(result, Err(HarnessError::Buffer(_))));
    }

    #[test]
    fn missing_end_marker_is_reported() {
        assert!(matches!(
            embedded_span("SHADER\nvoid main() {}\n", "SHADER\n"),
            Err(HarnessError::MissingMarker("END"))
        ));
    }
}
