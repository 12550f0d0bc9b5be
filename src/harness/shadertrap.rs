use std::fmt::Write;

use regex::Regex;

use super::{assemble_buffers, embedded_span, Harness};
use crate::{
    error::HarnessError,
    generator::GenerationContext,
    ir::{printer::print_unit, Buffer, ScalarKind},
};

const SHADER_START: &str = "DECLARE_SHADER shader KIND COMPUTE\n";

#[derive(Debug, Clone, Copy, Default)]
pub struct ShaderTrap;

fn kind_name(kind: ScalarKind) -> &'static str {
    match kind {
        ScalarKind::Uint => "uint",
        ScalarKind::Float => "float",
        ScalarKind::Int | ScalarKind::Bool => "int",
    }
}

/// `int 1 2 uint 3`: the values of `buffer`, with a type word in front of
/// every run of equally typed ones.
fn init_values(buffer: &Buffer) -> String {
    let mut out = String::new();
    let mut current = None;
    for (kind, value) in buffer.typed_values() {
        let name = kind_name(kind);
        if current != Some(name) {
            if current.is_some() {
                out.push(' ');
            }
            out.push_str(name);
            current = Some(name);
        }
        write!(out, " {value}").expect("writing to a String cannot fail");
    }
    out
}

/// `"buffer_1 " int 2 uint 1`: the dump layout of `buffer`.
fn dump_format(buffer: &Buffer) -> String {
    let mut out = format!("\"{} \"", buffer.name);
    for ty in &buffer.member_types {
        write!(
            out,
            " {} {}",
            kind_name(ty.element().kind),
            ty.array_length().unwrap_or(1)
        )
        .expect("writing to a String cannot fail");
    }
    out
}

impl Harness for ShaderTrap {
    fn extension(&self) -> &'static str {
        "shadertrap"
    }

    fn print_harness(&self, ctx: &GenerationContext) -> String {
        let mut out = String::from("GL 4.5\n\n");
        out.push_str(SHADER_START);
        out.push_str(&print_unit(&ctx.unit));
        out.push_str("END\n\n");
        out.push_str("COMPILE_SHADER shader_compiled SHADER shader\n");
        out.push_str("CREATE_PROGRAM compute_prog SHADERS shader_compiled\n");
        for buffer in ctx.buffers() {
            write!(
                out,
                "\nCREATE_BUFFER {name} SIZE_BYTES {size} INIT_VALUES {values}\n\
                 BIND_SHADER_STORAGE_BUFFER BUFFER {name} BINDING {binding}\n",
                name = buffer.name,
                size = buffer.size_bytes(),
                values = init_values(buffer),
                binding = buffer.binding,
            )
            .expect("writing to a String cannot fail");
        }
        out.push_str("\nRUN_COMPUTE\n    PROGRAM compute_prog\n    NUM_GROUPS 1 1 1\n");
        for buffer in ctx.buffers().iter().filter(|b| !b.is_input) {
            write!(
                out,
                "\nDUMP_BUFFER_TEXT BUFFER {name} FILE \"{name}.txt\" FORMAT {format}\n",
                name = buffer.name,
                format = dump_format(buffer),
            )
            .expect("writing to a String cannot fail");
        }
        out
    }

    fn shader_code(&self, text: &str) -> Result<String, HarnessError> {
        Ok(text[embedded_span(text, SHADER_START)?].to_string())
    }

    fn change_shader(&self, text: &str, glsl: &str) -> Result<String, HarnessError> {
        let span = embedded_span(text, SHADER_START)?;
        let mut out = String::with_capacity(text.len());
        out.push_str(&text[..span.start]);
        out.push_str(glsl);
        if !glsl.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&text[span.end..]);
        Ok(out)
    }

    fn buffers(&self, text: &str) -> Result<Vec<Buffer>, HarnessError> {
        let glsl = self.shader_code(text)?;
        assemble_buffers(&glsl, |block| {
            let line = Regex::new(&format!(
                r"CREATE_BUFFER {} SIZE_BYTES \d+ INIT_VALUES ([^\n]*)",
                regex::escape(&block.name)
            ))
            .expect("escaped name forms a valid regex");
            let caps = line
                .captures(text)
                .ok_or_else(|| HarnessError::Buffer(format!("no CREATE_BUFFER for `{}`", block.name)))?;
            caps[1]
                .split_whitespace()
                .filter(|token| !matches!(*token, "int" | "uint" | "float"))
                .map(|token| {
                    token
                        .parse::<i64>()
                        .map_err(|_| HarnessError::Buffer(format!("bad value `{token}`")))
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::tests::sample;

    #[test]
    fn harness_lists_buffers_and_dumps_outputs() {
        let text = ShaderTrap.print_harness(&sample());
        assert!(text.starts_with("GL 4.5\n\nDECLARE_SHADER shader KIND COMPUTE\n#version 450\n"));
        assert!(text.contains(
            "CREATE_BUFFER buffer_0 SIZE_BYTES 12 INIT_VALUES int -7 uint 1 4294967295\n\
             BIND_SHADER_STORAGE_BUFFER BUFFER buffer_0 BINDING 0\n"
        ));
        assert!(text.contains(
            "DUMP_BUFFER_TEXT BUFFER buffer_1 FILE \"buffer_1.txt\" FORMAT \"buffer_1 \" int 1\n"
        ));
        assert!(!text.contains("DUMP_BUFFER_TEXT BUFFER buffer_0"));
    }

    #[test]
    fn shader_and_buffers_are_read_back() {
        let ctx = sample();
        let text = ShaderTrap.print_harness(&ctx);
        assert_eq!(ShaderTrap.shader_code(&text).unwrap(), print_unit(&ctx.unit));
        assert_eq!(ShaderTrap.buffers(&text).unwrap(), ctx.buffers());
    }

    #[test]
    fn changing_the_shader_keeps_the_rest() {
        let text = ShaderTrap.print_harness(&sample());
        let changed = ShaderTrap
            .change_shader(&text, "#version 450\nvoid main() {}\n")
            .unwrap();
        assert_eq!(
            ShaderTrap.shader_code(&changed).unwrap(),
            "#version 450\nvoid main() {}\n"
        );
        let tail = |t: &str| t[t.find("END\n").unwrap()..].to_string();
        assert_eq!(tail(&changed), tail(&text));
    }

    #[test]
    fn text_without_shader_is_rejected() {
        assert!(matches!(
            ShaderTrap.shader_code("GL 4.5\n"),
            Err(HarnessError::MissingMarker(SHADER_START))
        ));
    }
}
