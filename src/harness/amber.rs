use std::fmt::Write;

use regex::Regex;

use super::{assemble_buffers, embedded_span, Harness};
use crate::{
    error::HarnessError,
    generator::GenerationContext,
    ir::{printer::print_unit, Buffer, ScalarKind},
};

const SHADER_START: &str = "SHADER compute compute_shader GLSL\n";

#[derive(Debug, Clone, Copy, Default)]
pub struct Amber;

/// Amber buffers are declared as `uint32`, so signed values travel as their
/// two's complement bit pattern.
fn to_bits(value: i64) -> u32 {
    value as u32
}

fn from_bits(kind: ScalarKind, bits: u32) -> i64 {
    match kind {
        ScalarKind::Int | ScalarKind::Bool => bits as i32 as i64,
        ScalarKind::Uint | ScalarKind::Float => bits as i64,
    }
}

impl Harness for Amber {
    fn extension(&self) -> &'static str {
        "amber"
    }

    fn print_harness(&self, ctx: &GenerationContext) -> String {
        let mut out = String::from("#!amber\n\n");
        out.push_str(SHADER_START);
        out.push_str(&print_unit(&ctx.unit));
        out.push_str("END\n");
        for buffer in ctx.buffers() {
            let data = buffer
                .values
                .iter()
                .map(|value| to_bits(*value).to_string())
                .collect::<Vec<_>>()
                .join(" ");
            write!(
                out,
                "\nBUFFER {} DATA_TYPE uint32 DATA\n{data}\nEND\n",
                buffer.name
            )
            .expect("writing to a String cannot fail");
        }
        out.push_str("\nPIPELINE compute compute_pipeline\n  ATTACH compute_shader\n");
        for buffer in ctx.buffers() {
            writeln!(
                out,
                "  BIND BUFFER {} AS storage DESCRIPTOR_SET 0 BINDING {}",
                buffer.name, buffer.binding
            )
            .expect("writing to a String cannot fail");
        }
        out.push_str("END\n\nRUN compute_pipeline 1 1 1\n");
        out
    }

    fn shader_code(&self, text: &str) -> Result<String, HarnessError> {
        Ok(text[embedded_span(text, SHADER_START)?].to_string())
    }

    fn change_shader(&self, text: &str, glsl: &str) -> Result<String, HarnessError> {
        let span = embedded_span(text, SHADER_START)?;
        let glsl = if glsl.ends_with('\n') {
            glsl.to_string()
        } else {
            format!("{glsl}\n")
        };
        Ok(format!("{}{glsl}{}", &text[..span.start], &text[span.end..]))
    }

    fn buffers(&self, text: &str) -> Result<Vec<Buffer>, HarnessError> {
        let glsl = self.shader_code(text)?;
        assemble_buffers(&glsl, |block| {
            let data = Regex::new(&format!(
                r"BUFFER {} DATA_TYPE uint32 DATA\n([^\n]*)\nEND",
                regex::escape(&block.name)
            ))
            .expect("escaped name forms a valid regex");
            let caps = data
                .captures(text)
                .ok_or_else(|| HarnessError::Buffer(format!("no BUFFER for `{}`", block.name)))?;
            let kinds = block.members.iter().flat_map(|(ty, _)| {
                std::iter::repeat(ty.element().kind).take(ty.array_length().unwrap_or(1) as usize)
            });
            caps[1]
                .split_whitespace()
                .zip(kinds.chain(std::iter::repeat(ScalarKind::Uint)))
                .map(|(token, kind)| {
                    token
                        .parse::<u32>()
                        .map(|bits| from_bits(kind, bits))
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
    fn negative_values_are_stored_as_bit_patterns() {
        let text = Amber.print_harness(&sample());
        assert!(text.starts_with("#!amber\n\nSHADER compute compute_shader GLSL\n#version 450\n"));
        assert!(text.contains("BUFFER buffer_0 DATA_TYPE uint32 DATA\n4294967289 1 4294967295\nEND\n"));
        assert!(text.contains("  BIND BUFFER buffer_1 AS storage DESCRIPTOR_SET 0 BINDING 1\n"));
        assert!(text.ends_with("RUN compute_pipeline 1 1 1\n"));
    }

    #[test]
    fn shader_and_buffers_are_read_back() {
        let ctx = sample();
        let text = Amber.print_harness(&ctx);
        assert_eq!(Amber.shader_code(&text).unwrap(), print_unit(&ctx.unit));
        assert_eq!(Amber.buffers(&text).unwrap(), ctx.buffers());
    }

    #[test]
    fn changing_the_shader_keeps_the_buffers() {
        let ctx = sample();
        let text = Amber.print_harness(&ctx);
        let glsl = print_unit(&ctx.unit).replace("ext_0 + 1", "ext_0 + 2");
        let changed = Amber.change_shader(&text, &glsl).unwrap();
        assert_eq!(Amber.shader_code(&changed).unwrap(), glsl);
        assert_eq!(Amber.buffers(&changed).unwrap(), ctx.buffers());
    }

    #[test]
    fn short_buffer_data_is_rejected() {
        let text = Amber
            .print_harness(&sample())
            .replace("4294967289 1 4294967295", "4294967289 1");
        assert!(matches!(Amber.buffers(&text), Err(HarnessError::Buffer(_))));
    }
}
