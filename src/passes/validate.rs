use naga::{
    front::glsl::{Frontend, Options},
    valid::{Capabilities, ValidationFlags, Validator},
    ShaderStage,
};

use crate::error::PassError;

/// Parses `source` as a compute shader with naga's GLSL frontend and runs
/// the IR validator over the result.
pub fn validate_glsl(source: &str) -> Result<(), PassError> {
    let module = Frontend::default()
        .parse(&Options::from(ShaderStage::Compute), source)
        .map_err(|errors| PassError::Validation(format!("{errors:?}")))?;
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|error| PassError::Validation(format!("{error:?}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{printer::print_unit, BasicType, BinaryOp, Expr},
        passes::testutil::{decl, program},
    };

    #[test]
    fn printed_program_is_accepted() {
        let sum = Expr::binary(BinaryOp::Add, Expr::int(1), Expr::int(2));
        let ctx = program(vec![decl(BasicType::INT, "var_0", Some(sum))]);
        validate_glsl(&print_unit(&ctx.unit)).unwrap();
    }

    #[test]
    fn undeclared_variable_is_rejected() {
        let ctx = program(vec![decl(BasicType::INT, "var_0", Some(Expr::var("nowhere")))]);
        assert!(matches!(
            validate_glsl(&print_unit(&ctx.unit)),
            Err(PassError::Validation(_))
        ));
    }
}
