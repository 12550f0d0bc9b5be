use std::{fs, path::Path};

use serde::Deserialize;

use crate::{error::Error, generator::GeneratorConfig, passes::PipelineConfig};

/// Contents of a `--config` file: one section per phase, each optional.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct RunConfig {
    pub generator: GeneratorConfig,
    pub pipeline: PipelineConfig,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let file = fs::File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::{Extent, IndexMode};

    #[test]
    fn sections_are_independent() {
        let config: RunConfig = serde_yaml::from_str(
            "generator:\n  maxExprDepth: 2\npipeline:\n  extent: core\n  indexMode: modulo\n",
        )
        .unwrap();
        assert_eq!(config.generator.max_expr_depth, 2);
        assert_eq!(config.pipeline.extent, Extent::Core);
        assert_eq!(config.pipeline.index_mode, IndexMode::Modulo);
        assert_eq!(config.pipeline.loop_budget, 10);

        let empty: RunConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(empty.generator.max_scope_depth, 3);
    }
}
