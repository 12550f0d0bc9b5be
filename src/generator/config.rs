use serde::Deserialize;

use super::statement::StatementKind;
use crate::randomext::Randomness;

#[derive(Deserialize, Debug)]
struct MinMaxUnchecked<T>
where
    T: PartialOrd + std::fmt::Debug,
{
    min: T,
    max: T,
}

impl<T> TryFrom<MinMaxUnchecked<T>> for MinMax<T>
where
    T: PartialOrd + std::fmt::Debug,
{
    type Error = String;

    fn try_from(value: MinMaxUnchecked<T>) -> Result<Self, Self::Error> {
        if value.min <= value.max {
            Ok(Self {
                min: value.min,
                max: value.max,
            })
        } else {
            Err(format!(
                "Invalid min/max values {:?} {:?}",
                value.min, value.max
            ))
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(try_from = "MinMaxUnchecked<T>")]
pub struct MinMax<T>
where
    T: PartialOrd + std::fmt::Debug,
{
    pub min: T,
    pub max: T,
}

impl MinMax<u32> {
    /// Inclusive draw in `[min, max]`.
    pub fn choose(&self, rng: &mut dyn Randomness) -> u32 {
        rng.long_between(self.min as i64, self.max as i64 + 1) as u32
    }
}

/// Every budget bounding the size of one generated program.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all(deserialize = "camelCase"), default)]
pub struct GeneratorConfig {
    pub input_buffers: MinMax<u32>,
    pub output_buffers: MinMax<u32>,
    pub buffer_elements: MinMax<u32>,
    pub max_array_length: u32,
    pub max_expr_depth: u32,
    pub max_scope_depth: u32,
    pub scope_statements: MinMax<u32>,
    pub loop_statements: MinMax<u32>,
    pub switch_cases: MinMax<u32>,
    pub max_swizzle_depth: u32,
    pub shadowing_probability: f64,
    pub local_size: [u32; 3],
    pub statement_weight_map: StatementWeightMap,
}

#[derive(Debug, Clone)]
pub struct StatementWeightMap {
    pub weights: [u32; StatementKind::COUNT],
}

impl StatementWeightMap {
    pub fn weight(&self, kind: StatementKind) -> u32 {
        self.weights[kind as usize]
    }
}

impl<'de> Deserialize<'de> for StatementWeightMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct WeightMapVisitor;
        impl<'de> serde::de::Visitor<'de> for WeightMapVisitor {
            type Value = StatementWeightMap;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a statement generator weight map")
            }

            fn visit_map<V>(self, mut map: V) -> Result<StatementWeightMap, V::Error>
            where
                V: serde::de::MapAccess<'de>,
            {
                let mut weights = [None; StatementKind::COUNT];
                while let Some(key) = map.next_key::<StatementKind>()? {
                    weights[key as usize] = Some(map.next_value()?);
                }
                let mut resolved = [0; StatementKind::COUNT];
                for (slot, weight) in resolved.iter_mut().zip(weights) {
                    *slot = weight.ok_or_else(|| {
                        serde::de::Error::missing_field("Statement generator weight missing")
                    })?;
                }
                Ok(StatementWeightMap { weights: resolved })
            }
        }

        deserializer.deserialize_map(WeightMapVisitor)
    }
}

impl Default for StatementWeightMap {
    fn default() -> Self {
        let mut weights = [0; StatementKind::COUNT];
        weights[StatementKind::Declaration as usize] = 3;
        weights[StatementKind::Assignment as usize] = 6;
        weights[StatementKind::Expression as usize] = 1;
        weights[StatementKind::If as usize] = 2;
        weights[StatementKind::Switch as usize] = 1;
        weights[StatementKind::While as usize] = 1;
        weights[StatementKind::DoWhile as usize] = 1;
        weights[StatementKind::For as usize] = 1;
        Self { weights }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            input_buffers: MinMax { min: 1, max: 2 },
            output_buffers: MinMax { min: 1, max: 2 },
            buffer_elements: MinMax { min: 1, max: 4 },
            max_array_length: 5,
            max_expr_depth: 4,
            max_scope_depth: 3,
            scope_statements: MinMax { min: 1, max: 6 },
            loop_statements: MinMax { min: 1, max: 4 },
            switch_cases: MinMax { min: 1, max: 4 },
            max_swizzle_depth: 2,
            shadowing_probability: 0.1,
            local_size: [1, 1, 1],
            statement_weight_map: Default::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: GeneratorConfig =
            serde_yaml::from_str("maxExprDepth: 2\nscopeStatements: {min: 2, max: 3}\n").unwrap();
        assert_eq!(config.max_expr_depth, 2);
        assert_eq!(config.scope_statements.min, 2);
        assert_eq!(config.max_scope_depth, 3);
    }

    #[test]
    fn rejects_inverted_ranges() {
        let config: Result<GeneratorConfig, _> =
            serde_yaml::from_str("switchCases: {min: 5, max: 1}\n");
        assert!(config.is_err());
    }

    #[test]
    fn weight_map_requires_every_kind() {
        let partial: Result<StatementWeightMap, _> = serde_yaml::from_str("Assignment: 3\n");
        assert!(partial.is_err());
        let full: StatementWeightMap = serde_yaml::from_str(
            "Declaration: 1\nAssignment: 2\nExpression: 0\nIf: 1\nSwitch: 0\nWhile: 1\nDoWhile: 0\nFor: 0\n",
        )
        .unwrap();
        assert_eq!(full.weight(StatementKind::Assignment), 2);
        assert_eq!(full.weight(StatementKind::Switch), 0);
    }
}
