use super::operator::{Operator, OperatorRegistry};
use crate::error::{GraphError, Result};
use crate::storage::Storage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named comparison rule evaluated against storage
///
/// Evaluates `operator(storage.get(name) or default, target)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub name: String,
    pub default: Value,
    pub operator: Operator,
    pub target: Value,
}

/// Serialized form of a [`Condition`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionRecord {
    pub name: String,
    #[serde(default)]
    pub val: Value,
    #[serde(default = "default_func")]
    pub func: String,
    #[serde(default)]
    pub val2: Value,
}

fn default_func() -> String {
    "eq".to_string()
}

impl Condition {
    pub fn new(
        name: impl Into<String>,
        default: impl Into<Value>,
        operator: Operator,
        target: impl Into<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            default: default.into(),
            operator,
            target: target.into(),
        }
    }

    /// `name == target`, with a null default
    pub fn equals(name: impl Into<String>, target: impl Into<Value>) -> Self {
        Self::new(name, Value::Null, Operator::eq(), target)
    }

    /// Check the rule against storage. Pure; absent keys use the default.
    pub fn evaluate(&self, storage: &dyn Storage) -> bool {
        let value = storage.get_or(&self.name, &self.default);
        self.operator.apply(value, &self.target)
    }

    pub fn dump(&self) -> ConditionRecord {
        ConditionRecord {
            name: self.name.clone(),
            val: self.default.clone(),
            func: self.operator.name().to_string(),
            val2: self.target.clone(),
        }
    }

    pub fn load(record: &ConditionRecord, operators: &OperatorRegistry) -> Result<Self> {
        Ok(Self {
            name: record.name.clone(),
            default: record.val.clone(),
            operator: operators.resolve(&record.func)?,
            target: record.val2.clone(),
        })
    }

    /// Load straight from a JSON value
    pub fn from_value(value: Value, operators: &OperatorRegistry) -> Result<Self> {
        let record: ConditionRecord = serde_json::from_value(value)
            .map_err(|e| GraphError::malformed("condition", e))?;
        Self::load(&record, operators)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn storage(value: Value) -> serde_json::Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("storage fixture must be an object"),
        }
    }

    #[test]
    fn test_missing_key_uses_default() {
        let condition = Condition::new("score", 0, Operator::ge(), 50);
        let empty: HashMap<String, Value> = HashMap::new();

        assert!(!condition.evaluate(&empty));
        assert!(condition.evaluate(&storage(json!({"score": 75}))));
    }

    #[test]
    fn test_equals_string() {
        let condition = Condition::equals("status", "A");

        assert!(condition.evaluate(&storage(json!({"status": "A"}))));
        assert!(!condition.evaluate(&storage(json!({"status": "B"}))));
        assert!(!condition.evaluate(&storage(json!({}))));
    }

    #[test]
    fn test_dump_format() {
        let condition = Condition::new("score", 0, Operator::ge(), 50);
        let dumped = serde_json::to_value(condition.dump()).unwrap();

        assert_eq!(
            dumped,
            json!({"name": "score", "val": 0, "func": "ge", "val2": 50})
        );
    }

    #[test]
    fn test_load_dump_symmetry() {
        let registry = OperatorRegistry::new();
        let condition = Condition::new("tags", json!([]), Operator::contains(), "urgent");

        let loaded = Condition::load(&condition.dump(), &registry).unwrap();
        assert_eq!(loaded, condition);
    }

    #[test]
    fn test_load_defaults() {
        let registry = OperatorRegistry::new();
        let condition = Condition::from_value(json!({"name": "flag"}), &registry).unwrap();

        assert_eq!(condition.operator, Operator::eq());
        assert_eq!(condition.default, Value::Null);
        assert_eq!(condition.target, Value::Null);
        assert!(condition.evaluate(&storage(json!({}))));
    }

    #[test]
    fn test_load_unknown_operator_fails() {
        let registry = OperatorRegistry::new();
        let result = Condition::from_value(
            json!({"name": "x", "val": 0, "func": "roughly", "val2": 1}),
            &registry,
        );

        assert!(matches!(result, Err(GraphError::UnknownOperator(_))));
    }

    #[test]
    fn test_load_missing_name_is_malformed() {
        let registry = OperatorRegistry::new();
        let result = Condition::from_value(json!({"func": "eq"}), &registry);

        assert!(matches!(result, Err(GraphError::MalformedRecord { .. })));
    }
}
