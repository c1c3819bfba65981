// Named binary predicates used by conditions

use crate::error::{GraphError, Result};
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// Binary predicate over a looked-up value and a target value
pub type Predicate = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// A comparison operator, identified by the name it is serialized under
#[derive(Clone)]
pub struct Operator {
    name: String,
    predicate: Predicate,
}

impl Operator {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, left: &Value, right: &Value) -> bool {
        (self.predicate)(left, right)
    }

    /// Look up a built-in operator by name
    pub fn builtin(name: &str) -> Option<Self> {
        let canonical = match name {
            "is" => "is_",
            other => other,
        };
        BUILTINS
            .iter()
            .find(|(builtin, _)| *builtin == canonical)
            .map(|(builtin, func)| Self::new(*builtin, *func))
    }

    pub fn eq() -> Self {
        Self::new("eq", loose_eq)
    }

    pub fn ne() -> Self {
        Self::new("ne", ne)
    }

    pub fn lt() -> Self {
        Self::new("lt", lt)
    }

    pub fn le() -> Self {
        Self::new("le", le)
    }

    pub fn gt() -> Self {
        Self::new("gt", gt)
    }

    pub fn ge() -> Self {
        Self::new("ge", ge)
    }

    pub fn is() -> Self {
        Self::new("is_", is)
    }

    pub fn is_not() -> Self {
        Self::new("is_not", is_not)
    }

    pub fn contains() -> Self {
        Self::new("contains", contains)
    }

    pub fn not_contains() -> Self {
        Self::new("not_contains", not_contains)
    }

    pub fn truth() -> Self {
        Self::new("truth", truth)
    }
}

impl std::fmt::Debug for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Operator({})", self.name)
    }
}

impl PartialEq for Operator {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

type BuiltinFn = fn(&Value, &Value) -> bool;

const BUILTINS: &[(&str, BuiltinFn)] = &[
    ("eq", loose_eq),
    ("ne", ne),
    ("lt", lt),
    ("le", le),
    ("gt", gt),
    ("ge", ge),
    ("is_", is),
    ("is_not", is_not),
    ("contains", contains),
    ("not_contains", not_contains),
    ("truth", truth),
];

/// Name-to-operator table consulted when conditions are loaded
#[derive(Clone)]
pub struct OperatorRegistry {
    operators: HashMap<String, Operator>,
}

impl OperatorRegistry {
    /// Registry holding every built-in operator
    pub fn new() -> Self {
        let mut operators = HashMap::new();
        for (name, func) in BUILTINS {
            operators.insert(name.to_string(), Operator::new(*name, *func));
        }
        operators.insert("is".to_string(), Operator::is());
        Self { operators }
    }

    /// Register a custom operator; replaces any operator with the same name
    pub fn register<F>(&mut self, name: impl Into<String>, predicate: F)
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        let operator = Operator::new(name, predicate);
        self.operators.insert(operator.name.clone(), operator);
    }

    pub fn get(&self, name: &str) -> Option<Operator> {
        self.operators.get(name).cloned()
    }

    /// Resolve a name, failing on anything unregistered
    pub fn resolve(&self, name: &str) -> Result<Operator> {
        self.get(name)
            .ok_or_else(|| GraphError::UnknownOperator(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operators.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("operators", &self.names())
            .finish()
    }
}

/// Equality where numbers compare by value (`1 == 1.0`)
pub fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), Value::Number(_)) => compare(left, right) == Some(Ordering::Equal),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| loose_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| loose_eq(v, other)))
        }
        _ => left == right,
    }
}

/// Ordering between two values, None when they are not comparable
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => compare_numbers(a, b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b) {
                match compare(x, y)? {
                    Ordering::Equal => continue,
                    ord => return Some(ord),
                }
            }
            Some(a.len().cmp(&b.len()))
        }
        _ => None,
    }
}

// Integers compare exactly across the i64 and u64 ranges; floats only when one side is a float
fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    match (as_integer(a), as_integer(b)) {
        (Some(x), Some(y)) => Some(x.cmp(&y)),
        _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

fn as_integer(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

/// Truthiness of a value
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn ne(left: &Value, right: &Value) -> bool {
    !loose_eq(left, right)
}

fn lt(left: &Value, right: &Value) -> bool {
    compare(left, right) == Some(Ordering::Less)
}

fn le(left: &Value, right: &Value) -> bool {
    matches!(compare(left, right), Some(Ordering::Less | Ordering::Equal))
}

fn gt(left: &Value, right: &Value) -> bool {
    compare(left, right) == Some(Ordering::Greater)
}

fn ge(left: &Value, right: &Value) -> bool {
    matches!(compare(left, right), Some(Ordering::Greater | Ordering::Equal))
}

// Strict: same JSON type and same value, no numeric coercion
fn is(left: &Value, right: &Value) -> bool {
    left == right
}

fn is_not(left: &Value, right: &Value) -> bool {
    left != right
}

fn contains(container: &Value, item: &Value) -> bool {
    match (container, item) {
        (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
        (Value::Array(items), _) => items.iter().any(|x| loose_eq(x, item)),
        (Value::Object(map), Value::String(key)) => map.contains_key(key),
        _ => false,
    }
}

fn not_contains(container: &Value, item: &Value) -> bool {
    !contains(container, item)
}

fn truth(value: &Value, _target: &Value) -> bool {
    is_truthy(value)
}
