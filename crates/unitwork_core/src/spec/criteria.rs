//! Structured query criteria over serialized aggregates.
//!
//! # Responsibility
//! - Describe filter conditions as data (field, operator, value) so backend
//!   adapters can translate them into native queries.
//! - Evaluate the same conditions in process against a JSON document.
//!
//! # Invariants
//! - Field paths are validated once at `Field::parse`.
//! - A comparison only holds between a field and a value of the same class
//!   (numeric or text). Booleans are numeric (`true == 1`).
//! - Missing and JSON-null fields never satisfy a comparison.
//! - Integers compare exactly, including against floats. A NaN operand
//!   satisfies no comparison.

use crate::error::{RepoError, RepoResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

static FIELD_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("valid field path regex")
});

/// Dotted path into a serialized aggregate, e.g. `customer.name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    path: String,
}

impl Field {
    /// Parses and validates a dotted field path.
    ///
    /// # Errors
    /// - Returns `RepoError::InvalidCriteria` for empty or malformed paths.
    pub fn parse(path: &str) -> RepoResult<Self> {
        let trimmed = path.trim();
        if !FIELD_PATH_RE.is_match(trimmed) {
            return Err(RepoError::InvalidCriteria(format!(
                "field path `{trimmed}` must be dot-separated identifiers"
            )));
        }
        Ok(Self {
            path: trimmed.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        self.path.as_str()
    }

    /// JSON path understood by SQLite JSON functions.
    pub fn json_path(&self) -> String {
        format!("$.{}", self.path)
    }

    /// Resolves this path inside `document`.
    pub fn lookup<'doc>(&self, document: &'doc Value) -> Option<&'doc Value> {
        self.path
            .split('.')
            .try_fold(document, |current, segment| current.get(segment))
    }

    pub fn equals(&self, value: impl Into<CriteriaValue>) -> Criteria {
        self.compare(Operator::Eq, value)
    }

    pub fn not_equals(&self, value: impl Into<CriteriaValue>) -> Criteria {
        self.compare(Operator::Ne, value)
    }

    pub fn less_than(&self, value: impl Into<CriteriaValue>) -> Criteria {
        self.compare(Operator::Lt, value)
    }

    pub fn at_most(&self, value: impl Into<CriteriaValue>) -> Criteria {
        self.compare(Operator::Le, value)
    }

    pub fn greater_than(&self, value: impl Into<CriteriaValue>) -> Criteria {
        self.compare(Operator::Gt, value)
    }

    pub fn at_least(&self, value: impl Into<CriteriaValue>) -> Criteria {
        self.compare(Operator::Ge, value)
    }

    /// Text field contains `needle` as a substring.
    pub fn contains(&self, needle: impl Into<String>) -> Criteria {
        self.compare(Operator::Contains, CriteriaValue::Text(needle.into()))
    }

    pub fn is_null(&self) -> Criteria {
        Criteria::IsNull(self.clone())
    }

    pub fn is_not_null(&self) -> Criteria {
        Criteria::NotNull(self.clone())
    }

    fn compare(&self, op: Operator, value: impl Into<CriteriaValue>) -> Criteria {
        Criteria::Compare {
            field: self.clone(),
            op,
            value: value.into(),
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)
    }
}

/// Comparison operator of one criteria leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Text substring match. Only meaningful with `CriteriaValue::Text`.
    Contains,
}

/// Literal operand of one criteria leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum CriteriaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for CriteriaValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for CriteriaValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for CriteriaValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for CriteriaValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for CriteriaValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for CriteriaValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CriteriaValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Backend-agnostic boolean condition over a serialized aggregate.
#[derive(Debug, Clone, PartialEq)]
pub enum Criteria {
    /// Always satisfied.
    All,
    Compare {
        field: Field,
        op: Operator,
        value: CriteriaValue,
    },
    /// Field is missing or JSON null.
    IsNull(Field),
    /// Field is present and not JSON null.
    NotNull(Field),
    And(Box<Criteria>, Box<Criteria>),
    Or(Box<Criteria>, Box<Criteria>),
    Not(Box<Criteria>),
}

impl Criteria {
    pub fn and(self, other: Criteria) -> Criteria {
        Criteria::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Criteria) -> Criteria {
        Criteria::Or(Box::new(self), Box::new(other))
    }

    pub fn negate(self) -> Criteria {
        Criteria::Not(Box::new(self))
    }

    /// Evaluates this condition against one serialized aggregate.
    pub fn evaluate(&self, document: &Value) -> bool {
        match self {
            Self::All => true,
            Self::Compare { field, op, value } => {
                compare_scalar(Scalar::of(field.lookup(document)), *op, value)
            }
            Self::IsNull(field) => matches!(Scalar::of(field.lookup(document)), Scalar::Null),
            Self::NotNull(field) => !matches!(Scalar::of(field.lookup(document)), Scalar::Null),
            Self::And(left, right) => left.evaluate(document) && right.evaluate(document),
            Self::Or(left, right) => left.evaluate(document) || right.evaluate(document),
            Self::Not(inner) => !inner.evaluate(document),
        }
    }
}

/// Comparable view of one JSON value.
///
/// Integers stay exact; they only meet floats through `cmp_int_float`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Scalar<'doc> {
    Null,
    Int(i64),
    Float(f64),
    Text(&'doc str),
    /// Arrays and objects; compared by their serialized text.
    Composite(String),
}

impl<'doc> Scalar<'doc> {
    pub(crate) fn of(value: Option<&'doc Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Null,
            Some(Value::Bool(flag)) => Self::Int(i64::from(*flag)),
            // Integers beyond i64 are read back as reals by SQLite too.
            Some(Value::Number(number)) => match number.as_i64() {
                Some(int) => Self::Int(int),
                None => Self::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            Some(Value::String(text)) => Self::Text(text.as_str()),
            Some(other) => Self::Composite(other.to_string()),
        }
    }

    fn operand(value: &'doc CriteriaValue) -> Self {
        match value {
            CriteriaValue::Bool(flag) => Self::Int(i64::from(*flag)),
            CriteriaValue::Int(int) => Self::Int(*int),
            CriteriaValue::Float(float) => Self::Float(*float),
            CriteriaValue::Text(text) => Self::Text(text.as_str()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Int(_) | Self::Float(_) => 1,
            Self::Text(_) | Self::Composite(_) => 2,
        }
    }

    fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Composite(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Exact numeric ordering. `None` for non-numbers and NaN.
    fn numeric_cmp(&self, other: &Scalar<'doc>) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Int(left), Scalar::Int(right)) => Some(left.cmp(right)),
            (Scalar::Int(left), Scalar::Float(right)) => cmp_int_float(*left, *right),
            (Scalar::Float(left), Scalar::Int(right)) => {
                cmp_int_float(*right, *left).map(Ordering::reverse)
            }
            (Scalar::Float(left), Scalar::Float(right)) => left.partial_cmp(right),
            _ => None,
        }
    }

    /// Total order used for field sort keys: null < numeric < text.
    pub(crate) fn sort_cmp(&self, other: &Scalar<'doc>) -> Ordering {
        if self.rank() == 1 && other.rank() == 1 {
            return self.numeric_cmp(other).unwrap_or(Ordering::Equal);
        }
        if self.rank() == 2 && other.rank() == 2 {
            return self.as_text().cmp(&other.as_text());
        }
        self.rank().cmp(&other.rank())
    }
}

/// Compares an integer with a float without rounding either side.
fn cmp_int_float(int: i64, float: f64) -> Option<Ordering> {
    if float.is_nan() {
        return None;
    }
    // 2^63 is exactly representable; every i64 lies in [-2^63, 2^63).
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
    if float >= TWO_POW_63 {
        return Some(Ordering::Less);
    }
    if float < -TWO_POW_63 {
        return Some(Ordering::Greater);
    }
    let whole = float.trunc();
    // `whole` is integral and inside the i64 range, so the cast is exact.
    match int.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0_f64.partial_cmp(&(float - whole)),
        unequal => Some(unequal),
    }
}

fn compare_scalar(field: Scalar<'_>, op: Operator, value: &CriteriaValue) -> bool {
    let operand = Scalar::operand(value);
    let ordering = match (&field, &operand) {
        (Scalar::Text(actual), Scalar::Text(expected)) => {
            if op == Operator::Contains {
                return actual.contains(expected);
            }
            Some(actual.cmp(expected))
        }
        (field, operand) => field.numeric_cmp(operand),
    };

    let Some(ordering) = ordering else {
        return false;
    };
    match op {
        Operator::Eq => ordering == Ordering::Equal,
        Operator::Ne => ordering != Ordering::Equal,
        Operator::Lt => ordering == Ordering::Less,
        Operator::Le => ordering != Ordering::Greater,
        Operator::Gt => ordering == Ordering::Greater,
        Operator::Ge => ordering != Ordering::Less,
        Operator::Contains => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{Criteria, Field, Scalar};
    use serde_json::json;
    use std::cmp::Ordering;

    #[test]
    fn field_parse_rejects_malformed_paths() {
        assert!(Field::parse("name").is_ok());
        assert!(Field::parse("customer.name").is_ok());
        assert!(Field::parse("").is_err());
        assert!(Field::parse("name'; DROP TABLE aggregates; --").is_err());
        assert!(Field::parse("a..b").is_err());
        assert!(Field::parse("1st").is_err());
    }

    #[test]
    fn lookup_walks_nested_objects() {
        let document = json!({"customer": {"name": "scott"}, "total": 3});
        let nested = Field::parse("customer.name").unwrap();
        let missing = Field::parse("customer.age.value").unwrap();

        assert_eq!(nested.lookup(&document), Some(&json!("scott")));
        assert_eq!(missing.lookup(&document), None);
    }

    #[test]
    fn comparisons_require_matching_value_class() {
        let document = json!({"name": "7", "count": 7, "active": true});
        let name = Field::parse("name").unwrap();
        let count = Field::parse("count").unwrap();
        let active = Field::parse("active").unwrap();

        assert!(name.equals("7").evaluate(&document));
        assert!(!name.equals(7).evaluate(&document));
        assert!(!name.not_equals(7).evaluate(&document));
        assert!(count.at_least(7).evaluate(&document));
        assert!(count.less_than(7.5).evaluate(&document));
        assert!(active.equals(true).evaluate(&document));
        assert!(active.equals(1).evaluate(&document));
    }

    #[test]
    fn null_checks_treat_missing_and_null_alike() {
        let document = json!({"name": null});
        let name = Field::parse("name").unwrap();
        let other = Field::parse("other").unwrap();

        assert!(name.is_null().evaluate(&document));
        assert!(other.is_null().evaluate(&document));
        assert!(!name.is_not_null().evaluate(&document));
        assert!(!name.equals("x").evaluate(&document));
        assert!(name.equals("x").negate().evaluate(&document));
    }

    #[test]
    fn contains_and_combinators() {
        let document = json!({"name": "scott3", "age": 12});
        let name = Field::parse("name").unwrap();
        let age = Field::parse("age").unwrap();

        assert!(name.contains("3").evaluate(&document));
        assert!(!name.contains("4").evaluate(&document));
        assert!(name.contains("3").and(age.equals(12)).evaluate(&document));
        assert!(name.contains("4").or(age.equals(12)).evaluate(&document));
        assert!(Criteria::All.evaluate(&document));
    }

    #[test]
    fn sort_order_places_null_before_numbers_before_text() {
        let null = json!(null);
        let number = json!(3);
        let text = json!("a");

        let null = Scalar::of(Some(&null));
        let number = Scalar::of(Some(&number));
        let text = Scalar::of(Some(&text));
        assert_eq!(null.sort_cmp(&number), Ordering::Less);
        assert_eq!(number.sort_cmp(&text), Ordering::Less);
        assert_eq!(text.sort_cmp(&null), Ordering::Greater);
    }

    #[test]
    fn integers_above_float_precision_compare_exactly() {
        let document = json!({"balance": 9_007_199_254_740_993_i64});
        let balance = Field::parse("balance").unwrap();

        assert!(!balance.equals(9_007_199_254_740_992_i64).evaluate(&document));
        assert!(balance.equals(9_007_199_254_740_993_i64).evaluate(&document));
        assert!(balance.greater_than(9_007_199_254_740_992_i64).evaluate(&document));
        assert!(!balance.equals(9_007_199_254_740_992.0).evaluate(&document));
        assert!(balance.greater_than(9_007_199_254_740_992.0).evaluate(&document));
        assert!(balance.less_than(f64::INFINITY).evaluate(&document));
    }

    #[test]
    fn integers_and_floats_compare_by_value() {
        let document = json!({"count": 7, "ratio": 2.5});
        let count = Field::parse("count").unwrap();
        let ratio = Field::parse("ratio").unwrap();

        assert!(count.equals(7.0).evaluate(&document));
        assert!(count.greater_than(6.5).evaluate(&document));
        assert!(count.less_than(7.25).evaluate(&document));
        assert!(ratio.greater_than(2).evaluate(&document));
        assert!(ratio.less_than(3).evaluate(&document));
        assert!(!ratio.equals(2).evaluate(&document));
    }

    #[test]
    fn nan_operand_satisfies_no_comparison() {
        let document = json!({"count": 7});
        let count = Field::parse("count").unwrap();

        assert!(!count.equals(f64::NAN).evaluate(&document));
        assert!(!count.not_equals(f64::NAN).evaluate(&document));
        assert!(!count.at_most(f64::NAN).evaluate(&document));
        assert!(count.equals(f64::NAN).negate().evaluate(&document));
    }

    #[test]
    fn sort_order_keeps_large_integers_apart() {
        let low = json!(9_007_199_254_740_992_i64);
        let high = json!(9_007_199_254_740_993_i64);
        let half = json!(1.5);
        let one = json!(1);

        let low = Scalar::of(Some(&low));
        let high = Scalar::of(Some(&high));
        assert_eq!(low.sort_cmp(&high), Ordering::Less);
        assert_eq!(
            Scalar::of(Some(&half)).sort_cmp(&Scalar::of(Some(&one))),
            Ordering::Greater
        );
    }
}
