//! Tree-walking evaluator.

use super::builtins;
use super::parser::{parse, BinaryOp, Expr, Segment, UnaryOp};
use super::{ExprError, PathKey};
use crate::value::{ConfigMap, ConfigValue, OpaqueValue};
use std::cmp::Ordering;

/// Source of free identifiers.
///
/// `lookup` receives the identifier and every accessor applied to it, so an
/// implementation can intercept intermediate values (e.g. resolve nested
/// deferred markers) while walking the path.
pub trait Scope {
    fn lookup(&mut self, name: &str, keys: &[PathKey]) -> Result<ConfigValue, ExprError>;
}

/// A plain mapping is a scope over its own properties.
impl Scope for ConfigMap {
    fn lookup(&mut self, name: &str, keys: &[PathKey]) -> Result<ConfigValue, ExprError> {
        let mut current = self
            .get(name)
            .cloned()
            .ok_or_else(|| ExprError::runtime(format!("'{name}' is not defined")))?;
        for key in keys {
            current = member(&current, key)?;
        }
        Ok(current)
    }
}

/// Parse and evaluate `source` against `scope`.
pub fn evaluate(source: &str, scope: &mut dyn Scope) -> Result<ConfigValue, ExprError> {
    let expr = parse(source)?;
    Evaluator { scope }.eval(&expr)
}

struct Evaluator<'a> {
    scope: &'a mut dyn Scope,
}

impl Evaluator<'_> {
    fn eval(&mut self, expr: &Expr) -> Result<ConfigValue, ExprError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Array(items) => Ok(ConfigValue::Array(
                items.iter().map(|e| self.eval(e)).collect::<Result<_, _>>()?,
            )),
            Expr::Path { root, segments } => {
                let keys = segments
                    .iter()
                    .map(|s| self.segment_key(s))
                    .collect::<Result<Vec<_>, _>>()?;
                self.scope.lookup(root, &keys)
            }
            Expr::Member { object, segment } => {
                let object = self.eval(object)?;
                let key = self.segment_key(segment)?;
                member(&object, &key)
            }
            Expr::Call { name, args } => {
                let args = args.iter().map(|e| self.eval(e)).collect::<Result<Vec<_>, _>>()?;
                builtins::call(name, args)
            }
            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(ConfigValue::Bool(!truthy(&value))),
                    UnaryOp::Neg => number_result(-number(&value, "-")?),
                }
            }
            Expr::Binary { op, left, right } => self.binary(*op, left, right),
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if truthy(&self.eval(test)?) {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }
        }
    }

    fn segment_key(&mut self, segment: &Segment) -> Result<PathKey, ExprError> {
        match segment {
            Segment::Field(name) => Ok(PathKey::Field(name.clone())),
            Segment::Index(expr) => match self.eval(expr)? {
                ConfigValue::String(s) => Ok(PathKey::Field(s)),
                ConfigValue::Number(n) => match n.as_u64() {
                    Some(i) => Ok(PathKey::Index(i as usize)),
                    None => Err(ExprError::runtime(format!("invalid index {n}"))),
                },
                other => Err(ExprError::runtime(format!(
                    "cannot index with a {}",
                    other.type_name()
                ))),
            },
        }
    }

    fn binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<ConfigValue, ExprError> {
        let lhs = self.eval(left)?;
        match op {
            BinaryOp::And if !truthy(&lhs) => return Ok(lhs),
            BinaryOp::Or if truthy(&lhs) => return Ok(lhs),
            BinaryOp::And | BinaryOp::Or => return self.eval(right),
            _ => {}
        }
        let rhs = self.eval(right)?;

        match op {
            BinaryOp::Add => add(lhs, rhs),
            BinaryOp::Sub => number_result(number(&lhs, "-")? - number(&rhs, "-")?),
            BinaryOp::Mul => number_result(number(&lhs, "*")? * number(&rhs, "*")?),
            BinaryOp::Div => {
                let divisor = number(&rhs, "/")?;
                if divisor == 0.0 {
                    return Err(ExprError::runtime("division by zero"));
                }
                number_result(number(&lhs, "/")? / divisor)
            }
            BinaryOp::Rem => {
                let divisor = number(&rhs, "%")?;
                if divisor == 0.0 {
                    return Err(ExprError::runtime("division by zero"));
                }
                number_result(number(&lhs, "%")? % divisor)
            }
            BinaryOp::Eq => Ok(ConfigValue::Bool(loose_eq(&lhs, &rhs))),
            BinaryOp::NotEq => Ok(ConfigValue::Bool(!loose_eq(&lhs, &rhs))),
            BinaryOp::Lt => compare(&lhs, &rhs, "<").map(|o| ConfigValue::Bool(o == Ordering::Less)),
            BinaryOp::LtEq => {
                compare(&lhs, &rhs, "<=").map(|o| ConfigValue::Bool(o != Ordering::Greater))
            }
            BinaryOp::Gt => {
                compare(&lhs, &rhs, ">").map(|o| ConfigValue::Bool(o == Ordering::Greater))
            }
            BinaryOp::GtEq => compare(&lhs, &rhs, ">=").map(|o| ConfigValue::Bool(o != Ordering::Less)),
            BinaryOp::And | BinaryOp::Or => Ok(rhs),
        }
    }
}

/// Read one accessor from a value.
pub fn member(value: &ConfigValue, key: &PathKey) -> Result<ConfigValue, ExprError> {
    let found = match (value, key) {
        (ConfigValue::Object(map), PathKey::Field(name)) => map.get(name).cloned(),
        (ConfigValue::Object(map), PathKey::Index(i)) => map.get(&i.to_string()).cloned(),
        (ConfigValue::Array(items), PathKey::Index(i)) => items.get(*i).cloned(),
        (ConfigValue::Array(items), PathKey::Field(name)) if name == "length" => {
            Some(ConfigValue::from(items.len() as u64))
        }
        (ConfigValue::String(s), PathKey::Field(name)) if name == "length" => {
            Some(ConfigValue::from(s.chars().count() as u64))
        }
        (ConfigValue::String(s), PathKey::Index(i)) => {
            s.chars().nth(*i).map(|c| ConfigValue::String(c.to_string()))
        }
        (ConfigValue::Opaque(OpaqueValue::Color(c)), PathKey::Field(name)) => match name.as_str() {
            "red" => Some(ConfigValue::from(u64::from(c.red()))),
            "green" => Some(ConfigValue::from(u64::from(c.green()))),
            "blue" => Some(ConfigValue::from(u64::from(c.blue()))),
            "alpha" => Some(ConfigValue::from(c.alpha())),
            "hex" => Some(ConfigValue::String(c.to_hex())),
            _ => None,
        },
        _ => None,
    };

    found.ok_or_else(|| {
        ExprError::runtime(format!(
            "cannot read property '{}' of {}",
            match key {
                PathKey::Field(name) => name.clone(),
                PathKey::Index(i) => i.to_string(),
            },
            value.type_name()
        ))
    })
}

/// `null`, `false`, `0` and `""` are falsy.
pub fn truthy(value: &ConfigValue) -> bool {
    match value {
        ConfigValue::Null => false,
        ConfigValue::Bool(b) => *b,
        ConfigValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        ConfigValue::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Text form used by string concatenation and `str()`.
pub fn stringify(value: &ConfigValue) -> String {
    match value {
        ConfigValue::String(s) => s.clone(),
        ConfigValue::Number(n) => n.to_string(),
        ConfigValue::Bool(b) => b.to_string(),
        ConfigValue::Null => "null".to_string(),
        ConfigValue::Opaque(OpaqueValue::Color(c)) => c.to_hex(),
        ConfigValue::Array(_) | ConfigValue::Object(_) => value.to_json().to_string(),
    }
}

pub(super) fn number(value: &ConfigValue, op: &str) -> Result<f64, ExprError> {
    value.as_f64().ok_or_else(|| {
        ExprError::runtime(format!("'{op}' expects a number, got {}", value.type_name()))
    })
}

pub(super) fn number_result(value: f64) -> Result<ConfigValue, ExprError> {
    ConfigValue::from_f64(value).ok_or_else(|| ExprError::runtime("result is not a finite number"))
}

fn add(lhs: ConfigValue, rhs: ConfigValue) -> Result<ConfigValue, ExprError> {
    match (lhs, rhs) {
        (ConfigValue::Number(a), ConfigValue::Number(b)) => {
            let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
            number_result(a + b)
        }
        (ConfigValue::Array(mut a), ConfigValue::Array(b)) => {
            a.extend(b);
            Ok(ConfigValue::Array(a))
        }
        (l @ ConfigValue::String(_), r) | (l, r @ ConfigValue::String(_)) => {
            Ok(ConfigValue::String(stringify(&l) + &stringify(&r)))
        }
        (l, r) => Err(ExprError::runtime(format!(
            "cannot add {} and {}",
            l.type_name(),
            r.type_name()
        ))),
    }
}

fn compare(lhs: &ConfigValue, rhs: &ConfigValue, op: &str) -> Result<Ordering, ExprError> {
    match (lhs, rhs) {
        (ConfigValue::String(a), ConfigValue::String(b)) => Ok(a.cmp(b)),
        _ => {
            let (a, b) = (number(lhs, op)?, number(rhs, op)?);
            a.partial_cmp(&b)
                .ok_or_else(|| ExprError::runtime(format!("cannot compare with '{op}'")))
        }
    }
}

/// Structural equality; numbers compare by value.
fn loose_eq(lhs: &ConfigValue, rhs: &ConfigValue) -> bool {
    match (lhs, rhs) {
        (ConfigValue::Number(a), ConfigValue::Number(b)) => a.as_f64() == b.as_f64(),
        (ConfigValue::Array(a), ConfigValue::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| loose_eq(x, y))
        }
        (ConfigValue::Object(a), ConfigValue::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| loose_eq(v, other)))
        }
        _ => lhs == rhs,
    }
}
