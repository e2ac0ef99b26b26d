//! Builtin function table.

use super::eval::{number, number_result, stringify};
use super::ExprError;
use crate::value::{Color, ConfigValue};

/// Names callable from an expression.
pub const BUILTINS: &[&str] = &[
    "min", "max", "abs", "floor", "ceil", "round", "pow", "sqrt", "len", "upper", "lower",
    "concat", "str", "num", "rgb", "rgba", "color", "lighten", "darken", "mix",
];

pub fn call(name: &str, args: Vec<ConfigValue>) -> Result<ConfigValue, ExprError> {
    match name {
        "min" => extremum(name, args, f64::min),
        "max" => extremum(name, args, f64::max),
        "abs" => unary_math(name, &args, f64::abs),
        "floor" => unary_math(name, &args, f64::floor),
        "ceil" => unary_math(name, &args, f64::ceil),
        "sqrt" => unary_math(name, &args, f64::sqrt),
        "round" => round(&args),
        "pow" => {
            arity(name, &args, 2, 2)?;
            number_result(number(&args[0], name)?.powf(number(&args[1], name)?))
        }
        "len" => {
            arity(name, &args, 1, 1)?;
            let len = match &args[0] {
                ConfigValue::String(s) => s.chars().count(),
                ConfigValue::Array(items) => items.len(),
                ConfigValue::Object(map) => map.len(),
                other => {
                    return Err(ExprError::runtime(format!(
                        "len() expects a string, array or object, got {}",
                        other.type_name()
                    )))
                }
            };
            Ok(ConfigValue::from(len as u64))
        }
        "upper" => {
            arity(name, &args, 1, 1)?;
            Ok(ConfigValue::String(stringify(&args[0]).to_uppercase()))
        }
        "lower" => {
            arity(name, &args, 1, 1)?;
            Ok(ConfigValue::String(stringify(&args[0]).to_lowercase()))
        }
        "str" => {
            arity(name, &args, 1, 1)?;
            Ok(ConfigValue::String(stringify(&args[0])))
        }
        "num" => {
            arity(name, &args, 1, 1)?;
            to_number(&args[0])
        }
        "concat" => Ok(concat(args)),
        "rgb" => {
            arity(name, &args, 3, 3)?;
            Ok(Color::rgb(channel(&args[0])?, channel(&args[1])?, channel(&args[2])?).into())
        }
        "rgba" => {
            arity(name, &args, 4, 4)?;
            Ok(Color::rgba(
                channel(&args[0])?,
                channel(&args[1])?,
                channel(&args[2])?,
                number(&args[3], name)?,
            )
            .into())
        }
        "color" => {
            arity(name, &args, 1, 1)?;
            color(&args[0]).map(ConfigValue::from)
        }
        "lighten" => {
            arity(name, &args, 2, 2)?;
            Ok(color(&args[0])?.lighten(number(&args[1], name)?).into())
        }
        "darken" => {
            arity(name, &args, 2, 2)?;
            Ok(color(&args[0])?.darken(number(&args[1], name)?).into())
        }
        "mix" => {
            arity(name, &args, 2, 3)?;
            let weight = match args.get(2) {
                Some(w) => number(w, name)?,
                None => 0.5,
            };
            Ok(color(&args[0])?.mix(&color(&args[1])?, weight).into())
        }
        _ => Err(ExprError::runtime(format!("unknown function '{name}'"))),
    }
}

fn arity(name: &str, args: &[ConfigValue], min: usize, max: usize) -> Result<(), ExprError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{min} to {max}")
        };
        return Err(ExprError::runtime(format!(
            "{name}() takes {expected} argument(s), got {}",
            args.len()
        )));
    }
    Ok(())
}

fn unary_math(name: &str, args: &[ConfigValue], f: fn(f64) -> f64) -> Result<ConfigValue, ExprError> {
    arity(name, args, 1, 1)?;
    number_result(f(number(&args[0], name)?))
}

/// `min(a, b, ..)` or `min([a, b, ..])`.
fn extremum(
    name: &str,
    args: Vec<ConfigValue>,
    pick: fn(f64, f64) -> f64,
) -> Result<ConfigValue, ExprError> {
    let values = match args.as_slice() {
        [ConfigValue::Array(items)] => items.clone(),
        _ => args,
    };
    let mut numbers = values.iter().map(|v| number(v, name));
    let first = numbers
        .next()
        .ok_or_else(|| ExprError::runtime(format!("{name}() needs at least one number")))??;
    let result = numbers.try_fold(first, |acc, n| n.map(|n| pick(acc, n)))?;
    number_result(result)
}

fn round(args: &[ConfigValue]) -> Result<ConfigValue, ExprError> {
    arity("round", args, 1, 2)?;
    let value = number(&args[0], "round")?;
    let digits = match args.get(1) {
        Some(d) => number(d, "round")?,
        None => 0.0,
    };
    let factor = 10f64.powi(digits as i32);
    number_result((value * factor).round() / factor)
}

fn to_number(value: &ConfigValue) -> Result<ConfigValue, ExprError> {
    match value {
        ConfigValue::Number(_) => Ok(value.clone()),
        ConfigValue::Bool(b) => Ok(ConfigValue::from(u64::from(*b))),
        ConfigValue::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(ConfigValue::from_f64)
            .ok_or_else(|| ExprError::runtime(format!("num() cannot parse '{s}'"))),
        other => Err(ExprError::runtime(format!(
            "num() cannot convert {}",
            other.type_name()
        ))),
    }
}

/// Arrays concatenate when every argument is an array; otherwise the
/// arguments are joined as text.
fn concat(args: Vec<ConfigValue>) -> ConfigValue {
    if !args.is_empty() && args.iter().all(ConfigValue::is_array) {
        let mut out = Vec::new();
        for arg in args {
            if let ConfigValue::Array(items) = arg {
                out.extend(items);
            }
        }
        return ConfigValue::Array(out);
    }
    ConfigValue::String(args.iter().map(stringify).collect())
}

fn channel(value: &ConfigValue) -> Result<u8, ExprError> {
    let n = number(value, "rgb")?.round();
    if !(0.0..=255.0).contains(&n) {
        return Err(ExprError::runtime(format!("color channel {n} is out of range")));
    }
    Ok(n as u8)
}

fn color(value: &ConfigValue) -> Result<Color, ExprError> {
    match value {
        ConfigValue::String(s) => Color::parse(s).map_err(|e| ExprError::runtime(e.to_string())),
        other => other.as_color().copied().ok_or_else(|| {
            ExprError::runtime(format!("expected a color, got {}", other.type_name()))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn n(v: i64) -> ConfigValue {
        ConfigValue::from(v)
    }

    #[test]
    fn test_every_listed_builtin_dispatches() {
        for name in BUILTINS {
            let err = call(name, Vec::new()).err();
            if let Some(err) = err {
                assert!(!err.to_string().contains("unknown function"), "{name}");
            }
        }
    }

    #[test]
    fn test_min_max() {
        assert_eq!(call("min", vec![n(3), n(1), n(2)]).unwrap(), n(1));
        assert_eq!(call("max", vec![ConfigValue::from(json!([3, 9, 2]))]).unwrap(), n(9));
        assert!(call("min", vec![]).is_err());
        assert!(call("max", vec![n(1), ConfigValue::from("x")]).is_err());
    }

    #[test]
    fn test_rounding() {
        assert_eq!(call("round", vec![ConfigValue::from(2.5)]).unwrap(), n(3));
        assert_eq!(
            call("round", vec![ConfigValue::from(1.23456), n(2)]).unwrap().as_f64(),
            Some(1.23)
        );
        assert_eq!(call("floor", vec![ConfigValue::from(1.9)]).unwrap(), n(1));
        assert_eq!(call("ceil", vec![ConfigValue::from(1.1)]).unwrap(), n(2));
    }

    #[test]
    fn test_text_helpers() {
        assert_eq!(call("upper", vec!["sm".into()]).unwrap(), ConfigValue::from("SM"));
        assert_eq!(call("len", vec!["abc".into()]).unwrap(), n(3));
        assert_eq!(call("num", vec![" 42 ".into()]).unwrap(), n(42));
        assert_eq!(
            call("concat", vec!["a".into(), n(1), "b".into()]).unwrap(),
            ConfigValue::from("a1b")
        );
        assert_eq!(
            call("concat", vec![ConfigValue::from(json!([1])), ConfigValue::from(json!([2]))]).unwrap(),
            ConfigValue::from(json!([1, 2]))
        );
    }

    #[test]
    fn test_color_builtins() {
        let red = call("rgb", vec![n(255), n(0), n(0)]).unwrap();
        assert_eq!(red.as_color(), Some(&Color::rgb(255, 0, 0)));

        let light = call("lighten", vec![red.clone(), ConfigValue::from(1.0)]).unwrap();
        assert_eq!(light.as_color(), Some(&Color::rgb(255, 255, 255)));

        let mixed = call("mix", vec!["#000000".into(), "#ffffff".into()]).unwrap();
        assert_eq!(mixed.as_color(), Some(&Color::rgb(128, 128, 128)));

        assert!(call("rgb", vec![n(256), n(0), n(0)]).is_err());
        assert!(call("darken", vec![n(1), n(1)]).is_err());
    }

    #[test]
    fn test_arity_and_unknown() {
        let err = call("pow", vec![n(2)]).unwrap_err();
        assert!(err.to_string().contains("pow() takes 2 argument(s), got 1"));
        assert!(call("eval", vec![]).unwrap_err().to_string().contains("unknown function"));
    }
}
