//! Deferred value resolution
//!
//! A string leaf that begins with [`EXPRESSION_SENTINEL`] is a deferred
//! marker. Resolution evaluates the remainder as an expression whose free
//! identifiers are the root mapping's own properties, and replaces the marker
//! with the result.
//!
//! Markers may reference other markers. A reference is resolved on demand and
//! memoised, so resolution order does not depend on key order. Self-reference
//! (direct or transitive) is an error.

pub mod expr;

use std::collections::HashMap;

use self::expr::{format_path, member, ExprError, PathKey, Scope};
use crate::error::ConsolidateError;
use crate::value::{ConfigMap, ConfigValue};

/// Prefix that marks a deferred value.
pub const EXPRESSION_SENTINEL: &str = "!expression";

/// Longest chain of markers that may be resolving at once.
const MAX_REFERENCE_DEPTH: usize = 64;

/// A deferred marker failed to evaluate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Evaluation error at {path}: {message}")]
pub struct EvaluationError {
    /// Location of the failing marker, e.g. `grid.gutter`.
    pub path: String,
    pub message: String,
}

/// Expression body of a marker, or `None` for ordinary strings.
pub fn marker_body(value: &str) -> Option<&str> {
    value.strip_prefix(EXPRESSION_SENTINEL).map(str::trim)
}

/// Whether any string leaf in `value` is a deferred marker.
pub fn has_deferred(value: &ConfigValue) -> bool {
    match value {
        ConfigValue::String(s) => marker_body(s).is_some(),
        ConfigValue::Array(items) => items.iter().any(has_deferred),
        ConfigValue::Object(map) => map.values().any(has_deferred),
        _ => false,
    }
}

/// Replace every deferred marker in `config` with its evaluated value.
///
/// The whole call fails on the first marker that cannot be evaluated; no
/// partially resolved configuration is returned. Input without markers is
/// returned as is.
pub async fn process_deferred_config(config: ConfigValue) -> Result<ConfigValue, ConsolidateError> {
    if !has_deferred(&config) {
        return Ok(config);
    }

    let mut resolver = Resolver::new(config.clone());
    let resolved = resolver.rebuild(config, &mut Vec::new())?;
    tracing::debug!(markers = resolver.resolved.len(), "resolved deferred values");
    Ok(resolved)
}

/// Evaluation state for one `process_deferred_config` call.
struct Resolver {
    /// Unresolved snapshot that identifiers are looked up in. Lookups always
    /// read the source form so that every marker they reach is resolved at
    /// its own path, through `resolved`.
    root: ConfigValue,
    resolved: HashMap<Vec<PathKey>, ConfigValue>,
    in_progress: Vec<Vec<PathKey>>,
    /// Innermost failure raised while resolving a referenced marker.
    failure: Option<EvaluationError>,
}

impl Resolver {
    fn new(root: ConfigValue) -> Self {
        Self {
            root,
            resolved: HashMap::new(),
            in_progress: Vec::new(),
            failure: None,
        }
    }

    fn rebuild(
        &mut self,
        value: ConfigValue,
        path: &mut Vec<PathKey>,
    ) -> Result<ConfigValue, EvaluationError> {
        match value {
            ConfigValue::String(s) => match marker_body(&s) {
                Some(body) => self.resolve_marker(path, body),
                None => Ok(ConfigValue::String(s)),
            },
            ConfigValue::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    path.push(PathKey::Index(i));
                    let resolved = self.rebuild(item, path);
                    path.pop();
                    out.push(resolved?);
                }
                Ok(ConfigValue::Array(out))
            }
            ConfigValue::Object(map) => {
                let mut out = ConfigMap::with_capacity(map.len());
                for (key, item) in map {
                    path.push(PathKey::Field(key.clone()));
                    let resolved = self.rebuild(item, path);
                    path.pop();
                    out.insert(key, resolved?);
                }
                Ok(ConfigValue::Object(out))
            }
            other => Ok(other),
        }
    }

    fn resolve_marker(&mut self, path: &[PathKey], body: &str) -> Result<ConfigValue, EvaluationError> {
        if let Some(value) = self.resolved.get(path) {
            return Ok(value.clone());
        }
        if self.in_progress.iter().any(|p| p == path) {
            return Err(EvaluationError {
                path: format_path(path),
                message: "circular deferred reference".to_string(),
            });
        }

        if self.in_progress.len() >= MAX_REFERENCE_DEPTH {
            return Err(EvaluationError {
                path: format_path(path),
                message: "deferred references nested too deeply".to_string(),
            });
        }

        self.in_progress.push(path.to_vec());
        let result = expr::evaluate(body, self);
        self.in_progress.pop();

        match result {
            Ok(value) => {
                tracing::trace!(path = %format_path(path), "resolved deferred marker");
                self.resolved.insert(path.to_vec(), value.clone());
                Ok(value)
            }
            Err(err) => Err(self.failure.take().unwrap_or_else(|| EvaluationError {
                path: format_path(path),
                message: err.to_string(),
            })),
        }
    }

    /// Resolve `value` if it is a marker that lives at `path` in the source.
    fn settle(&mut self, path: &[PathKey], value: ConfigValue) -> Result<ConfigValue, ExprError> {
        let body = match &value {
            ConfigValue::String(s) => match marker_body(s) {
                Some(body) => body.to_string(),
                None => return Ok(value),
            },
            _ => return Ok(value),
        };
        self.resolve_marker(path, &body).map_err(|err| self.fail(err))
    }

    /// Resolve every marker inside a mapping or sequence that lives at `path`
    /// in the source.
    fn settle_nested(
        &mut self,
        path: &mut Vec<PathKey>,
        value: ConfigValue,
    ) -> Result<ConfigValue, ExprError> {
        if !has_deferred(&value) {
            return Ok(value);
        }
        self.rebuild(value, path).map_err(|err| self.fail(err))
    }

    /// Keep the innermost failure for reporting; the expression sees only
    /// its message.
    fn fail(&mut self, err: EvaluationError) -> ExprError {
        let message = err.to_string();
        self.failure.get_or_insert(err);
        ExprError::Runtime(message)
    }
}

impl Scope for Resolver {
    fn lookup(&mut self, name: &str, keys: &[PathKey]) -> Result<ConfigValue, ExprError> {
        let mut current = self
            .root
            .get(name)
            .cloned()
            .ok_or_else(|| ExprError::runtime(format!("'{name}' is not defined")))?;
        let mut path = vec![PathKey::Field(name.to_string())];
        // once a step passes through a computed value, later steps no longer
        // correspond to source locations
        let mut in_source = marker_body(current.as_str().unwrap_or_default()).is_none();
        current = self.settle(&path, current)?;

        for key in keys {
            let key = match (&current, key) {
                (ConfigValue::Object(_), PathKey::Index(i)) => PathKey::Field(i.to_string()),
                _ => key.clone(),
            };
            current = member(&current, &key)?;
            path.push(key);
            if in_source {
                in_source = marker_body(current.as_str().unwrap_or_default()).is_none();
                current = self.settle(&path, current)?;
            }
        }
        if in_source {
            current = self.settle_nested(&mut path, current)?;
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Color;
    use serde_json::json;

    async fn process(value: serde_json::Value) -> Result<ConfigValue, ConsolidateError> {
        process_deferred_config(ConfigValue::from(value)).await
    }

    #[tokio::test]
    async fn test_non_marker_strings_pass_through() {
        let resolved = process(json!({"stringProperty": "string property"})).await.unwrap();
        assert_eq!(
            resolved.get("stringProperty"),
            Some(&ConfigValue::from("string property"))
        );
    }

    #[tokio::test]
    async fn test_expression_sees_sibling_properties() {
        let resolved = process(json!({
            "a": 100,
            "b": 200,
            "derivedValue": "!expression a + b"
        }))
        .await
        .unwrap();
        assert_eq!(resolved.get("derivedValue"), Some(&ConfigValue::from(300)));
        assert_eq!(resolved.get("a"), Some(&ConfigValue::from(100)));
    }

    #[tokio::test]
    async fn test_nested_markers_use_root_context() {
        let resolved = process(json!({
            "unit": 8,
            "spacing": {"small": "!expression unit", "large": "!expression unit * 4"},
            "steps": ["!expression unit / 2", 12]
        }))
        .await
        .unwrap();

        assert_eq!(resolved["spacing"]["large"], ConfigValue::from(32));
        assert_eq!(resolved["spacing"]["small"], ConfigValue::from(8));
        assert_eq!(resolved["steps"], ConfigValue::from(json!([4, 12])));
    }

    #[tokio::test]
    async fn test_markers_reference_markers_in_any_order() {
        let resolved = process(json!({
            "total": "!expression half * 2",
            "half": "!expression base / 2",
            "base": 50,
            "grid": {"gutter": "!expression total + 1"},
            "outer": "!expression grid.gutter * 10"
        }))
        .await
        .unwrap();

        assert_eq!(resolved["half"], ConfigValue::from(25));
        assert_eq!(resolved["total"], ConfigValue::from(50));
        assert_eq!(resolved["grid"]["gutter"], ConfigValue::from(51));
        assert_eq!(resolved["outer"], ConfigValue::from(510));
    }

    #[tokio::test]
    async fn test_circular_reference_fails() {
        let err = process(json!({
            "a": "!expression b + 1",
            "b": "!expression a + 1"
        }))
        .await
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("circular deferred reference"), "{message}");
    }

    #[tokio::test]
    async fn test_reference_to_mapping_resolves_its_markers() {
        let resolved = process(json!({
            "unit": 8,
            "spacing": {"small": "!expression unit", "steps": ["!expression unit * 2"]},
            "copy": "!expression spacing",
            "steps": "!expression spacing.steps"
        }))
        .await
        .unwrap();

        let expected = ConfigValue::from(json!({"small": 8, "steps": [16]}));
        assert_eq!(resolved["copy"], expected);
        assert_eq!(resolved["spacing"], expected);
        assert_eq!(resolved["steps"], ConfigValue::from(json!([16])));
        assert!(!has_deferred(&resolved));

        let again = process_deferred_config(resolved.clone()).await.unwrap();
        assert_eq!(again, resolved);
    }

    #[tokio::test]
    async fn test_marker_containing_itself_fails() {
        let err = process(json!({"grid": {"me": "!expression grid"}}))
            .await
            .unwrap_err();
        match err {
            ConsolidateError::Evaluation(e) => {
                assert_eq!(e.path, "grid.me");
                assert!(e.message.contains("circular deferred reference"), "{}", e.message);
            }
            other => panic!("expected evaluation error, got {other:?}"),
        }

        let err = process(json!({
            "theme": {"items": ["!expression theme.items"]}
        }))
        .await
        .unwrap_err();
        assert!(err.to_string().contains("circular deferred reference"), "{err}");
    }

    #[tokio::test]
    async fn test_deeply_nested_expression_is_rejected() {
        let body = format!("!expression {}1{}", "(".repeat(10_000), ")".repeat(10_000));
        let err = process(json!({"deep": body})).await.unwrap_err();
        match err {
            ConsolidateError::Evaluation(e) => {
                assert_eq!(e.path, "deep");
                assert!(e.message.contains("nested too deeply"), "{}", e.message);
            }
            other => panic!("expected evaluation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_long_reference_chains() {
        let chain = |len: usize| {
            let mut map = serde_json::Map::new();
            for i in 0..len {
                map.insert(format!("k{i}"), json!(format!("!expression k{} + 1", i + 1)));
            }
            map.insert(format!("k{len}"), json!(0));
            serde_json::Value::Object(map)
        };

        let resolved = process(chain(30)).await.unwrap();
        assert_eq!(resolved["k0"], ConfigValue::from(30));

        let err = process(chain(5_000)).await.unwrap_err();
        assert!(err.to_string().contains("nested too deeply"), "{err}");
    }

    #[tokio::test]
    async fn test_invalid_expression_rejects_whole_call() {
        let err = process(json!({
            "ok": "!expression 1 + 1",
            "bad": "!expression 1 +"
        }))
        .await
        .unwrap_err();
        match err {
            ConsolidateError::Evaluation(e) => assert_eq!(e.path, "bad"),
            other => panic!("expected evaluation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_inner_failure_is_reported_at_its_own_path() {
        let err = process(json!({
            "outer": "!expression inner * 2",
            "inner": "!expression missing"
        }))
        .await
        .unwrap_err();
        match err {
            ConsolidateError::Evaluation(e) => {
                assert_eq!(e.path, "inner");
                assert!(e.message.contains("'missing' is not defined"));
            }
            other => panic!("expected evaluation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let once = process(json!({"a": 1, "b": "!expression a + 1"})).await.unwrap();
        let twice = process_deferred_config(once.clone()).await.unwrap();
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn test_opaque_values_pass_through_and_are_usable() {
        let mut map = ConfigMap::new();
        map.insert("brand".into(), Color::rgb(200, 0, 0).into());
        map.insert("brandLight".into(), "!expression lighten(brand, 0.5)".into());

        let resolved = process_deferred_config(ConfigValue::Object(map)).await.unwrap();
        assert_eq!(resolved["brand"].as_color(), Some(&Color::rgb(200, 0, 0)));
        assert_eq!(resolved["brandLight"].as_color(), Some(&Color::rgb(228, 128, 128)));
    }

    #[tokio::test]
    async fn test_non_mapping_root() {
        let resolved = process(json!(["!expression 2 * 3"])).await.unwrap();
        assert_eq!(resolved, ConfigValue::from(json!([6])));

        assert!(process(json!("!expression nothing")).await.is_err());
    }

    #[test]
    fn test_marker_body() {
        assert_eq!(marker_body("!expression  a + b "), Some("a + b"));
        assert_eq!(marker_body("expression a"), None);
        assert_eq!(marker_body(" !expression a"), None);
    }
}
