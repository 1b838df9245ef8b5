use regex::Regex;

use super::{AttributeDescriptor, AttributeType};
use crate::diagnostics::{AttributePath, Diagnostic, Diagnostics};
use crate::value::{Config, Value};

/// Per-attribute rule applied to a set value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validator {
    Range { min: Option<i64>, max: Option<i64> },
    Pattern(Pattern),
    NotEmpty,
    MaxItems(usize),
}

/// Regular expression compiled once, when the owning schema is built.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: &'static str,
    description: &'static str,
    compiled: Result<Regex, String>,
}

impl Pattern {
    pub fn source(&self) -> &'static str {
        self.source
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.description == other.description
    }
}

impl Eq for Pattern {}

impl Validator {
    pub fn pattern(source: &'static str, description: &'static str) -> Self {
        Validator::Pattern(Pattern {
            source,
            description,
            compiled: Regex::new(source).map_err(|e| e.to_string()),
        })
    }

    pub fn at_least(min: i64) -> Self {
        Validator::Range {
            min: Some(min),
            max: None,
        }
    }

    pub fn between(min: i64, max: i64) -> Self {
        Validator::Range {
            min: Some(min),
            max: Some(max),
        }
    }

    fn check(&self, path: &AttributePath, value: &Value, diags: &mut Diagnostics) {
        match (self, value) {
            (Validator::Range { min, max }, Value::Int(i)) => {
                let below = min.is_some_and(|m| *i < m);
                let above = max.is_some_and(|m| *i > m);
                if below || above {
                    let expected = match (min, max) {
                        (Some(lo), Some(hi)) => format!("expected an integer between {lo} and {hi}"),
                        (Some(lo), None) => format!("expected an integer of at least {lo}"),
                        (None, Some(hi)) => format!("expected an integer of at most {hi}"),
                        (None, None) => "expected an integer".to_string(),
                    };
                    diags.push(
                        Diagnostic::error(expected)
                            .at(path.clone())
                            .with_detail(format!("got {i}")),
                    );
                }
            }
            (Validator::Pattern(pattern), Value::String(s)) => match &pattern.compiled {
                Ok(re) if re.is_match(s) => {}
                Ok(_) => diags.push(
                    Diagnostic::error(format!("expected {}", pattern.description))
                        .at(path.clone())
                        .with_detail(format!("got {s:?}")),
                ),
                Err(e) => diags.push(
                    Diagnostic::error("invalid validation pattern")
                        .at(path.clone())
                        .with_detail(e.clone()),
                ),
            },
            (Validator::NotEmpty, Value::String(s)) if s.trim().is_empty() => {
                diags.push(Diagnostic::error("expected a non-empty string").at(path.clone()));
            }
            (Validator::NotEmpty, Value::List(items)) if items.is_empty() => {
                diags.push(Diagnostic::error("expected at least one element").at(path.clone()));
            }
            (Validator::MaxItems(n), Value::List(items)) if items.len() > *n => {
                diags.push(
                    Diagnostic::error(format!("expected at most {n} element(s)"))
                        .at(path.clone())
                        .with_detail(format!("got {}", items.len())),
                );
            }
            _ => {}
        }
    }
}

/// Check that `value` has the attribute's type and passes its validators.
pub(super) fn validate_value(
    attr: &AttributeDescriptor,
    path: &AttributePath,
    value: &Value,
    diags: &mut Diagnostics,
) {
    let type_ok = match (&attr.ty, value) {
        (AttributeType::String, Value::String(_))
        | (AttributeType::Bool, Value::Bool(_))
        | (AttributeType::Int, Value::Int(_)) => true,
        (AttributeType::Enum(allowed), Value::String(s)) => {
            if !allowed.iter().any(|a| a.eq_ignore_ascii_case(s)) {
                diags.push(
                    Diagnostic::error(format!("expected one of {}", allowed.join(", ")))
                        .at(path.clone())
                        .with_detail(format!("got {s:?}")),
                );
            }
            true
        }
        (AttributeType::StringSet, Value::List(items)) => {
            let mut seen = Vec::new();
            for (i, item) in items.iter().enumerate() {
                match item.as_str() {
                    Some(s) if seen.contains(&s) => diags.push(
                        Diagnostic::error(format!("duplicate set element {s:?}"))
                            .at(path.clone().index(i)),
                    ),
                    Some(s) => seen.push(s),
                    None => diags.push(
                        Diagnostic::error(format!("expected string, got {}", item.type_name()))
                            .at(path.clone().index(i)),
                    ),
                }
            }
            true
        }
        (
            AttributeType::ListOfRecord(fields) | AttributeType::SetOfRecord(fields),
            Value::List(items),
        ) => {
            for (i, item) in items.iter().enumerate() {
                validate_record(fields, &path.clone().index(i), item, diags);
            }
            true
        }
        _ => false,
    };

    if !type_ok {
        diags.push(
            Diagnostic::error(format!(
                "expected {}, got {}",
                attr.ty.label(),
                value.type_name()
            ))
            .at(path.clone()),
        );
        return;
    }

    for validator in &attr.validators {
        validator.check(path, value, diags);
    }
}

fn validate_record(
    fields: &[AttributeDescriptor],
    path: &AttributePath,
    value: &Value,
    diags: &mut Diagnostics,
) {
    let Some(record) = value.as_record() else {
        diags.push(
            Diagnostic::error(format!("expected object, got {}", value.type_name()))
                .at(path.clone()),
        );
        return;
    };
    for key in record.keys() {
        if !fields.iter().any(|f| f.name == key.as_str()) {
            diags.push(
                Diagnostic::error(format!("unsupported argument \"{key}\""))
                    .at(path.clone().attribute(key)),
            );
        }
    }
    for field in fields {
        let field_path = path.clone().attribute(field.name);
        match record.get(field.name) {
            Some(v) => validate_value(field, &field_path, v, diags),
            None if field.is_required() => diags.push(
                Diagnostic::error(format!("the argument \"{}\" is required", field.name))
                    .at(field_path),
            ),
            None => {}
        }
    }
}

/// Resource-level rule spanning several attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// `attribute` may only be set when `requires` is set as well
    RequiredWith {
        attribute: &'static str,
        requires: &'static str,
    },
    /// At least one of `attributes` must be set
    AtLeastOneOf { attributes: &'static [&'static str] },
    /// Integer `lesser` must not exceed integer `greater` when both are set
    NotGreaterThan {
        lesser: &'static str,
        greater: &'static str,
    },
}

impl Constraint {
    pub(super) fn check(&self, config: &Config, diags: &mut Diagnostics) {
        let is_set = |name: &str| config.get(name).as_set().is_some();
        match self {
            Constraint::RequiredWith {
                attribute,
                requires,
            } => {
                if is_set(attribute) && !is_set(requires) {
                    diags.push(
                        Diagnostic::error(format!(
                            "\"{attribute}\" requires \"{requires}\" to be set"
                        ))
                        .at(AttributePath::root(attribute)),
                    );
                }
            }
            Constraint::AtLeastOneOf { attributes } => {
                if !attributes.iter().any(|a| is_set(a)) {
                    let first = attributes.first().copied().unwrap_or_default();
                    diags.push(
                        Diagnostic::error(format!(
                            "one of {} must be set",
                            attributes
                                .iter()
                                .map(|a| format!("\"{a}\""))
                                .collect::<Vec<_>>()
                                .join(", ")
                        ))
                        .at(AttributePath::root(first)),
                    );
                }
            }
            Constraint::NotGreaterThan { lesser, greater } => {
                let lo = config.get(lesser).as_set().and_then(Value::as_int);
                let hi = config.get(greater).as_set().and_then(Value::as_int);
                if let (Some(lo), Some(hi)) = (lo, hi)
                    && lo > hi
                {
                    diags.push(
                        Diagnostic::error(format!(
                            "\"{lesser}\" ({lo}) must not be greater than \"{greater}\" ({hi})"
                        ))
                        .at(AttributePath::root(lesser)),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Record;

    fn check(attr: &AttributeDescriptor, value: Value) -> Diagnostics {
        let mut diags = Diagnostics::new();
        validate_value(attr, &AttributePath::root(attr.name), &value, &mut diags);
        diags
    }

    #[test]
    fn test_range_accepts_zero_when_allowed() {
        let attr = AttributeDescriptor::int("auto_suspend").validate_with(Validator::at_least(0));
        assert!(check(&attr, Value::Int(0)).is_empty());
        assert!(check(&attr, Value::Int(-1)).has_errors());
    }

    #[test]
    fn test_range_error_cites_path_and_value() {
        let attr = AttributeDescriptor::int("query_acceleration_max_scale_factor")
            .validate_with(Validator::between(0, 100));
        let diags = check(&attr, Value::Int(101));
        let d = diags.iter().next().unwrap();
        assert_eq!(
            d.path.as_ref().unwrap().to_string(),
            "query_acceleration_max_scale_factor"
        );
        assert_eq!(d.detail.as_deref(), Some("got 101"));
    }

    #[test]
    fn test_enum_membership_is_case_insensitive() {
        let attr = AttributeDescriptor::enumeration("scaling_policy", &["STANDARD", "ECONOMY"]);
        assert!(check(&attr, Value::from("economy")).is_empty());
        assert!(check(&attr, Value::from("CHEAP")).has_errors());
    }

    #[test]
    fn test_type_mismatch() {
        let attr = AttributeDescriptor::int("max_cluster_count");
        let diags = check(&attr, Value::from("two"));
        assert_eq!(
            diags.iter().next().unwrap().summary,
            "expected int, got string"
        );
    }

    #[test]
    fn test_pattern() {
        let attr = AttributeDescriptor::string("key")
            .validate_with(Validator::pattern(r"^[A-Za-z_]+$", "a parameter name"));
        assert!(check(&attr, Value::from("STATEMENT_TIMEOUT_IN_SECONDS")).is_empty());
        assert!(check(&attr, Value::from("bad key")).has_errors());
    }

    #[test]
    fn test_pattern_is_compiled_when_built() {
        let Validator::Pattern(pattern) = Validator::pattern(r"^\d+$", "digits") else {
            panic!("not a pattern");
        };
        assert!(pattern.compiled.is_ok());
        assert_eq!(pattern.source(), r"^\d+$");

        let attr = AttributeDescriptor::string("key")
            .validate_with(Validator::pattern(r"([", "anything"));
        let diags = check(&attr, Value::from("x"));
        assert_eq!(
            diags.iter().next().unwrap().summary,
            "invalid validation pattern"
        );
    }

    #[test]
    fn test_nested_record_paths() {
        let attr = AttributeDescriptor::new(
            "argument",
            AttributeType::ListOfRecord(vec![
                AttributeDescriptor::string("name").required(),
                AttributeDescriptor::string("type").required(),
            ]),
        );
        let mut record = Record::new();
        record.insert("name".to_string(), Value::from("VAL"));
        let diags = check(&attr, Value::List(vec![Value::Record(record)]));
        let d = diags.iter().next().unwrap();
        assert_eq!(d.path.as_ref().unwrap().to_string(), "argument[0].type");
    }

    #[test]
    fn test_duplicate_set_elements() {
        let attr = AttributeDescriptor::new("preview_features_enabled", AttributeType::StringSet);
        let diags = check(
            &attr,
            Value::List(vec![Value::from("a"), Value::from("a")]),
        );
        assert!(diags.has_errors());
    }

    #[test]
    fn test_constraints() {
        let mut diags = Diagnostics::new();
        let config = Config::new()
            .with("min_cluster_count", 3)
            .with("max_cluster_count", 2);
        Constraint::NotGreaterThan {
            lesser: "min_cluster_count",
            greater: "max_cluster_count",
        }
        .check(&config, &mut diags);
        assert!(diags.has_errors());

        let mut diags = Diagnostics::new();
        Constraint::RequiredWith {
            attribute: "query_acceleration_max_scale_factor",
            requires: "enable_query_acceleration",
        }
        .check(
            &Config::new().with("query_acceleration_max_scale_factor", 8),
            &mut diags,
        );
        assert!(diags.has_errors());
    }

    #[test]
    fn test_at_least_one_of() {
        let constraint = Constraint::AtLeastOneOf {
            attributes: &["comment", "auto_suspend"],
        };

        let mut diags = Diagnostics::new();
        constraint.check(&Config::new(), &mut diags);
        let d = diags.iter().next().unwrap();
        assert!(d.summary.contains("\"comment\", \"auto_suspend\""));
        assert_eq!(d.path.as_ref().unwrap().to_string(), "comment");

        let mut diags = Diagnostics::new();
        constraint.check(&Config::new().with("auto_suspend", 60), &mut diags);
        assert!(diags.is_empty());
    }
}
