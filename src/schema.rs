use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use crate::value::Value;

pub const MERGE_TAG: &str = "tag:yaml.org,2002:merge";

const YAML_TAG_PREFIX: &str = "tag:yaml.org,2002:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Scalar,
    Sequence,
    Mapping,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Scalar => "scalar",
            Kind::Sequence => "sequence",
            Kind::Mapping => "mapping",
        }
    }
}

pub fn kind_of(value: &Value) -> Kind {
    match value {
        Value::Sequence(_) => Kind::Sequence,
        Value::Mapping(_) => Kind::Mapping,
        _ => Kind::Scalar,
    }
}

/// A tag descriptor: `resolve` decides whether a raw composed value belongs to
/// this type, `construct` turns it into its final form. Plain function
/// pointers keep descriptors `Sync`, so schemas can be shared between
/// concurrent parses.
#[derive(Clone)]
pub struct Type {
    pub tag: Cow<'static, str>,
    pub kind: Kind,
    pub resolve: fn(&Value) -> bool,
    pub construct: fn(&Value) -> Value,
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Type")
            .field("tag", &self.tag)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Type tables consulted by the composer: an ordered list scanned against
/// untagged plain scalars (first match wins), and per-kind tables for explicit
/// tag lookup. Read-only during parsing.
#[derive(Debug, Clone)]
pub struct Schema {
    implicit: Vec<Type>,
    scalar: HashMap<String, Type>,
    sequence: HashMap<String, Type>,
    mapping: HashMap<String, Type>,
}

impl Schema {
    pub fn new(implicit: Vec<Type>, explicit: Vec<Type>) -> Self {
        let mut schema = Schema {
            implicit: Vec::new(),
            scalar: HashMap::new(),
            sequence: HashMap::new(),
            mapping: HashMap::new(),
        };
        for ty in &implicit {
            schema.register(ty.clone());
        }
        for ty in explicit {
            schema.register(ty);
        }
        schema.implicit = implicit;
        schema
    }

    /// The YAML core set: implicit null/bool/int/float plus the `<<` merge
    /// marker, explicit str/seq/map on top.
    pub fn core() -> Self {
        Schema::new(
            vec![
                type_null(),
                type_bool(),
                type_int(),
                type_float(),
                type_merge(),
            ],
            vec![type_str(), type_seq(), type_map()],
        )
    }

    fn register(&mut self, ty: Type) {
        let table = match ty.kind {
            Kind::Scalar => &mut self.scalar,
            Kind::Sequence => &mut self.sequence,
            Kind::Mapping => &mut self.mapping,
        };
        table.insert(ty.tag.to_string(), ty);
    }

    pub fn implicit_types(&self) -> &[Type] {
        &self.implicit
    }

    pub fn lookup(&self, kind: Kind, tag: &str) -> Option<&Type> {
        let table = match kind {
            Kind::Scalar => &self.scalar,
            Kind::Sequence => &self.sequence,
            Kind::Mapping => &self.mapping,
        };
        table.get(tag)
    }

    /// Lookup across every kind table, used when the node composed no content
    /// (its kind is not pinned down yet) and for kind-mismatch reporting.
    pub fn lookup_fallback(&self, tag: &str) -> Option<&Type> {
        self.scalar
            .get(tag)
            .or_else(|| self.sequence.get(tag))
            .or_else(|| self.mapping.get(tag))
    }
}

impl Default for Schema {
    fn default() -> Self {
        Schema::core()
    }
}

fn scalar_text(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        _ => None,
    }
}

fn type_null() -> Type {
    Type {
        tag: Cow::Borrowed("tag:yaml.org,2002:null"),
        kind: Kind::Scalar,
        resolve: |value| match value {
            Value::Null => true,
            Value::String(s) => matches!(s.as_str(), "~" | "null" | "Null" | "NULL" | ""),
            _ => false,
        },
        construct: |_| Value::Null,
    }
}

fn type_bool() -> Type {
    Type {
        tag: Cow::Borrowed("tag:yaml.org,2002:bool"),
        kind: Kind::Scalar,
        resolve: |value| {
            scalar_text(value).is_some_and(|s| {
                matches!(s, "true" | "True" | "TRUE" | "false" | "False" | "FALSE")
            })
        },
        construct: |value| {
            let truthy = scalar_text(value).is_some_and(|s| s.starts_with(['t', 'T']));
            Value::Bool(truthy)
        },
    }
}

fn type_int() -> Type {
    Type {
        tag: Cow::Borrowed("tag:yaml.org,2002:int"),
        kind: Kind::Scalar,
        resolve: |value| scalar_text(value).is_some_and(is_yaml_int),
        construct: |value| scalar_text(value).map(construct_int).unwrap_or(Value::Null),
    }
}

fn type_float() -> Type {
    Type {
        tag: Cow::Borrowed("tag:yaml.org,2002:float"),
        kind: Kind::Scalar,
        resolve: |value| scalar_text(value).is_some_and(is_yaml_float),
        construct: |value| {
            scalar_text(value)
                .map(construct_float)
                .unwrap_or(Value::Null)
        },
    }
}

fn type_merge() -> Type {
    Type {
        tag: Cow::Borrowed(MERGE_TAG),
        kind: Kind::Scalar,
        resolve: |value| matches!(value, Value::Null) || scalar_text(value) == Some("<<"),
        construct: |value| value.clone(),
    }
}

fn type_str() -> Type {
    Type {
        tag: Cow::Borrowed("tag:yaml.org,2002:str"),
        kind: Kind::Scalar,
        resolve: |_| true,
        construct: |value| match value {
            Value::Null => Value::String(String::new()),
            other => other.clone(),
        },
    }
}

fn type_seq() -> Type {
    Type {
        tag: Cow::Borrowed("tag:yaml.org,2002:seq"),
        kind: Kind::Sequence,
        resolve: |_| true,
        construct: |value| match value {
            Value::Null => Value::Sequence(Vec::new()),
            other => other.clone(),
        },
    }
}

fn type_map() -> Type {
    Type {
        tag: Cow::Borrowed("tag:yaml.org,2002:map"),
        kind: Kind::Mapping,
        resolve: |_| true,
        construct: |value| match value {
            Value::Null => Value::Mapping(crate::value::Mapping::new()),
            other => other.clone(),
        },
    }
}

/// Expands a `!!suffix` shorthand against the default YAML tag prefix.
pub(crate) fn default_prefix(suffix: &str) -> String {
    let mut tag = String::with_capacity(YAML_TAG_PREFIX.len() + suffix.len());
    tag.push_str(YAML_TAG_PREFIX);
    tag.push_str(suffix);
    tag
}

fn is_yaml_int(data: &str) -> bool {
    let mut chars = data.chars().peekable();
    if matches!(chars.peek(), Some('-') | Some('+')) {
        chars.next();
    }
    let rest: Vec<char> = chars.collect();
    if rest.is_empty() {
        return false;
    }
    if rest[0] == '0' && rest.len() > 1 {
        let digits = &rest[2..];
        match rest[1] {
            'b' => return all_digits(digits, |c| matches!(c, '0' | '1')),
            'x' => return all_digits(digits, |c| c.is_ascii_hexdigit()),
            'o' => return all_digits(digits, |c| matches!(c, '0'..='7')),
            _ => {}
        }
    }
    if rest[0] == '_' {
        return false;
    }
    all_digits(&rest, |c| c.is_ascii_digit())
}

// Underscore separators are allowed anywhere but the end; at least one real
// digit is required.
fn all_digits(chars: &[char], accept: impl Fn(char) -> bool) -> bool {
    let mut has_digits = false;
    let mut last = '_';
    for &c in chars {
        last = c;
        if c == '_' {
            continue;
        }
        if !accept(c) {
            return false;
        }
        has_digits = true;
    }
    has_digits && last != '_'
}

fn construct_int(data: &str) -> Value {
    let cleaned: String = data.chars().filter(|&c| c != '_').collect();
    let (sign, body) = match cleaned.strip_prefix('-') {
        Some(body) => (-1i64, body),
        None => (1i64, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    let (radix, digits) = if let Some(rest) = body.strip_prefix("0b") {
        (2, rest)
    } else if let Some(rest) = body.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = body.strip_prefix("0o") {
        (8, rest)
    } else {
        (10, body)
    };
    if let Ok(n) = i64::from_str_radix(digits, radix) {
        return Value::Int(sign * n);
    }
    // Out of i64 range: degrade to a float rather than failing construction.
    if let Ok(n) = u64::from_str_radix(digits, radix) {
        return Value::Float(sign as f64 * n as f64);
    }
    Value::Null
}

fn is_yaml_float(data: &str) -> bool {
    if data.ends_with('_') {
        return false;
    }
    let body = data.strip_prefix(['-', '+']).unwrap_or(data);
    if matches!(body, ".inf" | ".Inf" | ".INF") {
        return true;
    }
    if !data.starts_with(['-', '+']) && matches!(body, ".nan" | ".NaN" | ".NAN") {
        return true;
    }
    let (mantissa, exponent) = match body.split_once(['e', 'E']) {
        Some((m, e)) => (m, Some(e)),
        None => (body, None),
    };
    if let Some(exp) = exponent {
        let digits = exp.strip_prefix(['-', '+']).unwrap_or(exp);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
    }
    let valid_mantissa = match mantissa.split_once('.') {
        // `.5` style requires fraction digits; `5.` does not.
        None => float_digit_run(mantissa, true),
        Some(("", fraction)) => float_digit_run(fraction, true),
        Some((int_part, fraction)) => {
            float_digit_run(int_part, true) && float_digit_run(fraction, false)
        }
    };
    valid_mantissa
}

fn float_digit_run(chars: &str, require_digit: bool) -> bool {
    let mut has_digit = false;
    for c in chars.chars() {
        if c == '_' {
            continue;
        }
        if !c.is_ascii_digit() {
            return false;
        }
        has_digit = true;
    }
    has_digit || !require_digit
}

fn construct_float(data: &str) -> Value {
    let cleaned: String = data.chars().filter(|&c| c != '_').collect();
    let (negative, body) = match cleaned.strip_prefix('-') {
        Some(body) => (true, body),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    let magnitude = match body {
        ".inf" | ".Inf" | ".INF" => f64::INFINITY,
        ".nan" | ".NaN" | ".NAN" => return Value::Float(f64::NAN),
        _ => body.parse::<f64>().unwrap_or(f64::NAN),
    };
    Value::Float(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn resolve_implicit(schema: &Schema, raw: &str) -> Option<(String, Value)> {
        let value = Value::String(raw.to_string());
        for ty in schema.implicit_types() {
            if (ty.resolve)(&value) {
                return Some((ty.tag.to_string(), (ty.construct)(&value)));
            }
        }
        None
    }

    #[rstest]
    #[case("null", Value::Null)]
    #[case("~", Value::Null)]
    #[case("", Value::Null)]
    #[case("true", Value::Bool(true))]
    #[case("FALSE", Value::Bool(false))]
    #[case("42", Value::Int(42))]
    #[case("-17", Value::Int(-17))]
    #[case("0x1F", Value::Int(31))]
    #[case("0b101", Value::Int(5))]
    #[case("0o17", Value::Int(15))]
    #[case("1_000", Value::Int(1000))]
    #[case("3.25", Value::Float(3.25))]
    #[case("-2e3", Value::Float(-2000.0))]
    #[case(".5", Value::Float(0.5))]
    #[case(".inf", Value::Float(f64::INFINITY))]
    fn implicit_resolution(#[case] raw: &str, #[case] expected: Value) {
        let schema = Schema::core();
        let (_, constructed) = resolve_implicit(&schema, raw).expect("should resolve");
        assert_eq!(constructed, expected);
    }

    #[rstest]
    #[case("hello")]
    #[case("1_")]
    #[case("0x")]
    #[case("1.2.3")]
    #[case("yes")]
    #[case("e3")]
    fn stays_a_string(#[case] raw: &str) {
        let schema = Schema::core();
        assert!(resolve_implicit(&schema, raw).is_none(), "{raw:?} resolved");
    }

    #[test]
    fn merge_marker_resolves() {
        let schema = Schema::core();
        let (tag, _) = resolve_implicit(&schema, "<<").unwrap();
        assert_eq!(tag, MERGE_TAG);
    }

    #[test]
    fn nan_resolves_without_sign_only() {
        let schema = Schema::core();
        let (tag, constructed) = resolve_implicit(&schema, ".nan").unwrap();
        assert_eq!(tag, "tag:yaml.org,2002:float");
        assert!(matches!(constructed, Value::Float(f) if f.is_nan()));
        assert!(resolve_implicit(&schema, "-.nan").is_none());
    }

    #[test]
    fn explicit_lookup_by_kind() {
        let schema = Schema::core();
        assert!(schema.lookup(Kind::Scalar, "tag:yaml.org,2002:str").is_some());
        assert!(schema.lookup(Kind::Sequence, "tag:yaml.org,2002:seq").is_some());
        assert!(schema.lookup(Kind::Scalar, "tag:yaml.org,2002:seq").is_none());
        assert!(schema.lookup(Kind::Mapping, "tag:example.com,2024:x").is_none());
    }

    #[test]
    fn int_before_float_in_scan_order() {
        let schema = Schema::core();
        let (tag, _) = resolve_implicit(&schema, "7").unwrap();
        assert_eq!(tag, "tag:yaml.org,2002:int");
    }

    #[test]
    fn huge_int_degrades_to_float() {
        let schema = Schema::core();
        let (_, constructed) = resolve_implicit(&schema, "18446744073709551615").unwrap();
        assert!(matches!(constructed, Value::Float(_)));
    }
}
