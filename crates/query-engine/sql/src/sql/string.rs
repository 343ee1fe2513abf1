//! Type definitions of a low-level SQL string representation.

use indexmap::IndexMap;
use thiserror::Error;

/// A statement with positional placeholders (`$1`, `$2`, ...) and the values bound to them.
#[derive(Debug, Clone, PartialEq)]
pub struct SQL {
    pub sql: String,
    pub params: Vec<Param>,
    /// for internal use and tests only
    pub param_index: u64,
}

impl Default for SQL {
    fn default() -> Self {
        Self::new()
    }
}

/// A parameter for a parameterized query.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// A literal string
    String(String),
    /// A `text[]` value, used with array operators such as `&&` and `= ANY`.
    StringArray(Vec<String>),
    Uuid(uuid::Uuid),
    Json(serde_json::Value),
}

impl SQL {
    pub fn new() -> SQL {
        SQL {
            sql: String::new(),
            params: vec![],
            param_index: 0,
        }
    }

    /// Wrap statement text whose placeholders are already positional.
    pub fn positional(sql: impl Into<String>, params: Vec<Param>) -> SQL {
        SQL {
            sql: sql.into(),
            param_index: params.len() as u64,
            params,
        }
    }

    pub fn append_syntax(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    pub fn append_identifier(&mut self, sql: &str) {
        self.sql.push('"');
        self.sql.push_str(&sql.replace('"', "\"\""));
        self.sql.push('"');
    }

    pub fn append_param(&mut self, param: Param) {
        self.param_index += 1;
        self.sql.push_str(format!("${}", self.param_index).as_str());
        self.params.push(param);
    }
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Param::Bool(value)
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Int(value)
    }
}

impl From<i32> for Param {
    fn from(value: i32) -> Self {
        Param::Int(value.into())
    }
}

impl From<u32> for Param {
    fn from(value: u32) -> Self {
        Param::Int(value.into())
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Param::Float(value)
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::String(value)
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::String(value.to_string())
    }
}

impl From<Vec<String>> for Param {
    fn from(value: Vec<String>) -> Self {
        Param::StringArray(value)
    }
}

impl From<&[String]> for Param {
    fn from(value: &[String]) -> Self {
        Param::StringArray(value.to_vec())
    }
}

impl From<uuid::Uuid> for Param {
    fn from(value: uuid::Uuid) -> Self {
        Param::Uuid(value)
    }
}

impl From<serde_json::Value> for Param {
    fn from(value: serde_json::Value) -> Self {
        Param::Json(value)
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        value.map_or(Param::Null, Into::into)
    }
}

/// Values substituted for `@name` placeholders. Insertion order is kept so
/// that debug output is stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedArgs(IndexMap<String, Param>);

impl NamedArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Param>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Param)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<K: Into<String>, V: Into<Param>, const N: usize> From<[(K, V); N]> for NamedArgs {
    fn from(pairs: [(K, V); N]) -> Self {
        let mut args = NamedArgs::new();
        for (name, value) in pairs {
            args.insert(name, value);
        }
        args
    }
}

/// The arguments of a statement: nothing, a positional list or a named set.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Arguments {
    #[default]
    None,
    Positional(Vec<Param>),
    Named(NamedArgs),
}

impl From<Vec<Param>> for Arguments {
    fn from(params: Vec<Param>) -> Self {
        Arguments::Positional(params)
    }
}

impl From<NamedArgs> for Arguments {
    fn from(args: NamedArgs) -> Self {
        Arguments::Named(args)
    }
}

/// Errors raised while binding arguments to statement text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("no value bound for named argument '@{0}'")]
    Missing(String),
}

impl Arguments {
    /// Produce the wire form of `sql`: named placeholders are rewritten to
    /// positional ones and the values are laid out in placeholder order.
    pub fn bind(&self, sql: &str) -> Result<SQL, ArgumentError> {
        match self {
            Arguments::None => Ok(SQL::positional(sql, vec![])),
            Arguments::Positional(params) => Ok(SQL::positional(sql, params.clone())),
            Arguments::Named(args) => bind_named(sql, args),
        }
    }
}

/// Rewrite every `@name` outside of literals, quoted identifiers and comments
/// into `$n`. A name used more than once reuses its first position. Arguments
/// that the statement never mentions are ignored.
fn bind_named(sql: &str, args: &NamedArgs) -> Result<SQL, ArgumentError> {
    let bytes = sql.as_bytes();
    let mut out = SQL::new();
    let mut positions: IndexMap<&str, u64> = IndexMap::new();
    let mut copied_up_to = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"') => i = skip_quoted(bytes, i, quote),
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = bytes[i..]
                    .iter()
                    .position(|b| *b == b'\n')
                    .map_or(bytes.len(), |offset| i + offset);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = sql[i + 2..]
                    .find("*/")
                    .map_or(bytes.len(), |offset| i + 2 + offset + 2);
            }
            b'@' if bytes.get(i + 1).is_some_and(|b| is_identifier_start(*b)) => {
                let name_start = i + 1;
                let name_end = bytes[name_start..]
                    .iter()
                    .position(|b| !is_identifier_continue(*b))
                    .map_or(bytes.len(), |offset| name_start + offset);
                let name = &sql[name_start..name_end];

                out.append_syntax(&sql[copied_up_to..i]);
                if let Some(index) = positions.get(name) {
                    out.append_syntax(format!("${index}").as_str());
                } else {
                    let value = args
                        .get(name)
                        .ok_or_else(|| ArgumentError::Missing(name.to_string()))?;
                    out.append_param(value.clone());
                    positions.insert(name, out.param_index);
                }

                i = name_end;
                copied_up_to = name_end;
            }
            _ => i += 1,
        }
    }

    out.append_syntax(&sql[copied_up_to..]);
    Ok(out)
}

/// Returns the index just past the closing quote. Doubled quotes are escapes.
fn skip_quoted(bytes: &[u8], open: usize, quote: u8) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn is_identifier_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_identifier_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
