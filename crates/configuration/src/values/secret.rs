use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::environment::{Environment, EnvironmentError};

/// Prefix selecting [`Secret::FromEnvironment`] when parsing from a string.
const ENV_PREFIX: &str = "env:";

/// A value that is either written down or read from the environment.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum Secret {
    Plain(String),
    #[serde(rename_all = "camelCase")]
    FromEnvironment { variable: String },
}

impl Secret {
    pub fn resolve(&self, environment: &impl Environment) -> Result<Cow<'_, str>, EnvironmentError> {
        match self {
            Secret::Plain(value) => Ok(Cow::Borrowed(value)),
            Secret::FromEnvironment { variable } => Ok(Cow::Owned(environment.read(variable)?)),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        match self {
            Secret::Plain(value) => value.is_empty(),
            Secret::FromEnvironment { variable } => variable.is_empty(),
        }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Secret::Plain(_) => f.write_str("Plain(<redacted>)"),
            Secret::FromEnvironment { variable } => f
                .debug_struct("FromEnvironment")
                .field("variable", variable)
                .finish(),
        }
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Secret::Plain(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

/// `env:NAME` reads `NAME` from the environment, anything else is taken as is.
impl FromStr for Secret {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value.strip_prefix(ENV_PREFIX) {
            Some(variable) => Secret::FromEnvironment {
                variable: variable.to_string(),
            },
            None => Secret::Plain(value.to_string()),
        })
    }
}
