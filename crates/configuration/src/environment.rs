//! Where secrets that are not written into the configuration come from.

use std::collections::HashMap;

use thiserror::Error;

/// A source of environment variables.
pub trait Environment {
    fn read(&self, variable: &str) -> Result<String, EnvironmentError>;
}

impl<T: Environment + ?Sized> Environment for &T {
    fn read(&self, variable: &str) -> Result<String, EnvironmentError> {
        (**self).read(variable)
    }
}

/// The environment of the running process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn read(&self, variable: &str) -> Result<String, EnvironmentError> {
        std::env::var(variable).map_err(|error| match error {
            std::env::VarError::NotPresent => EnvironmentError::NotPresent(variable.to_string()),
            std::env::VarError::NotUnicode(_) => EnvironmentError::NotUnicode(variable.to_string()),
        })
    }
}

/// A fixed set of variables, for tests.
#[derive(Debug, Clone, Default)]
pub struct FixedEnvironment(HashMap<String, String>);

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for FixedEnvironment {
    fn from(variables: [(K, V); N]) -> Self {
        FixedEnvironment(
            variables
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

impl Environment for FixedEnvironment {
    fn read(&self, variable: &str) -> Result<String, EnvironmentError> {
        self.0
            .get(variable)
            .cloned()
            .ok_or_else(|| EnvironmentError::NotPresent(variable.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvironmentError {
    #[error("the environment variable {0} is not set")]
    NotPresent(String),
    #[error("the environment variable {0} is not valid unicode")]
    NotUnicode(String),
}
