//! Configuration for the service.

use schemars::schema::RootSchema;

use crate::connection_settings::DatabaseConfig;
use crate::error::ConfigurationError;
use crate::version1::ParsedConfiguration;

/// The validated configuration the service runs with.
///
/// 'ParsedConfiguration' is whatever was read from disk; values of this type
/// are produced from it with 'make_runtime_configuration'.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub database: DatabaseConfig,
}

pub fn make_runtime_configuration(
    parsed_config: ParsedConfiguration,
) -> Result<Configuration, ConfigurationError> {
    parsed_config.database.validate()?;
    Ok(Configuration {
        database: parsed_config.database,
    })
}

/// The JSON schema of the configuration file.
pub fn configuration_jsonschema() -> RootSchema {
    schemars::schema_for!(ParsedConfiguration)
}
