//! Configuration of the database connection.

pub mod configuration;
pub mod connection_settings;
pub mod environment;
pub mod error;
pub mod values;
pub mod version1;

pub use configuration::{configuration_jsonschema, make_runtime_configuration, Configuration};
pub use connection_settings::DatabaseConfig;
pub use error::{
    ConfigurationError, InitializationError, ParseConfigurationError, WriteParsedConfigurationError,
};
pub use values::{PoolSettings, Secret};
pub use version1::{parse_configuration, write_parsed_configuration, ParsedConfiguration};
