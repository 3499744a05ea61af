use crate::config::{ConfigError, ConfigResult, ConfigSource, ConfigValidator, Identifier, PortValidator, TableName};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "APP_NAME";
pub const DB_SERVER: &str = "DB_SERVER";
pub const DB_PORT: &str = "DB_PORT";
pub const DB_NAME: &str = "DB_NAME";
pub const DB_USER: &str = "DB_USER";
pub const DB_PWD: &str = "DB_PWD";
pub const CONNECTION_RETRY: &str = "CONNECTION_RETRY";
pub const CREATE_DB_IF_NOT_EXISTS: &str = "CREATE_DB_IF_NOT_EXISTS";
pub const DB_MIGRATION_TABLE: &str = "DB_MIGRATION_TABLE";
pub const MIGRATIONS_FOLDER: &str = "MIGRATIONS_FOLDER";

const DEFAULT_MIGRATION_TABLE: &str = "migration_log";
const DEFAULT_MIGRATIONS_FOLDER: &str = "database";

/// Values given on the command line, taking precedence over the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database: Option<String>,
    pub connection_string: Option<String>,
    pub migrations_folder: Option<PathBuf>,
}

/// Settings for a migration run
#[derive(Debug, Clone)]
pub struct MigrateConfig {
    /// Application name reported to the database server
    pub app_name: String,
    pub db_server: Option<String>,
    pub db_port: Option<u16>,
    /// Target database; validated because it is interpolated into `CREATE DATABASE`
    pub db_name: Identifier,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
    /// Full connection string; when set, server, port and credentials come from it
    pub connection_string: Option<String>,
    /// Number of connection attempts before a connectivity fault is reported
    pub connection_retry: u32,
    pub create_db_if_not_exists: bool,
    pub migration_table: TableName,
    pub migrations_folder: PathBuf,
    sources: HashMap<String, ConfigSource>,
}

impl MigrateConfig {
    /// Load configuration from the process environment, reading `.env` first if present
    pub fn from_env(overrides: ConfigOverrides) -> ConfigResult<Self> {
        load_env_file()?;
        Self::from_lookup(|key| env::var(key).ok(), overrides)
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F, overrides: ConfigOverrides) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut sources = HashMap::new();
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let app_name = match get(APP_NAME) {
            Some(name) => {
                sources.insert("app_name".to_string(), ConfigSource::EnvVar(APP_NAME.to_string()));
                name
            }
            None => {
                sources.insert("app_name".to_string(), ConfigSource::Default(crate::TOOL_NAME.to_string()));
                crate::TOOL_NAME.to_string()
            }
        };

        let connection_string = match overrides.connection_string.filter(|s| !s.trim().is_empty()) {
            Some(url) => {
                sources.insert(
                    "connection_string".to_string(),
                    ConfigSource::CommandLine("--connection-string".to_string()),
                );
                Some(url.trim().to_string())
            }
            None => None,
        };
        let needs_server = connection_string.is_none();

        let require = |key: &str| -> ConfigResult<Option<String>> {
            match get(key) {
                Some(value) => Ok(Some(value)),
                None if needs_server => Err(ConfigError::missing_required(
                    key,
                    format!("Set {} in the environment or .env file, or pass --connection-string", key),
                )),
                None => Ok(None),
            }
        };

        let db_server = require(DB_SERVER)?;
        let db_port = match require(DB_PORT)? {
            Some(raw) => {
                let port: u16 = raw
                    .parse()
                    .map_err(|_| ConfigError::invalid_value(DB_PORT, &raw, "valid port number"))?;
                PortValidator::default().validate(DB_PORT, &port)?;
                Some(port)
            }
            None => None,
        };
        let db_user = require(DB_USER)?;
        let db_password = require(DB_PWD)?;
        for (field, key, value) in [
            ("db_server", DB_SERVER, &db_server),
            ("db_user", DB_USER, &db_user),
        ] {
            if value.is_some() {
                sources.insert(field.to_string(), ConfigSource::EnvVar(key.to_string()));
            }
        }

        let db_name = match overrides.database.filter(|s| !s.trim().is_empty()) {
            Some(name) => {
                sources.insert("db_name".to_string(), ConfigSource::CommandLine("--database".to_string()));
                Identifier::parse("--database", &name)?
            }
            None => {
                let name = get(DB_NAME).ok_or_else(|| {
                    ConfigError::missing_required(DB_NAME, "Set DB_NAME in the environment or pass --database")
                })?;
                sources.insert("db_name".to_string(), ConfigSource::EnvVar(DB_NAME.to_string()));
                Identifier::parse(DB_NAME, &name)?
            }
        };

        let connection_retry = match get(CONNECTION_RETRY) {
            Some(raw) => {
                let attempts: u32 = raw.parse().map_err(|_| {
                    ConfigError::invalid_value(CONNECTION_RETRY, &raw, "positive number of connection attempts")
                })?;
                sources.insert("connection_retry".to_string(), ConfigSource::EnvVar(CONNECTION_RETRY.to_string()));
                attempts
            }
            None => {
                sources.insert("connection_retry".to_string(), ConfigSource::Default("1".to_string()));
                1
            }
        };

        let create_db_if_not_exists = match get(CREATE_DB_IF_NOT_EXISTS) {
            Some(raw) => {
                sources.insert(
                    "create_db_if_not_exists".to_string(),
                    ConfigSource::EnvVar(CREATE_DB_IF_NOT_EXISTS.to_string()),
                );
                raw.eq_ignore_ascii_case("true")
            }
            None => {
                sources.insert(
                    "create_db_if_not_exists".to_string(),
                    ConfigSource::Default("false".to_string()),
                );
                false
            }
        };

        let migration_table = match get(DB_MIGRATION_TABLE) {
            Some(raw) => {
                sources.insert("migration_table".to_string(), ConfigSource::EnvVar(DB_MIGRATION_TABLE.to_string()));
                TableName::parse(DB_MIGRATION_TABLE, &raw)?
            }
            None => {
                sources.insert(
                    "migration_table".to_string(),
                    ConfigSource::Default(DEFAULT_MIGRATION_TABLE.to_string()),
                );
                TableName::parse(DB_MIGRATION_TABLE, DEFAULT_MIGRATION_TABLE)?
            }
        };

        let migrations_folder = match (overrides.migrations_folder, get(MIGRATIONS_FOLDER)) {
            (Some(folder), _) => {
                sources.insert(
                    "migrations_folder".to_string(),
                    ConfigSource::CommandLine("--migrations-folder".to_string()),
                );
                folder
            }
            (None, Some(folder)) => {
                sources.insert("migrations_folder".to_string(), ConfigSource::EnvVar(MIGRATIONS_FOLDER.to_string()));
                PathBuf::from(folder)
            }
            (None, None) => {
                sources.insert(
                    "migrations_folder".to_string(),
                    ConfigSource::Default(DEFAULT_MIGRATIONS_FOLDER.to_string()),
                );
                PathBuf::from(DEFAULT_MIGRATIONS_FOLDER)
            }
        };

        let config = Self {
            app_name,
            db_server,
            db_port,
            db_name,
            db_user,
            db_password,
            connection_string,
            connection_retry,
            create_db_if_not_exists,
            migration_table,
            migrations_folder,
            sources,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> ConfigResult<()> {
        if self.connection_retry == 0 {
            return Err(ConfigError::invalid_value(
                CONNECTION_RETRY,
                "0",
                "at least one connection attempt",
            ));
        }

        if self.connection_string.is_none() && (self.db_server.is_none() || self.db_port.is_none()) {
            return Err(ConfigError::validation_failed(
                "either a connection string or DB_SERVER and DB_PORT must be configured",
            ));
        }

        if self.migrations_folder.as_os_str().is_empty() {
            return Err(ConfigError::invalid_value(
                MIGRATIONS_FOLDER,
                "",
                "path to the migrations root folder",
            ));
        }

        Ok(())
    }

    /// Folder holding the migration scripts
    pub fn script_folder(&self) -> PathBuf {
        self.migrations_folder.join("migration")
    }

    /// Folder holding per-object schema scripts (`schema/<kind>/<name>.sql`)
    pub fn schema_folder(&self) -> PathBuf {
        self.migrations_folder.join("schema")
    }

    /// Folder holding free-standing SQL scripts
    pub fn sql_script_folder(&self) -> PathBuf {
        self.migrations_folder.join("sqlscript")
    }

    pub fn migrations_folder(&self) -> &Path {
        &self.migrations_folder
    }

    /// Where each setting was taken from
    pub fn config_sources(&self) -> &HashMap<String, ConfigSource> {
        &self.sources
    }

    /// Setting provenance ordered by setting name, for display
    pub fn sorted_sources(&self) -> Vec<(&str, &ConfigSource)> {
        let mut sources: Vec<_> = self
            .sources
            .iter()
            .map(|(field, source)| (field.as_str(), source))
            .collect();
        sources.sort_by_key(|(field, _)| *field);
        sources
    }
}

/// Load `.env` from the working directory into the process environment.
/// A missing file is not an error.
pub fn load_env_file() -> ConfigResult<()> {
    match dotenv::dotenv() {
        Ok(path) => {
            tracing::debug!("Loaded environment from {}", path.display());
            Ok(())
        }
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(ConfigError::environment_error(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn complete() -> Vec<(&'static str, &'static str)> {
        vec![
            (DB_SERVER, "localhost"),
            (DB_PORT, "5432"),
            (DB_NAME, "sales"),
            (DB_USER, "postgres"),
            (DB_PWD, "secret"),
            (CONNECTION_RETRY, "3"),
            (CREATE_DB_IF_NOT_EXISTS, "TRUE"),
            (DB_MIGRATION_TABLE, "migration_log"),
            (MIGRATIONS_FOLDER, "db"),
        ]
    }

    #[test]
    fn test_complete_environment() {
        let config = MigrateConfig::from_lookup(lookup(&complete()), ConfigOverrides::default()).unwrap();

        assert_eq!(config.app_name, "tidemark");
        assert_eq!(config.db_server.as_deref(), Some("localhost"));
        assert_eq!(config.db_port, Some(5432));
        assert_eq!(config.db_name.as_str(), "sales");
        assert_eq!(config.connection_retry, 3);
        assert!(config.create_db_if_not_exists);
        assert_eq!(config.migration_table.to_string(), "migration_log");
        assert_eq!(config.script_folder(), PathBuf::from("db").join("migration"));
        assert_eq!(config.sql_script_folder(), PathBuf::from("db").join("sqlscript"));
        assert!(config.config_sources()["db_name"].is_env_var());
        assert!(config.config_sources()["app_name"].is_default());

        let sorted = config.sorted_sources();
        let fields: Vec<&str> = sorted.iter().map(|(field, _)| *field).collect();
        let mut expected = fields.clone();
        expected.sort();
        assert_eq!(fields, expected);
        assert!(sorted.contains(&("db_name", &ConfigSource::EnvVar(DB_NAME.to_string()))));
    }

    #[test]
    fn test_missing_required_setting() {
        let mut vars = complete();
        vars.retain(|(k, _)| *k != DB_SERVER);

        let err = MigrateConfig::from_lookup(lookup(&vars), ConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { ref field, .. } if field == DB_SERVER));
    }

    #[test]
    fn test_non_numeric_port_is_rejected() {
        let mut vars = complete();
        vars.retain(|(k, _)| *k != DB_PORT);
        vars.push((DB_PORT, "fivefourthreetwo"));

        let err = MigrateConfig::from_lookup(lookup(&vars), ConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == DB_PORT));
    }

    #[test]
    fn test_zero_connection_attempts_rejected() {
        let mut vars = complete();
        vars.retain(|(k, _)| *k != CONNECTION_RETRY);
        vars.push((CONNECTION_RETRY, "0"));

        assert!(MigrateConfig::from_lookup(lookup(&vars), ConfigOverrides::default()).is_err());
    }

    #[test]
    fn test_invalid_table_name_rejected_at_load() {
        let mut vars = complete();
        vars.retain(|(k, _)| *k != DB_MIGRATION_TABLE);
        vars.push((DB_MIGRATION_TABLE, "log; drop table x"));

        let err = MigrateConfig::from_lookup(lookup(&vars), ConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_connection_string_relaxes_server_settings() {
        let vars = [(DB_NAME, "sales")];
        let overrides = ConfigOverrides {
            connection_string: Some("postgres://u:p@db:5432/sales".to_string()),
            ..Default::default()
        };

        let config = MigrateConfig::from_lookup(lookup(&vars), overrides).unwrap();
        assert!(config.db_server.is_none());
        assert_eq!(config.connection_string.as_deref(), Some("postgres://u:p@db:5432/sales"));
        assert!(config.config_sources()["connection_string"].is_command_line());
        assert_eq!(config.migration_table.to_string(), "migration_log");
        assert_eq!(config.migrations_folder(), Path::new("database"));
        assert!(!config.create_db_if_not_exists);
    }

    #[test]
    fn test_overrides_take_precedence() {
        let overrides = ConfigOverrides {
            database: Some("reporting".to_string()),
            migrations_folder: Some(PathBuf::from("other")),
            ..Default::default()
        };

        let config = MigrateConfig::from_lookup(lookup(&complete()), overrides).unwrap();
        assert_eq!(config.db_name.as_str(), "reporting");
        assert_eq!(config.migrations_folder(), Path::new("other"));
        assert!(config.config_sources()["migrations_folder"].is_command_line());
    }

    #[test]
    #[serial]
    fn test_from_env_reads_process_environment() {
        for (key, value) in complete() {
            env::set_var(key, value);
        }
        env::set_var(DB_NAME, "from_env");

        let config = MigrateConfig::from_env(ConfigOverrides::default()).unwrap();
        assert_eq!(config.db_name.as_str(), "from_env");

        for (key, _) in complete() {
            env::remove_var(key);
        }
    }
}
