use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Main application configuration with strongly-typed sections.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Core server configuration.
    pub server: ServerConfig,
    /// Logging configuration (optional, uses defaults if None).
    pub logging: Option<LoggingConfig>,
    /// Route table construction and dispatch behavior.
    #[serde(default)]
    pub router: RouterConfig,
    /// Document-level metadata for the generated OpenAPI spec.
    #[serde(default)]
    pub openapi: OpenApiConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Base directory for relative log file paths.
    #[serde(default = "default_home_dir")]
    pub home_dir: String,
    pub host: String,
    pub port: u16,
}

/// Logging configuration - maps subsystem names to their logging settings.
/// Key "default" is the catch-all for logs that don't match explicit subsystems.
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Section {
    pub console_level: String, // "info", "debug", "error", "off"
    pub file: String,          // "logs/api.log"
    #[serde(default)]
    pub file_level: String,
    pub max_age_days: Option<u32>,
    #[serde(default)]
    pub max_backups: Option<usize>, // How many files to keep
    #[serde(default)]
    pub max_size_mb: Option<u64>, // Max size of the file in MB
}

/// Tie-break rule used when sorting a controller's routes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteOrdering {
    /// More literal segments first, then fewer parameters, then longer path.
    #[default]
    MostLiteral,
    /// Fewer parameters first, then longer path.
    FewestParams,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct RouterConfig {
    pub ordering: RouteOrdering,
    /// Wrap successful JSON replies as `{ "data": ..., "code": status }`.
    pub wrap_responses: bool,
    /// Expose `GET /debug/routes` with the registered route table.
    pub debug_routes: bool,
    /// Path the generated OpenAPI document is served from; empty disables it.
    pub docs_path: String,
    /// Upper bound for buffered request bodies.
    pub max_body_bytes: usize,
    /// Answer CORS preflights and add permissive CORS headers.
    pub cors_enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct OpenApiConfig {
    pub title: String,
    pub version: String,
    pub description: String,
    /// Server URL advertised in the document; derived from the bind port when unset.
    pub server_url: Option<String>,
    pub server_description: String,
}

fn default_home_dir() -> String {
    ".".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            home_dir: default_home_dir(),
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            ordering: RouteOrdering::MostLiteral,
            wrap_responses: false,
            debug_routes: false,
            docs_path: "/api-docs.json".to_string(),
            max_body_bytes: 2 * 1024 * 1024,
            cors_enabled: true,
        }
    }
}

impl Default for OpenApiConfig {
    fn default() -> Self {
        Self {
            title: "Modwire API".to_string(),
            version: "1.0.0".to_string(),
            description: "API documentation".to_string(),
            server_url: None,
            server_description: "Development server".to_string(),
        }
    }
}

/// Create a default logging configuration.
pub fn default_logging_config() -> LoggingConfig {
    let mut logging = HashMap::new();
    logging.insert(
        "default".to_string(),
        Section {
            console_level: "info".to_string(),
            file: "logs/modwire.log".to_string(),
            file_level: "debug".to_string(),
            max_age_days: Some(7),
            max_backups: Some(3),
            max_size_mb: Some(100),
        },
    );
    logging
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: Some(default_logging_config()),
            router: RouterConfig::default(),
            openapi: OpenApiConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration with layered loading: defaults → YAML file → environment variables.
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        // Optional sections stay None unless YAML/ENV provides them.
        let base = AppConfig {
            logging: None,
            ..AppConfig::default()
        };

        let figment = Figment::new()
            .merge(Serialized::defaults(base))
            .merge(Yaml::file(config_path.as_ref()))
            // Example: APP__SERVER__PORT=3000 maps to server.port
            .merge(Env::prefixed("APP__").split("__"));

        figment
            .extract()
            .with_context(|| "Failed to extract config from figment".to_string())
    }

    /// Load configuration from file or create with default values.
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_layered(path),
            None => Ok(Self::default()),
        }
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config to YAML")
    }

    /// Apply overrides from command line arguments.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(port) = args.port {
            self.server.port = port;
        }

        // Set logging level based on verbose flags for "default" section.
        let logging = self.logging.get_or_insert_with(default_logging_config);
        if let Some(default_section) = logging.get_mut("default") {
            default_section.console_level = match args.verbose {
                0 => default_section.console_level.clone(), // keep
                1 => "debug".to_string(),
                _ => "trace".to_string(),
            };
        }
    }

    /// Directory that relative log paths are resolved against.
    pub fn home_dir(&self) -> PathBuf {
        PathBuf::from(&self.server.home_dir)
    }

    /// `host:port` the HTTP listener binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Server URL advertised in the OpenAPI document.
    pub fn advertised_url(&self) -> String {
        self.openapi
            .server_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.server.port))
    }
}

/// Command line arguments structure.
#[derive(Debug, Clone)]
pub struct CliArgs {
    pub config: Option<String>,
    pub port: Option<u16>,
    pub print_config: bool,
    pub verbose: u8,
}

#[cfg(test)]
mod section_tests;

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_structure() {
        let config = AppConfig::default();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.home_dir, ".");

        let logging = config.logging.as_ref().unwrap();
        let default_section = &logging["default"];
        assert_eq!(default_section.console_level, "info");
        assert_eq!(default_section.file, "logs/modwire.log");

        assert_eq!(config.router.ordering, RouteOrdering::MostLiteral);
        assert!(!config.router.wrap_responses);
        assert!(config.router.cors_enabled);
        assert_eq!(config.router.docs_path, "/api-docs.json");
        assert_eq!(config.openapi.version, "1.0.0");
    }

    #[test]
    fn test_load_layered_reads_all_sections() {
        let tmp = tempdir().unwrap();
        let cfg_path = tmp.path().join("cfg.yaml");

        let yaml = r#"
server:
  home_dir: "/var/lib/modwire"
  host: "0.0.0.0"
  port: 9090

logging:
  default:
    console_level: debug
    file: "logs/default.log"

router:
  ordering: fewest_params
  debug_routes: true
  cors_enabled: false

openapi:
  title: "Inventory API"
  server_url: "https://api.example.com"
"#;
        fs::write(&cfg_path, yaml).unwrap();

        let config = AppConfig::load_layered(&cfg_path).unwrap();

        assert_eq!(config.server.home_dir, "/var/lib/modwire");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.bind_addr(), "0.0.0.0:9090");

        let def = &config.logging.as_ref().unwrap()["default"];
        assert_eq!(def.console_level, "debug");
        assert_eq!(def.file, "logs/default.log");

        assert_eq!(config.router.ordering, RouteOrdering::FewestParams);
        assert!(config.router.debug_routes);
        assert!(!config.router.cors_enabled);
        // untouched keys keep their defaults
        assert_eq!(config.router.docs_path, "/api-docs.json");

        assert_eq!(config.openapi.title, "Inventory API");
        assert_eq!(config.advertised_url(), "https://api.example.com");
    }

    #[test]
    fn test_minimal_yaml_config() {
        let tmp = tempdir().unwrap();
        let cfg_path = tmp.path().join("cfg.yaml");

        let yaml = r#"
server:
  host: "localhost"
  port: 8080
"#;
        fs::write(&cfg_path, yaml).unwrap();

        let config = AppConfig::load_layered(&cfg_path).unwrap();

        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.home_dir, ".");

        // Optional sections default to None
        assert!(config.logging.is_none());
        assert_eq!(config.advertised_url(), "http://localhost:8080");
    }

    #[test]
    fn test_load_or_default_without_path() {
        let config = AppConfig::load_or_default(None::<&str>).unwrap();
        assert_eq!(config.server.port, 3000);
        assert!(config.logging.is_some());
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = AppConfig::default();

        let args = CliArgs {
            config: None,
            port: Some(4000),
            print_config: false,
            verbose: 2, // trace
        };

        config.apply_cli_overrides(&args);

        assert_eq!(config.server.port, 4000);

        let logging = config.logging.as_ref().unwrap();
        assert_eq!(logging["default"].console_level, "trace");
    }

    #[test]
    fn test_cli_verbose_levels_matrix() {
        for (verbose_level, expected_log_level) in
            [(0, "info"), (1, "debug"), (2, "trace"), (3, "trace")]
        {
            let mut config = AppConfig::default();
            let args = CliArgs {
                config: None,
                port: None,
                print_config: false,
                verbose: verbose_level,
            };

            config.apply_cli_overrides(&args);

            let logging = config.logging.as_ref().unwrap();
            assert_eq!(logging["default"].console_level, expected_log_level);
        }
    }

    #[test]
    fn test_cli_overrides_create_logging_section_when_missing() {
        let mut config = AppConfig {
            logging: None,
            ..AppConfig::default()
        };
        let args = CliArgs {
            config: None,
            port: None,
            print_config: false,
            verbose: 1,
        };

        config.apply_cli_overrides(&args);

        let logging = config.logging.as_ref().unwrap();
        assert_eq!(logging["default"].console_level, "debug");
    }

    #[test]
    fn test_to_yaml_roundtrip_basic() {
        let config = AppConfig::default();
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("server:"));
        assert!(yaml.contains("router:"));
        assert!(yaml.contains("openapi:"));

        let roundtrip: AppConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(roundtrip.server.port, config.server.port);
        assert_eq!(roundtrip.router.ordering, config.router.ordering);
    }

    #[test]
    fn test_invalid_yaml_missing_required_field() {
        let invalid_yaml = r#"
server:
  # Missing required host field
  port: 3000
"#;

        let result: Result<AppConfig, _> = serde_yaml::from_str(invalid_yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_router_key_rejected() {
        let tmp = tempdir().unwrap();
        let cfg_path = tmp.path().join("cfg.yaml");
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 3000
router:
  sort_mode: literal
"#;
        fs::write(&cfg_path, yaml).unwrap();

        assert!(AppConfig::load_layered(&cfg_path).is_err());
    }
}
