use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use modwire::{Application, MetadataRegistry, ShutdownOptions};
use modwire_bootstrap::{AppConfig, CliArgs};

use std::path::PathBuf;
use std::sync::Arc;

mod modules;

use modules::{AppModule, RuntimeInfo};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Modwire Server - sample application on the modwire bootstrap
#[derive(Parser)]
#[command(name = "modwire-server")]
#[command(about = "Modwire Server - sample application on the modwire bootstrap")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port override for HTTP server (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Validate configuration and the module graph, then exit
    Check,
    /// Print the route table as JSON
    Routes,
    /// Print the generated OpenAPI document
    Openapi,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        port: cli.port,
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    // Layered config:
    // 1) defaults -> 2) YAML (if provided) -> 3) env (APP__*) -> 4) CLI overrides
    let config = load_config(cli.config.as_deref(), &args)?;

    let logging_config = config.logging.as_ref().cloned().unwrap_or_default();
    modwire_bootstrap::init_logging(&logging_config, &config.home_dir());

    tracing::info!("Modwire Server starting");

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::Check => check(config),
        Commands::Routes => {
            let app = build_app(&config)?;
            println!("{}", serde_json::to_string_pretty(&app.route_listing())?);
            Ok(())
        }
        Commands::Openapi => {
            let app = build_app(&config)?;
            println!("{}", serde_json::to_string_pretty(app.openapi())?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&std::path::Path>, args: &CliArgs) -> Result<AppConfig> {
    let mut config = AppConfig::load_or_default(path)?;
    config.apply_cli_overrides(args);
    Ok(config)
}

/// Discover declarations and bootstrap the application module graph.
fn build_app(config: &AppConfig) -> Result<Application> {
    let mut openapi = config.openapi.clone();
    openapi.server_url = Some(config.advertised_url());

    let info = RuntimeInfo::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    Application::builder(MetadataRegistry::discover())
        .instance(Arc::new(info))
        .router_config(config.router.clone())
        .openapi_config(openapi)
        .bootstrap::<AppModule>()
        .context("application bootstrap failed")
}

async fn run_server(config: AppConfig) -> Result<()> {
    tracing::info!("Initializing modules…");
    let app = build_app(&config)?;
    modwire::serve(app, &config.bind_addr(), ShutdownOptions::Signals).await
}

fn check(config: AppConfig) -> Result<()> {
    tracing::info!("Checking configuration…");
    let app = build_app(&config)?;
    println!("Configuration is valid");
    println!(
        "Module graph loaded: {} controllers, {} routes",
        app.context().controllers().len(),
        app.routes().len()
    );
    println!("{}", config.to_yaml()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use modwire::RouteOrdering;
    use std::io::Write;

    fn args(port: Option<u16>, verbose: u8) -> CliArgs {
        CliArgs {
            config: None,
            port,
            print_config: false,
            verbose,
        }
    }

    #[test]
    fn yaml_config_and_cli_overrides_feed_bootstrap() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
server:
  host: "0.0.0.0"
  port: 8080
router:
  ordering: fewest_params
  debug_routes: true
openapi:
  title: "Test API"
"#
        )
        .unwrap();

        let config = load_config(Some(file.path()), &args(Some(9090), 1)).unwrap();
        assert_eq!(config.bind_addr(), "0.0.0.0:9090");
        assert_eq!(config.router.ordering, RouteOrdering::FewestParams);
        let default = &config.logging.as_ref().unwrap()["default"];
        assert_eq!(default.console_level, "debug");

        let app = build_app(&config).unwrap();
        let v = serde_json::to_value(app.openapi()).unwrap();
        assert_eq!(v["info"]["title"], "Test API");
        assert_eq!(v["servers"][0]["url"], "http://localhost:9090");
        assert_eq!(app.route_listing()["totalRoutes"], 4);
    }

    #[test]
    fn defaults_bootstrap_without_a_file() {
        let config = load_config(None, &args(None, 0)).unwrap();
        assert_eq!(config.bind_addr(), "127.0.0.1:3000");
        assert!(build_app(&config).is_ok());
    }
}
