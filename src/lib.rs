pub mod api;
pub mod config;
pub mod db;
pub mod entities;
pub mod services;
pub mod state;

use anyhow::Context;
pub use config::Config;
use db::Store;
use services::password_policy;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;

    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
        Some(handle)
    } else {
        None
    };

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = config.general.log_level.clone();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

    let fmt_layer = tracing_subscriber::fmt::layer();

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if config.observability.loki_enabled {
        let url = url::Url::parse(&config.observability.loki_url).context("Invalid Loki URL")?;

        let mut builder = tracing_loki::builder();
        for (key, value) in &config.observability.loki_labels {
            builder = builder.label(key, value)?;
        }

        let (layer, task) = builder.build_url(url)?;

        tokio::spawn(task);

        registry.with(layer).init();
        info!(
            "Loki logging initialized at {}",
            config.observability.loki_url
        );
    } else {
        registry.init();
    }

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    match args[1].as_str() {
        "daemon" | "-d" | "--daemon" => run_daemon(config, prometheus_handle).await,

        "init" | "--init" => {
            if Config::create_default_if_missing()? {
                println!("✓ Config file created. Edit config.toml and run again.");
            } else {
                println!("Config file already exists, leaving it alone.");
            }
            Ok(())
        }

        "admin" => {
            if args.len() < 3 {
                println!("Usage: maintarr admin <subcommand>");
                println!("Subcommands:");
                println!("  create            Create an administrator account (interactive)");
                println!("  reset-password    Reset a user's password (interactive)");
                return Ok(());
            }
            match args[2].as_str() {
                "create" => cmd_admin_create(&config).await,
                "reset-password" => cmd_admin_reset_password(&config).await,
                _ => {
                    println!("Unknown admin subcommand: {}", args[2]);
                    Ok(())
                }
            }
        }

        "tokens" => {
            if args.len() < 3 || args[2] != "cleanup" {
                println!("Usage: maintarr tokens cleanup");
                return Ok(());
            }
            cmd_tokens_cleanup(&config).await
        }

        "help" | "-h" | "--help" => {
            print_help();
            Ok(())
        }

        unknown => {
            println!("Unknown command: {unknown}");
            println!();
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!("Maintarr - Preventive Maintenance Tracker");
    println!("Device registry, PM checklists, maintenance logs, and QR history access");
    println!();
    println!("USAGE:");
    println!("  maintarr <COMMAND>");
    println!();
    println!("COMMANDS:");
    println!("  daemon            Run the API server");
    println!("  init              Create default config file");
    println!("  admin create      Create an administrator account (interactive)");
    println!("  admin reset-password");
    println!("                    Reset a user's password (interactive)");
    println!("  tokens cleanup    Delete expired refresh and QR tokens");
    println!("  help              Show this help message");
    println!();
    println!("CONFIGURATION:");
    println!("  Looks for config.toml in the working directory, then the");
    println!("  per-user config directory. Run 'maintarr init' to create one.");
    println!("  The JWT secret can be set via MAINTARR_JWT_SECRET.");
}

async fn run_daemon(
    config: Config,
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> anyhow::Result<()> {
    config.validate()?;

    info!(
        "Maintarr v{} starting in daemon mode...",
        env!("CARGO_PKG_VERSION")
    );

    let port = config.server.port;
    let state = api::create_app_state_from_config(config, prometheus_handle).await?;

    let app = api::router(state).await;
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let server_handle = tokio::spawn(async move {
        info!("API server running at http://0.0.0.0:{}", port);
        if let Err(e) = axum::serve(listener, app).await {
            error!("API server error: {}", e);
        }
    });

    info!("Daemon running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }

    server_handle.abort();
    info!("Daemon stopped");

    Ok(())
}

fn prompt(label: &str) -> anyhow::Result<String> {
    println!("{label}:");
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

async fn cmd_admin_create(config: &Config) -> anyhow::Result<()> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    let username = prompt("Username")?;
    if username.is_empty() {
        println!("Username is required.");
        return Ok(());
    }
    if store.username_exists(&username).await? {
        println!("Username already exists.");
        return Ok(());
    }

    let password = prompt("Password")?;
    let strength = password_policy::validate_strength(&password);
    if !strength.is_valid() {
        println!(
            "Password is too weak: must include {}",
            strength.failed_requirements().join(", ")
        );
        return Ok(());
    }

    let last_name = prompt("Last name")?;
    let first_name = prompt("First name")?;
    let middle_name = prompt("Middle name")?;
    let position = prompt("Position")?;

    let user = store
        .create_user(
            db::NewUser {
                username,
                password,
                last_name,
                first_name,
                middle_name,
                position,
                role: "admin".to_string(),
            },
            &config.security,
        )
        .await?;

    println!("✓ Administrator '{}' created (id {}).", user.username, user.id);
    println!("  The account must change its password at first login.");
    Ok(())
}

async fn cmd_admin_reset_password(config: &Config) -> anyhow::Result<()> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    let username = prompt("Username")?;
    let Some(user) = store.get_user_by_username(&username).await? else {
        println!("No user named '{username}'.");
        return Ok(());
    };

    let password = prompt("New password")?;
    let strength = password_policy::validate_strength(&password);
    if !strength.is_valid() {
        println!(
            "Password is too weak: must include {}",
            strength.failed_requirements().join(", ")
        );
        return Ok(());
    }

    let Some(updated) = store
        .reset_password(user.id, &password, &config.security)
        .await?
    else {
        println!("No user named '{username}'.");
        return Ok(());
    };

    println!("✓ Password reset for '{}'.", updated.username);
    println!("  The account must change it at next login.");
    Ok(())
}

async fn cmd_tokens_cleanup(config: &Config) -> anyhow::Result<()> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    let refresh = store.sweep_expired_refresh_tokens().await?;
    let qr = store.cleanup_expired_qr_tokens().await?;

    println!("✓ Cleanup complete.");
    println!("  Expired refresh tokens deleted: {refresh}");
    println!("  Expired QR tokens deleted: {qr}");
    Ok(())
}
