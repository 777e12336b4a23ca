use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use telepath::{
    adapters::{
        FileWatchReloadTrigger, HttpClientAdapter, HttpHandler, SignalReloadTrigger, http_server,
    },
    config::{RoutingTableValidator, Settings, load_routing_table, load_settings},
    core::{ConfigStore, Reloader},
    ports::http_client::HttpClient,
    tracing_setup,
    utils::GracefulShutdown,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    /// Settings file (TOML, YAML or JSON)
    #[clap(short, long, global = true)]
    settings: Option<PathBuf>,

    /// Routing table file, overrides `routes_path` from the settings
    #[clap(short, long, global = true)]
    routes: Option<PathBuf>,

    /// Listen address, overrides `listen_addr` from the settings
    #[clap(short, long, global = true)]
    listen: Option<String>,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Start the proxy (default)
    Serve,
    /// Check a routing table and report anything that would misroute traffic
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    let mut settings =
        load_settings(args.settings.as_deref()).wrap_err("Failed to load settings")?;
    if let Some(routes) = args.routes {
        settings.routes_path = routes;
    }
    if let Some(listen) = args.listen {
        settings.listen_addr = listen;
    }

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Validate => validate_routes_command(&settings.routes_path).await,
        Commands::Serve => serve_command(settings).await,
    }
}

async fn serve_command(settings: Settings) -> Result<()> {
    tracing_setup::init_tracing(&settings.log)
        .map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;

    let listen_addr: SocketAddr = settings
        .listen_addr
        .parse()
        .wrap_err_with(|| format!("Invalid listen address '{}'", settings.listen_addr))?;

    tracing::info!(
        "Loading initial routing table from {}",
        settings.routes_path.display()
    );
    let store = Arc::new(
        ConfigStore::open(settings.routes_path.clone())
            .await
            .wrap_err("Failed to load initial routing table")?,
    );

    let mut reloader = Reloader::new(store.clone());
    if cfg!(unix) {
        reloader = reloader.with_trigger(Arc::new(SignalReloadTrigger::new()));
    } else {
        tracing::warn!("SIGHUP reload is not available on this platform");
    }
    if settings.watch_routes_file {
        reloader =
            reloader.with_trigger(Arc::new(FileWatchReloadTrigger::new(&settings.routes_path)));
    }
    let reload_task = reloader.spawn().wrap_err("Failed to start reload triggers")?;

    let http_client: Arc<dyn HttpClient> =
        Arc::new(HttpClientAdapter::new().context("Failed to create HTTP client adapter")?);
    let handler = Arc::new(HttpHandler::new(store, http_client));

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .wrap_err_with(|| format!("Failed to bind {listen_addr}"))?;
    tracing::info!("Listening on {}", listen_addr);

    if let Some(pid_file) = &settings.pid_file {
        write_pid_file(pid_file).await?;
    }

    let shutdown = GracefulShutdown::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = shutdown.run_signal_handler().await {
                tracing::error!("Signal handler error: {}", e);
            }
        });
    }

    let server_result = http_server::serve(listener, handler, {
        let shutdown = shutdown.clone();
        async move {
            let reason = shutdown.wait_for_shutdown_signal().await;
            tracing::info!("Draining in-flight requests ({:?})", reason);
        }
    })
    .await;

    reload_task.abort();
    if let Some(pid_file) = &settings.pid_file {
        if let Err(e) = tokio::fs::remove_file(pid_file).await {
            tracing::warn!("Failed to remove pid file {}: {}", pid_file.display(), e);
        }
    }

    server_result?;
    if !shutdown.is_shutdown_initiated() {
        tracing::warn!("Server exited without a shutdown request");
    }
    tracing::info!("Telepath stopped");
    Ok(())
}

async fn write_pid_file(pid_file: &Path) -> Result<()> {
    tokio::fs::write(pid_file, format!("{}\n", std::process::id()))
        .await
        .wrap_err_with(|| format!("Failed to write pid file {}", pid_file.display()))?;
    tracing::debug!("Wrote pid file {}", pid_file.display());
    Ok(())
}

async fn validate_routes_command(routes_path: &Path) -> Result<()> {
    println!("🔍 Validating routing table: {}", routes_path.display());

    let config = match load_routing_table(routes_path).await {
        Ok(config) => {
            println!("✅ Routing table parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Routing table parsing failed:");
            eprintln!("   {e}");
            std::process::exit(1);
        }
    };

    let issues = RoutingTableValidator::validate(&config);
    if issues.is_empty() {
        println!("✅ Routing table validation: OK");
        println!();
        println!("📋 Routing Summary:");
        println!("   • Mode: {}", config.mode);
        if !config.header_name.is_empty() {
            println!("   • Header: {}", config.header_name);
        }
        println!("   • Routes: {}", config.routes.len());
        return Ok(());
    }

    eprintln!("❌ Routing table has {} problem(s):", issues.len());
    for issue in &issues {
        eprintln!("   • {issue}");
    }
    println!();
    println!("💡 Common fixes:");
    println!("   • Use \"header\" or \"path\" as the mode");
    println!("   • Set headerName when the mode is \"header\"");
    println!("   • Ensure all targets start with http:// or https:// and name a host");
    std::process::exit(1);
}
