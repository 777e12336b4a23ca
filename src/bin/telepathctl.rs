use std::path::PathBuf;

use clap::Parser;
use color_eyre::Result;
use telepath::{
    admin::{RoutesFile, send_reload_signal},
    config::DEFAULT_ROUTES_PATH,
};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Edit a telepath routing table and ask the server to reload it")]
struct Args {
    #[clap(subcommand)]
    command: Commands,

    /// Routing table file to operate on
    #[clap(short, long, global = true, default_value = DEFAULT_ROUTES_PATH)]
    routes: PathBuf,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Inspect or change routes
    Route {
        #[clap(subcommand)]
        command: RouteCommands,
    },
    /// Send SIGHUP to the running server
    Refresh {
        #[clap(flatten)]
        signal: SignalArgs,
    },
}

#[derive(Parser, Debug)]
enum RouteCommands {
    /// Print every route, sorted by key
    List,
    /// Insert or replace a route
    Add {
        key: String,
        target: String,
        #[clap(flatten)]
        signal: SignalArgs,
    },
    /// Delete a route
    Remove {
        key: String,
        #[clap(flatten)]
        signal: SignalArgs,
    },
}

#[derive(clap::Args, Debug)]
struct SignalArgs {
    /// PID file written by the server; without it every process named `telepath` is signalled
    #[clap(long)]
    pid_file: Option<PathBuf>,

    /// Only edit the file, do not signal the server
    #[clap(long)]
    no_refresh: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let file = RoutesFile::new(args.routes);

    match args.command {
        Commands::Route {
            command: RouteCommands::List,
        } => {
            let routes = file.list().await?;
            if routes.is_empty() {
                println!("No routes in {}", file.path().display());
            }
            for (key, target) in routes {
                println!("{key} -> {target}");
            }
        }
        Commands::Route {
            command: RouteCommands::Add {
                key,
                target,
                signal,
            },
        } => {
            if let Some(e) = file.add(&key, &target).await? {
                eprintln!("⚠️  Target '{target}' cannot be forwarded to ({e}); requests for '{key}' will fail with 500");
            }
            println!("Added route: {key} -> {target}");
            refresh_after_edit(&signal).await;
        }
        Commands::Route {
            command: RouteCommands::Remove { key, signal },
        } => {
            if file.remove(&key).await? {
                println!("Removed route: {key}");
                refresh_after_edit(&signal).await;
            } else {
                println!("No route named '{key}', nothing to do");
            }
        }
        Commands::Refresh { signal } => {
            send_reload_signal(signal.pid_file.as_deref()).await?;
            println!("Sent SIGHUP to telepath server");
        }
    }

    Ok(())
}

/// The edit already succeeded, so a failed signal is only reported.
async fn refresh_after_edit(signal: &SignalArgs) {
    if signal.no_refresh {
        return;
    }
    match send_reload_signal(signal.pid_file.as_deref()).await {
        Ok(()) => println!("Sent SIGHUP to telepath server"),
        Err(e) => eprintln!("⚠️  Routing table updated but the server was not signalled: {e}"),
    }
}
