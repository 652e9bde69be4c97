use anyhow::Result;
use clap::{CommandFactory, Parser};
use colored::Colorize;
use ferry::cli::Cli;
use ferry::scanner::{self, SendItem};
use ferry::session::{self, SessionConfig};
use ferry::transport::{Connection, Listener};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut items = Vec::new();
    for arg in &cli.paths {
        match scanner::expand(arg) {
            Ok(found) => items.extend(found),
            Err(err) => {
                debug!(%err, path = %arg.display(), "skipping argument");
                println!("{}", format!("✘ Unable to open {}", arg.display()).red());
            }
        }
    }

    let config = SessionConfig::new(&cli.dir);

    if let Some(host) = &cli.connect {
        let address = format!("{host}:{}", cli.port);
        println!("{}", format!("☛ Connecting to {address}").cyan());
        match Connection::dial(address.as_str()).await {
            Ok(conn) => {
                println!("{}", "⇄ Connected".cyan());
                run_and_disconnect(conn, &items, &config).await;
            }
            Err(err) => {
                debug!(%err, "dial failed");
                println!("{}", format!("✘ Unable to connect to {address}").red());
            }
        }
    } else if cli.listen {
        let address = format!("0.0.0.0:{}", cli.port);
        println!("{}", "☛ Listening...".cyan());
        match listen_one(&address).await {
            Ok(conn) => {
                println!("{}", "⇄ Connected".cyan());
                run_and_disconnect(conn, &items, &config).await;
            }
            Err(err) => {
                debug!(%err, "listen failed");
                println!("{}", format!("✘ Unable to listen on {address}").red());
            }
        }
    } else {
        Cli::command().print_help()?;
    }
    Ok(())
}

async fn listen_one(address: &str) -> std::io::Result<Connection> {
    Listener::bind(address).await?.accept().await
}

async fn run_and_disconnect(mut conn: Connection, items: &[SendItem], config: &SessionConfig) {
    match session::run(&mut conn, items, config).await {
        Ok(()) => println!("{}", "⇵ Transfer done".cyan()),
        // The failing item already printed its ✘ line.
        Err(err) => debug!(%err, "session aborted"),
    }
    match conn.disconnect().await {
        Ok(()) => println!("{}", "↮ Disconnected".cyan()),
        Err(_) => println!("{}", "✘ Disconnection failure".red()),
    }
}
