//! Command-line interface.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use formlog::{Config, HttpConfig};
use formlog_store::StoreConfig;

#[derive(Parser, Debug)]
#[command(name = "formlog", version, about = "Validated append-only record store")]
pub struct Cli {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP API.
    Serve(ServeArgs),
    /// Answer JSON-lines requests on stdin, one response per line on stdout.
    Worker,
    /// Print the log's metadata and exit.
    Info,
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Directory holding the record log and the writer lease.
    #[arg(long, env = "FORMLOG_DATA_DIR", default_value = "./storage/formlog")]
    pub data_dir: PathBuf,

    /// Consecutive log failures before the store stops serving.
    #[arg(long, env = "FORMLOG_MAX_FAILURES", default_value_t = 3)]
    pub max_consecutive_failures: u32,

    /// Skip the writer lease. Only safe when nothing else opens the data dir.
    #[arg(long, env = "FORMLOG_NO_LEASE")]
    pub no_lease: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Socket address to bind.
    #[arg(long, env = "FORMLOG_LISTEN", default_value = "127.0.0.1:3000")]
    pub listen: SocketAddr,

    /// Do not send CORS headers.
    #[arg(long, env = "FORMLOG_NO_CORS")]
    pub no_cors: bool,
}

impl Cli {
    /// Build the process configuration from the parsed arguments.
    pub fn config(&self) -> Config {
        let store = StoreConfig::default()
            .data_dir(&self.store.data_dir)
            .max_consecutive_failures(self.store.max_consecutive_failures)
            .acquire_writer_lease(!self.store.no_lease);

        let http = match &self.command {
            Command::Serve(args) => HttpConfig {
                listen_addr: args.listen,
                permissive_cors: !args.no_cors,
            },
            Command::Worker | Command::Info => HttpConfig::default(),
        };

        Config { store, http }
    }
}
