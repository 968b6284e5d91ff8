use std::{borrow::Cow, net::SocketAddr};

use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::server;

mod migrate;

#[derive(Parser)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    /// DSN to tell Sentry where to send events.
    ///
    /// If provided, errors will be sent to Sentry.
    #[clap(long = "sentry-dsn", env = "SENTRY_DSN")]
    sentry_dsn: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations and exit.
    Migrate(MigrateOpts),
    /// Run the API server.
    Serve(ServeOpts),
}

#[derive(Args)]
struct MigrateOpts {
    /// Connection string for the database.
    #[clap(long = "database-url", env = "DATABASE_URL")]
    database_url: String,
}

impl From<MigrateOpts> for migrate::MigrationOpts {
    fn from(opts: MigrateOpts) -> Self {
        Self {
            database_url: opts.database_url,
        }
    }
}

#[derive(Args)]
struct ServeOpts {
    /// The number of connections to use for the database pool.
    #[clap(long = "database-pool-size", default_value = "16")]
    database_pool_size: u32,

    /// The number of seconds before a database connection times out.
    #[clap(long = "database-timeout", default_value = "5")]
    database_timeout: u8,

    /// Connection string for the application database.
    ///
    /// Required unless `--in-memory` is given.
    #[clap(
        long = "database-url",
        env = "DATABASE_URL",
        required_unless_present = "in-memory"
    )]
    database_url: Option<String>,

    /// Keep all records in process memory instead of Postgres.
    #[clap(long = "in-memory")]
    in_memory: bool,

    /// Address the HTTP server listens on.
    #[clap(
        long = "listen-address",
        default_value = "0.0.0.0:8000",
        env = "LISTEN_ADDRESS"
    )]
    listen_address: SocketAddr,

    /// Shared secret used to verify HS256 bearer tokens.
    #[clap(long = "jwt-secret", env = "JWT_SECRET")]
    jwt_secret: String,

    /// Audience that bearer tokens must be issued for.
    #[clap(long = "jwt-audience", env = "JWT_AUDIENCE")]
    jwt_audience: Option<String>,

    /// Issuer that bearer tokens must come from.
    #[clap(long = "jwt-issuer", env = "JWT_ISSUER")]
    jwt_issuer: Option<String>,
}

impl From<ServeOpts> for server::Options {
    fn from(opts: ServeOpts) -> Self {
        Self {
            database_pool_size: opts.database_pool_size,
            database_timeout_seconds: opts.database_timeout,
            database_url: opts.database_url,
            in_memory: opts.in_memory,
            listen_address: opts.listen_address,
            jwt_secret: opts.jwt_secret,
            jwt_audience: opts.jwt_audience,
            jwt_issuer: opts.jwt_issuer,
        }
    }
}

pub async fn run_with_sys_args() -> anyhow::Result<()> {
    use tracing_subscriber::prelude::*;

    let cli = Cli::parse();

    let sentry_config = cli.sentry_dsn.map(|dsn| {
        debug!("Enabled sentry.");

        let release_name = option_env!("GIT_SHA")
            .map(Cow::from)
            .or_else(|| sentry::release_name!());

        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: release_name,
                ..Default::default()
            },
        ))
    });

    let sentry_tracing_layer = if sentry_config.is_some() {
        Some(sentry_tracing::layer())
    } else {
        None
    };

    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(sentry_tracing_layer)
        .init();

    match cli.command {
        Commands::Migrate(opts) => migrate::run_migrations(opts.into()).await,
        Commands::Serve(opts) => {
            if let (false, Some(database_url)) = (opts.in_memory, opts.database_url.clone()) {
                migrate::run_migrations(MigrateOpts { database_url }.into()).await?;
            }

            server::serve(opts.into()).await
        }
    }
}

#[cfg(test)]
mod test {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn in_memory_serve_needs_no_database() {
        let cli = Cli::try_parse_from([
            "bookkeeping-api",
            "serve",
            "--in-memory",
            "--jwt-secret",
            "secret",
        ])
        .unwrap();

        match cli.command {
            Commands::Serve(opts) => {
                let options = server::Options::from(opts);

                assert!(options.in_memory);
                assert_eq!(8000, options.listen_address.port());
            }
            Commands::Migrate(_) => panic!("expected serve command"),
        }
    }
}
