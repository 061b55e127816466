//! newsreport - Activity reports for the news website database.

use newsreport::cli::Cli;
use newsreport::config::{Config, ConnectionConfig};
use newsreport::db::{PostgresConnector, QueryRunner};
use newsreport::error::Result;
use newsreport::logging;
use newsreport::report::ReportGenerator;
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // A missing .env is fine; PG* variables may come from the real environment
    dotenvy::dotenv().ok();
    logging::init_stderr_logging();

    if let Err(e) = run().await {
        logging::report_failure(&e, &mut std::io::stderr());
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let connection = resolve_connection(&cli, &config)?;
    info!("Connection: {}", connection.display_string());

    let output_dir = cli
        .output_dir
        .clone()
        .unwrap_or_else(|| config.report.output_dir());

    let connector = PostgresConnector::new(connection, config.report.clone());
    let runner = QueryRunner::new(connector).with_timeout(config.report.query_timeout());
    let generator = ReportGenerator::new(runner, output_dir);

    println!("\n\nReport is being created...");
    let path = generator.generate().await?;
    println!("Report was created and stored in file {}\n\n", path.display());

    Ok(())
}

/// Resolves the final connection configuration.
///
/// Precedence, highest first: CLI arguments, config file, PG* environment
/// variables, then the built-in `news` database default.
fn resolve_connection(cli: &Cli, config: &Config) -> Result<ConnectionConfig> {
    let mut connection = config.connection.clone();

    if let Some(cli_connection) = cli.to_connection_config()? {
        connection.merge(&cli_connection);
    }

    connection.apply_env_defaults();

    Ok(connection)
}
