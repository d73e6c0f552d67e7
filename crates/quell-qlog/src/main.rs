use std::io::{self, Write};

use clap::Parser;
use quell_logging::{LogConfig, QuellSubscriberBuilder};
use quell_qlog::{Cli, Command, QlogConfig, commands, output};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = QlogConfig::load(cli.config.as_deref())?;

    // Logs go to stderr; stdout carries the records
    let mut log_config = config.log.clone().unwrap_or_else(LogConfig::testing);
    if let Some(level) = &cli.log_level {
        log_config.default_level = level.clone();
    }
    let _guard = QuellSubscriberBuilder::new()
        .with_config(log_config)
        .with_stderr(true)
        .init()?;

    let mut out = io::BufWriter::new(io::stdout().lock());

    match cli.command {
        Command::Check => commands::check(&config, cli.dir.as_deref(), &mut out)?,
        Command::Segments => {
            let log = commands::open(&config, cli.dir.as_deref()).await?;
            let listed = commands::segments(&log, &mut out).await;
            log.close().await?;
            listed?;
        }
        Command::Search(args) => {
            let log = commands::open(&config, cli.dir.as_deref()).await?;
            let result = commands::search(&log, &args, &mut out).await;
            log.close().await?;
            out.flush()?;
            output::write_summary(&mut io::stderr(), &result?)?;
        }
    }

    out.flush()?;
    Ok(())
}
