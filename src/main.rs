use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{fs, io};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use wxplot::app::run_app;
use wxplot::chart::{render, ChartArtifact};
use wxplot::cli::Args;
use wxplot::{Client, Error};

fn main() -> Result<()> {
    // stderr keeps log lines off the chart screen
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(env)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let params = args.query().map_err(Error::from)?;
    let client = Client::new(args.client_config()).map_err(Error::from)?;
    let table = client.fetch(&params)?;
    if args.rows > 0 {
        print!("{}", table.preview(args.rows));
    }

    let artifact = render(&table, &args.chart_spec(&params)).map_err(Error::from)?;

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&artifact)?;
        fs::write(path, json).with_context(|| format!("writing chart to {}", path.display()))?;
        info!(path = %path.display(), "wrote chart");
    }

    if !args.no_display {
        display(&artifact)?;
    }

    Ok(())
}

fn display(artifact: &ChartArtifact) -> Result<()> {
    // setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, artifact);

    // restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res.context("terminal chart failed")
}
