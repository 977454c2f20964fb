use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::Alignment,
    style::{Color, Style},
    symbols,
    text::Span,
    widgets::{Axis, Block, BorderType, Borders, Chart, Dataset, GraphType},
    Frame, Terminal,
};
use std::io;

use crate::chart::{self, ChartArtifact};

const PALETTE: [Color; 6] = [
    Color::Green,
    Color::Yellow,
    Color::Magenta,
    Color::LightBlue,
    Color::Red,
    Color::White,
];

/// Shows the chart until `q` or `Esc` is pressed.
pub fn run_app<B: Backend>(terminal: &mut Terminal<B>, artifact: &ChartArtifact) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, artifact))?;

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press
                && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
            {
                return Ok(());
            }
        }
    }
}

/// One dataset per contiguous segment so gaps stay visible. Only the first
/// segment of a series carries its name, which keeps the legend to one entry
/// per column.
fn datasets(artifact: &ChartArtifact) -> Vec<Dataset<'_>> {
    let mut datasets = vec![];
    for (i, series) in artifact.series.iter().enumerate() {
        let style = Style::default().fg(PALETTE[i % PALETTE.len()]);
        if series.is_empty() {
            datasets.push(Dataset::default().name(series.name.clone()).style(style));
            continue;
        }
        for (j, segment) in series.segments.iter().enumerate() {
            let mut dataset = Dataset::default()
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(style)
                .data(segment);
            if j == 0 {
                dataset = dataset.name(series.name.clone());
            }
            datasets.push(dataset);
        }
    }
    datasets
}

fn axis(axis: &chart::Axis) -> Axis<'_> {
    Axis::default()
        .title(Span::styled(axis.label.clone(), Style::default().fg(Color::Yellow)))
        .style(Style::default().fg(Color::Gray))
        .bounds(axis.bounds)
        .labels(
            axis.ticks
                .iter()
                .map(|t| Span::raw(t.clone()))
                .collect::<Vec<_>>(),
        )
}

fn ui(f: &mut Frame, artifact: &ChartArtifact) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {} ", artifact.title),
            Style::default().fg(Color::Yellow),
        ))
        .title_alignment(Alignment::Left)
        .border_style(Style::default().fg(Color::Cyan))
        .border_type(BorderType::Rounded);

    let chart = Chart::new(datasets(artifact))
        .block(block)
        .x_axis(axis(&artifact.x_axis))
        .y_axis(axis(&artifact.y_axis));

    f.render_widget(chart, f.area());
}
