use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rsgnuplot::{
    Dataset, Format, OptionValue, Options, Plot, PlotKind, Plottable, Settings, Terminal,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Plots math functions and data files with gnuplot", long_about = None)]
struct Args {
    #[clap(value_parser, value_name = "SOURCES")]
    /// Math functions (e.g. 'sin(x)/x') or existing data files to plot
    sources: Vec<String>,

    #[clap(short, long, value_parser, value_name = "CSV")]
    /// CSV file whose numeric columns are plotted as points (may be repeated)
    data: Vec<PathBuf>,

    #[clap(short, long, value_parser, value_name = "FORMAT")]
    /// Output format (png, pngcairo, jpeg, gif, svg, pdfcairo, epscairo, canvas, dumb)
    format: Option<Format>,

    #[clap(short, long, value_parser, value_name = "FILE")]
    /// The output filename; the format is guessed from its extension if not provided
    output: Option<PathBuf>,

    #[clap(long, value_parser, value_name = "W,H")]
    /// Size of the output image
    size: Option<String>,

    #[clap(short, long, value_parser)]
    /// Title of the plot
    title: Option<String>,

    #[clap(long, value_parser, value_name = "A:B")]
    /// Range of the x axis
    xrange: Option<String>,

    #[clap(long, value_parser, value_name = "A:B")]
    /// Range of the y axis
    yrange: Option<String>,

    #[clap(short, long, value_parser, value_name = "STYLE")]
    /// Drawing style of every dataset (lines, points, linespoints, ...)
    with: Option<String>,

    #[clap(long)]
    /// Draw a 3D plot (splot)
    splot: bool,

    #[clap(short, long)]
    /// Keep interactive plot windows open after exiting
    persist: bool,

    #[clap(long)]
    /// List the terminal types supported by gnuplot and exit
    list_terminals: bool,

    #[clap(long, value_parser, value_name = "PATH", env = "GNUPLOT_PATH")]
    /// The gnuplot executable
    gnuplot: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = argfile::expand_args_from(wild::args_os(), argfile::parse_fromfile, argfile::PREFIX)?;
    let args = Args::parse_from(args);

    let settings = match &args.gnuplot {
        Some(path) => Arc::new(Settings::new(path)),
        None => Settings::global(),
    };

    if args.list_terminals {
        let mut stdout = io::stdout().lock();
        for terminal in settings.available_terminals()? {
            writeln!(stdout, "{}", terminal)?;
        }
        return Ok(());
    }

    let mut datasets = args
        .sources
        .iter()
        .map(|source| Dataset::from(source.as_str()))
        .collect::<Vec<_>>();

    for path in &args.data {
        let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
        let columns = read_columns(BufReader::new(file))
            .with_context(|| format!("cannot read {}", path.display()))?;
        let title = path
            .file_stem()
            .map_or_else(|| path.to_string_lossy(), |stem| stem.to_string_lossy());

        datasets.push(Dataset::from_points(
            &columns,
            Options::new().with("title", title.into_owned()),
        )?);
    }

    if datasets.is_empty() {
        anyhow::bail!("nothing to plot, provide a math function, a data file or --data");
    }

    if let Some(style) = &args.with {
        datasets = datasets
            .iter()
            .map(|ds| ds.with_option("with", style.as_str()))
            .collect();
    }

    let mut options = Options::new();
    if let Some(title) = &args.title {
        options.insert("title", title.as_str());
    }
    if let Some(xrange) = &args.xrange {
        options.insert("xrange", parse_range(xrange)?);
    }
    if let Some(yrange) = &args.yrange {
        options.insert("yrange", parse_range(yrange)?);
    }

    let kind = if args.splot {
        PlotKind::Splot
    } else {
        PlotKind::Plot
    };
    let mut plot = Plot::with_settings(&settings, kind, datasets, options)?;

    let format = args.format.or_else(|| {
        args.output
            .as_deref()
            .and_then(Path::extension)
            .and_then(|ext| Format::from_extension(&ext.to_string_lossy()))
    });

    let mut terminal_options = Options::new();
    if let Some(size) = &args.size {
        terminal_options.insert("size", parse_size(size)?);
    }

    match (format, &args.output) {
        (Some(format), Some(output)) => plot.export_to(format, output, &terminal_options)?,
        (Some(format), None) => {
            let bytes = plot.export_bytes(format, &terminal_options)?;
            let mut stdout = io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
        (None, Some(output)) => {
            anyhow::bail!("cannot guess the format of {}, use --format", output.display())
        }
        (None, None) => {
            let mut terminal = Terminal::open(&settings, args.persist)?;
            if !terminal_options.is_empty() {
                tracing::warn!("--size only applies to exported images");
            }
            plot.plot_on(&mut terminal, &Options::new())?;
            terminal.close()?;
        }
    }

    Ok(())
}

/// Reads the numeric columns of a csv file, skipping rows that are not all numbers (headers).
fn read_columns<R: Read>(reader: R) -> anyhow::Result<Vec<Vec<f64>>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut columns: Vec<Vec<f64>> = Vec::new();

    for record in csv_reader.records() {
        let record = record?;

        let Ok(row) = record
            .iter()
            .map(str::parse::<f64>)
            .collect::<Result<Vec<_>, _>>()
        else {
            continue;
        };

        if columns.is_empty() {
            columns = vec![Vec::new(); row.len()];
        }

        if row.len() != columns.len() {
            anyhow::bail!(
                "row {:?} has {} columns, expected {}",
                record.position().map(|p| p.line()),
                row.len(),
                columns.len()
            );
        }

        for (column, value) in columns.iter_mut().zip(row) {
            column.push(value);
        }
    }

    Ok(columns)
}

fn parse_range(text: &str) -> anyhow::Result<OptionValue> {
    let (begin, end) = text
        .split_once(':')
        .with_context(|| format!("range '{}' must look like A:B", text))?;

    Ok(OptionValue::range(bound(begin), bound(end)))
}

// '*' lets gnuplot autoscale that end
fn bound(text: &str) -> OptionValue {
    let text = text.trim();
    match text.parse::<f64>() {
        Ok(value) => value.into(),
        Err(_) => text.into(),
    }
}

fn parse_size(text: &str) -> anyhow::Result<OptionValue> {
    let (width, height) = text
        .split_once(',')
        .with_context(|| format!("size '{}' must look like W,H", text))?;

    Ok(OptionValue::from([
        width.trim().parse::<u32>()?,
        height.trim().parse::<u32>()?,
    ]))
}
