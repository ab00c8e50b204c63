//! Tests against the installed gnuplot; each returns early when there is none.

mod common;

use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use rsgnuplot::{
    fit, options, Animation, DataSource, Dataset, Error, FitParams, FitShape, Format, Multiplot, Options,
    Plot, PlotKind, Plottable, Terminal,
};

fn line_points() -> Vec<Vec<f64>> {
    let x: Vec<f64> = (0..50).map(|i| i as f64 / 5.0).collect();
    // residuals must not vanish, gnuplot reports no errors for a perfect fit
    let y: Vec<f64> = x.iter().map(|x| 2.0 * x + 1.0 + 0.01 * (13.0 * x).sin()).collect();
    vec![x, y]
}

#[test]
fn version_and_terminals() {
    let Some(settings) = common::gnuplot() else { return };

    assert!(settings.version().unwrap() >= 5.0);
    assert!(settings.is_terminal_available("dumb").unwrap());
    assert!(!settings.is_terminal_available("no_such_terminal").unwrap());
}

#[test]
fn unknown_terminal_is_rejected() {
    let Some(settings) = common::gnuplot() else { return };

    let result = Plot::with_settings(
        &settings,
        PlotKind::Plot,
        ["sin(x)"],
        options! { term: "no_such_terminal" },
    );
    assert!(matches!(result, Err(Error::UnsupportedTerminal(name)) if name == "no_such_terminal"));
}

#[test]
fn export_dumb_text() {
    let Some(settings) = common::gnuplot() else { return };

    let mut plot = Plot::with_settings(
        &settings,
        PlotKind::Plot,
        [Dataset::from_points(&line_points(), options! { title: "Line", with: "lines" }).unwrap()],
        options! { xrange: 0..=10 },
    )
    .unwrap();

    let text = plot
        .export_bytes(Format::Dumb, &options! { size: [80, 25] })
        .unwrap();
    let text = String::from_utf8_lossy(&text);
    // the dumb terminal starts a page with a form feed and a newline
    let page = text.trim_start_matches('\x0c');
    let page = page.strip_prefix('\n').unwrap_or(page);

    assert!(text.contains("Line"));
    assert_eq!(page.lines().count(), 25);
}

#[test]
fn export_png_file() {
    let Some(settings) = common::gnuplot() else { return };
    if !settings.is_terminal_available("png").unwrap() {
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plot.png");

    let mut plot =
        Plot::with_settings(&settings, PlotKind::Plot, ["sin(x)"], options! {}).unwrap();
    plot.export_to(Format::Png, &path, &options! { size: [300, 200] })
        .unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[1..4], b"PNG");
}

#[test]
fn file_datablock_is_read_by_path() {
    let Some(settings) = common::gnuplot() else { return };

    let ds = Dataset::from_points(&line_points(), options! { file: true, title: "Stored" }).unwrap();
    let mut plot = Plot::with_settings(&settings, PlotKind::Plot, [ds], options! {}).unwrap();

    let text = plot.export_bytes(Format::Dumb, &Options::new()).unwrap();
    assert!(String::from_utf8_lossy(&text).contains("Stored"));
}

#[test]
fn splot_surface() {
    let Some(settings) = common::gnuplot() else { return };

    let mut plot = Plot::with_settings(
        &settings,
        PlotKind::Splot,
        ["x*y"],
        options! { isosamples: 10 },
    )
    .unwrap();

    assert!(!plot.export_bytes(Format::Dumb, &Options::new()).unwrap().is_empty());
}

#[test]
fn bad_function_is_reported() {
    let Some(settings) = common::gnuplot() else { return };

    let mut terminal = Terminal::open(&settings, false).unwrap();
    terminal
        .apply(&options! { term: "dumb", output: "/dev/null" })
        .unwrap();
    terminal.writeln("plot no_such_function(x)").unwrap();
    thread::sleep(Duration::from_millis(500));

    assert!(matches!(
        terminal.writeln("plot x"),
        Err(Error::Gnuplot { .. })
    ));
    // gnuplot may have quit on the error already
    let _ = terminal.close();
}

#[test]
fn multiplot_export() {
    let Some(settings) = common::gnuplot() else { return };

    let plot = |f: &str| Plot::with_settings(&settings, PlotKind::Plot, [f], options! {}).unwrap();
    let mut mp = Multiplot::with_settings(
        &settings,
        [plot("sin(x)"), plot("cos(x)")],
        options! { layout: [2, 1], title: "Two" },
    )
    .unwrap();

    let text = mp.export_bytes(Format::Dumb, &options! { size: [80, 40] }).unwrap();
    assert!(String::from_utf8_lossy(&text).lines().count() >= 30);
}

#[test]
fn animation_gif() {
    let Some(settings) = common::gnuplot() else { return };
    if !settings.is_terminal_available("gif").unwrap() {
        return;
    }

    let frames = (1..=3).map(|i| {
        Plot::with_settings(
            &settings,
            PlotKind::Plot,
            [format!("sin({}*x)", i)],
            options! {},
        )
        .unwrap()
    });
    let anim = Animation::with_settings(&settings, frames, options! { size: [200, 100] }).unwrap();

    let gif = anim.render(None, &Options::new()).unwrap().unwrap();
    assert_eq!(&gif[..4], b"GIF8");
}

#[test]
fn fit_line() {
    let Some(settings) = common::gnuplot() else { return };

    let data = Dataset::from_points(&line_points(), Options::new()).unwrap();
    let params = FitParams::new()
        .function("a*x+b")
        .initial("a", 1)
        .initial("b", 1)
        .settings(&settings);

    let result = fit(&data, &params).unwrap();

    assert!((result.coefficients["a"] - 2.0).abs() < 1e-2);
    assert!((result.coefficients["b"] - 1.0).abs() < 1e-2);
    assert!(result.deltas.contains_key("a"));
    assert_eq!(
        result.formula.option("title").and_then(|v| v.as_str()),
        Some("Fit formula")
    );
    assert!(matches!(
        result.formula.source(),
        DataSource::Function(formula) if !formula.contains('a') && !formula.contains('b')
    ));
}

#[test]
fn fit_poly_and_shape() {
    let Some(settings) = common::gnuplot() else { return };

    let data = Dataset::from_points(&line_points(), options! { file: true }).unwrap();

    let poly = fit(&data, &FitParams::new().poly(1).settings(&settings)).unwrap();
    assert!((poly.coefficients["a1"] - 2.0).abs() < 1e-2);
    assert!((poly.coefficients["a0"] - 1.0).abs() < 1e-2);

    let x: Vec<f64> = (1..60).map(|i| i as f64 / 10.0).collect();
    let y: Vec<f64> = x.iter().map(|x| 3.0 * (0.5 + (x / 2.0).exp()) + 0.01 * (7.0 * x).cos())
        .collect();
    let exp = Dataset::from_points(&vec![x, y], Options::new()).unwrap();

    let result = fit(
        &exp,
        &FitParams::new()
            .initials(&options! { xoffset: 0, yoffset: 1, yscale: 2, xscale: 1.5 })
            .via(["yoffset", "yscale", "xscale"])
            .shape(FitShape::Exp)
            .settings(&settings),
    )
    .unwrap();
    assert_eq!(result.coefficients.len(), 3);
    assert!(result.formula.render(None).unwrap().contains("xoffset"));
}
