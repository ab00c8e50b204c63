mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use common::Recorder;
use pretty_assertions::assert_eq;
use rsgnuplot::{
    fit, options, Dataset, Error, FitParams, Multiplot, Options, Plot, PlotKind, Plottable,
    Settings, Terminal,
};

// time for the stand-in to answer on stderr
const SETTLE: Duration = Duration::from_millis(300);

#[test]
fn errors_surface_on_next_write() {
    let rec = Recorder::complaining();
    let mut terminal = Terminal::open(&rec.settings, false).unwrap();

    terminal.writeln("bad idea").unwrap();
    thread::sleep(SETTLE);

    match terminal.writeln("set xrange [0:1]") {
        Err(Error::Gnuplot { command, details }) => {
            assert_eq!(command, "bad command: bad idea");
            assert_eq!(details, "");
        }
        other => panic!("expected a gnuplot error, got {:?}", other),
    }

    // the queue was cleared, the terminal is still usable
    terminal.writeln("set xrange [0:1]").unwrap();
    terminal.close().unwrap();

    assert_eq!(rec.log(), "bad idea\nset xrange [0:1]\n\nexit\n");
}

#[test]
fn several_error_lines_are_joined() {
    let rec = Recorder::complaining();
    let mut terminal = Terminal::open(&rec.settings, false).unwrap();

    terminal.write("bad one\nbad two\nbad three\n").unwrap();
    thread::sleep(SETTLE);

    match terminal.check_errors() {
        Err(Error::Gnuplot { command, details }) => {
            assert_eq!(command, "bad command: bad one");
            assert_eq!(details, "bad command: bad two; bad command: bad three");
        }
        other => panic!("expected a gnuplot error, got {:?}", other),
    }
    assert!(terminal.check_errors().is_ok());
}

#[test]
fn pending_errors_are_reported_on_close() {
    let rec = Recorder::complaining();
    let mut terminal = Terminal::open(&rec.settings, false).unwrap();

    terminal.writeln("bad ending").unwrap();

    assert!(matches!(terminal.close(), Err(Error::Gnuplot { .. })));
    assert!(terminal.is_closed());
    assert!(matches!(
        terminal.writeln("plot x"),
        Err(Error::TerminalClosed)
    ));
}

#[test]
fn datablocks_are_stored_once_per_terminal() {
    let rec = Recorder::new();
    let db = rsgnuplot::Datablock::new(&vec![vec![0, 1], vec![5, 6]], false).unwrap();

    let mut terminal = Terminal::open(&rec.settings, false).unwrap();
    assert_eq!(db.name(Some(&mut terminal)).unwrap(), "$DATA1");
    assert_eq!(db.name(Some(&mut terminal)).unwrap(), "$DATA1");

    let other = rsgnuplot::Datablock::new(&vec![7], false).unwrap();
    assert_eq!(other.name(Some(&mut terminal)).unwrap(), "$DATA2");
    assert_eq!(terminal.stored_datablocks(), 2);
    terminal.close().unwrap();

    assert_eq!(
        rec.log(),
        "$DATA1 << EOD\n0 5\n1 6\nEOD\n$DATA2 << EOD\n7\nEOD\n\nexit\n"
    );
}

#[test]
fn apply_and_unapply() {
    let rec = Recorder::new();
    let mut terminal = Terminal::open(&rec.settings, false).unwrap();

    terminal
        .apply(&options! { style_data: "lines", key: false })
        .unwrap()
        .unapply(["style_data", "xrange"])
        .unwrap();
    terminal.close().unwrap();

    assert_eq!(
        rec.log(),
        "set style data lines\nunset key\nunset xrange\nunset style data\n\nexit\n"
    );
}

#[test]
fn replot_and_test_page() {
    let rec = Recorder::new();
    let mut terminal = Terminal::open(&rec.settings, false).unwrap();

    terminal.replot(&options! { title: "Again" }).unwrap();
    terminal.test_page(None).unwrap();
    terminal.close().unwrap();

    assert_eq!(
        rec.log(),
        "set title 'Again'\nreplot\nunset title\ntest\n\nexit\n"
    );
}

#[test]
fn multiplot_transcript() {
    let rec = Recorder::new();
    let top = Plot::with_settings(
        &rec.settings,
        PlotKind::Plot,
        ["sin(x)"],
        options! { title: "A", output: "ignored.png" },
    )
    .unwrap();
    let bottom = Plot::with_settings(&rec.settings, PlotKind::Plot, ["cos(x)"], options! {}).unwrap();

    let mut mp = Multiplot::with_settings(&rec.settings, [top, bottom], options! { layout: [2, 1] })
        .unwrap();
    mp.plot(&options! { title: "Page" }).unwrap();
    drop(mp);

    assert_eq!(
        rec.log(),
        "set multiplot layout 2,1 title 'Page'\n\
         set title 'A'\n\
         plot sin(x)\n\
         unset title\n\
         plot cos(x)\n\
         unset multiplot\n\
         \nexit\n"
    );
}

#[test]
fn multiplot_edits() {
    let rec = Recorder::new();
    let plot = |f: &str| Plot::with_settings(&rec.settings, PlotKind::Plot, [f], options! {}).unwrap();

    let mp = Multiplot::with_settings(&rec.settings, [plot("a"), plot("b")], options! {}).unwrap();

    let added = mp.add_plot(plot("c"), Some(0)).unwrap();
    let removed = mp.remove_plot(None).unwrap();
    let retitled = mp.update_plot(1, &options! { title: "B" }).unwrap();

    assert_eq!(mp.plots().len(), 2);
    assert_eq!(added.plots().len(), 3);
    assert_eq!(added.plots()[0].datasets()[0].render(None).unwrap(), "c");
    assert_eq!(removed.plots().len(), 1);
    assert!(retitled.plots()[1].option("title").is_some());
    assert!(mp.plots()[1].option("title").is_none());
    assert!(matches!(
        mp.update_plot(0, &options! {}).unwrap(),
        std::borrow::Cow::Borrowed(_)
    ));
    assert!(matches!(
        mp.replace_plot(2, plot("d")),
        Err(Error::IndexOutOfRange { .. })
    ));
}

#[test]
fn missing_executable() {
    let settings = Arc::new(Settings::new("/nonexistent/gnuplot"));

    assert!(matches!(
        Terminal::open(&settings, false),
        Err(Error::Io(_))
    ));
    assert!(settings.version().is_err());
}

#[test]
fn stalled_gnuplot_is_killed_on_close() {
    let settings = common::stalled(Duration::from_millis(200));
    let mut terminal = Terminal::open(&settings, false).unwrap();
    terminal.writeln("plot x").unwrap();

    let start = Instant::now();
    assert!(matches!(
        terminal.close(),
        Err(Error::ExitTimeout { .. })
    ));
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(terminal.is_closed());
}

#[test]
fn stalled_output_times_out() {
    let settings = common::stalled(Duration::from_millis(200));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("never.png");

    let mut plot = Plot::with_settings(&settings, PlotKind::Plot, ["sin(x)"], options! {}).unwrap();

    let start = Instant::now();
    let result = plot.plot(&options! { output: path.to_string_lossy().into_owned() });

    assert!(matches!(result, Err(Error::OutputTimeout { path: p, .. }) if p == path));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn stalled_fit_is_abandoned() {
    let settings = common::stalled(Duration::from_millis(200));
    let data = Dataset::from_points(&vec![vec![1, 2, 3], vec![2, 4, 6]], Options::new()).unwrap();

    let start = Instant::now();
    let result = fit(&data, &FitParams::new().settings(&settings));

    assert!(matches!(result, Err(Error::FitTimeout { .. })));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn false_term_is_unset() {
    let rec = Recorder::new();
    let mut terminal = Terminal::open(&rec.settings, false).unwrap();

    terminal.apply(&options! { term: false }).unwrap();
    assert!(Plot::with_settings(&rec.settings, PlotKind::Plot, ["x"], options! { term: false }).is_ok());
    terminal.close().unwrap();

    assert_eq!(rec.log(), "unset term\n\nexit\n");
}

#[test]
fn file_datablock_name_streams_nothing() {
    let rec = Recorder::new();
    let db = rsgnuplot::Datablock::new(&vec![vec![0, 1], vec![5, 6]], true).unwrap();

    let mut terminal = Terminal::open(&rec.settings, false).unwrap();
    let first = db.name(Some(&mut terminal)).unwrap();
    let second = db.name(Some(&mut terminal)).unwrap();
    terminal.close().unwrap();

    assert_eq!(first, second);
    assert_eq!(terminal.stored_datablocks(), 0);
    assert_eq!(rec.log(), "\nexit\n");
}
