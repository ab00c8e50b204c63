use pretty_assertions::assert_eq;
use rsgnuplot::options::{serialize, string_key};
use rsgnuplot::{options, OptionValue, Options, Terminal};

#[test]
fn scalar_values() {
    assert_eq!(serialize(Some("samples"), &500.into()), "samples 500");
    assert_eq!(serialize(Some("boxwidth"), &0.5.into()), "boxwidth 0.5");
    assert_eq!(serialize(Some("style_data"), &"lines".into()), "style data lines");
    assert_eq!(serialize(None, &"lines".into()), "lines");
}

#[test]
fn booleans() {
    assert_eq!(serialize(Some("grid"), &true.into()), "grid");
    assert_eq!(serialize(Some("grid"), &false.into()), "");
    assert_eq!(
        serialize(Some("key"), &options! { "box": true, opaque: false }.into()),
        "key box"
    );
}

#[test]
fn ranges() {
    assert_eq!(serialize(Some("xrange"), &(-5..=5).into()), "xrange [-5:5]");
    assert_eq!(serialize(Some("yrange"), &(0..10).into()), "yrange [0:10]");
    assert_eq!(
        serialize(Some("trange"), &OptionValue::range(0, "2*pi")),
        "trange [0:2*pi]"
    );
}

#[test]
fn sequences() {
    assert_eq!(serialize(Some("size"), &[300, 200].into()), "size 300,200");
    assert_eq!(
        serialize(Some("style"), &vec!["fill", "solid"].into()),
        "style fill solid"
    );
    assert_eq!(
        serialize(Some("term"), &("pngcairo", options! { size: [800, 600], enhanced: true }).into()),
        "term pngcairo size 800,600 enhanced"
    );
}

#[test]
fn quoted_values() {
    assert_eq!(serialize(Some("title"), &"Sin".into()), "title 'Sin'");
    assert_eq!(serialize(Some("output"), &"out.png".into()), "output 'out.png'");
    assert_eq!(serialize(Some("xlabel"), &"it's x".into()), "xlabel 'it''s x'");
    assert_eq!(
        serialize(Some("key"), &options! { title: "Legend", font: "Arial,10" }.into()),
        "key title 'Legend' font 'Arial,10'"
    );
}

#[test]
fn multi_word_keys() {
    assert_eq!(string_key("style_fill"), "style fill");
    assert_eq!(string_key("xtics"), "xtics");
}

#[test]
fn merge_keeps_positions() {
    let base = options! { title: "A", xrange: 0..=1 };
    let merged = base.merge(&options! { grid: true, title: "B" });

    assert_eq!(merged.keys().collect::<Vec<_>>(), vec!["title", "xrange", "grid"]);
    assert_eq!(merged.get("title"), Some(&OptionValue::from("B")));
    // receiver untouched
    assert_eq!(base.get("title"), Some(&OptionValue::from("A")));
}

#[test]
fn partition_and_without() {
    let opts = options! { title: "T", layout: [2, 1], xrange: 0..=1 };

    let (page, rest) = opts.partition(|key| key == "title" || key == "layout");
    assert_eq!(page.keys().collect::<Vec<_>>(), vec!["title", "layout"]);
    assert_eq!(rest.keys().collect::<Vec<_>>(), vec!["xrange"]);

    let stripped = opts.without(&["title"]);
    assert_eq!(stripped.keys().collect::<Vec<_>>(), vec!["layout", "xrange"]);
}

#[test]
fn macro_accepts_string_keys() {
    let opts = options! { "style_data": "lines", key: false, };
    assert_eq!(opts.len(), 2);
    assert_eq!(opts.get("key"), Some(&OptionValue::Bool(false)));
    assert!(options! {}.is_empty());
}

#[test]
fn terminal_commands_order() {
    let commands = Terminal::options_to_commands(&options! {
        title: "Plot",
        xrange: 0..=1,
        timefmt: "%s",
        multiplot: true,
        output: "a.png",
        term: "png",
        grid: false,
    });

    assert_eq!(
        commands,
        "set term png\n\
         set output 'a.png'\n\
         set multiplot\n\
         set timefmt %s\n\
         set xrange [0:1]\n\
         set title 'Plot'\n\
         unset grid\n"
    );
}

#[test]
fn empty_options_render_nothing() {
    assert_eq!(Terminal::options_to_commands(&Options::new()), "");
}

#[test]
fn unsigned_values_beyond_i64() {
    assert_eq!(OptionValue::from(7usize), OptionValue::Int(7));
    assert_eq!(OptionValue::from(i64::MAX as u64), OptionValue::Int(i64::MAX));
    assert_eq!(OptionValue::from(u64::MAX), OptionValue::Float(u64::MAX as f64));
}

#[test]
fn false_term_unsets_terminal() {
    assert_eq!(
        Terminal::options_to_commands(&options! { term: false, xrange: 0..=1 }),
        "unset term\nset xrange [0:1]\n"
    );
}
