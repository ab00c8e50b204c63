use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use itertools::Itertools;
use regex::{NoExpand, Regex};
use rustc_hash::FxHashMap;

use crate::datablock::quote_path;
use crate::dataset::{DataSource, Dataset};
use crate::error::{Error, Result};
use crate::options::{OptionValue, Options};
use crate::points::ToPoints;
use crate::settings::Settings;
use crate::terminal::Terminal;

const DEFAULT_FUNCTION: &str = "a2*x*x+a1*x+a0";
const FIT_DONE: &str = "Final set of parameters";

/// Function shapes with a fitting shortcut, see [`FitParams::shape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitShape {
    Exp,
    Log,
    Sin,
}

impl FitShape {
    fn function(self) -> &'static str {
        match self {
            Self::Exp => "exp",
            Self::Log => "log",
            Self::Sin => "sin",
        }
    }
}

/// What to fit and how.
///
/// Without a function, `a2*x*x+a1*x+a0` is fitted with all coefficients starting at 1.
#[derive(Debug, Clone)]
pub struct FitParams {
    function: Option<String>,
    initials: Options,
    via: Option<Vec<String>>,
    term_options: Options,
    options: Options,
    settings: Arc<Settings>,
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            function: None,
            initials: Options::new(),
            via: None,
            term_options: Options::new(),
            options: Options::new(),
            settings: Settings::global(),
        }
    }
}

impl FitParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fits `function` instead of the default quadratic.
    pub fn function<S: Into<String>>(mut self, function: S) -> Self {
        self.function = Some(function.into());
        self
    }

    /// Starting value of a coefficient.
    pub fn initial<K: Into<String>, V: Into<OptionValue>>(mut self, name: K, value: V) -> Self {
        self.initials.insert(name, value);
        self
    }

    pub fn initials(mut self, initials: &Options) -> Self {
        self.initials.merge_from(initials);
        self
    }

    /// Coefficients gnuplot may change; all coefficients with an initial value by default.
    pub fn via<I, S>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.via = Some(variables.into_iter().map(Into::into).collect());
        self
    }

    /// Settings applied to the terminal before fitting, such as `xrange`.
    pub fn term_options(mut self, options: Options) -> Self {
        self.term_options = options;
        self
    }

    /// Options of the `fit` command itself, such as `using`.
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn settings(mut self, settings: &Arc<Settings>) -> Self {
        self.settings = Arc::clone(settings);
        self
    }

    /// Polynomial `a0*x**0 + a1*x**1 + ... + an*x**n`; coefficients not given start at 1.
    pub fn poly(self, degree: usize) -> Self {
        let defaults: Options = (0..=degree).map(|i| (format!("a{}", i), 1)).collect();
        let function = (0..=degree).map(|i| format!("a{}*x**{}", i, i)).join(" + ");

        let initials = defaults.merge(&self.initials);
        Self { initials, ..self }.function(function)
    }

    /// `yscale * (yoffset + f ((x - xoffset) / xscale))` for the given `f`.
    ///
    /// Coefficients not given start at `yoffset 0.1, xoffset 0.1, yscale 1, xscale 1`.
    pub fn shape(self, shape: FitShape) -> Self {
        let defaults = Options::new()
            .with("yoffset", 0.1)
            .with("xoffset", 0.1)
            .with("yscale", 1)
            .with("xscale", 1);
        let function = format!(
            "yscale * (yoffset + {} ((x - xoffset) / xscale))",
            shape.function()
        );

        let initials = defaults.merge(&self.initials);
        Self { initials, ..self }.function(function)
    }

    fn resolved(&self) -> (String, Options, Vec<String>) {
        let (function, initials) = match &self.function {
            Some(function) => (function.clone(), self.initials.clone()),
            None => {
                let defaults = Options::new().with("a2", 1).with("a1", 1).with("a0", 1);
                (DEFAULT_FUNCTION.to_string(), defaults.merge(&self.initials))
            }
        };

        let via = match &self.via {
            Some(via) => via.clone(),
            None => initials.keys().map(str::to_string).collect(),
        };

        (function, initials, via)
    }
}

/// Coefficients gnuplot found, with their standard errors.
#[derive(Debug, Clone)]
pub struct FitResult {
    pub coefficients: FxHashMap<String, f64>,
    pub deltas: FxHashMap<String, f64>,
    /// The fitted function with coefficients filled in, titled `Fit formula`.
    pub formula: Dataset,
    /// The data that was fitted.
    pub data: Dataset,
}

/// Fits point data, kept in memory for the duration of the fit.
pub fn fit_points<P: ToPoints + ?Sized>(data: &P, params: &FitParams) -> Result<FitResult> {
    fit(&Dataset::from_points(data, Options::new())?, params)
}

/// Fits the data of `data` (a file or a datablock) with gnuplot's `fit`.
///
/// Runs in its own gnuplot process. Gives up with [`Error::FitTimeout`] when gnuplot
/// has not reported its final parameters within [`Settings::max_fit_delay`]; that
/// gnuplot is killed.
pub fn fit(data: &Dataset, params: &FitParams) -> Result<FitResult> {
    if let DataSource::Function(function) = data.source() {
        return Err(Error::Conversion(format!(
            "cannot fit a math function: {}",
            function
        )));
    }

    let (function, initials, via) = params.resolved();
    let settings = &params.settings;

    // gnuplot logs every fit to ./fit.log unless told otherwise
    let log = tempfile::Builder::new()
        .prefix("fit")
        .suffix(".log")
        .tempfile()?
        .into_temp_path();

    let mut terminal = Terminal::open(settings, false)?;
    terminal.writeln(&format!("set fit logfile {}", quote_path(&log)))?;
    terminal.apply(&params.term_options)?;
    for (name, value) in initials.iter() {
        terminal.writeln(&format!("{} = {}", name, value))?;
    }

    let clause = Dataset::new(data.source().clone(), params.options.clone())
        .render(Some(&mut terminal))?;
    terminal.write(&format!("fit {} {} via {}\n", function, clause, via.join(",")))?;

    let (coefficients, deltas, formula) =
        match wait_for_fit(&mut terminal, settings.max_fit_delay(), &function, &via) {
            Ok(parsed) => parsed,
            Err(e) => {
                // an unfinished fit keeps gnuplot from reading `exit`
                if let Err(kill) = terminal.kill() {
                    tracing::warn!("cannot stop abandoned fit: {}", kill);
                }
                return Err(e);
            }
        };

    // the rest of the report (correlation matrix) is not needed
    match terminal.close() {
        Ok(()) | Err(Error::Gnuplot { .. }) => {}
        Err(e) => return Err(e),
    }

    Ok(FitResult {
        coefficients,
        deltas,
        formula: Dataset::function(formula, Options::new().with("title", "Fit formula")),
        data: data.clone(),
    })
}

/// Collects gnuplot's report until it holds every parameter.
fn wait_for_fit(
    terminal: &mut Terminal,
    delay: Duration,
    function: &str,
    via: &[String],
) -> Result<(Coefficients, Coefficients, String)> {
    let start = Instant::now();
    let mut output = String::new();

    loop {
        for line in terminal.drain_output() {
            output.push_str(&line);
            output.push('\n');
        }

        if output.contains(FIT_DONE) {
            // parameter lines may still be on their way
            if let Ok(parsed) = parse_fit_output(function, via, &output) {
                return Ok(parsed);
            }
        }

        if start.elapsed() > delay {
            return Err(Error::FitTimeout { delay, output });
        }

        thread::sleep(Duration::from_millis(10));
    }
}

type Coefficients = FxHashMap<String, f64>;

/// Reads `<var> = <value> +/- <delta>` for every variable out of the fit report and
/// substitutes the values into `function`.
///
/// ```
/// use rsgnuplot::fit::parse_fit_output;
///
/// let report = "Final set of parameters            Asymptotic Standard Error\n\
///               =======================            ==========================\n\
///               a               = 2.01             +/- 0.05         (2.5%)\n\
///               b               = -0.5             +/- 0.01         (2%)\n";
///
/// let (coefficients, deltas, formula) = parse_fit_output("a*x+b", &["a", "b"], report).unwrap();
/// assert_eq!(coefficients["a"], 2.01);
/// assert_eq!(deltas["b"], 0.01);
/// assert_eq!(formula, "2.01*x+-0.5");
/// ```
pub fn parse_fit_output<S: AsRef<str>>(
    function: &str,
    variables: &[S],
    output: &str,
) -> Result<(Coefficients, Coefficients, String)> {
    let mut coefficients = FxHashMap::default();
    let mut deltas = FxHashMap::default();
    let mut formula = function.to_string();

    for var in variables {
        let var = var.as_ref();
        let escaped = regex::escape(var);

        let line = Regex::new(&format!(r"\b{} *= *(\S+) *\+/- *(\S+)", escaped))
            .map_err(|e| Error::Fit(e.to_string()))?;
        let captures = line
            .captures(output)
            .ok_or_else(|| Error::Fit(format!("no value for '{}' in fit output", var)))?;

        let value_text = &captures[1];
        let value = parse_number(value_text)?;
        let delta = parse_number(&captures[2])?;

        let word = Regex::new(&format!(r"\b{}\b", escaped)).map_err(|e| Error::Fit(e.to_string()))?;
        formula = word.replace_all(&formula, NoExpand(value_text)).into_owned();

        coefficients.insert(var.to_string(), value);
        deltas.insert(var.to_string(), delta);
    }

    Ok((coefficients, deltas, formula))
}

fn parse_number(text: &str) -> Result<f64> {
    text.parse::<f64>()
        .map_err(|_| Error::Fit(format!("'{}' is not a number", text)))
}
