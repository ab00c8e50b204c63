//! Drives the `gnuplot` executable over a pipe.
//!
//! ```no_run
//! use rsgnuplot::{options, Dataset, Plot, Plottable};
//!
//! let x: Vec<f64> = (0..100).map(|i| i as f64 / 10.0).collect();
//! let y: Vec<f64> = x.iter().map(|x| x.sin()).collect();
//!
//! let points = Dataset::from_points(&vec![x, y], options! { with: "lines", title: "sin" })?;
//! let mut plot = Plot::new([points, Dataset::from("cos(x)")], options! { xrange: 0..=10 })?;
//! plot.plot(&options! {})?;
//! # Ok::<(), rsgnuplot::Error>(())
//! ```

pub use animation::Animation;
pub use datablock::Datablock;
pub use dataset::{DataSource, Dataset};
pub use error::{Error, Result};
pub use fit::{fit, fit_points, FitParams, FitResult, FitShape};
pub use multiplot::Multiplot;
pub use options::{OptionValue, Options};
pub use plot::{Format, Plot, PlotKind, Plottable};
pub use points::ToPoints;
pub use settings::Settings;
pub use terminal::Terminal;

pub mod animation;
pub mod datablock;
pub mod dataset;
pub mod error;
pub mod fit;
pub mod multiplot;
pub mod options;
pub mod plot;
pub mod points;
pub mod settings;
pub mod terminal;
