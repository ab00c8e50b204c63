use std::borrow::Cow;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::options::{OptionValue, Options};
use crate::plot::{check_position, draw, output_path, Plot, Plottable};
use crate::settings::Settings;
use crate::terminal::{validate_term, Terminal};

const SPECIFIC_KEYS: &[&str] = &["title", "layout"];

/// Several plots drawn on one page, laid out in a grid.
///
/// `title` and `layout` describe the page itself and end up in
/// `set multiplot layout r,c title '...'`; every other option is set for all
/// member plots. The layout defaults to 2x2.
#[derive(Debug)]
pub struct Multiplot {
    plots: Vec<Plot>,
    options: Options,
    settings: Arc<Settings>,
    terminal: Option<Terminal>,
}

impl Clone for Multiplot {
    fn clone(&self) -> Self {
        self.derive(self.plots.clone(), self.options.clone())
    }
}

impl Multiplot {
    pub fn new<I: IntoIterator<Item = Plot>>(plots: I, options: Options) -> Result<Self> {
        Self::with_settings(&Settings::global(), plots, options)
    }

    pub fn with_settings<I: IntoIterator<Item = Plot>>(
        settings: &Arc<Settings>,
        plots: I,
        options: Options,
    ) -> Result<Self> {
        if let Some(term) = options.get("term") {
            validate_term(settings, term)?;
        }

        Ok(Self {
            plots: plots.into_iter().collect(),
            options,
            settings: Arc::clone(settings),
            terminal: None,
        })
    }

    fn derive(&self, plots: Vec<Plot>, options: Options) -> Self {
        Self {
            plots,
            options,
            settings: Arc::clone(&self.settings),
            terminal: None,
        }
    }

    pub fn plots(&self) -> &[Plot] {
        &self.plots
    }

    pub fn plot_at(&self, position: usize) -> Option<&Plot> {
        self.plots.get(position)
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// Options as sent to gnuplot: the pass-through ones plus a `multiplot` map.
    ///
    /// ```
    /// use rsgnuplot::{options, Multiplot, Terminal};
    ///
    /// let mp = Multiplot::new([], options! { layout: [2, 1], xrange: 0..=5 }).unwrap();
    /// let commands = Terminal::options_to_commands(&mp.mixed_options(&options! { title: "Page" }));
    /// assert_eq!(commands, "set multiplot layout 2,1 title 'Page'\nset xrange [0:5]\n");
    /// ```
    pub fn mixed_options(&self, options: &Options) -> Options {
        let (specific, mut rest) = self
            .options
            .merge(options)
            .partition(|key| SPECIFIC_KEYS.contains(&key));

        let multiplot = Options::new().with("layout", [2, 2]).merge(&specific);
        rest.insert("multiplot", multiplot);
        rest
    }

    /// Draws every member plot on `terminal` inside one `set multiplot` / `unset multiplot`.
    pub fn render_to(&self, terminal: &mut Terminal, options: &Options) -> Result<()> {
        if self.plots.is_empty() {
            return Err(Error::EmptyPlot);
        }

        let options = self.mixed_options(options);

        terminal.apply(&options)?;
        for plot in &self.plots {
            plot.render_to(terminal, true, &Options::new())?;
        }
        terminal.unapply(options.keys())?;

        Ok(())
    }

    pub fn with_options(&self, options: &Options) -> Self {
        self.derive(self.plots.clone(), self.options.merge(options))
    }

    pub fn with_option<K: Into<String>, V: Into<OptionValue>>(&self, key: K, value: V) -> Self {
        self.with_options(&Options::new().with(key, value))
    }

    /// Merges `options` into the plot at `position`; borrows `self` back when there is nothing to merge.
    pub fn update_plot(&self, position: usize, options: &Options) -> Result<Cow<'_, Multiplot>> {
        check_position(position, self.plots.len())?;

        if options.is_empty() {
            return Ok(Cow::Borrowed(self));
        }

        let plot = self.plots[position].with_options(options);
        Ok(Cow::Owned(self.replace_plot(position, plot)?))
    }

    /// Replaces the plot at `position` with whatever `edit` makes of it.
    ///
    /// ```
    /// use rsgnuplot::{options, Multiplot, Plot};
    ///
    /// let plots = [Plot::new(["sin(x)"], options! {}).unwrap()];
    /// let mp = Multiplot::new(plots, options! { layout: [1, 1] }).unwrap();
    ///
    /// let mp = mp
    ///     .update_plot_with(0, |plot| Ok(plot.add_dataset("cos(x)")))
    ///     .unwrap();
    /// assert_eq!(mp.plots()[0].datasets().len(), 2);
    /// ```
    pub fn update_plot_with<F>(&self, position: usize, edit: F) -> Result<Multiplot>
    where
        F: FnOnce(&Plot) -> Result<Plot>,
    {
        check_position(position, self.plots.len())?;
        let plot = edit(&self.plots[position])?;
        self.replace_plot(position, plot)
    }

    pub fn update_plot_mut(&mut self, position: usize, options: &Options) -> Result<()> {
        check_position(position, self.plots.len())?;
        self.plots[position].options_mut().merge_from(options);
        Ok(())
    }

    pub fn replace_plot(&self, position: usize, plot: Plot) -> Result<Multiplot> {
        let mut multiplot = self.clone();
        multiplot.replace_plot_mut(position, plot)?;
        Ok(multiplot)
    }

    pub fn replace_plot_mut(&mut self, position: usize, plot: Plot) -> Result<()> {
        check_position(position, self.plots.len())?;
        self.plots[position] = plot;
        Ok(())
    }

    /// Inserts `plot` before `position`, or appends it.
    pub fn add_plot(&self, plot: Plot, position: Option<usize>) -> Result<Multiplot> {
        let mut multiplot = self.clone();
        multiplot.add_plot_mut(plot, position)?;
        Ok(multiplot)
    }

    pub fn add_plot_mut(&mut self, plot: Plot, position: Option<usize>) -> Result<()> {
        let position = position.unwrap_or(self.plots.len());
        check_position(position, self.plots.len() + 1)?;
        self.plots.insert(position, plot);
        Ok(())
    }

    /// Removes the plot at `position`, or the last one.
    pub fn remove_plot(&self, position: Option<usize>) -> Result<Multiplot> {
        let mut multiplot = self.clone();
        multiplot.remove_plot_mut(position)?;
        Ok(multiplot)
    }

    pub fn remove_plot_mut(&mut self, position: Option<usize>) -> Result<Plot> {
        let len = self.plots.len();
        let position = match position {
            Some(position) => position,
            None => len.checked_sub(1).ok_or(Error::IndexOutOfRange { index: 0, len })?,
        };

        check_position(position, len)?;
        Ok(self.plots.remove(position))
    }
}

impl Plottable for Multiplot {
    fn plot(&mut self, options: &Options) -> Result<()> {
        let output = output_path(&self.options.merge(options));

        let mut own = self.terminal.take();
        let result = draw(&self.settings, &mut own, output.as_deref(), |terminal| {
            self.render_to(terminal, options)
        });
        self.terminal = own;

        result
    }
}
