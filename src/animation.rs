use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::multiplot::Multiplot;
use crate::options::{OptionValue, Options};
use crate::plot::Plot;
use crate::settings::Settings;
use crate::terminal::Terminal;

// options of the gif terminal itself, everything else is a plot setting
const GIF_KEYS: &[&str] = &[
    "animate",
    "size",
    "background",
    "transparent",
    "enhanced",
    "rounded",
    "butt",
    "linewidth",
    "dashlength",
    "tiny",
    "small",
    "medium",
    "large",
    "giant",
    "font",
    "fontscale",
    "crop",
];

/// A gif animation whose frames are plots.
///
/// Gif terminal options (`animate`, `size`, `background`...) go into `set term gif`,
/// the rest is set for every frame. Frames start with `animate delay 10 loop 0 optimize`.
#[derive(Debug, Clone)]
pub struct Animation {
    frames: Multiplot,
}

impl Animation {
    pub fn new<I: IntoIterator<Item = Plot>>(frames: I, options: Options) -> Result<Self> {
        Self::with_settings(&Settings::global(), frames, options)
    }

    pub fn with_settings<I: IntoIterator<Item = Plot>>(
        settings: &Arc<Settings>,
        frames: I,
        options: Options,
    ) -> Result<Self> {
        Ok(Self {
            frames: Multiplot::with_settings(settings, frames, options)?,
        })
    }

    pub fn frames(&self) -> &[Plot] {
        self.frames.plots()
    }

    pub fn options(&self) -> &Options {
        self.frames.options()
    }

    /// Options as sent to gnuplot, with the gif ones folded into `term`.
    ///
    /// ```
    /// use rsgnuplot::{options, Animation, Terminal};
    ///
    /// let anim = Animation::new([], options! { size: [300, 200], xrange: 0..=5 }).unwrap();
    /// let commands = Terminal::options_to_commands(&anim.mixed_options(&options! {}));
    /// assert_eq!(
    ///     commands,
    ///     "set term gif animate delay 10 loop 0 optimize size 300,200\nset xrange [0:5]\n"
    /// );
    /// ```
    pub fn mixed_options(&self, options: &Options) -> Options {
        let (gif, mut rest) = self
            .frames
            .options()
            .merge(options)
            .partition(|key| GIF_KEYS.contains(&key));

        let animate = Options::new()
            .with("delay", 10)
            .with("loop", 0)
            .with("optimize", true);
        let gif = Options::new().with("animate", animate).merge(&gif);

        rest.insert("term", OptionValue::Seq(vec!["gif".into(), gif.into()]));
        rest
    }

    /// Draws all frames into a gif at `path`, or into a temporary file whose bytes are returned.
    pub fn render(&self, path: Option<&Path>, options: &Options) -> Result<Option<Vec<u8>>> {
        if self.frames.plots().is_empty() {
            return Err(Error::EmptyPlot);
        }

        let mut options = self.mixed_options(options);

        let temp = match path {
            Some(path) => {
                options.insert("output", path.to_string_lossy().into_owned());
                None
            }
            None if options.contains_key("output") => None,
            None => {
                let temp = tempfile::Builder::new()
                    .prefix("anim")
                    .suffix(".gif")
                    .tempfile()?
                    .into_temp_path();
                options.insert("output", temp.to_string_lossy().into_owned());
                Some(temp)
            }
        };

        let mut terminal = Terminal::open(self.frames.settings(), false)?;
        terminal.apply(&options)?;
        for frame in self.frames.plots() {
            frame.render_to(&mut terminal, true, &Options::new())?;
        }
        terminal.unapply(options.keys())?;
        // gnuplot finishes the gif on exit
        terminal.close()?;

        match temp {
            Some(temp) => {
                let contents = std::fs::read(&temp)?;
                temp.close()?;
                Ok(Some(contents))
            }
            None => Ok(None),
        }
    }

    pub fn with_options(&self, options: &Options) -> Self {
        Self {
            frames: self.frames.with_options(options),
        }
    }

    pub fn update_frame(&self, position: usize, options: &Options) -> Result<Cow<'_, Animation>> {
        Ok(match self.frames.update_plot(position, options)? {
            Cow::Borrowed(_) => Cow::Borrowed(self),
            Cow::Owned(frames) => Cow::Owned(Self { frames }),
        })
    }

    pub fn update_frame_mut(&mut self, position: usize, options: &Options) -> Result<()> {
        self.frames.update_plot_mut(position, options)
    }

    pub fn replace_frame(&self, position: usize, frame: Plot) -> Result<Animation> {
        Ok(Self {
            frames: self.frames.replace_plot(position, frame)?,
        })
    }

    pub fn replace_frame_mut(&mut self, position: usize, frame: Plot) -> Result<()> {
        self.frames.replace_plot_mut(position, frame)
    }

    pub fn add_frame(&self, frame: Plot, position: Option<usize>) -> Result<Animation> {
        Ok(Self {
            frames: self.frames.add_plot(frame, position)?,
        })
    }

    pub fn add_frame_mut(&mut self, frame: Plot, position: Option<usize>) -> Result<()> {
        self.frames.add_plot_mut(frame, position)
    }

    pub fn remove_frame(&self, position: Option<usize>) -> Result<Animation> {
        Ok(Self {
            frames: self.frames.remove_plot(position)?,
        })
    }

    pub fn remove_frame_mut(&mut self, position: Option<usize>) -> Result<Plot> {
        self.frames.remove_plot_mut(position)
    }
}
