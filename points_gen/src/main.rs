use clap::{Parser, ValueEnum};
use rand::Rng;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Shape {
    /// e^sin(x)
    ExpSin,
    /// x^2
    Square,
    /// sin(x)
    Sin,
}

impl Shape {
    fn eval(self, x: f64) -> f64 {
        match self {
            Self::ExpSin => x.sin().exp(),
            Self::Square => x * x,
            Self::Sin => x.sin(),
        }
    }
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(value_parser, value_name = "COUNT", default_value_t = 1000)]
    /// The number of points to generate
    count: usize,

    #[clap(short, long, value_parser, default_value_t = 0.0, allow_negative_numbers = true)]
    /// The first x value
    start: f64,

    #[clap(short, long, value_parser, default_value_t = 10.0, allow_negative_numbers = true)]
    /// The last x value
    end: f64,

    #[clap(short, long, value_enum, default_value_t = Shape::ExpSin)]
    /// The function the points are sampled from
    function: Shape,

    #[clap(long, value_parser, value_name = "AMPLITUDE", default_value_t = 0.0)]
    /// Add uniform noise in [-AMPLITUDE, AMPLITUDE] to every y value
    noise: f64,

    #[clap(value_parser, short, long, value_name = "FILE")]
    /// The output filename (or stdout if not provided)
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.noise < 0.0 || !args.noise.is_finite() {
        Err(anyhow::anyhow!("noise amplitude must be a non-negative number"))?
    }

    let writer = if let Some(output_file) = &args.output {
        let file = File::create(output_file)?;
        Box::new(BufWriter::new(file)) as Box<dyn Write>
    } else {
        Box::new(BufWriter::new(io::stdout())) as Box<dyn Write>
    };

    // gnuplot reads whitespace separated columns
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .from_writer(writer);

    let mut rng = rand::thread_rng();

    for (x, y) in sample(&args, &mut rng) {
        csv_writer.write_record(&[x.to_string(), y.to_string()])?;
    }

    // flush the writer before dropping it
    csv_writer.flush()?;

    Ok(())
}

fn sample<'a, R: Rng>(args: &'a Args, rng: &'a mut R) -> impl Iterator<Item = (f64, f64)> + 'a {
    let step = if args.count > 1 {
        (args.end - args.start) / (args.count - 1) as f64
    } else {
        0.0
    };

    (0..args.count).map(move |i| {
        let x = args.start + step * i as f64;
        let noise = if args.noise > 0.0 {
            rng.gen_range(-args.noise..=args.noise)
        } else {
            0.0
        };
        (x, args.function.eval(x) + noise)
    })
}
