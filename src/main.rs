//! Kohonen CLI - Self-Organizing Map trainer
//!
//! Command-line interface for training, inspecting and generating data for SOMs.

use clap::{Parser, Subcommand};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use kohonen::som::grid::grid_dims;
use kohonen::umatrix::write_svg;
use kohonen::{
    Algorithm, CodebookConfig, DataSet, Decay, GridConfig, InitMethod, Map, MapConfig, Metric,
    ModelFormat, Neighborhood, Result, SomError, TrainConfig, UnitShape,
};
use log::{error, info};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "kohonen")]
#[command(version)]
#[command(about = "Self-Organizing Map trainer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a new map on a data set
    Train {
        /// Input data set (.csv or .lrn)
        #[arg(short, long)]
        input: PathBuf,

        /// Class file for the input data set (.cls)
        #[arg(long)]
        cls: Option<PathBuf>,

        /// Scale every feature to zero mean and unit variance
        #[arg(long)]
        scale: bool,

        /// Comma-separated grid dimensions, e.g. "10,12" (default: derived from data)
        #[arg(short, long)]
        dims: Option<String>,

        /// Unit shape: hexagon or rectangle
        #[arg(long, default_value = "hexagon")]
        ushape: UnitShape,

        /// Codebook initialization: random or linear
        #[arg(long, default_value = "random")]
        init: InitMethod,

        /// Initial neighbourhood radius (default: half the longer grid side)
        #[arg(short, long)]
        radius: Option<f64>,

        /// Radius decay strategy: exp, lin or inv
        #[arg(long, default_value = "lin")]
        rdecay: String,

        /// Neighbourhood function: gaussian, bubble or mexican
        #[arg(long, default_value = "gaussian")]
        neighb: Neighborhood,

        /// Initial learning rate (sequential training)
        #[arg(short, long, default_value = "0.5")]
        lrate: f64,

        /// Learning rate decay strategy: exp, lin or inv
        #[arg(long, default_value = "lin")]
        ldecay: String,

        /// Distance metric for the BMU search: euclidean, manhattan or chebyshev
        #[arg(long, default_value = "euclidean")]
        metric: String,

        /// Training algorithm: seq or batch
        #[arg(short, long, default_value = "seq")]
        training: Algorithm,

        /// Number of training iterations (epochs for batch training)
        #[arg(short = 'n', long, default_value = "1000")]
        iters: usize,

        /// Number of batch workers (0 = one per CPU)
        #[arg(short, long, default_value = "0")]
        workers: usize,

        /// Random seed for reproducibility
        #[arg(short, long)]
        seed: Option<u64>,

        /// Output model file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output U-matrix SVG file
        #[arg(short, long)]
        umatrix: Option<PathBuf>,
    },

    /// Generate a clustered CSV data set
    Generate {
        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,

        /// Number of samples
        #[arg(short, long, default_value = "1000")]
        rows: usize,

        /// Number of features
        #[arg(short, long, default_value = "3")]
        cols: usize,

        /// Number of clusters
        #[arg(short = 'k', long, default_value = "4")]
        clusters: usize,

        /// Lower bound of cluster centres
        #[arg(long, default_value = "-10.0", allow_hyphen_values = true)]
        min: f64,

        /// Upper bound of cluster centres
        #[arg(long, default_value = "10.0", allow_hyphen_values = true)]
        max: f64,

        /// Maximum per-feature distance of a sample from its centre
        #[arg(long, default_value = "1.0")]
        offset: f64,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },

    /// Show information about a trained map
    Inspect {
        /// Model file
        #[arg(short, long)]
        model: PathBuf,

        /// Data set to evaluate the map on
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Scale the data set before evaluation
        #[arg(long)]
        scale: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let result = match cli.command {
        Commands::Train {
            input,
            cls,
            scale,
            dims,
            ushape,
            init,
            radius,
            rdecay,
            neighb,
            lrate,
            ldecay,
            metric,
            training,
            iters,
            workers,
            seed,
            output,
            umatrix,
        } => {
            let grid = GridSpec { dims, shape: ushape };
            let train = TrainSpec {
                algorithm: training,
                radius,
                radius_decay: Decay::from_name(&rdecay),
                neighborhood: neighb,
                learning_rate: lrate,
                learning_rate_decay: Decay::from_name(&ldecay),
                metric: Metric::from_name(&metric),
                workers,
                seed,
            };
            train_map(&input, cls.as_deref(), scale, grid, init, train, iters, output, umatrix)
        }

        Commands::Generate {
            output,
            rows,
            cols,
            clusters,
            min,
            max,
            offset,
            seed,
        } => generate_data(&output, rows, cols, clusters, min, max, offset, seed),

        Commands::Inspect { model, data, scale } => inspect_map(&model, data.as_deref(), scale),
    };

    if let Err(e) = result {
        error!("Error: {}", e);
        std::process::exit(1);
    }
}

struct GridSpec {
    dims: Option<String>,
    shape: UnitShape,
}

/// Training options as given on the command line.
struct TrainSpec {
    algorithm: Algorithm,
    radius: Option<f64>,
    radius_decay: Decay,
    neighborhood: Neighborhood,
    learning_rate: f64,
    learning_rate_decay: Decay,
    metric: Metric,
    workers: usize,
    seed: Option<u64>,
}

impl TrainSpec {
    /// Resolves the options against the lattice size. A missing radius
    /// defaults to half the longer side; a given one is kept as is.
    fn resolve(self, size: &[usize]) -> TrainConfig {
        let radius = self.radius.unwrap_or_else(|| default_radius(size));
        TrainConfig {
            algorithm: self.algorithm,
            radius,
            radius_decay: self.radius_decay,
            neighborhood: self.neighborhood,
            learning_rate: self.learning_rate,
            learning_rate_decay: self.learning_rate_decay,
            metric: self.metric,
            workers: self.workers,
            seed: self.seed,
        }
    }
}

fn default_radius(size: &[usize]) -> f64 {
    let longest = size.iter().copied().max().unwrap_or(2);
    (longest as f64 / 2.0).max(1.0)
}

fn parse_dims(dims: &str) -> Result<Vec<usize>> {
    dims.split(',')
        .map(|d| {
            d.trim()
                .parse()
                .map_err(|_| SomError::Config(format!("invalid grid dimension: '{}'", d)))
        })
        .collect()
}

fn load_data(path: &Path, cls: Option<&Path>, scale: bool) -> Result<DataSet> {
    let mut ds = DataSet::load(path, cls)?;
    if scale {
        info!("Scaling features");
        ds.scale();
    }
    Ok(ds)
}

#[allow(clippy::too_many_arguments)]
fn train_map(
    input: &Path,
    cls: Option<&Path>,
    scale: bool,
    grid: GridSpec,
    init: InitMethod,
    train: TrainSpec,
    iters: usize,
    output: Option<PathBuf>,
    umatrix: Option<PathBuf>,
) -> Result<()> {
    let start_time = Instant::now();

    println!("Kohonen SOM trainer");
    println!("   Training map on: {}", input.display());
    println!();

    let ds = load_data(input, cls, scale)?;
    println!("✓ Loaded {} samples with {} features", ds.rows(), ds.cols());
    if let Some(classes) = ds.classes() {
        let mut distinct = classes.to_vec();
        distinct.sort_unstable();
        distinct.dedup();
        println!("✓ Loaded {} class labels ({} classes)", classes.len(), distinct.len());
    }

    let size = match grid.dims {
        Some(dims) => parse_dims(&dims)?,
        None => grid_dims(ds.data(), grid.shape)?.to_vec(),
    };
    let train = train.resolve(&size);
    train.validate()?;

    let config = MapConfig {
        grid: GridConfig {
            size,
            shape: grid.shape,
        },
        codebook: CodebookConfig {
            init,
            seed: train.seed,
        },
    };
    let mut map = Map::new(&config, ds.data())?;
    println!(
        "✓ Created {:?} {} map ({} init)",
        config.grid.size, config.grid.shape, init
    );

    let bar_style = ProgressStyle::default_bar()
        .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) ETA: {eta}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░  ");
    let pb = ProgressBar::new(iters as u64);
    pb.set_style(bar_style);
    pb.set_message(format!("Training ({})...", train.algorithm));

    let step = (iters / 100).max(1);
    map.train_with_progress(&train, ds.data(), iters, |p| {
        if p.iteration % step == 0 || p.iteration + 1 == p.total {
            pb.set_position(p.iteration as u64 + 1);
            pb.set_message(format!("Training ({}), radius {:.3}", train.algorithm, p.radius));
        }
    })?;
    pb.finish_and_clear();
    println!("✓ Trained for {} iterations ({})", iters, train.algorithm);

    if let Some(path) = output {
        map.save(&path)?;
        println!("✓ Saved model to {}", path.display());
    }

    if let Some(path) = umatrix {
        let values = map.umatrix()?;
        let mut writer = BufWriter::new(File::create(&path)?);
        write_svg(values.view(), map.grid(), "U-Matrix", &mut writer)?;
        println!("✓ Saved U-matrix to {}", path.display());
    }

    println!();
    println!("{}", map.quality(ds.data()));
    println!();
    println!("Done in {}", HumanDuration(start_time.elapsed()));
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn generate_data(
    output: &Path,
    rows: usize,
    cols: usize,
    clusters: usize,
    min: f64,
    max: f64,
    offset: f64,
    seed: u64,
) -> Result<()> {
    let ds = DataSet::clustered(rows, cols, clusters, min, max, offset, seed)?;
    ds.write_csv(output)?;
    println!(
        "✓ Wrote {} samples in {} clusters to {}",
        rows,
        clusters,
        output.display()
    );
    Ok(())
}

fn inspect_map(model: &Path, data: Option<&Path>, scale: bool) -> Result<()> {
    let header = ModelFormat::read_header(model)?;
    let map = Map::load(model)?;

    println!("Model: {}", model.display());
    println!("   Format version: {}", header.version);
    println!("   Grid:           {} x {} {}", header.rows, header.cols, header.shape);
    println!("   Units:          {}", header.units());
    println!("   Features:       {}", header.dim);
    println!("   Init:           {}", map.config().codebook.init);

    match map.topo_product() {
        Ok(tp) => println!("   Topographic product: {:.6}", tp),
        Err(e) => println!("   Topographic product: unavailable ({})", e),
    }

    if let Some(path) = data {
        let ds = load_data(path, None, scale)?;
        println!();
        println!("{}", map.quality(ds.data()));
    }
    Ok(())
}
