use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use itertools::Itertools;
use lesion::names::{DEFAULT_INTERVAL, MarkSentinel, NameParser};
use lesion::reader::lif_metadata_string_size;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "bioformats")]
use lesion::metadata::{METADATA_ORDER, metadata};
#[cfg(feature = "bioformats")]
use lesion::{
    AxisOrder, BioFormatsSource, ImageSource, Session, StatOptions, TraceOptions, traces_dict,
};
#[cfg(feature = "bioformats")]
use std::{fs::File, io::BufWriter};

#[derive(Parser)]
#[command(
    arg_required_else_help = true,
    version,
    about,
    long_about = None,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse series names into a position and timepoints
    Names {
        #[arg(value_name = "NAME", num_args(1..))]
        name: Vec<String>,
        /// hours between images in a time range
        #[arg(short, long, value_name = "HOURS", default_value_t = DEFAULT_INTERVAL)]
        interval: f64,
        /// give mark and find images NaN as timepoint instead of -2
        #[arg(long)]
        nan_mark: bool,
    },
    /// Print the length of the metadata in the header of lif files
    MetadataSize {
        #[arg(value_name = "FILE", num_args(1..))]
        file: Vec<PathBuf>,
    },
    /// Print name, shape (TZYXC) and resolution (ZYX) of every series
    #[cfg(feature = "bioformats")]
    Info {
        #[arg(value_name = "FILE", num_args(1..))]
        file: Vec<PathBuf>,
        #[arg(long, value_name = "SIZE", default_value = "8G")]
        max_heap_size: String,
    },
    /// Trace every series and save the statistics per position and timepoint as tsv file
    #[cfg(feature = "bioformats")]
    Stats {
        #[arg(value_name = "FILE", num_args(1..))]
        file: Vec<PathBuf>,
        /// process only these series
        #[arg(short, long, value_name = "SERIES", num_args(1..))]
        series: Vec<usize>,
        #[arg(short, long, value_name = "CHANNEL", default_value_t = 0)]
        channel: usize,
        #[arg(short, long, value_name = "HOURS", default_value_t = DEFAULT_INTERVAL)]
        interval: f64,
        #[arg(long)]
        nan_mark: bool,
        /// smooth traces before computing slope and missing fluorescence
        #[arg(long, value_name = "SIGMA")]
        sigma: Option<f64>,
        /// baseline of the missing fluorescence, estimated from the margins if not given
        #[arg(long, value_name = "HEIGHT")]
        height: Option<f64>,
        #[arg(long, value_name = "MARGINS", default_value_t = 50)]
        margins: usize,
        /// leave the statistics of images without fluorescence empty
        #[arg(long)]
        skip_bad_images: bool,
        #[arg(long, value_name = "SIZE", default_value = "8G")]
        max_heap_size: String,
        #[arg(short, long)]
        overwrite: bool,
    },
    /// Download the BioFormats jar into the correct folder
    #[cfg(feature = "bioformats")]
    DownloadBioFormats {
        #[arg(short, long, value_name = "GPL_FORMATS")]
        gpl_formats: bool,
    },
}

fn mark(nan_mark: bool) -> MarkSentinel {
    if nan_mark {
        MarkSentinel::Nan
    } else {
        MarkSentinel::default()
    }
}

pub(crate) fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Names {
            name,
            interval,
            nan_mark,
        } => {
            let parser = NameParser::new(*interval, mark(*nan_mark))?;
            for n in name {
                let (position, times) = parser.parse(n)?;
                println!("{n}\t{position}\t{}", times.iter().join(" "));
            }
        }
        Commands::MetadataSize { file } => {
            for f in file {
                let size = lif_metadata_string_size(f)
                    .with_context(|| format!("reading header of {}", f.display()))?;
                println!("{}\t{size}", f.display());
            }
        }
        #[cfg(feature = "bioformats")]
        Commands::Info {
            file,
            max_heap_size,
        } => {
            let session = Session::new(max_heap_size)?;
            let order: AxisOrder = METADATA_ORDER.parse()?;
            for f in file {
                let source = BioFormatsSource::open(&session, f)
                    .with_context(|| format!("opening {}", f.display()))?;
                println!("{}: {} series", f.display(), source.series_count()?);
                for (i, series) in metadata(&source, &order)?.iter().enumerate() {
                    println!(
                        "{i}\t{}\tshape {METADATA_ORDER}: {:?}\tresolution ZYX: {:?}",
                        series.name, series.shape, series.resolution
                    );
                }
            }
            session.shutdown();
        }
        #[cfg(feature = "bioformats")]
        Commands::Stats {
            file,
            series,
            channel,
            interval,
            nan_mark,
            sigma,
            height,
            margins,
            skip_bad_images,
            max_heap_size,
            overwrite,
        } => {
            let options = TraceOptions {
                series: (!series.is_empty()).then(|| series.clone()),
                channel: *channel,
                names: NameParser::new(*interval, mark(*nan_mark))?,
                stat_options: StatOptions::new(*sigma, *height, *margins)?,
                skip_bad_images: *skip_bad_images,
                ..Default::default()
            };
            let session = Session::new(max_heap_size)?;
            for f in file {
                let out = f.with_extension("tsv");
                if out.exists() && !*overwrite {
                    tracing::warn!("{} exists, skipping {}", out.display(), f.display());
                    continue;
                }
                let source = BioFormatsSource::open(&session, f)
                    .with_context(|| format!("opening {}", f.display()))?;
                let (_, table) = traces_dict(&source, &options)
                    .with_context(|| format!("processing {}", f.display()))?;
                table.write_tsv(BufWriter::new(File::create(&out)?))?;
                tracing::info!("saved {}", out.display());
            }
            session.shutdown();
        }
        #[cfg(feature = "bioformats")]
        Commands::DownloadBioFormats { gpl_formats } => {
            lesion::download_bioformats(*gpl_formats)?
        }
    }

    Ok(())
}
