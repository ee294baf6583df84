use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
#[cfg(feature = "reporting")]
use survey_misreg::reporting::write_xlsx;
use survey_misreg::{
    config::ProjectConfig,
    io::csv::{read_survey_csv, write_survey_csv},
    map::MapView,
    reporting::{format_occupancy, format_points, format_text, SummaryReport, SummaryTable},
    Containment, StatsScope, SurveyData,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Per-tile summaries of survey offsets between two collection methods.
#[derive(Parser)]
#[command(name = "survey_misreg_cli", version)]
struct Cli {
    /// Project configuration (JSON); other options override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Survey table (CSV); repeat for several datasets
    #[arg(long = "dataset", global = true)]
    datasets: Vec<PathBuf>,
    /// Tile polygons (shapefile or GeoJSON)
    #[arg(long, global = true)]
    tiles: Option<PathBuf>,
    /// Attribute holding the tile identifier
    #[arg(long, global = true)]
    id_field: Option<String>,
    /// EPSG code of the tile polygons, overriding any .prj sidecar
    #[arg(long, global = true)]
    tiles_epsg: Option<u32>,
    /// EPSG code of the survey easting/northing columns
    #[arg(long, global = true)]
    source_epsg: Option<u32>,
    /// EPSG code of the derived longitude/latitude
    #[arg(long, global = true)]
    target_epsg: Option<u32>,
    /// Boundary convention: interior or covers
    #[arg(long, global = true)]
    containment: Option<Containment>,
    /// Points the statistics cover: dataset or tile
    #[arg(long, global = true)]
    stats_scope: Option<StatsScope>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarise the offsets of one tile.
    Summary {
        tile_ref: String,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
        /// Also write the statistics table to a CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Also write the statistics and points to an XLSX workbook
        #[cfg(feature = "reporting")]
        #[arg(long)]
        xlsx: Option<PathBuf>,
        /// List the points inside the tile
        #[arg(long)]
        list_points: bool,
    },
    /// List tiles with the number of points inside each.
    Tiles {
        /// Only tiles holding at least one point
        #[arg(long)]
        occupied: bool,
        /// Write the listed tiles to a shapefile
        #[cfg(feature = "shapefile")]
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Add longitude/latitude columns to a survey table.
    Reproject { input: PathBuf, output: PathBuf },
    /// Export points, tiles and overlays as GeoJSON map layers.
    Map { output: PathBuf },
    /// Write a configuration template.
    InitConfig { path: PathBuf },
}

/// Builds the project configuration from `--config` and the override flags.
fn project_config(cli: &Cli) -> CliResult<ProjectConfig> {
    let mut cfg = match &cli.config {
        Some(path) => {
            log::info!("reading configuration {}", path.display());
            ProjectConfig::load(path)?
        }
        None => ProjectConfig::new(Vec::new(), cli.tiles.clone().unwrap_or_default()),
    };
    if !cli.datasets.is_empty() {
        cfg.datasets = ProjectConfig::new(cli.datasets.clone(), PathBuf::new()).datasets;
    }
    if let Some(tiles) = &cli.tiles {
        cfg.tiles.path = tiles.clone();
    }
    if let Some(id_field) = &cli.id_field {
        cfg.tiles.id_field = id_field.clone();
    }
    if let Some(epsg) = cli.tiles_epsg {
        cfg.tiles.epsg = Some(epsg);
    }
    if let Some(epsg) = cli.source_epsg {
        cfg.source_epsg = epsg;
    }
    if let Some(epsg) = cli.target_epsg {
        cfg.target_epsg = epsg;
    }
    if let Some(containment) = cli.containment {
        cfg.containment = containment;
    }
    if let Some(scope) = cli.stats_scope {
        cfg.stats_scope = scope;
    }
    log::debug!(
        "{} dataset(s), tiles {} ({}), source EPSG:{}, target EPSG:{}, {} / {} scope",
        cfg.datasets.len(),
        cfg.tiles.path.display(),
        cfg.tiles.id_field,
        cfg.source_epsg,
        cfg.target_epsg,
        cfg.containment,
        cfg.stats_scope
    );
    Ok(cfg)
}

fn load_data(cfg: &ProjectConfig) -> CliResult<SurveyData> {
    if cfg.datasets.is_empty() {
        return Err("no survey tables given (use --dataset or --config)".into());
    }
    if cfg.tiles.path.as_os_str().is_empty() {
        return Err("no tile polygons given (use --tiles or --config)".into());
    }
    let data = SurveyData::from_config(cfg)?;
    log::info!(
        "loaded {} dataset(s) and {} tiles, matching in {:?} coordinates",
        data.datasets.len(),
        data.tiles.len(),
        data.frame
    );
    Ok(data)
}

fn run(cli: Cli) -> CliResult<()> {
    let cfg = project_config(&cli)?;
    match cli.command {
        Commands::Summary {
            tile_ref,
            json,
            csv,
            #[cfg(feature = "reporting")]
            xlsx,
            list_points,
        } => {
            let data = load_data(&cfg)?;
            let options = data.options(cfg.containment, cfg.stats_scope, cfg.columns.offsets.clone());
            let summary = data.summarize(&tile_ref, &options)?;
            if json {
                println!("{}", SummaryReport::new(&summary).to_json()?);
            } else {
                print!("{}", format_text(&summary));
            }
            if list_points {
                println!();
                print!("{}", format_points(&summary));
            }
            if let Some(path) = csv {
                SummaryTable::new(&summary).write_csv(&path)?;
                eprintln!("Wrote {}", path.display());
            }
            #[cfg(feature = "reporting")]
            if let Some(path) = xlsx {
                write_xlsx(&path, &summary)?;
                eprintln!("Wrote {}", path.display());
            }
        }
        Commands::Tiles {
            occupied,
            #[cfg(feature = "shapefile")]
            output,
        } => {
            let data = load_data(&cfg)?;
            let rows: Vec<_> = data
                .occupancy(cfg.containment)
                .into_iter()
                .filter(|o| !occupied || o.points > 0)
                .collect();
            print!("{}", format_occupancy(&rows));
            #[cfg(feature = "shapefile")]
            if let Some(path) = output {
                let tiles = rows
                    .iter()
                    .map(|o| Ok((data.tiles.get(&o.tile_ref)?, o.points)))
                    .collect::<survey_misreg::Result<Vec<_>>>()?;
                survey_misreg::io::shp::write_tiles_shp(&path, &tiles, &cfg.tiles.id_field, data.tiles.crs())?;
                eprintln!("Wrote {} tiles to {}", tiles.len(), path.display());
            }
        }
        Commands::Reproject { input, output } => {
            let reprojector = cfg.source_crs().to(&cfg.target_crs())?;
            let dataset = read_survey_csv(&input, None, &cfg.columns)?.reproject(&reprojector);
            write_survey_csv(&output, &dataset, &cfg.columns)?;
            println!("Reprojected {} rows to {}", dataset.len(), output.display());
        }
        Commands::Map { output } => {
            let data = load_data(&cfg)?;
            let view = MapView::from_data(&data)?;
            view.write(&output)?;
            println!("Wrote {} map features to {}", view.feature_count(), output.display());
        }
        Commands::InitConfig { path } => {
            ProjectConfig::template().save(&path)?;
            println!("Wrote configuration template to {}", path.display());
        }
    }
    Ok(())
}

fn init_logging() {
    if let Ok(path) = std::env::var("SURVEY_MISREG_LOG") {
        match File::create(&path) {
            Ok(file) => {
                env_logger::Builder::from_default_env()
                    .target(env_logger::Target::Pipe(Box::new(file)))
                    .init();
            }
            Err(e) => {
                eprintln!("Failed to create log file {}: {}", path, e);
                env_logger::Builder::from_default_env().init();
            }
        }
    } else {
        env_logger::Builder::from_default_env().init();
    }
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
