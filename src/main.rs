use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tower::Service;

use series_heatmap::heatmap::{self, HeatmapStyle, RatingsGrid};
use series_heatmap::serializer::{self, file_stem_for, title_for};
use series_heatmap::{
    ChromeDriver, EntryKind, ImdbScraper, ScrapeRequest, Scraper, ScraperConfig, ScraperError,
    SeriesService,
};

#[derive(Parser)]
#[command(name = "series-heatmap")]
#[command(about = "Scrape IMDb episode ratings and plot them as season/episode heatmaps")]
#[command(version)]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "info", value_enum)]
    log_level: LogLevel,

    /// Use UTC timestamps instead of local time
    #[arg(long, global = true)]
    utc: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum KindArg {
    /// TV series
    Tv,
    /// Feature film
    Ft,
}

impl From<KindArg> for EntryKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Tv => EntryKind::Series,
            KindArg::Ft => EntryKind::Film,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Search IMDb titles and print the hits as JSON
    Search {
        /// Search text
        query: String,

        /// Restrict to a title kind
        #[arg(short, long, value_enum)]
        kind: Option<KindArg>,

        /// Maximum number of results
        #[arg(short, long, default_value_t = 5)]
        max_results: usize,

        /// Show the browser window
        #[arg(long)]
        headed: bool,
    },

    /// Scrape episode ratings into CSV tables
    Scrape {
        /// Name of the series to scrape
        #[arg(short, long)]
        name: Option<String>,

        /// File with one series name per line
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Directory for the CSV tables
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// Show the browser window
        #[arg(long)]
        headed: bool,
    },

    /// Render heatmaps from cached CSV tables
    Plot {
        /// Series name; without it every table in the data directory is plotted
        #[arg(short, long)]
        name: Option<String>,

        /// Show the heatmap instead of saving it
        #[arg(short, long)]
        show: bool,

        /// Dark plot style
        #[arg(short, long)]
        dark: bool,

        /// Overwrite existing images (ignored with --show)
        #[arg(short, long = "override")]
        override_existing: bool,

        /// Directory with the CSV tables
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Directory for the images
        #[arg(long, default_value = "img")]
        img_dir: PathBuf,
    },
}

fn init_tracing(level: &LogLevel, utc: bool) {
    // Keep the HTML parser quiet at debug/trace
    let level = match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug,selectors=warn,html5ever=warn,chromiumoxide=info",
        LogLevel::Trace => "trace,selectors=warn,html5ever=warn",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let time_format = "%Y-%m-%d %H:%M:%S%.3f %:z";

    if utc {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_timer(tracing_subscriber::fmt::time::ChronoUtc::new(time_format.to_string()))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new(time_format.to_string()))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.utc);

    match cli.command {
        Commands::Search {
            query,
            kind,
            max_results,
            headed,
        } => search(&query, kind.map(EntryKind::from), max_results, headed).await,
        Commands::Scrape {
            name,
            file,
            data_dir,
            headed,
        } => scrape(name, file.as_deref(), &data_dir, headed).await,
        Commands::Plot {
            name,
            show,
            dark,
            override_existing,
            data_dir,
            img_dir,
        } => {
            let style = if dark {
                HeatmapStyle::dark()
            } else {
                HeatmapStyle::default()
            };
            plot(name, show, override_existing, &style, &data_dir, &img_dir)
        }
    }
}

async fn search(
    query: &str,
    kind: Option<EntryKind>,
    max_results: usize,
    headed: bool,
) -> Result<()> {
    tracing::info!(query = %query, "Searching");
    let config = ScraperConfig::default().with_headless(!headed);
    let mut scraper = ImdbScraper::new(config.clone(), ChromeDriver::new(config));

    scraper.initialize().await?;
    let results = ImdbScraper::search(&mut scraper, query, kind, max_results).await;
    scraper.close().await?;

    println!("{}", serde_json::to_string_pretty(&results?)?);
    Ok(())
}

fn read_queries(name: Option<String>, file: Option<&Path>) -> Result<Vec<String>> {
    let mut queries: Vec<String> = name.into_iter().collect();

    if let Some(file) = file {
        anyhow::ensure!(file.is_file(), "Supplied query file {:?} does not exist", file);
        let contents = std::fs::read_to_string(file)
            .with_context(|| format!("reading query file {:?}", file))?;
        queries.extend(
            contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
    }

    Ok(queries)
}

async fn scrape(
    name: Option<String>,
    file: Option<&Path>,
    data_dir: &Path,
    headed: bool,
) -> Result<()> {
    let queries = read_queries(name, file)?;
    if queries.is_empty() {
        println!("No query supplied. Use --help to see how to use this command.");
        return Ok(());
    }

    let mut service = SeriesService::new();
    let mut failed = 0usize;

    for query in &queries {
        let request = ScrapeRequest::new(query.as_str()).with_headless(!headed);
        match service.call(request).await {
            Ok(result) => {
                let path = data_dir.join(format!("{}.csv", file_stem_for(&result.entry.title)));
                serializer::save_csv(&path, &result.episodes)?;
                tracing::info!(
                    title = %result.entry.title,
                    episodes = result.episodes.len(),
                    path = %path.display(),
                    "Wrote ratings table"
                );
            }
            Err(ScraperError::NotASeries { title, .. }) => {
                tracing::warn!("Found IMDb entry {} is not a series", title);
            }
            Err(e) => {
                tracing::error!(query = %query, "Scrape failed: {}", e);
                failed += 1;
            }
        }
    }

    anyhow::ensure!(failed == 0, "{} of {} scrapes failed", failed, queries.len());
    Ok(())
}

/// Series names (file stems) of every CSV table in `data_dir`.
fn list_series(data_dir: &Path) -> Result<Vec<String>> {
    let mut series: Vec<String> = std::fs::read_dir(data_dir)
        .with_context(|| format!("reading data directory {:?}", data_dir))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false)
        })
        .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .collect();
    series.sort();
    Ok(series)
}

fn image_path(img_dir: &Path, series: &str) -> PathBuf {
    img_dir.join(format!("{}.png", file_stem_for(series)))
}

fn plot(
    name: Option<String>,
    show: bool,
    override_existing: bool,
    style: &HeatmapStyle,
    data_dir: &Path,
    img_dir: &Path,
) -> Result<()> {
    let mut all_series = match name {
        Some(name) => vec![name],
        None => list_series(data_dir)?,
    };

    if !show && !override_existing && !all_series.is_empty() {
        let before = all_series.len();
        all_series.retain(|s| !image_path(img_dir, s).is_file());
        let skipped = before - all_series.len();
        if skipped > 0 {
            println!(
                "Ignoring {}/{} series because these heatmap images already exist and override flag is not set.",
                skipped, before
            );
        }
    }

    if all_series.is_empty() {
        println!("No series to plot...");
        return Ok(());
    }

    if !show {
        std::fs::create_dir_all(img_dir)
            .with_context(|| format!("creating image directory {:?}", img_dir))?;
    }

    let pb = ProgressBar::new(all_series.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    for series in &all_series {
        pb.set_message(title_for(series));
        let table = data_dir.join(format!("{}.csv", file_stem_for(series)));
        let episodes = serializer::load_csv(&table)
            .with_context(|| format!("loading ratings table {:?}", table))?;
        let grid = RatingsGrid::from_episodes(&episodes);
        if grid.is_empty() {
            pb.suspend(|| tracing::warn!("No ratings in {:?}, skipping", table));
            pb.inc(1);
            continue;
        }

        if show {
            let path = std::env::temp_dir().join(format!("{}.png", file_stem_for(series)));
            heatmap::render_png(series, &grid, &path, style)?;
            heatmap::show(&path)?;
        } else {
            heatmap::render_png(series, &grid, &image_path(img_dir, series), style)?;
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_plot_flags() {
        let cli = Cli::try_parse_from([
            "series-heatmap",
            "plot",
            "--dark",
            "--override",
            "--name",
            "Breaking Bad",
        ])
        .unwrap();
        match cli.command {
            Commands::Plot {
                name,
                dark,
                override_existing,
                show,
                ..
            } => {
                assert_eq!(name.as_deref(), Some("Breaking Bad"));
                assert!(dark);
                assert!(override_existing);
                assert!(!show);
            }
            _ => panic!("expected plot"),
        }
    }

    #[test]
    fn test_read_queries_from_name_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("series.txt");
        std::fs::write(&file, "Dark\n\n  Arcane  \n").unwrap();

        let queries = read_queries(Some("Friends".into()), Some(&file)).unwrap();
        assert_eq!(queries, vec!["Friends", "Dark", "Arcane"]);
    }

    #[test]
    fn test_read_queries_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_queries(None, Some(&dir.path().join("nope.txt"))).is_err());
    }

    #[test]
    fn test_list_series_only_csv() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Dark.csv"), "").unwrap();
        std::fs::write(dir.path().join("Money_Heist.csv"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        assert_eq!(list_series(dir.path()).unwrap(), vec!["Dark", "Money_Heist"]);
    }

    #[test]
    fn test_plot_skips_existing_images() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let img_dir = dir.path().join("img");
        std::fs::create_dir_all(&data_dir).unwrap();
        std::fs::create_dir_all(&img_dir).unwrap();
        std::fs::write(data_dir.join("Dark.csv"), "season,episode,name,rating\n").unwrap();
        std::fs::write(img_dir.join("Dark.png"), b"png").unwrap();

        // the only table already has an image, so nothing is rendered
        plot(None, false, false, &HeatmapStyle::default(), &data_dir, &img_dir).unwrap();
        assert_eq!(std::fs::read(img_dir.join("Dark.png")).unwrap(), b"png");
    }

    #[test]
    fn test_plot_skips_tables_without_ratings() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let img_dir = dir.path().join("img");
        std::fs::create_dir_all(&data_dir).unwrap();
        std::fs::write(data_dir.join("Dark.csv"), "season,episode,name,rating\n").unwrap();
        std::fs::write(
            data_dir.join("Unaired.csv"),
            "season,episode,name,rating\n1,1,Pilot,0.0\n",
        )
        .unwrap();

        plot(None, false, true, &HeatmapStyle::default(), &data_dir, &img_dir).unwrap();
        assert!(!img_dir.join("Dark.png").exists());
        assert!(!img_dir.join("Unaired.png").exists());
    }
}
