use clap::{Parser, Subcommand, ValueEnum};
use detector::{
    Delegate, DetectorConfig, HomeScreen, Model,
    backend::BackendLoader,
    logging::setup_logging,
    options::resolve_options,
    permission::{AccessStatus, PermissionGate},
    picker::{self, ImageSource, Selection},
};
use preprocess::ResizeMode;
use std::path::PathBuf;

#[cfg(feature = "ort-backend")]
use detector::backend::ort::OrtLoader as Loader;

#[cfg(not(feature = "ort-backend"))]
compile_error!("The 'ort-backend' feature must be enabled to build the CLI");

#[derive(Parser, Debug)]
#[command(name = "gallery-detect", version, about = "On-device image classification and detection")]
struct Cli {
    /// Directory holding the model and label files (overrides MODEL_DIR)
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify an image file or a picked gallery entry
    Classify {
        /// Image file or gallery directory
        source: PathBuf,

        /// Gallery entry to pick, by index or file name
        #[arg(short, long)]
        pick: Option<String>,

        #[arg(short, long, value_enum, default_value_t = Model::default())]
        model: Model,

        #[arg(short, long, value_enum, default_value_t = Delegate::default())]
        delegate: Delegate,

        /// Categories to keep per result, 0 for all (overrides MAX_RESULTS)
        #[arg(long)]
        max_results: Option<usize>,

        /// Drop categories scoring below this (overrides SCORE_THRESHOLD)
        #[arg(long)]
        score_threshold: Option<f32>,

        /// Inference threads (overrides NUM_THREADS)
        #[arg(long)]
        threads: Option<usize>,

        /// Fit the image by stretching or letterboxing (overrides RESIZE_MODE)
        #[arg(long)]
        resize: Option<ResizeMode>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// List the model catalog
    Models {
        /// Also report whether each model file is present and which
        /// delegate it would run on
        #[arg(long)]
        check: bool,

        #[arg(short, long, value_enum, default_value_t = Delegate::default())]
        delegate: Delegate,
    },
    /// List images in a gallery directory
    Gallery { dir: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = DetectorConfig::from_env()?;
    if let Some(dir) = cli.model_dir {
        config.model_dir = dir;
    }

    setup_logging(&config);

    tracing::debug!(config = ?config, "Loaded configuration");

    match cli.command {
        Command::Classify {
            source,
            pick,
            model,
            delegate,
            max_results,
            score_threshold,
            threads,
            resize,
            format,
        } => {
            if let Some(max_results) = max_results {
                config.max_results = max_results;
            }
            if let Some(threshold) = score_threshold {
                config.score_threshold = Some(threshold);
            }
            if let Some(threads) = threads {
                config.num_threads = threads;
            }
            if let Some(resize) = resize {
                config.resize = resize;
            }
            config.validate()?;

            let screen = HomeScreen::with_selection(
                Loader::default(),
                &config.model_dir,
                model,
                delegate,
                config.tuning(),
            );

            let selection = pick.as_deref().map(Selection::parse);
            let source = ImageSource::from_path(source);
            if !screen.insert_image(&source, selection.as_ref())? {
                anyhow::bail!(
                    "No image picked from {}; pass --pick <index|name>",
                    source.path().display()
                );
            }

            let outcome = screen.classify().await;

            match format {
                OutputFormat::Text => {
                    println!("{}", screen.render());
                    let state = screen.state();
                    for message in state.notice.iter().chain(&state.last_error) {
                        eprintln!("{message}");
                    }
                }
                OutputFormat::Json => println!("{}", screen.render_json()?),
            }

            outcome?;
        }
        Command::Models { check, delegate } => {
            let loader = Loader::default();
            for model in Model::ALL {
                let spec = model.spec();
                let (width, height) = spec.input.size;
                let mut line = format!(
                    "{:<16} {:<24} {}x{}",
                    model.display_name(),
                    model.file_name(),
                    width,
                    height
                );
                if check {
                    let resolved = resolve_options(
                        &config.model_dir,
                        model,
                        delegate,
                        &config.tuning(),
                        &loader,
                    );
                    let present = resolved.options.model_path.exists();
                    line.push_str(&format!(
                        "  {}  on {}",
                        if present { "present" } else { "missing" },
                        resolved.options.base.delegate
                    ));
                    if let Some(fallback) = resolved.fallback {
                        line.push_str(&format!(" ({fallback})"));
                    }
                    if present {
                        if let Err(e) = loader.load(&resolved.options) {
                            line.push_str(&format!("  load failed: {e:#}"));
                        }
                    }
                }
                println!("{line}");
            }
        }
        Command::Gallery { dir } => {
            match PermissionGate.check(&dir) {
                AccessStatus::Granted => {}
                AccessStatus::Denied => {
                    anyhow::bail!("Storage read access denied for {}", dir.display())
                }
                AccessStatus::Missing => anyhow::bail!("Gallery not found: {}", dir.display()),
            }
            let entries = picker::list_gallery(&dir)?;
            if entries.is_empty() {
                println!("No images in {}", dir.display());
            }
            for entry in entries {
                println!("{:>4}  {}", entry.index, entry.name);
            }
        }
    }

    Ok(())
}
