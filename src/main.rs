use clap::{Parser, Subcommand};
use image_handler::config::{self, HandlerConfig};
use image_handler::imaging::{
    Backend, EngineKind, ImageFormat, ImageSession, Quality, SaveOptions, identify,
};
use image_handler::recipe::Recipe;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "image-handler")]
#[command(about = "Chainable image transforms with a raster or ImageMagick engine")]
#[command(long_about = "\
Chainable image transforms with a raster or ImageMagick engine

A recipe is a TOML file listing steps in order:

  [[steps]]
  op = \"thumb\"            # resize, thumb, crop, flip, rotate, grayscale,
  width = 640              # text, watermark, adaptive-thumb, resize-canvas,
  height = 640             # reload

  [[steps]]
  op = \"watermark\"
  file = \"logo.png\"        # relative to the recipe file
  corner = \"right-bottom\"
  zoom = 0.2

Engines:
  raster  applies every step in memory (default)
  magick  runs ImageMagick `convert` at save time; only the LAST step
          before the save takes effect

Run 'image-handler gen-config' to generate a documented config file.")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Engine to use, overriding the config file (raster or magick)
    #[arg(long, global = true)]
    engine: Option<String>,

    #[command(subcommand)]
    command: Command,
}

/// Shared flags for commands that encode an image.
#[derive(clap::Args, Clone)]
struct EncodeArgs {
    /// Recipe to apply after loading
    #[arg(long)]
    recipe: Option<PathBuf>,

    /// Output format: gif, jpeg or png (defaults to the input's)
    #[arg(long)]
    format: Option<ImageFormat>,

    /// JPEG quality 0-100 (defaults to output.jpeg_quality)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    quality: Option<u8>,
}

#[derive(Subcommand)]
enum Command {
    /// Print an image's size and format as JSON
    Identify {
        file: PathBuf,
    },
    /// Load an image, apply a recipe and save the result
    Apply {
        input: PathBuf,
        #[command(flatten)]
        encode: EncodeArgs,
        /// Where to write (defaults to overwriting the input)
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Give the output the input's modification time
        #[arg(long)]
        touch: bool,
    },
    /// Load an image, apply a recipe and write the encoded bytes to stdout
    Show {
        input: PathBuf,
        #[command(flatten)]
        encode: EncodeArgs,
    },
    /// Print a stock config file with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match &cli.command {
        Command::Identify { file } => {
            let info = identify(file)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Apply {
            input,
            encode,
            output,
            touch,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let mut session = build_session(&config, cli.engine.as_deref())?;
            prepare(&mut session, input, encode)?;

            let target = output.clone().unwrap_or_else(|| input.clone());
            session.save(&SaveOptions {
                path: Some(target.clone()),
                format: encode.format,
                quality: quality(encode, &config),
                touch: *touch,
            })?;
            // The magick engine re-points the session at the file it wrote.
            let written = match session.backend().kind() {
                EngineKind::Magick => session.source_path().map(Path::to_path_buf),
                EngineKind::Raster => None,
            }
            .unwrap_or(target);
            println!(
                "{} ({}x{})",
                written.display(),
                session.width(),
                session.height()
            );
        }
        Command::Show { input, encode } => {
            let config = load_config(cli.config.as_deref())?;
            let mut session = build_session(&config, cli.engine.as_deref())?;
            prepare(&mut session, input, encode)?;

            let stdout = std::io::stdout();
            let mut out = std::io::BufWriter::new(stdout.lock());
            let mime = session.show(&mut out, encode.format, quality(encode, &config))?;
            out.flush()?;
            log::info!("wrote {mime} to stdout");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<HandlerConfig, config::ConfigError> {
    match path {
        Some(path) => config::load_config(path),
        None => Ok(HandlerConfig::default()),
    }
}

/// Session on the configured engine, or on `engine` when given.
fn build_session(
    config: &HandlerConfig,
    engine: Option<&str>,
) -> Result<ImageSession, Box<dyn std::error::Error>> {
    let backend = match engine {
        Some(name) => Backend::new(name.parse::<EngineKind>()?, config),
        None => Backend::from_config(config)?,
    };
    log::debug!("using {} engine", backend.kind());
    Ok(ImageSession::new(backend))
}

/// Load `input` and run the recipe, if any.
fn prepare(
    session: &mut ImageSession,
    input: &Path,
    encode: &EncodeArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    session.load(input)?;
    if let Some(path) = &encode.recipe {
        Recipe::load(path)?.apply(session)?;
    }
    Ok(())
}

fn quality(encode: &EncodeArgs, config: &HandlerConfig) -> Quality {
    Quality::new(encode.quality.unwrap_or(config.output.jpeg_quality))
}
