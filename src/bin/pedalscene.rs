//! CLI for pedalscene - put a rider into a new scene with Gemini.

use clap::{Args, Parser, Subcommand, ValueEnum};
use pedalscene::image::{SelectedImage, Watermarker, DEFAULT_DOWNLOAD_NAME};
use pedalscene::{
    GeminiSceneClient, Locale, Outcome, SceneController, SettingsStore, WatermarkedImage,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pedalscene")]
#[command(about = "Composite a rider (and bicycle) into a new scene via Gemini, then watermark it")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Settings file (defaults to $PEDALSCENE_SETTINGS or ~/.config/pedalscene/settings.json)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Language for user-facing messages
    #[arg(long, global = true, value_enum, default_value = "en")]
    lang: LocaleArg,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a scene and save the watermarked PNG
    Generate(GenerateArgs),

    /// Apply the caption watermark to an existing image
    Watermark(WatermarkArgs),

    /// Manage the stored Google AI API key
    #[command(subcommand)]
    Key(KeyCommands),
}

#[derive(Args)]
struct GenerateArgs {
    /// Photo of the person (with or without a bicycle)
    #[arg(short, long)]
    character: PathBuf,

    /// Separate photo of the bicycle, if the first photo has none
    #[arg(short, long)]
    bike: Option<PathBuf>,

    /// Photo of the target scene; takes precedence over --scene
    #[arg(long)]
    scene_image: Option<PathBuf>,

    /// Text description of the target scene
    #[arg(short, long, default_value = "")]
    scene: String,

    /// Output file path
    #[arg(short, long, default_value = DEFAULT_DOWNLOAD_NAME)]
    output: PathBuf,

    /// Also print the result as a data: URI
    #[arg(long)]
    data_url: bool,

    /// Gemini model identifier
    #[arg(long, env = "PEDALSCENE_MODEL")]
    model: Option<String>,

    /// API key for this run only (not stored)
    #[arg(long)]
    api_key: Option<String>,
}

#[derive(Args)]
struct WatermarkArgs {
    /// Image to watermark
    input: PathBuf,

    /// Output file path
    #[arg(short, long, default_value = DEFAULT_DOWNLOAD_NAME)]
    output: PathBuf,

    /// Caption to draw instead of the default
    #[arg(long)]
    caption: Option<String>,
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Store a new API key
    Set {
        /// The key to store
        key: String,

        /// Check the key against the service before storing it
        #[arg(long)]
        verify: bool,
    },
    /// Show the stored key (masked)
    Show,
    /// Remove the stored key
    Clear,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LocaleArg {
    En,
    Vi,
}

impl From<LocaleArg> for Locale {
    fn from(arg: LocaleArg) -> Self {
        match arg {
            LocaleArg::En => Locale::En,
            LocaleArg::Vi => Locale::Vi,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let locale = Locale::from(cli.lang);

    match cli.command {
        Commands::Generate(args) => {
            generate(args, cli.settings, locale, cli.json).await?;
        }
        Commands::Watermark(args) => {
            watermark(args, cli.json)?;
        }
        Commands::Key(command) => {
            manage_key(command, cli.settings, cli.json).await?;
        }
    }

    Ok(())
}

fn open_settings(path: Option<PathBuf>) -> anyhow::Result<SettingsStore> {
    match path.or_else(SettingsStore::default_path) {
        Some(path) => Ok(SettingsStore::open(path)?),
        None => {
            tracing::warn!("no settings location available, key will not be persisted");
            Ok(SettingsStore::in_memory())
        }
    }
}

/// Key precedence: `--api-key`, then the stored key, then `GOOGLE_API_KEY`.
fn resolve_settings(
    path: Option<PathBuf>,
    api_key: Option<String>,
) -> anyhow::Result<SettingsStore> {
    let stored = open_settings(path)?;
    let override_key = api_key.or_else(|| {
        stored
            .api_key()
            .is_none()
            .then(|| std::env::var("GOOGLE_API_KEY").ok())
            .flatten()
    });

    match override_key {
        Some(key) => {
            let mut session = SettingsStore::in_memory();
            session.save_api_key(&key)?;
            Ok(session)
        }
        None => Ok(stored),
    }
}

fn build_client(model: Option<String>) -> anyhow::Result<GeminiSceneClient> {
    let mut builder = GeminiSceneClient::builder();
    if let Some(model) = model {
        builder = builder.model_id(model);
    }
    Ok(builder.build()?)
}

async fn generate(
    args: GenerateArgs,
    settings_path: Option<PathBuf>,
    locale: Locale,
    json_output: bool,
) -> anyhow::Result<()> {
    let settings = resolve_settings(settings_path, args.api_key)?;
    let client = build_client(args.model)?;
    let controller = SceneController::new(client, Watermarker::new()?, settings);

    controller.select_character_image(Some(SelectedImage::file(&args.character)?));
    if let Some(ref bike) = args.bike {
        controller.select_bike_image(Some(SelectedImage::file(bike)?));
    }
    if let Some(ref scene) = args.scene_image {
        controller.select_scene_image(Some(SelectedImage::file(scene)?));
    }
    controller.set_scene_text(args.scene);

    match controller.generate().await {
        Outcome::Done(image) => {
            image.save(&args.output)?;
            report_image(&image, &args.output, args.data_url, json_output)?;
            Ok(())
        }
        Outcome::Failed(message) | Outcome::Rejected(message) => {
            if json_output {
                let result = serde_json::json!({
                    "type": "scene",
                    "success": false,
                    "error": message,
                    "message": message.text(locale),
                });
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            anyhow::bail!("{}", message.text(locale))
        }
        Outcome::Busy | Outcome::Superseded => {
            anyhow::bail!("generation did not complete")
        }
    }
}

fn watermark(args: WatermarkArgs, json_output: bool) -> anyhow::Result<()> {
    let mut builder = Watermarker::builder();
    if let Some(caption) = args.caption {
        builder = builder.caption(caption);
    }
    let bytes = std::fs::read(&args.input)?;
    let image = builder.build()?.apply(&bytes)?;
    image.save(&args.output)?;
    report_image(&image, &args.output, false, json_output)
}

fn report_image(
    image: &WatermarkedImage,
    output: &std::path::Path,
    data_url: bool,
    json_output: bool,
) -> anyhow::Result<()> {
    if json_output {
        let mut result = serde_json::json!({
            "type": "scene",
            "success": true,
            "output": output.display().to_string(),
            "size_bytes": image.size(),
            "width": image.width,
            "height": image.height,
        });
        if data_url {
            result["data_url"] = serde_json::Value::String(image.to_data_url());
        }
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Saved image: {} ({}x{}, {} bytes)",
            output.display(),
            image.width,
            image.height,
            image.size()
        );
        if data_url {
            println!("{}", image.to_data_url());
        }
    }
    Ok(())
}

async fn manage_key(
    command: KeyCommands,
    settings_path: Option<PathBuf>,
    json_output: bool,
) -> anyhow::Result<()> {
    let mut settings = open_settings(settings_path)?;

    match command {
        KeyCommands::Set { key, verify } => {
            if verify {
                build_client(None)?.check_api_key(&key).await?;
            }
            settings.save_api_key(&key)?;
        }
        KeyCommands::Clear => settings.clear_api_key()?,
        KeyCommands::Show => {}
    }

    let masked = settings.masked_api_key();
    if json_output {
        let result = serde_json::json!({
            "stored": masked.is_some(),
            "key": masked,
            "path": settings.path().map(|p| p.display().to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        match masked {
            Some(masked) => println!("API key: {masked}"),
            None => println!("No API key stored."),
        }
    }
    Ok(())
}
