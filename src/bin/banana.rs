//! banana — BananaAI command-line front-end
//!
//! Drives the same gateway an HTTP front-end would: prompt expansion,
//! image generation, uploads and stale-file cleanup.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use bananaai::storage::{OutputStore, UploadStore};
use bananaai::{AssistRequest, ClientKey, Config, Gateway, GatewayBuilder, GenerateRequest, Secrets};
use clap::{Parser, Subcommand};
use tracing::info;

/// BananaAI CLI
#[derive(Parser)]
#[command(name = "banana")]
#[command(version = bananaai::PKG_VERSION)]
#[command(about = "Prompt expansion and image generation via Gemini")]
struct Args {
    /// Config file (default: ~/.bananaai/config.toml, then /etc/bananaai/config.toml)
    #[arg(short, long, env = "BANANAAI_CONFIG")]
    config: Option<PathBuf>,

    /// Client identity used for rate limiting
    #[arg(long, default_value = "cli")]
    client: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Expand a prompt for image generation
    Assist {
        /// Prompt text (or omit to read from stdin)
        prompt: Option<String>,
        /// Aspect ratio: 9:16 or 16:9
        #[arg(short, long, default_value = "9:16")]
        aspect_ratio: String,
    },

    /// Generate an image and save it to the output directory
    Generate {
        /// Prompt text (or omit to read from stdin)
        prompt: Option<String>,
        #[arg(short, long, default_value = "9:16")]
        aspect_ratio: String,
        /// Things the image should avoid
        #[arg(short, long)]
        negative: Option<String>,
        #[arg(long, default_value_t = 7.5)]
        guidance_scale: f32,
        #[arg(long, default_value_t = 20)]
        steps: u32,
        /// Uploaded file names to use as references (repeatable)
        #[arg(short, long = "reference")]
        references: Vec<String>,
    },

    /// Validate and store an image in the upload directory
    Upload {
        /// Image file to upload
        file: PathBuf,
    },

    /// Delete uploads and outputs older than the configured age
    Cleanup {
        /// Override the configured age in hours
        #[arg(long)]
        hours: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: info; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let mut config = Config::load_or_default(args.config.as_deref())?;
    config.apply_env()?;
    config.validate()?;
    info!(version = %bananaai::version_string(), "banana starting");

    let client = ClientKey::new(args.client);

    match args.command {
        Command::Cleanup { hours } => {
            let age = match hours {
                Some(h) => std::time::Duration::from_secs(h.saturating_mul(3600)),
                None => config.storage.cleanup_age(),
            };
            let uploads = UploadStore::new(&config.storage.upload_dir, config.storage.max_upload_bytes())
                .cleanup(age)
                .await?;
            let outputs = OutputStore::new(&config.storage.output_dir)
                .cleanup(age)
                .await?;
            println!("removed {uploads} uploads, {outputs} outputs");
        }

        Command::Upload { file } => {
            let data = tokio::fs::read(&file).await?;
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let gateway = build_gateway(&config)?;
            let stored = gateway.upload(&client, &name, &data).await?;
            println!("filename: {}", stored.filename);
            println!("url:      {}", stored.url);
        }

        Command::Assist {
            prompt,
            aspect_ratio,
        } => {
            let prompt = resolve_text(prompt, "assist")?;
            let gateway = build_gateway(&config)?;
            let response = gateway
                .assist(&client, AssistRequest::new(prompt).aspect_ratio(aspect_ratio))
                .await?;
            if response.truncated {
                eprintln!("note: expansion hit the output limit and may be incomplete");
            }
            println!("{}", response.expanded);
        }

        Command::Generate {
            prompt,
            aspect_ratio,
            negative,
            guidance_scale,
            steps,
            references,
        } => {
            let prompt = resolve_text(prompt, "generate")?;
            let gateway = build_gateway(&config)?;
            let mut request = GenerateRequest::new(prompt.clone())
                .aspect_ratio(aspect_ratio)
                .guidance_scale(guidance_scale)
                .num_inference_steps(steps);
            if let Some(negative) = negative {
                request = request.negative_prompt(negative);
            }
            for reference in references {
                request = request.reference_image(reference);
            }

            let response = gateway.generate(&client, request).await?;
            let image = &response.image;
            let saved = OutputStore::new(&config.storage.output_dir)
                .save(&prompt, image)
                .await?;
            println!("file:     {}", saved.path.display());
            println!("model:    {}", image.model);
            println!("size:     {}x{}", image.width, image.height);
            println!("seed:     {}", image.seed);
            println!("elapsed:  {:.2}s", image.elapsed.as_secs_f64());
            if image.degraded {
                println!("degraded: provider returned no image; placeholder saved");
            }
        }
    }

    Ok(())
}

fn build_gateway(config: &Config) -> bananaai::Result<Gateway> {
    let api_key = Secrets::load()?.require_api_key()?;
    GatewayBuilder::from_config(config, api_key)?.build()
}

/// Resolve text input from an optional CLI argument and/or stdin.
///
/// - arg only → arg
/// - stdin only → stdin
/// - both → `"{arg}\n\n{stdin}"`
/// - neither → error
fn resolve_text(arg: Option<String>, command: &str) -> Result<String, Box<dyn std::error::Error>> {
    let stdin_is_pipe = !io::stdin().is_terminal();
    let stdin_text = if stdin_is_pipe {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    } else {
        None
    };

    match (arg, stdin_text) {
        (Some(a), Some(s)) => Ok(format!("{a}\n\n{s}")),
        (Some(a), None) => Ok(a),
        (None, Some(s)) => Ok(s),
        (None, None) => {
            Err(format!("{command}: no input provided (pass text as argument or via stdin)").into())
        }
    }
}
