use clap::{Parser, Subcommand};
use recontext::{
    logger::{self, LogLevel, LoggerConfig},
    parse_seed, GenerationRequest, PersonGeneration, RecontextClient, RecontextConfig,
    SubjectImage,
};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "imagen-recontext", version, about = "Place a subject into a new scene with Imagen")]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate images from 1-3 subject pictures
    Generate(GenerateArgs),
    /// List known models
    Models,
    /// Serve the HTTP API
    #[cfg(feature = "server")]
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

#[derive(clap::Args)]
struct GenerateArgs {
    /// Subject images, in the order they should be sent
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// What to keep from the images, e.g. "a man in a blue business suit"
    #[arg(long)]
    subject: String,

    /// The new scene, e.g. "standing on a busy street in Tokyo at night"
    #[arg(long)]
    prompt: String,

    #[arg(long)]
    project: Option<String>,

    #[arg(long)]
    region: Option<String>,

    #[arg(long, default_value_t = 1)]
    samples: u8,

    #[arg(long, default_value_t = 32)]
    steps: u8,

    /// Send the prompt verbatim instead of letting the service rewrite it
    #[arg(long)]
    no_enhance: bool,

    #[arg(long, default_value = "allow_adult")]
    person_generation: PersonGeneration,

    /// Digits only; anything else is ignored
    #[arg(long, default_value = "")]
    seed: String,

    #[arg(long, short, default_value = ".")]
    out_dir: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenv::dotenv();
    let cli = Cli::parse();

    let logger_config = LoggerConfig::new()
        .with_level(LogLevel::from_name(&cli.log_level))
        .with_json_output(cli.json_logs);
    if let Err(e) = logger::init_with_config(logger_config) {
        eprintln!("{}", e);
    }
    logger::log_startup_info(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let config = RecontextConfig::from_env();
    match cli.command {
        Command::Generate(args) => generate(config, args).await,
        Command::Models => {
            for model in RecontextClient::supported_models() {
                println!(
                    "{}  {} (up to {} subject images)",
                    model.id, model.name, model.max_subject_images
                );
            }
            ExitCode::SUCCESS
        }
        #[cfg(feature = "server")]
        Command::Serve { port } => {
            let config = match port {
                Some(port) => config.with_port(port),
                None => config,
            };
            match recontext::server::run(config).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    log::error!("❌ Server stopped: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

async fn generate(mut config: RecontextConfig, args: GenerateArgs) -> ExitCode {
    if let Some(project) = args.project {
        config = config.with_project(project);
    }
    if let Some(region) = args.region {
        config = config.with_region(region);
    }
    logger::log_config_info(&config);

    let mut images = Vec::with_capacity(args.images.len());
    for path in &args.images {
        match fs::read(path) {
            Ok(bytes) => {
                let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
                let mut image = SubjectImage::new(bytes);
                if let Some(name) = name {
                    image = image.with_file_name(name);
                }
                images.push(image);
            }
            Err(e) => {
                log::error!("❌ Failed to read {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        }
    }

    let request = GenerationRequest::new(args.subject, args.prompt)
        .with_images(images)
        .with_sample_count(args.samples)
        .with_base_steps(args.steps)
        .with_enhance_prompt(!args.no_enhance)
        .with_person_generation(args.person_generation)
        .with_seed(parse_seed(&args.seed));

    let client = match RecontextClient::with_default_credentials(config) {
        Ok(client) => client,
        Err(e) => {
            log::error!("❌ Failed to create client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let submission = client.submit(request).await;
    println!("{}", submission.user_message());
    if !submission.is_done() {
        return ExitCode::FAILURE;
    }

    if let Err(e) = fs::create_dir_all(&args.out_dir) {
        log::error!("❌ Failed to create {}: {}", args.out_dir.display(), e);
        return ExitCode::FAILURE;
    }
    for (i, image) in submission.images().iter().enumerate() {
        let path = args
            .out_dir
            .join(format!("result-{}.{}", i + 1, image.extension()));
        match fs::write(&path, &image.bytes) {
            Ok(()) => log::info!("💾 Image saved to: {}", path.display()),
            Err(e) => {
                log::error!("❌ Failed to save image: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
