use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use voxedge_core::synth::default_output_dir;
use voxedge_core::{
    EdgeTts, Settings, SettingsManager, SpeechService, SynthesisJob, SynthesisRequest,
    VoiceCatalog,
};

mod mcp;
mod server;

#[derive(Parser, Debug)]
#[command(name = "voxedge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "VoxEdge - Edge neural voices from the command line")]
struct Args {
    /// Settings file to use instead of ~/.voxedge/settings.toml
    #[arg(long, global = true, value_name = "PATH")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the available voices, highest priority first
    Voices {
        /// Print the full catalog as JSON
        #[arg(long)]
        json: bool,
    },

    /// Synthesize text to an MP3 file and print its path
    Speak {
        /// Voice display key, e.g. "en-US-JennyNeural - Female". Defaults to
        /// the first voice of the catalog.
        #[arg(long)]
        voice: Option<String>,

        /// Text to speak. Read from stdin when omitted.
        #[arg(long)]
        text: Option<String>,

        /// Speaking rate change in percent
        #[arg(
            long,
            default_value_t = 0,
            allow_negative_numbers = true,
            value_parser = clap::value_parser!(i32).range(-50..=50)
        )]
        rate: i32,

        /// Pitch change in Hz
        #[arg(
            long,
            default_value_t = 0,
            allow_negative_numbers = true,
            value_parser = clap::value_parser!(i32).range(-20..=20)
        )]
        pitch: i32,
    },

    /// Serve the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },

    /// Serve the catalog and synthesis as MCP tools over stdio
    Mcp,

    /// Show the settings file, or update it with the given values
    Settings(SettingsChanges),
}

#[derive(clap::Args, Debug, Default)]
struct SettingsChanges {
    /// Directory generated MP3 files are written to
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Attempts made when the speech service cannot be reached
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_attempts: Option<u32>,

    /// Address the HTTP API binds to
    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Synthesis jobs the HTTP API runs at the same time
    #[arg(long)]
    concurrency_limit: Option<usize>,
}

impl SettingsChanges {
    fn is_empty(&self) -> bool {
        self.output_dir.is_none()
            && self.max_attempts.is_none()
            && self.host.is_none()
            && self.port.is_none()
            && self.concurrency_limit.is_none()
    }

    fn apply(self, settings: &mut Settings) {
        if let Some(output_dir) = self.output_dir {
            settings.synthesis.output_dir = Some(output_dir);
        }
        if let Some(max_attempts) = self.max_attempts {
            settings.retry.max_attempts = max_attempts;
        }
        if let Some(host) = self.host {
            settings.server.host = host;
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(concurrency_limit) = self.concurrency_limit {
            settings.server.concurrency_limit = concurrency_limit.max(1);
        }
    }
}

fn main() -> Result<()> {
    setup_tracing()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let args = Args::parse();

    let settings_manager = match args.settings {
        Some(path) => SettingsManager::from_path(path)?,
        None => SettingsManager::new()?,
    };
    let mut settings = settings_manager.settings();
    info!(settings = ?settings_manager.path(), "CLI startup: {:?}", args.command);

    let command = match args.command {
        Command::Settings(changes) => {
            if !changes.is_empty() {
                changes.apply(&mut settings);
                settings_manager.save_settings(settings.clone())?;
                info!(path = ?settings_manager.path(), "Settings saved");
            }
            println!("# {}", settings_manager.path().display());
            print!("{}", toml::to_string_pretty(&settings)?);
            return Ok(());
        }
        command => command,
    };

    let app = App::new(&settings)?;

    match command {
        Command::Voices { json } => app.print_voices(json).await,
        Command::Speak {
            voice,
            text,
            rate,
            pitch,
        } => app.speak(voice, text, rate, pitch).await,
        Command::Serve { host, port } => {
            let host = host.unwrap_or(settings.server.host.clone());
            let port = port.unwrap_or(settings.server.port);
            let audio_dir = settings
                .synthesis
                .output_dir
                .clone()
                .unwrap_or_else(default_output_dir);
            let state = server::AppState::new(
                app.catalog,
                app.job,
                settings.server.concurrency_limit,
                audio_dir,
            );
            server::serve(state, &host, port).await
        }
        Command::Mcp => mcp::serve_stdio(mcp::VoxEdgeMcp::new(app.catalog, app.job)).await,
        Command::Settings(_) => Ok(()),
    }
}

struct App {
    catalog: VoiceCatalog,
    job: SynthesisJob,
}

impl App {
    fn new(settings: &Settings) -> Result<Self> {
        let service: Arc<dyn SpeechService> = Arc::new(EdgeTts::new(settings.service.clone())?);
        let config = Arc::new(settings.speech_config());

        Ok(Self {
            catalog: VoiceCatalog::new(service.clone(), config.clone()),
            job: SynthesisJob::new(service, config),
        })
    }

    async fn print_voices(&self, json: bool) -> Result<()> {
        let catalog = self.catalog.fetch_voices().await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&catalog)?);
        } else {
            for key in catalog.keys() {
                println!("{key}");
            }
        }
        Ok(())
    }

    async fn speak(
        &self,
        voice: Option<String>,
        text: Option<String>,
        rate: i32,
        pitch: i32,
    ) -> Result<()> {
        let text = match text {
            Some(text) => text,
            None => {
                let mut buffer = String::new();
                std::io::stdin().read_to_string(&mut buffer)?;
                buffer
            }
        };

        let voice = match voice {
            Some(voice) => voice,
            None => self
                .catalog
                .fetch_voices()
                .await?
                .keys()
                .next()
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("The speech service offers no voices"))?,
        };

        let request = SynthesisRequest::new(text, voice)
            .with_rate(rate)
            .with_pitch(pitch);
        let path = self.job.run(&request).await?;
        println!("{path}");
        Ok(())
    }
}

fn setup_tracing() -> Result<()> {
    use std::fs;
    use tracing_subscriber::fmt;

    // Create trace directory in user's home
    let home = dirs::home_dir().unwrap_or_else(std::env::temp_dir);
    let trace_dir = home.join(".voxedge").join("trace");
    fs::create_dir_all(&trace_dir)?;

    let log_file = trace_dir.join("voxedge.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(filter)
        .init();

    info!("Tracing initialized to {:?}", log_file);
    Ok(())
}
