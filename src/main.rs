mod cli;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

use cf_av::ToolRegistry;
use cf_core::config::Config;
use cf_core::ConversionRequest;
use cf_server::context::AppContext;
use cf_server::convert::{AUDIO_FILENAME, GIF_FILENAME};

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = Config::load_or_default(config_path);

    // CLI flags win over the file.
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting clipforge server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    cf_server::start(config).await?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "clipforge=trace,cf_server=trace,cf_av=trace,cf_core=debug,tower_http=debug".to_string()
        } else {
            "clipforge=info,cf_server=info,cf_av=info,cf_core=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Clip {
            url,
            start,
            duration,
            quality,
            audio,
            output,
        } => {
            let request = ConversionRequest::from_lenient(
                Some(&url),
                start.map(serde_json::Value::String).as_ref(),
                duration.map(serde_json::Value::String).as_ref(),
                quality.as_deref(),
            )?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_clip(request, audio, output, cli.config.as_deref()))
        }
        Commands::CheckTools { json } => check_tools(cli.config.as_deref(), json),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("clipforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run_clip(
    request: ConversionRequest,
    audio: bool,
    output: Option<PathBuf>,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = Config::load_or_default(config_path);
    let ctx = AppContext::from_config(config)?;

    let (result, default_name) = if audio {
        (
            ctx.converter.extract_audio(&request.source_url).await,
            AUDIO_FILENAME,
        )
    } else {
        (ctx.converter.convert(&request).await, GIF_FILENAME)
    };

    let dest = output.unwrap_or_else(|| PathBuf::from(default_name));
    let written = result?.write_to(&dest).await?;

    println!("Wrote {} ({} bytes)", dest.display(), written);
    Ok(())
}

fn check_tools(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = Config::load_or_default(config_path);
    let tools = ToolRegistry::discover(&config.tools).check_all();

    if json {
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }

    println!("Checking external tools...\n");
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("ffmpeg is missing. Install it to enable conversions.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = Config::load(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!(
        "  Scratch dir: {}",
        config.conversion.scratch_dir.display()
    );
    println!(
        "  Resolver: {}",
        config.resolver.endpoint.as_deref().unwrap_or("(not configured)")
    );
    println!(
        "  History: {}",
        match (config.history.enabled, &config.history.path) {
            (false, _) => "disabled".to_string(),
            (true, Some(p)) => p.display().to_string(),
            (true, None) => "in memory".to_string(),
        }
    );

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &warnings {
            println!("  - {warning}");
        }
    }

    Ok(())
}
