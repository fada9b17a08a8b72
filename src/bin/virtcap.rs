use anyhow::{bail, Context};
use std::env;
use std::path::PathBuf;
use virtcap::recording::H264Encoder;
use virtcap::{
    init_logging, CaptureSession, EncoderSettings, Remuxer, StopFlag, VirshSource, VirtcapConfig,
};

const USAGE: &str = "\
Usage: virtcap <domain> <outfile> [--connect <connection_uri>] [--config <path>] [--debug]
Takes screenshots of a running libvirt domain and combines them into a video file.
Capture runs until Ctrl+C (or SIGTERM); the output plays back at the configured rate.";

struct Args {
    domain: String,
    output: PathBuf,
    connection_uri: Option<String>,
    config_path: Option<PathBuf>,
    debug: bool,
}

fn parse_args(args: &[String]) -> Option<Args> {
    let mut domain = None;
    let mut output = None;
    let mut connection_uri = None;
    let mut config_path = None;
    let mut debug = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--connect" | "--connection" => {
                i += 1;
                connection_uri = Some(args.get(i)?.clone());
            }
            "--config" => {
                i += 1;
                config_path = Some(PathBuf::from(args.get(i)?));
            }
            "--debug" => debug = true,
            "-h" | "--help" => return None,
            arg => {
                if domain.is_none() {
                    domain = Some(arg.to_string());
                } else if output.is_none() {
                    output = Some(PathBuf::from(arg));
                } else {
                    return None;
                }
            }
        }
        i += 1;
    }

    Some(Args {
        domain: domain?,
        output: output?,
        connection_uri,
        config_path,
        debug,
    })
}

fn main() {
    let raw: Vec<String> = env::args().collect();
    let Some(args) = parse_args(&raw) else {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    };

    init_logging(args.debug);

    if let Err(e) = run(args) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let mut config = match &args.config_path {
        Some(path) => VirtcapConfig::load_from_file(path)?,
        None => VirtcapConfig::load_or_default(),
    };
    if let Some(uri) = args.connection_uri {
        config.capture.connection_uri = uri;
    }
    if let Err(reason) = config.validate_for_codec(H264Encoder::FOURCC) {
        bail!("Invalid configuration: {}", reason);
    }

    let stop = StopFlag::new();
    stop.install_ctrlc_handler()?;

    let source = VirshSource::connect(config.virsh_settings(&args.domain))
        .with_context(|| format!("Could not attach to domain {}", args.domain))?;

    println!("Starting capture. Press Ctrl+C or send SIGINT to end recording");
    let mut session = CaptureSession::new(
        source,
        |settings: &EncoderSettings| H264Encoder::new(settings),
        config.session_config(&args.domain),
        stop,
    );
    let summary = session.run().context("Capture session failed")?;
    println!(
        "Ending capture. {} frames captured. Combining into {}",
        summary.frames_captured,
        args.output.display()
    );

    let mut remuxer = Remuxer::new(config.output.remux_tool)
        .keep_intermediate(config.output.keep_intermediate);
    if let Some(program) = &config.output.remux_path {
        remuxer = remuxer.with_program(program);
    }
    remuxer.remux(&summary.container_path, &args.output)?;

    log::info!(
        "Wrote {} ({} frames, {}x{})",
        args.output.display(),
        summary.frames_written,
        summary.width,
        summary.height
    );
    Ok(())
}
