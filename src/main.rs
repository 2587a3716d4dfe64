use clap::Parser;
use rainbow::core::config::{self, CliOverrides};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "rainbow", about = "Colorful terminal client for the Twitter stream")]
struct Args {
    /// Seconds to wait for stream data before printing a timeout marker
    #[arg(long, visible_alias = "to", value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Seconds of silence before the stream is considered dead [default: 90]
    #[arg(long, visible_alias = "ht", value_parser = clap::value_parser!(u64).range(1..))]
    heartbeat_timeout: Option<u64>,

    /// Poll the stream instead of blocking on it
    #[arg(long, visible_alias = "nb")]
    no_block: bool,

    /// Comma-separated keywords to track on the stream
    #[arg(long, visible_alias = "tt")]
    track_keywords: Option<String>,

    /// Config file (default: ~/.rainbow/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // Initialize file logger - writes to rainbow.log in current directory
    let log_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();

    if let Ok(log_file) = File::create("rainbow.log") {
        let _ = WriteLogger::init(LevelFilter::Debug, log_config, log_file);
    }

    log::info!("Rainbow starting up");

    let file_config = match config::load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("rainbow: {e}");
            return ExitCode::FAILURE;
        }
    };
    let cli = CliOverrides {
        timeout: args.timeout,
        heartbeat_timeout: args.heartbeat_timeout,
        no_block: args.no_block,
        track_keywords: args.track_keywords,
    };
    let resolved = match config::resolve(&file_config, &cli) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("rainbow: {e}");
            return ExitCode::FAILURE;
        }
    };

    match rainbow::console::run(resolved).await {
        Ok(()) => {
            log::info!("Rainbow shut down");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Startup failed: {}", e);
            eprintln!("rainbow: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_spellings_are_accepted() {
        let args =
            Args::try_parse_from(["rainbow", "--to", "5", "--ht", "30", "--nb", "--tt", "rust"])
                .unwrap();
        assert_eq!(args.timeout, Some(5));
        assert_eq!(args.heartbeat_timeout, Some(30));
        assert!(args.no_block);
        assert_eq!(args.track_keywords.as_deref(), Some("rust"));
    }

    #[test]
    fn test_zero_timeouts_are_rejected() {
        assert!(Args::try_parse_from(["rainbow", "--timeout", "0"]).is_err());
        assert!(Args::try_parse_from(["rainbow", "--heartbeat-timeout", "0"]).is_err());
        assert!(Args::try_parse_from(["rainbow", "--timeout", "1"]).is_ok());
    }

    #[test]
    fn test_defaults_leave_stream_settings_to_config() {
        let args = Args::try_parse_from(["rainbow"]).unwrap();
        assert!(args.timeout.is_none());
        assert!(args.heartbeat_timeout.is_none());
        assert!(!args.no_block);
    }
}
