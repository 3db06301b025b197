use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use tidvakt_config::TidvaktConfig;
use tidvakt_core::{parse_duration, VirtualClock};
use tidvakt_replay::{shift_har_log, TimestampVirtualizer};

#[derive(Parser)]
#[command(name = "tidvakt", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Shift timestamps in a saved body (or a whole HAR file) by a virtual advance
    Shift(ShiftArgs),
    /// Print the milliseconds a duration expression stands for
    Duration(DurationArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ShiftArgs {
    /// Response body, or HAR document with --har
    #[arg(short, long)]
    pub body: PathBuf,
    /// Instant the body was captured (ISO-8601); ignored with --har
    #[arg(long, required_unless_present = "har")]
    pub captured_at: Option<String>,
    /// Virtual time to let pass before replaying, e.g. "1 hour"
    #[arg(short, long, default_value = "0ms")]
    pub advance: String,
    /// Instant to install the clock at; defaults to --captured-at, or to the
    /// first entry's capture time with --har
    #[arg(long)]
    pub install_at: Option<String>,
    /// Keys never rewritten; replaces the configured list when given
    #[arg(short = 'x', long = "exclude")]
    pub exclude: Vec<String>,
    /// Treat the input as a HAR document and rewrite every entry
    #[arg(long, default_value_t = false)]
    pub har: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DurationArgs {
    /// e.g. "500ms", "30 minutes", "2d"
    pub expression: String,
}

pub async fn run_shift(args: ShiftArgs, mut config: TidvaktConfig) -> anyhow::Result<()> {
    if !args.exclude.is_empty() {
        config.timestamps.exclude_keys = args.exclude.clone();
    }

    let text = std::fs::read_to_string(&args.body)
        .with_context(|| format!("reading {}", args.body.display()))?;

    let base = install_base(&args, &text)?;

    let clock = VirtualClock::new(config.clock.clone());
    clock.install(base.as_str())?;
    clock.advance(args.advance.as_str()).await?;
    info!(now = %clock.now()?, "Virtual clock ready");

    let virtualizer = TimestampVirtualizer::new(clock.clone(), &config.timestamps);
    info!(
        enabled = virtualizer.is_enabled(),
        excluded = ?virtualizer.exclusions().keys(),
        "Timestamp virtualizer ready"
    );
    let output = if args.har {
        let mut har: serde_json::Value =
            serde_json::from_str(&text).context("parsing HAR document")?;
        let changed = shift_har_log(&virtualizer, &mut har)?;
        info!(changed, "HAR entries rewritten");
        serde_json::to_string_pretty(&har)?
    } else {
        let captured_at = args
            .captured_at
            .as_deref()
            .context("--captured-at is required without --har")?;
        virtualizer.rewrite(&text, captured_at).into_owned()
    };

    clock.uninstall();
    println!("{output}");
    Ok(())
}

pub fn run_duration(args: DurationArgs) -> anyhow::Result<()> {
    let ms = parse_duration(args.expression.as_str())?;
    println!("{ms}");
    Ok(())
}

fn install_base(args: &ShiftArgs, text: &str) -> anyhow::Result<String> {
    match (&args.install_at, &args.captured_at) {
        (Some(at), _) => Ok(at.clone()),
        (None, Some(at)) if !args.har => Ok(at.clone()),
        _ => first_har_capture(text),
    }
}

/// Capture time of the first entry, used as the install point for HAR input.
fn first_har_capture(text: &str) -> anyhow::Result<String> {
    let har: serde_json::Value = serde_json::from_str(text).context("parsing HAR document")?;
    har.pointer("/log/entries/0/startedDateTime")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
        .context("HAR document has no entries to take a capture time from")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_args_parse() {
        let cli = Cli::try_parse_from([
            "tidvakt",
            "shift",
            "--body",
            "resp.json",
            "--captured-at",
            "2024-01-01T00:00:00Z",
            "--advance",
            "1 hour",
            "-x",
            "birthDate",
            "-x",
            "issuedOn",
        ])
        .unwrap();
        let Commands::Shift(args) = cli.command else {
            panic!("expected shift");
        };
        assert_eq!(args.advance, "1 hour");
        assert_eq!(args.exclude, vec!["birthDate", "issuedOn"]);
        assert!(!args.har);
    }

    #[test]
    fn captured_at_required_without_har() {
        assert!(Cli::try_parse_from(["tidvakt", "shift", "--body", "a.json"]).is_err());
        assert!(Cli::try_parse_from(["tidvakt", "shift", "--body", "a.har", "--har"]).is_ok());
    }

    #[test]
    fn first_capture_is_read_from_har() {
        let har = r#"{"log":{"entries":[{"startedDateTime":"2024-01-01T00:00:00Z"}]}}"#;
        assert_eq!(first_har_capture(har).unwrap(), "2024-01-01T00:00:00Z");
        assert!(first_har_capture(r#"{"log":{"entries":[]}}"#).is_err());
    }

    #[test]
    fn har_input_installs_at_its_first_capture() {
        let har = r#"{"log":{"entries":[{"startedDateTime":"2024-01-01T00:00:00Z"}]}}"#;
        let mut args = ShiftArgs {
            body: PathBuf::from("a.har"),
            captured_at: Some("2030-01-01T00:00:00Z".into()),
            advance: "0ms".into(),
            install_at: None,
            exclude: vec![],
            har: true,
        };
        assert_eq!(install_base(&args, har).unwrap(), "2024-01-01T00:00:00Z");

        args.install_at = Some("2024-06-01T00:00:00Z".into());
        assert_eq!(install_base(&args, har).unwrap(), "2024-06-01T00:00:00Z");

        args.install_at = None;
        args.har = false;
        assert_eq!(install_base(&args, "not json").unwrap(), "2030-01-01T00:00:00Z");
    }

    #[test]
    fn duration_rejects_garbage() {
        let err = run_duration(DurationArgs {
            expression: "5 fortnights".into(),
        })
        .unwrap_err();
        assert!(err.to_string().contains("fortnights"));
    }
}
