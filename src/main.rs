use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Arg, Command};
use log::LevelFilter;
use std::collections::HashMap;
use std::process;
use subsweep::{MessageContext, ScanConfig, UnsubscribeProcessor};

fn main() {
    let matches = Command::new("subsweep")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Scans emails for unsubscribe methods and judges their safety")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path (YAML; defaults are built in)"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Write the default configuration to a file and exit")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Check configuration validity and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("analyze")
                .long("analyze")
                .value_name("FILE")
                .help("Analyze a raw email file for unsubscribe methods")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print analysis results as JSON")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Err(e) = run(&matches) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(matches: &clap::ArgMatches) -> Result<()> {
    if let Some(path) = matches.get_one::<String>("generate-config") {
        ScanConfig::default()
            .to_file(path)
            .with_context(|| format!("could not write configuration to {path}"))?;
        println!("Default configuration written to: {path}");
        return Ok(());
    }

    let config = match matches.get_one::<String>("config") {
        Some(path) => ScanConfig::from_file(path)
            .with_context(|| format!("could not load configuration from {path}"))?,
        None => ScanConfig::default(),
    };

    if matches.get_flag("test-config") {
        println!("Configuration is valid");
        println!("  unsubscribe keywords: {}", config.unsubscribe_keywords.len());
        println!("  suspicious tokens:    {}", config.suspicious_url_tokens.len());
        println!("  shortener hosts:      {}", config.shortener_hosts.len());
        return Ok(());
    }

    if let Some(path) = matches.get_one::<String>("analyze") {
        return analyze_file(path, &config, matches.get_flag("json"));
    }

    anyhow::bail!("nothing to do; try --analyze FILE or --help");
}

fn analyze_file(path: &str, config: &ScanConfig, as_json: bool) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("could not read email file {path}"))?;
    let message = parse_email_file(&raw);

    let processor = UnsubscribeProcessor::new(config);
    let analysis = processor.analyze(&message);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    println!("Analyzing: {path}");
    println!("Found {} unsubscribe method(s)", analysis.methods.len());
    for method in &analysis.methods {
        let verdict = if method.safety.is_safe() {
            "safe".to_string()
        } else {
            format!("unsafe: {}", method.safety.warnings().join("; "))
        };
        println!(
            "  - {} [{}] ({verdict})",
            method.descriptor.method_name(),
            method.descriptor.target().unwrap_or("-"),
        );
    }
    match &analysis.primary {
        Some(primary) => {
            println!("Primary method: {}", primary.descriptor.method_name());
            if !primary.descriptor.is_auto_actionable() {
                println!("  (requires manual intervention)");
            }
        }
        None => println!("No safe unsubscribe method found"),
    }
    Ok(())
}

/// Raw email file: header lines up to the first blank line, then the
/// body. Continuation lines (leading whitespace) are unfolded into the
/// previous header. The body counts as HTML when the Content-Type says
/// so or when it visibly starts with a tag.
fn parse_email_file(raw: &str) -> MessageContext {
    let mut headers: HashMap<String, String> = HashMap::new();
    let mut last_header: Option<String> = None;
    let mut lines = raw.lines();

    for line in lines.by_ref() {
        if line.trim().is_empty() {
            break;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(name) = &last_header {
                if let Some(value) = headers.get_mut(name) {
                    value.push(' ');
                    value.push_str(line.trim());
                }
            }
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_string();
            headers.insert(name.clone(), value.trim().to_string());
            last_header = Some(name);
        }
    }

    let body: String = lines.collect::<Vec<_>>().join("\n");
    let body = body.trim().to_string();

    let is_html = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        .map(|(_, v)| v.to_lowercase().contains("text/html"))
        .unwrap_or(false)
        || body.starts_with('<');

    let sent_at = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("date"))
        .and_then(|(_, v)| DateTime::parse_from_rfc2822(v).ok())
        .map(|dt| dt.with_timezone(&Utc));

    MessageContext {
        headers,
        html_body: if is_html && !body.is_empty() {
            Some(body.clone())
        } else {
            None
        },
        text_body: if !is_html && !body.is_empty() {
            Some(body)
        } else {
            None
        },
        sent_at,
    }
}
