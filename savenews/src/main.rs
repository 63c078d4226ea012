use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use content_core::{
    config::ApiConfig,
    editor::EditorSurface,
    record::{ContentRecord, RecordKind},
    upload::decode_upload_url,
    ContentCodec, ContentDocument,
};
use serde_json::{json, Map, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "savenews")]
#[command(about = "Convert SaveNews rich content between editor HTML and stored blocks")]
struct Cli {
    /// API origin, overrides SAVENEWS_API_ORIGIN and the settings file
    #[arg(long, global = true)]
    origin: Option<String>,
    /// Settings file (defaults to the per-user config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Editor HTML to a JSON block array
    Decompose {
        /// Input file, stdin when omitted
        file: Option<PathBuf>,
    },
    /// JSON block array to editor HTML
    Compose {
        /// Input file, stdin when omitted
        file: Option<PathBuf>,
    },
    /// Normalize image URLs
    Normalize {
        urls: Vec<String>,
        /// Print the form stored in the content store instead
        #[arg(long)]
        storage: bool,
    },
    /// Check that HTML survives a save/load cycle unchanged
    Roundtrip {
        /// Input file, stdin when omitted
        file: Option<PathBuf>,
    },
    /// Build the submission for a record from editor HTML, tagged with its kind
    Record {
        /// news, report, calendar or community
        #[arg(long)]
        kind: RecordKind,
        #[arg(long)]
        title: String,
        /// Extra record field as key=value (repeatable)
        #[arg(long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
        /// Input file, stdin when omitted
        file: Option<PathBuf>,
    },
    /// Resolve the image URL from an upload response body
    UploadUrl {
        /// Input file, stdin when omitted
        file: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "savenews=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = load_config(cli.origin.as_deref(), cli.config.as_deref())?;
    tracing::debug!(origin = config.origin(), "using api origin");
    let codec = ContentCodec::new(&config);

    match cli.command {
        Commands::Decompose { file } => {
            let html = read_input(file.as_deref())?;
            let doc = codec.decompose(&html);
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        Commands::Compose { file } => {
            let json = read_input(file.as_deref())?;
            let doc: ContentDocument =
                serde_json::from_str(&json).context("input is not a JSON block array")?;
            println!("{}", codec.compose(&doc));
        }
        Commands::Normalize { urls, storage } => {
            for url in urls {
                if storage {
                    println!("{}", codec.storage_url(&url));
                } else {
                    println!("{}", codec.normalize_url(&url));
                }
            }
        }
        Commands::Roundtrip { file } => {
            let html = read_input(file.as_deref())?;
            let first = codec.decompose(&html);
            let second = codec.decompose(&codec.compose(&first));
            if first != second {
                eprintln!("Document changed after one save/load cycle:");
                eprintln!("  before: {}", serde_json::to_string(&first)?);
                eprintln!("  after:  {}", serde_json::to_string(&second)?);
                return Ok(ExitCode::FAILURE);
            }
            println!("stable ({} blocks)", first.len());
        }
        Commands::Record {
            kind,
            title,
            fields,
            file,
        } => {
            let html = read_input(file.as_deref())?;
            let mut editor = codec.editor();
            editor.set_html(&html);
            let record = ContentRecord::from_editor(title, parse_fields(&fields)?, &editor, &codec);
            tracing::info!(
                kind = %kind,
                blocks = record.content.len(),
                "built {} payload",
                kind.label()
            );
            println!("{}", serde_json::to_string_pretty(&submission(kind, &record))?);
        }
        Commands::UploadUrl { file } => {
            let body = read_input(file.as_deref())?;
            let url = decode_upload_url(&body)?;
            println!("{}", codec.normalize_url(&url));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn load_config(origin: Option<&str>, settings_file: Option<&Path>) -> anyhow::Result<ApiConfig> {
    Ok(ApiConfig::load_with_origin(settings_file, origin)?)
}

/// The record kind decides which screen's endpoint receives `record`.
fn submission(kind: RecordKind, record: &ContentRecord) -> Value {
    json!({ "kind": kind, "record": record })
}

fn read_input(file: Option<&Path>) -> anyhow::Result<String> {
    match file {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn parse_fields(pairs: &[String]) -> anyhow::Result<Map<String, Value>> {
    let mut fields = Map::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("field {:?} is not KEY=VALUE", pair);
        };
        let key = key.trim();
        if key.is_empty() || key == "title" || key == "content" {
            bail!("field name {:?} is reserved or empty", key);
        }
        // Numbers, booleans and JSON literals keep their type; anything else is a string.
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        fields.insert(key.to_string(), value);
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use content_core::ContentBlock;

    #[test]
    fn fields_keep_json_types() {
        let fields = parse_fields(&[
            "ticker=SNWS".to_string(),
            "pinned=true".to_string(),
            "date=2026-11-02".to_string(),
            "rank=3".to_string(),
        ])
        .unwrap();
        assert_eq!(fields.get("ticker"), Some(&json!("SNWS")));
        assert_eq!(fields.get("pinned"), Some(&json!(true)));
        assert_eq!(fields.get("date"), Some(&json!("2026-11-02")));
        assert_eq!(fields.get("rank"), Some(&json!(3)));
    }

    #[test]
    fn reserved_and_malformed_fields_are_rejected() {
        assert!(parse_fields(&["content=[]".to_string()]).is_err());
        assert!(parse_fields(&["novalue".to_string()]).is_err());
        assert!(parse_fields(&["=x".to_string()]).is_err());
    }

    #[test]
    fn origin_flag_wins() {
        let config = load_config(Some("https://flag.example.com/"), None).unwrap();
        assert_eq!(config.origin(), "https://flag.example.com");
    }

    #[test]
    fn forced_origin_keeps_settings_file_markers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api]\nbad_host_markers = [\":9000\"]\n").unwrap();
        let config = load_config(Some("https://flag.example.com"), Some(&path)).unwrap();
        assert_eq!(config.origin(), "https://flag.example.com");
        assert_eq!(config.bad_hosts().markers(), &[":9000"]);
    }

    #[test]
    fn submission_carries_the_kind() {
        let record = ContentRecord {
            title: "Investor day".into(),
            content: ContentDocument::new(vec![ContentBlock::text("Agenda")]),
            fields: Map::new(),
        };
        let value = submission(RecordKind::Calendar, &record);
        assert_eq!(value["kind"], json!("calendar"));
        assert_eq!(value["record"]["title"], json!("Investor day"));
        assert_eq!(
            value["record"]["content"],
            json!([{"type": "text", "content": "Agenda"}])
        );
    }

    #[test]
    fn cli_parses_record_command() {
        let cli = Cli::try_parse_from([
            "savenews",
            "--origin",
            "https://api.example.com",
            "record",
            "--kind",
            "calendar",
            "--title",
            "Investor day",
            "--field",
            "date=2026-11-02",
        ])
        .unwrap();
        match cli.command {
            Commands::Record { kind, title, fields, file } => {
                assert_eq!(kind, RecordKind::Calendar);
                assert_eq!(title, "Investor day");
                assert_eq!(fields, vec!["date=2026-11-02".to_string()]);
                assert!(file.is_none());
            }
            _ => panic!("expected record command"),
        }
    }
}
