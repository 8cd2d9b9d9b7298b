//! CLI binary for catalog2rows.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, renders live progress, and prints the extracted rows
//! (or the dual-source reconciliation) as JSON.

use anyhow::{Context, Result};
use catalog2rows::{
    extract_document, reconcile_with_schema, CompleteEvent, ExtractionConfig, ModelCallEvent,
    ProgressSink, RowSchema, TokenUsage,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress sink using indicatif ────────────────────────────────────────

/// Terminal progress sink: a spinner with live stage/token messages.
///
/// The pipeline doesn't announce its total call count up front (it depends
/// on the plan), so a spinner with a running token counter is more honest
/// than a percentage bar.
struct CliProgressSink {
    bar: ProgressBar,
    last_tokens: Mutex<u64>,
}

impl CliProgressSink {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            last_tokens: Mutex::new(0),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for CliProgressSink {
    fn on_log(&self, message: &str) {
        self.bar.println(format!("{} {}", cyan("◆"), message));
    }

    fn on_model_call(&self, event: &ModelCallEvent) {
        let tokens = *self.last_tokens.lock().unwrap();
        let repair = if event.repair { " (repair)" } else { "" };
        self.bar.set_message(format!(
            "{}{} call #{}  {}  {}",
            event.stage,
            repair,
            event.attempt,
            dim(&format!("{}ms", event.duration_ms)),
            dim(&format!("{tokens} tokens total")),
        ));
    }

    fn on_token_update(&self, usage: &TokenUsage) {
        *self.last_tokens.lock().unwrap() = usage.overall.total;
    }

    fn on_error(&self, message: &str) {
        self.bar.println(format!("  ✗ {message}"));
    }

    fn on_complete(&self, event: &CompleteEvent) {
        self.bar.println(format!(
            "{} {} rows extracted from {} pages",
            green("✔"),
            bold(&event.extracted_rows.to_string()),
            event.total_pages,
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic extraction (JSON rows on stdout)
  catalog2rows catalog.pdf

  # Write rows to a file
  catalog2rows catalog.pdf -o rows.json

  # Use a specific provider and model
  catalog2rows --provider gemini --model gemini-2.5-pro catalog.pdf

  # Extract from a URL
  catalog2rows https://example.com/catalog.pdf -o rows.json

  # Dual-source mode: extract twice and reconcile
  catalog2rows catalog.pdf \
      --provider gemini --model gemini-2.5-flash \
      --compare-provider openai --compare-model gpt-4.1 \
      -o reconciled.json

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY              Google Gemini API key
  OPENAI_API_KEY              OpenAI API key
  ANTHROPIC_API_KEY           Anthropic API key
  CATALOG2ROWS_LLM_PROVIDER   Override provider (gemini, openai, anthropic, ollama)
  CATALOG2ROWS_MODEL          Override model ID
  USD_TO_INR                  Exchange rate for INR cost reporting

SETUP:
  1. Install poppler (pdftoppm):  apt install poppler-utils / brew install poppler
  2. Set an API key:              export GEMINI_API_KEY=...
  3. Extract:                     catalog2rows catalog.pdf -o rows.json
"#;

/// Extract structured product rows from PDF catalogs using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "catalog2rows",
    version,
    about = "Extract structured product rows from PDF catalogs using Vision LLMs",
    long_about = "Extract structured product rows from scanned PDF catalogs (local files or \
URLs) using Vision Language Models. Pages are classified, an extraction plan is derived, and \
each planned page is extracted to a fixed row schema. Two runs against different models can be \
reconciled field-by-field.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write JSON output to this file instead of stdout.
    #[arg(short, long, env = "CATALOG2ROWS_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. gemini-2.5-flash, gemini-2.5-pro, gpt-4.1).
    #[arg(long, env = "CATALOG2ROWS_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama.
    #[arg(long, env = "CATALOG2ROWS_LLM_PROVIDER")]
    provider: Option<String>,

    /// Second model for dual-source mode; enables reconciliation.
    #[arg(long)]
    compare_model: Option<String>,

    /// Second provider for dual-source mode; enables reconciliation.
    #[arg(long)]
    compare_provider: Option<String>,

    /// Row schema: value-unit or flat-cm.
    #[arg(long, value_enum, default_value = "value-unit")]
    schema: SchemaArg,

    /// Pages per classification call.
    #[arg(long, default_value_t = 5)]
    classify_batch: usize,

    /// Pages per extraction call.
    #[arg(long, default_value_t = 1)]
    extract_batch: usize,

    /// Rasterization DPI (72-600).
    #[arg(long, default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// USD to INR exchange rate for cost reporting.
    #[arg(long, env = "USD_TO_INR", default_value_t = 90.7)]
    usd_to_inr: f64,

    /// HTTP download timeout in seconds.
    #[arg(long, default_value_t = 120)]
    download_timeout: u64,

    /// Disable the progress spinner.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors and the JSON result.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum SchemaArg {
    ValueUnit,
    FlatCm,
}

impl From<SchemaArg> for RowSchema {
    fn from(v: SchemaArg) -> Self {
        match v {
            SchemaArg::ValueUnit => RowSchema::ValueUnit,
            SchemaArg::FlatCm => RowSchema::FlatCm,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Suppress INFO-level library logs while the spinner is active; the
    // sink provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    let sink = if show_progress {
        Some(CliProgressSink::new())
    } else {
        None
    };

    let config = build_config(&cli, cli.provider.clone(), cli.model.clone(), sink.clone())?;

    let output_a = extract_document(&cli.input, &config)
        .await
        .context("Extraction failed")?;

    let dual = cli.compare_model.is_some() || cli.compare_provider.is_some();
    let json = if dual {
        let compare_config = build_config(
            &cli,
            cli.compare_provider.clone().or_else(|| cli.provider.clone()),
            cli.compare_model.clone(),
            sink.clone(),
        )?;
        let output_b = extract_document(&cli.input, &compare_config)
            .await
            .context("Comparison extraction failed")?;

        let reconciliation =
            reconcile_with_schema(&output_a.rows, &output_b.rows, cli.schema.clone().into());

        if let Some(ref s) = sink {
            s.finish();
        }
        if !cli.quiet {
            eprintln!(
                "{} {} matched / {} mismatched",
                green("✔"),
                bold(&reconciliation.matched_rows.len().to_string()),
                reconciliation.mismatched_rows.len(),
            );
        }

        serde_json::json!({
            "matched_rows": reconciliation.matched_rows,
            "mismatched_rows": reconciliation.mismatched_rows,
            "brand_name": output_a.brand_name,
            "usage_a": output_a.usage,
            "usage_b": output_b.usage,
            "stats_a": output_a.stats,
            "stats_b": output_b.stats,
        })
    } else {
        if let Some(ref s) = sink {
            s.finish();
        }
        print_usage_summary(&cli, &output_a.usage);
        serde_json::json!({
            "rows": output_a.rows,
            "brand_name": output_a.brand_name,
            "usage": output_a.usage,
            "stats": output_a.stats,
        })
    };

    let text = serde_json::to_string_pretty(&json).context("Failed to serialise output")?;

    if let Some(ref path) = cli.output {
        // Atomic write: temp file + rename, so readers never see a partial file.
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &text)
            .await
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .with_context(|| format!("Failed to move output into {}", path.display()))?;
        if !cli.quiet {
            eprintln!("→ {}", bold(&path.display().to_string()));
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(text.as_bytes())
            .context("Failed to write to stdout")?;
        handle.write_all(b"\n").ok();
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig` for one run.
fn build_config(
    cli: &Cli,
    provider: Option<String>,
    model: Option<String>,
    sink: Option<Arc<CliProgressSink>>,
) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .row_schema(cli.schema.clone().into())
        .classify_batch_size(cli.classify_batch)
        .extract_batch_size(cli.extract_batch)
        .render_dpi(cli.dpi)
        .usd_to_inr(cli.usd_to_inr)
        .download_timeout_secs(cli.download_timeout);

    if let Some(p) = provider {
        builder = builder.provider_name(p);
    }
    if let Some(m) = model {
        builder = builder.model(m);
    }
    if let Some(s) = sink {
        builder = builder.progress(s);
    }

    builder.build().context("Invalid configuration")
}

fn print_usage_summary(cli: &Cli, usage: &TokenUsage) {
    if cli.quiet {
        return;
    }
    eprintln!(
        "   {} tokens in  /  {} tokens out  /  {} thoughts",
        dim(&usage.overall.input.to_string()),
        dim(&usage.overall.output.to_string()),
        dim(&usage.overall.thoughts.to_string()),
    );
    if let Some(cost) = usage.overall.cost {
        eprintln!("   cost: ${:.4}  (₹{:.2})", cost.usd, cost.inr);
    }
}
