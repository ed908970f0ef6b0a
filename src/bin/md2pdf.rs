//! CLI binary for md2pdf-client.
//!
//! A thin shim over the library crate that maps CLI flags onto the form,
//! drives one conversion through the lifecycle controller, and prints or
//! downloads the result.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use md2pdf_client::{
    download_to_file, ClientConfig, Controller, ConvertAction, HttpTransport, Inputs, Language,
    Md2PdfError,
};
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a file and print the download URL
  md2pdf notes.md

  # Convert and save the PDF locally
  md2pdf notes.md -o notes.pdf

  # Convert text from stdin with the academic preset
  cat paper.md | md2pdf - --preset academic -o paper.pdf

  # Chinese document with a custom CJK font
  md2pdf --language zh --cjk-mainfont "Noto Serif CJK SC" chapter.md -o chapter.pdf

  # Try the service with the built-in sample document
  md2pdf --sample -o sample.pdf

  # Show available presets
  md2pdf --list-presets

INPUT RULES:
  Files must end in .md, .txt or .markdown and be at most 16 MB.
  When both a file and --text are given, the file is converted.

CANCELLING:
  Press Ctrl-C while a conversion is running. The server is told to stop
  (best effort, 2 s timeout) and the command exits with status 130.

ENVIRONMENT VARIABLES:
  MD2PDF_SERVER           Base URL of the conversion service
  MD2PDF_PRESET           Preset applied before other config flags
  MD2PDF_TIMEOUT          Conversion request timeout in seconds
  RUST_LOG                Overrides the log filter (e.g. md2pdf_client=debug)
"#;

/// Convert Markdown to PDF with a remote conversion service.
#[derive(Parser, Debug)]
#[command(
    name = "md2pdf",
    version,
    about = "Convert Markdown to PDF with a remote conversion service",
    long_about = "Submit a Markdown file or text to a pandoc-based conversion service, wait for \
the PDF, and print its download URL or save it locally. Configuration presets are fetched \
from the service; individual flags override them.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown file to convert, or `-` to read text from stdin.
    input: Option<PathBuf>,

    /// Markdown text to convert (used when no file is given).
    #[arg(long, conflicts_with = "sample")]
    text: Option<String>,

    /// Convert the built-in sample document.
    #[arg(long)]
    sample: bool,

    /// Save the PDF to this path instead of printing the download URL.
    #[arg(short, long, env = "MD2PDF_OUTPUT")]
    output: Option<PathBuf>,

    /// Base URL of the conversion service.
    #[arg(long, env = "MD2PDF_SERVER", default_value = "http://127.0.0.1:1204")]
    server: String,

    /// Apply a preset (see --list-presets) before the flags below.
    #[arg(long, env = "MD2PDF_PRESET")]
    preset: Option<String>,

    /// List presets offered by the service and exit.
    #[arg(long)]
    list_presets: bool,

    /// PDF engine (e.g. xelatex, lualatex, pdflatex).
    #[arg(long)]
    pdf_engine: Option<String>,

    /// LaTeX document class (e.g. article, report, book).
    #[arg(long)]
    document_class: Option<String>,

    /// Page geometry (e.g. "a4paper,margin=2cm").
    #[arg(long)]
    geometry: Option<String>,

    /// Base font size (e.g. 11pt).
    #[arg(long)]
    fontsize: Option<String>,

    /// Main font family.
    #[arg(long)]
    mainfont: Option<String>,

    /// Line spacing factor (e.g. 1.25).
    #[arg(long)]
    linestretch: Option<String>,

    /// Disable coloured hyperlinks.
    #[arg(long)]
    no_colorlinks: bool,

    /// Number section headings.
    #[arg(long)]
    number_sections: bool,

    /// Include a table of contents.
    #[arg(long)]
    toc: bool,

    /// East Asian language: zh, ja or ko.
    #[arg(long, value_enum)]
    language: Option<LanguageArg>,

    /// CJK main font override.
    #[arg(long)]
    cjk_mainfont: Option<String>,

    /// CJK sans-serif font override.
    #[arg(long)]
    cjk_sansfont: Option<String>,

    /// CJK monospace font override.
    #[arg(long)]
    cjk_monofont: Option<String>,

    /// Conversion request timeout in seconds.
    #[arg(long, env = "MD2PDF_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Timeout for the cancel notice in milliseconds.
    #[arg(long, env = "MD2PDF_CANCEL_TIMEOUT_MS", default_value_t = 2000)]
    cancel_timeout_ms: u64,

    /// Print the final state as JSON.
    #[arg(long)]
    json: bool,

    /// Disable the spinner.
    #[arg(long, env = "MD2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MD2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LanguageArg {
    Zh,
    Ja,
    Ko,
}

impl From<LanguageArg> for Language {
    fn from(v: LanguageArg) -> Self {
        match v {
            LanguageArg::Zh => Language::Chinese,
            LanguageArg::Ja => Language::Japanese,
            LanguageArg::Ko => Language::Korean,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; keep INFO logs from
    // tearing through it unless the user asked for them.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.list_presets;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Client ───────────────────────────────────────────────────────────
    let client_config = ClientConfig::builder()
        .base_url(&cli.server)
        .request_timeout_secs(cli.timeout)
        .cancel_timeout_ms(cli.cancel_timeout_ms)
        .build()
        .context("Invalid client configuration")?;
    let transport = HttpTransport::new(client_config).context("Failed to create HTTP client")?;
    let mut controller = Controller::new(transport);

    // ── Presets ──────────────────────────────────────────────────────────
    if cli.list_presets || cli.preset.is_some() {
        controller.load_presets().await;
    }

    if cli.list_presets {
        if controller.presets().is_empty() {
            eprintln!("{} no presets available from {}", cyan("⚠"), cli.server);
            return Ok(());
        }
        for (id, preset) in controller.presets().list() {
            let language = preset.language();
            println!(
                "{:<12} {:<22} {} {} {}{}",
                bold(id),
                preset.name,
                dim(&preset.document_class),
                dim(&preset.geometry),
                dim(&preset.fontsize),
                if language.is_none() {
                    String::new()
                } else {
                    format!("  [{}]", language)
                }
            );
        }
        return Ok(());
    }

    if let Some(ref id) = cli.preset {
        if !controller.apply_preset(id) {
            anyhow::bail!("Unknown preset '{id}' (run with --list-presets to see options)");
        }
    }
    apply_overrides(&cli, &mut controller);

    // ── Inputs ───────────────────────────────────────────────────────────
    match cli.input.as_deref() {
        Some(path) if path.as_os_str() == "-" => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read Markdown from stdin")?;
            controller.set_text(text);
        }
        Some(path) => {
            controller
                .select_path(path)
                .await
                .with_context(|| format!("Cannot use {}", path.display()))?;
        }
        None => {}
    }
    if let Some(ref text) = cli.text {
        controller.set_text(text.clone());
    } else if cli.sample {
        controller.inputs_mut().load_sample();
    }

    // ── Run conversion ───────────────────────────────────────────────────
    // Validation errors return before any spinner is drawn.
    let action = controller.convert().map_err(anyhow::Error::from)?;
    let spinner = spinner_label(&action, controller.inputs())
        .filter(|_| show_progress)
        .map(start_spinner);

    let interrupted = tokio::select! {
        _ = controller.wait_settled() => false,
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        if let Some(ref bar) = spinner {
            bar.set_prefix("Cancelling");
        }
        controller.cancel().await;
    }
    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&controller.view()).context("Failed to serialise state")?
        );
    }

    // ── Report ───────────────────────────────────────────────────────────
    match controller.result() {
        Ok(download_url) => {
            let download_url = download_url.to_string();
            if let Some(ref output) = cli.output {
                let bytes = download_to_file(controller.transport(), &download_url, output)
                    .await
                    .context("Download failed")?;
                if !cli.quiet {
                    eprintln!(
                        "{}  {}  {}",
                        green("✔"),
                        bold(&output.display().to_string()),
                        dim(&format!("{bytes} bytes")),
                    );
                }
            } else if !cli.json {
                println!("{}", controller.transport().config().url(&download_url));
            }
            Ok(())
        }
        Err(Md2PdfError::Cancelled) => {
            if !cli.quiet {
                eprintln!("{} Conversion cancelled by user.", cyan("◆"));
            }
            std::process::exit(130);
        }
        Err(e) => {
            if !cli.quiet && !cli.json {
                eprintln!("{} {}", red("✘"), e);
            }
            Err(e).context("Conversion failed")
        }
    }
}

fn spinner_label(action: &ConvertAction, inputs: &Inputs) -> Option<String> {
    let ConvertAction::Started { request_id } = action else {
        return None;
    };
    Some(inputs.file().map_or_else(
        || format!("text ({request_id})"),
        |f| format!("{} ({request_id})", f.name()),
    ))
}

fn start_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_prefix("Converting");
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Copy explicitly-given flags onto the form, after any preset.
fn apply_overrides(cli: &Cli, controller: &mut Controller<HttpTransport>) {
    let form = controller.form_mut();
    let set = |field: &mut String, value: &Option<String>| {
        if let Some(v) = value {
            *field = v.clone();
        }
    };
    set(&mut form.pdf_engine, &cli.pdf_engine);
    set(&mut form.document_class, &cli.document_class);
    set(&mut form.geometry, &cli.geometry);
    set(&mut form.fontsize, &cli.fontsize);
    set(&mut form.mainfont, &cli.mainfont);
    set(&mut form.linestretch, &cli.linestretch);
    set(&mut form.cjk_mainfont, &cli.cjk_mainfont);
    set(&mut form.cjk_sansfont, &cli.cjk_sansfont);
    set(&mut form.cjk_monofont, &cli.cjk_monofont);

    if cli.no_colorlinks {
        form.colorlinks = false;
    }
    if cli.number_sections {
        form.number_sections = true;
    }
    if cli.toc {
        form.toc = true;
    }
    if let Some(lang) = cli.language {
        form.set_language(lang.into(), true);
    }
}
