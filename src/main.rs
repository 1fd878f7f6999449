//! `htmlscrub` 命令行入口

use std::fs;
use std::io::{self, Read, Write};
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use htmlscrub::core::{print_error_message, print_info_message, ContentMode, SanitizeOptions, Sanitizer};
use htmlscrub::env::{generate_env_docs, EnvConfig};
use htmlscrub::parsers::html::backend::ParserBackend;
use htmlscrub::parsers::html::dom::decode_bytes;
use htmlscrub::parsers::linkify::format_urls;
use htmlscrub::policy::PolicyRegistry;

/// Sanitize untrusted HTML (or format plain text) for safe rendering.
#[derive(Parser, Debug)]
#[command(name = "htmlscrub", version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Input file; reads stdin when absent or "-"
    input: Option<String>,

    /// Write output to this file instead of stdout
    #[arg(short, long)]
    output: Option<String>,

    /// Named policy variant
    #[arg(short, long)]
    policy: Option<String>,

    /// Directory with <name>.toml policy files
    #[arg(long)]
    policy_dir: Option<String>,

    /// Parser backend: dom or streaming
    #[arg(short, long)]
    backend: Option<ParserBackend>,

    /// Remove non-inline, non-cid image sources
    #[arg(short = 'I', long)]
    drop_external_images: bool,

    /// Prefix CSS class names and scope style blocks under #PREFIX
    #[arg(long)]
    css_prefix: Option<String>,

    /// Treat the input as plain text and convert it to HTML
    #[arg(short = 't', long)]
    plain_text: bool,

    /// Plain text: turn leading ">" markers into blockquotes
    #[arg(short, long)]
    quote_markers: bool,

    /// Plain text: keep <!--PREFIX...--> lines verbatim
    #[arg(long, default_value = "")]
    anchor_prefix: String,

    /// Plain text: soft-wrap width, 0 disables wrapping
    #[arg(long, default_value_t = 0)]
    line_length: usize,

    /// Stop output after this many bytes
    #[arg(long)]
    max_size: Option<usize>,

    /// Only linkify URLs in plain text
    #[arg(long)]
    format_urls: bool,

    /// Input character encoding
    #[arg(short, long, default_value = "utf-8")]
    encoding: String,

    /// Print the environment variable documentation and exit
    #[arg(long)]
    env_docs: bool,

    /// Print the configuration read from the environment and exit
    #[arg(long)]
    print_config: bool,
}

fn main() {
    let cli = Cli::parse();

    let env_config = match EnvConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            print_error_message(&err.to_string(), !no_color_requested());
            process::exit(1);
        }
    };
    let colored = !env_config.no_color && atty::is(atty::Stream::Stderr);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&env_config.log_level))
        .with_writer(io::stderr)
        .with_ansi(colored)
        .init();

    if cli.env_docs {
        print_info_message(generate_env_docs().trim_end());
        return;
    }
    if cli.print_config {
        env_config.print_summary();
        return;
    }

    if let Err(message) = run(&cli, &env_config) {
        print_error_message(&message, colored);
        process::exit(1);
    }
}

fn no_color_requested() -> bool {
    std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty())
}

fn run(cli: &Cli, env_config: &EnvConfig) -> Result<(), String> {
    let input = read_input(cli.input.as_deref(), &cli.encoding)?;

    let output = if cli.format_urls {
        format_urls(&input, "")
    } else {
        let policy_dir = cli.policy_dir.as_ref().or(env_config.policy_dir.as_ref());
        let registry = match policy_dir {
            Some(dir) => PolicyRegistry::from_dir(dir).map_err(|e| format!("{} [{}]", e, e.code()))?,
            None => PolicyRegistry::builtin(),
        };

        let options = SanitizeOptions {
            policy: cli.policy.clone(),
            drop_external_images: cli.drop_external_images,
            css_prefix: cli.css_prefix.clone(),
            backend: cli.backend.unwrap_or(env_config.backend),
            max_content_size: cli.max_size.or(env_config.max_content_size),
            mode: if cli.plain_text {
                ContentMode::PlainText
            } else {
                ContentMode::Html
            },
            quote_markers: cli.quote_markers,
            anchor_marker_prefix: cli.anchor_prefix.clone(),
            line_length: cli.line_length,
        };

        let result = Sanitizer::new(registry)
            .sanitize(&input, &options)
            .map_err(|e| format!("{} [{}]", e, e.code()))?;
        result.content
    };

    write_output(cli.output.as_deref(), &output)
}

fn read_input(path: Option<&str>, encoding: &str) -> Result<String, String> {
    let data = match path {
        None | Some("-") => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .map_err(|e| format!("无法读取标准输入: {}", e))?;
            buf
        }
        Some(path) => fs::read(path).map_err(|e| format!("无法读取 {}: {}", path, e))?,
    };
    Ok(decode_bytes(&data, encoding))
}

fn write_output(path: Option<&str>, output: &str) -> Result<(), String> {
    match path {
        None | Some("-") => {
            let mut stdout = io::stdout();
            stdout
                .write_all(output.as_bytes())
                .and_then(|_| stdout.write_all(b"\n"))
                .map_err(|e| format!("无法写入标准输出: {}", e))
        }
        Some(path) => fs::write(path, output).map_err(|e| format!("无法写入 {}: {}", path, e)),
    }
}
