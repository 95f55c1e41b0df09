//! Purpose: `rowpack` CLI entry point and command dispatch bootstrap.
//! Role: Binary crate root; parses args, runs commands, prints payloads on stdout.
//! Invariants: The flattened payload is the only stdout content on default runs.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::ffi::OsString;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{
    CommandFactory, Parser, Subcommand, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

mod color_json;
mod command_dispatch;

use color_json::colorize_json;
use rowpack::api::{
    DEFAULT_TIMEOUT_MS, Error, ErrorKind, FlattenError, FlattenedString, PAYLOAD_BYTE_CEILING,
    QueryClient, QueryConfig, QueryResponse, ResultSet, cell_payload, flatten, to_exit_code,
};

const URL_ENV: &str = "ROWPACK_URL";
const API_KEY_ENV: &str = "ROWPACK_API_KEY";

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    init_tracing();

    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                let message = clap_error_summary(&err);
                let hint = clap_error_hint(&err);
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(message)
                        .with_hint(hint),
                    ColorMode::Auto,
                ));
            }
        },
    };

    let color_mode = cli.color;

    let result = command_dispatch::dispatch_command(cli.command, color_mode);

    result
        .map_err(add_io_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let replacement = arg.to_str().and_then(|value| match value {
                "---help" => Some("--help"),
                "---version" => Some("--version"),
                _ => None,
            });
            replacement.map(OsString::from).unwrap_or_else(|| arg)
        })
        .collect()
}

#[derive(Parser)]
#[command(
    name = "rowpack",
    version,
    about = "Flatten SQL query API rows into bounded oracle payloads",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"Runs a SQL query against an HTTP API and folds the rows into one
comma-delimited string small enough to post on-chain. Commas inside the
data become pipes so the field separators stay unambiguous, and payloads
over 256 bytes are rejected.

Mental model:
  - `query` fetches rows over HTTP and flattens them (fetch + flatten)
  - `flatten` flattens an already-saved response document (flatten only)
"#,
    after_help = r#"EXAMPLES
  $ export ROWPACK_API_KEY=sk_live_...
  $ rowpack query --url https://api.example.com/v1/sql 'SELECT id, price FROM trades LIMIT 2'
  1,42.5,2,43.1
  $ rowpack query --url https://api.example.com/v1/sql --cell PRICE 'SELECT price FROM trades LIMIT 1'
  42.5
  $ curl -s https://api.example.com/v1/sql -d '{"sqlText":"SELECT 1"}' | rowpack flatten

LEARN MORE
  $ rowpack <command> --help"#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics and pretty JSON output: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        about = "Run a SQL query and print the flattened payload",
        long_about = r#"POST a SQL query to the HTTP API and flatten the returned rows.

Rows are folded row-major into one comma-delimited string; commas inside
values become pipes. Payloads over 256 UTF-8 bytes are rejected."#,
        after_help = r#"EXAMPLES
  $ rowpack query --url https://api.example.com/v1/sql 'SELECT id, qty FROM fills LIMIT 3'
  $ rowpack query --url https://api.example.com/v1/sql --sql-file query.sql
  $ echo 'SELECT 1' | rowpack query --url https://api.example.com/v1/sql
  $ rowpack query --url https://api.example.com/v1/sql --biscuit-file tokens.txt \
      --cell TOTAL 'SELECT sum(qty) AS total FROM fills'

NOTES
  - The endpoint comes from --url or ROWPACK_URL
  - The api key comes from --api-key, --api-key-file, or ROWPACK_API_KEY
  - `--cell COLUMN` returns one cell from the first row without pipe escaping
  - `--raw` prints the response body as-is and skips flattening"#
    )]
    Query {
        #[arg(help = "SQL text to run (or use --sql-file / pipe SQL to stdin)")]
        sql: Option<String>,
        #[arg(
            long = "sql-file",
            help = "Read SQL text from a file (use - for stdin)",
            conflicts_with = "sql",
            value_hint = ValueHint::FilePath
        )]
        sql_file: Option<String>,
        #[arg(long, help = "Query API endpoint URL (default: $ROWPACK_URL)")]
        url: Option<String>,
        #[arg(long, default_value = "POST", help = "HTTP method for the query request")]
        method: String,
        #[arg(
            long = "timeout-ms",
            default_value_t = DEFAULT_TIMEOUT_MS,
            help = "Request timeout in milliseconds"
        )]
        timeout_ms: u64,
        #[arg(
            long = "api-key",
            help = "Api key sent as the `apikey` header (default: $ROWPACK_API_KEY)"
        )]
        api_key: Option<String>,
        #[arg(
            long = "api-key-file",
            help = "Read the api key from a file",
            value_hint = ValueHint::FilePath
        )]
        api_key_file: Option<PathBuf>,
        #[arg(long, help = "Repeatable biscuit authorization token for the query")]
        biscuit: Vec<String>,
        #[arg(
            long = "biscuit-file",
            help = "Read biscuit tokens from a file (one per line)",
            value_hint = ValueHint::FilePath
        )]
        biscuit_file: Option<PathBuf>,
        #[arg(long, help = "Return one cell from the first row instead of flattening")]
        cell: Option<String>,
        #[arg(
            long,
            help = "Print the raw response body and skip flattening",
            conflicts_with_all = ["cell", "json", "hex"]
        )]
        raw: bool,
        #[arg(long, help = "Emit a JSON envelope with payload and row/column counts")]
        json: bool,
        #[arg(
            long,
            help = "Print the payload hex-encoded",
            conflicts_with = "json"
        )]
        hex: bool,
    },
    #[command(
        about = "Flatten a saved response document",
        long_about = r#"Flatten a response document that was already fetched.

Reads `{"data": [...]}` (or a bare row array) from a file or stdin and
applies the same flattening rules as `query`."#,
        after_help = r#"EXAMPLES
  $ rowpack flatten response.json
  $ curl -s https://api.example.com/v1/sql -d '{"sqlText":"SELECT 1"}' | rowpack flatten
  $ rowpack flatten --cell PRICE response.json
  $ rowpack flatten --json response.json"#
    )]
    Flatten {
        #[arg(
            help = "Response document path (use - or omit for stdin)",
            value_hint = ValueHint::FilePath
        )]
        file: Option<String>,
        #[arg(long, help = "Return one cell from the first row instead of flattening")]
        cell: Option<String>,
        #[arg(long, help = "Emit a JSON envelope with payload and row/column counts")]
        json: bool,
        #[arg(
            long,
            help = "Print the payload hex-encoded",
            conflicts_with = "json"
        )]
        hex: bool,
    },
    #[command(
        about = "Print version info as JSON",
        long_about = r#"Emit version info as JSON (stable, machine-readable)."#,
        after_help = r#"EXAMPLES
  $ rowpack version"#
    )]
    Version,
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        long_about = r#"Generate shell completion scripts.

Prints a completion script for the given shell to stdout.
Install the generated file in your shell's completion directory (or source it)
to enable tab completion."#,
        after_help = r#"EXAMPLES
  $ rowpack completion bash > ~/.local/share/bash-completion/completions/rowpack
  $ source ~/.bashrc
  $ rowpack completion zsh > ~/.zfunc/_rowpack
  $ autoload -U compinit && compinit
  $ rowpack completion fish > ~/.config/fish/completions/rowpack.fish"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

fn resolve_endpoint(url: Option<String>) -> Result<String, Error> {
    if let Some(url) = url {
        return Ok(url);
    }
    match std::env::var(URL_ENV) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::new(ErrorKind::Usage)
            .with_message("missing query endpoint url")
            .with_hint("Pass --url or set ROWPACK_URL.")),
    }
}

fn resolve_api_key(
    api_key: Option<String>,
    api_key_file: Option<PathBuf>,
) -> Result<String, Error> {
    if api_key.is_some() && api_key_file.is_some() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--api-key cannot be combined with --api-key-file")
            .with_hint(
                "Use --api-key-file for safer handling, or pass --api-key for local/dev use.",
            ));
    }
    if let Some(path) = api_key_file {
        return read_key_file(&path);
    }
    if let Some(key) = api_key {
        return Ok(key);
    }
    match std::env::var(API_KEY_ENV) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::new(ErrorKind::Usage)
            .with_message("missing api key")
            .with_hint("Pass --api-key, --api-key-file, or set ROWPACK_API_KEY.")),
    }
}

fn read_key_file(path: &Path) -> Result<String, Error> {
    let raw = std::fs::read_to_string(path).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("failed to read api key file")
            .with_path(path)
            .with_source(err)
    })?;
    let key = raw.trim().to_string();
    if key.is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("api key file is empty")
            .with_path(path));
    }
    Ok(key)
}

fn collect_biscuits(
    biscuit: Vec<String>,
    biscuit_file: Option<PathBuf>,
) -> Result<Vec<String>, Error> {
    let mut biscuits = biscuit;
    if let Some(path) = biscuit_file {
        let raw = std::fs::read_to_string(&path).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("failed to read biscuit file")
                .with_path(&path)
                .with_source(err)
        })?;
        for line in raw.lines() {
            let token = line.trim();
            if !token.is_empty() {
                biscuits.push(token.to_string());
            }
        }
    }
    Ok(biscuits)
}

fn parse_method(method: &str) -> Result<String, Error> {
    let method = method.trim().to_ascii_uppercase();
    if method.is_empty() || !method.chars().all(|ch| ch.is_ascii_alphabetic()) {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("invalid http method")
            .with_hint("Use a plain method name like POST or GET."));
    }
    Ok(method)
}

fn resolve_sql(sql: Option<String>, sql_file: Option<String>) -> Result<String, Error> {
    let raw = if let Some(sql) = sql {
        sql
    } else if let Some(source) = sql_file {
        read_text_source(&source, "failed to read sql file")?
    } else if !io::stdin().is_terminal() {
        read_stdin_text()?
    } else {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("missing sql input")
            .with_hint("Provide SQL inline, via --sql-file, or pipe SQL to stdin."));
    };
    let sql = raw.trim().to_string();
    if sql.is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("sql text is empty")
            .with_hint("Provide a non-empty SQL statement."));
    }
    Ok(sql)
}

fn read_text_source(source: &str, context: &'static str) -> Result<String, Error> {
    if source == "-" {
        return read_stdin_text();
    }
    std::fs::read_to_string(source).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message(context)
            .with_path(source)
            .with_source(err)
    })
}

fn read_stdin_text() -> Result<String, Error> {
    let mut text = String::new();
    io::stdin().read_to_string(&mut text).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read stdin")
            .with_source(err)
    })?;
    Ok(text)
}

fn flatten_error(err: FlattenError) -> Error {
    match err {
        FlattenError::EmptyResultSet => {
            Error::new(ErrorKind::EmptyResponse).with_message("could not get response from API")
        }
        FlattenError::EmptyPayload => Error::new(ErrorKind::Invalid)
            .with_message("invalid response")
            .with_hint("The rows flattened to an empty string."),
        FlattenError::CeilingExceeded { byte_len } => Error::new(ErrorKind::Invalid)
            .with_message("invalid response")
            .with_hint(format!(
                "Payload is {byte_len} bytes; the ceiling is {PAYLOAD_BYTE_CEILING}. Narrow the query."
            )),
        FlattenError::ColumnNotFound { column } => Error::new(ErrorKind::NotFound)
            .with_message("column not found in response")
            .with_column(column)
            .with_hint("Check the column name against the query's select list."),
    }
}

fn emit_result(
    result: &ResultSet,
    cell: Option<&str>,
    json: bool,
    hex: bool,
    color_mode: ColorMode,
) -> Result<RunOutcome, Error> {
    let payload = match cell {
        Some(column) => cell_payload(result, column),
        None => flatten(result),
    }
    .map_err(flatten_error)?;

    if json {
        emit_json(payload_envelope(&payload, result), color_mode);
    } else if hex {
        println!("{}", hex::encode(payload.as_bytes()));
    } else {
        println!("{payload}");
    }
    Ok(RunOutcome::ok())
}

fn payload_envelope(payload: &FlattenedString, result: &ResultSet) -> Value {
    json!({
        "payload": payload.as_str(),
        "byte_len": payload.byte_len(),
        "row_count": result.row_count(),
        "column_count": result.column_count(),
    })
}

fn emit_raw_body(body: &str, color_mode: ColorMode) {
    if io::stdout().is_terminal() {
        if let Ok(value) = serde_json::from_str::<Value>(body) {
            emit_json(value, color_mode);
            return;
        }
    }
    println!("{body}");
}

fn emit_version_output(color_mode: ColorMode) {
    if io::stdout().is_terminal() {
        println!("rowpack {}", env!("CARGO_PKG_VERSION"));
    } else {
        emit_json(
            json!({
                "name": "rowpack",
                "version": env!("CARGO_PKG_VERSION"),
            }),
            color_mode,
        );
    }
}

fn emit_json(value: serde_json::Value, color_mode: ColorMode) {
    let is_tty = io::stdout().is_terminal();
    let use_color = color_mode.use_color(is_tty);
    let pretty = is_tty || use_color;
    let json = if pretty {
        if use_color {
            colorize_json(&value, true)
        } else {
            serde_json::to_string_pretty(&value)
                .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
        }
    } else {
        serde_json::to_string(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    };
    println!("{json}");
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::EmptyResponse => "could not get response from API".to_string(),
        ErrorKind::Invalid => "invalid response".to_string(),
        ErrorKind::Busy => "resource is busy".to_string(),
        ErrorKind::Permission => "permission denied".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(url) = err.url() {
        inner.insert("url".to_string(), json!(url));
    }
    if let Some(status) = err.status() {
        inner.insert("status".to_string(), json!(status));
    }
    if let Some(column) = err.column() {
        inner.insert("column".to_string(), json!(column));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(url) = err.url() {
        lines.push(format!(
            "{} {url}",
            colorize_label("url:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(status) = err.status() {
        lines.push(format!(
            "{} {status}",
            colorize_label("status:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(column) = err.column() {
        lines.push(format!(
            "{} {column}",
            colorize_label("column:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("path:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn add_io_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::Permission => {
            err.with_hint("Permission denied by the query API. Check the api key and biscuit tokens.")
        }
        ErrorKind::Busy => {
            err.with_hint("The query API is busy or rate limiting. Retry with backoff.")
        }
        ErrorKind::Io => err.with_hint("Network error. Check the endpoint URL and connectivity."),
        _ => err,
    }
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_BACKTRACE=1 and share command/context if it persists.",
    )
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);

    let Some(usage) = usage else {
        return "Try `rowpack --help`.".to_string();
    };

    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "rowpack") else {
        return "Try `rowpack --help`.".to_string();
    };

    let mut parts = Vec::new();
    for token in tokens.iter().skip(pos + 1) {
        if token.starts_with('-') || token.starts_with('<') || token.starts_with('[') {
            break;
        }
        parts.push(*token);
    }

    if parts.is_empty() {
        return "Try `rowpack --help`.".to_string();
    }

    format!("Try `rowpack {} --help`.", parts.join(" "))
}
