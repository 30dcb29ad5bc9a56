mod debug_report;

use glint::{CandidateScore, HighlightResult, Highlighter, Options};
use std::io::{self, IsTerminal, Read};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

const LOG_ENV: &str = "GLINT_LOG";

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(io::stderr)
        .init();

    if let Err(err) = run(config) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Tree,
    Html,
    Json,
}

struct CliConfig {
    input: String,
    language: Option<String>,
    format: Format,
    options: Options,
    ignore_illegals: bool,
    color: bool,
}

fn run(config: CliConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut highlighter = Highlighter::with_bundled_languages();
    highlighter.configure(config.options);

    let (result, ranking): (HighlightResult, Vec<CandidateScore>) = match &config.language {
        Some(language) => (highlighter.highlight(language, &config.input, config.ignore_illegals)?, Vec::new()),
        None => {
            let detection = highlighter.detect::<&str>(&config.input, None)?;
            (detection.best, detection.ranking)
        }
    };

    match config.format {
        Format::Tree => debug_report::print_run(&result, &ranking, config.color),
        Format::Html => println!("{}", result.value),
        Format::Json => println!("{}", result.tree.to_json_pretty()?),
    }
    Ok(())
}

fn parse_args() -> Result<CliConfig, String> {
    let mut input: Option<String> = None;
    let mut language: Option<String> = None;
    let mut format = Format::Tree;
    let mut options = Options::default();
    let mut ignore_illegals = false;
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1).peekable();

    // --config is applied first so that flags override the file regardless of order.
    let mut config_file: Option<String> = None;
    let mut overrides: Vec<Override> = Vec::new();

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag.to_string(), Some(value.to_string())),
            _ => (arg.clone(), None),
        };
        let mut value = |name: &str| -> Result<String, String> {
            match inline.clone() {
                Some(value) => Ok(value),
                None => args.next().ok_or_else(|| format!("error: {name} expects a value")),
            }
        };

        match flag.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("glint {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--list" => {
                for name in Highlighter::with_bundled_languages().list_languages() {
                    println!("{name}");
                }
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--detect" => language = None,
            "--ignore-illegals" => ignore_illegals = true,
            "--strict" => overrides.push(Override::Strict),
            "--case-insensitive" => overrides.push(Override::CaseInsensitive),
            "-l" | "--language" => language = Some(value("--language")?),
            "--format" => format = parse_format(&value("--format")?)?,
            "--class-prefix" => overrides.push(Override::ClassPrefix(value("--class-prefix")?)),
            "--tab-replace" => overrides.push(Override::TabReplace(value("--tab-replace")?)),
            "--only" => {
                let names = value("--only")?.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
                overrides.push(Override::Languages(names));
            }
            "--config" => config_file = Some(value("--config")?),
            "-i" | "--input" => {
                let value = value("--input")?;
                if input.is_some() {
                    return Err("error: input provided multiple times".to_string());
                }
                input = Some(value);
            }
            "--" => {
                let rest = args.collect::<Vec<_>>().join(" ");
                if !rest.is_empty() {
                    if input.is_some() {
                        return Err("error: input provided multiple times".to_string());
                    }
                    input = Some(rest);
                }
                break;
            }
            _ if arg.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => {
                let rest = std::iter::once(arg).chain(args).collect::<Vec<_>>().join(" ");
                if input.is_some() {
                    return Err("error: input provided multiple times".to_string());
                }
                input = Some(rest);
                break;
            }
        }
    }

    if let Some(path) = config_file {
        let text = std::fs::read_to_string(&path).map_err(|err| format!("error: failed to read --config '{path}': {err}"))?;
        options = Options::from_json(&text).map_err(|err| format!("error: invalid --config '{path}': {err}"))?;
    }
    for o in overrides {
        o.apply(&mut options);
    }

    let input = match input {
        Some(value) => value,
        None => read_stdin_input()?,
    };

    if input.is_empty() {
        return Err(format!("error: no input provided\n\n{}", help_text()));
    }

    Ok(CliConfig { input, language, format, options, ignore_illegals, color })
}

enum Override {
    Strict,
    CaseInsensitive,
    ClassPrefix(String),
    TabReplace(String),
    Languages(Vec<String>),
}

impl Override {
    fn apply(self, options: &mut Options) {
        match self {
            Override::Strict => options.strict = true,
            Override::CaseInsensitive => options.case_insensitive = true,
            Override::ClassPrefix(prefix) => options.class_prefix = prefix,
            Override::TabReplace(replacement) => options.tab_replace = Some(replacement),
            Override::Languages(names) => options.languages = Some(names),
        }
    }
}

fn parse_format(value: &str) -> Result<Format, String> {
    match value {
        "tree" => Ok(Format::Tree),
        "html" => Ok(Format::Html),
        "json" => Ok(Format::Json),
        _ => Err(format!("error: invalid --format '{value}' (expected tree, html or json)")),
    }
}

fn read_stdin_input() -> Result<String, String> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer).map_err(|err| format!("error: failed to read stdin: {err}"))?;
    Ok(buffer)
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "glint {version}

Grammar-driven syntax highlighter.

Usage:
  glint [OPTIONS] [--] <code...>
  glint [OPTIONS] --input <code>
  cat file | glint [OPTIONS]

Options:
  -l, --language <name>      Highlight as this language (name or alias).
                             Without it the language is detected.
  --detect                   Detect the language even if --language was given earlier.
  --only <a,b,...>           Restrict detection to these languages.
  --format <tree|html|json>  Output format. Default: tree
  --class-prefix <prefix>    Prefix of label classes in HTML. Default: hl-
  --tab-replace <text>       Replace tabs in HTML output.
  --case-insensitive         Compile every grammar case-insensitively.
  --ignore-illegals          Keep illegal input as plain text.
  --strict                   Fail on illegal input instead of degrading.
  --config <file.json>       Load options from a JSON file; flags override it.
  --list                     List the bundled languages.
  -i, --input <code>         Code to highlight. If omitted, reads remaining args
                             or stdin when no args are provided.
  --color                    Force ANSI color output.
  --no-color                 Disable ANSI color output.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Environment:
  {log_env}                  Log filter (tracing EnvFilter syntax). Default: warn
                             At debug level every scan reports its duration.

Exit codes:
  0  Success.
  1  Highlighting failed.
  2  Invalid arguments or missing input.
",
        version = env!("CARGO_PKG_VERSION"),
        log_env = LOG_ENV,
    )
}
