mod debug_report;

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracklang::{Compiler, DirSource, Options};

const RULES_ENV: &str = "TRACKLANG_RULES";
const LOG_ENV: &str = "TRACKLANG_LOG";

fn main() {
    let color = io::stdout().is_terminal();
    let rules = std::env::var_os(RULES_ENV).map(PathBuf::from);
    let config = match parse_args(std::env::args().skip(1), rules, color) {
        Ok(Parsed::Run(config)) => config,
        Ok(Parsed::Help) => {
            println!("{}", help_text());
            return;
        }
        Ok(Parsed::Version) => {
            println!("tracklang {}", env!("CARGO_PKG_VERSION"));
            return;
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };
    let input = match config.input.clone().map_or_else(read_stdin_input, Ok) {
        Ok(input) if !input.trim().is_empty() => input,
        Ok(_) => {
            eprintln!("error: no input provided\n\n{}", help_text());
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };
    init_logging(config.debug);

    let mut options = match &config.options_file {
        Some(path) => match Options::from_file(path) {
            Ok(options) => options,
            Err(err) => {
                eprintln!("error: failed to load config '{}': {err}", path.display());
                std::process::exit(1);
            }
        },
        None => Options::default(),
    };
    options.auto_fix &= !config.no_auto_fix;
    options.widen &= !config.no_widen;

    let compiler = match &config.rules {
        Some(dir) => Compiler::with_options(DirSource::new(dir), options),
        None => Compiler::with_options(tracklang::BuiltinSource, options),
    };
    let out = compiler.compile(&input);

    match config.output {
        Output::Document => println!("{:#}", out.document),
        Output::Report => println!("{:#}", out.report()),
        Output::Pretty => {
            let notes = compiler.with_table(|table| table.notes().iter().map(ToString::to_string).collect::<Vec<_>>());
            debug_report::print_run(&out, &notes, config.color);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Pretty,
    /// Only the document.
    Document,
    /// Document, diagnostics and metrics.
    Report,
}

#[derive(Debug, PartialEq)]
struct CliConfig {
    /// `None` reads stdin.
    input: Option<String>,
    rules: Option<PathBuf>,
    options_file: Option<PathBuf>,
    no_auto_fix: bool,
    no_widen: bool,
    output: Output,
    color: bool,
    debug: bool,
}

#[derive(Debug, PartialEq)]
enum Parsed {
    Run(CliConfig),
    Help,
    Version,
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("tracklang=debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).with_target(false).init();
}

fn set_input(slot: &mut Option<String>, value: String) -> Result<(), String> {
    match slot.replace(value) {
        Some(_) => Err("error: input provided multiple times".to_string()),
        None => Ok(()),
    }
}

/// Parses arguments (program name excluded). `rules` and `color` are the
/// defaults taken from the environment and the terminal.
fn parse_args(
    args: impl IntoIterator<Item = String>,
    rules: Option<PathBuf>,
    color: bool,
) -> Result<Parsed, String> {
    let mut config = CliConfig {
        input: None,
        rules,
        options_file: None,
        no_auto_fix: false,
        no_widen: false,
        output: Output::Pretty,
        color,
        debug: false,
    };
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag.to_string(), Some(value.to_string())),
            _ => (arg.clone(), None),
        };
        let mut value = |what: &str| {
            inline.clone().or_else(|| args.next()).ok_or_else(|| format!("error: {flag} expects {what}"))
        };
        match flag.as_str() {
            "-h" | "--help" => return Ok(Parsed::Help),
            "-V" | "--version" => return Ok(Parsed::Version),
            "--color" => config.color = true,
            "--no-color" => config.color = false,
            "--json" => config.output = Output::Document,
            "--report" => config.output = Output::Report,
            "--debug" => config.debug = true,
            "--no-auto-fix" => config.no_auto_fix = true,
            "--no-widen" => config.no_widen = true,
            "--rules" => config.rules = Some(PathBuf::from(value("a directory")?)),
            "--config" => config.options_file = Some(PathBuf::from(value("a file")?)),
            "--input" | "-i" => {
                let text = value("a value")?;
                set_input(&mut config.input, text)?;
            }
            "--" => {
                let rest = args.by_ref().collect::<Vec<_>>().join(" ");
                if !rest.trim().is_empty() {
                    set_input(&mut config.input, rest)?;
                }
            }
            _ if arg.starts_with('-') => return Err(format!("error: unknown option '{arg}'")),
            _ => {
                let rest = std::iter::once(arg).chain(args.by_ref()).collect::<Vec<_>>().join(" ");
                set_input(&mut config.input, rest)?;
            }
        }
    }

    Ok(Parsed::Run(config))
}

fn read_stdin_input() -> Result<String, String> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer).map_err(|err| format!("error: failed to read stdin: {err}"))?;
    Ok(buffer)
}

fn help_text() -> String {
    format!(
        "tracklang {version}

Compile a free-form track description into a generator document.

Usage:
  tracklang [OPTIONS] [--] <input...>
  tracklang [OPTIONS] --input <text>

Options:
  -i, --input <text>         Input text to compile. If omitted, reads remaining args
                             or stdin when no args are provided.
  --rules <dir>              Load rule documents from <dir> instead of the built-in
                             rules. Default: ${rules_env} if set.
  --config <file>            Load compiler options from a JSON file.
  --no-auto-fix              Skip the auto-fix pass.
  --no-widen                 Skip the widened-rules pass.
  --json                     Print only the document as JSON.
  --report                   Print document, diagnostics and pass metrics as JSON.
  --debug                    Log every pass to stderr (otherwise ${log_env}, default warn).
  --color                    Force ANSI color output.
  --no-color                 Disable ANSI color output.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Exit codes:
  0  Success (complete or not).
  1  Internal error.
  2  Invalid arguments or missing input.
",
        version = env!("CARGO_PKG_VERSION"),
        rules_env = RULES_ENV,
        log_env = LOG_ENV,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Parsed, String> {
        parse_args(args.iter().map(|a| a.to_string()), None, false)
    }

    fn run(args: &[&str]) -> CliConfig {
        match parse(args) {
            Ok(Parsed::Run(config)) => config,
            other => panic!("expected a run, got {other:?}"),
        }
    }

    #[test]
    fn trailing_words_become_the_input() {
        let config = run(&["--json", "build", "105m", "by", "6m"]);
        assert_eq!(config.input.as_deref(), Some("build 105m by 6m"));
        assert_eq!(config.output, Output::Document);
        assert!(!config.color);
    }

    #[test]
    fn flags_take_separate_or_inline_values() {
        let config = run(&["--rules", "rules", "--config=opts.json", "--no-widen", "--report", "-i", "curve"]);
        assert_eq!(config.rules, Some(PathBuf::from("rules")));
        assert_eq!(config.options_file, Some(PathBuf::from("opts.json")));
        assert_eq!(config.input.as_deref(), Some("curve"));
        assert_eq!(config.output, Output::Report);
        assert!(config.no_widen && !config.no_auto_fix);
        assert_eq!(run(&["--input=a=b"]).input.as_deref(), Some("a=b"));
    }

    #[test]
    fn missing_input_is_left_for_stdin() {
        assert_eq!(run(&["--color"]).input, None);
        assert_eq!(run(&["--", "  "]).input, None);
        assert_eq!(run(&["--", "-not", "a", "flag"]).input.as_deref(), Some("-not a flag"));
    }

    #[test]
    fn bad_arguments_are_rejected() {
        assert_eq!(parse(&["--bogus"]), Err("error: unknown option '--bogus'".to_string()));
        assert_eq!(parse(&["--rules"]), Err("error: --rules expects a directory".to_string()));
        assert_eq!(parse(&["-i", "a", "b"]), Err("error: input provided multiple times".to_string()));
        assert_eq!(parse(&["--input=a", "--", "b"]), Err("error: input provided multiple times".to_string()));
    }

    #[test]
    fn help_and_version_stop_parsing() {
        assert_eq!(parse(&["-h", "--bogus"]), Ok(Parsed::Help));
        assert_eq!(parse(&["--version"]), Ok(Parsed::Version));
    }
}
