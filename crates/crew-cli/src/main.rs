//! stock-newsletter: write a short investor newsletter for one ticker
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//! stock-newsletter run --ticker AAPL
//! stock-newsletter run --ticker ITUB3.SA --language pt --format json
//! stock-newsletter interactive
//! ```

mod report;

use anyhow::Context as _;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use crew_prompt::Language;
use crew_stock::config::StockConfigBuilder;
use crew_stock::{HistoryWindow, NewsletterLauncher, PresentationError, StockConfig, TickerForm};
use crew_utils::{LogFormat, ProcessEnv, init_tracing_with, load_dotenv};
use crew_workflow::{CancellationToken, RunResult};
use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(name = "stock-newsletter", version)]
#[command(about = "Research a stock with a crew of LLM agents and write a newsletter about it")]
struct Cli {
    /// Log as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write one newsletter and print it to stdout
    Run(RunArgs),
    /// Ask for tickers until EOF or `exit`
    Interactive(CommonArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Newsletter language: en or pt
    #[arg(short, long)]
    language: Option<Language>,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Ticker symbol, e.g. AAPL or ITUB3.SA
    #[arg(short, long)]
    ticker: String,

    #[command(flatten)]
    common: CommonArgs,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// First day of the price history (YYYY-MM-DD)
    #[arg(long, requires = "end")]
    start: Option<NaiveDate>,

    /// Day after the last day of the price history (YYYY-MM-DD)
    #[arg(long, requires = "start")]
    end: Option<NaiveDate>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    /// The newsletter, with a step report on stderr
    Text,
    /// The whole run result
    Json,
}

/// Cancels the run in progress on Ctrl-C; with no run active, exits
#[derive(Clone, Default)]
struct Interrupts {
    active: Arc<Mutex<Option<CancellationToken>>>,
}

impl Interrupts {
    fn listen(&self) {
        let active = Arc::clone(&self.active);
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                let token = active.lock().unwrap_or_else(PoisonError::into_inner).take();
                match token {
                    Some(token) => {
                        eprintln!("\nCancelling...");
                        token.cancel();
                    }
                    None => std::process::exit(130),
                }
            }
        });
    }

    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        token
    }

    fn end(&self) {
        self.active.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

fn load_config(language: Option<Language>, history: Option<HistoryWindow>) -> anyhow::Result<StockConfig> {
    let mut builder = StockConfigBuilder::from_env(&ProcessEnv)?;
    if let Some(language) = language {
        builder = builder.language(language);
    }
    if let Some(history) = history {
        builder = builder.history(history);
    }
    Ok(builder.build()?)
}

fn print_run_json(run: &RunResult) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(run).context("serializing run result")?;
    println!("{json}");
    Ok(())
}

async fn run_once(
    args: RunArgs,
    launcher: &NewsletterLauncher,
    language: Language,
    interrupts: &Interrupts,
) -> anyhow::Result<ExitCode> {
    let token = interrupts.begin();
    let outcome = TickerForm::submit(&args.ticker, launcher, token).await;
    interrupts.end();

    match (outcome, args.format) {
        (Ok(newsletter), OutputFormat::Text) => {
            println!("{}", newsletter.text);
            eprintln!("{}", report::step_table(&newsletter.run));
            eprintln!("{}", report::summary_line(&newsletter.run));
            Ok(ExitCode::SUCCESS)
        }
        (Ok(newsletter), OutputFormat::Json) => {
            print_run_json(&newsletter.run)?;
            Ok(ExitCode::SUCCESS)
        }
        (Err(err), format) => {
            match (err.run(), format) {
                (Some(run), OutputFormat::Json) => print_run_json(run)?,
                (Some(run), OutputFormat::Text) => eprintln!("{}", report::step_table(run)),
                (None, _) => {}
            }
            eprintln!("error: {}", err.message(language));
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn interactive(
    launcher: &NewsletterLauncher,
    language: Language,
    interrupts: &Interrupts,
) -> anyhow::Result<ExitCode> {
    let prompt = match language {
        Language::English => "Ticker (or 'exit')> ",
        Language::Portuguese => "Ação (ou 'exit')> ",
    };
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut failures = 0usize;

    loop {
        print!("{prompt}");
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            println!();
            break;
        }
        if input.trim().eq_ignore_ascii_case("exit") {
            break;
        }

        let token = interrupts.begin();
        let outcome = TickerForm::submit(&input, launcher, token).await;
        interrupts.end();

        match outcome {
            Ok(newsletter) => {
                println!("\n{}\n", newsletter.text);
                eprintln!("{}", report::summary_line(&newsletter.run));
            }
            Err(err @ (PresentationError::EmptyTicker | PresentationError::InvalidTicker(_))) => {
                eprintln!("{}", err.message(language));
            }
            Err(err) => {
                failures += 1;
                if let Some(run) = err.run() {
                    eprintln!("{}", report::step_table(run));
                }
                eprintln!("error: {}", err.message(language));
            }
        }
    }

    debug!(failures, "Interactive session finished");
    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    let (language, history) = match &cli.command {
        Command::Run(args) => (
            args.common.language,
            args.start
                .zip(args.end)
                .map(|(start, end)| HistoryWindow::Range { start, end }),
        ),
        Command::Interactive(args) => (args.language, None),
    };

    let config = load_config(language, history)?;
    info!(model = %config.model, language = %config.language, "Configuration loaded");
    let launcher = NewsletterLauncher::from_config(&config)?;

    let interrupts = Interrupts::default();
    interrupts.listen();

    match cli.command {
        Command::Run(args) => run_once(args, &launcher, config.language, &interrupts).await,
        Command::Interactive(_) => interactive(&launcher, config.language, &interrupts).await,
    }
}

/// Merge `.env` before logging starts so a `RUST_LOG` set there is honoured
fn startup<T>(load_env: impl FnOnce() -> T, init_logs: impl FnOnce()) -> T {
    let loaded = load_env();
    init_logs();
    loaded
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    match startup(load_dotenv, || init_tracing_with(format, None)) {
        Ok(Some(path)) => debug!(path = %path.display(), "Loaded .env file"),
        Ok(None) => {}
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    }

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "stock-newsletter",
            "run",
            "--ticker",
            "AAPL",
            "--language",
            "pt",
            "--format",
            "json",
            "--start",
            "2024-01-01",
            "--end",
            "2024-06-30",
        ])
        .unwrap();

        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.ticker, "AAPL");
        assert_eq!(args.common.language, Some(Language::Portuguese));
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.start, NaiveDate::from_ymd_opt(2024, 1, 1));
    }

    #[test]
    fn test_range_needs_both_ends() {
        let err = Cli::try_parse_from([
            "stock-newsletter",
            "run",
            "--ticker",
            "AAPL",
            "--start",
            "2024-01-01",
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn test_interactive_with_global_flag() {
        let cli = Cli::try_parse_from(["stock-newsletter", "interactive", "--log-json"]).unwrap();
        assert!(cli.log_json);
        assert!(matches!(cli.command, Command::Interactive(CommonArgs { language: None })));
    }

    #[test]
    fn test_dotenv_is_loaded_before_logging() {
        let order = RefCell::new(Vec::new());
        let loaded = startup(
            || {
                order.borrow_mut().push("dotenv");
                Some("RUST_LOG=debug")
            },
            || order.borrow_mut().push("tracing"),
        );

        assert_eq!(loaded, Some("RUST_LOG=debug"));
        assert_eq!(order.into_inner(), ["dotenv", "tracing"]);
    }

    #[test]
    fn test_unknown_language_is_rejected() {
        let err = Cli::try_parse_from(["stock-newsletter", "interactive", "--language", "ja"]);
        assert!(err.is_err());
    }
}
