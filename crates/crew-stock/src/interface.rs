//! Presentation boundary
//!
//! A ticker symbol comes in, a newsletter (or a user-facing error) goes out.
//! Nothing here knows how the pipeline is built; runs are started through
//! the [`RunLauncher`] seam.

use crate::pipeline::keys;
use async_trait::async_trait;
use crew_prompt::Language;
use crew_workflow::{CancellationToken, RunResult};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{info, warn};

static TICKER_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9.^=-]{1,15}$"));

/// Errors shown to the person asking for a newsletter
#[derive(Debug, Error)]
pub enum PresentationError {
    #[error("please enter a stock ticker to research")]
    EmptyTicker,

    #[error("'{0}' is not a valid ticker symbol")]
    InvalidTicker(String),

    /// The run ended without a newsletter
    #[error("step '{step_name}' failed: {cause}")]
    RunFailed {
        step_name: String,
        cause: String,
        run: Box<RunResult>,
    },

    #[error("could not start the run: {0}")]
    Launch(#[from] crew_core::Error),
}

impl PresentationError {
    /// The message in the reader's language
    pub fn message(&self, language: Language) -> String {
        match (language, self) {
            (Language::English, _) => self.to_string(),
            (Language::Portuguese, Self::EmptyTicker) => {
                "Por favor, insira uma ação para pesquisar".to_string()
            }
            (Language::Portuguese, Self::InvalidTicker(raw)) => {
                format!("'{raw}' não é um código de ação válido")
            }
            (Language::Portuguese, Self::RunFailed { step_name, cause, .. }) => {
                format!("a etapa '{step_name}' falhou: {cause}")
            }
            (Language::Portuguese, Self::Launch(e)) => {
                format!("não foi possível iniciar a pesquisa: {e}")
            }
        }
    }

    /// The finished run behind a failure, if one was started
    pub fn run(&self) -> Option<&RunResult> {
        match self {
            Self::RunFailed { run, .. } => Some(run),
            _ => None,
        }
    }
}

/// Starts one pipeline run for a ticker
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RunLauncher: Send + Sync {
    async fn launch(
        &self,
        ticker: &str,
        cancellation: CancellationToken,
    ) -> crew_core::Result<RunResult>;
}

/// A successful run, ready to display
#[derive(Debug, Clone)]
pub struct Newsletter {
    pub ticker: String,
    pub text: String,
    pub run: RunResult,
}

/// The ticker input form
pub struct TickerForm;

impl TickerForm {
    /// Trim and upper-case raw input, rejecting empty or malformed symbols
    pub fn normalize(raw: &str) -> Result<String, PresentationError> {
        let ticker = raw.trim().to_uppercase();
        if ticker.is_empty() {
            return Err(PresentationError::EmptyTicker);
        }

        let pattern = TICKER_PATTERN
            .as_ref()
            .map_err(|e| crew_core::Error::InvalidDefinition(e.to_string()))?;
        if !pattern.is_match(&ticker) {
            return Err(PresentationError::InvalidTicker(ticker));
        }
        Ok(ticker)
    }

    /// Validate the input and, if it is usable, run the pipeline for it
    ///
    /// Invalid input never reaches the launcher. A failed run is reported
    /// with the failing step; its partial context is not shown as a result.
    pub async fn submit(
        raw: &str,
        launcher: &dyn RunLauncher,
        cancellation: CancellationToken,
    ) -> Result<Newsletter, PresentationError> {
        let ticker = Self::normalize(raw)?;
        info!(%ticker, "Ticker submitted");

        let run = launcher.launch(&ticker, cancellation).await?;
        if let Some(failure) = &run.failure {
            warn!(step = %failure.step_name, kind = %failure.kind, "Newsletter run failed");
            return Err(PresentationError::RunFailed {
                step_name: failure.step_name.clone(),
                cause: failure.message.clone(),
                run: Box::new(run),
            });
        }

        match run.output(keys::NEWSLETTER).map(str::to_string) {
            Some(text) => Ok(Newsletter { ticker, text, run }),
            None => Err(PresentationError::RunFailed {
                step_name: keys::NEWSLETTER.to_string(),
                cause: "the run finished without a newsletter".to_string(),
                run: Box::new(run),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crew_core::{Context, FnStep, StepError, StepOutput, StepSpec};
    use crew_workflow::{PipelineGraph, Runner};
    use std::sync::Arc;

    async fn finished_run(fail: bool) -> RunResult {
        let spec = StepSpec::builder("newsletter_writer")
            .input("ticket")
            .output("newsletter")
            .max_iterations(1)
            .build()
            .unwrap();
        let step = FnStep::new(spec, move |input| {
            let ticket = input.require_str("ticket").map(str::to_string);
            async move {
                if fail {
                    return Err(StepError::Fatal("model refused".into()));
                }
                Ok(StepOutput::new().with("newsletter", format!("# {}", ticket?)))
            }
        });
        let graph = PipelineGraph::builder()
            .initial_key("ticket")
            .step(Arc::new(step))
            .build();

        let mut runner = Runner::new(Arc::new(graph)).unwrap();
        runner
            .run(Context::new().with("ticket", "AAPL").unwrap())
            .await
            .unwrap()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(TickerForm::normalize("  aapl ").unwrap(), "AAPL");
        assert_eq!(TickerForm::normalize("itub3.sa").unwrap(), "ITUB3.SA");
        assert_eq!(TickerForm::normalize("^gspc").unwrap(), "^GSPC");
        assert!(matches!(
            TickerForm::normalize("   "),
            Err(PresentationError::EmptyTicker)
        ));
        assert!(matches!(
            TickerForm::normalize("AAPL; rm -rf"),
            Err(PresentationError::InvalidTicker(_))
        ));
        assert!(matches!(
            TickerForm::normalize("ABCDEFGHIJKLMNOP"),
            Err(PresentationError::InvalidTicker(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_ticker_starts_no_run() {
        let mut launcher = MockRunLauncher::new();
        launcher.expect_launch().times(0);

        for raw in ["", "   ", "\n"] {
            let err = TickerForm::submit(raw, &launcher, CancellationToken::new())
                .await
                .unwrap_err();
            assert!(matches!(err, PresentationError::EmptyTicker));
            assert_eq!(
                err.message(Language::Portuguese),
                "Por favor, insira uma ação para pesquisar"
            );
        }
    }

    #[tokio::test]
    async fn test_submit_returns_newsletter() {
        let run = finished_run(false).await;
        let mut launcher = MockRunLauncher::new();
        launcher
            .expect_launch()
            .withf(|ticker, _| ticker.eq_ignore_ascii_case("AAPL"))
            .times(1)
            .returning(move |_, _| Ok(run.clone()));

        let newsletter = TickerForm::submit(" aapl", &launcher, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(newsletter.ticker, "AAPL");
        assert_eq!(newsletter.text, "# AAPL");
        assert!(newsletter.run.succeeded());
    }

    #[tokio::test]
    async fn test_failed_run_names_the_step() {
        let run = finished_run(true).await;
        let mut launcher = MockRunLauncher::new();
        launcher
            .expect_launch()
            .times(1)
            .returning(move |_, _| Ok(run.clone()));

        let err = TickerForm::submit("AAPL", &launcher, CancellationToken::new())
            .await
            .unwrap_err();
        match &err {
            PresentationError::RunFailed { step_name, cause, .. } => {
                assert_eq!(step_name, "newsletter_writer");
                assert!(cause.contains("model refused"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.run().is_some_and(|run| run.output("newsletter").is_none()));
        assert!(err.message(Language::Portuguese).starts_with("a etapa 'newsletter_writer'"));
    }

    #[tokio::test]
    async fn test_launch_errors_are_reported() {
        let mut launcher = MockRunLauncher::new();
        launcher
            .expect_launch()
            .returning(|_, _| Err(crew_core::Error::InvalidState("runner already used".into())));

        let err = TickerForm::submit("MSFT", &launcher, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PresentationError::Launch(_)));
    }
}
