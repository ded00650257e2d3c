//! End-to-end behaviour of the newsletter-shaped pipeline

use async_trait::async_trait;
use crew_core::{
    Context, ContextSnapshot, DependencyError, Error, FnStep, Step, StepError, StepOutput,
    StepResult, StepSpec,
};
use crew_workflow::{PipelineGraph, RunStatus, Runner, StepStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Step whose capability fails every time, counting invocations
struct AlwaysFailing {
    spec: StepSpec,
    calls: AtomicUsize,
}

impl AlwaysFailing {
    fn new(spec: StepSpec) -> Self {
        Self {
            spec,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Step for AlwaysFailing {
    fn spec(&self) -> &StepSpec {
        &self.spec
    }

    async fn execute(&self, _input: &ContextSnapshot) -> StepResult<StepOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StepError::Capability("search backend unavailable".into()))
    }
}

fn price_spec() -> StepSpec {
    StepSpec::builder("price_analyst")
        .input("ticket")
        .output("price_trend")
        .max_iterations(5)
        .build()
        .unwrap()
}

fn news_spec() -> StepSpec {
    StepSpec::builder("news_analyst")
        .input("ticket")
        .output("news_summary")
        .max_iterations(10)
        .build()
        .unwrap()
}

fn writer_spec() -> StepSpec {
    StepSpec::builder("newsletter_writer")
        .inputs(["ticket", "price_trend", "news_summary"])
        .output("newsletter")
        .max_iterations(5)
        .build()
        .unwrap()
}

fn price_step() -> Arc<dyn Step> {
    Arc::new(FnStep::new(price_spec(), |input: ContextSnapshot| async move {
        let ticket = input.require_str("ticket")?.to_string();
        Ok(StepOutput::new().with("price_trend", format!("{ticket}, price UP")))
    }))
}

fn news_step() -> Arc<dyn Step> {
    Arc::new(FnStep::new(news_spec(), |input: ContextSnapshot| async move {
        let ticket = input.require_str("ticket")?.to_string();
        Ok(StepOutput::new().with("news_summary", format!("{ticket} beat earnings; greed 70")))
    }))
}

fn writer_step() -> Arc<dyn Step> {
    Arc::new(FnStep::new(writer_spec(), |input: ContextSnapshot| async move {
        let trend = input.require_str("price_trend")?.to_string();
        let news = input.require_str("news_summary")?.to_string();
        Ok(StepOutput::new().with("newsletter", format!("# Weekly\n{trend}\n{news}")))
    }))
}

fn graph(steps: Vec<Arc<dyn Step>>) -> PipelineGraph {
    steps
        .into_iter()
        .fold(PipelineGraph::builder().initial_key("ticket"), |b, s| b.step(s))
        .build()
}

fn seed() -> Context {
    Context::new().with("ticket", "AAPL").unwrap()
}

#[test]
fn validation_fails_when_any_producer_is_removed() {
    let full = vec![price_step(), news_step(), writer_step()];
    assert!(graph(full.clone()).validate().is_ok());

    for removed in 0..full.len() - 1 {
        let mut steps = full.clone();
        steps.remove(removed);
        let err = graph(steps).validate().unwrap_err();
        assert!(
            matches!(err, DependencyError::UnsatisfiedInput { ref step, .. } if step == "newsletter_writer"),
            "unexpected error after removing step {removed}: {err}"
        );
    }
}

#[test]
fn validation_is_idempotent() {
    let good = graph(vec![price_step(), news_step(), writer_step()]);
    assert_eq!(good.validate(), good.validate());

    let bad = graph(vec![price_step(), writer_step()]);
    let first = bad.validate();
    let second = bad.validate();
    assert!(first.is_err());
    assert_eq!(first, second);
}

#[tokio::test]
async fn successful_run_produces_all_keys() {
    let graph = graph(vec![price_step(), news_step(), writer_step()]);
    let mut runner = Runner::new(Arc::new(graph)).unwrap();

    let result = runner.run(seed()).await.unwrap();

    assert_eq!(result.status, RunStatus::Succeeded);
    assert!(result.failure.is_none());
    let keys: Vec<&str> = result.final_context.keys().collect();
    assert_eq!(keys, vec!["news_summary", "newsletter", "price_trend", "ticket"]);
    assert!(
        result
            .output("newsletter")
            .is_some_and(|n| n.contains("AAPL, price UP"))
    );
    assert!(result.steps.iter().all(|s| s.status == StepStatus::Succeeded));
}

#[tokio::test]
async fn failing_news_step_halts_the_run() {
    let news = Arc::new(AlwaysFailing::new(news_spec()));
    let graph = graph(vec![price_step(), news.clone() as Arc<dyn Step>, writer_step()]);
    let mut runner = Runner::new(Arc::new(graph)).unwrap();

    let result = runner.run(seed()).await.unwrap();

    assert_eq!(result.status, RunStatus::Failed);
    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.step_name, "news_analyst");
    assert_eq!(failure.kind, "capability");

    assert!(result.final_context.contains_key("ticket"));
    assert!(result.final_context.contains_key("price_trend"));
    assert!(!result.final_context.contains_key("news_summary"));
    assert!(!result.final_context.contains_key("newsletter"));

    // the writer never ran
    assert_eq!(result.steps.len(), 2);
    assert_eq!(news.calls(), 10);

    match result.into_error() {
        Some(Error::Execution { step, source }) => {
            assert_eq!(step, "news_analyst");
            assert!(source.is_retryable());
        }
        other => panic!("expected execution error, got {other:?}"),
    }
}

#[tokio::test]
async fn always_failing_step_is_bounded_by_its_budget() {
    for budget in [1, 2, 7] {
        let spec = StepSpec::builder("flaky")
            .input("ticket")
            .output("price_trend")
            .max_iterations(budget)
            .build()
            .unwrap();
        let step = Arc::new(AlwaysFailing::new(spec));
        let mut runner =
            Runner::new(Arc::new(graph(vec![step.clone() as Arc<dyn Step>]))).unwrap();

        let result = runner.run(seed()).await.unwrap();

        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(step.calls(), budget);
        assert_eq!(result.steps[0].attempts, budget);
    }
}

#[tokio::test]
async fn concurrent_runs_do_not_share_context() {
    let graph = Arc::new(graph(vec![price_step(), news_step(), writer_step()]));

    let run = |ticker: &'static str| {
        let graph = Arc::clone(&graph);
        async move {
            let mut runner = Runner::new(graph).unwrap();
            runner
                .run(Context::new().with("ticket", ticker).unwrap())
                .await
                .unwrap()
        }
    };

    let (aapl, msft) = tokio::join!(run("AAPL"), run("MSFT"));
    assert_ne!(aapl.run_id, msft.run_id);
    assert_eq!(aapl.output("price_trend"), Some("AAPL, price UP"));
    assert_eq!(msft.output("price_trend"), Some("MSFT, price UP"));
}
