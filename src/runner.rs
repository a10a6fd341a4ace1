use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::payload::JobPayload;

pub const STEP_STORY: &str = "story";
pub const STEP_TTS: &str = "tts";
pub const STEP_IMAGES: &str = "images";
pub const STEP_VIDEOS: &str = "videos";
pub const STEP_THUMBNAIL: &str = "thumbnail";
pub const STEP_FINALIZE: &str = "finalize";
pub const STEP_UPLOAD: &str = "upload";

/// The fixed pipeline order. The runner itself takes any ordered list; this
/// is the one the binary wires up.
pub const STEP_ORDER: [&str; 7] = [
    STEP_STORY,
    STEP_TTS,
    STEP_IMAGES,
    STEP_VIDEOS,
    STEP_THUMBNAIL,
    STEP_FINALIZE,
    STEP_UPLOAD,
];

/// Default pause between steps, to pace rate-limited downstream APIs.
pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(1500);

/// One named stage of the pipeline: a pure async transformation over the
/// accumulating payload. Implementations are responsible for their own
/// skip-if-exists checks; the runner re-invokes them blindly on resume.
#[async_trait]
pub trait Step: Send + Sync {
    async fn run(&self, payload: JobPayload) -> Result<JobPayload>;
}

#[derive(Debug, Clone)]
pub struct ResumePoint {
    pub step: String,
    pub payload: JobPayload,
}

/// Where to pick up a previous run. `None` means start fresh at step 0
/// with an empty payload. Lookup failures are the lookup's problem; by the
/// time it answers the runner there is either a resume point or nothing.
#[async_trait]
pub trait ResumeLookup: Send + Sync {
    async fn resume_point(&self) -> Option<ResumePoint>;
}

#[async_trait]
pub trait CompletionHook: Send + Sync {
    async fn on_complete(&self, payload: &JobPayload) -> Result<()>;
}

pub type StepLogger = Arc<dyn Fn(&str) + Send + Sync>;

/// Straight-line sequential executor over a fixed step list. No DAG, no
/// fan-out: each step's output is the next step's input.
pub struct PipelineRunner {
    order: Vec<String>,
    steps: HashMap<String, Arc<dyn Step>>,
    step_delay: Duration,
    logger: Option<StepLogger>,
    on_complete: Option<Arc<dyn CompletionHook>>,
}

impl PipelineRunner {
    pub fn new<S: Into<String>>(order: impl IntoIterator<Item = S>) -> Self {
        Self {
            order: order.into_iter().map(Into::into).collect(),
            steps: HashMap::new(),
            step_delay: DEFAULT_STEP_DELAY,
            logger: None,
            on_complete: None,
        }
    }

    pub fn register(mut self, name: &str, step: Arc<dyn Step>) -> Self {
        self.steps.insert(name.to_string(), step);
        self
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    pub fn with_logger(mut self, logger: StepLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_completion_hook(mut self, hook: Arc<dyn CompletionHook>) -> Self {
        self.on_complete = Some(hook);
        self
    }

    /// Execute the pipeline from wherever `lookup` says to pick up.
    ///
    /// A resume step name that is not in the ordered list falls back to
    /// index 0, keeping the supplied payload; that is the one cross-check
    /// against a buggy lookup. Step errors propagate out immediately and
    /// nothing after a failed step runs. The completion hook fires once,
    /// after the loop, only when the final payload carries anything.
    pub async fn run(&self, lookup: &dyn ResumeLookup) -> Result<JobPayload> {
        let (start_index, mut payload) = match lookup.resume_point().await {
            Some(point) => match self.order.iter().position(|name| *name == point.step) {
                Some(index) => (index, point.payload),
                None => {
                    warn!(step = %point.step, "resume step not in pipeline order, starting from the top");
                    (0, point.payload)
                }
            },
            None => (0, JobPayload::default()),
        };

        for (index, name) in self.order.iter().enumerate().skip(start_index) {
            if let Some(logger) = &self.logger {
                logger(name.as_str());
            }

            // Placeholder names with no registered step are skipped, not
            // treated as an error.
            if let Some(step) = self.steps.get(name) {
                payload = step.run(payload).await?;
            }

            if index + 1 < self.order.len() && !self.step_delay.is_zero() {
                tokio::time::sleep(self.step_delay).await;
            }
        }

        if let Some(hook) = &self.on_complete {
            if !payload.is_empty() {
                hook.on_complete(&payload).await?;
            }
        }

        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct NullLookup;

    #[async_trait]
    impl ResumeLookup for NullLookup {
        async fn resume_point(&self) -> Option<ResumePoint> {
            None
        }
    }

    struct FixedLookup(ResumePoint);

    #[async_trait]
    impl ResumeLookup for FixedLookup {
        async fn resume_point(&self) -> Option<ResumePoint> {
            Some(self.0.clone())
        }
    }

    /// Records every invocation and tags the payload so ordering and
    /// pass-through are observable.
    struct SpyStep {
        name: &'static str,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl SpyStep {
        fn new(name: &'static str, calls: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                calls: Arc::clone(calls),
            })
        }
    }

    #[async_trait]
    impl Step for SpyStep {
        async fn run(&self, mut payload: JobPayload) -> Result<JobPayload> {
            self.calls.lock().unwrap().push(self.name.to_string());
            payload.paragraphs.push(self.name.to_string());
            Ok(payload)
        }
    }

    struct FailingStep;

    #[async_trait]
    impl Step for FailingStep {
        async fn run(&self, _payload: JobPayload) -> Result<JobPayload> {
            anyhow::bail!("quota exhausted")
        }
    }

    struct EmptyingStep;

    #[async_trait]
    impl Step for EmptyingStep {
        async fn run(&self, _payload: JobPayload) -> Result<JobPayload> {
            Ok(JobPayload::default())
        }
    }

    struct CountingHook {
        count: AtomicUsize,
    }

    #[async_trait]
    impl CompletionHook for CountingHook {
        async fn on_complete(&self, _payload: &JobPayload) -> Result<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn runner_with_spies(
        order: &[&'static str],
        calls: &Arc<Mutex<Vec<String>>>,
    ) -> PipelineRunner {
        let mut runner =
            PipelineRunner::new(order.iter().copied()).with_step_delay(Duration::ZERO);
        for name in order {
            runner = runner.register(name, SpyStep::new(name, calls));
        }
        runner
    }

    #[tokio::test]
    async fn resume_starts_at_named_step() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let runner = runner_with_spies(&["story", "tts", "images"], &calls);

        let lookup = FixedLookup(ResumePoint {
            step: "tts".to_string(),
            payload: JobPayload::default(),
        });
        runner.run(&lookup).await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["tts", "images"]);
    }

    #[tokio::test]
    async fn unknown_resume_name_falls_back_to_start() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let runner = runner_with_spies(&["story", "tts", "images"], &calls);

        let lookup = FixedLookup(ResumePoint {
            step: "not-a-step".to_string(),
            payload: JobPayload::default(),
        });
        runner.run(&lookup).await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["story", "tts", "images"]);
    }

    #[tokio::test]
    async fn no_resume_state_runs_everything() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let runner = runner_with_spies(&["story", "tts"], &calls);

        runner.run(&NullLookup).await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["story", "tts"]);
    }

    #[tokio::test]
    async fn unregistered_step_is_skipped_and_payload_passes_through() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let runner = PipelineRunner::new(["story", "ghost", "tts"])
            .with_step_delay(Duration::ZERO)
            .register("story", SpyStep::new("story", &calls))
            .register("tts", SpyStep::new("tts", &calls));

        let payload = runner.run(&NullLookup).await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["story", "tts"]);
        assert_eq!(payload.paragraphs, vec!["story", "tts"]);
    }

    #[tokio::test]
    async fn step_error_propagates_and_halts() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let runner = PipelineRunner::new(["story", "tts", "images"])
            .with_step_delay(Duration::ZERO)
            .register("story", SpyStep::new("story", &calls))
            .register("tts", Arc::new(FailingStep))
            .register("images", SpyStep::new("images", &calls));

        let err = runner.run(&NullLookup).await.unwrap_err();
        assert!(err.to_string().contains("quota exhausted"));
        assert_eq!(*calls.lock().unwrap(), vec!["story"]);
    }

    #[tokio::test]
    async fn completion_hook_fires_once_for_populated_payload() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let hook = Arc::new(CountingHook {
            count: AtomicUsize::new(0),
        });
        let runner = PipelineRunner::new(["story", "tts"])
            .with_step_delay(Duration::ZERO)
            .register("story", SpyStep::new("story", &calls))
            .register("tts", SpyStep::new("tts", &calls))
            .with_completion_hook(Arc::clone(&hook) as Arc<dyn CompletionHook>);

        runner.run(&NullLookup).await.unwrap();
        assert_eq!(hook.count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn completion_hook_skipped_for_empty_payload() {
        let hook = Arc::new(CountingHook {
            count: AtomicUsize::new(0),
        });
        let runner = PipelineRunner::new(["story"])
            .with_step_delay(Duration::ZERO)
            .register("story", Arc::new(EmptyingStep))
            .with_completion_hook(Arc::clone(&hook) as Arc<dyn CompletionHook>);

        runner.run(&NullLookup).await.unwrap();
        assert_eq!(hook.count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn logger_sees_every_step_name_in_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let logged: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let logged_clone = Arc::clone(&logged);

        let runner = PipelineRunner::new(["story", "ghost", "tts"])
            .with_step_delay(Duration::ZERO)
            .register("story", SpyStep::new("story", &calls))
            .register("tts", SpyStep::new("tts", &calls))
            .with_logger(Arc::new(move |name| {
                logged_clone.lock().unwrap().push(name.to_string());
            }));

        runner.run(&NullLookup).await.unwrap();
        assert_eq!(*logged.lock().unwrap(), vec!["story", "ghost", "tts"]);
    }

    #[tokio::test]
    async fn resume_payload_is_kept() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let runner = runner_with_spies(&["story", "tts", "images"], &calls);

        let mut initial = JobPayload::default();
        initial.title = Some("The Lighthouse".to_string());
        initial.audio_files = vec!["audio/001.mp3".into()];

        let lookup = FixedLookup(ResumePoint {
            step: "images".to_string(),
            payload: initial,
        });
        let payload = runner.run(&lookup).await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["images"]);
        assert_eq!(payload.title.as_deref(), Some("The Lighthouse"));
        assert_eq!(payload.audio_files.len(), 1);
    }
}
