use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::browser::PageDriver;
use crate::poll::pause;

/// One forward sweep over a lazy-loading listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollPass {
    pub steps: u32,
    pub step_px: u32,
    pub step_pause: Duration,
    pub bottom_pause: Duration,
    pub top_pause: Duration,
}

/// The scroll sequence run before discovery. Each pass scrolls forward in
/// fixed increments, jumps to the bottom and then returns to the top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollPlan {
    pub settle: Duration,
    pub passes: Vec<ScrollPass>,
}

impl Default for ScrollPlan {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(3),
            passes: vec![
                ScrollPass {
                    steps: 10,
                    step_px: 1000,
                    step_pause: Duration::from_millis(500),
                    bottom_pause: Duration::from_secs(2),
                    top_pause: Duration::from_secs(2),
                },
                ScrollPass {
                    steps: 5,
                    step_px: 1500,
                    step_pause: Duration::from_millis(300),
                    bottom_pause: Duration::from_secs(2),
                    top_pause: Duration::from_secs(3),
                },
            ],
        }
    }
}

impl ScrollPlan {
    #[cfg(test)]
    pub fn without_pauses(mut self) -> Self {
        self.settle = Duration::ZERO;
        for pass in &mut self.passes {
            pass.step_pause = Duration::ZERO;
            pass.bottom_pause = Duration::ZERO;
            pass.top_pause = Duration::ZERO;
        }
        self
    }
}

/// What a stabilization run managed to do. Never an error: an under-loaded
/// listing still goes to discovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stabilization {
    pub scripts_run: usize,
    pub script_failures: usize,
    pub interrupted: bool,
}

impl Stabilization {
    pub fn is_complete(&self) -> bool {
        self.script_failures == 0 && !self.interrupted
    }
}

struct Scroller<'a, P: PageDriver + ?Sized> {
    page: &'a P,
    cancel: &'a CancellationToken,
    status: Stabilization,
}

impl<P: PageDriver + ?Sized> Scroller<'_, P> {
    /// Run one scroll script then pause. Returns false once interrupted.
    async fn step(&mut self, script: &str, after: Duration) -> bool {
        self.status.scripts_run += 1;
        if let Err(e) = self.page.run_script(script).await {
            self.status.script_failures += 1;
            tracing::debug!(error = %e, script, "scroll script failed");
        }
        if !pause(after, self.cancel).await {
            self.status.interrupted = true;
            return false;
        }
        true
    }
}

/// Drive the listing through `plan` so lazily attached albums are rendered.
pub async fn stabilize<P>(page: &P, plan: &ScrollPlan, cancel: &CancellationToken) -> Stabilization
where
    P: PageDriver + ?Sized,
{
    let mut scroller = Scroller {
        page,
        cancel,
        status: Stabilization::default(),
    };

    if !pause(plan.settle, cancel).await {
        scroller.status.interrupted = true;
        return scroller.status;
    }

    'passes: for (n, pass) in plan.passes.iter().enumerate() {
        tracing::debug!(pass = n + 1, steps = pass.steps, step_px = pass.step_px, "scroll pass");
        for i in 1..=pass.steps {
            let script = format!("window.scrollTo(0, {});", u64::from(i) * u64::from(pass.step_px));
            if !scroller.step(&script, pass.step_pause).await {
                break 'passes;
            }
        }
        if !scroller
            .step("window.scrollTo(0, document.body.scrollHeight);", pass.bottom_pause)
            .await
        {
            break;
        }
        if !scroller.step("window.scrollTo(0, 0);", pass.top_pause).await {
            break;
        }
    }

    let status = scroller.status;
    if status.script_failures > 0 {
        tracing::warn!(
            failures = status.script_failures,
            scripts = status.scripts_run,
            "Some scroll steps failed; the album list may be incomplete"
        );
    }
    status
}
