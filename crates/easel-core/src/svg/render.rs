//! Render compatibility test: an isolated surface polled against a deadline.

use std::cell::Cell;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

/// Pause between polls of a pending job.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// State of a render job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderPoll {
    Pending,
    /// Finished, with the number of drawable primitives produced.
    Ready(usize),
    Failed(String),
}

/// A throwaway surface that loads markup and reports what it drew.
pub trait RenderSurface {
    fn begin(&mut self, markup: &str);
    fn poll(&mut self) -> RenderPoll;
    /// Abandon the current job.
    fn cancel(&mut self);
}

/// Monotonic time source.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Wall clock measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Deterministic clock that advances by `step` every time it is read.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Cell<Duration>,
    step: Duration,
}

impl ManualClock {
    pub fn new(step: Duration) -> Self {
        Self {
            now: Cell::new(Duration::ZERO),
            step,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        let now = self.now.get();
        self.now.set(now + self.step);
        now
    }
}

#[derive(Debug, Default)]
enum Job {
    #[default]
    Idle,
    Running(Receiver<RenderPoll>),
    Done(RenderPoll),
}

/// [`RenderSurface`] that builds a `usvg` tree on a worker thread.
///
/// A cancelled job is detached: the worker runs to completion and its result
/// is dropped.
#[derive(Debug, Default)]
pub struct UsvgSurface {
    job: Job,
}

impl UsvgSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

fn count_primitives(group: &usvg::Group) -> usize {
    group
        .children()
        .iter()
        .map(|node| match node {
            usvg::Node::Group(g) => count_primitives(g),
            usvg::Node::Path(_) | usvg::Node::Image(_) | usvg::Node::Text(_) => 1,
        })
        .sum()
}

fn build_tree(markup: &str) -> RenderPoll {
    let options = usvg::Options::default();
    match usvg::Tree::from_str(markup, &options) {
        Ok(tree) => RenderPoll::Ready(count_primitives(tree.root())),
        Err(e) => RenderPoll::Failed(e.to_string()),
    }
}

impl RenderSurface for UsvgSurface {
    fn begin(&mut self, markup: &str) {
        let (tx, rx) = mpsc::channel();
        let markup = markup.to_string();
        let spawned = thread::Builder::new()
            .name("svg-render-test".to_string())
            .spawn(move || {
                // The receiver is gone if the job was cancelled.
                let _ = tx.send(build_tree(&markup));
            });
        self.job = match spawned {
            Ok(_) => Job::Running(rx),
            Err(e) => Job::Done(RenderPoll::Failed(format!("cannot start render worker: {e}"))),
        };
    }

    fn poll(&mut self) -> RenderPoll {
        let received = match &self.job {
            Job::Idle => return RenderPoll::Failed("no render job".to_string()),
            Job::Done(result) => return result.clone(),
            Job::Running(rx) => match rx.try_recv() {
                Ok(result) => result,
                Err(TryRecvError::Empty) => return RenderPoll::Pending,
                Err(TryRecvError::Disconnected) => {
                    RenderPoll::Failed("render worker exited without a result".to_string())
                }
            },
        };
        self.job = Job::Done(received.clone());
        received
    }

    fn cancel(&mut self) {
        self.job = Job::Idle;
    }
}

/// Load `markup` into `surface` and wait for it, up to `timeout`.
///
/// Compatible means the surface finished in time and drew at least one
/// primitive. An expired job is cancelled.
pub fn run_with_deadline(
    surface: &mut dyn RenderSurface,
    clock: &dyn Clock,
    timeout: Duration,
    markup: &str,
) -> bool {
    let started = clock.now();
    surface.begin(markup);
    loop {
        match surface.poll() {
            RenderPoll::Ready(0) => {
                log::warn!("Render test produced no drawable primitives");
                return false;
            }
            RenderPoll::Ready(count) => {
                log::debug!("Render test drew {} primitives", count);
                return true;
            }
            RenderPoll::Failed(reason) => {
                log::warn!("Render test failed: {}", reason);
                return false;
            }
            RenderPoll::Pending => {
                if clock.now().saturating_sub(started) >= timeout {
                    surface.cancel();
                    log::warn!("Render test timed out after {:?}", timeout);
                    return false;
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    }
}
