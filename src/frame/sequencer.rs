//! Serialized pause/resume transitions
//!
//! Session pause and resume may block on I/O, so they are allowed to run off the
//! render thread. [`PauseResumeSequencer`] runs queued tasks strictly one after
//! another in submission order, and reports each completion on the render thread
//! before the next task is started.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::TaskError;

/// Type-erased closure handed to an [`Executor`]
pub type Job = Box<dyn FnOnce() + Send>;

/// Fallible unit of work within a sequenced task
pub type Work = Box<dyn FnOnce() -> Result<(), TaskError> + Send>;

/// Somewhere jobs can run
pub trait Executor: Send + Sync {
    fn execute(&self, job: Job);
}

/// Runs jobs immediately on the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, job: Job) {
        job();
    }
}

/// Runs each job on a fresh background thread
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadExecutor;

impl Executor for ThreadExecutor {
    fn execute(&self, job: Job) {
        let job = Arc::new(Mutex::new(Some(job)));
        let spawned = Arc::clone(&job);
        let result = std::thread::Builder::new()
            .name("ar-session-lifecycle".to_string())
            .spawn(move || {
                if let Some(job) = spawned.lock().take() {
                    job();
                }
            });
        if let Err(err) = result {
            log::error!("Failed to spawn lifecycle thread, running inline: {err}");
            if let Some(job) = job.lock().take() {
                job();
            }
        }
    }
}

/// Jobs waiting for the render loop
///
/// The render thread owns the queue and drains it with [`pump`](Self::pump);
/// any thread may post to it through a [`RenderThreadExecutor`].
pub struct RenderThreadQueue {
    sender: mpsc::Sender<Job>,
    receiver: mpsc::Receiver<Job>,
}

impl RenderThreadQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { sender, receiver }
    }

    pub fn executor(&self) -> RenderThreadExecutor {
        RenderThreadExecutor {
            sender: Mutex::new(self.sender.clone()),
        }
    }

    /// Run every queued job, including ones posted while pumping.
    pub fn pump(&self) -> usize {
        let mut count = 0;
        while let Ok(job) = self.receiver.try_recv() {
            job();
            count += 1;
        }
        count
    }
}

impl Default for RenderThreadQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Posts jobs to a [`RenderThreadQueue`]
pub struct RenderThreadExecutor {
    sender: Mutex<mpsc::Sender<Job>>,
}

impl Executor for RenderThreadExecutor {
    fn execute(&self, job: Job) {
        if self.sender.lock().send(job).is_err() {
            log::warn!("Render thread queue dropped; discarding job");
        }
    }
}

/// Validity flag of the object that queued a task
///
/// Cloning shares the flag. Once invalidated, every queued continuation that
/// checks the token completes as [`TaskError::Cancelled`] without acting.
#[derive(Debug, Clone)]
pub struct LifecycleToken {
    valid: Arc<AtomicBool>,
}

impl LifecycleToken {
    pub fn new() -> Self {
        Self {
            valid: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn check(&self) -> Result<(), TaskError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(TaskError::Cancelled)
        }
    }
}

impl Default for LifecycleToken {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct TaskState {
    result: Mutex<Option<Result<(), TaskError>>>,
    done: Condvar,
}

impl TaskState {
    fn complete(&self, result: Result<(), TaskError>) {
        *self.result.lock() = Some(result);
        self.done.notify_all();
    }
}

/// Completes the task as [`TaskError::Cancelled`] if the job carrying it is
/// dropped without running, e.g. after the render thread queue is gone.
struct PendingCompletion(Option<Arc<TaskState>>);

impl PendingCompletion {
    fn new(state: Arc<TaskState>) -> Self {
        Self(Some(state))
    }

    fn disarm(&mut self) -> Option<Arc<TaskState>> {
        self.0.take()
    }
}

impl Drop for PendingCompletion {
    fn drop(&mut self) {
        if let Some(state) = self.0.take() {
            log::debug!("Lifecycle transition dropped before completion");
            state.complete(Err(TaskError::Cancelled));
        }
    }
}

/// Observable completion of one sequenced task
#[derive(Clone)]
pub struct TaskHandle {
    state: Arc<TaskState>,
}

impl TaskHandle {
    pub fn is_done(&self) -> bool {
        self.state.result.lock().is_some()
    }

    /// `None` while the task is pending
    pub fn result(&self) -> Option<Result<(), TaskError>> {
        self.state.result.lock().clone()
    }

    /// Block until completion or timeout. Completion is delivered on the render
    /// thread, so this must not be called from it.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<(), TaskError>> {
        let mut result = self.state.result.lock();
        if result.is_none() {
            self.state.done.wait_for(&mut result, timeout);
        }
        result.clone()
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("result", &self.result())
            .finish()
    }
}

struct Step {
    executor: Arc<dyn Executor>,
    work: Work,
}

/// Ordered steps, each on its own executor. A failing step ends the task.
#[derive(Default)]
pub struct SequencedTask {
    steps: VecDeque<Step>,
}

impl SequencedTask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(
        mut self,
        executor: Arc<dyn Executor>,
        work: impl FnOnce() -> Result<(), TaskError> + Send + 'static,
    ) -> Self {
        self.steps.push_back(Step {
            executor,
            work: Box::new(work),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Default)]
struct Queue {
    pending: VecDeque<(SequencedTask, Arc<TaskState>)>,
    busy: bool,
    closed: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    render_thread: Arc<dyn Executor>,
}

/// FIFO, non-overlapping runner for lifecycle transitions
#[derive(Clone)]
pub struct PauseResumeSequencer {
    shared: Arc<Shared>,
}

impl PauseResumeSequencer {
    /// `render_thread` receives every completion
    pub fn new(render_thread: Arc<dyn Executor>) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue::default()),
                render_thread,
            }),
        }
    }

    pub fn render_thread(&self) -> Arc<dyn Executor> {
        Arc::clone(&self.shared.render_thread)
    }

    /// Queue a single-step task
    pub fn enqueue(
        &self,
        work: impl FnOnce() -> Result<(), TaskError> + Send + 'static,
        executor: Arc<dyn Executor>,
    ) -> TaskHandle {
        self.enqueue_task(SequencedTask::new().then(executor, work))
    }

    /// Queue a task; it starts once every earlier task has completed.
    pub fn enqueue_task(&self, task: SequencedTask) -> TaskHandle {
        let state = Arc::new(TaskState::default());
        let start = {
            let mut queue = self.shared.queue.lock();
            if queue.closed {
                log::warn!("Lifecycle transition enqueued after shutdown");
                state.complete(Err(TaskError::Cancelled));
                return TaskHandle { state };
            }
            queue.pending.push_back((task, Arc::clone(&state)));
            if queue.busy {
                log::debug!(
                    "Lifecycle transition queued behind {} pending",
                    queue.pending.len() - 1
                );
                false
            } else {
                queue.busy = true;
                true
            }
        };
        if start {
            start_next(&self.shared);
        }
        TaskHandle { state }
    }

    /// No task running or pending
    pub fn is_idle(&self) -> bool {
        let queue = self.shared.queue.lock();
        !queue.busy && queue.pending.is_empty()
    }

    /// Stop starting tasks. Pending tasks and any enqueued later complete as
    /// [`TaskError::Cancelled`]; a task already running completes normally, or
    /// as cancelled if its completion can no longer reach the render thread.
    pub fn shutdown(&self) {
        let cancelled: Vec<_> = {
            let mut queue = self.shared.queue.lock();
            queue.closed = true;
            queue.pending.drain(..).collect()
        };
        if !cancelled.is_empty() {
            log::debug!("Cancelling {} queued lifecycle transitions", cancelled.len());
        }
        for (_, state) in cancelled {
            state.complete(Err(TaskError::Cancelled));
        }
    }
}

fn start_next(shared: &Arc<Shared>) {
    let next = {
        let mut queue = shared.queue.lock();
        match queue.pending.pop_front() {
            Some(next) if !queue.closed => next,
            _ => {
                queue.busy = false;
                return;
            }
        }
    };
    let (task, state) = next;
    run_steps(Arc::clone(shared), task.steps, state);
}

fn run_steps(shared: Arc<Shared>, mut steps: VecDeque<Step>, state: Arc<TaskState>) {
    let Some(step) = steps.pop_front() else {
        finish(shared, state, Ok(()));
        return;
    };
    let executor = step.executor;
    let work = step.work;
    let mut pending = PendingCompletion::new(state);
    executor.execute(Box::new(move || {
        let Some(state) = pending.disarm() else {
            return;
        };
        match run_guarded(work) {
            Ok(()) => run_steps(shared, steps, state),
            Err(err) => finish(shared, state, Err(err)),
        }
    }));
}

fn finish(shared: Arc<Shared>, state: Arc<TaskState>, result: Result<(), TaskError>) {
    if let Err(err) = &result {
        log::warn!("Lifecycle transition did not complete: {err}");
    }
    let render_thread = Arc::clone(&shared.render_thread);
    let mut pending = PendingCompletion::new(state);
    render_thread.execute(Box::new(move || {
        if let Some(state) = pending.disarm() {
            state.complete(result);
            start_next(&shared);
        }
    }));
}

fn run_guarded(work: Work) -> Result<(), TaskError> {
    match catch_unwind(AssertUnwindSafe(work)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(TaskError::Panicked(message))
        }
    }
}
