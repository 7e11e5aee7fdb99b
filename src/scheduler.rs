use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use fxhash::FxHashMap;
use indexmap::IndexSet;

use crate::addr::RcAddr;
use crate::context::with_runtime;
use crate::effect::Effect;
use crate::error::{Error, Result};

/// How many times a single job may run within one flush cycle.
pub const RECURSION_LIMIT: usize = 100;

/// A unit of deferred work. Two jobs are the same job when they share the
/// same closure, which is what queue dedupe relies on.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Job(RcAddr<dyn Fn()>);

impl Job {
	pub fn new(func: impl Fn() + 'static) -> Self {
		let func: Rc<dyn Fn()> = Rc::new(func);
		Job(RcAddr::new(func))
	}

	pub fn run(&self) {
		let func: &dyn Fn() = &**self.0;
		func()
	}
}

impl fmt::Debug for Job {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Job({:#x})", self.0.addr())
	}
}

enum Task {
	Flush,
	Callback(Box<dyn FnOnce()>),
}

#[derive(Default)]
pub(crate) struct SchedulerState {
	queue: RefCell<VecDeque<Job>>,
	post_flush: RefCell<Vec<Job>>,
	/// The deferred boundary: tasks run in order when the thread ticks.
	tasks: RefCell<VecDeque<Task>>,
	flushing: Cell<bool>,
	flush_queued: Cell<bool>,
	batch_depth: Cell<usize>,
	#[cfg(target_arch = "wasm32")]
	pub(crate) microtask_queued: Cell<bool>,
}

fn with_scheduler<R>(func: impl FnOnce(&SchedulerState) -> R) -> R {
	with_runtime(|rt| func(&rt.scheduler))
}

/// Queues `job` for the next flush unless it is already pending.
pub fn queue_job(job: Job) {
	let request = with_scheduler(|s| {
		let mut queue = s.queue.borrow_mut();
		if queue.contains(&job) {
			return false;
		}
		queue.push_back(job);
		!s.flushing.get()
	});
	if request {
		request_flush();
	}
}

/// Scheduler for effects that should re-run at the next flush rather than
/// synchronously: `EffectOptions::default().scheduler(queue_effect)`.
pub fn queue_effect(effect: &Effect) {
	queue_job(effect.job());
}

/// Queues `job` to run once after the job queue drains.
pub fn queue_post_flush_cb(job: Job) {
	let request = with_scheduler(|s| {
		s.post_flush.borrow_mut().push(job);
		!s.flushing.get()
	});
	if request {
		request_flush();
	}
}

/// Runs `func` at the deferred boundary, after any flush already queued.
pub fn next_tick(func: impl FnOnce() + 'static) {
	enqueue(Task::Callback(Box::new(func)));
}

/// Drains the deferred queue: pending flushes and `next_tick` callbacks.
///
/// Returns an error when a job exceeds [`RECURSION_LIMIT`]; the remaining
/// jobs of that flush are dropped.
pub fn tick() -> Result<()> {
	loop {
		let task = with_scheduler(|s| s.tasks.borrow_mut().pop_front());
		match task {
			None => return Ok(()),
			Some(Task::Flush) => flush_jobs()?,
			Some(Task::Callback(func)) => func(),
		}
	}
}

/// Runs `func`, then ticks once the outermost batch completes.
pub fn batch<R>(func: impl FnOnce() -> R) -> Result<R> {
	struct Depth;

	impl Drop for Depth {
		fn drop(&mut self) {
			with_scheduler(|s| s.batch_depth.set(s.batch_depth.get() - 1));
		}
	}

	let is_root = with_scheduler(|s| {
		let depth = s.batch_depth.get();
		s.batch_depth.set(depth + 1);
		depth == 0
	});
	let depth = Depth;
	let result = func();
	drop(depth);

	if is_root {
		tick()?;
	}
	Ok(result)
}

pub fn in_batch() -> bool {
	with_scheduler(|s| s.batch_depth.get() > 0)
}

fn request_flush() {
	let first = with_scheduler(|s| !s.flush_queued.replace(true));
	if first {
		enqueue(Task::Flush);
	}
}

fn enqueue(task: Task) {
	with_scheduler(|s| s.tasks.borrow_mut().push_back(task));

	#[cfg(target_arch = "wasm32")]
	crate::microtask::schedule_tick();
}

/// Clears the flushing flag however the flush ends.
struct Flushing;

impl Flushing {
	fn start() -> Self {
		with_scheduler(|s| {
			s.flush_queued.set(false);
			s.flushing.set(true);
		});
		Flushing
	}
}

impl Drop for Flushing {
	fn drop(&mut self) {
		with_scheduler(|s| s.flushing.set(false));
	}
}

fn flush_jobs() -> Result<()> {
	let _flushing = Flushing::start();
	let mut seen: FxHashMap<Job, usize> = FxHashMap::default();

	loop {
		let mut ran = 0usize;
		while let Some(job) = with_scheduler(|s| s.queue.borrow_mut().pop_front()) {
			let count = seen.entry(job.clone()).or_insert(0);
			*count += 1;
			if *count > RECURSION_LIMIT {
				abandon_flush();
				tracing::error!(?job, limit = RECURSION_LIMIT, "maximum recursive updates exceeded");
				return Err(Error::RecursionLimit {
					limit: RECURSION_LIMIT,
				});
			}
			job.run();
			ran += 1;
		}

		let post = flush_post_flush_cbs();
		tracing::debug!(jobs = ran, post_flush = post, "flushed");

		let settled = with_scheduler(|s| {
			s.queue.borrow().is_empty() && s.post_flush.borrow().is_empty()
		});
		if settled {
			return Ok(());
		}
	}
}

fn flush_post_flush_cbs() -> usize {
	let callbacks: IndexSet<Job> = with_scheduler(|s| s.post_flush.borrow_mut().drain(..).collect());
	for callback in &callbacks {
		callback.run();
	}
	callbacks.len()
}

fn abandon_flush() {
	let (queue, post_flush) = with_scheduler(|s| {
		(
			std::mem::take(&mut *s.queue.borrow_mut()),
			std::mem::take(&mut *s.post_flush.borrow_mut()),
		)
	});
	drop((queue, post_flush));
}
