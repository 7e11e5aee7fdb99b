use std::cell::RefCell;
use std::rc::Rc;

use fxhash::FxHashSet;

use crate::computed::Computed;
use crate::dependencies::DebuggerEvent;
use crate::effect::{effect_with, DebuggerHook, Effect, EffectOptions};
use crate::r#ref::{AnyRef, Ref};
use crate::scheduler::{queue_job, queue_post_flush_cb, Job};
use crate::target::{Key, Kind, Target, TargetId};
use crate::value::Value;

/// When a watcher reacts to a change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Flush {
	/// Right away, inside the write that caused it.
	Sync,
	/// With the job queue of the next flush.
	Pre,
	/// After the job queue of the next flush has drained.
	#[default]
	Post,
}

#[derive(Clone, Default)]
pub struct WatchOptions {
	/// Track every nested member of the watched value.
	pub deep: bool,
	pub flush: Flush,
	/// Read the source now, but only call back on changes.
	pub lazy: bool,
	pub on_track: Option<DebuggerHook>,
	pub on_trigger: Option<DebuggerHook>,
}

impl WatchOptions {
	pub fn deep(mut self) -> Self {
		self.deep = true;
		self
	}

	pub fn flush(mut self, flush: Flush) -> Self {
		self.flush = flush;
		self
	}

	pub fn lazy(mut self) -> Self {
		self.lazy = true;
		self
	}

	pub fn on_track(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
		self.on_track = Some(Rc::new(hook));
		self
	}

	pub fn on_trigger(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
		self.on_trigger = Some(Rc::new(hook));
		self
	}
}

/// What a watcher reads.
#[derive(Clone)]
pub enum WatchSource {
	Getter(Rc<dyn Fn() -> Value>),
	Ref(AnyRef),
	/// Several sources, delivered as a list of their values.
	Many(Vec<WatchSource>),
}

impl WatchSource {
	pub fn getter(func: impl Fn() -> Value + 'static) -> Self {
		WatchSource::Getter(Rc::new(func))
	}

	fn read(&self) -> Value {
		match self {
			WatchSource::Getter(func) => func(),
			WatchSource::Ref(cell) => cell.value(),
			WatchSource::Many(sources) => Target::list_from(sources.iter().map(WatchSource::read)).into(),
		}
	}
}

impl From<Ref> for WatchSource {
	fn from(cell: Ref) -> Self {
		WatchSource::Ref(cell.into())
	}
}

impl From<AnyRef> for WatchSource {
	fn from(cell: AnyRef) -> Self {
		WatchSource::Ref(cell)
	}
}

impl From<Computed<Value>> for WatchSource {
	fn from(computed: Computed<Value>) -> Self {
		WatchSource::Ref(computed.into())
	}
}

impl From<Vec<WatchSource>> for WatchSource {
	fn from(sources: Vec<WatchSource>) -> Self {
		WatchSource::Many(sources)
	}
}

/// Registers the function to run before the next callback, or when the
/// watcher stops. A registered function runs at most once.
#[derive(Clone, Default)]
pub struct Cleanup {
	slot: Rc<RefCell<Option<Box<dyn FnOnce()>>>>,
}

impl Cleanup {
	pub fn register(&self, func: impl FnOnce() + 'static) {
		*self.slot.borrow_mut() = Some(Box::new(func));
	}

	fn run(&self) {
		let func = self.slot.borrow_mut().take();
		if let Some(func) = func {
			func();
		}
	}
}

/// A running watcher. Dropping the handle does not stop it.
pub struct WatchHandle {
	runner: Effect,
}

impl WatchHandle {
	pub fn stop(&self) {
		self.runner.stop();
	}

	pub fn is_active(&self) -> bool {
		self.runner.is_active()
	}

	pub fn effect(&self) -> &Effect {
		&self.runner
	}
}

type Callback = Rc<dyn Fn(&Value, &Value, &Cleanup)>;

/// Calls `callback(new, old, cleanup)` whenever the value read from
/// `source` changes.
pub fn watch(
	source: impl Into<WatchSource>,
	callback: impl Fn(&Value, &Value, &Cleanup) + 'static,
	options: WatchOptions,
) -> WatchHandle {
	let source = source.into();
	let old = match &source {
		WatchSource::Many(_) => Target::list().into(),
		_ => Value::Null,
	};
	let getter: Rc<dyn Fn() -> Value> = Rc::new(move || source.read());
	do_watch(getter, Some(Rc::new(callback)), old, Cleanup::default(), options)
}

/// Runs `func` as a tracked side effect with the watcher's flush timing.
pub fn watch_effect(func: impl Fn(&Cleanup) + 'static, options: WatchOptions) -> WatchHandle {
	let cleanup = Cleanup::default();
	let getter: Rc<dyn Fn() -> Value> = Rc::new({
		let cleanup = cleanup.clone();
		move || {
			cleanup.run();
			func(&cleanup);
			Value::Null
		}
	});
	do_watch(getter, None, Value::Null, cleanup, options)
}

fn do_watch(
	getter: Rc<dyn Fn() -> Value>,
	callback: Option<Callback>,
	old: Value,
	cleanup: Cleanup,
	options: WatchOptions,
) -> WatchHandle {
	let getter: Rc<dyn Fn() -> Value> = if options.deep {
		Rc::new(move || {
			let value = getter();
			traverse(&value, &mut FxHashSet::default());
			value
		})
	} else {
		getter
	};

	let latest = Rc::new(RefCell::new(Value::Null));
	let job_slot: Rc<RefCell<Option<Job>>> = Rc::default();
	let flush = options.flush;

	// The job owns the runner and the runner's scheduler owns the job, so
	// the pair stays alive until stop clears the slot.
	let mut effect_options = EffectOptions::default()
		.lazy()
		.computed()
		.scheduler({
			let job_slot = job_slot.clone();
			move |_| {
				let job = job_slot.borrow().clone();
				if let Some(job) = job {
					dispatch(flush, &job);
				}
			}
		})
		.on_stop({
			let cleanup = cleanup.clone();
			let job_slot = job_slot.clone();
			move || {
				cleanup.run();
				let job = job_slot.borrow_mut().take();
				drop(job);
			}
		});
	effect_options.on_track = options.on_track.clone();
	effect_options.on_trigger = options.on_trigger.clone();

	let runner = effect_with(
		{
			let latest = latest.clone();
			move || {
				let value = getter();
				*latest.borrow_mut() = value;
			}
		},
		effect_options,
	);

	let old = Rc::new(RefCell::new(old));
	let job = match callback {
		Some(callback) => Job::new({
			let runner = runner.clone();
			let latest = latest.clone();
			let old = old.clone();
			let deep = options.deep;
			move || {
				if !runner.is_active() {
					return;
				}
				runner.run();
				let new = latest.borrow().clone();
				if deep || new != *old.borrow() {
					cleanup.run();
					let previous = old.replace(new.clone());
					callback(&new, &previous, &cleanup);
				}
			}
		}),
		None => Job::new({
			let runner = runner.clone();
			move || {
				if runner.is_active() {
					runner.run();
				}
			}
		}),
	};
	*job_slot.borrow_mut() = Some(job.clone());

	if options.lazy {
		runner.run();
		let seeded = latest.borrow().clone();
		*old.borrow_mut() = seeded;
	} else {
		dispatch(flush, &job);
	}

	WatchHandle { runner }
}

fn dispatch(flush: Flush, job: &Job) {
	match flush {
		Flush::Sync => job.run(),
		Flush::Pre => queue_job(job.clone()),
		Flush::Post => queue_post_flush_cb(job.clone()),
	}
}

/// Reads every nested member of `value` so the running effect depends on
/// all of them.
fn traverse(value: &Value, seen: &mut FxHashSet<TargetId>) {
	match value {
		Value::Ref(cell) => traverse(&cell.value(), seen),
		Value::Observed(observed) => {
			if !seen.insert(observed.target().id()) {
				return;
			}
			if observed.kind() == Kind::Set {
				for member in observed.values() {
					traverse(&member, seen);
				}
			} else {
				for key in observed.keys() {
					traverse(&observed.get(Key::from(key)), seen);
				}
			}
		}
		// A raw list assembled from several sources; its members lost their
		// wrappers on the way in.
		Value::Target(target) => {
			if !seen.insert(target.id()) {
				return;
			}
			for member in target.values() {
				match member {
					Value::Target(_) => traverse(&crate::reactive(member), seen),
					other => traverse(&other, seen),
				}
			}
		}
		_ => {}
	}
}
