use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::context::{untracked, with_runtime};
use crate::dependencies::{DebuggerEvent, Dep, DepBody};
use crate::scheduler::Job;

pub type SchedulerFn = Rc<dyn Fn(&Effect)>;
pub type DebuggerHook = Rc<dyn Fn(&DebuggerEvent)>;

/// How an effect is created and re-run.
#[derive(Clone, Default)]
pub struct EffectOptions {
	/// Do not run on creation.
	pub lazy: bool,
	/// Marks a derived-value runner; those are notified before direct effects.
	pub computed: bool,
	/// Called instead of re-running the effect when a dependency changes.
	pub scheduler: Option<SchedulerFn>,
	pub on_track: Option<DebuggerHook>,
	pub on_trigger: Option<DebuggerHook>,
	pub on_stop: Option<Rc<dyn Fn()>>,
}

impl EffectOptions {
	pub fn lazy(mut self) -> Self {
		self.lazy = true;
		self
	}

	pub fn computed(mut self) -> Self {
		self.computed = true;
		self
	}

	pub fn scheduler(mut self, scheduler: impl Fn(&Effect) + 'static) -> Self {
		self.scheduler = Some(Rc::new(scheduler));
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

	pub fn on_stop(mut self, hook: impl Fn() + 'static) -> Self {
		self.on_stop = Some(Rc::new(hook));
		self
	}
}

/// A re-runnable computation that records what it reads.
///
/// Cloning gives another handle to the same effect. An effect stays
/// subscribed to whatever it read on its last run until it is stopped,
/// regardless of how many handles are alive.
#[derive(Clone)]
pub struct Effect {
	pub(crate) body: Rc<EffectBody>,
}

pub(crate) struct EffectBody {
	func: Rc<dyn Fn()>,
	active: Cell<bool>,
	/// Set while the effect re-enters itself untracked.
	reentered: Cell<bool>,
	deps: RefCell<SmallVec<[Weak<DepBody>; 4]>>,
	options: EffectOptions,
	job: OnceCell<Job>,
}

/// Creates an effect and runs it once.
pub fn effect(func: impl Fn() + 'static) -> Effect {
	effect_with(func, EffectOptions::default())
}

pub fn effect_with(func: impl Fn() + 'static, options: EffectOptions) -> Effect {
	Effect::create(Rc::new(func), options)
}

/// Creates a new effect around the function of an existing one.
pub fn effect_from(existing: &Effect, options: EffectOptions) -> Effect {
	Effect::create(existing.raw(), options)
}

pub fn stop(effect: &Effect) {
	effect.stop();
}

impl Effect {
	fn create(func: Rc<dyn Fn()>, options: EffectOptions) -> Effect {
		let lazy = options.lazy;
		let effect = Effect {
			body: Rc::new(EffectBody {
				func,
				active: Cell::new(true),
				reentered: Cell::new(false),
				deps: RefCell::new(SmallVec::new()),
				options,
				job: OnceCell::new(),
			}),
		};

		if !lazy {
			effect.run();
		}
		effect
	}

	/// Runs the function, re-collecting its dependencies.
	///
	/// A stopped effect still runs, but records nothing. An effect that
	/// re-enters itself runs once more untracked; deeper re-entry is
	/// dropped.
	pub fn run(&self) {
		if !self.is_active() {
			return (self.body.func)();
		}

		if with_runtime(|rt| rt.is_running(self)) {
			if self.body.reentered.replace(true) {
				return;
			}
			let _reset = ResetOnDrop(&self.body.reentered);
			return untracked(|| (self.body.func)());
		}

		self.cleanup();
		let _frame = StackFrame::push(self);
		(self.body.func)();
	}

	/// Unsubscribes from every dep and fires `on_stop`. Idempotent.
	pub fn stop(&self) {
		if self.is_active() {
			self.cleanup();
			if let Some(on_stop) = &self.body.options.on_stop {
				on_stop();
			}
			self.body.active.set(false);
		}
	}

	pub fn is_active(&self) -> bool {
		self.body.active.get()
	}

	pub fn ptr_eq(&self, other: &Effect) -> bool {
		Rc::ptr_eq(&self.body, &other.body)
	}

	/// The function this effect runs.
	pub fn raw(&self) -> Rc<dyn Fn()> {
		self.body.func.clone()
	}

	/// Number of deps the effect is currently linked into.
	pub fn dep_count(&self) -> usize {
		self.body
			.deps
			.borrow()
			.iter()
			.filter(|dep| dep.strong_count() > 0)
			.count()
	}

	/// A job with stable identity that runs this effect, for the scheduler.
	pub fn job(&self) -> Job {
		self.body
			.job
			.get_or_init(|| {
				let weak = Rc::downgrade(&self.body);
				Job::new(move || {
					if let Some(body) = weak.upgrade() {
						Effect { body }.run();
					}
				})
			})
			.clone()
	}

	pub fn downgrade(&self) -> WeakEffect {
		WeakEffect(Rc::downgrade(&self.body))
	}

	pub(crate) fn options(&self) -> &EffectOptions {
		&self.body.options
	}

	pub(crate) fn is_computed(&self) -> bool {
		self.body.options.computed
	}

	pub(crate) fn push_dep(&self, dep: &Dep) {
		self.body.deps.borrow_mut().push(dep.downgrade());
	}

	pub(crate) fn deps(&self) -> Vec<Dep> {
		self.body
			.deps
			.borrow()
			.iter()
			.filter_map(Weak::upgrade)
			.map(Dep::from_body)
			.collect()
	}

	fn cleanup(&self) {
		let deps = std::mem::take(&mut *self.body.deps.borrow_mut());
		for dep in deps.iter().filter_map(Weak::upgrade) {
			dep.unsubscribe(&self.body);
		}
	}
}

impl fmt::Debug for Effect {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Effect")
			.field("active", &self.is_active())
			.field("computed", &self.is_computed())
			.field("deps", &self.dep_count())
			.finish()
	}
}

#[derive(Clone)]
pub struct WeakEffect(Weak<EffectBody>);

impl WeakEffect {
	pub fn upgrade(&self) -> Option<Effect> {
		self.0.upgrade().map(|body| Effect { body })
	}
}

/// Keeps the effect on the running stack with tracking enabled for as long
/// as it lives; unwinding through a panicking effect pops it as well.
struct StackFrame {
	should_track: bool,
}

impl StackFrame {
	fn push(effect: &Effect) -> Self {
		with_runtime(|rt| {
			rt.effect_stack.borrow_mut().push(effect.clone());
			StackFrame {
				should_track: rt.should_track.replace(true),
			}
		})
	}
}

impl Drop for StackFrame {
	fn drop(&mut self) {
		let popped = with_runtime(|rt| {
			rt.should_track.set(self.should_track);
			rt.effect_stack.borrow_mut().pop()
		});
		drop(popped);
	}
}

struct ResetOnDrop<'a>(&'a Cell<bool>);

impl Drop for ResetOnDrop<'_> {
	fn drop(&mut self) {
		self.0.set(false);
	}
}
