use std::cell::{Cell, RefCell};
use std::rc::Weak;

use fxhash::FxHashMap;

use crate::dependencies::Dep;
use crate::effect::Effect;
use crate::observed::{Mode, ObservedBody};
use crate::scheduler::SchedulerState;
use crate::target::{DepKey, TargetId};

pub(crate) type KeyToDep = FxHashMap<DepKey, Dep>;

/// Everything the engine shares between wrappers, effects and the
/// scheduler on one thread.
///
/// Borrows of the inner cells are kept short and never span a call into
/// user code, so effects and callbacks are free to re-enter the engine.
pub(crate) struct Runtime {
	/// Effects currently executing, innermost last.
	pub(crate) effect_stack: RefCell<Vec<Effect>>,
	pub(crate) should_track: Cell<bool>,
	/// While set, writes through read-only wrappers are refused.
	pub(crate) locked: Cell<bool>,
	pub(crate) graph: RefCell<FxHashMap<TargetId, KeyToDep>>,
	pub(crate) reactive_cache: RefCell<FxHashMap<TargetId, Weak<ObservedBody>>>,
	pub(crate) readonly_cache: RefCell<FxHashMap<TargetId, Weak<ObservedBody>>>,
	pub(crate) scheduler: SchedulerState,
}

impl Runtime {
	fn new() -> Self {
		Runtime {
			effect_stack: RefCell::new(Vec::new()),
			should_track: Cell::new(true),
			locked: Cell::new(true),
			graph: RefCell::new(FxHashMap::default()),
			reactive_cache: RefCell::new(FxHashMap::default()),
			readonly_cache: RefCell::new(FxHashMap::default()),
			scheduler: SchedulerState::default(),
		}
	}

	pub(crate) fn cache(&self, mode: Mode) -> &RefCell<FxHashMap<TargetId, Weak<ObservedBody>>> {
		match mode {
			Mode::Mutable => &self.reactive_cache,
			Mode::Readonly => &self.readonly_cache,
		}
	}

	pub(crate) fn active_effect(&self) -> Option<Effect> {
		self.effect_stack.borrow().last().cloned()
	}

	pub(crate) fn is_running(&self, effect: &Effect) -> bool {
		self.effect_stack.borrow().iter().any(|e| e.ptr_eq(effect))
	}
}

thread_local! {
	static RUNTIME: Runtime = Runtime::new();
}

pub(crate) fn with_runtime<R>(func: impl FnOnce(&Runtime) -> R) -> R {
	RUNTIME.with(func)
}

/// Drops the graph entry and cached wrappers of a target that went away.
///
/// Runs from `Drop`, so it tolerates a runtime that is already torn down
/// or busy; the removed deps are released after the borrow ends because
/// they may own the last handle to other targets.
pub(crate) fn forget_target(id: TargetId) {
	let removed = RUNTIME.try_with(|rt| {
		if let Ok(mut cache) = rt.reactive_cache.try_borrow_mut() {
			cache.remove(&id);
		}
		if let Ok(mut cache) = rt.readonly_cache.try_borrow_mut() {
			cache.remove(&id);
		}
		rt.graph
			.try_borrow_mut()
			.ok()
			.and_then(|mut graph| graph.remove(&id))
	});
	drop(removed);
}

/// Stops recording dependencies until [`resume_tracking`] is called.
pub fn pause_tracking() {
	with_runtime(|rt| rt.should_track.set(false));
}

pub fn resume_tracking() {
	with_runtime(|rt| rt.should_track.set(true));
}

pub fn is_tracking() -> bool {
	with_runtime(|rt| rt.should_track.get() && !rt.effect_stack.borrow().is_empty())
}

/// Runs `func` without recording any dependency, restoring the previous
/// tracking state afterwards, even on panic.
pub fn untracked<R>(func: impl FnOnce() -> R) -> R {
	struct Restore(bool);

	impl Drop for Restore {
		fn drop(&mut self) {
			let previous = self.0;
			with_runtime(|rt| rt.should_track.set(previous));
		}
	}

	let _restore = Restore(with_runtime(|rt| rt.should_track.replace(false)));
	func()
}

#[doc(hidden)]
pub fn lock() {
	with_runtime(|rt| rt.locked.set(true));
}

#[doc(hidden)]
pub fn unlock() {
	with_runtime(|rt| rt.locked.set(false));
}

/// Runs `func` with read-only wrappers accepting writes.
#[doc(hidden)]
pub fn unlocked<R>(func: impl FnOnce() -> R) -> R {
	struct Relock(bool);

	impl Drop for Relock {
		fn drop(&mut self) {
			let previous = self.0;
			with_runtime(|rt| rt.locked.set(previous));
		}
	}

	let _relock = Relock(with_runtime(|rt| rt.locked.replace(false)));
	func()
}

pub(crate) fn is_locked() -> bool {
	with_runtime(|rt| rt.locked.get())
}
