use std::cell::RefCell;
use std::rc::{Rc, Weak};

use fxhash::FxBuildHasher;
use indexmap::IndexSet;

use crate::addr::RcAddr;
use crate::context::with_runtime;
use crate::effect::{Effect, EffectBody};
use crate::target::{DepKey, Kind, Target, TargetId};
use crate::value::Value;

type Subscribers = IndexSet<RcAddr<EffectBody>, FxBuildHasher>;

/// What kind of access produced a track or trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
	Get,
	Has,
	Iterate,
	Set,
	Add,
	Delete,
	Clear,
}

/// Passed to `on_track` and `on_trigger` hooks.
#[derive(Clone, Debug)]
pub struct DebuggerEvent {
	/// `None` for refs, which are not part of the target graph.
	pub target: Option<TargetId>,
	pub op: Operation,
	pub key: Option<DepKey>,
	pub old_value: Option<Value>,
	pub new_value: Option<Value>,
}

impl DebuggerEvent {
	pub(crate) fn new(target: Option<TargetId>, op: Operation, key: Option<DepKey>) -> Self {
		DebuggerEvent {
			target,
			op,
			key,
			old_value: None,
			new_value: None,
		}
	}
}

/// The set of effects subscribed to one slot.
#[derive(Clone)]
pub(crate) struct Dep {
	body: Rc<DepBody>,
}

pub(crate) struct DepBody {
	subscribers: RefCell<Subscribers>,
}

impl DepBody {
	pub(crate) fn unsubscribe(&self, effect: &Rc<EffectBody>) {
		self.subscribers
			.borrow_mut()
			.shift_remove(&RcAddr::new(effect.clone()));
	}
}

impl Dep {
	pub(crate) fn new() -> Self {
		Dep {
			body: Rc::new(DepBody {
				subscribers: RefCell::new(Subscribers::default()),
			}),
		}
	}

	pub(crate) fn from_body(body: Rc<DepBody>) -> Self {
		Dep { body }
	}

	pub(crate) fn downgrade(&self) -> Weak<DepBody> {
		Rc::downgrade(&self.body)
	}

	pub(crate) fn subscribe(&self, effect: &Effect) -> bool {
		self.body
			.subscribers
			.borrow_mut()
			.insert(RcAddr::new(effect.body.clone()))
	}

	pub(crate) fn subscribers(&self) -> Vec<Effect> {
		self.body
			.subscribers
			.borrow()
			.iter()
			.map(|addr| Effect {
				body: (**addr).clone(),
			})
			.collect()
	}

	pub(crate) fn len(&self) -> usize {
		self.body.subscribers.borrow().len()
	}
}

impl Default for Dep {
	fn default() -> Self {
		Dep::new()
	}
}

/// Links `effect` into `dep` unless it already is, keeping the reverse link
/// on the effect for cleanup.
fn link(effect: &Effect, dep: &Dep, event: impl FnOnce() -> DebuggerEvent) {
	if dep.subscribe(effect) {
		effect.push_dep(dep);
		if let Some(on_track) = &effect.options().on_track {
			on_track(&event());
		}
	}
}

fn tracking_effect() -> Option<Effect> {
	with_runtime(|rt| {
		if rt.should_track.get() {
			rt.active_effect()
		} else {
			None
		}
	})
}

/// Records that the running effect read `key` of `target`.
pub fn track(target: &Target, op: Operation, key: DepKey) {
	let Some(effect) = tracking_effect() else {
		return;
	};

	let id = target.id();
	let dep = with_runtime(|rt| {
		rt.graph
			.borrow_mut()
			.entry(id)
			.or_default()
			.entry(key.clone())
			.or_default()
			.clone()
	});

	tracing::trace!(?id, ?op, ?key, "track");
	link(&effect, &dep, || DebuggerEvent::new(Some(id), op, Some(key)));
}

pub(crate) fn track_dep(dep: &Dep, op: Operation) {
	if let Some(effect) = tracking_effect() {
		link(&effect, dep, || DebuggerEvent::new(None, op, None));
	}
}

/// Merges the deps a derived runner collected into the running effect, so
/// the outer effect is notified by the sources of the derived value.
pub(crate) fn track_child_run(child: &Effect) {
	let Some(parent) = tracking_effect() else {
		return;
	};

	for dep in child.deps() {
		if dep.subscribe(&parent) {
			parent.push_dep(&dep);
		}
	}
}

/// Notifies the effects subscribed to `key` of `target` after a change.
pub fn trigger(
	target: &Target,
	op: Operation,
	key: Option<DepKey>,
	old_value: Option<Value>,
	new_value: Option<Value>,
) {
	let id = target.id();
	let kind = target.kind();
	let deps: Vec<Dep> = with_runtime(|rt| {
		let graph = rt.graph.borrow();
		let Some(key_to_dep) = graph.get(&id) else {
			return Vec::new();
		};

		if op == Operation::Clear {
			return key_to_dep.values().cloned().collect();
		}

		let mut deps = Vec::new();
		if let Some(dep) = key.as_ref().and_then(|key| key_to_dep.get(key)) {
			deps.push(dep.clone());
		}
		if matches!(op, Operation::Add | Operation::Delete) {
			let iteration = match kind {
				Kind::List => DepKey::Length,
				_ => DepKey::Iterate,
			};
			if let Some(dep) = key_to_dep.get(&iteration) {
				deps.push(dep.clone());
			}
		}
		deps
	});

	if deps.is_empty() {
		return;
	}

	tracing::trace!(?id, ?op, ?key, deps = deps.len(), "trigger");
	let event = DebuggerEvent {
		target: Some(id),
		op,
		key,
		old_value,
		new_value,
	};
	run_subscribers(&deps, &event);
}

pub(crate) fn trigger_dep(dep: &Dep, event: DebuggerEvent) {
	if dep.len() > 0 {
		run_subscribers(std::slice::from_ref(dep), &event);
	}
}

/// Derived runners are scheduled before direct effects, so that a direct
/// effect reading a derived value finds it already marked dirty.
fn run_subscribers(deps: &[Dep], event: &DebuggerEvent) {
	let mut computed = Subscribers::default();
	let mut direct = Subscribers::default();
	for dep in deps {
		for effect in dep.subscribers() {
			if effect.is_computed() {
				computed.insert(RcAddr::new(effect.body));
			} else {
				direct.insert(RcAddr::new(effect.body));
			}
		}
	}

	for addr in computed.into_iter().chain(direct) {
		let effect = Effect {
			body: addr.into_inner(),
		};
		schedule_run(&effect, event);
	}
}

fn schedule_run(effect: &Effect, event: &DebuggerEvent) {
	if !effect.is_active() {
		return;
	}

	let options = effect.options();
	if let Some(on_trigger) = &options.on_trigger {
		on_trigger(event);
	}
	match &options.scheduler {
		Some(scheduler) => scheduler(effect),
		None => effect.run(),
	}
}
