use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::dependencies::track_child_run;
use crate::effect::{effect_with, Effect, EffectOptions};
use crate::r#ref::{AnyRef, ValueCell};
use crate::value::Value;

/// A derived value, recomputed lazily from a tracked getter.
///
/// The getter runs on the first read and again on the first read after one
/// of its dependencies changed; in between, reads return the cached value.
/// An effect reading a computed value depends on whatever the getter read.
pub struct Computed<T> {
	body: Rc<ComputedBody<T>>,
}

pub struct ComputedBody<T> {
	value: Rc<RefCell<Option<T>>>,
	dirty: Rc<Cell<bool>>,
	getter: Rc<dyn Fn() -> T>,
	runner: Effect,
	setter: Option<Box<dyn Fn(T)>>,
}

impl<T> Clone for Computed<T> {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

pub fn computed<T: Clone + 'static>(getter: impl Fn() -> T + 'static) -> Computed<T> {
	Computed::create(Rc::new(getter), None)
}

/// A computed value that can also be written; writes go to `setter`.
pub fn computed_with<T: Clone + 'static>(
	getter: impl Fn() -> T + 'static,
	setter: impl Fn(T) + 'static,
) -> Computed<T> {
	Computed::create(Rc::new(getter), Some(Box::new(setter)))
}

impl<T: Clone + 'static> Computed<T> {
	fn create(getter: Rc<dyn Fn() -> T>, setter: Option<Box<dyn Fn(T)>>) -> Self {
		let value = Rc::new(RefCell::new(None));
		let dirty = Rc::new(Cell::new(true));

		let runner = effect_with(
			{
				let value = value.clone();
				let getter = getter.clone();
				move || {
					let next = getter();
					*value.borrow_mut() = Some(next);
				}
			},
			EffectOptions::default().lazy().computed().scheduler({
				let dirty = dirty.clone();
				move |_| dirty.set(true)
			}),
		);

		Computed {
			body: Rc::new(ComputedBody {
				value,
				dirty,
				getter,
				runner,
				setter,
			}),
		}
	}

	pub fn value(&self) -> T {
		self.body.get()
	}

	pub fn set_value(&self, value: T) {
		self.body.set(value)
	}

	pub fn is_dirty(&self) -> bool {
		self.body.dirty.get()
	}

	/// The lazy runner behind this value.
	pub fn effect(&self) -> &Effect {
		&self.body.runner
	}

	/// Stops tracking; later reads recompute every time.
	pub fn stop(&self) {
		self.body.runner.stop();
	}
}

impl<T: Clone + 'static> ComputedBody<T> {
	fn get(&self) -> T {
		if self.dirty.get() {
			self.runner.run();
			self.dirty.set(false);
		}
		track_child_run(&self.runner);

		if !self.runner.is_active() {
			return (self.getter)();
		}
		let cached = self.value.borrow().clone();
		match cached {
			Some(value) => value,
			None => (self.getter)(),
		}
	}

	fn set(&self, value: T) {
		match &self.setter {
			Some(setter) => setter(value),
			None => tracing::warn!("write operation failed: computed value is readonly"),
		}
	}
}

impl ValueCell for ComputedBody<Value> {
	fn get(&self) -> Value {
		ComputedBody::get(self)
	}

	fn set(&self, value: Value) {
		ComputedBody::set(self, value)
	}
}

impl From<Computed<Value>> for AnyRef {
	fn from(computed: Computed<Value>) -> Self {
		let cell: Rc<dyn ValueCell> = computed.body;
		AnyRef::from_cell(cell)
	}
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Computed")
			.field("value", &*self.body.value.borrow())
			.field("dirty", &self.body.dirty.get())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{r#ref, Ref};

	fn counted(source: &Ref, calls: &Rc<Cell<usize>>) -> Computed<f64> {
		let source = source.clone();
		let calls = calls.clone();
		computed(move || {
			calls.set(calls.get() + 1);
			source.value().as_f64().unwrap_or_default() * 2.0
		})
	}

	#[test]
	fn getter_runs_only_when_read_dirty() {
		let source = r#ref(1);
		let calls = Rc::new(Cell::new(0));
		let doubled = counted(&source, &calls);
		assert_eq!(calls.get(), 0);

		assert_eq!(doubled.value(), 2.0);
		assert_eq!(doubled.value(), 2.0);
		assert_eq!(calls.get(), 1);

		source.set_value(5);
		assert!(doubled.is_dirty());
		assert_eq!(calls.get(), 1);
		assert_eq!(doubled.value(), 10.0);
		assert_eq!(calls.get(), 2);
	}

	#[test]
	fn stopped_computed_recomputes_on_every_read() {
		let source = r#ref(1);
		let calls = Rc::new(Cell::new(0));
		let doubled = counted(&source, &calls);
		doubled.value();
		doubled.stop();

		source.set_value(3);
		assert_eq!(doubled.value(), 6.0);
		assert!(calls.get() >= 2);
	}

	#[test]
	fn setter_receives_writes() {
		let source = r#ref(1);
		let plus_one = computed_with(
			{
				let source = source.clone();
				move || Value::from(source.value().as_f64().unwrap_or_default() + 1.0)
			},
			{
				let source = source.clone();
				move |value: Value| source.set_value(value.as_f64().unwrap_or_default() - 1.0)
			},
		);

		plus_one.set_value(Value::from(10));
		assert_eq!(source.value(), Value::from(9));
		assert_eq!(plus_one.value(), Value::from(10));
	}
}
