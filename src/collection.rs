//! Map and set instrumentation.
//!
//! Collection members cannot be reached by plain member access, so every
//! method goes through here: arguments are stripped to raw form, the raw
//! operation runs, the matching track or trigger fires and results come
//! back wrapped in the receiver's mode.

use crate::dependencies::{track, trigger, Operation};
use crate::observed::Observed;
use crate::target::{DepKey, Key, Kind};
use crate::value::{MapKey, Value};

impl Observed {
	/// Adds a member to a set. Returns `false` when it was already present.
	/// A refused read-only write reports `true`.
	pub fn add(&self, value: impl Into<Value>) -> bool {
		if self.kind() != Kind::Set {
			tracing::warn!(id = ?self.target().id(), "add is only supported on set targets");
			return false;
		}

		let key = MapKey::new(value);
		let member = Key::Value(key.clone());
		if self.refuses(Operation::Add, Some(&member)) {
			return true;
		}

		let target = self.target();
		let added = target.add(key.value().clone());
		if added {
			trigger(target, Operation::Add, Some(DepKey::Member(member)), None, Some(key.into_value()));
		}
		added
	}

	pub(crate) fn collection_get(&self, key: Key) -> Value {
		let target = self.target();
		let key = target.normalize(key);
		let raw = target.lookup(key.clone()).unwrap_or_default();
		track(target, Operation::Get, DepKey::Member(key));
		self.wrap(raw)
	}

	pub(crate) fn collection_has(&self, key: Key) -> bool {
		let target = self.target();
		let key = target.normalize(key);
		let found = target.contains(key.clone());
		track(target, Operation::Has, DepKey::Member(key));
		track(target, Operation::Iterate, DepKey::Iterate);
		found
	}

	pub(crate) fn collection_size(&self) -> usize {
		track(self.target(), Operation::Iterate, DepKey::Iterate);
		self.target().len()
	}

	pub(crate) fn collection_set(&self, key: Key, value: Value) -> bool {
		if self.refuses(Operation::Set, Some(&key)) {
			return true;
		}

		let target = self.target();
		let key = target.normalize(key);
		let value = value.raw();
		match target.insert(key.clone(), value.clone()) {
			None => trigger(target, Operation::Add, Some(DepKey::Member(key)), None, Some(value)),
			Some(old) if old != value => {
				trigger(target, Operation::Set, Some(DepKey::Member(key)), Some(old), Some(value))
			}
			Some(_) => {}
		}
		true
	}

	pub(crate) fn collection_delete(&self, key: Key) -> bool {
		if self.refuses(Operation::Delete, Some(&key)) {
			return false;
		}

		let target = self.target();
		let key = target.normalize(key);
		match target.remove(key.clone()) {
			Some(old) => {
				trigger(target, Operation::Delete, Some(DepKey::Member(key)), Some(old), None);
				true
			}
			None => false,
		}
	}

	/// Snapshot of the wrapped entries; callbacks may mutate the collection
	/// without disturbing the enumeration in progress.
	fn collection_snapshot(&self) -> Vec<(Value, Value)> {
		track(self.target(), Operation::Iterate, DepKey::Iterate);
		self.target()
			.entries()
			.into_iter()
			.map(|(key, value)| (self.wrap(key.to_value()), self.wrap(value)))
			.collect()
	}

	pub(crate) fn collection_keys(&self) -> Vec<Value> {
		self.collection_snapshot().into_iter().map(|(key, _)| key).collect()
	}

	pub(crate) fn collection_values(&self) -> Vec<Value> {
		self.collection_snapshot().into_iter().map(|(_, value)| value).collect()
	}

	pub(crate) fn collection_entries(&self) -> Vec<(Value, Value)> {
		self.collection_snapshot()
	}

	pub(crate) fn collection_for_each(&self, mut func: impl FnMut(Value, Value)) {
		for (key, value) in self.collection_snapshot() {
			func(value, key);
		}
	}
}

#[cfg(test)]
mod tests {
	use std::cell::Cell;
	use std::rc::Rc;

	use crate::{effect, reactive, Target, Value};

	#[test]
	fn set_members_come_back_wrapped() {
		let member = Target::record();
		let set = reactive(Target::set_from([member.clone()])).into_observed().unwrap();

		let values = set.values();
		assert_eq!(values.len(), 1);
		let wrapped = values[0].as_observed().unwrap();
		assert!(wrapped.target().ptr_eq(&member));
		assert!(set.has(Value::from(member)));
	}

	#[test]
	fn map_overwrite_with_same_value_is_silent() {
		let map = reactive(Target::map_from([("a", 1)])).into_observed().unwrap();
		let runs = Rc::new(Cell::new(0));
		let _e = effect({
			let map = map.clone();
			let runs = runs.clone();
			move || {
				map.get("a");
				runs.set(runs.get() + 1);
			}
		});

		map.set("a", 1);
		assert_eq!(runs.get(), 1);
		map.set("a", 2);
		assert_eq!(runs.get(), 2);
	}
}
