use std::fmt;
use std::rc::Rc;

use crate::context::{is_locked, with_runtime};
use crate::dependencies::{track, trigger, Operation};
use crate::target::{DepKey, Key, Kind, Target};
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
	Mutable,
	Readonly,
}

/// An interception boundary around one target.
///
/// Reads track, writes trigger, nested composites come back wrapped in the
/// same mode, and refs stored in members are read and written through.
/// There is at most one live wrapper per target and mode, so wrapping the
/// same target twice yields handles that are [`ptr_eq`](Observed::ptr_eq).
#[derive(Clone)]
pub struct Observed {
	body: Rc<ObservedBody>,
}

pub(crate) struct ObservedBody {
	target: Target,
	mode: Mode,
}

impl Observed {
	pub(crate) fn cached(target: &Target, mode: Mode) -> Observed {
		let id = target.id();
		let existing = with_runtime(|rt| rt.cache(mode).borrow().get(&id).and_then(|weak| weak.upgrade()));
		if let Some(body) = existing {
			return Observed { body };
		}

		let body = Rc::new(ObservedBody {
			target: target.clone(),
			mode,
		});
		let stale = with_runtime(|rt| rt.cache(mode).borrow_mut().insert(id, Rc::downgrade(&body)));
		drop(stale);
		Observed { body }
	}

	pub fn target(&self) -> &Target {
		&self.body.target
	}

	pub fn mode(&self) -> Mode {
		self.body.mode
	}

	pub fn is_readonly(&self) -> bool {
		self.body.mode == Mode::Readonly
	}

	pub fn ptr_eq(&self, other: &Observed) -> bool {
		Rc::ptr_eq(&self.body, &other.body)
	}

	pub fn kind(&self) -> Kind {
		self.target().kind()
	}

	fn is_collection(&self) -> bool {
		matches!(self.kind(), Kind::Map | Kind::Set)
	}

	/// Wraps a raw child lazily, in this wrapper's mode.
	pub(crate) fn wrap(&self, value: Value) -> Value {
		match value {
			Value::Target(_) => match self.mode() {
				Mode::Mutable => crate::reactive(value),
				Mode::Readonly => crate::readonly(value),
			},
			other => other,
		}
	}

	/// Logs and returns `true` when a write must be refused.
	pub(crate) fn refuses(&self, op: Operation, key: Option<&Key>) -> bool {
		if self.is_readonly() && is_locked() {
			tracing::warn!(
				id = ?self.target().id(),
				?op,
				key = ?key,
				"operation failed: target is readonly"
			);
			return true;
		}
		false
	}

	/// The structural key a list or record is enumerated through.
	fn iteration_key(&self) -> DepKey {
		match self.kind() {
			Kind::List => DepKey::Length,
			_ => DepKey::Iterate,
		}
	}

	/// Reads a member. Absent members read as null.
	pub fn get(&self, key: impl Into<Key>) -> Value {
		if self.is_collection() {
			return self.collection_get(key.into());
		}

		let target = self.target();
		let key = target.normalize(key.into());
		let raw = target.lookup(key.clone()).unwrap_or_default();
		track(target, Operation::Get, DepKey::Member(key));
		match raw {
			Value::Ref(cell) => cell.value(),
			other => self.wrap(other),
		}
	}

	/// Writes a member. Returns `false` when the target cannot hold the key.
	pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
		let key = key.into();
		match self.kind() {
			Kind::Map => return self.collection_set(key, value.into()),
			Kind::Set => {
				tracing::warn!(id = ?self.target().id(), "set is not supported on set targets, use add");
				return false;
			}
			_ => {}
		}

		if self.refuses(Operation::Set, Some(&key)) {
			return true;
		}

		let target = self.target();
		let key = target.normalize(key);
		if !target.accepts(&key) {
			tracing::warn!(id = ?target.id(), %key, "key does not fit the target kind");
			return false;
		}
		let value = value.into().raw();
		let old = target.lookup(key.clone());

		if let Some(Value::Ref(cell)) = &old {
			if !matches!(value, Value::Ref(_)) {
				cell.set_value(value);
				return true;
			}
		}

		target.insert(key.clone(), value.clone());
		match old {
			None => trigger(target, Operation::Add, Some(DepKey::Member(key)), None, Some(value)),
			Some(old) if old != value => {
				trigger(target, Operation::Set, Some(DepKey::Member(key)), Some(old), Some(value))
			}
			Some(_) => {}
		}
		true
	}

	/// Removes a member, returning whether it was present.
	pub fn delete(&self, key: impl Into<Key>) -> bool {
		let key = key.into();
		if self.is_collection() {
			return self.collection_delete(key);
		}
		if self.refuses(Operation::Delete, Some(&key)) {
			return true;
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

	pub fn has(&self, key: impl Into<Key>) -> bool {
		if self.is_collection() {
			return self.collection_has(key.into());
		}

		let target = self.target();
		let key = target.normalize(key.into());
		let found = target.contains(key.clone());
		track(target, Operation::Has, DepKey::Member(key));
		found
	}

	pub fn len(&self) -> usize {
		if self.is_collection() {
			return self.collection_size();
		}
		track(self.target(), Operation::Iterate, self.iteration_key());
		self.target().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Enumerates the member keys, depending on the key set as a whole.
	pub fn keys(&self) -> Vec<Value> {
		if self.is_collection() {
			return self.collection_keys();
		}
		track(self.target(), Operation::Iterate, self.iteration_key());
		self.target().keys().iter().map(Key::to_value).collect()
	}

	/// Enumerates the member values; each value read is tracked as well.
	pub fn values(&self) -> Vec<Value> {
		if self.is_collection() {
			return self.collection_values();
		}
		self.member_keys().into_iter().map(|key| self.get(key)).collect()
	}

	pub fn entries(&self) -> Vec<(Value, Value)> {
		if self.is_collection() {
			return self.collection_entries();
		}
		self.member_keys()
			.into_iter()
			.map(|key| (key.to_value(), self.get(key)))
			.collect()
	}

	/// Calls `func(value, key)` for every member.
	pub fn for_each(&self, mut func: impl FnMut(Value, Value)) {
		if self.is_collection() {
			return self.collection_for_each(func);
		}
		for (key, value) in self.entries() {
			func(value, key);
		}
	}

	/// Appends to a list. The current length is read untracked.
	pub fn push(&self, value: impl Into<Value>) -> bool {
		if self.kind() != Kind::List {
			tracing::warn!(id = ?self.target().id(), "push is only supported on list targets");
			return false;
		}
		let len = self.target().len();
		self.set(Key::Index(len), value)
	}

	pub fn pop(&self) -> Value {
		if self.kind() != Kind::List || self.refuses(Operation::Delete, None) {
			return Value::Null;
		}

		let target = self.target();
		let index = target.len().saturating_sub(1);
		match target.pop() {
			Some(old) => {
				let key = DepKey::Member(Key::Index(index));
				trigger(target, Operation::Delete, Some(key), Some(old.clone()), None);
				self.wrap(old)
			}
			None => Value::Null,
		}
	}

	/// Empties the target, invalidating everything that read from it.
	pub fn clear(&self) {
		if self.refuses(Operation::Clear, None) {
			return;
		}

		let target = self.target();
		if !target.is_empty() {
			target.clear();
			trigger(target, Operation::Clear, None, None, None);
		}
	}

	fn member_keys(&self) -> Vec<Key> {
		track(self.target(), Operation::Iterate, self.iteration_key());
		self.target().keys()
	}
}

impl fmt::Debug for Observed {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Observed")
			.field("target", &self.target().id())
			.field("mode", &self.mode())
			.finish()
	}
}
