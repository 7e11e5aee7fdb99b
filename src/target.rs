use std::cell::{Cell, RefCell};
use std::fmt::{self, Display};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use fxhash::FxBuildHasher;
use indexmap::{IndexMap, IndexSet};

use crate::context;
use crate::value::{MapKey, Value};

static TARGET_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Most nulls a single list write may pad with.
pub const MAX_LIST_PADDING: usize = 1 << 16;

/// Stable identity of a target, never reused within a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
	fn next() -> Self {
		TargetId(TARGET_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
	Record,
	List,
	Map,
	Set,
}

/// A member key. Normalised against the kind of target it is used with:
/// records key by name, lists by index, maps and sets by value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
	Name(Rc<str>),
	Index(usize),
	Value(MapKey),
}

impl Key {
	pub fn to_value(&self) -> Value {
		match self {
			Key::Name(name) => Value::String(name.clone()),
			Key::Index(index) => Value::from(*index),
			Key::Value(key) => key.value().clone(),
		}
	}
}

impl Display for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Key::Name(name) => f.write_str(name),
			Key::Index(index) => index.fmt(f),
			Key::Value(key) => match key.value() {
				Value::String(name) => f.write_str(name),
				Value::Number(n) => n.fmt(f),
				other => write!(f, "{:?}", other),
			},
		}
	}
}

impl From<&str> for Key {
	fn from(name: &str) -> Self {
		Key::Name(name.into())
	}
}

impl From<String> for Key {
	fn from(name: String) -> Self {
		Key::Name(name.into())
	}
}

impl From<Rc<str>> for Key {
	fn from(name: Rc<str>) -> Self {
		Key::Name(name)
	}
}

impl From<usize> for Key {
	fn from(index: usize) -> Self {
		Key::Index(index)
	}
}

impl From<Value> for Key {
	fn from(value: Value) -> Self {
		Key::Value(MapKey::new(value))
	}
}

impl From<MapKey> for Key {
	fn from(key: MapKey) -> Self {
		Key::Value(key)
	}
}

/// A slot in the dependency graph: a member, or one of the two
/// distinguished structural keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DepKey {
	Member(Key),
	/// Length of a list, invalidated by adds and deletes.
	Length,
	/// Key set of a record, map or set, invalidated by adds, deletes and clears.
	Iterate,
}

type Entries<K, V> = IndexMap<K, V, FxBuildHasher>;

pub(crate) enum Data {
	Record(Entries<Rc<str>, Value>),
	List(Vec<Value>),
	Map(Entries<MapKey, Value>),
	Set(IndexSet<MapKey, FxBuildHasher>),
}

/// A raw composite value.
///
/// Operations on a `Target` never track or trigger; wrap it with
/// [`reactive`](crate::reactive) or [`readonly`](crate::readonly) for that.
/// Stored values are always raw: writing a wrapper stores its target.
#[derive(Clone)]
pub struct Target {
	body: Rc<TargetBody>,
}

struct TargetBody {
	id: TargetId,
	data: RefCell<Data>,
	marked_readonly: Cell<bool>,
	non_reactive: Cell<bool>,
}

impl Drop for TargetBody {
	fn drop(&mut self) {
		context::forget_target(self.id);
	}
}

impl Target {
	fn new(data: Data) -> Self {
		Target {
			body: Rc::new(TargetBody {
				id: TargetId::next(),
				data: RefCell::new(data),
				marked_readonly: Cell::new(false),
				non_reactive: Cell::new(false),
			}),
		}
	}

	pub fn record() -> Self {
		Target::new(Data::Record(Entries::default()))
	}

	pub fn list() -> Self {
		Target::new(Data::List(Vec::new()))
	}

	pub fn map() -> Self {
		Target::new(Data::Map(Entries::default()))
	}

	pub fn set() -> Self {
		Target::new(Data::Set(IndexSet::default()))
	}

	pub fn record_from<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<Rc<str>>,
		V: Into<Value>,
	{
		let target = Target::record();
		for (key, value) in entries {
			target.insert(Key::Name(key.into()), value);
		}
		target
	}

	pub fn list_from<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
		let target = Target::list();
		for value in values {
			target.push(value);
		}
		target
	}

	pub fn map_from<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<Value>,
		V: Into<Value>,
	{
		let target = Target::map();
		for (key, value) in entries {
			target.insert(Key::from(key.into()), value);
		}
		target
	}

	pub fn set_from<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
		let target = Target::set();
		for value in values {
			target.add(value);
		}
		target
	}

	pub fn id(&self) -> TargetId {
		self.body.id
	}

	pub fn kind(&self) -> Kind {
		match &*self.body.data.borrow() {
			Data::Record(_) => Kind::Record,
			Data::List(_) => Kind::List,
			Data::Map(_) => Kind::Map,
			Data::Set(_) => Kind::Set,
		}
	}

	pub fn ptr_eq(&self, other: &Target) -> bool {
		Rc::ptr_eq(&self.body, &other.body)
	}

	pub fn len(&self) -> usize {
		match &*self.body.data.borrow() {
			Data::Record(entries) => entries.len(),
			Data::List(values) => values.len(),
			Data::Map(entries) => entries.len(),
			Data::Set(values) => values.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Brings a key into the shape this target's kind stores.
	pub fn normalize(&self, key: Key) -> Key {
		match (self.kind(), key) {
			(Kind::Record, Key::Index(index)) => Key::Name(index.to_string().into()),
			(Kind::Record, Key::Value(key)) => match key.into_value() {
				Value::String(name) => Key::Name(name),
				Value::Number(n) => Key::Name(n.to_string().into()),
				other => Key::Name(format!("{:?}", other).into()),
			},
			(Kind::List, Key::Name(name)) => match name.parse::<usize>() {
				Ok(index) => Key::Index(index),
				Err(_) => Key::Name(name),
			},
			(Kind::List, Key::Value(key)) => match key.value().as_f64() {
				Some(n) if n >= 0.0 && n.fract() == 0.0 && n < usize::MAX as f64 => Key::Index(n as usize),
				_ => Key::Value(key),
			},
			(Kind::Map | Kind::Set, Key::Name(name)) => Key::Value(MapKey::new(name)),
			(Kind::Map | Kind::Set, Key::Index(index)) => Key::Value(MapKey::new(index)),
			(_, key) => key,
		}
	}

	/// Looks up a member, `None` when absent. Set members map to themselves.
	pub fn lookup(&self, key: impl Into<Key>) -> Option<Value> {
		let key = self.normalize(key.into());
		match (&*self.body.data.borrow(), &key) {
			(Data::Record(entries), Key::Name(name)) => entries.get(name).cloned(),
			(Data::List(values), Key::Index(index)) => values.get(*index).cloned(),
			(Data::Map(entries), Key::Value(key)) => entries.get(key).cloned(),
			(Data::Set(values), Key::Value(key)) => values.get(key).map(|k| k.value().clone()),
			_ => None,
		}
	}

	pub fn get(&self, key: impl Into<Key>) -> Value {
		self.lookup(key).unwrap_or_default()
	}

	pub fn contains(&self, key: impl Into<Key>) -> bool {
		self.lookup(key).is_some()
	}

	/// Whether this target can store a member under the normalised `key`.
	/// Lists refuse names and indices more than [`MAX_LIST_PADDING`] past
	/// the end.
	pub fn accepts(&self, key: &Key) -> bool {
		match (&*self.body.data.borrow(), key) {
			(Data::Record(_), Key::Name(_)) => true,
			(Data::List(values), Key::Index(index)) => index.saturating_sub(values.len()) <= MAX_LIST_PADDING,
			(Data::Map(_) | Data::Set(_), Key::Value(_)) => true,
			_ => false,
		}
	}

	/// Stores a member, returning the previous value if the key was present.
	/// Writing past the end of a list pads it with nulls. A key the target
	/// does not [accept](Target::accepts) is dropped with a warning.
	pub fn insert(&self, key: impl Into<Key>, value: impl Into<Value>) -> Option<Value> {
		let key = self.normalize(key.into());
		if !self.accepts(&key) {
			tracing::warn!(id = ?self.id(), %key, "key does not fit the target kind");
			return None;
		}
		let value = value.into().raw();
		match (&mut *self.body.data.borrow_mut(), key) {
			(Data::Record(entries), Key::Name(name)) => entries.insert(name, value),
			(Data::List(values), Key::Index(index)) => {
				if index < values.len() {
					Some(std::mem::replace(&mut values[index], value))
				} else {
					values.resize(index, Value::Null);
					values.push(value);
					None
				}
			}
			(Data::Map(entries), Key::Value(key)) => entries.insert(key, value),
			(Data::Set(values), Key::Value(key)) => {
				if values.insert(key.clone()) {
					None
				} else {
					Some(key.into_value())
				}
			}
			_ => None,
		}
	}

	/// Removes a member. Removing from the middle of a list leaves a null
	/// hole so that other indices keep their meaning.
	pub fn remove(&self, key: impl Into<Key>) -> Option<Value> {
		let key = self.normalize(key.into());
		match (&mut *self.body.data.borrow_mut(), &key) {
			(Data::Record(entries), Key::Name(name)) => entries.shift_remove(name),
			(Data::List(values), Key::Index(index)) => {
				if *index + 1 == values.len() {
					values.pop()
				} else {
					values.get_mut(*index).map(std::mem::take)
				}
			}
			(Data::Map(entries), Key::Value(key)) => entries.shift_remove(key),
			(Data::Set(values), Key::Value(key)) => values.shift_take(key).map(MapKey::into_value),
			_ => None,
		}
	}

	/// Adds a member to a set. Returns `false` if it was already there.
	pub fn add(&self, value: impl Into<Value>) -> bool {
		let key = MapKey::new(value);
		match &mut *self.body.data.borrow_mut() {
			Data::Set(values) => values.insert(key),
			_ => {
				tracing::warn!(id = ?self.id(), "add is only supported on set targets");
				false
			}
		}
	}

	pub fn push(&self, value: impl Into<Value>) {
		let len = self.len();
		self.insert(Key::Index(len), value);
	}

	pub fn pop(&self) -> Option<Value> {
		match &mut *self.body.data.borrow_mut() {
			Data::List(values) => values.pop(),
			_ => None,
		}
	}

	pub fn clear(&self) {
		match &mut *self.body.data.borrow_mut() {
			Data::Record(entries) => entries.clear(),
			Data::List(values) => values.clear(),
			Data::Map(entries) => entries.clear(),
			Data::Set(values) => values.clear(),
		}
	}

	pub fn keys(&self) -> Vec<Key> {
		match &*self.body.data.borrow() {
			Data::Record(entries) => entries.keys().cloned().map(Key::Name).collect(),
			Data::List(values) => (0..values.len()).map(Key::Index).collect(),
			Data::Map(entries) => entries.keys().cloned().map(Key::Value).collect(),
			Data::Set(values) => values.iter().cloned().map(Key::Value).collect(),
		}
	}

	pub fn values(&self) -> Vec<Value> {
		match &*self.body.data.borrow() {
			Data::Record(entries) => entries.values().cloned().collect(),
			Data::List(values) => values.clone(),
			Data::Map(entries) => entries.values().cloned().collect(),
			Data::Set(values) => values.iter().map(|k| k.value().clone()).collect(),
		}
	}

	pub fn entries(&self) -> Vec<(Key, Value)> {
		self.keys().into_iter().zip(self.values()).collect()
	}

	pub(crate) fn is_marked_readonly(&self) -> bool {
		self.body.marked_readonly.get()
	}

	pub(crate) fn mark_readonly(&self) {
		self.body.marked_readonly.set(true);
	}

	pub(crate) fn is_non_reactive(&self) -> bool {
		self.body.non_reactive.get()
	}

	pub(crate) fn mark_non_reactive(&self) {
		self.body.non_reactive.set(true);
	}
}

impl fmt::Debug for Target {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Target")
			.field("id", &self.id())
			.field("kind", &self.kind())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keys_normalise_per_kind() {
		let list = Target::list_from([10, 20]);
		assert_eq!(list.get("1"), Value::from(20));
		assert_eq!(list.get(Value::from(0)), Value::from(10));

		let record = Target::record_from([("0", "zero")]);
		assert_eq!(record.get(0usize), Value::from("zero"));

		let map = Target::map_from([("a", 1)]);
		assert_eq!(map.get("a"), Value::from(1));
		assert!(map.contains(Value::from("a")));
	}

	#[test]
	fn list_writes_pad_and_deletes_leave_holes() {
		let list = Target::list();
		list.insert(2usize, "c");
		assert_eq!(list.len(), 3);
		assert_eq!(list.get(0usize), Value::Null);

		list.push("d");
		assert_eq!(list.remove(1usize), Some(Value::Null));
		assert_eq!(list.len(), 4);
		assert_eq!(list.remove(3usize), Some(Value::from("d")));
		assert_eq!(list.len(), 3);
	}

	#[test]
	fn lists_refuse_names_and_far_indices() {
		let list = Target::list_from([1]);
		assert!(!list.accepts(&list.normalize(Key::from("foo"))));
		assert!(!list.accepts(&list.normalize(Key::from(Value::from(1e300)))));
		assert!(list.accepts(&Key::Index(1 + MAX_LIST_PADDING)));
		assert!(!list.accepts(&Key::Index(2 + MAX_LIST_PADDING)));

		list.insert(usize::MAX, 2);
		list.insert("foo", 2);
		assert_eq!(list.len(), 1);
	}

	#[test]
	fn stored_values_are_raw() {
		let inner = Target::record();
		let outer = Target::record();
		outer.insert("inner", crate::reactive(inner.clone()));
		assert!(matches!(outer.get("inner"), Value::Target(t) if t.ptr_eq(&inner)));
	}
}
