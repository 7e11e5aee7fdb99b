use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::dependencies::{track_dep, trigger_dep, DebuggerEvent, Dep, Operation};
use crate::observed::Observed;
use crate::target::Key;
use crate::value::Value;

/// A single-value cell. Anything implementing it can be stored in a target
/// member and is read and written through by wrappers.
pub trait ValueCell {
	fn get(&self) -> Value;
	fn set(&self, value: Value);
}

/// A type-erased cell handle: a ref, a computed value or a member proxy.
#[derive(Clone)]
pub struct AnyRef {
	cell: Rc<dyn ValueCell>,
}

impl AnyRef {
	pub fn new(cell: impl ValueCell + 'static) -> Self {
		AnyRef { cell: Rc::new(cell) }
	}

	pub(crate) fn from_cell(cell: Rc<dyn ValueCell>) -> Self {
		AnyRef { cell }
	}

	pub fn value(&self) -> Value {
		self.cell.get()
	}

	pub fn set_value(&self, value: impl Into<Value>) {
		self.cell.set(value.into())
	}

	pub fn ptr_eq(&self, other: &AnyRef) -> bool {
		self.addr() == other.addr()
	}

	pub(crate) fn addr(&self) -> usize {
		Rc::as_ptr(&self.cell) as *const () as usize
	}
}

impl fmt::Debug for AnyRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "AnyRef({:#x})", self.addr())
	}
}

/// A reactive cell holding one value.
///
/// Composite values are stored through their mutable wrapper, so members
/// read off a ref's value are tracked too.
#[derive(Clone)]
pub struct Ref {
	body: Rc<RefBody>,
}

struct RefBody {
	value: RefCell<Value>,
	dep: Dep,
}

pub fn r#ref(value: impl Into<Value>) -> Ref {
	Ref::new(value)
}

/// Whether `value` holds any kind of cell.
pub fn is_ref(value: &Value) -> bool {
	matches!(value, Value::Ref(_))
}

fn convert(value: Value) -> Value {
	match value {
		Value::Target(_) => crate::reactive(value),
		other => other,
	}
}

impl Ref {
	pub fn new(value: impl Into<Value>) -> Self {
		Ref {
			body: Rc::new(RefBody {
				value: RefCell::new(convert(value.into())),
				dep: Dep::new(),
			}),
		}
	}

	pub fn value(&self) -> Value {
		self.body.get()
	}

	/// Reads the value without tracking it.
	pub fn peek(&self) -> Value {
		self.body.value.borrow().clone()
	}

	pub fn set_value(&self, value: impl Into<Value>) {
		self.body.set(value.into())
	}

	/// Stores `value`, returning the previous one.
	pub fn replace(&self, value: impl Into<Value>) -> Value {
		let old = self.peek();
		self.body.set(value.into());
		old
	}

	pub fn update(&self, func: impl FnOnce(&Value) -> Value) {
		let next = func(&self.peek());
		self.body.set(next)
	}

	pub fn ptr_eq(&self, other: &Ref) -> bool {
		Rc::ptr_eq(&self.body, &other.body)
	}
}

impl ValueCell for RefBody {
	fn get(&self) -> Value {
		track_dep(&self.dep, Operation::Get);
		self.value.borrow().clone()
	}

	fn set(&self, value: Value) {
		let value = convert(value);
		let old = self.value.replace(value.clone());
		if old == value {
			return;
		}

		let mut event = DebuggerEvent::new(None, Operation::Set, None);
		event.old_value = Some(old);
		event.new_value = Some(value);
		trigger_dep(&self.dep, event);
	}
}

impl From<Ref> for AnyRef {
	fn from(cell: Ref) -> Self {
		let cell: Rc<dyn ValueCell> = cell.body;
		AnyRef::from_cell(cell)
	}
}

impl fmt::Debug for Ref {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Ref").field(&*self.body.value.borrow()).finish()
	}
}

/// A cell reading and writing one member of a wrapper.
struct MemberRef {
	object: Observed,
	key: Key,
}

impl ValueCell for MemberRef {
	fn get(&self) -> Value {
		self.object.get(self.key.clone())
	}

	fn set(&self, value: Value) {
		self.object.set(self.key.clone(), value);
	}
}

/// One cell per member of `object`, each reading and writing through the
/// wrapper, so destructured members keep tracking.
pub fn to_refs(object: &Observed) -> IndexMap<Rc<str>, AnyRef> {
	object
		.target()
		.keys()
		.into_iter()
		.map(|key| {
			let name: Rc<str> = key.to_string().into();
			let cell = AnyRef::new(MemberRef {
				object: object.clone(),
				key,
			});
			(name, cell)
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use std::cell::Cell;

	use super::*;
	use crate::{effect, reactive, Target};

	#[test]
	fn no_op_writes_do_not_notify() {
		let count = r#ref(1);
		let runs = Rc::new(Cell::new(0));
		let _e = effect({
			let count = count.clone();
			let runs = runs.clone();
			move || {
				count.value();
				runs.set(runs.get() + 1);
			}
		});

		count.set_value(1);
		assert_eq!(runs.get(), 1);
		assert_eq!(count.replace(2), Value::from(1));
		assert_eq!(runs.get(), 2);
	}

	#[test]
	fn composites_are_stored_wrapped() {
		let cell = r#ref(Target::record());
		assert!(crate::is_reactive(&cell.peek()));
	}

	#[test]
	fn member_refs_write_through() {
		let object = reactive(Target::record_from([("a", 1), ("b", 2)])).into_observed().unwrap();
		let refs = to_refs(&object);
		assert_eq!(refs.len(), 2);

		refs["a"].set_value(10);
		assert_eq!(object.get("a"), Value::from(10));
		object.set("b", 20);
		assert_eq!(refs["b"].value(), Value::from(20));
	}

	#[test]
	fn map_member_refs_are_named_by_key() {
		let object = reactive(Target::map_from([("a", 1), ("b", 2)])).into_observed().unwrap();
		let refs = to_refs(&object);
		assert!(refs.contains_key("a"));
		assert!(refs.contains_key("b"));
		assert_eq!(refs["a"].value(), Value::from(1));
	}
}
