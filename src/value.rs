use std::any::Any;
use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::{AnyRef, Computed, Observed, Ref, Target};

/// A dynamically shaped value that can live inside a target, a ref or a
/// watcher.
///
/// Composite variants are handles: cloning a `Value::Target` clones the
/// handle, not the data behind it.
#[derive(Clone, Default)]
pub enum Value {
	#[default]
	Null,
	Bool(bool),
	Number(f64),
	String(Rc<str>),
	/// A raw composite, reads and writes through it are not tracked.
	Target(Target),
	/// A wrapper around a target that tracks and triggers.
	Observed(Observed),
	/// Any single-value cell (ref, computed, proxy ref).
	Ref(AnyRef),
	/// A foreign object, never observed.
	Opaque(Opaque),
}

impl Value {
	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Value::Number(n) => Some(*n),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_target(&self) -> Option<&Target> {
		match self {
			Value::Target(t) => Some(t),
			_ => None,
		}
	}

	pub fn as_observed(&self) -> Option<&Observed> {
		match self {
			Value::Observed(o) => Some(o),
			_ => None,
		}
	}

	pub fn into_observed(self) -> Option<Observed> {
		match self {
			Value::Observed(o) => Some(o),
			_ => None,
		}
	}

	pub fn as_cell(&self) -> Option<&AnyRef> {
		match self {
			Value::Ref(r) => Some(r),
			_ => None,
		}
	}

	/// Strips a wrapper, leaving every other value untouched.
	pub fn raw(&self) -> Value {
		match self {
			Value::Observed(o) => Value::Target(o.target().clone()),
			other => other.clone(),
		}
	}

	/// The target behind this value, wrapped or not.
	pub fn target(&self) -> Option<Target> {
		match self {
			Value::Target(t) => Some(t.clone()),
			Value::Observed(o) => Some(o.target().clone()),
			_ => None,
		}
	}
}

/// Trigger-suppression equality: primitives by value, everything else by
/// identity. `NaN` is never equal to itself, so writing `NaN` over `NaN`
/// still notifies.
impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Value::Null, Value::Null) => true,
			(Value::Bool(a), Value::Bool(b)) => a == b,
			(Value::Number(a), Value::Number(b)) => a == b,
			(Value::String(a), Value::String(b)) => a == b,
			(Value::Target(a), Value::Target(b)) => a.ptr_eq(b),
			(Value::Observed(a), Value::Observed(b)) => a.ptr_eq(b),
			(Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
			(Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
			_ => false,
		}
	}
}

impl Debug for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Null => f.write_str("null"),
			Value::Bool(b) => b.fmt(f),
			Value::Number(n) => n.fmt(f),
			Value::String(s) => s.fmt(f),
			Value::Target(t) => write!(f, "Target({:?}, {:?})", t.id(), t.kind()),
			Value::Observed(o) => write!(f, "Observed({:?}, {:?})", o.target().id(), o.mode()),
			Value::Ref(_) => f.write_str("Ref"),
			Value::Opaque(_) => f.write_str("Opaque"),
		}
	}
}

macro_rules! number_from {
	($($ty:ty),*) => {
		$(
			impl From<$ty> for Value {
				fn from(n: $ty) -> Self {
					Value::Number(n as f64)
				}
			}
		)*
	};
}

number_from!(f64, f32, i32, i64, u32, u64, usize);

impl From<bool> for Value {
	fn from(b: bool) -> Self {
		Value::Bool(b)
	}
}

impl From<&str> for Value {
	fn from(s: &str) -> Self {
		Value::String(s.into())
	}
}

impl From<String> for Value {
	fn from(s: String) -> Self {
		Value::String(s.into())
	}
}

impl From<Rc<str>> for Value {
	fn from(s: Rc<str>) -> Self {
		Value::String(s)
	}
}

impl From<Target> for Value {
	fn from(target: Target) -> Self {
		Value::Target(target)
	}
}

impl From<Observed> for Value {
	fn from(observed: Observed) -> Self {
		Value::Observed(observed)
	}
}

impl From<AnyRef> for Value {
	fn from(cell: AnyRef) -> Self {
		Value::Ref(cell)
	}
}

impl From<Ref> for Value {
	fn from(cell: Ref) -> Self {
		Value::Ref(cell.into())
	}
}

impl From<Computed<Value>> for Value {
	fn from(computed: Computed<Value>) -> Self {
		Value::Ref(computed.into())
	}
}

impl From<Opaque> for Value {
	fn from(opaque: Opaque) -> Self {
		Value::Opaque(opaque)
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(value: Option<T>) -> Self {
		value.map_or(Value::Null, Into::into)
	}
}

/// A non-plain object: stored and passed around, never wrapped.
#[derive(Clone)]
pub struct Opaque(Rc<dyn Any>);

impl Opaque {
	pub fn new<T: Any>(value: T) -> Self {
		Opaque(Rc::new(value))
	}

	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		self.0.downcast_ref()
	}

	pub fn ptr_eq(&self, other: &Opaque) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	fn addr(&self) -> usize {
		Rc::as_ptr(&self.0) as *const () as usize
	}
}

/// A value used as a key of a map or set target.
///
/// Keys compare with SameValueZero: `NaN` matches `NaN` and `-0` matches
/// `0`. Wrappers are stripped on construction so a key is always raw.
#[derive(Clone)]
pub struct MapKey(Value);

impl MapKey {
	pub fn new(value: impl Into<Value>) -> Self {
		MapKey(value.into().raw())
	}

	pub fn value(&self) -> &Value {
		&self.0
	}

	pub fn into_value(self) -> Value {
		self.0
	}
}

impl PartialEq for MapKey {
	fn eq(&self, other: &Self) -> bool {
		match (&self.0, &other.0) {
			(Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
			(a, b) => a == b,
		}
	}
}

impl Eq for MapKey {}

impl Hash for MapKey {
	fn hash<H: Hasher>(&self, state: &mut H) {
		match &self.0 {
			Value::Null => state.write_u8(0),
			Value::Bool(b) => {
				state.write_u8(1);
				b.hash(state);
			}
			Value::Number(n) => {
				state.write_u8(2);
				let bits = if *n == 0.0 {
					0
				} else if n.is_nan() {
					f64::NAN.to_bits()
				} else {
					n.to_bits()
				};
				state.write_u64(bits);
			}
			Value::String(s) => {
				state.write_u8(3);
				s.hash(state);
			}
			Value::Target(t) => {
				state.write_u8(4);
				t.id().hash(state);
			}
			Value::Observed(o) => {
				state.write_u8(4);
				o.target().id().hash(state);
			}
			Value::Ref(r) => {
				state.write_u8(5);
				state.write_usize(r.addr());
			}
			Value::Opaque(o) => {
				state.write_u8(6);
				state.write_usize(o.addr());
			}
		}
	}
}

impl Debug for MapKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn nan_is_not_equal_to_itself() {
		assert_ne!(Value::from(f64::NAN), Value::from(f64::NAN));
		assert_eq!(Value::from(0.0), Value::from(-0.0));
	}

	#[test]
	fn map_keys_use_same_value_zero() {
		assert_eq!(MapKey::new(f64::NAN), MapKey::new(f64::NAN));
		assert_eq!(MapKey::new(0.0), MapKey::new(-0.0));
		assert_eq!(fxhash::hash64(&MapKey::new(0.0)), fxhash::hash64(&MapKey::new(-0.0)));
		assert_ne!(MapKey::new(1), MapKey::new("1"));
	}

	#[test]
	fn composites_compare_by_identity() {
		let a = Target::record();
		let b = Target::record();
		assert_eq!(Value::from(a.clone()), Value::from(a.clone()));
		assert_ne!(Value::from(a), Value::from(b));
	}
}
