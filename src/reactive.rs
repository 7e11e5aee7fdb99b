use crate::observed::{Mode, Observed};
use crate::value::Value;

/// Returns the mutable wrapper of a target.
///
/// Wrappers come back unchanged. A target marked read-only gets its
/// read-only wrapper instead; a target marked non-reactive, a cell or an
/// opaque value comes back as it was. Primitives are returned unchanged
/// with a warning.
pub fn reactive(value: impl Into<Value>) -> Value {
	let value = value.into();
	match &value {
		Value::Observed(_) => value,
		Value::Target(target) if target.is_marked_readonly() => readonly(value),
		_ => create_observed(value, Mode::Mutable),
	}
}

/// Returns the read-only wrapper of a target, or of the target behind a
/// mutable wrapper.
pub fn readonly(value: impl Into<Value>) -> Value {
	let value = value.into();
	match &value {
		Value::Observed(observed) if observed.is_readonly() => value,
		Value::Observed(observed) => Observed::cached(observed.target(), Mode::Readonly).into(),
		_ => create_observed(value, Mode::Readonly),
	}
}

fn create_observed(value: Value, mode: Mode) -> Value {
	match &value {
		Value::Target(target) if target.is_non_reactive() => value,
		Value::Target(target) => Observed::cached(target, mode).into(),
		Value::Ref(_) | Value::Opaque(_) => value,
		_ => {
			tracing::warn!(?value, ?mode, "value cannot be made reactive");
			value
		}
	}
}

/// Whether `value` is a wrapper, in either mode.
pub fn is_reactive(value: &Value) -> bool {
	matches!(value, Value::Observed(_))
}

pub fn is_readonly(value: &Value) -> bool {
	matches!(value, Value::Observed(observed) if observed.is_readonly())
}

/// The raw target behind a wrapper; anything else is returned as is.
pub fn to_raw(value: &Value) -> Value {
	value.raw()
}

/// Marks a target so that [`reactive`] hands out its read-only wrapper.
/// The mark is permanent.
pub fn mark_readonly(value: impl Into<Value>) -> Value {
	let value = value.into();
	match value.target() {
		Some(target) => {
			target.mark_readonly();
			Value::Target(target)
		}
		None => value,
	}
}

/// Marks a target so that it is never wrapped.
pub fn mark_non_reactive(value: impl Into<Value>) -> Value {
	let value = value.into();
	match value.target() {
		Some(target) => {
			target.mark_non_reactive();
			Value::Target(target)
		}
		None => value,
	}
}
