use std::cell::Cell;
use std::rc::Rc;

use reactivity::{
	effect, is_reactive, is_readonly, mark_readonly, r#ref, reactive, readonly, record, to_raw, unlocked, Target, Value,
};

use crate::mock::Spy;
use crate::{capture_logs, mock, observe};

#[test]
fn spy_sees_every_write() {
	let state = observe(record! { "count" => 0 });
	let mock = mock::SharedMock::new();
	mock.expect_in_order(&[0.0, 1.0]);

	let _e = effect({
		let state = state.clone();
		let mock = mock.clone();
		move || {
			mock.get().trigger(state.get("count").as_f64().unwrap());
		}
	});

	state.set("count", 1);
	mock.get().checkpoint();
}

#[test]
fn identity_is_stable() {
	let target = record! { "a" => 1 };
	let wrapped = reactive(target.clone());

	assert_eq!(reactive(wrapped.clone()), wrapped);
	assert_eq!(reactive(target.clone()), wrapped);

	let ro = readonly(target.clone());
	assert_eq!(readonly(ro.clone()), ro);
	assert!(is_readonly(&ro));
	assert!(is_reactive(&ro));
	assert!(matches!(to_raw(&ro), Value::Target(t) if t.ptr_eq(&target)));
}

#[test]
fn nested_members_are_wrapped_on_read() {
	let inner = record! { "x" => 1 };
	let state = observe(record! { "inner" => inner.clone() });

	let first = state.get("inner");
	let second = state.get("inner");
	assert!(is_reactive(&first));
	assert_eq!(first, second);
	assert!(first.as_observed().unwrap().target().ptr_eq(&inner));

	// the raw target keeps the raw member
	assert!(matches!(state.target().get("inner"), Value::Target(t) if t.ptr_eq(&inner)));
}

#[test]
fn readonly_writes_are_refused_with_a_warning() {
	let ro = readonly(record! { "a" => 1 }).into_observed().unwrap();

	let (accepted, logs) = capture_logs(|| ro.set("a", 2));
	assert!(accepted);
	assert!(logs.contains("target is readonly"), "{}", logs);
	assert_eq!(ro.get("a"), Value::from(1));

	let (_, logs) = capture_logs(|| ro.delete("a"));
	assert!(logs.contains("target is readonly"));
	assert!(ro.has("a"));

	unlocked(|| ro.set("a", 3));
	assert_eq!(ro.get("a"), Value::from(3));
}

#[test]
fn readonly_reads_nested_values_readonly() {
	let ro = readonly(record! { "inner" => record! { "x" => 1 } }).into_observed().unwrap();
	let inner = ro.get("inner");
	assert!(is_readonly(&inner));

	let (_, logs) = capture_logs(|| inner.as_observed().unwrap().set("x", 2));
	assert!(logs.contains("target is readonly"));
}

#[test]
fn marked_targets_stay_readonly() {
	let target = Target::record();
	mark_readonly(target.clone());

	let wrapped = reactive(target.clone());
	assert!(is_readonly(&wrapped));

	// unwrapping and wrapping again keeps the mode
	let again = reactive(to_raw(&wrapped));
	assert!(is_readonly(&again));
}

#[test]
fn wrapping_a_primitive_warns() {
	let (value, logs) = capture_logs(|| reactive(1));
	assert_eq!(value, Value::from(1));
	assert!(logs.contains("cannot be made reactive"));
}

#[test]
fn refs_in_members_unwrap() {
	let count = r#ref(1);
	let state = observe(record! { "count" => count.clone() });
	assert_eq!(state.get("count"), Value::from(1));

	let runs = Rc::new(Cell::new(0));
	let _e = effect({
		let state = state.clone();
		let runs = runs.clone();
		move || {
			state.get("count");
			runs.set(runs.get() + 1);
		}
	});

	// writing a plain value writes through to the ref
	state.set("count", 2);
	assert_eq!(count.value(), Value::from(2));
	assert_eq!(runs.get(), 2);

	count.set_value(3);
	assert_eq!(state.get("count"), Value::from(3));
	assert_eq!(runs.get(), 3);
}

#[test]
fn writing_a_wrapper_stores_its_target() {
	let state = observe(Target::record());
	let child = observe(Target::list());
	state.set("child", child.clone());

	assert!(matches!(state.target().get("child"), Value::Target(t) if t.ptr_eq(child.target())));
	assert_eq!(state.get("child"), Value::from(child));
}
