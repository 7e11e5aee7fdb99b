use std::cell::{Cell, RefCell};
use std::rc::Rc;

use reactivity::{r#ref, record, tick, watch, watch_effect, Flush, Value, WatchOptions, WatchSource};

use crate::observe;

#[test]
fn callbacks_get_new_and_old_values_after_the_flush() {
	let count = r#ref(1);
	let calls = Rc::new(RefCell::new(Vec::new()));

	let _w = watch(
		count.clone(),
		{
			let calls = calls.clone();
			move |new, old, _| calls.borrow_mut().push((new.clone(), old.clone()))
		},
		WatchOptions::default(),
	);
	assert!(calls.borrow().is_empty());

	tick().unwrap();
	assert_eq!(*calls.borrow(), [(Value::from(1), Value::Null)]);

	count.set_value(2);
	count.set_value(3);
	tick().unwrap();
	assert_eq!(calls.borrow()[1], (Value::from(3), Value::from(1)));
	assert_eq!(calls.borrow().len(), 2);
}

#[test]
fn lazy_sync_watchers_fire_on_change_only() {
	let state = observe(record! { "a" => 1 });
	let calls = Rc::new(RefCell::new(Vec::new()));

	let _w = watch(
		WatchSource::getter({
			let state = state.clone();
			move || state.get("a")
		}),
		{
			let calls = calls.clone();
			move |new, old, _| calls.borrow_mut().push((new.clone(), old.clone()))
		},
		WatchOptions::default().lazy().flush(Flush::Sync),
	);
	assert!(calls.borrow().is_empty());

	state.set("a", 2);
	assert_eq!(*calls.borrow(), [(Value::from(2), Value::from(1))]);
}

#[test]
fn deep_watchers_see_nested_writes() {
	let state = observe(record! { "nested" => record! { "x" => 1 } });
	let deep_calls = Rc::new(Cell::new(0));
	let shallow_calls = Rc::new(Cell::new(0));

	let getter = {
		let state = state.clone();
		move || state.get("nested")
	};
	let options = WatchOptions::default().lazy().flush(Flush::Sync);

	let _deep = watch(
		WatchSource::getter(getter.clone()),
		{
			let deep_calls = deep_calls.clone();
			move |_, _, _| deep_calls.set(deep_calls.get() + 1)
		},
		options.clone().deep(),
	);
	let _shallow = watch(
		WatchSource::getter(getter),
		{
			let shallow_calls = shallow_calls.clone();
			move |_, _, _| shallow_calls.set(shallow_calls.get() + 1)
		},
		options,
	);

	state.get("nested").into_observed().unwrap().set("x", 2);
	assert_eq!(deep_calls.get(), 1);
	assert_eq!(shallow_calls.get(), 0);
}

#[test]
fn cleanups_run_before_the_next_call_and_on_stop() {
	let count = r#ref(0);
	let log = Rc::new(RefCell::new(Vec::new()));

	let w = watch(
		count.clone(),
		{
			let log = log.clone();
			move |new, _, cleanup| {
				let n = new.as_f64().unwrap();
				log.borrow_mut().push(format!("call {}", n));
				let log = log.clone();
				cleanup.register(move || log.borrow_mut().push(format!("cleanup {}", n)));
			}
		},
		WatchOptions::default().flush(Flush::Sync),
	);

	count.set_value(1);
	w.stop();
	count.set_value(2);

	assert_eq!(*log.borrow(), ["call 0", "cleanup 0", "call 1", "cleanup 1"]);
	assert!(!w.is_active());
}

#[test]
fn several_sources_are_delivered_as_a_list() {
	let a = r#ref(1);
	let b = r#ref("x");
	let calls = Rc::new(RefCell::new(Vec::new()));

	let _w = watch(
		vec![WatchSource::from(a.clone()), WatchSource::from(b.clone())],
		{
			let calls = calls.clone();
			move |new, old, _| {
				let new = new.as_target().unwrap();
				let old = old.as_target().unwrap();
				calls.borrow_mut().push((new.values(), old.len()));
			}
		},
		WatchOptions::default().flush(Flush::Sync),
	);

	a.set_value(2);

	let calls = calls.borrow();
	assert_eq!(calls[0], (vec![Value::from(1), Value::from("x")], 0));
	assert_eq!(calls[1], (vec![Value::from(2), Value::from("x")], 2));
}

#[test]
fn pre_flush_watchers_run_before_post_flush_ones() {
	let count = r#ref(0);
	let order = Rc::new(RefCell::new(Vec::new()));

	let _post = watch_effect(
		{
			let count = count.clone();
			let order = order.clone();
			move |_| {
				count.value();
				order.borrow_mut().push("post");
			}
		},
		WatchOptions::default(),
	);
	let _pre = watch(
		count.clone(),
		{
			let order = order.clone();
			move |_, _, _| order.borrow_mut().push("pre")
		},
		WatchOptions::default().flush(Flush::Pre).lazy(),
	);

	tick().unwrap();
	assert_eq!(*order.borrow(), ["post"]);

	count.set_value(1);
	tick().unwrap();
	assert_eq!(*order.borrow(), ["post", "pre", "post"]);
}

#[test]
fn stopped_effect_watchers_clean_up() {
	let count = r#ref(0);
	let runs = Rc::new(Cell::new(0));
	let cleanups = Rc::new(Cell::new(0));

	let w = watch_effect(
		{
			let count = count.clone();
			let runs = runs.clone();
			let cleanups = cleanups.clone();
			move |cleanup| {
				count.value();
				runs.set(runs.get() + 1);
				let cleanups = cleanups.clone();
				cleanup.register(move || cleanups.set(cleanups.get() + 1));
			}
		},
		WatchOptions::default().flush(Flush::Sync),
	);
	assert_eq!(runs.get(), 1);

	count.set_value(1);
	assert_eq!((runs.get(), cleanups.get()), (2, 1));

	w.stop();
	count.set_value(2);
	assert_eq!((runs.get(), cleanups.get()), (2, 2));
}
