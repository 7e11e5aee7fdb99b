use std::cell::Cell;
use std::rc::Rc;

use reactivity::{effect, list, readonly, Key, Observed, Target, Value, MAX_LIST_PADDING};

use crate::{capture_logs, observe};

fn runs_of(read: impl Fn() + 'static) -> Rc<Cell<usize>> {
	let runs = Rc::new(Cell::new(0));
	let _e = effect({
		let runs = runs.clone();
		move || {
			read();
			runs.set(runs.get() + 1);
		}
	});
	runs
}

fn map() -> Observed {
	observe(Target::map_from([("a", 1)]))
}

#[test]
fn for_each_reruns_on_insert_delete_and_clear() {
	let map = map();
	let runs = runs_of({
		let map = map.clone();
		move || map.for_each(|_, _| {})
	});

	map.set("b", 2);
	assert_eq!(runs.get(), 2);

	map.delete("a");
	assert_eq!(runs.get(), 3);

	map.clear();
	assert_eq!(runs.get(), 4);

	// nothing left to clear
	map.clear();
	assert_eq!(runs.get(), 4);
}

#[test]
fn size_reruns_on_membership_changes_only() {
	let set = observe(Target::set_from([1, 2]));
	let runs = runs_of({
		let set = set.clone();
		move || {
			set.len();
		}
	});

	assert!(set.add(3));
	assert_eq!(runs.get(), 2);

	assert!(!set.add(3));
	assert_eq!(runs.get(), 2);

	assert!(set.delete(Value::from(1)));
	assert_eq!(runs.get(), 3);
	assert_eq!(set.len(), 2);
}

#[test]
fn map_get_depends_on_its_key_only() {
	let map = map();
	let runs = runs_of({
		let map = map.clone();
		move || {
			map.get("a");
		}
	});

	map.set("b", 1);
	assert_eq!(runs.get(), 1);

	map.set("a", 2);
	assert_eq!(runs.get(), 2);
}

#[test]
fn has_sees_keys_appear() {
	let map = map();
	let seen = Rc::new(Cell::new(false));
	let _e = effect({
		let map = map.clone();
		let seen = seen.clone();
		move || seen.set(map.has("x"))
	});

	map.set("x", 1);
	assert!(seen.get());
}

#[test]
fn map_values_come_back_wrapped() {
	let inner = Target::record();
	let map = observe(Target::map_from([("inner", inner.clone())]));

	let value = map.get("inner");
	assert!(value.as_observed().unwrap().target().ptr_eq(&inner));

	let keys = map.keys();
	assert_eq!(keys, [Value::from("inner")]);
	let entries = map.entries();
	assert_eq!(entries[0].1, value);
}

#[test]
fn readonly_collections_refuse_writes() {
	let ro = readonly(Target::map_from([("a", 1)])).into_observed().unwrap();

	let ((set, deleted), logs) = capture_logs(|| (ro.set("a", 2), ro.delete("a")));
	assert!(set);
	assert!(!deleted);
	assert!(logs.contains("target is readonly"));
	assert_eq!(ro.get("a"), Value::from(1));

	let members = readonly(Target::set_from([1])).into_observed().unwrap();
	let (added, _) = capture_logs(|| members.add(2));
	assert!(added);
	assert_eq!(members.len(), 1);
}

#[test]
fn list_writes_to_keys_it_cannot_hold_are_rejected() {
	let items = observe(list![1, 2]);
	let runs = runs_of({
		let items = items.clone();
		move || {
			items.len();
		}
	});

	let (stored, logs) = capture_logs(|| items.set(Key::from("foo"), 5));
	assert!(!stored);
	assert!(logs.contains("key does not fit the target kind"));

	assert!(!items.set(Value::from(1e300), 1));
	assert!(!items.set(items.len() + MAX_LIST_PADDING + 1, 1));
	assert_eq!(items.len(), 2);
	assert_eq!(runs.get(), 1);
}

#[test]
fn list_length_tracks_push_and_pop() {
	let items = observe(list![1, 2]);
	let runs = runs_of({
		let items = items.clone();
		move || {
			items.len();
		}
	});

	items.push(3);
	assert_eq!(runs.get(), 2);
	assert_eq!(items.get(2usize), Value::from(3));

	assert_eq!(items.pop(), Value::from(3));
	assert_eq!(runs.get(), 3);

	// overwriting an element keeps the length
	items.set(0usize, 10);
	assert_eq!(runs.get(), 3);
}

#[test]
fn list_elements_track_by_index() {
	let items = observe(list!["a", "b"]);
	let runs = runs_of({
		let items = items.clone();
		move || {
			items.get(1usize);
		}
	});

	items.set(0usize, "z");
	assert_eq!(runs.get(), 1);

	items.set(1usize, "y");
	assert_eq!(runs.get(), 2);
}
