use std::sync::{Arc, Mutex, MutexGuard};

use mockall::*;

#[automock]
pub trait Spy {
	fn trigger(&self, value: f64);
}

#[derive(Clone)]
pub struct SharedMock(Arc<Mutex<MockSpy>>);

impl SharedMock {
	pub fn new() -> SharedMock {
		SharedMock(Arc::new(Mutex::new(MockSpy::new())))
	}

	pub fn get<'a>(&'a self) -> MutexGuard<'a, MockSpy> {
		return self.0.lock().unwrap();
	}

	/// Expects exactly `values`, once each, in this order.
	pub fn expect_in_order(&self, values: &[f64]) {
		let mut seq = Sequence::new();
		let mut mock = self.get();
		for value in values {
			mock.expect_trigger()
				.with(predicate::eq(*value))
				.times(1)
				.in_sequence(&mut seq)
				.return_const(());
		}
	}
}
