use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::rc::Rc;

/// An `Rc` compared and hashed by the address it points to.
///
/// Dep membership, job dedupe and the scheduler's recursion counters
/// all key on identity rather than on the contents of the pointee.
pub struct RcAddr<T: ?Sized> {
	ptr: Rc<T>,
}

impl<T: ?Sized> RcAddr<T> {
	pub fn new(ptr: Rc<T>) -> Self {
		RcAddr { ptr }
	}

	pub fn addr(&self) -> usize {
		Rc::as_ptr(&self.ptr) as *const () as usize
	}

	pub fn into_inner(self) -> Rc<T> {
		self.ptr
	}
}

impl<T: ?Sized> Clone for RcAddr<T> {
	fn clone(&self) -> Self {
		RcAddr {
			ptr: self.ptr.clone(),
		}
	}
}

impl<T: ?Sized> Deref for RcAddr<T> {
	type Target = Rc<T>;
	fn deref(&self) -> &Self::Target {
		&self.ptr
	}
}

impl<T: ?Sized> PartialEq for RcAddr<T> {
	fn eq(&self, other: &Self) -> bool {
		self.addr() == other.addr()
	}
}

impl<T: ?Sized> Eq for RcAddr<T> {}

impl<T: ?Sized> Hash for RcAddr<T> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		state.write_usize(self.addr());
	}
}
