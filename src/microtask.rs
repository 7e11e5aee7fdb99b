#![cfg(target_arch = "wasm32")]

use wasm_bindgen::prelude::*;

use crate::context::with_runtime;

#[wasm_bindgen]
extern "C" {
	#[wasm_bindgen(js_name = queueMicrotask)]
	fn queue_microtask(closure: &JsValue);
}

/// Asks the host to drain the deferred queue at its next microtask
/// checkpoint. Only one drain is outstanding at a time.
pub(crate) fn schedule_tick() {
	let first = with_runtime(|rt| !rt.scheduler.microtask_queued.replace(true));
	if !first {
		return;
	}

	let drain = Closure::once_into_js(|| {
		with_runtime(|rt| rt.scheduler.microtask_queued.set(false));
		if let Err(err) = crate::tick() {
			tracing::error!(%err, "deferred flush failed");
		}
	});
	queue_microtask(&drain);
}
