//! Dependency tracking over plain composite values.
//!
//! Targets are wrapped with [`reactive`] or [`readonly`]; effects re-run
//! when a member they read is written; [`Ref`] and [`Computed`] hold single
//! values; [`watch`] delivers old and new values to a callback. Deferred
//! work runs when the thread calls [`tick`] (or inside [`batch`]).

pub mod macros;

mod addr;
mod collection;
mod computed;
mod context;
mod dependencies;
mod effect;
mod error;
#[cfg(target_arch = "wasm32")]
mod microtask;
mod observed;
mod reactive;
mod r#ref;
mod scheduler;
mod target;
mod value;
mod watch;

pub use computed::{computed, computed_with, Computed};
pub use context::{is_tracking, lock, pause_tracking, resume_tracking, unlock, unlocked, untracked};
pub use dependencies::{track, trigger, DebuggerEvent, Operation};
pub use effect::{effect, effect_from, effect_with, stop, DebuggerHook, Effect, EffectOptions, SchedulerFn, WeakEffect};
pub use error::{Error, Result};
pub use observed::{Mode, Observed};
pub use r#ref::{is_ref, r#ref, to_refs, AnyRef, Ref, ValueCell};
pub use reactive::{is_reactive, is_readonly, mark_non_reactive, mark_readonly, reactive, readonly, to_raw};
pub use scheduler::{batch, in_batch, next_tick, queue_effect, queue_job, queue_post_flush_cb, tick, Job, RECURSION_LIMIT};
pub use target::{DepKey, Key, Kind, Target, TargetId, MAX_LIST_PADDING};
pub use value::{MapKey, Opaque, Value};
pub use watch::{watch, watch_effect, Cleanup, Flush, WatchHandle, WatchOptions, WatchSource};
