//! Execution-event sink boundary.
//!
//! Executors MUST NOT know where instrumentation goes; all lifecycle events
//! flow through [`ExecEvent`] and [`ExecSink`]. The default sink discards
//! events; tests and embedders install a scoped override.

use std::cell::RefCell;

///
/// ExecEvent
///
/// Lifecycle events emitted around plan submission.
///

#[derive(Clone, Debug)]
pub enum ExecEvent {
    QueryStart { entity: String },
    QueryFinish { entity: String, rows: u64 },
    MutationStart { entity: String },
    MutationFinish { entity: String, rows_affected: u64 },
}

///
/// ExecSink
///

pub trait ExecSink {
    fn record(&self, event: &ExecEvent);
}

///
/// NullSink
/// Default sink when no scoped override is installed.
///

struct NullSink;

impl ExecSink for NullSink {
    fn record(&self, _event: &ExecEvent) {}
}

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<*const dyn ExecSink>> = const { RefCell::new(None) };
}

/// Run a closure with a temporary exec sink override.
pub fn with_exec_sink<T>(sink: &dyn ExecSink, f: impl FnOnce() -> T) -> T {
    struct Guard {
        previous: Option<*const dyn ExecSink>,
    }

    impl Drop for Guard {
        fn drop(&mut self) {
            SINK_OVERRIDE.with(|cell| *cell.borrow_mut() = self.previous);
        }
    }

    // SAFETY: erase the reference lifetime to a raw pointer. The pointer is
    // installed only for this dynamic scope, `Guard::drop` restores the previous
    // slot on every exit (including unwind), and `record` only dereferences it
    // synchronously without persisting it, so it can never dangle while installed.
    let sink_ptr =
        unsafe { std::mem::transmute::<&dyn ExecSink, *const dyn ExecSink>(sink) };
    let previous = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink_ptr));
    let _guard = Guard { previous };

    f()
}

pub(crate) fn record(event: &ExecEvent) {
    let override_ptr = SINK_OVERRIDE.with(|cell| *cell.borrow());
    if let Some(ptr) = override_ptr {
        // SAFETY:
        // - `ptr` was produced from a valid `&dyn ExecSink` in `with_exec_sink`.
        // - `with_exec_sink` restores the previous pointer on every exit,
        //   including unwind paths via `Guard::drop`, so `ptr` cannot dangle
        //   while it is installed.
        // - `record` is synchronous and never stores `ptr` beyond this call,
        //   and only a shared reference is materialized.
        unsafe { (*ptr).record(event) };
    } else {
        NullSink.record(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: RefCell<Vec<ExecEvent>>,
    }

    impl ExecSink for Recorder {
        fn record(&self, event: &ExecEvent) {
            self.events.borrow_mut().push(event.clone());
        }
    }

    #[test]
    fn scoped_sink_receives_events_and_is_uninstalled_after() {
        let recorder = Recorder::default();

        with_exec_sink(&recorder, || {
            record(&ExecEvent::QueryStart {
                entity: "widget".to_string(),
            });
        });

        // Outside the scope the default sink swallows events.
        record(&ExecEvent::QueryFinish {
            entity: "widget".to_string(),
            rows: 3,
        });

        let events = recorder.events.borrow();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            ExecEvent::QueryStart { entity } if entity == "widget"
        ));
    }

    #[test]
    fn nested_overrides_restore_the_outer_sink() {
        let outer = Recorder::default();
        let inner = Recorder::default();

        with_exec_sink(&outer, || {
            with_exec_sink(&inner, || {
                record(&ExecEvent::MutationStart {
                    entity: "widget".to_string(),
                });
            });
            record(&ExecEvent::MutationFinish {
                entity: "widget".to_string(),
                rows_affected: 1,
            });
        });

        assert_eq!(inner.events.borrow().len(), 1);
        assert_eq!(outer.events.borrow().len(), 1);
    }
}
