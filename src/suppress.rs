//! Per-thread guard that keeps the target from forwarding events it caused itself
//!
//! Diagnostics logged during a write, and anything the SDK logs on the client runtime threads,
//! would otherwise loop back into the target.

use std::cell::Cell;

thread_local! {
    static ACTIVE: Cell<bool> = const { Cell::new(false) };
}

/// Is forwarding suppressed on the current thread?
pub(crate) fn is_active() -> bool {
    ACTIVE.with(Cell::get)
}

/// Suppress forwarding on the current thread until the guard drops
pub(crate) fn enter() -> Guard {
    Guard {
        previous: ACTIVE.with(|active| active.replace(true)),
    }
}

/// Permanently suppress forwarding on the current thread, used for client runtime threads
#[cfg_attr(not(feature = "aws"), allow(dead_code))]
pub(crate) fn mark_thread() {
    ACTIVE.with(|active| active.set(true));
}

pub(crate) struct Guard {
    previous: bool,
}

impl Drop for Guard {
    fn drop(&mut self) {
        ACTIVE.with(|active| active.set(self.previous));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_nests() {
        assert!(!is_active());
        {
            let _outer = enter();
            assert!(is_active());
            {
                let _inner = enter();
                assert!(is_active());
            }
            assert!(is_active());
        }
        assert!(!is_active());
    }

    #[test]
    fn marked_thread_stays_suppressed() {
        std::thread::spawn(|| {
            mark_thread();
            drop(enter());
            assert!(is_active());
        })
        .join()
        .unwrap();
        assert!(!is_active());
    }
}
