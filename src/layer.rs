//! # Layer
//!
//! Binds [MetricTarget] into a [tracing_subscriber] stack

use super::layout::LogEvent;
use super::suppress;
use super::target::MetricTarget;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

impl<S: Subscriber> Layer<S> for MetricTarget {
    // Stacking the target onto a subscriber is its one-time initialization
    fn on_layer(&mut self, _subscriber: &mut S) {
        self.initialize();
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if suppress::is_active() {
            return;
        }
        self.write(&LogEvent::from_event(event));
    }
}
