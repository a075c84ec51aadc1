//! # Layout
//!
//! Log event record handed to the target and the templates that render it to a string

use super::Error;
use chrono::{DateTime, Utc};
use std::fmt::{self, Write};
use tracing::field::{Field, Visit};

/// A single log record, decoupled from the [tracing::Event] it was captured from
#[derive(Clone, Debug, PartialEq)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: tracing::Level,
    pub target: String,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl LogEvent {
    pub fn new(level: tracing::Level, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            target: target.into(),
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a contextual key/value field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Capture the message and fields of a [tracing::Event]
    pub fn from_event(event: &tracing::Event<'_>) -> Self {
        let metadata = event.metadata();
        let mut record = Self::new(*metadata.level(), metadata.target(), String::new());
        event.record(&mut FieldVisitor(&mut record));
        record
    }
}

struct FieldVisitor<'a>(&'a mut LogEvent);

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0.message = value.to_owned();
        } else {
            self.0.fields.push((field.name().to_owned(), value.to_owned()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0.message = format!("{value:?}");
        } else {
            self.0.fields.push((field.name().to_owned(), format!("{value:?}")));
        }
    }
}

/// Renders a [LogEvent] into a string
pub trait Layout: Send + Sync {
    fn render(&self, event: &LogEvent) -> Result<String, Error>;
}

impl<F> Layout for F
where
    F: Fn(&LogEvent) -> Result<String, Error> + Send + Sync,
{
    fn render(&self, event: &LogEvent) -> Result<String, Error> {
        self(event)
    }
}

/// `date|LEVEL|target|message key=value ...`
#[derive(Clone, Copy, Debug, Default)]
pub struct SimpleLayout;

impl Layout for SimpleLayout {
    fn render(&self, event: &LogEvent) -> Result<String, Error> {
        let mut out = String::with_capacity(64 + event.message.len());
        write!(
            out,
            "{}|{}|{}|{}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            event.level,
            event.target,
            event.message
        )?;
        for (name, value) in &event.fields {
            write!(out, " {name}={value}")?;
        }
        Ok(out)
    }
}
