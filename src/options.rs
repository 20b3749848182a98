use crate::error::{Error, Location};
use crate::schema::Schema;
use crate::value::Value;

/// Receives composition events, one `open`/`close` pair per composed node.
/// Calls are synchronous and in parse order; `close` carries the finished
/// value, or `None` when composition found no node at that point.
pub trait Listener {
    fn open(&mut self, location: Location);
    fn close(&mut self, location: Location, value: Option<&Value>);
}

#[derive(Default)]
pub struct LoadOptions<'a> {
    /// Source name reported in error marks.
    pub filename: Option<&'a str>,
    /// Type tables; `Schema::core()` when unset.
    pub schema: Option<&'a Schema>,
    /// Default line-break checking to the pre-1.2 behavior when no `%YAML`
    /// directive says otherwise.
    pub legacy: bool,
    /// Relaxed duplicate-key handling: last write wins instead of failing.
    pub json: bool,
    pub on_warning: Option<&'a mut dyn FnMut(&Error)>,
    pub listener: Option<&'a mut dyn Listener>,
}

impl<'a> LoadOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filename(mut self, filename: &'a str) -> Self {
        self.filename = Some(filename);
        self
    }

    pub fn with_schema(mut self, schema: &'a Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_legacy(mut self, legacy: bool) -> Self {
        self.legacy = legacy;
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn with_on_warning(mut self, hook: &'a mut dyn FnMut(&Error)) -> Self {
        self.on_warning = Some(hook);
        self
    }

    pub fn with_listener(mut self, listener: &'a mut dyn Listener) -> Self {
        self.listener = Some(listener);
        self
    }
}
