use std::collections::{HashMap, HashSet};
use std::fmt;

/// Key a handler is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKey {
    /// A concrete event code, including the reserved engine codes.
    Code(u16),
    /// Fallback for codes without a handler of their own.
    Default,
}

impl From<u16> for HandlerKey {
    fn from(code: u16) -> Self {
        Self::Code(code)
    }
}

impl fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{code}"),
            Self::Default => f.write_str("default"),
        }
    }
}

/// A registered callback, invoked with the context that owns the table.
pub type Handler<C> = Box<dyn FnMut(&mut C)>;

/// Event-code to callback routing with an optional default.
///
/// Handlers can be checked out with [`take`](HandlerTable::take) while they
/// run and put back with [`restore`](HandlerTable::restore). Registering or
/// unregistering the same key in between wins over the restore.
pub struct HandlerTable<C> {
    by_code: HashMap<u16, Handler<C>>,
    default: Option<Handler<C>>,
    checked_out: HashSet<HandlerKey>,
}

impl<C> HandlerTable<C> {
    pub fn new() -> Self {
        Self {
            by_code: HashMap::new(),
            default: None,
            checked_out: HashSet::new(),
        }
    }

    /// Register `handler` under `key`, returning the handler it replaces.
    pub fn register<F>(&mut self, key: HandlerKey, handler: F) -> Option<Handler<C>>
    where
        F: FnMut(&mut C) + 'static,
    {
        self.checked_out.remove(&key);
        self.slot_insert(key, Box::new(handler))
    }

    /// Remove the handler registered under `key`.
    pub fn unregister(&mut self, key: HandlerKey) -> Option<Handler<C>> {
        self.checked_out.remove(&key);
        match key {
            HandlerKey::Code(code) => self.by_code.remove(&code),
            HandlerKey::Default => self.default.take(),
        }
    }

    /// Whether a handler is registered (or checked out) under `key`.
    pub fn contains(&self, key: HandlerKey) -> bool {
        if self.checked_out.contains(&key) {
            return true;
        }
        match key {
            HandlerKey::Code(code) => self.by_code.contains_key(&code),
            HandlerKey::Default => self.default.is_some(),
        }
    }

    /// Which key would handle `code`: its own handler, else the default.
    pub fn resolve(&self, code: u16) -> Option<HandlerKey> {
        if self.by_code.contains_key(&code) {
            Some(HandlerKey::Code(code))
        } else if self.default.is_some() {
            Some(HandlerKey::Default)
        } else {
            None
        }
    }

    /// Remove the handler under `key` for the duration of a call.
    pub fn take(&mut self, key: HandlerKey) -> Option<Handler<C>> {
        let handler = match key {
            HandlerKey::Code(code) => self.by_code.remove(&code),
            HandlerKey::Default => self.default.take(),
        }?;
        self.checked_out.insert(key);
        Some(handler)
    }

    /// Put back a handler obtained from [`take`](HandlerTable::take).
    ///
    /// Dropped if `key` was registered or unregistered since it was taken.
    pub fn restore(&mut self, key: HandlerKey, handler: Handler<C>) {
        if self.checked_out.remove(&key) {
            self.slot_insert(key, handler);
        }
    }

    /// Number of registered handlers, the default included.
    pub fn len(&self) -> usize {
        self.by_code.len() + usize::from(self.default.is_some()) + self.checked_out.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot_insert(&mut self, key: HandlerKey, handler: Handler<C>) -> Option<Handler<C>> {
        match key {
            HandlerKey::Code(code) => self.by_code.insert(code, handler),
            HandlerKey::Default => self.default.replace(handler),
        }
    }
}

impl<C> Default for HandlerTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for HandlerTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut codes: Vec<u16> = self.by_code.keys().copied().collect();
        codes.sort_unstable();
        f.debug_struct("HandlerTable")
            .field("codes", &codes)
            .field("default", &self.default.is_some())
            .field("checked_out", &self.checked_out)
            .finish()
    }
}
