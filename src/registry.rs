use ahash::AHashSet as HashSet;

use crate::CallClass;

/// Classifies contract methods as read-only or mutating.
///
/// Methods are mutating unless registered as read-only. Read-only calls are
/// evaluated by the peers the gateway reaches directly, their output is never
/// written back, and they are the only calls allowed to run rich queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodRegistry {
    read_only: HashSet<String>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry where every method in `methods` is read-only.
    pub fn with_read_only<I, M>(methods: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<String>,
    {
        Self {
            read_only: methods.into_iter().map(Into::into).collect(),
        }
    }

    pub fn register_read_only(&mut self, method: impl Into<String>) {
        self.read_only.insert(method.into());
    }

    pub fn is_read_only(&self, method: &str) -> bool {
        self.read_only.contains(method)
    }

    pub fn classify(&self, method: &str) -> CallClass {
        if self.is_read_only(method) {
            CallClass::Evaluate
        } else {
            CallClass::Submit
        }
    }
}
