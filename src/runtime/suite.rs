//! Suite Context: the stack of suite names entered so far.

#[derive(Debug, Clone, Default)]
pub struct SuiteContext {
    names: Vec<String>,
}

impl SuiteContext {
    pub fn push(&mut self, name: impl Into<String>) {
        self.names.push(name.into());
    }

    /// Pops the innermost suite; `None` when no suite is open.
    pub fn pop(&mut self) -> Option<String> {
        self.names.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Current path, or the single default bucket when no suite is open.
    pub fn path_or(&self, default_name: &str) -> Vec<String> {
        if self.names.is_empty() {
            vec![default_name.to_string()]
        } else {
            self.names.clone()
        }
    }
}
