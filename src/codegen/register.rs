//! Virtual register naming

/// Issues fresh SSA names with a fixed prefix.
///
/// Locals (`%l1`, `%l2`, ...) live for one function; globals (`@g1`, ...)
/// live for the whole module.
#[derive(Debug)]
pub struct RegisterTracker {
    prefix: &'static str,
    index: usize,
}

impl RegisterTracker {
    pub fn local() -> Self {
        Self {
            prefix: "%l",
            index: 0,
        }
    }

    pub fn global() -> Self {
        Self {
            prefix: "@g",
            index: 0,
        }
    }

    pub fn new_identifier(&mut self) -> String {
        self.index += 1;
        format!("{}{}", self.prefix, self.index)
    }

    /// Number of identifiers issued so far
    pub fn issued(&self) -> usize {
        self.index
    }
}
