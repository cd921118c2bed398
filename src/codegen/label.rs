//! Basic-block label generation

use std::fmt;

/// Name of a basic block, unique within a module
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label(String);

impl Label {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issues labels in sets, one set per construct instance.
///
/// `new_set` advances the counter; `label` reuses the current value so every
/// label of one `if`, loop or short-circuit shares a suffix. A construct must
/// request all of its labels before translating any child, since children
/// start sets of their own.
#[derive(Debug, Default)]
pub struct Labeller {
    index: usize,
}

impl Labeller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_set(&mut self, tags: &[&str]) -> Label {
        self.index += 1;
        self.label(tags)
    }

    pub fn label(&self, tags: &[&str]) -> Label {
        Label(format!("{}.{}", tags.join("."), self.index))
    }
}
