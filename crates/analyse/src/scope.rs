use std::fmt;

/// Set of trace levels an attribute key was observed at
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeMask(i64);

impl ScopeMask {
    pub const RESOURCE: ScopeMask = ScopeMask(1);
    pub const SCOPE: ScopeMask = ScopeMask(1 << 1);
    pub const SPAN: ScopeMask = ScopeMask(1 << 2);
    pub const EVENT: ScopeMask = ScopeMask(1 << 3);
    pub const LINK: ScopeMask = ScopeMask(1 << 4);

    /// Display order
    const NAMES: [(ScopeMask, &'static str); 5] = [
        (Self::RESOURCE, "resource"),
        (Self::SCOPE, "scope"),
        (Self::SPAN, "span"),
        (Self::EVENT, "event"),
        (Self::LINK, "link"),
    ];

    pub const fn empty() -> Self {
        ScopeMask(0)
    }

    pub const fn from_bits(bits: i64) -> Self {
        ScopeMask(bits)
    }

    pub const fn bits(self) -> i64 {
        self.0
    }

    pub fn add(&mut self, other: ScopeMask) {
        self.0 |= other.0;
    }

    pub fn has(self, other: ScopeMask) -> bool {
        self.0 & other.0 != 0
    }

    /// Names of the set scopes
    pub fn scopes(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(mask, _)| self.has(*mask))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl fmt::Display for ScopeMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.scopes().join(" "))
    }
}
