use std::fmt;

/// A three-part `local@domain/resource` address, as used throughout the
/// messaging network this relay sits on. See spec.md §4.1.
///
/// No validation is performed beyond splitting on `@` and `/` — in
/// particular non-ASCII localparts are permitted, matching the source
/// network's own JID handling.
#[derive(Clone, Debug)]
pub struct Address {
    pub local: String,
    pub domain: String,
    pub resource: String,
}

impl Address {
    pub fn new(local: impl Into<String>, domain: impl Into<String>, resource: impl Into<String>) -> Self {
        Self { local: local.into(), domain: domain.into(), resource: resource.into() }
    }

    /// Parse a canonical `local@domain/resource` string. The resource
    /// (and its leading `/`) is optional.
    pub fn parse(s: &str) -> Self {
        let (bare, resource) = match s.split_once('/') {
            Some((b, r)) => (b, r),
            None => (s, ""),
        };
        let (local, domain) = match bare.split_once('@') {
            Some((l, d)) => (l, d),
            None => ("", bare),
        };
        Self::new(local, domain, resource)
    }

    /// `local@domain`, ignoring the resource.
    pub fn bare(&self) -> String {
        format!("{}@{}", self.local, self.domain)
    }

    /// `local@domain/resource`, or just the bare form when the resource
    /// is empty.
    pub fn full(&self) -> String {
        if self.resource.is_empty() {
            self.bare()
        } else {
            format!("{}@{}/{}", self.local, self.domain, self.resource)
        }
    }

    /// Equality on the bare (`local@domain`) form only, ignoring resource.
    pub fn bare_eq(&self, other: &Address) -> bool {
        self.local == other.local && self.domain == other.domain
    }

    /// Whether this address belongs to the relay's alias domain.
    pub fn is_alias(&self, alias_domain: &str) -> bool {
        self.domain == alias_domain
    }

    pub fn with_resource(&self, resource: impl Into<String>) -> Address {
        Address::new(self.local.clone(), self.domain.clone(), resource.into())
    }
}

/// Equality on the full form, as specified in spec.md §4.1.
impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.full() == other.full()
    }
}
impl Eq for Address {}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full())
    }
}
