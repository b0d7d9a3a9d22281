use std::collections::HashSet;

/// Principal represents the authenticated caller with its site-wide standing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub site_admin: bool,
    /// Site-wide capability tags granted by the identity provider.
    pub capabilities: HashSet<String>,
}

impl Principal {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            site_admin: false,
            capabilities: HashSet::new(),
        }
    }

    pub fn as_site_admin(mut self) -> Self {
        self.site_admin = true;
        self
    }

    pub fn with_capabilities(mut self, caps: impl IntoIterator<Item = String>) -> Self {
        self.capabilities = caps.into_iter().collect();
        self
    }

    pub fn is_site_admin(&self) -> bool {
        self.site_admin
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}
