//! Lookup of the resolver serving each enabled provider.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::identity::{IdentityError, ProviderKind};
use crate::ports::ProviderAccountResolver;

/// Enabled providers and their profile resolvers.
///
/// Adding a provider means registering another resolver; login code never
/// branches on the provider kind.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    resolvers: HashMap<ProviderKind, Arc<dyn ProviderAccountResolver>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolver under the kind it reports.
    pub fn with_resolver(mut self, resolver: Arc<dyn ProviderAccountResolver>) -> Self {
        self.resolvers.insert(resolver.kind(), resolver);
        self
    }

    /// Resolver for `kind`.
    ///
    /// # Errors
    ///
    /// - `Validation` if the provider is not enabled
    pub fn resolver(
        &self,
        kind: ProviderKind,
    ) -> Result<Arc<dyn ProviderAccountResolver>, IdentityError> {
        self.resolvers
            .get(&kind)
            .cloned()
            .ok_or_else(|| {
                IdentityError::validation(
                    "provider",
                    format!("provider '{}' is not enabled", kind),
                )
            })
    }

    pub fn is_enabled(&self, kind: ProviderKind) -> bool {
        self.resolvers.contains_key(&kind)
    }

    /// Enabled providers in a stable order.
    pub fn enabled(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<_> = self.resolvers.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("enabled", &self.enabled())
            .finish()
    }
}
