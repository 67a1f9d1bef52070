//! Organization-context input boundary
//!
//! The provider supplies the current organization's logo locator, or none
//! when no logo is configured. Keeping this a trait lets callers plug in
//! whatever owns that state (a session, a tenant registry, a request
//! extension) and lets tests substitute fixed values.

/// Supplies the current organization's logo locator
pub trait OrganizationContext {
    /// The logo locator, or `None` when the organization has no logo
    fn logo_url(&self) -> Option<&str>;
}

impl OrganizationContext for Option<String> {
    fn logo_url(&self) -> Option<&str> {
        self.as_deref()
    }
}

impl OrganizationContext for Option<&str> {
    fn logo_url(&self) -> Option<&str> {
        *self
    }
}
