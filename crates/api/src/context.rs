use crm_auth::{AuthzError, Principal, UserIdentity};

/// How the request presented its credentials.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CredentialTransport {
    Cookie,
    Bearer,
    None,
}

/// Principal context for a request.
///
/// Always present on routed requests; anonymous when no valid token was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
    transport: CredentialTransport,
}

impl PrincipalContext {
    pub fn new(principal: Principal, transport: CredentialTransport) -> Self {
        Self {
            principal,
            transport,
        }
    }

    pub fn anonymous() -> Self {
        Self::new(Principal::Anonymous, CredentialTransport::None)
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn transport(&self) -> CredentialTransport {
        self.transport
    }

    /// The authenticated identity, or `Unauthenticated`.
    pub fn require_user(&self) -> Result<&UserIdentity, AuthzError> {
        self.principal.identity().ok_or(AuthzError::Unauthenticated)
    }
}

impl Default for PrincipalContext {
    fn default() -> Self {
        Self::anonymous()
    }
}
