//! The seam to an identity backend.
//!
//! The gateway never looks at credential stores itself; it hands userid and
//! password to an [`Authenticator`] and consumes the identity it yields.
//! Identities live for one session, held by the authenticator.

/// The identity yielded by a successful authentication.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Identity {
    /// Stable identifier of the principal
    pub id: String,

    /// The ACL role this principal acts under
    pub role: String,

    /// An opaque session token handed back to the client after login
    pub token: Option<String>,
}

/// The outcome of an authentication attempt.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AuthResult {
    /// Whether the credentials were accepted
    pub valid: bool,

    /// The authenticated identity on success
    pub identity: Option<Identity>,

    /// Human-readable messages explaining the outcome
    pub messages: Vec<String>,

    /// Backend-specific result code
    pub code: i32,
}

impl AuthResult {
    /// A successful result carrying `identity`.
    pub fn success(identity: Identity) -> Self {
        Self {
            valid: true,
            identity: Some(identity),
            messages: Vec::new(),
            code: 0,
        }
    }

    /// A failed result with an explanatory message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            identity: None,
            messages: vec![message.into()],
            code: -1,
        }
    }
}

/// An identity backend.
///
/// Credentials are staged with [`set_credentials`](Self::set_credentials)
/// and checked by [`authenticate`](Self::authenticate); the resulting
/// identity persists on the authenticator until cleared.
pub trait Authenticator {
    /// Stage credentials for the next authentication attempt.
    fn set_credentials(&mut self, userid: &str, password: &str);

    /// Check the staged credentials, retaining the identity on success.
    fn authenticate(&mut self) -> AuthResult;

    /// Whether an identity is currently held.
    fn has_identity(&self) -> bool;

    /// The currently held identity, if any.
    fn get_identity(&self) -> Option<&Identity>;

    /// Discard the currently held identity.
    fn clear_identity(&mut self);
}
