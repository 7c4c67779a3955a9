/// Supplies the bearer token attached to every request. Read-only from the
/// client's point of view; the token is issued by the external auth provider.
pub trait CredentialStore: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}
