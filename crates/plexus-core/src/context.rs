use secrecy::SecretString;

/// Fallback caller name when no identity header is present
pub const ANONYMOUS_CALLER: &str = "anonymous";

/// Identity of the logical caller ("agent") issuing a request
///
/// Populated from the `x-plexus-caller` header by the server layer.
/// Usage records and routing rules are keyed by this identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// Caller name, `anonymous` when unidentified
    pub name: String,
    /// Privacy tag from `x-plexus-privacy`, matched by routing rules
    pub privacy: Option<String>,
}

impl Default for CallerIdentity {
    fn default() -> Self {
        Self {
            name: ANONYMOUS_CALLER.to_owned(),
            privacy: None,
        }
    }
}

/// Runtime context carried alongside a request through routing and dispatch
///
/// Built once per request by the server middleware; read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Logical caller identity
    pub caller: CallerIdentity,
    /// Caller-supplied API key that overrides the configured provider key
    pub api_key: Option<SecretString>,
}

impl RequestContext {
    /// Create a minimal context for embedded (non-HTTP) use
    pub fn empty() -> Self {
        Self::default()
    }

    /// Context for a named caller, mostly useful in tests
    pub fn for_caller(name: &str) -> Self {
        Self {
            caller: CallerIdentity {
                name: name.to_owned(),
                privacy: None,
            },
            api_key: None,
        }
    }
}
