use http::{HeaderMap, Method, Request};

//
// Identity
//

/// The API identity a request resolves to.
///
/// Upstream of this crate sits the gateway's registry of APIs and clients —
/// out of scope here and treated as an external collaborator — which binds
/// an inbound request to exactly one of these two forms before the caching
/// policy ever sees it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Identity {
    /// A request bound to a client contract, identified by its API key.
    ApiKey(String),

    /// A request with no bound contract, identified by the API it targets.
    Contract {
        /// Organization identifier.
        org_id: String,
        /// API identifier.
        api_id: String,
        /// API version.
        version: String,
    },
}

impl Identity {
    fn write_into(&self, key: &mut String) {
        match self {
            Self::ApiKey(api_key) => key.push_str(api_key),
            Self::Contract { org_id, api_id, version } => {
                key.push_str(org_id);
                key.push(':');
                key.push_str(api_id);
                key.push(':');
                key.push_str(version);
            }
        }
    }
}

//
// RequestFingerprint
//

/// A read-only snapshot of the parts of a request that the caching policy
/// needs: identity, method, destination, raw query, and headers.
///
/// Built once per request and never mutated; the policy derives the cache
/// key and consults `Accept` from it but otherwise leaves it untouched.
#[derive(Clone, Debug)]
pub struct RequestFingerprint {
    identity: Identity,
    method: Method,
    destination: String,
    raw_query: Option<String>,
    headers: HeaderMap,
}

impl RequestFingerprint {
    /// Build a fingerprint from an inbound request and its resolved identity.
    ///
    /// `destination` is the request's path as understood by the gateway
    /// (already stripped of its scheme/authority by the time it reaches the
    /// policy chain).
    pub fn new(
        identity: Identity,
        method: Method,
        destination: impl Into<String>,
        raw_query: Option<String>,
        headers: HeaderMap,
    ) -> Self {
        Self { identity, method, destination: destination.into(), raw_query, headers }
    }

    /// Build a fingerprint directly from an [`http::Request`], using its
    /// method, path, query, and headers.
    pub fn from_request<B>(identity: Identity, request: &Request<B>) -> Self {
        let uri = request.uri();
        Self::new(
            identity,
            request.method().clone(),
            uri.path(),
            uri.query().map(str::to_string),
            request.headers().clone(),
        )
    }

    /// API identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// HTTP method ("verb").
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Destination path.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Raw, unnormalized query string, if present.
    pub fn raw_query(&self) -> Option<&str> {
        self.raw_query.as_deref()
    }

    /// Case-insensitive request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub(crate) fn write_identity(&self, key: &mut String) {
        self.identity.write_into(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_identity_is_used_verbatim() {
        let identity = Identity::ApiKey("abc123".to_string());
        let mut key = String::new();
        identity.write_into(&mut key);
        assert_eq!(key, "abc123");
    }

    #[test]
    fn contract_identity_joins_with_colon() {
        let identity =
            Identity::Contract { org_id: "org".into(), api_id: "api".into(), version: "v1".into() };
        let mut key = String::new();
        identity.write_into(&mut key);
        assert_eq!(key, "org:api:v1");
    }
}
