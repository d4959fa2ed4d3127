use serde::{Deserialize, Serialize};

/// Ambient data from the inbound request the engine was invoked with.
///
/// HTTP tools run on behalf of the caller: their outbound requests carry the
/// caller's cookies and headers so backend services see the original
/// identity.  The transport layer fills this in; the core only reads it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    /// Base URL relative path templates are joined against.
    /// `None` falls back to `http://localhost:8080`.
    pub base_url: Option<String>,
    /// Inbound header pairs, propagated minus the content-negotiation set.
    pub headers: Vec<(String, String)>,
    /// Inbound cookie pairs, reassembled into a `Cookie` header.
    pub cookies: Vec<(String, String)>,
}

impl RequestContext {
    /// Rebuild the `Cookie` header value; `None` when there are no cookies.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}
