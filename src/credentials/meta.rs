//! Request metadata recorded alongside each refresh token.

/// Longest textual IP address (IPv4-mapped IPv6).
pub const MAX_IP_LEN: usize = 45;

pub const MAX_USER_AGENT_LEN: usize = 255;

/// Stored when the client sent no usable user agent.
pub const UNKNOWN_USER_AGENT: &str = "unknown";

/// Client metadata as seen by the transport layer, before sanitizing.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestMeta {
    pub fn new(ip: Option<String>, user_agent: Option<String>) -> Self {
        Self { ip, user_agent }
    }

    pub fn sanitized_ip(&self) -> Option<String> {
        self.ip
            .as_deref()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(|ip| ip.chars().take(MAX_IP_LEN).collect())
    }

    /// User agent with markup removed, bounded in length, never empty.
    pub fn sanitized_user_agent(&self) -> String {
        let Some(raw) = self.user_agent.as_deref() else {
            return UNKNOWN_USER_AGENT.to_string();
        };

        let stripped = strip_tags(raw);
        let trimmed = stripped.trim();
        if trimmed.is_empty() {
            return UNKNOWN_USER_AGENT.to_string();
        }

        trimmed.chars().take(MAX_USER_AGENT_LEN).collect()
    }
}

/// Remove everything between `<` and the next `>`.
/// An unterminated `<` is kept as text.
fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('<') {
        match rest[start..].find('>') {
            Some(end) => {
                out.push_str(&rest[..start]);
                rest = &rest[start + end + 1..];
            }
            None => break,
        }
    }

    out.push_str(rest);
    out
}
