use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// A single cookie of a previously established session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
}

impl SessionCookie {
    /// Whether the cookie belongs to `host`. A cookie without a domain matches every host.
    pub fn matches_host(&self, host: &str) -> bool {
        let Some(ref domain) = self.domain else {
            return true;
        };

        let domain = domain.trim_start_matches('.').to_ascii_lowercase();
        let host = host.to_ascii_lowercase();
        host == domain || host.ends_with(&format!(".{}", domain))
    }
}

/// Opaque, already authenticated session handed to the fetchers.
///
/// It is only ever read: acquiring or refreshing it happens outside this crate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    #[serde(default)]
    pub cookies: Vec<SessionCookie>,
    pub user_agent: Option<String>,
}

impl SessionContext {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session file: {}", path))?;

        let session: SessionContext = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse session file: {}", path))?;

        Ok(session)
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Cookies that apply to `host`, in file order.
    pub fn cookies_for<'a>(&'a self, host: &'a str) -> impl Iterator<Item = &'a SessionCookie> + 'a {
        self.cookies.iter().filter(move |c| c.matches_host(host))
    }

    /// Value for an HTTP `Cookie` header sent to `host`, `None` when no cookie applies.
    pub fn cookie_header_for(&self, host: &str) -> Option<String> {
        let pairs: Vec<String> = self
            .cookies_for(host)
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();

        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }
}
