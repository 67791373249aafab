//! User-Agent string shared by probe and transfer traffic.

/// Project URL advertised in the User-Agent.
const PROJECT_UA_URL: &str = "https://github.com/festival-fetch/festival-fetch";

/// Default User-Agent for all HTTP requests (identifies the tool and version).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("festival-fetch/{version} (+{PROJECT_UA_URL})")
}
