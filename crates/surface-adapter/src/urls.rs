//! URL hygiene for the TCMSP site.

use tracing::warn;
use url::Url;

pub const BASE_URL: &str = "https://tcmsp-e.com";

/// Host spellings collapsed to one canonical form so URL-stagnation checks
/// and step logs compare equal across redirects.
const HOST_ALIASES: [(&str, &str); 1] = [("www.tcmsp-e.com", "tcmsp-e.com")];

/// Canonicalize: collapse host aliases and re-encode the query string.
/// Unparseable input is returned unchanged; navigation will surface the real
/// error.
pub fn normalize_url(raw: &str) -> String {
    let mut parsed = match Url::parse(raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(url = raw, %err, "url did not parse; leaving as-is");
            return raw.to_string();
        }
    };
    if let Some(host) = parsed.host_str() {
        if let Some((_, canonical)) = HOST_ALIASES.iter().find(|(alias, _)| *alias == host) {
            let _ = parsed.set_host(Some(canonical));
        }
    }
    if let Some(query) = parsed.query().map(|q| q.to_string()) {
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        if encoded.is_empty() {
            parsed.set_query(None);
        } else {
            parsed.set_query(Some(&encoded));
        }
    }
    parsed.to_string()
}

/// Resolve a possibly relative href against the known base origin, then
/// canonicalize.
pub fn resolve_href(href: &str) -> Option<String> {
    let base = Url::parse(BASE_URL).ok()?;
    let joined = base.join(href).ok()?;
    Some(normalize_url(joined.as_str()))
}
