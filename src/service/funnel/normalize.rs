//! URL normalization used for job-wide deduplication

use url::Url;

/// Query parameters that only track the click and never change the document
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "dclid", "msclkid", "igshid", "mc_cid", "mc_eid", "ref", "ref_src",
    "cmpid", "_ga", "yclid",
];

/// A search result URL in parsed and normalized form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedUrl {
    pub url: Url,
    /// Dedup key: host without `www.`, path without trailing slash, sorted query
    pub key: String,
    /// Host without `www.`
    pub domain: String,
}

fn is_tracking_param(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name.starts_with("utm_") || TRACKING_PARAMS.contains(&name.as_str())
}

/// Parse and normalize a raw result URL; `None` for non-web or malformed URLs
pub fn normalize_url(raw: &str) -> Option<NormalizedUrl> {
    let url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }

    let host = url.host_str()?.to_lowercase();
    let domain = host.strip_prefix("www.").unwrap_or(&host).to_string();

    let path = url.path().trim_end_matches('/');

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();

    let mut key = format!("{}{}", domain, path);
    if let Some(port) = url.port() {
        key = format!("{}:{}{}", domain, port, path);
    }
    if !params.is_empty() {
        let query = params
            .iter()
            .map(|(k, v)| if v.is_empty() { k.clone() } else { format!("{}={}", k, v) })
            .collect::<Vec<_>>()
            .join("&");
        key.push('?');
        key.push_str(&query);
    }

    Some(NormalizedUrl { url, key, domain })
}
