use reqwest::Url;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBase { url: String, reason: String },

    #[error("cannot join '{word}' onto '{base}'")]
    Join { base: String, word: String },
}

/// Validates and canonicalizes the base URL. Requires an http(s) scheme and
/// a host; everything downstream works on the parsed form.
pub fn normalize(base_url: &str) -> Result<Url, TargetError> {
    let raw = base_url.trim();
    let parsed = Url::parse(raw).map_err(|e| TargetError::InvalidBase {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(TargetError::InvalidBase {
                url: raw.to_string(),
                reason: format!("unsupported scheme '{other}'"),
            })
        }
    }
    if parsed.host_str().is_none() {
        return Err(TargetError::InvalidBase {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(parsed)
}

/// RFC-3986 relative resolution of a wordlist entry against the base.
/// Words that resolve off the base's scheme/host (protocol-relative tricks,
/// absolute URLs to other hosts) are rejected rather than probed.
pub fn join_word(base: &Url, word: &str) -> Result<Url, TargetError> {
    let joined = base.join(word).map_err(|_| TargetError::Join {
        base: base.to_string(),
        word: word.to_string(),
    })?;
    if joined.scheme() != base.scheme()
        || joined.host_str() != base.host_str()
        || joined.port_or_known_default() != base.port_or_known_default()
    {
        return Err(TargetError::Join {
            base: base.to_string(),
            word: word.to_string(),
        });
    }
    Ok(joined)
}

/// Directory roots always carry a trailing slash so that joining a word
/// appends a segment instead of replacing the last one.
pub fn ensure_dir_url(url: &Url) -> Url {
    if url.path().ends_with('/') {
        return url.clone();
    }
    let mut out = url.clone();
    let path = format!("{}/", url.path());
    out.set_path(&path);
    out
}
