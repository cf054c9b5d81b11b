use std::collections::HashSet;

use reqwest::Url;

/// Terminal outcome of a single probe, produced by a worker after the HTTP
/// exchange (or its failure) has settled.
#[derive(Clone, Debug)]
pub enum ProbeOutcome {
    Success {
        status: u16,
        content_length: Option<u64>,
        location: Option<String>,
    },
    Timeout,
    TransportError(String),
    /// The candidate URL was already probed this run, or the word could not
    /// be joined onto the base. No request was issued.
    Excluded,
}

#[derive(Clone, Debug)]
pub struct ProbeResult {
    pub requested_url: String,
    pub outcome: ProbeOutcome,
}

/// A probe that classified Positive and passed the dedup gate. This is what
/// gets persisted, and what the recursion expander re-seeds from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Discovery {
    pub url: String,
    pub status: u16,
    pub depth: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    Positive {
        url: String,
        status: u16,
        directory: bool,
    },
    Negative,
}

#[derive(Clone, Debug)]
pub struct Classifier {
    accepted: HashSet<u16>,
}

impl Classifier {
    pub fn new(accepted: HashSet<u16>) -> Self {
        Self { accepted }
    }

    /// Positive iff the exchange completed and the status code is in the
    /// accepted set. Timeouts and transport errors are Negative here; the
    /// worker logs and counts them separately so they are never mistaken
    /// for a 404.
    pub fn classify(&self, result: &ProbeResult) -> Classification {
        match &result.outcome {
            ProbeOutcome::Success { status, .. } if self.accepted.contains(status) => {
                match directory_target(result) {
                    Some(dir) => Classification::Positive {
                        url: dir.to_string(),
                        status: *status,
                        directory: true,
                    },
                    None => Classification::Positive {
                        url: result.requested_url.clone(),
                        status: *status,
                        directory: false,
                    },
                }
            }
            _ => Classification::Negative,
        }
    }
}

/// Directory-like predicate, kept separate from the acceptance predicate so
/// recursion eligibility can be tested in isolation. A probe looks like a
/// directory when it redirects (301/302) to a trailing-slash URL on the same
/// scheme/host, or when a trailing-slash request answered 200. Returns the
/// URL to record and expand.
pub fn directory_target(result: &ProbeResult) -> Option<Url> {
    let (status, location) = match &result.outcome {
        ProbeOutcome::Success {
            status, location, ..
        } => (*status, location.as_deref()),
        _ => return None,
    };
    let requested = Url::parse(&result.requested_url).ok()?;
    match status {
        301 | 302 => {
            let target = requested.join(location?).ok()?;
            if target.scheme() != requested.scheme()
                || target.host_str() != requested.host_str()
                || target.port_or_known_default() != requested.port_or_known_default()
            {
                return None;
            }
            if target.path().ends_with('/') {
                Some(target)
            } else {
                None
            }
        }
        200 if requested.path().ends_with('/') => Some(requested),
        _ => None,
    }
}
