/// Where a candidate came from.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Provenance {
    pub backend: String,
    pub attempt: usize,
    /// SHA-256 of the prompt, for correlating attempts in logs.
    pub prompt_hash: String,
}

/// One raw generation attempt. Lives only until it is validated or dropped.
#[derive(Debug, Clone)]
pub struct CandidateOutput {
    pub raw: String,
    pub normalized: String,
    pub provenance: Provenance,
}

impl CandidateOutput {
    pub fn new(raw: String, provenance: Provenance) -> Self {
        let normalized = normalize(&raw);
        Self {
            raw,
            normalized,
            provenance,
        }
    }
}

/// Strips a leading ```` ```lang ```` fence, a trailing ```` ``` ```` fence
/// and surrounding whitespace.
pub fn normalize(raw: &str) -> String {
    let mut s = raw.trim();

    if let Some(rest) = s.strip_prefix("```") {
        // Drop the info string (`cpp`, `c++`, ...) up to the first newline.
        s = match rest.find('\n') {
            Some(idx) => &rest[idx + 1..],
            None => rest,
        };
    }

    if let Some(rest) = s.trim_end().strip_suffix("```") {
        s = rest;
    }

    s.trim().to_string()
}
