use std::fmt;

use reqwest::Url;

use crate::error::DownloadError;

const REDACTED: &str = "***";

pub const MIN_FREE_TEXT_KEY_LEN: usize = 8;

/// Static API key. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Masks the key in `text`. Keys shorter than [`MIN_FREE_TEXT_KEY_LEN`]
    /// are only masked as a whole `key=` query value, so ordinary words that
    /// happen to contain them survive.
    pub fn redact(&self, text: &str) -> String {
        if self.0.is_empty() {
            return text.to_string();
        }
        if self.0.len() >= MIN_FREE_TEXT_KEY_LEN {
            return text.replace(&self.0, REDACTED);
        }
        let needle = format!("key={}", self.0);
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(pos) = rest.find(&needle) {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + needle.len()..];
            if after.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
                out.push_str(&needle);
            } else {
                out.push_str("key=");
                out.push_str(REDACTED);
            }
            rest = after;
        }
        out.push_str(rest);
        out
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Sets (or overwrites) the `key` query parameter, keeping every other
/// parameter, the host and the path.
///
/// The key rides in the query string on purpose: the media URI may redirect to
/// another host, and a header credential would be dropped on the way. The
/// resulting URL therefore must only be logged through [`redact_url`].
pub fn with_credential(uri: &str, credential: &ApiKey) -> Result<Url, DownloadError> {
    let mut url = Url::parse(uri.trim()).map_err(|err| DownloadError::InvalidUri {
        uri: uri.to_string(),
        reason: err.to_string(),
    })?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| name != "key")
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (name, value) in &kept {
            pairs.append_pair(name, value);
        }
        pairs.append_pair("key", credential.expose());
    }
    Ok(url)
}

/// Renders a URL with the `key` parameter masked.
pub fn redact_url(url: &Url) -> String {
    if !url.query_pairs().any(|(name, _)| name == "key") {
        return url.to_string();
    }
    let mut masked = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(name, value)| {
            let value = if name == "key" {
                REDACTED.to_string()
            } else {
                value.into_owned()
            };
            (name.into_owned(), value)
        })
        .collect();
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}
