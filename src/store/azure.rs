//! Azure Blob Storage object store.
//!
//! Talks to the Blob REST endpoint directly over plain HTTP: container flat
//! listing (`restype=container&comp=list`) with marker-based continuation,
//! and per-blob GET for fetches. Authenticates with an optional SAS token;
//! without one the container must allow anonymous reads.

use std::io::Read;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants;
use crate::error::StoreError;

use super::ObjectStore;

static BLOB_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<Name>([^<]+)</Name>").unwrap());
static NEXT_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<NextMarker>([^<]+)</NextMarker>").unwrap());

/// Blob container client implementing [`ObjectStore`].
pub struct AzureBlobStore {
    account_url: String,
    container: String,
    sas_token: Option<String>,
    agent: ureq::Agent,
}

impl AzureBlobStore {
    /// Client for `https://{account}.blob.core.windows.net/{container}`.
    pub fn new(account: &str, container: &str, sas_token: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(constants::get_http_timeout()))
            .build();
        Self {
            account_url: format!("https://{}.blob.core.windows.net", account),
            container: container.to_string(),
            sas_token: sas_token
                .map(|t| t.trim_start_matches('?').to_string())
                .filter(|t| !t.is_empty()),
            agent,
        }
    }

    fn container_url(&self) -> String {
        format!("{}/{}", self.account_url, self.container)
    }
}

impl ObjectStore for AzureBlobStore {
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let mut url = format!(
                "{}?restype=container&comp=list&prefix={}",
                self.container_url(),
                prefix
            );
            if let Some(m) = &marker {
                url.push_str("&marker=");
                url.push_str(m);
            }
            if let Some(sas) = &self.sas_token {
                url.push('&');
                url.push_str(sas);
            }

            let body = self
                .agent
                .get(&url)
                .call()
                .map_err(map_ureq)?
                .into_string()
                .map_err(StoreError::Io)?;

            for capture in BLOB_NAME_RE.captures_iter(&body) {
                names.push(xml_unescape(&capture[1]));
            }
            match NEXT_MARKER_RE.captures(&body) {
                Some(capture) => marker = Some(capture[1].to_string()),
                None => break,
            }
        }
        Ok(names)
    }

    fn fetch(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let mut url = format!("{}/{}", self.container_url(), name);
        if let Some(sas) = &self.sas_token {
            url.push('?');
            url.push_str(sas);
        }

        let response = self.agent.get(&url).call().map_err(|err| match err {
            ureq::Error::Status(404, _) => StoreError::NotFound(name.to_string()),
            other => map_ureq(other),
        })?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(StoreError::Io)?;
        Ok(bytes)
    }
}

fn map_ureq(err: ureq::Error) -> StoreError {
    match err {
        ureq::Error::Status(code, _) => StoreError::Status(code),
        ureq::Error::Transport(t) => StoreError::Transport(t.to_string()),
    }
}

fn xml_unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_name_extraction() {
        let body = "<EnumerationResults><Blobs>\
                    <Blob><Name>logs/a.csv</Name></Blob>\
                    <Blob><Name>logs/b&amp;c.zip</Name></Blob>\
                    </Blobs></EnumerationResults>";
        let names: Vec<String> = BLOB_NAME_RE
            .captures_iter(body)
            .map(|c| xml_unescape(&c[1]))
            .collect();
        assert_eq!(names, vec!["logs/a.csv", "logs/b&c.zip"]);
    }

    #[test]
    fn test_sas_token_question_mark_is_stripped() {
        let store = AzureBlobStore::new("acct", "flows", Some("?sv=2022&sig=x".to_string()));
        assert_eq!(store.sas_token.as_deref(), Some("sv=2022&sig=x"));
    }
}
