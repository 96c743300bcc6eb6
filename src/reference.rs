//! Loading the previously published calendar.

use std::path::PathBuf;

use anyhow::{Context, Result};
use pcr_ics_core::Calendar;
use pcr_ics_core::ics::parse_calendar;
use reqwest::Client;
use tracing::warn;

use crate::config::BadReferencePolicy;
use crate::source::fetch_text;

/// Where the reference calendar comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceSource {
    None,
    Url(String),
    Path(PathBuf),
}

impl ReferenceSource {
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.eq_ignore_ascii_case("none") || trimmed.is_empty() {
            ReferenceSource::None
        } else if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            ReferenceSource::Url(trimmed.to_string())
        } else {
            ReferenceSource::Path(PathBuf::from(trimmed))
        }
    }
}

impl std::fmt::Display for ReferenceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceSource::None => write!(f, "none"),
            ReferenceSource::Url(url) => write!(f, "{}", url),
            ReferenceSource::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A parsed reference calendar along with the exact text it came from
#[derive(Debug)]
pub struct Reference {
    pub raw: String,
    pub calendar: Calendar,
}

/// Read and parse the reference calendar.
///
/// `Ok(None)` means generation starts from scratch: either no reference was
/// requested, or it was unusable and the policy allows a fresh start.
pub async fn load(
    source: &ReferenceSource,
    http: &Client,
    policy: BadReferencePolicy,
) -> Result<Option<Reference>> {
    let result = match source {
        ReferenceSource::None => return Ok(None),
        ReferenceSource::Url(url) => fetch_text(http, url).await,
        ReferenceSource::Path(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read reference calendar at {}", path.display())),
    }
    .and_then(|raw| {
        let calendar = parse_calendar(&raw)
            .with_context(|| format!("Reference calendar at {} is corrupt", source))?;
        Ok(Reference { raw, calendar })
    });

    match (result, policy) {
        (Ok(reference), _) => Ok(Some(reference)),
        (Err(e), BadReferencePolicy::Fail) => Err(e),
        (Err(e), BadReferencePolicy::Fresh) => {
            warn!("Ignoring unusable reference calendar: {:#}", e);
            Ok(None)
        }
    }
}
