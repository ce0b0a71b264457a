//! Preferred-region resolution from request headers.

use axum::http::{header, HeaderMap};

use crate::config::RegionConfig;

/// Resolves an optional region preference.
///
/// Order: explicit hint header, then forwarding proxy presence, then the
/// `Accept-Language` mapping. No signal means no preference.
#[derive(Debug, Clone)]
pub struct RegionResolver {
    hint_header: String,
    forwarded_for_region: Option<String>,
    accept_language: Vec<(String, String)>,
}

impl RegionResolver {
    pub fn from_config(config: &RegionConfig) -> Self {
        Self {
            hint_header: config.hint_header.to_ascii_lowercase(),
            forwarded_for_region: config.forwarded_for_region.clone(),
            accept_language: config
                .accept_language
                .iter()
                .map(|(tag, region)| (tag.to_ascii_lowercase(), region.clone()))
                .collect(),
        }
    }

    pub fn resolve(&self, headers: &HeaderMap) -> Option<String> {
        if let Some(hint) = header_str(headers, &self.hint_header) {
            let hint = hint.trim();
            if !hint.is_empty() {
                return Some(hint.to_string());
            }
        }

        if headers.contains_key("x-forwarded-for") {
            if let Some(region) = &self.forwarded_for_region {
                return Some(region.clone());
            }
        }

        let languages = headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok())?
            .to_ascii_lowercase();

        self.accept_language
            .iter()
            .find(|(tag, _)| languages.contains(tag.as_str()))
            .map(|(_, region)| region.clone())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
