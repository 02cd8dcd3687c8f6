//! Preprint provider lookup
//!
//! Maps an OSF provider URL to the human-readable name of the preprint
//! server. Patterns are plain substrings checked in table order and the
//! first match wins. Newer servers sit at the top so they take precedence
//! when a URL happens to mention two of them.

use crate::types::Record;

/// Path of the provider URL inside a listing or detail record
pub const PROVIDER_FIELD: &str = "data.relationships.provider.links.related.href";

/// Provider URL prefix of OSF's own preprint server
const OSF_PROVIDER_PREFIX: &str = "https://api.osf.io/v2/providers/preprints/osf/";

/// Label for URLs that match nothing
pub const UNKNOWN_PROVIDER: &str = "Unknown";

const PROVIDERS: &[(&str, &str)] = &[
    ("biohackrxiv", "BioHackrXiv"),
    ("indiarxiv", "IndiaRxiv"),
    ("edarxiv", "EdArXiv"),
    ("bodoarxiv", "BodoArXiv"),
    ("mediarxiv", "MediArXiv"),
    ("frenxiv", "Frenxiv"),
    ("ecoevorxiv", "EcoEvoRxiv"),
    ("africarxiv", "AfricArXiv"),
    ("ecsarxiv", "ECSarXiv"),
    ("arabixiv", "Arabixiv"),
    ("nutrixiv", "NutriXiv"),
    ("focusarchive", "FocUS Archive"),
    ("agrixiv", "AgriXiv"),
    ("marxiv", "MarXiv"),
    ("metaarxiv", "MetaArXiv"),
    ("mindrxiv", "MindRxiv"),
    ("lissa", "LIS Scholarship Archive"),
    ("thesiscommons", "Thesis Commons"),
    ("sportrxiv", "SportRxiv"),
    ("paleorxiv", "PaleorXiv"),
    ("eartharxiv", "EarthArXiv"),
    ("inarxiv", "INA-Rxiv"),
    ("lawarxiv", "LawArXiv"),
    ("engrxiv", "engrXiv"),
    ("socarxiv", "SocArXiv"),
    ("psyarxiv", "PsyArXiv"),
];

/// Name of the preprint server behind a provider URL
pub fn provider_label(url: &str) -> &'static str {
    PROVIDERS
        .iter()
        .find(|(pattern, _)| url.contains(pattern))
        .map(|(_, label)| *label)
        .unwrap_or_else(|| {
            if url.starts_with(OSF_PROVIDER_PREFIX) {
                "OSF"
            } else {
                UNKNOWN_PROVIDER
            }
        })
}

/// Provider of a record, read from its relationships
pub fn provider_of(record: &Record) -> &'static str {
    record
        .field(PROVIDER_FIELD)
        .and_then(serde_json::Value::as_str)
        .map_or(UNKNOWN_PROVIDER, provider_label)
}
