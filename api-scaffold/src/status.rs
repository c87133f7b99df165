//! HTTP status registry
//!
//! Maps every officially assigned HTTP status code to the canonical envelope
//! it produces: whether the status counts as a success and the default
//! message (the standard reason phrase).
//!
//! The registry is built from a single hand-authored table that is checked
//! at compile time (codes strictly ascending, all within `100..=599`).
//! Adding a status means adding one table row; nothing else branches on
//! individual codes.
//!
//! # Example
//!
//! ```rust
//! use api_scaffold::status;
//!
//! let not_found = status::lookup(404);
//! assert!(!not_found.is_success);
//! assert_eq!(not_found.default_message, "Not Found");
//!
//! // Unknown codes fall back to 500
//! assert_eq!(status::lookup(599).code, 500);
//! ```

use std::collections::BTreeMap;

use axum::http::StatusCode;
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::envelope::BaseEnvelope;

/// Assigned status codes with their reason phrases, ascending by code.
const STATUS_TABLE: &[(u16, &str)] = &[
    // Informational
    (100, "Continue"),
    (101, "Switching Protocols"),
    (102, "Processing"),
    (103, "Early Hints"),
    // Successful
    (200, "OK"),
    (201, "Created"),
    (202, "Accepted"),
    (203, "Non-Authoritative Information"),
    (204, "No Content"),
    (205, "Reset Content"),
    (206, "Partial Content"),
    (207, "Multi-Status"),
    (208, "Already Reported"),
    (226, "IM Used"),
    // Redirection
    (300, "Multiple Choices"),
    (301, "Moved Permanently"),
    (302, "Found"),
    (303, "See Other"),
    (304, "Not Modified"),
    (305, "Use Proxy"),
    (307, "Temporary Redirect"),
    (308, "Permanent Redirect"),
    // Client errors
    (400, "Bad Request"),
    (401, "Unauthorized"),
    (402, "Payment Required"),
    (403, "Forbidden"),
    (404, "Not Found"),
    (405, "Method Not Allowed"),
    (406, "Not Acceptable"),
    (407, "Proxy Authentication Required"),
    (408, "Request Timeout"),
    (409, "Conflict"),
    (410, "Gone"),
    (411, "Length Required"),
    (412, "Precondition Failed"),
    (413, "Request Entity Too Large"),
    (414, "Request-URI Too Long"),
    (415, "Unsupported Media Type"),
    (416, "Requested Range Not Satisfiable"),
    (417, "Expectation Failed"),
    (418, "I'm a Teapot"),
    (421, "Misdirected Request"),
    (422, "Unprocessable Entity"),
    (423, "Locked"),
    (424, "Failed Dependency"),
    (425, "Too Early"),
    (426, "Upgrade Required"),
    (428, "Precondition Required"),
    (429, "Too Many Requests"),
    (431, "Request Header Fields Too Large"),
    (451, "Unavailable For Legal Reasons"),
    // Server errors
    (500, "Internal Server Error"),
    (501, "Not Implemented"),
    (502, "Bad Gateway"),
    (503, "Service Unavailable"),
    (504, "Gateway Timeout"),
    (505, "HTTP Version Not Supported"),
    (506, "Variant Also Negotiates"),
    (507, "Insufficient Storage"),
    (508, "Loop Detected"),
    (510, "Not Extended"),
    (511, "Network Authentication Required"),
];

const fn table_is_well_formed(table: &[(u16, &str)]) -> bool {
    let mut i = 0;
    while i < table.len() {
        let code = table[i].0;
        if code < 100 || code > 599 {
            return false;
        }
        if i > 0 && table[i - 1].0 >= code {
            return false;
        }
        i += 1;
    }
    true
}

const _: () = assert!(
    table_is_well_formed(STATUS_TABLE),
    "status table must be strictly ascending and within 100..=599"
);

/// Descriptor used for codes the registry does not know.
const FALLBACK: StatusDescriptor = StatusDescriptor::new(500, "Internal Server Error");

/// Static metadata for one HTTP status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StatusDescriptor {
    /// Three-digit status code
    pub code: u16,
    /// True only for 2xx codes
    pub is_success: bool,
    /// Standard reason phrase, used as the envelope message
    pub default_message: &'static str,
}

impl StatusDescriptor {
    const fn new(code: u16, default_message: &'static str) -> Self {
        Self {
            code,
            is_success: code >= 200 && code < 300,
            default_message,
        }
    }

    /// Descriptor for a code without a registered schema
    ///
    /// Mirrors the bare base envelope: successful, with an empty message.
    #[must_use]
    pub const fn bare(code: u16) -> Self {
        Self {
            code,
            is_success: true,
            default_message: "",
        }
    }

    /// The status as an [`http::StatusCode`]
    ///
    /// Codes outside the representable range map to 500.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// The `{success, message}` envelope documented for this status
    #[must_use]
    pub fn envelope(&self) -> BaseEnvelope {
        BaseEnvelope::new(self.is_success, self.default_message)
    }
}

/// Read-only table of all known status descriptors
#[derive(Debug)]
pub struct StatusRegistry {
    descriptors: BTreeMap<u16, StatusDescriptor>,
}

static REGISTRY: Lazy<StatusRegistry> = Lazy::new(StatusRegistry::build);

impl StatusRegistry {
    fn build() -> Self {
        let descriptors = STATUS_TABLE
            .iter()
            .map(|&(code, phrase)| (code, StatusDescriptor::new(code, phrase)))
            .collect();
        Self { descriptors }
    }

    /// The process-wide registry, built on first access
    pub fn global() -> &'static StatusRegistry {
        &REGISTRY
    }

    /// Look up a descriptor, falling back to 500 for unknown codes
    pub fn lookup(&self, code: u16) -> &StatusDescriptor {
        self.descriptors.get(&code).unwrap_or(&FALLBACK)
    }

    /// Look up a descriptor without the 500 fallback
    pub fn get(&self, code: u16) -> Option<&StatusDescriptor> {
        self.descriptors.get(&code)
    }

    /// Whether the code has a registered descriptor
    pub fn contains(&self, code: u16) -> bool {
        self.descriptors.contains_key(&code)
    }

    /// Descriptors for the responses an endpoint documents
    ///
    /// The result is ordered by code. Codes without a registered descriptor
    /// are documented with [`StatusDescriptor::bare`]. This is metadata only;
    /// it does not change how errors are rendered.
    pub fn descriptors_for<I>(&self, codes: I) -> BTreeMap<u16, StatusDescriptor>
    where
        I: IntoIterator<Item = u16>,
    {
        codes
            .into_iter()
            .map(|code| {
                let descriptor = self
                    .get(code)
                    .copied()
                    .unwrap_or_else(|| StatusDescriptor::bare(code));
                (code, descriptor)
            })
            .collect()
    }

    /// Iterate over all descriptors in ascending code order
    pub fn iter(&self) -> impl Iterator<Item = &StatusDescriptor> {
        self.descriptors.values()
    }

    /// Number of registered codes
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

/// Look up a descriptor in the global registry
pub fn lookup(code: u16) -> &'static StatusDescriptor {
    StatusRegistry::global().lookup(code)
}

/// Documentation descriptors for a set of codes from the global registry
pub fn descriptors_for<I>(codes: I) -> BTreeMap<u16, StatusDescriptor>
where
    I: IntoIterator<Item = u16>,
{
    StatusRegistry::global().descriptors_for(codes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_flag_only_for_2xx() {
        for descriptor in StatusRegistry::global().iter() {
            assert_eq!(
                descriptor.is_success,
                (200..300).contains(&descriptor.code),
                "code {}",
                descriptor.code
            );
        }
    }

    #[test]
    fn test_covers_every_class() {
        let registry = StatusRegistry::global();
        for code in [100, 200, 201, 204, 301, 400, 404, 418, 422, 429, 500, 503, 511] {
            assert!(registry.contains(code), "missing {code}");
        }
        assert_eq!(registry.len(), STATUS_TABLE.len());
    }

    #[test]
    fn test_lookup_known() {
        let descriptor = lookup(422);
        assert_eq!(descriptor.code, 422);
        assert_eq!(descriptor.default_message, "Unprocessable Entity");
        assert!(!descriptor.is_success);

        let created = lookup(201);
        assert!(created.is_success);
        assert_eq!(created.default_message, "Created");
    }

    #[test]
    fn test_lookup_unknown_falls_back_to_500() {
        for code in [0, 306, 419, 599, 999] {
            let descriptor = lookup(code);
            assert_eq!(descriptor.code, 500);
            assert_eq!(descriptor.default_message, "Internal Server Error");
        }
    }

    #[test]
    fn test_fallback_matches_table_row() {
        assert_eq!(StatusRegistry::global().get(500), Some(&FALLBACK));
    }

    #[test]
    fn test_every_code_is_a_valid_status_code() {
        for descriptor in StatusRegistry::global().iter() {
            assert_eq!(descriptor.status_code().as_u16(), descriptor.code);
        }
    }

    #[test]
    fn test_descriptors_for_sorted_and_bare_fallback() {
        let docs = descriptors_for([500, 400, 299]);
        let codes: Vec<u16> = docs.keys().copied().collect();
        assert_eq!(codes, vec![299, 400, 500]);

        assert_eq!(docs[&400].default_message, "Bad Request");
        assert_eq!(docs[&299], StatusDescriptor::bare(299));
        assert!(docs[&299].is_success);
        assert_eq!(docs[&299].default_message, "");
    }

    #[test]
    fn test_descriptor_envelope() {
        let envelope = lookup(200).envelope();
        assert!(envelope.success);
        assert_eq!(envelope.message, "OK");

        let envelope = lookup(409).envelope();
        assert!(!envelope.success);
        assert_eq!(envelope.message, "Conflict");
    }

    #[test]
    fn test_table_validation_rejects_bad_tables() {
        assert!(!table_is_well_formed(&[(200, "OK"), (200, "OK")]));
        assert!(!table_is_well_formed(&[(404, "Not Found"), (400, "Bad Request")]));
        assert!(!table_is_well_formed(&[(600, "Nope")]));
        assert!(!table_is_well_formed(&[(99, "Nope")]));
        assert!(table_is_well_formed(&[]));
    }
}
