//! Media types produced and consumed by the Atom codec.

pub const APPLICATION_ATOM_XML: &str = "application/atom+xml";
pub const APPLICATION_ATOMSVC_XML: &str = "application/atomsvc+xml";
pub const APPLICATION_XML: &str = "application/xml";

pub const ATOM_FEED_TYPE: &str = "application/atom+xml;type=feed";
pub const ATOM_ENTRY_TYPE: &str = "application/atom+xml;type=entry";

pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
pub const DATA_NS: &str = "http://schemas.microsoft.com/ado/2007/08/dataservices";
pub const METADATA_NS: &str = "http://schemas.microsoft.com/ado/2007/08/dataservices/metadata";
pub const SCHEME_NS: &str = "http://schemas.microsoft.com/ado/2007/08/dataservices/scheme";
pub const RELATED_REL_PREFIX: &str = "http://schemas.microsoft.com/ado/2007/08/dataservices/related/";

pub const SUPPORTED: [&str; 3] = [APPLICATION_ATOM_XML, APPLICATION_ATOMSVC_XML, APPLICATION_XML];

/// The `type/subtype` part of a media type, lowercased, parameters dropped.
pub fn essence(media: &str) -> String {
    media
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn is_supported(media: &str) -> bool {
    let essence = essence(media);
    SUPPORTED.contains(&essence.as_str())
}
