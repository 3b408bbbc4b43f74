//! Parsing of WebDAV multistatus responses.

use orgcal_core::error::PortError;

/// A fetched calendar resource with its ICS data.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarResource {
    pub href: String,
    pub etag: Option<String>,
    pub data: String,
}

/// Parse calendar resources from a CalDAV multistatus response.
///
/// Responses without calendar data (e.g. 404 propstats) are skipped.
pub fn parse_calendar_resources(body: &str) -> Result<Vec<CalendarResource>, PortError> {
    let doc = roxmltree::Document::parse(body).map_err(|e| PortError::Decode(e.to_string()))?;
    let root = doc.root_element();

    let mut resources = Vec::new();

    for response in root.descendants().filter(|n| n.tag_name().name() == "response") {
        let href = response
            .descendants()
            .find(|n| n.tag_name().name() == "href")
            .and_then(|n| n.text())
            .map(|s| s.trim().to_string());

        let Some(href) = href else { continue };

        let etag = response
            .descendants()
            .find(|n| n.tag_name().name() == "getetag")
            .and_then(|n| n.text())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let data = response
            .descendants()
            .find(|n| n.tag_name().name() == "calendar-data")
            .and_then(|n| n.text())
            .map(|s| s.to_string());

        if let Some(data) = data.filter(|d| !d.trim().is_empty()) {
            resources.push(CalendarResource { href, etag, data });
        }
    }

    Ok(resources)
}
