//! A single CalDAV calendar collection as a [`CalendarPort`].

use std::time::Duration;

use chrono_tz::Tz;
use orgcal_core::error::PortError;
use orgcal_core::event::Event;
use orgcal_core::ics::{decode_event, encode_event};
use orgcal_core::remote::{CalendarPort, RemoteRecord};
use reqwest::{Method, RequestBuilder, Response, StatusCode, header};
use url::Url;

use crate::multistatus::parse_calendar_resources;

const ICS_CONTENT_TYPE: &str = "text/calendar; charset=utf-8";
const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CaldavCalendar {
    http: reqwest::Client,
    /// Collection URL, always ending in `/`
    url: Url,
    credentials: Option<Credentials>,
    timeout: Duration,
    /// Zone remote events are decoded into
    timezone: Tz,
}

/// Join a server base URL and a calendar path into a collection URL.
pub fn calendar_url(base: &str, id: &str) -> Result<Url, PortError> {
    let base = Url::parse(base).map_err(|e| PortError::Http(format!("Invalid URL '{base}': {e}")))?;
    let mut url = base
        .join(id)
        .map_err(|e| PortError::Http(format!("Invalid calendar id '{id}': {e}")))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn calendar_query(uid: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<C:calendar-query xmlns="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
    <prop>
        <getetag/>
        <C:calendar-data/>
    </prop>
    <C:filter>
        <C:comp-filter name="VCALENDAR">
            <C:comp-filter name="VEVENT">
                <C:prop-filter name="UID">
                    <C:text-match collation="i;octet">{}</C:text-match>
                </C:prop-filter>
            </C:comp-filter>
        </C:comp-filter>
    </C:filter>
</C:calendar-query>"#,
        xml_escape(uid)
    )
}

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<propfind xmlns="DAV:">
    <prop>
        <resourcetype/>
    </prop>
</propfind>"#;

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl CaldavCalendar {
    pub fn new(
        url: Url,
        credentials: Option<Credentials>,
        timeout: Duration,
        timezone: Tz,
    ) -> Result<Self, PortError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("orgcal/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Http(e.to_string()))?;

        Ok(CaldavCalendar {
            http,
            url,
            credentials,
            timeout,
            timezone,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Resource URL for an event uid.
    pub fn event_url(&self, uid: &str) -> Result<Url, PortError> {
        let mut url = self.url.clone();
        url.path_segments_mut()
            .map_err(|_| PortError::Http(format!("Cannot use {} as a collection", self.url)))?
            .pop_if_empty()
            .push(&format!("{uid}.ics"));
        Ok(url)
    }

    fn resolve_href(&self, href: &str) -> String {
        self.url
            .join(href)
            .map(String::from)
            .unwrap_or_else(|_| href.to_string())
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.credentials {
            Some(c) => builder.basic_auth(&c.username, c.password.as_ref()),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, PortError> {
        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                PortError::Timeout(self.timeout.as_secs())
            } else {
                PortError::Http(e.to_string())
            }
        })
    }

    /// Confirm the collection exists and the credentials are accepted.
    pub async fn check(&self) -> Result<(), PortError> {
        let method = Method::from_bytes(b"PROPFIND").map_err(|e| PortError::Http(e.to_string()))?;
        let response = self
            .send(
                self.request(method, self.url.as_str())
                    .header("Depth", "0")
                    .header(header::CONTENT_TYPE, XML_CONTENT_TYPE)
                    .body(PROPFIND_BODY),
            )
            .await?;

        expect_success(response, self.url.as_str())?;
        tracing::debug!(url = %self.url, "Calendar reachable");
        Ok(())
    }

    /// PUT an encoded event, guarded by a conditional header when one is given.
    async fn put(
        &self,
        url: &str,
        uid: &str,
        event: &Event,
        precondition: (header::HeaderName, Option<&str>),
    ) -> Result<(), PortError> {
        let body = encode_event(uid, event)?;

        let mut builder = self
            .request(Method::PUT, url)
            .header(header::CONTENT_TYPE, ICS_CONTENT_TYPE)
            .body(body);
        if let (name, Some(value)) = precondition {
            builder = builder.header(name, value);
        }

        let response = self.send(builder).await?;
        expect_success(response, url)?;
        Ok(())
    }
}

fn expect_success(response: Response, href: &str) -> Result<Response, PortError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(PortError::Status {
        status: status.as_u16(),
        href: href.to_string(),
    })
}

impl CalendarPort for CaldavCalendar {
    async fn find(&self, uid: &str) -> Result<Option<RemoteRecord>, PortError> {
        let method = Method::from_bytes(b"REPORT").map_err(|e| PortError::Http(e.to_string()))?;
        let response = self
            .send(
                self.request(method, self.url.as_str())
                    .header("Depth", "1")
                    .header(header::CONTENT_TYPE, XML_CONTENT_TYPE)
                    .body(calendar_query(uid)),
            )
            .await?;

        let response = expect_success(response, self.url.as_str())?;
        let body = response
            .text()
            .await
            .map_err(|e| PortError::Http(e.to_string()))?;

        for resource in parse_calendar_resources(&body)? {
            let (found_uid, event) = decode_event(&resource.data, self.timezone)
                .ok_or_else(|| PortError::Decode(resource.href.clone()))?;
            if found_uid != uid {
                continue;
            }
            return Ok(Some(RemoteRecord {
                uid: found_uid,
                href: self.resolve_href(&resource.href),
                etag: resource.etag,
                event,
            }));
        }

        Ok(None)
    }

    async fn create(&self, uid: &str, event: &Event) -> Result<(), PortError> {
        let url = self.event_url(uid)?;
        // Fails with 412 if a resource already exists at this URL
        self.put(url.as_str(), uid, event, (header::IF_NONE_MATCH, Some("*")))
            .await
    }

    async fn update(&self, record: &RemoteRecord, event: &Event) -> Result<(), PortError> {
        self.put(
            &record.href,
            &record.uid,
            event,
            (header::IF_MATCH, record.etag.as_deref()),
        )
        .await
    }

    async fn delete(&self, record: &RemoteRecord) -> Result<(), PortError> {
        let response = self
            .send(self.request(Method::DELETE, &record.href))
            .await?;

        // Already deleted counts as success
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(href = %record.href, "Delete target already gone");
            return Ok(());
        }

        expect_success(response, &record.href)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_calendar() -> CaldavCalendar {
        let url = calendar_url("https://dav.example.com/", "/calendars/me/tasks").unwrap();
        CaldavCalendar::new(url, None, Duration::from_secs(5), chrono_tz::UTC).unwrap()
    }

    #[test]
    fn test_calendar_url_gets_trailing_slash() {
        let url = calendar_url("https://dav.example.com/dav/", "calendars/me/tasks").unwrap();
        assert_eq!(url.as_str(), "https://dav.example.com/dav/calendars/me/tasks/");

        let url = calendar_url("https://dav.example.com/dav/", "/calendars/me/tasks/").unwrap();
        assert_eq!(url.as_str(), "https://dav.example.com/calendars/me/tasks/");

        assert!(calendar_url("not a url", "x").is_err());
    }

    #[test]
    fn test_event_url_escapes_uid() {
        let calendar = make_calendar();
        assert_eq!(
            calendar.event_url("abc-123").unwrap().as_str(),
            "https://dav.example.com/calendars/me/tasks/abc-123.ics"
        );
        assert_eq!(
            calendar.event_url("a/b c").unwrap().as_str(),
            "https://dav.example.com/calendars/me/tasks/a%2Fb%20c.ics"
        );
    }

    #[test]
    fn test_resolve_href() {
        let calendar = make_calendar();
        assert_eq!(
            calendar.resolve_href("/calendars/me/tasks/x.ics"),
            "https://dav.example.com/calendars/me/tasks/x.ics"
        );
    }

    #[test]
    fn test_query_escapes_uid() {
        let body = calendar_query("a<b>&\"c\"");
        assert!(body.contains("a&lt;b&gt;&amp;&quot;c&quot;"));
    }
}
