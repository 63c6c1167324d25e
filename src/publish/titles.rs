//! Page titles for links posted in a channel.
//!
//! Links come from anyone in the channel, so every hop is checked before it
//! is fetched: only `http`/`https` to public addresses, at most
//! [`MAX_REDIRECTS`] redirects, no loops.

use async_trait::async_trait;
use regex::Regex;
use std::net::IpAddr;
use tracing::debug;
use url::{Host, Url};

use super::{Notification, Poll, Provider, WatcherCursor};
use crate::error::ProviderError;
use crate::http;
use crate::network::Subscription;

/// Longest title announced, in characters.
const MAX_TITLE_CHARS: usize = 250;

/// Redirects followed for one link.
pub const MAX_REDIRECTS: usize = 3;

/// Watches one channel for links and announces each page's `<title>`.
///
/// Every observed URL gets the next sequence number; links whose page has
/// no usable title advance the cursor silently.
pub struct PageTitles {
    client: reqwest::Client,
    messages: Subscription,
    channel: String,
    max_bytes: usize,
    url_pattern: Regex,
    title_pattern: Regex,
    sequence: u64,
    allow_loopback: bool,
}

impl PageTitles {
    pub fn new(messages: Subscription, channel: &str, max_bytes: usize) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http::page_client()?,
            messages,
            channel: channel.to_string(),
            max_bytes,
            url_pattern: Regex::new(r#"https?://[^\s<>"']+"#)?,
            title_pattern: Regex::new(r"(?is)<title[^>]*>(.*?)</title>")?,
            sequence: 0,
            allow_loopback: false,
        })
    }

    /// Let links reach loopback addresses. Tests serve pages locally.
    #[cfg(test)]
    fn allowing_loopback(mut self) -> Self {
        self.allow_loopback = true;
        self
    }

    fn urls<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.url_pattern
            .find_iter(text)
            .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?', ')']))
            .collect()
    }

    fn title_of(&self, html: &str) -> Option<String> {
        let raw = self.title_pattern.captures(html)?.get(1)?.as_str();
        let title = normalize(raw);
        (!title.is_empty()).then_some(title)
    }

    /// Refuse hosts that are, or resolve to, non-public addresses.
    async fn check_address(&self, url: &Url) -> Result<(), ProviderError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ProviderError::Other(format!("unsupported scheme {}", url.scheme())));
        }
        let host = url.host_str().unwrap_or_default().to_string();
        let addrs: Vec<IpAddr> = match url.host() {
            Some(Host::Ipv4(ip)) => vec![IpAddr::V4(ip)],
            Some(Host::Ipv6(ip)) => vec![IpAddr::V6(ip)],
            Some(Host::Domain(domain)) => {
                let port = url.port_or_known_default().unwrap_or(80);
                tokio::net::lookup_host((domain, port))
                    .await
                    .map_err(|e| ProviderError::Other(format!("could not resolve {domain}: {e}")))?
                    .map(|addr| addr.ip())
                    .collect()
            }
            None => return Err(ProviderError::Other(format!("no host in {url}"))),
        };
        if addrs.is_empty() {
            return Err(ProviderError::Other(format!("{host} has no addresses")));
        }

        match addrs
            .into_iter()
            .find(|ip| is_private_ip(ip) && !(self.allow_loopback && ip.is_loopback()))
        {
            Some(ip) => Err(ProviderError::Blocked { host, ip }),
            None => Ok(()),
        }
    }

    /// Read at most `max_bytes` of an HTML page, following redirects by hand.
    async fn fetch_page(&self, url: &str) -> Result<Option<String>, ProviderError> {
        let mut current = Url::parse(url)?;
        let mut visited: Vec<Url> = Vec::new();

        let mut response = loop {
            self.check_address(&current).await?;
            visited.push(current.clone());

            let response = self.client.get(current.clone()).send().await?;
            if !response.status().is_redirection() {
                break response;
            }
            if visited.len() > MAX_REDIRECTS {
                return Err(ProviderError::Other(format!("too many redirects from {url}")));
            }
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| ProviderError::Other(format!("redirect without location from {current}")))?;
            let next = current.join(location)?;
            if visited.contains(&next) {
                return Err(ProviderError::Other(format!("redirect loop at {next}")));
            }
            current = next;
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                url: current.to_string(),
            });
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("html"));
        if !is_html {
            return Ok(None);
        }

        let mut body = Vec::new();
        while body.len() < self.max_bytes {
            match response.chunk().await? {
                Some(chunk) => body.extend_from_slice(&chunk),
                None => break,
            }
        }
        body.truncate(self.max_bytes);
        Ok(Some(String::from_utf8_lossy(&body).into_owned()))
    }

    async fn announce(&self, url: &str) -> Option<String> {
        match self.fetch_page(url).await {
            Ok(Some(page)) => self.title_of(&page),
            Ok(None) => None,
            Err(e) => {
                debug!(url, error = %e, "could not fetch page");
                None
            }
        }
    }
}

/// Loopback, private, link-local, shared and unspecified ranges, including
/// IPv4 addresses mapped into IPv6.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, c, _] = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                || v4.is_multicast()
                // 0.0.0.0/8
                || a == 0
                // 100.64.0.0/10
                || (a == 100 && (b & 0xC0) == 64)
                // 192.0.0.0/24
                || (a == 192 && b == 0 && c == 0)
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                // fc00::/7
                || (v6.segments()[0] & 0xFE00) == 0xFC00
                // fe80::/10
                || (v6.segments()[0] & 0xFFC0) == 0xFE80
                || v6
                    .to_ipv4_mapped()
                    .is_some_and(|v4| is_private_ip(&IpAddr::V4(v4)))
        }
    }
}

/// Collapse whitespace, decode common entities and cap the length.
fn normalize(raw: &str) -> String {
    let decoded = raw
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&");
    let title = decoded.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.chars().count() > MAX_TITLE_CHARS {
        let mut cut: String = title.chars().take(MAX_TITLE_CHARS - 1).collect();
        cut.push('…');
        cut
    } else {
        title
    }
}

#[async_trait]
impl Provider for PageTitles {
    fn name(&self) -> &'static str {
        "titles"
    }

    async fn poll(&mut self, _cursor: &WatcherCursor) -> Result<Poll, ProviderError> {
        let mut urls = Vec::new();
        while let Some(event) = self.messages.try_recv() {
            if event.channel() != Some(self.channel.as_str()) {
                continue;
            }
            urls.extend(self.urls(&event.text).into_iter().map(str::to_string));
        }

        let mut items = Vec::with_capacity(urls.len());
        for url in urls {
            self.sequence += 1;
            let text = self.announce(&url).await.map(|title| format!("title: {title}"));
            items.push(Notification {
                entity: self.channel.clone(),
                id: self.sequence,
                text,
            });
        }
        Ok(Poll {
            reached: Vec::new(),
            items,
        })
    }

    fn primes_on_first_sight(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{EventBus, EventKind, InboundEvent};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn titles(bus: &EventBus) -> PageTitles {
        PageTitles::new(bus.subscribe(EventKind::Message, "titles"), "#rebels", 64 * 1024).unwrap()
    }

    fn local_titles(bus: &EventBus) -> PageTitles {
        titles(bus).allowing_loopback()
    }

    fn said(target: &str, text: &str) -> InboundEvent {
        InboundEvent {
            sender: "luke".into(),
            target: target.into(),
            text: text.into(),
            kind: EventKind::Message,
        }
    }

    fn page(content_type: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn redirect(location: &str) -> String {
        format!(
            "HTTP/1.1 302 Found\r\nLocation: {location}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        )
    }

    /// Answer one connection per canned response, in order, and return the
    /// base URL.
    async fn serve(responses: Vec<String>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            for response in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = [0u8; 2048];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_url_extraction() {
        let bus = EventBus::new();
        let titles = titles(&bus);
        assert_eq!(
            titles.urls("see https://example.org/a?b=1, and (http://x.io/y). ftp://no"),
            vec!["https://example.org/a?b=1", "http://x.io/y"]
        );
        assert!(titles.urls("nothing here").is_empty());
    }

    #[test]
    fn test_title_normalization() {
        let bus = EventBus::new();
        let titles = titles(&bus);
        assert_eq!(
            titles.title_of("<html><head><TITLE lang=\"en\">\n  Rogue   One &amp; Co\n</TITLE>"),
            Some("Rogue One & Co".to_string())
        );
        assert_eq!(titles.title_of("<title>   </title>"), None);
        assert_eq!(titles.title_of("<p>no title</p>"), None);

        let long = normalize(&"x".repeat(400));
        assert_eq!(long.chars().count(), MAX_TITLE_CHARS);
        assert!(long.ends_with('…'));
    }

    #[test]
    fn test_private_addresses() {
        for blocked in [
            "127.0.0.1",
            "10.1.2.3",
            "172.16.0.1",
            "192.168.1.1",
            "169.254.169.254",
            "100.64.0.1",
            "192.0.0.8",
            "0.0.0.0",
            "0.1.2.3",
            "255.255.255.255",
            "::1",
            "::",
            "fc00::1",
            "fd12:3456::1",
            "fe80::1",
            "::ffff:127.0.0.1",
            "::ffff:10.0.0.1",
        ] {
            let ip: IpAddr = blocked.parse().unwrap();
            assert!(is_private_ip(&ip), "{blocked} should be blocked");
        }
        for public in ["93.184.216.34", "8.8.8.8", "100.128.0.1", "2606:4700::1111", "::ffff:8.8.8.8"] {
            let ip: IpAddr = public.parse().unwrap();
            assert!(!is_private_ip(&ip), "{public} should be allowed");
        }
    }

    #[tokio::test]
    async fn test_loopback_links_are_not_fetched() {
        let bus = EventBus::new();
        let mut titles = titles(&bus);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        bus.publish(&said("#rebels", &format!("http://{addr}/admin")));
        bus.publish(&said("#rebels", "http://localhost:1/ and http://[::1]:1/"));

        let items = titles.poll(&WatcherCursor::new()).await.unwrap().items;
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|item| item.text.is_none()));
        assert_eq!(items[2].id, 3);

        let connected = tokio::time::timeout(Duration::from_millis(100), listener.accept()).await;
        assert!(connected.is_err(), "the page was requested");
    }

    #[tokio::test]
    async fn test_blocked_address_error() {
        let bus = EventBus::new();
        let titles = titles(&bus);
        match titles.fetch_page("http://169.254.169.254/latest/meta-data/").await {
            Err(ProviderError::Blocked { host, ip }) => {
                assert_eq!(host, "169.254.169.254");
                assert_eq!(ip, "169.254.169.254".parse::<IpAddr>().unwrap());
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(matches!(
            titles.fetch_page("file:///etc/passwd").await,
            Err(ProviderError::Other(_))
        ));
    }

    #[tokio::test]
    async fn test_poll_announces_titles_in_watched_channel() {
        let bus = EventBus::new();
        let mut titles = local_titles(&bus);
        let base = serve(vec![page("text/html; charset=utf-8", "<title>Death Star plans</title>")]).await;

        bus.publish(&said("#empire", "https://elsewhere.example/"));
        bus.publish(&said("#rebels", &format!("look at {base}/plans")));

        let items = titles.poll(&WatcherCursor::new()).await.unwrap().items;
        assert_eq!(
            items,
            vec![Notification {
                entity: "#rebels".into(),
                id: 1,
                text: Some("title: Death Star plans".into()),
            }]
        );
    }

    #[tokio::test]
    async fn test_redirects_are_followed() {
        let bus = EventBus::new();
        let titles = local_titles(&bus);
        let base = serve(vec![
            redirect("/plans"),
            page("text/html", "<title>Death Star plans</title>"),
        ])
        .await;

        let page = titles.fetch_page(&format!("{base}/short")).await.unwrap();
        assert_eq!(titles.title_of(&page.unwrap()).as_deref(), Some("Death Star plans"));
    }

    #[tokio::test]
    async fn test_redirect_target_is_checked() {
        let bus = EventBus::new();
        let titles = local_titles(&bus);
        let base = serve(vec![redirect("http://169.254.169.254/latest/meta-data/")]).await;

        assert!(matches!(
            titles.fetch_page(&format!("{base}/innocent")).await,
            Err(ProviderError::Blocked { .. })
        ));
    }

    #[tokio::test]
    async fn test_redirect_loop_and_limit() {
        let bus = EventBus::new();
        let titles = local_titles(&bus);

        let base = serve(vec![redirect("/again")]).await;
        match titles.fetch_page(&format!("{base}/again")).await {
            Err(ProviderError::Other(reason)) => assert!(reason.contains("loop"), "{reason}"),
            other => panic!("unexpected result {other:?}"),
        }

        let hops = (0..=MAX_REDIRECTS).map(|n| redirect(&format!("/hop{n}"))).collect();
        let base = serve(hops).await;
        match titles.fetch_page(&format!("{base}/start")).await {
            Err(ProviderError::Other(reason)) => assert!(reason.contains("too many"), "{reason}"),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_html_advances_silently() {
        let bus = EventBus::new();
        let mut titles = local_titles(&bus);
        let base = serve(vec![page("application/json", "{\"title\": 1}")]).await;

        bus.publish(&said("#rebels", &format!("{base}/data.json")));
        let items = titles.poll(&WatcherCursor::new()).await.unwrap().items;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, 1);
        assert_eq!(items[0].text, None);

        assert!(titles.poll(&WatcherCursor::new()).await.unwrap().items.is_empty());
    }
}
