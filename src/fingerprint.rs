//! Browser header profiles.
//!
//! Upstream sites reject requests that do not look like a desktop browser,
//! so every outbound request carries one of these header sets.

use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA,
    USER_AGENT,
};

/// Browser profile with realistic request headers
#[derive(Debug, Clone)]
pub struct BrowserProfile {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    pub sec_ch_ua: String,
    pub sec_ch_ua_platform: String,
}

/// Real Chrome versions (major, full)
const CHROME_VERSIONS: &[(&str, &str)] = &[
    ("131", "131.0.0.0"),
    ("130", "130.0.0.0"),
    ("129", "129.0.0.0"),
    ("128", "128.0.0.0"),
];

/// Real Firefox versions
const FIREFOX_VERSIONS: &[&str] = &["133.0", "132.0", "131.0"];

const ACCEPT_LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-GB,en;q=0.9",
    "en-IN,en;q=0.9,hi;q=0.8",
    "en-US,en;q=0.9,hi;q=0.7",
];

#[derive(Debug, Clone, Copy)]
enum Platform {
    Windows,
    MacOS,
    Linux,
}

impl Platform {
    fn random() -> Self {
        // Windows 70%, macOS 20%, Linux 10%
        let roll: f32 = rand::thread_rng().gen();
        if roll < 0.7 {
            Platform::Windows
        } else if roll < 0.9 {
            Platform::MacOS
        } else {
            Platform::Linux
        }
    }

    fn os_string(self) -> &'static str {
        match self {
            Platform::Windows => "Windows NT 10.0; Win64; x64",
            Platform::MacOS => "Macintosh; Intel Mac OS X 10_15_7",
            Platform::Linux => "X11; Linux x86_64",
        }
    }

    fn sec_ch_platform(self) -> &'static str {
        match self {
            Platform::Windows => "\"Windows\"",
            Platform::MacOS => "\"macOS\"",
            Platform::Linux => "\"Linux\"",
        }
    }
}

/// Generate a Chrome profile
#[must_use]
pub fn chrome_profile() -> BrowserProfile {
    let mut rng = rand::thread_rng();
    let platform = Platform::random();
    let (major, full) = CHROME_VERSIONS
        .choose(&mut rng)
        .copied()
        .unwrap_or(CHROME_VERSIONS[0]);

    BrowserProfile {
        user_agent: format!(
            "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{full} Safari/537.36",
            platform.os_string()
        ),
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8".to_string(),
        accept_language: random_accept_language(),
        sec_ch_ua: format!(
            "\"Google Chrome\";v=\"{major}\", \"Chromium\";v=\"{major}\", \"Not_A Brand\";v=\"24\""
        ),
        sec_ch_ua_platform: platform.sec_ch_platform().to_string(),
    }
}

/// Generate a Firefox profile
#[must_use]
pub fn firefox_profile() -> BrowserProfile {
    let mut rng = rand::thread_rng();
    let platform = Platform::random();
    let version = FIREFOX_VERSIONS
        .choose(&mut rng)
        .copied()
        .unwrap_or(FIREFOX_VERSIONS[0]);

    BrowserProfile {
        user_agent: format!(
            "Mozilla/5.0 ({}; rv:{version}) Gecko/20100101 Firefox/{version}",
            platform.os_string()
        ),
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
        accept_language: random_accept_language(),
        // Firefox doesn't send Sec-CH-UA headers
        sec_ch_ua: String::new(),
        sec_ch_ua_platform: String::new(),
    }
}

/// Chrome 80%, Firefox 20%
#[must_use]
pub fn random_profile() -> BrowserProfile {
    let roll: f32 = rand::thread_rng().gen();
    if roll < 0.8 {
        chrome_profile()
    } else {
        firefox_profile()
    }
}

fn random_accept_language() -> String {
    ACCEPT_LANGUAGES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(ACCEPT_LANGUAGES[0])
        .to_string()
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

impl BrowserProfile {
    /// Convert profile to reqwest `HeaderMap`, including no-cache directives.
    #[must_use]
    pub fn to_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        insert(&mut headers, USER_AGENT, &self.user_agent);
        insert(&mut headers, ACCEPT, &self.accept);
        insert(&mut headers, ACCEPT_LANGUAGE, &self.accept_language);

        if !self.sec_ch_ua.is_empty() {
            insert(&mut headers, HeaderName::from_static("sec-ch-ua"), &self.sec_ch_ua);
            headers.insert(
                HeaderName::from_static("sec-ch-ua-mobile"),
                HeaderValue::from_static("?0"),
            );
            insert(
                &mut headers,
                HeaderName::from_static("sec-ch-ua-platform"),
                &self.sec_ch_ua_platform,
            );
        }

        headers.insert(
            HeaderName::from_static("upgrade-insecure-requests"),
            HeaderValue::from_static("1"),
        );
        // Listings change by the minute; never accept a cached copy
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        headers
    }
}
