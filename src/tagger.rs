//! Title tagging.
//!
//! Pure functions that classify a free-text release title into facets:
//! quality, languages, audio codecs, video/source formats, series-vs-movie,
//! dual/multi audio and year. No I/O and no shared mutable state; the same
//! title always produces the same tags, so listing and search paths agree.
//!
//! Tag sets are `BTreeSet`s so iteration and serialization order are stable.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Quality {
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "2160p")]
    P2160,
    #[serde(rename = "4K")]
    UhdK4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Language {
    Hindi,
    English,
    Tamil,
    Telugu,
    Malayalam,
    Kannada,
    Punjabi,
    Bengali,
    Marathi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum AudioFormat {
    #[serde(rename = "DD5.1")]
    Dd51,
    #[serde(rename = "DD2.0")]
    Dd20,
    #[serde(rename = "DTS")]
    Dts,
    Atmos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum VideoFormat {
    #[serde(rename = "x264")]
    X264,
    #[serde(rename = "x265")]
    X265,
    #[serde(rename = "HEVC")]
    Hevc,
    #[serde(rename = "10-bit")]
    TenBit,
    #[serde(rename = "WEB-DL")]
    WebDl,
    #[serde(rename = "WEBRip")]
    WebRip,
    BluRay,
    #[serde(rename = "HDRip")]
    HdRip,
    #[serde(rename = "HDTV")]
    Hdtv,
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Quality::P480 => "480p",
            Quality::P720 => "720p",
            Quality::P1080 => "1080p",
            Quality::P2160 => "2160p",
            Quality::UhdK4 => "4K",
        })
    }
}

const QUALITY_PATTERNS: &[(Quality, &str)] = &[
    (Quality::P480, r"(?i)\b480p\b"),
    (Quality::P720, r"(?i)\b720p\b"),
    (Quality::P1080, r"(?i)\b1080p\b"),
    (Quality::P2160, r"(?i)\b2160p\b"),
    (Quality::UhdK4, r"(?i)\b4k\b"),
];

const LANGUAGE_PATTERNS: &[(Language, &str)] = &[
    (Language::Hindi, r"(?i)\b(?:hindi|hin)\b"),
    (Language::English, r"(?i)\b(?:english|eng)\b"),
    (Language::Tamil, r"(?i)\b(?:tamil|tam)\b"),
    (Language::Telugu, r"(?i)\b(?:telugu|tel)\b"),
    (Language::Malayalam, r"(?i)\bmalayalam\b"),
    (Language::Kannada, r"(?i)\bkannada\b"),
    (Language::Punjabi, r"(?i)\bpunjabi\b"),
    (Language::Bengali, r"(?i)\b(?:bengali|bangla)\b"),
    (Language::Marathi, r"(?i)\bmarathi\b"),
];

const AUDIO_PATTERNS: &[(AudioFormat, &str)] = &[
    (AudioFormat::Dd51, r"(?i)\bddp?\+?\s?5[.\s]1\b"),
    (AudioFormat::Dd20, r"(?i)\bddp?\+?\s?2[.\s]0\b"),
    (AudioFormat::Dts, r"(?i)\bdts\b"),
    (AudioFormat::Atmos, r"(?i)\batmos\b"),
];

const VIDEO_PATTERNS: &[(VideoFormat, &str)] = &[
    (VideoFormat::X264, r"(?i)\b[xh]\.?264\b"),
    (VideoFormat::X265, r"(?i)\b[xh]\.?265\b"),
    (VideoFormat::Hevc, r"(?i)\bhevc\b"),
    (VideoFormat::TenBit, r"(?i)\b10[\s-]?bit\b"),
    (VideoFormat::WebDl, r"(?i)\bweb[\s-]?dl\b"),
    (VideoFormat::WebRip, r"(?i)\bweb[\s-]?rip\b"),
    (VideoFormat::BluRay, r"(?i)\b(?:blu[\s-]?ray|brrip|bdrip)\b"),
    (VideoFormat::HdRip, r"(?i)\bhdrip\b"),
    (VideoFormat::Hdtv, r"(?i)\bhdtv\b"),
];

fn compile<T: Copy>(table: &[(T, &str)]) -> Vec<(T, Regex)> {
    table
        .iter()
        .map(|(tag, pattern)| (*tag, Regex::new(pattern).expect("static tag pattern")))
        .collect()
}

static QUALITY_RE: LazyLock<Vec<(Quality, Regex)>> = LazyLock::new(|| compile(QUALITY_PATTERNS));
static LANGUAGE_RE: LazyLock<Vec<(Language, Regex)>> =
    LazyLock::new(|| compile(LANGUAGE_PATTERNS));
static AUDIO_RE: LazyLock<Vec<(AudioFormat, Regex)>> = LazyLock::new(|| compile(AUDIO_PATTERNS));
static VIDEO_RE: LazyLock<Vec<(VideoFormat, Regex)>> = LazyLock::new(|| compile(VIDEO_PATTERNS));

static SERIES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bseasons?\b|\bs\d{1,2}(?:\s?e\d{1,3})?\b|\bepisodes?\b|\bep\s?\d{1,3}\b")
        .expect("series pattern")
});
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d{4})\)").expect("year pattern"));
static DUAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bdual[\s-]?audio\b").expect("dual pattern"));
static MULTI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bmulti[\s-]?audio\b").expect("multi pattern"));

fn matching<T: Copy + Ord>(title: &str, table: &[(T, Regex)]) -> BTreeSet<T> {
    table
        .iter()
        .filter(|(_, re)| re.is_match(title))
        .map(|(tag, _)| *tag)
        .collect()
}

#[must_use]
pub fn extract_quality_info(title: &str) -> BTreeSet<Quality> {
    matching(title, &QUALITY_RE)
}

#[must_use]
pub fn extract_language_info(title: &str) -> BTreeSet<Language> {
    matching(title, &LANGUAGE_RE)
}

#[must_use]
pub fn extract_audio_info(title: &str) -> BTreeSet<AudioFormat> {
    matching(title, &AUDIO_RE)
}

#[must_use]
pub fn extract_video_info(title: &str) -> BTreeSet<VideoFormat> {
    matching(title, &VIDEO_RE)
}

/// Highest quality mentioned in `text`, if any.
#[must_use]
pub fn best_quality(text: &str) -> Option<Quality> {
    extract_quality_info(text).into_iter().next_back()
}

#[must_use]
pub fn is_series(title: &str) -> bool {
    SERIES_RE.is_match(title)
}

/// First `(YYYY)` group in the title.
#[must_use]
pub fn extract_year(title: &str) -> Option<u16> {
    YEAR_RE
        .captures(title)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn is_language_word(word: &str) -> bool {
    !word.is_empty() && LANGUAGE_RE.iter().any(|(_, re)| re.is_match(word))
}

/// Count `+` joins whose both sides are language words ("Hindi + English").
fn language_joins(title: &str) -> usize {
    let parts: Vec<&str> = title.split('+').collect();
    parts
        .windows(2)
        .filter(|pair| {
            let left = pair[0]
                .split(|c: char| !c.is_alphabetic())
                .rfind(|w| !w.is_empty())
                .unwrap_or("");
            let right = pair[1]
                .split(|c: char| !c.is_alphabetic())
                .find(|w| !w.is_empty())
                .unwrap_or("");
            is_language_word(left) && is_language_word(right)
        })
        .count()
}

/// Three or more languages, a literal "Multi Audio", or two or more
/// language `+` joins.
#[must_use]
pub fn is_multi_audio(title: &str) -> bool {
    extract_language_info(title).len() >= 3
        || MULTI_RE.is_match(title)
        || language_joins(title) >= 2
}

/// Two or more languages, a literal "Dual Audio", or a language `+` join.
/// Multi audio implies dual audio.
#[must_use]
pub fn is_dual_audio(title: &str) -> bool {
    extract_language_info(title).len() >= 2
        || DUAL_RE.is_match(title)
        || language_joins(title) >= 1
        || is_multi_audio(title)
}

/// Every facet of one title.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleTags {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    pub qualities: BTreeSet<Quality>,
    pub languages: BTreeSet<Language>,
    pub audio_formats: BTreeSet<AudioFormat>,
    pub video_formats: BTreeSet<VideoFormat>,
    pub is_series: bool,
    pub is_dual_audio: bool,
    pub is_multi_audio: bool,
}

impl TitleTags {
    #[must_use]
    pub fn from_title(title: &str) -> Self {
        Self {
            year: extract_year(title),
            qualities: extract_quality_info(title),
            languages: extract_language_info(title),
            audio_formats: extract_audio_info(title),
            video_formats: extract_video_info(title),
            is_series: is_series(title),
            is_dual_audio: is_dual_audio(title),
            is_multi_audio: is_multi_audio(title),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_from_release_title() {
        let q = extract_quality_info("Movie (2023) 1080p BluRay x264");
        assert_eq!(q, BTreeSet::from([Quality::P1080]));
    }

    #[test]
    fn multiple_qualities_and_best() {
        let title = "Film (2021) 480p | 720p | 1080p WEB-DL";
        assert_eq!(extract_quality_info(title).len(), 3);
        assert_eq!(best_quality(title), Some(Quality::P1080));
        assert_eq!(best_quality("no quality here"), None);
    }

    #[test]
    fn four_k_is_its_own_tag() {
        let q = extract_quality_info("Film 4K HDR 2160p");
        assert!(q.contains(&Quality::UhdK4));
        assert!(q.contains(&Quality::P2160));
        // "4k" inside a word does not count
        assert!(extract_quality_info("4khdhub").is_empty());
    }

    #[test]
    fn hindi_english_title_is_dual_audio() {
        let title = "Movie (2023) Hindi English 1080p";
        let langs = extract_language_info(title);
        assert_eq!(langs, BTreeSet::from([Language::Hindi, Language::English]));
        assert!(is_dual_audio(title));
        assert!(!is_multi_audio(title));
    }

    #[test]
    fn plus_join_is_dual_audio() {
        assert!(is_dual_audio("Movie [Hindi + Tamil] 720p"));
        assert!(!is_dual_audio("Movie DD+ 5.1 720p"));
    }

    #[test]
    fn multi_audio_heuristics() {
        assert!(is_multi_audio("Movie [Hindi + Tamil + Telugu] 1080p"));
        assert!(is_multi_audio("Movie Multi Audio 1080p"));
        assert!(is_multi_audio("Movie Hindi English Tamil 720p"));
        // multi implies dual
        assert!(is_dual_audio("Movie Multi Audio 1080p"));
    }

    #[test]
    fn literal_dual_audio() {
        assert!(is_dual_audio("Some Film (2020) Dual-Audio 720p"));
        assert!(!is_dual_audio("Some Film (2020) Hindi 720p"));
    }

    #[test]
    fn audio_and_video_tags() {
        let title = "Show S01 2160p WEB-DL DDP5.1 Atmos HEVC 10bit x265";
        assert_eq!(
            extract_audio_info(title),
            BTreeSet::from([AudioFormat::Dd51, AudioFormat::Atmos])
        );
        let video = extract_video_info(title);
        assert!(video.contains(&VideoFormat::WebDl));
        assert!(video.contains(&VideoFormat::Hevc));
        assert!(video.contains(&VideoFormat::TenBit));
        assert!(video.contains(&VideoFormat::X265));
        assert!(!video.contains(&VideoFormat::X264));
    }

    #[test]
    fn series_detection() {
        assert!(is_series("Show Season 2 Complete"));
        assert!(is_series("Show S02E05 720p"));
        assert!(is_series("Show S03 1080p"));
        assert!(is_series("Show [Episode 7 Added]"));
        assert!(!is_series("Movie (2023) 1080p BluRay"));
    }

    #[test]
    fn year_is_first_parenthesised_group() {
        assert_eq!(extract_year("Movie (2023) 1080p (2024)"), Some(2023));
        assert_eq!(extract_year("Movie 2023 1080p"), None);
    }

    #[test]
    fn tagging_is_deterministic() {
        let title = "Movie (2019) Hindi + English DD5.1 1080p WEBRip x264";
        assert_eq!(TitleTags::from_title(title), TitleTags::from_title(title));
        let json_a = serde_json::to_string(&TitleTags::from_title(title)).unwrap();
        let json_b = serde_json::to_string(&TitleTags::from_title(title)).unwrap();
        assert_eq!(json_a, json_b);
    }

    #[test]
    fn serialized_tag_names() {
        let tags = TitleTags::from_title("Movie (2019) 1080p WEB-DL DD5.1 10bit");
        let json = serde_json::to_value(&tags).unwrap();
        assert_eq!(json["qualities"][0], "1080p");
        assert_eq!(json["audioFormats"][0], "DD5.1");
        assert_eq!(json["year"], 2019);
        assert_eq!(json["isSeries"], false);
    }
}
