//! One hop of a resolution chain.
//!
//! A [`StepSpec`] is static data: which referer to send and an ordered list
//! of [`ExtractRule`]s. [`ResolutionStep`] is the compiled form. Rules are
//! tried in order against the raw response body and the first non-empty
//! match is the next target.

use regex::Regex;
use scraper::{Html, Selector};

use crate::error::{Error, Result};
use crate::http_client::FetchRequest;

/// How to find the next target in a hop's response body.
#[derive(Debug, Clone, Copy)]
pub enum ExtractRule {
    /// Attribute of the first element matching a CSS selector.
    Css {
        selector: &'static str,
        attr: &'static str,
    },
    /// First capture group of a regex over the raw body, e.g. a `file:`
    /// field inside an inline player config.
    Pattern(&'static str),
}

/// Which `Referer` a hop sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefererPolicy {
    None,
    /// URL of the hop that produced this target.
    PreviousHop,
}

#[derive(Debug, Clone, Copy)]
pub struct StepSpec {
    /// Short label used in logs ("embed", "rcp", ...).
    pub name: &'static str,
    pub referer: RefererPolicy,
    /// Extra request headers sent on this hop.
    pub headers: &'static [(&'static str, &'static str)],
    pub rules: &'static [ExtractRule],
}

#[derive(Debug)]
enum CompiledExtract {
    Css(Selector, &'static str),
    Pattern(Regex),
}

/// A compiled [`StepSpec`].
#[derive(Debug)]
pub struct ResolutionStep {
    name: &'static str,
    referer: RefererPolicy,
    headers: &'static [(&'static str, &'static str)],
    rules: Vec<CompiledExtract>,
}

impl ResolutionStep {
    pub fn compile(spec: &StepSpec) -> Result<Self> {
        let rules = spec
            .rules
            .iter()
            .map(|rule| match *rule {
                ExtractRule::Css { selector, attr } => Selector::parse(selector)
                    .map(|sel| CompiledExtract::Css(sel, attr))
                    .map_err(|e| {
                        Error::Config(format!("step {}: bad selector {selector:?}: {e:?}", spec.name))
                    }),
                ExtractRule::Pattern(pattern) => Regex::new(pattern)
                    .map(CompiledExtract::Pattern)
                    .map_err(|e| Error::Config(format!("step {}: bad pattern: {e}", spec.name))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: spec.name,
            referer: spec.referer,
            headers: spec.headers,
            rules,
        })
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Request for this hop. `previous` is the URL of the hop before it.
    #[must_use]
    pub fn request_for(&self, url: &str, previous: Option<&str>) -> FetchRequest {
        let request = self
            .headers
            .iter()
            .fold(FetchRequest::get(url), |req, (name, value)| {
                req.with_header(*name, *value)
            });
        match (self.referer, previous) {
            (RefererPolicy::PreviousHop, Some(prev)) => request.with_referer(prev),
            _ => request,
        }
    }

    /// Next target found in `body`, not yet made absolute.
    #[must_use]
    pub fn extract_next(&self, body: &str) -> Option<String> {
        let mut document: Option<Html> = None;

        for rule in &self.rules {
            let found = match rule {
                CompiledExtract::Css(selector, attr) => {
                    let doc = document.get_or_insert_with(|| Html::parse_document(body));
                    doc.select(selector)
                        .find_map(|el| el.value().attr(attr).and_then(clean_target))
                }
                CompiledExtract::Pattern(re) => re
                    .captures_iter(body)
                    .find_map(|caps| caps.get(1).and_then(|m| clean_target(m.as_str()))),
            };
            if found.is_some() {
                return found;
            }
        }
        None
    }
}

/// Undo the escaping targets pick up inside inline scripts and attributes.
fn clean_target(raw: &str) -> Option<String> {
    let cleaned = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .replace("\\/", "/")
        .replace("&amp;", "&");
    if cleaned.is_empty() || cleaned.starts_with('#') || cleaned.starts_with("javascript:") {
        return None;
    }
    Some(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP: StepSpec = StepSpec {
        name: "player",
        referer: RefererPolicy::PreviousHop,
        headers: &[("X-Requested-With", "XMLHttpRequest")],
        rules: &[
            ExtractRule::Css {
                selector: "#player iframe",
                attr: "src",
            },
            ExtractRule::Pattern(r#"file\s*:\s*["']([^"']+)["']"#),
        ],
    };

    #[test]
    fn css_rule_takes_priority() {
        let step = ResolutionStep::compile(&STEP).unwrap();
        let body = r#"<div id="player"><iframe src="//cdn.example/p/1"></iframe></div>
                      <script>player({file: "https://other.example/x.m3u8"})</script>"#;
        assert_eq!(step.extract_next(body).as_deref(), Some("//cdn.example/p/1"));
    }

    #[test]
    fn pattern_fallback_unescapes() {
        let step = ResolutionStep::compile(&STEP).unwrap();
        let body = r#"<script>new Playerjs({id:"p", file:"https:\/\/cdn.example\/v.m3u8?a=1&amp;b=2"});</script>"#;
        assert_eq!(
            step.extract_next(body).as_deref(),
            Some("https://cdn.example/v.m3u8?a=1&b=2")
        );
    }

    #[test]
    fn empty_matches_are_skipped() {
        let step = ResolutionStep::compile(&STEP).unwrap();
        assert_eq!(step.extract_next(r#"<div id="player"><iframe src=""></iframe></div>"#), None);
        assert_eq!(step.extract_next("<html>nothing here</html>"), None);
    }

    #[test]
    fn referer_follows_policy() {
        let step = ResolutionStep::compile(&STEP).unwrap();
        let req = step.request_for("https://b.example/", Some("https://a.example/"));
        assert_eq!(req.referer.as_deref(), Some("https://a.example/"));
        assert_eq!(step.request_for("https://b.example/", None).referer, None);
        assert_eq!(
            req.headers,
            vec![("X-Requested-With".to_string(), "XMLHttpRequest".to_string())]
        );
    }

    #[test]
    fn bad_selector_is_config_error() {
        let spec = StepSpec {
            name: "broken",
            referer: RefererPolicy::None,
            headers: &[],
            rules: &[ExtractRule::Css {
                selector: "<<",
                attr: "href",
            }],
        };
        assert!(matches!(ResolutionStep::compile(&spec), Err(Error::Config(_))));
    }
}
