//! Built-in chain definitions, one per obfuscation scheme.
//!
//! Adding a scheme means adding a [`ChainSpec`] here and a host keyword in
//! [`ProviderType`]; the resolver itself does not change.

use std::collections::HashMap;

use super::step::{ExtractRule, RefererPolicy, ResolutionStep, StepSpec};
use crate::error::Result;
use crate::model::ProviderType;

/// Ordered hop list for one [`ProviderType`].
#[derive(Debug, Clone, Copy)]
pub struct ChainSpec {
    pub provider_type: ProviderType,
    pub steps: &'static [StepSpec],
}

/// Inline player configs: `file: "..."`, `src: '...'`, `"file":"..."`.
/// The key must stand alone, so `profile:` or `imgsrc:` never match.
const PLAYER_FILE: ExtractRule =
    ExtractRule::Pattern(r#"(?:^|[^\w$])["']?file["']?\s*:\s*["']([^"']+)["']"#);
const PLAYER_SRC: ExtractRule = ExtractRule::Pattern(
    r#"(?:^|[^\w$])["']?src["']?\s*:\s*["']([^"']+\.(?:m3u8|mp4|mkv)[^"']*)["']"#,
);
const MEDIA_URL: ExtractRule =
    ExtractRule::Pattern(r#"["'](https?://[^"'\s]+\.(?:m3u8|mp4|mkv)(?:\?[^"'\s]*)?)["']"#);

/// The vidsrc player hosts only answer requests that look like iframe loads.
const IFRAME: &[(&str, &str)] = &[("Sec-Fetch-Dest", "iframe")];

const VIDSRC: &[StepSpec] = &[
    StepSpec {
        name: "embed",
        referer: RefererPolicy::None,
        headers: &[],
        rules: &[
            ExtractRule::Css {
                selector: "iframe#player_iframe",
                attr: "src",
            },
            ExtractRule::Pattern(r#"<iframe[^>]+src\s*=\s*["']([^"']*/rcp/[^"']+)["']"#),
        ],
    },
    StepSpec {
        name: "rcp",
        referer: RefererPolicy::PreviousHop,
        headers: IFRAME,
        rules: &[
            ExtractRule::Pattern(r#"src\s*:\s*["']([^"']*/prorcp/[^"']+)["']"#),
            ExtractRule::Pattern(r#"["'](/prorcp/[^"']+)["']"#),
        ],
    },
    StepSpec {
        name: "prorcp",
        referer: RefererPolicy::PreviousHop,
        headers: IFRAME,
        rules: &[
            ExtractRule::Css {
                selector: "#player iframe",
                attr: "src",
            },
            ExtractRule::Pattern(r#"(?:player_?url|playerUrl)\s*[:=]\s*["']([^"']+)["']"#),
        ],
    },
    StepSpec {
        name: "player",
        referer: RefererPolicy::PreviousHop,
        headers: IFRAME,
        rules: &[PLAYER_FILE, PLAYER_SRC, MEDIA_URL],
    },
];

const HUBCLOUD: &[StepSpec] = &[
    StepSpec {
        name: "drive",
        referer: RefererPolicy::None,
        headers: &[],
        rules: &[
            ExtractRule::Pattern(r"var\s+url\s*=\s*'([^']+)'"),
            ExtractRule::Css {
                selector: "a#download",
                attr: "href",
            },
        ],
    },
    StepSpec {
        name: "gateway",
        referer: RefererPolicy::PreviousHop,
        headers: &[],
        rules: &[
            ExtractRule::Css {
                selector: "a#fsl",
                attr: "href",
            },
            ExtractRule::Css {
                selector: "a.btn-success[href]",
                attr: "href",
            },
            MEDIA_URL,
        ],
    },
];

const GDFLIX: &[StepSpec] = &[
    StepSpec {
        name: "file",
        referer: RefererPolicy::None,
        headers: &[],
        rules: &[
            ExtractRule::Css {
                selector: "a[href*='/instant/']",
                attr: "href",
            },
            ExtractRule::Pattern(r#"href\s*=\s*["']([^"']*/(?:zfile|dl)/[^"']+)["']"#),
        ],
    },
    StepSpec {
        name: "instant",
        referer: RefererPolicy::PreviousHop,
        headers: &[],
        rules: &[
            ExtractRule::Pattern(r#"url=(https?://[^"'&\s]+)"#),
            ExtractRule::Css {
                selector: "a.btn-success[href]",
                attr: "href",
            },
            MEDIA_URL,
        ],
    },
];

const FILEPRESS: &[StepSpec] = &[StepSpec {
    name: "file",
    referer: RefererPolicy::None,
    headers: &[],
    rules: &[
        ExtractRule::Css {
            selector: "video source",
            attr: "src",
        },
        PLAYER_FILE,
        MEDIA_URL,
    ],
}];

/// Every built-in chain. `Direct` links resolve in zero hops.
pub const BUILTIN: &[ChainSpec] = &[
    ChainSpec {
        provider_type: ProviderType::Direct,
        steps: &[],
    },
    ChainSpec {
        provider_type: ProviderType::VidSrc,
        steps: VIDSRC,
    },
    ChainSpec {
        provider_type: ProviderType::HubCloud,
        steps: HUBCLOUD,
    },
    ChainSpec {
        provider_type: ProviderType::GdFlix,
        steps: GDFLIX,
    },
    ChainSpec {
        provider_type: ProviderType::FilePress,
        steps: FILEPRESS,
    },
];

/// A compiled chain.
#[derive(Debug)]
pub struct Chain {
    pub provider_type: ProviderType,
    pub steps: Vec<ResolutionStep>,
}

impl Chain {
    pub fn compile(spec: &ChainSpec) -> Result<Self> {
        Ok(Self {
            provider_type: spec.provider_type,
            steps: spec
                .steps
                .iter()
                .map(ResolutionStep::compile)
                .collect::<Result<Vec<_>>>()?,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Compiled chains keyed by provider type.
#[derive(Debug)]
pub struct ChainBook {
    chains: HashMap<ProviderType, Chain>,
}

impl ChainBook {
    pub fn builtin() -> Result<Self> {
        Self::from_specs(BUILTIN)
    }

    pub fn from_specs(specs: &[ChainSpec]) -> Result<Self> {
        let chains = specs
            .iter()
            .map(|spec| Chain::compile(spec).map(|c| (spec.provider_type, c)))
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Self { chains })
    }

    #[must_use]
    pub fn get(&self, provider_type: ProviderType) -> Option<&Chain> {
        self.chains.get(&provider_type)
    }
}
