//! Built-in site tables.
//!
//! Listing strategies are ordered from the current theme's markup to older
//! or simpler layouts. Field rules are tried in order per item.

use super::profile::{DetailProfile, FieldRule, SiteProfile};

const LAZY_IMAGE: &[FieldRule] = &[
    FieldRule::attr("img", "data-src"),
    FieldRule::attr("img", "data-lazy-src"),
    FieldRule::attr("img", "src"),
];

const WP_DETAIL: DetailProfile = DetailProfile {
    title: &[
        FieldRule::text("h1.entry-title"),
        FieldRule::text("h1.page-title"),
        FieldRule::text("h1"),
        FieldRule::attr("meta[property='og:title']", "content"),
    ],
    image: &[
        FieldRule::attr("meta[property='og:image']", "content"),
        FieldRule::attr(".entry-content img", "src"),
        FieldRule::attr(".poster img", "src"),
    ],
    rating: &[
        FieldRule::text(".imdb-rating"),
        FieldRule::text(".rating"),
    ],
    description: &[
        FieldRule::attr("meta[name='description']", "content"),
        FieldRule::attr("meta[property='og:description']", "content"),
        FieldRule::text(".entry-content > p"),
    ],
    content: &[".entry-content", ".page-body", "article", "main"],
};

/// Every site with a dedicated table, in match order.
pub static SITE_PROFILES: [SiteProfile; 4] = [
    SiteProfile {
        name: "4khdhub",
        keys: &["4kHDHub"],
        page_path: "/page/{page}.html",
        search_path: "/?s={query}",
        item_selectors: &["div.card-grid a.movie-card", "a.movie-card", "article"],
        title: &[
            FieldRule::text(".movie-card-title"),
            FieldRule::text("h3"),
            FieldRule::attr("img", "alt"),
        ],
        link: &[FieldRule::attr("", "href"), FieldRule::attr("a", "href")],
        image: LAZY_IMAGE,
        rating: &[FieldRule::text(".movie-card-rating")],
        detail: DetailProfile {
            title: &[
                FieldRule::text("h1.page-title"),
                FieldRule::text("h1"),
                FieldRule::attr("meta[property='og:title']", "content"),
            ],
            image: &[
                FieldRule::attr(".poster-image img", "src"),
                FieldRule::attr("meta[property='og:image']", "content"),
            ],
            rating: &[FieldRule::text(".imdb-rating"), FieldRule::text(".rating")],
            description: &[
                FieldRule::text(".content-section p"),
                FieldRule::attr("meta[name='description']", "content"),
            ],
            content: &[".download-section", ".page-body", "main"],
        },
    },
    SiteProfile {
        name: "uhdmovies",
        keys: &["UhdMovies"],
        page_path: "/page/{page}/",
        search_path: "/search/{query}",
        item_selectors: &["article.gridlove-post", "div.entry-image", "article"],
        title: &[
            FieldRule::text("h1.sanket"),
            FieldRule::text(".entry-title"),
            FieldRule::attr("a", "title"),
            FieldRule::attr("img", "alt"),
        ],
        link: &[FieldRule::attr("a", "href")],
        image: LAZY_IMAGE,
        rating: &[],
        detail: WP_DETAIL,
    },
    SiteProfile {
        name: "hdhub4u",
        keys: &["HdHub4u"],
        page_path: "/page/{page}/",
        search_path: "/?s={query}",
        item_selectors: &["ul.recent-movies li.thumb", "li.thumb", "article"],
        title: &[
            FieldRule::text("figcaption a p"),
            FieldRule::text("figcaption p"),
            FieldRule::attr("img", "alt"),
        ],
        link: &[
            FieldRule::attr("figcaption a", "href"),
            FieldRule::attr("a", "href"),
        ],
        image: LAZY_IMAGE,
        rating: &[],
        detail: WP_DETAIL,
    },
    SiteProfile {
        name: "vegamovies",
        keys: &["Vega", "VegaMovies"],
        page_path: "/page/{page}/",
        search_path: "/?s={query}",
        item_selectors: &["article.post-item", ".blog-items article", "article"],
        title: &[
            FieldRule::text("h2.post-title a"),
            FieldRule::text(".post-title"),
            FieldRule::attr("a", "title"),
            FieldRule::attr("img", "alt"),
        ],
        link: &[
            FieldRule::attr("h2.post-title a", "href"),
            FieldRule::attr("a", "href"),
        ],
        image: LAZY_IMAGE,
        rating: &[],
        detail: WP_DETAIL,
    },
];

/// Rules for sites without a dedicated table. Targets the common
/// WordPress listing themes.
pub static GENERIC: SiteProfile = SiteProfile {
    name: "generic",
    keys: &[],
    page_path: "/page/{page}/",
    search_path: "/?s={query}",
    item_selectors: &[
        "article",
        ".post-item",
        "li.thumb",
        ".movie-card",
        ".result-item",
    ],
    title: &[
        FieldRule::text("h2 a"),
        FieldRule::text("h3 a"),
        FieldRule::text(".entry-title"),
        FieldRule::attr("a", "title"),
        FieldRule::attr("img", "alt"),
    ],
    link: &[
        FieldRule::attr("h2 a", "href"),
        FieldRule::attr("h3 a", "href"),
        FieldRule::attr("a", "href"),
    ],
    image: LAZY_IMAGE,
    rating: &[FieldRule::text(".rating")],
    detail: WP_DETAIL,
};
