//! CSS selectors for Amazon used/open-box result pages.
//!
//! Selector churn is expected: keep every selector here so that a markup
//! change never ripples into the driver or the history engine.
//!
//! **Update process**: when extraction starts skipping cards, grab the
//! snapshot from the debug directory, fix the selector and add a fixture.

use scraper::Selector;
use std::sync::LazyLock;

/// Selectors for search results pages.
pub mod search {
    use super::*;

    /// Result card, old and new layouts.
    pub static RESULT: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "[data-component-type='s-search-result'], \
             div.s-main-slot div.s-result-item[data-asin]",
        )
        .unwrap()
    });

    /// ASIN attribute on result card.
    pub static ASIN_ATTR: &str = "data-asin";

    /// Listing title text.
    pub static TITLE: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "h2 a span, \
             h2 span.a-text-normal, \
             h2 span, \
             .a-size-medium.a-text-normal, \
             .a-size-base-plus.a-text-normal",
        )
        .unwrap()
    });

    /// Main offer price.
    pub static PRICE_CURRENT: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            ".a-price:not([data-a-strike]) .a-offscreen, \
             .a-price .a-offscreen",
        )
        .unwrap()
    });

    /// Condition line or secondary-offer block ("Usado - Muito bom",
    /// "More buying choices ... used offers").
    pub static CONDITION: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "span.a-size-small.a-color-secondary, \
             [data-cy='secondary-offer-recipe']",
        )
        .unwrap()
    });

    /// Price shown inside the secondary (used) offer block.
    pub static USED_OFFER_PRICE: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "[data-cy='secondary-offer-recipe'] span.a-color-base, \
             [data-cy='secondary-offer-recipe'] .a-offscreen",
        )
        .unwrap()
    });

    /// Enabled "next page" control.
    pub static NEXT_PAGE: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "a.s-pagination-next:not(.s-pagination-disabled), \
             li.a-last:not(.a-disabled) a",
        )
        .unwrap()
    });
}

/// Selectors for detecting blocking or error pages.
pub mod errors {
    use super::*;

    /// CAPTCHA form or image.
    pub static CAPTCHA: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "form[action*='validateCaptcha'], \
             img[src*='captcha'], \
             input#captchacharacters",
        )
        .unwrap()
    });

    /// Dog page (Amazon's 503 page).
    pub static DOG_PAGE: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse(
            "img[alt*='dog'], \
             img[alt*='Dogs of Amazon'], \
             a[href='/ref=cs_503_link']",
        )
        .unwrap()
    });
}
