//! Integration tests for the HTML extractor using fixture files.

use amz_used_watch::amazon::parser::Parser;
use amz_used_watch::amazon::regions::Region;
use amz_used_watch::scrape::{Extractor, PageError};
use rust_decimal::Decimal;

const USED_RESULTS: &str = include_str!("fixtures/used_results.html");
const LAST_PAGE: &str = include_str!("fixtures/used_results_last.html");
const CAPTCHA: &str = include_str!("fixtures/captcha.html");

#[test]
fn test_extract_used_results() {
    let parser = Parser::new(Region::Us);
    assert!(parser.check_page("https://www.amazon.com/s", USED_RESULTS).is_ok());

    let page = parser.extract(USED_RESULTS, "mice");

    // placeholder ignored, card without price skipped
    assert_eq!(page.count(), 3);
    assert_eq!(page.skipped, 1);
    assert!(page.has_next);

    let mouse = &page.records[0];
    assert_eq!(mouse.id, "B09HM94VDS");
    assert!(mouse.name.starts_with("Logitech MX Master 3S"));
    assert_eq!(mouse.price, Decimal::new(6299, 2));
    assert_eq!(mouse.condition, "Used - Like New");
    assert!(mouse.is_used_offer);
    assert_eq!(mouse.url, "https://www.amazon.com/dp/B09HM94VDS");
    assert_eq!(mouse.source_label, "mice");

    // used offer price wins over the new price
    let keyboard = &page.records[1];
    assert_eq!(keyboard.id, "B07QBBFWCV");
    assert_eq!(keyboard.price, Decimal::new(5420, 2));
    assert!(keyboard.is_used_offer);
    assert!(keyboard.condition.contains("used offers"));

    let cable = &page.records[2];
    assert_eq!(cable.id, "B0CABLE001");
    assert_eq!(cable.price, Decimal::new(999, 2));
    assert!(!cable.is_used_offer);
    assert_eq!(cable.condition, "New");
}

#[test]
fn test_last_page_has_no_next() {
    let parser = Parser::new(Region::Us);
    let page = parser.extract(LAST_PAGE, "mice");

    assert_eq!(page.count(), 1);
    assert!(!page.has_next);
    assert_eq!(page.records[0].condition, "Used - Very Good");
}

#[test]
fn test_captcha_fixture_is_terminal() {
    let parser = Parser::new(Region::Us);
    let err = parser.check_page("https://www.amazon.com/s?k=mouse", CAPTCHA).unwrap_err();

    assert!(matches!(err, PageError::Captcha { .. }));
    assert!(!err.is_transient());
    assert!(err.snapshot().unwrap().contains("validateCaptcha"));
}

#[test]
fn test_empty_results() {
    let parser = Parser::new(Region::Us);
    let html = r#"
        <html>
        <body>
            <div class="s-no-search-results">No results found</div>
        </body>
        </html>
    "#;

    let page = parser.extract(html, "mice");
    assert!(page.is_empty());
    assert!(!page.has_next);
}

#[test]
fn test_filter_integration() {
    use amz_used_watch::filters::FilterChainBuilder;

    let parser = Parser::new(Region::Us);
    let page = parser.extract(USED_RESULTS, "mice");

    let filters = FilterChainBuilder::new()
        .used_only(true)
        .price_range(None, Some(Decimal::from(60)))
        .build();

    let qualifying = filters.apply(page.records);
    assert_eq!(qualifying.len(), 1);
    assert_eq!(qualifying[0].id, "B07QBBFWCV");
}
