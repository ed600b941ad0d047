//! HTML rating page parser.
//!
//! A page is recognised by its rating section; every rating item inside the
//! first such section counts one vote for the category named by its rating
//! attribute (`1` through `6`). The link matched by the next selector
//! continues the listing.

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use tally_core::{CATEGORY_COUNT, Error, Histogram, PageParser, PageRef, PageTemplate, ParsedPage, ParserConfig, RawPage};

/// Extracts rating counts and pagination from HTML pages.
#[derive(Debug, Clone)]
pub struct HtmlRatingParser {
    section: Selector,
    item: Selector,
    next: Selector,
    rating_attr: String,
    page_number: Regex,
}

fn selector(field: &str, css: &str) -> Result<Selector, Error> {
    Selector::parse(css).map_err(|e| Error::InvalidInput(format!("{field} {css:?} is not a valid selector: {e}")))
}

impl HtmlRatingParser {
    /// Compile the configured selectors.
    pub fn new(config: &ParserConfig) -> Result<Self, Error> {
        let page_number = Regex::new(&format!(r"([?&]{}=)(\d+)", regex::escape(&config.page_param)))
            .map_err(|e| Error::InvalidInput(format!("page_param {:?}: {}", config.page_param, e)))?;

        Ok(Self {
            section: selector("section_selector", &config.section_selector)?,
            item: selector("item_selector", &config.item_selector)?,
            next: selector("next_selector", &config.next_selector)?,
            rating_attr: config.rating_attr.clone(),
            page_number,
        })
    }

    fn rating(&self, value: &str) -> Option<usize> {
        let rating: usize = value.trim().parse().ok()?;
        (1..=CATEGORY_COUNT).contains(&rating).then(|| rating - 1)
    }

    fn next_ref(&self, document: &Html, location: &PageRef) -> Option<PageRef> {
        let href = document.select(&self.next).find_map(|a| a.value().attr("href"))?.trim();
        if href.is_empty() || href.starts_with('#') {
            return None;
        }

        let resolved = match Url::parse(location.as_str()) {
            Ok(base) => base.join(href).ok()?,
            Err(_) => Url::parse(href).ok()?,
        };

        // A next link pointing back at the same page would never terminate.
        if resolved.as_str() == location.as_str() {
            tracing::debug!("next link of {} points to itself", location);
            return None;
        }
        Some(PageRef::from(resolved.to_string()))
    }
}

impl PageParser for HtmlRatingParser {
    fn parse(&self, raw: &RawPage) -> Result<ParsedPage, Error> {
        let document = Html::parse_document(&raw.body);

        let Some(section) = document.select(&self.section).next() else {
            return Err(Error::ParseFailed(format!("no rating section in {}", raw.location)));
        };

        let mut counts = Histogram::zero();
        let mut skipped = 0usize;
        for item in section.select(&self.item) {
            match item.value().attr(&self.rating_attr).and_then(|v| self.rating(v)) {
                Some(category) => {
                    counts.increment(category);
                }
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::debug!("skipped {} items without a usable rating in {}", skipped, raw.location);
        }

        Ok(ParsedPage { counts, next: self.next_ref(&document, &raw.location) })
    }

    /// The next link with its page number replaced by the placeholder.
    fn template(&self, page: &ParsedPage) -> Option<PageTemplate> {
        let next = page.next.as_ref()?.as_str();
        let number = self.page_number.captures(next)?.get(2)?;
        let first_index = number.as_str().parse().ok()?;

        let pattern = format!("{}{}{}", &next[..number.start()], PageTemplate::PLACEHOLDER, &next[number.end()..]);
        PageTemplate::new(pattern, first_index)
    }
}
