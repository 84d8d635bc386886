use crate::utils::error::{EtlError, Result};
use reqwest::Client;
use scraper::{Html, Selector};

/// `href` of every `<a>` element, in document order. Anchors without an
/// `href` attribute are skipped.
pub fn extract_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let anchors = match Selector::parse("a") {
        Ok(selector) => selector,
        Err(_) => return Vec::new(),
    };

    let mut links = Vec::new();
    let mut without_href = 0usize;
    for element in document.select(&anchors) {
        match element.value().attr("href") {
            Some(href) => links.push(href.to_string()),
            None => without_href += 1,
        }
    }
    if without_href > 0 {
        tracing::debug!(count = without_href, "Skipped anchors without href");
    }
    links
}

/// Fetch a page and return its links.
pub async fn scrape_links(client: &Client, url: &str) -> Result<Vec<String>> {
    tracing::debug!("Fetching HTML from: {}", url);
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(EtlError::HttpStatusError {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.text().await?;
    let links = extract_links(&body);
    tracing::info!(links = links.len(), "Scraped {}", url);
    Ok(links)
}
