use anyhow::{Context, Result};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use super::{FireContext, Provider, Section};
use crate::config::HolidaysConfig;

const HEADER: &str = "Сегодня отмечают 🎉:\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holiday {
    pub name: String,
    pub likes: i64,
}

pub struct HolidaysProvider {
    client: Client,
    url: String,
    limit: usize,
}

impl HolidaysProvider {
    pub fn new(config: &HolidaysConfig) -> Result<Self> {
        Ok(Self {
            client: super::http_client(config.timeout_secs)?,
            url: config.url.clone(),
            limit: config.limit,
        })
    }
}

#[async_trait::async_trait]
impl Provider for HolidaysProvider {
    fn name(&self) -> &str {
        "holidays"
    }

    fn section(&self) -> Section {
        Section::Holidays
    }

    async fn fetch(&self, _ctx: &FireContext) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Failed to call {}", self.url))?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Holiday page error ({status})");
        }
        let page = response.text().await.context("Failed to read holiday page")?;

        let holidays = top_holidays(parse_holidays(&page)?, self.limit);
        tracing::info!("Got {} holidays from {}", holidays.len(), self.url);
        Ok(format_holidays(&holidays))
    }
}

/// Extract every holiday with a like counter from the first list of the article.
pub fn parse_holidays(page: &str) -> Result<Vec<Holiday>> {
    let document = Html::parse_document(page);
    let items = selector("article > section:first-of-type > ul > li")?;
    let likes = selector("form button span")?;

    let mut holidays = Vec::new();
    for item in document.select(&items) {
        let Some(name) = item
            .children()
            .filter_map(ElementRef::wrap)
            .next()
            .map(element_text)
            .filter(|n| !n.is_empty())
        else {
            continue;
        };
        let Some(count) = item
            .select(&likes)
            .next()
            .and_then(|span| element_text(span).parse::<i64>().ok())
        else {
            tracing::debug!("Skipping holiday without like counter: {name}");
            continue;
        };
        holidays.push(Holiday { name, likes: count });
    }
    Ok(holidays)
}

/// Most liked first; ties keep page order.
pub fn top_holidays(mut holidays: Vec<Holiday>, limit: usize) -> Vec<Holiday> {
    holidays.sort_by(|a, b| b.likes.cmp(&a.likes));
    holidays.truncate(limit);
    holidays
}

fn format_holidays(holidays: &[Holiday]) -> String {
    if holidays.is_empty() {
        return String::new();
    }
    let names: Vec<&str> = holidays.iter().map(|h| h.name.as_str()).collect();
    format!("{HEADER}{}", names.join("\n"))
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("Invalid selector {css}: {e}"))
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::tests::ctx;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"
        <html><body><div><main><div><article>
          <section>
            <ul>
              <li><a href="/a">День программиста</a>
                  <form><input type="hidden" value="1"><button><span>12</span></button></form></li>
              <li><a href="/b">День кошек</a>
                  <form><input type="hidden" value="2"><button><span> 340 </span></button></form></li>
              <li><a href="/c">Без лайков</a></li>
              <li><a href="/d">День чая</a>
                  <form><button><span>12</span></button></form></li>
            </ul>
          </section>
          <section>
            <ul><li><a href="/z">Завтрашний праздник</a>
                <form><button><span>999</span></button></form></li></ul>
          </section>
        </article></div></main></div></body></html>
    "#;

    #[test]
    fn test_parse_first_section_only() {
        let holidays = parse_holidays(PAGE).unwrap();
        let names: Vec<_> = holidays.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["День программиста", "День кошек", "День чая"]);
        assert_eq!(holidays[1].likes, 340);
    }

    #[test]
    fn test_ignores_nested_lists_and_sections() {
        let page = r#"
            <html><body><article>
              <section>
                <ul>
                  <li><a href="/a">День программиста</a>
                      <form><button><span>12</span></button></form></li>
                </ul>
                <div><ul><li><a href="/ad">Реклама</a>
                    <form><button><span>500</span></button></form></li></ul></div>
                <section><ul><li><a href="/n">Вложенный</a>
                    <form><button><span>700</span></button></form></li></ul></section>
              </section>
            </article></body></html>
        "#;
        let names: Vec<_> = parse_holidays(page)
            .unwrap()
            .into_iter()
            .map(|h| h.name)
            .collect();
        assert_eq!(names, ["День программиста"]);
    }

    #[test]
    fn test_top_holidays_sorted_and_truncated() {
        let top = top_holidays(parse_holidays(PAGE).unwrap(), 2);
        assert_eq!(
            top,
            vec![
                Holiday { name: "День кошек".into(), likes: 340 },
                Holiday { name: "День программиста".into(), likes: 12 },
            ]
        );
    }

    #[test]
    fn test_empty_page() {
        assert!(parse_holidays("<html></html>").unwrap().is_empty());
        assert_eq!(format_holidays(&[]), "");
    }

    #[tokio::test]
    async fn test_fetch_formats_top_names() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let provider = HolidaysProvider::new(&HolidaysConfig {
            url: server.uri(),
            limit: 5,
            ..HolidaysConfig::default()
        })
        .unwrap();
        let text = provider.fetch(&ctx(1, 1)).await.unwrap();
        assert_eq!(
            text,
            "Сегодня отмечают 🎉:\nДень кошек\nДень программиста\nДень чая"
        );
    }

    #[tokio::test]
    async fn test_fetch_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let provider = HolidaysProvider::new(&HolidaysConfig {
            url: server.uri(),
            ..HolidaysConfig::default()
        })
        .unwrap();
        assert!(provider.fetch(&ctx(1, 1)).await.is_err());
    }
}
