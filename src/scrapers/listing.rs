use crate::config::Selectors;
use crate::models::{listing_fingerprint, Listing};
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

/// Label/value pairs pulled from a result row's data table
#[derive(Debug, Default)]
struct DataBlock {
    registration: Option<String>,
    mileage: Option<String>,
    transmission: Option<String>,
    engine: Option<String>,
    values: Vec<String>,
}

/// Turns result-page markup into [`Listing`]s
pub struct ListingExtractor {
    origin: String,
    row: Selector,
    title: Selector,
    price_main: Selector,
    price_fallback: Selector,
    link: Selector,
    data_primary: Selector,
    data_fallback: Selector,
    table_row: Selector,
    cell: Selector,
    owners: Regex,
    price_number: Regex,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector {css:?}: {e:?}"))
}

/// Element text with runs of whitespace collapsed; `None` when blank
fn text_of(element: ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

impl ListingExtractor {
    pub fn new(selectors: &Selectors, origin: &str) -> Result<Self> {
        Ok(Self {
            origin: origin.trim_end_matches('/').to_string(),
            row: selector(&selectors.result_row)?,
            title: selector(&selectors.title)?,
            price_main: selector(&selectors.price_main)?,
            price_fallback: selector(&selectors.price_fallback)?,
            link: selector(&selectors.link)?,
            data_primary: selector(&selectors.data_block_primary)?,
            data_fallback: selector(&selectors.data_block_fallback)?,
            table_row: selector("tr")?,
            cell: selector("td, th")?,
            owners: Regex::new(r"(?i)(\d+)\.\s?lastni(?:ca|ka|k)")
                .context("Failed to compile owner pattern")?,
            price_number: Regex::new(r"\d{1,3}(?:[.\s]\d{3})+|\d+")
                .context("Failed to compile price pattern")?,
        })
    }

    /// Extract every complete row, in page order.
    ///
    /// Rows without a data block are skipped; there is not enough on them to
    /// describe a car.
    pub fn extract(&self, markup: &str) -> Vec<Listing> {
        let document = Html::parse_document(markup);
        let rows: Vec<_> = document.select(&self.row).collect();
        info!("Found {} listing rows", rows.len());

        let mut listings = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;

        for row in rows {
            match self.extract_row(row) {
                Some(listing) => listings.push(listing),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            debug!("Skipped {} rows without a data block", skipped);
        }
        listings
    }

    fn extract_row(&self, row: ElementRef<'_>) -> Option<Listing> {
        let data = self.data_block(row)?;

        let title = self.first_text(row, &self.title);
        let price = self
            .first_text(row, &self.price_main)
            .or_else(|| self.first_text(row, &self.price_fallback))
            .map(|raw| self.normalize_price(&raw));
        let url = row
            .select(&self.link)
            .filter_map(|a| a.value().attr("href"))
            .next()
            .map(|href| self.absolute_link(href));

        let owners = title
            .as_deref()
            .and_then(|t| self.owner_count(t))
            .or_else(|| data.values.iter().find_map(|v| self.owner_count(v)));

        let fingerprint = listing_fingerprint(
            title.as_deref().unwrap_or(""),
            price.as_deref().unwrap_or(""),
            data.registration.as_deref().unwrap_or(""),
        );

        Some(Listing {
            fingerprint,
            title,
            price,
            url,
            registration: data.registration,
            mileage: data.mileage,
            transmission: data.transmission,
            engine: data.engine,
            owners,
        })
    }

    fn first_text(&self, row: ElementRef<'_>, selector: &Selector) -> Option<String> {
        row.select(selector).find_map(text_of)
    }

    fn data_block(&self, row: ElementRef<'_>) -> Option<DataBlock> {
        let block = row
            .select(&self.data_primary)
            .next()
            .or_else(|| row.select(&self.data_fallback).next())?;

        let mut data = DataBlock::default();
        for tr in block.select(&self.table_row) {
            let mut cells = tr.select(&self.cell).filter_map(text_of);
            let (Some(label), Some(value)) = (cells.next(), cells.next()) else {
                continue;
            };

            let slot = if label.starts_with("1.registracija") {
                &mut data.registration
            } else if label.starts_with("Prevoženih") {
                &mut data.mileage
            } else if label.starts_with("Menjalnik") {
                &mut data.transmission
            } else if label.starts_with("Motor") {
                &mut data.engine
            } else {
                data.values.push(value);
                continue;
            };
            data.values.push(value.clone());
            slot.get_or_insert(value);
        }

        (!data.values.is_empty()).then_some(data)
    }

    fn absolute_link(&self, href: &str) -> String {
        if let Some(rest) = href.strip_prefix("..") {
            format!("{}{}", self.origin, rest)
        } else if href.starts_with('/') {
            format!("{}{}", self.origin, href)
        } else {
            href.to_string()
        }
    }

    /// `"15.490 €"` becomes `"15490"`; text without a number is kept as-is
    pub fn normalize_price(&self, raw: &str) -> String {
        match self.price_number.find(raw) {
            Some(number) => number
                .as_str()
                .chars()
                .filter(char::is_ascii_digit)
                .collect(),
            None => raw.trim().to_string(),
        }
    }

    fn owner_count(&self, text: &str) -> Option<String> {
        self.owners
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> ListingExtractor {
        ListingExtractor::new(&Selectors::default(), "https://www.avto.net").unwrap()
    }

    fn row(title: &str, price: &str, data: &str) -> String {
        format!(
            r#"<div class="GO-Results-Row">
                <div class="GO-Results-Naziv"><span>{title}</span></div>
                <div class="GO-Results-Price-TXT-Regular">{price}</div>
                <a class="stretched-link" href="../Ads/details.asp?id=1001"></a>
                {data}
            </div>"#
        )
    }

    const DATA: &str = r#"<div class="GO-Results-Data-Top"><table>
        <tr><td>1.registracija</td><td>2020</td></tr>
        <tr><td>Prevoženih km</td><td>85000 km</td></tr>
        <tr><td>Menjalnik</td><td>ročni menjalnik</td></tr>
        <tr><td>Motor</td><td>1968 ccm, 110 kW / 150 KM</td></tr>
    </table></div>"#;

    fn page(rows: &[String]) -> String {
        format!("<html><body>{}</body></html>", rows.concat())
    }

    #[test]
    fn extracts_all_columns() {
        let html = page(&[row("Volkswagen Golf 2.0 TDI", "15.000 €", DATA)]);
        let listings = extractor().extract(&html);

        assert_eq!(listings.len(), 1);
        let car = &listings[0];
        assert_eq!(car.title.as_deref(), Some("Volkswagen Golf 2.0 TDI"));
        assert_eq!(car.price.as_deref(), Some("15000"));
        assert_eq!(car.registration.as_deref(), Some("2020"));
        assert_eq!(car.mileage.as_deref(), Some("85000 km"));
        assert_eq!(car.transmission.as_deref(), Some("ročni menjalnik"));
        assert_eq!(car.engine.as_deref(), Some("1968 ccm, 110 kW / 150 KM"));
        assert_eq!(
            car.url.as_deref(),
            Some("https://www.avto.net/Ads/details.asp?id=1001")
        );
        assert_eq!(car.owners, None);
        assert_eq!(
            car.fingerprint,
            listing_fingerprint("Volkswagen Golf 2.0 TDI", "15000", "2020")
        );
    }

    #[test]
    fn fingerprint_is_stable_across_extractions() {
        let html = page(&[row("Golf 2.0", "15000", DATA)]);
        let first = extractor().extract(&html);
        let second = extractor().extract(&html);
        assert_eq!(first[0].fingerprint, second[0].fingerprint);
        assert_eq!(first[0].fingerprint, listing_fingerprint("Golf 2.0", "15000", "2020"));
    }

    #[test]
    fn row_without_data_block_is_skipped() {
        let html = page(&[
            row("Complete", "1.000 €", DATA),
            row("Incomplete", "2.000 €", ""),
        ]);
        let listings = extractor().extract(&html);
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].title.as_deref(), Some("Complete"));
    }

    #[test]
    fn fallback_price_and_data_block_are_used() {
        let html = r#"<div class="GO-Results-Row">
            <div class="GO-Results-Naziv">Škoda Octavia</div>
            <div class="GO-Results-Price-TXT-Regular">  </div>
            <div class="GO-Results-Price-TXT-AkcijaCena">9.990 €</div>
            <div class="GO-Results-Data"><table><tr><td>1.registracija</td><td>2016</td></tr></table></div>
        </div>"#;
        let listings = extractor().extract(html);
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].price.as_deref(), Some("9990"));
        assert_eq!(listings[0].registration.as_deref(), Some("2016"));
        assert_eq!(listings[0].url, None);
        assert_eq!(listings[0].mileage, None);
    }

    #[test]
    fn owner_count_idioms() {
        let ex = extractor();
        assert_eq!(ex.owner_count("BMW 320d 1.LASTNIK"), Some("1".into()));
        assert_eq!(ex.owner_count("Audi A4 2.lastnika, servisna"), Some("2".into()));
        assert_eq!(ex.owner_count("Clio 1.Lastnica"), Some("1".into()));
        assert_eq!(ex.owner_count("Clio, garažiran"), None);
    }

    #[test]
    fn owner_count_falls_back_to_data_values() {
        let data = r#"<div class="GO-Results-Data-Top"><table>
            <tr><td>1.registracija</td><td>2018</td></tr>
            <tr><td>Opombe</td><td>prvi 1.lastnik</td></tr>
        </table></div>"#;
        let listings = extractor().extract(&page(&[row("Mazda 3", "12.500 €", data)]));
        assert_eq!(listings[0].owners.as_deref(), Some("1"));
    }

    #[test]
    fn price_normalization() {
        let ex = extractor();
        assert_eq!(ex.normalize_price("15.490 €"), "15490");
        assert_eq!(ex.normalize_price("1 250 €"), "1250");
        assert_eq!(ex.normalize_price("750 €"), "750");
        assert_eq!(ex.normalize_price(" Pokličite "), "Pokličite");
    }

    #[test]
    fn links_are_made_absolute() {
        let ex = extractor();
        assert_eq!(ex.absolute_link("../Ads/x.asp"), "https://www.avto.net/Ads/x.asp");
        assert_eq!(ex.absolute_link("/Ads/x.asp"), "https://www.avto.net/Ads/x.asp");
        assert_eq!(ex.absolute_link("https://other.test/x"), "https://other.test/x");
    }

    #[test]
    fn empty_markup_yields_no_listings() {
        assert!(extractor().extract("<html></html>").is_empty());
    }
}
