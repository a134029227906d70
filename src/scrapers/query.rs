//! Translation of a [`FilterSet`] into the site's search query string.
//!
//! The results page only behaves when every parameter it knows about is
//! present, so unset dimensions are filled from the sentinel tables below
//! rather than left out.

use crate::scrapers::types::FilterSet;
use anyhow::{bail, Context, Result};
use reqwest::Url;
use tracing::debug;

const RESULTS_PATH: &str = "/Ads/results.asp";
const PAGE_PARAM: &str = "stran";

/// Price range meaning "any price"
const OPEN_PRICE: PriceRange = PriceRange { min: 0, max: 999_999 };

/// Bucket ceilings at or above this are treated as open-ended
const OPEN_BUCKET_CEILING: i64 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceRange {
    pub min: i64,
    pub max: i64,
}

/// Named price buckets keyed by their `(bucket_min, bucket_max)` pair
const PRICE_BUCKETS: &[((i64, i64), PriceRange)] = &[
    // up to 1000 EUR
    ((3, 1000), PriceRange { min: 0, max: 1000 }),
    // discounted price
    ((1, 1), OPEN_PRICE),
    // no listed price
    ((2, 2), OPEN_PRICE),
];

/// Neutral equipment codes: they match every listing
const EQUIPMENT_DEFAULTS: [(&str, &str); 10] = [
    ("EQ1", "1000000000"),
    ("EQ2", "1000000000"),
    ("EQ3", "1000000000"),
    ("EQ4", "1000000000"),
    ("EQ5", "1000000000"),
    ("EQ6", "1000000000"),
    ("EQ7", "1110100120"),
    ("EQ8", "100000000"),
    ("EQ9", "1000000020"),
    ("EQ10", "1000000000"),
];

/// Secondary brand/model slots the form always submits empty
const SECONDARY_SLOTS: &[(&str, &str)] = &[
    ("modelID", ""),
    ("tip", ""),
    ("znamka2", ""),
    ("model2", ""),
    ("tip2", ""),
    ("znamka3", ""),
    ("model3", ""),
    ("tip3", ""),
];

/// Vehicle-class parameters with no counterpart in [`FilterSet`]
const VEHICLE_CONSTANTS: &[(&str, &str)] = &[
    ("motortakt", "0"),
    ("motorvalji", "0"),
    ("lokacija", "0"),
    ("sirina", "0"),
    ("dolzina", ""),
    ("dolzinaMIN", "0"),
    ("dolzinaMAX", "100"),
    ("nosilnostMIN", "0"),
    ("nosilnostMAX", "999999"),
    ("sedezevMIN", "0"),
    ("sedezevMAX", "9"),
    ("lezisc", ""),
    ("presek", "0"),
    ("premer", "0"),
    ("col", "0"),
    ("vijakov", "0"),
    ("EToznaka", "0"),
    ("vozilo", ""),
    ("airbag", ""),
    ("barva", ""),
    ("barvaint", ""),
    ("doseg", "0"),
    ("BkType", "0"),
    ("BkOkvir", "0"),
    ("BkOkvirType", "0"),
    ("Bk4", "0"),
];

/// Listing-category parameters; `PIA` empty shows prices with VAT
const LISTING_CONSTANTS: &[(&str, &str)] = &[
    ("KAT", "1010000000"),
    ("PIA", ""),
    ("PIAzero", ""),
    ("PIAOut", ""),
    ("PSLO", ""),
    ("akcija", "0"),
    ("paketgarancije", ""),
    ("broker", "0"),
    ("prikazkategorije", "0"),
    ("kategorija", "0"),
    ("ONLvid", "0"),
    ("ONLnak", "0"),
    ("zaloga", "10"),
    ("arhiv", "0"),
];

/// Resolve a price bucket pair to explicit bounds.
///
/// Named buckets come from [`PRICE_BUCKETS`]; any other pair is read as
/// its own bounds, starting at zero unless the floor is a real price.
pub fn bucket_price_range(bucket_min: i64, bucket_max: i64) -> PriceRange {
    if let Some((_, range)) = PRICE_BUCKETS
        .iter()
        .find(|(pair, _)| *pair == (bucket_min, bucket_max))
    {
        return *range;
    }

    if bucket_min >= 1000 {
        PriceRange {
            min: bucket_min,
            max: bucket_max,
        }
    } else if bucket_max >= OPEN_BUCKET_CEILING {
        OPEN_PRICE
    } else {
        PriceRange {
            min: 0,
            max: bucket_max,
        }
    }
}

/// Fully specified query for one brand; the page index is set separately
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    params: Vec<(String, String)>,
}

impl SearchQuery {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn page(&self) -> u32 {
        self.get(PAGE_PARAM)
            .and_then(|p| p.parse().ok())
            .unwrap_or(1)
    }

    pub fn set_page(&mut self, page: u32) {
        self.set(PAGE_PARAM, page.to_string());
    }

    pub fn to_url(&self, origin: &str) -> Result<Url> {
        let base = format!("{}{}", origin.trim_end_matches('/'), RESULTS_PATH);
        Url::parse_with_params(&base, &self.params)
            .with_context(|| format!("Failed to build search URL from {base}"))
    }

    fn push(&mut self, key: &str, value: impl Into<String>) {
        self.params.push((key.to_string(), value.into()));
    }

    fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.params.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.params.push((key.to_string(), value)),
        }
    }
}

fn or_default<T: ToString>(value: &Option<T>, default: &str) -> String {
    value
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| default.to_string())
}

fn extra_value(key: &str, value: &serde_json::Value) -> Result<String> {
    match value {
        serde_json::Value::Null => Ok(String::new()),
        serde_json::Value::Bool(flag) => Ok((if *flag { "1" } else { "0" }).to_string()),
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            bail!("Filter `{key}` holds a nested value that cannot go into a query")
        }
    }
}

/// Build the query for one brand of a subscriber's filters, at page 1.
///
/// Fails only on untranslated keys whose values are not scalars.
pub fn translate(filters: &FilterSet, brand: &str) -> Result<SearchQuery> {
    let mut query = SearchQuery { params: Vec::new() };

    query.push("znamka", brand);
    query.push("model", filters.model.clone().unwrap_or_default());
    for (key, value) in SECONDARY_SLOTS {
        query.push(key, *value);
    }

    // A bucket always wins over explicit bounds
    let price = match filters.bucket() {
        Some((bucket_min, bucket_max)) => {
            query.push("subcenaMIN", bucket_min.to_string());
            query.push("subcenaMAX", bucket_max.to_string());
            bucket_price_range(bucket_min, bucket_max)
        }
        None => PriceRange {
            min: filters.price_min.unwrap_or(OPEN_PRICE.min),
            max: filters.price_max.unwrap_or(OPEN_PRICE.max),
        },
    };
    query.push("cenaMin", price.min.to_string());
    query.push("cenaMax", price.max.to_string());

    query.push("letnikMin", or_default(&filters.year_min, "0"));
    query.push("letnikMax", or_default(&filters.year_max, "2090"));
    query.push("bencin", or_default(&filters.fuel, "0"));
    query.push("starost2", "999");
    query.push("oblika", or_default(&filters.body_type, "0"));
    query.push("ccmMin", or_default(&filters.ccm_min, "0"));
    query.push("ccmMax", or_default(&filters.ccm_max, "99999"));
    query.push("mocMin", or_default(&filters.power_min, "0"));
    query.push("mocMax", or_default(&filters.power_max, "999999"));
    query.push("kmMin", or_default(&filters.km_min, "0"));
    query.push("kmMax", or_default(&filters.km_max, "9999999"));
    query.push("kwMin", or_default(&filters.kw_min, "0"));
    query.push("kwMax", or_default(&filters.kw_max, "999"));

    for (key, value) in VEHICLE_CONSTANTS {
        query.push(key, *value);
    }
    for (key, neutral) in EQUIPMENT_DEFAULTS {
        let code = filters.equipment.get(key).map(String::as_str).unwrap_or(neutral);
        query.push(key, code);
    }
    for (key, value) in LISTING_CONSTANTS {
        query.push(key, *value);
    }

    query.push("presort", or_default(&filters.presort, "2"));
    query.push("tipsort", or_default(&filters.tipsort, "ASC"));
    query.push(PAGE_PARAM, "1");
    query.push("subSORT", filters.sort.clone().unwrap_or_default());
    query.push("subTIPSORT", filters.sort_order.clone().unwrap_or_default());
    query.push("subLOCATION", filters.location.clone().unwrap_or_default());
    query.push("subSELLER", "2");
    query.push("lastnikov", filters.owners.clone().unwrap_or_default());

    // Forward-compatible keys go through as-is and override generated ones
    for (key, value) in &filters.extra {
        if key == PAGE_PARAM {
            debug!("Ignoring page index in filter set");
            continue;
        }
        query.set(key, extra_value(key, value)?);
    }

    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn translated(filters: &FilterSet, brand: &str) -> SearchQuery {
        translate(filters, brand).unwrap()
    }

    const REQUIRED: &[&str] = &[
        "znamka", "model", "cenaMin", "cenaMax", "letnikMin", "letnikMax", "bencin", "oblika",
        "ccmMin", "ccmMax", "mocMin", "mocMax", "kmMin", "kmMax", "kwMin", "kwMax", "EQ1", "EQ7",
        "EQ10", "presort", "tipsort", "stran", "subSORT", "subTIPSORT", "subLOCATION",
        "subSELLER", "lastnikov",
    ];

    fn filters(value: serde_json::Value) -> FilterSet {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn empty_filters_fill_every_required_dimension() {
        let query = translated(&FilterSet::default(), "");
        for key in REQUIRED {
            assert!(query.get(key).is_some(), "missing {key}");
        }
        assert_eq!(query.get("letnikMin"), Some("0"));
        assert_eq!(query.get("letnikMax"), Some("2090"));
        assert_eq!(query.get("kmMax"), Some("9999999"));
        assert_eq!(query.get("cenaMax"), Some("999999"));
        assert_eq!(query.get("EQ7"), Some("1110100120"));
        assert_eq!(query.get("EQ8"), Some("100000000"));
        assert_eq!(query.get("stran"), Some("1"));
    }

    #[test]
    fn fully_set_filters_still_fill_every_required_dimension() {
        let filters = filters(json!({
            "brands": ["Audi"], "model": "A4", "price_min": 1000, "price_max": 9000,
            "year_min": 2012, "year_max": 2018, "km_max": 150000, "fuel": 202,
            "equipment": { "EQ3": "1001000000" }, "owners": "1"
        }));
        let query = translated(&filters, "Audi");
        for key in REQUIRED {
            assert!(query.get(key).is_some(), "missing {key}");
        }
        assert_eq!(query.get("znamka"), Some("Audi"));
        assert_eq!(query.get("model"), Some("A4"));
        assert_eq!(query.get("cenaMin"), Some("1000"));
        assert_eq!(query.get("cenaMax"), Some("9000"));
        assert_eq!(query.get("letnikMin"), Some("2012"));
        assert_eq!(query.get("bencin"), Some("202"));
        assert_eq!(query.get("EQ3"), Some("1001000000"));
        assert_eq!(query.get("EQ1"), Some("1000000000"));
        assert_eq!(query.get("lastnikov"), Some("1"));
    }

    #[test]
    fn under_thousand_bucket_maps_to_explicit_ceiling() {
        let query = translated(&filters(json!({ "bucket_min": 3, "bucket_max": 1000 })), "");
        assert_eq!(query.get("cenaMin"), Some("0"));
        assert_eq!(query.get("cenaMax"), Some("1000"));
        assert_eq!(query.get("subcenaMIN"), Some("3"));
        assert_eq!(query.get("subcenaMAX"), Some("1000"));
    }

    #[test]
    fn discount_and_unpriced_buckets_are_unrestricted() {
        assert_eq!(bucket_price_range(1, 1), OPEN_PRICE);
        assert_eq!(bucket_price_range(2, 2), OPEN_PRICE);
    }

    #[test]
    fn unnamed_buckets_widen_to_their_own_bounds() {
        assert_eq!(bucket_price_range(1000, 2500), PriceRange { min: 1000, max: 2500 });
        assert_eq!(bucket_price_range(5, 750), PriceRange { min: 0, max: 750 });
        assert_eq!(bucket_price_range(5, 250_000), OPEN_PRICE);
    }

    #[test]
    fn bucket_overrides_explicit_price_bounds() {
        let query = translated(
            &filters(json!({ "bucket_min": 3, "bucket_max": 1000, "price_max": 50000 })),
            "",
        );
        assert_eq!(query.get("cenaMax"), Some("1000"));
    }

    #[test]
    fn unknown_keys_pass_through() {
        let query = translated(&filters(json!({ "newDimension": 7, "akcija": true })), "");
        assert_eq!(query.get("newDimension"), Some("7"));
        assert_eq!(query.get("akcija"), Some("1"));
    }

    #[test]
    fn page_is_set_outside_translation() {
        let mut query = translated(&FilterSet::default(), "BMW");
        query.set_page(3);
        assert_eq!(query.page(), 3);
        assert_eq!(query.params().iter().filter(|(k, _)| k == "stran").count(), 1);
    }

    #[test]
    fn url_carries_origin_path_and_params() {
        let query = translated(&filters(json!({ "model": "Golf" })), "Volkswagen");
        let url = query.to_url("https://www.avto.net/").unwrap();
        assert!(url.as_str().starts_with("https://www.avto.net/Ads/results.asp?znamka=Volkswagen&model=Golf"));
    }

    #[test]
    fn nested_extra_values_are_rejected() {
        let err = translate(&filters(json!({ "brands": ["Audi"], "colour": { "r": 1 } })), "Audi")
            .unwrap_err();
        assert!(err.to_string().contains("colour"));
        assert!(translate(&filters(json!({ "tags": [1, 2] })), "").is_err());
    }
}
