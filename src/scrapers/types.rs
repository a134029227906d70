use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Price ceiling the registration form submits when the user leaves it alone
pub const DEFAULT_PRICE_CEILING: i64 = 100_000;

/// Search criteria for one subscriber.
///
/// Every dimension is optional; `None` means "no restriction" and is filled
/// with the site's sentinel value by the query translator. Keys this struct
/// does not know about are kept in `extra` and forwarded untranslated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FilterSet {
    /// Brand list; `""` means all brands
    #[serde(default, deserialize_with = "brand_list")]
    pub brands: Vec<String>,
    pub model: Option<String>,
    /// Minimum price (EUR)
    pub price_min: Option<i64>,
    /// Maximum price (EUR)
    pub price_max: Option<i64>,
    /// Price bucket shorthand, lower half of the pair
    pub bucket_min: Option<i64>,
    /// Price bucket shorthand, upper half of the pair
    pub bucket_max: Option<i64>,
    pub year_min: Option<u32>,
    pub year_max: Option<u32>,
    pub km_min: Option<i64>,
    pub km_max: Option<i64>,
    pub kw_min: Option<i64>,
    pub kw_max: Option<i64>,
    pub ccm_min: Option<i64>,
    pub ccm_max: Option<i64>,
    pub power_min: Option<String>,
    pub power_max: Option<String>,
    pub body_type: Option<String>,
    /// Fuel code: 0 all, 201 petrol, 202 diesel, 207 electric
    pub fuel: Option<i64>,
    pub location: Option<String>,
    /// Equipment flag codes keyed by site name (`EQ1`..`EQ10`)
    #[serde(default)]
    pub equipment: BTreeMap<String, String>,
    pub sort: Option<String>,
    pub sort_order: Option<String>,
    pub presort: Option<String>,
    pub tipsort: Option<String>,
    pub owners: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Accepts a single brand string, a list, or null.
fn brand_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(brand)) => vec![brand],
        Some(OneOrMany::Many(brands)) => brands,
        None => Vec::new(),
    })
}

impl FilterSet {
    /// Brand list as scraped: never empty, at most `max` entries.
    ///
    /// Entries beyond `max` are dropped, not rejected.
    pub fn normalized_brands(&self, max: usize) -> Vec<String> {
        let mut brands = if self.brands.is_empty() {
            vec![String::new()]
        } else {
            self.brands.clone()
        };

        let max = max.max(1);
        if brands.len() > max {
            warn!(
                "Too many brands ({}), limiting to {}: dropping {:?}",
                brands.len(),
                max,
                &brands[max..]
            );
            brands.truncate(max);
        }
        brands
    }

    /// Price bucket pair, if both halves are set
    pub fn bucket(&self) -> Option<(i64, i64)> {
        self.bucket_min.zip(self.bucket_max)
    }

    /// Whether these filters narrow the search at all. The registration
    /// form's untouched defaults do not.
    pub fn is_restrictive(&self) -> bool {
        let real_brand = self.brands.iter().any(|b| !b.trim().is_empty());
        let real_model = self.model.as_deref().is_some_and(|m| !m.trim().is_empty());
        let bucket = self.bucket_min.is_some() || self.bucket_max.is_some();
        let floor = self.price_min.is_some_and(|p| p > 0);
        let ceiling = self.price_max.is_some_and(|p| p != DEFAULT_PRICE_CEILING);

        real_brand || real_model || bucket || floor || ceiling
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> FilterSet {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn brand_accepts_single_string() {
        let filters = parse(json!({ "brands": "Volkswagen" }));
        assert_eq!(filters.brands, vec!["Volkswagen"]);
    }

    #[test]
    fn missing_brand_means_all_brands() {
        let filters = parse(json!({}));
        assert_eq!(filters.normalized_brands(2), vec![String::new()]);

        let filters = parse(json!({ "brands": null }));
        assert_eq!(filters.normalized_brands(2), vec![String::new()]);
    }

    #[test]
    fn excess_brands_are_dropped() {
        let filters = parse(json!({ "brands": ["Audi", "BMW", "Skoda"] }));
        assert_eq!(filters.normalized_brands(2), vec!["Audi", "BMW"]);
    }

    #[test]
    fn unknown_keys_are_kept() {
        let filters = parse(json!({ "brands": ["Audi"], "subLOCATION": "LJ" }));
        assert_eq!(filters.extra.get("subLOCATION"), Some(&json!("LJ")));
    }

    #[test]
    fn equipment_flags_parse() {
        let filters = parse(json!({ "equipment": { "EQ3": "1001000000" } }));
        assert_eq!(filters.equipment.get("EQ3").map(String::as_str), Some("1001000000"));
    }

    #[test]
    fn defaults_are_not_restrictive() {
        assert!(!FilterSet::default().is_restrictive());
        assert!(!parse(json!({ "brands": [""], "model": "", "price_max": 100000 })).is_restrictive());
    }

    #[test]
    fn each_real_dimension_is_restrictive() {
        assert!(parse(json!({ "brands": ["Audi"] })).is_restrictive());
        assert!(parse(json!({ "model": "Golf" })).is_restrictive());
        assert!(parse(json!({ "bucket_min": 3, "bucket_max": 1000 })).is_restrictive());
        assert!(parse(json!({ "price_max": 25000 })).is_restrictive());
        assert!(parse(json!({ "price_min": 5000 })).is_restrictive());
    }
}
