use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::data::{StaticCategory, ADVANCED, BASE};
use super::encoding;
use crate::config::ScanConfig;

/// Injection surface a category targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckType {
    #[default]
    ParamCheck,
    FileCheck,
    Header,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadCategory {
    #[serde(rename = "type", default)]
    pub check_type: CheckType,
    #[serde(default)]
    pub payloads: Vec<String>,
    /// Benign look-alikes used in false-positive mode
    #[serde(default)]
    pub false_payloads: Vec<String>,
}

impl PayloadCategory {
    pub fn new(check_type: CheckType, payloads: Vec<String>, false_payloads: Vec<String>) -> Self {
        Self { check_type, payloads, false_payloads }
    }

    fn from_static(cat: &StaticCategory) -> Self {
        Self::new(
            cat.check_type,
            cat.payloads.iter().map(|p| p.to_string()).collect(),
            cat.false_payloads.iter().map(|p| p.to_string()).collect(),
        )
    }

    /// Attack or benign list, depending on mode
    pub fn active_payloads(&self, false_positive_mode: bool) -> &[String] {
        if false_positive_mode {
            &self.false_payloads
        } else {
            &self.payloads
        }
    }

    /// Union another category's lists into this one, keeping first occurrences
    pub fn absorb(&mut self, other: PayloadCategory) {
        for p in other.payloads {
            if !self.payloads.contains(&p) {
                self.payloads.push(p);
            }
        }
        for p in other.false_payloads {
            if !self.false_payloads.contains(&p) {
                self.false_payloads.push(p);
            }
        }
    }
}

/// Category name -> payloads, mergeable with union-by-name semantics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadSource {
    categories: BTreeMap<String, PayloadCategory>,
}

impl PayloadSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base() -> Self {
        Self::from_static(BASE)
    }

    /// Base parameter payloads with precomputed URL, double-URL and unicode encodings
    pub fn enhanced() -> Self {
        let mut source = Self::new();
        for cat in BASE.iter().filter(|c| c.check_type == CheckType::ParamCheck) {
            let payloads = cat
                .payloads
                .iter()
                .flat_map(|p| [encoding::url_encode(p), encoding::double_url_encode(p), encoding::unicode_encode(p)])
                .collect();
            source.insert(cat.name, PayloadCategory::new(cat.check_type, payloads, Vec::new()));
        }
        source
    }

    pub fn advanced() -> Self {
        Self::from_static(ADVANCED)
    }

    /// Payload source for a scan configuration
    pub fn for_config(config: &ScanConfig) -> Self {
        let mut source = Self::base();
        if config.enhanced_payloads {
            source.merge(Self::enhanced());
        }
        if config.use_advanced_payloads {
            source.merge(Self::advanced());
        }
        if let Some(custom) = &config.custom_payloads {
            for (name, category) in custom {
                source.insert(name, category.clone());
            }
        }
        source
    }

    fn from_static(cats: &[StaticCategory]) -> Self {
        let mut source = Self::new();
        for cat in cats {
            source.insert(cat.name, PayloadCategory::from_static(cat));
        }
        source
    }

    /// Insert, unioning with an existing category of the same name.
    /// The existing category keeps its check type.
    pub fn insert(&mut self, name: &str, category: PayloadCategory) {
        match self.categories.get_mut(name) {
            Some(existing) => existing.absorb(category),
            None => {
                self.categories.insert(name.to_string(), category);
            }
        }
    }

    pub fn merge(&mut self, other: PayloadSource) {
        for (name, category) in other.categories {
            self.insert(&name, category);
        }
    }

    pub fn get(&self, name: &str) -> Option<&PayloadCategory> {
        self.categories.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PayloadCategory)> {
        self.categories.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_has_every_check_type() {
        let base = PayloadSource::base();
        assert_eq!(base.get("LFI").map(|c| c.check_type), Some(CheckType::FileCheck));
        assert_eq!(base.get("Header Injection").map(|c| c.check_type), Some(CheckType::Header));
        assert!(base.iter().all(|(_, c)| !c.payloads.is_empty() && !c.false_payloads.is_empty()));
    }

    #[test]
    fn test_merge_unions_by_name() {
        let mut source = PayloadSource::base();
        let before = source.get("XSS").map(|c| c.payloads.len()).unwrap_or(0);
        source.merge(PayloadSource::advanced());
        let xss = source.get("XSS").unwrap();
        assert!(xss.payloads.len() > before);
        assert_eq!(xss.payloads[0], "<script>alert(1)</script>");
        assert_eq!(source.len(), PayloadSource::base().len());
    }

    #[test]
    fn test_custom_categories_union_without_duplicates() {
        let mut custom = BTreeMap::new();
        custom.insert(
            "XSS".to_string(),
            PayloadCategory::new(CheckType::ParamCheck, vec!["<svg onload=alert(1)>".into(), "<marquee>".into()], vec![]),
        );
        custom.insert("Mine".to_string(), PayloadCategory::new(CheckType::ParamCheck, vec!["x".into()], vec![]));
        let config = ScanConfig { custom_payloads: Some(custom), ..ScanConfig::default() };
        let source = PayloadSource::for_config(&config);
        let xss = source.get("XSS").unwrap();
        assert_eq!(xss.payloads.iter().filter(|p| p.as_str() == "<svg onload=alert(1)>").count(), 1);
        assert!(xss.payloads.contains(&"<marquee>".to_string()));
        assert!(source.get("Mine").is_some());
    }

    #[test]
    fn test_category_json_shape() {
        let cat: PayloadCategory =
            serde_json::from_str(r#"{"type":"FileCheck","payloads":["a"],"falsePayloads":["b"]}"#).unwrap();
        assert_eq!(cat.check_type, CheckType::FileCheck);
        assert_eq!(cat.active_payloads(true), &["b".to_string()]);
    }
}
