use ahash::AHashSet;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::casing::{randomize_case, randomize_host_case};
use super::template::{merge_headers, parse_header_block, render_custom_headers};
use crate::config::ScanConfig;
use crate::error::Result;
use crate::payload::{CheckType, ManipulationMode, PayloadSource, VariationGateway};
use crate::utils::parse_target_url;
use crate::waf::WafType;

/// Which variation generator feeds the matrix, resolved once per build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariationStrategy {
    UseVendorVariants(WafType),
    UseGenericEncoding,
    UseOriginalOnly,
}

impl VariationStrategy {
    /// An explicit vendor beats a detected one; either beats generic encoding
    pub fn resolve(config: &ScanConfig, detected_vendor: Option<&str>) -> Self {
        let vendor = config
            .waf_type
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or(detected_vendor);
        match vendor {
            Some(name) => VariationStrategy::UseVendorVariants(WafType::from_name(name)),
            None if config.use_encoding_variations => VariationStrategy::UseGenericEncoding,
            None => VariationStrategy::UseOriginalOnly,
        }
    }

    /// Index 0 is always the original payload
    pub fn variants(&self, gateway: &dyn VariationGateway, payload: &str, category: &str) -> Vec<String> {
        match self {
            VariationStrategy::UseVendorVariants(waf) => gateway.vendor_variants(waf, payload),
            VariationStrategy::UseGenericEncoding => gateway.encoded_variants(payload, category),
            VariationStrategy::UseOriginalOnly => vec![payload.to_string()],
        }
    }
}

/// One concrete probe to execute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRequestSpec {
    pub category: String,
    pub payload: String,
    pub method: String,
    pub target_url: String,
    pub headers: Vec<(String, String)>,
    pub check_type: CheckType,
    /// 0 is the unmodified payload
    pub variant_index: usize,
}

/// Expands config x payloads x variations x methods into an ordered request list
pub struct MatrixBuilder<'a> {
    config: &'a ScanConfig,
    source: &'a PayloadSource,
    gateway: &'a dyn VariationGateway,
    strategy: VariationStrategy,
}

impl<'a> MatrixBuilder<'a> {
    pub fn new(
        config: &'a ScanConfig,
        source: &'a PayloadSource,
        gateway: &'a dyn VariationGateway,
        strategy: VariationStrategy,
    ) -> Self {
        Self { config, source, gateway, strategy }
    }

    pub fn strategy(&self) -> &VariationStrategy {
        &self.strategy
    }

    /// Build the full matrix. `rng` is only consulted in case-sensitivity mode.
    pub fn build<R: Rng + ?Sized>(&self, target_url: &str, rng: &mut R) -> Result<Vec<TestRequestSpec>> {
        parse_target_url(target_url)?;
        self.config.validate()?;

        let methods = self.config.normalized_methods();
        let get_only = vec!["GET".to_string()];
        let names: Vec<String> = match &self.config.categories {
            Some(list) if !list.is_empty() => list.clone(),
            _ => self.source.names().map(str::to_string).collect(),
        };

        let mut seen: AHashSet<(String, String, String, CheckType)> = AHashSet::new();
        let mut specs = Vec::new();

        for name in &names {
            let Some(category) = self.source.get(name) else {
                tracing::warn!("unknown payload category: {}", name);
                continue;
            };
            let check_type = category.check_type;
            let category_methods = if check_type == CheckType::FileCheck { &get_only } else { &methods };

            for payload in category.active_payloads(self.config.false_positive_test) {
                for (variant_index, variant) in self.variants_for(name, check_type, payload).into_iter().enumerate() {
                    for method in category_methods {
                        let (url, payload) = if self.config.case_sensitive_test {
                            (randomize_host_case(target_url, rng), randomize_case(&variant, rng))
                        } else {
                            (target_url.to_string(), variant.clone())
                        };

                        if !seen.insert((name.clone(), payload.clone(), method.clone(), check_type)) {
                            continue;
                        }

                        let mut headers = match check_type {
                            CheckType::Header => parse_header_block(&payload),
                            _ => Vec::new(),
                        };
                        if let Some(block) = &self.config.custom_headers {
                            merge_headers(&mut headers, render_custom_headers(block, &payload));
                        }

                        specs.push(TestRequestSpec {
                            category: name.clone(),
                            payload,
                            method: method.clone(),
                            target_url: url,
                            headers,
                            check_type,
                            variant_index,
                        });
                    }
                }
            }
        }

        tracing::debug!(strategy = ?self.strategy, size = specs.len(), "built test matrix for {}", target_url);
        Ok(specs)
    }

    fn variants_for(&self, category: &str, check_type: CheckType, payload: &str) -> Vec<String> {
        match check_type {
            CheckType::Header => header_block_variants(payload, |value| {
                self.strategy.variants(self.gateway, value, category)
            }),
            CheckType::ParamCheck if self.config.http_manipulation => {
                let mut out = self.strategy.variants(self.gateway, payload, category);
                for mode in [ManipulationMode::ParameterPollution, ManipulationMode::NullByte] {
                    for v in self.gateway.http_manipulation_variants(payload, mode) {
                        if !out.contains(&v) {
                            out.push(v);
                        }
                    }
                }
                out
            }
            _ => self.strategy.variants(self.gateway, payload, category),
        }
    }
}

/// Vary only header values so names stay parseable. Variant `i` uses each
/// value's `i`-th variation, or the original value when it has fewer.
fn header_block_variants<F>(block: &str, mut variants: F) -> Vec<String>
where
    F: FnMut(&str) -> Vec<String>,
{
    let lines = parse_header_block(block);
    if lines.is_empty() {
        return vec![block.to_string()];
    }
    let per_value: Vec<Vec<String>> = lines.iter().map(|(_, value)| variants(value)).collect();
    let count = per_value.iter().map(Vec::len).max().unwrap_or(1).max(1);

    (0..count)
        .map(|i| {
            if i == 0 {
                return block.to_string();
            }
            lines
                .iter()
                .zip(&per_value)
                .map(|((name, value), vs)| format!("{}: {}", name, vs.get(i).unwrap_or(value)))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect()
}
