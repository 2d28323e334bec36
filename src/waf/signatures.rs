use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WafType {
    Cloudflare,
    AwsWaf,
    Akamai,
    Imperva,
    Sucuri,
    F5BigIP,
    Barracuda,
    Fortiweb,
    ModSecurity,
    AzureFrontDoor,
    Fastly,
    Wordfence,
    Wallarm,
    Unknown(String),
}

impl WafType {
    pub fn name(&self) -> &str {
        match self {
            WafType::Cloudflare => "Cloudflare",
            WafType::AwsWaf => "AWS WAF",
            WafType::Akamai => "Akamai",
            WafType::Imperva => "Imperva",
            WafType::Sucuri => "Sucuri",
            WafType::F5BigIP => "F5 BIG-IP",
            WafType::Barracuda => "Barracuda",
            WafType::Fortiweb => "FortiWeb",
            WafType::ModSecurity => "ModSecurity",
            WafType::AzureFrontDoor => "Azure Front Door",
            WafType::Fastly => "Fastly",
            WafType::Wordfence => "Wordfence",
            WafType::Wallarm => "Wallarm",
            WafType::Unknown(name) => name,
        }
    }

    /// Lenient name lookup; accepts the canonical names plus common aliases.
    pub fn from_name(name: &str) -> WafType {
        let lower = name.trim().to_ascii_lowercase();
        let known = [
            ("cloudflare", WafType::Cloudflare),
            ("aws", WafType::AwsWaf),
            ("cloudfront", WafType::AwsWaf),
            ("akamai", WafType::Akamai),
            ("imperva", WafType::Imperva),
            ("incapsula", WafType::Imperva),
            ("sucuri", WafType::Sucuri),
            ("big-ip", WafType::F5BigIP),
            ("bigip", WafType::F5BigIP),
            ("f5", WafType::F5BigIP),
            ("barracuda", WafType::Barracuda),
            ("fortiweb", WafType::Fortiweb),
            ("fortinet", WafType::Fortiweb),
            ("modsecurity", WafType::ModSecurity),
            ("azure", WafType::AzureFrontDoor),
            ("fastly", WafType::Fastly),
            ("wordfence", WafType::Wordfence),
            ("wallarm", WafType::Wallarm),
        ];
        known
            .into_iter()
            .find(|(alias, _)| lower.contains(alias))
            .map(|(_, waf)| waf)
            .unwrap_or_else(|| WafType::Unknown(name.trim().to_string()))
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, WafType::Unknown(_))
    }
}

/// How a signature header value is matched
#[derive(Debug, Clone)]
pub enum HeaderMatcher {
    /// Header presence alone is evidence
    Any,
    /// Case-insensitive substring
    Contains(&'static str),
    Pattern(Regex),
}

impl HeaderMatcher {
    pub fn matches(&self, value: &str) -> bool {
        match self {
            HeaderMatcher::Any => true,
            HeaderMatcher::Contains(needle) => value.to_ascii_lowercase().contains(&needle.to_ascii_lowercase()),
            HeaderMatcher::Pattern(re) => re.is_match(value),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Signature {
    pub waf_type: WafType,
    pub headers: Vec<(&'static str, HeaderMatcher)>,
    pub status_codes: Vec<u16>,
    pub body_patterns: Vec<Regex>,
    pub cookies: Vec<&'static str>,
}

/// Fixed vendor signature table, compiled once per process
pub static SIGNATURES: Lazy<Vec<Signature>> = Lazy::new(load_signatures);

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static signature pattern must compile")
}

pub fn load_signatures() -> Vec<Signature> {
    use HeaderMatcher::{Any, Contains, Pattern};

    vec![
        Signature {
            waf_type: WafType::Cloudflare,
            headers: vec![
                ("cf-ray", Pattern(re(r"^[0-9a-fA-F]+(-[A-Z]{3})?$"))),
                ("server", Contains("cloudflare")),
                ("cf-cache-status", Any),
                ("cf-mitigated", Any),
            ],
            status_codes: vec![403, 429, 503, 520, 521, 522],
            body_patterns: vec![
                re(r"(?i)attention required!.{0,40}cloudflare"),
                re(r"(?i)cloudflare ray id"),
                re(r"(?i)cf-error-details"),
            ],
            cookies: vec!["__cfduid", "cf_clearance", "__cf_bm"],
        },
        Signature {
            waf_type: WafType::AwsWaf,
            headers: vec![
                ("x-amzn-requestid", Any),
                ("x-amz-cf-id", Any),
                ("x-amz-cf-pop", Any),
                ("server", Pattern(re(r"(?i)^(awselb|amazons3|cloudfront)"))),
                ("via", Contains("cloudfront")),
            ],
            status_codes: vec![403],
            body_patterns: vec![re(r"(?i)request blocked.{0,80}cloudfront"), re(r"(?i)aws ?waf")],
            cookies: vec!["awsalb", "awsalbcors", "aws-waf-token"],
        },
        Signature {
            waf_type: WafType::Akamai,
            headers: vec![
                ("server", Contains("akamaighost")),
                ("x-akamai-request-id", Any),
                ("akamai-grn", Any),
                ("x-akamai-transformed", Any),
            ],
            status_codes: vec![403],
            body_patterns: vec![re(r"(?i)reference\s*#\d+\.[0-9a-f]+"), re(r"(?i)access denied.{0,200}akamai")],
            cookies: vec!["ak_bmsc", "bm_sz", "_abck"],
        },
        Signature {
            waf_type: WafType::Imperva,
            headers: vec![
                ("x-iinfo", Any),
                ("x-cdn", Contains("incapsula")),
            ],
            status_codes: vec![403],
            body_patterns: vec![re(r"(?i)incapsula incident id"), re(r"(?i)_incapsula_resource")],
            cookies: vec!["incap_ses", "visid_incap", "nlbi_"],
        },
        Signature {
            waf_type: WafType::Sucuri,
            headers: vec![
                ("server", Contains("sucuri")),
                ("x-sucuri-id", Any),
                ("x-sucuri-cache", Any),
            ],
            status_codes: vec![403],
            body_patterns: vec![re(r"(?i)sucuri website firewall"), re(r"(?i)cloudproxy\.sucuri")],
            cookies: vec!["sucuri_cloudproxy"],
        },
        Signature {
            waf_type: WafType::F5BigIP,
            headers: vec![
                ("server", Pattern(re(r"(?i)big-?ip"))),
                ("x-wa-info", Any),
                ("x-cnection", Any),
            ],
            status_codes: vec![403, 501],
            body_patterns: vec![re(r"(?i)the requested url was rejected\. please consult with your administrator")],
            cookies: vec!["BIGipServer", "TS01", "F5_ST"],
        },
        Signature {
            waf_type: WafType::Barracuda,
            headers: vec![("server", Contains("barracuda")), ("x-barracuda-url", Any)],
            status_codes: vec![403],
            body_patterns: vec![re(r"(?i)barracuda networks"), re(r"(?i)you have been blocked by barracuda")],
            cookies: vec!["barra_counter_session", "BNI__BARRACUDA_LB_COOKIE"],
        },
        Signature {
            waf_type: WafType::Fortiweb,
            headers: vec![("server", Contains("fortiweb")), ("x-fortiweb-id", Any)],
            status_codes: vec![403],
            body_patterns: vec![re(r"(?i)fortigate application control"), re(r"(?i)\.fgd_icon")],
            cookies: vec!["FORTIWAFSID"],
        },
        Signature {
            waf_type: WafType::ModSecurity,
            headers: vec![("server", Pattern(re(r"(?i)mod_security|modsecurity|nyob")))],
            status_codes: vec![403, 406, 501],
            body_patterns: vec![
                re(r"(?i)mod_security"),
                re(r"(?i)this error was generated by mod_security"),
                re(r"(?i)not acceptable!.{0,80}appropriate representation"),
            ],
            cookies: vec![],
        },
        Signature {
            waf_type: WafType::AzureFrontDoor,
            headers: vec![("x-azure-ref", Any), ("x-msedge-ref", Any), ("x-fd-healthprobe", Any)],
            status_codes: vec![403],
            body_patterns: vec![re(r"(?i)the request is blocked\.")],
            cookies: vec!["ASLBSA", "ASLBSACORS"],
        },
        Signature {
            waf_type: WafType::Fastly,
            headers: vec![
                ("x-fastly-request-id", Any),
                ("fastly-io-info", Any),
                ("x-served-by", Pattern(re(r"(?i)^cache-"))),
            ],
            status_codes: vec![403, 406],
            body_patterns: vec![re(r"(?i)fastly error: unknown domain")],
            cookies: vec![],
        },
        Signature {
            waf_type: WafType::Wordfence,
            headers: vec![],
            status_codes: vec![403, 503],
            body_patterns: vec![
                re(r"(?i)generated by wordfence"),
                re(r"(?i)your access to this site has been limited"),
            ],
            cookies: vec!["wfvt_", "wordfence_verifiedHuman"],
        },
        Signature {
            waf_type: WafType::Wallarm,
            headers: vec![("server", Contains("nginx-wallarm")), ("x-wallarm-node", Any)],
            status_codes: vec![403],
            body_patterns: vec![re(r"(?i)wallarm")],
            cookies: vec![],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_table_compiles() {
        assert!(SIGNATURES.len() >= 10);
        assert_eq!(SIGNATURES[0].waf_type, WafType::Cloudflare);
    }

    #[test]
    fn test_from_name_aliases() {
        assert_eq!(WafType::from_name("Cloudflare"), WafType::Cloudflare);
        assert_eq!(WafType::from_name("Imperva Incapsula"), WafType::Imperva);
        assert_eq!(WafType::from_name("aws waf"), WafType::AwsWaf);
        assert_eq!(WafType::from_name("Acme Shield"), WafType::Unknown("Acme Shield".to_string()));
        for sig in SIGNATURES.iter() {
            assert_eq!(WafType::from_name(sig.waf_type.name()), sig.waf_type);
        }
    }

    #[test]
    fn test_cf_ray_pattern() {
        let (_, matcher) = &SIGNATURES[0].headers[0];
        assert!(matcher.matches("abcdef1-SJC"));
        assert!(!matcher.matches("not a ray"));
    }
}
