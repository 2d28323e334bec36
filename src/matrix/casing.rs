use rand::Rng;
use sha2::{Digest, Sha256};

/// Flip the case of roughly half the alphabetic characters
pub fn randomize_case<R: Rng + ?Sized>(input: &str, rng: &mut R) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_ascii_alphabetic() && rng.gen_bool(0.5) {
                if c.is_ascii_uppercase() {
                    c.to_ascii_lowercase()
                } else {
                    c.to_ascii_uppercase()
                }
            } else {
                c
            }
        })
        .collect()
}

/// Randomize only the authority part of a URL; path and query are left alone
pub fn randomize_host_case<R: Rng + ?Sized>(url: &str, rng: &mut R) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let host_start = scheme_end + 3;
    let rest = &url[host_start..];
    let host_end = host_start + rest.find(|c: char| c == '/' || c == '?' || c == '#').unwrap_or(rest.len());
    format!("{}{}{}", &url[..host_start], randomize_case(&url[host_start..host_end], rng), &url[host_end..])
}

/// Stable seed for a target so repeated paginated builds randomize identically
pub fn seed_for_target(url: &str, salt: Option<u64>) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    if let Some(salt) = salt {
        hasher.update(salt.to_le_bytes());
    }
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_randomize_case_preserves_letters() {
        let mut rng = StdRng::seed_from_u64(7);
        let input = "<script>alert(1)</script>";
        let out = randomize_case(input, &mut rng);
        assert_eq!(out.to_ascii_lowercase(), input);
        assert_ne!(out, input);
    }

    #[test]
    fn test_same_seed_same_output() {
        let a = randomize_case("union select password from users", &mut StdRng::seed_from_u64(42));
        let b = randomize_case("union select password from users", &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_host_only() {
        let mut rng = StdRng::seed_from_u64(1);
        let out = randomize_host_case("https://example.com/path/Keep?x=abc", &mut rng);
        assert!(out.starts_with("https://"));
        assert!(out.ends_with("/path/Keep?x=abc"));
        assert_eq!(out.to_ascii_lowercase(), "https://example.com/path/keep?x=abc");
    }

    #[test]
    fn test_seed_is_stable_per_target() {
        assert_eq!(seed_for_target("http://a.test", None), seed_for_target("http://a.test", None));
        assert_ne!(seed_for_target("http://a.test", None), seed_for_target("http://b.test", None));
        assert_ne!(seed_for_target("http://a.test", Some(1)), seed_for_target("http://a.test", None));
    }
}
