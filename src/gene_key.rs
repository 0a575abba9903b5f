//! Gene-Identity Resolver Module
//!
//! Derives the coarse cross-source merge key (`mo`) from a free-text gene
//! field. The tools name the same gene differently:
//!
//! | Tool          | Label                                   |
//! |---------------|-----------------------------------------|
//! | AMRFinderPlus | `blaCTX-M-15`                           |
//! | ResFinder     | `blaCTX-M-15`                           |
//! | CARD-RGI      | `CTX-M-15`, `Escherichia coli ampC ...` |
//!
//! Extraction runs as an ordered chain, most specific first; the first
//! extractor that yields a token wins. The surviving token then loses its
//! allele number and is lowercased, so `blaCTX-M-15` and `CTX-M-15` both
//! resolve to `ctx-m`.

use std::sync::LazyLock;

use regex::Regex;

/// A single extraction heuristic.
pub type KeyExtractor = fn(&str) -> Option<String>;

/// Extractors in priority order.
pub const EXTRACTORS: [KeyExtractor; 3] = [bracketed_symbol, binomial_symbol, trimmed_label];

static BRACKETED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z][a-z]+ [a-z]+\s+[(\[](?:bla)?([A-Za-z0-9._'-]+)[)\]]")
        .expect("bracketed symbol pattern")
});

static BINOMIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z][a-z]* [a-z]* ([A-Za-z0-9-]+) .*").expect("binomial symbol pattern")
});

static DELTA_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"delta[0-9]*$").expect("delta suffix pattern"));

static ALLELE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9.-]+$").expect("allele suffix pattern"));

/// `Escherichia coli (blaTEM-1) partial` → `TEM-1`.
pub fn bracketed_symbol(label: &str) -> Option<String> {
    BRACKETED
        .captures(label.trim())
        .map(|c| c[1].to_string())
}

/// `Escherichia coli ampC beta-lactamase` → `ampC`.
pub fn binomial_symbol(label: &str) -> Option<String> {
    BINOMIAL
        .captures(label.trim())
        .map(|c| c[1].to_string())
}

/// `blaOXA-48` → `OXA-48`, `ompK36delta123` → `ompK36`.
pub fn trimmed_label(label: &str) -> Option<String> {
    let trimmed = label.trim().replace("bla", "");
    let trimmed = DELTA_SUFFIX.replace(&trimmed, "");
    (!trimmed.is_empty()).then(|| trimmed.into_owned())
}

/// Removes a trailing allele number (`-15`, `1`, `-1.1`).
pub fn strip_allele(token: &str) -> &str {
    match ALLELE_SUFFIX.find(token) {
        Some(m) => &token[..m.start()],
        None => token,
    }
}

/// Resolves the merge key for a raw gene field.
///
/// Never fails: when every stage leaves nothing behind, the raw label
/// lowercased is used so the record still merges on something.
pub fn resolve_gene_key(label: &str) -> String {
    let token = EXTRACTORS.iter().find_map(|extract| extract(label));
    let key = token
        .as_deref()
        .map(strip_allele)
        .map(str::to_lowercase)
        .unwrap_or_default();

    if key.is_empty() {
        label.trim().to_lowercase()
    } else {
        key
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bracketed_symbol_wins() {
        assert_eq!(resolve_gene_key("Escherichia coli (blaTEM-1) partial"), "tem");
        assert_eq!(bracketed_symbol("Escherichia coli (blaTEM-1) partial").as_deref(), Some("TEM-1"));
        assert_eq!(resolve_gene_key("Klebsiella pneumoniae [OmpK36] porin"), "ompk");
    }

    #[test]
    fn test_bla_strip_and_allele() {
        assert_eq!(resolve_gene_key("blaCTX-M-15"), "ctx-m");
        assert_eq!(resolve_gene_key("CTX-M-15"), "ctx-m");
        assert_eq!(resolve_gene_key("blaOXA-48"), "oxa");
        assert_eq!(resolve_gene_key("TEM-1"), "tem");
    }

    #[test]
    fn test_binomial_prefix() {
        assert_eq!(resolve_gene_key("Escherichia coli ampC beta-lactamase"), "ampc");
        assert_eq!(
            resolve_gene_key("Escherichia coli gyrA conferring resistance to fluoroquinolones"),
            "gyra"
        );
    }

    #[test]
    fn test_bracket_requires_binomial_prefix() {
        // tet(M) is a gene symbol, not a description.
        assert_eq!(bracketed_symbol("tet(M)"), None);
        assert_eq!(resolve_gene_key("tet(M)"), "tet(m)");
    }

    #[test]
    fn test_delta_suffix() {
        assert_eq!(resolve_gene_key("ompK36delta123"), "ompk");
        assert_eq!(resolve_gene_key("mgrBdelta"), "mgrb");
    }

    #[test]
    fn test_point_mutation_labels_survive() {
        assert_eq!(resolve_gene_key("gyra_s83l"), "gyra_s83l");
        assert_eq!(resolve_gene_key("23s_a2058g"), "23s_a2058g");
    }

    #[test]
    fn test_unresolvable_falls_back_to_raw() {
        assert_eq!(resolve_gene_key("16"), "16");
        assert_eq!(resolve_gene_key("bla"), "bla");
    }

    #[test]
    fn test_keys_lowercase_without_allele_suffix() {
        let labels = [
            "blaCTX-M-15",
            "aac(6')-Ib-cr5",
            "sul1",
            "qnrS1",
            "Escherichia coli (blaTEM-1) partial",
            "Escherichia coli ampC1 beta-lactamase",
            "dfrA17-2",
            "ab1-2",
            "mcr-1.1",
        ];
        for label in labels {
            let key = resolve_gene_key(label);
            assert_eq!(key, key.to_lowercase(), "{}", label);
            assert!(
                !key.ends_with(|c: char| c.is_ascii_digit() || c == '-'),
                "{} -> {}",
                label,
                key
            );
        }
    }
}
