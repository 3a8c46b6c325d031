//! Heuristic query expansion
//!
//! Pure-function fallback used when LLM augmentation is unavailable:
//! domain synonym substitution, structural rewriting, and contextual
//! suffixing. No I/O, no external calls.

/// Domain term -> alternatives table. Multi-word terms come first so
/// they win over their substrings; the first matching term is replaced
/// once.
const DOMAIN_SYNONYMS: &[(&str, &[&str])] = &[
    // Leave / time off
    ("leave request", &["time off request", "vacation application"]),
    ("leave", &["time off", "vacation", "PTO", "days off", "absence request"]),
    ("vacation", &["leave", "time off", "days off", "paid leave"]),
    ("pto", &["paid time off", "leave", "vacation days"]),
    // Benefits
    ("health insurance", &["medical plan", "health coverage", "insurance benefits"]),
    ("benefits", &["compensation package", "perks", "employee benefits", "entitlements"]),
    ("salary", &["compensation", "pay", "earnings", "remuneration"]),
    ("insurance", &["health coverage", "medical plan", "health insurance"]),
    // Policies
    ("policy", &["procedure", "guidelines", "rules", "standards", "process"]),
    ("process", &["procedure", "workflow", "steps", "instructions"]),
    ("guidelines", &["standards", "rules", "policy", "procedures"]),
    // Onboarding
    ("new employee", &["onboarding", "new hire", "employee setup"]),
    ("onboarding", &["employee setup", "induction", "orientation", "getting started"]),
    ("hiring", &["recruitment", "employment", "staff acquisition"]),
    // Common question stems
    ("how do i", &["what's the process for", "steps to", "guide for"]),
    ("can i", &["am i able to", "is it possible to", "what's the process for"]),
    ("what is", &["explain", "tell me about", "describe"]),
];

/// Generic qualifiers appended when the other strategies come up short
const CONTEXT_TERMS: &[&str] = &["employee", "company policy", "guidelines", "procedure"];

/// Produce up to `n` alternate phrasings of `query`
pub fn expand_query(query: &str, n: usize) -> Vec<String> {
    let mut augmented: Vec<String> = Vec::new();
    if query.trim().is_empty() || n == 0 {
        return augmented;
    }

    let query_lower = query.to_lowercase();

    // Strategy 1: domain synonym substitution
    for (term, synonyms) in DOMAIN_SYNONYMS {
        if augmented.len() >= n {
            break;
        }
        if !query_lower.contains(term) {
            continue;
        }
        for synonym in *synonyms {
            if let Some(candidate) = replace_once_ci(query, term, synonym) {
                if candidate != query && !augmented.contains(&candidate) {
                    augmented.push(candidate);
                    break;
                }
            }
        }
    }

    // Strategy 2: structural rewriting
    if augmented.len() < n {
        if let Some(rest) = strip_any_prefix(query, &["How do I ", "How to ", "How "]) {
            let candidate = format!("{} procedure and guidelines", rest.trim_end_matches('?'));
            if candidate != query && !augmented.contains(&candidate) {
                augmented.push(candidate);
            }
        } else if let Some(rest) = strip_any_prefix(query, &["What is ", "What are ", "What "]) {
            let candidate = format!("Tell me about {}", rest.trim_end_matches('?'));
            if candidate != query && !augmented.contains(&candidate) {
                augmented.push(candidate);
            }
        }
    }

    // Strategy 3: contextual suffixing
    if augmented.len() < n {
        for term in CONTEXT_TERMS {
            if augmented.len() >= n {
                break;
            }
            if !query_lower.contains(term) {
                let candidate = format!("{} for {}", query, term);
                if !augmented.contains(&candidate) {
                    augmented.push(candidate);
                }
            }
        }
    }

    augmented.truncate(n);
    augmented
}

fn strip_any_prefix<'a>(query: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    prefixes.iter().find_map(|p| query.strip_prefix(p))
}

/// Replace the first case-insensitive occurrence of `term` in `query`
fn replace_once_ci(query: &str, term: &str, replacement: &str) -> Option<String> {
    let lower = query.to_lowercase();
    // Lowercasing can change byte lengths outside ASCII; only splice
    // when the offsets line up
    if lower.len() != query.len() {
        let pos = query.find(term)?;
        return Some(splice(query, pos, term.len(), replacement));
    }
    let pos = lower.find(term)?;
    if !query.is_char_boundary(pos) || !query.is_char_boundary(pos + term.len()) {
        return None;
    }
    Some(splice(query, pos, term.len(), replacement))
}

fn splice(query: &str, pos: usize, len: usize, replacement: &str) -> String {
    let mut out = String::with_capacity(query.len() + replacement.len());
    out.push_str(&query[..pos]);
    out.push_str(replacement);
    out.push_str(&query[pos + len..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synonym_substitution() {
        let expanded = expand_query("How do I request leave?", 2);
        assert_eq!(expanded.len(), 2);
        // "leave" gets replaced by its first synonym
        assert!(expanded.iter().any(|q| q.contains("time off")));
    }

    #[test]
    fn test_multi_word_term_wins_over_substring() {
        let expanded = expand_query("Where do I submit a leave request form?", 1);
        assert_eq!(expanded, vec![
            "Where do I submit a time off request form?".to_string()
        ]);
    }

    #[test]
    fn test_synonym_covers_what_is_stem() {
        // "what is" is itself a synonym-table term, so it is handled by
        // substitution before the structural rewrite gets a chance
        let expanded = expand_query("What is zanthropy?", 1);
        assert_eq!(expanded, vec!["explain zanthropy?".to_string()]);
    }

    #[test]
    fn test_structural_rewrite_what() {
        let expanded = expand_query("What happens during offboarding?", 1);
        assert_eq!(expanded, vec![
            "Tell me about happens during offboarding".to_string()
        ]);
    }

    #[test]
    fn test_structural_rewrite_how() {
        let expanded = expand_query("How to claim zanthropy?", 1);
        assert_eq!(expanded, vec![
            "claim zanthropy procedure and guidelines".to_string()
        ]);
    }

    #[test]
    fn test_contextual_suffix_when_nothing_matches() {
        let expanded = expand_query("xylophone maintenance", 2);
        assert_eq!(expanded.len(), 2);
        assert!(expanded[0].ends_with("for employee"));
    }

    #[test]
    fn test_case_insensitive_replacement() {
        let expanded = expand_query("LEAVE policy overview", 1);
        assert!(!expanded.is_empty());
        assert_ne!(expanded[0], "LEAVE policy overview");
    }

    #[test]
    fn test_empty_query() {
        assert!(expand_query("", 3).is_empty());
        assert!(expand_query("   ", 3).is_empty());
    }

    #[test]
    fn test_never_exceeds_n() {
        let expanded = expand_query("How do I request leave for vacation benefits?", 3);
        assert!(expanded.len() <= 3);
    }

    #[test]
    fn test_no_duplicates() {
        let expanded = expand_query("What is the leave policy?", 4);
        let mut unique = expanded.clone();
        unique.dedup();
        assert_eq!(expanded, unique);
    }
}
