use std::collections::HashMap;

use crate::extract::types::Candidate;

/// Collapse candidates that refer to the same service, keyed by trimmed,
/// lowercased service name. Candidates without a usable name are dropped.
///
/// The first candidate seen for a key is kept unless a later one has
/// strictly higher confidence, or the kept one has a zero amount and the
/// later one a nonzero amount. Output preserves first-seen key order.
pub fn dedupe(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut order: Vec<String> = Vec::new();
    let mut kept: HashMap<String, Candidate> = HashMap::new();

    for candidate in candidates {
        let key = candidate.service_name.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }
        let keep = match kept.get(&key) {
            None => {
                order.push(key.clone());
                true
            }
            Some(current) => {
                candidate.confidence > current.confidence
                    || (current.amount == 0 && candidate.amount > 0)
            }
        };
        if keep {
            kept.insert(key, candidate);
        }
    }

    order
        .into_iter()
        .filter_map(|key| kept.remove(&key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::types::{BillingCycle, Category};

    fn candidate(name: &str, amount: i64, confidence: f64) -> Candidate {
        Candidate {
            service_name: name.into(),
            amount,
            currency: "KRW".into(),
            billing_cycle: BillingCycle::Monthly,
            billing_day: None,
            category: Category::Other,
            confidence,
            email_id: None,
            sender: None,
        }
    }

    #[test]
    fn one_entry_per_name_case_insensitive() {
        let out = dedupe(vec![
            candidate("Netflix", 17_000, 0.9),
            candidate("netflix ", 17_000, 0.8),
            candidate("Spotify", 10_900, 0.9),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].service_name, "Netflix");
        assert_eq!(out[1].service_name, "Spotify");
    }

    #[test]
    fn nameless_candidates_are_dropped() {
        let out = dedupe(vec![candidate("  ", 5_000, 0.9), candidate("Notion", 0, 0.6)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].service_name, "Notion");
    }

    #[test]
    fn higher_confidence_replaces_earlier() {
        let out = dedupe(vec![
            candidate("Netflix", 17_000, 0.6),
            candidate("Netflix", 13_500, 0.9),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].amount, 13_500);
        assert_eq!(out[0].confidence, 0.9);
    }

    #[test]
    fn equal_confidence_keeps_first_seen() {
        let out = dedupe(vec![
            candidate("Netflix", 17_000, 0.7),
            candidate("Netflix", 13_500, 0.7),
        ]);
        assert_eq!(out[0].amount, 17_000);
    }

    #[test]
    fn nonzero_amount_replaces_zero_even_at_lower_confidence() {
        let out = dedupe(vec![
            candidate("Netflix", 0, 0.9),
            candidate("Netflix", 17_000, 0.5),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].amount, 17_000);
        assert_eq!(out[0].confidence, 0.5);
    }

    #[test]
    fn nonzero_amount_is_not_replaced_by_zero() {
        let out = dedupe(vec![
            candidate("Netflix", 17_000, 0.7),
            candidate("Netflix", 0, 0.7),
        ]);
        assert_eq!(out[0].amount, 17_000);
    }

    #[test]
    fn first_seen_order_is_preserved() {
        let out = dedupe(vec![
            candidate("Spotify", 1, 0.5),
            candidate("Netflix", 1, 0.5),
            candidate("spotify", 2, 0.9),
        ]);
        assert_eq!(out[0].service_name, "spotify");
        assert_eq!(out[1].service_name, "Netflix");
    }
}
