use lazy_static::lazy_static;
use regex::Regex;

use crate::extract::types::{BillingCycle, Candidate, Category};
use crate::mailbox::EmailRecord;

/// Confidence assigned to every rule-table match.
const PATTERN_CONFIDENCE: f64 = 0.7;

/// One entry of the ordered rule table. Earlier rules take priority.
pub struct ServiceRule {
    pub pattern: Regex,
    pub name: &'static str,
    pub category: Category,
}

fn rule(pattern: &str, name: &'static str, category: Category) -> ServiceRule {
    ServiceRule {
        pattern: Regex::new(pattern).unwrap(),
        name,
        category,
    }
}

lazy_static! {
    static ref SERVICE_RULES: Vec<ServiceRule> = vec![
        rule(r"(?i)Netflix", "Netflix", Category::Streaming),
        rule(r"(?i)YouTube\s*Premium", "YouTube Premium", Category::Streaming),
        rule(r"(?i)Spotify", "Spotify", Category::Music),
        rule(r"(?i)Apple\s*(Music|One|TV|Arcade|iCloud)", "Apple", Category::Streaming),
        rule(r"(?i)Disney\+|Disney\s*Plus", "Disney+", Category::Streaming),
        rule(r"(?i)ChatGPT|OpenAI", "ChatGPT Plus", Category::Ai),
        rule(r"(?i)Claude|Anthropic", "Claude Pro", Category::Ai),
        rule(r"(?i)Notion", "Notion", Category::Productivity),
        rule(r"(?i)Figma", "Figma", Category::Design),
        rule(r"(?i)GitHub", "GitHub", Category::Developer),
        rule(r"(?i)Adobe", "Adobe CC", Category::Design),
        rule(r"(?i)Microsoft\s*365|Office\s*365", "Microsoft 365", Category::Productivity),
        rule(r"(?i)Google\s*One", "Google One", Category::Cloud),
        rule(r"쿠팡\s*(플레이|로켓와우|와우)", "쿠팡", Category::Membership),
        rule(r"(?i)네이버\s*플러스|NAVER\s*Plus", "네이버 플러스 멤버십", Category::Membership),
        rule(r"(?i)멜론|Melon", "멜론", Category::Music),
        rule(r"(?i)티빙|TVING", "TVING", Category::Streaming),
        rule(r"(?i)웨이브|wavve", "웨이브", Category::Streaming),
        rule(r"밀리", "밀리의 서재", Category::Reading),
        rule(r"(?i)리디|RIDI", "RIDI Select", Category::Reading),
        rule(r"(?i)Slack", "Slack", Category::Productivity),
    ];

    /// Three shapes of money in one regex: won-prefixed, dollar-prefixed
    /// (converted at the configured rate), and won-suffixed.
    static ref AMOUNT_RE: Regex =
        Regex::new(r"(?:₩|원|KRW)\s*([\d,]+)|(?:\$|USD)\s*([\d.]+)|([\d,]+)\s*(?:원|₩)").unwrap();
}

/// Deterministic fallback used when the generative backend is unavailable
/// or its output cannot be parsed. One candidate per email at most; the
/// first matching rule wins.
pub fn detect(emails: &[EmailRecord], usd_krw_rate: f64) -> Vec<Candidate> {
    let mut found = Vec::new();
    for email in emails {
        let haystack = format!(
            "{} {} {} {}",
            email.subject, email.from, email.snippet, email.body
        );
        for rule in SERVICE_RULES.iter() {
            if rule.pattern.is_match(&haystack) {
                let (amount, currency) = parse_amount(&haystack, usd_krw_rate);
                found.push(Candidate {
                    service_name: rule.name.to_string(),
                    amount,
                    currency,
                    billing_cycle: BillingCycle::Monthly,
                    billing_day: None,
                    category: rule.category,
                    confidence: PATTERN_CONFIDENCE,
                    email_id: Some(email.id.clone()),
                    sender: Some(email.from.clone()),
                });
                break; // one match per email
            }
        }
    }
    found
}

/// First monetary amount in `text`, with the currency it was quoted in.
/// Dollar amounts are converted to won at `usd_krw_rate`. No match means 0.
pub(crate) fn parse_amount(text: &str, usd_krw_rate: f64) -> (i64, String) {
    let Some(caps) = AMOUNT_RE.captures(text) else {
        return (0, "KRW".into());
    };
    if let Some(m) = caps.get(1) {
        (parse_grouped(m.as_str()), "KRW".into())
    } else if let Some(m) = caps.get(2) {
        let usd: f64 = m.as_str().parse().unwrap_or(0.0);
        ((usd * usd_krw_rate).round() as i64, "USD".into())
    } else if let Some(m) = caps.get(3) {
        (parse_grouped(m.as_str()), "KRW".into())
    } else {
        (0, "KRW".into())
    }
}

fn parse_grouped(s: &str) -> i64 {
    s.replace(',', "").parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(id: &str, subject: &str, from: &str, body: &str) -> EmailRecord {
        EmailRecord {
            id: id.into(),
            subject: subject.into(),
            from: from.into(),
            to: String::new(),
            date: String::new(),
            body: body.into(),
            snippet: String::new(),
        }
    }

    #[test]
    fn netflix_email_yields_single_streaming_candidate() {
        let emails = vec![email(
            "m1",
            "Netflix 결제 완료",
            "info@account.netflix.com",
            "이번 달 멤버십 요금 ₩17,000 이 결제되었습니다.",
        )];
        let found = detect(&emails, 1400.0);
        assert_eq!(found.len(), 1);
        let c = &found[0];
        assert_eq!(c.service_name, "Netflix");
        assert_eq!(c.category, Category::Streaming);
        assert_eq!(c.confidence, 0.7);
        assert_eq!(c.amount, 17_000);
        assert_eq!(c.currency, "KRW");
        assert_eq!(c.billing_cycle, BillingCycle::Monthly);
        assert_eq!(c.billing_day, None);
        assert_eq!(c.email_id.as_deref(), Some("m1"));
    }

    #[test]
    fn first_rule_wins_when_multiple_services_match() {
        let emails = vec![email(
            "m2",
            "Your receipts",
            "billing@example.com",
            "Spotify and Netflix charges this month",
        )];
        let found = detect(&emails, 1400.0);
        // Netflix sits above Spotify in the rule table.
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].service_name, "Netflix");
    }

    #[test]
    fn unknown_services_produce_nothing() {
        let emails = vec![email("m3", "영수증", "shop@example.com", "일반 결제 내역")];
        assert!(detect(&emails, 1400.0).is_empty());
    }

    #[test]
    fn korean_membership_rule_matches() {
        let emails = vec![email(
            "m4",
            "쿠팡 와우 멤버십 결제",
            "noreply@coupang.com",
            "4,990원 결제",
        )];
        let found = detect(&emails, 1400.0);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].service_name, "쿠팡");
        assert_eq!(found[0].category, Category::Membership);
    }

    #[test]
    fn amount_parses_won_prefixed() {
        assert_eq!(parse_amount("결제 금액 ₩17,000", 1400.0), (17_000, "KRW".into()));
        assert_eq!(parse_amount("KRW 5,500 charged", 1400.0), (5_500, "KRW".into()));
    }

    #[test]
    fn amount_parses_won_suffixed() {
        assert_eq!(parse_amount("이용료 10,900원 결제 완료", 1400.0), (10_900, "KRW".into()));
    }

    #[test]
    fn amount_converts_dollars_at_rate() {
        let (amount, currency) = parse_amount("charged $9.99 to your card", 1400.0);
        assert_eq!(currency, "USD");
        assert_eq!(amount, 13_986); // 9.99 * 1400, rounded
        let (amount, _) = parse_amount("USD 20", 1350.0);
        assert_eq!(amount, 27_000);
    }

    #[test]
    fn amount_defaults_to_zero() {
        assert_eq!(parse_amount("no money mentioned here", 1400.0), (0, "KRW".into()));
    }
}
