use serde::Serialize;
use tracing::warn;

use crate::extract::patterns;
use crate::extract::types::{Candidate, RawCandidate};
use crate::genai::GenerativeClient;
use crate::mailbox::{truncate_chars, EmailRecord};

/// Emails per generative call; bounds prompt size and scopes failures.
const BATCH_SIZE: usize = 10;
/// Per-email body cap inside a batch prompt.
const BATCH_BODY_LIMIT: usize = 1500;
/// Statement text cap for the single-shot analysis call.
const STATEMENT_LIMIT: usize = 8000;

const EMAIL_PROMPT: &str = r#"당신은 이메일에서 디지털 구독 정보를 추출하는 전문 분석가입니다.

다음 이메일들을 분석하고, 각 이메일에서 발견된 구독/정기결제 정보를 JSON 배열로 반환하세요.

각 구독에 대해 다음 필드를 추출하세요:
- service_name: 서비스명 (한글 병기)
- amount: 결제 금액 (원 단위 숫자만)
- currency: 통화 코드 (KRW, USD 등)
- billing_cycle: 결제 주기 (monthly, yearly, weekly)
- billing_day: 결제일 (1-31, 알 수 없으면 null)
- category: 카테고리 (streaming, music, cloud, productivity, ai, design, developer, reading, membership, gaming, fitness, news, other)
- confidence: 이것이 실제 정기 구독인지 확신도 (0.0~1.0)
- email_id: 해당 이메일의 ID
- sender: 발신자 이메일

구독이 아닌 일반 결제 이메일은 제외하세요.
반드시 유효한 JSON 배열만 반환하세요. 다른 텍스트는 포함하지 마세요.

이메일 데이터:
"#;

const STATEMENT_PROMPT: &str = r#"당신은 카드 명세서에서 정기 구독 결제를 식별하는 전문 분석가입니다.

다음 카드 명세서 내용을 분석하고, 정기 구독으로 보이는 결제들을 JSON 배열로 반환하세요.

각 항목에 대해:
- service_name: 서비스명 (한글 병기)
- amount: 결제 금액 (원 단위 숫자만)
- currency: 통화 코드
- billing_cycle: 추정 결제 주기 (monthly, yearly, weekly)
- category: 카테고리
- confidence: 확신도 (0.0~1.0)

정기 구독이 아닌 일반 결제는 제외하세요.
반드시 유효한 JSON 배열만 반환하세요.

명세서 내용:
"#;

/// Serialized shape of one email inside a batch prompt.
#[derive(Serialize)]
struct BatchEmail<'a> {
    id: &'a str,
    subject: &'a str,
    from: &'a str,
    date: &'a str,
    snippet: &'a str,
    body: String,
}

/// Generative extraction over a fetched email set. Emails are processed in
/// batches; a batch whose call fails or whose output cannot be parsed
/// degrades to the pattern rules for that batch alone.
pub async fn analyze_emails(
    model: &dyn GenerativeClient,
    emails: &[EmailRecord],
    usd_krw_rate: f64,
) -> Vec<Candidate> {
    let mut results = Vec::new();
    for batch in emails.chunks(BATCH_SIZE) {
        match extract_batch(model, batch).await {
            Ok(mut candidates) => results.append(&mut candidates),
            Err(e) => {
                warn!(
                    error = %e,
                    batch_size = batch.len(),
                    "generative extraction failed, falling back to pattern rules for this batch"
                );
                results.extend(patterns::detect(batch, usd_krw_rate));
            }
        }
    }
    results
}

async fn extract_batch(
    model: &dyn GenerativeClient,
    batch: &[EmailRecord],
) -> anyhow::Result<Vec<Candidate>> {
    let payload: Vec<BatchEmail<'_>> = batch
        .iter()
        .map(|e| BatchEmail {
            id: &e.id,
            subject: &e.subject,
            from: &e.from,
            date: &e.date,
            snippet: &e.snippet,
            body: truncate_chars(&e.body, BATCH_BODY_LIMIT),
        })
        .collect();
    let prompt = format!("{}{}", EMAIL_PROMPT, serde_json::to_string_pretty(&payload)?);
    let text = model.generate(&prompt).await?;
    parse_candidates(&text)
        .ok_or_else(|| anyhow::anyhow!("no parseable candidate array in model output"))
}

/// Statement analysis: one call over truncated input, no batching and no
/// pattern fallback. Failure means an empty result.
pub async fn analyze_statement(model: &dyn GenerativeClient, text: &str) -> Vec<Candidate> {
    let prompt = format!("{}{}", STATEMENT_PROMPT, truncate_chars(text, STATEMENT_LIMIT));
    match model.generate(&prompt).await {
        Ok(response) => parse_candidates(&response).unwrap_or_else(|| {
            warn!("statement analysis produced no parseable candidate array");
            Vec::new()
        }),
        Err(e) => {
            warn!(error = %e, "statement analysis call failed");
            Vec::new()
        }
    }
}

/// First balanced `[...]` in `text`, parsed and validated into candidates.
/// `None` means the output carried no usable array at all.
fn parse_candidates(text: &str) -> Option<Vec<Candidate>> {
    let array = extract_json_array(text)?;
    let raw: Vec<RawCandidate> = serde_json::from_str(array).ok()?;
    Some(raw.into_iter().filter_map(RawCandidate::validate).collect())
}

/// Scan for the first balanced JSON array literal. String-aware, so
/// brackets inside string values do not confuse the depth count.
pub(crate) fn extract_json_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_plain_array() {
        assert_eq!(extract_json_array("[1, 2, 3]"), Some("[1, 2, 3]"));
    }

    #[test]
    fn finds_array_surrounded_by_prose() {
        let text = "물론입니다! 결과는 다음과 같습니다:\n```json\n[{\"a\": 1}]\n```\n감사합니다.";
        assert_eq!(extract_json_array(text), Some("[{\"a\": 1}]"));
    }

    #[test]
    fn balances_nested_arrays() {
        let text = "x [[1, 2], [3]] y [4]";
        assert_eq!(extract_json_array(text), Some("[[1, 2], [3]]"));
    }

    #[test]
    fn ignores_brackets_inside_strings() {
        let text = r#"[{"service_name": "멜론 [정기결제]", "amount": 10900}]"#;
        assert_eq!(extract_json_array(text), Some(text));
        let escaped = r#"[{"note": "quote \" then ] bracket"}]"#;
        assert_eq!(extract_json_array(escaped), Some(escaped));
    }

    #[test]
    fn no_array_yields_none() {
        assert_eq!(extract_json_array("죄송합니다, 구독을 찾지 못했습니다."), None);
        assert_eq!(extract_json_array("[1, 2"), None);
    }

    #[test]
    fn parse_candidates_validates_rows() {
        let text = r#"Here you go:
        [
          {"service_name": "Netflix", "amount": 17000, "currency": "KRW",
           "billing_cycle": "monthly", "billing_day": 15, "category": "streaming",
           "confidence": 0.95, "email_id": "m1", "sender": "info@account.netflix.com"},
          {"amount": 9900, "confidence": 0.9},
          {"service_name": "Claude Pro", "amount": 30000, "billing_cycle": "lunar",
           "category": "ai", "confidence": 2.5}
        ]"#;
        let parsed = parse_candidates(text).unwrap();
        // the nameless middle row is dropped
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].service_name, "Netflix");
        assert_eq!(parsed[0].billing_day, Some(15));
        assert_eq!(parsed[1].service_name, "Claude Pro");
        assert_eq!(parsed[1].billing_cycle, crate::extract::types::BillingCycle::Monthly);
        assert_eq!(parsed[1].confidence, 1.0);
    }

    #[test]
    fn parse_candidates_rejects_non_array_output() {
        assert!(parse_candidates("{\"service_name\": \"Netflix\"}").is_none());
        assert!(parse_candidates("no json here").is_none());
    }

    #[test]
    fn parse_candidates_accepts_empty_array() {
        assert_eq!(parse_candidates("[]").unwrap().len(), 0);
    }
}
