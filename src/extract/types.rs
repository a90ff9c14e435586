use serde::{Deserialize, Serialize};

/// Recurrence period of a charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Monthly,
    Yearly,
    Weekly,
}

impl BillingCycle {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" => Some(Self::Monthly),
            "yearly" | "annual" | "annually" => Some(Self::Yearly),
            "weekly" => Some(Self::Weekly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Weekly => "weekly",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Streaming,
    Music,
    Cloud,
    Productivity,
    Ai,
    Design,
    Developer,
    Reading,
    Membership,
    Gaming,
    Fitness,
    News,
    Bundle,
    Other,
}

impl Category {
    /// Lenient parse for untrusted input; anything unrecognized is `Other`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "streaming" => Self::Streaming,
            "music" => Self::Music,
            "cloud" => Self::Cloud,
            "productivity" => Self::Productivity,
            "ai" => Self::Ai,
            "design" => Self::Design,
            "developer" => Self::Developer,
            "reading" => Self::Reading,
            "membership" => Self::Membership,
            "gaming" => Self::Gaming,
            "fitness" => Self::Fitness,
            "news" => Self::News,
            "bundle" => Self::Bundle,
            _ => Self::Other,
        }
    }
}

/// A subscription inferred from a source document, not yet a tracked record.
///
/// Produced transiently per scan; only the enriched result a user adopts is
/// ever persisted.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub service_name: String,
    /// Whole currency units, never negative.
    pub amount: i64,
    pub currency: String,
    pub billing_cycle: BillingCycle,
    pub billing_day: Option<u8>,
    pub category: Category,
    /// Extractor's certainty this is a genuine recurring subscription, in [0, 1].
    pub confidence: f64,
    /// Weak back-reference to the originating message, lookup only.
    pub email_id: Option<String>,
    pub sender: Option<String>,
}

/// Serde target for untrusted model output. Every field is optional; rows
/// are validated into [`Candidate`] right after parsing.
#[derive(Debug, Default, Deserialize)]
pub struct RawCandidate {
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub billing_cycle: Option<String>,
    #[serde(default)]
    pub billing_day: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub email_id: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
}

impl RawCandidate {
    /// Validate one untrusted row. Rows without a usable service name are
    /// dropped; everything else is normalized into the typed model.
    pub fn validate(self) -> Option<Candidate> {
        let service_name = self.service_name?.trim().to_string();
        if service_name.is_empty() {
            return None;
        }
        let amount = (self.amount.unwrap_or(0.0).round() as i64).max(0);
        let billing_day = self
            .billing_day
            .map(|d| d.round() as i64)
            .filter(|d| (1..=31).contains(d))
            .map(|d| d as u8);
        Some(Candidate {
            service_name,
            amount,
            currency: self
                .currency
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| "KRW".into()),
            billing_cycle: self
                .billing_cycle
                .as_deref()
                .and_then(BillingCycle::parse)
                .unwrap_or(BillingCycle::Monthly),
            billing_day,
            category: self
                .category
                .as_deref()
                .map(Category::parse)
                .unwrap_or(Category::Other),
            confidence: self.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
            email_id: self.email_id.filter(|s| !s.is_empty()),
            sender: self.sender.filter(|s| !s.is_empty()),
        })
    }
}
