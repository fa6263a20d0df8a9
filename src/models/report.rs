use chrono::NaiveDate;

use super::ZodiacSign;

/// Per-sign outcome of one generation run. Failures carry the reason so
/// operators (and tests) can see what was skipped without digging in logs.
#[derive(Debug, Clone)]
pub struct SignOutcome {
    pub sign: ZodiacSign,
    pub result: std::result::Result<(), String>,
}

#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub date: NaiveDate,
    pub lang: String,
    pub outcomes: Vec<SignOutcome>,
}

impl GenerationReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> Vec<(ZodiacSign, &str)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.sign, e.as_str())))
            .collect()
    }
}

/// What happened to each device considered by one delivery run.
#[derive(Debug, Clone, Default)]
pub struct DeliveryReport {
    /// Devices whose scheduled time did not match this invocation.
    pub not_due: usize,
    /// Devices skipped because they have no subscriptions or no content today.
    pub no_content: usize,
    /// Device ids successfully dispatched and latched.
    pub sent: Vec<String>,
    /// Devices that lost the latch race to a concurrent invocation.
    pub already_delivered: usize,
    /// Per-device failures, with reasons.
    pub failed: Vec<(String, String)>,
}

impl DeliveryReport {
    pub fn considered(&self) -> usize {
        self.not_due + self.no_content + self.sent.len() + self.already_delivered + self.failed.len()
    }
}
