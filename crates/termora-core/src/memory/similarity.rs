//! Token-overlap ranking of history records.

use std::collections::HashSet;

use crate::models::CommandRecord;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "all", "for", "from", "in", "into", "is", "it", "me", "my", "of", "on",
    "please", "the", "this", "to", "with",
];

/// Lowercased word tokens of `text`, minus stopwords.
pub fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !(c.is_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .map(|token| token.trim_matches('.').to_lowercase())
        .filter(|token| !token.is_empty() && !STOPWORDS.contains(&token.as_str()))
        .collect()
}

/// Jaccard similarity between the query tokens and the record's intent and
/// payload tokens.
pub fn score(query: &HashSet<String>, record: &CommandRecord) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    let mut candidate = tokens(&record.intent);
    candidate.extend(tokens(&record.payload));
    let shared = query.intersection(&candidate).count();
    if shared == 0 {
        return 0.0;
    }
    shared as f64 / query.union(&candidate).count() as f64
}

/// Keeps records sharing at least one token with `text`, best first; equal
/// scores keep the most recent first.
pub fn rank(text: &str, records: Vec<CommandRecord>, limit: usize) -> Vec<CommandRecord> {
    let query = tokens(text);
    let mut scored: Vec<(f64, CommandRecord)> = records
        .into_iter()
        .map(|record| (score(&query, &record), record))
        .filter(|(score, _)| *score > 0.0)
        .collect();
    scored.sort_by(|(a_score, a), (b_score, b)| {
        b_score
            .total_cmp(a_score)
            .then_with(|| b.id.cmp(&a.id))
    });
    scored
        .into_iter()
        .take(limit)
        .map(|(_, record)| record)
        .collect()
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;

    use super::*;
    use crate::models::{Outcome, StepKind};

    fn record(id: u64, intent: &str, payload: &str) -> CommandRecord {
        CommandRecord {
            id,
            intent: intent.to_string(),
            plan_id: None,
            step_id: None,
            step_kind: StepKind::ShellCommand,
            payload: payload.to_string(),
            directory: "/tmp".to_string(),
            project: None,
            tags: Vec::new(),
            outcome: Outcome::Success,
            exit_code: Some(0),
            output: String::new(),
            duration_ms: Some(1),
            recorded_at: Timestamp::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_tokens_drop_stopwords() {
        let t = tokens("Compress the logs in /var/log");
        assert!(t.contains("compress"));
        assert!(t.contains("logs"));
        assert!(!t.contains("the"));
    }

    #[test]
    fn test_rank_orders_by_score_then_recency() {
        let records = vec![
            record(1, "compress old logs", "tar czf logs.tgz logs"),
            record(2, "list files", "ls -la"),
            record(3, "compress logs", "gzip logs/*.log"),
            record(4, "compress old logs", "tar czf logs.tgz logs"),
        ];
        let ranked: Vec<u64> = rank("compress old logs", records, 10)
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ranked[..2], [4, 1]);
        assert!(!ranked.contains(&2));
    }

    #[test]
    fn test_rank_respects_limit() {
        let records = (1..=5).map(|id| record(id, "backup notes", "cp -r notes /backup")).collect();
        assert_eq!(rank("backup notes", records, 2).len(), 2);
    }
}
