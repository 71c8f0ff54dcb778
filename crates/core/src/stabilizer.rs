//! Temporal stabilization of per-window predictions
//!
//! Each classified window contributes its top index to a short history. A
//! label is confirmed only when the agreement rule holds over the recent
//! history and the top confidence strictly exceeds the threshold. Confirmed
//! labels are forwarded to the caption log.

use crate::caption::CaptionLog;
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::labels::{Label, LabelVocabulary};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// How agreement over the recent prediction history is decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementRule {
    /// Oldest entry of the recent window must equal the current top index
    #[default]
    OldestRecent,
    /// Smallest index present in the recent window must equal the current top index
    LowestRecent,
    /// Current top index must fill more than half of the recent window
    Majority,
}

impl AgreementRule {
    /// Evaluate the rule; `recent` is oldest first and includes the current index
    pub fn holds(&self, recent: &[usize], top_index: usize) -> bool {
        match self {
            AgreementRule::OldestRecent => recent.first() == Some(&top_index),
            AgreementRule::LowestRecent => recent.iter().min() == Some(&top_index),
            AgreementRule::Majority => {
                let votes = recent.iter().filter(|&&i| i == top_index).count();
                votes * 2 > recent.len()
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgreementRule::OldestRecent => "oldest_recent",
            AgreementRule::LowestRecent => "lowest_recent",
            AgreementRule::Majority => "majority",
        }
    }
}

/// Bounded FIFO of recent argmax indices
#[derive(Debug, Clone)]
pub struct PredictionHistory {
    indices: VecDeque<usize>,
    capacity: usize,
}

impl PredictionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            indices: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Record a top index, evicting the oldest past capacity
    pub fn push(&mut self, index: usize) {
        self.indices.push_back(index);
        while self.indices.len() > self.capacity {
            self.indices.pop_front();
        }
    }

    /// The last `min(n, len)` entries, oldest first
    pub fn recent(&self, n: usize) -> Vec<usize> {
        let skip = self.indices.len().saturating_sub(n);
        self.indices.iter().skip(skip).copied().collect()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn clear(&mut self) {
        self.indices.clear();
    }

    /// All entries, oldest first
    pub fn to_vec(&self) -> Vec<usize> {
        self.indices.iter().copied().collect()
    }
}

/// Outcome of observing one probability vector
#[derive(Debug, Clone, PartialEq)]
pub struct StabilizerDecision {
    /// Argmax index (lowest index wins ties)
    pub top_index: usize,
    /// Probability at `top_index`
    pub top_confidence: f32,
    /// Whether the agreement rule held
    pub agreement: bool,
    /// Whether `top_confidence` exceeded the threshold
    pub confident: bool,
    /// Confirmed label, if both checks passed
    pub label: Option<Label>,
    /// Whether the caption log changed as a result
    pub caption_changed: bool,
}

impl StabilizerDecision {
    pub fn is_confirmed(&self) -> bool {
        self.label.is_some()
    }
}

/// Index and value of the first maximum
///
/// Returns None for an empty slice.
pub fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, best_v)) if v <= best_v => {}
            _ => best = Some((i, v)),
        }
    }
    best
}

/// Turns a stream of per-window probability vectors into confirmed labels
#[derive(Debug, Clone)]
pub struct PredictionStabilizer {
    vocabulary: LabelVocabulary,
    history: PredictionHistory,
    threshold: f32,
    agreement_window: usize,
    rule: AgreementRule,
}

impl PredictionStabilizer {
    pub fn new(
        vocabulary: LabelVocabulary,
        history_size: usize,
        agreement_window: usize,
        threshold: f32,
        rule: AgreementRule,
    ) -> Self {
        Self {
            vocabulary,
            history: PredictionHistory::new(history_size),
            threshold,
            agreement_window,
            rule,
        }
    }

    /// Build from pipeline config
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let vocabulary = LabelVocabulary::new(config.labels.iter().cloned())?;
        Ok(Self::new(
            vocabulary,
            config.history_size,
            config.agreement_window,
            config.threshold,
            config.agreement_rule,
        ))
    }

    /// Observe one probability vector; returns the confirmed label, if any
    pub fn observe(&mut self, probabilities: &[f32], caption: &mut CaptionLog) -> Result<Option<Label>> {
        Ok(self.observe_detailed(probabilities, caption)?.label)
    }

    /// Observe one probability vector and report every step of the decision
    pub fn observe_detailed(
        &mut self,
        probabilities: &[f32],
        caption: &mut CaptionLog,
    ) -> Result<StabilizerDecision> {
        if probabilities.len() != self.vocabulary.len() {
            return Err(Error::contract(format!(
                "probability vector has {} values, expected {} labels",
                probabilities.len(),
                self.vocabulary.len()
            )));
        }
        if let Some(bad) = probabilities.iter().position(|p| !p.is_finite()) {
            return Err(Error::contract(format!(
                "probability at index {} is not finite",
                bad
            )));
        }

        let (top_index, top_confidence) = argmax(probabilities)
            .ok_or_else(|| Error::contract("empty probability vector"))?;

        self.history.push(top_index);

        let recent = self.history.recent(self.agreement_window);
        let agreement = self.rule.holds(&recent, top_index);
        let confident = top_confidence > self.threshold;

        let mut decision = StabilizerDecision {
            top_index,
            top_confidence,
            agreement,
            confident,
            label: None,
            caption_changed: false,
        };

        if agreement && confident {
            let label = self
                .vocabulary
                .get(top_index)
                .cloned()
                .ok_or_else(|| Error::contract(format!("no label at index {}", top_index)))?;
            decision.caption_changed = caption.append(label.clone());
            decision.label = Some(label);
        }

        tracing::debug!(
            top_index,
            top_confidence,
            agreement,
            confident,
            confirmed = decision.is_confirmed(),
            "observed window prediction"
        );

        Ok(decision)
    }

    pub fn history(&self) -> &PredictionHistory {
        &self.history
    }

    pub fn vocabulary(&self) -> &LabelVocabulary {
        &self.vocabulary
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn rule(&self) -> AgreementRule {
        self.rule
    }

    /// Forget all recorded predictions
    pub fn reset(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> LabelVocabulary {
        LabelVocabulary::new(["a", "b", "hello", "thanks"]).unwrap()
    }

    fn stabilizer(rule: AgreementRule) -> PredictionStabilizer {
        PredictionStabilizer::new(vocab(), 10, 10, 0.7, rule)
    }

    fn one_hot(index: usize, confidence: f32) -> Vec<f32> {
        let rest = (1.0 - confidence) / 3.0;
        (0..4).map(|i| if i == index { confidence } else { rest }).collect()
    }

    #[test]
    fn test_argmax_prefers_first_maximum() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), Some((1, 0.4)));
        assert_eq!(argmax(&[0.5]), Some((0, 0.5)));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut history = PredictionHistory::new(3);
        for i in 0..5 {
            history.push(i);
        }
        assert_eq!(history.to_vec(), vec![2, 3, 4]);
        assert_eq!(history.recent(2), vec![3, 4]);
        assert_eq!(history.recent(10), vec![2, 3, 4]);
    }

    #[test]
    fn test_first_window_confirms_trivially() {
        let mut stab = stabilizer(AgreementRule::OldestRecent);
        let mut caption = CaptionLog::new(5);

        let label = stab.observe(&one_hot(2, 0.9), &mut caption).unwrap();
        assert_eq!(label.unwrap(), "hello");
        assert_eq!(stab.history().to_vec(), vec![2]);
        assert_eq!(caption.render(), "hello");
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut stab = stabilizer(AgreementRule::OldestRecent);
        let mut caption = CaptionLog::new(5);

        let decision = stab.observe_detailed(&[0.1, 0.1, 0.7, 0.1], &mut caption).unwrap();
        assert!(decision.agreement);
        assert!(!decision.confident);
        assert!(decision.label.is_none());
        assert!(caption.is_empty());
    }

    #[test]
    fn test_low_confidence_never_confirms() {
        let mut stab = stabilizer(AgreementRule::OldestRecent);
        let mut caption = CaptionLog::new(5);

        for _ in 0..12 {
            assert!(stab.observe(&one_hot(3, 0.5), &mut caption).unwrap().is_none());
        }
        assert!(caption.is_empty());
        assert_eq!(stab.history().len(), 10);
    }

    #[test]
    fn test_oldest_recent_disagreement() {
        let mut stab = stabilizer(AgreementRule::OldestRecent);
        let mut caption = CaptionLog::new(5);

        stab.observe(&one_hot(0, 0.9), &mut caption).unwrap();
        // Oldest of [0, 1] is 0, so a confident 1 is not confirmed.
        let decision = stab.observe_detailed(&one_hot(1, 0.95), &mut caption).unwrap();
        assert!(!decision.agreement);
        assert!(decision.label.is_none());
        assert_eq!(caption.render(), "a");
    }

    #[test]
    fn test_oldest_recent_recovers_after_window_turns_over() {
        let mut stab = PredictionStabilizer::new(vocab(), 10, 3, 0.7, AgreementRule::OldestRecent);
        let mut caption = CaptionLog::new(5);

        stab.observe(&one_hot(0, 0.9), &mut caption).unwrap();
        assert!(stab.observe(&one_hot(1, 0.9), &mut caption).unwrap().is_none());
        assert!(stab.observe(&one_hot(1, 0.9), &mut caption).unwrap().is_none());
        // Recent window is now [1, 1, 1].
        assert_eq!(stab.observe(&one_hot(1, 0.9), &mut caption).unwrap().unwrap(), "b");
        assert_eq!(caption.render(), "a b");
    }

    #[test]
    fn test_lowest_recent_rule() {
        let mut stab = stabilizer(AgreementRule::LowestRecent);
        let mut caption = CaptionLog::new(5);

        stab.observe(&one_hot(3, 0.9), &mut caption).unwrap();
        // Recent is [3, 1]; lowest is 1, which matches the new top index.
        let label = stab.observe(&one_hot(1, 0.9), &mut caption).unwrap();
        assert_eq!(label.unwrap(), "b");
        // Recent is [3, 1, 3]; lowest is 1, so 3 is not confirmed.
        assert!(stab.observe(&one_hot(3, 0.9), &mut caption).unwrap().is_none());
    }

    #[test]
    fn test_majority_rule() {
        let mut stab = stabilizer(AgreementRule::Majority);
        let mut caption = CaptionLog::new(5);

        stab.observe(&one_hot(0, 0.9), &mut caption).unwrap();
        // [0, 1]: one vote out of two is not a majority.
        assert!(stab.observe(&one_hot(1, 0.9), &mut caption).unwrap().is_none());
        // [0, 1, 1]: two of three.
        assert_eq!(stab.observe(&one_hot(1, 0.9), &mut caption).unwrap().unwrap(), "b");
    }

    #[test]
    fn test_repeated_label_keeps_caption_unchanged() {
        let mut stab = stabilizer(AgreementRule::OldestRecent);
        let mut caption = CaptionLog::new(5);

        let first = stab.observe_detailed(&one_hot(2, 0.9), &mut caption).unwrap();
        assert!(first.caption_changed);

        for _ in 0..9 {
            let decision = stab.observe_detailed(&one_hot(2, 0.9), &mut caption).unwrap();
            assert_eq!(decision.label.as_ref().unwrap(), "hello");
            assert!(!decision.caption_changed);
        }
        assert_eq!(caption.render(), "hello");
    }

    #[test]
    fn test_length_mismatch_is_contract_violation() {
        let mut stab = stabilizer(AgreementRule::OldestRecent);
        let mut caption = CaptionLog::new(5);

        let err = stab.observe(&[0.5, 0.5], &mut caption).unwrap_err();
        assert!(err.is_contract_violation());
        assert!(stab.history().is_empty());
    }

    #[test]
    fn test_non_finite_is_contract_violation() {
        let mut stab = stabilizer(AgreementRule::OldestRecent);
        let mut caption = CaptionLog::new(5);

        let err = stab.observe(&[0.1, f32::NAN, 0.8, 0.1], &mut caption).unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[test]
    fn test_rule_serde_names() {
        let rule: AgreementRule = serde_json::from_str("\"lowest_recent\"").unwrap();
        assert_eq!(rule, AgreementRule::LowestRecent);
        assert_eq!(AgreementRule::Majority.as_str(), "majority");
    }
}
