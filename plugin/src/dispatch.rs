//! Dispatch rounds: consulting every plugin for one input event and merging
//! what comes back.
//!
//! Candidates from plugins that answered with a final result are concatenated
//! in registration order, each plugin's own order preserved. Ranks are not
//! compared across plugins. Plugins that asked to be polled again are listed
//! in `deferred`, and the shortest requested delay becomes `retry_after`.
//! A round is settled once no plugin deferred.

use serde::{Deserialize, Serialize};

use crate::candidate::{
    PluginCandidate, PluginCandidates, PluginPreedit, PluginResponse, WaitTime,
};
use crate::manager::PluginManager;

/// Result of one `provide_candidates` round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvideRound {
    pub candidates: PluginCandidates,
    /// Names of plugins that asked to be polled again
    pub deferred: Vec<String>,
    /// Shortest requested delay; `FINAL` when nobody deferred
    pub retry_after: WaitTime,
}

impl ProvideRound {
    pub fn is_settled(&self) -> bool {
        self.deferred.is_empty()
    }
}

/// Result of one `translate_candidate` round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslateRound {
    pub candidate: PluginCandidate,
    /// Whether any plugin replaced the text
    pub changed: bool,
    pub deferred: Vec<String>,
    pub retry_after: WaitTime,
}

impl TranslateRound {
    pub fn is_settled(&self) -> bool {
        self.deferred.is_empty()
    }
}

/// Concatenate the final responses of one round, in the order given.
///
/// Deferred and unavailable responses contribute nothing.
pub fn merge_candidates<I>(responses: I) -> PluginCandidates
where
    I: IntoIterator<Item = PluginResponse<PluginCandidates>>,
{
    responses
        .into_iter()
        .filter(|response| response.wait_time.is_final())
        .flat_map(|response| response.payload)
        .collect()
}

impl PluginManager {
    /// Ask every plugin that can provide candidates for suggestions on `preedit`.
    ///
    /// Resets the wait-time aggregate before consulting plugins.
    pub fn provide_round(&mut self, preedit: &PluginPreedit) -> ProvideRound {
        self.reset_wait_time();

        let mut responses = Vec::new();
        let mut deferred = Vec::new();
        for plugin in self.plugins().filter(|p| p.has_provide_candidates()) {
            let response = plugin.provide_candidates(preedit);
            if response.wait_time.is_deferred() {
                deferred.push(plugin.name().to_string());
            }
            responses.push(response);
        }

        for response in &responses {
            self.mark_wait_time(response.wait_time);
        }
        let round = ProvideRound {
            candidates: merge_candidates(responses),
            deferred,
            retry_after: self.wait_time(),
        };
        tracing::trace!(
            preedit = %preedit,
            candidates = round.candidates.len(),
            retry_after = %round.retry_after,
            "provide round finished"
        );
        round
    }

    /// Pass `candidate` through every translating plugin in registration order.
    ///
    /// A final text result replaces the current text for the next plugin; a
    /// final result without text leaves it unchanged.
    pub fn translate_round(&mut self, candidate: &PluginCandidate) -> TranslateRound {
        self.reset_wait_time();

        let mut current = candidate.clone();
        let mut waits = Vec::new();
        let mut deferred = Vec::new();
        for plugin in self.plugins().filter(|p| p.has_translate_candidate()) {
            let response = plugin.translate_candidate(&current);
            waits.push(response.wait_time);
            if response.wait_time.is_deferred() {
                deferred.push(plugin.name().to_string());
            } else if response.wait_time.is_final() {
                if let Some(text) = response.payload {
                    current = text;
                }
            }
        }

        for wait in waits {
            self.mark_wait_time(wait);
        }
        TranslateRound {
            changed: current != *candidate,
            candidate: current,
            deferred,
            retry_after: self.wait_time(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::PluginCandidateItem;

    #[test]
    fn test_merge_keeps_plugin_order() {
        let merged = merge_candidates(vec![
            PluginResponse::final_result(vec![
                PluginCandidateItem::new(5, "b"),
                PluginCandidateItem::new(1, "a"),
            ]),
            PluginResponse::deferred(WaitTime::new(40)),
            PluginResponse::unavailable(),
            PluginResponse::final_result(vec![PluginCandidateItem::new(0, "c")]),
        ]);
        let texts: Vec<&str> = merged.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "a", "c"]);
        assert_eq!(merged[0].rank, 5);
    }

    #[test]
    fn test_merge_ignores_payload_of_non_final() {
        let stale = PluginResponse::new(
            vec![PluginCandidateItem::new(1, "stale")],
            WaitTime::new(10),
        );
        assert!(merge_candidates(vec![stale]).is_empty());
    }

    #[test]
    fn test_empty_manager_round_is_settled() {
        let mut manager = PluginManager::new();
        let round = manager.provide_round(&PluginPreedit::from("ni"));
        assert!(round.is_settled());
        assert!(round.candidates.is_empty());
        assert_eq!(round.retry_after, WaitTime::FINAL);

        let translated = manager.translate_round(&"你".to_string());
        assert_eq!(translated.candidate, "你");
        assert!(!translated.changed);
    }
}
