//! Candidate types exchanged with plugins.
//!
//! This module provides:
//! - `PluginPreedit`: the uncommitted input handed to `provide_candidates`
//! - `PluginCandidateItem` / `PluginCandidates`: ranked suggestions from a plugin
//! - `WaitTime`: the final / deferred / unavailable signal carried by every call
//! - `PluginResponse`: a payload paired with its `WaitTime`

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single candidate string, used both as the argument to
/// `translate_candidate` and as its output.
pub type PluginCandidate = String;

/// Ordered candidates as returned by one plugin. The manager never re-sorts.
pub type PluginCandidates = Vec<PluginCandidateItem>;

/// Uncommitted input text handed to `provide_candidates`.
///
/// Immutable for the duration of a call.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PluginPreedit(String);

impl PluginPreedit {
    pub fn new<T: Into<String>>(text: T) -> Self {
        PluginPreedit(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Characters of the preedit in input order.
    pub fn chars(&self) -> std::str::Chars<'_> {
        self.0.chars()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for PluginPreedit {
    fn from(text: &str) -> Self {
        PluginPreedit::new(text)
    }
}

impl From<String> for PluginPreedit {
    fn from(text: String) -> Self {
        PluginPreedit(text)
    }
}

impl fmt::Display for PluginPreedit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A ranked suggestion produced by `provide_candidates`.
///
/// The rank is an ordering hint chosen by the plugin. Whether lower or higher
/// is better is up to the consumer; it is carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginCandidateItem {
    pub rank: i32,
    pub text: String,
}

impl PluginCandidateItem {
    pub fn new<T: Into<String>>(rank: i32, text: T) -> Self {
        PluginCandidateItem {
            rank,
            text: text.into(),
        }
    }
}

/// Per-call signal overlaid on every plugin result.
///
/// - `0`: the result (possibly empty) is final
/// - positive: no result yet, poll again after this many time units
/// - negative: error or unavailable, no contribution this round
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaitTime(i32);

impl WaitTime {
    pub const FINAL: WaitTime = WaitTime(0);
    pub const UNAVAILABLE: WaitTime = WaitTime(-1);

    pub const fn new(units: i32) -> Self {
        WaitTime(units)
    }

    /// Build a wait time from a script integer, saturating at the `i32` range.
    pub fn from_script_int(value: i64) -> Self {
        let clamped = value.clamp(i32::MIN as i64, i32::MAX as i64);
        WaitTime(clamped as i32)
    }

    pub const fn units(self) -> i32 {
        self.0
    }

    pub const fn is_final(self) -> bool {
        self.0 == 0
    }

    pub const fn is_deferred(self) -> bool {
        self.0 > 0
    }

    pub const fn is_unavailable(self) -> bool {
        self.0 < 0
    }
}

impl From<i32> for WaitTime {
    fn from(units: i32) -> Self {
        WaitTime(units)
    }
}

impl fmt::Display for WaitTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The uniform result of a plugin call: a payload and its `WaitTime`.
///
/// The payload is only meaningful when `wait_time` is final.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginResponse<T> {
    pub payload: T,
    pub wait_time: WaitTime,
}

impl<T> PluginResponse<T> {
    pub fn new(payload: T, wait_time: WaitTime) -> Self {
        PluginResponse { payload, wait_time }
    }

    pub fn final_result(payload: T) -> Self {
        PluginResponse::new(payload, WaitTime::FINAL)
    }
}

impl<T: Default> PluginResponse<T> {
    /// An empty payload carrying the given wait time.
    pub fn deferred(wait_time: WaitTime) -> Self {
        PluginResponse::new(T::default(), wait_time)
    }

    pub fn unavailable() -> Self {
        PluginResponse::new(T::default(), WaitTime::UNAVAILABLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_time_classification() {
        assert!(WaitTime::FINAL.is_final());
        assert!(WaitTime::UNAVAILABLE.is_unavailable());
        assert!(WaitTime::new(50).is_deferred());
        assert!(!WaitTime::new(50).is_final());
        assert!(WaitTime::new(-7).is_unavailable());
    }

    #[test]
    fn test_wait_time_saturates_script_ints() {
        assert_eq!(WaitTime::from_script_int(50).units(), 50);
        assert_eq!(WaitTime::from_script_int(i64::MAX).units(), i32::MAX);
        assert_eq!(WaitTime::from_script_int(i64::MIN).units(), i32::MIN);
    }

    #[test]
    fn test_preedit_keeps_char_order() {
        let preedit = PluginPreedit::from("nǐhao");
        let chars: Vec<char> = preedit.chars().collect();
        assert_eq!(chars, vec!['n', 'ǐ', 'h', 'a', 'o']);
        assert_eq!(preedit.to_string(), "nǐhao");
    }

    #[test]
    fn test_response_constructors() {
        let unavailable: PluginResponse<PluginCandidates> = PluginResponse::unavailable();
        assert!(unavailable.payload.is_empty());
        assert_eq!(unavailable.wait_time, WaitTime::UNAVAILABLE);

        let deferred: PluginResponse<Option<PluginCandidate>> =
            PluginResponse::deferred(WaitTime::new(20));
        assert_eq!(deferred.payload, None);
        assert!(deferred.wait_time.is_deferred());

        let done = PluginResponse::final_result(vec![PluginCandidateItem::new(1, "你好")]);
        assert!(done.wait_time.is_final());
        assert_eq!(done.payload[0].text, "你好");
    }
}
