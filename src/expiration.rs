//! Expiration policy
//!
//! Maps a class tag to a grace period in ticks. A class without an entry
//! never expires: its events are dispatched however late they are.

use crate::error::{CueError, Result};
use crate::event::Atom;
use log::warn;
use std::collections::HashMap;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExpirationPolicy {
    grace: HashMap<String, f64>,
}

impl ExpirationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a policy from `(class, grace)` pairs, rejecting negative or
    /// non-finite grace periods.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut grace = HashMap::new();
        for (class, ticks) in pairs {
            let class = class.into();
            check_grace(&class, ticks)?;
            grace.insert(class, ticks);
        }
        Ok(Self { grace })
    }

    /// The tiers older patches hardcoded: `midi` late by 5 ticks, `ui` by 50.
    /// Anything else, `done` included, never expires.
    pub fn legacy_tiers() -> Self {
        let mut grace = HashMap::new();
        grace.insert("midi".to_string(), 5.0);
        grace.insert("ui".to_string(), 50.0);
        Self { grace }
    }

    /// Parse a flat `class grace class grace ...` atom list, e.g. `midi 5 ui 50`.
    ///
    /// Pairs whose key is not a symbol are skipped with a warning. A key
    /// without a numeric grace period is an error.
    pub fn from_atoms(atoms: &[Atom]) -> Result<Self> {
        let mut grace = HashMap::new();
        for pair in atoms.chunks(2) {
            let Some(class) = pair[0].as_symbol() else {
                warn!("Skipping expiration entry '{}': class isn't a symbol", pair[0]);
                continue;
            };
            let ticks = pair
                .get(1)
                .and_then(Atom::as_f64)
                .ok_or_else(|| CueError::InvalidExpiration {
                    class: class.to_string(),
                    reason: "grace period is missing or not a number".to_string(),
                })?;
            check_grace(class, ticks)?;
            grace.insert(class.to_string(), ticks);
        }
        Ok(Self { grace })
    }

    /// Grace period for a class, `None` when the class never expires.
    pub fn grace_for(&self, class_tag: &str) -> Option<f64> {
        self.grace.get(class_tag).copied()
    }

    /// Swap in a whole new table.
    pub fn replace(&mut self, other: ExpirationPolicy) {
        *self = other;
    }

    pub fn len(&self) -> usize {
        self.grace.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grace.is_empty()
    }
}

fn check_grace(class: &str, ticks: f64) -> Result<()> {
    if ticks.is_finite() && ticks >= 0.0 {
        Ok(())
    } else {
        Err(CueError::InvalidExpiration {
            class: class.to_string(),
            reason: format!("grace period {} must be a finite number >= 0", ticks),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_class_never_expires() {
        let policy = ExpirationPolicy::from_pairs([("midi", 5.0)]).unwrap();
        assert_eq!(policy.grace_for("midi"), Some(5.0));
        assert_eq!(policy.grace_for("click"), None);
    }

    #[test]
    fn test_rejects_negative_grace() {
        assert!(matches!(
            ExpirationPolicy::from_pairs([("ui", -1.0)]),
            Err(CueError::InvalidExpiration { .. })
        ));
        assert!(ExpirationPolicy::from_pairs([("ui", f64::NAN)]).is_err());
    }

    #[test]
    fn test_from_atoms() {
        let atoms = vec![
            Atom::symbol("midi"),
            Atom::Int(5),
            Atom::Int(7),
            Atom::Int(1),
            Atom::symbol("ui"),
            Atom::Float(50.0),
        ];
        let policy = ExpirationPolicy::from_atoms(&atoms).unwrap();
        assert_eq!(policy.len(), 2);
        assert_eq!(policy.grace_for("midi"), Some(5.0));
        assert_eq!(policy.grace_for("ui"), Some(50.0));
    }

    #[test]
    fn test_from_atoms_missing_grace() {
        let atoms = vec![Atom::symbol("midi"), Atom::Int(5), Atom::symbol("ui")];
        assert!(matches!(
            ExpirationPolicy::from_atoms(&atoms),
            Err(CueError::InvalidExpiration { class, .. }) if class == "ui"
        ));
    }

    #[test]
    fn test_replace_is_wholesale() {
        let mut policy = ExpirationPolicy::legacy_tiers();
        assert_eq!(policy.grace_for("ui"), Some(50.0));
        assert_eq!(policy.grace_for("done"), None);

        policy.replace(ExpirationPolicy::from_pairs([("click", 2.0)]).unwrap());
        assert_eq!(policy.grace_for("ui"), None);
        assert_eq!(policy.grace_for("click"), Some(2.0));
    }
}
