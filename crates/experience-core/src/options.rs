//! UCI-facing experience settings.
//!
//! The enclosing engine owns option registration and parsing; this type
//! carries the resolved values and knows how to push them into a store.

use crate::quality::EVAL_IMPORTANCE_MAX;
use crate::store::ExperienceStore;

#[derive(Debug, Clone)]
pub struct ExperienceOptions {
    /// `Experience File`: path of the backing file.
    pub file: String,
    /// `Experience Enabled`.
    pub enabled: bool,
    /// `Experience Readonly`: probe but never write.
    pub readonly: bool,
    /// `Experience Book Eval Importance`, 0..=10.
    eval_importance: i32,
}

impl Default for ExperienceOptions {
    fn default() -> Self {
        ExperienceOptions {
            file: "experience.exp".to_string(),
            enabled: true,
            readonly: false,
            eval_importance: 5,
        }
    }
}

impl ExperienceOptions {
    pub fn eval_importance(&self) -> i32 {
        self.eval_importance
    }

    pub fn set_eval_importance(&mut self, value: i32) {
        self.eval_importance = value.clamp(0, EVAL_IMPORTANCE_MAX);
    }

    /// Push the settings into a store: gates first, then reload or
    /// unload depending on `enabled`. Idempotent when nothing changed,
    /// like the engine's option-change hook.
    pub fn apply(&self, store: &mut ExperienceStore) {
        store.gates().set_enabled(self.enabled);
        store.gates().set_readonly(self.readonly);

        if self.enabled {
            store.init(&self.file);
        } else {
            store.unload();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eval_importance_is_clamped() {
        let mut opts = ExperienceOptions::default();
        opts.set_eval_importance(99);
        assert_eq!(opts.eval_importance(), 10);
        opts.set_eval_importance(-3);
        assert_eq!(opts.eval_importance(), 0);
        opts.set_eval_importance(7);
        assert_eq!(opts.eval_importance(), 7);
    }
}
