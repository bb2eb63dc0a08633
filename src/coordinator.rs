//! Decides which context-driven effects run, and with which profile.
//!
//! ```text
//!             in world                    (closed, id) changed
//! Inactive ─────────────▶ ActiveDefault ◀───────────────────▶ ActiveProfile
//!    ▲                         │                                    │
//!    └──────── left world ─────┴────────────────────────────────────┘
//!                (one Reset)
//! ```
//!
//! The coordinator only emits [`ContextAction`]s; the effect stack carries
//! them out. Each observed `(closed, headgear_id)` pair is acted on once.

use crate::context::WorldContext;
use crate::profile::{EffectProfile, profile_for};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum ContextState {
    #[default]
    Inactive,
    ActiveDefault,
    ActiveProfile(EffectProfile),
}

/// What the effect stack should do in response to a context change.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ContextAction {
    /// Left the world: disable every managed effect.
    Reset,
    /// No closed, known helmet (or the visor is switched off): disable visor and vignette.
    ApplyDefault,
    /// A closed, known helmet: drive visor and vignette from its profile.
    ApplyProfile(EffectProfile),
}

#[derive(Debug, Default)]
pub struct EffectContextCoordinator {
    state: ContextState,
    /// `None` never matches, so the next in-world update always acts.
    last_key: Option<(bool, String)>,
}

impl EffectContextCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Forget the last observed headgear so the next update re-applies it.
    pub fn force_refresh(&mut self) {
        self.last_key = None;
    }

    /// Observe this frame's context. `visor_enabled` is the user's visor toggle.
    pub fn update(&mut self, context: &WorldContext, visor_enabled: bool) -> Option<ContextAction> {
        if !context.in_world {
            if self.state == ContextState::Inactive {
                return None;
            }
            log::debug!("Left world, resetting context effects");
            self.state = ContextState::Inactive;
            self.last_key = None;
            return Some(ContextAction::Reset);
        }

        let (closed, id) = context.headgear_key();
        if let Some((last_closed, last_id)) = &self.last_key {
            if *last_closed == closed && last_id == id {
                return None;
            }
        }
        self.last_key = Some((closed, id.to_string()));

        let profile = if closed { profile_for(id) } else { None };
        let (state, action) = match profile {
            Some(profile) if visor_enabled => (
                ContextState::ActiveProfile(profile),
                ContextAction::ApplyProfile(profile),
            ),
            _ => (ContextState::ActiveDefault, ContextAction::ApplyDefault),
        };
        log::debug!(
            "Headgear changed (closed: {}, id: '{}'), now {:?}",
            closed,
            id,
            state
        );
        self.state = state;
        Some(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_world() -> WorldContext {
        WorldContext {
            in_world: true,
            ..Default::default()
        }
    }

    fn helmet(id: &str) -> WorldContext {
        WorldContext {
            in_world: true,
            worn_headgear_id: Some(id.to_string()),
            headgear_closed: true,
        }
    }

    #[test]
    fn stays_quiet_outside_world() {
        let mut coordinator = EffectContextCoordinator::new();
        for _ in 0..10 {
            assert_eq!(coordinator.update(&WorldContext::default(), true), None);
        }
        assert_eq!(coordinator.state(), ContextState::Inactive);
    }

    #[test]
    fn unchanged_context_applies_once() {
        let mut coordinator = EffectContextCoordinator::new();
        let context = helmet("ItemSpaceHelmet");

        let actions: Vec<_> = (0..20)
            .filter_map(|_| coordinator.update(&context, true))
            .collect();
        assert_eq!(
            actions,
            vec![ContextAction::ApplyProfile(EffectProfile::STANDARD_VISOR)]
        );
    }

    #[test]
    fn each_change_applies_exactly_once() {
        let mut coordinator = EffectContextCoordinator::new();
        assert!(coordinator.update(&in_world(), true).is_some());
        assert!(coordinator.update(&in_world(), true).is_none());

        assert_eq!(
            coordinator.update(&helmet("ItemHardsuitHelmet"), true),
            Some(ContextAction::ApplyProfile(EffectProfile::STANDARD_VISOR))
        );
        assert!(coordinator.update(&helmet("ItemHardsuitHelmet"), true).is_none());

        assert_eq!(
            coordinator.update(&in_world(), true),
            Some(ContextAction::ApplyDefault)
        );
        assert_eq!(coordinator.state(), ContextState::ActiveDefault);
    }

    #[test]
    fn unknown_helmet_gets_default() {
        let mut coordinator = EffectContextCoordinator::new();
        assert_eq!(
            coordinator.update(&helmet("ItemWeldingMask"), true),
            Some(ContextAction::ApplyDefault)
        );
    }

    #[test]
    fn disabled_visor_gets_default() {
        let mut coordinator = EffectContextCoordinator::new();
        assert_eq!(
            coordinator.update(&helmet("ItemSpaceHelmet"), false),
            Some(ContextAction::ApplyDefault)
        );
    }

    #[test]
    fn leaving_world_resets_once() {
        let mut coordinator = EffectContextCoordinator::new();
        coordinator.update(&helmet("ItemIcarusHelmet"), true);
        assert!(matches!(coordinator.state(), ContextState::ActiveProfile(_)));

        let resets = (0..5)
            .filter_map(|_| coordinator.update(&WorldContext::default(), true))
            .filter(|action| *action == ContextAction::Reset)
            .count();
        assert_eq!(resets, 1);
        assert_eq!(coordinator.state(), ContextState::Inactive);
    }

    #[test]
    fn reentering_world_reapplies() {
        let mut coordinator = EffectContextCoordinator::new();
        let context = helmet("ItemSpaceHelmet");
        coordinator.update(&context, true);
        coordinator.update(&WorldContext::default(), true);

        assert!(coordinator.update(&context, true).is_some());
    }

    #[test]
    fn force_refresh_reapplies_same_context() {
        let mut coordinator = EffectContextCoordinator::new();
        let context = helmet("ItemSpaceHelmet");
        coordinator.update(&context, true);
        assert!(coordinator.update(&context, true).is_none());

        coordinator.force_refresh();
        assert!(coordinator.update(&context, false).is_some());
        assert_eq!(coordinator.state(), ContextState::ActiveDefault);
    }
}
