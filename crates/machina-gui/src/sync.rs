use machina_core::ComponentId;
use std::time::{Duration, Instant};

/// How long the camera glides toward the expanded node.
pub const FOCUS_DURATION: Duration = Duration::from_millis(450);
/// How long new children fade in after the camera move.
pub const ENTRANCE_DURATION: Duration = Duration::from_millis(600);

/// One expansion cycle as seen by the view. The phase carries its own
/// timestamps, so starting a new cycle implicitly cancels any pending
/// settle deadline from the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Idle,
    /// Click accepted, collaborator call outstanding.
    AwaitingGeneration { node: ComponentId },
    /// Children merged, waiting for the next layout pass.
    AwaitingLayout {
        node: ComponentId,
        new_children: Vec<ComponentId>,
    },
    /// Camera gliding toward the expanded node.
    Focusing {
        node: ComponentId,
        new_children: Vec<ComponentId>,
        since: Instant,
    },
    /// Entrance animation running; marks are cleared at the deadline.
    Settling {
        node: ComponentId,
        new_children: Vec<ComponentId>,
        since: Instant,
        deadline: Instant,
    },
}

#[derive(Debug, Clone)]
pub struct ExpansionCycle {
    phase: Phase,
}

impl Default for ExpansionCycle {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpansionCycle {
    pub fn new() -> Self {
        Self { phase: Phase::Idle }
    }

    /// Accept a click on `node`. Returns false when a generation is already
    /// outstanding for this cycle; the view should ignore the click.
    pub fn begin(&mut self, node: ComponentId) -> bool {
        match self.phase {
            Phase::AwaitingGeneration { .. } | Phase::AwaitingLayout { .. } => false,
            _ => {
                self.phase = Phase::AwaitingGeneration { node };
                true
            }
        }
    }

    /// The controller merged children for `node`.
    pub fn generation_finished(&mut self, node: ComponentId, new_children: Vec<ComponentId>) {
        if matches!(self.phase, Phase::AwaitingGeneration { node: n } if n == node) {
            self.phase = Phase::AwaitingLayout { node, new_children };
        }
    }

    /// The collaborator call failed; the cycle ends with nothing to animate.
    pub fn generation_failed(&mut self) {
        if matches!(
            self.phase,
            Phase::AwaitingGeneration { .. } | Phase::AwaitingLayout { .. }
        ) {
            self.phase = Phase::Idle;
        }
    }

    /// Positions were applied; start the camera glide.
    pub fn layout_applied(&mut self, now: Instant) {
        if let Phase::AwaitingLayout { node, new_children } = self.phase.clone() {
            self.phase = Phase::Focusing {
                node,
                new_children,
                since: now,
            };
        }
    }

    /// Advance timers. Returns true exactly once per cycle, at the moment
    /// the settle window elapses and transient marks should be cleared.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.phase.clone() {
            Phase::Focusing {
                node,
                new_children,
                since,
            } if now.duration_since(since) >= FOCUS_DURATION => {
                self.phase = Phase::Settling {
                    node,
                    new_children,
                    since,
                    deadline: since + FOCUS_DURATION + ENTRANCE_DURATION,
                };
                false
            }
            Phase::Settling { deadline, .. } if now >= deadline => {
                self.phase = Phase::Idle;
                true
            }
            _ => false,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// Node showing a loading affordance, if any.
    pub fn loading_node(&self) -> Option<ComponentId> {
        match &self.phase {
            Phase::AwaitingGeneration { node } | Phase::AwaitingLayout { node, .. } => Some(*node),
            _ => None,
        }
    }

    /// Node the camera should be centered on, if any.
    pub fn focus_node(&self) -> Option<ComponentId> {
        match &self.phase {
            Phase::Focusing { node, .. } | Phase::Settling { node, .. } => Some(*node),
            _ => None,
        }
    }

    pub fn new_children(&self) -> &[ComponentId] {
        match &self.phase {
            Phase::AwaitingLayout { new_children, .. }
            | Phase::Focusing { new_children, .. }
            | Phase::Settling { new_children, .. } => new_children,
            _ => &[],
        }
    }

    /// Fade-in progress for newly added nodes, 0.0 to 1.0.
    pub fn entrance_alpha(&self, now: Instant) -> f32 {
        match &self.phase {
            Phase::Focusing { since, .. } | Phase::Settling { since, .. } => {
                let elapsed = now.duration_since(*since).as_secs_f32();
                (elapsed / ENTRANCE_DURATION.as_secs_f32()).clamp(0.0, 1.0)
            }
            _ => 1.0,
        }
    }

    /// True while a repaint should be requested every frame.
    pub fn is_animating(&self) -> bool {
        matches!(self.phase, Phase::Focusing { .. } | Phase::Settling { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODE: ComponentId = ComponentId(1);
    const OTHER: ComponentId = ComponentId(2);

    fn children() -> Vec<ComponentId> {
        vec![ComponentId(5), ComponentId(6)]
    }

    #[test]
    fn test_full_cycle_walkthrough() {
        let start = Instant::now();
        let mut cycle = ExpansionCycle::new();

        assert!(cycle.begin(NODE));
        assert_eq!(cycle.loading_node(), Some(NODE));

        cycle.generation_finished(NODE, children());
        assert_eq!(cycle.loading_node(), Some(NODE));
        assert_eq!(cycle.new_children(), children());

        cycle.layout_applied(start);
        assert_eq!(cycle.loading_node(), None);
        assert_eq!(cycle.focus_node(), Some(NODE));

        // Still focusing.
        assert!(!cycle.tick(start + FOCUS_DURATION / 2));
        // Focus elapsed, now settling.
        assert!(!cycle.tick(start + FOCUS_DURATION));
        assert_eq!(cycle.focus_node(), Some(NODE));
        // Settle window elapsed, clear marks once.
        assert!(cycle.tick(start + FOCUS_DURATION + ENTRANCE_DURATION));
        assert!(cycle.is_idle());
        assert!(!cycle.tick(start + FOCUS_DURATION + ENTRANCE_DURATION * 2));
    }

    #[test]
    fn test_clicks_rejected_while_generation_outstanding() {
        let mut cycle = ExpansionCycle::new();
        assert!(cycle.begin(NODE));
        assert!(!cycle.begin(OTHER));
        cycle.generation_finished(NODE, children());
        assert!(!cycle.begin(OTHER));
    }

    #[test]
    fn test_failure_returns_to_idle() {
        let mut cycle = ExpansionCycle::new();
        cycle.begin(NODE);
        cycle.generation_failed();
        assert!(cycle.is_idle());
        assert_eq!(cycle.loading_node(), None);
        assert!(cycle.begin(OTHER));
    }

    #[test]
    fn test_new_cycle_cancels_pending_settle_deadline() {
        let start = Instant::now();
        let mut cycle = ExpansionCycle::new();
        cycle.begin(NODE);
        cycle.generation_finished(NODE, children());
        cycle.layout_applied(start);
        cycle.tick(start + FOCUS_DURATION);
        let old_deadline = start + FOCUS_DURATION + ENTRANCE_DURATION;

        // Second expansion starts inside the settle window.
        assert!(cycle.begin(OTHER));
        assert_eq!(cycle.loading_node(), Some(OTHER));

        // The stale deadline must not fire against the new cycle.
        assert!(!cycle.tick(old_deadline + ENTRANCE_DURATION));
        assert_eq!(cycle.loading_node(), Some(OTHER));
    }

    #[test]
    fn test_mismatched_generation_result_is_ignored() {
        let mut cycle = ExpansionCycle::new();
        cycle.begin(NODE);
        cycle.generation_finished(OTHER, children());
        assert_eq!(cycle.loading_node(), Some(NODE));
        assert!(cycle.new_children().is_empty());
    }

    #[test]
    fn test_entrance_alpha_ramps_during_settle() {
        let start = Instant::now();
        let mut cycle = ExpansionCycle::new();
        cycle.begin(NODE);
        cycle.generation_finished(NODE, children());
        cycle.layout_applied(start);

        assert_eq!(cycle.entrance_alpha(start), 0.0);
        let mid = cycle.entrance_alpha(start + ENTRANCE_DURATION / 2);
        assert!(mid > 0.4 && mid < 0.6);
        assert_eq!(cycle.entrance_alpha(start + ENTRANCE_DURATION * 2), 1.0);
        // Outside a cycle, nodes render fully opaque.
        assert_eq!(ExpansionCycle::new().entrance_alpha(start), 1.0);
    }
}
