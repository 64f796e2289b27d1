//! Commands sent to the generation worker.

use neurorack_core::FeatureSelector;

pub(crate) enum PipelineCommand {
    /// Discard everything generated so far and start over from frame 0.
    Restart(FeatureSelector),
    Shutdown,
}

impl std::fmt::Debug for PipelineCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Restart(selector) => {
                let kind = match selector {
                    FeatureSelector::Active => "active",
                    FeatureSelector::Source(_) => "source",
                    FeatureSelector::Blend(_) => "blend",
                    FeatureSelector::Features(_) => "features",
                };
                f.debug_tuple("Restart").field(&kind).finish()
            }
            Self::Shutdown => write!(f, "Shutdown"),
        }
    }
}
