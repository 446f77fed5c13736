pub mod action;
pub mod policy;

pub use action::{Action, DecisionError, Phase};
pub use policy::{
    ChatLine, DecisionContext, DecisionProvider, DecisionRequest, HeuristicOptions,
    HeuristicProvider, HumanProvider, SILENT_MARKER, ScriptedProvider,
};
