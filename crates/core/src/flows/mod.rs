pub mod engine;
pub mod states;

pub use engine::{FlowDefinition, FlowEngine, StorefrontFlow};
pub use states::{
    parse_quantity, split_command, DialogueAction, DialogueContext, DialogueEvent, DialogueState,
    TransitionOutcome, UnknownStateTag,
};
