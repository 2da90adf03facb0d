//! Call envelope: which function to run, and with what

use super::signature::TargetId;

/// A captured call, ready to be encoded
///
/// `Args` is the argument tuple in the target's parameter order. An envelope is
/// built once at the call site, encoded, and consumed by exactly one
/// trampoline on the other side.
#[derive(Debug, Clone, PartialEq)]
pub struct CallEnvelope<Args> {
    target: TargetId,
    arguments: Args,
}

impl<Args> CallEnvelope<Args> {
    pub fn new(target: TargetId, arguments: Args) -> Self {
        Self { target, arguments }
    }

    pub fn target(&self) -> TargetId {
        self.target
    }

    pub fn arguments(&self) -> &Args {
        &self.arguments
    }

    pub fn into_arguments(self) -> Args {
        self.arguments
    }

    pub fn into_parts(self) -> (TargetId, Args) {
        (self.target, self.arguments)
    }
}
