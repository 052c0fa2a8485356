use async_trait::async_trait;

use crate::context::RequestContext;
use crate::intent::Intent;
use crate::output::AgentOutput;

/// The two-method contract every agent implements.
///
/// Agents are stateless processors: they read the context, do their one job,
/// and return structured output. They never call other agents, never pick the
/// next step, and never mutate shared state; the router owns the pipeline.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Stable agent name used in traces and pipeline sequences.
    fn name(&self) -> &'static str;

    /// Whether this agent should process the given intent.
    fn can_handle(&self, ctx: &RequestContext, intent: Intent) -> bool;

    /// Execute the agent's task. Errors are reported inside the returned
    /// [`AgentOutput`] (`error` set, content describing the condition) so the
    /// router can record them and continue the pipeline.
    async fn run(&self, ctx: &RequestContext) -> AgentOutput;
}
