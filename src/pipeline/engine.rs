//! Refinement engine: resolves a message chain to a fixpoint.
//!
//! Each round scans the chain left to right for the first refinable element
//! (recognizing service messages through the registry on the way), resolves
//! it, and splices the result into its position. The scan then restarts,
//! because a replacement may itself be refinable.
//!
//! Every position carries a depth: input elements start at the pass's base
//! depth and substituted elements get their parent's depth plus one. Asking
//! to refine an element at `max_depth` is a fatal `DepthExceeded`.
//!
//! Errors abort the pass at once. Elements substituted earlier stay
//! substituted and the failing element stays where it was.

use std::sync::Arc;

use futures::future::{BoxFuture, join_all};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RefineConfig;
use crate::context::{RefineContext, Session};
use crate::error::RefineError;
use crate::pipeline::registry::VariantRegistry;
use crate::pipeline::types::{MessageChain, MessageElement, ResourceDownloader};
use crate::pipeline::variants::Refinable;

/// What a refinement pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefineOutcome {
    /// Scans performed, including the final one that found nothing.
    pub rounds: usize,
    /// Elements resolved, including those inside forwarded nodes.
    pub resolved: usize,
}

impl RefineOutcome {
    fn absorb(&mut self, nested: RefineOutcome) {
        self.rounds += nested.rounds;
        self.resolved += nested.resolved;
    }
}

/// Drives resolution of message chains.
///
/// Holds no per-chain state, so one engine can serve many chains at once.
/// A single chain must not be refined from two places concurrently.
pub struct RefineEngine {
    downloader: Arc<dyn ResourceDownloader>,
    registry: VariantRegistry,
    config: RefineConfig,
}

impl RefineEngine {
    /// Create an engine with the builtin variant registry.
    pub fn new(downloader: Arc<dyn ResourceDownloader>, config: RefineConfig) -> Self {
        Self {
            downloader,
            registry: VariantRegistry::builtin(),
            config,
        }
    }

    /// Replace the variant registry.
    pub fn with_registry(mut self, registry: VariantRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Refine an owned chain and hand it back fully resolved.
    pub async fn refine(
        &self,
        session: &Session,
        mut chain: MessageChain,
        context: &RefineContext,
    ) -> Result<MessageChain, RefineError> {
        self.refine_in_place(session, &mut chain, context).await?;
        Ok(chain)
    }

    /// Refine `chain` in place.
    ///
    /// Dropping the returned future cancels the in-flight fetch; `chain` then
    /// holds whatever was substituted before it.
    pub async fn refine_in_place(
        &self,
        session: &Session,
        chain: &mut MessageChain,
        context: &RefineContext,
    ) -> Result<RefineOutcome, RefineError> {
        let pass_id = Uuid::new_v4();
        debug!(%pass_id, len = chain.len(), "Starting refinement pass");

        match self.refine_at_depth(session, chain, context, 0, 0).await {
            Ok(outcome) => {
                if outcome.resolved > 0 {
                    info!(
                        %pass_id,
                        resolved = outcome.resolved,
                        rounds = outcome.rounds,
                        "Refinement pass complete"
                    );
                }
                Ok(outcome)
            }
            Err(e) => {
                warn!(%pass_id, error = %e, "Refinement pass failed");
                Err(e)
            }
        }
    }

    /// Refine independent chains concurrently.
    ///
    /// Each chain gets its own result; one failure doesn't affect the others.
    pub async fn refine_batch(
        &self,
        session: &Session,
        chains: Vec<MessageChain>,
        context: &RefineContext,
    ) -> Vec<Result<MessageChain, RefineError>> {
        let count = chains.len();
        info!(count, "Refining chain batch");

        let results = join_all(
            chains
                .into_iter()
                .map(|chain| self.refine(session, chain, context)),
        )
        .await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        info!(
            resolved = count - failed,
            failed,
            total = count,
            "Batch refinement complete"
        );
        results
    }

    /// The scan/resolve/substitute loop for one chain.
    ///
    /// Boxed because forwarded nodes are refined by recursing into this.
    /// `prior_rounds` is how many rounds the enclosing chains already ran, so
    /// `DepthExceeded` reports the total for the whole pass.
    fn refine_at_depth<'a>(
        &'a self,
        session: &'a Session,
        chain: &'a mut MessageChain,
        context: &'a RefineContext,
        base_depth: u32,
        prior_rounds: usize,
    ) -> BoxFuture<'a, Result<RefineOutcome, RefineError>> {
        Box::pin(async move {
            let mut depths = vec![base_depth; chain.len()];
            let mut outcome = RefineOutcome::default();

            loop {
                outcome.rounds += 1;

                let Some((index, target)) = self.registry.first_refinable(chain) else {
                    return Ok(outcome);
                };

                let depth = depths.get(index).copied().unwrap_or(base_depth);
                if depth >= self.config.max_depth {
                    warn!(
                        kind = %target.kind(),
                        resource_id = %target.resource_id(),
                        depth,
                        limit = self.config.max_depth,
                        "Refinement depth limit reached"
                    );
                    return Err(RefineError::DepthExceeded {
                        limit: self.config.max_depth,
                        rounds: prior_rounds + outcome.rounds,
                    });
                }

                let mut replacement = self.resolve(session, chain, &target, context).await?;

                if self.config.refine_forward_nodes {
                    for element in replacement.iter_mut() {
                        let MessageElement::Forward(forward) = element else {
                            continue;
                        };
                        for node in forward.node_list.iter_mut() {
                            let nested = self
                                .refine_at_depth(
                                    session,
                                    &mut node.message_chain,
                                    context,
                                    depth + 1,
                                    prior_rounds + outcome.rounds,
                                )
                                .await?;
                            outcome.absorb(nested);
                        }
                    }
                }

                let produced = replacement.len();
                chain.replace_at(index, replacement);
                depths.splice(index..=index, std::iter::repeat_n(depth + 1, produced));
                outcome.resolved += 1;

                debug!(
                    kind = %target.kind(),
                    resource_id = %target.resource_id(),
                    index,
                    produced,
                    depth,
                    "Substituted refined element"
                );
            }
        })
    }

    /// Run one variant, bounded by the configured fetch timeout.
    async fn resolve(
        &self,
        session: &Session,
        chain: &MessageChain,
        target: &Refinable,
        context: &RefineContext,
    ) -> Result<Vec<MessageElement>, RefineError> {
        let refine = target.refine(self.downloader.as_ref(), session, chain, context);

        match self.config.fetch_timeout {
            Some(timeout) => tokio::time::timeout(timeout, refine)
                .await
                .map_err(|_| RefineError::Timeout {
                    kind: target.kind(),
                    resource_id: target.resource_id().clone(),
                    timeout,
                })?,
            None => refine.await,
        }
    }
}
