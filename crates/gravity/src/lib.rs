//! The multi-lens orchestrator: a gravity pass fans one query embedding out
//! to several recall-scoped lenses, then measures how strongly those lenses
//! agree (convergence) or disagree (divergence) with each other.

pub mod coherence;
pub mod compose;
pub mod convergence;
pub mod divergence;
pub mod lens;
pub mod schema;

use anyhow::Result;
use futures::future::join_all;
use memoria_attention::recall_with_embedding;
use memoria_graph::EmbedClient;
use memoria_store::Store;

pub use lens::{resolve_lenses, LensSelection, GRAVITY_MAX_LENSES};
pub use schema::{ConvergencePoint, DivergenceNote, GravityResult, LensResult};

const DEFAULT_LENS_BUDGET: usize = 2000;
const DEFAULT_COMPOSE_BUDGET: usize = 6000;

/// Run one gravity pass (spec §4.14): resolve lenses, embed the query once,
/// fan out a scoped recall per lens in parallel, detect convergence and
/// divergence between every lens pair, compute field coherence, and compose
/// the budget-constrained three-band output.
pub async fn gravity_recall(
    store: &dyn Store,
    embed_client: &dyn EmbedClient,
    query: &str,
    selection: LensSelection<'_>,
    compose_budget: usize,
) -> Result<GravityResult> {
    let lens_specs = resolve_lenses(store, selection).await?;
    let embedding = embed_client.embed(&[query.to_string()]).await?.pop().unwrap_or_default();

    let recalls = lens_specs.iter().map(|spec| {
        recall_with_embedding(
            store,
            &embedding,
            Some(spec.project_uuid),
            DEFAULT_LENS_BUDGET,
            memoria_attention::DEFAULT_MIN_SCORE,
        )
    });
    let recall_results = join_all(recalls).await;

    let mut lenses = Vec::with_capacity(lens_specs.len());
    for (spec, result) in lens_specs.iter().zip(recall_results) {
        let hits = match result {
            Ok(recall) => recall.results,
            Err(err) => {
                tracing::warn!(error = %err, project = %spec.project_uuid, "lens recall failed, treating as empty");
                Vec::new()
            }
        };
        lenses.push(LensResult {
            project_uuid: spec.project_uuid,
            role: spec.role,
            gravity_type: spec.role.gravity_type(),
            weight: spec.weight.unwrap_or(1.0),
            hits,
        });
    }

    let convergence_points = convergence::find_convergence(&lenses);
    let divergence_notes = divergence::find_divergence(&lenses);
    let field_coherence = coherence::field_coherence(&lenses, &convergence_points, &divergence_notes);
    let context_text = compose::compose(&lenses, &convergence_points, &divergence_notes, compose_budget);

    Ok(GravityResult {
        lenses,
        convergence_points,
        divergence_notes,
        field_coherence,
        context_text,
    })
}
