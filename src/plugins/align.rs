//! Phase aligner: makes `evolutionary_phase` agree with the directory tree.

use crate::core::document::Document;
use crate::core::error::DmctError;
use crate::core::pass::{DocumentPass, Outcome, PassContext};
use crate::core::phase;

pub struct AlignPass;

impl DocumentPass for AlignPass {
    fn name(&self) -> &'static str {
        "align-phases"
    }

    fn verb(&self) -> &'static str {
        "aligned"
    }

    fn apply(&self, doc: &mut Document, ctx: &PassContext<'_>) -> Result<Outcome, DmctError> {
        let Some(target) = phase::resolve_in_root(ctx.root, &doc.path) else {
            return Ok(Outcome::skipped("outside any phase directory"));
        };

        let before = match doc.declared_phase() {
            Some(Ok(declared)) if declared == target => {
                return Ok(Outcome::skipped(format!("already {}", target)));
            }
            Some(Ok(declared)) => declared.to_string(),
            Some(Err(err)) => {
                tracing::debug!(path = %doc.path.display(), error = %err, "overwriting unknown phase");
                doc.front_matter
                    .get_str(crate::core::document::KEY_PHASE)
                    .unwrap_or_default()
                    .to_string()
            }
            None => "unset".to_string(),
        };

        doc.set_phase(target);
        doc.touch(&ctx.now);
        Ok(Outcome::updated(format!("{} -> {}", before, target)))
    }
}
