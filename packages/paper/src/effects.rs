use crate::descriptor::Paper;

/// Hook for decorative node generators
///
/// Invoked during a full node resync for descriptors carrying an effect
/// flag (`logo`), before content is computed. What the hook does with the
/// descriptor is its own business.
pub trait EffectHook {
    fn apply(&self, paper: &mut Paper);
}

impl<F> EffectHook for F
where
    F: Fn(&mut Paper),
{
    fn apply(&self, paper: &mut Paper) {
        self(paper)
    }
}
