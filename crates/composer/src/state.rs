//! Lifecycle of a composer.

/// Lifecycle state of a [`Composer`](crate::Composer).
///
/// ```text
/// Created ──initialize_step──▶ Initialized ──random_*_init──▶ ParamInitialized ──finalize_step──▶ Estimated
///                                   ▲                               │
///                                   └────────initialize_step────────┘
/// ```
///
/// Algorithm iterations mutate the model without changing the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComposerState {
    /// Built, latent state not yet reset.
    Created,
    /// Latent state reset to uniform defaults.
    Initialized,
    /// Parameters drawn by one of the random initializations.
    ParamInitialized,
    /// Final likelihood and labels computed.
    Estimated,
}

impl ComposerState {
    /// Returns `true` once a parameter set has been drawn or estimated.
    pub fn has_parameters(self) -> bool {
        matches!(self, Self::ParamInitialized | Self::Estimated)
    }
}
