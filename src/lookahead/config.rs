/// Tunables for the lookahead engine. Defaults follow the march-style settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookaheadConfig {
    /// Deepest h-score level kept; deeper decisions reuse the last one.
    pub max_hlevel: usize,
    /// Weight of binary-implication neighbours in an h-score sweep.
    pub alpha: f32,
    /// Upper bound of a single literal score.
    pub max_score: f32,
    /// Minimum number of candidates kept by pre-selection.
    pub min_cutoff: usize,
    /// Candidate budget at level `l` is `level_cand / l`.
    pub level_cand: usize,
    /// Expected success rate of double lookahead; drives the trigger decay.
    pub dl_success: f64,
    pub seed: u64,
    pub max_decisions: Option<u64>,
    pub double_lookahead: bool,
    pub local_learning: bool,
}

impl Default for LookaheadConfig {
    fn default() -> Self {
        Self {
            max_hlevel: 50,
            alpha: 3.5,
            max_score: 20.0,
            min_cutoff: 30,
            level_cand: 600,
            dl_success: 0.8,
            seed: 0,
            max_decisions: None,
            double_lookahead: true,
            local_learning: true,
        }
    }
}
