use crate::constants::SCORE_INF;
use crate::types::Score;

/// A move at the root together with its search results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootMove<M> {
    mv: M,
    /// Score from the current iteration
    pub score: Score,
    /// Score from the previous iteration
    pub previous_score: Score,
    /// Principal variation, normally starting with the root move
    pub pv: Vec<M>,
}

impl<M: Copy> RootMove<M> {
    /// Creates a root move that has not been searched yet.
    pub fn new(mv: M) -> Self {
        RootMove {
            mv,
            score: -SCORE_INF,
            previous_score: -SCORE_INF,
            pv: vec![mv],
        }
    }

    /// The move this entry stands for.
    #[inline]
    pub fn mv(&self) -> M {
        self.mv
    }
}

/// Sorts root moves by descending score, keeping the order of equal scores.
pub fn sort_root_moves<M>(moves: &mut [RootMove<M>]) {
    moves.sort_by(|a, b| b.score.cmp(&a.score));
}
