//! Cut points and catch points.
//!
//! Both are immutable nodes of parent-linked chains. A choice or a frame
//! that needs one holds an `Rc` to it; nothing ever points back down the
//! chain.
use std::rc::Rc;

use crate::bindings::Bsp;
use crate::terms::Term;
use crate::vm::Cont;

/// Where `!` prunes the choice stack to.
#[derive(Debug)]
pub enum CutPoint {
    /// Installed per clause activation and by `call/N`. `!` never prunes
    /// below a barrier.
    Barrier { depth: usize },
    /// Lets `!` reach through to the enclosing scope.
    Transparent { depth: usize, parent: Rc<CutPoint> },
}

impl CutPoint {
    pub fn barrier(depth: usize) -> Rc<Self> {
        Rc::new(Self::Barrier { depth })
    }

    pub fn transparent(depth: usize, parent: Rc<CutPoint>) -> Rc<Self> {
        Rc::new(Self::Transparent { depth, parent })
    }

    /// The choice-stack depth when this node became active.
    pub fn depth(&self) -> usize {
        match self {
            Self::Barrier { depth } | Self::Transparent { depth, .. } => *depth,
        }
    }

    /// The depth `!` truncates the choice stack to: that of the nearest
    /// barrier.
    pub fn cut_depth(&self) -> usize {
        let mut node = self;
        loop {
            match node {
                Self::Barrier { depth } => return *depth,
                Self::Transparent { parent, .. } => node = parent,
            }
        }
    }
}

/// An active `catch/3`.
#[derive(Debug)]
pub struct CatchPoint {
    pub catcher: Term,
    pub recovery: Term,
    /// What runs after the recovery goal.
    pub cont: Cont,
    pub choice_depth: usize,
    pub bsp: Bsp,
    pub data_depth: usize,
    pub parent: Option<Rc<CatchPoint>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cut_depth_reaches_nearest_barrier() {
        let clause = CutPoint::barrier(3);
        let branch = CutPoint::transparent(5, clause.clone());
        let nested = CutPoint::transparent(8, branch.clone());
        assert_eq!(nested.depth(), 8);
        assert_eq!(nested.cut_depth(), 3);
        assert_eq!(branch.cut_depth(), 3);

        let call = CutPoint::barrier(9);
        assert_eq!(call.cut_depth(), 9);
    }
}
