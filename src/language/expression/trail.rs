use std::fmt;

/// Path of operand indices leading from the root of a rule pattern to one of its nodes
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Trail(Vec<usize>);

impl Trail {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the trail of the `index`-th operand of the node at this trail
    pub fn child(&self, index: usize) -> Self {
        let mut positions = self.0.clone();
        positions.push(index);
        Self(positions)
    }

    /// Splits the trail into its parent trail and the last position, or `None` for the root
    pub fn split_last(&self) -> Option<(Trail, usize)> {
        let (last, parent) = self.0.split_last()?;
        Some((Self(parent.to_vec()), *last))
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<usize>> for Trail {
    fn from(positions: Vec<usize>) -> Self {
        Self(positions)
    }
}

/// Formats as the suffix of a temporary name, `_0_1` for `[0, 1]`
impl fmt::Display for Trail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for position in &self.0 {
            write!(f, "_{position}")?;
        }
        Ok(())
    }
}
