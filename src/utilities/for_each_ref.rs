/// Defines a loop body function able to handle the equivalent of a foreach's body.
pub trait BreakableForEach<T> {
    /// Executes one execution of the loop body.
    ///
    /// # Arguments
    ///
    /// * `i` - Visited element.
    ///
    /// # Returns
    ///
    /// True if the loop should continue, false otherwise.
    fn loop_body(&mut self, i: T) -> bool;
}

impl<T, F: FnMut(T) -> bool> BreakableForEach<T> for F {
    #[inline(always)]
    fn loop_body(&mut self, i: T) -> bool {
        self(i)
    }
}

/// Collects every visited element.
#[derive(Debug)]
pub struct CollectingEnumerator<T> {
    pub items: Vec<T>,
}

impl<T> Default for CollectingEnumerator<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> BreakableForEach<T> for CollectingEnumerator<T> {
    #[inline(always)]
    fn loop_body(&mut self, i: T) -> bool {
        self.items.push(i);
        true
    }
}
