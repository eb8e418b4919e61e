/// Back-pointer from a leaf to the node slot holding it.
///
/// The identity of a leaf is implicit in its position within the leaf array.
/// The node index lives in the low 31 bits, the child slot in the high bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Leaf {
    packed: u32,
}

impl Leaf {
    const NODE_MASK: u32 = 0x7FFF_FFFF;

    #[inline(always)]
    pub fn new(node_index: i32, child_index: i32) -> Self {
        debug_assert!(node_index >= 0, "Leaves must live in an existing node.");
        debug_assert!(
            (child_index & !1) == 0,
            "Binary trees can't have children in slots other than 0 and 1!"
        );
        Self {
            packed: (node_index as u32 & Self::NODE_MASK) | ((child_index as u32) << 31),
        }
    }

    /// Index of the node that directly holds the leaf.
    #[inline(always)]
    pub fn node_index(&self) -> i32 {
        (self.packed & Self::NODE_MASK) as i32
    }

    /// Slot of the owning node the leaf occupies.
    #[inline(always)]
    pub fn child_index(&self) -> i32 {
        (self.packed >> 31) as i32
    }
}
