use crate::jvm::{BaseType, FieldType};
use crate::util::Width;

/// Number of operand-stack or local-variable slots a value occupies
///
/// Only the two 64-bit primitive categories (`long` and `double`) occupy two
/// slots; every reference and every other primitive occupies one. `Zero` is
/// the classification of `void`-typed contexts.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum StackSize {
    Zero,
    Single,
    Double,
}

impl StackSize {
    /// Number of slots
    pub const fn size(self) -> usize {
        match self {
            StackSize::Zero => 0,
            StackSize::Single => 1,
            StackSize::Double => 2,
        }
    }

    /// Classification for a given slot width
    ///
    /// Widths other than 0, 1, and 2 do not occur in the format.
    pub fn of_width(width: usize) -> StackSize {
        match width {
            0 => StackSize::Zero,
            1 => StackSize::Single,
            2 => StackSize::Double,
            _ => unreachable!("no stack value is {} slots wide", width),
        }
    }

    /// The wider of two sizes
    ///
    /// This is total (`Zero < Single < Double`) and is what two merging
    /// branches must agree on for the slot widths of their frames.
    pub fn maximum(self, other: StackSize) -> StackSize {
        std::cmp::max(self, other)
    }

    /// The effect of pushing a value of this size onto the stack
    pub const fn to_increasing_size(self) -> Size {
        Size::new(self.size() as i32, self.size() as i32)
    }

    /// The effect of popping a value of this size off the stack
    pub const fn to_decreasing_size(self) -> Size {
        Size::new(-(self.size() as i32), 0)
    }
}

impl From<BaseType> for StackSize {
    fn from(base_type: BaseType) -> StackSize {
        match base_type {
            BaseType::Long | BaseType::Double => StackSize::Double,
            _ => StackSize::Single,
        }
    }
}

impl<C> From<&FieldType<C>> for StackSize {
    fn from(field_type: &FieldType<C>) -> StackSize {
        match field_type {
            FieldType::Base(base_type) => StackSize::from(*base_type),
            FieldType::Ref(_) => StackSize::Single,
        }
    }
}

/// Classification of an optional (`None` = `void`) value type
impl<C> From<Option<&FieldType<C>>> for StackSize {
    fn from(field_type: Option<&FieldType<C>>) -> StackSize {
        field_type.map_or(StackSize::Zero, StackSize::from)
    }
}

impl Width for StackSize {
    fn width(&self) -> usize {
        self.size()
    }
}

/// Effect of a chunk of emitted code on the operand stack
///
/// `impact` is the net change of the stack depth after the code ran;
/// `maximal` is the peak interim depth the code required on top of its
/// starting depth. Aggregation of two sequential effects must account for
/// the second chunk's peak occurring on top of whatever the first already
/// left behind, which is why it is not a plain component-wise maximum.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Size {
    impact: i32,
    maximal: i32,
}

impl Size {
    /// The effect of code that does not touch the stack
    pub const ZERO: Size = Size::new(0, 0);

    pub const fn new(impact: i32, maximal: i32) -> Size {
        Size { impact, maximal }
    }

    /// Net change of the stack depth
    pub const fn impact(self) -> i32 {
        self.impact
    }

    /// Peak interim depth required, relative to the starting depth
    pub const fn maximal(self) -> i32 {
        self.maximal
    }

    /// Effect of this chunk of code followed by another
    pub const fn aggregate(self, next: Size) -> Size {
        Size::new(
            self.impact + next.impact,
            max_i32(self.maximal, self.impact + next.maximal),
        )
    }
}

const fn max_i32(a: i32, b: i32) -> i32 {
    if a > b {
        a
    } else {
        b
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn slot_counts() {
        assert_eq!(StackSize::Zero.size(), 0);
        assert_eq!(StackSize::Single.size(), 1);
        assert_eq!(StackSize::Double.size(), 2);
        assert_eq!(StackSize::of_width(2), StackSize::Double);
        assert_eq!(StackSize::from(BaseType::Int), StackSize::Single);
        assert_eq!(StackSize::from(BaseType::Long), StackSize::Double);
    }

    #[test]
    fn maximum_is_commutative_associative_with_zero_identity() {
        let sizes = [StackSize::Zero, StackSize::Single, StackSize::Double];
        for a in sizes {
            assert_eq!(a.maximum(StackSize::Zero), a);
            assert_eq!(StackSize::Zero.maximum(a), a);
            assert_eq!(a.maximum(StackSize::Double), StackSize::Double);
            for b in sizes {
                assert_eq!(a.maximum(b), b.maximum(a));
                for c in sizes {
                    assert_eq!(a.maximum(b).maximum(c), a.maximum(b.maximum(c)));
                }
            }
        }
    }

    #[test]
    fn directional_sizes() {
        assert_eq!(StackSize::Double.to_increasing_size(), Size::new(2, 2));
        assert_eq!(StackSize::Double.to_decreasing_size(), Size::new(-2, 0));
        assert_eq!(StackSize::Zero.to_increasing_size(), Size::ZERO);
    }

    #[test]
    fn aggregation_tracks_running_peak() {
        // The second chunk's peak happens on top of the first chunk's impact
        assert_eq!(
            Size::new(3, 3).aggregate(Size::new(-2, 1)),
            Size::new(1, 3)
        );
        // A naive component-wise maximum would report 4 here instead of 5
        assert_eq!(
            Size::new(2, 3).aggregate(Size::new(0, 3)),
            Size::new(2, 5)
        );
        assert_eq!(
            Size::new(-1, 0).aggregate(Size::new(2, 2)),
            Size::new(1, 1)
        );
        assert_eq!(Size::ZERO.aggregate(Size::new(1, 1)), Size::new(1, 1));

        // Chains fold left-to-right
        let chain = [
            Size::new(1, 1),
            Size::new(1, 1),
            Size::new(-1, 0),
            Size::new(-1, 0),
        ];
        let folded = chain.into_iter().fold(Size::ZERO, Size::aggregate);
        assert_eq!(folded, Size::new(0, 2));
    }
}
