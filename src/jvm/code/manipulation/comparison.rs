use crate::jvm::code::{FrameDirective, FrameItem, InstructionSink, Opcode, Size, StackSize};

/// Relational operator of a [`PrimitiveComparison`]
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

/// Primitive numeric category of a [`PrimitiveComparison`]
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ComparisonCategory {
    Integer,
    Long,
    Float,
    Double,
}

impl ComparisonCategory {
    const fn operand_size(self) -> StackSize {
        match self {
            ComparisonCategory::Integer | ComparisonCategory::Float => StackSize::Single,
            ComparisonCategory::Long | ComparisonCategory::Double => StackSize::Double,
        }
    }
}

/// Compare the two topmost operands of a primitive category, leaving a
/// boolean-valued `int` on the stack
///
/// The `int` category branches directly on its operands; the other
/// categories first collapse their operands into a signed tri-state `int`
/// with a category-comparison instruction and branch on that. For `float`
/// and `double`, the comparison variant is chosen so that an unordered
/// result (a NaN operand) makes the comparison yield `false`.
///
/// Both sides of the branch merge at a join point carrying exactly one
/// `int`; the stack-map frames declared at the two labels are relative to
/// the enclosing method's last declared frame, so the comparison must run at
/// a point where its operands are the only values above that frame.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct PrimitiveComparison {
    operator: ComparisonOperator,
    category: ComparisonCategory,
}

impl PrimitiveComparison {
    pub const fn new(
        operator: ComparisonOperator,
        category: ComparisonCategory,
    ) -> PrimitiveComparison {
        PrimitiveComparison { operator, category }
    }

    /// The instruction collapsing both operands into a tri-state `int`, if
    /// the category needs one
    const fn comparison_opcode(self) -> Option<Opcode> {
        match self.category {
            ComparisonCategory::Integer => None,
            ComparisonCategory::Long => Some(Opcode::Lcmp),
            // An unordered result must fail the comparison: `..cmpg` pushes
            // +1 on NaN (falsifying less-than forms), `..cmpl` pushes -1
            // (falsifying the rest)
            ComparisonCategory::Float => match self.operator {
                ComparisonOperator::LessThan | ComparisonOperator::LessOrEqual => {
                    Some(Opcode::Fcmpg)
                }
                _ => Some(Opcode::Fcmpl),
            },
            ComparisonCategory::Double => match self.operator {
                ComparisonOperator::LessThan | ComparisonOperator::LessOrEqual => {
                    Some(Opcode::Dcmpg)
                }
                _ => Some(Opcode::Dcmpl),
            },
        }
    }

    /// The conditional branch taken when the comparison holds
    const fn branch_opcode(self) -> Opcode {
        match self.category {
            ComparisonCategory::Integer => match self.operator {
                ComparisonOperator::Equals => Opcode::IfIcmpeq,
                ComparisonOperator::NotEquals => Opcode::IfIcmpne,
                ComparisonOperator::LessThan => Opcode::IfIcmplt,
                ComparisonOperator::LessOrEqual => Opcode::IfIcmple,
                ComparisonOperator::GreaterThan => Opcode::IfIcmpgt,
                ComparisonOperator::GreaterOrEqual => Opcode::IfIcmpge,
            },
            _ => match self.operator {
                ComparisonOperator::Equals => Opcode::Ifeq,
                ComparisonOperator::NotEquals => Opcode::Ifne,
                ComparisonOperator::LessThan => Opcode::Iflt,
                ComparisonOperator::LessOrEqual => Opcode::Ifle,
                ComparisonOperator::GreaterThan => Opcode::Ifgt,
                ComparisonOperator::GreaterOrEqual => Opcode::Ifge,
            },
        }
    }

    /// Both operands are consumed and a single-slot boolean is produced, so
    /// the decrease depends on the input category and is not a single
    /// category-independent constant
    pub const fn size(self) -> Size {
        let operand_slots = self.category.operand_size().size() as i32;
        Size::new(1 - 2 * operand_slots, 0)
    }

    pub fn apply(self, sink: &mut dyn InstructionSink) -> Size {
        let if_true = sink.fresh_label();
        let join = sink.fresh_label();

        if let Some(comparison) = self.comparison_opcode() {
            sink.visit_insn(comparison);
        }
        sink.visit_jump_insn(self.branch_opcode(), if_true);
        sink.visit_insn(Opcode::Iconst0);
        sink.visit_jump_insn(Opcode::Goto, join);
        sink.visit_label(if_true);
        sink.visit_frame(&FrameDirective::Same);
        sink.visit_insn(Opcode::Iconst1);
        sink.visit_label(join);
        sink.visit_frame(&FrameDirective::Same1(FrameItem::Integer));

        self.size()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::recording::{Event, RecordingSink};

    const OPERATORS: [ComparisonOperator; 6] = [
        ComparisonOperator::Equals,
        ComparisonOperator::NotEquals,
        ComparisonOperator::LessThan,
        ComparisonOperator::LessOrEqual,
        ComparisonOperator::GreaterThan,
        ComparisonOperator::GreaterOrEqual,
    ];

    const CATEGORIES: [ComparisonCategory; 4] = [
        ComparisonCategory::Integer,
        ComparisonCategory::Long,
        ComparisonCategory::Float,
        ComparisonCategory::Double,
    ];

    #[test]
    fn every_combination_emits_the_branch_diamond() {
        for category in CATEGORIES {
            for operator in OPERATORS {
                let comparison = PrimitiveComparison::new(operator, category);
                let mut sink = RecordingSink::new();
                let size = comparison.apply(&mut sink);

                // Reported decrease matches the operand category's width
                let expected_impact = match category {
                    ComparisonCategory::Integer | ComparisonCategory::Float => -1,
                    ComparisonCategory::Long | ComparisonCategory::Double => -3,
                };
                assert_eq!(size, Size::new(expected_impact, 0));

                // The int category branches directly, the others compare first
                let mut events = sink.events.into_iter();
                if category != ComparisonCategory::Integer {
                    assert!(matches!(events.next(), Some(Event::Insn(_))));
                }

                // Conditional branch into the diamond
                let if_true = match events.next() {
                    Some(Event::Jump(_, target)) => target,
                    other => panic!("expected conditional jump, got {:?}", other),
                };
                assert_eq!(events.next(), Some(Event::Insn(Opcode::Iconst0)));
                let join = match events.next() {
                    Some(Event::Jump(Opcode::Goto, target)) => target,
                    other => panic!("expected goto, got {:?}", other),
                };
                assert_eq!(events.next(), Some(Event::PlaceLabel(if_true)));
                assert_eq!(events.next(), Some(Event::Frame(FrameDirective::Same)));
                assert_eq!(events.next(), Some(Event::Insn(Opcode::Iconst1)));
                assert_eq!(events.next(), Some(Event::PlaceLabel(join)));
                // The join point declares exactly one int-typed stack value
                assert_eq!(
                    events.next(),
                    Some(Event::Frame(FrameDirective::Same1(FrameItem::Integer)))
                );
                assert_eq!(events.next(), None);
            }
        }
    }

    #[test]
    fn unordered_results_falsify_the_comparison() {
        let less = PrimitiveComparison::new(ComparisonOperator::LessThan, ComparisonCategory::Float);
        let mut sink = RecordingSink::new();
        less.apply(&mut sink);
        assert_eq!(sink.events[0], Event::Insn(Opcode::Fcmpg));

        let greater = PrimitiveComparison::new(
            ComparisonOperator::GreaterOrEqual,
            ComparisonCategory::Double,
        );
        let mut sink = RecordingSink::new();
        greater.apply(&mut sink);
        assert_eq!(sink.events[0], Event::Insn(Opcode::Dcmpl));
    }

    #[test]
    fn long_comparison_collapses_through_lcmp() {
        let comparison =
            PrimitiveComparison::new(ComparisonOperator::Equals, ComparisonCategory::Long);
        let mut sink = RecordingSink::new();
        comparison.apply(&mut sink);
        assert_eq!(sink.events[0], Event::Insn(Opcode::Lcmp));
        assert!(matches!(sink.events[1], Event::Jump(Opcode::Ifeq, _)));
    }
}
