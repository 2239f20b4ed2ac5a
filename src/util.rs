/// Elements with a logical "width"
///
/// This shows up all over the class-file format: operand stack values and
/// local variables occupy one or two slots depending on their type, and some
/// constant pool entries claim two indices.
pub trait Width {
    fn width(&self) -> usize;
}

impl<'a, T: Width> Width for &'a T {
    fn width(&self) -> usize {
        (*self).width()
    }
}
