use crate::jvm::class_file::{MethodCode, Version};
use crate::jvm::code::manipulation::StackManipulation;
use crate::jvm::code::ClassSink;
use crate::jvm::{
    BinaryName, ClassAccessFlags, Error, FieldAccessFlags, FieldType, InnerClassAccessFlags,
    MethodAccessFlags, MethodDescriptor, UnqualifiedName,
};

/// A generated companion type that must be handed to whoever consumes the
/// class being visited
#[derive(Clone, PartialEq, Debug)]
pub struct AuxiliaryType {
    pub name: BinaryName,
    pub bytes: Vec<u8>,
}

/// A class sink wrapper that collects the side products of code generation:
/// auxiliary types and the type initializer
///
/// Generated code frequently needs companions — a cached accessor type, an
/// `<clinit>` fragment installing state — that only make sense if whoever
/// drives the visitation declared an interest in them by calling
/// [`AuxiliaryContextVisitor::mark_active`]. Accumulating either kind of
/// side product in a visitor that was never marked active means the products
/// would be silently orphaned, which [`AuxiliaryContextVisitor::finish`]
/// reports as a fatal contract violation rather than dropping them.
pub struct AuxiliaryContextVisitor<S> {
    /// Next stage of the sink chain
    inner: S,

    /// Whether a consumer declared interest in the accumulated side products
    active: bool,

    auxiliary_types: Vec<AuxiliaryType>,

    /// Accumulated fragments of the type initializer, in emission order
    initializer: Vec<StackManipulation>,
}

impl<S: ClassSink> AuxiliaryContextVisitor<S> {
    pub fn new(inner: S) -> AuxiliaryContextVisitor<S> {
        AuxiliaryContextVisitor {
            inner,
            active: false,
            auxiliary_types: vec![],
            initializer: vec![],
        }
    }

    /// Declare that the accumulated side products have a consumer
    pub fn mark_active(&mut self) {
        self.active = true;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Record an auxiliary type generated alongside the visited class
    pub fn register_auxiliary_type(&mut self, auxiliary_type: AuxiliaryType) {
        self.auxiliary_types.push(auxiliary_type);
    }

    /// Append a fragment to the type initializer
    pub fn extend_initializer(&mut self, fragment: StackManipulation) {
        self.initializer.push(fragment);
    }

    /// Whether any initializer fragment has been accumulated
    pub fn has_live_initializer(&self) -> bool {
        !self.initializer.is_empty()
    }

    /// Close the visitation, handing back the inner sink, the auxiliary
    /// types, and the combined type initializer
    ///
    /// Fails if side products were accumulated without the visitor ever
    /// being marked active.
    pub fn finish(self) -> Result<(S, Vec<AuxiliaryType>, StackManipulation), Error> {
        if !self.active && (!self.auxiliary_types.is_empty() || !self.initializer.is_empty()) {
            return Err(Error::InactiveContext {
                auxiliary_types: self.auxiliary_types.len(),
                live_initializer: !self.initializer.is_empty(),
            });
        }
        Ok((
            self.inner,
            self.auxiliary_types,
            StackManipulation::compound(self.initializer),
        ))
    }
}

impl<S: ClassSink> ClassSink for AuxiliaryContextVisitor<S> {
    fn visit(
        &mut self,
        version: Version,
        access_flags: ClassAccessFlags,
        name: &BinaryName,
        super_class: Option<&BinaryName>,
        interfaces: &[BinaryName],
    ) {
        self.inner
            .visit(version, access_flags, name, super_class, interfaces);
    }

    fn visit_nest_host(&mut self, nest_host: &BinaryName) {
        self.inner.visit_nest_host(nest_host);
    }

    fn visit_outer_class(
        &mut self,
        owner: &BinaryName,
        method: Option<(&UnqualifiedName, &MethodDescriptor<BinaryName>)>,
    ) {
        self.inner.visit_outer_class(owner, method);
    }

    fn visit_attribute(&mut self, name: &str, info: &[u8]) {
        self.inner.visit_attribute(name, info);
    }

    fn visit_nest_member(&mut self, nest_member: &BinaryName) {
        self.inner.visit_nest_member(nest_member);
    }

    fn visit_inner_class(
        &mut self,
        inner: &BinaryName,
        outer: Option<&BinaryName>,
        inner_name: Option<&UnqualifiedName>,
        access_flags: InnerClassAccessFlags,
    ) {
        self.inner
            .visit_inner_class(inner, outer, inner_name, access_flags);
    }

    fn visit_field(
        &mut self,
        access_flags: FieldAccessFlags,
        name: &UnqualifiedName,
        descriptor: &FieldType<BinaryName>,
    ) {
        self.inner.visit_field(access_flags, name, descriptor);
    }

    fn visit_method(
        &mut self,
        access_flags: MethodAccessFlags,
        name: &UnqualifiedName,
        descriptor: &MethodDescriptor<BinaryName>,
        code: Option<MethodCode>,
    ) {
        self.inner.visit_method(access_flags, name, descriptor, code);
    }

    fn visit_end(&mut self) {
        self.inner.visit_end();
    }
}
