use crate::jvm::class_file::{MethodCode, Version};
use crate::jvm::code::ClassSink;
use crate::jvm::{
    BinaryName, ClassAccessFlags, FieldAccessFlags, FieldType, InnerClassAccessFlags,
    MethodAccessFlags, MethodDescriptor, UnqualifiedName,
};
use log::debug;

/// The syntactic enclosure of a nested class
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct OuterClass {
    pub owner: BinaryName,
    pub method: Option<(UnqualifiedName, MethodDescriptor<BinaryName>)>,
}

/// Deferred metadata to emit if the emitting code never does so explicitly
#[derive(Clone, Default, Debug)]
pub struct SyntheticDefaults {
    pub nest_host: Option<BinaryName>,
    pub outer_class: Option<OuterClass>,
}

/// A class sink wrapper that guarantees the canonical order of the
/// structural sections: nest host, then outer class, then attributes, then
/// members and collected metadata
///
/// Three independent pending flags track the sections. Each flag is cleared
/// either by its own explicit visitation, or lazily the first time a
/// visitation arrives that the format requires to come strictly after it —
/// at that point the configured deferred default is emitted (when present)
/// before the triggering call is forwarded. Every flag fires at most once,
/// and the firing order is always nest host, outer class, attributes, no
/// matter which trigger fired them.
pub struct MetadataOrderingVisitor<S> {
    /// Next stage of the sink chain
    inner: S,

    defaults: SyntheticDefaults,

    /// Nest host not yet visited
    trigger_nest_host: bool,

    /// Outer class not yet visited
    trigger_outer_class: bool,

    /// Attribute phase not yet completed
    trigger_attributes: bool,
}

impl<S: ClassSink> MetadataOrderingVisitor<S> {
    pub fn new(inner: S, defaults: SyntheticDefaults) -> MetadataOrderingVisitor<S> {
        MetadataOrderingVisitor {
            inner,
            defaults,
            trigger_nest_host: true,
            trigger_outer_class: true,
            trigger_attributes: true,
        }
    }

    /// Unwrap the inner sink
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn consider_trigger_nest_host(&mut self) {
        if self.trigger_nest_host {
            self.trigger_nest_host = false;
            if let Some(nest_host) = self.defaults.nest_host.take() {
                debug!("emitting deferred nest host {:?}", nest_host);
                self.inner.visit_nest_host(&nest_host);
            }
        }
    }

    fn consider_trigger_outer_class(&mut self) {
        if self.trigger_outer_class {
            self.trigger_outer_class = false;
            if let Some(outer_class) = self.defaults.outer_class.take() {
                debug!("emitting deferred outer class {:?}", outer_class.owner);
                self.inner.visit_outer_class(
                    &outer_class.owner,
                    outer_class
                        .method
                        .as_ref()
                        .map(|(name, descriptor)| (name, descriptor)),
                );
            }
        }
    }

    fn consider_trigger_attributes(&mut self) {
        if self.trigger_attributes {
            self.trigger_attributes = false;
        }
    }
}

impl<S: ClassSink> ClassSink for MetadataOrderingVisitor<S> {
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
        self.trigger_nest_host = false;
        self.inner.visit_nest_host(nest_host);
    }

    fn visit_outer_class(
        &mut self,
        owner: &BinaryName,
        method: Option<(&UnqualifiedName, &MethodDescriptor<BinaryName>)>,
    ) {
        self.consider_trigger_nest_host();
        self.trigger_outer_class = false;
        self.inner.visit_outer_class(owner, method);
    }

    fn visit_attribute(&mut self, name: &str, info: &[u8]) {
        self.consider_trigger_nest_host();
        self.consider_trigger_outer_class();
        self.inner.visit_attribute(name, info);
    }

    fn visit_nest_member(&mut self, nest_member: &BinaryName) {
        self.consider_trigger_nest_host();
        self.consider_trigger_outer_class();
        self.consider_trigger_attributes();
        self.inner.visit_nest_member(nest_member);
    }

    fn visit_inner_class(
        &mut self,
        inner: &BinaryName,
        outer: Option<&BinaryName>,
        inner_name: Option<&UnqualifiedName>,
        access_flags: InnerClassAccessFlags,
    ) {
        self.consider_trigger_nest_host();
        self.consider_trigger_outer_class();
        self.consider_trigger_attributes();
        self.inner
            .visit_inner_class(inner, outer, inner_name, access_flags);
    }

    fn visit_field(
        &mut self,
        access_flags: FieldAccessFlags,
        name: &UnqualifiedName,
        descriptor: &FieldType<BinaryName>,
    ) {
        self.consider_trigger_nest_host();
        self.consider_trigger_outer_class();
        self.consider_trigger_attributes();
        self.inner.visit_field(access_flags, name, descriptor);
    }

    fn visit_method(
        &mut self,
        access_flags: MethodAccessFlags,
        name: &UnqualifiedName,
        descriptor: &MethodDescriptor<BinaryName>,
        code: Option<MethodCode>,
    ) {
        self.consider_trigger_nest_host();
        self.consider_trigger_outer_class();
        self.consider_trigger_attributes();
        self.inner.visit_method(access_flags, name, descriptor, code);
    }

    fn visit_end(&mut self) {
        self.consider_trigger_nest_host();
        self.consider_trigger_outer_class();
        self.consider_trigger_attributes();
        self.inner.visit_end();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::recording::{ClassEvent, RecordingClassSink};
    use crate::jvm::Name;

    fn defaults_with_both() -> SyntheticDefaults {
        SyntheticDefaults {
            nest_host: Some(BinaryName::OBJECT),
            outer_class: Some(OuterClass {
                owner: BinaryName::STRING,
                method: None,
            }),
        }
    }

    #[test]
    fn member_visitation_fires_pending_sections_in_order() {
        let mut visitor =
            MetadataOrderingVisitor::new(RecordingClassSink::new(), defaults_with_both());
        let name = UnqualifiedName::from_string(String::from("value")).unwrap();
        visitor.visit_field(FieldAccessFlags::PUBLIC, &name, &FieldType::int());

        assert_eq!(
            visitor.into_inner().events,
            vec![
                ClassEvent::NestHost(BinaryName::OBJECT),
                ClassEvent::OuterClass(BinaryName::STRING, None),
                ClassEvent::Field(FieldAccessFlags::PUBLIC, String::from("value"), "I".into()),
            ]
        );
    }

    #[test]
    fn explicit_visitation_preempts_the_default() {
        let mut visitor =
            MetadataOrderingVisitor::new(RecordingClassSink::new(), defaults_with_both());
        visitor.visit_nest_host(&BinaryName::THROWABLE);
        visitor.visit_end();

        assert_eq!(
            visitor.into_inner().events,
            vec![
                ClassEvent::NestHost(BinaryName::THROWABLE),
                ClassEvent::OuterClass(BinaryName::STRING, None),
                ClassEvent::End,
            ]
        );
    }

    #[test]
    fn attribute_visitation_fires_only_earlier_sections() {
        let mut visitor =
            MetadataOrderingVisitor::new(RecordingClassSink::new(), defaults_with_both());
        visitor.visit_attribute("Synthetic", &[]);
        visitor.visit_nest_member(&BinaryName::INTEGER);

        assert_eq!(
            visitor.into_inner().events,
            vec![
                ClassEvent::NestHost(BinaryName::OBJECT),
                ClassEvent::OuterClass(BinaryName::STRING, None),
                ClassEvent::Attribute(String::from("Synthetic"), vec![]),
                ClassEvent::NestMember(BinaryName::INTEGER),
            ]
        );
    }

    #[test]
    fn absent_defaults_fire_silently() {
        let mut visitor =
            MetadataOrderingVisitor::new(RecordingClassSink::new(), SyntheticDefaults::default());
        visitor.visit_end();
        assert_eq!(visitor.into_inner().events, vec![ClassEvent::End]);
    }

    #[test]
    fn sections_fire_at_most_once() {
        let mut visitor =
            MetadataOrderingVisitor::new(RecordingClassSink::new(), defaults_with_both());
        visitor.visit_nest_member(&BinaryName::INTEGER);
        visitor.visit_nest_member(&BinaryName::LONG);
        visitor.visit_end();

        let events = visitor.into_inner().events;
        let nest_hosts = events
            .iter()
            .filter(|event| matches!(event, ClassEvent::NestHost(_)))
            .count();
        let outer_classes = events
            .iter()
            .filter(|event| matches!(event, ClassEvent::OuterClass(_, _)))
            .count();
        assert_eq!(nest_hosts, 1);
        assert_eq!(outer_classes, 1);
    }
}
