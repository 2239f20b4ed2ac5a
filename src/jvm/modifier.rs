//! Resolution of semantic member properties into access-flag words
//!
//! Every property of a type or member that surfaces in the binary format's
//! access-flag word is modelled as a small enum (a _contributor_). A
//! contributor knows the mask it contributes and the full bit range it claims
//! ownership of within the flags word; resolving an ordered collection of
//! contributors folds them into the final `u16`, with later contributors
//! overriding earlier ones on overlapping ranges and contributors of
//! different properties never interfering.
//!
//! Contributors for the four member kinds (types, fields, methods,
//! parameters) are statically distinct sum types, so a resolver for one kind
//! cannot be fed contributors of another.

/// Access-flag bit patterns, as assigned by the class-file format
mod acc {
    pub const PUBLIC: u16 = 0x0001;
    pub const PRIVATE: u16 = 0x0002;
    pub const PROTECTED: u16 = 0x0004;
    pub const STATIC: u16 = 0x0008;
    pub const FINAL: u16 = 0x0010;
    pub const SYNCHRONIZED: u16 = 0x0020;
    pub const BRIDGE: u16 = 0x0040;
    pub const VOLATILE: u16 = 0x0040;
    pub const VARARGS: u16 = 0x0080;
    pub const TRANSIENT: u16 = 0x0080;
    pub const NATIVE: u16 = 0x0100;
    pub const INTERFACE: u16 = 0x0200;
    pub const ABSTRACT: u16 = 0x0400;
    pub const STRICT: u16 = 0x0800;
    pub const SYNTHETIC: u16 = 0x1000;
    pub const ANNOTATION: u16 = 0x2000;
    pub const ENUM: u16 = 0x4000;
    pub const MANDATED: u16 = 0x8000;
}

/// A single property that contributes bits to an access-flag word
pub trait ModifierContributor: Copy {
    /// The bits this contributor sets
    fn mask(&self) -> u16;

    /// The full bit range this contributor's property owns. Applying the
    /// contributor clears this range before setting [`Self::mask`].
    fn range(&self) -> u16;

    /// Whether this contributor is its property's default (zero contribution),
    /// letting callers omit it when serializing minimal flag sets
    fn is_default(&self) -> bool {
        self.mask() == 0
    }
}

/// Visibility of a type or member
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Visibility {
    Public,
    Package,
    Protected,
    Private,
}

impl ModifierContributor for Visibility {
    fn mask(&self) -> u16 {
        match self {
            Visibility::Public => acc::PUBLIC,
            Visibility::Package => 0,
            Visibility::Protected => acc::PROTECTED,
            Visibility::Private => acc::PRIVATE,
        }
    }

    fn range(&self) -> u16 {
        acc::PUBLIC | acc::PROTECTED | acc::PRIVATE
    }
}

/// Whether a member belongs to an instance or to the type itself
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Ownership {
    Member,
    Static,
}

impl ModifierContributor for Ownership {
    fn mask(&self) -> u16 {
        match self {
            Ownership::Member => 0,
            Ownership::Static => acc::STATIC,
        }
    }

    fn range(&self) -> u16 {
        acc::STATIC
    }
}

/// Whether a type or member is compiler-generated
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum SyntheticState {
    Plain,
    Synthetic,
}

impl ModifierContributor for SyntheticState {
    fn mask(&self) -> u16 {
        match self {
            SyntheticState::Plain => 0,
            SyntheticState::Synthetic => acc::SYNTHETIC,
        }
    }

    fn range(&self) -> u16 {
        acc::SYNTHETIC
    }
}

/// Whether a type or field takes part in an enumeration
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum EnumerationState {
    Plain,
    Enumeration,
}

impl ModifierContributor for EnumerationState {
    fn mask(&self) -> u16 {
        match self {
            EnumerationState::Plain => 0,
            EnumerationState::Enumeration => acc::ENUM,
        }
    }

    fn range(&self) -> u16 {
        acc::ENUM
    }
}

/// Fundamental shape of a type
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeManifestation {
    Plain,
    Final,
    Abstract,
    Interface,
    Annotation,
}

impl ModifierContributor for TypeManifestation {
    fn mask(&self) -> u16 {
        match self {
            TypeManifestation::Plain => 0,
            TypeManifestation::Final => acc::FINAL,
            TypeManifestation::Abstract => acc::ABSTRACT,
            TypeManifestation::Interface => acc::ABSTRACT | acc::INTERFACE,
            TypeManifestation::Annotation => acc::ABSTRACT | acc::INTERFACE | acc::ANNOTATION,
        }
    }

    fn range(&self) -> u16 {
        acc::FINAL | acc::ABSTRACT | acc::INTERFACE | acc::ANNOTATION
    }
}

/// Mutability shape of a field
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldManifestation {
    Plain,
    Final,
    Volatile,
}

impl ModifierContributor for FieldManifestation {
    fn mask(&self) -> u16 {
        match self {
            FieldManifestation::Plain => 0,
            FieldManifestation::Final => acc::FINAL,
            FieldManifestation::Volatile => acc::VOLATILE,
        }
    }

    fn range(&self) -> u16 {
        acc::FINAL | acc::VOLATILE
    }
}

/// Whether a field takes part in default serialization
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum FieldPersistence {
    Plain,
    Transient,
}

impl ModifierContributor for FieldPersistence {
    fn mask(&self) -> u16 {
        match self {
            FieldPersistence::Plain => 0,
            FieldPersistence::Transient => acc::TRANSIENT,
        }
    }

    fn range(&self) -> u16 {
        acc::TRANSIENT
    }
}

/// Fundamental shape of a method
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum MethodManifestation {
    Plain,
    Final,
    Native,
    FinalNative,
    Abstract,
    Bridge,
}

impl ModifierContributor for MethodManifestation {
    fn mask(&self) -> u16 {
        match self {
            MethodManifestation::Plain => 0,
            MethodManifestation::Final => acc::FINAL,
            MethodManifestation::Native => acc::NATIVE,
            MethodManifestation::FinalNative => acc::FINAL | acc::NATIVE,
            MethodManifestation::Abstract => acc::ABSTRACT,
            MethodManifestation::Bridge => acc::BRIDGE,
        }
    }

    fn range(&self) -> u16 {
        acc::FINAL | acc::NATIVE | acc::ABSTRACT | acc::BRIDGE
    }
}

/// Whether a method holds its owner's monitor while executing
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum SynchronizationState {
    Plain,
    Synchronized,
}

impl ModifierContributor for SynchronizationState {
    fn mask(&self) -> u16 {
        match self {
            SynchronizationState::Plain => 0,
            SynchronizationState::Synchronized => acc::SYNCHRONIZED,
        }
    }

    fn range(&self) -> u16 {
        acc::SYNCHRONIZED
    }
}

/// Whether a method accepts a variable number of arguments
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum MethodArguments {
    Plain,
    Varargs,
}

impl ModifierContributor for MethodArguments {
    fn mask(&self) -> u16 {
        match self {
            MethodArguments::Plain => 0,
            MethodArguments::Varargs => acc::VARARGS,
        }
    }

    fn range(&self) -> u16 {
        acc::VARARGS
    }
}

/// Floating point strictness of a method
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum MethodStrictness {
    Plain,
    Strict,
}

impl ModifierContributor for MethodStrictness {
    fn mask(&self) -> u16 {
        match self {
            MethodStrictness::Plain => 0,
            MethodStrictness::Strict => acc::STRICT,
        }
    }

    fn range(&self) -> u16 {
        acc::STRICT
    }
}

/// Whether a parameter is reassignable
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ParameterManifestation {
    Plain,
    Final,
}

impl ModifierContributor for ParameterManifestation {
    fn mask(&self) -> u16 {
        match self {
            ParameterManifestation::Plain => 0,
            ParameterManifestation::Final => acc::FINAL,
        }
    }

    fn range(&self) -> u16 {
        acc::FINAL
    }
}

/// Whether a parameter is implicitly mandated by the language specification
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ProvisioningState {
    Plain,
    Mandated,
}

impl ModifierContributor for ProvisioningState {
    fn mask(&self) -> u16 {
        match self {
            ProvisioningState::Plain => 0,
            ProvisioningState::Mandated => acc::MANDATED,
        }
    }

    fn range(&self) -> u16 {
        acc::MANDATED
    }
}

macro_rules! modifier_kind {
    (
        $(#[$attr:meta])*
        $kind:ident { $($variant:ident($family:ty)),+ $(,)? }
    ) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
        pub enum $kind {
            $($variant($family)),+
        }

        impl ModifierContributor for $kind {
            fn mask(&self) -> u16 {
                match self {
                    $($kind::$variant(contributor) => contributor.mask()),+
                }
            }

            fn range(&self) -> u16 {
                match self {
                    $($kind::$variant(contributor) => contributor.range()),+
                }
            }
        }

        $(
            impl From<$family> for $kind {
                fn from(contributor: $family) -> $kind {
                    $kind::$variant(contributor)
                }
            }
        )+
    };
}

modifier_kind! {
    /// Contributors legal on a type declaration
    TypeModifier {
        Visibility(Visibility),
        Ownership(Ownership),
        Synthetic(SyntheticState),
        Enumeration(EnumerationState),
        Manifestation(TypeManifestation),
    }
}

modifier_kind! {
    /// Contributors legal on a field declaration
    FieldModifier {
        Visibility(Visibility),
        Ownership(Ownership),
        Synthetic(SyntheticState),
        Enumeration(EnumerationState),
        Manifestation(FieldManifestation),
        Persistence(FieldPersistence),
    }
}

modifier_kind! {
    /// Contributors legal on a method declaration
    MethodModifier {
        Visibility(Visibility),
        Ownership(Ownership),
        Synthetic(SyntheticState),
        Manifestation(MethodManifestation),
        Synchronization(SynchronizationState),
        Arguments(MethodArguments),
        Strictness(MethodStrictness),
    }
}

modifier_kind! {
    /// Contributors legal on a formal parameter declaration
    ParameterModifier {
        Synthetic(SyntheticState),
        Manifestation(ParameterManifestation),
        Provisioning(ProvisioningState),
    }
}

/// An ordered collection of contributors of a single member kind, folded
/// left-to-right into an access-flag word
///
/// Each contributor first clears its own range from the accumulator and then
/// ORs in its mask, so later entries override earlier ones on overlapping
/// ranges while contributors of disjoint properties never interfere. Whether
/// a combination is semantically meaningful (eg. `abstract` together with
/// `final`) is the caller's contract; the fold itself never fails.
#[derive(Clone, Debug)]
pub struct ModifierResolver<T> {
    contributors: Vec<T>,
}

impl<T: ModifierContributor> ModifierResolver<T> {
    pub fn of(contributors: impl IntoIterator<Item = T>) -> ModifierResolver<T> {
        ModifierResolver {
            contributors: contributors.into_iter().collect(),
        }
    }

    /// Resolve the contributors on top of a zero word
    pub fn resolve(&self) -> u16 {
        self.resolve_from(0)
    }

    /// Resolve the contributors on top of a base word. Base bits outside
    /// every applied contributor's range pass through untouched.
    pub fn resolve_from(&self, base: u16) -> u16 {
        self.contributors
            .iter()
            .fold(base, |flags, contributor| {
                (flags & !contributor.range()) | contributor.mask()
            })
    }
}

impl<T: ModifierContributor> FromIterator<T> for ModifierResolver<T> {
    fn from_iter<I: IntoIterator<Item = T>>(contributors: I) -> ModifierResolver<T> {
        ModifierResolver::of(contributors)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Every member of a family must cover part of the family's range and
    /// the members together must cover all of it
    fn assert_family_covers_range<T: ModifierContributor>(members: &[T]) {
        let range = members[0].range();
        let mut union = 0;
        for member in members {
            assert_eq!(member.range(), range, "family members disagree on range");
            assert_eq!(member.mask() & !range, 0, "mask escapes the family range");
            union |= member.mask();
        }
        assert_eq!(union, range, "family masks do not cover the range");
    }

    #[test]
    fn families_cover_their_ranges() {
        assert_family_covers_range(&[
            Visibility::Public,
            Visibility::Package,
            Visibility::Protected,
            Visibility::Private,
        ]);
        assert_family_covers_range(&[Ownership::Member, Ownership::Static]);
        assert_family_covers_range(&[SyntheticState::Plain, SyntheticState::Synthetic]);
        assert_family_covers_range(&[EnumerationState::Plain, EnumerationState::Enumeration]);
        assert_family_covers_range(&[
            TypeManifestation::Plain,
            TypeManifestation::Final,
            TypeManifestation::Abstract,
            TypeManifestation::Interface,
            TypeManifestation::Annotation,
        ]);
        assert_family_covers_range(&[
            FieldManifestation::Plain,
            FieldManifestation::Final,
            FieldManifestation::Volatile,
        ]);
        assert_family_covers_range(&[FieldPersistence::Plain, FieldPersistence::Transient]);
        assert_family_covers_range(&[
            MethodManifestation::Plain,
            MethodManifestation::Final,
            MethodManifestation::Native,
            MethodManifestation::FinalNative,
            MethodManifestation::Abstract,
            MethodManifestation::Bridge,
        ]);
        assert_family_covers_range(&[
            SynchronizationState::Plain,
            SynchronizationState::Synchronized,
        ]);
        assert_family_covers_range(&[MethodArguments::Plain, MethodArguments::Varargs]);
        assert_family_covers_range(&[MethodStrictness::Plain, MethodStrictness::Strict]);
        assert_family_covers_range(&[
            ParameterManifestation::Plain,
            ParameterManifestation::Final,
        ]);
        assert_family_covers_range(&[ProvisioningState::Plain, ProvisioningState::Mandated]);
    }

    #[test]
    fn defaults_contribute_nothing() {
        assert!(Visibility::Package.is_default());
        assert!(!Visibility::Public.is_default());
        assert!(TypeManifestation::Plain.is_default());
        assert!(!TypeManifestation::Interface.is_default());
        assert!(Ownership::Member.is_default());
        assert!(!Ownership::Static.is_default());
    }

    #[test]
    fn disjoint_families_commute() {
        let forwards = ModifierResolver::of([
            MethodModifier::from(Visibility::Public),
            MethodModifier::from(Ownership::Static),
        ]);
        let backwards = ModifierResolver::of([
            MethodModifier::from(Ownership::Static),
            MethodModifier::from(Visibility::Public),
        ]);
        assert_eq!(forwards.resolve(), backwards.resolve());
        assert_eq!(forwards.resolve(), 0x0001 | 0x0008);
    }

    #[test]
    fn later_contributor_wins_on_overlap() {
        let resolver = ModifierResolver::of([
            TypeModifier::from(Visibility::Private),
            TypeModifier::from(Visibility::Public),
        ]);
        assert_eq!(resolver.resolve(), 0x0001);

        let resolver = ModifierResolver::of([
            TypeModifier::from(TypeManifestation::Annotation),
            TypeModifier::from(TypeManifestation::Final),
        ]);
        assert_eq!(resolver.resolve(), 0x0010);
    }

    #[test]
    fn base_bits_outside_ranges_pass_through() {
        // SUPER (0x0020 on classes) belongs to no type contributor family
        let resolver = ModifierResolver::of([
            TypeModifier::from(Visibility::Public),
            TypeModifier::from(TypeManifestation::Final),
        ]);
        assert_eq!(resolver.resolve_from(0x0020), 0x0020 | 0x0001 | 0x0010);
    }

    #[test]
    fn default_contributor_clears_its_range() {
        let resolver = ModifierResolver::of([FieldModifier::from(Visibility::Package)]);
        assert_eq!(resolver.resolve_from(0x0002), 0);
    }
}
