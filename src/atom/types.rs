//! Atom type codes and their class hierarchy.
//!
//! Every atom carries one of these codes. The codes form a tree rooted at
//! [`AtomType::Atom`]; subsumption queries go through [`AtomType::is_a`].
//! Link subtypes partition into [`AtomType::OrderedLink`] descendants, where
//! position in the outgoing set is semantic, and [`AtomType::UnorderedLink`]
//! descendants, where it is not.

use serde::{Deserialize, Serialize};

/// Type code of an atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AtomType {
    /// Root of the hierarchy.
    Atom,

    // -- nodes --------------------------------------------------------------
    /// Base type of all named atoms.
    Node,
    ConceptNode,
    PredicateNode,
    /// A placeholder to be bound during pattern matching.
    VariableNode,
    /// Names another atom type, used as a variable type restriction.
    TypeNode,

    // -- links --------------------------------------------------------------
    /// Base type of all composite atoms.
    Link,
    /// Links whose outgoing-set order is semantic.
    OrderedLink,
    ListLink,
    ImplicationLink,
    InheritanceLink,
    EvaluationLink,
    MemberLink,
    /// Pairs a variable with a type restriction.
    TypedVariableLink,
    /// Enumerates the variables declared by a rule or pattern.
    VariableList,
    /// Pattern-implication triple: (variable declaration, body, implicand).
    BindLink,
    NotLink,
    /// Links whose outgoing-set order is not semantic; canonicalized on intern.
    UnorderedLink,
    SetLink,
    AndLink,
    OrLink,
    /// Links evaluated rather than matched; never valid implicant terms.
    VirtualLink,
    GreaterThanLink,
    EqualLink,
}

impl AtomType {
    /// The immediate parent in the type hierarchy, or `None` for the root.
    pub fn parent(self) -> Option<AtomType> {
        use AtomType::*;
        match self {
            Atom => None,
            Node | Link => Some(Atom),
            ConceptNode | PredicateNode | VariableNode | TypeNode => Some(Node),
            OrderedLink | UnorderedLink | VirtualLink => Some(Link),
            ListLink | ImplicationLink | InheritanceLink | EvaluationLink | MemberLink
            | TypedVariableLink | VariableList | BindLink | NotLink => Some(OrderedLink),
            SetLink | AndLink | OrLink => Some(UnorderedLink),
            GreaterThanLink | EqualLink => Some(VirtualLink),
        }
    }

    /// Whether `self` is `ancestor` or a descendant of it.
    pub fn is_a(self, ancestor: AtomType) -> bool {
        let mut cursor = Some(self);
        while let Some(ty) = cursor {
            if ty == ancestor {
                return true;
            }
            cursor = ty.parent();
        }
        false
    }

    /// Whether atoms of this type carry a name.
    pub fn is_node(self) -> bool {
        self.is_a(AtomType::Node)
    }

    /// Whether atoms of this type carry an outgoing set.
    pub fn is_link(self) -> bool {
        self.is_a(AtomType::Link)
    }

    /// The canonical spelling of the type, as it appears in `TypeNode` names.
    pub fn name(self) -> &'static str {
        use AtomType::*;
        match self {
            Atom => "Atom",
            Node => "Node",
            ConceptNode => "ConceptNode",
            PredicateNode => "PredicateNode",
            VariableNode => "VariableNode",
            TypeNode => "TypeNode",
            Link => "Link",
            OrderedLink => "OrderedLink",
            ListLink => "ListLink",
            ImplicationLink => "ImplicationLink",
            InheritanceLink => "InheritanceLink",
            EvaluationLink => "EvaluationLink",
            MemberLink => "MemberLink",
            TypedVariableLink => "TypedVariableLink",
            VariableList => "VariableList",
            BindLink => "BindLink",
            NotLink => "NotLink",
            UnorderedLink => "UnorderedLink",
            SetLink => "SetLink",
            AndLink => "AndLink",
            OrLink => "OrLink",
            VirtualLink => "VirtualLink",
            GreaterThanLink => "GreaterThanLink",
            EqualLink => "EqualLink",
        }
    }

    /// Look a type up by its canonical spelling.
    pub fn from_name(name: &str) -> Option<AtomType> {
        use AtomType::*;
        let ty = match name {
            "Atom" => Atom,
            "Node" => Node,
            "ConceptNode" => ConceptNode,
            "PredicateNode" => PredicateNode,
            "VariableNode" => VariableNode,
            "TypeNode" => TypeNode,
            "Link" => Link,
            "OrderedLink" => OrderedLink,
            "ListLink" => ListLink,
            "ImplicationLink" => ImplicationLink,
            "InheritanceLink" => InheritanceLink,
            "EvaluationLink" => EvaluationLink,
            "MemberLink" => MemberLink,
            "TypedVariableLink" => TypedVariableLink,
            "VariableList" => VariableList,
            "BindLink" => BindLink,
            "NotLink" => NotLink,
            "UnorderedLink" => UnorderedLink,
            "SetLink" => SetLink,
            "AndLink" => AndLink,
            "OrLink" => OrLink,
            "VirtualLink" => VirtualLink,
            "GreaterThanLink" => GreaterThanLink,
            "EqualLink" => EqualLink,
            _ => return None,
        };
        Some(ty)
    }
}

impl std::fmt::Display for AtomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_reaches_the_root() {
        for ty in [
            AtomType::ConceptNode,
            AtomType::VariableNode,
            AtomType::SetLink,
            AtomType::BindLink,
            AtomType::GreaterThanLink,
        ] {
            assert!(ty.is_a(AtomType::Atom), "{ty} should descend from Atom");
        }
    }

    #[test]
    fn is_a_is_reflexive() {
        assert!(AtomType::SetLink.is_a(AtomType::SetLink));
        assert!(AtomType::Atom.is_a(AtomType::Atom));
    }

    #[test]
    fn ordered_and_unordered_partition() {
        assert!(AtomType::ImplicationLink.is_a(AtomType::OrderedLink));
        assert!(!AtomType::ImplicationLink.is_a(AtomType::UnorderedLink));
        assert!(AtomType::AndLink.is_a(AtomType::UnorderedLink));
        assert!(!AtomType::AndLink.is_a(AtomType::OrderedLink));
    }

    #[test]
    fn virtual_links_are_links_but_not_ordered() {
        assert!(AtomType::GreaterThanLink.is_a(AtomType::VirtualLink));
        assert!(AtomType::GreaterThanLink.is_a(AtomType::Link));
        assert!(!AtomType::GreaterThanLink.is_a(AtomType::OrderedLink));
    }

    #[test]
    fn node_link_predicates() {
        assert!(AtomType::VariableNode.is_node());
        assert!(!AtomType::VariableNode.is_link());
        assert!(AtomType::BindLink.is_link());
        assert!(!AtomType::BindLink.is_node());
    }

    #[test]
    fn name_round_trips() {
        for ty in [
            AtomType::ConceptNode,
            AtomType::TypedVariableLink,
            AtomType::EqualLink,
        ] {
            assert_eq!(AtomType::from_name(ty.name()), Some(ty));
        }
        assert_eq!(AtomType::from_name("FrobnicateLink"), None);
    }
}
