use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};

/// Copula operators rendered infix as `<subject copula predicate>`.
pub const COPULAS: [&str; 4] = ["-->", "<->", "==>", "<=>"];

/// The inheritance copula used by the syllogistic rules.
pub const INHERITANCE: &str = "-->";

/// Stable handle of an interned atom.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AtomId(pub u32);

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarKind {
    /// `$x`
    Independent,
    /// `#x`
    Dependent,
    /// `?x`
    Query,
}

impl VarKind {
    pub fn prefix(&self) -> char {
        match self {
            Self::Independent => '$',
            Self::Dependent => '#',
            Self::Query => '?',
        }
    }

    pub fn from_prefix(c: char) -> Option<Self> {
        match c {
            '$' => Some(Self::Independent),
            '#' => Some(Self::Dependent),
            '?' => Some(Self::Query),
            _ => None,
        }
    }
}

/// Interned term. Expressions refer to their children by handle only, so no
/// atom ever owns another and structural equality is handle equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Atom {
    Symbol(String),
    Variable(VarKind, String),
    Expression(Vec<AtomId>),
}

/// Owned, store-independent form of an atom. Used by the parser and by
/// snapshots, which must survive across atom stores.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Term {
    Symbol(String),
    Variable(VarKind, String),
    Expression(Vec<Term>),
}

impl Term {
    pub fn symbol(name: &str) -> Self {
        Self::Symbol(name.to_string())
    }

    /// `<subject copula predicate>` as the expression `(copula subject predicate)`.
    pub fn statement(copula: &str, subject: Term, predicate: Term) -> Self {
        Self::Expression(vec![Self::symbol(copula), subject, predicate])
    }

    pub fn inheritance(subject: &str, predicate: &str) -> Self {
        Self::statement(INHERITANCE, Self::symbol(subject), Self::symbol(predicate))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Symbol(name) => write!(f, "{name}"),
            Term::Variable(kind, name) => write!(f, "{}{name}", kind.prefix()),
            Term::Expression(children) => {
                if let [Term::Symbol(op), subject, predicate] = children.as_slice()
                    && COPULAS.contains(&op.as_str())
                {
                    return write!(f, "<{subject} {op} {predicate}>");
                }
                write!(f, "(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Append-only interning arena shared by every memory, workspace and shard.
///
/// Interning is safe under concurrent insertion: the content map's entry
/// lock makes the check-then-allocate step atomic per atom.
#[derive(Default)]
pub struct AtomStore {
    by_content: DashMap<Atom, AtomId>,
    by_id: DashMap<AtomId, Atom>,
    next: AtomicU32,
}

impl AtomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern an atom, returning the existing handle for equal content.
    pub fn intern(&self, atom: Atom) -> AtomId {
        if let Some(id) = self.by_content.get(&atom) {
            return *id;
        }
        match self.by_content.entry(atom) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => {
                let id = AtomId(self.next.fetch_add(1, Ordering::Relaxed));
                self.by_id.insert(id, e.key().clone());
                e.insert(id);
                id
            }
        }
    }

    pub fn symbol(&self, name: &str) -> AtomId {
        self.intern(Atom::Symbol(name.to_string()))
    }

    pub fn variable(&self, kind: VarKind, name: &str) -> AtomId {
        self.intern(Atom::Variable(kind, name.to_string()))
    }

    pub fn expression(&self, children: Vec<AtomId>) -> AtomId {
        self.intern(Atom::Expression(children))
    }

    /// Intern `(copula subject predicate)`.
    pub fn statement(&self, copula: &str, subject: AtomId, predicate: AtomId) -> AtomId {
        let op = self.symbol(copula);
        self.expression(vec![op, subject, predicate])
    }

    pub fn get(&self, id: AtomId) -> Option<Atom> {
        self.by_id.get(&id).map(|a| a.value().clone())
    }

    pub fn contains(&self, id: AtomId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Intern an owned term tree bottom-up.
    pub fn intern_term(&self, term: &Term) -> AtomId {
        match term {
            Term::Symbol(name) => self.symbol(name),
            Term::Variable(kind, name) => self.variable(*kind, name),
            Term::Expression(children) => {
                let ids = children.iter().map(|c| self.intern_term(c)).collect();
                self.expression(ids)
            }
        }
    }

    /// Rebuild the owned tree for a handle.
    pub fn resolve(&self, id: AtomId) -> Option<Term> {
        // Clone out before recursing so no shard guard is held across lookups.
        match self.get(id)? {
            Atom::Symbol(name) => Some(Term::Symbol(name)),
            Atom::Variable(kind, name) => Some(Term::Variable(kind, name)),
            Atom::Expression(children) => children
                .into_iter()
                .map(|c| self.resolve(c))
                .collect::<Option<Vec<_>>>()
                .map(Term::Expression),
        }
    }

    pub fn children(&self, id: AtomId) -> Vec<AtomId> {
        match self.get(id) {
            Some(Atom::Expression(children)) => children,
            _ => Vec::new(),
        }
    }

    /// The atom itself plus every descendant.
    pub fn subterms(&self, id: AtomId) -> HashSet<AtomId> {
        let mut seen = HashSet::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if seen.insert(next) {
                stack.extend(self.children(next));
            }
        }
        seen
    }

    /// Terms a sentence about `id` is indexed under: the operands of an
    /// expression (everything after the operator), or the atom itself.
    pub fn principal_terms(&self, id: AtomId) -> Vec<AtomId> {
        match self.get(id) {
            Some(Atom::Expression(children)) if children.len() > 1 => {
                let mut terms: Vec<AtomId> = Vec::with_capacity(children.len() - 1);
                for child in &children[1..] {
                    if !terms.contains(child) {
                        terms.push(*child);
                    }
                }
                terms
            }
            _ => vec![id],
        }
    }

    /// Split `(copula subject predicate)` into its parts.
    pub fn as_statement(&self, id: AtomId) -> Option<(String, AtomId, AtomId)> {
        let Some(Atom::Expression(children)) = self.get(id) else {
            return None;
        };
        let [op, subject, predicate] = children.as_slice() else {
            return None;
        };
        match self.get(*op)? {
            Atom::Symbol(copula) if COPULAS.contains(&copula.as_str()) => {
                Some((copula, *subject, *predicate))
            }
            _ => None,
        }
    }

    /// Human-readable rendering; unknown handles print as `#n`.
    pub fn display(&self, id: AtomId) -> String {
        self.resolve(id)
            .map(|t| t.to_string())
            .unwrap_or_else(|| id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_structural_identity() {
        let store = AtomStore::new();
        let a = store.intern_term(&Term::inheritance("cat", "mammal"));
        let b = store.intern_term(&Term::inheritance("cat", "mammal"));
        let c = store.intern_term(&Term::inheritance("mammal", "cat"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        // -->, cat, mammal, two statements
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn test_resolve_roundtrip() {
        let store = AtomStore::new();
        let term = Term::Expression(vec![
            Term::symbol("&&"),
            Term::inheritance("cat", "mammal"),
            Term::Variable(VarKind::Query, "x".to_string()),
        ]);
        let id = store.intern_term(&term);
        assert_eq!(store.resolve(id), Some(term));
        assert_eq!(store.resolve(AtomId(9999)), None);
    }

    #[test]
    fn test_principal_terms() {
        let store = AtomStore::new();
        let id = store.intern_term(&Term::inheritance("cat", "mammal"));
        let terms = store.principal_terms(id);
        assert_eq!(terms, vec![store.symbol("cat"), store.symbol("mammal")]);

        let cat = store.symbol("cat");
        assert_eq!(store.principal_terms(cat), vec![cat]);

        // Repeated operands index the concept once
        let same = store.statement("<->", cat, cat);
        assert_eq!(store.principal_terms(same), vec![cat]);
    }

    #[test]
    fn test_subterms() {
        let store = AtomStore::new();
        let id = store.intern_term(&Term::inheritance("cat", "mammal"));
        let subs = store.subterms(id);
        assert_eq!(subs.len(), 4);
        assert!(subs.contains(&store.symbol("cat")));
        assert!(subs.contains(&id));
    }

    #[test]
    fn test_as_statement() {
        let store = AtomStore::new();
        let id = store.intern_term(&Term::inheritance("cat", "mammal"));
        let (copula, s, p) = store.as_statement(id).unwrap();
        assert_eq!(copula, "-->");
        assert_eq!(s, store.symbol("cat"));
        assert_eq!(p, store.symbol("mammal"));

        let other = store.intern_term(&Term::Expression(vec![
            Term::symbol("op"),
            Term::symbol("a"),
            Term::symbol("b"),
        ]));
        assert!(store.as_statement(other).is_none());
    }

    #[test]
    fn test_display() {
        let store = AtomStore::new();
        let id = store.intern_term(&Term::inheritance("cat", "mammal"));
        assert_eq!(store.display(id), "<cat --> mammal>");
        let expr = store.intern_term(&Term::Expression(vec![
            Term::symbol("op"),
            Term::Variable(VarKind::Independent, "x".to_string()),
        ]));
        assert_eq!(store.display(expr), "(op $x)");
    }

    #[test]
    fn test_concurrent_interning_yields_one_handle() {
        let store = Arc::new(AtomStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..100)
                        .map(|i| store.symbol(&format!("s{}", i % 10)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let results: Vec<Vec<AtomId>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for r in &results[1..] {
            assert_eq!(r, &results[0]);
        }
        assert_eq!(store.len(), 10);
    }
}
