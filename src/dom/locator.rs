use crate::dom::query::{self, Parent};
use crate::dom::response::Response;
use crate::dom::selector::SelectorKind;
use crate::dom::wait::Condition;
use crate::errors::{Result, UnearthtimeError};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

type TermFn = Arc<dyn Fn(&[&str]) -> String + Send + Sync>;

#[derive(Clone)]
pub enum Term {
    Literal(String),
    Template(String),
    Function { description: String, build: TermFn },
}

impl Term {
    pub fn literal(selector: impl Into<String>) -> Self {
        Term::Literal(selector.into())
    }

    /// `{}` takes the next argument, `{N}` the N-th. A pattern without
    /// placeholders is a literal.
    pub fn template(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        if has_placeholder(&pattern) {
            Term::Template(pattern)
        } else {
            Term::Literal(pattern)
        }
    }

    pub fn func<F>(description: impl Into<String>, build: F) -> Self
    where
        F: Fn(&[&str]) -> String + Send + Sync + 'static,
    {
        Term::Function {
            description: description.into(),
            build: Arc::new(build),
        }
    }

    pub fn is_parameterized(&self) -> bool {
        !matches!(self, Term::Literal(_))
    }

    pub fn resolve(&self, args: &[&str]) -> String {
        match self {
            Term::Literal(selector) => selector.clone(),
            Term::Template(pattern) => fill_template(pattern, args),
            Term::Function { build, .. } => build(args),
        }
    }
}

fn has_placeholder(pattern: &str) -> bool {
    pattern.match_indices('{').any(|(open, _)| {
        let tail = &pattern[open + 1..];
        tail.find('}')
            .map_or(false, |close| tail[..close].chars().all(|c| c.is_ascii_digit()))
    })
}

fn fill_template(pattern: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut next = 0;
    let mut rest = pattern;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        match tail.find('}') {
            Some(close) if tail[..close].chars().all(|c| c.is_ascii_digit()) => {
                let index = if close == 0 {
                    next += 1;
                    next - 1
                } else {
                    tail[..close].parse().unwrap_or(usize::MAX)
                };
                out.push_str(args.get(index).copied().unwrap_or_default());
                rest = &tail[close + 1..];
            }
            _ => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Term::Literal(a), Term::Literal(b)) => a == b,
            (Term::Template(a), Term::Template(b)) => a == b,
            (Term::Function { build: a, .. }, Term::Function { build: b, .. }) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Literal(s) | Term::Template(s) => f.write_str(s),
            Term::Function { description, .. } => f.write_str(description),
        }
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Literal(s) => f.debug_tuple("Literal").field(s).finish(),
            Term::Template(s) => f.debug_tuple("Template").field(s).finish(),
            Term::Function { description, .. } => f.debug_tuple("Function").field(description).finish(),
        }
    }
}

impl From<&str> for Term {
    fn from(selector: &str) -> Self {
        Term::literal(selector)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terms {
    One(Term),
    Many(Vec<Term>),
}

impl Terms {
    pub fn as_slice(&self) -> &[Term] {
        match self {
            Terms::One(term) => std::slice::from_ref(term),
            Terms::Many(terms) => terms,
        }
    }
}

impl From<Term> for Terms {
    fn from(term: Term) -> Self {
        Terms::One(term)
    }
}

impl From<&str> for Terms {
    fn from(selector: &str) -> Self {
        Terms::One(Term::literal(selector))
    }
}

impl From<Vec<Term>> for Terms {
    fn from(terms: Vec<Term>) -> Self {
        Terms::Many(terms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kinds {
    One(SelectorKind),
    Many(Vec<SelectorKind>),
}

impl From<SelectorKind> for Kinds {
    fn from(kind: SelectorKind) -> Self {
        Kinds::One(kind)
    }
}

impl From<Vec<SelectorKind>> for Kinds {
    fn from(kinds: Vec<SelectorKind>) -> Self {
        Kinds::Many(kinds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Policy {
    #[default]
    Standard,
    Forced,
}

/// A reusable, possibly parameterized, possibly multi-candidate element query.
#[derive(Debug, Clone, PartialEq)]
pub struct Locator {
    terms: Terms,
    kinds: Kinds,
    list: bool,
    default_wait: Option<Condition>,
    policy: Policy,
}

impl Locator {
    pub fn new(terms: impl Into<Terms>, kinds: impl Into<Kinds>) -> Self {
        Self {
            terms: terms.into(),
            kinds: kinds.into(),
            list: false,
            default_wait: None,
            policy: Policy::Standard,
        }
    }

    pub fn id(selector: impl Into<String>) -> Self {
        Self::new(Term::literal(selector), SelectorKind::Id)
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(Term::literal(selector), SelectorKind::CssSelector)
    }

    pub fn xpath(selector: impl Into<String>) -> Self {
        Self::new(Term::literal(selector), SelectorKind::XPath)
    }

    pub fn name(selector: impl Into<String>) -> Self {
        Self::new(Term::literal(selector), SelectorKind::Name)
    }

    pub fn class_name(selector: impl Into<String>) -> Self {
        Self::new(Term::literal(selector), SelectorKind::ClassName)
    }

    pub fn tag(selector: impl Into<String>) -> Self {
        Self::new(Term::literal(selector), SelectorKind::TagName)
    }

    pub fn candidates(pairs: impl IntoIterator<Item = (Term, SelectorKind)>) -> Self {
        let (terms, kinds): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        Self::new(terms, kinds)
    }

    pub fn list(mut self) -> Self {
        self.list = true;
        self
    }

    pub fn until(mut self, condition: Condition) -> Self {
        self.default_wait = Some(condition);
        self
    }

    pub fn to_forced(&self) -> Self {
        Self {
            policy: Policy::Forced,
            ..self.clone()
        }
    }

    pub fn to_standard(&self) -> Self {
        Self {
            policy: Policy::Standard,
            ..self.clone()
        }
    }

    pub fn terms(&self) -> &Terms {
        &self.terms
    }

    pub fn kinds(&self) -> &Kinds {
        &self.kinds
    }

    pub fn is_list(&self) -> bool {
        self.list
    }

    pub fn default_wait(&self) -> Option<&Condition> {
        self.default_wait.as_ref()
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn is_forced(&self) -> bool {
        self.policy == Policy::Forced
    }

    pub fn is_parameterized(&self) -> bool {
        self.terms.as_slice().iter().any(Term::is_parameterized)
    }

    pub fn pairs(&self) -> Result<Vec<(&Term, SelectorKind)>> {
        let terms = self.terms.as_slice();
        match &self.kinds {
            Kinds::One(kind) => Ok(terms.iter().map(|t| (t, *kind)).collect()),
            Kinds::Many(kinds) if kinds.len() == terms.len() => {
                Ok(terms.iter().zip(kinds.iter().copied()).collect())
            }
            Kinds::Many(kinds) => Err(UnearthtimeError::MismatchedPairs {
                terms: terms.len(),
                kinds: kinds.len(),
            }),
        }
    }

    /// Run the query.
    ///
    /// Fails on a configuration mistake, checked in this order: arguments
    /// missing for parameterized terms, arguments given to a literal-only
    /// locator, no parent, term/kind count mismatch. A call-time `until`
    /// replaces the default wait.
    pub async fn call(
        &self,
        parent: Option<&Parent>,
        args: &[&str],
        until: Option<Condition>,
    ) -> Result<Response> {
        let parameterized = self.is_parameterized();
        if parameterized && args.is_empty() {
            return Err(UnearthtimeError::MissingArguments(self.to_string()));
        }
        if !parameterized && !args.is_empty() {
            return Err(UnearthtimeError::UnexpectedArguments(self.to_string()));
        }
        let parent = parent.ok_or(UnearthtimeError::NoParent)?;
        let pairs = self.pairs()?;

        let wait = match (until, &self.default_wait) {
            (Some(given), Some(default)) => {
                warn!(default = %default, given = %given, "overriding locator's default wait");
                Some(given)
            }
            (given, default) => given.or_else(|| default.clone()),
        };

        match &self.terms {
            Terms::One(term) => {
                let kind = pairs.first().map(|(_, kind)| *kind).unwrap_or_default();
                let response = self.query(term, kind, parent, args, wait.as_ref()).await?;
                self.qualify(response).await
            }
            Terms::Many(_) => {
                for (position, (term, kind)) in pairs.into_iter().enumerate() {
                    let response = self.query(term, kind, parent, args, wait.as_ref()).await?;
                    let response = self.qualify(response).await?;
                    if response.is_truthy() {
                        debug!(position, term = %term, "candidate matched");
                        return Ok(response);
                    }
                }
                debug!(locator = %self, "all candidates exhausted");
                Ok(Response::Miss)
            }
        }
    }

    pub async fn locate(&self, parent: &Parent, args: &[&str]) -> Result<Response> {
        self.call(Some(parent), args, None).await
    }

    async fn query(
        &self,
        term: &Term,
        kind: SelectorKind,
        parent: &Parent,
        args: &[&str],
        wait: Option<&Condition>,
    ) -> Result<Response> {
        let selector = term.resolve(args);
        debug!(kind = %kind, selector = %selector, list = self.list, "trying candidate");
        if self.list {
            query::find_all(kind, &selector, parent, wait).await
        } else {
            query::find(kind, &selector, parent, wait).await
        }
    }

    async fn qualify(&self, response: Response) -> Result<Response> {
        if self.policy == Policy::Forced {
            return Ok(response);
        }
        Ok(match response {
            Response::Hit(hit) => {
                if hit.is_visible().await? {
                    Response::Hit(hit)
                } else {
                    Response::Miss
                }
            }
            Response::HitList(hits) => {
                let shown = hits.visible().await?;
                if shown.is_empty() {
                    Response::Miss
                } else {
                    Response::HitList(shown)
                }
            }
            Response::Miss => Response::Miss,
        })
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variant = match self.policy {
            Policy::Standard => "Locator",
            Policy::Forced => "ForcedLocator",
        };
        let yields = if self.list { "HitList" } else { "Hit" };

        let terms = self.terms.as_slice();
        let kinds: Vec<SelectorKind> = match &self.kinds {
            Kinds::One(kind) => vec![*kind; terms.len()],
            Kinds::Many(kinds) => kinds.clone(),
        };
        let entries: Vec<String> = terms
            .iter()
            .zip(kinds)
            .map(|(term, kind)| format!("{}[Term: {}, By: {}] \u{2192} {}", variant, term, kind, yields))
            .collect();

        match &self.terms {
            Terms::One(_) => f.write_str(entries.first().map(String::as_str).unwrap_or(variant)),
            Terms::Many(_) => write!(f, "[\n\t{}\n]", entries.join("\n\t")),
        }
    }
}
