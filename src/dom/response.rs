use crate::core::{Driver, ElementHandle};
use crate::dom::hit::Hit;
use crate::dom::query::Parent;
use crate::dom::wait::Condition;
use crate::errors::{Result, UnearthtimeError};
use std::fmt;
use std::sync::Arc;

/// Outcome of a lookup: one element, many elements, or nothing.
///
/// `Miss` is always falsy. An empty `HitList` is falsy too but still means the
/// driver answered; `Miss` means it didn't find anything at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Response {
    Hit(Hit),
    HitList(HitList),
    #[default]
    Miss,
}

impl Response {
    pub fn is_truthy(&self) -> bool {
        match self {
            Response::Hit(_) => true,
            Response::HitList(hits) => !hits.is_empty(),
            Response::Miss => false,
        }
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, Response::Miss)
    }

    pub fn as_hit(&self) -> Option<&Hit> {
        match self {
            Response::Hit(hit) => Some(hit),
            _ => None,
        }
    }

    pub fn as_hit_list(&self) -> Option<&HitList> {
        match self {
            Response::HitList(hits) => Some(hits),
            _ => None,
        }
    }

    pub fn into_hit(self) -> Option<Hit> {
        match self {
            Response::Hit(hit) => Some(hit),
            _ => None,
        }
    }

    pub fn into_hit_list(self) -> Option<HitList> {
        match self {
            Response::HitList(hits) => Some(hits),
            _ => None,
        }
    }

    pub fn hits(&self) -> Vec<&Hit> {
        match self {
            Response::Hit(hit) => vec![hit],
            Response::HitList(hits) => hits.iter().collect(),
            Response::Miss => vec![],
        }
    }

    pub fn as_parent(&self) -> Option<Parent> {
        self.as_hit().map(Parent::element)
    }
}

impl From<Hit> for Response {
    fn from(hit: Hit) -> Self {
        Response::Hit(hit)
    }
}

impl From<HitList> for Response {
    fn from(hits: HitList) -> Self {
        Response::HitList(hits)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Hit(hit) => write!(f, "{}", hit),
            Response::HitList(hits) => write!(f, "{}", hits),
            Response::Miss => f.write_str("Miss"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct HitList {
    hits: Vec<Hit>,
}

impl HitList {
    pub fn new(hits: Vec<Hit>) -> Self {
        Self { hits }
    }

    pub(crate) async fn capture(
        driver: &Arc<dyn Driver>,
        handles: Vec<ElementHandle>,
    ) -> Result<Self> {
        let mut hits = Vec::with_capacity(handles.len());
        for handle in handles {
            hits.push(Hit::capture(driver.clone(), handle).await?);
        }
        Ok(Self::new(hits))
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn get(&self, index: isize) -> Result<&Hit> {
        let len = self.hits.len();
        let resolved = if index < 0 {
            len.checked_sub(index.unsigned_abs())
        } else {
            Some(index as usize).filter(|i| *i < len)
        };
        resolved
            .and_then(|i| self.hits.get(i))
            .ok_or(UnearthtimeError::IndexOutOfRange { index, len })
    }

    pub fn first(&self) -> Option<&Hit> {
        self.hits.first()
    }

    pub fn last(&self) -> Option<&Hit> {
        self.hits.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Hit> {
        self.hits.iter()
    }

    pub fn filter(&self, mut keep: impl FnMut(&Hit) -> bool) -> HitList {
        HitList::new(self.hits.iter().filter(|hit| keep(hit)).cloned().collect())
    }

    pub fn where_(&self, condition: bool) -> HitList {
        if condition {
            self.clone()
        } else {
            HitList::default()
        }
    }

    pub async fn visible(&self) -> Result<HitList> {
        let mut shown = Vec::with_capacity(self.hits.len());
        for hit in self.hits.iter() {
            if hit.is_visible().await? {
                shown.push(hit.clone());
            }
        }
        Ok(HitList::new(shown))
    }

    pub async fn verify(&self, condition: &Condition) -> Result<bool> {
        for hit in self.hits.iter() {
            if !hit.verify(condition).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn concat(&self, other: &HitList) -> HitList {
        HitList::new(self.hits.iter().chain(other.hits.iter()).cloned().collect())
    }
}

impl<'a> IntoIterator for &'a HitList {
    type Item = &'a Hit;
    type IntoIter = std::slice::Iter<'a, Hit>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.iter()
    }
}

impl FromIterator<Hit> for HitList {
    fn from_iter<I: IntoIterator<Item = Hit>>(iter: I) -> Self {
        HitList::new(iter.into_iter().collect())
    }
}

impl fmt::Display for HitList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits.is_empty() {
            return f.write_str("HitList[]");
        }
        f.write_str("HitList[")?;
        for hit in self.hits.iter() {
            write!(f, "\n\t{}", hit)?;
        }
        f.write_str("\n]")
    }
}
