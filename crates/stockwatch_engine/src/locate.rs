use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocateError {
    #[error("element path is empty")]
    EmptyPath,
    #[error("invalid selector {selector:?} at position {index}: {message}")]
    InvalidSelector {
        index: usize,
        selector: String,
        message: String,
    },
}

/// Compiled element path: one selector per nesting level, outermost first.
#[derive(Debug, Clone)]
pub struct ElementPath {
    selectors: Vec<Selector>,
}

impl ElementPath {
    pub fn parse(entries: &[String]) -> Result<Self, LocateError> {
        if entries.is_empty() {
            return Err(LocateError::EmptyPath);
        }
        let selectors = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                Selector::parse(entry.trim()).map_err(|err| LocateError::InvalidSelector {
                    index,
                    selector: entry.clone(),
                    message: err.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { selectors })
    }
}

/// Find the elements at the end of `path` whose text is exactly `text`.
///
/// Every level except the last narrows the candidate set to matching
/// descendants of the previous candidates; the last level keeps only
/// elements whose concatenated text equals `text`. Results keep document
/// order per candidate and are not deduplicated, so nested candidates can
/// report the same element more than once.
pub fn locate<'a>(document: &'a Html, path: &ElementPath, text: &str) -> Vec<ElementRef<'a>> {
    let Some((last, parents)) = path.selectors.split_last() else {
        return Vec::new();
    };

    let mut candidates: Vec<NodeRef<'a, Node>> = vec![document.tree.root()];
    for selector in parents {
        candidates = candidates
            .iter()
            .flat_map(|scope| matching_descendants(*scope, selector))
            .map(|element| *element)
            .collect();
        if candidates.is_empty() {
            return Vec::new();
        }
    }

    candidates
        .iter()
        .flat_map(|scope| matching_descendants(*scope, last))
        .filter(|element| element_text(element) == text)
        .collect()
}

fn matching_descendants<'a>(scope: NodeRef<'a, Node>, selector: &Selector) -> Vec<ElementRef<'a>> {
    scope
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .filter(|element| selector.matches(element))
        .collect()
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect()
}
