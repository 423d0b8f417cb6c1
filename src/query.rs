//! Attribute-predicate queries over a parsed forest.
//!
//! Matching is a pre-order walk: an element is visited before its
//! children, siblings in source order. An empty tag or an empty wanted
//! attribute value acts as a wildcard.

use crate::parser::{EMPTY_ELEMENT, Element};

/// Pre-order iterator over every element of a forest
pub struct Walk<'a> {
    stack: Vec<std::slice::Iter<'a, Element>>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let level = self.stack.last_mut()?;
            match level.next() {
                Some(element) => {
                    self.stack.push(element.children.iter());
                    return Some(element);
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// Walk a forest in pre-order.
pub fn walk(forest: &[Element]) -> Walk<'_> {
    Walk {
        stack: vec![forest.iter()],
    }
}

/// Does `element` satisfy the tag and every wanted attribute?
///
/// A wanted attribute with an empty value only requires the key to be
/// present; otherwise the value must be equal.
pub fn matches(element: &Element, tag: &str, wanted: &[(&str, &str)]) -> bool {
    if !tag.is_empty() && element.tag != tag {
        return false;
    }

    wanted.iter().all(|(key, value)| match element.attr(key) {
        Some(actual) => value.is_empty() || actual == *value,
        None => false,
    })
}

/// Every matching element, in pre-order.
pub fn find_all<'a>(forest: &'a [Element], tag: &str, wanted: &[(&str, &str)]) -> Vec<&'a Element> {
    walk(forest)
        .filter(|element| matches(element, tag, wanted))
        .collect()
}

/// First matching element in pre-order, or the empty element when nothing matches.
pub fn find_first<'a>(forest: &'a [Element], tag: &str, wanted: &[(&str, &str)]) -> &'a Element {
    walk(forest)
        .find(|element| matches(element, tag, wanted))
        .unwrap_or(&EMPTY_ELEMENT)
}
