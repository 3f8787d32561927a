//! CSS selector subset
//!
//! Supports the shapes the locator synthesizer emits plus the common forms a
//! human writes by hand: type and universal selectors, `#id`, `.class`,
//! attribute selectors, structural pseudo-classes and the descendant and
//! child combinators. Selector lists and pseudo-elements are not supported.

use super::{Document, DomError, NodeId};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq)]
enum AttrOp {
    Exists,
    Equals,
    Prefix,
    Suffix,
    Substring,
    Includes,
}

#[derive(Debug, Clone, PartialEq)]
struct AttrCond {
    name: String,
    op: AttrOp,
    value: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Pseudo {
    NthOfType(usize),
    NthChild(usize),
    FirstChild,
    LastChild,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrCond>,
    pseudos: Vec<Pseudo>,
}

/// A parsed complex selector such as `ul.cards > li:nth-of-type(2)`
#[derive(Debug, Clone, PartialEq)]
pub struct CssSelector {
    compounds: Vec<Compound>,
    /// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`
    combinators: Vec<Combinator>,
}

impl CssSelector {
    pub fn parse(selector: &str) -> Result<Self, DomError> {
        let mut parser = Parser {
            chars: selector.trim().chars().collect(),
            pos: 0,
            source: selector,
        };

        let mut compounds = Vec::new();
        let mut combinators = Vec::new();

        loop {
            compounds.push(parser.compound()?);
            let had_space = parser.skip_ws();
            match parser.peek() {
                None => break,
                Some('>') => {
                    parser.pos += 1;
                    parser.skip_ws();
                    combinators.push(Combinator::Child);
                }
                Some(_) if had_space => combinators.push(Combinator::Descendant),
                Some(c) => return Err(parser.error(&format!("unexpected '{}'", c))),
            }
        }

        Ok(Self {
            compounds,
            combinators,
        })
    }

    /// Check whether an element matches this selector
    pub fn matches(&self, doc: &Document, id: NodeId) -> bool {
        doc.is_element(id) && self.matches_at(doc, id, self.compounds.len() - 1)
    }

    fn matches_at(&self, doc: &Document, id: NodeId, idx: usize) -> bool {
        if !compound_matches(doc, id, &self.compounds[idx]) {
            return false;
        }
        if idx == 0 {
            return true;
        }
        match self.combinators[idx - 1] {
            Combinator::Child => doc
                .parent(id)
                .map(|p| self.matches_at(doc, p, idx - 1))
                .unwrap_or(false),
            Combinator::Descendant => doc.ancestors(id).any(|a| self.matches_at(doc, a, idx - 1)),
        }
    }
}

fn compound_matches(doc: &Document, id: NodeId, compound: &Compound) -> bool {
    if let Some(tag) = &compound.tag {
        if doc.tag(id) != tag {
            return false;
        }
    }
    if let Some(expected) = &compound.id {
        if doc.attr(id, "id") != Some(expected.as_str()) {
            return false;
        }
    }
    if !compound.classes.iter().all(|c| doc.has_class(id, c)) {
        return false;
    }

    let attrs_ok = compound.attrs.iter().all(|cond| {
        let Some(actual) = doc.attr(id, &cond.name) else {
            return false;
        };
        match cond.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == cond.value,
            AttrOp::Prefix => !cond.value.is_empty() && actual.starts_with(&cond.value),
            AttrOp::Suffix => !cond.value.is_empty() && actual.ends_with(&cond.value),
            AttrOp::Substring => !cond.value.is_empty() && actual.contains(&cond.value),
            AttrOp::Includes => actual.split_whitespace().any(|w| w == cond.value),
        }
    });
    if !attrs_ok {
        return false;
    }

    compound.pseudos.iter().all(|pseudo| match pseudo {
        Pseudo::NthOfType(n) => doc.type_index(id) == *n,
        Pseudo::NthChild(n) => doc.child_index(id) == *n,
        Pseudo::FirstChild => doc.child_index(id) == 1,
        Pseudo::LastChild => {
            let siblings = doc
                .raw_parent(id)
                .map(|p| doc.element_children(p).count())
                .unwrap_or(1);
            doc.child_index(id) == siblings
        }
    })
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    source: &'a str,
}

impl Parser<'_> {
    fn error(&self, reason: &str) -> DomError {
        DomError::InvalidCss {
            selector: self.source.to_string(),
            reason: format!("{} at offset {}", reason, self.pos),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn expect(&mut self, c: char) -> Result<(), DomError> {
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", c)))
        }
    }

    fn compound(&mut self) -> Result<Compound, DomError> {
        let mut compound = Compound::default();
        let mut any = false;

        match self.peek() {
            Some('*') => {
                self.pos += 1;
                any = true;
            }
            Some(c) if is_ident_char(c) || c == '\\' => {
                compound.tag = Some(self.ident()?.to_lowercase());
                any = true;
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.id = Some(self.ident()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.ident()?);
                }
                Some('[') => compound.attrs.push(self.attribute()?),
                Some(':') => compound.pseudos.push(self.pseudo()?),
                _ => break,
            }
            any = true;
        }

        if !any {
            return Err(self.error("expected a simple selector"));
        }
        Ok(compound)
    }

    fn ident(&mut self) -> Result<String, DomError> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.pos += 1;
                match self.peek() {
                    Some(escaped) => {
                        out.push(escaped);
                        self.pos += 1;
                    }
                    None => return Err(self.error("dangling escape")),
                }
            } else if is_ident_char(c) {
                out.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        if out.is_empty() {
            return Err(self.error("expected identifier"));
        }
        Ok(out)
    }

    fn string(&mut self, quote: char) -> Result<String, DomError> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some('\\') => {
                    self.pos += 1;
                    if let Some(escaped) = self.peek() {
                        out.push(escaped);
                        self.pos += 1;
                    }
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn attribute(&mut self) -> Result<AttrCond, DomError> {
        self.expect('[')?;
        self.skip_ws();
        let name = self.ident()?.to_lowercase();
        self.skip_ws();

        let op = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(AttrCond {
                    name,
                    op: AttrOp::Exists,
                    value: String::new(),
                });
            }
            Some('=') => AttrOp::Equals,
            Some('^') => AttrOp::Prefix,
            Some('$') => AttrOp::Suffix,
            Some('*') => AttrOp::Substring,
            Some('~') => AttrOp::Includes,
            _ => return Err(self.error("expected attribute operator")),
        };
        self.pos += 1;
        if op != AttrOp::Equals {
            self.expect('=')?;
        }
        self.skip_ws();

        let value = match self.peek() {
            Some(q @ ('"' | '\'')) => self.string(q)?,
            _ => self.ident()?,
        };
        self.skip_ws();
        self.expect(']')?;

        Ok(AttrCond { name, op, value })
    }

    fn pseudo(&mut self) -> Result<Pseudo, DomError> {
        self.expect(':')?;
        let name = self.ident()?.to_lowercase();
        match name.as_str() {
            "first-child" => Ok(Pseudo::FirstChild),
            "last-child" => Ok(Pseudo::LastChild),
            "nth-of-type" | "nth-child" => {
                self.expect('(')?;
                self.skip_ws();
                let start = self.pos;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
                let n: usize = self.chars[start..self.pos]
                    .iter()
                    .collect::<String>()
                    .parse()
                    .map_err(|_| self.error("expected a position"))?;
                self.skip_ws();
                self.expect(')')?;
                if name == "nth-of-type" {
                    Ok(Pseudo::NthOfType(n))
                } else {
                    Ok(Pseudo::NthChild(n))
                }
            }
            other => Err(self.error(&format!("unsupported pseudo-class ':{}'", other))),
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::parse(
            r#"<html><body>
            <ul id="todo" class="list">
              <li class="card hot">A</li>
              <li class="card">B</li>
              <li class="card" data-id="c-3">C</li>
            </ul>
            <div><a href="/docs/guide.html" title="Guide">Guide</a><span>x</span></div>
            <input name="q" class="a:b">
            </body></html>"#,
        )
        .unwrap()
    }

    fn count(doc: &Document, sel: &str) -> usize {
        doc.query_css(sel).unwrap().len()
    }

    #[test]
    fn test_simple_selectors() {
        let doc = doc();
        assert_eq!(count(&doc, "li"), 3);
        assert_eq!(count(&doc, "#todo"), 1);
        assert_eq!(count(&doc, "li.card.hot"), 1);
        assert_eq!(count(&doc, "*"), doc.elements().count());
    }

    #[test]
    fn test_attribute_operators() {
        let doc = doc();
        assert_eq!(count(&doc, "[data-id]"), 1);
        assert_eq!(count(&doc, r#"li[data-id="c-3"]"#), 1);
        assert_eq!(count(&doc, r#"a[href$="guide.html"]"#), 1);
        assert_eq!(count(&doc, r#"a[href^="/docs"]"#), 1);
        assert_eq!(count(&doc, r#"a[href*="nope"]"#), 0);
        assert_eq!(count(&doc, "ul[class~=list]"), 1);
        assert_eq!(count(&doc, r#"[class="a:b"]"#), 1);
    }

    #[test]
    fn test_structural_pseudos_and_combinators() {
        let doc = doc();
        assert_eq!(count(&doc, "li:nth-of-type(2)"), 1);
        assert_eq!(count(&doc, "#todo > li:first-child"), 1);
        assert_eq!(count(&doc, "#todo li:last-child"), 1);
        assert_eq!(count(&doc, "body > li"), 0);
        assert_eq!(count(&doc, "body li"), 3);
        assert_eq!(count(&doc, "div span:nth-child(2)"), 1);
    }

    #[test]
    fn test_escaped_identifier() {
        let doc = doc();
        assert_eq!(count(&doc, r".a\:b"), 1);
    }

    #[test]
    fn test_invalid_selectors() {
        let doc = doc();
        assert!(doc.query_css("li:hover").is_err());
        assert!(doc.query_css("[href").is_err());
        assert!(doc.query_css("").is_err());
        assert!(doc.query_css("a, b").is_err());
    }
}
