// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Source locations.

/// Byte range in the front-end's source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Line-start table used to turn byte offsets into `line:col` pairs.
#[derive(Debug, Clone)]
pub struct LineMap {
    starts: Vec<usize>,
    len: usize,
}

impl LineMap {
    pub fn new(source: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        LineMap { starts, len: source.len() }
    }

    /// 1-based `(line, col)` of a byte offset. Offsets past the end clamp to
    /// the last position.
    pub fn locate(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.len);
        let idx = self.starts.partition_point(|&s| s <= offset).saturating_sub(1);
        (idx + 1, offset - self.starts[idx] + 1)
    }

    /// Text of a 1-based line, without its newline.
    pub fn line<'a>(&self, source: &'a str, line: usize) -> Option<&'a str> {
        let start = *self.starts.get(line.checked_sub(1)?)?;
        let end = match self.starts.get(line) {
            Some(next) => next - 1,
            None => source.len(),
        };
        source.get(start..end)
    }

    pub fn line_count(&self) -> usize {
        self.starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_union() {
        let a = Span::new(4, 9);
        let b = Span::new(2, 6);
        assert_eq!(a.to(b), Span::new(2, 9));
        assert_eq!(a.len(), 5);
        assert!(Span::new(3, 3).is_empty());
    }

    #[test]
    fn locate_offsets() {
        let src = "for i in 0..n {\n  x = x + 1\n}";
        let map = LineMap::new(src);
        assert_eq!(map.line_count(), 3);
        assert_eq!(map.locate(0), (1, 1));
        assert_eq!(map.locate(16), (2, 1));
        assert_eq!(map.locate(18), (2, 3));
        assert_eq!(map.locate(src.len()), (3, 2));
        assert_eq!(map.locate(10_000), (3, 2));
    }

    #[test]
    fn newline_belongs_to_its_line() {
        let map = LineMap::new("ab\ncd\n");
        assert_eq!(map.locate(2), (1, 3));
        assert_eq!(map.locate(3), (2, 1));
    }

    #[test]
    fn line_text() {
        let src = "let a = 1\nlet b = 2\n";
        let map = LineMap::new(src);
        assert_eq!(map.line(src, 1), Some("let a = 1"));
        assert_eq!(map.line(src, 2), Some("let b = 2"));
        assert_eq!(map.line(src, 3), Some(""));
        assert_eq!(map.line(src, 0), None);
        assert_eq!(map.line(src, 4), None);
    }
}
