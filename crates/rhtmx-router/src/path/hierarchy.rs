/// Lazy iterator over the ancestors of a segment list
///
/// For segments `[a, b, c]` yields `[a, b, c]` → `[a, b]` → `[a]` → `[]`,
/// i.e. the directory itself first and the root last. Each item borrows
/// from the input; nothing is allocated.
///
/// # Examples
///
/// ```
/// use rhtmx_router::path::Ancestry;
///
/// let segments = ["blog", "posts"];
/// let dirs: Vec<&[&str]> = Ancestry::new(&segments).collect();
/// assert_eq!(dirs, vec![&["blog", "posts"][..], &["blog"][..], &[][..]]);
/// ```
#[derive(Debug)]
pub struct Ancestry<'a, T> {
    segments: &'a [T],
    remaining: Option<usize>,
}

impl<'a, T> Ancestry<'a, T> {
    pub fn new(segments: &'a [T]) -> Self {
        Self {
            segments,
            remaining: Some(segments.len()),
        }
    }
}

impl<'a, T> Iterator for Ancestry<'a, T> {
    type Item = &'a [T];

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.remaining?;
        self.remaining = len.checked_sub(1);
        Some(&self.segments[..len])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining.map_or(0, |len| len + 1);
        (n, Some(n))
    }
}

impl<'a, T> ExactSizeIterator for Ancestry<'a, T> {}

impl<'a, T> Clone for Ancestry<'a, T> {
    fn clone(&self) -> Self {
        Self {
            segments: self.segments,
            remaining: self.remaining,
        }
    }
}
