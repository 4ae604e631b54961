//! Forward-then-backward frame ordering

/// Iterator over `f0..fn-1` followed by `fn-2..f1`
///
/// The whole sequence is materialised on construction.
pub struct PingPong<T> {
    items: Vec<T>,
    position: usize,
}

impl<T: Clone> PingPong<T> {
    pub fn new<I: IntoIterator<Item = T>>(items: I) -> Self {
        Self {
            items: items.into_iter().collect(),
            position: 0,
        }
    }

    fn total(&self) -> usize {
        crate::domain::rules::pingpong_len(self.items.len())
    }
}

impl<T: Clone> Iterator for PingPong<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let n = self.items.len();
        if self.position >= self.total() {
            return None;
        }
        let index = if self.position < n {
            self.position
        } else {
            2 * n - 2 - self.position
        };
        self.position += 1;
        self.items.get(index).cloned()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total() - self.position;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pingpong_sequence() {
        let out: Vec<_> = PingPong::new(vec![0, 1, 2, 3]).collect();
        assert_eq!(out, vec![0, 1, 2, 3, 2, 1]);
    }

    #[test]
    fn test_pingpong_short_inputs() {
        assert_eq!(PingPong::new(Vec::<u8>::new()).count(), 0);
        assert_eq!(PingPong::new(vec![7]).collect::<Vec<_>>(), vec![7]);
        assert_eq!(PingPong::new(vec![7, 8]).collect::<Vec<_>>(), vec![7, 8]);
    }

    #[test]
    fn test_pingpong_mirror_property() {
        for n in 2..12usize {
            let input: Vec<usize> = (0..n).collect();
            let output: Vec<usize> = PingPong::new(input.clone()).collect();
            assert_eq!(output.len(), 2 * n - 2);
            for i in 0..n {
                assert_eq!(output[i], input[i]);
            }
            for i in 1..n - 1 {
                assert_eq!(output[2 * n - 2 - i], input[i]);
            }
        }
    }
}
