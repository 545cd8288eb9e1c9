/// Splits `items` into `workers` contiguous chunks whose sizes differ by at
/// most one. The first `len % workers` chunks carry the extra item. When there
/// are more workers than items the trailing chunks are empty.
pub fn partition<T>(items: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    let workers = workers.max(1);
    let base = items.len() / workers;
    let extra = items.len() % workers;

    let mut remaining = items.into_iter();
    (0..workers)
        .map(|i| {
            let size = base + usize::from(i < extra);
            remaining.by_ref().take(size).collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenation_reproduces_input() {
        for n in 0..40usize {
            for w in 1..9usize {
                let input: Vec<usize> = (0..n).collect();
                let chunks = partition(input.clone(), w);
                assert_eq!(chunks.len(), w);

                let sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
                let max = sizes.iter().copied().max().unwrap_or(0);
                let min = sizes.iter().copied().min().unwrap_or(0);
                assert!(max - min <= 1, "n={} w={} sizes={:?}", n, w, sizes);

                let rebuilt: Vec<usize> = chunks.into_iter().flatten().collect();
                assert_eq!(rebuilt, input);
            }
        }
    }

    #[test]
    fn larger_chunks_come_first() {
        let chunks = partition((0..10).collect::<Vec<_>>(), 4);
        assert_eq!(chunks, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7], vec![8, 9]]);
    }

    #[test]
    fn zero_workers_is_clamped_to_one() {
        let chunks = partition(vec!["a", "b"], 0);
        assert_eq!(chunks, vec![vec!["a", "b"]]);
    }

    #[test]
    fn more_workers_than_items_leaves_empty_tail() {
        let chunks = partition(vec![1, 2], 4);
        assert_eq!(chunks, vec![vec![1], vec![2], vec![], vec![]]);
    }
}
